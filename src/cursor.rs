//! Positions and iterators over a table's global list and its buckets.

use crate::chain::{bucket_index, Chain};
use crate::node::NodeKey;
use core::iter::FusedIterator;

/// Position of an element in the global list, or past-the-end.
///
/// Cursors stay valid across rehashing because nodes are re-threaded,
/// never moved. Erasing the element turns its cursor stale: a stale cursor
/// resolves to nothing, even after the arena slot is reused.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct Cursor(pub(crate) Option<NodeKey>);

impl Cursor {
    pub(crate) const END: Cursor = Cursor(None);

    #[inline]
    pub fn is_end(&self) -> bool {
        self.0.is_none()
    }
}

/// Position inside one bucket.
///
/// Captures the bucket count at construction; advancing past the last
/// node of the bucket yields the bucket's end. Any rehash invalidates it.
/// Equality compares the referenced node only.
#[derive(Copy, Clone, Debug)]
pub struct LocalCursor {
    pub(crate) node: Option<NodeKey>,
    pub(crate) bucket: usize,
    pub(crate) bucket_count: usize,
}

impl LocalCursor {
    #[inline]
    pub fn is_end(&self) -> bool {
        self.node.is_none()
    }

    #[inline]
    pub fn bucket(&self) -> usize {
        self.bucket
    }

    /// The same element as a global position.
    #[inline]
    pub fn to_cursor(&self) -> Cursor {
        Cursor(self.node)
    }
}

impl PartialEq for LocalCursor {
    fn eq(&self, other: &Self) -> bool {
        self.node == other.node
    }
}

impl Eq for LocalCursor {}

/// Iterator over all elements in global list order.
pub struct Iter<'a, T> {
    pub(crate) chain: &'a Chain<T>,
    pub(crate) cur: Option<NodeKey>,
    pub(crate) remaining: usize,
}

impl<'a, T> Clone for Iter<'a, T> {
    fn clone(&self) -> Self {
        Self {
            chain: self.chain,
            cur: self.cur,
            remaining: self.remaining,
        }
    }
}

impl<'a, T> Iterator for Iter<'a, T> {
    type Item = &'a T;

    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        let chain = self.chain;
        let node = &chain.nodes[self.cur?];
        self.cur = node.next;
        self.remaining -= 1;
        Some(&node.value)
    }

    #[inline]
    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<'a, T> ExactSizeIterator for Iter<'a, T> {}
impl<'a, T> FusedIterator for Iter<'a, T> {}

/// Iterator over the elements of one bucket.
pub struct LocalIter<'a, T> {
    pub(crate) chain: &'a Chain<T>,
    pub(crate) cur: Option<NodeKey>,
    pub(crate) bucket: usize,
}

impl<'a, T> Iterator for LocalIter<'a, T> {
    type Item = &'a T;

    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        let chain = self.chain;
        let key = self.cur?;
        self.cur = chain.next_in_bucket(key, self.bucket, chain.bucket_count());
        Some(&chain.nodes[key].value)
    }
}

impl<'a, T> FusedIterator for LocalIter<'a, T> {}

/// Iterator over the half-open span `[first, last)` of the global list.
///
/// Stops at the end of the list if `last` is never reached.
pub struct Range<'a, T> {
    pub(crate) chain: &'a Chain<T>,
    pub(crate) cur: Option<NodeKey>,
    pub(crate) last: Option<NodeKey>,
}

impl<'a, T> Iterator for Range<'a, T> {
    type Item = &'a T;

    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        let chain = self.chain;
        let key = self.cur.filter(|&k| Some(k) != self.last)?;
        let node = chain.nodes.get(key)?;
        self.cur = node.next;
        Some(&node.value)
    }
}

impl<'a, T> FusedIterator for Range<'a, T> {}

/// Owning iterator in global list order.
pub struct IntoIter<T> {
    pub(crate) chain: Chain<T>,
    pub(crate) cur: Option<NodeKey>,
}

impl<T> Iterator for IntoIter<T> {
    type Item = T;

    fn next(&mut self) -> Option<T> {
        let node = self.chain.nodes.remove(self.cur?)?;
        self.cur = node.next;
        Some(node.value)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let n = self.chain.nodes.len();
        (n, Some(n))
    }
}

impl<T> ExactSizeIterator for IntoIter<T> {}
impl<T> FusedIterator for IntoIter<T> {}

impl<T> Chain<T> {
    #[inline]
    pub(crate) fn local_cursor(&self, node: Option<NodeKey>, bucket: usize) -> LocalCursor {
        LocalCursor {
            node,
            bucket,
            bucket_count: self.bucket_count(),
        }
    }

    /// Advance using the bucket count captured in `pos`, not the current one.
    pub(crate) fn advance_local(&self, pos: LocalCursor) -> LocalCursor {
        let node = pos
            .node
            .and_then(|k| self.nodes.get(k))
            .and_then(|n| n.next)
            .filter(|&n| bucket_index(self.nodes[n].hash, pos.bucket_count) == pos.bucket);
        LocalCursor { node, ..pos }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chain_of(hashes: &[u64], buckets: usize) -> Chain<u64> {
        let mut c = Chain::with_buckets(buckets);
        for &h in hashes {
            let k = c.allocate(h, h);
            c.thread(k, None);
        }
        c
    }

    /// Invariant: the global iterator visits every element once and reports
    /// an exact length.
    #[test]
    fn iter_is_exact_and_complete() {
        let c = chain_of(&[1, 2, 3, 4, 5], 3);
        let it = Iter {
            chain: &c,
            cur: c.head,
            remaining: c.len(),
        };
        assert_eq!(it.len(), 5);
        let mut seen: Vec<u64> = it.copied().collect();
        seen.sort_unstable();
        assert_eq!(seen, vec![1, 2, 3, 4, 5]);
    }

    /// Invariant: a local iterator stops at the first node of another bucket
    /// instead of at an explicit end marker.
    #[test]
    fn local_iter_is_bounded_by_bucket_membership() {
        let c = chain_of(&[0, 3, 6, 1, 4, 2], 3);
        for bucket in 0..3 {
            let got: Vec<u64> = LocalIter {
                chain: &c,
                cur: c.bucket_head(bucket),
                bucket,
            }
            .copied()
            .collect();
            assert_eq!(got.len(), 3 - bucket);
            assert!(got.iter().all(|h| (*h % 3) as usize == bucket));
        }
    }

    /// Invariant: local cursors compare by node only, and stepping off the
    /// bucket's last node reaches the bucket end.
    #[test]
    fn local_cursor_walks_to_bucket_end() {
        let c = chain_of(&[0, 2, 1], 2);
        let mut pos = c.local_cursor(c.bucket_head(0), 0);
        let end = c.local_cursor(None, 0);
        let mut steps = 0;
        while pos != end {
            steps += 1;
            pos = c.advance_local(pos);
        }
        assert_eq!(steps, 2);
        assert!(pos.is_end());
        assert_eq!(pos.bucket(), 0);
    }

    /// Invariant: the owning iterator yields everything and drops nothing twice.
    #[test]
    fn into_iter_drains_in_list_order() {
        let c = chain_of(&[7, 8, 9], 16);
        let order: Vec<u64> = {
            let mut v = Vec::new();
            let mut cur = c.head;
            while let Some(k) = cur {
                v.push(c.nodes[k].value);
                cur = c.nodes[k].next;
            }
            v
        };
        let head = c.head;
        let drained: Vec<u64> = IntoIter { chain: c, cur: head }.collect();
        assert_eq!(drained, order);
    }
}
