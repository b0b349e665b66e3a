//! Chain: node arena, global list and bucket index.
//!
//! Every live node sits on one list that starts at the `BeforeBegin`
//! sentinel. Nodes of one bucket form a single contiguous run, and the
//! bucket index stores, per bucket, the position that immediately
//! precedes that run. Operations here only look at cached hashes, so
//! they never call into user `Hash`/`Eq` code.

use crate::node::{Anchor, Node, NodeKey};
use slotmap::SlotMap;

#[inline]
pub(crate) fn bucket_index(hash: u64, bucket_count: usize) -> usize {
    debug_assert!(bucket_count > 0);
    (hash % bucket_count as u64) as usize
}

#[derive(Clone, Debug)]
pub(crate) struct Chain<T> {
    pub(crate) nodes: SlotMap<NodeKey, Node<T>>,
    pub(crate) head: Option<NodeKey>,
    pub(crate) buckets: Vec<Option<Anchor>>,
}

impl<T> Chain<T> {
    pub(crate) fn with_buckets(bucket_count: usize) -> Self {
        Self {
            nodes: SlotMap::with_key(),
            head: None,
            buckets: vec![None; bucket_count.max(1)],
        }
    }

    #[inline]
    pub(crate) fn len(&self) -> usize {
        self.nodes.len()
    }

    #[inline]
    pub(crate) fn bucket_count(&self) -> usize {
        self.buckets.len()
    }

    #[inline]
    pub(crate) fn bucket_for(&self, hash: u64) -> usize {
        bucket_index(hash, self.buckets.len())
    }

    #[inline]
    pub(crate) fn node_bucket(&self, key: NodeKey) -> usize {
        self.bucket_for(self.nodes[key].hash)
    }

    #[inline]
    pub(crate) fn next_of(&self, anchor: Anchor) -> Option<NodeKey> {
        match anchor {
            Anchor::BeforeBegin => self.head,
            Anchor::After(key) => self.nodes[key].next,
        }
    }

    #[inline]
    fn set_next(&mut self, anchor: Anchor, next: Option<NodeKey>) {
        match anchor {
            Anchor::BeforeBegin => self.head = next,
            Anchor::After(key) => self.nodes[key].next = next,
        }
    }

    /// First node of bucket `bucket`, if the bucket is non-empty.
    #[inline]
    pub(crate) fn bucket_head(&self, bucket: usize) -> Option<NodeKey> {
        self.buckets[bucket].and_then(|anchor| self.next_of(anchor))
    }

    /// Successor of `key` provided it still belongs to `bucket` under
    /// `bucket_count` buckets.
    #[inline]
    pub(crate) fn next_in_bucket(
        &self,
        key: NodeKey,
        bucket: usize,
        bucket_count: usize,
    ) -> Option<NodeKey> {
        self.nodes[key]
            .next
            .filter(|&n| bucket_index(self.nodes[n].hash, bucket_count) == bucket)
    }

    pub(crate) fn allocate(&mut self, hash: u64, value: T) -> NodeKey {
        self.nodes.insert(Node::detached(hash, value))
    }

    /// Splice `key` in right after `after`.
    ///
    /// When the new successor starts a different bucket, that bucket's
    /// anchor pointed at `after` and is moved to `key`.
    fn link_after(&mut self, after: Anchor, key: NodeKey) {
        let next = self.next_of(after);
        {
            let node = &mut self.nodes[key];
            node.next = next;
            node.prev = after;
        }
        self.set_next(after, Some(key));
        if let Some(next) = next {
            self.nodes[next].prev = Anchor::After(key);
            let next_bucket = self.node_bucket(next);
            if next_bucket != self.node_bucket(key) {
                self.buckets[next_bucket] = Some(Anchor::After(key));
            }
        }
    }

    /// Thread a detached node into the list.
    ///
    /// With `after` set, the node goes right behind that node, which must
    /// be in the same bucket. Otherwise it becomes the first node of its
    /// bucket, or the global head when the bucket was empty.
    pub(crate) fn thread(&mut self, key: NodeKey, after: Option<NodeKey>) {
        let bucket = self.node_bucket(key);
        match (after, self.buckets[bucket]) {
            (Some(run_tail), _) => {
                debug_assert_eq!(self.node_bucket(run_tail), bucket);
                self.link_after(Anchor::After(run_tail), key);
            }
            (None, Some(anchor)) => self.link_after(anchor, key),
            (None, None) => {
                self.link_after(Anchor::BeforeBegin, key);
                self.buckets[bucket] = Some(Anchor::BeforeBegin);
            }
        }
    }

    /// Take `key` off the list and out of the arena.
    pub(crate) fn unlink(&mut self, key: NodeKey) -> Option<Node<T>> {
        let node = self.nodes.remove(key)?;
        let bucket = self.bucket_for(node.hash);
        let next_bucket = node.next.map(|n| self.node_bucket(n));

        if next_bucket != Some(bucket) {
            // `key` closed its bucket's run.
            if self.buckets[bucket] == Some(node.prev) {
                self.buckets[bucket] = None;
            }
            if let Some(next_bucket) = next_bucket {
                self.buckets[next_bucket] = Some(node.prev);
            }
        }

        self.set_next(node.prev, node.next);
        if let Some(next) = node.next {
            self.nodes[next].prev = node.prev;
        }
        Some(node)
    }

    /// Replace the bucket index with `buckets` (all empty) and replay the
    /// current list into it in its existing order.
    ///
    /// Runs of equal keys are adjacent in the old list and share a hash,
    /// so they stay adjacent in the new one. A node that followed a node
    /// of the same new bucket is threaded right behind it, which keeps
    /// the relative order of equal keys.
    pub(crate) fn rethread(&mut self, buckets: Vec<Option<Anchor>>) {
        debug_assert!(!buckets.is_empty());
        debug_assert!(buckets.iter().all(Option::is_none));
        self.buckets = buckets;
        let mut cur = self.head.take();
        let mut prev: Option<NodeKey> = None;
        while let Some(key) = cur {
            cur = self.nodes[key].next;
            let after = prev.filter(|&p| self.node_bucket(p) == self.node_bucket(key));
            self.thread(key, after);
            prev = Some(key);
        }
    }

    pub(crate) fn clear(&mut self) {
        self.nodes.clear();
        self.head = None;
        self.buckets.fill(None);
    }

    /// Walk the whole structure and report the first broken invariant.
    #[cfg(test)]
    pub(crate) fn check(&self) -> Result<(), String> {
        use std::collections::HashSet;

        let mut prev = Anchor::BeforeBegin;
        let mut cur = self.head;
        let mut visited = 0usize;
        let mut closed: HashSet<usize> = HashSet::new();
        let mut run: Option<usize> = None;

        while let Some(key) = cur {
            visited += 1;
            if visited > self.nodes.len() {
                return Err("cycle in global list".into());
            }
            let node = self
                .nodes
                .get(key)
                .ok_or_else(|| "list reaches a freed node".to_string())?;
            if node.prev != prev {
                return Err(format!("stale back link at node #{visited}"));
            }
            let bucket = self.bucket_for(node.hash);
            if run != Some(bucket) {
                if let Some(done) = run {
                    closed.insert(done);
                }
                if closed.contains(&bucket) {
                    return Err(format!("bucket {bucket} is split in the list"));
                }
                if self.buckets[bucket] != Some(prev) {
                    return Err(format!("bucket {bucket} anchor does not precede its run"));
                }
                run = Some(bucket);
            }
            prev = Anchor::After(key);
            cur = node.next;
        }
        if let Some(done) = run {
            closed.insert(done);
        }
        if visited != self.nodes.len() {
            return Err(format!(
                "list holds {visited} nodes, arena holds {}",
                self.nodes.len()
            ));
        }
        for (bucket, anchor) in self.buckets.iter().enumerate() {
            if anchor.is_some() != closed.contains(&bucket) {
                return Err(format!("bucket {bucket} anchor disagrees with occupancy"));
            }
        }
        Ok(())
    }
}
