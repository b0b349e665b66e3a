//! Arena records threaded into the global list.

slotmap::new_key_type! {
    /// Generational index of a node in the table's arena.
    pub struct NodeKey;
}

/// The list position a node or bucket hangs off.
///
/// `BeforeBegin` is the sentinel that precedes the first element of the
/// global list; it is not a real node and carries no hash.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub(crate) enum Anchor {
    BeforeBegin,
    After(NodeKey),
}

#[derive(Clone, Debug)]
pub(crate) struct Node<T> {
    pub(crate) next: Option<NodeKey>,
    // Back link for O(1) unlinking; buckets still anchor on predecessors.
    pub(crate) prev: Anchor,
    pub(crate) hash: u64,
    pub(crate) value: T,
}

impl<T> Node<T> {
    pub(crate) fn detached(hash: u64, value: T) -> Self {
        Self {
            next: None,
            prev: Anchor::BeforeBegin,
            hash,
            value,
        }
    }
}
