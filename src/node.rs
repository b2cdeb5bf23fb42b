//! The immutable node representation of the length tree.
//!
//! A node is either a scalar leaf, an atomic byte-sequence leaf, or a branch
//! holding an ordered sequence of children. Nodes are never mutated after
//! construction; every "change" builds a fresh node and shares the untouched
//! children by reference. All sharing goes through [`NodeHandle`], a plain
//! `Arc`, so a node is freed exactly when the last tree version (or caller)
//! referencing it goes away.
//!
//! Every node carries an aggregate `length`: a scalar leaf counts 1, a byte
//! leaf counts its bytes, and a branch the sum of its children. The sum is
//! computed once at construction from the children's already-known lengths,
//! so building a branch is O(direct children), not O(subtree).
//!
//! Byte leaves wrap [`anybytes::Bytes`] and are atomic: the traversal and
//! length machinery never treats them as a sequence of sub-elements, even
//! though the payload is indexable.

use std::fmt;
use std::fmt::Debug;
use std::sync::Arc;

use crate::path::PathSeg;

pub use anybytes::Bytes;

/// Shared handle to an immutable node.
pub type NodeHandle<T> = Arc<Node<T>>;

/// Field labels of a record-shaped branch, in child order.
pub type Labels = Arc<[String]>;

/// An immutable tree node with scalar payload type `T`.
pub enum Node<T> {
    /// A scalar leaf, `length == 1`.
    Leaf { value: T },
    /// An atomic byte-sequence leaf, `length == byte count`.
    Bytes { bytes: Bytes },
    /// An ordered sequence of children, `length == sum of child lengths`.
    Branch(Branch<T>),
}

/// The branch body: ordered children, optional field labels, and the
/// aggregate length fixed at construction.
pub struct Branch<T> {
    children: Vec<NodeHandle<T>>,
    labels: Option<Labels>,
    length: u64,
}

impl<T> Branch<T> {
    pub(crate) fn new(children: Vec<NodeHandle<T>>, labels: Option<Labels>) -> Self {
        debug_assert!(labels
            .as_ref()
            .map(|l| l.len() == children.len())
            .unwrap_or(true));
        let length = children.iter().map(|c| c.length()).sum();
        Self {
            children,
            labels,
            length,
        }
    }

    /// The children in stored order.
    pub fn children(&self) -> &[NodeHandle<T>] {
        &self.children
    }

    /// Field labels, present iff this branch was built as a record.
    pub fn labels(&self) -> Option<&Labels> {
        self.labels.as_ref()
    }

    /// Aggregate length of the subtree below this branch.
    pub fn length(&self) -> u64 {
        self.length
    }

    /// Child position addressed by `seg`, if any. Indices address any
    /// branch; keys only address labeled branches.
    pub fn position(&self, seg: &PathSeg) -> Option<usize> {
        match seg {
            PathSeg::Index(i) => (*i < self.children.len()).then_some(*i),
            PathSeg::Key(k) => self
                .labels
                .as_ref()?
                .iter()
                .position(|label| label == k),
        }
    }

    /// A copy of this branch with the child at `at` swapped out. The length
    /// is adjusted from the old and new child lengths; siblings are reused
    /// by reference.
    pub(crate) fn with_child(&self, at: usize, child: NodeHandle<T>) -> Self {
        let mut children = self.children.clone();
        let length = self.length - children[at].length() + child.length();
        children[at] = child;
        Self {
            children,
            labels: self.labels.clone(),
            length,
        }
    }

    /// A copy of this branch with `child` appended. Sequence branches only.
    pub(crate) fn with_appended(&self, child: NodeHandle<T>) -> Self {
        debug_assert!(self.labels.is_none());
        let length = self.length + child.length();
        let mut children = self.children.clone();
        children.push(child);
        Self {
            children,
            labels: None,
            length,
        }
    }

    /// A copy of this record branch with the field `key` set to `child`,
    /// replacing an existing field of that name or appending a new one.
    pub(crate) fn with_field(&self, key: &str, child: NodeHandle<T>) -> Self {
        let labels = self.labels.as_deref().unwrap_or(&[]);
        if let Some(at) = labels.iter().position(|label| label == key) {
            return self.with_child(at, child);
        }
        let mut new_labels: Vec<String> = labels.to_vec();
        new_labels.push(key.to_owned());
        let length = self.length + child.length();
        let mut children = self.children.clone();
        children.push(child);
        Self {
            children,
            labels: Some(new_labels.into()),
            length,
        }
    }
}

impl<T> Node<T> {
    /// Constructs a scalar leaf.
    pub fn leaf(value: T) -> NodeHandle<T> {
        Arc::new(Node::Leaf { value })
    }

    /// Constructs an atomic byte-sequence leaf.
    pub fn bytes(bytes: Bytes) -> NodeHandle<T> {
        Arc::new(Node::Bytes { bytes })
    }

    /// Constructs a sequence branch. An empty child sequence is legal and
    /// has `length == 0`.
    pub fn branch(children: impl IntoIterator<Item = NodeHandle<T>>) -> NodeHandle<T> {
        Arc::new(Node::Branch(Branch::new(children.into_iter().collect(), None)))
    }

    /// Constructs a record branch: an ordered branch whose children are
    /// addressable by field label as well as by index.
    pub fn record<K, I>(fields: I) -> NodeHandle<T>
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, NodeHandle<T>)>,
    {
        let (labels, children): (Vec<String>, Vec<NodeHandle<T>>) = fields
            .into_iter()
            .map(|(k, c)| (k.into(), c))
            .unzip();
        Arc::new(Node::Branch(Branch::new(children, Some(labels.into()))))
    }

    pub(crate) fn from_branch(branch: Branch<T>) -> NodeHandle<T> {
        Arc::new(Node::Branch(branch))
    }

    /// Aggregate length of the subtree rooted here.
    pub fn length(&self) -> u64 {
        match self {
            Node::Leaf { .. } => 1,
            Node::Bytes { bytes } => bytes.len() as u64,
            Node::Branch(branch) => branch.length,
        }
    }

    pub fn is_branch(&self) -> bool {
        matches!(self, Node::Branch(_))
    }

    /// The branch body, if this node is a branch.
    pub fn as_branch(&self) -> Option<&Branch<T>> {
        match self {
            Node::Branch(branch) => Some(branch),
            _ => None,
        }
    }

    /// The scalar payload, if this node is a scalar leaf.
    pub fn as_scalar(&self) -> Option<&T> {
        match self {
            Node::Leaf { value } => Some(value),
            _ => None,
        }
    }

    /// The byte payload, if this node is a byte-sequence leaf.
    pub fn as_bytes(&self) -> Option<&Bytes> {
        match self {
            Node::Bytes { bytes } => Some(bytes),
            _ => None,
        }
    }
}

impl<T: PartialEq> PartialEq for Node<T> {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Node::Leaf { value: a }, Node::Leaf { value: b }) => a == b,
            (Node::Bytes { bytes: a }, Node::Bytes { bytes: b }) => a == b,
            (Node::Branch(a), Node::Branch(b)) => {
                a.labels == b.labels && a.children == b.children
            }
            _ => false,
        }
    }
}

impl<T: Eq> Eq for Node<T> {}

impl<T: Debug> Debug for Node<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Node::Leaf { value } => write!(f, "leaf({value:?})"),
            Node::Bytes { bytes } => write!(f, "bytes({})", hex::encode(&bytes[..])),
            Node::Branch(branch) => match &branch.labels {
                None => f.debug_list().entries(branch.children.iter()).finish(),
                Some(labels) => f
                    .debug_map()
                    .entries(labels.iter().zip(branch.children.iter()))
                    .finish(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn leaf_lengths() {
        assert_eq!(Node::leaf(42u64).length(), 1);
        let bytes = Bytes::from_source(vec![1u8, 2, 3]);
        assert_eq!(Node::<u64>::bytes(bytes).length(), 3);
    }

    #[test]
    fn branch_length_is_child_sum() {
        let branch = Node::branch([
            Node::leaf(1u64),
            Node::bytes(Bytes::from_source(vec![0u8; 5])),
            Node::branch([Node::leaf(2), Node::leaf(3)]),
        ]);
        assert_eq!(branch.length(), 1 + 5 + 2);
    }

    #[test]
    fn empty_branch_is_legal() {
        let empty = Node::<u64>::branch([]);
        assert_eq!(empty.length(), 0);
        assert!(empty.is_branch());
    }

    #[test]
    fn record_addressable_by_key_and_index() {
        let record = Node::record([("x", Node::leaf(1u64)), ("y", Node::leaf(2))]);
        let branch = record.as_branch().unwrap();
        assert_eq!(branch.position(&PathSeg::Key("y".into())), Some(1));
        assert_eq!(branch.position(&PathSeg::Index(0)), Some(0));
        assert_eq!(branch.position(&PathSeg::Key("z".into())), None);
        assert_eq!(branch.position(&PathSeg::Index(2)), None);
    }

    #[test]
    fn sequence_branch_rejects_keys() {
        let branch = Node::branch([Node::leaf(1u64)]);
        let branch = branch.as_branch().unwrap();
        assert_eq!(branch.position(&PathSeg::Key("x".into())), None);
    }

    #[test]
    fn structural_equality() {
        let a = Node::branch([Node::leaf(1u64), Node::leaf(2)]);
        let b = Node::branch([Node::leaf(1u64), Node::leaf(2)]);
        let c = Node::record([("a", Node::leaf(1u64)), ("b", Node::leaf(2))]);
        assert_eq!(a, b);
        assert_ne!(a, c);
    }
}
