//! The read-only serialization iterator and its inverse.
//!
//! [`readonly_iter`] flattens a node into a lazy stream of [`Unit`]s for an
//! external serialization layer: branches emit `Begin … End` around their
//! flattened children (the `Begin` marker carries the child count and any
//! field labels, so both count-prefixed and delimited encodings can consume
//! the stream), scalar leaves emit themselves.
//!
//! Byte-sequence leaves are emitted as exactly one [`Unit::Bytes`]. A byte
//! leaf is an atomic payload that merely happens to be indexable; expanding
//! it into per-byte scalars would be a misclassification, and the unit
//! stream makes that impossible by carrying the payload whole.
//!
//! The traversal is pull-based with an explicit stack: units are produced
//! on demand, consumers may stop early, and because nodes are immutable a
//! second call over the same node yields an equivalent fresh stream.

use std::fmt;

use crate::node::{Branch, Bytes, Labels, Node, NodeHandle};

/// One unit of the flattened stream.
#[derive(Clone, Debug, PartialEq)]
pub enum Unit<T> {
    /// Opens a branch of `count` children; `labels` is present for record
    /// branches so their shape survives serialization.
    Begin {
        count: usize,
        labels: Option<Labels>,
    },
    /// Closes the most recently opened branch.
    End,
    /// A scalar leaf.
    Scalar(T),
    /// An atomic byte-sequence leaf, intact.
    Bytes(Bytes),
}

enum Frame<T> {
    Visit(NodeHandle<T>),
    Close,
}

/// Lazy depth-first traversal over an immutable node. See [`readonly_iter`].
pub struct ReadonlyIter<T> {
    stack: Vec<Frame<T>>,
}

/// Flattens `node` into a lazy stream of [`Unit`]s.
///
/// Depth-first, children in stored order, finite, and infallible. Calling
/// again on the same node restarts an equivalent stream.
pub fn readonly_iter<T: Clone>(node: &NodeHandle<T>) -> ReadonlyIter<T> {
    ReadonlyIter {
        stack: vec![Frame::Visit(node.clone())],
    }
}

impl<T: Clone> Iterator for ReadonlyIter<T> {
    type Item = Unit<T>;

    fn next(&mut self) -> Option<Unit<T>> {
        match self.stack.pop()? {
            Frame::Close => Some(Unit::End),
            Frame::Visit(node) => match &*node {
                Node::Leaf { value } => Some(Unit::Scalar(value.clone())),
                Node::Bytes { bytes } => Some(Unit::Bytes(bytes.clone())),
                Node::Branch(branch) => {
                    self.stack.push(Frame::Close);
                    for child in branch.children().iter().rev() {
                        self.stack.push(Frame::Visit(child.clone()));
                    }
                    Some(Unit::Begin {
                        count: branch.children().len(),
                        labels: branch.labels().cloned(),
                    })
                }
            },
        }
    }
}

/// Failure modes of [`from_units`]. Streams produced by [`readonly_iter`]
/// never trigger any of these.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ReassembleError {
    /// The stream ended before a complete value was assembled.
    UnexpectedEnd,
    /// An `End` arrived with no open branch.
    UnbalancedEnd,
    /// A branch closed with a different number of children than its
    /// `Begin` marker declared.
    CountMismatch { expected: usize, actual: usize },
    /// Units remained after the root value was complete.
    TrailingUnits,
}

impl fmt::Display for ReassembleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReassembleError::UnexpectedEnd => {
                write!(f, "unit stream ended before a complete value")
            }
            ReassembleError::UnbalancedEnd => write!(f, "end marker without an open branch"),
            ReassembleError::CountMismatch { expected, actual } => {
                write!(f, "branch declared {expected} children but closed with {actual}")
            }
            ReassembleError::TrailingUnits => {
                write!(f, "units remain after the value was complete")
            }
        }
    }
}

impl std::error::Error for ReassembleError {}

struct Open<T> {
    count: usize,
    labels: Option<Labels>,
    children: Vec<NodeHandle<T>>,
}

/// Rebuilds a node from a unit stream; the inverse of [`readonly_iter`].
pub fn from_units<T, I>(units: I) -> Result<NodeHandle<T>, ReassembleError>
where
    I: IntoIterator<Item = Unit<T>>,
{
    let mut units = units.into_iter();
    let mut open: Vec<Open<T>> = Vec::new();
    while let Some(unit) = units.next() {
        let node = match unit {
            Unit::Scalar(value) => Node::leaf(value),
            Unit::Bytes(bytes) => Node::bytes(bytes),
            Unit::Begin { count, labels } => {
                // The declared count is untrusted until `End` confirms it;
                // growing the vec as children arrive keeps a lying marker
                // from forcing an allocation.
                open.push(Open {
                    count,
                    labels,
                    children: Vec::new(),
                });
                continue;
            }
            Unit::End => {
                let frame = open.pop().ok_or(ReassembleError::UnbalancedEnd)?;
                if frame.children.len() != frame.count {
                    return Err(ReassembleError::CountMismatch {
                        expected: frame.count,
                        actual: frame.children.len(),
                    });
                }
                Node::from_branch(Branch::new(frame.children, frame.labels))
            }
        };
        match open.last_mut() {
            Some(parent) => parent.children.push(node),
            None => {
                return if units.next().is_some() {
                    Err(ReassembleError::TrailingUnits)
                } else {
                    Ok(node)
                };
            }
        }
    }
    Err(ReassembleError::UnexpectedEnd)
}
