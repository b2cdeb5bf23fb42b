//! A persistent, versioned length tree.
//!
//! The tree is an immutable data structure with structural sharing: every
//! mutation produces a new version whose root is freshly built while all
//! untouched subtrees are reused by reference, so a rebind costs O(path
//! depth) regardless of tree size. Branch nodes carry the aggregate length
//! of their subtree, maintained on every rebind.
//!
//! On top of the versioned core sit two observability surfaces: a
//! per-subtree change history ([`history`]) answering "what changed under
//! this path, and when" without diffing whole versions, and a lazy
//! read-only iteration protocol ([`iter`]) that flattens a subtree into
//! serializable units while keeping raw byte-sequence leaves atomic.
//!
//! ```
//! use lentree::node::Node;
//! use lentree::path;
//! use lentree::tree::Head;
//!
//! let mut head = Head::new(Node::record([
//!     ("xs", Node::branch([Node::leaf(1u64), Node::leaf(2)])),
//! ]));
//! let before = head.current();
//! head.set(&path!["xs", 0], Node::leaf(10)).unwrap();
//!
//! assert_eq!(head.get(&path!["xs", 0]).unwrap().as_scalar(), Some(&10));
//! // Prior versions are unaffected.
//! assert_eq!(before.get(&path!["xs", 0]).unwrap().as_scalar(), Some(&1));
//! ```

pub mod history;
pub mod iter;
pub mod node;
pub mod path;
pub mod prelude;
pub mod tree;
