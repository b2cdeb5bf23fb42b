//! Re-exports of the commonly used types and functions, intended to be
//! glob imported as `use lentree::prelude::*;`.

pub use crate::history::{HistoryEntry, HistoryLog, ValueSummary};
pub use crate::iter::{from_units, readonly_iter, ReadonlyIter, ReassembleError, Unit};
pub use crate::node::{Branch, Labels, Node, NodeHandle};
pub use crate::path::{resolve, Path, PathError, PathSeg, View};
pub use crate::tree::{Head, Tree, VersionId};

pub use anybytes::Bytes;
