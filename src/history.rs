//! Per-subtree change history.
//!
//! Every successful mutation records exactly one entry at the exact path it
//! touched. Entries at one path form a strictly ordered chain: each entry
//! links to the version produced by the previous mutation of that path, and
//! the chain bottoms out with `prior == None` where recording started.
//! Ancestor-level ("subtree changelog") queries are derived on demand by
//! merging the chains of every recorded path under a prefix, so recording
//! stays O(1) per mutation.
//!
//! Entries carry a [`ValueSummary`] of the replaced node, not the node
//! itself. History never pins node graphs; a version's nodes are freed as
//! soon as no snapshot references them.

use std::collections::HashMap;

use itertools::Itertools;

use crate::node::Node;
use crate::path::Path;
use crate::tree::VersionId;

/// A lightweight description of a replaced value.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ValueSummary<T> {
    Scalar(T),
    Bytes { len: u64 },
    Branch { len: u64, children: usize },
}

impl<T: Clone> ValueSummary<T> {
    pub(crate) fn of(node: &Node<T>) -> Self {
        match node {
            Node::Leaf { value } => ValueSummary::Scalar(value.clone()),
            Node::Bytes { bytes } => ValueSummary::Bytes {
                len: bytes.len() as u64,
            },
            Node::Branch(branch) => ValueSummary::Branch {
                len: branch.length(),
                children: branch.children().len(),
            },
        }
    }
}

/// One recorded mutation: the version it produced, the version the previous
/// mutation of the same path produced (if any), the mutated path, and a
/// summary of the value that was replaced.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HistoryEntry<T> {
    pub version: VersionId,
    pub prior: Option<VersionId>,
    pub path: Path,
    pub old: ValueSummary<T>,
}

/// Append-only per-path chains of [`HistoryEntry`].
#[derive(Clone, Debug, Default)]
pub struct HistoryLog<T> {
    chains: HashMap<Path, Vec<HistoryEntry<T>>>,
}

impl<T> HistoryLog<T> {
    pub fn new() -> Self {
        Self {
            chains: HashMap::new(),
        }
    }

    /// Appends an entry for a mutation of `path` that produced `version`.
    /// O(1) amortized.
    pub(crate) fn record(&mut self, version: VersionId, path: Path, old: ValueSummary<T>) {
        let chain = self.chains.entry(path.clone()).or_default();
        let prior = chain.last().map(|entry| entry.version);
        chain.push(HistoryEntry {
            version,
            prior,
            path,
            old,
        });
    }

    /// The chain of mutations recorded at exactly `path`, most recent
    /// first. Lazy, finite, and restartable; a path with no recorded
    /// mutations yields an empty sequence, never an error.
    pub fn history<'a>(&'a self, path: &Path) -> impl Iterator<Item = &'a HistoryEntry<T>> + 'a {
        self.chains
            .get(path)
            .into_iter()
            .flat_map(|chain| chain.iter().rev())
    }

    /// The subtree changelog: all mutations recorded at or below `prefix`,
    /// merged most recent first across the per-path chains.
    pub fn history_under<'a>(
        &'a self,
        prefix: &'a Path,
    ) -> impl Iterator<Item = &'a HistoryEntry<T>> + 'a {
        self.chains
            .iter()
            .filter(move |(path, _)| path.starts_with(prefix))
            .map(|(_, chain)| chain.iter().rev())
            .kmerge_by(|a, b| a.version > b.version)
    }

    /// Total number of recorded entries.
    pub fn len(&self) -> usize {
        self.chains.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.chains.is_empty()
    }
}
