//! Paths, path resolution, and the resolved [`View`].
//!
//! A [`Path`] is an ordered sequence of segments, each either a field key or
//! a child index. Resolution walks the segments from a root node and either
//! lands on a node or fails with a typed [`PathError`] carrying the longest
//! prefix that did resolve.
//!
//! Resolution produces a [`View`]: the addressed node together with the
//! chain of parents descended through. The node graph itself stores no
//! parent pointers, so nodes stay freely shareable between versions and a
//! mutation never has to touch the back-references of unrelated nodes; the
//! parent relation exists only in the view that navigated there.

use std::fmt;

use crate::node::NodeHandle;

/// One step of a path: a field key into a record branch or an index into
/// any branch.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum PathSeg {
    Key(String),
    Index(usize),
}

impl From<&str> for PathSeg {
    fn from(key: &str) -> Self {
        PathSeg::Key(key.to_owned())
    }
}

impl From<String> for PathSeg {
    fn from(key: String) -> Self {
        PathSeg::Key(key)
    }
}

impl From<usize> for PathSeg {
    fn from(index: usize) -> Self {
        PathSeg::Index(index)
    }
}

impl fmt::Display for PathSeg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathSeg::Key(key) => write!(f, "{key}"),
            PathSeg::Index(index) => write!(f, "{index}"),
        }
    }
}

/// An ordered sequence of segments addressing a node from a root.
///
/// Paths are only stable across versions to the extent the addressed
/// structure is unchanged; resolving against a version that lacks the
/// structure fails.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct Path(Vec<PathSeg>);

impl Path {
    /// The empty path, addressing the root unconditionally.
    pub fn root() -> Self {
        Path(Vec::new())
    }

    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn segments(&self) -> &[PathSeg] {
        &self.0
    }

    /// The first `n` segments as an owned path.
    pub fn prefix(&self, n: usize) -> Path {
        Path(self.0[..n].to_vec())
    }

    /// The path of the enclosing node, or `None` at the root.
    pub fn parent(&self) -> Option<Path> {
        if self.0.is_empty() {
            return None;
        }
        Some(Path(self.0[..self.0.len() - 1].to_vec()))
    }

    /// This path extended by one segment.
    pub fn child(&self, seg: impl Into<PathSeg>) -> Path {
        let mut segs = self.0.clone();
        segs.push(seg.into());
        Path(segs)
    }

    /// Whether `prefix` is a (non-strict) prefix of this path.
    pub fn starts_with(&self, prefix: &Path) -> bool {
        self.0.len() >= prefix.0.len() && self.0[..prefix.0.len()] == prefix.0[..]
    }
}

impl FromIterator<PathSeg> for Path {
    fn from_iter<I: IntoIterator<Item = PathSeg>>(iter: I) -> Self {
        Path(iter.into_iter().collect())
    }
}

impl<S: Into<PathSeg>, const N: usize> From<[S; N]> for Path {
    fn from(segs: [S; N]) -> Self {
        Path(segs.into_iter().map(Into::into).collect())
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return write!(f, "/");
        }
        for seg in &self.0 {
            write!(f, "/{seg}")?;
        }
        Ok(())
    }
}

/// Builds a [`Path`] from a mixed list of keys and indices.
///
/// ```
/// use lentree::path;
///
/// let p = path!["users", 3, "name"];
/// assert_eq!(p.to_string(), "/users/3/name");
/// ```
#[macro_export]
macro_rules! path {
    () => { $crate::path::Path::root() };
    ($($seg:expr),+ $(,)?) => {
        [$($crate::path::PathSeg::from($seg)),+]
            .into_iter()
            .collect::<$crate::path::Path>()
    };
}

/// Failure modes of path resolution. Both variants carry the longest
/// prefix that did resolve, for diagnostics.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PathError {
    /// A segment does not exist at the branch it was applied to.
    NotFound { resolved: Path },
    /// The path continues past a scalar or byte-sequence leaf.
    NotTraversable { resolved: Path },
}

impl fmt::Display for PathError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathError::NotFound { resolved } => {
                write!(f, "path segment not found after {resolved}")
            }
            PathError::NotTraversable { resolved } => {
                write!(f, "cannot traverse past the leaf at {resolved}")
            }
        }
    }
}

impl std::error::Error for PathError {}

/// A resolved node together with its back-reference chain.
///
/// The chain records, root-first, each parent node and the segment taken
/// out of it. It is held by the view rather than the nodes, following the
/// rule that back-references are navigation state, never ownership: the
/// same node shared into another version has a different parent there.
pub struct View<T> {
    node: NodeHandle<T>,
    trail: Vec<(NodeHandle<T>, PathSeg)>,
}

impl<T> View<T> {
    /// The addressed node.
    pub fn node(&self) -> &NodeHandle<T> {
        &self.node
    }

    /// True iff the back-reference chain is absent, i.e. the view addresses
    /// the root it was resolved from. O(1).
    pub fn is_root(&self) -> bool {
        self.trail.is_empty()
    }

    /// Number of segments descended from the root.
    pub fn depth(&self) -> usize {
        self.trail.len()
    }

    /// Reconstructs the path this view was resolved along.
    pub fn path(&self) -> Path {
        self.trail.iter().map(|(_, seg)| seg.clone()).collect()
    }

    /// Steps up to the enclosing node, or `None` at the root.
    pub fn parent(mut self) -> Option<View<T>> {
        let (node, _) = self.trail.pop()?;
        Some(View {
            node,
            trail: self.trail,
        })
    }
}

impl<T: fmt::Debug> fmt::Debug for View<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("View")
            .field("path", &format_args!("{}", self.path()))
            .field("node", self.node())
            .finish()
    }
}

/// Resolves `path` from `root`, walking segment by segment.
///
/// The empty path resolves to `root` unconditionally, including when the
/// root is a leaf. Read-only: O(depth) work, no allocation beyond the
/// returned trail, safe to call from any number of concurrent readers on
/// the same version.
pub fn resolve<T>(root: &NodeHandle<T>, path: &Path) -> Result<View<T>, PathError> {
    let mut trail = Vec::with_capacity(path.len());
    let mut node = root.clone();
    for (at, seg) in path.segments().iter().enumerate() {
        let Some(branch) = node.as_branch() else {
            return Err(PathError::NotTraversable {
                resolved: path.prefix(at),
            });
        };
        let Some(pos) = branch.position(seg) else {
            return Err(PathError::NotFound {
                resolved: path.prefix(at),
            });
        };
        let child = branch.children()[pos].clone();
        trail.push((node, seg.clone()));
        node = child;
    }
    Ok(View { node, trail })
}
