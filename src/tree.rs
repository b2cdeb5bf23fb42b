//! Tree versions, the rebinding mutation engine, and the [`Head`] handle.
//!
//! A [`Tree`] is an immutable snapshot: a root node plus a version id. It is
//! never mutated in place; every mutation builds a new root that shares all
//! untouched subtrees with its predecessor. Snapshots are a pointer and an
//! id, so cloning one is cheap and any number of readers can work on the
//! same snapshot without coordination.
//!
//! [`Head`] is the single rebindable "current version" handle. It owns the
//! version counter and the history log, mirroring how a workspace owns the
//! mutable tip of a branch while commits themselves stay immutable. Readers
//! obtain snapshots by value, so a reader can never observe a partially
//! installed version; sharing the head itself across threads is the
//! caller's coordination problem.

use crate::history::{HistoryEntry, HistoryLog, ValueSummary};
use crate::node::{Node, NodeHandle};
use crate::path::{resolve, Path, PathError, View};

/// Identifier of a tree version. Ordered by creation within one [`Head`].
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct VersionId(pub u64);

impl VersionId {
    fn next(self) -> VersionId {
        VersionId(self.0 + 1)
    }
}

impl std::fmt::Display for VersionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "v{}", self.0)
    }
}

/// An immutable tree version: a root node and a version id.
///
/// A `Tree` is purely structural: its [`set`](Tree::set) rebinds without
/// recording anything, and history exists only for mutations driven
/// through a [`Head`], which also owns the version counter. Ids minted by
/// snapshot-level `set` are scoped to that snapshot's lineage and may
/// repeat across divergent snapshots.
#[derive(Debug)]
pub struct Tree<T> {
    root: NodeHandle<T>,
    version: VersionId,
}

impl<T> Clone for Tree<T> {
    fn clone(&self) -> Self {
        Self {
            root: self.root.clone(),
            version: self.version,
        }
    }
}

impl<T> Tree<T> {
    /// Wraps `root` as version 0.
    pub fn new(root: NodeHandle<T>) -> Self {
        Self {
            root,
            version: VersionId(0),
        }
    }

    pub fn root(&self) -> &NodeHandle<T> {
        &self.root
    }

    pub fn version(&self) -> VersionId {
        self.version
    }

    /// Aggregate length of the whole tree.
    pub fn length(&self) -> u64 {
        self.root.length()
    }

    /// Resolves `path` against this version. See [`resolve`].
    pub fn resolve(&self, path: &Path) -> Result<View<T>, PathError> {
        resolve(&self.root, path)
    }

    /// Resolves `path` and returns the addressed node. Read-only; no
    /// version is created.
    pub fn get(&self, path: &Path) -> Result<NodeHandle<T>, PathError> {
        Ok(self.resolve(path)?.node().clone())
    }

    /// Produces a new version with the node at `path` replaced by `node`.
    ///
    /// Every ancestor along the path is rebuilt with its length updated;
    /// every subtree not on the root-to-path chain is reused by reference.
    /// O(path depth), independent of tree size. The path must exist:
    /// missing structure fails with the same errors as [`resolve`], and
    /// nothing is constructed on failure.
    ///
    /// The returned version id is `self.version + 1`, scoped to this
    /// snapshot's lineage: two forks of the same snapshot both yield the
    /// same id, and no history entry is recorded. Use [`Head::set`] when
    /// ids must be unique and mutations must appear in the changelog.
    pub fn set(&self, path: &Path, node: NodeHandle<T>) -> Result<Tree<T>, PathError> {
        let (root, _old) = rebind(&self.root, path, node)?;
        Ok(Tree {
            root,
            version: self.version.next(),
        })
    }
}

/// Replaces the node at `path` and rebuilds the spine above it.
///
/// Returns the new root together with the node that was replaced. Each
/// rebuilt ancestor gets its length adjusted from the old and new child
/// lengths alone, so the whole rebind is O(depth).
pub(crate) fn rebind<T>(
    root: &NodeHandle<T>,
    path: &Path,
    node: NodeHandle<T>,
) -> Result<(NodeHandle<T>, NodeHandle<T>), PathError> {
    let mut spine: Vec<(NodeHandle<T>, usize)> = Vec::with_capacity(path.len());
    let mut current = root.clone();
    for (at, seg) in path.segments().iter().enumerate() {
        let Some(branch) = current.as_branch() else {
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
        spine.push((current, pos));
        current = child;
    }
    let old = current;
    let mut rebuilt = node;
    for (parent, pos) in spine.into_iter().rev() {
        let Node::Branch(branch) = &*parent else {
            unreachable!("spine nodes are branches");
        };
        rebuilt = Node::from_branch(branch.with_child(pos, rebuilt));
    }
    Ok((rebuilt, old))
}

/// The rebindable handle to the latest version of a tree.
///
/// Owns the version counter and the [`HistoryLog`]; every successful
/// mutation installs a fresh snapshot and records one history entry at the
/// exact mutated path. Installing a version is a single assignment of a
/// snapshot value, with no intermediate state a reader could observe.
pub struct Head<T> {
    current: Tree<T>,
    log: HistoryLog<T>,
    counter: u64,
}

impl<T: Clone> Head<T> {
    /// Opens a head at version 0 with an empty history.
    pub fn new(root: NodeHandle<T>) -> Self {
        Self {
            current: Tree::new(root),
            log: HistoryLog::new(),
            counter: 0,
        }
    }

    /// A snapshot of the latest version.
    pub fn current(&self) -> Tree<T> {
        self.current.clone()
    }

    pub fn version(&self) -> VersionId {
        self.current.version
    }

    /// Resolves against the latest version.
    pub fn resolve(&self, path: &Path) -> Result<View<T>, PathError> {
        self.current.resolve(path)
    }

    /// Reads from the latest version.
    pub fn get(&self, path: &Path) -> Result<NodeHandle<T>, PathError> {
        self.current.get(path)
    }

    /// Replaces the node at `path`, installs the new version, and returns
    /// a snapshot of it. The path must already exist; missing structure
    /// fails with the [`resolve`] errors and leaves the head untouched.
    pub fn set(&mut self, path: &Path, node: NodeHandle<T>) -> Result<Tree<T>, PathError> {
        let (root, old) = rebind(&self.current.root, path, node)?;
        Ok(self.install(root, path.clone(), ValueSummary::of(&old)))
    }

    /// Appends `child` to the sequence branch at `path`. Fails
    /// `NotTraversable` when the target is a leaf or a record branch,
    /// since neither can be extended positionally.
    pub fn push(&mut self, path: &Path, child: NodeHandle<T>) -> Result<Tree<T>, PathError> {
        let target = self.current.get(path)?;
        let grown = match target.as_branch() {
            Some(branch) if branch.labels().is_none() => branch.with_appended(child),
            _ => {
                return Err(PathError::NotTraversable {
                    resolved: path.clone(),
                })
            }
        };
        let (root, old) = rebind(&self.current.root, path, Node::from_branch(grown))?;
        Ok(self.install(root, path.clone(), ValueSummary::of(&old)))
    }

    /// Sets the field `key` of the record branch at `path`, replacing an
    /// existing field of that name or appending a new one. Fails
    /// `NotTraversable` when the target is not a record branch.
    pub fn insert(
        &mut self,
        path: &Path,
        key: &str,
        child: NodeHandle<T>,
    ) -> Result<Tree<T>, PathError> {
        let target = self.current.get(path)?;
        let grown = match target.as_branch() {
            Some(branch) if branch.labels().is_some() => branch.with_field(key, child),
            _ => {
                return Err(PathError::NotTraversable {
                    resolved: path.clone(),
                })
            }
        };
        let (root, old) = rebind(&self.current.root, path, Node::from_branch(grown))?;
        Ok(self.install(root, path.clone(), ValueSummary::of(&old)))
    }

    fn install(&mut self, root: NodeHandle<T>, path: Path, old: ValueSummary<T>) -> Tree<T> {
        self.counter += 1;
        let version = VersionId(self.counter);
        self.log.record(version, path, old);
        self.current = Tree { root, version };
        self.current.clone()
    }

    /// The mutation chain recorded at exactly `path`, most recent first.
    pub fn history<'a>(&'a self, path: &Path) -> impl Iterator<Item = &'a HistoryEntry<T>> + 'a {
        self.log.history(path)
    }

    /// The subtree changelog for everything at or below `prefix`, most
    /// recent first.
    pub fn history_under<'a>(
        &'a self,
        prefix: &'a Path,
    ) -> impl Iterator<Item = &'a HistoryEntry<T>> + 'a {
        self.log.history_under(prefix)
    }

    pub fn log(&self) -> &HistoryLog<T> {
        &self.log
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::node::Bytes;
    use crate::path;

    #[cfg(feature = "proptest")]
    use proptest::prelude::*;

    fn sample() -> NodeHandle<u64> {
        Node::record([
            ("a", Node::branch([Node::leaf(1u64), Node::leaf(2)])),
            ("b", Node::bytes(Bytes::from_source(vec![9u8, 9, 9]))),
        ])
    }

    #[test]
    fn get_reads_without_creating_a_version() {
        let mut head = Head::new(sample());
        let before = head.version();
        let node = head.get(&path!["a", 0]).unwrap();
        assert_eq!(node.as_scalar(), Some(&1));
        assert_eq!(head.version(), before);
        assert!(head.log().is_empty());
    }

    #[test]
    fn set_rebuilds_the_spine_and_shares_siblings() {
        let mut head = Head::new(sample());
        let old = head.current();
        let new = head.set(&path!["a", 1], Node::leaf(7)).unwrap();

        assert_eq!(new.get(&path!["a", 1]).unwrap().as_scalar(), Some(&7));
        // The sibling subtree off the mutated spine is the same node.
        let old_b = old.get(&path!["b"]).unwrap();
        let new_b = new.get(&path!["b"]).unwrap();
        assert!(Arc::ptr_eq(&old_b, &new_b));
        // The untouched sibling under the mutated branch is shared too.
        let old_a0 = old.get(&path!["a", 0]).unwrap();
        let new_a0 = new.get(&path!["a", 0]).unwrap();
        assert!(Arc::ptr_eq(&old_a0, &new_a0));
        // The spine itself is fresh.
        assert!(!Arc::ptr_eq(old.root(), new.root()));
        // The prior version is untouched.
        assert_eq!(old.get(&path!["a", 1]).unwrap().as_scalar(), Some(&2));
    }

    #[test]
    fn set_maintains_lengths_along_the_path() {
        let mut head = Head::new(sample());
        assert_eq!(head.current().length(), 1 + 1 + 3);
        let new = head
            .set(&path!["b"], Node::bytes(Bytes::from_source(vec![0u8; 10])))
            .unwrap();
        assert_eq!(new.length(), 1 + 1 + 10);
        assert_eq!(new.get(&path!["a"]).unwrap().length(), 2);
    }

    #[test]
    fn set_replaces_the_root_on_the_empty_path() {
        let mut head = Head::new(sample());
        let new = head.set(&Path::root(), Node::leaf(42)).unwrap();
        assert_eq!(new.root().as_scalar(), Some(&42));
        assert_eq!(new.version(), VersionId(1));
    }

    #[test]
    fn set_requires_an_existing_path() {
        let mut head = Head::new(sample());
        let before = head.version();
        let err = head.set(&path!["c"], Node::leaf(0)).unwrap_err();
        assert_eq!(
            err,
            PathError::NotFound {
                resolved: Path::root()
            }
        );
        let err = head.set(&path!["b", 0], Node::leaf(0)).unwrap_err();
        assert_eq!(err, PathError::NotTraversable { resolved: path!["b"] });
        // Failed mutations install nothing and record nothing.
        assert_eq!(head.version(), before);
        assert!(head.log().is_empty());
    }

    #[test]
    fn snapshot_set_stays_outside_the_head_lineage() {
        let mut head = Head::new(sample());
        let snapshot = head.current();

        // Forking a snapshot directly records nothing and mints an id
        // scoped to that snapshot, not to the head.
        let fork_a = snapshot.set(&path!["a", 0], Node::leaf(50)).unwrap();
        let fork_b = snapshot.set(&path!["a", 0], Node::leaf(60)).unwrap();
        assert_eq!(fork_a.version(), VersionId(1));
        assert_eq!(fork_b.version(), VersionId(1));
        assert!(head.log().is_empty());
        assert_eq!(head.version(), VersionId(0));

        // Head-driven mutations keep their own strictly increasing ids
        // and one history entry each, regardless of the forks.
        let v1 = head.set(&path!["a", 0], Node::leaf(70)).unwrap();
        let v2 = head.set(&path!["a", 1], Node::leaf(80)).unwrap();
        assert_eq!(v1.version(), VersionId(1));
        assert_eq!(v2.version(), VersionId(2));
        assert_eq!(head.log().len(), 2);
    }

    #[test]
    fn idempotent_reset_is_value_equal() {
        let mut head = Head::new(sample());
        let once = head.set(&path!["a", 0], Node::leaf(5)).unwrap();
        let twice = head.set(&path!["a", 0], Node::leaf(5)).unwrap();
        assert_eq!(once.root(), twice.root());
        assert_eq!(once.length(), twice.length());
    }

    #[test]
    fn push_appends_to_a_sequence_branch() {
        let mut head = Head::new(sample());
        let new = head.push(&path!["a"], Node::leaf(3)).unwrap();
        assert_eq!(new.get(&path!["a"]).unwrap().length(), 3);
        assert_eq!(new.get(&path!["a", 2]).unwrap().as_scalar(), Some(&3));

        // Records and leaves cannot be extended positionally.
        let err = head.push(&Path::root(), Node::leaf(0)).unwrap_err();
        assert_eq!(
            err,
            PathError::NotTraversable {
                resolved: Path::root()
            }
        );
        let err = head.push(&path!["b"], Node::leaf(0)).unwrap_err();
        assert_eq!(err, PathError::NotTraversable { resolved: path!["b"] });
    }

    #[test]
    fn insert_adds_and_replaces_record_fields() {
        let mut head = Head::new(sample());
        let new = head.insert(&Path::root(), "c", Node::leaf(9)).unwrap();
        assert_eq!(new.get(&path!["c"]).unwrap().as_scalar(), Some(&9));

        let replaced = head.insert(&Path::root(), "c", Node::leaf(10)).unwrap();
        assert_eq!(replaced.get(&path!["c"]).unwrap().as_scalar(), Some(&10));
        assert_eq!(
            replaced.root().as_branch().unwrap().children().len(),
            3
        );

        let err = head.insert(&path!["a"], "x", Node::leaf(0)).unwrap_err();
        assert_eq!(err, PathError::NotTraversable { resolved: path!["a"] });
    }

    #[test]
    fn snapshots_survive_later_mutations() {
        let mut head = Head::new(sample());
        let v1 = head.set(&path!["a", 0], Node::leaf(10)).unwrap();
        let _v2 = head.set(&path!["a", 0], Node::leaf(20)).unwrap();
        assert_eq!(v1.get(&path!["a", 0]).unwrap().as_scalar(), Some(&10));
        assert_eq!(
            head.get(&path!["a", 0]).unwrap().as_scalar(),
            Some(&20)
        );
    }

    fn assert_lengths(node: &NodeHandle<u64>) {
        if let Some(branch) = node.as_branch() {
            let sum: u64 = branch.children().iter().map(|c| c.length()).sum();
            assert_eq!(branch.length(), sum);
            for child in branch.children() {
                assert_lengths(child);
            }
        }
    }

    fn leaf_paths(node: &NodeHandle<u64>, at: Path, out: &mut Vec<Path>) {
        match node.as_branch() {
            None => out.push(at),
            Some(branch) => {
                for (i, child) in branch.children().iter().enumerate() {
                    leaf_paths(child, at.child(i), out);
                }
            }
        }
    }

    #[cfg(feature = "proptest")]
    fn arb_node() -> impl Strategy<Value = NodeHandle<u64>> {
        let leaf = prop_oneof![
            any::<u64>().prop_map(|v| Node::leaf(v)),
            prop::collection::vec(any::<u8>(), 0..16)
                .prop_map(|v| Node::bytes(Bytes::from_source(v))),
        ];
        leaf.prop_recursive(4, 64, 6, |inner| {
            prop::collection::vec(inner, 0..6).prop_map(|children| Node::branch(children))
        })
    }

    #[cfg(feature = "proptest")]
    proptest! {
        #[test]
        fn length_invariant_holds_after_every_rebind(root in arb_node()) {
            let mut paths = Vec::new();
            leaf_paths(&root, Path::root(), &mut paths);
            let mut head = Head::new(root);
            assert_lengths(head.current().root());
            for path in paths {
                let tree = head.set(&path, Node::leaf(0)).unwrap();
                assert_lengths(tree.root());
            }
        }

        #[test]
        fn rebind_shares_every_off_path_sibling(root in arb_node()) {
            let mut paths = Vec::new();
            leaf_paths(&root, Path::root(), &mut paths);
            let before = Tree::new(root);
            for path in &paths {
                let after = before.set(path, Node::leaf(1)).unwrap();
                // Walk both spines in lockstep; every sibling off the
                // mutated spine must be reference-identical.
                let mut old = before.root().clone();
                let mut new = after.root().clone();
                for seg in path.segments() {
                    let ob = old.as_branch().unwrap();
                    let nb = new.as_branch().unwrap();
                    let pos = ob.position(seg).unwrap();
                    for (i, (o, n)) in
                        ob.children().iter().zip(nb.children()).enumerate()
                    {
                        if i != pos {
                            prop_assert!(Arc::ptr_eq(o, n));
                        }
                    }
                    old = ob.children()[pos].clone();
                    new = nb.children()[pos].clone();
                }
            }
        }
    }
}
