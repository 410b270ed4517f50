// Copyright 2020 The Jujutsu Authors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
// https://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Mutable transactions over the committed DAG (spec §4.3): an overlay of
//! path-keyed overrides on top of one base revision, materialized into real
//! nodes only on [`Transaction::commit`].
//!
//! Grounded on the override-map pattern used to stage changes against an
//! immutable base tree before flushing them as new, immutable nodes.

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::trace;

use crate::dag::cache::DagCache;
use crate::dag::history::related;
use crate::dag::node::{Dag, Node, NodeId, NodeMeta};
use crate::dag::resolver::{CopyInheritance, decide_copy_inheritance, resolve};
use crate::error::DagError;
use crate::path::RepoPath;
use crate::revnum::Revnum;

/// The state of one path under mutation. A path absent from the overlay is
/// read straight through to the base revision.
enum Override {
    Mutable(Arc<Node>),
    Deleted,
}

/// One in-progress mutation against the tree rooted at `base_revision`.
/// Exactly one `Transaction` should be alive against a `Dag` at a time; nothing
/// here enforces that beyond the borrow checker holding `&mut Dag`.
pub struct Transaction<'a> {
    dag: &'a mut Dag,
    base_revision: Revnum,
    cache: DagCache,
    overrides: BTreeMap<RepoPath, Override>,
}

impl<'a> Transaction<'a> {
    pub fn new(dag: &'a mut Dag) -> Self {
        let base_revision = dag.youngest();
        Transaction { dag, base_revision, cache: DagCache::new(), overrides: BTreeMap::new() }
    }

    pub fn base_revision(&self) -> Revnum {
        self.base_revision
    }

    fn next_revision(&self) -> Revnum {
        self.dag.youngest().next()
    }

    /// Walks `path` against the committed base revision only, ignoring this
    /// transaction's overlay, returning the node's committed id.
    fn committed_node_id(&self, revision: Revnum, path: &RepoPath) -> Result<NodeId, DagError> {
        let mut current_id = self.dag.revision_root_id(revision)?;
        for component in path.components() {
            let current = self.dag.node(current_id);
            let entries = current
                .entries()
                .ok_or_else(|| DagError::NotDirectory(path.as_internal_str().to_owned()))?;
            current_id = *entries
                .get(component)
                .ok_or_else(|| DagError::NotFound(path.as_internal_str().to_owned()))?;
        }
        Ok(current_id)
    }

    /// Reads `path` as it stands right now in this transaction: the overlay
    /// if `path` (or an ancestor's deletion) covers it, otherwise the
    /// committed base revision.
    pub fn open(&self, path: &RepoPath) -> Result<Option<Arc<Node>>, DagError> {
        if let Some(over) = self.overrides.get(path) {
            return Ok(match over {
                Override::Mutable(node) => Some(Arc::clone(node)),
                Override::Deleted => None,
            });
        }
        match resolve(self.dag, &self.cache, self.base_revision, path, false) {
            Ok(chain) => Ok(chain.target().cloned()),
            Err(DagError::NotFound(_)) => Ok(None),
            Err(err) => Err(err),
        }
    }

    /// spec §4.3's make-path-mutable: ensures every ancestor of `path` down
    /// to and including `path` itself has a mutable clone in this
    /// transaction, and returns it. `path` must already exist (in the
    /// committed base or a prior override); creating new nodes is done with
    /// [`Transaction::make_file`] / [`Transaction::make_directory`].
    pub fn make_path_mutable(&mut self, path: &RepoPath) -> Result<Arc<Node>, DagError> {
        if let Some(Override::Mutable(existing)) = self.overrides.get(path) {
            return Ok(Arc::clone(existing));
        }

        let (committed_id, committed, parent_clone) = if path.is_root() {
            let id = self.dag.revision_root_id(self.base_revision)?;
            let node = self.dag.node(id);
            (id, node, None)
        } else {
            let (parent_path, component) = path.split().expect("non-root path has a parent");
            let parent_clone = self.make_path_mutable(&parent_path)?;
            let entries = parent_clone
                .entries()
                .ok_or_else(|| DagError::NotDirectory(parent_path.as_internal_str().to_owned()))?;
            let id = *entries
                .get(component)
                .ok_or_else(|| DagError::NotFound(path.as_internal_str().to_owned()))?;
            let node = self.dag.node(id);
            (id, node, Some(parent_clone))
        };

        let inheritance = match &parent_clone {
            Some(parent) => decide_copy_inheritance(&committed, parent),
            None => CopyInheritance::Itself,
        };
        let next_rev = self.next_revision();
        let copy_id = match inheritance {
            CopyInheritance::Itself => committed.meta().copy_id,
            CopyInheritance::Parent => {
                parent_clone.as_ref().expect("Parent inheritance implies a parent").meta().copy_id
            }
            CopyInheritance::New => self.dag.alloc_copy_id(),
        };
        // spec §4.3 step 5: the copy-root is decided independently of the
        // copy-id precedence above, by consulting `committed`'s own
        // copy-root node: if that node is no longer related to `committed`,
        // the clone becomes its own copy-root; otherwise `committed`'s
        // copy-root is inherited unchanged.
        let (copy_root_rev, copy_root_path) = &committed.meta().copy_root;
        let is_own_copy_root = match self.committed_node_id(*copy_root_rev, copy_root_path) {
            Ok(copy_root_id) => !related(self.dag, copy_root_id, committed_id),
            Err(_) => true,
        };
        let copy_root = if is_own_copy_root { (next_rev, path.clone()) } else { committed.meta().copy_root.clone() };

        let meta = NodeMeta {
            created_rev: next_rev,
            created_path: path.clone(),
            copy_id,
            copy_root,
            predecessor: Some(committed_id),
            copied_from: committed.meta().copied_from,
        };
        let clone = match &*committed {
            Node::File { content_hash, .. } => Node::File { meta, content_hash: *content_hash },
            Node::Directory { entries, .. } => Node::Directory { meta, entries: entries.clone() },
            Node::Unknown { .. } => Node::Unknown { meta },
        };
        let clone = Arc::new(clone);
        self.overrides.insert(path.clone(), Override::Mutable(Arc::clone(&clone)));
        self.cache.invalidate_subtree(path);
        trace!(path = %path, revision = ?next_rev, "made path mutable");
        Ok(clone)
    }

    /// Creates a new, empty directory at `path`. The parent must already
    /// exist (and is made mutable); `path` itself must not yet exist.
    pub fn make_directory(&mut self, path: &RepoPath) -> Result<(), DagError> {
        let (parent_path, _) = path
            .split()
            .ok_or_else(|| DagError::NotMutable("/".to_owned()))?;
        let parent = self.make_path_mutable(&parent_path)?;
        let next_rev = self.next_revision();
        let meta = NodeMeta {
            created_rev: next_rev,
            created_path: path.clone(),
            copy_id: parent.meta().copy_id,
            copy_root: parent.meta().copy_root.clone(),
            predecessor: None,
            copied_from: None,
        };
        self.overrides.insert(
            path.clone(),
            Override::Mutable(Arc::new(Node::Directory { meta, entries: BTreeMap::new() })),
        );
        self.cache.invalidate_subtree(path);
        Ok(())
    }

    /// Creates a new file at `path` with the given content identity. The
    /// parent must already exist (and is made mutable).
    pub fn make_file(&mut self, path: &RepoPath, content_hash: [u8; 64]) -> Result<(), DagError> {
        let (parent_path, _) = path
            .split()
            .ok_or_else(|| DagError::NotMutable("/".to_owned()))?;
        let parent = self.make_path_mutable(&parent_path)?;
        let next_rev = self.next_revision();
        let meta = NodeMeta {
            created_rev: next_rev,
            created_path: path.clone(),
            copy_id: parent.meta().copy_id,
            copy_root: parent.meta().copy_root.clone(),
            predecessor: None,
            copied_from: None,
        };
        self.overrides.insert(path.clone(), Override::Mutable(Arc::new(Node::File { meta, content_hash })));
        self.cache.invalidate_subtree(path);
        Ok(())
    }

    /// Rewrites the content of an existing mutable or committed file.
    pub fn set_file_content(&mut self, path: &RepoPath, content_hash: [u8; 64]) -> Result<(), DagError> {
        let node = self.make_path_mutable(path)?;
        let Node::File { meta, .. } = &*node else {
            return Err(DagError::NotFile(path.as_internal_str().to_owned()));
        };
        let meta = meta.clone();
        self.overrides.insert(path.clone(), Override::Mutable(Arc::new(Node::File { meta, content_hash })));
        self.cache.invalidate_subtree(path);
        Ok(())
    }

    /// Removes `path` (and, implicitly, everything beneath it) from the
    /// tree. The parent must already exist and is made mutable.
    pub fn delete(&mut self, path: &RepoPath) -> Result<(), DagError> {
        let (parent_path, _) = path
            .split()
            .ok_or_else(|| DagError::NotMutable("/".to_owned()))?;
        self.make_path_mutable(&parent_path)?;
        self.overrides.insert(path.clone(), Override::Deleted);
        self.cache.invalidate_subtree(path);
        Ok(())
    }

    /// Cheap copy: grafts the subtree committed at `(source_revision,
    /// source_path)` onto `dest_path`. Since the source subtree is immutable,
    /// this only clones the top node; every descendant is shared until some
    /// later transaction mutates it, at which point ordinary copy-on-write
    /// clones just that path.
    pub fn copy(
        &mut self,
        source_revision: Revnum,
        source_path: &RepoPath,
        dest_path: &RepoPath,
    ) -> Result<(), DagError> {
        let source_id = self.committed_node_id(source_revision, source_path)?;
        let source_node = self.dag.node(source_id);
        let (parent_path, _) = dest_path
            .split()
            .ok_or_else(|| DagError::NotMutable("/".to_owned()))?;
        self.make_path_mutable(&parent_path)?;

        let next_rev = self.next_revision();
        let new_copy_id = self.dag.alloc_copy_id();
        let meta = NodeMeta {
            created_rev: next_rev,
            created_path: dest_path.clone(),
            copy_id: new_copy_id,
            copy_root: (next_rev, dest_path.clone()),
            predecessor: None,
            copied_from: Some(source_id),
        };
        let clone = match &*source_node {
            Node::File { content_hash, .. } => Node::File { meta, content_hash: *content_hash },
            Node::Directory { entries, .. } => Node::Directory { meta, entries: entries.clone() },
            Node::Unknown { .. } => Node::Unknown { meta },
        };
        self.overrides.insert(dest_path.clone(), Override::Mutable(Arc::new(clone)));
        self.cache.invalidate_subtree(dest_path);
        Ok(())
    }

    /// Materializes every pending override into an immutable [`Node`],
    /// bottom-up, and commits the result as a new revision. Consumes the
    /// transaction: it cannot be reused once flushed.
    pub fn commit(self) -> Result<Revnum, DagError> {
        let Transaction { dag, base_revision, overrides, .. } = self;

        let mut children_by_parent: BTreeMap<RepoPath, Vec<RepoPath>> = BTreeMap::new();
        for path in overrides.keys() {
            if let Some((parent, _)) = path.split() {
                children_by_parent.entry(parent).or_default().push(path.clone());
            }
        }

        let mut order: Vec<RepoPath> = overrides.keys().cloned().collect();
        order.sort_by_key(|p| std::cmp::Reverse(p.components().count()));

        let mut materialized: BTreeMap<RepoPath, NodeId> = BTreeMap::new();
        for path in &order {
            let id = match &overrides[path] {
                Override::Deleted => continue,
                Override::Mutable(node) => {
                    let mut node = (**node).clone();
                    if let Node::Directory { entries, .. } = &mut node {
                        if let Some(children) = children_by_parent.get(path) {
                            for child_path in children {
                                let (_, name) = child_path.split().expect("child has a parent");
                                match materialized.get(child_path) {
                                    Some(&child_id) => {
                                        entries.insert(name.to_owned(), child_id);
                                    }
                                    None => {
                                        entries.remove(name);
                                    }
                                }
                            }
                        }
                    }
                    dag.insert_node(node)
                }
            };
            materialized.insert(path.clone(), id);
        }

        let root_id = match materialized.get(&RepoPath::root()) {
            Some(&id) => id,
            None => dag.revision_root_id(base_revision)?,
        };
        Ok(dag.commit_root(root_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dag::node::NodeKind;

    fn p(s: &str) -> RepoPath {
        RepoPath::from_internal_string(s)
    }

    #[test]
    fn make_file_and_commit_is_visible() {
        let mut dag = Dag::new();
        let mut txn = Transaction::new(&mut dag);
        txn.make_directory(&p("trunk")).unwrap();
        txn.make_file(&p("trunk/a.txt"), [1; 64]).unwrap();
        let rev = txn.commit().unwrap();

        let root = dag.revision_root(rev).unwrap();
        let trunk = dag.open(&root, crate::path::RepoPathComponent::new("trunk")).unwrap();
        let file = dag.open(&trunk, crate::path::RepoPathComponent::new("a.txt")).unwrap();
        assert_eq!(file.kind(), NodeKind::File);
        assert_eq!(file.content_hash(), Some(&[1; 64]));
    }

    #[test]
    fn delete_then_commit_removes_entry() {
        let mut dag = Dag::new();
        let mut setup = Transaction::new(&mut dag);
        setup.make_directory(&p("trunk")).unwrap();
        setup.make_file(&p("trunk/a.txt"), [1; 64]).unwrap();
        let rev1 = setup.commit().unwrap();
        assert_eq!(dag.youngest(), rev1);

        let mut txn = Transaction::new(&mut dag);
        txn.delete(&p("trunk/a.txt")).unwrap();
        let rev2 = txn.commit().unwrap();

        let root = dag.revision_root(rev2).unwrap();
        let trunk = dag.open(&root, crate::path::RepoPathComponent::new("trunk")).unwrap();
        assert!(dag.open(&trunk, crate::path::RepoPathComponent::new("a.txt")).is_none());
    }

    #[test]
    fn copy_shares_descendant_node_ids_until_mutated() {
        let mut dag = Dag::new();
        let mut setup = Transaction::new(&mut dag);
        setup.make_directory(&p("trunk")).unwrap();
        setup.make_file(&p("trunk/a.txt"), [1; 64]).unwrap();
        let rev1 = setup.commit().unwrap();

        let mut txn = Transaction::new(&mut dag);
        txn.copy(rev1, &p("trunk"), &p("branches/b")).unwrap();
        let rev2 = txn.commit().unwrap();

        let root = dag.revision_root(rev2).unwrap();
        let branches = dag.open(&root, crate::path::RepoPathComponent::new("branches")).unwrap();
        let b = dag.open(&branches, crate::path::RepoPathComponent::new("b")).unwrap();
        let copied_file = dag.open(&b, crate::path::RepoPathComponent::new("a.txt")).unwrap();

        let original_root = dag.revision_root(rev1).unwrap();
        let original_trunk =
            dag.open(&original_root, crate::path::RepoPathComponent::new("trunk")).unwrap();
        let original_file =
            dag.open(&original_trunk, crate::path::RepoPathComponent::new("a.txt")).unwrap();

        assert!(Arc::ptr_eq(&copied_file, &original_file));
        assert!(b.meta().copied_from.is_some());
        assert!(b.meta().copy_id != original_trunk.meta().copy_id);
    }

    #[test]
    fn make_path_mutable_is_idempotent_within_a_transaction() {
        let mut dag = Dag::new();
        let mut setup = Transaction::new(&mut dag);
        setup.make_directory(&p("trunk")).unwrap();
        setup.commit().unwrap();

        let mut txn = Transaction::new(&mut dag);
        let first = txn.make_path_mutable(&p("trunk")).unwrap();
        let second = txn.make_path_mutable(&p("trunk")).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn make_path_mutable_anchors_copy_root_to_itself_on_first_clone_then_stays_stable() {
        // `trunk` was never involved in a copy, so it starts out pointing at
        // the repository root's copy-root (spec §4.3 step 5 is decided
        // independently of copy-id inheritance): the root is unrelated to
        // `trunk` by predecessor-chain reachability, so the first clone
        // anchors its own copy-root at itself rather than inheriting that
        // stale pointer.
        let mut dag = Dag::new();
        let mut setup = Transaction::new(&mut dag);
        setup.make_directory(&p("trunk")).unwrap();
        setup.commit().unwrap();

        let mut txn = Transaction::new(&mut dag);
        let first_clone = txn.make_path_mutable(&p("trunk")).unwrap();
        let first_rev = txn.commit().unwrap();
        assert_eq!(first_clone.meta().copy_root, (first_rev, p("trunk")));

        // Mutating it again now finds its own copy-root trivially related
        // (it points at itself), so the pointer no longer moves.
        let mut txn2 = Transaction::new(&mut dag);
        let second_clone = txn2.make_path_mutable(&p("trunk")).unwrap();
        assert_eq!(second_clone.meta().copy_root, (first_rev, p("trunk")));
    }

    #[test]
    fn open_sees_uncommitted_overrides() {
        let mut dag = Dag::new();
        let mut txn = Transaction::new(&mut dag);
        txn.make_directory(&p("trunk")).unwrap();
        let seen = txn.open(&p("trunk")).unwrap();
        assert!(seen.is_some());
        assert_eq!(seen.unwrap().kind(), NodeKind::Directory);
    }
}
