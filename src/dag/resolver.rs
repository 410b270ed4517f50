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

//! Path resolution (spec §4.4): walks a revision's tree component by
//! component, building the chain of ancestors a mutation would need to clone,
//! and decides how a cloned node should inherit its copy identity (spec §4.3
//! step 4).

use std::sync::Arc;

use crate::dag::cache::DagCache;
use crate::dag::node::{CopyId, Dag, Node, NodeKind};
use crate::error::DagError;
use crate::path::{RepoPath, RepoPathComponentBuf};
use crate::revnum::Revnum;

/// One step of a resolved path: the path up to and including this node, and
/// the node itself.
#[derive(Clone)]
struct Step {
    path: RepoPath,
    node: Arc<Node>,
}

/// The result of resolving a path within one revision: every ancestor
/// directory from the tree root down to (but not including) the target, plus
/// the target itself when it exists.
///
/// Named for the chain a `make-path-mutable` walk clones bottom-up once it
/// knows which ancestors are already mutable in a transaction.
pub struct ParentPathChain {
    ancestors: Vec<Step>,
    last_name: Option<RepoPathComponentBuf>,
    target: Option<Arc<Node>>,
}

impl ParentPathChain {
    /// The innermost existing node: the last ancestor walked, i.e. the
    /// target's parent directory.
    pub fn parent(&self) -> &Arc<Node> {
        &self.ancestors.last().expect("chain always has at least the tree root").node
    }

    pub fn parent_path(&self) -> &RepoPath {
        &self.ancestors.last().expect("chain always has at least the tree root").path
    }

    /// The resolved node at the full path, if the last component was
    /// required to exist (or happened to exist anyway).
    pub fn target(&self) -> Option<&Arc<Node>> {
        self.target.as_ref()
    }

    /// The final component's name, unless the path resolved to the tree
    /// root.
    pub fn last_name(&self) -> Option<&RepoPathComponentBuf> {
        self.last_name.as_ref()
    }

    /// Every ancestor from the tree root to the target's parent, inclusive,
    /// paired with its path.
    pub fn ancestors(&self) -> impl Iterator<Item = (&RepoPath, &Arc<Node>)> {
        self.ancestors.iter().map(|step| (&step.path, &step.node))
    }
}

/// Walks `path` within `revision`, consulting `cache` for each prefix before
/// falling back to `dag`. Consults the optimistic same-path shortcut first:
/// if the cache's last non-empty entry already names exactly `(revision,
/// path)`, the whole walk is skipped.
///
/// `require_target`: if false, the final component is allowed to be absent
/// from its parent directory (the chain is returned with `target() ==
/// None`); any other missing or non-directory ancestor is still an error.
pub fn resolve(
    dag: &Dag,
    cache: &DagCache,
    revision: Revnum,
    path: &RepoPath,
    require_target: bool,
) -> Result<ParentPathChain, DagError> {
    if let Some(node) = cache.optimistic_lookup(revision, path) {
        if let Some((parent_path, last_name)) = path.split() {
            if let Some(parent_node) = cache.lookup(revision, &parent_path) {
                return Ok(ParentPathChain {
                    ancestors: vec![Step { path: parent_path, node: parent_node }],
                    last_name: Some(last_name.to_owned()),
                    target: Some(node),
                });
            }
        }
    }

    let root = cache
        .lookup(revision, &RepoPath::root())
        .map(Ok)
        .unwrap_or_else(|| dag.revision_root(revision))?;
    cache.insert(revision, &RepoPath::root(), Arc::clone(&root));

    let mut ancestors = vec![Step { path: RepoPath::root(), node: root }];
    let mut accumulated = RepoPath::root();
    let mut last_name = None;
    let mut target = None;

    let components: Vec<_> = path.components().collect();
    for (index, component) in components.iter().enumerate() {
        let is_last = index + 1 == components.len();
        let parent_step = ancestors.last().expect("always non-empty");
        if parent_step.node.kind() != NodeKind::Directory {
            return Err(DagError::NotDirectory(parent_step.path.as_internal_str().to_owned()));
        }
        accumulated = accumulated.join(component);

        let child = match cache.lookup(revision, &accumulated) {
            Some(node) => Some(node),
            None => {
                let found = dag.open(&parent_step.node, component);
                if let Some(node) = &found {
                    cache.insert(revision, &accumulated, Arc::clone(node));
                }
                found
            }
        };

        if is_last {
            last_name = Some((*component).to_owned());
            match child {
                Some(node) => target = Some(node),
                None if require_target => {
                    return Err(DagError::NotFound(path.as_internal_str().to_owned()));
                }
                None => {}
            }
        } else {
            match child {
                Some(node) => ancestors.push(Step { path: accumulated.clone(), node }),
                None => return Err(DagError::NotFound(accumulated.as_internal_str().to_owned())),
            }
        }
    }

    Ok(ParentPathChain { ancestors, last_name, target })
}

/// How a node being cloned for mutability should obtain its `copy_id` (spec
/// §4.3 step 4).
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum CopyInheritance {
    /// Keep the node's own copy id unchanged.
    Itself,
    /// Take on the parent directory's copy id.
    Parent,
    /// Allocate a fresh copy id.
    New,
}

/// Decides copy-id inheritance for `node`, being cloned as a child of
/// `parent` during a mutation.
///
/// - If the node already shares its parent's copy id, nothing changes:
///   `Itself`.
/// - If the node is itself the root of the copy that introduced its current
///   identity (its `copy_root` names its own creation point), that identity
///   is preserved across the clone: `Itself`.
/// - If the node has never participated in a copy, it simply starts tracking
///   its parent's copy history: `Parent`.
/// - Otherwise the node's copy history diverges from its parent's and a
///   clone here marks the start of a new copy identity: `New`.
pub fn decide_copy_inheritance(node: &Node, parent: &Node) -> CopyInheritance {
    let meta = node.meta();
    let parent_meta = parent.meta();
    if meta.copy_id == parent_meta.copy_id {
        CopyInheritance::Itself
    } else if meta.copy_root == (meta.created_rev, meta.created_path.clone()) {
        CopyInheritance::Itself
    } else if meta.copy_id == CopyId::ROOT {
        CopyInheritance::Parent
    } else {
        CopyInheritance::New
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;
    use crate::dag::node::NodeMeta;
    use crate::path::RepoPathComponent;

    fn dir(rev: u64, path: &str, entries: BTreeMap<RepoPathComponentBuf, crate::dag::node::NodeId>) -> Node {
        Node::Directory {
            meta: NodeMeta {
                created_rev: Revnum::new(rev),
                created_path: RepoPath::from_internal_string(path),
                copy_id: CopyId::ROOT,
                copy_root: (Revnum::ZERO, RepoPath::root()),
                predecessor: None,
                copied_from: None,
            },
            entries,
        }
    }

    fn file(rev: u64, path: &str) -> Node {
        Node::File {
            meta: NodeMeta {
                created_rev: Revnum::new(rev),
                created_path: RepoPath::from_internal_string(path),
                copy_id: CopyId::ROOT,
                copy_root: (Revnum::ZERO, RepoPath::root()),
                predecessor: None,
                copied_from: None,
            },
            content_hash: [0; 64],
        }
    }

    fn build_tree(dag: &mut Dag) -> Revnum {
        let leaf_id = dag.insert_node(file(1, "trunk/a.txt"));
        let mut trunk_entries = BTreeMap::new();
        trunk_entries.insert(RepoPathComponentBuf::from("a.txt"), leaf_id);
        let trunk_id = dag.insert_node(dir(1, "trunk", trunk_entries));
        let mut root_entries = BTreeMap::new();
        root_entries.insert(RepoPathComponentBuf::from("trunk"), trunk_id);
        let root_id = dag.insert_node(dir(1, "", root_entries));
        dag.commit_root(root_id)
    }

    #[test]
    fn resolves_existing_file() {
        let mut dag = Dag::new();
        let rev = build_tree(&mut dag);
        let cache = DagCache::new();
        let path = RepoPath::root().join(RepoPathComponent::new("trunk")).join(RepoPathComponent::new("a.txt"));
        let chain = resolve(&dag, &cache, rev, &path, true).unwrap();
        assert!(chain.target().is_some());
        assert_eq!(chain.target().unwrap().kind(), NodeKind::File);
        assert_eq!(chain.parent_path().as_internal_str(), "trunk");
    }

    #[test]
    fn missing_required_target_is_an_error() {
        let mut dag = Dag::new();
        let rev = build_tree(&mut dag);
        let cache = DagCache::new();
        let path = RepoPath::root().join(RepoPathComponent::new("trunk")).join(RepoPathComponent::new("missing"));
        assert!(matches!(resolve(&dag, &cache, rev, &path, true), Err(DagError::NotFound(_))));
    }

    #[test]
    fn missing_optional_target_yields_none() {
        let mut dag = Dag::new();
        let rev = build_tree(&mut dag);
        let cache = DagCache::new();
        let path = RepoPath::root().join(RepoPathComponent::new("trunk")).join(RepoPathComponent::new("missing"));
        let chain = resolve(&dag, &cache, rev, &path, false).unwrap();
        assert!(chain.target().is_none());
        assert_eq!(chain.last_name().unwrap().as_str(), "missing");
    }

    #[test]
    fn missing_intermediate_directory_is_always_an_error() {
        let mut dag = Dag::new();
        let rev = build_tree(&mut dag);
        let cache = DagCache::new();
        let path = RepoPath::root()
            .join(RepoPathComponent::new("nope"))
            .join(RepoPathComponent::new("a.txt"));
        assert!(matches!(resolve(&dag, &cache, rev, &path, false), Err(DagError::NotFound(_))));
    }

    #[test]
    fn walking_through_a_file_is_not_a_directory_error() {
        let mut dag = Dag::new();
        let rev = build_tree(&mut dag);
        let cache = DagCache::new();
        let path = RepoPath::root()
            .join(RepoPathComponent::new("trunk"))
            .join(RepoPathComponent::new("a.txt"))
            .join(RepoPathComponent::new("further"));
        assert!(matches!(resolve(&dag, &cache, rev, &path, false), Err(DagError::NotDirectory(_))));
    }

    #[test]
    fn inheritance_self_when_copy_ids_already_match() {
        let parent = dir(1, "trunk", BTreeMap::new());
        let node = file(1, "trunk/a.txt");
        assert_eq!(decide_copy_inheritance(&node, &parent), CopyInheritance::Itself);
    }

    #[test]
    fn inheritance_itself_when_node_is_its_own_copy_root() {
        let parent = dir(1, "branches/b", BTreeMap::new());
        let mut dag = Dag::new();
        let copy_id = dag.alloc_copy_id();
        let node = Node::File {
            meta: NodeMeta {
                created_rev: Revnum::new(5),
                created_path: RepoPath::from_internal_string("branches/b/a.txt"),
                copy_id,
                copy_root: (Revnum::new(5), RepoPath::from_internal_string("branches/b/a.txt")),
                predecessor: None,
                copied_from: None,
            },
            content_hash: [0; 64],
        };
        assert_eq!(decide_copy_inheritance(&node, &parent), CopyInheritance::Itself);
    }

    #[test]
    fn inheritance_parent_when_node_never_participated_in_a_copy() {
        let mut dag = Dag::new();
        let copy_id = dag.alloc_copy_id();
        let parent = Node::Directory {
            meta: NodeMeta {
                created_rev: Revnum::new(1),
                created_path: RepoPath::from_internal_string("trunk"),
                copy_id,
                copy_root: (Revnum::new(1), RepoPath::from_internal_string("trunk")),
                predecessor: None,
                copied_from: None,
            },
            entries: BTreeMap::new(),
        };
        let node = file(1, "trunk/a.txt");
        assert_eq!(decide_copy_inheritance(&node, &parent), CopyInheritance::Parent);
    }

    #[test]
    fn inheritance_new_when_copy_history_diverges() {
        let mut dag = Dag::new();
        let parent_copy_id = dag.alloc_copy_id();
        let node_copy_id = dag.alloc_copy_id();
        let parent = Node::Directory {
            meta: NodeMeta {
                created_rev: Revnum::new(1),
                created_path: RepoPath::from_internal_string("trunk"),
                copy_id: parent_copy_id,
                copy_root: (Revnum::new(1), RepoPath::from_internal_string("trunk")),
                predecessor: None,
                copied_from: None,
            },
            entries: BTreeMap::new(),
        };
        let node = Node::File {
            meta: NodeMeta {
                created_rev: Revnum::new(5),
                created_path: RepoPath::from_internal_string("trunk/a.txt"),
                copy_id: node_copy_id,
                copy_root: (Revnum::new(1), RepoPath::from_internal_string("branches/b/a.txt")),
                predecessor: None,
                copied_from: None,
            },
            content_hash: [0; 64],
        };
        assert_eq!(decide_copy_inheritance(&node, &parent), CopyInheritance::New);
    }
}
