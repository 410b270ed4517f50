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

//! Committed DAG nodes (spec §3, §4.3): immutable, shared, reference-counted
//! records addressed by an opaque [`NodeId`].

use std::collections::BTreeMap;
use std::sync::Arc;

use blake2::{Blake2b512, Digest};
use tracing::trace;

use crate::error::DagError;
use crate::path::{RepoPath, RepoPathComponent, RepoPathComponentBuf};
use crate::revnum::Revnum;

/// Computes the content identity stored on a [`Node::File`]. Callers hash
/// content themselves (rather than `Transaction::make_file` taking raw
/// bytes) so storage backends that already have a content-addressed blob
/// store can pass its hash straight through.
pub fn hash_content(bytes: &[u8]) -> [u8; 64] {
    let mut hasher = Blake2b512::new();
    hasher.update(bytes);
    hasher.finalize().into()
}

/// Opaque identifier for a node's in-memory storage slot. Not stable across
/// processes; only meaningful within one [`Dag`].
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct NodeId(u64);

/// Identifies which "branch" in copy history a node belongs to.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct CopyId(u64);

impl CopyId {
    /// "Never been involved in a copy."
    pub const ROOT: CopyId = CopyId(0);
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum NodeKind {
    File,
    Directory,
    None,
    Unknown,
}

/// Identity fields shared by every node (spec §3's "Node identity").
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct NodeMeta {
    pub created_rev: Revnum,
    pub created_path: RepoPath,
    pub copy_id: CopyId,
    pub copy_root: (Revnum, RepoPath),
    /// This node's previous interesting (content-or-properties-changed)
    /// revision, if any, for [`crate::dag::history`].
    pub predecessor: Option<NodeId>,
    /// Set when this node is the destination of a copy: the node it was
    /// copied from, for `cross_copies` history walks.
    pub copied_from: Option<NodeId>,
}

#[derive(Clone, Debug)]
pub enum Node {
    File { meta: NodeMeta, content_hash: [u8; 64] },
    Directory { meta: NodeMeta, entries: BTreeMap<RepoPathComponentBuf, NodeId> },
    Unknown { meta: NodeMeta },
}

impl Node {
    pub fn kind(&self) -> NodeKind {
        match self {
            Node::File { .. } => NodeKind::File,
            Node::Directory { .. } => NodeKind::Directory,
            Node::Unknown { .. } => NodeKind::Unknown,
        }
    }

    pub fn meta(&self) -> &NodeMeta {
        match self {
            Node::File { meta, .. } | Node::Directory { meta, .. } | Node::Unknown { meta } => meta,
        }
    }

    pub fn entries(&self) -> Option<&BTreeMap<RepoPathComponentBuf, NodeId>> {
        match self {
            Node::Directory { entries, .. } => Some(entries),
            _ => None,
        }
    }

    pub fn content_hash(&self) -> Option<&[u8; 64]> {
        match self {
            Node::File { content_hash, .. } => Some(content_hash),
            _ => None,
        }
    }
}

/// The committed-revision store: an append-only sequence of root nodes plus
/// the shared, immutable nodes they and their ancestors reference.
///
/// Persistence is out of scope; this is the in-memory authority a
/// `RepositoryAccess` implementation would back with actual pack/index
/// files.
pub struct Dag {
    nodes: std::collections::HashMap<NodeId, Arc<Node>>,
    revision_roots: Vec<NodeId>,
    next_node_id: u64,
    next_copy_id: u64,
}

impl Dag {
    /// A fresh repository: revision 0 is an empty directory.
    pub fn new() -> Self {
        let mut dag = Dag {
            nodes: std::collections::HashMap::new(),
            revision_roots: Vec::new(),
            next_node_id: 1,
            next_copy_id: 1,
        };
        let root_id = dag.insert_node(Node::Directory {
            meta: NodeMeta {
                created_rev: Revnum::ZERO,
                created_path: RepoPath::root(),
                copy_id: CopyId::ROOT,
                copy_root: (Revnum::ZERO, RepoPath::root()),
                predecessor: None,
                copied_from: None,
            },
            entries: BTreeMap::new(),
        });
        dag.revision_roots.push(root_id);
        dag
    }

    pub fn youngest(&self) -> Revnum {
        Revnum::new(self.revision_roots.len() as u64 - 1)
    }

    pub fn revision_root(&self, revision: Revnum) -> Result<Arc<Node>, DagError> {
        let id = self.revision_root_id(revision)?;
        Ok(Arc::clone(&self.nodes[&id]))
    }

    /// The root node's id for `revision`, without fetching the node itself.
    pub(crate) fn revision_root_id(&self, revision: Revnum) -> Result<NodeId, DagError> {
        let index = revision
            .as_u64()
            .filter(|&rev| rev <= self.revision_roots.len() as u64 - 1)
            .ok_or(DagError::NoSuchRevision(revision, self.youngest()))?;
        Ok(self.revision_roots[index as usize])
    }

    pub fn node(&self, id: NodeId) -> Arc<Node> {
        Arc::clone(&self.nodes[&id])
    }

    /// `Open(parent, entry-name)`: the child node, or `None` (not an error).
    pub fn open(&self, parent: &Node, name: &RepoPathComponent) -> Option<Arc<Node>> {
        let entries = parent.entries()?;
        let id = *entries.get(name)?;
        Some(self.node(id))
    }

    pub(crate) fn alloc_node_id(&mut self) -> NodeId {
        let id = NodeId(self.next_node_id);
        self.next_node_id += 1;
        id
    }

    pub fn alloc_copy_id(&mut self) -> CopyId {
        let id = CopyId(self.next_copy_id);
        self.next_copy_id += 1;
        id
    }

    pub(crate) fn insert_node(&mut self, node: Node) -> NodeId {
        let id = self.alloc_node_id();
        self.nodes.insert(id, Arc::new(node));
        id
    }

    /// Promotes `root` to a freshly allocated revision. Used by
    /// [`crate::dag::transaction::Transaction::commit`] once it has
    /// materialized every mutable clone as an immutable [`Node`].
    pub(crate) fn commit_root(&mut self, root: NodeId) -> Revnum {
        self.revision_roots.push(root);
        trace!(revision = ?self.youngest(), "committed new revision");
        self.youngest()
    }
}

impl Default for Dag {
    fn default() -> Self {
        Dag::new()
    }
}
