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

//! `NodeHistory` / `HistoryPrev` (spec §4.3): a lazy, finite,
//! non-restartable backwards walk over a node's lineage.

use crate::dag::node::{Dag, NodeId};

/// Created by [`Dag::history`][super::node::Dag]; call [`History::prev`]
/// repeatedly. The first call returns the node itself.
pub struct History<'a> {
    dag: &'a Dag,
    current: Option<NodeId>,
    started: bool,
}

impl<'a> History<'a> {
    pub fn new(dag: &'a Dag, start: NodeId) -> Self {
        History { dag, current: Some(start), started: false }
    }

    /// Returns the node itself on the first call, then walks backwards
    /// through `predecessor` links. With `cross_copies = false` the walk
    /// stops at the copy that introduced the current name; with `true` it
    /// continues through the copy source.
    pub fn prev(&mut self, cross_copies: bool) -> Option<NodeId> {
        if !self.started {
            self.started = true;
            return self.current;
        }
        let current_id = self.current?;
        let current = self.dag.node(current_id);
        let meta = current.meta();
        let next = meta.predecessor.or_else(|| cross_copies.then_some(meta.copied_from).flatten());
        self.current = next;
        self.current
    }
}

/// Spec §3's node relatedness: `a` and `b` are related iff one is reachable
/// from the other by walking predecessor (and, across copies,
/// `copied_from`) links. This is the relation the merge driver and the
/// copy-root decision in [`crate::dag::transaction`] consult.
pub fn related(dag: &Dag, a: NodeId, b: NodeId) -> bool {
    reaches(dag, a, b) || reaches(dag, b, a)
}

fn reaches(dag: &Dag, from: NodeId, target: NodeId) -> bool {
    let mut history = History::new(dag, from);
    while let Some(id) = history.prev(true) {
        if id == target {
            return true;
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;
    use crate::dag::node::{CopyId, Node, NodeMeta};
    use crate::path::RepoPath;
    use crate::revnum::Revnum;

    fn leaf(dag: &mut Dag, rev: u64, predecessor: Option<NodeId>, copied_from: Option<NodeId>) -> NodeId {
        dag.insert_node(Node::File {
            meta: NodeMeta {
                created_rev: Revnum::new(rev),
                created_path: RepoPath::from_internal_string("f"),
                copy_id: CopyId::ROOT,
                copy_root: (Revnum::ZERO, RepoPath::root()),
                predecessor,
                copied_from,
            },
            content_hash: [0; 64],
        })
    }

    #[test]
    fn first_prev_returns_self() {
        let mut dag = Dag::new();
        let n = leaf(&mut dag, 1, None, None);
        let mut history = History::new(&dag, n);
        assert_eq!(history.prev(false), Some(n));
    }

    #[test]
    fn walks_predecessor_chain_then_stops() {
        let mut dag = Dag::new();
        let n1 = leaf(&mut dag, 1, None, None);
        let n2 = leaf(&mut dag, 2, Some(n1), None);
        let n3 = leaf(&mut dag, 3, Some(n2), None);
        let mut history = History::new(&dag, n3);
        assert_eq!(history.prev(false), Some(n3));
        assert_eq!(history.prev(false), Some(n2));
        assert_eq!(history.prev(false), Some(n1));
        assert_eq!(history.prev(false), None);
    }

    #[test]
    fn cross_copies_continues_into_copy_source() {
        let mut dag = Dag::new();
        let source = leaf(&mut dag, 1, None, None);
        let dest = leaf(&mut dag, 2, None, Some(source));
        let mut without_cross = History::new(&dag, dest);
        assert_eq!(without_cross.prev(false), Some(dest));
        assert_eq!(without_cross.prev(false), None);

        let mut with_cross = History::new(&dag, dest);
        assert_eq!(with_cross.prev(true), Some(dest));
        assert_eq!(with_cross.prev(true), Some(source));
    }

    #[test]
    fn related_true_across_predecessor_chain() {
        let mut dag = Dag::new();
        let n1 = leaf(&mut dag, 1, None, None);
        let n2 = leaf(&mut dag, 2, Some(n1), None);
        assert!(related(&dag, n1, n2));
        assert!(related(&dag, n2, n1));
    }

    #[test]
    fn related_true_across_copy_source() {
        let mut dag = Dag::new();
        let source = leaf(&mut dag, 1, None, None);
        let dest = leaf(&mut dag, 2, None, Some(source));
        assert!(related(&dag, source, dest));
        assert!(related(&dag, dest, source));
    }

    #[test]
    fn unrelated_nodes_are_not_related() {
        let mut dag = Dag::new();
        let a = leaf(&mut dag, 1, None, None);
        let b = leaf(&mut dag, 1, None, None);
        assert!(!related(&dag, a, b));
    }
}
