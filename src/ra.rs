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

//! The abstract Repository Access interface (spec §6): the transport- and
//! storage-independent boundary the rest of the engine is driven through.
//! Transports (local, HTTP, whatever) are capability sets implementing
//! [`RaSession`]; nothing here reaches into `dag` storage directly.

use std::collections::BTreeMap;

use crate::dag::NodeKind;
use crate::error::RaError;
use crate::mergeinfo::Mergeinfo;
use crate::path::{RepoPath, RepoPathComponentBuf, SourcePath};
use crate::revnum::Revnum;

/// A node property bag: name to opaque string value.
pub type Properties = BTreeMap<String, String>;

/// Depth of a tree operation, from shallowest to deepest.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Depth {
    Empty,
    Files,
    Immediates,
    Infinity,
}

/// Which inheritance mode a `get_mergeinfo` call should apply.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum MergeinfoInheritance {
    /// Only mergeinfo explicitly set at the path.
    Explicit,
    /// Explicit mergeinfo, or the nearest inherited value if none is set.
    Inherited,
    /// Like `Inherited`, but never returns the path's own explicit value.
    NearestAncestor,
}

/// Outcome states a tree-edit callback reports back to the driver (spec
/// §4.7's "Notification states").
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum NotificationState {
    Unchanged,
    Changed,
    Merged,
    Conflicted,
    Missing,
    Obstructed,
    Unknown,
}

/// One entry from `get_log`.
#[derive(Clone, Debug)]
pub struct LogEntry {
    pub revision: Revnum,
    pub author: Option<String>,
    pub date: Option<String>,
    pub message: Option<String>,
    /// Populated only when the caller asked for changed-paths.
    pub changed_paths: Option<BTreeMap<RepoPath, ChangeAction>>,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum ChangeAction {
    Add,
    Delete,
    Replace,
    Modify,
}

/// The tree-edit callback table a `do_diff` caller drives (spec §4.7 step
/// 3). Implementations apply changes to a working copy and report the
/// resulting [`NotificationState`] for each path.
pub trait TreeEditor {
    /// `related` reports whether the pre- and post-image nodes are related
    /// in the DAG-ancestry sense (spec §3): the implementation drives this
    /// from the node history it has access to (e.g. [`crate::dag::related`]
    /// for a `Dag`-backed session). When `false` and the driver's
    /// `ignore-ancestry` is also `false`, the merge is downgraded to a
    /// delete + add rather than a 3-way merge (spec §7).
    fn file_changed(
        &mut self,
        path: &RepoPath,
        related: bool,
        old_content: &[u8],
        old_props: &Properties,
        new_content: &[u8],
        new_props: &Properties,
    ) -> Result<NotificationState, RaError>;

    fn file_added(
        &mut self,
        path: &RepoPath,
        content: &[u8],
        props: &Properties,
    ) -> Result<NotificationState, RaError>;

    fn file_deleted(&mut self, path: &RepoPath) -> Result<NotificationState, RaError>;

    fn dir_added(&mut self, path: &RepoPath, props: &Properties) -> Result<NotificationState, RaError>;

    fn dir_deleted(&mut self, path: &RepoPath) -> Result<NotificationState, RaError>;
}

/// The client-to-server reporter protocol (spec §6): describes the client's
/// current state before a server-driven update or diff. Calls must be issued
/// depth-first, parents before children, all children of a parent before any
/// sibling; the first call is always `set_path("", ...)`.
pub trait Reporter {
    fn set_path(&mut self, path: &RepoPath, rev: Revnum, start_empty: bool) -> Result<(), RaError>;

    fn link_path(
        &mut self,
        path: &RepoPath,
        url: &str,
        rev: Revnum,
        start_empty: bool,
    ) -> Result<(), RaError>;

    fn delete_path(&mut self, path: &RepoPath) -> Result<(), RaError>;

    fn finish_report(self: Box<Self>) -> Result<(), RaError>;

    fn abort_report(self: Box<Self>) -> Result<(), RaError>;
}

/// An open session rooted at one repository URL (spec §6's Repository
/// Access table).
pub trait RaSession {
    fn youngest(&self) -> Result<Revnum, RaError>;

    fn get_file(&self, path: &RepoPath, rev: Revnum) -> Result<(Vec<u8>, Properties, Revnum), RaError>;

    fn get_dir(
        &self,
        path: &RepoPath,
        rev: Revnum,
    ) -> Result<(BTreeMap<RepoPathComponentBuf, NodeKind>, Properties, Revnum), RaError>;

    /// May legitimately return an empty map; callers must not treat that as
    /// an error. Pre-mergeinfo-era servers return `not-implemented`.
    fn get_mergeinfo(
        &self,
        paths: &[SourcePath],
        rev: Revnum,
        inheritance: MergeinfoInheritance,
    ) -> Result<BTreeMap<SourcePath, Mergeinfo>, RaError>;

    /// Initiates a tree diff parameterized by `depth` and `ignore_ancestry`
    /// (spec §4.7 step 2): `ignore_ancestry` is threaded through so the
    /// session can compute the `related` flag it reports on each
    /// [`TreeEditor::file_changed`] call accordingly.
    fn do_diff(
        &self,
        rev_start: Revnum,
        rev_end: Revnum,
        target: &RepoPath,
        depth: Depth,
        ignore_ancestry: bool,
        editor: &mut dyn TreeEditor,
    ) -> Result<Box<dyn Reporter>, RaError>;

    fn get_locations(
        &self,
        path: &RepoPath,
        peg: Revnum,
        revs: &[Revnum],
    ) -> Result<BTreeMap<Revnum, RepoPath>, RaError>;

    fn check_path(&self, path: &RepoPath, rev: Revnum) -> Result<NodeKind, RaError>;

    fn get_log(
        &self,
        paths: &[RepoPath],
        range: (Revnum, Revnum),
        limit: Option<u32>,
        changed_paths: bool,
        strict_history: bool,
        receiver: &mut dyn FnMut(&LogEntry) -> Result<(), RaError>,
    ) -> Result<(), RaError>;
}
