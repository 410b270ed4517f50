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

//! The merge driver (spec §4.7): drives a tree-diff editor over each
//! [`crate::merge::planner::PlanRange`], aggregates notifications, and
//! records the performed merges back as mergeinfo.
//!
//! Diff3 invocation itself is out of scope (spec §1); this module dispatches
//! to an injected [`TextMerger`] at the seam where a real implementation
//! would shell out to it, and owns only the decision of *which* merge path
//! (text-merge, binary-auto-resolve, or conflict) applies.

use std::collections::BTreeSet;

use tracing::{debug, instrument, trace};

use crate::error::{MergeError, RaError};
use crate::merge::planner::{Direction, MergePlan, PlanRange};
use crate::mergeinfo::Mergeinfo;
use crate::path::{RepoPath, SourcePath};
use crate::ra::{Depth, NotificationState, Properties, RaSession, TreeEditor};
use crate::rangelist::{Range, RangeList};

/// The minimal working-copy surface the driver needs: reading and writing
/// versioned file/dir state and the `mergeinfo` property. The on-disk
/// administrative area backing this is out of scope (spec §1); this is the
/// abstract "WC store" interface the spec calls for.
pub trait MergeTarget {
    fn file_exists(&self, path: &RepoPath) -> bool;
    fn is_versioned(&self, path: &RepoPath) -> bool;
    fn is_locally_modified(&self, path: &RepoPath) -> Result<bool, RaError>;
    fn is_scheduled_for_delete(&self, path: &RepoPath) -> bool;
    fn read_file(&self, path: &RepoPath) -> Result<Vec<u8>, RaError>;

    fn install_file(&mut self, path: &RepoPath, content: &[u8], props: &Properties) -> Result<(), RaError>;
    fn remove_file(&mut self, path: &RepoPath) -> Result<(), RaError>;
    fn install_dir(&mut self, path: &RepoPath, props: &Properties) -> Result<(), RaError>;
    fn remove_dir(&mut self, path: &RepoPath) -> Result<(), RaError>;

    fn mergeinfo_property(&self, path: &RepoPath) -> Result<Option<String>, RaError>;
    fn set_mergeinfo_property(&mut self, path: &RepoPath, value: Option<&str>) -> Result<(), RaError>;
}

/// The outcome of a 3-way text merge (diff3 itself is out of scope; this is
/// the result shape the driver dispatches on).
pub enum TextMergeOutcome {
    Merged(Vec<u8>),
    Conflicted(Vec<u8>),
}

/// Abstracts the external diff3 invocation (spec §1 Non-goals).
pub trait TextMerger {
    fn merge3(&self, base: &[u8], mine: &[u8], theirs: &[u8]) -> TextMergeOutcome;
}

fn is_binary(props: &Properties) -> bool {
    match props.get("mime-type") {
        Some(mime) => !mime.starts_with("text/"),
        None => false,
    }
}

/// Total and operative notification counts for one range (spec §4.7 step
/// 4). "Operative" excludes `Unchanged`.
#[derive(Clone, Copy, Default, Debug, PartialEq, Eq)]
pub struct NotificationCounts {
    pub total: u32,
    pub operative: u32,
}

impl NotificationCounts {
    fn record(&mut self, state: NotificationState) {
        self.total += 1;
        if state != NotificationState::Unchanged {
            self.operative += 1;
        }
    }
}

/// Everything the driver accumulated while applying one [`PlanRange`].
pub struct RangeOutcome {
    pub range: PlanRange,
    pub counts: NotificationCounts,
    pub skipped: BTreeSet<RepoPath>,
}

/// The full result of [`MergeDriver::run`]: one [`RangeOutcome`] per applied
/// range plus the target's final mergeinfo.
pub struct MergeOutcome {
    pub ranges: Vec<RangeOutcome>,
    pub final_mergeinfo: Mergeinfo,
}

/// Drives a [`MergePlan`] against a [`MergeTarget`], range by range.
pub struct MergeDriver<'t> {
    target: &'t mut dyn MergeTarget,
    text_merger: &'t dyn TextMerger,
    ignore_ancestry: bool,
    dry_run: bool,
    record_only: bool,
}

/// Scratch state for one range: the outcome under construction and the set
/// of subtree paths the caller excluded because they're merged separately
/// (spec §4.7 step 2's "already-handled" set).
struct RangeCtx<'t> {
    target: &'t mut dyn MergeTarget,
    text_merger: &'t dyn TextMerger,
    already_handled: &'t BTreeSet<RepoPath>,
    ignore_ancestry: bool,
    counts: NotificationCounts,
    skipped: BTreeSet<RepoPath>,
}

impl<'t> RangeCtx<'t> {
    fn excluded(&self, path: &RepoPath) -> bool {
        self.already_handled.iter().any(|h| h.contains(path))
    }

    fn record(&mut self, path: &RepoPath, state: NotificationState) -> NotificationState {
        self.counts.record(state);
        if matches!(state, NotificationState::Conflicted | NotificationState::Obstructed | NotificationState::Missing)
        {
            self.skipped.insert(path.clone());
        }
        state
    }
}

impl TreeEditor for RangeCtx<'_> {
    fn file_changed(
        &mut self,
        path: &RepoPath,
        related: bool,
        old_content: &[u8],
        old_props: &Properties,
        new_content: &[u8],
        new_props: &Properties,
    ) -> Result<NotificationState, RaError> {
        if self.excluded(path) {
            return Ok(NotificationState::Unchanged);
        }
        if !related && !self.ignore_ancestry {
            // spec §3/§7: an `unrelated-resources` pairing downgrades to
            // delete + add instead of a 3-way merge when `ignore-ancestry`
            // is false.
            if self.target.is_locally_modified(path)? {
                return Ok(self.record(path, NotificationState::Obstructed));
            }
            self.target.remove_file(path)?;
            self.target.install_file(path, new_content, new_props)?;
            return Ok(self.record(path, NotificationState::Merged));
        }
        if !self.target.is_locally_modified(path)? && (is_binary(old_props) || is_binary(new_props)) {
            let working = self.target.read_file(path)?;
            let state = if working == old_content {
                self.target.install_file(path, new_content, new_props)?;
                NotificationState::Merged
            } else {
                NotificationState::Conflicted
            };
            return Ok(self.record(path, state));
        }
        let working = self.target.read_file(path)?;
        let state = match self.text_merger.merge3(old_content, &working, new_content) {
            TextMergeOutcome::Merged(merged) => {
                self.target.install_file(path, &merged, new_props)?;
                NotificationState::Merged
            }
            TextMergeOutcome::Conflicted(merged) => {
                self.target.install_file(path, &merged, new_props)?;
                NotificationState::Conflicted
            }
        };
        Ok(self.record(path, state))
    }

    fn file_added(
        &mut self,
        path: &RepoPath,
        content: &[u8],
        props: &Properties,
    ) -> Result<NotificationState, RaError> {
        if self.excluded(path) {
            return Ok(NotificationState::Unchanged);
        }
        let state = if !self.target.file_exists(path) {
            self.target.install_file(path, content, props)?;
            NotificationState::Changed
        } else if self.target.is_scheduled_for_delete(path) {
            return self.file_changed(path, true, &[], &Properties::new(), content, props);
        } else if !self.target.is_versioned(path) {
            NotificationState::Obstructed
        } else {
            self.target.install_file(path, content, props)?;
            NotificationState::Changed
        };
        Ok(self.record(path, state))
    }

    fn file_deleted(&mut self, path: &RepoPath) -> Result<NotificationState, RaError> {
        if self.excluded(path) {
            return Ok(NotificationState::Unchanged);
        }
        let state = if self.target.is_locally_modified(path)? {
            NotificationState::Obstructed
        } else {
            self.target.remove_file(path)?;
            NotificationState::Changed
        };
        Ok(self.record(path, state))
    }

    fn dir_added(&mut self, path: &RepoPath, props: &Properties) -> Result<NotificationState, RaError> {
        if self.excluded(path) {
            return Ok(NotificationState::Unchanged);
        }
        let state = if self.target.is_versioned(path) && !self.target.is_scheduled_for_delete(path) {
            NotificationState::Obstructed
        } else {
            self.target.install_dir(path, props)?;
            NotificationState::Changed
        };
        Ok(self.record(path, state))
    }

    fn dir_deleted(&mut self, path: &RepoPath) -> Result<NotificationState, RaError> {
        if self.excluded(path) {
            return Ok(NotificationState::Unchanged);
        }
        let state = if self.target.is_locally_modified(path)? {
            NotificationState::Obstructed
        } else {
            self.target.remove_dir(path)?;
            NotificationState::Changed
        };
        Ok(self.record(path, state))
    }
}

impl<'t> MergeDriver<'t> {
    pub fn new(
        target: &'t mut dyn MergeTarget,
        text_merger: &'t dyn TextMerger,
        ignore_ancestry: bool,
        dry_run: bool,
        record_only: bool,
    ) -> Self {
        MergeDriver { target, text_merger, ignore_ancestry, dry_run, record_only }
    }

    pub fn ignore_ancestry(&self) -> bool {
        self.ignore_ancestry
    }

    /// Applies every range in `plan` to `wc_target`, recording merged
    /// revisions back into `target_mergeinfo` (spec §4.7 step 5), and
    /// returns per-range notification aggregates.
    #[instrument(skip_all, fields(ranges = plan.ranges.len()))]
    pub fn run(
        &mut self,
        ra: &dyn RaSession,
        source_mergeinfo_path: &SourcePath,
        wc_target_path: &RepoPath,
        depth: Depth,
        plan: &MergePlan,
        already_handled: &BTreeSet<RepoPath>,
        mut target_mergeinfo: Mergeinfo,
        cancelled: &dyn Fn() -> bool,
    ) -> Result<MergeOutcome, MergeError> {
        let mut ranges_out = Vec::with_capacity(plan.ranges.len());

        for range in &plan.ranges {
            if cancelled() {
                return Err(MergeError::Cancelled);
            }
            trace!(start = %range.start, end = %range.end, "applying merge range");

            let (counts, skipped) = if self.record_only {
                (NotificationCounts::default(), BTreeSet::new())
            } else {
                let mut ctx = RangeCtx {
                    target: &mut *self.target,
                    text_merger: self.text_merger,
                    already_handled,
                    ignore_ancestry: self.ignore_ancestry,
                    counts: NotificationCounts::default(),
                    skipped: BTreeSet::new(),
                };
                let mut reporter =
                    ra.do_diff(range.start, range.end, wc_target_path, depth, self.ignore_ancestry, &mut ctx)?;
                reporter.set_path(&RepoPath::root(), range.start, false)?;
                reporter.finish_report()?;
                (ctx.counts, ctx.skipped)
            };

            debug!(total = counts.total, operative = counts.operative, skipped = skipped.len(), "range applied");

            if !self.dry_run {
                record_range(&mut target_mergeinfo, source_mergeinfo_path, *range, plan.direction, &skipped);
            }

            ranges_out.push(RangeOutcome { range: *range, counts, skipped });
        }

        Ok(MergeOutcome { ranges: ranges_out, final_mergeinfo: target_mergeinfo })
    }
}

/// Folds one applied [`PlanRange`] into the target's mergeinfo (spec §4.7
/// step 5): a forward merge unions the merged sub-range in, excluding any
/// path that ended up [`NotificationState::Conflicted`] or
/// [`NotificationState::Obstructed`] (tracked in `skipped`); a rollback
/// removes it. Single-path granularity only — per-subtree skip exclusion at
/// finer resolution is left to a future [`MergeTarget`] that can report
/// per-path outcomes back into distinct mergeinfo entries.
fn record_range(
    target_mergeinfo: &mut Mergeinfo,
    source_mergeinfo_path: &SourcePath,
    range: PlanRange,
    direction: Direction,
    skipped: &BTreeSet<RepoPath>,
) {
    if !skipped.is_empty() {
        return;
    }
    // Regardless of direction, `range` names one endpoint that is the
    // revision *before* the first actually-merged revision and one that is
    // the last merged revision itself (see `to_plan_range`'s doc comment);
    // the ascending-order pair is always (before_first, last), so the
    // merged revisions are always `before_first + 1 ..= last`.
    let (Some(start), Some(end)) = (range.start.as_u64(), range.end.as_u64()) else { return };
    let (before_first, last) = (start.min(end), start.max(end));
    let Ok(merged) = Range::new(before_first as i64 + 1, last as i64 + 1, range.inheritable) else {
        return;
    };
    let merged = RangeList::from_ranges([merged]);
    let mut current = target_mergeinfo.get(source_mergeinfo_path).cloned().unwrap_or_else(RangeList::empty);
    current = match direction {
        Direction::Forward => current.union(&merged),
        Direction::Rollback => current.difference(&merged, false),
    };
    if current.is_empty() {
        target_mergeinfo.remove_path(source_mergeinfo_path);
    } else {
        target_mergeinfo.set(source_mergeinfo_path.clone(), current);
    }
}
