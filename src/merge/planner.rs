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

//! The merge planner (spec §4.6): from a requested revision range and the
//! target's existing mergeinfo, computes the minimal set of sub-ranges that
//! still need to be applied.

use crate::rangelist::{Range, RangeList};
use crate::revnum::Revnum;

/// Whether a plan merges forward (`rev1 < rev2`) or rolls back
/// (`rev1 > rev2`).
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Direction {
    Forward,
    Rollback,
}

/// One sub-range the driver should diff and apply: `source@start` to
/// `source@end`, in the literal sense of spec §4.7 step 2 ("a tree diff
/// between `source@r.start` and `source@r.end`"). For a rollback plan,
/// `start > end`: the diff runs backwards, from the later revision to the
/// earlier one, per §4.1's `Reverse`.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct PlanRange {
    pub start: Revnum,
    pub end: Revnum,
    pub inheritable: bool,
}

/// The computed plan: zero or more [`PlanRange`]s, already ordered for the
/// driver to apply (spec §5: ascending by the *original* requested
/// revisions, regardless of direction — a rollback plan's ranges are
/// individually reversed, but the sequence itself is not).
#[derive(Clone, Debug)]
pub struct MergePlan {
    pub direction: Direction,
    pub ranges: Vec<PlanRange>,
}

impl MergePlan {
    fn empty(direction: Direction) -> Self {
        MergePlan { direction, ranges: Vec::new() }
    }

    /// "A plan of zero ranges means nothing to do."
    pub fn is_noop(&self) -> bool {
        self.ranges.is_empty()
    }
}

/// Computes the plan for merging `[rev1, rev2]` (`rev1 == rev2` is a no-op;
/// `rev1 < rev2` merges forward, `rev1 > rev2` rolls back).
///
/// `source_self_claim` is the rangelist the *source* repository's own
/// mergeinfo already claims for the target path — subtracted from the naive
/// requested range first, to guard against re-merging history the source
/// imported back from the target (spec §9 item 4, "reflective-merge
/// subtraction"). `target_rangelist` is the target's current mergeinfo entry
/// for the source path (`M`, looked up at the source-relative path).
///
/// Both rangelists may be empty (no prior claim / no prior merges).
pub fn plan(
    rev1: Revnum,
    rev2: Revnum,
    source_self_claim: &RangeList,
    target_rangelist: &RangeList,
) -> MergePlan {
    if rev1 == rev2 {
        return MergePlan::empty(Direction::Forward);
    }
    let direction = if rev1 < rev2 { Direction::Forward } else { Direction::Rollback };

    let lo = rev1.min(rev2).as_u64().expect("plan() requires valid revisions") as i64;
    let hi = rev1.max(rev2).as_u64().expect("plan() requires valid revisions") as i64;
    // `[rev1, rev2]` names the revision *before* the first change to merge
    // and the last one to include (the usual "-rN:M" convention: merges
    // whatever was committed after N, up through M). So the naive requested
    // rangelist covers `lo+1 ..= hi`, never `lo` itself — which matters when
    // `lo` is revision 0, the empty initial revision that can never be the
    // source of a merge.
    let naive = RangeList::from_ranges([Range::new(lo + 1, hi + 1, true).expect("lo < hi")]);

    let requested = naive.difference(source_self_claim, false);
    let remaining = match direction {
        Direction::Forward => requested.difference(target_rangelist, false),
        Direction::Rollback => requested.intersection(target_rangelist),
    };

    let ranges = remaining
        .ranges()
        .iter()
        .map(|r| to_plan_range(*r, direction))
        .collect();
    MergePlan { direction, ranges }
}

/// Converts a canonical rangelist range (revisions `[start, end)`, i.e. the
/// inclusive revisions `start ..= end - 1`) into the pair of repository
/// snapshots the driver diffs between: one revision before the first merged
/// revision, and the last merged revision itself. For a rollback, these are
/// swapped (spec §4.1 `Reverse`: "flip the sequence order and swap each
/// range's start and end").
fn to_plan_range(r: Range, direction: Direction) -> PlanRange {
    let before_first = (r.start - 1).max(0) as u64;
    let last = (r.end - 1) as u64;
    match direction {
        Direction::Forward => PlanRange {
            start: Revnum::new(before_first),
            end: Revnum::new(last),
            inheritable: r.inheritable,
        },
        Direction::Rollback => PlanRange {
            start: Revnum::new(last),
            end: Revnum::new(before_first),
            inheritable: r.inheritable,
        },
    }
}
