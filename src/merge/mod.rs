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

//! Merging: computing what to merge (spec §4.6), applying it to a working
//! copy (spec §4.7), and dropping mergeinfo that applying it made redundant
//! (spec §4.8).

mod driver;
mod elision;
mod guard;
mod planner;

pub use driver::{
    MergeDriver, MergeOutcome, MergeTarget, NotificationCounts, RangeOutcome, TextMergeOutcome, TextMerger,
};
pub use elision::{elide, elide_at, elide_subtree, ElisionOutcome, ElisionStore};
pub use guard::{validate, MergeRequest};
pub use planner::{plan, Direction, MergePlan, PlanRange};
