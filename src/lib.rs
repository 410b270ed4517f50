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

//! A versioned-storage and merge-tracking engine: an append-only,
//! globally-numbered sequence of full-tree repository revisions with
//! structural sharing, a mergeinfo interval algebra recording which
//! revisions from which source paths have been merged into each node, and a
//! merge driver that uses that record to compute and apply future merges.
//!
//! Module map:
//!
//! - [`revnum`]: the revision-number type and its `INVALID` sentinel.
//! - [`path`]: tree-relative paths and absolute mergeinfo source paths.
//! - [`rangelist`]: the revision-range interval algebra.
//! - [`mergeinfo`]: rangelists lifted to source-path maps, plus the
//!   bit-exact text format.
//! - [`dag`]: committed nodes, history, the two-level cache, the path
//!   resolver, and mutable transactions.
//! - [`mergeinfo_retrieval`]: composing a working-copy path's effective
//!   mergeinfo from explicit, inherited, and repository sources.
//! - [`merge`]: the merge planner, driver, and elision.
//! - [`ra`]: the abstract Repository Access interface and reporter
//!   protocol.
//! - [`error`]: the crate's error vocabulary.

pub mod dag;
pub mod error;
pub mod merge;
pub mod mergeinfo;
pub mod mergeinfo_retrieval;
pub mod path;
pub mod ra;
pub mod rangelist;
pub mod revnum;
