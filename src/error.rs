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

//! Error kinds raised by the engine (spec §7), one `thiserror` enum per
//! subsystem plus a crate-level [`Error`] that composes them.
//!
//! Propagation policy: errors bubble up unwrapped through every layer except
//! where a caller explicitly recovers (e.g. [`RaError::NotImplemented`] from
//! `get_mergeinfo` is treated as "mergeinfo absent" by
//! [`crate::mergeinfo_retrieval`], never surfaced to the merge driver's
//! caller).

use std::path::PathBuf;

use thiserror::Error;

use crate::revnum::Revnum;

/// Errors from the rangelist algebra (spec §4.1).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RangelistError {
    #[error("invalid range: start {start} >= end {end}")]
    InvalidRange { start: i64, end: i64 },
    #[error("ranges are unordered or overlap at revision {0}")]
    Unordered(i64),
    #[error("could not parse rangelist element {0:?}")]
    MalformedElement(String),
}

/// Errors from the mergeinfo algebra and text format (spec §4.2, §6).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MergeinfoError {
    #[error("mergeinfo line has no ':' separator: {0:?}")]
    MissingColon(String),
    #[error("mergeinfo source path is empty")]
    EmptyPath,
    #[error(transparent)]
    Rangelist(#[from] RangelistError),
}

/// Errors from the DAG, path resolver, and transaction layer (spec §4.3,
/// §4.4).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DagError {
    #[error("no such revision {0}, youngest is {1}")]
    NoSuchRevision(Revnum, Revnum),
    #[error("path {0:?} not found")]
    NotFound(String),
    #[error("path {0:?} is not a directory")]
    NotDirectory(String),
    #[error("path {0:?} is not a file")]
    NotFile(String),
    #[error("node at {0:?} is not mutable")]
    NotMutable(String),
}

/// Errors from the merge planner and driver (spec §4.6, §4.7).
#[derive(Debug, Error)]
pub enum MergeError {
    #[error("source and target use different URL schemes")]
    SchemeMismatch,
    #[error("source and target belong to unrelated repositories")]
    BadUrl,
    #[error("nodes are unrelated and ignore-ancestry is false")]
    UnrelatedResources,
    #[error("operation cancelled")]
    Cancelled,
    #[error("incorrect parameters: {0}")]
    IncorrectParams(&'static str),
    #[error(transparent)]
    Dag(#[from] DagError),
    #[error(transparent)]
    Mergeinfo(#[from] MergeinfoError),
    #[error(transparent)]
    Ra(#[from] RaError),
}

/// Errors surfaced by the abstract Repository Access interface (spec §6).
#[derive(Debug, Error)]
pub enum RaError {
    #[error("operation not implemented by this RA session")]
    NotImplemented,
    #[error("path {0:?} does not exist at the requested revision")]
    NotFound(String),
    #[error("no such revision {0}")]
    NoSuchRevision(Revnum),
    #[error(transparent)]
    Other(Box<dyn std::error::Error + Send + Sync>),
}

/// Error wrapping a successful commit whose post-commit hook failed. The new
/// revision is still observable by the caller (spec §7).
#[derive(Debug, Error)]
#[error("commit succeeded as r{revision} but the post-commit hook failed: {hook_error}")]
pub struct PostCommitHookError {
    pub revision: Revnum,
    #[source]
    pub hook_error: Box<dyn std::error::Error + Send + Sync>,
}

/// Raised when a [`crate::dag::ParentPathChain`] resolution allowed absent
/// last components but a required ancestor was a non-directory.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("invalid path {0:?}")]
pub struct InvalidPath(pub PathBuf);

/// Top-level crate error composing every subsystem's error type.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Rangelist(#[from] RangelistError),
    #[error(transparent)]
    Mergeinfo(#[from] MergeinfoError),
    #[error(transparent)]
    Dag(#[from] DagError),
    #[error(transparent)]
    Merge(#[from] MergeError),
    #[error(transparent)]
    Ra(#[from] RaError),
    #[error(transparent)]
    PostCommitHook(#[from] PostCommitHookError),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
