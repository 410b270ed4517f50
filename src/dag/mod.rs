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

//! The versioned tree: committed nodes, history traversal, path resolution,
//! caching, and the mutable transaction layer built on top of them (spec
//! §4.3, §4.4).

mod cache;
mod history;
mod node;
mod resolver;
mod transaction;

pub use cache::DagCache;
pub use history::{related, History};
pub use node::{CopyId, Dag, Node, NodeId, NodeKind, NodeMeta};
pub use resolver::{decide_copy_inheritance, resolve, CopyInheritance, ParentPathChain};
pub use transaction::Transaction;
