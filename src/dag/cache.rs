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

//! The two-level DAG cache (spec §4.4): a fixed-capacity, direct-mapped L1
//! in front of an evicting L2, keyed by `(revision, path)`.

use std::num::NonZeroUsize;
use std::sync::Arc;
use std::sync::Mutex;

use clru::CLruCache;
use tracing::trace;

use crate::dag::node::Node;
use crate::path::RepoPath;
use crate::revnum::Revnum;

const BUCKET_COUNT: usize = 256;
const L2_CAPACITY: usize = 4096;

#[derive(Clone)]
struct Bucket {
    hash: u64,
    revision: Revnum,
    path: String,
    node: Option<Arc<Node>>,
}

/// Folds the path 8 bytes at a time with the revision as seed, finishing
/// byte-wise on the tail. The exact mixing constants are not an interface
/// guarantee, only that two different revisions of the same path should not
/// alias in the common case.
fn hash_key(revision: Revnum, path: &str) -> u64 {
    let mut hash = revision.as_u64().unwrap_or(u64::MAX) ^ 0x9E37_79B9_7F4A_7C15;
    let bytes = path.as_bytes();
    let mut chunks = bytes.chunks_exact(8);
    for chunk in &mut chunks {
        let word = u64::from_le_bytes(chunk.try_into().unwrap());
        hash = hash.rotate_left(13) ^ word.wrapping_mul(0x1000_0000_01B3);
    }
    for &byte in chunks.remainder() {
        hash = hash.rotate_left(7) ^ (byte as u64).wrapping_mul(0x0100_0000_01B3);
    }
    hash
}

/// L1: a fixed 256-bucket direct-mapped table. Collisions simply overwrite;
/// there is no probing. All buckets are flushed wholesale once cumulative
/// insertions exceed the bucket count.
struct L1 {
    buckets: Vec<Option<Bucket>>,
    insertions: usize,
    last_hit: Option<usize>,
    last_non_empty: Option<usize>,
}

impl L1 {
    fn new() -> Self {
        L1 { buckets: vec![None; BUCKET_COUNT], insertions: 0, last_hit: None, last_non_empty: None }
    }

    fn index_for(hash: u64) -> usize {
        (hash as usize) % BUCKET_COUNT
    }

    fn lookup(&mut self, revision: Revnum, path: &str) -> Option<Option<Arc<Node>>> {
        let hash = hash_key(revision, path);
        let index = Self::index_for(hash);
        let bucket = self.buckets[index].as_ref()?;
        if bucket.hash == hash && bucket.revision == revision && bucket.path == path {
            self.last_hit = Some(index);
            if bucket.node.is_some() {
                self.last_non_empty = Some(index);
            }
            return Some(bucket.node.clone());
        }
        None
    }

    /// The optimistic same-path shortcut (spec §4.4): the last non-empty
    /// bucket's node, if its `created_path` matches `path` and its
    /// `created_rev` matches `revision` — even though the *requested*
    /// revision may differ from the bucket's own cached revision.
    fn optimistic_lookup(&self, revision: Revnum, path: &RepoPath) -> Option<Arc<Node>> {
        let bucket = self.buckets[self.last_non_empty?].as_ref()?;
        let node = bucket.node.as_ref()?;
        let meta = node.meta();
        if meta.created_path == *path && meta.created_rev == revision {
            return Some(Arc::clone(node));
        }
        None
    }

    fn insert(&mut self, revision: Revnum, path: &str, node: Option<Arc<Node>>) {
        let hash = hash_key(revision, path);
        let index = Self::index_for(hash);
        self.buckets[index] =
            Some(Bucket { hash, revision, path: path.to_owned(), node: node.clone() });
        if node.is_some() {
            self.last_non_empty = Some(index);
        }
        self.last_hit = Some(index);
        self.insertions += 1;
        if self.insertions > BUCKET_COUNT {
            trace!("L1 dag cache arena overflow, flushing");
            self.buckets = vec![None; BUCKET_COUNT];
            self.insertions = 0;
            self.last_hit = None;
            self.last_non_empty = None;
        }
    }

    /// Clears every bucket whose key path is `path` or a descendant.
    fn invalidate_subtree(&mut self, path: &RepoPath) {
        for bucket in &mut self.buckets {
            let stale = bucket
                .as_ref()
                .is_some_and(|b| path.contains(&RepoPath::from_internal_string(&b.path)));
            if stale {
                *bucket = None;
            }
        }
    }
}

/// The full two-level cache: L1 above, backed by an evicting L2 holding
/// deep-copied snapshots so they outlive L1 flushes.
pub struct DagCache {
    l1: Mutex<L1>,
    l2: Mutex<CLruCache<String, Arc<Node>>>,
}

impl DagCache {
    pub fn new() -> Self {
        DagCache {
            l1: Mutex::new(L1::new()),
            l2: Mutex::new(CLruCache::new(NonZeroUsize::new(L2_CAPACITY).unwrap())),
        }
    }

    fn l2_key(revision: Revnum, path: &str) -> String {
        format!("{revision}:{path}")
    }

    /// Consults L1 then L2. `None` means "not cached"; `Some(None)` means
    /// "cached as absent" (not currently produced by this model, reserved
    /// for callers that want to cache negative lookups).
    pub fn lookup(&self, revision: Revnum, path: &RepoPath) -> Option<Arc<Node>> {
        let path_str = path.as_internal_str();
        if let Some(hit) = self.l1.lock().unwrap().lookup(revision, path_str) {
            return hit;
        }
        let key = Self::l2_key(revision, path_str);
        let mut l2 = self.l2.lock().unwrap();
        let node = l2.get(&key).cloned();
        if let Some(node) = &node {
            self.l1.lock().unwrap().insert(revision, path_str, Some(Arc::clone(node)));
        }
        node
    }

    pub fn optimistic_lookup(&self, revision: Revnum, path: &RepoPath) -> Option<Arc<Node>> {
        self.l1.lock().unwrap().optimistic_lookup(revision, path)
    }

    pub fn insert(&self, revision: Revnum, path: &RepoPath, node: Arc<Node>) {
        let path_str = path.as_internal_str();
        self.l1.lock().unwrap().insert(revision, path_str, Some(Arc::clone(&node)));
        let key = Self::l2_key(revision, path_str);
        self.l2.lock().unwrap().put(key, node);
    }

    /// Clears every entry whose key path is `path` or a descendant. The
    /// global revision cache is never invalidated this way — only a
    /// transaction-local `DagCache` instance should call this.
    pub fn invalidate_subtree(&self, path: &RepoPath) {
        self.l1.lock().unwrap().invalidate_subtree(path);
        let mut l2 = self.l2.lock().unwrap();
        let stale: Vec<String> = l2
            .iter()
            .filter(|(key, _)| {
                key.split_once(':').is_some_and(|(_, p)| {
                    path.contains(&RepoPath::from_internal_string(p))
                })
            })
            .map(|(key, _)| key.clone())
            .collect();
        for key in stale {
            l2.pop(&key);
        }
    }
}

impl Default for DagCache {
    fn default() -> Self {
        DagCache::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dag::node::{CopyId, NodeMeta};
    use std::collections::BTreeMap;

    fn dummy_node(path: &str, rev: u64) -> Arc<Node> {
        Arc::new(Node::Directory {
            meta: NodeMeta {
                created_rev: Revnum::new(rev),
                created_path: RepoPath::from_internal_string(path),
                copy_id: CopyId::ROOT,
                copy_root: (Revnum::ZERO, RepoPath::root()),
                predecessor: None,
                copied_from: None,
            },
            entries: BTreeMap::new(),
        })
    }

    #[test]
    fn insert_then_hit() {
        let cache = DagCache::new();
        let path = RepoPath::from_internal_string("trunk/a");
        let node = dummy_node("trunk/a", 5);
        cache.insert(Revnum::new(5), &path, Arc::clone(&node));
        assert!(Arc::ptr_eq(&cache.lookup(Revnum::new(5), &path).unwrap(), &node));
    }

    #[test]
    fn miss_on_different_path() {
        let cache = DagCache::new();
        let path = RepoPath::from_internal_string("trunk/a");
        cache.insert(Revnum::new(5), &path, dummy_node("trunk/a", 5));
        assert!(cache.lookup(Revnum::new(5), &RepoPath::from_internal_string("trunk/b")).is_none());
    }

    #[test]
    fn optimistic_same_path_different_revision() {
        let cache = DagCache::new();
        let path = RepoPath::from_internal_string("trunk/a");
        let node = dummy_node("trunk/a", 5);
        cache.insert(Revnum::new(9), &path, Arc::clone(&node));
        // Requested revision (5) differs from the cache key's revision (9),
        // but matches the cached node's own created_rev.
        let hit = cache.optimistic_lookup(Revnum::new(5), &path);
        assert!(hit.is_some());
    }

    #[test]
    fn invalidate_subtree_clears_descendants_only() {
        let cache = DagCache::new();
        let a = RepoPath::from_internal_string("trunk/a");
        let b = RepoPath::from_internal_string("other/b");
        cache.insert(Revnum::new(1), &a, dummy_node("trunk/a", 1));
        cache.insert(Revnum::new(1), &b, dummy_node("other/b", 1));
        cache.invalidate_subtree(&RepoPath::from_internal_string("trunk"));
        assert!(cache.lookup(Revnum::new(1), &a).is_none());
        assert!(cache.lookup(Revnum::new(1), &b).is_some());
    }

    #[test]
    fn arena_overflow_resets_all_buckets() {
        let cache = DagCache::new();
        for i in 0..(BUCKET_COUNT + 1) {
            let path = RepoPath::from_internal_string(&format!("p{i}"));
            cache.insert(Revnum::new(1), &path, dummy_node("x", 1));
        }
        let l1 = cache.l1.lock().unwrap();
        assert_eq!(l1.insertions, 0);
    }
}
