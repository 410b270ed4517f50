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

//! Composing a working-copy path's effective mergeinfo from explicit,
//! inherited, and repository sources (spec §4.5).

use crate::error::{Error, MergeinfoError, RaError};
use crate::mergeinfo::Mergeinfo;
use crate::path::{RepoPath, SourcePath};
use crate::ra::{MergeinfoInheritance, RaSession};
use crate::revnum::Revnum;

/// The small slice of a working copy's administrative area this module
/// needs: the `mergeinfo` property at a path, and whether a path is
/// switched (its recorded URL is not a child of its parent's).
pub trait WcStore {
    fn mergeinfo_property(&self, path: &RepoPath) -> Result<Option<String>, MergeinfoError>;
    fn is_switched(&self, path: &RepoPath) -> bool;
}

/// How far up the tree a retrieval is allowed to walk looking for inherited
/// mergeinfo.
pub enum RetrievalMode {
    /// Only the mergeinfo explicitly set at the target path.
    ExplicitOnly,
    /// Walk ancestors for inherited mergeinfo, stopping no higher than
    /// `limit_path` (if given), a switched ancestor, or the tree root.
    Inherited { limit_path: Option<RepoPath> },
}

impl RetrievalMode {
    fn limit_path(&self) -> Option<&RepoPath> {
        match self {
            RetrievalMode::Inherited { limit_path } => limit_path.as_ref(),
            RetrievalMode::ExplicitOnly => None,
        }
    }
}

/// The result of a retrieval: the mergeinfo found, and whether it was set
/// directly on the target path (`true`) or inherited/fetched (`false`).
pub struct Lookup {
    pub mergeinfo: Mergeinfo,
    pub found_directly: bool,
}

/// Steps 1-4 of retrieval: explicit-at-path, then (if permitted) an ancestor
/// walk for inherited mergeinfo, with the walked path suffix prepended.
pub fn retrieve(
    store: &dyn WcStore,
    target: &RepoPath,
    mode: RetrievalMode,
) -> Result<Lookup, MergeinfoError> {
    if let Some(text) = store.mergeinfo_property(target)? {
        return Ok(Lookup { mergeinfo: Mergeinfo::parse(&text)?, found_directly: true });
    }
    if matches!(mode, RetrievalMode::ExplicitOnly) {
        return Ok(Lookup { mergeinfo: Mergeinfo::empty(), found_directly: false });
    }

    let mut walked = RepoPath::root();
    let mut current = target.clone();
    loop {
        let Some(parent) = current.parent() else { break };
        let (_, basename) = current.split().expect("non-root path has a basename");
        walked = if walked.is_root() {
            RepoPath::from_internal_string(basename.as_str())
        } else {
            RepoPath::from_internal_string(&format!("{}/{}", basename.as_str(), walked.as_internal_str()))
        };
        current = parent;

        if let Some(limit) = mode.limit_path() {
            if &current == limit {
                if let Some(text) = store.mergeinfo_property(&current)? {
                    return Ok(Lookup {
                        mergeinfo: Mergeinfo::parse(&text)?.prepend_paths(&walked),
                        found_directly: false,
                    });
                }
                break;
            }
        }

        if store.is_switched(&current) {
            break;
        }

        if let Some(text) = store.mergeinfo_property(&current)? {
            return Ok(Lookup {
                mergeinfo: Mergeinfo::parse(&text)?.prepend_paths(&walked),
                found_directly: false,
            });
        }

        if current.is_root() {
            break;
        }
    }

    Ok(Lookup { mergeinfo: Mergeinfo::empty(), found_directly: false })
}

/// Steps 1-6: the local retrieval above, falling back to asking the
/// repository for mergeinfo at `repo_path`/`repo_rev` when nothing local was
/// found. A `not-implemented` response from the server is treated as "no
/// mergeinfo available", not an error.
pub fn retrieve_or_ask_repository(
    store: &dyn WcStore,
    ra: &dyn RaSession,
    repo_rev: Revnum,
    repo_path: &SourcePath,
    target: &RepoPath,
    mode: RetrievalMode,
    inheritance: MergeinfoInheritance,
) -> Result<Lookup, Error> {
    let local = retrieve(store, target, mode)?;
    if local.found_directly || !local.mergeinfo.is_empty() {
        return Ok(local);
    }
    match ra.get_mergeinfo(std::slice::from_ref(repo_path), repo_rev, inheritance) {
        Ok(mut map) => {
            let mergeinfo = map.remove(repo_path).unwrap_or_else(Mergeinfo::empty);
            Ok(Lookup { mergeinfo, found_directly: false })
        }
        Err(RaError::NotImplemented) => Ok(local),
        Err(err) => Err(Error::Ra(err)),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    struct FakeStore {
        properties: HashMap<String, String>,
        switched: Vec<String>,
    }

    impl WcStore for FakeStore {
        fn mergeinfo_property(&self, path: &RepoPath) -> Result<Option<String>, MergeinfoError> {
            Ok(self.properties.get(path.as_internal_str()).cloned())
        }

        fn is_switched(&self, path: &RepoPath) -> bool {
            self.switched.iter().any(|p| p == path.as_internal_str())
        }
    }

    fn p(s: &str) -> RepoPath {
        RepoPath::from_internal_string(s)
    }

    #[test]
    fn explicit_mergeinfo_wins_immediately() {
        let store = FakeStore {
            properties: HashMap::from([("trunk/sub".to_owned(), "/trunk:1-5".to_owned())]),
            switched: vec![],
        };
        let result = retrieve(&store, &p("trunk/sub"), RetrievalMode::Inherited { limit_path: None }).unwrap();
        assert!(result.found_directly);
        assert_eq!(result.mergeinfo.to_string(), "/trunk:1-5");
    }

    #[test]
    fn explicit_only_mode_never_walks_ancestors() {
        let store = FakeStore {
            properties: HashMap::from([("trunk".to_owned(), "/trunk:1-5".to_owned())]),
            switched: vec![],
        };
        let result = retrieve(&store, &p("trunk/sub"), RetrievalMode::ExplicitOnly).unwrap();
        assert!(!result.found_directly);
        assert!(result.mergeinfo.is_empty());
    }

    #[test]
    fn inherited_mergeinfo_gets_walked_suffix_prepended() {
        let store = FakeStore {
            properties: HashMap::from([("trunk".to_owned(), "/trunk:1-5".to_owned())]),
            switched: vec![],
        };
        let result =
            retrieve(&store, &p("trunk/sub/deep"), RetrievalMode::Inherited { limit_path: None }).unwrap();
        assert!(!result.found_directly);
        assert_eq!(result.mergeinfo.to_string(), "/trunk/sub/deep:1-5");
    }

    #[test]
    fn switched_ancestor_stops_the_walk() {
        let store = FakeStore {
            properties: HashMap::from([("".to_owned(), "/trunk:1-5".to_owned())]),
            switched: vec!["trunk".to_owned()],
        };
        let result =
            retrieve(&store, &p("trunk/sub"), RetrievalMode::Inherited { limit_path: None }).unwrap();
        assert!(result.mergeinfo.is_empty());
    }

    #[test]
    fn limit_path_stops_the_walk_even_if_it_has_no_mergeinfo() {
        let store = FakeStore {
            properties: HashMap::from([("".to_owned(), "/trunk:1-5".to_owned())]),
            switched: vec![],
        };
        let result = retrieve(
            &store,
            &p("trunk/sub"),
            RetrievalMode::Inherited { limit_path: Some(p("trunk")) },
        )
        .unwrap();
        assert!(result.mergeinfo.is_empty());
    }

    #[test]
    fn nothing_found_anywhere_is_empty_not_an_error() {
        let store = FakeStore { properties: HashMap::new(), switched: vec![] };
        let result = retrieve(&store, &p("trunk/sub"), RetrievalMode::Inherited { limit_path: None }).unwrap();
        assert!(result.mergeinfo.is_empty());
        assert!(!result.found_directly);
    }
}
