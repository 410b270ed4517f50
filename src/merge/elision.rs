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

//! Mergeinfo elision (spec §4.8): after a merge, a subtree's mergeinfo that
//! says nothing an inherited ancestor value doesn't already say is
//! redundant, and can be dropped.

use std::collections::BTreeSet;

use crate::error::MergeinfoError;
use crate::mergeinfo::Mergeinfo;
use crate::mergeinfo_retrieval::WcStore;
use crate::path::RepoPath;

/// The working-copy surface elision needs beyond [`WcStore`]: listing a
/// directory's versioned children (to walk down after eliding at a node) and
/// writing the (possibly now-absent) `mergeinfo` property back.
pub trait ElisionStore: WcStore {
    fn children(&self, path: &RepoPath) -> Result<Vec<RepoPath>, MergeinfoError>;
    fn set_mergeinfo_property(&mut self, path: &RepoPath, value: Option<&Mergeinfo>) -> Result<(), MergeinfoError>;
}

/// What happened when eliding the mergeinfo at one path.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ElisionOutcome {
    /// The path's explicit mergeinfo was a pure subset of what it inherits;
    /// the explicit value was removed entirely.
    Full,
    /// Some of the path's mergeinfo is redundant with the inherited value
    /// and was removed, but a non-redundant remainder was kept.
    Partial(Mergeinfo),
    /// Nothing was redundant; the explicit mergeinfo is left untouched.
    None,
}

/// Compares `explicit` (the mergeinfo literally set at a path) against
/// `inherited` (what that same path would see if it had no explicit
/// mergeinfo of its own) and decides which parts of `explicit` are
/// redundant.
///
/// A path's own source-path entry elides against the inherited value only
/// when `inherited` also claims ranges for it; elision never looks at
/// *other* source paths explicit only sets, since those carry information
/// no ancestor has.
pub fn elide(explicit: &Mergeinfo, inherited: &Mergeinfo) -> ElisionOutcome {
    if explicit.is_empty() {
        return ElisionOutcome::None;
    }
    if explicit.equals(inherited, true) {
        return ElisionOutcome::Full;
    }

    let mut remainder = Mergeinfo::empty();
    let mut elided_any = false;
    for (path, ranges) in explicit.iter() {
        let redundant = inherited.get(path).cloned().unwrap_or_else(crate::rangelist::RangeList::empty);
        let kept = ranges.difference(&redundant, true);
        if kept != *ranges {
            elided_any = true;
        }
        if !kept.is_empty() {
            remainder.set(path.clone(), kept);
        }
    }

    if !elided_any {
        return ElisionOutcome::None;
    }
    if remainder.is_empty() {
        ElisionOutcome::Full
    } else {
        ElisionOutcome::Partial(remainder)
    }
}

/// Applies [`elide`]'s verdict at `path`: clears the property on `Full`,
/// rewrites it on `Partial`, leaves it alone on `None`. Returns the verdict
/// so the caller (the post-merge walk below) can decide whether to recurse.
pub fn elide_at(
    store: &mut dyn ElisionStore,
    path: &RepoPath,
    inherited: &Mergeinfo,
) -> Result<ElisionOutcome, MergeinfoError> {
    let Some(text) = store.mergeinfo_property(path)? else {
        return Ok(ElisionOutcome::None);
    };
    let explicit = Mergeinfo::parse(&text)?;
    let outcome = elide(&explicit, inherited);
    match &outcome {
        ElisionOutcome::Full => store.set_mergeinfo_property(path, None)?,
        ElisionOutcome::Partial(remainder) => store.set_mergeinfo_property(path, Some(remainder))?,
        ElisionOutcome::None => {}
    }
    Ok(outcome)
}

/// What a path would inherit if it had no explicit mergeinfo of its own:
/// the nearest ancestor's mergeinfo (explicit or itself inherited), with the
/// walked suffix prepended, stopping at a switched ancestor or the tree
/// root. This is [`mergeinfo_retrieval::retrieve`]'s ancestor walk, minus
/// its initial "check the target path itself" step, since elision always
/// wants the *ancestor* value to compare the target's own explicit
/// mergeinfo against.
fn nearest_ancestor_mergeinfo(
    store: &dyn ElisionStore,
    target: &RepoPath,
) -> Result<Mergeinfo, MergeinfoError> {
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

        if store.is_switched(&current) {
            break;
        }
        if let Some(text) = store.mergeinfo_property(&current)? {
            return Ok(Mergeinfo::parse(&text)?.prepend_paths(&walked));
        }
        if current.is_root() {
            break;
        }
    }
    Ok(Mergeinfo::empty())
}

/// Post-merge elision walk (spec §4.8 step 5): starting at `start` (a
/// subtree the merge touched), visits every descendant with explicit
/// mergeinfo depth-first and elides it against what it would inherit if it
/// had none. Iterative rather than recursive so a single deep subtree can't
/// blow the stack, and checks `cancelled` between nodes so a long walk can
/// be interrupted like any other long-running operation (spec §7).
pub fn elide_subtree(
    store: &mut dyn ElisionStore,
    start: &RepoPath,
    cancelled: &dyn Fn() -> bool,
) -> Result<BTreeSet<RepoPath>, MergeinfoError> {
    let mut elided = BTreeSet::new();
    let mut stack = vec![start.clone()];

    while let Some(path) = stack.pop() {
        if cancelled() {
            break;
        }

        let inherited = nearest_ancestor_mergeinfo(store, &path)?;
        if !inherited.is_empty() {
            let outcome = elide_at(store, &path, &inherited)?;
            if !matches!(outcome, ElisionOutcome::None) {
                elided.insert(path.clone());
            }
        }

        stack.extend(store.children(&path)?);
    }

    Ok(elided)
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use pretty_assertions::assert_eq;

    use super::*;

    fn mi(text: &str) -> Mergeinfo {
        Mergeinfo::parse(text).unwrap()
    }

    struct FakeStore {
        properties: HashMap<String, String>,
        children: HashMap<String, Vec<String>>,
    }

    impl WcStore for FakeStore {
        fn mergeinfo_property(&self, path: &RepoPath) -> Result<Option<String>, MergeinfoError> {
            Ok(self.properties.get(path.as_internal_str()).cloned())
        }

        fn is_switched(&self, _path: &RepoPath) -> bool {
            false
        }
    }

    impl ElisionStore for FakeStore {
        fn children(&self, path: &RepoPath) -> Result<Vec<RepoPath>, MergeinfoError> {
            Ok(self
                .children
                .get(path.as_internal_str())
                .into_iter()
                .flatten()
                .map(|s| RepoPath::from_internal_string(s))
                .collect())
        }

        fn set_mergeinfo_property(&mut self, path: &RepoPath, value: Option<&Mergeinfo>) -> Result<(), MergeinfoError> {
            match value {
                Some(mergeinfo) => {
                    self.properties.insert(path.as_internal_str().to_owned(), mergeinfo.to_string());
                }
                None => {
                    self.properties.remove(path.as_internal_str());
                }
            }
            Ok(())
        }
    }

    fn p(s: &str) -> RepoPath {
        RepoPath::from_internal_string(s)
    }

    #[test]
    fn full_elision_when_explicit_equals_inherited() {
        let outcome = elide(&mi("/trunk:1-5"), &mi("/trunk:1-5"));
        assert_eq!(outcome, ElisionOutcome::Full);
    }

    #[test]
    fn no_elision_when_explicit_has_unique_ranges() {
        let outcome = elide(&mi("/trunk:1-10"), &mi("/trunk:1-5"));
        assert_eq!(outcome, ElisionOutcome::None);
    }

    #[test]
    fn partial_elision_drops_redundant_path_keeps_unique_one() {
        let explicit = mi("/trunk:1-5\n/vendor:1-2");
        let inherited = mi("/trunk:1-5");
        let outcome = elide(&explicit, &inherited);
        assert_eq!(outcome, ElisionOutcome::Partial(mi("/vendor:1-2")));
    }

    #[test]
    fn elide_at_clears_the_property_on_full_elision() {
        let mut store = FakeStore {
            properties: HashMap::from([("trunk/sub".to_owned(), "/trunk:1-5".to_owned())]),
            children: HashMap::new(),
        };
        let inherited = mi("/trunk:1-5");
        let outcome = elide_at(&mut store, &p("trunk/sub"), &inherited).unwrap();
        assert_eq!(outcome, ElisionOutcome::Full);
        assert!(store.mergeinfo_property(&p("trunk/sub")).unwrap().is_none());
    }

    #[test]
    fn subtree_walk_elides_redundant_descendant_and_stops_at_unique_one() {
        let mut store = FakeStore {
            properties: HashMap::from([
                ("".to_owned(), "/trunk:1-5".to_owned()),
                ("sub".to_owned(), "/trunk/sub:1-5".to_owned()),
                ("sub/deep".to_owned(), "/trunk/sub/deep:1-9".to_owned()),
            ]),
            children: HashMap::from([
                ("".to_owned(), vec!["sub".to_owned()]),
                ("sub".to_owned(), vec!["sub/deep".to_owned()]),
            ]),
        };
        let elided = elide_subtree(&mut store, &p("sub"), &|| false).unwrap();

        assert!(elided.contains(&p("sub")));
        assert!(store.mergeinfo_property(&p("sub")).unwrap().is_none());
        assert!(!elided.contains(&p("sub/deep")));
        assert_eq!(
            store.mergeinfo_property(&p("sub/deep")).unwrap().unwrap(),
            "/trunk/sub/deep:1-9"
        );
    }
}
