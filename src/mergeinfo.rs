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

//! Mergeinfo: a map from source path to [`RangeList`], and the bit-exact
//! text format (spec §6) used to store it as a node property.

use std::collections::BTreeMap;
use std::fmt;

use crate::error::MergeinfoError;
use crate::path::SourcePath;
use crate::rangelist::RangeList;

/// `source-path -> rangelist`. Iteration order is the path's `Ord`, which is
/// also the canonical serialization order.
#[derive(Clone, PartialEq, Eq, Default, Debug)]
pub struct Mergeinfo(BTreeMap<SourcePath, RangeList>);

impl Mergeinfo {
    pub fn empty() -> Self {
        Mergeinfo(BTreeMap::new())
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, path: &SourcePath) -> Option<&RangeList> {
        self.0.get(path)
    }

    pub fn set(&mut self, path: SourcePath, ranges: RangeList) {
        self.0.insert(path, ranges);
    }

    pub fn remove_path(&mut self, path: &SourcePath) -> Option<RangeList> {
        self.0.remove(path)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&SourcePath, &RangeList)> {
        self.0.iter()
    }

    pub fn paths(&self) -> impl Iterator<Item = &SourcePath> {
        self.0.keys()
    }

    /// Parses `path ":" rangelist` lines. A path followed by `:` and nothing
    /// else is the canonical encoding of "explicitly empty mergeinfo here",
    /// not a parse error.
    pub fn parse(text: &str) -> Result<Self, MergeinfoError> {
        let mut map = BTreeMap::new();
        for line in text.lines() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let (path, rangelist) =
                line.split_once(':').ok_or_else(|| MergeinfoError::MissingColon(line.to_owned()))?;
            let path = SourcePath::parse(path).ok_or(MergeinfoError::EmptyPath)?;
            let ranges = RangeList::parse(rangelist)?;
            map.insert(path, ranges);
        }
        Ok(Mergeinfo(map))
    }

    /// Deep copy. `Mergeinfo` is already immutable-value-like, so this is
    /// just `clone`; kept as a named operation to mirror the source
    /// vocabulary used by callers that reason about "dup then mutate".
    pub fn dup(&self) -> Self {
        self.clone()
    }

    /// For each path in either map, the rangelist diff in both directions;
    /// paths unique to one side produce a single-sided entry.
    pub fn diff(&self, to: &Mergeinfo, consider_inheritance: bool) -> (Mergeinfo, Mergeinfo) {
        let mut deleted = Mergeinfo::empty();
        let mut added = Mergeinfo::empty();
        for path in self.0.keys().chain(to.0.keys()).collect::<std::collections::BTreeSet<_>>() {
            let from_ranges = self.0.get(path).cloned().unwrap_or_else(RangeList::empty);
            let to_ranges = to.0.get(path).cloned().unwrap_or_else(RangeList::empty);
            let removed = from_ranges.difference(&to_ranges, consider_inheritance);
            let gained = to_ranges.difference(&from_ranges, consider_inheritance);
            if !removed.is_empty() {
                deleted.set(path.clone(), removed);
            }
            if !gained.is_empty() {
                added.set(path.clone(), gained);
            }
        }
        (deleted, added)
    }

    /// In-place pathwise union: `self |= src`.
    pub fn merge(&mut self, src: &Mergeinfo) {
        for (path, ranges) in &src.0 {
            let merged = match self.0.get(path) {
                Some(existing) => existing.union(ranges),
                None => ranges.clone(),
            };
            self.0.insert(path.clone(), merged);
        }
    }

    /// Pathwise difference: `self - eraser`.
    pub fn remove(&self, eraser: &Mergeinfo) -> Mergeinfo {
        let mut out = BTreeMap::new();
        for (path, ranges) in &self.0 {
            let remaining = match eraser.0.get(path) {
                Some(erased) => ranges.difference(erased, true),
                None => ranges.clone(),
            };
            if !remaining.is_empty() {
                out.insert(path.clone(), remaining);
            }
        }
        Mergeinfo(out)
    }

    /// Pathwise intersection; paths absent from either side contribute
    /// nothing.
    pub fn intersect(&self, other: &Mergeinfo) -> Mergeinfo {
        let mut out = BTreeMap::new();
        for (path, ranges) in &self.0 {
            if let Some(other_ranges) = other.0.get(path) {
                let intersected = ranges.intersection(other_ranges);
                if !intersected.is_empty() {
                    out.insert(path.clone(), intersected);
                }
            }
        }
        Mergeinfo(out)
    }

    /// Keeps only inheritable ranges, for every path or only `focus_path`.
    pub fn inheritable(&self, focus_path: Option<&SourcePath>, window: Option<(i64, i64)>) -> Mergeinfo {
        let mut out = BTreeMap::new();
        for (path, ranges) in &self.0 {
            if focus_path.is_some_and(|focus| focus != path) {
                out.insert(path.clone(), ranges.clone());
                continue;
            }
            let filtered = ranges.inheritable(window);
            if !filtered.is_empty() {
                out.insert(path.clone(), filtered);
            }
        }
        Mergeinfo(out)
    }

    /// True iff `diff(self, other, consider_inheritance)` is empty both
    /// ways.
    pub fn equals(&self, other: &Mergeinfo, consider_inheritance: bool) -> bool {
        let (deleted, added) = self.diff(other, consider_inheritance);
        deleted.is_empty() && added.is_empty()
    }

    /// Prepends `prefix` onto every source-path key, used when returning
    /// inherited mergeinfo from an ancestor (spec §4.5 step 4).
    pub fn prepend_paths(&self, prefix: &crate::path::RepoPath) -> Mergeinfo {
        let mut out = BTreeMap::new();
        for (path, ranges) in &self.0 {
            out.insert(path.prepend(prefix), ranges.clone());
        }
        Mergeinfo(out)
    }
}

impl fmt::Display for Mergeinfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (path, ranges) in &self.0 {
            if !first {
                writeln!(f)?;
            }
            first = false;
            write!(f, "{path}:{ranges}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn mi(text: &str) -> Mergeinfo {
        Mergeinfo::parse(text).unwrap()
    }

    #[test]
    fn parse_round_trip_scenario_1() {
        let parsed = mi("/trunk:1,3-4*,5\n/branches/b:7");
        assert_eq!(parsed.paths().count(), 2);
        assert_eq!(parsed.to_string(), "/branches/b:7\n/trunk:1,3-4*,5");
    }

    #[test]
    fn explicit_empty_path_is_not_an_error() {
        let parsed = mi("/trunk:");
        assert!(parsed.get(&SourcePath::parse("/trunk").unwrap()).unwrap().is_empty());
    }

    #[test]
    fn missing_colon_is_an_error() {
        assert!(Mergeinfo::parse("/trunk").is_err());
    }

    #[test]
    fn merge_is_pathwise_union() {
        let mut dst = mi("/A:1,3-4");
        let src = mi("/A:1,3,4*,5\n/B:1-2");
        dst.merge(&src);
        assert_eq!(dst.get(&SourcePath::parse("/A").unwrap()).unwrap().to_string(), "1,3-5");
        assert_eq!(dst.get(&SourcePath::parse("/B").unwrap()).unwrap().to_string(), "1-2");
    }

    #[test]
    fn remove_is_pathwise_difference() {
        let whiteboard = mi("/A:1-10");
        let eraser = mi("/A:3-5");
        let result = whiteboard.remove(&eraser);
        assert_eq!(result.get(&SourcePath::parse("/A").unwrap()).unwrap().to_string(), "1-2,6-10");
    }

    #[test]
    fn equals_matches_diff() {
        let a = mi("/A:1-10");
        let b = mi("/A:1-10");
        assert!(a.equals(&b, true));
        let c = mi("/A:1-9");
        assert!(!a.equals(&c, true));
    }

    #[test]
    fn prepend_paths_for_inheritance() {
        let ancestor = mi("/trunk:1-5");
        let inherited = ancestor.prepend_paths(&crate::path::RepoPath::from_internal_string("sub"));
        assert_eq!(inherited.to_string(), "/trunk/sub:1-5");
    }

    #[test]
    fn intersect_drops_paths_absent_from_either_side() {
        let a = mi("/A:1-10\n/B:1-5");
        let b = mi("/A:5-15");
        let result = a.intersect(&b);
        assert_eq!(result.paths().count(), 1);
        assert_eq!(result.get(&SourcePath::parse("/A").unwrap()).unwrap().to_string(), "5-9");
    }
}
