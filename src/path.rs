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

//! Tree-relative paths used to walk the DAG (spec §4.4) and the absolute
//! source paths used as mergeinfo keys (spec §3). Both are built on the same
//! slash-separated component representation; [`SourcePath`] simply prefixes a
//! [`RepoPath`] with `/` at its boundary (parse/display).

use std::borrow::Borrow;
use std::cmp::Ordering;
use std::fmt;
use std::iter::FusedIterator;
use std::ops::Deref;

use ref_cast::{RefCastCustom, ref_cast_custom};

/// Borrowed path component: never empty, never contains `/`.
#[derive(PartialEq, Eq, PartialOrd, Ord, Hash, RefCastCustom)]
#[repr(transparent)]
pub struct RepoPathComponent {
    value: str,
}

impl RepoPathComponent {
    /// Wraps `value` as a component.
    ///
    /// # Panics
    ///
    /// Panics if `value` is empty or contains `/`.
    pub fn new(value: &str) -> &Self {
        assert!(is_valid_component(value), "invalid path component {value:?}");
        Self::new_unchecked(value)
    }

    #[ref_cast_custom]
    const fn new_unchecked(value: &str) -> &Self;

    pub fn as_str(&self) -> &str {
        &self.value
    }
}

impl fmt::Debug for RepoPathComponent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&self.value, f)
    }
}

/// Owned path component.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct RepoPathComponentBuf {
    value: String,
}

impl From<&str> for RepoPathComponentBuf {
    fn from(value: &str) -> Self {
        assert!(is_valid_component(value), "invalid path component {value:?}");
        RepoPathComponentBuf { value: value.to_owned() }
    }
}

impl Deref for RepoPathComponentBuf {
    type Target = RepoPathComponent;

    fn deref(&self) -> &Self::Target {
        RepoPathComponent::new_unchecked(&self.value)
    }
}

impl Borrow<RepoPathComponent> for RepoPathComponentBuf {
    fn borrow(&self) -> &RepoPathComponent {
        self
    }
}

impl ToOwned for RepoPathComponent {
    type Owned = RepoPathComponentBuf;

    fn to_owned(&self) -> Self::Owned {
        RepoPathComponentBuf { value: self.value.to_owned() }
    }
}

fn is_valid_component(value: &str) -> bool {
    !value.is_empty() && !value.contains('/')
}

/// A tree-relative path within one revision or transaction. The empty path is
/// the tree root. Never has a leading or trailing `/`, never contains `//`.
#[derive(Clone, Eq, PartialEq, Hash, Default)]
pub struct RepoPath {
    value: String,
}

impl fmt::Debug for RepoPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.value)
    }
}

impl fmt::Display for RepoPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "/{}", self.value)
    }
}

impl RepoPath {
    pub const fn root() -> Self {
        RepoPath { value: String::new() }
    }

    /// Parses the internal slash-separated representation (no leading or
    /// trailing slash, no empty components).
    pub fn from_internal_string(value: &str) -> Self {
        assert!(is_valid_repo_path_str(value), "invalid repo path {value:?}");
        RepoPath { value: value.to_owned() }
    }

    pub fn as_internal_str(&self) -> &str {
        &self.value
    }

    pub fn is_root(&self) -> bool {
        self.value.is_empty()
    }

    pub fn components(&self) -> ComponentsIter<'_> {
        ComponentsIter { value: &self.value }
    }

    pub fn join(&self, entry: &RepoPathComponent) -> RepoPath {
        let value = if self.value.is_empty() {
            entry.as_str().to_owned()
        } else {
            [&self.value, "/", entry.as_str()].concat()
        };
        RepoPath { value }
    }

    pub fn parent(&self) -> Option<RepoPath> {
        self.split().map(|(parent, _)| parent)
    }

    pub fn split(&self) -> Option<(RepoPath, &RepoPathComponent)> {
        let mut components = self.components();
        let basename = components.next_back()?;
        Some((components.to_path(), basename))
    }

    /// Whether `self` is `other` or an ancestor of `other`.
    pub fn contains(&self, other: &RepoPath) -> bool {
        if self.value.is_empty() {
            return true;
        }
        match other.value.strip_prefix(&self.value) {
            Some(tail) => tail.is_empty() || tail.starts_with('/'),
            None => false,
        }
    }

    /// `other`'s components beyond `self`, as a fresh relative path. Returns
    /// `None` if `self` does not contain `other`.
    pub fn strip_prefix_path(&self, other: &RepoPath) -> Option<RepoPath> {
        if !self.contains(other) {
            return None;
        }
        if self.value.is_empty() {
            return Some(other.clone());
        }
        let tail = other.value[self.value.len()..].trim_start_matches('/');
        Some(RepoPath { value: tail.to_owned() })
    }
}

impl Ord for RepoPath {
    fn cmp(&self, other: &Self) -> Ordering {
        self.components().cmp(other.components())
    }
}

impl PartialOrd for RepoPath {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

#[derive(Clone, Debug)]
pub struct ComponentsIter<'a> {
    value: &'a str,
}

impl<'a> ComponentsIter<'a> {
    fn to_path(&self) -> RepoPath {
        RepoPath { value: self.value.to_owned() }
    }
}

impl<'a> Iterator for ComponentsIter<'a> {
    type Item = &'a RepoPathComponent;

    fn next(&mut self) -> Option<Self::Item> {
        if self.value.is_empty() {
            return None;
        }
        let (name, rest) = self
            .value
            .split_once('/')
            .unwrap_or((self.value, &self.value[self.value.len()..]));
        self.value = rest;
        Some(RepoPathComponent::new_unchecked(name))
    }
}

impl DoubleEndedIterator for ComponentsIter<'_> {
    fn next_back(&mut self) -> Option<Self::Item> {
        if self.value.is_empty() {
            return None;
        }
        let (rest, name) = self
            .value
            .rsplit_once('/')
            .unwrap_or((&self.value[..0], self.value));
        self.value = rest;
        Some(RepoPathComponent::new_unchecked(name))
    }
}

impl FusedIterator for ComponentsIter<'_> {}

fn is_valid_repo_path_str(value: &str) -> bool {
    !value.starts_with('/') && !value.ends_with('/') && !value.contains("//")
}

/// An absolute, normalized mergeinfo source path (spec §3). Displays and
/// parses with a leading `/`; the empty path is the repository root `/`.
#[derive(Clone, Eq, PartialEq, PartialOrd, Ord, Hash)]
pub struct SourcePath(RepoPath);

impl SourcePath {
    pub fn root() -> Self {
        SourcePath(RepoPath::root())
    }

    /// Parses `"/foo/bar"` (or `"/"` for the root). Rejects input without a
    /// leading slash.
    pub fn parse(value: &str) -> Option<Self> {
        let rest = value.strip_prefix('/')?;
        if rest.is_empty() {
            return Some(SourcePath::root());
        }
        if !is_valid_repo_path_str(rest) {
            return None;
        }
        Some(SourcePath(RepoPath::from_internal_string(rest)))
    }

    pub fn as_repo_path(&self) -> &RepoPath {
        &self.0
    }

    pub fn join(&self, entry: &RepoPathComponent) -> SourcePath {
        SourcePath(self.0.join(entry))
    }

    /// Appends `suffix` (a repository-relative walked-path) onto this source
    /// path's components, used when inheriting mergeinfo down a tree (spec
    /// §4.5 step 4): an inherited `/trunk: 1-5` at ancestor `A` becomes
    /// `/trunk/sub: 1-5` at `A/sub`, i.e. `SourcePath("/trunk").prepend(sub)`.
    ///
    /// Named `prepend` to match the source vocabulary ("prepend the
    /// walked-path suffix onto every source-path key"), even though the
    /// suffix is appended after this path's own components.
    pub fn prepend(&self, suffix: &RepoPath) -> SourcePath {
        if suffix.is_root() {
            return self.clone();
        }
        if self.0.is_root() {
            return SourcePath(suffix.clone());
        }
        SourcePath(RepoPath::from_internal_string(&format!(
            "{}/{}",
            self.0.as_internal_str(),
            suffix.as_internal_str()
        )))
    }
}

impl fmt::Debug for SourcePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.to_string())
    }
}

impl fmt::Display for SourcePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rp(s: &str) -> RepoPath {
        RepoPath::from_internal_string(s)
    }

    #[test]
    fn root_is_empty() {
        assert!(RepoPath::root().is_root());
        assert!(rp("").is_root());
    }

    #[test]
    fn join_and_split() {
        let root = RepoPath::root();
        let dir = root.join(RepoPathComponent::new("trunk"));
        let file = dir.join(RepoPathComponent::new("a.txt"));
        assert_eq!(file.as_internal_str(), "trunk/a.txt");
        let (parent, base) = file.split().unwrap();
        assert_eq!(parent, dir);
        assert_eq!(base.as_str(), "a.txt");
    }

    #[test]
    fn contains() {
        assert!(rp("").contains(&rp("trunk")));
        assert!(rp("trunk").contains(&rp("trunk")));
        assert!(rp("trunk").contains(&rp("trunk/sub")));
        assert!(!rp("trunk").contains(&rp("trunk2")));
        assert!(!rp("trunk/sub").contains(&rp("trunk")));
    }

    #[test]
    fn strip_prefix_path() {
        assert_eq!(
            rp("trunk").strip_prefix_path(&rp("trunk/sub/file")),
            Some(rp("sub/file"))
        );
        assert_eq!(rp("trunk").strip_prefix_path(&rp("other")), None);
        assert_eq!(rp("").strip_prefix_path(&rp("a/b")), Some(rp("a/b")));
    }

    #[test]
    fn source_path_round_trip() {
        let p = SourcePath::parse("/trunk/sub").unwrap();
        assert_eq!(p.to_string(), "/trunk/sub");
        assert_eq!(SourcePath::parse("/").unwrap().to_string(), "/");
        assert!(SourcePath::parse("trunk").is_none());
    }

    #[test]
    fn source_path_prepend() {
        // An ancestor `A` has explicit mergeinfo "/trunk: 1-5"; we're
        // inheriting it at `A/sub`, so the key gains the walked suffix.
        let inherited = SourcePath::parse("/trunk").unwrap();
        let walked = rp("sub");
        assert_eq!(inherited.prepend(&walked).to_string(), "/trunk/sub");
    }

    #[test]
    fn ordering_matches_component_order() {
        assert!(rp("dir") < rp("dir/sub"));
        assert!(rp("dir") < rp("dirx"));
        assert!(rp("abc") < rp("dir/file"));
    }
}
