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

//! Rangelist interval algebra: sorted, non-overlapping revision ranges with
//! per-range inheritability.
//!
//! A [`Range`] is the half-open interval `[start, end)` over revision
//! numbers: text `"5-10"` covers revisions 5 through 10 inclusive, stored as
//! `Range { start: 5, end: 11 }`; a single revision `"7"` covers just 7,
//! stored as `Range { start: 7, end: 8 }`. `CountRevs` is `end - start` and
//! `ToRevs` is `start..end`, both directly off these fields.

use std::fmt;

use itertools::Itertools as _;
use smallvec::SmallVec;

use crate::error::RangelistError;

/// A single contiguous revision range, half-open `[start, end)`.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct Range {
    pub start: i64,
    pub end: i64,
    pub inheritable: bool,
}

impl Range {
    pub fn new(start: i64, end: i64, inheritable: bool) -> Result<Self, RangelistError> {
        if start >= end {
            return Err(RangelistError::InvalidRange { start, end });
        }
        Ok(Range { start, end, inheritable })
    }

    /// Number of revisions covered.
    pub fn count_revs(&self) -> i64 {
        self.end - self.start
    }

    /// Individual revisions covered, ascending.
    pub fn to_revs(&self) -> impl Iterator<Item = i64> + use<> {
        self.start..self.end
    }

    pub fn intersects(&self, other: &Range) -> bool {
        self.start < other.end && other.start < self.end
    }

    /// Whether `self` and `other` are adjacent (touch but don't overlap).
    pub fn abuts(&self, other: &Range) -> bool {
        self.end == other.start || other.end == self.start
    }

    fn with_inheritable(mut self, inheritable: bool) -> Self {
        self.inheritable = inheritable;
        self
    }
}

impl fmt::Display for Range {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.count_revs() == 1 {
            write!(f, "{}", self.start)?;
        } else {
            write!(f, "{}-{}", self.start, self.end - 1)?;
        }
        if !self.inheritable {
            write!(f, "*")?;
        }
        Ok(())
    }
}

/// A sorted, non-overlapping sequence of [`Range`]s. Adjacent ranges of equal
/// inheritability are coalesced on construction; ranges of differing
/// inheritability may abut without merging.
#[derive(Clone, PartialEq, Eq, Default, Hash)]
pub struct RangeList(SmallVec<[Range; 4]>);

impl fmt::Debug for RangeList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.0.iter()).finish()
    }
}

impl fmt::Display for RangeList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.iter().join(","))
    }
}

impl RangeList {
    pub fn empty() -> Self {
        RangeList(SmallVec::new())
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn ranges(&self) -> &[Range] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Builds a canonical rangelist from arbitrary (possibly unsorted,
    /// possibly adjacent) ranges.
    pub fn from_ranges(ranges: impl IntoIterator<Item = Range>) -> Self {
        let mut sorted: SmallVec<[Range; 4]> = ranges.into_iter().collect();
        sorted.sort_by_key(|r| (r.start, r.end));
        RangeList(coalesce(sorted))
    }

    /// Parses `"N"`, `"N-M"`, optionally `*`-suffixed, comma-separated.
    /// An empty string is the explicit empty rangelist, not an error.
    pub fn parse(text: &str) -> Result<Self, RangelistError> {
        let text = text.trim();
        if text.is_empty() {
            return Ok(RangeList::empty());
        }
        let mut ranges = SmallVec::<[Range; 4]>::new();
        for element in text.split(',') {
            ranges.push(parse_element(element)?);
        }
        ranges.sort_by_key(|r| (r.start, r.end));
        check_non_overlapping(&ranges)?;
        Ok(RangeList(coalesce(ranges)))
    }

    /// Set union: every revision present in either, `inheritable = a.inh ||
    /// b.inh` on overlaps (two non-inheritable ranges at the same revision
    /// stay non-inheritable).
    pub fn union(&self, other: &RangeList) -> RangeList {
        let mut points = boundary_points(self, other);
        points.sort_unstable();
        points.dedup();
        let mut out = Vec::new();
        for (&lo, &hi) in points.iter().tuple_windows() {
            let a = self.inheritable_at(lo);
            let b = other.inheritable_at(lo);
            let inheritable = match (a, b) {
                (Some(ai), Some(bi)) => ai || bi,
                (Some(ai), None) => ai,
                (None, Some(bi)) => bi,
                (None, None) => continue,
            };
            out.push(Range { start: lo, end: hi, inheritable });
        }
        RangeList::from_ranges(out)
    }

    /// Set difference `self - other`. When `consider_inheritance` is false,
    /// a minuend revision is removed whenever `other` covers it at all, and
    /// survivors keep the minuend's own inheritability. When true, an
    /// inheritable minuend revision is not removed by a non-inheritable
    /// subtrahend revision, and vice versa.
    pub fn difference(&self, other: &RangeList, consider_inheritance: bool) -> RangeList {
        let mut points = boundary_points(self, other);
        points.sort_unstable();
        points.dedup();
        let mut out = Vec::new();
        for (&lo, &hi) in points.iter().tuple_windows() {
            let Some(a) = self.inheritable_at(lo) else { continue };
            let removed = match other.inheritable_at(lo) {
                None => false,
                Some(bi) => !consider_inheritance || bi == a,
            };
            if !removed {
                out.push(Range { start: lo, end: hi, inheritable: a });
            }
        }
        RangeList::from_ranges(out)
    }

    /// Set intersection, `inheritable = a.inh && b.inh`.
    pub fn intersection(&self, other: &RangeList) -> RangeList {
        let mut points = boundary_points(self, other);
        points.sort_unstable();
        points.dedup();
        let mut out = Vec::new();
        for (&lo, &hi) in points.iter().tuple_windows() {
            if let (Some(a), Some(b)) = (self.inheritable_at(lo), other.inheritable_at(lo)) {
                out.push(Range { start: lo, end: hi, inheritable: a && b });
            }
        }
        RangeList::from_ranges(out)
    }

    /// Flips iteration order and swaps each range's `start`/`end`, producing
    /// a transient, non-canonical rangelist (ranges with `start > end`) used
    /// internally by the merge driver to walk a rollback backwards. Not
    /// meant to satisfy the usual rangelist invariants.
    pub fn reverse(&self) -> ReversedRangeList {
        let reversed = self
            .0
            .iter()
            .rev()
            .map(|r| Range { start: r.end, end: r.start, inheritable: r.inheritable })
            .collect();
        ReversedRangeList(reversed)
    }

    pub fn count_revs(&self) -> i64 {
        self.0.iter().map(Range::count_revs).sum()
    }

    pub fn to_revs(&self) -> Vec<i64> {
        self.0.iter().flat_map(Range::to_revs).collect()
    }

    /// Keeps only inheritable ranges, optionally restricted to `[a, b)`.
    pub fn inheritable(&self, window: Option<(i64, i64)>) -> RangeList {
        let kept = self.0.iter().filter(|r| r.inheritable).copied().filter_map(|r| match window {
            None => Some(r),
            Some((a, b)) => {
                let start = r.start.max(a);
                let end = r.end.min(b);
                (start < end).then_some(Range { start, end, ..r })
            }
        });
        RangeList::from_ranges(kept)
    }

    fn inheritable_at(&self, rev: i64) -> Option<bool> {
        self.0
            .iter()
            .find(|r| r.start <= rev && rev < r.end)
            .map(|r| r.inheritable)
    }
}

/// A [`RangeList::reverse`] result: ranges with `start > end`, not a
/// canonical [`RangeList`].
#[derive(Clone, Debug)]
pub struct ReversedRangeList(Vec<Range>);

impl ReversedRangeList {
    pub fn ranges(&self) -> &[Range] {
        &self.0
    }
}

fn boundary_points(a: &RangeList, b: &RangeList) -> Vec<i64> {
    a.0.iter()
        .chain(b.0.iter())
        .flat_map(|r| [r.start, r.end])
        .collect()
}

fn coalesce(sorted: SmallVec<[Range; 4]>) -> SmallVec<[Range; 4]> {
    let mut out: SmallVec<[Range; 4]> = SmallVec::new();
    for range in sorted {
        match out.last_mut() {
            Some(prev) if prev.end == range.start && prev.inheritable == range.inheritable => {
                prev.end = range.end;
            }
            _ => out.push(range),
        }
    }
    out
}

fn check_non_overlapping(sorted: &[Range]) -> Result<(), RangelistError> {
    for (a, b) in sorted.iter().tuple_windows() {
        if b.start < a.end {
            return Err(RangelistError::Unordered(b.start));
        }
    }
    Ok(())
}

fn parse_element(element: &str) -> Result<Range, RangelistError> {
    let element = element.trim();
    let (body, inheritable) = match element.strip_suffix('*') {
        Some(body) => (body, false),
        None => (element, true),
    };
    let malformed = || RangelistError::MalformedElement(element.to_owned());
    let range = match body.split_once('-') {
        Some((lo, hi)) => {
            let lo: i64 = lo.parse().map_err(|_| malformed())?;
            let hi: i64 = hi.parse().map_err(|_| malformed())?;
            if lo >= hi {
                return Err(RangelistError::InvalidRange { start: lo, end: hi + 1 });
            }
            Range::new(lo, hi + 1, inheritable).map_err(|_| malformed())?
        }
        None => {
            let rev: i64 = body.parse().map_err(|_| malformed())?;
            Range::new(rev, rev + 1, inheritable).map_err(|_| malformed())?
        }
    };
    Ok(range.with_inheritable(inheritable))
}

/// Signed range as used by [`crate::mergeinfo::diff`]'s two-pass
/// deleted/added computation: a plain [`Range`] tagged with which side it
/// came from.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Sign {
    Added,
    Deleted,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct SignedRange {
    pub range: Range,
    pub sign: Sign,
}

/// Normalizes two possibly-signed ranges against each other: cancels exact
/// opposites, merges same-signed adjacent/overlapping ranges, clips
/// opposite-signed overlaps, and leaves disjoint ranges alone. Returns the
/// (possibly `None`) results plus whether anything changed.
pub fn compact(r1: SignedRange, r2: SignedRange) -> (Option<SignedRange>, Option<SignedRange>, bool) {
    if r1.range == r2.range && r1.sign != r2.sign {
        return (None, None, true);
    }
    if r1.sign == r2.sign {
        if r1.range.start <= r2.range.end && r2.range.start <= r1.range.end {
            let merged = SignedRange {
                range: Range {
                    start: r1.range.start.min(r2.range.start),
                    end: r1.range.end.max(r2.range.end),
                    inheritable: r1.range.inheritable && r2.range.inheritable,
                },
                sign: r1.sign,
            };
            return (Some(merged), None, true);
        }
        return (Some(r1), Some(r2), false);
    }
    // Opposite signs, overlapping: clip the later-starting range's
    // encroaching edge away from the earlier one.
    if r1.range.intersects(&r2.range) {
        let (earlier, later) = if r1.range.start <= r2.range.start { (r1, r2) } else { (r2, r1) };
        if later.range.start < earlier.range.end {
            let clipped_start = earlier.range.end;
            if clipped_start < later.range.end {
                let clipped = SignedRange {
                    range: Range { start: clipped_start, ..later.range },
                    sign: later.sign,
                };
                return (Some(earlier), Some(clipped), true);
            }
            return (Some(earlier), None, true);
        }
    }
    (Some(r1), Some(r2), false)
}
