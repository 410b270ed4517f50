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

//! Revision numbers: a total order over committed revisions plus the
//! `INVALID` sentinel used throughout the engine for "unknown / not yet
//! assigned".

use std::fmt;
use std::num::ParseIntError;
use std::str::FromStr;

/// A committed revision number, or the `INVALID` sentinel.
///
/// Revision 0 is the empty initial revision and always exists. Revisions are
/// totally ordered and monotonically assigned by commit.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Revnum(i64);

impl Revnum {
    /// "Unknown / not yet assigned."
    pub const INVALID: Revnum = Revnum(-1);

    /// The empty initial revision, always present.
    pub const ZERO: Revnum = Revnum(0);

    /// Wraps a non-negative revision number.
    ///
    /// # Panics
    ///
    /// Panics if `value` is negative; callers that need the sentinel should
    /// use [`Revnum::INVALID`] directly.
    pub const fn new(value: u64) -> Self {
        Revnum(value as i64)
    }

    /// Whether this is the `INVALID` sentinel.
    pub const fn is_valid(self) -> bool {
        self.0 >= 0
    }

    /// The underlying value, or `None` for `INVALID`.
    pub const fn as_u64(self) -> Option<u64> {
        if self.is_valid() { Some(self.0 as u64) } else { None }
    }

    /// Returns `self + 1`. Used when allocating the revision for a commit.
    pub const fn next(self) -> Revnum {
        Revnum(self.0 + 1)
    }

    /// Returns `self - 1`, saturating at `ZERO`.
    pub const fn prev(self) -> Revnum {
        if self.0 <= 0 { Revnum(0) } else { Revnum(self.0 - 1) }
    }
}

impl fmt::Debug for Revnum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_valid() {
            write!(f, "r{}", self.0)
        } else {
            write!(f, "r<invalid>")
        }
    }
}

impl fmt::Display for Revnum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Revnum {
    type Err = ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse::<u64>().map(Revnum::new)
    }
}

impl From<u64> for Revnum {
    fn from(value: u64) -> Self {
        Revnum::new(value)
    }
}
