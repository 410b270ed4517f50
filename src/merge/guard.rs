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

//! Pre-flight checks run before a merge is planned (spec §8 scenario 6,
//! §7's `bad-url`/`scheme-mismatch`/`incorrect-params` rows): reject
//! unsupported merge requests before anything is diffed or recorded, so a
//! rejected request never touches the working copy or its mergeinfo.

use crate::error::MergeError;

/// The two source URLs and the record-only flag a merge request carries.
/// `url2` is `None` for the common one-URL form (a single source path
/// merged across a revision range); it is `Some` only for the two-URL form
/// (merging the diff between two distinct source trees).
pub struct MergeRequest<'a> {
    pub target_url: &'a str,
    pub url1: &'a str,
    pub url2: Option<&'a str>,
    pub record_only: bool,
}

fn scheme(url: &str) -> Option<&str> {
    url.split_once(':').map(|(scheme, _)| scheme)
}

fn authority(url: &str) -> Option<&str> {
    let rest = url.split_once("://")?.1;
    Some(rest.split('/').next().unwrap_or(rest))
}

/// Checks `request` against the guard rules that must hold before planning
/// starts. Returns the first violation found; an `Ok(())` request is safe to
/// pass on to [`crate::merge::planner::plan`].
pub fn validate(request: &MergeRequest<'_>) -> Result<(), MergeError> {
    if let Some(url2) = request.url2 {
        if url2 != request.url1 && request.record_only {
            return Err(MergeError::IncorrectParams(
                "use of two URLs is not compatible with mergeinfo modification",
            ));
        }
    }

    match (scheme(request.url1), scheme(request.target_url)) {
        (Some(a), Some(b)) if a == b => {}
        (None, _) | (_, None) => return Err(MergeError::BadUrl),
        _ => return Err(MergeError::SchemeMismatch),
    }

    if let Some(url2) = request.url2 {
        match (scheme(url2), scheme(request.target_url)) {
            (Some(a), Some(b)) if a == b => {}
            (None, _) | (_, None) => return Err(MergeError::BadUrl),
            _ => return Err(MergeError::SchemeMismatch),
        }
    }

    if authority(request.url1) != authority(request.target_url) {
        return Err(MergeError::UnrelatedResources);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matching_schemes_and_authority_pass() {
        let req = MergeRequest {
            target_url: "https://example.com/repo/trunk",
            url1: "https://example.com/repo/branches/b",
            url2: None,
            record_only: false,
        };
        assert!(validate(&req).is_ok());
    }

    #[test]
    fn mismatched_schemes_are_rejected() {
        let req = MergeRequest {
            target_url: "https://example.com/repo/trunk",
            url1: "svn+ssh://example.com/repo/branches/b",
            url2: None,
            record_only: false,
        };
        assert!(matches!(validate(&req), Err(MergeError::SchemeMismatch)));
    }

    #[test]
    fn two_url_form_with_record_only_is_incorrect_params() {
        let req = MergeRequest {
            target_url: "https://example.com/repo/trunk",
            url1: "https://example.com/repo/branches/b@5",
            url2: Some("https://example.com/repo/branches/b@10"),
            record_only: true,
        };
        assert!(matches!(validate(&req), Err(MergeError::IncorrectParams(_))));
    }

    #[test]
    fn two_url_form_with_identical_urls_and_record_only_is_allowed() {
        // Same URL on both sides degenerates to the one-URL form even
        // though `url2` is present, so `record_only` is fine.
        let req = MergeRequest {
            target_url: "https://example.com/repo/trunk",
            url1: "https://example.com/repo/branches/b",
            url2: Some("https://example.com/repo/branches/b"),
            record_only: true,
        };
        assert!(validate(&req).is_ok());
    }

    #[test]
    fn different_repository_authority_is_unrelated_resources() {
        let req = MergeRequest {
            target_url: "https://example.com/repo-a/trunk",
            url1: "https://other.example.com/repo-b/trunk",
            url2: None,
            record_only: false,
        };
        assert!(matches!(validate(&req), Err(MergeError::UnrelatedResources)));
    }

    #[test]
    fn url_without_a_scheme_is_a_bad_url() {
        let req = MergeRequest {
            target_url: "not-a-url",
            url1: "https://example.com/repo/trunk",
            url2: None,
            record_only: false,
        };
        assert!(matches!(validate(&req), Err(MergeError::BadUrl)));
    }
}
