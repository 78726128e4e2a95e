//! P2P eligibility matching (spec.md §4.4, §6): a request is a candidate
//! for the swarm path iff it is a `GET` whose path matches
//! `^.+/blobs/sha256.*$`, and, when a non-empty rule set is configured, the
//! full URL additionally matches at least one configured rule.
//!
//! Kept as a standalone module so the matcher can be unit tested without
//! spinning up the reverse-proxy handler, mirroring how this codebase
//! isolates pure matching logic from its transport layer.

use std::sync::LazyLock;

use axum::http::Method;
use regex::Regex;

static BLOB_PATH_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^.+/blobs/sha256.*$").expect("blob path pattern is valid"));

/// Compiled form of the optional user-configured URL rule set.
pub(crate) struct RuleSet {
    rules: Vec<Regex>,
}

impl RuleSet {
    /// Compile `rules` as regular expressions. Invalid patterns are a
    /// programming error (spec.md §7 point 3) and are rejected eagerly at
    /// construction so bootstrap fails fast rather than at request time.
    ///
    /// # Errors
    ///
    /// Returns the first pattern that fails to compile, paired with the
    /// underlying regex error.
    pub(crate) fn compile(rules: &[String]) -> Result<Self, (String, regex::Error)> {
        let mut compiled = Vec::with_capacity(rules.len());
        for rule in rules {
            let regex = Regex::new(rule).map_err(|err| (rule.clone(), err))?;
            compiled.push(regex);
        }
        Ok(Self { rules: compiled })
    }

    /// Whether `url` satisfies the rule set. An empty rule set matches
    /// everything (spec.md §4.4: "if any rules are configured").
    fn matches(&self, url: &str) -> bool {
        self.rules.is_empty() || self.rules.iter().any(|rule| rule.is_match(url))
    }
}

/// Whether `method`/`path` is P2P-eligible per spec.md §4.4 and §6, given
/// the process's compiled rule set.
#[must_use]
pub(crate) fn is_eligible(method: &Method, path: &str, rules: &RuleSet) -> bool {
    method == Method::GET && BLOB_PATH_PATTERN.is_match(path) && rules.matches(path)
}

/// Derive the blob id a request's path maps to: the last path segment,
/// matching spec.md §3 ("the hex body after the `sha256:` prefix ...
/// derived at the HTTP layer from the last path segment of a blob URL").
#[must_use]
pub(crate) fn blob_id_for_path(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matches_blob_paths_only() {
        let rules = RuleSet::compile(&[]).expect("compile");
        assert!(is_eligible(
            &Method::GET,
            "/v2/library/nginx/blobs/sha256:abcdef",
            &rules
        ));
        assert!(!is_eligible(&Method::GET, "/v2/library/nginx/manifests/latest", &rules));
        assert!(!is_eligible(
            &Method::POST,
            "/v2/library/nginx/blobs/sha256:abcdef",
            &rules
        ));
    }

    #[test]
    fn empty_rule_set_matches_everything() {
        let rules = RuleSet::compile(&[]).expect("compile");
        assert!(rules.matches("/anything"));
    }

    #[test]
    fn non_empty_rule_set_requires_at_least_one_match() {
        let rules = RuleSet::compile(&["^/v2/library/.*$".to_string()]).expect("compile");
        assert!(is_eligible(
            &Method::GET,
            "/v2/library/nginx/blobs/sha256:abcdef",
            &rules
        ));
        assert!(!is_eligible(
            &Method::GET,
            "/v2/other/nginx/blobs/sha256:abcdef",
            &rules
        ));
    }

    #[test]
    fn invalid_rule_is_rejected_at_compile_time() {
        let err = RuleSet::compile(&["(unclosed".to_string()]).expect_err("should reject");
        assert_eq!(err.0, "(unclosed");
    }

    #[test]
    fn blob_id_is_last_path_segment() {
        assert_eq!(
            blob_id_for_path("/v2/library/nginx/blobs/sha256:abcdef"),
            "sha256:abcdef"
        );
    }
}
