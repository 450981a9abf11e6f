//! Candidate filtering: metadata equality and hierarchical tag predicates.
//!
//! An entry passes when it satisfies *all* metadata filters and, if any tag
//! or tag-prefix constraints were supplied, at least one of them. Deleted
//! entries never pass.

use crate::entry::KnowledgeEntry;
use crate::search::types::SearchRequest;

/// Whether `tag` equals `prefix` or descends from it in the `/` hierarchy.
///
/// `"AI/ML"` matches `"AI/ML"` and `"AI/ML/NeuralNetworks"` but not
/// `"AI/MLops"`: the character after the prefix must be a path separator.
pub fn tag_matches_prefix(tag: &str, prefix: &str) -> bool {
    if tag == prefix {
        return true;
    }
    tag.len() > prefix.len()
        && tag.starts_with(prefix)
        && tag.as_bytes()[prefix.len()] == b'/'
}

/// Evaluates the filter portion of a request against one entry.
pub fn matches_request(entry: &KnowledgeEntry, request: &SearchRequest) -> bool {
    if entry.is_deleted {
        return false;
    }

    // Metadata: every (key, value) must match exactly. Missing key excludes.
    for (key, expected) in &request.filters {
        match entry.metadata.get(key) {
            Some(actual) if actual == expected => {}
            _ => return false,
        }
    }

    // Tags: at least one exact or prefix hit when either list is non-empty
    if !request.tags.is_empty() || !request.tag_prefixes.is_empty() {
        let exact = entry
            .tags
            .iter()
            .any(|t| request.tags.iter().any(|q| q == t));
        let prefixed = entry.tags.iter().any(|t| {
            request
                .tag_prefixes
                .iter()
                .any(|p| tag_matches_prefix(t, p))
        });
        if !exact && !prefixed {
            return false;
        }
    }

    true
}
