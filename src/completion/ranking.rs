//! Bucketed ranking.
//!
//! | Bucket | Candidate |
//! |--------|-----------|
//! | 0 | term in the active prefix whose local name starts with the query |
//! | 1 | any other term in the active prefix |
//! | 2 | no active prefix, label starts with what is typed |
//! | 3 | subject reference |
//! | 4 | syntax keyword |
//! | 5 | everything else |
//!
//! Matching is case-insensitive. The sort key is the bucket followed by the
//! label.

use std::collections::HashSet;

use super::candidate::Candidate;
use super::cursor::CursorContext;

fn starts_with_ignore_case(text: &str, prefix: &str) -> bool {
    text.to_lowercase().starts_with(&prefix.to_lowercase())
}

pub fn bucket(candidate: &Candidate, cursor: &CursorContext) -> u8 {
    match (&cursor.active_prefix, candidate.prefix()) {
        (Some(active), Some(prefix)) if active == prefix => {
            let local = candidate.local().unwrap_or_default();
            if starts_with_ignore_case(local, &cursor.query) {
                0
            } else {
                1
            }
        }
        (None, _)
            if !cursor.typed.is_empty()
                && starts_with_ignore_case(&candidate.label(), &cursor.typed) =>
        {
            2
        }
        _ => match candidate {
            Candidate::SubjectReference { .. } => 3,
            Candidate::SyntaxKeyword { .. } => 4,
            _ => 5,
        },
    }
}

pub fn sort_key(candidate: &Candidate, cursor: &CursorContext) -> String {
    format!("{}{}", bucket(candidate, cursor), candidate.label())
}

/// Sorts candidates by key (stable), then keeps the first candidate for each
/// label.
pub fn rank(candidates: Vec<Candidate>, cursor: &CursorContext) -> Vec<(String, Candidate)> {
    let mut keyed: Vec<(String, Candidate)> = candidates
        .into_iter()
        .map(|candidate| (sort_key(&candidate, cursor), candidate))
        .collect();
    keyed.sort_by(|a, b| a.0.cmp(&b.0));

    let mut seen = HashSet::new();
    keyed.retain(|(_, candidate)| seen.insert(candidate.label()));
    keyed
}
