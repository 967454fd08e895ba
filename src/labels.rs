use crate::model::Milestone;
use std::collections::BTreeSet;

/// Canonical form of a single label: trimmed, lowercased, inner whitespace
/// runs replaced by one hyphen. Returns `None` when nothing is left.
pub fn canonical(raw: &str) -> Option<String> {
    let joined = raw
        .split_whitespace()
        .map(|part| part.to_lowercase())
        .collect::<Vec<_>>()
        .join("-");
    if joined.is_empty() {
        None
    } else {
        Some(joined)
    }
}

/// Canonicalizes and deduplicates, keeping the first occurrence's position.
pub fn normalize<I, S>(raw: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut out: Vec<String> = Vec::new();
    for label in raw {
        if let Some(label) = canonical(label.as_ref()) {
            if !out.contains(&label) {
                out.push(label);
            }
        }
    }
    out
}

/// Splits a comma separated form entry into canonical labels.
pub fn parse_list(input: &str) -> Vec<String> {
    normalize(input.split(','))
}

/// Every label used by any milestone, sorted.
pub fn vocabulary<'a, I>(milestones: I) -> Vec<String>
where
    I: IntoIterator<Item = &'a Milestone>,
{
    milestones
        .into_iter()
        .flat_map(|m| m.labels.iter().cloned())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}
