//! Dotted version comparison.
//!
//! Versions are compared segment by segment as integers, missing or
//! non-numeric segments counting as zero. This is not semver precedence:
//! pre-release and build metadata are not ordered, so `1.2.3-beta` compares
//! equal to `1.2.0` (the `3-beta` segment is not a number). Known limitation.

use std::cmp::Ordering;

/// Strip a leading `v`/`V` from a release tag.
pub fn strip_tag_prefix(tag: &str) -> &str {
    let trimmed = tag.trim();
    trimmed
        .strip_prefix('v')
        .or_else(|| trimmed.strip_prefix('V'))
        .unwrap_or(trimmed)
}

fn segments(version: &str) -> Vec<u64> {
    version
        .split('.')
        .map(|part| part.trim().parse::<u64>().unwrap_or(0))
        .collect()
}

/// Compare two dotted versions, zero-padding the shorter one.
pub fn compare_versions(a: &str, b: &str) -> Ordering {
    let left = segments(a);
    let right = segments(b);
    let len = left.len().max(right.len());

    for i in 0..len {
        let l = left.get(i).copied().unwrap_or(0);
        let r = right.get(i).copied().unwrap_or(0);
        match l.cmp(&r) {
            Ordering::Equal => continue,
            other => return other,
        }
    }
    Ordering::Equal
}

/// Returns `true` when `latest` is strictly newer than `current`.
pub fn is_newer(latest: &str, current: &str) -> bool {
    compare_versions(latest, current) == Ordering::Greater
}
