//! Ordering rules for membership nodes
//!
//! Sequence suffixes are compared numerically, never lexically: the store
//! assigns the digits and nothing guarantees a fixed zero-padding width
//! across implementations. Sibling names without a parseable suffix are
//! foreign to the protocol and are ignored rather than faulting a check.

use std::cmp::Ordering;

/// The store-assigned sequence suffix of a membership node name, if any.
///
/// Parses the trailing run of decimal digits; returns `None` when the name
/// has no such run or the digits overflow a `u64`.
pub fn sequence_of(name: &str) -> Option<u64> {
    let digits = match name
        .char_indices()
        .rev()
        .take_while(|(_, c)| c.is_ascii_digit())
        .last()
    {
        Some((idx, _)) => &name[idx..],
        None => return None,
    };
    digits.parse().ok()
}

/// Whether `member` holds the lock: it must still be present in `siblings`
/// and carry the strictly smallest sequence among all parseable siblings.
///
/// A member missing from the sibling set is never the owner, no matter what
/// its sequence was; its node may have been reaped by session expiry.
pub fn is_lowest(member: &str, siblings: &[String]) -> bool {
    if !siblings.iter().any(|s| s == member) {
        return false;
    }
    let Some(mine) = sequence_of(member) else {
        return false;
    };
    !siblings
        .iter()
        .filter_map(|s| sequence_of(s))
        .any(|seq| seq < mine)
}

/// Sort sibling names into true acquisition order: numerically by sequence
/// suffix, with unparseable names after all parseable ones (lexically among
/// themselves).
pub fn sort_by_rank(names: &mut [String]) {
    names.sort_by(|a, b| match (sequence_of(a), sequence_of(b)) {
        (Some(x), Some(y)) => x.cmp(&y),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => a.cmp(b),
    });
}
