//! Prefix matching of candidate relation paths against allowed paths.
//!
//! A relation reached by the candidate path `c` stays expanded iff some
//! allowed path `a` has `c` as a prefix: for every index `i < c.len()`,
//! `c[i] == a[i]` (a missing `a[i]` compares as the empty string).
//!
//! When the relation sits on an entity, its value may later branch by
//! variant. For that case (`polymorphic_last`) the allowed segment at the
//! candidate's last index is compared without its `(Variant)` suffix, so an
//! allowed `pets(dog)` keeps the `pets` relation. The variant itself is
//! checked one level deeper, once the pruner has appended it to the path.

use crate::Path;

/// Strip a `(Variant)` suffix: `pets(dog)` → `pets`.
pub fn relation_name(segment: &str) -> &str {
    match segment.split_once('(') {
        Some((name, _)) => name,
        None => segment,
    }
}

pub fn matches(candidate: &Path, allowed: &Path, polymorphic_last: bool) -> bool {
    let last = candidate.len().checked_sub(1);

    candidate
        .segments()
        .iter()
        .enumerate()
        .all(|(i, want)| {
            let have = allowed.segments().get(i).map_or("", String::as_str);
            let have = if polymorphic_last && Some(i) == last {
                relation_name(have)
            } else {
                have
            };
            have == want
        })
}

/// True iff at least one allowed path admits `candidate`.
pub fn retains(candidate: &Path, allowed: &[Path], polymorphic_last: bool) -> bool {
    allowed
        .iter()
        .any(|path| matches(candidate, path, polymorphic_last))
}
