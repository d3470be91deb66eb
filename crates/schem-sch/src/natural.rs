use std::cmp::Ordering;

/// Orders references and pin numbers the way a reader expects: `R2` before
/// `R10`, `2` before `10`. Ties fall back to byte order so that `R01` and
/// `R1` stay distinct.
pub fn natural_cmp(a: &str, b: &str) -> Ordering {
    natord::compare(a, b).then_with(|| a.cmp(b))
}
