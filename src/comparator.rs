use std::cmp::Ordering;

/// Total order over keys.
///
/// Tables are only readable with the comparator they were built with, so
/// `name` must change whenever the ordering does.
pub trait Comparator: Send + Sync {
    /// Stable identifier of this ordering.
    fn name(&self) -> &'static str;

    /// Three-way comparison of two keys.
    fn compare(&self, a: &[u8], b: &[u8]) -> Ordering;
}

/// Lexicographic byte-wise ordering. The default.
#[derive(Debug, Default, Clone, Copy)]
pub struct BytewiseComparator;

impl Comparator for BytewiseComparator {
    fn name(&self) -> &'static str {
        "lsm.BytewiseComparator"
    }

    fn compare(&self, a: &[u8], b: &[u8]) -> Ordering {
        a.cmp(b)
    }
}
