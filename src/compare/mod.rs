pub mod levenshtein;

pub use levenshtein::{Levenshtein, cutoff_distance, distance};

/// A string similarity measure used when scoring a candidate record pair.
pub trait Comparator {
    /// Similarity in `[0.0, 1.0]`; `1.0` means identical.
    fn compare(&self, s1: &str, s2: &str) -> f64;

    /// Whether inputs should be handed over as whole tokens rather than
    /// split further by the caller. Does not change `compare` itself.
    fn is_tokenized(&self) -> bool;
}
