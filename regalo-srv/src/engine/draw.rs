//! Randomness source for new assignments

use rand::Rng;

/// Draws used when a new assignment is created
pub trait PhraseDraw: Send + Sync {
    /// Phrase id, uniform over `1..=catalog_size`
    fn phrase_id(&self, catalog_size: i64) -> i64;

    /// Variant index, uniform over `0..variant_count`
    fn variant_index(&self, variant_count: usize) -> usize;
}

/// Thread-local RNG draws
#[derive(Debug, Clone, Copy, Default)]
pub struct RandomDraw;

impl PhraseDraw for RandomDraw {
    fn phrase_id(&self, catalog_size: i64) -> i64 {
        rand::thread_rng().gen_range(1..=catalog_size.max(1))
    }

    fn variant_index(&self, variant_count: usize) -> usize {
        rand::thread_rng().gen_range(0..variant_count.max(1))
    }
}
