//! Seed resolution for reproducible batches
//!
//! An operation with an explicit seed runs every batch item with that seed
//! unchanged. An unseeded batch resolves one seed up front and every item
//! derives its own seed from that value and its global index, so native
//! batch, chunked worker tasks and sequential fallback agree for the same
//! batch seed while items still differ from each other.

const GOLDEN_GAMMA: u64 = 0x9E37_79B9_7F4A_7C15;

/// Return the explicit seed, or draw a fresh one
pub fn resolve_seed(explicit: Option<u64>) -> u64 {
    explicit.unwrap_or_else(rand::random)
}

/// Seed for the item at `index` within a batch seeded with `batch_seed`
pub fn item_seed(batch_seed: u64, index: usize) -> u64 {
    splitmix64(batch_seed.wrapping_add((index as u64).wrapping_mul(GOLDEN_GAMMA)))
}

fn splitmix64(mut z: u64) -> u64 {
    z = z.wrapping_add(GOLDEN_GAMMA);
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}
