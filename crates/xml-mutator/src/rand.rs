//! Seeded pseudo-randomness shared by every strategy.
//!
//! All random choices in this crate go through a single [`libafl_bolts::rands::Rand`]
//! implementation so that identical seed + corpus + host call sequence reproduces byte-identical
//! output, per the determinism invariant in the data model.

use libafl_bolts::rands::{Rand, RomuDuoJrRand};

pub type MutatorRand = RomuDuoJrRand;

pub fn seeded(seed: &[u8]) -> MutatorRand {
    MutatorRand::with_seed(seed_from_bytes(seed))
}

/// Folds arbitrary seed bytes (the AFL++ host hands us a `bytearray` seed, not a `u64`) into a
/// single `u64`, the way `str(seed)` plus `random.seed()` folded Python's seed value.
fn seed_from_bytes(seed: &[u8]) -> u64 {
    seed.iter()
        .fold(0xcbf29ce484222325u64, |acc, &b| {
            (acc ^ u64::from(b)).wrapping_mul(0x100000001b3)
        })
}

/// Picks an index from `weights` (parallel to `ids`) with probability proportional to its
/// weight. Mirrors Python's `random.choices(population, weights, k=1)`: weights are relative,
/// not required to sum to one, and selection is with replacement (irrelevant at k=1).
pub fn weighted_index(rand: &mut impl Rand, weights: &[f64]) -> Option<usize> {
    if weights.is_empty() {
        return None;
    }
    let total: f64 = weights.iter().sum();
    if total <= 0.0 {
        return Some(rand.below(std::num::NonZeroUsize::new(weights.len())?));
    }
    let mut roll = rand.next_float() * total;
    for (idx, weight) in weights.iter().enumerate() {
        if roll < *weight {
            return Some(idx);
        }
        roll -= *weight;
    }
    Some(weights.len() - 1)
}

/// Two distinct sorted indices in `0..len`, the way the Python mutators draw
/// `random.sample(range(0, len), 2)` and sort them.
pub fn two_sorted_indices(rand: &mut impl Rand, len: usize) -> Option<(usize, usize)> {
    if len < 2 {
        return None;
    }
    let len_nz = std::num::NonZeroUsize::new(len)?;
    loop {
        let a = rand.below(len_nz);
        let b = rand.below(len_nz);
        if a != b {
            return Some(if a < b { (a, b) } else { (b, a) });
        }
    }
}

/// Two distinct sorted char-boundary byte offsets into `text`, mirroring
/// `random.sample(range(0, len(text)), 2)` (sorted) where Python's `len` counts characters.
/// `None` when `text` has fewer than 2 characters.
pub fn two_sorted_char_offsets(rand: &mut impl Rand, text: &str) -> Option<(usize, usize)> {
    let offsets: Vec<usize> = text.char_indices().map(|(i, _)| i).collect();
    let (a, b) = two_sorted_indices(rand, offsets.len())?;
    Some((offsets[a], offsets[b]))
}

const LOWERCASE: &[u8] = b"abcdefghijklmnopqrstuvwxyz";

/// A random lowercase-letter string of exactly `len` characters (entity names in
/// `insert_dtd`, mirroring `random.choices(string.ascii_lowercase, k=10)`).
pub fn random_lowercase_string(rand: &mut impl Rand, len: usize) -> String {
    let alpha_len = std::num::NonZeroUsize::new(LOWERCASE.len()).unwrap();
    (0..len).map(|_| LOWERCASE[rand.below(alpha_len)] as char).collect()
}

const ALNUM: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";

/// A random ASCII alphanumeric string of length in `[min_len, max_len]`, the Rust equivalent
/// of the Python mutators' `"".join(random.choices(string.ascii_letters + string.digits, k=n))`.
pub fn random_alnum_string(rand: &mut impl Rand, min_len: usize, max_len: usize) -> String {
    let len = if max_len > min_len {
        rand.between(min_len, max_len)
    } else {
        min_len
    };
    let alnum_len = std::num::NonZeroUsize::new(ALNUM.len()).unwrap();
    (0..len).map(|_| ALNUM[rand.below(alnum_len)] as char).collect()
}
