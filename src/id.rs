//! Collision-resistant id generation for traces, observations, and scores.
//!
//! Draws randomness from `rand` the way `opentelemetry_sdk`'s id generators
//! do. A single fixed alphabet is used here rather than a pluggable
//! generator, since one collision-resistant scheme covers every id kind
//! this crate needs rather than swappable propagation formats.

use rand::rngs::{OsRng, StdRng};
use rand::{RngCore, SeedableRng};
use std::sync::OnceLock;
use std::time::Instant;

const ALPHABET: &[u8] =
    b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789-_";

/// Minimum length accepted by [`validate_id`], regardless of `kind`.
const MIN_ID_LEN: usize = 8;

/// The category of id being generated; only used to pick a target length,
/// since all kinds share one alphabet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdKind {
    /// A trace id.
    Trace,
    /// An observation (span/generation/event) id.
    Observation,
    /// A score id.
    Score,
}

impl IdKind {
    fn target_len(self) -> usize {
        match self {
            IdKind::Trace | IdKind::Observation => 16,
            IdKind::Score => 12,
        }
    }
}

fn monotonic_origin() -> Instant {
    static ORIGIN: OnceLock<Instant> = OnceLock::new();
    *ORIGIN.get_or_init(Instant::now)
}

/// Fills `buf` with cryptographically strong random bytes, falling back to a
/// clock-seeded PRNG (and logging a warning) if the OS source is unavailable.
///
/// This fallback is a safety net, not a supported mode: id collisions become
/// far more likely under it, but returning an empty or short id is never an
/// acceptable outcome.
fn fill_random(buf: &mut [u8]) {
    if OsRng.try_fill_bytes(buf).is_ok() {
        return;
    }

    tracing::warn!(
        "langfuse: OS random source unavailable, falling back to a clock-seeded PRNG for id generation"
    );
    let seed = monotonic_origin().elapsed().as_nanos() as u64;
    let mut rng = StdRng::seed_from_u64(seed);
    rng.fill_bytes(buf);
}

/// Generates a fresh id of the given `kind`.
///
/// Never returns an empty string: the fallback random source is infallible
/// by construction.
pub fn new_id(kind: IdKind) -> String {
    let len = kind.target_len();
    let mut raw = vec![0u8; len];
    fill_random(&mut raw);

    raw.iter()
        .map(|b| ALPHABET[(*b as usize) % ALPHABET.len()] as char)
        .collect()
}

/// Returns `true` if `s` is a well-formed id: non-empty, at least
/// [`MIN_ID_LEN`] characters, and composed entirely of the permitted
/// alphabet.
pub fn validate_id(s: &str) -> bool {
    s.len() >= MIN_ID_LEN && s.bytes().all(|b| ALPHABET.contains(&b))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_ids_are_valid_and_well_sized() {
        let trace_id = new_id(IdKind::Trace);
        assert_eq!(trace_id.len(), 16);
        assert!(validate_id(&trace_id));

        let score_id = new_id(IdKind::Score);
        assert_eq!(score_id.len(), 12);
        assert!(validate_id(&score_id));
    }

    #[test]
    fn ids_are_not_trivially_repeated() {
        let mut seen = std::collections::HashSet::new();
        for _ in 0..10_000 {
            let id = new_id(IdKind::Observation);
            assert!(seen.insert(id), "id generator produced a collision");
        }
    }

    #[test]
    fn validate_id_rejects_empty_short_and_foreign_alphabet() {
        assert!(!validate_id(""));
        assert!(!validate_id("short"));
        assert!(!validate_id("not valid!!")); // space and `!` outside alphabet
        assert!(validate_id("abcdefgh12345678"));
    }
}
