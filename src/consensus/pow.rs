// Proof of Work engine

use sha2::{Digest, Sha256};
use std::sync::atomic::{AtomicBool, Ordering};

/// Fixed network difficulty: how many leading '1' characters the hex
/// digest of a proof must carry. Not adaptive in this design.
pub const DIFFICULTY: u32 = 2;

/// Check a proof against its predecessor at the given difficulty.
///
/// The guess is the decimal concatenation of both proofs; its SHA256 hex
/// digest must start with `difficulty` ones. A non-positive difficulty is
/// a configuration error, not a validation outcome.
pub fn verify_proof(prev_proof: u64, proof: u64, difficulty: u32) -> bool {
    assert!(difficulty > 0, "difficulty must be a positive number");

    let guess = format!("{}{}", prev_proof, proof);
    let digest = hex::encode(Sha256::digest(guess.as_bytes()));
    digest.starts_with(&"1".repeat(difficulty as usize))
}

/// Linear proof search from zero: return the first value accepted by
/// `verify_proof`. Unbounded by design - an unreachable difficulty spins
/// forever rather than erroring.
pub fn find_proof(prev_proof: u64, difficulty: u32) -> u64 {
    let mut proof = 0;
    while !verify_proof(prev_proof, proof, difficulty) {
        proof += 1;
    }
    proof
}

/// Proof search that polls a cancellation flag between attempts, so the
/// caller can abandon a search once a competing block makes it stale.
pub fn find_proof_cancellable(
    prev_proof: u64,
    difficulty: u32,
    cancel: &AtomicBool,
) -> Option<u64> {
    let mut proof = 0u64;
    loop {
        if cancel.load(Ordering::Relaxed) {
            log::debug!(
                "proof search after {} cancelled at attempt {}",
                prev_proof,
                proof
            );
            return None;
        }
        if verify_proof(prev_proof, proof, difficulty) {
            return Some(proof);
        }
        proof += 1;
        if proof % 100_000 == 0 {
            log::debug!("proof search attempts: {}", proof);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sha2::{Digest, Sha256};

    #[test]
    fn test_find_proof_satisfies_verify() {
        let proof = find_proof(42, DIFFICULTY);
        assert!(verify_proof(42, proof, DIFFICULTY));

        // Digest really starts with the required ones
        let guess = format!("42{}", proof);
        let digest = hex::encode(Sha256::digest(guess.as_bytes()));
        assert!(digest.starts_with("11"));
    }

    #[test]
    fn test_find_proof_is_deterministic() {
        assert_eq!(find_proof(7, DIFFICULTY), find_proof(7, DIFFICULTY));
    }

    #[test]
    fn test_first_proof_wins() {
        // Every value below the found proof must fail verification
        let proof = find_proof(3, 1);
        for candidate in 0..proof {
            assert!(!verify_proof(3, candidate, 1));
        }
    }

    #[test]
    fn test_cancelled_search_returns_none() {
        let cancel = AtomicBool::new(true);
        assert_eq!(find_proof_cancellable(42, DIFFICULTY, &cancel), None);
    }

    #[test]
    fn test_uncancelled_search_matches_blocking_search() {
        let cancel = AtomicBool::new(false);
        let proof = find_proof_cancellable(42, DIFFICULTY, &cancel);
        assert_eq!(proof, Some(find_proof(42, DIFFICULTY)));
    }

    #[test]
    #[should_panic(expected = "difficulty must be a positive number")]
    fn test_zero_difficulty_is_a_caller_error() {
        verify_proof(1, 1, 0);
    }
}
