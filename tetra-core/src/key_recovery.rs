//! TEA1 key-recovery engine: exhaustive search over the reduced 32-bit
//! keyspace created by the documented TEA1 vulnerability, plus a
//! known-plaintext attack using predictable TETRA header patterns.

use std::time::Instant;

use crate::cipher::tea1::{self, Tea1Context, BLOCK_SIZE};
use crate::errors::{CipherError, Result};

/// Progress reported every `PROGRESS_INTERVAL` candidates tried.
pub const PROGRESS_INTERVAL: u64 = 100_000;

/// Two header patterns that commonly appear in unencrypted/test TETRA
/// traffic, used as known-plaintext guesses.
pub const KNOWN_PATTERNS: [[u8; BLOCK_SIZE]; 2] = [
    [0x00; BLOCK_SIZE],
    [0x55; BLOCK_SIZE],
];

#[derive(Debug, Clone, Copy)]
pub struct RecoveryProgress {
    pub candidates_tried: u64,
    pub budget: u64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum KeyRecoveryOutcome {
    Found { reduced_key: u32, candidates_tried: u64 },
    Exhausted {
        candidates_tried: u64,
        /// Candidates tested per second over the search window.
        rate: f64,
        /// Extrapolated time, at `rate`, to exhaust the full 2^32 keyspace.
        estimated_full_sweep_secs: f64,
    },
}

fn test_candidate(candidate: u32, ciphertext_block: &[u8; BLOCK_SIZE], known_plaintext: &[u8]) -> bool {
    let ctx = Tea1Context::from_reduced_key(candidate);
    let decrypted = ctx.decrypt_block(ciphertext_block);
    let compare_len = known_plaintext.len().min(BLOCK_SIZE);
    decrypted[..compare_len] == known_plaintext[..compare_len]
}

/// Exhaustively test candidate 32-bit keys `0..budget` against the first
/// ciphertext block, reporting progress every [`PROGRESS_INTERVAL`]
/// candidates via `on_progress`.
pub fn recover(
    ciphertext: &[u8],
    known_plaintext: &[u8],
    budget: u64,
    mut on_progress: impl FnMut(RecoveryProgress),
) -> Result<KeyRecoveryOutcome> {
    if ciphertext.len() < BLOCK_SIZE {
        return Err(CipherError::UnalignedCiphertext {
            len: ciphertext.len(),
            block_size: BLOCK_SIZE,
        }
        .into());
    }
    if known_plaintext.is_empty() {
        return Err(CipherError::InsufficientKnownPlaintext {
            required: 1,
            available: 0,
        }
        .into());
    }

    let mut block = [0u8; BLOCK_SIZE];
    block.copy_from_slice(&ciphertext[..BLOCK_SIZE]);

    let budget = budget.min(u32::MAX as u64 + 1);
    let mut candidates_tried = 0u64;
    let start = Instant::now();

    for candidate in 0..budget {
        candidates_tried += 1;
        if test_candidate(candidate as u32, &block, known_plaintext) {
            return Ok(KeyRecoveryOutcome::Found {
                reduced_key: candidate as u32,
                candidates_tried,
            });
        }

        if candidates_tried % PROGRESS_INTERVAL == 0 {
            on_progress(RecoveryProgress {
                candidates_tried,
                budget,
            });
        }
    }

    let (rate, estimated_full_sweep_secs) = sweep_rate(candidates_tried, start.elapsed().as_secs_f64());
    Ok(KeyRecoveryOutcome::Exhausted {
        candidates_tried,
        rate,
        estimated_full_sweep_secs,
    })
}

/// Candidates/sec and the extrapolated time to exhaust the full 2^32
/// keyspace at that rate.
fn sweep_rate(candidates_tried: u64, elapsed_secs: f64) -> (f64, f64) {
    let elapsed_secs = elapsed_secs.max(f64::MIN_POSITIVE);
    let rate = candidates_tried as f64 / elapsed_secs;
    let estimated_full_sweep_secs = if rate > 0.0 {
        (u32::MAX as f64 + 1.0) / rate
    } else {
        f64::INFINITY
    };
    (rate, estimated_full_sweep_secs)
}

/// Try the known-TETRA-header patterns as known plaintext, in order,
/// against the first ciphertext block.
pub fn known_plaintext_attack(
    ciphertext: &[u8],
    budget: u64,
    mut on_progress: impl FnMut(RecoveryProgress),
) -> Result<KeyRecoveryOutcome> {
    let mut total_tried = 0u64;
    let start = Instant::now();
    for pattern in KNOWN_PATTERNS.iter() {
        match recover(ciphertext, pattern, budget, &mut on_progress)? {
            KeyRecoveryOutcome::Found {
                reduced_key,
                candidates_tried,
            } => {
                return Ok(KeyRecoveryOutcome::Found {
                    reduced_key,
                    candidates_tried: total_tried + candidates_tried,
                })
            }
            KeyRecoveryOutcome::Exhausted { candidates_tried, .. } => {
                total_tried += candidates_tried;
            }
        }
    }
    let (rate, estimated_full_sweep_secs) = sweep_rate(total_tried, start.elapsed().as_secs_f64());
    Ok(KeyRecoveryOutcome::Exhausted {
        candidates_tried: total_tried,
        rate,
        estimated_full_sweep_secs,
    })
}
