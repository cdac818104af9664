//! Integration tests tying the TEA1 cipher's two key schedules to the
//! key-recovery engine: the reduced-keyspace vulnerability is exploitable
//! end to end, and the full key schedule genuinely depends on key material
//! the vulnerable schedule ignores.

use tetra_core::cipher::tea1::{BLOCK_SIZE, KEY_SIZE};
use tetra_core::cipher::Tea1Context;
use tetra_core::key_recovery::{known_plaintext_attack, KeyRecoveryOutcome};

#[test]
fn known_plaintext_attack_recovers_a_weak_key_from_a_null_header_pattern() {
    let target_key: u32 = 0x0000_012C;
    let ciphertext_block = Tea1Context::from_reduced_key(target_key).decrypt_block(&[0u8; BLOCK_SIZE]);

    let outcome = known_plaintext_attack(&ciphertext_block, 1_000_000, |_| {}).unwrap();
    match outcome {
        KeyRecoveryOutcome::Found { reduced_key, .. } => {
            assert_eq!(reduced_key, target_key);
        }
        other => panic!("expected the weak key to be recoverable, got {other:?}"),
    }
}

#[test]
fn full_key_schedule_is_not_exploitable_via_the_reduced_keyspace_search() {
    // A full-schedule context derived from a key whose first four bytes are
    // all zero would trivially "recover" as reduced_key == 0 if the cipher's
    // full-key path were actually just falling back to the reduced schedule.
    let key: [u8; KEY_SIZE] = [0, 0, 0, 0, 0xAB, 0xCD, 0xEF, 0x12, 0x34, 0x56];
    let mut full_ctx = Tea1Context::new(&key, false).unwrap();
    let mut reduced_ctx = Tea1Context::from_reduced_key(0);

    let plaintext = [0x11u8; BLOCK_SIZE];
    let from_full = full_ctx.decrypt_stream(&plaintext).unwrap();
    let from_reduced = reduced_ctx.decrypt_stream(&plaintext).unwrap();

    assert_ne!(from_full, from_reduced);
}

#[test]
fn decrypt_stream_round_trips_identically_for_two_contexts_built_from_the_same_full_key() {
    let key: [u8; KEY_SIZE] = [1, 2, 3, 4, 5, 6, 7, 8, 9, 10];
    let mut ctx_a = Tea1Context::new(&key, false).unwrap();
    let mut ctx_b = Tea1Context::new(&key, false).unwrap();

    let ciphertext = [0x77u8; BLOCK_SIZE * 2];
    assert_eq!(
        ctx_a.decrypt_stream(&ciphertext).unwrap(),
        ctx_b.decrypt_stream(&ciphertext).unwrap()
    );
}
