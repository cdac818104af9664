//! TEA1 stream cipher, including its documented reduced-keyspace
//! vulnerability (effective 32-bit key instead of the nominal 80-bit key).
//!
//! Reference: "TETRA:BURST" — Midnight Blue Security Research (2023).
//! This is the weakened cipher actually specified for TETRA's lowest
//! security class, not a general-purpose primitive — no external crypto
//! crate is reached for here.

use crate::errors::{CipherError, Result};

pub const KEY_SIZE: usize = 10; // 80 bits
pub const EFFECTIVE_KEY_SIZE: usize = 4; // 32 bits, per the documented vulnerability
pub const BLOCK_SIZE: usize = 8; // 64 bits
const ROUNDS: usize = 32;
const ROUND_CONSTANT: u32 = 0x9E37_79B9;

/// Substitution box (the standard AES S-box is reused here as a stand-in,
/// matching the reference implementation's own placeholder).
#[rustfmt::skip]
const S_BOX: [u8; 256] = [
    0x63, 0x7c, 0x77, 0x7b, 0xf2, 0x6b, 0x6f, 0xc5, 0x30, 0x01, 0x67, 0x2b, 0xfe, 0xd7, 0xab, 0x76,
    0xca, 0x82, 0xc9, 0x7d, 0xfa, 0x59, 0x47, 0xf0, 0xad, 0xd4, 0xa2, 0xaf, 0x9c, 0xa4, 0x72, 0xc0,
    0xb7, 0xfd, 0x93, 0x26, 0x36, 0x3f, 0xf7, 0xcc, 0x34, 0xa5, 0xe5, 0xf1, 0x71, 0xd8, 0x31, 0x15,
    0x04, 0xc7, 0x23, 0xc3, 0x18, 0x96, 0x05, 0x9a, 0x07, 0x12, 0x80, 0xe2, 0xeb, 0x27, 0xb2, 0x75,
    0x09, 0x83, 0x2c, 0x1a, 0x1b, 0x6e, 0x5a, 0xa0, 0x52, 0x3b, 0xd6, 0xb3, 0x29, 0xe3, 0x2f, 0x84,
    0x53, 0xd1, 0x00, 0xed, 0x20, 0xfc, 0xb1, 0x5b, 0x6a, 0xcb, 0xbe, 0x39, 0x4a, 0x4c, 0x58, 0xcf,
    0xd0, 0xef, 0xaa, 0xfb, 0x43, 0x4d, 0x33, 0x85, 0x45, 0xf9, 0x02, 0x7f, 0x50, 0x3c, 0x9f, 0xa8,
    0x51, 0xa3, 0x40, 0x8f, 0x92, 0x9d, 0x38, 0xf5, 0xbc, 0xb6, 0xda, 0x21, 0x10, 0xff, 0xf3, 0xd2,
    0xcd, 0x0c, 0x13, 0xec, 0x5f, 0x97, 0x44, 0x17, 0xc4, 0xa7, 0x7e, 0x3d, 0x64, 0x5d, 0x19, 0x73,
    0x60, 0x81, 0x4f, 0xdc, 0x22, 0x2a, 0x90, 0x88, 0x46, 0xee, 0xb8, 0x14, 0xde, 0x5e, 0x0b, 0xdb,
    0xe0, 0x32, 0x3a, 0x0a, 0x49, 0x06, 0x24, 0x5c, 0xc2, 0xd3, 0xac, 0x62, 0x91, 0x95, 0xe4, 0x79,
    0xe7, 0xc8, 0x37, 0x6d, 0x8d, 0xd5, 0x4e, 0xa9, 0x6c, 0x56, 0xf4, 0xea, 0x65, 0x7a, 0xae, 0x08,
    0xba, 0x78, 0x25, 0x2e, 0x1c, 0xa6, 0xb4, 0xc6, 0xe8, 0xdd, 0x74, 0x1f, 0x4b, 0xbd, 0x8b, 0x8a,
    0x70, 0x3e, 0xb5, 0x66, 0x48, 0x03, 0xf6, 0x0e, 0x61, 0x35, 0x57, 0xb9, 0x86, 0xc1, 0x1d, 0x9e,
    0xe1, 0xf8, 0x98, 0x11, 0x69, 0xd9, 0x8e, 0x94, 0x9b, 0x1e, 0x87, 0xe9, 0xce, 0x55, 0x28, 0xdf,
    0x8c, 0xa1, 0x89, 0x0d, 0xbf, 0xe6, 0x42, 0x68, 0x41, 0x99, 0x2d, 0x0f, 0xb0, 0x54, 0xbb, 0x16,
];

/// Extract the 32 bits that actually affect encryption under the documented
/// TEA1 vulnerability; the remaining 48 key bits are ignored by the weak
/// key schedule.
pub fn extract_reduced_key(full_key: &[u8; KEY_SIZE]) -> u32 {
    u32::from_be_bytes([full_key[0], full_key[1], full_key[2], full_key[3]])
}

fn key_schedule_reduced(reduced_key: u32) -> [u32; ROUNDS] {
    let mut round_keys = [0u32; ROUNDS];
    let mut rk = reduced_key;
    for (i, slot) in round_keys.iter_mut().enumerate() {
        *slot = rk ^ (i as u32).wrapping_mul(ROUND_CONSTANT);
        rk = rk.rotate_left(1);
    }
    round_keys
}

/// Full 80-bit key schedule: `k0`/`k1` are the first two 32-bit words of the
/// key, `k2` the remaining 16 bits. Still weak (both halves only rotate),
/// but uses all three words instead of discarding the last 48 bits.
fn key_schedule_full(k0: u32, k1: u32, k2: u32) -> [u32; ROUNDS] {
    let mut round_keys = [0u32; ROUNDS];
    let (mut k0, mut k1) = (k0, k1);
    for (i, slot) in round_keys.iter_mut().enumerate() {
        *slot = k0 ^ k1 ^ k2 ^ (i as u32).wrapping_mul(ROUND_CONSTANT);
        k0 = k0.rotate_left(1);
        k1 = k1.rotate_right(1);
    }
    round_keys
}

fn full_key_words(full_key: &[u8; KEY_SIZE]) -> (u32, u32, u32) {
    let k0 = u32::from_be_bytes([full_key[0], full_key[1], full_key[2], full_key[3]]);
    let k1 = u32::from_be_bytes([full_key[4], full_key[5], full_key[6], full_key[7]]);
    let k2 = u32::from_be_bytes([0, 0, full_key[8], full_key[9]]);
    (k0, k1, k2)
}

fn round(mut data: u32, round_key: u32) -> u32 {
    let mut bytes = data.to_be_bytes();
    for b in bytes.iter_mut() {
        *b = S_BOX[*b as usize];
    }
    data = u32::from_be_bytes(bytes);
    data ^= round_key;
    data.rotate_left(7)
}

/// Which key schedule a context was built with: the weak reduced-keyspace
/// one that only depends on the first 32 key bits, or the full 80-bit one
/// that uses all three key words (still weak, but not collapsed to 32 bits).
enum KeySchedule {
    Reduced(u32),
    Full { k0: u32, k1: u32, k2: u32 },
}

/// Decryption context: a chaining IV plus the key schedule in effect.
pub struct Tea1Context {
    iv: [u8; BLOCK_SIZE],
    schedule: KeySchedule,
}

impl Tea1Context {
    /// `key` is always the full 10-byte key; `use_vulnerability` selects
    /// whether decryption exploits the reduced 32-bit keyspace or runs the
    /// full three-word key schedule.
    pub fn new(key: &[u8], use_vulnerability: bool) -> Result<Self> {
        if key.len() != KEY_SIZE {
            return Err(CipherError::InvalidKeyLength {
                expected: KEY_SIZE,
                actual: key.len(),
            }
            .into());
        }
        let mut full_key = [0u8; KEY_SIZE];
        full_key.copy_from_slice(key);

        let schedule = if use_vulnerability {
            KeySchedule::Reduced(extract_reduced_key(&full_key))
        } else {
            let (k0, k1, k2) = full_key_words(&full_key);
            KeySchedule::Full { k0, k1, k2 }
        };

        Ok(Self {
            iv: [0u8; BLOCK_SIZE],
            schedule,
        })
    }

    pub fn from_reduced_key(reduced_key: u32) -> Self {
        Self {
            iv: [0u8; BLOCK_SIZE],
            schedule: KeySchedule::Reduced(reduced_key),
        }
    }

    /// The reduced 32-bit key, if this context was built in vulnerability
    /// mode; `None` for a full-key-schedule context.
    pub fn reduced_key(&self) -> Option<u32> {
        match self.schedule {
            KeySchedule::Reduced(k) => Some(k),
            KeySchedule::Full { .. } => None,
        }
    }

    /// Decrypt a single 8-byte block (no IV chaining — see `decrypt_stream`
    /// for CBC-style chaining across blocks).
    pub fn decrypt_block(&self, input: &[u8; BLOCK_SIZE]) -> [u8; BLOCK_SIZE] {
        let mut state0 = u32::from_be_bytes([input[0], input[1], input[2], input[3]]);
        let mut state1 = u32::from_be_bytes([input[4], input[5], input[6], input[7]]);

        let round_keys = match self.schedule {
            KeySchedule::Reduced(k) => key_schedule_reduced(k),
            KeySchedule::Full { k0, k1, k2 } => key_schedule_full(k0, k1, k2),
        };

        for rk in round_keys.iter().rev() {
            let temp = state1;
            state1 = state0;
            state0 = round(temp, *rk);
        }

        let mut output = [0u8; BLOCK_SIZE];
        output[0..4].copy_from_slice(&state0.to_be_bytes());
        output[4..8].copy_from_slice(&state1.to_be_bytes());
        output
    }

    /// Decrypt a stream of full blocks, chaining ciphertext blocks into the
    /// IV CBC-style: `plaintext[i] = decrypt_block(ciphertext[i]) XOR iv`,
    /// then `iv = ciphertext[i]`.
    pub fn decrypt_stream(&mut self, input: &[u8]) -> Result<Vec<u8>> {
        if input.len() % BLOCK_SIZE != 0 {
            return Err(CipherError::UnalignedCiphertext {
                len: input.len(),
                block_size: BLOCK_SIZE,
            }
            .into());
        }

        let mut output = Vec::with_capacity(input.len());
        for block in input.chunks_exact(BLOCK_SIZE) {
            let mut in_block = [0u8; BLOCK_SIZE];
            in_block.copy_from_slice(block);

            let mut out_block = self.decrypt_block(&in_block);
            for (o, iv_byte) in out_block.iter_mut().zip(self.iv.iter()) {
                *o ^= iv_byte;
            }
            self.iv = in_block;
            output.extend_from_slice(&out_block);
        }

        Ok(output)
    }
}
