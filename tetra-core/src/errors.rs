//! TETRA analyzer error types with granular categories

use thiserror::Error;

/// Top-level error type for all tetra-core operations
#[derive(Debug, Error)]
pub enum TetraError {
    #[error("Demodulation error: {0}")]
    Demod(#[from] DemodError),

    #[error("Cipher error: {0}")]
    Cipher(#[from] CipherError),

    #[error("Codec error: {0}")]
    Codec(#[from] CodecError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Channel manager error: {0}")]
    Channel(#[from] ChannelError),

    #[error("Audio sink error: {0}")]
    Audio(#[from] std::io::Error),
}

/// Demodulator/DSP-pipeline errors
#[derive(Debug, Error)]
pub enum DemodError {
    #[error("Insufficient samples: need at least 2, got {available}")]
    InsufficientSamples { available: usize },

    #[error("Scratch buffer unavailable: demodulator configured with zero capacity")]
    ScratchBufferUnavailable,

    #[error("Poisoned detection-parameter lock")]
    ParamsLockPoisoned,

    #[error("Poisoned detection-status lock")]
    StatusLockPoisoned,
}

/// TEA1 cipher errors
#[derive(Debug, Error)]
pub enum CipherError {
    #[error("Key must be exactly {expected} bytes, got {actual}")]
    InvalidKeyLength { expected: usize, actual: usize },

    #[error("Ciphertext length {len} is not a multiple of the {block_size}-byte block size")]
    UnalignedCiphertext { len: usize, block_size: usize },

    #[error("Key recovery budget ({budget} candidates) exhausted without a match")]
    RecoveryExhausted { budget: u64 },

    #[error("Known-plaintext comparison requires at least {required} bytes, got {available}")]
    InsufficientKnownPlaintext { required: usize, available: usize },
}

/// Voice codec errors
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("Codec frame must be exactly {expected} bits, got {actual}")]
    InvalidFrameLength { expected: usize, actual: usize },
}

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid sample rate: {rate} Hz (must be > 0)")]
    InvalidSampleRate { rate: u32 },

    #[error("Squelch threshold must be finite and non-negative, got {value}")]
    InvalidSquelchThreshold { value: f32 },

    #[error("LPF cutoff must lie in (0.0, 1.0], got {value}")]
    InvalidLpfCutoff { value: f32 },

    #[error("Priority threshold must lie in 0..=10, got {value}")]
    InvalidPriorityThreshold { value: i32 },
}

/// Channel manager / trunking errors
#[derive(Debug, Error)]
pub enum ChannelError {
    #[error("Talk group table is full (capacity {capacity})")]
    TalkGroupTableFull { capacity: usize },

    #[error("No free voice channel slot (capacity {capacity})")]
    NoFreeVoiceSlot { capacity: usize },

    #[error("Unknown talk group id {id}")]
    UnknownTalkGroup { id: u32 },

    #[error("Poisoned lock on {field}")]
    LockPoisoned { field: &'static str },
}

/// Result type alias for tetra-core operations
pub type Result<T> = std::result::Result<T, TetraError>;
