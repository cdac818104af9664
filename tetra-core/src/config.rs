//! Configuration structures for the TETRA analyzer pipeline.

use serde::{Deserialize, Serialize};

use crate::errors::{ConfigError, Result};

/// Mirrors `burst::TRAINING_SEQUENCE`'s length: a match count can never
/// exceed the number of bits being correlated against.
const TRAINING_SEQUENCE_LEN: u32 = 22;

/// Top-level receiver configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ReceiverConfig {
    pub frequency_hz: u32,
    #[serde(default = "SystemConfig::default_sample_rate")]
    pub sample_rate: u32,
    #[serde(default)]
    pub gain: i32,
    #[serde(default)]
    pub auto_gain: bool,
    #[serde(default = "default_squelch")]
    pub squelch_threshold: f32,
    #[serde(default)]
    pub use_known_vulnerability: bool,
    #[serde(default)]
    pub enable_trunking: bool,
    #[serde(default)]
    pub output_file: Option<String>,
}

fn default_squelch() -> f32 {
    15.0
}

impl Default for ReceiverConfig {
    fn default() -> Self {
        Self {
            frequency_hz: SystemConfig::FREQUENCY_MIN,
            sample_rate: SystemConfig::default_sample_rate(),
            gain: 0,
            auto_gain: true,
            squelch_threshold: default_squelch(),
            use_known_vulnerability: true,
            enable_trunking: false,
            output_file: None,
        }
    }
}

impl ReceiverConfig {
    /// Validate the static fields a receiver is constructed with.
    pub fn validate(&self) -> Result<()> {
        if self.sample_rate == 0 {
            return Err(ConfigError::InvalidSampleRate { rate: self.sample_rate }.into());
        }
        if !self.squelch_threshold.is_finite() || self.squelch_threshold < 0.0 {
            return Err(ConfigError::InvalidSquelchThreshold {
                value: self.squelch_threshold,
            }
            .into());
        }
        Ok(())
    }
}

/// System-wide constants, mirrored from the reference receiver.
pub struct SystemConfig;

impl SystemConfig {
    pub const FREQUENCY_MIN: u32 = 380_000_000;
    pub const FREQUENCY_MAX: u32 = 470_000_000;
    pub const SAMPLE_RATE: u32 = 2_400_000;
    pub const SYMBOL_RATE: u32 = 18_000;
    pub const BURST_LENGTH: usize = 510;
    pub const SDR_BUFFER_SIZE: usize = 16 * 16384;
    pub const AUDIO_BUFFER_SIZE: usize = 8192;
    pub const AUDIO_RING_BUFFER_SIZE: usize = 8192 * 4;
    pub const MAX_CHANNELS: usize = 4;

    pub fn default_sample_rate() -> u32 {
        Self::SAMPLE_RATE
    }
}

/// Dynamic burst-detection parameters, adjustable at runtime behind a mutex.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct DetectionParams {
    pub min_signal_power: f32,
    pub strong_match_threshold: u32,
    pub moderate_match_threshold: u32,
    pub strong_correlation: f32,
    pub moderate_correlation: f32,
    pub lpf_cutoff: f32,
    pub moderate_power_multiplier: f32,
}

impl Default for DetectionParams {
    fn default() -> Self {
        Self {
            min_signal_power: 8.0,
            strong_match_threshold: 20,
            moderate_match_threshold: 19,
            strong_correlation: 0.8,
            moderate_correlation: 0.75,
            lpf_cutoff: 0.5,
            moderate_power_multiplier: 1.2,
        }
    }
}

impl DetectionParams {
    /// Clamp fields to the ranges the detector requires to behave sanely.
    pub fn clamped(mut self) -> Self {
        self.min_signal_power = self.min_signal_power.max(0.0);
        self.lpf_cutoff = self.lpf_cutoff.clamp(f32::EPSILON, 1.0);
        self.strong_correlation = self.strong_correlation.clamp(0.0, 1.0);
        self.moderate_correlation = self.moderate_correlation.clamp(0.0, 1.0);
        self.strong_match_threshold = self.strong_match_threshold.min(TRAINING_SEQUENCE_LEN);
        self.moderate_match_threshold = self.moderate_match_threshold.min(TRAINING_SEQUENCE_LEN);
        self
    }

    /// Reject a proposed live update outright rather than silently fixing
    /// it, for fields where an out-of-range value usually signals a caller
    /// bug (an unusable LPF cutoff) rather than noisy runtime input.
    pub fn validate(&self) -> Result<()> {
        if !self.lpf_cutoff.is_finite() || self.lpf_cutoff <= 0.0 {
            return Err(ConfigError::InvalidLpfCutoff { value: self.lpf_cutoff }.into());
        }
        Ok(())
    }
}

/// Live detection status, updated by the demodulator and read by diagnostics/UI.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct DetectionStatus {
    pub current_signal_power: f32,
    pub last_match_count: u32,
    pub last_correlation: f32,
    pub last_offset: Option<usize>,
    pub burst_detected: bool,
    pub detection_count: u64,
    /// Milliseconds since the Unix epoch at the most recent accepted burst.
    pub last_detection_timestamp: Option<u64>,
}

/// Trunked-radio channel manager configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TrunkingConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub control_channel_freq: u32,
    #[serde(default = "default_true")]
    pub auto_follow: bool,
    #[serde(default)]
    pub record_all: bool,
    #[serde(default)]
    pub priority_threshold: i32,
    #[serde(default = "default_hold_time_ms")]
    pub hold_time_ms: u64,
    #[serde(default = "default_true")]
    pub emergency_override: bool,
}

fn default_true() -> bool {
    true
}

fn default_hold_time_ms() -> u64 {
    3_000
}

impl Default for TrunkingConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            control_channel_freq: 0,
            auto_follow: default_true(),
            record_all: false,
            priority_threshold: 0,
            hold_time_ms: default_hold_time_ms(),
            emergency_override: default_true(),
        }
    }
}

impl TrunkingConfig {
    pub const MAX_TALK_GROUPS: usize = 256;
    pub const MAX_ACTIVE_CHANNELS: usize = 16;
    pub const CHANNEL_HISTORY_SIZE: usize = 100;
    pub const CONTROL_CHANNEL_TIMEOUT_MS: u64 = 5_000;

    /// Validate the fields a channel manager is constructed with.
    pub fn validate(&self) -> Result<()> {
        if !(0..=10).contains(&self.priority_threshold) {
            return Err(ConfigError::InvalidPriorityThreshold {
                value: self.priority_threshold,
            }
            .into());
        }
        Ok(())
    }
}
