//! TETRA training-sequence correlation and burst-accept/reject decision.
//!
//! Split into a pure decision core (`detect`) and a stateful wrapper
//! (`BurstDetector::detect_and_record`) so the accept/reject logic is
//! unit-testable without a live `DetectionStatus` record.

use std::sync::{Arc, Mutex};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::config::{DetectionParams, DetectionStatus};
use crate::errors::{DemodError, Result, TetraError};

/// 22-bit TETRA training sequence used for burst synchronization.
pub const TRAINING_SEQUENCE: [u8; 22] = [
    1, 1, 0, 0, 1, 0, 1, 0, 0, 1, 1, 1, 0, 1, 0, 0, 0, 1, 1, 0, 1, 0,
];

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BurstDecision {
    pub detected: bool,
    pub best_offset: Option<usize>,
    pub best_match_count: u32,
    pub best_correlation: f32,
}

/// Slide the training sequence over `bits` and return the strongest match,
/// then apply the strong/moderate accept thresholds from `params`.
pub fn detect(bits: &[u8], signal_power: f32, params: &DetectionParams) -> BurstDecision {
    const SEQ_LEN: usize = TRAINING_SEQUENCE.len();

    if bits.len() < SEQ_LEN || signal_power < params.min_signal_power {
        return BurstDecision {
            detected: false,
            best_offset: None,
            best_match_count: 0,
            best_correlation: 0.0,
        };
    }

    let mut best_match = 0u32;
    let mut best_offset = None;
    let mut best_correlation = 0.0f32;

    for offset in 0..=(bits.len() - SEQ_LEN) {
        let mut matches = 0u32;
        let mut correlation = 0.0f32;

        for (i, &expected) in TRAINING_SEQUENCE.iter().enumerate() {
            if bits[offset + i] == expected {
                matches += 1;
                correlation += 1.0;
            } else {
                correlation -= 1.0;
            }
        }
        correlation /= SEQ_LEN as f32;

        if matches > best_match {
            best_match = matches;
            best_offset = Some(offset);
            best_correlation = correlation;
        }

        if matches >= params.strong_match_threshold && correlation >= params.strong_correlation {
            return BurstDecision {
                detected: true,
                best_offset: Some(offset),
                best_match_count: matches,
                best_correlation: correlation,
            };
        }
    }

    let detected = best_match >= params.moderate_match_threshold
        && best_correlation >= params.moderate_correlation
        && signal_power >= params.min_signal_power * params.moderate_power_multiplier;

    BurstDecision {
        detected,
        best_offset,
        best_match_count: best_match,
        best_correlation,
    }
}

/// Stateful wrapper that also records the decision into `DetectionStatus`.
pub struct BurstDetector {
    params: Arc<Mutex<DetectionParams>>,
    status: Arc<Mutex<DetectionStatus>>,
}

impl BurstDetector {
    pub fn new(params: Arc<Mutex<DetectionParams>>, status: Arc<Mutex<DetectionStatus>>) -> Self {
        Self { params, status }
    }

    pub fn detect_and_record(&self, bits: &[u8], signal_power: f32) -> Result<BurstDecision> {
        let params = *self
            .params
            .lock()
            .map_err(|_| TetraError::from(DemodError::ParamsLockPoisoned))?;

        let decision = detect(bits, signal_power, &params);

        let mut status = self
            .status
            .lock()
            .map_err(|_| TetraError::from(DemodError::StatusLockPoisoned))?;
        status.burst_detected = decision.detected;
        status.last_match_count = decision.best_match_count;
        status.last_correlation = decision.best_correlation;
        status.last_offset = decision.best_offset;
        if decision.detected {
            status.detection_count += 1;
            status.current_signal_power = signal_power;
            status.last_detection_timestamp = SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .ok()
                .map(|d| d.as_millis() as u64);
        }

        Ok(decision)
    }
}
