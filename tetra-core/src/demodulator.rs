//! TETRA burst demodulator: I/Q ingestion, squelch, quadrature demod,
//! low-pass filtering, and symbol slicing into a bit buffer.

use std::sync::{Arc, Mutex};

use crate::config::{DetectionParams, DetectionStatus, SystemConfig};
use crate::dsp;
use crate::errors::{DemodError, Result, TetraError};

/// Owns the per-channel sample/bit buffers and shares the live detection
/// parameters/status with whoever else needs to read or tune them (the
/// channel manager, a diagnostics UI).
pub struct Demodulator {
    i_samples: Vec<f32>,
    q_samples: Vec<f32>,
    demod_bits: Vec<u8>,
    bit_count: usize,
    params: Arc<Mutex<DetectionParams>>,
    status: Arc<Mutex<DetectionStatus>>,
}

impl Demodulator {
    pub fn new(params: Arc<Mutex<DetectionParams>>, status: Arc<Mutex<DetectionStatus>>) -> Self {
        let sample_capacity = SystemConfig::SDR_BUFFER_SIZE / 2;
        Self {
            i_samples: vec![0.0; sample_capacity],
            q_samples: vec![0.0; sample_capacity],
            demod_bits: vec![0; SystemConfig::BURST_LENGTH],
            bit_count: 0,
            params,
            status,
        }
    }

    fn snapshot_params(&self) -> Result<DetectionParams> {
        self.params
            .lock()
            .map(|g| *g)
            .map_err(|_| TetraError::from(DemodError::ParamsLockPoisoned))
    }

    /// Process a raw unsigned-byte I/Q buffer (interleaved I, Q, I, Q, ...).
    /// Returns the number of demodulated bits produced, or `0` if the buffer
    /// was rejected by squelch.
    pub fn process(&mut self, iq_data: &[u8]) -> Result<usize> {
        if iq_data.len() < 2 {
            return Err(DemodError::InsufficientSamples {
                available: iq_data.len(),
            }
            .into());
        }
        if self.i_samples.is_empty() {
            return Err(DemodError::ScratchBufferUnavailable.into());
        }

        let mut sample_pairs = iq_data.len() / 2;
        if sample_pairs > self.i_samples.len() {
            sample_pairs = self.i_samples.len();
        }

        for n in 0..sample_pairs {
            self.i_samples[n] = dsp::byte_to_float(iq_data[n * 2]);
            self.q_samples[n] = dsp::byte_to_float(iq_data[n * 2 + 1]);
        }

        let params = self.snapshot_params()?;
        let signal_power = dsp::rms_power(&self.i_samples[..sample_pairs], &self.q_samples[..sample_pairs]);

        {
            let mut status = self
                .status
                .lock()
                .map_err(|_| TetraError::from(DemodError::StatusLockPoisoned))?;
            status.current_signal_power = signal_power;
        }

        if signal_power < params.min_signal_power {
            self.bit_count = 0;
            return Ok(0);
        }

        let mut demod_output = vec![0.0f32; sample_pairs];
        dsp::quadrature_demod(
            &self.i_samples[..sample_pairs],
            &self.q_samples[..sample_pairs],
            &mut demod_output,
        );
        dsp::low_pass_filter(&mut demod_output, params.lpf_cutoff);

        let samples_per_symbol = SystemConfig::SAMPLE_RATE as f32 / SystemConfig::SYMBOL_RATE as f32;
        let mut bit_index = 0usize;
        let mut i = 0usize;
        while i < sample_pairs && bit_index < self.demod_bits.len() {
            self.demod_bits[bit_index] = if demod_output[i] > 0.0 { 1 } else { 0 };
            bit_index += 1;
            i += samples_per_symbol as usize;
        }
        self.bit_count = bit_index;

        Ok(bit_index)
    }

    /// Demodulated bit buffer produced by the most recent `process` call.
    pub fn bits(&self) -> &[u8] {
        &self.demod_bits[..self.bit_count]
    }

    /// I/Q samples from the most recent `process` call (for burst correlation).
    pub fn iq_samples(&self) -> (&[f32], &[f32]) {
        (&self.i_samples, &self.q_samples)
    }

    pub fn params(&self) -> Arc<Mutex<DetectionParams>> {
        Arc::clone(&self.params)
    }

    /// Validate and clamp a proposed detection-parameter update, then store
    /// it for subsequent `process` calls to use. Returns the clamped values
    /// actually applied.
    pub fn set_params(&self, params: DetectionParams) -> Result<DetectionParams> {
        params.validate()?;
        let clamped = params.clamped();
        let mut guard = self
            .params
            .lock()
            .map_err(|_| TetraError::from(DemodError::ParamsLockPoisoned))?;
        *guard = clamped;
        Ok(clamped)
    }

    pub fn status(&self) -> Arc<Mutex<DetectionStatus>> {
        Arc::clone(&self.status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fresh() -> Demodulator {
        Demodulator::new(
            Arc::new(Mutex::new(DetectionParams::default())),
            Arc::new(Mutex::new(DetectionStatus::default())),
        )
    }

    #[test]
    fn rejects_too_short_buffer() {
        let mut demod = fresh();
        let err = demod.process(&[1]).unwrap_err();
        assert!(matches!(err, TetraError::Demod(DemodError::InsufficientSamples { .. })));
    }

    #[test]
    fn squelches_flat_buffer() {
        let mut demod = fresh();
        // Constant 127/128 bytes decode to near-zero I/Q -> power well under threshold.
        let iq = vec![127u8; 4096];
        let bits = demod.process(&iq).unwrap();
        assert_eq!(bits, 0);
    }

    #[test]
    fn set_params_rejects_invalid_lpf_cutoff() {
        let demod = fresh();
        let bad = DetectionParams {
            lpf_cutoff: -1.0,
            ..Default::default()
        };
        let err = demod.set_params(bad).unwrap_err();
        assert!(matches!(
            err,
            TetraError::Config(crate::errors::ConfigError::InvalidLpfCutoff { .. })
        ));
    }

    #[test]
    fn set_params_clamps_and_stores_valid_update() {
        let demod = fresh();
        let update = DetectionParams {
            strong_correlation: 1.5,
            ..Default::default()
        };
        let applied = demod.set_params(update).unwrap();
        assert_eq!(applied.strong_correlation, 1.0);
        assert_eq!(demod.params().lock().unwrap().strong_correlation, 1.0);
    }

    #[test]
    fn strong_signal_produces_bits() {
        let mut demod = fresh();
        let mut iq = Vec::with_capacity(4096);
        for n in 0..2048 {
            let v = if n % 2 == 0 { 255 } else { 0 };
            iq.push(v);
            iq.push(v);
        }
        let bits = demod.process(&iq).unwrap();
        assert!(bits > 0);
        assert!(demod.bits().iter().all(|&b| b == 0 || b == 1));
    }
}
