//! Simplified ACELP-style TETRA voice codec decoder: LPC synthesis driven
//! by an adaptive (pitch) + fixed codebook excitation, followed by
//! de-emphasis and soft-limited PCM conversion.

use crate::errors::{CodecError, Result};
use crate::utils::extract_bits;

pub const LPC_ORDER: usize = 10;
pub const FRAME_BITS: usize = 137;
pub const FRAME_SAMPLES: usize = 160; // 20ms @ 8kHz

pub struct VoiceDecoder {
    lpc_coeffs: [f32; LPC_ORDER],
    pitch_period: f32,
    pitch_gain: f32,
    prev_excitation: [f32; FRAME_SAMPLES],
    prev_samples: [f32; FRAME_SAMPLES],
    frame_count: u64,
}

impl Default for VoiceDecoder {
    fn default() -> Self {
        Self {
            lpc_coeffs: [0.0; LPC_ORDER],
            pitch_period: 40.0, // ~200 Hz typical pitch
            pitch_gain: 0.5,
            prev_excitation: [0.0; FRAME_SAMPLES],
            prev_samples: [0.0; FRAME_SAMPLES],
            frame_count: 0,
        }
    }
}

impl VoiceDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    /// Decode one 137-bit codec frame into 160 samples of 16-bit PCM @ 8kHz.
    pub fn decode_frame(&mut self, encoded_bits: &[u8]) -> Result<[i16; FRAME_SAMPLES]> {
        if encoded_bits.len() != FRAME_BITS {
            return Err(CodecError::InvalidFrameLength {
                expected: FRAME_BITS,
                actual: encoded_bits.len(),
            }
            .into());
        }

        let lpc_params = extract_bits(encoded_bits, 0, 30);
        let pitch_period_idx = extract_bits(encoded_bits, 30, 7);
        let pitch_gain_idx = extract_bits(encoded_bits, 37, 4);
        let codebook_idx = extract_bits(encoded_bits, 41, 52);
        let fixed_gain_idx = extract_bits(encoded_bits, 93, 10);

        self.decode_lpc_coeffs(lpc_params);
        self.pitch_period = 20.0 + pitch_period_idx as f32 * 0.5; // 20 - 83.5 samples
        self.pitch_gain = pitch_gain_idx as f32 / 15.0; // 0.0 - 1.0

        let fixed_gain = 10f32.powf((fixed_gain_idx as f32 - 512.0) / 20.0 / 20.0);

        let mut excitation = self.generate_excitation(codebook_idx, fixed_gain);
        self.add_pitch_prediction(&mut excitation);
        self.prev_excitation = excitation;

        let synthesized = self.lpc_synthesis(&excitation);
        self.prev_samples = synthesized;

        let mut samples = synthesized;
        Self::post_process(&mut samples);

        self.frame_count += 1;
        Ok(Self::to_pcm(&samples))
    }

    fn decode_lpc_coeffs(&mut self, lpc_params: u32) {
        for (i, coeff) in self.lpc_coeffs.iter_mut().enumerate() {
            let bits = (lpc_params >> (i * 3)) & 0x7;
            *coeff = (bits as f32 - 3.5) / 4.0;
        }
    }

    fn generate_excitation(&self, codebook_idx: u32, gain: f32) -> [f32; FRAME_SAMPLES] {
        let mut excitation = [0.0f32; FRAME_SAMPLES];
        for i in 0..4 {
            let pulse_pos = ((codebook_idx >> (i * 6)) & 0x3F) as usize % FRAME_SAMPLES;
            let pulse_sign = if (codebook_idx >> (i * 6 + 6)) & 1 != 0 {
                1.0
            } else {
                -1.0
            };
            excitation[pulse_pos] += pulse_sign * gain;
        }
        excitation
    }

    fn add_pitch_prediction(&self, excitation: &mut [f32; FRAME_SAMPLES]) {
        let period = self.pitch_period as isize;
        for i in 0..FRAME_SAMPLES {
            let pitch_idx = i as isize - period;
            if pitch_idx >= 0 {
                excitation[i] += self.pitch_gain * excitation[pitch_idx as usize];
            } else if pitch_idx >= -(FRAME_SAMPLES as isize) {
                let prev_idx = (FRAME_SAMPLES as isize + pitch_idx) as usize;
                excitation[i] += self.pitch_gain * self.prev_excitation[prev_idx];
            }
        }
    }

    fn lpc_synthesis(&self, excitation: &[f32; FRAME_SAMPLES]) -> [f32; FRAME_SAMPLES] {
        let mut output = [0.0f32; FRAME_SAMPLES];
        for n in 0..FRAME_SAMPLES {
            let mut prediction = 0.0f32;
            for k in 0..LPC_ORDER {
                let idx = n as isize - k as isize - 1;
                if idx >= 0 {
                    prediction += self.lpc_coeffs[k] * output[idx as usize];
                } else {
                    // Before the start of the frame, predict from the tail
                    // of the previous frame's synthesized output.
                    let prev_idx = FRAME_SAMPLES as isize + idx;
                    if prev_idx >= 0 {
                        prediction += self.lpc_coeffs[k] * self.prev_samples[prev_idx as usize];
                    }
                }
            }
            output[n] = (excitation[n] + prediction).clamp(-1.0, 1.0);
        }
        output
    }

    fn post_process(samples: &mut [f32; FRAME_SAMPLES]) {
        const ALPHA: f32 = 0.95;
        for i in (1..FRAME_SAMPLES).rev() {
            samples[i] += ALPHA * samples[i - 1];
        }
    }

    fn to_pcm(samples: &[f32; FRAME_SAMPLES]) -> [i16; FRAME_SAMPLES] {
        let mut pcm = [0i16; FRAME_SAMPLES];
        for (out, &s) in pcm.iter_mut().zip(samples.iter()) {
            let scaled = (s * 16384.0).round().clamp(-32768.0, 32767.0);
            *out = scaled as i16;
        }
        pcm
    }
}
