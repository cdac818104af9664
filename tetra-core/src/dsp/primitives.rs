//! Free-function DSP building blocks: unsigned-byte-to-float conversion,
//! quadrature (FM) demodulation, a single-pole IIR low-pass filter, and
//! RMS signal power estimation.

/// Convert an unsigned 8-bit I/Q sample (as produced by an 8-bit ADC, DC
/// offset at 127.5) into a centered float.
pub fn byte_to_float(sample: u8) -> f32 {
    sample as f32 - 127.5
}

/// FM quadrature demodulation: differentiate the instantaneous phase of the
/// I/Q stream via `atan2`, unwrapping phase discontinuities at +/-pi.
///
/// `i` and `q` must be the same length; `output` receives one sample per
/// input pair.
pub fn quadrature_demod(i: &[f32], q: &[f32], output: &mut [f32]) {
    let len = i.len().min(q.len()).min(output.len());
    let mut prev_phase = 0.0f32;

    for n in 0..len {
        let phase = q[n].atan2(i[n]);
        let mut diff = phase - prev_phase;

        if diff > std::f32::consts::PI {
            diff -= 2.0 * std::f32::consts::PI;
        } else if diff < -std::f32::consts::PI {
            diff += 2.0 * std::f32::consts::PI;
        }

        output[n] = diff;
        prev_phase = phase;
    }
}

/// Single-pole exponential-moving-average low-pass filter, applied in place.
/// `cutoff` is the smoothing coefficient in (0.0, 1.0]; values near 1.0 pass
/// the signal through unchanged, values near 0.0 heavily smooth it.
pub fn low_pass_filter(data: &mut [f32], cutoff: f32) {
    if data.len() < 2 {
        return;
    }

    let alpha = cutoff;
    let mut prev = data[0];

    for sample in data.iter_mut().skip(1) {
        *sample = alpha * *sample + (1.0 - alpha) * prev;
        prev = *sample;
    }
}

/// RMS signal power over paired I/Q samples.
pub fn rms_power(i: &[f32], q: &[f32]) -> f32 {
    let len = i.len().min(q.len());
    if len == 0 {
        return 0.0;
    }

    let power: f32 = (0..len).map(|n| i[n] * i[n] + q[n] * q[n]).sum();
    (power / len as f32).sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn byte_to_float_centers_on_dc_offset() {
        assert_eq!(byte_to_float(128), 0.5);
        assert_eq!(byte_to_float(127), -0.5);
    }

    #[test]
    fn low_pass_filter_is_noop_on_short_input() {
        let mut data = [1.0f32];
        low_pass_filter(&mut data, 0.5);
        assert_eq!(data[0], 1.0);
    }

    #[test]
    fn low_pass_filter_smooths_step_input() {
        let mut data = [0.0f32, 1.0, 1.0, 1.0, 1.0];
        low_pass_filter(&mut data, 0.5);
        // Each sample should move monotonically toward 1.0 but not jump there.
        assert!(data[1] < 1.0 && data[1] > 0.0);
        assert!(data[4] > data[1]);
    }

    #[test]
    fn rms_power_of_constant_iq_matches_formula() {
        let i = [3.0f32; 4];
        let q = [4.0f32; 4];
        // sqrt(9+16) = 5.0 for every sample.
        assert!((rms_power(&i, &q) - 5.0).abs() < 1e-6);
    }

    #[test]
    fn rms_power_of_empty_is_zero() {
        assert_eq!(rms_power(&[], &[]), 0.0);
    }

    #[test]
    fn quadrature_demod_constant_phase_yields_zero_output() {
        let i = [1.0f32; 8];
        let q = [0.0f32; 8];
        let mut out = [0.0f32; 8];
        quadrature_demod(&i, &q, &mut out);
        assert!(out.iter().all(|&v| v.abs() < 1e-6));
    }
}
