//! DSP primitives operating directly on I/Q sample slices.

mod primitives;

pub use primitives::{byte_to_float, low_pass_filter, quadrature_demod, rms_power};
