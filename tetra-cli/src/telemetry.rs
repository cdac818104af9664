//! Telemetry sampling and statistical aggregation for a receiver session.

use crate::logging::{StatSummary, TelemetryEvent};
use chrono::Utc;
use std::time::Instant;

/// Accumulates receiver telemetry samples and computes statistics over a run.
pub struct TelemetryAggregator {
    signal_power_samples: Vec<f64>,

    last_sample_time: Instant,
    total_bursts: u64,
    total_voice_frames: u64,
    total_control_messages: u64,
    active_voice_channels: usize,

    sample_interval_secs: f64,
}

impl TelemetryAggregator {
    pub fn new(sample_interval_secs: f64) -> Self {
        Self {
            signal_power_samples: Vec::new(),
            last_sample_time: Instant::now(),
            total_bursts: 0,
            total_voice_frames: 0,
            total_control_messages: 0,
            active_voice_channels: 0,
            sample_interval_secs,
        }
    }

    /// Record a detected burst and its measured signal power.
    pub fn record_burst(&mut self, signal_power: f64) {
        self.total_bursts += 1;
        self.signal_power_samples.push(signal_power);
    }

    /// Record a decoded voice frame.
    pub fn record_voice_frame(&mut self) {
        self.total_voice_frames += 1;
    }

    /// Record a decoded control-channel message.
    pub fn record_control_message(&mut self) {
        self.total_control_messages += 1;
    }

    /// Update the current count of active (granted) voice channels.
    pub fn set_active_voice_channels(&mut self, count: usize) {
        self.active_voice_channels = count;
    }

    /// Check if it's time to emit a telemetry sample
    pub fn should_sample(&self) -> bool {
        self.last_sample_time.elapsed().as_secs_f64() >= self.sample_interval_secs
    }

    /// Generate telemetry event and reset sampling timer
    pub fn sample(&mut self) -> Option<TelemetryEvent> {
        if !self.should_sample() {
            return None;
        }

        let signal_power = self.mean(&self.signal_power_samples).unwrap_or(0.0);

        let event = TelemetryEvent {
            timestamp: Utc::now(),
            signal_power,
            bursts_detected: self.total_bursts,
            voice_frames_decoded: self.total_voice_frames,
            active_voice_channels: self.active_voice_channels,
        };

        self.last_sample_time = Instant::now();

        Some(event)
    }

    /// Compute a statistical summary of signal power over the whole session.
    pub fn compute_statistics(&self) -> StatSummary {
        self.compute_stat_summary(&self.signal_power_samples)
    }

    fn compute_stat_summary(&self, samples: &[f64]) -> StatSummary {
        if samples.is_empty() {
            return StatSummary {
                mean: 0.0,
                stddev: 0.0,
                min: 0.0,
                max: 0.0,
                samples: 0,
            };
        }

        let mean = self.mean(samples).unwrap_or(0.0);
        let variance = samples.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / samples.len() as f64;
        let stddev = variance.sqrt();
        let min = samples.iter().copied().fold(f64::INFINITY, f64::min);
        let max = samples.iter().copied().fold(f64::NEG_INFINITY, f64::max);

        StatSummary {
            mean,
            stddev,
            min,
            max,
            samples: samples.len(),
        }
    }

    fn mean(&self, samples: &[f64]) -> Option<f64> {
        if samples.is_empty() {
            return None;
        }
        Some(samples.iter().sum::<f64>() / samples.len() as f64)
    }

    pub fn total_bursts(&self) -> u64 {
        self.total_bursts
    }

    pub fn total_voice_frames(&self) -> u64 {
        self.total_voice_frames
    }

    pub fn total_control_messages(&self) -> u64 {
        self.total_control_messages
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_aggregator_reports_zeroed_statistics() {
        let agg = TelemetryAggregator::new(1.0);
        let stats = agg.compute_statistics();
        assert_eq!(stats.samples, 0);
        assert_eq!(stats.mean, 0.0);
    }

    #[test]
    fn records_bursts_and_computes_mean_power() {
        let mut agg = TelemetryAggregator::new(1.0);
        agg.record_burst(10.0);
        agg.record_burst(20.0);
        assert_eq!(agg.total_bursts(), 2);
        let stats = agg.compute_statistics();
        assert_eq!(stats.samples, 2);
        assert!((stats.mean - 15.0).abs() < f64::EPSILON);
    }

    #[test]
    fn counts_voice_frames_and_control_messages_independently() {
        let mut agg = TelemetryAggregator::new(1.0);
        agg.record_voice_frame();
        agg.record_voice_frame();
        agg.record_control_message();
        assert_eq!(agg.total_voice_frames(), 2);
        assert_eq!(agg.total_control_messages(), 1);
    }
}
