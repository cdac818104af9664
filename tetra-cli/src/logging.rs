//! Structured logging for receiver telemetry and control-channel activity.

use crate::config::{LogFormat, LogTarget, LoggingConfig};
use chrono::{DateTime, Utc};
use color_eyre::eyre::Result;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{self, BufWriter, Write};

/// Structured log event types
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LogEvent {
    /// Telemetry sample event
    Telemetry(TelemetryEvent),

    /// A decoded control-channel message
    ControlMessage(ControlMessageEvent),

    /// Key-recovery progress or outcome
    KeyRecovery(KeyRecoveryEvent),

    /// Statistical summary event
    Statistics(StatisticsEvent),

    /// General info message
    Info { message: String },

    /// Warning message
    Warn { message: String },

    /// Error message
    Error { message: String, details: Option<String> },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetryEvent {
    pub timestamp: DateTime<Utc>,
    pub signal_power: f64,
    pub bursts_detected: u64,
    pub voice_frames_decoded: u64,
    pub active_voice_channels: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ControlMessageEvent {
    pub timestamp: DateTime<Utc>,
    pub message_type: String,
    pub talk_group_id: u32,
    pub source_id: u32,
    pub channel_freq_hz: u32,
    pub encrypted: bool,
    pub emergency: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeyRecoveryEvent {
    pub timestamp: DateTime<Utc>,
    pub outcome: String,
    pub candidates_tried: u64,
    pub reduced_key: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatisticsEvent {
    pub timestamp: DateTime<Utc>,
    pub duration_secs: f64,
    pub signal_power: StatSummary,
    pub total_bursts: u64,
    pub total_voice_frames: u64,
    pub total_control_messages: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatSummary {
    pub mean: f64,
    pub stddev: f64,
    pub min: f64,
    pub max: f64,
    pub samples: usize,
}

/// Logger that outputs structured logs
pub struct StructuredLogger {
    config: LoggingConfig,
    writer: Box<dyn Write + Send>,
    start_time: DateTime<Utc>,
}

impl StructuredLogger {
    pub fn new(config: LoggingConfig) -> Result<Self> {
        let writer: Box<dyn Write + Send> = match &config.target {
            LogTarget::Stdout => Box::new(io::stdout()),
            LogTarget::Stderr => Box::new(io::stderr()),
            LogTarget::File => {
                let path = config.file_path.as_ref()
                    .ok_or_else(|| color_eyre::eyre::eyre!("File path required for file logging"))?;
                Box::new(BufWriter::new(File::create(path)?))
            }
        };

        Ok(Self {
            config,
            writer,
            start_time: Utc::now(),
        })
    }

    pub fn log(&mut self, event: LogEvent) -> Result<()> {
        let output = match self.config.format {
            LogFormat::Json => self.format_json(&event)?,
            LogFormat::Logfmt => self.format_logfmt(&event)?,
            LogFormat::Pretty => self.format_pretty(&event)?,
        };

        writeln!(self.writer, "{}", output)?;
        self.writer.flush()?;

        Ok(())
    }

    fn format_json(&self, event: &LogEvent) -> Result<String> {
        Ok(serde_json::to_string(event)?)
    }

    fn format_logfmt(&self, event: &LogEvent) -> Result<String> {
        let ts = Utc::now().to_rfc3339();

        let msg = match event {
            LogEvent::Telemetry(t) => {
                format!(
                    "ts=\"{}\" type=telemetry signal_power={:.3} bursts={} voice_frames={} active_channels={}",
                    ts, t.signal_power, t.bursts_detected, t.voice_frames_decoded, t.active_voice_channels
                )
            }
            LogEvent::ControlMessage(c) => {
                format!(
                    "ts=\"{}\" type=control_message kind={} talk_group={} source={} freq_hz={} encrypted={} emergency={}",
                    ts, c.message_type, c.talk_group_id, c.source_id, c.channel_freq_hz, c.encrypted, c.emergency
                )
            }
            LogEvent::KeyRecovery(k) => {
                format!(
                    "ts=\"{}\" type=key_recovery outcome={} candidates_tried={} reduced_key={}",
                    ts,
                    k.outcome,
                    k.candidates_tried,
                    k.reduced_key.map(|v| format!("{:#010x}", v)).unwrap_or_else(|| "none".to_string())
                )
            }
            LogEvent::Statistics(s) => {
                format!(
                    "ts=\"{}\" type=statistics duration_secs={:.2} total_bursts={} total_voice_frames={} total_control_messages={} signal_power_mean={:.3}",
                    ts, s.duration_secs, s.total_bursts, s.total_voice_frames, s.total_control_messages, s.signal_power.mean
                )
            }
            LogEvent::Info { message } => format!("ts=\"{}\" level=info msg=\"{}\"", ts, message),
            LogEvent::Warn { message } => format!("ts=\"{}\" level=warn msg=\"{}\"", ts, message),
            LogEvent::Error { message, details } => {
                if let Some(d) = details {
                    format!("ts=\"{}\" level=error msg=\"{}\" details=\"{}\"", ts, message, d)
                } else {
                    format!("ts=\"{}\" level=error msg=\"{}\"", ts, message)
                }
            }
        };

        Ok(msg)
    }

    fn format_pretty(&self, event: &LogEvent) -> Result<String> {
        let ts = Utc::now().format("%Y-%m-%d %H:%M:%S%.3f");

        let msg = match event {
            LogEvent::Telemetry(t) => {
                format!(
                    "[{}] TELEMETRY: power={:.3} | bursts={} | voice_frames={} | active_channels={}",
                    ts, t.signal_power, t.bursts_detected, t.voice_frames_decoded, t.active_voice_channels
                )
            }
            LogEvent::ControlMessage(c) => {
                format!(
                    "[{}] CTRL[{}]: tg={} src={} freq={}Hz{}{}",
                    ts,
                    c.message_type,
                    c.talk_group_id,
                    c.source_id,
                    c.channel_freq_hz,
                    if c.encrypted { " ENCRYPTED" } else { "" },
                    if c.emergency { " EMERGENCY" } else { "" }
                )
            }
            LogEvent::KeyRecovery(k) => {
                format!(
                    "[{}] KEYREC: {} after {} candidates{}",
                    ts,
                    k.outcome,
                    k.candidates_tried,
                    k.reduced_key.map(|v| format!(" -> {:#010x}", v)).unwrap_or_default()
                )
            }
            LogEvent::Statistics(s) => {
                format!(
                    "[{}] STATISTICS ({:.2}s): bursts={} voice_frames={} control_msgs={} | signal power: μ={:.3} σ={:.3} [{:.3},{:.3}]",
                    ts, s.duration_secs, s.total_bursts, s.total_voice_frames, s.total_control_messages,
                    s.signal_power.mean, s.signal_power.stddev, s.signal_power.min, s.signal_power.max
                )
            }
            LogEvent::Info { message } => format!("[{}] INFO: {}", ts, message),
            LogEvent::Warn { message } => format!("[{}] WARN: {}", ts, message),
            LogEvent::Error { message, details } => {
                if let Some(d) = details {
                    format!("[{}] ERROR: {} | {}", ts, message, d)
                } else {
                    format!("[{}] ERROR: {}", ts, message)
                }
            }
        };

        Ok(msg)
    }

    pub fn elapsed(&self) -> f64 {
        (Utc::now() - self.start_time).num_milliseconds() as f64 / 1000.0
    }
}
