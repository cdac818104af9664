mod config;
mod logging;
mod telemetry;

use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use clap::Parser;
use color_eyre::eyre::{Context, Result};

use config::CliConfig;
use logging::{ControlMessageEvent, KeyRecoveryEvent, LogEvent, StatisticsEvent, StructuredLogger};
use telemetry::TelemetryAggregator;

use tetra_core::audio_ring::{AudioConsumer, AudioRing};
use tetra_core::audio_sink::WavSink;
use tetra_core::channel_manager::ChannelManager;
use tetra_core::codec::FRAME_SAMPLES;
use tetra_core::key_recovery;
use tetra_core::logging::SignalLogger;
use tetra_core::orchestrator::{ByteSource, Orchestrator, SimulatedByteSource};
use tetra_core::protocol::MessageType;
use tetra_core::tuner::RecordingTuner;

#[derive(Parser, Debug)]
#[command(author, version, about = "TETRA trunked-radio analyzer", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(short, long)]
    config: Option<String>,

    /// Enable verbose diagnostic output
    #[arg(short, long)]
    verbose: bool,

    /// Output decoded audio to a WAV file (overrides config)
    #[arg(short = 'w', long)]
    wav_output: Option<PathBuf>,

    /// Tuned frequency in Hz (overrides config)
    #[arg(short = 'f', long)]
    frequency: Option<u32>,

    /// TEA1 key as 20 hex characters (overrides config)
    #[arg(short = 'k', long)]
    key: Option<String>,

    /// Number of I/Q buffers to process from the simulated front end
    #[arg(short = 'n', long, default_value_t = 200)]
    chunk_count: usize,

    /// Attempt TEA1 key recovery via the known-plaintext attack instead of
    /// running the demodulation pipeline
    #[arg(long)]
    recover_key: bool,

    /// Candidate budget for --recover-key
    #[arg(long, default_value_t = 1_000_000)]
    recovery_budget: u64,
}

const IQ_CHUNK_SIZE: usize = 4096;
const RNG_SEED: u64 = 0xC0FFEE;

fn main() -> Result<()> {
    color_eyre::install()?;
    let args = Cli::parse();

    let mut config = if let Some(config_path) = &args.config {
        CliConfig::from_file(config_path)
            .wrap_err_with(|| format!("Failed to load config from {}", config_path))?
    } else {
        CliConfig::default()
    };

    if let Some(wav_path) = args.wav_output {
        config.terminal.wav_output = Some(wav_path);
    }
    if let Some(frequency) = args.frequency {
        config.receiver.frequency_hz = frequency;
    }
    if let Some(key) = &args.key {
        config.terminal.key_hex = Some(key.clone());
    }

    let mut logger = StructuredLogger::new(config.terminal.logging.clone())?;

    logger.log(LogEvent::Info {
        message: format!(
            "tetra-cli starting, frequency={}Hz trunking={}",
            config.receiver.frequency_hz, config.trunking.enabled
        ),
    })?;

    if args.recover_key {
        return run_key_recovery(&mut logger, args.recovery_budget);
    }

    run_receiver(&mut config, &mut logger, args.verbose, args.chunk_count)
}

/// Brute-force the reduced TEA1 keyspace using the known-plaintext attack
/// against a locally generated ciphertext sample.
fn run_key_recovery(logger: &mut StructuredLogger, budget: u64) -> Result<()> {
    use indicatif::{ProgressBar, ProgressStyle};
    use rand::rngs::StdRng;
    use rand::{RngCore, SeedableRng};

    let mut rng = StdRng::seed_from_u64(RNG_SEED);
    let mut ciphertext = [0u8; 8];
    rng.fill_bytes(&mut ciphertext);

    logger.log(LogEvent::Info {
        message: "starting TEA1 known-plaintext key recovery".to_string(),
    })?;

    let progress_bar = ProgressBar::new(budget);
    progress_bar.set_style(
        ProgressStyle::with_template("{bar:40} {pos}/{len} candidates ({eta})")
            .unwrap_or_else(|_| ProgressStyle::default_bar()),
    );

    let outcome = key_recovery::known_plaintext_attack(&ciphertext, budget, |progress| {
        progress_bar.set_position(progress.candidates_tried);
        let _ = logger.log(LogEvent::KeyRecovery(KeyRecoveryEvent {
            timestamp: chrono::Utc::now(),
            outcome: "searching".to_string(),
            candidates_tried: progress.candidates_tried,
            reduced_key: None,
        }));
    })?;
    progress_bar.finish_and_clear();

    let (outcome_str, candidates_tried, reduced_key) = match outcome {
        key_recovery::KeyRecoveryOutcome::Found { reduced_key, candidates_tried } => {
            ("found".to_string(), candidates_tried, Some(reduced_key))
        }
        key_recovery::KeyRecoveryOutcome::Exhausted {
            candidates_tried,
            rate,
            estimated_full_sweep_secs,
        } => {
            logger.log(LogEvent::Info {
                message: format!(
                    "key recovery exhausted budget: {:.0} candidates/sec, est. {:.1}h for full 2^32 sweep",
                    rate,
                    estimated_full_sweep_secs / 3600.0
                ),
            })?;
            ("exhausted".to_string(), candidates_tried, None)
        }
    };

    logger.log(LogEvent::KeyRecovery(KeyRecoveryEvent {
        timestamp: chrono::Utc::now(),
        outcome: outcome_str,
        candidates_tried,
        reduced_key,
    }))?;

    Ok(())
}

/// Run the demodulation/decode pipeline over a simulated I/Q source.
fn run_receiver(
    config: &mut CliConfig,
    logger: &mut StructuredLogger,
    verbose: bool,
    chunk_count: usize,
) -> Result<()> {
    let key = match &config.terminal.key_hex {
        Some(hex) => Some(config::parse_key_hex(hex)?),
        None => None,
    };

    let signal_logger = Arc::new(Mutex::new(SignalLogger::new(
        config.terminal.logging.to_core_log_config(),
    )));
    let ring = Arc::new(AudioRing::with_default_capacity());

    let mut orchestrator = Orchestrator::new(
        &config.receiver,
        key.as_ref().map(|k| k.as_slice()),
        ring.clone(),
        signal_logger.clone(),
    )?;

    let channel_manager = if config.trunking.enabled {
        orchestrator.mark_as_control_channel();
        let tuner = Arc::new(RecordingTuner::new(config.trunking.control_channel_freq));
        let manager = Arc::new(ChannelManager::new(
            config.trunking.clone(),
            tuner,
            signal_logger.clone(),
        )?);
        manager.start();
        Some(manager)
    } else {
        None
    };

    orchestrator.start();

    let audio_consumer = if let Some(wav_path) = &config.terminal.wav_output {
        let sink = WavSink::create(wav_path, config.receiver.sample_rate.min(48_000))
            .wrap_err_with(|| format!("Failed to create WAV sink at {}", wav_path.display()))?;
        let consumer = AudioConsumer::new(ring.clone());
        consumer.start(sink);
        Some(consumer)
    } else {
        None
    };

    let mut source = SimulatedByteSource::new(RNG_SEED, IQ_CHUNK_SIZE, chunk_count);
    source.start()?;

    let mut telemetry = TelemetryAggregator::new(config.terminal.telemetry_interval_secs);

    let status = orchestrator.status();
    let mut last_detection_count = 0u64;

    while let Some(chunk) = source.next_chunk() {
        let ring_before = ring.available()?;

        if let Some((msg_type, msg)) = orchestrator.process_buffer(&chunk)? {
            telemetry.record_control_message();
            logger.log(LogEvent::ControlMessage(ControlMessageEvent {
                timestamp: chrono::Utc::now(),
                message_type: msg_type.as_str().to_string(),
                talk_group_id: msg.talk_group_id,
                source_id: msg.source_id,
                channel_freq_hz: msg.channel_freq,
                encrypted: msg.encrypted,
                emergency: msg.emergency,
            }))?;

            if let Some(manager) = &channel_manager {
                manager.process_control_message(msg_type, &msg)?;
            }
        }

        let ring_after = ring.available()?;
        if ring_after > ring_before {
            let frames = ((ring_after - ring_before) / FRAME_SAMPLES).max(1);
            for _ in 0..frames {
                telemetry.record_voice_frame();
            }
        }

        if let Ok(status) = status.lock() {
            let detection_count = status.detection_count;
            if detection_count > last_detection_count {
                for _ in 0..(detection_count - last_detection_count) {
                    telemetry.record_burst(status.current_signal_power as f64);
                }
                last_detection_count = detection_count;
            }
        }

        if let Some(manager) = &channel_manager {
            telemetry.set_active_voice_channels(manager.active_channel_count()?);
        }

        if let Some(event) = telemetry.sample() {
            logger.log(LogEvent::Telemetry(event))?;
        }
    }

    source.stop();
    orchestrator.stop();
    if let Some(manager) = &channel_manager {
        manager.stop();
    }

    if let Some(consumer) = audio_consumer {
        let total_samples = consumer.stop();
        if let Some(wav_path) = &config.terminal.wav_output {
            logger.log(LogEvent::Info {
                message: format!("wrote {} PCM samples to {}", total_samples, wav_path.display()),
            })?;
        }
    }

    let stats_event = StatisticsEvent {
        timestamp: chrono::Utc::now(),
        duration_secs: logger.elapsed(),
        signal_power: telemetry.compute_statistics(),
        total_bursts: telemetry.total_bursts(),
        total_voice_frames: telemetry.total_voice_frames(),
        total_control_messages: telemetry.total_control_messages(),
    };
    logger.log(LogEvent::Statistics(stats_event))?;

    if verbose {
        if let Ok(core_logger) = signal_logger.lock() {
            logger.log(LogEvent::Info {
                message: format!("core log entries: {}", core_logger.entries().len()),
            })?;
        }
    }

    Ok(())
}
