//! TETRA analyzer core library
//!
//! Implements the signal-processing, cryptanalysis and voice-codec pipeline
//! of a TETRA (Terrestrial Trunked Radio) receiver: I/Q demodulation, burst
//! synchronization, the documented TEA1 reduced-keyspace vulnerability,
//! a simplified ACELP-style voice decoder, and a trunked-channel manager
//! that follows control-channel grants onto voice channels.

pub mod audio_ring;
pub mod audio_sink;
pub mod burst;
pub mod channel_manager;
pub mod cipher;
pub mod codec;
pub mod config;
pub mod demodulator;
pub mod dsp;
pub mod errors;
pub mod key_recovery;
pub mod logging;
pub mod orchestrator;
pub mod protocol;
pub mod tuner;
pub mod utils;

pub use channel_manager::ChannelManager;
pub use config::ReceiverConfig;
pub use demodulator::Demodulator;
pub use errors::{Result, TetraError};
pub use orchestrator::Orchestrator;
