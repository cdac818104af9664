//! Trunked-radio channel manager: tracks talk groups, follows voice channel
//! grants released on the control channel, and expires idle voice slots.

use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use crate::config::TrunkingConfig;
use crate::errors::{ChannelError, Result, TetraError};
use crate::logging::SignalLogger;
use crate::protocol::{ControlMessage, MessageType};
use crate::tuner::Tuner;

const MONITOR_POLL_INTERVAL: Duration = Duration::from_millis(100);

#[derive(Debug, Clone)]
pub struct TalkGroup {
    pub id: u32,
    pub name: String,
    pub monitored: bool,
    pub priority: i32,
    pub call_count: u64,
    pub last_activity: Option<Instant>,
}

#[derive(Debug, Clone)]
pub struct VoiceChannel {
    pub frequency: u32,
    pub talk_group_id: u32,
    pub source_id: u32,
    pub encrypted: bool,
    pub grant_time: Instant,
    pub last_update: Instant,
}

#[derive(Debug, Clone)]
pub struct ChannelHistoryEntry {
    pub talk_group_id: u32,
    pub frequency: u32,
    pub source_id: u32,
    pub duration: Duration,
}

#[derive(Debug, Default, Clone, Copy)]
pub struct ChannelManagerStats {
    pub control_msg_count: u64,
    pub total_calls: u64,
    pub emergency_calls: u64,
    pub encrypted_calls: u64,
}

struct VoiceChannelTable {
    channels: Vec<Option<VoiceChannel>>,
    current_channel_idx: Option<usize>,
}

/// Owns the talk group table, active voice channel slots, and call history
/// behind three separate locks (acquired left-to-right: talk groups, then
/// voice channels, then history), and runs a background monitor thread
/// that expires idle voice channels and flags control-channel silence.
pub struct ChannelManager {
    config: TrunkingConfig,
    tuner: Arc<dyn Tuner>,
    logger: Arc<Mutex<SignalLogger>>,
    talk_groups: Arc<Mutex<Vec<TalkGroup>>>,
    voice_channels: Arc<Mutex<VoiceChannelTable>>,
    history: Arc<Mutex<Vec<ChannelHistoryEntry>>>,
    last_control_msg: Arc<Mutex<Instant>>,
    control_msg_count: Arc<AtomicU64>,
    total_calls: Arc<AtomicU64>,
    emergency_calls: Arc<AtomicU64>,
    encrypted_calls: Arc<AtomicU64>,
    current_frequency: Arc<AtomicU32>,
    running: Arc<std::sync::atomic::AtomicBool>,
    monitor_handle: Mutex<Option<thread::JoinHandle<()>>>,
}

impl ChannelManager {
    pub fn new(config: TrunkingConfig, tuner: Arc<dyn Tuner>, logger: Arc<Mutex<SignalLogger>>) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            current_frequency: Arc::new(AtomicU32::new(config.control_channel_freq)),
            config,
            tuner,
            logger,
            talk_groups: Arc::new(Mutex::new(Vec::new())),
            voice_channels: Arc::new(Mutex::new(VoiceChannelTable {
                channels: vec![None; TrunkingConfig::MAX_ACTIVE_CHANNELS],
                current_channel_idx: None,
            })),
            history: Arc::new(Mutex::new(Vec::new())),
            last_control_msg: Arc::new(Mutex::new(Instant::now())),
            control_msg_count: Arc::new(AtomicU64::new(0)),
            total_calls: Arc::new(AtomicU64::new(0)),
            emergency_calls: Arc::new(AtomicU64::new(0)),
            encrypted_calls: Arc::new(AtomicU64::new(0)),
            running: Arc::new(std::sync::atomic::AtomicBool::new(false)),
            monitor_handle: Mutex::new(None),
        })
    }

    fn lock_talk_groups(&self) -> Result<std::sync::MutexGuard<'_, Vec<TalkGroup>>> {
        self.talk_groups
            .lock()
            .map_err(|_| TetraError::from(ChannelError::LockPoisoned { field: "talk_groups" }))
    }

    fn lock_voice_channels(&self) -> Result<std::sync::MutexGuard<'_, VoiceChannelTable>> {
        self.voice_channels
            .lock()
            .map_err(|_| TetraError::from(ChannelError::LockPoisoned { field: "voice_channels" }))
    }

    fn lock_history(&self) -> Result<std::sync::MutexGuard<'_, Vec<ChannelHistoryEntry>>> {
        self.history
            .lock()
            .map_err(|_| TetraError::from(ChannelError::LockPoisoned { field: "history" }))
    }

    pub fn add_talk_group(&self, id: u32, name: &str, monitored: bool, priority: i32) -> Result<usize> {
        let mut talk_groups = self.lock_talk_groups()?;
        if talk_groups.len() >= TrunkingConfig::MAX_TALK_GROUPS {
            return Err(ChannelError::TalkGroupTableFull {
                capacity: TrunkingConfig::MAX_TALK_GROUPS,
            }
            .into());
        }
        talk_groups.push(TalkGroup {
            id,
            name: name.to_string(),
            monitored,
            priority,
            call_count: 0,
            last_activity: None,
        });
        Ok(talk_groups.len() - 1)
    }

    pub fn get_talk_group(&self, id: u32) -> Result<Option<TalkGroup>> {
        let talk_groups = self.lock_talk_groups()?;
        Ok(talk_groups.iter().find(|tg| tg.id == id).cloned())
    }

    pub fn set_talk_group_monitored(&self, id: u32, monitored: bool) -> Result<()> {
        let mut talk_groups = self.lock_talk_groups()?;
        let tg = talk_groups
            .iter_mut()
            .find(|tg| tg.id == id)
            .ok_or(ChannelError::UnknownTalkGroup { id })?;
        tg.monitored = monitored;
        Ok(())
    }

    pub fn stats(&self) -> ChannelManagerStats {
        ChannelManagerStats {
            control_msg_count: self.control_msg_count.load(Ordering::Relaxed),
            total_calls: self.total_calls.load(Ordering::Relaxed),
            emergency_calls: self.emergency_calls.load(Ordering::Relaxed),
            encrypted_calls: self.encrypted_calls.load(Ordering::Relaxed),
        }
    }

    /// Count of voice channel slots currently granted.
    pub fn active_channel_count(&self) -> Result<usize> {
        let voice_channels = self.lock_voice_channels()?;
        Ok(voice_channels.channels.iter().flatten().count())
    }

    pub fn tune_to_channel(&self, frequency_hz: u32) {
        self.current_frequency.store(frequency_hz, Ordering::SeqCst);
        self.tuner.set_frequency(frequency_hz);
    }

    pub fn current_frequency(&self) -> u32 {
        self.current_frequency.load(Ordering::SeqCst)
    }

    fn should_follow(&self, msg: &ControlMessage, talk_group: &Option<TalkGroup>) -> bool {
        if self.config.emergency_override && msg.emergency {
            return true;
        }
        if let Some(tg) = talk_group {
            if tg.monitored && tg.priority >= self.config.priority_threshold {
                return true;
            }
        }
        self.config.record_all
    }

    /// Apply a decoded control-channel PDU: update talk-group activity,
    /// decide whether to follow a granted voice channel, and release voice
    /// slots on a channel-release PDU.
    pub fn process_control_message(&self, msg_type: MessageType, msg: &ControlMessage) -> Result<()> {
        {
            let mut last = self
                .last_control_msg
                .lock()
                .map_err(|_| TetraError::from(ChannelError::LockPoisoned { field: "last_control_msg" }))?;
            *last = Instant::now();
        }
        self.control_msg_count.fetch_add(1, Ordering::Relaxed);

        let talk_group = {
            let mut talk_groups = self.lock_talk_groups()?;
            let tg = talk_groups.iter_mut().find(|tg| tg.id == msg.talk_group_id);
            if let Some(tg) = tg {
                tg.call_count += 1;
                tg.last_activity = Some(Instant::now());
                Some(tg.clone())
            } else {
                None
            }
        };

        match msg_type {
            MessageType::ChannelGrant | MessageType::GroupCall => {
                self.total_calls.fetch_add(1, Ordering::Relaxed);
                if msg.emergency {
                    self.emergency_calls.fetch_add(1, Ordering::Relaxed);
                }
                if msg.encrypted {
                    self.encrypted_calls.fetch_add(1, Ordering::Relaxed);
                }

                let should_follow = self.should_follow(msg, &talk_group);
                if should_follow && self.config.auto_follow && msg.channel_freq > 0 {
                    // A full voice-channel table is a resource-exhaustion
                    // condition, not a receiver fault: log it and keep
                    // following the control channel rather than unwinding.
                    if let Err(err) = self.grant_voice_channel(msg) {
                        if matches!(
                            err,
                            TetraError::Channel(ChannelError::NoFreeVoiceSlot { .. })
                        ) {
                            self.logger
                                .lock()
                                .map_err(|_| TetraError::from(ChannelError::LockPoisoned { field: "logger" }))?
                                .warn("TRUNK", "no free voice channel slot, dropping grant");
                        } else {
                            return Err(err);
                        }
                    }
                } else if should_follow && self.config.auto_follow {
                    self.logger
                        .lock()
                        .map_err(|_| TetraError::from(ChannelError::LockPoisoned { field: "logger" }))?
                        .warn("TRUNK", "channel grant carried no frequency, not following");
                }
            }
            MessageType::ChannelRelease => {
                self.release_voice_channel(msg.talk_group_id)?;
            }
            MessageType::Emergency => {
                self.emergency_calls.fetch_add(1, Ordering::Relaxed);
            }
            _ => {}
        }

        Ok(())
    }

    fn grant_voice_channel(&self, msg: &ControlMessage) -> Result<()> {
        let mut voice_channels = self.lock_voice_channels()?;
        let slot = voice_channels
            .channels
            .iter()
            .position(|c| c.is_none())
            .ok_or(ChannelError::NoFreeVoiceSlot {
                capacity: TrunkingConfig::MAX_ACTIVE_CHANNELS,
            })?;

        let now = Instant::now();
        voice_channels.channels[slot] = Some(VoiceChannel {
            frequency: msg.channel_freq,
            talk_group_id: msg.talk_group_id,
            source_id: msg.source_id,
            encrypted: msg.encrypted,
            grant_time: now,
            last_update: now,
        });
        voice_channels.current_channel_idx = Some(slot);
        drop(voice_channels);

        self.tune_to_channel(msg.channel_freq);
        Ok(())
    }

    fn release_voice_channel(&self, talk_group_id: u32) -> Result<()> {
        let mut voice_channels = self.lock_voice_channels()?;
        let slot = voice_channels
            .channels
            .iter()
            .position(|c| matches!(c, Some(ch) if ch.talk_group_id == talk_group_id));

        if let Some(idx) = slot {
            voice_channels.channels[idx] = None;
            if voice_channels.current_channel_idx == Some(idx) {
                voice_channels.current_channel_idx = None;
                let control_freq = self.config.control_channel_freq;
                drop(voice_channels);
                self.tune_to_channel(control_freq);
            }
        }
        Ok(())
    }

    pub fn active_channel(&self, talk_group_id: u32) -> Result<Option<VoiceChannel>> {
        let voice_channels = self.lock_voice_channels()?;
        Ok(voice_channels
            .channels
            .iter()
            .flatten()
            .find(|c| c.talk_group_id == talk_group_id)
            .cloned())
    }

    pub fn history(&self) -> Result<Vec<ChannelHistoryEntry>> {
        let history = self.lock_history()?;
        Ok(history.clone())
    }

    /// Expire any voice channel that's been idle longer than
    /// `config.hold_time_ms`, moving it into history. Exposed standalone so
    /// it is testable without spinning up the background thread.
    pub fn expire_idle_channels(&self) -> Result<()> {
        let now = Instant::now();
        let hold_time = Duration::from_millis(self.config.hold_time_ms);
        let mut voice_channels = self.lock_voice_channels()?;
        let mut expired_entries = Vec::new();

        for slot in voice_channels.channels.iter_mut() {
            let expired = matches!(slot, Some(ch) if now.duration_since(ch.last_update) > hold_time);
            if expired {
                if let Some(ch) = slot.take() {
                    expired_entries.push(ChannelHistoryEntry {
                        talk_group_id: ch.talk_group_id,
                        frequency: ch.frequency,
                        source_id: ch.source_id,
                        duration: now.duration_since(ch.grant_time),
                    });
                }
            }
        }
        drop(voice_channels);

        if !expired_entries.is_empty() {
            let mut history = self.lock_history()?;
            for entry in expired_entries {
                if history.len() >= TrunkingConfig::CHANNEL_HISTORY_SIZE {
                    history.remove(0);
                }
                history.push(entry);
            }
        }
        Ok(())
    }

    /// Spawn the background monitor thread: polls every 100ms for control
    /// channel silence and expired voice channels.
    pub fn start(self: &Arc<Self>) {
        self.running.store(true, Ordering::SeqCst);
        let mgr = Arc::clone(self);
        let handle = thread::spawn(move || {
            while mgr.running.load(Ordering::SeqCst) {
                let timed_out = mgr
                    .last_control_msg
                    .lock()
                    .ok()
                    .map(|last| {
                        last.elapsed() > Duration::from_millis(TrunkingConfig::CONTROL_CHANNEL_TIMEOUT_MS)
                    })
                    .unwrap_or(false);
                if timed_out {
                    if let Ok(mut logger) = mgr.logger.lock() {
                        logger.warn("TRUNK", "no control channel messages received recently");
                    }
                }

                let _ = mgr.expire_idle_channels();
                thread::sleep(MONITOR_POLL_INTERVAL);
            }
        });
        *self.monitor_handle.lock().expect("monitor handle mutex poisoned") = Some(handle);
    }

    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.monitor_handle.lock().expect("monitor handle mutex poisoned").take() {
            let _ = handle.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tuner::RecordingTuner;

    fn manager(config: TrunkingConfig) -> ChannelManager {
        ChannelManager::new(
            config,
            Arc::new(RecordingTuner::default()),
            Arc::new(Mutex::new(SignalLogger::default())),
        )
        .unwrap()
    }

    #[test]
    fn new_rejects_invalid_priority_threshold() {
        let config = TrunkingConfig {
            priority_threshold: -5,
            ..Default::default()
        };
        let err = ChannelManager::new(
            config,
            Arc::new(RecordingTuner::default()),
            Arc::new(Mutex::new(SignalLogger::default())),
        )
        .unwrap_err();
        assert!(matches!(
            err,
            TetraError::Config(crate::errors::ConfigError::InvalidPriorityThreshold { .. })
        ));
    }

    #[test]
    fn add_and_get_talk_group_round_trips() {
        let mgr = manager(TrunkingConfig::default());
        mgr.add_talk_group(100, "Fire Dispatch", true, 5).unwrap();
        let tg = mgr.get_talk_group(100).unwrap().unwrap();
        assert_eq!(tg.name, "Fire Dispatch");
        assert!(tg.monitored);
    }

    #[test]
    fn unknown_talk_group_lookup_returns_none() {
        let mgr = manager(TrunkingConfig::default());
        assert!(mgr.get_talk_group(999).unwrap().is_none());
    }

    #[test]
    fn emergency_override_follows_even_when_unmonitored() {
        let mut config = TrunkingConfig::default();
        config.auto_follow = true;
        config.emergency_override = true;
        let mgr = manager(config);
        mgr.add_talk_group(1, "TG1", false, 0).unwrap();

        let msg = ControlMessage {
            talk_group_id: 1,
            channel_freq: 425_000_000,
            emergency: true,
            ..Default::default()
        };
        mgr.process_control_message(MessageType::ChannelGrant, &msg).unwrap();

        assert!(mgr.active_channel(1).unwrap().is_some());
        assert_eq!(mgr.current_frequency(), 425_000_000);
    }

    #[test]
    fn unmonitored_below_threshold_does_not_follow() {
        let mut config = TrunkingConfig::default();
        config.auto_follow = true;
        config.priority_threshold = 5;
        let mgr = manager(config);
        mgr.add_talk_group(1, "TG1", true, 1).unwrap();

        let msg = ControlMessage {
            talk_group_id: 1,
            channel_freq: 425_000_000,
            ..Default::default()
        };
        mgr.process_control_message(MessageType::ChannelGrant, &msg).unwrap();

        assert!(mgr.active_channel(1).unwrap().is_none());
    }

    #[test]
    fn channel_release_clears_active_slot() {
        let mut config = TrunkingConfig::default();
        config.auto_follow = true;
        config.record_all = true;
        let mgr = manager(config);

        let grant = ControlMessage {
            talk_group_id: 2,
            channel_freq: 430_000_000,
            ..Default::default()
        };
        mgr.process_control_message(MessageType::ChannelGrant, &grant).unwrap();
        assert!(mgr.active_channel(2).unwrap().is_some());

        let release = ControlMessage {
            talk_group_id: 2,
            ..Default::default()
        };
        mgr.process_control_message(MessageType::ChannelRelease, &release).unwrap();
        assert!(mgr.active_channel(2).unwrap().is_none());
    }

    #[test]
    fn active_channel_count_tracks_grants_and_releases() {
        let mut config = TrunkingConfig::default();
        config.auto_follow = true;
        config.record_all = true;
        let mgr = manager(config);
        assert_eq!(mgr.active_channel_count().unwrap(), 0);

        let grant = ControlMessage {
            talk_group_id: 3,
            channel_freq: 431_000_000,
            ..Default::default()
        };
        mgr.process_control_message(MessageType::ChannelGrant, &grant).unwrap();
        assert_eq!(mgr.active_channel_count().unwrap(), 1);

        let release = ControlMessage {
            talk_group_id: 3,
            ..Default::default()
        };
        mgr.process_control_message(MessageType::ChannelRelease, &release).unwrap();
        assert_eq!(mgr.active_channel_count().unwrap(), 0);
    }

    #[test]
    fn no_free_slot_is_reported_as_error() {
        let mut config = TrunkingConfig::default();
        config.auto_follow = true;
        config.record_all = true;
        let mgr = manager(config);

        for i in 0..TrunkingConfig::MAX_ACTIVE_CHANNELS as u32 {
            let msg = ControlMessage {
                talk_group_id: i,
                channel_freq: 425_000_000 + i,
                ..Default::default()
            };
            mgr.process_control_message(MessageType::ChannelGrant, &msg).unwrap();
        }

        let overflow = ControlMessage {
            talk_group_id: 9999,
            channel_freq: 426_000_000,
            ..Default::default()
        };
        let err = mgr
            .grant_voice_channel(&overflow)
            .unwrap_err();
        assert!(matches!(
            err,
            TetraError::Channel(ChannelError::NoFreeVoiceSlot { .. })
        ));
    }

    #[test]
    fn full_channel_table_is_logged_not_propagated_through_process_control_message() {
        let mut config = TrunkingConfig::default();
        config.auto_follow = true;
        config.record_all = true;
        let mgr = manager(config);

        for i in 0..TrunkingConfig::MAX_ACTIVE_CHANNELS as u32 {
            let msg = ControlMessage {
                talk_group_id: i,
                channel_freq: 425_000_000 + i,
                ..Default::default()
            };
            mgr.process_control_message(MessageType::ChannelGrant, &msg).unwrap();
        }
        assert_eq!(
            mgr.active_channel_count().unwrap(),
            TrunkingConfig::MAX_ACTIVE_CHANNELS
        );

        let overflow = ControlMessage {
            talk_group_id: 9999,
            channel_freq: 426_000_000,
            ..Default::default()
        };
        // A full table must not unwind the caller (the receiver loop).
        mgr.process_control_message(MessageType::ChannelGrant, &overflow)
            .unwrap();
        assert_eq!(
            mgr.active_channel_count().unwrap(),
            TrunkingConfig::MAX_ACTIVE_CHANNELS
        );
        assert!(mgr.active_channel(9999).unwrap().is_none());
    }
}
