//! Integration tests for the trunked-channel manager: talk-group tracking,
//! voice-channel grant/release, and call history, all driven through
//! `process_control_message` the way the CLI driver calls it rather than
//! through the manager's private grant/release helpers directly.

use std::sync::{Arc, Mutex};

use tetra_core::channel_manager::ChannelManager;
use tetra_core::config::TrunkingConfig;
use tetra_core::logging::SignalLogger;
use tetra_core::protocol::{ControlMessage, MessageType};
use tetra_core::tuner::RecordingTuner;

fn manager(config: TrunkingConfig) -> ChannelManager {
    ChannelManager::new(
        config,
        Arc::new(RecordingTuner::default()),
        Arc::new(Mutex::new(SignalLogger::default())),
    )
    .unwrap()
}

#[test]
fn channel_grant_then_release_round_trips_through_control_messages() {
    let mgr = manager(TrunkingConfig {
        auto_follow: true,
        ..Default::default()
    });
    mgr.add_talk_group(100, "dispatch", true, 5).unwrap();

    let grant = ControlMessage {
        talk_group_id: 100,
        source_id: 7,
        channel_freq: 420_100_000,
        ..Default::default()
    };
    mgr.process_control_message(MessageType::ChannelGrant, &grant).unwrap();

    assert_eq!(mgr.active_channel_count().unwrap(), 1);
    let active = mgr.active_channel(100).unwrap().expect("channel should be active");
    assert_eq!(active.frequency, 420_100_000);
    assert_eq!(mgr.current_frequency(), 420_100_000);

    let release = ControlMessage {
        talk_group_id: 100,
        ..Default::default()
    };
    mgr.process_control_message(MessageType::ChannelRelease, &release).unwrap();

    assert_eq!(mgr.active_channel_count().unwrap(), 0);
    assert!(mgr.active_channel(100).unwrap().is_none());
    assert_eq!(mgr.current_frequency(), 0); // back to the default control channel freq
}

#[test]
fn emergency_grant_is_followed_even_for_unmonitored_talk_group() {
    let mgr = manager(TrunkingConfig {
        auto_follow: true,
        emergency_override: true,
        record_all: false,
        ..Default::default()
    });
    mgr.add_talk_group(200, "unmonitored", false, 0).unwrap();

    let grant = ControlMessage {
        talk_group_id: 200,
        channel_freq: 420_200_000,
        emergency: true,
        ..Default::default()
    };
    mgr.process_control_message(MessageType::ChannelGrant, &grant).unwrap();

    assert_eq!(mgr.active_channel_count().unwrap(), 1);
    let stats = mgr.stats();
    assert_eq!(stats.emergency_calls, 1);
}

#[test]
fn full_voice_channel_table_is_swallowed_not_propagated() {
    let mgr = manager(TrunkingConfig {
        auto_follow: true,
        record_all: true,
        ..Default::default()
    });

    for tg in 0..TrunkingConfig::MAX_ACTIVE_CHANNELS as u32 {
        let grant = ControlMessage {
            talk_group_id: tg,
            channel_freq: 420_000_000 + tg * 25_000,
            ..Default::default()
        };
        mgr.process_control_message(MessageType::ChannelGrant, &grant).unwrap();
    }
    assert_eq!(
        mgr.active_channel_count().unwrap(),
        TrunkingConfig::MAX_ACTIVE_CHANNELS
    );

    // One more grant has nowhere to land; this must not return an error or
    // unwind the caller, matching the "log and continue" resource-exhaustion
    // handling in `process_control_message`.
    let overflow = ControlMessage {
        talk_group_id: 999,
        channel_freq: 421_000_000,
        ..Default::default()
    };
    let result = mgr.process_control_message(MessageType::ChannelGrant, &overflow);
    assert!(result.is_ok());
    assert_eq!(
        mgr.active_channel_count().unwrap(),
        TrunkingConfig::MAX_ACTIVE_CHANNELS
    );
}

#[test]
fn released_channel_moves_into_history_after_idle_expiry() {
    let mgr = manager(TrunkingConfig {
        auto_follow: true,
        record_all: true,
        hold_time_ms: 0,
        ..Default::default()
    });

    let grant = ControlMessage {
        talk_group_id: 50,
        channel_freq: 420_050_000,
        source_id: 3,
        ..Default::default()
    };
    mgr.process_control_message(MessageType::ChannelGrant, &grant).unwrap();
    assert_eq!(mgr.active_channel_count().unwrap(), 1);

    std::thread::sleep(std::time::Duration::from_millis(5));
    mgr.expire_idle_channels().unwrap();

    assert_eq!(mgr.active_channel_count().unwrap(), 0);
    let history = mgr.history().unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].talk_group_id, 50);
}

#[test]
fn new_rejects_out_of_range_priority_threshold() {
    let err = ChannelManager::new(
        TrunkingConfig {
            priority_threshold: 99,
            ..Default::default()
        },
        Arc::new(RecordingTuner::default()),
        Arc::new(Mutex::new(SignalLogger::default())),
    )
    .unwrap_err();
    assert!(matches!(
        err,
        tetra_core::TetraError::Config(tetra_core::errors::ConfigError::InvalidPriorityThreshold { .. })
    ));
}
