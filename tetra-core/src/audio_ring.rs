//! Fixed-capacity audio ring buffer feeding the real-time playback/recording
//! path, with overwrite-oldest-on-overflow semantics.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use crate::audio_sink::WavSink;
use crate::config::SystemConfig;
use crate::errors::{ChannelError, Result, TetraError};

/// Samples pulled per consumer chunk, matching the playback thread's
/// low-latency read size.
pub const READ_CHUNK_SIZE: usize = 512;

/// How long a consumer sleeps when fewer than `READ_CHUNK_SIZE` samples are
/// available.
pub const UNDERRUN_SLEEP: Duration = Duration::from_millis(10);

struct RingState {
    buffer: Vec<i16>,
    write_pos: usize,
    read_pos: usize,
}

/// Single-producer/single-consumer ring buffer of 16-bit PCM samples.
///
/// Overflow drops the oldest unread sample rather than blocking the
/// producer, matching the behaviour of the original ALSA playback ring.
pub struct AudioRing {
    state: Mutex<RingState>,
    capacity: usize,
}

impl AudioRing {
    pub fn new(capacity: usize) -> Self {
        Self {
            state: Mutex::new(RingState {
                buffer: vec![0i16; capacity],
                write_pos: 0,
                read_pos: 0,
            }),
            capacity,
        }
    }

    pub fn with_default_capacity() -> Self {
        Self::new(SystemConfig::AUDIO_RING_BUFFER_SIZE)
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, RingState>> {
        self.state
            .lock()
            .map_err(|_| TetraError::from(ChannelError::LockPoisoned { field: "audio_ring" }))
    }

    /// Write `samples` into the ring, dropping the oldest unread sample for
    /// each one that overwrites the read cursor.
    pub fn write(&self, samples: &[i16]) -> Result<usize> {
        let mut state = self.lock()?;
        let capacity = self.capacity;
        let mut written = 0usize;
        for &sample in samples {
            state.buffer[state.write_pos] = sample;
            state.write_pos = (state.write_pos + 1) % capacity;
            written += 1;
            if state.write_pos == state.read_pos {
                state.read_pos = (state.read_pos + 1) % capacity;
            }
        }
        Ok(written)
    }

    /// Number of samples currently available to read.
    pub fn available(&self) -> Result<usize> {
        let state = self.lock()?;
        Ok(self.available_locked(&state))
    }

    fn available_locked(&self, state: &RingState) -> usize {
        if state.write_pos >= state.read_pos {
            state.write_pos - state.read_pos
        } else {
            self.capacity - state.read_pos + state.write_pos
        }
    }

    /// Read one `READ_CHUNK_SIZE` chunk if enough data is buffered, returning
    /// `None` on underrun (the caller should sleep `UNDERRUN_SLEEP` and
    /// retry, mirroring the playback thread's poll loop).
    pub fn read_chunk(&self) -> Result<Option<Vec<i16>>> {
        let mut state = self.lock()?;
        if self.available_locked(&state) < READ_CHUNK_SIZE {
            return Ok(None);
        }
        let capacity = self.capacity;
        let mut chunk = Vec::with_capacity(READ_CHUNK_SIZE);
        for _ in 0..READ_CHUNK_SIZE {
            chunk.push(state.buffer[state.read_pos]);
            state.read_pos = (state.read_pos + 1) % capacity;
        }
        Ok(Some(chunk))
    }
}

/// Long-lived background thread that drains an `AudioRing` into a `WavSink`
/// at `UNDERRUN_SLEEP` cadence, running concurrently with the producer
/// loop rather than draining once the producer has already finished.
pub struct AudioConsumer {
    ring: Arc<AudioRing>,
    running: Arc<AtomicBool>,
    handle: Mutex<Option<thread::JoinHandle<usize>>>,
}

impl AudioConsumer {
    pub fn new(ring: Arc<AudioRing>) -> Self {
        Self {
            ring,
            running: Arc::new(AtomicBool::new(false)),
            handle: Mutex::new(None),
        }
    }

    /// Spawn the consumer thread, writing drained chunks into `sink` until
    /// `stop` is called. On stop it keeps draining until the ring empties
    /// below `READ_CHUNK_SIZE`, then finalizes `sink`.
    pub fn start(&self, mut sink: WavSink) {
        self.running.store(true, Ordering::SeqCst);
        let ring = Arc::clone(&self.ring);
        let running = Arc::clone(&self.running);
        let handle = thread::spawn(move || {
            let mut total_samples = 0usize;
            loop {
                match ring.read_chunk() {
                    Ok(Some(chunk)) => {
                        if sink.write_samples(&chunk).is_ok() {
                            total_samples += chunk.len();
                        }
                    }
                    Ok(None) => {
                        if !running.load(Ordering::SeqCst) {
                            break;
                        }
                        thread::sleep(UNDERRUN_SLEEP);
                    }
                    Err(_) => break,
                }
            }
            let _ = sink.finalize();
            total_samples
        });
        *self.handle.lock().expect("audio consumer handle mutex poisoned") = Some(handle);
    }

    /// Signal the consumer to drain whatever remains buffered and exit,
    /// returning the total number of samples it wrote.
    pub fn stop(&self) -> usize {
        self.running.store(false, Ordering::SeqCst);
        self.handle
            .lock()
            .expect("audio consumer handle mutex poisoned")
            .take()
            .and_then(|handle| handle.join().ok())
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_wav_path(name: &str) -> std::path::PathBuf {
        std::env::temp_dir().join(format!("tetra_audio_ring_test_{}_{}.wav", name, std::process::id()))
    }

    #[test]
    fn consumer_drains_ring_while_producer_keeps_writing() {
        let path = temp_wav_path("consumer_drains");
        let ring = Arc::new(AudioRing::new(READ_CHUNK_SIZE * 8));
        let consumer = AudioConsumer::new(ring.clone());
        let sink = WavSink::create(&path, 8000).unwrap();
        consumer.start(sink);

        for _ in 0..4 {
            let samples: Vec<i16> = (0..READ_CHUNK_SIZE as i16).collect();
            ring.write(&samples).unwrap();
            thread::sleep(UNDERRUN_SLEEP * 2);
        }

        let total = consumer.stop();
        assert!(total > 0);
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn consumer_flushes_remaining_samples_on_stop() {
        let path = temp_wav_path("flush_on_stop");
        let ring = Arc::new(AudioRing::new(READ_CHUNK_SIZE * 4));
        let consumer = AudioConsumer::new(ring.clone());
        let sink = WavSink::create(&path, 8000).unwrap();
        consumer.start(sink);

        let samples: Vec<i16> = (0..READ_CHUNK_SIZE as i16).collect();
        ring.write(&samples).unwrap();

        let total = consumer.stop();
        assert_eq!(total, READ_CHUNK_SIZE);
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn write_then_read_chunk_round_trips() {
        let ring = AudioRing::new(2048);
        let samples: Vec<i16> = (0..READ_CHUNK_SIZE as i16).collect();
        ring.write(&samples).unwrap();
        let chunk = ring.read_chunk().unwrap().unwrap();
        assert_eq!(chunk, samples);
    }

    #[test]
    fn underrun_returns_none() {
        let ring = AudioRing::new(2048);
        ring.write(&[1, 2, 3]).unwrap();
        assert!(ring.read_chunk().unwrap().is_none());
    }

    #[test]
    fn overflow_drops_oldest_samples() {
        let ring = AudioRing::new(4);
        ring.write(&[1, 2, 3, 4]).unwrap();
        ring.write(&[5, 6]).unwrap();
        assert_eq!(ring.available().unwrap(), 4);
    }

    #[test]
    fn default_capacity_matches_system_config() {
        let ring = AudioRing::with_default_capacity();
        assert_eq!(ring.capacity, SystemConfig::AUDIO_RING_BUFFER_SIZE);
    }
}
