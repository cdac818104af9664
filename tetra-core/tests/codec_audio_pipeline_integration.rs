//! Integration test for the decode-to-WAV path: codec frames go into the
//! audio ring, a background `AudioConsumer` drains the ring into a
//! `WavSink`, and the resulting file header reflects what was written.

use std::sync::Arc;
use std::time::Duration;

use tetra_core::audio_ring::{AudioConsumer, AudioRing, READ_CHUNK_SIZE};
use tetra_core::audio_sink::{read_header, WavSink};
use tetra_core::codec::{VoiceDecoder, FRAME_BITS, FRAME_SAMPLES};

fn temp_wav_path(name: &str) -> std::path::PathBuf {
    std::env::temp_dir().join(format!(
        "tetra_codec_pipeline_test_{name}_{}.wav",
        std::process::id()
    ))
}

#[test]
fn decoded_frames_flow_through_the_ring_into_a_playable_wav_file() {
    let path = temp_wav_path("decode_to_wav");
    let sample_rate = 8000;

    let ring = Arc::new(AudioRing::new(READ_CHUNK_SIZE * 8));
    let consumer = AudioConsumer::new(ring.clone());
    let sink = WavSink::create(&path, sample_rate).unwrap();
    consumer.start(sink);

    let mut decoder = VoiceDecoder::new();
    let frame_count = 6;
    let mut bits = vec![0u8; FRAME_BITS];
    bits[40] = 1; // non-silent codebook pulse so frames aren't all-zero

    let mut total_samples_decoded = 0usize;
    for _ in 0..frame_count {
        let pcm = decoder.decode_frame(&bits).unwrap();
        ring.write(&pcm).unwrap();
        total_samples_decoded += FRAME_SAMPLES;
    }

    // Give the consumer thread a chance to drain before stopping it.
    std::thread::sleep(Duration::from_millis(30));
    let total_written = consumer.stop();

    assert_eq!(decoder.frame_count(), frame_count as u64);
    assert_eq!(total_written, total_samples_decoded);

    let info = read_header(&path).unwrap();
    assert_eq!(info.sample_rate, sample_rate);
    assert_eq!(info.bits_per_sample, 16);
    assert_eq!(info.data_chunk_size as usize, total_written * 2);
    assert_eq!(info.riff_chunk_size as usize, 36 + total_written * 2);

    std::fs::remove_file(&path).ok();
}

#[test]
fn silence_frames_decode_to_bounded_pcm_written_in_full() {
    let path = temp_wav_path("silence");
    let sample_rate = 8000;

    let ring = Arc::new(AudioRing::new(READ_CHUNK_SIZE * 4));
    let consumer = AudioConsumer::new(ring.clone());
    let sink = WavSink::create(&path, sample_rate).unwrap();
    consumer.start(sink);

    let mut decoder = VoiceDecoder::new();
    let bits = vec![0u8; FRAME_BITS];
    let pcm = decoder.decode_frame(&bits).unwrap();
    assert!(pcm.iter().all(|&s| (i16::MIN..=i16::MAX).contains(&s)));
    ring.write(&pcm).unwrap();

    std::thread::sleep(Duration::from_millis(20));
    let total_written = consumer.stop();
    assert_eq!(total_written, FRAME_SAMPLES);

    let info = read_header(&path).unwrap();
    assert_eq!(info.data_chunk_size as usize, FRAME_SAMPLES * 2);

    std::fs::remove_file(&path).ok();
}
