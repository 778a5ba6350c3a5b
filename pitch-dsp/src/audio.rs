//! # Audio Capture Module
//!
//! Optional live input for the detector using CPAL (Cross-Platform Audio
//! Library). Callers that already own an audio callback can skip this module
//! and call [`PitchDetector::process`] themselves.
//!
//! ## Features
//! - Automatic default input device selection
//! - F32 stream configuration closest to the requested sample rate
//! - Detection runs inside the input callback, allocation free
//! - Stream errors forwarded over a channel for the consumer to poll

use anyhow::{anyhow, Result};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::SupportedStreamConfigRange;
use crossbeam_channel::{Receiver, Sender};

use crate::{DetectorConfig, FrameLayout, PitchDetector, ResultReader};

/// Frames down-mixed per `process` call when the device is not mono.
const DOWNMIX_CHUNK: usize = 256;

/// Stream errors kept for the consumer before new ones are dropped.
const ERROR_BACKLOG: usize = 16;

/// A running capture stream feeding a detector.
///
/// Capture stops when this value is dropped.
pub struct LiveDetector {
    /// Keeps the input stream alive.
    pub stream: cpal::Stream,
    /// Latest reading of the detector running inside the stream callback.
    pub reader: ResultReader,
    /// Errors reported by the audio backend.
    pub errors: Receiver<cpal::StreamError>,
    /// Sample rate the device actually delivers.
    pub sample_rate: u32,
    /// Frame geometry of the running detector.
    pub layout: FrameLayout,
}

/// Starts pitch detection on the default input device.
///
/// This function:
/// 1. Selects the default audio input device
/// 2. Picks an F32 configuration, preferring mono and `config.sample_rate`
/// 3. Builds a detector for the rate the device actually delivers
/// 4. Feeds every input callback straight into the detector
///
/// # Arguments
/// * `config` - Detector configuration; its sample rate is only a preference
///
/// # Returns
/// * `Ok(live)` - Running stream plus a reader for the results
/// * `Err(e)` - No usable device or format, or an invalid configuration
pub fn start_live_detection(config: DetectorConfig) -> Result<LiveDetector> {
    let host = cpal::default_host();
    let device = host
        .default_input_device()
        .ok_or_else(|| anyhow!("No input device available"))?;

    log::info!("[CAPTURE] Using audio input device: {}", device.name()?);

    let target_rate = config.sample_rate.round() as u32;
    let configs = device.supported_input_configs()?.collect::<Vec<_>>();
    let supported_config = find_supported_config(configs, target_rate)
        .ok_or_else(|| anyhow!("No suitable f32 input format found"))?;

    let rate = target_rate.clamp(
        supported_config.min_sample_rate().0,
        supported_config.max_sample_rate().0,
    );
    let stream_config: cpal::StreamConfig = supported_config
        .with_sample_rate(cpal::SampleRate(rate))
        .into();
    let channels = usize::from(stream_config.channels.max(1));

    log::info!("[CAPTURE] Selected {rate} Hz, {channels} channel(s)");

    let mut detector = PitchDetector::new(DetectorConfig {
        sample_rate: rate as f32,
        ..config
    })?;
    let reader = detector.reader();
    let layout = *detector.layout();

    let (error_tx, error_rx) = crossbeam_channel::bounded(ERROR_BACKLOG);
    let err_fn = move |err| forward_error(&error_tx, err);

    let stream = device.build_input_stream(
        &stream_config,
        move |data: &[f32], _: &cpal::InputCallbackInfo| {
            if channels == 1 {
                detector.process(data);
            } else {
                feed_downmixed(&mut detector, data, channels);
            }
        },
        err_fn,
        None,
    )?;

    stream.play()?;

    Ok(LiveDetector {
        stream,
        reader,
        errors: error_rx,
        sample_rate: rate,
        layout,
    })
}

fn forward_error(sender: &Sender<cpal::StreamError>, err: cpal::StreamError) {
    log::warn!("[CAPTURE] An error occurred on the audio stream: {err}");
    // Ignore errors if the channel is full; the consumer is behind anyway.
    let _ = sender.try_send(err);
}

/// Averages interleaved frames to mono and feeds them in fixed chunks.
fn feed_downmixed(detector: &mut PitchDetector, interleaved: &[f32], channels: usize) {
    let mut mono = [0.0f32; DOWNMIX_CHUNK];
    let scale = 1.0 / channels as f32;
    for block in interleaved.chunks(channels * DOWNMIX_CHUNK) {
        let mut frames = 0;
        for (slot, frame) in mono.iter_mut().zip(block.chunks_exact(channels)) {
            *slot = frame.iter().sum::<f32>() * scale;
            frames += 1;
        }
        detector.process(&mono[..frames]);
    }
}

/// Finds the best supported audio configuration for the target sample rate.
///
/// Only F32 formats qualify. Mono is preferred over multi-channel, then the
/// range closest to `target_rate` wins.
fn find_supported_config(
    configs: Vec<SupportedStreamConfigRange>,
    target_rate: u32,
) -> Option<SupportedStreamConfigRange> {
    configs
        .into_iter()
        .filter(|c| c.sample_format() == cpal::SampleFormat::F32)
        .min_by_key(|c| {
            let rate_distance = if target_rate < c.min_sample_rate().0 {
                c.min_sample_rate().0 - target_rate
            } else {
                target_rate.saturating_sub(c.max_sample_rate().0)
            };
            (c.channels() != 1, rate_distance)
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use cpal::{SampleFormat, SampleRate, SupportedBufferSize};

    fn range(channels: u16, min: u32, max: u32, format: SampleFormat) -> SupportedStreamConfigRange {
        SupportedStreamConfigRange::new(
            channels,
            SampleRate(min),
            SampleRate(max),
            SupportedBufferSize::Unknown,
            format,
        )
    }

    #[test]
    fn prefers_mono_f32_covering_the_rate() {
        let configs = vec![
            range(2, 44_100, 48_000, SampleFormat::F32),
            range(1, 8_000, 16_000, SampleFormat::F32),
            range(1, 44_100, 96_000, SampleFormat::F32),
            range(1, 48_000, 48_000, SampleFormat::I16),
        ];
        let best = find_supported_config(configs, 48_000).unwrap();
        assert_eq!(best.channels(), 1);
        assert_eq!(best.max_sample_rate(), SampleRate(96_000));
    }

    #[test]
    fn rejects_devices_without_f32() {
        let configs = vec![range(1, 48_000, 48_000, SampleFormat::I16)];
        assert!(find_supported_config(configs, 48_000).is_none());
    }

    #[test]
    fn downmix_feeds_every_frame() {
        let mut detector = PitchDetector::with_window(64, 8_000.0).unwrap();
        // 64 stereo frames: exactly one window once averaged.
        let interleaved: Vec<f32> = (0..128).map(|i| if i % 2 == 0 { 0.5 } else { -0.5 }).collect();
        feed_downmixed(&mut detector, &interleaved, 2);
        assert_eq!(detector.analysis_passes(), 1);
        // Opposite channels cancel out, so the window is silent.
        assert_eq!(detector.result(), crate::PitchReading::NONE);
        assert_eq!(detector.lock_state(), crate::LockState::Silent);
    }
}
