//! # Pitch Detector Module
//!
//! Streaming front end of the crate. A [`PitchDetector`] owns every buffer the
//! analysis needs, accepts arbitrarily sized chunks of mono samples and runs
//! at most one analysis pass per chunk:
//!
//! 1. Ring buffer: wait for a full window and one hop of new samples
//! 2. Power gate: publish "no pitch" for silent windows
//! 3. Hann window and FFT magnitude spectrum
//! 4. Mains hum cut and octave-band noise gate
//! 5. 5× interpolation, L2 normalization and harmonic product spectrum
//! 6. Peak to frequency, MIDI note and cents, then the note-lock filter
//!
//! Passes that cannot produce a plausible note abort quietly and leave the
//! previous reading published.

use std::sync::Arc;

use once_cell::sync::Lazy;

use crate::cleaning;
use crate::config::{DetectorConfig, FrameLayout, HARMONIC_FACTOR};
use crate::error::{try_filled, DetectorError};
use crate::fft::{mean_power, SpectrumAnalyzer};
use crate::hps;
use crate::ring::SampleRing;
use crate::shared::{ReadingCell, ResultReader};
use crate::stability::{LockState, NoteStabilizer};
use crate::tuning::{self, NOTE_TABLE};
use crate::PitchReading;

/// Streaming harmonic-product-spectrum pitch detector for one audio stream.
///
/// Feed samples with [`process`](Self::process) from a single thread; read the
/// latest stable reading with [`result`](Self::result) or from other threads
/// through a [`ResultReader`]. No method allocates after construction.
pub struct PitchDetector {
    config: DetectorConfig,
    layout: FrameLayout,
    ring: SampleRing,
    analyzer: SpectrumAnalyzer,
    interp: Box<[f32]>,
    hps: Box<[f32]>,
    stabilizer: NoteStabilizer,
    published: PitchReading,
    cell: Arc<ReadingCell>,
    passes: u64,
}

impl PitchDetector {
    /// Creates a detector with default tuning parameters.
    ///
    /// `window_size` is rounded up to the next power of two and must be at
    /// least 64; `sample_rate` must be positive.
    pub fn with_window(window_size: usize, sample_rate: f32) -> Result<Self, DetectorError> {
        Self::new(DetectorConfig::new(window_size, sample_rate))
    }

    /// Validates `config` and allocates all analysis buffers.
    pub fn new(config: DetectorConfig) -> Result<Self, DetectorError> {
        let layout = config.layout()?;
        Lazy::force(&NOTE_TABLE);

        let ring = SampleRing::new(
            try_filled(layout.ring_capacity, 0.0, "sample ring")?,
            layout.window_len,
            layout.hop_len,
        );
        let analyzer = SpectrumAnalyzer::new(&layout)?;
        let interp = try_filled(layout.interp_len, 0.0, "interpolated spectrum")?;
        let hps = try_filled(layout.interp_len, 0.0, "harmonic product spectrum")?;

        log::debug!(
            "[DETECTOR] window {} (hop {}, {:.3} Hz/bin) at {} Hz",
            layout.window_len,
            layout.hop_len,
            layout.bin_width,
            config.sample_rate
        );

        Ok(Self {
            stabilizer: NoteStabilizer::new(config.cents_smoothing),
            published: PitchReading::NONE,
            cell: Arc::new(ReadingCell::new(PitchReading::NONE)),
            passes: 0,
            config,
            layout,
            ring,
            analyzer,
            interp,
            hps,
        })
    }

    pub fn config(&self) -> &DetectorConfig {
        &self.config
    }

    pub fn layout(&self) -> &FrameLayout {
        &self.layout
    }

    /// The latest published reading.
    pub fn result(&self) -> PitchReading {
        self.published
    }

    /// A handle for reading results from another thread.
    pub fn reader(&self) -> ResultReader {
        ResultReader::new(Arc::clone(&self.cell))
    }

    pub fn lock_state(&self) -> LockState {
        self.stabilizer.state()
    }

    /// Number of analysis passes triggered so far, including aborted ones.
    pub fn analysis_passes(&self) -> u64 {
        self.passes
    }

    /// Returns to the freshly created state without reallocating.
    pub fn reset(&mut self) {
        self.ring.reset();
        self.stabilizer = NoteStabilizer::new(self.config.cents_smoothing);
        self.passes = 0;
        self.publish(PitchReading::NONE);
    }

    /// Feeds a chunk of mono PCM samples. An empty chunk is ignored.
    pub fn process(&mut self, samples: &[f32]) {
        if samples.is_empty() {
            return;
        }
        if self.ring.push(samples) {
            self.passes += 1;
            self.analyze();
        }
    }

    fn analyze(&mut self) {
        if mean_power(self.ring.window_iter()) < self.config.power_threshold {
            if self.stabilizer.state() != LockState::Silent {
                log::trace!("[DETECTOR] Signal below power threshold");
            }
            self.stabilizer.silence();
            self.publish(PitchReading::NONE);
            return;
        }

        let magnitudes = self.analyzer.analyze(self.ring.window_iter());
        let bin_width = self.layout.bin_width;
        cleaning::suppress_mains_hum(magnitudes, bin_width, self.config.mains_hum_cutoff);
        cleaning::gate_octave_bands(magnitudes, bin_width, self.config.noise_gate_fraction);

        if !hps::interpolate_normalized(magnitudes, &mut self.interp) {
            return;
        }
        let hps_len = hps::harmonic_product(&self.interp, &mut self.hps);
        let Some((peak_index, _)) = hps::peak(&self.hps[..hps_len]) else {
            return;
        };

        let frequency = peak_index as f32 * bin_width / HARMONIC_FACTOR as f32;
        if !(self.config.min_frequency..=self.config.max_frequency).contains(&frequency) {
            return;
        }
        let concert_pitch = self.config.concert_pitch;
        let Some(note) = tuning::frequency_to_midi(frequency, concert_pitch) else {
            return;
        };
        let cents = tuning::clamped_cents(frequency, note, concert_pitch);

        if let Some(smoothed_cents) = self.stabilizer.observe(note, cents) {
            self.publish(PitchReading {
                frequency,
                cents: smoothed_cents,
                midi: note as i32,
                confidence: 1.0,
                stability: 1.0,
            });
        }
    }

    fn publish(&mut self, reading: PitchReading) {
        self.published = reading;
        self.cell.store(&reading);
    }
}

impl Drop for PitchDetector {
    fn drop(&mut self) {
        self.cell.detach();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Six decaying partials, roughly what a plucked string delivers.
    fn string_tone(frequency: f64, rate: f64, len: usize) -> Vec<f32> {
        (0..len)
            .map(|i| {
                let t = i as f64 / rate;
                (1..=6)
                    .map(|h| 0.4 / h as f64 * (2.0 * std::f64::consts::PI * h as f64 * frequency * t).sin())
                    .sum::<f64>() as f32
            })
            .collect()
    }

    #[test]
    fn rejects_invalid_parameters() {
        assert!(matches!(
            PitchDetector::with_window(0, 48_000.0),
            Err(DetectorError::WindowTooSmall(0))
        ));
        assert!(matches!(
            PitchDetector::with_window(8192, 0.0),
            Err(DetectorError::InvalidSampleRate(_))
        ));
        assert!(PitchDetector::with_window(8192, -1.0).is_err());
    }

    #[test]
    fn starts_with_the_sentinel() {
        let detector = PitchDetector::with_window(1000, 48_000.0).unwrap();
        assert_eq!(detector.layout().window_len, 1024);
        assert_eq!(detector.result(), PitchReading::NONE);
        assert_eq!(detector.reader().get(), PitchReading::NONE);
        assert_eq!(detector.lock_state(), LockState::Silent);
    }

    #[test]
    fn empty_chunks_are_ignored() {
        let mut detector = PitchDetector::with_window(64, 48_000.0).unwrap();
        detector.process(&[]);
        assert_eq!(detector.analysis_passes(), 0);
    }

    #[test]
    fn one_pass_per_hop() {
        let mut detector = PitchDetector::with_window(1024, 48_000.0).unwrap();
        let signal = string_tone(440.0, 48_000.0, 1024 + 4 * 256);
        detector.process(&signal[..1024]);
        assert_eq!(detector.analysis_passes(), 1);
        for hop in signal[1024..].chunks(256) {
            detector.process(hop);
        }
        assert_eq!(detector.analysis_passes(), 5);
    }

    #[test]
    fn reader_tracks_published_results() {
        let rate = 48_000.0;
        let mut detector = PitchDetector::with_window(4096, rate as f32).unwrap();
        let reader = detector.reader();
        for chunk in string_tone(440.0, rate, 4096 * 4).chunks(512) {
            detector.process(chunk);
        }
        assert_eq!(detector.result().midi, 69);
        assert_eq!(reader.get(), detector.result());
    }

    #[test]
    fn empty_spectrum_keeps_the_previous_reading() {
        let rate = 48_000.0;
        let mut detector = PitchDetector::with_window(4096, rate as f32).unwrap();
        let reader = detector.reader();
        let tone = string_tone(440.0, rate, 4096 * 6);
        for chunk in tone[..4096 * 4].chunks(512) {
            detector.process(chunk);
        }
        let locked = detector.result();
        assert_eq!(locked.midi, 69);

        // Clear every bin so each further pass aborts before the peak search.
        detector.config.mains_hum_cutoff = rate as f32;
        let passes = detector.analysis_passes();
        for chunk in tone[4096 * 4..].chunks(512) {
            detector.process(chunk);
        }

        assert!(detector.analysis_passes() > passes);
        assert_eq!(detector.result(), locked);
        assert_eq!(reader.get(), locked);
        assert_eq!(detector.lock_state(), LockState::Locked { note: 69 });
    }

    #[test]
    fn reset_publishes_the_sentinel() {
        let rate = 48_000.0;
        let mut detector = PitchDetector::with_window(4096, rate as f32).unwrap();
        let reader = detector.reader();
        for chunk in string_tone(440.0, rate, 4096 * 4).chunks(512) {
            detector.process(chunk);
        }
        detector.reset();
        assert_eq!(detector.analysis_passes(), 0);
        assert_eq!(detector.lock_state(), LockState::Silent);
        assert_eq!(reader.get(), PitchReading::NONE);
    }

    #[test]
    fn dropping_the_detector_detaches_readers() {
        let detector = PitchDetector::with_window(256, 48_000.0).unwrap();
        let reader = detector.reader();
        let clone = reader.clone();
        assert!(reader.is_attached());
        assert!(clone.is_attached());
        drop(detector);
        assert!(!reader.is_attached());
        assert!(!clone.is_attached());
        assert_eq!(clone.get(), PitchReading::NONE);
    }
}
