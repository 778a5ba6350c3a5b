//! # Detector Configuration Module
//!
//! User-facing configuration for the pitch detector plus the frame geometry
//! derived from it. The configuration is plain data: it can be built in code,
//! parsed from JSON, or loaded from a file, and is frozen once a detector is
//! created from it.
//!
//! ## Fixed constants
//! The harmonic factor, hop divisor, history depth and octave band edges are
//! part of the algorithm and are not configurable.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::error::DetectorError;

/// Smallest accepted analysis window, in samples.
pub const MIN_WINDOW_SIZE: usize = 64;

/// Interpolation factor of the magnitude spectrum. Also the number of
/// harmonics folded into the harmonic product spectrum.
pub const HARMONIC_FACTOR: usize = 5;

/// A new analysis pass runs every `window / HOP_DIVISOR` samples.
pub const HOP_DIVISOR: usize = 4;

/// Consecutive agreeing passes needed before a note is published.
pub const NOTE_HISTORY_DEPTH: usize = 2;

/// Edges of the octave bands used by the adaptive noise gate, in Hz.
pub const OCTAVE_BAND_EDGES: [f32; 10] = [
    50.0, 100.0, 200.0, 400.0, 800.0, 1600.0, 3200.0, 6400.0, 12800.0, 25600.0,
];

/// Below this L2 norm the cleaned spectrum is considered empty.
pub const NORM_FLOOR: f32 = 1e-10;

/// Configuration of a [`PitchDetector`](crate::PitchDetector).
///
/// Missing fields in a JSON document fall back to [`Default`], so
/// `{"window_size": 4096}` is a complete configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    /// Requested analysis window in samples. Rounded up to a power of two.
    pub window_size: usize,
    /// Sample rate of the incoming PCM stream in Hz.
    pub sample_rate: f32,
    /// Reference frequency of A4 (MIDI 69).
    pub concert_pitch: f32,
    /// Mean squared amplitude below which a window counts as silence.
    pub power_threshold: f32,
    /// Bins below this frequency are zeroed (mains hum).
    pub mains_hum_cutoff: f32,
    /// Bins weaker than this fraction of their octave band's RMS are zeroed.
    pub noise_gate_fraction: f32,
    /// Lowest plausible fundamental in Hz.
    pub min_frequency: f32,
    /// Highest plausible fundamental in Hz.
    pub max_frequency: f32,
    /// Weight kept from the previous smoothed cents value while a note stays
    /// locked. The new measurement gets `1 - cents_smoothing`.
    pub cents_smoothing: f32,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            window_size: 8192,
            sample_rate: 48_000.0,
            concert_pitch: 440.0,
            power_threshold: 1e-6,
            mains_hum_cutoff: 62.0,
            noise_gate_fraction: 0.2,
            min_frequency: 27.0,
            max_frequency: 4200.0,
            cents_smoothing: 0.7,
        }
    }
}

impl DetectorConfig {
    /// Default tuning parameters for the given window and sample rate.
    pub fn new(window_size: usize, sample_rate: f32) -> Self {
        Self {
            window_size,
            sample_rate,
            ..Self::default()
        }
    }

    /// Parses a JSON document. The result is not validated yet.
    pub fn from_json_str(json: &str) -> Result<Self, DetectorError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Reads and validates a JSON configuration file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)
            .with_context(|| format!("reading detector config {}", path.display()))?;
        let config = Self::from_json_str(&text)
            .with_context(|| format!("parsing detector config {}", path.display()))?;
        config.validate()?;
        log::info!(
            "[CONFIG] Loaded {}: window {} @ {} Hz",
            path.display(),
            config.window_size,
            config.sample_rate
        );
        Ok(config)
    }

    /// Checks every field against its accepted range.
    pub fn validate(&self) -> Result<(), DetectorError> {
        if self.window_size < MIN_WINDOW_SIZE {
            return Err(DetectorError::WindowTooSmall(self.window_size));
        }
        if self.window_size.checked_next_power_of_two().is_none() {
            return Err(DetectorError::invalid("window_size", "too large"));
        }
        if !(self.sample_rate.is_finite() && self.sample_rate > 0.0) {
            return Err(DetectorError::InvalidSampleRate(self.sample_rate));
        }
        if !(self.concert_pitch.is_finite() && self.concert_pitch > 0.0) {
            return Err(DetectorError::invalid("concert_pitch", "must be a positive frequency"));
        }
        if !(self.power_threshold >= 0.0) {
            return Err(DetectorError::invalid("power_threshold", "must not be negative"));
        }
        if !(self.mains_hum_cutoff >= 0.0) {
            return Err(DetectorError::invalid("mains_hum_cutoff", "must not be negative"));
        }
        if !(0.0..=1.0).contains(&self.noise_gate_fraction) {
            return Err(DetectorError::invalid("noise_gate_fraction", "must lie in [0, 1]"));
        }
        if !(self.min_frequency > 0.0 && self.min_frequency < self.max_frequency) {
            return Err(DetectorError::invalid(
                "min_frequency",
                format!(
                    "must be positive and below max_frequency ({})",
                    self.max_frequency
                ),
            ));
        }
        if !(0.0..1.0).contains(&self.cents_smoothing) {
            return Err(DetectorError::invalid("cents_smoothing", "must lie in [0, 1)"));
        }
        Ok(())
    }

    /// Validates the configuration and derives the frame geometry.
    pub fn layout(&self) -> Result<FrameLayout, DetectorError> {
        self.validate()?;
        let window_len = self.window_size.next_power_of_two();
        let half_len = window_len / 2;
        let too_large = || DetectorError::invalid("window_size", "too large");
        let ring_capacity = window_len.checked_mul(2).ok_or_else(too_large)?;
        let interp_len = half_len.checked_mul(HARMONIC_FACTOR).ok_or_else(too_large)?;
        Ok(FrameLayout {
            window_len,
            half_len,
            hop_len: (window_len / HOP_DIVISOR).max(1),
            ring_capacity,
            interp_len,
            bin_width: self.sample_rate / window_len as f32,
        })
    }
}

/// Buffer sizes and frequency resolution derived from a [`DetectorConfig`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameLayout {
    /// Analysis window, always a power of two.
    pub window_len: usize,
    /// Number of non-negative frequency bins kept from the transform.
    pub half_len: usize,
    /// New samples required between two analysis passes.
    pub hop_len: usize,
    /// Capacity of the circular sample buffer (twice the window).
    pub ring_capacity: usize,
    /// Length of the interpolated and harmonic product spectra.
    pub interp_len: usize,
    /// Width of one transform bin in Hz.
    pub bin_width: f32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn window_is_rounded_up_to_power_of_two() {
        for (requested, expected) in [(64, 64), (65, 128), (1000, 1024), (8192, 8192)] {
            let layout = DetectorConfig::new(requested, 48_000.0).layout().unwrap();
            assert_eq!(layout.window_len, expected);
            assert_eq!(layout.half_len, expected / 2);
            assert_eq!(layout.hop_len, expected / 4);
            assert_eq!(layout.ring_capacity, expected * 2);
            assert_eq!(layout.interp_len, expected / 2 * HARMONIC_FACTOR);
        }
    }

    #[test]
    fn bin_width_follows_rate_and_window() {
        let layout = DetectorConfig::new(4096, 44_100.0).layout().unwrap();
        assert!((layout.bin_width - 44_100.0 / 4096.0).abs() < 1e-6);
    }

    #[test]
    fn rejects_small_windows_and_bad_rates() {
        assert!(matches!(
            DetectorConfig::new(0, 48_000.0).validate(),
            Err(DetectorError::WindowTooSmall(0))
        ));
        assert!(matches!(
            DetectorConfig::new(63, 48_000.0).validate(),
            Err(DetectorError::WindowTooSmall(63))
        ));
        assert!(matches!(
            DetectorConfig::new(8192, 0.0).validate(),
            Err(DetectorError::InvalidSampleRate(_))
        ));
        assert!(matches!(
            DetectorConfig::new(8192, f32::NAN).validate(),
            Err(DetectorError::InvalidSampleRate(_))
        ));
    }

    #[test]
    fn rejects_windows_whose_buffers_overflow() {
        let top = 1usize << (usize::BITS - 1);
        for window in [usize::MAX, top, top / 2 + 1] {
            assert!(matches!(
                DetectorConfig::new(window, 48_000.0).layout(),
                Err(DetectorError::InvalidParameter { name: "window_size", .. })
            ));
        }
    }

    #[test]
    fn rejects_out_of_range_tuning_parameters() {
        let mut config = DetectorConfig::default();
        config.cents_smoothing = 1.0;
        assert!(matches!(
            config.validate(),
            Err(DetectorError::InvalidParameter { name: "cents_smoothing", .. })
        ));

        let mut config = DetectorConfig::default();
        config.min_frequency = 5000.0;
        assert!(config.validate().is_err());

        let mut config = DetectorConfig::default();
        config.noise_gate_fraction = -0.1;
        assert!(config.validate().is_err());
    }

    #[test]
    fn partial_json_uses_defaults() {
        let config = DetectorConfig::from_json_str(r#"{ "window_size": 4096, "concert_pitch": 442.0 }"#)
            .unwrap();
        assert_eq!(config.window_size, 4096);
        assert_eq!(config.concert_pitch, 442.0);
        assert_eq!(config.sample_rate, DetectorConfig::default().sample_rate);
        assert_eq!(config.cents_smoothing, 0.7);
    }

    #[test]
    fn malformed_json_is_a_config_error() {
        assert!(matches!(
            DetectorConfig::from_json_str("{ window_size: }"),
            Err(DetectorError::Config(_))
        ));
    }

    #[test]
    fn load_reports_missing_file() {
        let err = DetectorConfig::load("/nonexistent/pitch-dsp.json").unwrap_err();
        assert!(err.to_string().contains("reading detector config"));
    }
}
