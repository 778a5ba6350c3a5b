// pitch-dsp/src/lib.rs

//! Streaming pitch detection for instrument tuners.
//! This crate estimates the fundamental of a monophonic signal with a
//! harmonic product spectrum, locks onto notes with a small hysteresis
//! filter and publishes the result for a UI thread to poll. It is
//! completely headless and contains no display code.
//!
//! ```no_run
//! use pitch_dsp::PitchDetector;
//!
//! let mut detector = PitchDetector::with_window(8192, 48_000.0)?;
//! let reader = detector.reader();
//!
//! // Audio thread: feed whatever the callback delivers.
//! # let chunk = [0.0f32; 512];
//! detector.process(&chunk);
//!
//! // UI thread: poll at its own rate.
//! let reading = reader.get();
//! if let Some(name) = reading.note_name() {
//!     println!("{name} {:+.1} cents", reading.cents);
//! }
//! # Ok::<(), pitch_dsp::DetectorError>(())
//! ```

pub mod audio;
pub mod cleaning;
pub mod config;
pub mod detector;
pub mod error;
pub mod fft;
pub mod hps;
pub mod ring;
mod shared;
pub mod stability;
pub mod tuning;

use serde::{Deserialize, Serialize};

pub use config::{DetectorConfig, FrameLayout};
pub use detector::PitchDetector;
pub use error::DetectorError;
pub use shared::ResultReader;
pub use stability::LockState;

/// Snapshot of the latest stable pitch estimate.
///
/// Either a complete locked reading or the "no pitch" sentinel
/// ([`PitchReading::NONE`]); frequency and note are never valid on their own.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PitchReading {
    /// Detected fundamental in Hz, or -1 when there is no pitch.
    pub frequency: f32,
    /// Smoothed deviation from the nearest note, within ±50 cents.
    pub cents: f32,
    /// Nearest MIDI note number (0-127), or -1 when there is no pitch.
    pub midi: i32,
    /// 1.0 for a locked note, 0.0 otherwise.
    pub confidence: f32,
    /// 1.0 for a locked note, 0.0 otherwise.
    pub stability: f32,
}

impl PitchReading {
    /// The "no pitch" sentinel.
    pub const NONE: PitchReading = PitchReading {
        frequency: -1.0,
        cents: 0.0,
        midi: -1,
        confidence: 0.0,
        stability: 0.0,
    };

    pub fn is_pitched(&self) -> bool {
        self.midi >= 0 && self.frequency > 0.0
    }

    /// Display name of the detected note, e.g. "A4".
    pub fn note_name(&self) -> Option<&'static str> {
        u8::try_from(self.midi).ok().and_then(tuning::note_name)
    }
}

impl Default for PitchReading {
    fn default() -> Self {
        Self::NONE
    }
}
