//! # Error Module
//!
//! Failures that can occur while building a detector. Processing itself never
//! fails: silence, noise and implausible peaks are absorbed by the pipeline and
//! simply leave the last published reading in place.

use std::collections::TryReserveError;
use thiserror::Error;

use crate::config::MIN_WINDOW_SIZE;

/// Errors returned when creating a [`PitchDetector`](crate::PitchDetector)
/// or parsing a [`DetectorConfig`](crate::DetectorConfig).
#[derive(Debug, Error)]
pub enum DetectorError {
    /// The requested analysis window is below the supported minimum.
    #[error("analysis window of {0} samples is below the {} sample minimum", MIN_WINDOW_SIZE)]
    WindowTooSmall(usize),

    /// The sample rate was zero, negative or not finite.
    #[error("sample rate must be positive and finite, got {0}")]
    InvalidSampleRate(f32),

    /// Any other tuning parameter is out of its valid range.
    #[error("invalid {name}: {reason}")]
    InvalidParameter {
        /// Name of the offending config field.
        name: &'static str,
        /// Human readable description of the accepted range.
        reason: String,
    },

    /// One of the fixed-size analysis buffers could not be reserved.
    #[error("failed to allocate the {buffer} buffer")]
    Allocation {
        buffer: &'static str,
        #[source]
        source: TryReserveError,
    },

    /// A JSON configuration document could not be parsed.
    #[error("malformed detector configuration: {0}")]
    Config(#[from] serde_json::Error),
}

impl DetectorError {
    pub(crate) fn invalid(name: &'static str, reason: impl Into<String>) -> Self {
        DetectorError::InvalidParameter {
            name,
            reason: reason.into(),
        }
    }
}

/// Allocates a boxed slice of `len` copies of `value`, reporting allocation
/// failure instead of aborting.
pub(crate) fn try_filled<T: Clone>(
    len: usize,
    value: T,
    buffer: &'static str,
) -> Result<Box<[T]>, DetectorError> {
    let mut storage = Vec::new();
    storage
        .try_reserve_exact(len)
        .map_err(|source| DetectorError::Allocation { buffer, source })?;
    storage.resize(len, value);
    Ok(storage.into_boxed_slice())
}
