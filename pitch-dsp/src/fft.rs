//! # Fast Fourier Transform (FFT) Module
//!
//! This module turns one analysis window of raw samples into a magnitude
//! spectrum. It owns every buffer the transform needs, so repeated calls on
//! the audio thread never allocate.
//!
//! ## Features
//! - High-performance FFT using RustFFT, planned once per detector
//! - Precomputed Hann window for reduced spectral leakage
//! - Magnitudes of the non-negative frequency bins only

use std::sync::Arc;

use rustfft::{num_complex::Complex, Fft, FftPlanner};

use crate::config::FrameLayout;
use crate::error::{try_filled, DetectorError};

/// Computes the symmetric Hann window `0.5 * (1 - cos(2πi / (N - 1)))`.
///
/// The window tapers the signal to zero at both edges, which keeps a pure
/// tone's energy close to its own bin.
pub fn hann_window(window: &mut [f32]) {
    let n = window.len();
    if n < 2 {
        window.fill(1.0);
        return;
    }
    let n_minus_1 = (n - 1) as f32;
    for (i, coefficient) in window.iter_mut().enumerate() {
        *coefficient = 0.5 * (1.0 - (2.0 * std::f32::consts::PI * i as f32 / n_minus_1).cos());
    }
}

/// Mean squared amplitude of a block of raw samples.
pub fn mean_power(samples: impl Iterator<Item = f32>) -> f32 {
    let (sum, count) = samples.fold((0.0f32, 0usize), |(sum, count), s| (sum + s * s, count + 1));
    if count == 0 { 0.0 } else { sum / count as f32 }
}

/// Windowed forward transform with preallocated working memory.
pub struct SpectrumAnalyzer {
    fft: Arc<dyn Fft<f32>>,
    window: Box<[f32]>,
    buffer: Box<[Complex<f32>]>,
    scratch: Box<[Complex<f32>]>,
    magnitudes: Box<[f32]>,
}

impl SpectrumAnalyzer {
    /// Plans the transform and allocates the window, transform and magnitude
    /// buffers for `layout`.
    pub fn new(layout: &FrameLayout) -> Result<Self, DetectorError> {
        let mut planner = FftPlanner::new();
        let fft = planner.plan_fft_forward(layout.window_len);

        let mut window = try_filled(layout.window_len, 0.0, "window coefficient")?;
        hann_window(&mut window);

        let zero = Complex { re: 0.0, im: 0.0 };
        Ok(Self {
            buffer: try_filled(layout.window_len, zero, "transform")?,
            scratch: try_filled(fft.get_inplace_scratch_len(), zero, "transform scratch")?,
            magnitudes: try_filled(layout.half_len, 0.0, "magnitude spectrum")?,
            window,
            fft,
        })
    }

    /// Windows `samples` (exactly one analysis window, oldest first), runs
    /// the forward FFT and returns the magnitude of every non-negative
    /// frequency bin.
    pub fn analyze(&mut self, samples: impl Iterator<Item = f32>) -> &mut [f32] {
        for ((slot, sample), coefficient) in self.buffer.iter_mut().zip(samples).zip(self.window.iter()) {
            *slot = Complex { re: sample * coefficient, im: 0.0 };
        }

        self.fft.process_with_scratch(&mut self.buffer, &mut self.scratch);

        for (magnitude, bin) in self.magnitudes.iter_mut().zip(self.buffer.iter()) {
            *magnitude = bin.norm(); // sqrt(re^2 + im^2)
        }
        &mut self.magnitudes
    }
}
