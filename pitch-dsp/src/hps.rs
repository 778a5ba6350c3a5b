//! # Harmonic Product Spectrum Module
//!
//! Upsamples the cleaned magnitude spectrum for sub-bin resolution, then
//! multiplies it by decimated copies of itself. A fundamental lines up with
//! its own harmonics in every copy, so its product dominates even when an
//! overtone is louder in the raw spectrum.

use crate::config::{HARMONIC_FACTOR, NORM_FLOOR};

/// Linearly upsamples `magnitudes` by [`HARMONIC_FACTOR`] into `interp` and
/// scales the result to unit L2 norm.
///
/// Output index `i` reads fractional bin `i / HARMONIC_FACTOR`; anything at or
/// past the last bin repeats it. Returns `false` (leaving `interp`
/// unnormalized) when the spectrum is effectively empty.
pub fn interpolate_normalized(magnitudes: &[f32], interp: &mut [f32]) -> bool {
    let Some(&last) = magnitudes.last() else {
        return false;
    };
    let last_index = magnitudes.len() - 1;

    for (i, value) in interp.iter_mut().enumerate() {
        let position = i as f32 / HARMONIC_FACTOR as f32;
        let lo = position as usize;
        *value = if lo >= last_index {
            last
        } else {
            let frac = position - lo as f32;
            magnitudes[lo] * (1.0 - frac) + magnitudes[lo + 1] * frac
        };
    }

    let norm = interp.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm < NORM_FLOOR {
        return false;
    }
    let inv_norm = 1.0 / norm;
    interp.iter_mut().for_each(|v| *v *= inv_norm);
    true
}

/// Builds the harmonic product spectrum of `spectrum` into `hps` and returns
/// the number of leading entries that remain meaningful.
///
/// Harmonic `h` (1 through [`HARMONIC_FACTOR`]) multiplies in every `h`-th
/// sample and shrinks the working length to the decimated length. The loop
/// stops early once a whole step leaves nothing but zeros.
pub fn harmonic_product(spectrum: &[f32], hps: &mut [f32]) -> usize {
    let len = spectrum.len();
    hps[..len].copy_from_slice(spectrum);
    let mut working_len = len;

    for factor in 1..=HARMONIC_FACTOR {
        let decimated_len = len.div_ceil(factor).min(working_len);
        let mut all_zero = true;
        for (i, value) in hps[..decimated_len].iter_mut().enumerate() {
            if let Some(&harmonic) = spectrum.get(i * factor) {
                *value *= harmonic;
            }
            if *value > 0.0 {
                all_zero = false;
            }
        }
        working_len = decimated_len;
        if all_zero {
            break;
        }
    }
    working_len
}

/// Index and value of the strongest positive entry. Ties go to the lowest
/// index.
pub fn peak(spectrum: &[f32]) -> Option<(usize, f32)> {
    let mut best = (0, 0.0f32);
    for (i, &value) in spectrum.iter().enumerate() {
        if value > best.1 {
            best = (i, value);
        }
    }
    (best.1 > 0.0).then_some(best)
}
