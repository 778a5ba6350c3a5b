//! # Spectrum Cleaning Module
//!
//! Noise suppression applied to the raw magnitude spectrum before it is
//! normalized: a hard low cut for mains hum followed by a per-octave
//! adaptive gate that removes the broadband floor around real partials.

use crate::config::OCTAVE_BAND_EDGES;

/// Zeroes every bin whose index is below `cutoff_hz / bin_width`.
pub fn suppress_mains_hum(magnitudes: &mut [f32], bin_width: f32, cutoff_hz: f32) {
    let cutoff = ((cutoff_hz / bin_width) as usize).min(magnitudes.len());
    magnitudes[..cutoff].fill(0.0);
}

/// Zeroes bins weaker than `fraction` times the RMS magnitude of their
/// octave band.
///
/// Each band's threshold is computed before any of its bins are touched, and
/// bands never share bins, so the order of processing does not matter.
pub fn gate_octave_bands(magnitudes: &mut [f32], bin_width: f32, fraction: f32) {
    for edges in OCTAVE_BAND_EDGES.windows(2) {
        let start = ((edges[0] / bin_width) as usize).min(magnitudes.len());
        let end = ((edges[1] / bin_width) as usize).min(magnitudes.len());
        if end <= start + 1 {
            continue;
        }

        let band = &mut magnitudes[start..end];
        let rms = (band.iter().map(|m| m * m).sum::<f32>() / band.len() as f32).sqrt();
        let threshold = fraction * rms;
        for magnitude in band.iter_mut().filter(|m| **m < threshold) {
            *magnitude = 0.0;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hum_cutoff_floors_the_bin_index() {
        // 10 Hz bins: 62 Hz -> bins 0..6 are cleared.
        let mut magnitudes = vec![1.0; 32];
        suppress_mains_hum(&mut magnitudes, 10.0, 62.0);
        assert!(magnitudes[..6].iter().all(|&m| m == 0.0));
        assert!(magnitudes[6..].iter().all(|&m| m == 1.0));
    }

    #[test]
    fn hum_cutoff_is_clamped_to_the_spectrum() {
        let mut magnitudes = vec![1.0; 4];
        suppress_mains_hum(&mut magnitudes, 10.0, 1000.0);
        assert!(magnitudes.iter().all(|&m| m == 0.0));
    }

    #[test]
    fn gate_keeps_peaks_and_drops_the_floor() {
        // 10 Hz bins: the 400-800 Hz band spans bins 40..80.
        let mut magnitudes = vec![0.01; 200];
        magnitudes[60] = 10.0;
        gate_octave_bands(&mut magnitudes, 10.0, 0.2);
        assert_eq!(magnitudes[60], 10.0);
        assert!(magnitudes[40..60].iter().all(|&m| m == 0.0));
        assert!(magnitudes[61..80].iter().all(|&m| m == 0.0));
    }

    #[test]
    fn flat_band_survives_the_gate() {
        let mut magnitudes = vec![0.5; 200];
        gate_octave_bands(&mut magnitudes, 10.0, 0.2);
        assert!(magnitudes.iter().all(|&m| m == 0.5));
    }

    #[test]
    fn bands_do_not_share_thresholds() {
        // A loud partial in 100-200 Hz (bins 10..20) must not gate the
        // quieter but flat 200-400 Hz band (bins 20..40).
        let mut magnitudes = vec![0.0; 200];
        magnitudes[15] = 100.0;
        magnitudes[20..40].fill(0.1);
        gate_octave_bands(&mut magnitudes, 10.0, 0.2);
        assert_eq!(magnitudes[15], 100.0);
        assert!(magnitudes[20..40].iter().all(|&m| m == 0.1));
    }

    #[test]
    fn single_bin_bands_are_skipped() {
        // 40 Hz bins: 50-100 Hz is bins 1..2, a single bin.
        let mut magnitudes = vec![0.0; 64];
        magnitudes[1] = 0.001;
        magnitudes[2..].fill(1.0);
        gate_octave_bands(&mut magnitudes, 40.0, 0.2);
        assert_eq!(magnitudes[1], 0.001);
    }
}
