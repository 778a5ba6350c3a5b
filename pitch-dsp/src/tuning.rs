//! # Musical Tuning Module
//!
//! Equal-temperament conversions between frequencies, MIDI note numbers and
//! cent deviations, plus note naming for display layers.
//!
//! ## Features
//! - Nearest MIDI note for a frequency, relative to a configurable A4
//! - Cent deviation calculations, clamped to half a semitone
//! - Note names ("A4", "C#3") from a lazily built 128-note table

use once_cell::sync::Lazy;

/// MIDI note number of A4, the concert pitch reference.
pub const A4_MIDI: i32 = 69;

/// Largest deviation from the nearest note, in cents.
pub const MAX_CENTS: f32 = 50.0;

const NOTE_NAMES: [&str; 12] = [
    "C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B",
];

/// Display names for every MIDI note (0-127), e.g. "C-1" for note 0.
///
/// Built on first use. [`PitchDetector`](crate::PitchDetector) forces it at
/// creation so the audio thread never pays for the initialization.
pub(crate) static NOTE_TABLE: Lazy<Vec<String>> = Lazy::new(|| {
    (0..=127u8)
        .map(|midi| format!("{}{}", pitch_class(midi), octave(midi)))
        .collect()
});

/// Rounds a frequency to the nearest MIDI note.
///
/// # Returns
/// * `Some(note)` - Note number in 0..=127
/// * `None` - Non-positive frequency or a note outside the MIDI range
pub fn frequency_to_midi(freq: f32, concert_pitch: f32) -> Option<u8> {
    if !(freq > 0.0) {
        return None;
    }
    let midi = (A4_MIDI as f32 + 12.0 * (freq / concert_pitch).log2()).round();
    (0.0..=127.0).contains(&midi).then(|| midi as u8)
}

/// Exact equal-temperament frequency of a MIDI note.
pub fn midi_to_frequency(midi: u8, concert_pitch: f32) -> f32 {
    concert_pitch * 2.0_f32.powf((midi as i32 - A4_MIDI) as f32 / 12.0)
}

/// Calculates the deviation from a target frequency in cents.
///
/// Positive values are sharp, negative values flat. 100 cents is one
/// semitone.
pub fn cents_between(freq: f32, target_freq: f32) -> f32 {
    1200.0 * (freq / target_freq).log2()
}

/// Deviation of `freq` from `midi`'s exact frequency, clamped to ±50 cents.
pub fn clamped_cents(freq: f32, midi: u8, concert_pitch: f32) -> f32 {
    let target = midi_to_frequency(midi, concert_pitch);
    if !(freq > 0.0 && target > 0.0) {
        return 0.0;
    }
    cents_between(freq, target).clamp(-MAX_CENTS, MAX_CENTS)
}

/// Pitch class name ("C" through "B") of a MIDI note.
pub fn pitch_class(midi: u8) -> &'static str {
    NOTE_NAMES[midi as usize % 12]
}

/// Scientific-pitch octave of a MIDI note. Middle C (60) is octave 4.
pub fn octave(midi: u8) -> i32 {
    midi as i32 / 12 - 1
}

/// Display name of a MIDI note, e.g. "A4". `None` outside 0..=127.
pub fn note_name(midi: u8) -> Option<&'static str> {
    NOTE_TABLE.get(midi as usize).map(String::as_str)
}
