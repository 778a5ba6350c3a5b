//! # Note Stability Module
//!
//! Note locking with hysteresis and cents smoothing.
//!
//! A candidate note is only published once the last
//! [`NOTE_HISTORY_DEPTH`] analysis passes agree on it. While the same note
//! stays locked, its cents deviation is exponentially smoothed so the needle
//! of a tuner settles instead of jittering.

use crate::config::NOTE_HISTORY_DEPTH;

/// Where the note filter currently stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LockState {
    /// Nothing published: the detector is fresh or the input fell silent.
    #[default]
    Silent,
    /// Candidates are arriving but the history does not agree yet. Whatever
    /// was locked before stays published.
    Unstable,
    /// The history agrees on `note` and it was published by the last pass.
    Locked { note: u8 },
}

#[derive(Debug, Clone)]
pub struct NoteStabilizer {
    // Most recent first.
    history: [Option<u8>; NOTE_HISTORY_DEPTH],
    published: Option<u8>,
    smoothed_cents: f32,
    smoothing: f32,
    state: LockState,
}

impl NoteStabilizer {
    /// `smoothing` is the weight kept from the previous smoothed value.
    pub fn new(smoothing: f32) -> Self {
        Self {
            history: [None; NOTE_HISTORY_DEPTH],
            published: None,
            smoothed_cents: 0.0,
            smoothing,
            state: LockState::Silent,
        }
    }

    pub fn state(&self) -> LockState {
        self.state
    }

    /// Forgets the history and the smoothing, as after a silent window.
    pub fn silence(&mut self) {
        self.history = [None; NOTE_HISTORY_DEPTH];
        self.published = None;
        self.smoothed_cents = 0.0;
        self.state = LockState::Silent;
    }

    /// Records one pass's candidate.
    ///
    /// Returns the cents value to publish when the whole history agrees on
    /// `note`, or `None` when the previous reading should stay visible.
    pub fn observe(&mut self, note: u8, cents: f32) -> Option<f32> {
        self.history.rotate_right(1);
        self.history[0] = Some(note);

        if !self.history.iter().all(|&entry| entry == Some(note)) {
            self.state = LockState::Unstable;
            return None;
        }

        if self.published == Some(note) {
            self.smoothed_cents = self.smoothed_cents * self.smoothing + cents * (1.0 - self.smoothing);
        } else {
            log::trace!("[DETECTOR] Locked note {note}");
            self.smoothed_cents = cents;
        }
        self.published = Some(note);
        self.state = LockState::Locked { note };
        Some(self.smoothed_cents)
    }
}
