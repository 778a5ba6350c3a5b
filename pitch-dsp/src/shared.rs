//! # Result Publication Module
//!
//! Lock-free publication of the latest reading from the audio thread to any
//! number of reader threads.
//!
//! The cell is a sequence lock over plain atomics: the single writer bumps the
//! sequence to an odd value, stores the fields and bumps it back to even.
//! Readers retry until they see the same even sequence before and after
//! copying the fields, so they never observe a half-written reading and the
//! writer never waits for them.

use std::hint;
use std::sync::atomic::{fence, AtomicBool, AtomicI32, AtomicU32, Ordering};
use std::sync::Arc;

use crate::PitchReading;

#[derive(Debug)]
pub(crate) struct ReadingCell {
    sequence: AtomicU32,
    frequency_bits: AtomicU32,
    cents_bits: AtomicU32,
    midi: AtomicI32,
    confidence_bits: AtomicU32,
    stability_bits: AtomicU32,
    // Cleared when the owning detector is dropped.
    attached: AtomicBool,
}

impl ReadingCell {
    pub(crate) fn new(reading: PitchReading) -> Self {
        Self {
            sequence: AtomicU32::new(0),
            frequency_bits: AtomicU32::new(reading.frequency.to_bits()),
            cents_bits: AtomicU32::new(reading.cents.to_bits()),
            midi: AtomicI32::new(reading.midi),
            confidence_bits: AtomicU32::new(reading.confidence.to_bits()),
            stability_bits: AtomicU32::new(reading.stability.to_bits()),
            attached: AtomicBool::new(true),
        }
    }

    /// Marks the writer as gone. Readers keep the last published reading.
    pub(crate) fn detach(&self) {
        self.attached.store(false, Ordering::Release);
    }

    pub(crate) fn is_attached(&self) -> bool {
        self.attached.load(Ordering::Acquire)
    }

    /// Publishes a new reading. Must only be called from one thread at a time.
    pub(crate) fn store(&self, reading: &PitchReading) {
        let seq = self.sequence.load(Ordering::Relaxed);
        self.sequence.store(seq.wrapping_add(1), Ordering::Relaxed);
        fence(Ordering::Release);

        self.frequency_bits.store(reading.frequency.to_bits(), Ordering::Relaxed);
        self.cents_bits.store(reading.cents.to_bits(), Ordering::Relaxed);
        self.midi.store(reading.midi, Ordering::Relaxed);
        self.confidence_bits.store(reading.confidence.to_bits(), Ordering::Relaxed);
        self.stability_bits.store(reading.stability.to_bits(), Ordering::Relaxed);

        self.sequence.store(seq.wrapping_add(2), Ordering::Release);
    }

    pub(crate) fn load(&self) -> PitchReading {
        loop {
            let before = self.sequence.load(Ordering::Acquire);
            if before & 1 == 1 {
                hint::spin_loop();
                continue;
            }

            let reading = PitchReading {
                frequency: f32::from_bits(self.frequency_bits.load(Ordering::Relaxed)),
                cents: f32::from_bits(self.cents_bits.load(Ordering::Relaxed)),
                midi: self.midi.load(Ordering::Relaxed),
                confidence: f32::from_bits(self.confidence_bits.load(Ordering::Relaxed)),
                stability: f32::from_bits(self.stability_bits.load(Ordering::Relaxed)),
            };

            fence(Ordering::Acquire);
            if self.sequence.load(Ordering::Relaxed) == before {
                return reading;
            }
            hint::spin_loop();
        }
    }
}

/// Read-only handle to a detector's latest published reading.
///
/// Cheap to clone and safe to move to a UI or logging thread. Reading never
/// blocks the detector.
#[derive(Debug, Clone)]
pub struct ResultReader {
    cell: Option<Arc<ReadingCell>>,
}

impl ResultReader {
    pub(crate) fn new(cell: Arc<ReadingCell>) -> Self {
        Self { cell: Some(cell) }
    }

    /// A reader not attached to any detector. Always reports
    /// [`PitchReading::NONE`].
    pub fn detached() -> Self {
        Self { cell: None }
    }

    /// Copies out the latest published reading.
    pub fn get(&self) -> PitchReading {
        self.cell
            .as_ref()
            .map_or(PitchReading::NONE, |cell| cell.load())
    }

    /// Whether the detector behind this reader still exists.
    pub fn is_attached(&self) -> bool {
        self.cell
            .as_ref()
            .is_some_and(|cell| cell.is_attached())
    }
}

impl Default for ResultReader {
    fn default() -> Self {
        Self::detached()
    }
}
