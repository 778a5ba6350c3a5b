//! # Sample Ring Module
//!
//! Circular sample buffer that decides when an analysis pass is due.
//!
//! ## Features
//! - Fixed capacity of twice the analysis window, allocated once
//! - Oversized batches keep only their newest samples
//! - At most one analysis trigger per pushed batch, one hop apart

/// Fixed-capacity ring of the most recent input samples.
///
/// The capacity is twice the analysis window so a full window can always be
/// read back as (at most) two contiguous slices.
#[derive(Debug)]
pub struct SampleRing {
    buffer: Box<[f32]>,
    window_len: usize,
    hop_len: usize,
    write_pos: usize,
    // Saturates at capacity.
    valid: usize,
    since_analysis: usize,
}

impl SampleRing {
    /// Wraps a zeroed buffer whose length is the ring capacity.
    pub fn new(buffer: Box<[f32]>, window_len: usize, hop_len: usize) -> Self {
        debug_assert!(buffer.len() >= window_len);
        Self {
            buffer,
            window_len,
            hop_len,
            write_pos: 0,
            valid: 0,
            since_analysis: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.buffer.len()
    }

    /// Number of valid samples currently held.
    pub fn len(&self) -> usize {
        self.valid
    }

    pub fn is_empty(&self) -> bool {
        self.valid == 0
    }

    pub fn reset(&mut self) {
        self.buffer.fill(0.0);
        self.write_pos = 0;
        self.valid = 0;
        self.since_analysis = 0;
    }

    /// Appends a batch and reports whether an analysis pass is due.
    ///
    /// Only the last `capacity` samples of an oversized batch are stored, but
    /// the whole batch counts towards the hop. At most one pass is signalled
    /// per call, however many hops arrived.
    pub fn push(&mut self, samples: &[f32]) -> bool {
        let capacity = self.buffer.len();
        let kept = &samples[samples.len().saturating_sub(capacity)..];

        let mut rest = kept;
        while !rest.is_empty() {
            let run = rest.len().min(capacity - self.write_pos);
            self.buffer[self.write_pos..self.write_pos + run].copy_from_slice(&rest[..run]);
            self.write_pos = (self.write_pos + run) % capacity;
            rest = &rest[run..];
        }

        self.valid = (self.valid + kept.len()).min(capacity);
        self.since_analysis = self.since_analysis.saturating_add(samples.len());

        if self.valid < self.window_len || self.since_analysis < self.hop_len {
            return false;
        }
        self.since_analysis = 0;
        true
    }

    /// The most recent `window_len` samples, oldest first, as two slices.
    pub fn latest_window(&self) -> (&[f32], &[f32]) {
        let capacity = self.buffer.len();
        let start = (self.write_pos + capacity - self.window_len) % capacity;
        if start + self.window_len <= capacity {
            (&self.buffer[start..start + self.window_len], &[][..])
        } else {
            let head = &self.buffer[start..];
            let tail = &self.buffer[..self.window_len - head.len()];
            (head, tail)
        }
    }

    /// Iterator over the most recent window, oldest sample first.
    pub fn window_iter(&self) -> impl Iterator<Item = f32> + '_ {
        let (head, tail) = self.latest_window();
        head.iter().chain(tail).copied()
    }
}
