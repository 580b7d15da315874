//! Bounded sample FIFO shared between the capture callback thread (writer)
//! and the listener thread (reader).
//!
//! Capacity is computed as `round(duration_secs * sample_rate * bytes_per_sample)`
//! samples — the factor deliberately includes `bytes_per_sample`, which makes
//! a nominal "1.2 s" buffer actually hold 2.4 s of 16-bit audio. This quirk is
//! preserved for behavioral parity rather than corrected (see DESIGN.md).

use std::collections::VecDeque;
use std::sync::Mutex;

pub struct RingBuffer {
    inner: Mutex<VecDeque<i16>>,
    capacity: usize,
}

impl RingBuffer {
    /// `bytes_per_sample` is the bit depth's byte width (2 for 16-bit PCM).
    pub fn with_duration(sample_rate: u32, bytes_per_sample: u32, duration_secs: f32) -> Self {
        let capacity =
            (duration_secs * sample_rate as f32 * bytes_per_sample as f32).round() as usize;
        Self {
            inner: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity,
        }
    }

    /// Appends `samples`, evicting from the head to stay within `capacity`.
    /// Called from the capture driver thread.
    pub fn extend(&self, samples: &[i16]) {
        let mut buf = self.inner.lock().expect("ring buffer mutex poisoned");
        for &sample in samples {
            if buf.len() >= self.capacity {
                buf.pop_front();
            }
            buf.push_back(sample);
        }
    }

    /// A contiguous, oldest-to-newest copy of the currently retained samples.
    /// Called from the listener thread; does not block the writer for long.
    pub fn snapshot(&self) -> Vec<i16> {
        let buf = self.inner.lock().expect("ring buffer mutex poisoned");
        buf.iter().copied().collect()
    }

    pub fn clear(&self) {
        let mut buf = self.inner.lock().expect("ring buffer mutex poisoned");
        buf.clear();
    }

    pub fn len(&self) -> usize {
        self.inner.lock().expect("ring buffer mutex poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_buffer() {
        let buf = RingBuffer::with_duration(16_000, 2, 1.2);
        assert_eq!(buf.len(), 0);
        assert!(buf.snapshot().is_empty());
    }

    #[test]
    fn test_bytes_equivalent_capacity_quirk() {
        // 1.2s keyword buffer at 16kHz/16-bit: capacity is sized in *bytes*
        // units applied to a sample count, doubling the nominal duration.
        let buf = RingBuffer::with_duration(16_000, 2, 1.2);
        assert_eq!(buf.capacity(), 38_400);
    }

    #[test]
    fn test_extend_and_snapshot() {
        let buf = RingBuffer::with_duration(16_000, 2, 5.0);
        let samples: Vec<i16> = (0..1000).collect();
        buf.extend(&samples);
        assert_eq!(buf.len(), 1000);
        let snapshot = buf.snapshot();
        assert_eq!(snapshot.len(), 1000);
        assert_eq!(snapshot[0], 0);
        assert_eq!(snapshot[999], 999);
    }

    #[test]
    fn test_overflow_evicts_oldest() {
        let buf = RingBuffer::with_duration(16_000, 2, 1.0); // capacity 32000
        let samples: Vec<i16> = (0..50_000).map(|i| (i % 30_000) as i16).collect();
        buf.extend(&samples);
        assert_eq!(buf.len(), buf.capacity());
        let snapshot = buf.snapshot();
        assert_eq!(snapshot.len(), 32_000);
        // the oldest retained sample is the 18000th pushed value
        assert_eq!(snapshot[0], (18_000i32 % 30_000) as i16);
    }

    #[test]
    fn test_clear_resets_len_and_snapshot() {
        let buf = RingBuffer::with_duration(16_000, 2, 1.0);
        buf.extend(&[1, 2, 3]);
        buf.clear();
        assert_eq!(buf.len(), 0);
        assert!(buf.snapshot().is_empty());
    }

    #[test]
    fn test_snapshot_never_exceeds_capacity() {
        let buf = RingBuffer::with_duration(16_000, 2, 0.5);
        let samples: Vec<i16> = vec![7; 100_000];
        buf.extend(&samples);
        assert!(buf.snapshot().len() <= buf.capacity());
    }
}
