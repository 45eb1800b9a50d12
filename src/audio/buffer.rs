//! Sample queues between the network context and the sound device
//!
//! [`PlaybackJitterBuffer`] absorbs arrival jitter and clock mismatch on the 48 kHz playback
//! side, [`CaptureQueue`] collects 8 kHz capture samples until a transmit packet is full.

use std::collections::VecDeque;

use tracing::{debug, info, warn};

/// Internal (codec) sample rate
pub const INTERNAL_RATE: u32 = 8000;

/// Sound device sample rate
pub const DEVICE_RATE: u32 = 48000;

/// Default playback queue size, half a second at the device rate
pub const JITTER_CAPACITY: usize = 24000;

/// Smoothing factor of the fill-level average
const LEVEL_ALPHA: f64 = 0.02;

/// Proportional gain of the drift estimate
const DRIFT_GAIN: f64 = 2e-6;

/// Delay before the first drift update once playback starts
const SETTLE_SECONDS: i64 = 5;

/// Capture queue size at the internal rate
pub const CAPTURE_CAPACITY: usize = 4000;

/// Block of mono 16-bit samples
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PcmBlock {
    pub samples: Vec<i16>,
    pub sample_rate: u32,
}

impl PcmBlock {
    pub fn new(samples: Vec<i16>, sample_rate: u32) -> Self {
        Self {
            samples,
            sample_rate,
        }
    }

    /// `count` zero samples
    pub fn silence(count: usize, sample_rate: u32) -> Self {
        Self::new(vec![0; count], sample_rate)
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Duration in microseconds
    pub fn duration_us(&self) -> u64 {
        if self.sample_rate == 0 {
            return 0;
        }
        self.samples.len() as u64 * 1_000_000 / self.sample_rate as u64
    }
}

/// Snapshot of the playback queue
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct JitterStats {
    pub level: usize,
    pub capacity: usize,
    /// Smoothed fill level
    pub average: f64,
    /// Clock drift estimate in ppm; positive means the queue is filling
    pub drift_ppm: i32,
    pub overruns: u64,
    pub underruns: u64,
    pub started: bool,
}

/// Playback ring buffer with fill-level based over/underflow recovery
#[derive(Debug)]
pub struct PlaybackJitterBuffer {
    buf: Vec<f32>,
    head: usize,
    tail: usize,
    level: usize,
    average: f64,
    started: bool,
    rate_update_count: i64,
    drift_ppm: i32,
    overruns: u64,
    underruns: u64,
}

impl PlaybackJitterBuffer {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(2);
        Self {
            buf: vec![0.0; capacity],
            head: 0,
            tail: 0,
            level: 0,
            average: 0.0,
            started: false,
            rate_update_count: 0,
            drift_ppm: 0,
            overruns: 0,
            underruns: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.buf.len()
    }

    pub fn level(&self) -> usize {
        self.level
    }

    pub fn is_started(&self) -> bool {
        self.started
    }

    /// Queue device-rate samples.
    ///
    /// When the write catches up with the read position, half the queue is skipped and the
    /// rest of `samples` is dropped.
    pub fn put(&mut self, samples: &[f32]) {
        let capacity = self.capacity();
        let half = capacity / 2;
        for &s in samples {
            self.buf[self.head] = s;
            self.head = (self.head + 1) % capacity;
            self.level += 1;
            if self.head == self.tail {
                // skipping `half` leaves `capacity - half` queued, which differs for odd sizes
                self.tail = (self.tail + half) % capacity;
                self.level = capacity - half;
                self.average = self.level as f64;
                self.overruns += 1;
                warn!("Playback queue overflow, skipped {} samples", half);
                break;
            }
        }
        self.update_average();
    }

    /// Fill `out` completely.
    ///
    /// Silence is produced until the queue is more than half full for the first time. An empty
    /// queue rewinds the read position by half the queue and the rest of `out` is silence.
    pub fn pull(&mut self, out: &mut [f32]) {
        let capacity = self.capacity();
        let half = capacity / 2;

        if !self.started {
            out.fill(0.0);
            if self.level > half {
                self.started = true;
                self.rate_update_count = -SETTLE_SECONDS * DEVICE_RATE as i64;
                self.drift_ppm = 0;
                self.average = self.level as f64;
                info!("Playback started at queue level {}", self.level);
            }
            return;
        }

        for i in 0..out.len() {
            if self.level == 0 {
                // back by `half`, so exactly `half` samples are queued again
                self.tail = (self.tail + capacity - half) % capacity;
                self.level = half;
                self.average = half as f64;
                self.underruns += 1;
                out[i..].fill(0.0);
                warn!("Playback queue underflow");
                break;
            }
            out[i] = self.buf[self.tail];
            self.tail = (self.tail + 1) % capacity;
            self.level -= 1;
        }
        self.update_average();

        self.rate_update_count += out.len() as i64;
        if self.rate_update_count >= DEVICE_RATE as i64 {
            self.rate_update_count = 0;
            let error = (self.average - half as f64) * DRIFT_GAIN;
            self.drift_ppm = (error * 1e6) as i32;
            debug!(
                "Playback drift {} ppm at average level {:.0}",
                self.drift_ppm, self.average
            );
        }
    }

    /// Back to the empty, not-started state
    pub fn reset(&mut self) {
        self.buf.fill(0.0);
        self.head = 0;
        self.tail = 0;
        self.level = 0;
        self.average = 0.0;
        self.started = false;
        self.rate_update_count = 0;
        self.drift_ppm = 0;
    }

    pub fn stats(&self) -> JitterStats {
        JitterStats {
            level: self.level,
            capacity: self.capacity(),
            average: self.average,
            drift_ppm: self.drift_ppm,
            overruns: self.overruns,
            underruns: self.underruns,
            started: self.started,
        }
    }

    fn update_average(&mut self) {
        self.average = (1.0 - LEVEL_ALPHA) * self.average + LEVEL_ALPHA * self.level as f64;
    }
}

/// Bounded 8 kHz capture queue with peak metering
#[derive(Debug)]
pub struct CaptureQueue {
    samples: VecDeque<i16>,
    capacity: usize,
    peak: i32,
    overflows: u64,
}

impl CaptureQueue {
    pub fn new(capacity: usize) -> Self {
        Self {
            samples: VecDeque::with_capacity(capacity),
            capacity,
            peak: 0,
            overflows: 0,
        }
    }

    /// Append a block if it fits entirely; otherwise the block is dropped
    pub fn put(&mut self, block: &[i16]) -> bool {
        if self.samples.len() + block.len() > self.capacity {
            self.overflows += 1;
            warn!(
                "Capture queue overflow, dropped {} samples ({} queued)",
                block.len(),
                self.samples.len()
            );
            return false;
        }
        for &s in block {
            self.peak = self.peak.max((s as i32).abs());
        }
        self.samples.extend(block.iter().copied());
        true
    }

    /// Remove `n` samples into `out`. With fewer than `n` queued, `out` receives `n` zeros and
    /// nothing is consumed.
    pub fn get(&mut self, n: usize, out: &mut Vec<i16>) {
        if self.samples.len() < n {
            out.extend(std::iter::repeat(0).take(n));
            return;
        }
        out.extend(self.samples.drain(..n));
    }

    pub fn available(&self) -> usize {
        self.samples.len()
    }

    pub fn overflows(&self) -> u64 {
        self.overflows
    }

    /// Peak level since the last call in dB×10 relative to full scale; clears the peak
    pub fn input_level(&mut self) -> i16 {
        let db = 200.0 * (3.16e-5 + self.peak as f64 / 32767.0).log10();
        self.peak = 0;
        db as i16
    }

    pub fn clear(&mut self) {
        self.samples.clear();
        self.peak = 0;
    }
}

impl Default for CaptureQueue {
    fn default() -> Self {
        Self::new(CAPTURE_CAPACITY)
    }
}
