//! Sample-domain signal processing: the fixed 8/48 kHz rate converter and the FIR post filter

pub mod fir;
pub mod resample;

pub use fir::{Fir, LowPassSpec};
pub use resample::{Decimator, Interpolator};

/// Doubled circular history: every sample is stored twice so the last `len` samples are always
/// one contiguous slice, newest first.
#[derive(Debug, Clone)]
pub(crate) struct History {
    buf: Vec<f32>,
    len: usize,
    pos: usize,
}

impl History {
    pub(crate) fn new(len: usize) -> Self {
        let len = len.max(1);
        Self {
            buf: vec![0.0; 2 * len],
            len,
            pos: 0,
        }
    }

    pub(crate) fn push(&mut self, x: f32) {
        self.pos = if self.pos == 0 { self.len - 1 } else { self.pos - 1 };
        self.buf[self.pos] = x;
        self.buf[self.pos + self.len] = x;
    }

    pub(crate) fn window(&self) -> &[f32] {
        &self.buf[self.pos..self.pos + self.len]
    }

    pub(crate) fn clear(&mut self) {
        self.buf.iter_mut().for_each(|v| *v = 0.0);
        self.pos = 0;
    }
}

pub(crate) fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_history_window_newest_first() {
        let mut h = History::new(3);
        for x in [1.0, 2.0, 3.0, 4.0] {
            h.push(x);
        }
        assert_eq!(h.window(), &[4.0, 3.0, 2.0]);
        h.clear();
        assert_eq!(h.window(), &[0.0, 0.0, 0.0]);
    }
}
