//! Kaiser-windowed FIR low-pass filter
//!
//! Used as the receive post filter at 8 kHz. The design can be shifted in frequency by
//! modulating the coefficients with a cosine, turning the low-pass into a band-pass centred on
//! the offset.

use std::f64::consts::PI;

use super::{dot, History};

/// Upper bound on the estimated tap count
pub const MAX_TAPS: usize = 125;

/// Low-pass design parameters
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LowPassSpec {
    /// Forced tap count; estimated from the transition band when `None`
    pub taps: Option<usize>,
    /// Linear gain
    pub scale: f64,
    /// Stop-band attenuation in dB
    pub stop_db: f64,
    pub pass_hz: f64,
    pub stop_hz: f64,
    /// Frequency shift applied to the whole response
    pub offset_hz: f64,
    pub sample_rate: f64,
}

impl LowPassSpec {
    /// Receive post filter matched to the demodulator filter edges
    pub fn for_demod(low: i32, high: i32, offset: i32) -> Self {
        let mut fc = low.unsigned_abs().max(high.unsigned_abs()).min(3900) as f64;
        if fc < 100.0 {
            fc = 700.0;
        }
        Self {
            taps: None,
            scale: 1.0,
            stop_db: 50.0,
            pass_hz: fc,
            stop_hz: fc + 200.0,
            offset_hz: (offset as f64).abs(),
            sample_rate: 8000.0,
        }
    }
}

/// Single-channel FIR filter
#[derive(Debug, Clone)]
pub struct Fir {
    coefs: Vec<f32>,
    history: History,
}

impl Fir {
    /// Identity filter
    pub fn passthrough() -> Self {
        Self::from_coefficients(vec![1.0])
    }

    pub fn from_coefficients(coefs: Vec<f32>) -> Self {
        let history = History::new(coefs.len());
        Self { coefs, history }
    }

    /// Kaiser-Bessel windowed sinc design
    pub fn low_pass(spec: &LowPassSpec) -> Self {
        let norm_pass = spec.pass_hz / spec.sample_rate;
        let norm_stop = spec.stop_hz / spec.sample_rate;
        let norm_cut = (norm_pass + norm_stop) / 2.0;
        let norm_offset = 2.0 * PI * spec.offset_hz / spec.sample_rate;
        let beta = kaiser_beta(spec.stop_db);

        let estimate = (spec.stop_db - 8.0) / (2.285 * 2.0 * PI * (norm_stop - norm_pass)) + 1.0;
        let taps = spec
            .taps
            .unwrap_or_else(|| (estimate.max(0.0) as usize).clamp(3, MAX_TAPS))
            .max(1);

        let center = (taps as f64 - 1.0) / 2.0;
        let izb = bessel_i0(beta);
        let coefs = (0..taps)
            .map(|n| {
                let x = n as f64 - center;
                let sinc = if x == 0.0 {
                    2.0 * norm_cut
                } else {
                    (2.0 * PI * x * norm_cut).sin() / (PI * x)
                };
                let z = if center > 0.0 { x / center } else { 0.0 };
                let window = bessel_i0(beta * (1.0 - z * z).max(0.0).sqrt()) / izb;
                (spec.scale * sinc * window * (norm_offset * x).cos()) as f32
            })
            .collect();
        Self::from_coefficients(coefs)
    }

    pub fn taps(&self) -> usize {
        self.coefs.len()
    }

    pub fn coefficients(&self) -> &[f32] {
        &self.coefs
    }

    /// Filter in place
    pub fn process(&mut self, samples: &mut [f32]) {
        for s in samples.iter_mut() {
            self.history.push(*s);
            *s = dot(&self.coefs, self.history.window());
        }
    }

    /// Filter 16-bit samples in place, saturating the output
    pub fn process_i16(&mut self, samples: &mut [i16]) {
        for s in samples.iter_mut() {
            self.history.push(*s as f32);
            *s = dot(&self.coefs, self.history.window()) as i16;
        }
    }

    pub fn reset(&mut self) {
        self.history.clear();
    }
}

/// Window shape factor for the requested stop-band attenuation
fn kaiser_beta(stop_db: f64) -> f64 {
    if stop_db < 20.96 {
        0.0
    } else if stop_db >= 50.0 {
        0.1102 * (stop_db - 8.71)
    } else {
        0.5842 * (stop_db - 20.96).powf(0.4) + 0.07886 * (stop_db - 20.96)
    }
}

/// Modified Bessel function of the first kind, order zero
fn bessel_i0(x: f64) -> f64 {
    let half = x / 2.0;
    let mut sum = 1.0;
    let mut term = 1.0;
    let mut k = 1.0;
    loop {
        let t = half / k;
        term *= t * t;
        sum += term;
        k += 1.0;
        if term < 1e-9 * sum {
            return sum;
        }
    }
}
