//! Fixed-ratio 8 kHz <-> 48 kHz conversion
//!
//! Not a general resampler: playback interpolates ×2 then ×3, capture decimates ÷2 then ÷3.
//! Every stage keeps its history twice over in one buffer so the dot product is always a single
//! contiguous slice, newest sample first.

use super::{dot, History};

/// ×2 interpolation filter, first half (symmetric, 38 taps, gain 2)
const INTERP2_HALF: [f32; 19] = [
    0.004595199062,
    0.003263078569,
    -0.012307513857,
    -0.023605770514,
    -0.004776493194,
    0.020455597889,
    0.003416955875,
    -0.032096849071,
    -0.010936520267,
    0.043997619201,
    0.021109718259,
    -0.061591694157,
    -0.038850736238,
    0.088428267617,
    0.071893731289,
    -0.140300185169,
    -0.155068799286,
    0.316698335862,
    0.879226589556,
];

/// ×3 interpolation filter, first half (symmetric, 24 taps, gain 3)
const INTERP3_HALF: [f32; 12] = [
    0.011573982735,
    0.014334218226,
    0.006363947118,
    -0.021096865220,
    -0.062826223097,
    -0.096581775049,
    -0.088551387570,
    -0.009298026286,
    0.146903362727,
    0.350809254265,
    0.544080700435,
    0.661916011265,
];

/// ÷2 half-band filter, first half up to and including the centre tap (23 taps)
const DECIM2_HALF: [f32; 12] = [
    -0.00014987651418332164,
    0.0,
    0.0014748633283609852,
    0.0,
    -0.0074416944990005314,
    0.0,
    0.026163522731980929,
    0.0,
    -0.077593699116544707,
    0.0,
    0.30754683719791986,
    0.5,
];

/// ÷3 filter, first half up to and including the centre tap (63 taps, 3.5 kHz pass band at
/// 24 kHz)
const DECIM3_HALF: [f32; 32] = [
    -0.000122089672,
    0.000756870819,
    0.002723170921,
    0.005253908351,
    0.006498627630,
    0.004642639462,
    -0.000127922266,
    -0.004816317633,
    -0.005459270973,
    -0.000749873754,
    0.005791180122,
    0.007947782646,
    0.002401758772,
    -0.007062842708,
    -0.011594604118,
    -0.005173923318,
    0.008331932993,
    0.016607547268,
    0.009560094412,
    -0.009513394530,
    -0.023769125601,
    -0.016708360339,
    0.010511004278,
    0.035111757024,
    0.029654555288,
    -0.011273660216,
    -0.057805247862,
    -0.060635313789,
    0.011753658267,
    0.142509501597,
    0.269092683398,
    0.321418881518,
];

/// Even-length symmetric filter from its first half
fn mirror_even(half: &[f32]) -> Vec<f32> {
    half.iter().chain(half.iter().rev()).copied().collect()
}

/// Odd-length symmetric filter from its first half, centre tap last
fn mirror_odd(half: &[f32]) -> Vec<f32> {
    let head = &half[..half.len().saturating_sub(1)];
    half.iter().chain(head.iter().rev()).copied().collect()
}

/// Polyphase interpolation by an integer factor
#[derive(Debug, Clone)]
struct InterpStage {
    /// `phases[p][k] = h[p + k * factor]`
    phases: Vec<Vec<f32>>,
    history: History,
}

impl InterpStage {
    fn new(taps: &[f32], factor: usize) -> Self {
        let per_phase = taps.len() / factor;
        let phases = (0..factor)
            .map(|p| (0..per_phase).map(|k| taps[p + k * factor]).collect())
            .collect();
        Self {
            phases,
            history: History::new(per_phase),
        }
    }

    fn process(&mut self, input: &[f32], out: &mut Vec<f32>) {
        out.reserve(input.len() * self.phases.len());
        for &x in input {
            self.history.push(x);
            let window = self.history.window();
            out.extend(self.phases.iter().map(|phase| dot(phase, window)));
        }
    }
}

/// FIR decimation by an integer factor; one output per `factor` inputs
#[derive(Debug, Clone)]
struct DecimStage {
    taps: Vec<f32>,
    factor: usize,
    phase: usize,
    history: History,
}

impl DecimStage {
    fn new(taps: Vec<f32>, factor: usize) -> Self {
        let len = taps.len();
        Self {
            taps,
            factor,
            phase: 0,
            history: History::new(len),
        }
    }

    fn process(&mut self, input: &[f32], out: &mut Vec<f32>) {
        out.reserve(input.len() / self.factor + 1);
        for &x in input {
            self.history.push(x);
            self.phase += 1;
            if self.phase == self.factor {
                self.phase = 0;
                out.push(dot(&self.taps, self.history.window()));
            }
        }
    }

    fn reset(&mut self) {
        self.history.clear();
        self.phase = 0;
    }
}

/// 8 kHz -> 48 kHz
#[derive(Debug, Clone)]
pub struct Interpolator {
    x2: InterpStage,
    x3: InterpStage,
    scratch: Vec<f32>,
}

impl Interpolator {
    pub fn x6() -> Self {
        Self {
            x2: InterpStage::new(&mirror_even(&INTERP2_HALF), 2),
            x3: InterpStage::new(&mirror_even(&INTERP3_HALF), 3),
            scratch: Vec::new(),
        }
    }

    /// Append exactly `6 * input.len()` samples to `out`
    pub fn process(&mut self, input: &[f32], out: &mut Vec<f32>) {
        self.scratch.clear();
        self.x2.process(input, &mut self.scratch);
        self.x3.process(&self.scratch, out);
    }

    pub fn reset(&mut self) {
        self.x2.history.clear();
        self.x3.history.clear();
    }
}

/// 48 kHz -> 8 kHz
#[derive(Debug, Clone)]
pub struct Decimator {
    by2: DecimStage,
    by3: DecimStage,
    scratch: Vec<f32>,
}

impl Decimator {
    pub fn by6() -> Self {
        Self {
            by2: DecimStage::new(mirror_odd(&DECIM2_HALF), 2),
            by3: DecimStage::new(mirror_odd(&DECIM3_HALF), 3),
            scratch: Vec::new(),
        }
    }

    /// Append one sample per six inputs to `out`; the phase carries across calls
    pub fn process(&mut self, input: &[f32], out: &mut Vec<f32>) {
        self.scratch.clear();
        self.by2.process(input, &mut self.scratch);
        self.by3.process(&self.scratch, out);
    }

    pub fn reset(&mut self) {
        self.by2.reset();
        self.by3.reset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::PI;

    fn tone(freq: f64, rate: f64, amp: f64, n: usize) -> Vec<f32> {
        (0..n)
            .map(|i| (amp * (2.0 * PI * freq * i as f64 / rate).sin()) as f32)
            .collect()
    }

    /// Amplitude of the `freq` component
    fn amplitude(y: &[f32], freq: f64, rate: f64) -> f64 {
        let (re, im) = y.iter().enumerate().fold((0.0, 0.0), |(re, im), (i, &v)| {
            let w = 2.0 * PI * freq * i as f64 / rate;
            (re + v as f64 * w.cos(), im + v as f64 * w.sin())
        });
        2.0 * re.hypot(im) / y.len() as f64
    }

    fn rms(y: &[f32]) -> f64 {
        (y.iter().map(|&v| (v as f64).powi(2)).sum::<f64>() / y.len() as f64).sqrt()
    }

    #[test]
    fn test_filter_lengths() {
        assert_eq!(mirror_even(&INTERP2_HALF).len(), 38);
        assert_eq!(mirror_even(&INTERP3_HALF).len(), 24);
        assert_eq!(mirror_odd(&DECIM2_HALF).len(), 23);
        assert_eq!(mirror_odd(&DECIM3_HALF).len(), 63);
    }

    #[test]
    fn test_interpolator_output_count() {
        let mut up = Interpolator::x6();
        let mut out = Vec::new();
        up.process(&[0.0; 160], &mut out);
        assert_eq!(out.len(), 960);
        up.process(&[0.0; 1], &mut out);
        assert_eq!(out.len(), 966);
    }

    #[test]
    fn test_interpolator_dc_gain() {
        let mut out = Vec::new();
        Interpolator::x6().process(&[1000.0; 100], &mut out);
        for &v in &out[out.len() - 60..] {
            assert!((930.0..960.0).contains(&v), "{}", v);
        }
    }

    #[test]
    fn test_decimator_dc_gain() {
        let mut out = Vec::new();
        Decimator::by6().process(&[1000.0; 600], &mut out);
        assert_eq!(out.len(), 100);
        let last = out[out.len() - 1];
        assert!((1020.0..1040.0).contains(&last), "{}", last);
    }

    #[test]
    fn test_tone_survives_interpolation() {
        let mut out = Vec::new();
        Interpolator::x6().process(&tone(1000.0, 8000.0, 10000.0, 480), &mut out);
        let y = &out[600..];
        let a = amplitude(y, 1000.0, 48000.0);
        assert!((9000.0..10500.0).contains(&a), "{}", a);
        assert!(amplitude(y, 7000.0, 48000.0) < 50.0);
        assert!(amplitude(y, 15000.0, 48000.0) < 100.0);
    }

    #[test]
    fn test_tone_survives_decimation() {
        let mut out = Vec::new();
        Decimator::by6().process(&tone(1000.0, 48000.0, 10000.0, 4800), &mut out);
        let a = amplitude(&out[100..], 1000.0, 8000.0);
        assert!((9500.0..10700.0).contains(&a), "{}", a);
    }

    #[test]
    fn test_decimator_rejects_alias_band() {
        let input = tone(6000.0, 48000.0, 10000.0, 4800);
        let mut out = Vec::new();
        Decimator::by6().process(&input, &mut out);
        let rejection = 20.0 * (rms(&input) / rms(&out[100..])).log10();
        assert!(rejection > 60.0, "{:.1} dB", rejection);
    }

    #[test]
    fn test_chunking_is_transparent() {
        let input = tone(700.0, 48000.0, 5000.0, 1200);
        let mut whole = Vec::new();
        Decimator::by6().process(&input, &mut whole);

        let mut dec = Decimator::by6();
        let mut split = Vec::new();
        for chunk in input.chunks(7) {
            dec.process(chunk, &mut split);
        }
        assert_eq!(whole, split);

        let mut up_whole = Vec::new();
        Interpolator::x6().process(&whole, &mut up_whole);
        let mut up = Interpolator::x6();
        let mut up_split = Vec::new();
        for chunk in whole.chunks(3) {
            up.process(chunk, &mut up_split);
        }
        assert_eq!(up_whole, up_split);
    }

    #[test]
    fn test_reset_clears_history() {
        let mut dec = Decimator::by6();
        let mut out = Vec::new();
        dec.process(&[5000.0; 17], &mut out);
        dec.reset();
        out.clear();
        dec.process(&[0.0; 60], &mut out);
        assert!(out.iter().all(|&v| v == 0.0));
    }
}
