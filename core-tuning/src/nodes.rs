//! Signal nodes used by the tuning graph.
//!
//! Each node produces or transforms one mono sample at a time; the graph
//! drives them with the render clock so parameter automation stays
//! sample-accurate.

use crate::param::AudioParam;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;
use std::sync::Arc;

/// Periodic waveform of an [`Oscillator`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Waveform {
    Sine,
    Square,
    Sawtooth,
    Triangle,
}

impl Waveform {
    /// Sample at `phase` in `[0, 1)`.
    pub fn sample(self, phase: f64) -> f32 {
        let value = match self {
            Waveform::Sine => (2.0 * PI * phase).sin(),
            Waveform::Square => {
                if phase < 0.5 {
                    1.0
                } else {
                    -1.0
                }
            }
            Waveform::Sawtooth => 2.0 * phase - 1.0,
            Waveform::Triangle => 1.0 - 4.0 * (phase - 0.5).abs(),
        };
        value as f32
    }
}

#[derive(Debug, Clone)]
pub struct Oscillator {
    pub waveform: Waveform,
    pub frequency: AudioParam,
    phase: f64,
    stopped: bool,
}

impl Oscillator {
    pub fn new(waveform: Waveform, frequency_hz: f32) -> Self {
        Self {
            waveform,
            frequency: AudioParam::new(frequency_hz),
            phase: 0.0,
            stopped: false,
        }
    }

    pub fn next_sample(&mut self, t: f64, sample_rate: f64) -> f32 {
        if self.stopped {
            return 0.0;
        }
        let sample = self.waveform.sample(self.phase);
        let freq = self.frequency.next_value(t) as f64;
        self.phase = (self.phase + freq / sample_rate).rem_euclid(1.0);
        sample
    }

    pub fn stop(&mut self) {
        self.stopped = true;
    }
}

/// White noise in `[-1, 1)`, shared between sources.
pub fn white_noise<R: Rng + ?Sized>(rng: &mut R, len: usize) -> Arc<[f32]> {
    (0..len).map(|_| rng.gen_range(-1.0f32..1.0)).collect()
}

/// Plays a pre-rendered buffer, optionally looping.
#[derive(Debug, Clone)]
pub struct BufferSource {
    buffer: Arc<[f32]>,
    position: usize,
    looping: bool,
    stopped: bool,
}

impl BufferSource {
    pub fn new(buffer: Arc<[f32]>, looping: bool) -> Self {
        Self {
            buffer,
            position: 0,
            looping,
            stopped: false,
        }
    }

    pub fn next_sample(&mut self) -> f32 {
        if self.stopped || self.buffer.is_empty() {
            return 0.0;
        }
        if self.position >= self.buffer.len() {
            if !self.looping {
                return 0.0;
            }
            self.position = 0;
        }
        let sample = self.buffer[self.position];
        self.position += 1;
        sample
    }

    pub fn buffer_len(&self) -> usize {
        self.buffer.len()
    }

    pub fn stop(&mut self) {
        self.stopped = true;
    }
}

/// Second-order low-pass filter (RBJ cookbook), direct form I.
///
/// `q` is in dB, as for Web Audio low-pass filters.
#[derive(Debug, Clone)]
pub struct LowPassFilter {
    pub frequency: AudioParam,
    pub q: AudioParam,
    coefficients: Coefficients,
    tuned_for: Option<(f32, f32)>,
    x1: f64,
    x2: f64,
    y1: f64,
    y2: f64,
}

#[derive(Debug, Clone, Copy, Default)]
struct Coefficients {
    b0: f64,
    b1: f64,
    b2: f64,
    a1: f64,
    a2: f64,
}

impl Coefficients {
    fn low_pass(cutoff_hz: f64, q_db: f64, sample_rate: f64) -> Self {
        let nyquist = sample_rate / 2.0;
        let cutoff = cutoff_hz.clamp(1.0, nyquist * 0.999);
        let q = 10f64.powf(q_db / 20.0).max(1e-4);

        let w0 = 2.0 * PI * cutoff / sample_rate;
        let (sin_w0, cos_w0) = w0.sin_cos();
        let alpha = sin_w0 / (2.0 * q);
        let a0 = 1.0 + alpha;

        Self {
            b0: (1.0 - cos_w0) / 2.0 / a0,
            b1: (1.0 - cos_w0) / a0,
            b2: (1.0 - cos_w0) / 2.0 / a0,
            a1: -2.0 * cos_w0 / a0,
            a2: (1.0 - alpha) / a0,
        }
    }
}

impl LowPassFilter {
    pub fn new(frequency_hz: f32, q_db: f32) -> Self {
        Self {
            frequency: AudioParam::new(frequency_hz),
            q: AudioParam::new(q_db),
            coefficients: Coefficients::default(),
            tuned_for: None,
            x1: 0.0,
            x2: 0.0,
            y1: 0.0,
            y2: 0.0,
        }
    }

    pub fn process(&mut self, input: f32, t: f64, sample_rate: f64) -> f32 {
        let frequency = self.frequency.next_value(t);
        let q = self.q.next_value(t);
        if self.tuned_for != Some((frequency, q)) {
            self.coefficients = Coefficients::low_pass(frequency as f64, q as f64, sample_rate);
            self.tuned_for = Some((frequency, q));
        }

        let c = self.coefficients;
        let x0 = input as f64;
        let y0 = c.b0 * x0 + c.b1 * self.x1 + c.b2 * self.x2 - c.a1 * self.y1 - c.a2 * self.y2;

        self.x2 = self.x1;
        self.x1 = x0;
        self.y2 = self.y1;
        self.y1 = y0;
        y0 as f32
    }
}

#[derive(Debug, Clone)]
pub struct Gain {
    pub gain: AudioParam,
}

impl Gain {
    pub fn new(initial: f32) -> Self {
        Self {
            gain: AudioParam::new(initial),
        }
    }

    pub fn apply(&mut self, input: f32, t: f64) -> f32 {
        input * self.gain.next_value(t)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    const RATE: f64 = 48_000.0;

    fn rms(samples: &[f32]) -> f32 {
        (samples.iter().map(|s| s * s).sum::<f32>() / samples.len() as f32).sqrt()
    }

    #[test]
    fn test_waveform_shapes() {
        assert!(Waveform::Sine.sample(0.25) > 0.999);
        assert_eq!(Waveform::Square.sample(0.1), 1.0);
        assert_eq!(Waveform::Square.sample(0.6), -1.0);
        assert_eq!(Waveform::Sawtooth.sample(0.0), -1.0);
        assert_eq!(Waveform::Triangle.sample(0.5), 1.0);
        assert_eq!(Waveform::Triangle.sample(0.0), -1.0);
    }

    #[test]
    fn test_oscillator_frequency_follows_param() {
        // 1 kHz square at 48 kHz flips sign every 24 samples.
        let mut osc = Oscillator::new(Waveform::Square, 1000.0);
        let samples: Vec<f32> = (0..96)
            .map(|i| osc.next_sample(i as f64 / RATE, RATE))
            .collect();
        let flips = samples.windows(2).filter(|w| w[0] != w[1]).count();
        assert_eq!(flips, 3);

        osc.stop();
        assert_eq!(osc.next_sample(1.0, RATE), 0.0);
    }

    #[test]
    fn test_looping_buffer_source_wraps() {
        let mut source = BufferSource::new(Arc::from(vec![0.1, 0.2, 0.3]), true);
        let played: Vec<f32> = (0..7).map(|_| source.next_sample()).collect();
        assert_eq!(played, vec![0.1, 0.2, 0.3, 0.1, 0.2, 0.3, 0.1]);

        let mut once = BufferSource::new(Arc::from(vec![0.5]), false);
        assert_eq!(once.next_sample(), 0.5);
        assert_eq!(once.next_sample(), 0.0);
    }

    #[test]
    fn test_white_noise_range() {
        let mut rng = StdRng::seed_from_u64(3);
        let noise = white_noise(&mut rng, 4096);
        assert_eq!(noise.len(), 4096);
        assert!(noise.iter().all(|s| (-1.0..1.0).contains(s)));
        assert!(rms(&noise) > 0.4);
    }

    #[test]
    fn test_low_pass_attenuates_high_frequencies() {
        let mut low = LowPassFilter::new(800.0, 0.5);
        let mut high = LowPassFilter::new(800.0, 0.5);

        let mut passed = Vec::new();
        let mut blocked = Vec::new();
        for i in 0..4800 {
            let t = i as f64 / RATE;
            passed.push(low.process((2.0 * PI * 100.0 * t).sin() as f32, t, RATE));
            blocked.push(high.process((2.0 * PI * 12_000.0 * t).sin() as f32, t, RATE));
        }

        let steady = 2400..;
        assert!(rms(&passed[steady.clone()]) > 0.6);
        assert!(rms(&blocked[steady]) < 0.02);
    }

    #[test]
    fn test_gain_applies_automation() {
        let mut gain = Gain::new(0.0);
        gain.gain
            .set_value_at_time(0.0, 0.0)
            .linear_ramp_to_value_at_time(1.0, 1.0);
        assert_eq!(gain.apply(0.5, 0.0), 0.0);
        assert!((gain.apply(0.5, 0.5) - 0.25).abs() < 1e-6);
    }
}
