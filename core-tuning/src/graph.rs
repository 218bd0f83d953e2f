//! One tuning effect instance.

use crate::config::TuningConfig;
use crate::nodes::{white_noise, BufferSource, Gain, LowPassFilter, Oscillator};
use crate::preset::TuningPreset;
use rand::Rng;

/// Oscillator, two buffer sources, the crackle filter and four gains.
pub const GRAPH_NODE_COUNT: usize = 8;

/// Fraction of a sweep cycle spent rising to the end frequency.
const SWEEP_RISE: f64 = 0.8;

#[derive(Debug)]
pub struct TuningGraph {
    preset: &'static TuningPreset,
    started_at: f64,
    sweep: Oscillator,
    sweep_gain: Gain,
    noise: BufferSource,
    noise_gain: Gain,
    crackle: BufferSource,
    crackle_filter: LowPassFilter,
    crackle_gain: Gain,
    master_gain: Gain,
}

impl TuningGraph {
    /// Build the graph and schedule its start at `start_time` on the render clock.
    pub fn build<R: Rng + ?Sized>(
        preset: &'static TuningPreset,
        volume: f32,
        start_time: f64,
        sample_rate: u32,
        config: &TuningConfig,
        rng: &mut R,
    ) -> Self {
        let mut sweep = Oscillator::new(preset.waveform, preset.sweep_start_hz);
        sweep
            .frequency
            .set_value_at_time(preset.sweep_start_hz, start_time);
        for cycle in 0..config.sweep_cycles {
            let cycle_start = start_time + cycle as f64 * preset.sweep_duration;
            sweep
                .frequency
                .set_value_at_time(preset.sweep_start_hz, cycle_start)
                .exponential_ramp_to_value_at_time(
                    preset.sweep_end_hz,
                    cycle_start + preset.sweep_duration * SWEEP_RISE,
                )
                .exponential_ramp_to_value_at_time(
                    preset.sweep_start_hz,
                    cycle_start + preset.sweep_duration,
                );
        }

        let mut sweep_gain = Gain::new(0.0);
        sweep_gain
            .gain
            .set_value_at_time(0.0, start_time)
            .linear_ramp_to_value_at_time(
                volume * preset.sweep_volume,
                start_time + config.sweep_fade_in.as_secs_f64(),
            );

        let noise_len = (sample_rate as f32 * config.noise_loop_secs) as usize;
        let noise = BufferSource::new(white_noise(rng, noise_len), true);
        let mut noise_gain = Gain::new(0.0);
        noise_gain
            .gain
            .set_value_at_time(0.0, start_time)
            .linear_ramp_to_value_at_time(
                volume * preset.noise_volume,
                start_time + config.noise_fade_in.as_secs_f64(),
            );

        let crackle_len = (sample_rate as f32 * config.crackle_loop_secs) as usize;
        let crackle = BufferSource::new(white_noise(rng, crackle_len), true);
        let mut crackle_filter = LowPassFilter::new(preset.crackle_filter_hz, config.crackle_q);
        crackle_filter
            .frequency
            .set_value_at_time(preset.crackle_filter_hz, start_time);
        crackle_filter.q.set_value_at_time(config.crackle_q, start_time);
        let mut crackle_gain = Gain::new(0.0);
        crackle_gain
            .gain
            .set_value_at_time(0.0, start_time)
            .linear_ramp_to_value_at_time(
                volume * preset.crackle_volume,
                start_time + config.crackle_fade_in.as_secs_f64(),
            );

        let mut master_gain = Gain::new(1.0);
        master_gain.gain.set_value_at_time(1.0, start_time);

        Self {
            preset,
            started_at: start_time,
            sweep,
            sweep_gain,
            noise,
            noise_gain,
            crackle,
            crackle_filter,
            crackle_gain,
            master_gain,
        }
    }

    pub fn preset(&self) -> &'static TuningPreset {
        self.preset
    }

    pub fn started_at(&self) -> f64 {
        self.started_at
    }

    /// Mix the effect into `out`, whose first sample plays at `start_time`.
    pub fn render(&mut self, out: &mut [f32], start_time: f64, sample_rate: f64) {
        for (i, slot) in out.iter_mut().enumerate() {
            let t = start_time + i as f64 / sample_rate;
            if t < self.started_at {
                continue;
            }

            let sweep = self
                .sweep_gain
                .apply(self.sweep.next_sample(t, sample_rate), t);
            let noise = self.noise_gain.apply(self.noise.next_sample(), t);
            let crackle = self.crackle_filter.process(self.crackle.next_sample(), t, sample_rate);
            let crackle = self.crackle_gain.apply(crackle, t);

            *slot += self.master_gain.apply(sweep + noise + crackle, t);
        }
    }

    /// Hold each stage at its current level at `now`, then ramp it to zero.
    pub fn fade_out(&mut self, now: f64, duration: f64) {
        for stage in [
            &mut self.sweep_gain,
            &mut self.noise_gain,
            &mut self.crackle_gain,
        ] {
            stage
                .gain
                .cancel_and_hold_at_time(now)
                .linear_ramp_to_value_at_time(0.0, now + duration);
        }
    }

    /// Silence every source. The graph renders nothing afterwards.
    pub fn stop_sources(&mut self) {
        self.sweep.stop();
        self.noise.stop();
        self.crackle.stop();
    }

    /// `[sweep, noise, crackle]` gain levels scheduled for `t`.
    pub fn stage_gains_at(&self, t: f64) -> [f32; 3] {
        [
            self.sweep_gain.gain.value_at(t),
            self.noise_gain.gain.value_at(t),
            self.crackle_gain.gain.value_at(t),
        ]
    }

    pub fn sweep_frequency_at(&self, t: f64) -> f32 {
        self.sweep.frequency.value_at(t)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::preset::PresetName;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    const RATE: u32 = 8_000;

    fn graph(name: PresetName, start: f64) -> TuningGraph {
        let mut rng = StdRng::seed_from_u64(11);
        TuningGraph::build(
            name.preset(),
            0.4,
            start,
            RATE,
            &TuningConfig::default(),
            &mut rng,
        )
    }

    fn close(a: f32, b: f32) -> bool {
        (a - b).abs() < 1e-3
    }

    #[test]
    fn test_stages_fade_in_to_preset_levels() {
        let graph = graph(PresetName::Classic, 1.0);

        assert_eq!(graph.stage_gains_at(1.0), [0.0, 0.0, 0.0]);

        let [sweep, noise, crackle] = graph.stage_gains_at(1.1);
        assert!(close(sweep, 0.4 * 0.3));
        assert!(close(crackle, 0.4 * 0.2));
        // Noise ramps over 150 ms and is two thirds of the way there.
        assert!(close(noise, 0.4 * 0.6 * (2.0 / 3.0)));

        let [_, noise, _] = graph.stage_gains_at(1.15);
        assert!(close(noise, 0.4 * 0.6));
    }

    #[test]
    fn test_sweep_cycle_shape() {
        let graph = graph(PresetName::FastDigital, 0.0);
        let d = 1.5;

        assert!(close(graph.sweep_frequency_at(0.0), 800.0));
        assert!(close(graph.sweep_frequency_at(0.8 * d), 8000.0));
        assert!(close(graph.sweep_frequency_at(d), 800.0));
        // Cycles repeat far into the future.
        assert!(close(graph.sweep_frequency_at(50.0 * d + 0.8 * d), 8000.0));
    }

    #[test]
    fn test_fade_out_reaches_silence() {
        let mut graph = graph(PresetName::AmRough, 0.0);
        graph.fade_out(2.0, 0.3);

        let held = graph.stage_gains_at(2.0);
        assert!(close(held[0], 0.4 * 0.25));
        assert!(close(held[1], 0.4 * 0.75));

        let [sweep, noise, crackle] = graph.stage_gains_at(2.15);
        assert!(close(noise, 0.4 * 0.75 / 2.0));
        assert!(sweep > 0.0 && crackle > 0.0);

        assert_eq!(graph.stage_gains_at(2.3), [0.0, 0.0, 0.0]);
        assert_eq!(graph.stage_gains_at(10.0), [0.0, 0.0, 0.0]);
    }

    #[test]
    fn test_fade_out_during_fade_in_starts_from_current_level() {
        let mut graph = graph(PresetName::Classic, 0.0);
        graph.fade_out(0.05, 0.1);
        let [sweep, _, _] = graph.stage_gains_at(0.05);
        assert!(close(sweep, 0.4 * 0.3 / 2.0));
    }

    #[test]
    fn test_render_is_audible_then_silent() {
        let mut graph = graph(PresetName::SlowAnalog, 0.0);
        let rate = RATE as f64;

        let mut first = vec![0.0f32; 4000];
        graph.render(&mut first, 0.0, rate);
        assert!(first[2000..].iter().any(|s| s.abs() > 0.05));

        graph.fade_out(0.5, 0.3);
        let mut second = vec![0.0f32; 4000];
        graph.render(&mut second, 0.5, rate);
        // Past the 300 ms fade everything is exactly zero.
        assert!(second[2400..].iter().all(|s| *s == 0.0));

        graph.stop_sources();
        let mut third = vec![0.0f32; 100];
        graph.render(&mut third, 1.0, rate);
        assert!(third.iter().all(|s| *s == 0.0));
    }

    #[test]
    fn test_render_waits_for_start_time() {
        let mut graph = graph(PresetName::Classic, 1.0);
        let mut out = vec![0.25f32; 100];
        graph.render(&mut out, 0.0, RATE as f64);
        assert!(out.iter().all(|s| *s == 0.25));
    }
}
