// src/simulate.rs
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::f64::consts::PI;

use crate::error::{Error, Result};
use crate::recording::{Recording, VoltageUnits};

const MIN_INTERVAL_MS: f64 = 3.0;
const TEMPLATE_BEFORE_MS: f64 = 1.0;
const TEMPLATE_AFTER_MS: f64 = 1.5;

#[derive(Debug, Clone)]
pub struct SimulationConfig {
    pub sample_rate: f64,
    pub duration_s: f64,
    pub num_channels: usize,
    /// Standard deviation of the broadband background noise.
    pub noise_uv: f64,
    pub spike_rate_hz: f64,
    /// Depth of the negative trough of each spike.
    pub spike_amplitude_uv: f64,
    pub units: VoltageUnits,
    pub seed: u64,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            sample_rate: 24414.0625,
            duration_s: 10.0,
            num_channels: 4,
            noise_uv: 10.0,
            spike_rate_hz: 20.0,
            spike_amplitude_uv: 100.0,
            units: VoltageUnits::Volts,
            seed: 0,
        }
    }
}

/// Biphasic extracellular spike: a sharp trough followed by a slower positive lobe.
fn spike_template(fs: f64, amplitude: f64) -> (usize, Vec<f64>) {
    let before = (TEMPLATE_BEFORE_MS * fs / 1000.0).round() as usize;
    let after = (TEMPLATE_AFTER_MS * fs / 1000.0).round() as usize;
    let template = (0..before + after)
        .map(|i| {
            let t_ms = (i as f64 - before as f64) * 1000.0 / fs;
            let trough = -(-(t_ms / 0.2).powi(2)).exp();
            let rebound = 0.4 * (-((t_ms - 0.5) / 0.3).powi(2)).exp();
            amplitude * (trough + rebound)
        })
        .collect();
    (before, template)
}

fn gaussian(rng: &mut StdRng) -> f64 {
    let u1: f64 = 1.0 - rng.gen::<f64>();
    let u2: f64 = rng.gen::<f64>();
    (-2.0 * u1.ln()).sqrt() * (2.0 * PI * u2).cos()
}

/// Generates noise plus spikes on every channel. Returns the recording and the
/// trough index of every inserted spike per channel.
pub fn simulate(config: &SimulationConfig) -> Result<(Recording, Vec<Vec<usize>>)> {
    if config.num_channels == 0 || config.num_channels > u16::MAX as usize {
        return Err(Error::InvalidConfig(format!(
            "cannot simulate {} channels",
            config.num_channels
        )));
    }
    if !(config.duration_s > 0.0 && config.sample_rate > 0.0) {
        return Err(Error::InvalidConfig(
            "simulation needs a positive duration and sample rate".to_string(),
        ));
    }

    let fs = config.sample_rate;
    let num_samples = (config.duration_s * fs).round() as usize;
    let to_units = 0.001 / config.units.to_millivolts(); // µV -> output units
    let (before, template) = spike_template(fs, config.spike_amplitude_uv);
    let min_interval = (MIN_INTERVAL_MS * fs / 1000.0).ceil() as usize;

    let mut rng = StdRng::seed_from_u64(config.seed);
    let mut channels = Vec::with_capacity(config.num_channels);
    let mut truth = Vec::with_capacity(config.num_channels);

    for _ in 0..config.num_channels {
        let mut samples: Vec<f64> = (0..num_samples)
            .map(|_| config.noise_uv * gaussian(&mut rng))
            .collect();

        let mut times = Vec::new();
        if config.spike_rate_hz > 0.0 && num_samples > template.len() {
            let mut t = before as f64;
            loop {
                let interval = -(1.0 - rng.gen::<f64>()).ln() / config.spike_rate_hz * fs;
                t += interval.max(min_interval as f64);
                let trough = t.round() as usize;
                if trough + template.len() - before >= num_samples {
                    break;
                }
                for (offset, value) in template.iter().enumerate() {
                    samples[trough - before + offset] += value;
                }
                times.push(trough);
            }
        }

        channels.push(
            samples
                .into_iter()
                .map(|uv| (uv * to_units) as f32)
                .collect::<Vec<f32>>(),
        );
        truth.push(times);
    }

    Ok((Recording::from_samples(fs, channels)?, truth))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn is_reproducible_for_a_seed() {
        let config = SimulationConfig {
            duration_s: 0.5,
            num_channels: 2,
            seed: 42,
            ..SimulationConfig::default()
        };
        let (a, truth_a) = simulate(&config).unwrap();
        let (b, truth_b) = simulate(&config).unwrap();
        assert_eq!(a, b);
        assert_eq!(truth_a, truth_b);
        assert_eq!(a.num_samples(), 12207);
    }

    #[test]
    fn respects_minimum_interval_and_bounds() {
        let config = SimulationConfig {
            duration_s: 2.0,
            num_channels: 1,
            spike_rate_hz: 200.0,
            seed: 3,
            ..SimulationConfig::default()
        };
        let (recording, truth) = simulate(&config).unwrap();
        let min_interval = (MIN_INTERVAL_MS * config.sample_rate / 1000.0).floor() as usize;

        assert!(!truth[0].is_empty());
        assert!(truth[0].windows(2).all(|w| w[1] - w[0] >= min_interval));
        assert!(truth[0].iter().all(|&t| t < recording.num_samples()));
    }

    #[test]
    fn writes_requested_units() {
        let config = SimulationConfig {
            duration_s: 0.1,
            num_channels: 1,
            spike_rate_hz: 0.0,
            units: VoltageUnits::Microvolts,
            ..SimulationConfig::default()
        };
        let (recording, truth) = simulate(&config).unwrap();
        assert!(truth[0].is_empty());
        let peak = recording.channels[0]
            .samples
            .iter()
            .fold(0.0f32, |acc, x| acc.max(x.abs()));
        assert!(peak > 10.0 && peak < 100.0, "{}", peak);
    }

    #[test]
    fn rejects_empty_simulation() {
        let config = SimulationConfig {
            num_channels: 0,
            ..SimulationConfig::default()
        };
        assert!(simulate(&config).is_err());
    }
}
