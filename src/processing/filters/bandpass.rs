use super::FilterInstance;
use crate::config::FilterConfig;
use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SectionKind {
    HighPass,
    LowPass,
}

#[derive(Debug, Clone)]
struct SecondOrderFilter {
    kind: SectionKind,
    a: [f64; 3],
    b: [f64; 3],
    x: [f64; 2],
    y: [f64; 2],
}

impl SecondOrderFilter {
    fn new(f0: f64, fs: f64, kind: SectionKind) -> Self {
        let q = (2.0f64).sqrt() / 2.0; // Butterworth, maximally flat passband
        let omega = 2.0 * std::f64::consts::PI * f0 / fs;
        let alpha = f64::sin(omega) / (2.0 * q);
        let cos_omega = f64::cos(omega);

        let (b0, b1, b2) = match kind {
            SectionKind::HighPass => (
                (1.0 + cos_omega) / 2.0,
                -(1.0 + cos_omega),
                (1.0 + cos_omega) / 2.0,
            ),
            SectionKind::LowPass => (
                (1.0 - cos_omega) / 2.0,
                1.0 - cos_omega,
                (1.0 - cos_omega) / 2.0,
            ),
        };
        let (a0, a1, a2) = (1.0 + alpha, -2.0 * cos_omega, 1.0 - alpha);

        // Normalise once so the per-sample update skips the divisions
        SecondOrderFilter {
            kind,
            a: [1.0, a1 / a0, a2 / a0],
            b: [b0 / a0, b1 / a0, b2 / a0],
            x: [0.0, 0.0],
            y: [0.0, 0.0],
        }
    }

    fn calculate_output(&mut self, input: f64) -> f64 {
        let output = self.b[0] * input + self.b[1] * self.x[0] + self.b[2] * self.x[1]
            - self.a[1] * self.y[0]
            - self.a[2] * self.y[1];

        self.x[1] = self.x[0];
        self.x[0] = input;
        self.y[1] = self.y[0];
        self.y[0] = output;

        output
    }

    /// Steady state for a constant input. Returns the constant output it settles to.
    fn prime(&mut self, value: f64) -> f64 {
        let dc_gain = (self.b[0] + self.b[1] + self.b[2]) / (1.0 + self.a[1] + self.a[2]);
        let output = match self.kind {
            SectionKind::HighPass => 0.0,
            SectionKind::LowPass => value * dc_gain,
        };
        self.x = [value, value];
        self.y = [output, output];
        output
    }

    fn reset(&mut self) {
        self.x = [0.0, 0.0];
        self.y = [0.0, 0.0];
    }
}

/// Butterworth band-pass built from cascaded high-pass and low-pass biquads.
#[derive(Debug, Clone)]
pub struct BandPassFilter {
    config: FilterConfig,
    sections: Vec<SecondOrderFilter>,
}

impl BandPassFilter {
    pub fn new(config: FilterConfig, fs: f64) -> Result<Self> {
        let nyquist = fs / 2.0;
        if !(config.f_low > 0.0 && config.f_low < config.f_high && config.f_high < nyquist) {
            return Err(Error::InvalidConfig(format!(
                "band-pass edges must satisfy 0 < f_low < f_high < {} Hz, got {}..{}",
                nyquist, config.f_low, config.f_high
            )));
        }
        if config.order == 0 {
            return Err(Error::InvalidConfig(
                "filter order must be at least 1".to_string(),
            ));
        }

        let sections = (0..config.order)
            .flat_map(|_| {
                [
                    SecondOrderFilter::new(config.f_low, fs, SectionKind::HighPass),
                    SecondOrderFilter::new(config.f_high, fs, SectionKind::LowPass),
                ]
            })
            .collect();

        Ok(BandPassFilter { config, sections })
    }

    pub fn config(&self) -> &FilterConfig {
        &self.config
    }

    /// Runs the configured pass (zero-phase or causal) over one channel.
    pub fn apply(&mut self, data: &[f32]) -> Vec<f32> {
        if self.config.zero_phase {
            self.filtfilt(data)
        } else {
            self.filter_signal(data)
        }
    }
}

impl FilterInstance for BandPassFilter {
    fn filter_sample(&mut self, sample: f64) -> f64 {
        self.sections
            .iter_mut()
            .fold(sample, |acc, section| section.calculate_output(acc))
    }

    fn reset(&mut self) {
        self.sections.iter_mut().for_each(SecondOrderFilter::reset);
    }

    fn prime(&mut self, value: f64) {
        self.sections
            .iter_mut()
            .fold(value, |acc, section| section.prime(acc));
    }

    fn pad_length(&self) -> usize {
        3 * (2 * self.sections.len() + 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::PI;

    const FS: f64 = 24414.0625;

    fn sine(freq: f64, n: usize) -> Vec<f32> {
        (0..n)
            .map(|i| (2.0 * PI * freq * i as f64 / FS).sin() as f32)
            .collect()
    }

    fn peak(data: &[f32]) -> f32 {
        data.iter().fold(0.0f32, |acc, &x| acc.max(x.abs()))
    }

    fn filter(zero_phase: bool) -> BandPassFilter {
        let config = FilterConfig {
            zero_phase,
            ..FilterConfig::default()
        };
        BandPassFilter::new(config, FS).unwrap()
    }

    #[test]
    fn passes_spike_band() {
        let input = sine(1000.0, 8192);
        let output = filter(true).apply(&input);
        let middle_peak = peak(&output[2048..6144]);
        assert!(middle_peak > 0.9 && middle_peak < 1.05, "{}", middle_peak);

        let causal = filter(false).apply(&input);
        let causal_peak = peak(&causal[4096..]);
        assert!(causal_peak > 0.9 && causal_peak < 1.05, "{}", causal_peak);
    }

    #[test]
    fn rejects_field_potentials_and_dc() {
        let lfp: Vec<f32> = sine(20.0, 24414).iter().map(|x| x + 0.5).collect();
        let output = filter(true).apply(&lfp);
        assert!(peak(&output[4096..20000]) < 0.01);
    }

    #[test]
    fn zero_phase_keeps_alignment() {
        let input = sine(1000.0, 8192);
        let output = filter(true).apply(&input);

        let dot: f64 = input[2048..6144]
            .iter()
            .zip(&output[2048..6144])
            .map(|(&a, &b)| a as f64 * b as f64)
            .sum();
        let norm_in: f64 = input[2048..6144].iter().map(|&a| (a as f64).powi(2)).sum();
        let norm_out: f64 = output[2048..6144].iter().map(|&b| (b as f64).powi(2)).sum();
        let correlation = dot / (norm_in.sqrt() * norm_out.sqrt());
        assert!(correlation > 0.99, "{}", correlation);
    }

    #[test]
    fn constant_input_settles_immediately() {
        let output = filter(false).apply(&[3.0; 64]);
        assert!(peak(&output) < 1e-6);
    }

    #[test]
    fn handles_short_and_empty_input() {
        let mut bp = filter(true);
        assert!(bp.apply(&[]).is_empty());
        assert_eq!(bp.apply(&[1.0]).len(), 1);
        assert_eq!(bp.apply(&[1.0, -1.0, 0.5]).len(), 3);
    }

    #[test]
    fn pad_length_grows_with_order() {
        let with_order = |order| {
            let config = FilterConfig {
                order,
                ..FilterConfig::default()
            };
            BandPassFilter::new(config, FS).unwrap()
        };
        // 3 * (2 * sections + 1) with two sections per order
        assert_eq!(with_order(1).pad_length(), 15);
        assert_eq!(with_order(2).pad_length(), 27);
        assert_eq!(with_order(3).pad_length(), 39);
    }

    #[test]
    fn short_input_keeps_its_length_under_padding() {
        let mut bp = filter(true);
        for len in [2usize, 10, 27, 28] {
            let input: Vec<f32> = (0..len).map(|i| (i as f32 * 0.7).sin()).collect();
            let output = bp.filtfilt(&input);
            assert_eq!(output.len(), len);
            assert!(output.iter().all(|y| y.is_finite()));
        }
    }

    #[test]
    fn rejects_invalid_edges() {
        let config = FilterConfig {
            f_low: 6000.0,
            f_high: 5000.0,
            ..FilterConfig::default()
        };
        assert!(BandPassFilter::new(config, FS).is_err());
    }
}
