pub mod spike;
pub mod threshold;

// SPIKE EVENT -----------------------------------------------------------------

/// One detected event, aligned on its peak.
#[derive(Debug, Clone, PartialEq)]
pub struct Spike {
    pub channel: u16,
    /// Sample index of the aligned peak.
    pub index: usize,
    /// Sample index where the threshold was first crossed.
    pub threshold_index: usize,
    /// Filtered value at the peak.
    pub amplitude: f32,
    /// Signed threshold in force at the crossing.
    pub threshold: f32,
    pub waveform: Vec<f32>,
}

impl Spike {
    pub fn time_s(&self, fs: f64) -> f64 {
        self.index as f64 / fs
    }
}

// STATISTICS COMPONENT --------------------------------------------------------

#[derive(Debug, Clone, Default)]
pub struct Statistics {
    pub sum: f64,
    pub sum_of_squares: f64,
    pub count: usize,
    pub mean: f64,
    pub std_dev: f64,
    pub z_score: f64,
}

impl Statistics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn update_statistics(&mut self, sample: f64) {
        self.sum += sample;
        self.sum_of_squares += sample.powi(2);
        self.count += 1;

        self.mean = self.sum / self.count as f64;
        let variance = (self.sum_of_squares / self.count as f64) - self.mean.powi(2);
        self.std_dev = variance.max(0.0).sqrt();
        self.z_score = if self.std_dev > 0.0 {
            (sample - self.mean) / self.std_dev
        } else {
            0.0
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn running_statistics_match_population_values() {
        let mut stats = Statistics::new();
        for sample in [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0] {
            stats.update_statistics(sample);
        }
        assert_eq!(stats.count, 8);
        assert!((stats.mean - 5.0).abs() < 1e-12);
        assert!((stats.std_dev - 2.0).abs() < 1e-12);
        assert!((stats.z_score - 2.0).abs() < 1e-12);
    }

    #[test]
    fn constant_signal_has_zero_z_score() {
        let mut stats = Statistics::new();
        for _ in 0..10 {
            stats.update_statistics(1.5);
        }
        assert_eq!(stats.std_dev, 0.0);
        assert_eq!(stats.z_score, 0.0);
    }

    #[test]
    fn spike_time_uses_peak_index() {
        let spike = Spike {
            channel: 1,
            index: 500,
            threshold_index: 498,
            amplitude: -1.0,
            threshold: -0.5,
            waveform: vec![],
        };
        assert!((spike.time_s(1000.0) - 0.5).abs() < 1e-12);
    }
}
