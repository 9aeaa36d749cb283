use super::Statistics;
use crate::config::ThresholdConfig;

use serde::{Deserialize, Serialize};

/// Scales the median absolute deviation of Gaussian noise to its standard deviation.
const MAD_TO_SIGMA: f32 = 0.6745;

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum NoiseEstimator {
    /// median(|x|) / 0.6745, robust to the spikes themselves
    Median,
    /// Population standard deviation
    StdDev,
}

impl NoiseEstimator {
    pub fn estimate(self, data: &[f32]) -> f32 {
        match self {
            NoiseEstimator::Median => median_noise(data),
            NoiseEstimator::StdDev => std_dev_noise(data),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Polarity {
    Negative,
    Positive,
    Both,
}

impl Polarity {
    /// True when `sample` lies strictly past a (positive) threshold magnitude.
    pub fn is_beyond(self, sample: f32, threshold: f32) -> bool {
        match self {
            Polarity::Negative => sample < -threshold,
            Polarity::Positive => sample > threshold,
            Polarity::Both => sample.abs() > threshold,
        }
    }

    pub fn is_more_extreme(self, candidate: f32, current: f32) -> bool {
        match self {
            Polarity::Negative => candidate < current,
            Polarity::Positive => candidate > current,
            Polarity::Both => candidate.abs() > current.abs(),
        }
    }

    pub fn signed(self, threshold: f32) -> f32 {
        match self {
            Polarity::Negative => -threshold,
            Polarity::Positive | Polarity::Both => threshold,
        }
    }

    /// Like `signed`, but `Both` takes the side of the excursion at `amplitude`.
    pub fn signed_for(self, threshold: f32, amplitude: f32) -> f32 {
        match self {
            Polarity::Both if amplitude < 0.0 => -threshold,
            _ => self.signed(threshold),
        }
    }
}

pub fn median_noise(data: &[f32]) -> f32 {
    if data.is_empty() {
        return 0.0;
    }
    let mut magnitudes: Vec<f32> = data.iter().map(|x| x.abs()).collect();
    let mid = magnitudes.len() / 2;
    let (below, upper, _) = magnitudes.select_nth_unstable_by(mid, |a, b| a.total_cmp(b));
    let upper = *upper;

    let median = if data.len() % 2 == 1 {
        upper
    } else {
        let lower = below.iter().copied().fold(f32::MIN, f32::max);
        (lower + upper) / 2.0
    };
    median / MAD_TO_SIGMA
}

pub fn std_dev_noise(data: &[f32]) -> f32 {
    let mut statistics = Statistics::new();
    for &sample in data {
        statistics.update_statistics(sample as f64);
    }
    statistics.std_dev as f32
}

// THRESHOLD PROFILE -----------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct ThresholdWindow {
    pub start: usize,
    pub end: usize,
    pub noise: f32,
    /// Unsigned magnitude; see `Polarity::signed`.
    pub threshold: f32,
}

/// Piecewise-constant threshold over one channel, one entry per adaptive window.
#[derive(Debug, Clone, PartialEq)]
pub struct ThresholdProfile {
    windows: Vec<ThresholdWindow>,
}

impl ThresholdProfile {
    pub fn new(windows: Vec<ThresholdWindow>) -> Self {
        Self { windows }
    }

    pub fn constant(len: usize, noise: f32, threshold: f32) -> Self {
        Self::new(vec![ThresholdWindow {
            start: 0,
            end: len,
            noise,
            threshold,
        }])
    }

    pub fn windows(&self) -> &[ThresholdWindow] {
        &self.windows
    }

    fn window_at(&self, index: usize) -> Option<&ThresholdWindow> {
        let position = self.windows.partition_point(|w| w.start <= index);
        position.checked_sub(1).map(|p| &self.windows[p])
    }

    pub fn threshold_at(&self, index: usize) -> f32 {
        self.window_at(index).map_or(0.0, |w| w.threshold)
    }

    pub fn noise_at(&self, index: usize) -> f32 {
        self.window_at(index).map_or(0.0, |w| w.noise)
    }

    /// Length-weighted mean threshold over the channel.
    pub fn mean_threshold(&self) -> f32 {
        let total: usize = self.windows.iter().map(|w| w.end - w.start).sum();
        if total == 0 {
            return self.windows.first().map_or(0.0, |w| w.threshold);
        }
        let weighted: f64 = self
            .windows
            .iter()
            .map(|w| w.threshold as f64 * (w.end - w.start) as f64)
            .sum();
        (weighted / total as f64) as f32
    }
}

// ADAPTIVE THRESHOLD ----------------------------------------------------------

pub struct AdaptiveThreshold {
    estimator: NoiseEstimator,
    multiplier: f32,
    window: Option<usize>,
    min_threshold: Option<f32>,
}

impl AdaptiveThreshold {
    pub fn new(config: &ThresholdConfig, fs: f64) -> Self {
        Self {
            estimator: config.estimator,
            multiplier: config.multiplier as f32,
            window: config.window_samples(fs),
            min_threshold: config.min_threshold.map(|t| t as f32),
        }
    }

    pub fn compute(&self, filtered: &[f32]) -> ThresholdProfile {
        let windows = window_bounds(filtered.len(), self.window)
            .into_iter()
            .map(|(start, end)| {
                let noise = self.estimator.estimate(&filtered[start..end]);
                let mut threshold = self.multiplier * noise;
                if let Some(floor) = self.min_threshold {
                    threshold = threshold.max(floor);
                }
                ThresholdWindow {
                    start,
                    end,
                    noise,
                    threshold,
                }
            })
            .collect();
        ThresholdProfile::new(windows)
    }
}

/// Splits `len` samples into consecutive windows. A trailing window shorter than
/// half a window is merged into the one before it.
fn window_bounds(len: usize, window: Option<usize>) -> Vec<(usize, usize)> {
    let window = match window {
        Some(w) if w > 0 && w < len => w,
        _ => return vec![(0, len)],
    };

    let mut bounds: Vec<(usize, usize)> = (0..len)
        .step_by(window)
        .map(|start| (start, (start + window).min(len)))
        .collect();

    if bounds.len() > 1 {
        if let Some(&(start, end)) = bounds.last() {
            if (end - start) * 2 < window {
                bounds.pop();
                if let Some(previous) = bounds.last_mut() {
                    previous.1 = end;
                }
            }
        }
    }
    bounds
}
