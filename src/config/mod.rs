// src/config/mod.rs
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::error::{Error, Result};
use crate::processing::detectors::threshold::{NoiseEstimator, Polarity};
use crate::recording::VoltageUnits;

#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
#[serde(default)]
pub struct Config {
    pub processor: ProcessorConfig,
    pub filter: FilterConfig,
    pub threshold: ThresholdConfig,
    pub extraction: ExtractionConfig,
    pub output: OutputConfig,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct ProcessorConfig {
    pub verbose: bool,
    /// Overrides the rate carried by the input (required for CSV input).
    pub sample_rate: Option<f64>,
    pub input_units: VoltageUnits,
    /// 1-based channel numbers to process. `None` processes every channel.
    pub channels: Option<Vec<u16>>,
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        Self {
            verbose: false,
            sample_rate: None,
            input_units: VoltageUnits::Volts,
            channels: None,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct FilterConfig {
    pub f_low: f64,
    pub f_high: f64,
    /// Number of cascaded high-pass/low-pass biquad pairs.
    pub order: usize,
    pub zero_phase: bool,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            f_low: 300.0,
            f_high: 5000.0,
            order: 2,
            zero_phase: true,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct ThresholdConfig {
    pub estimator: NoiseEstimator,
    pub multiplier: f64,
    /// Length of each adaptive noise window in seconds. 0 uses the whole channel.
    pub window_s: f64,
    pub polarity: Polarity,
    /// Floor applied to the threshold, in input units.
    pub min_threshold: Option<f64>,
}

impl Default for ThresholdConfig {
    fn default() -> Self {
        Self {
            estimator: NoiseEstimator::Median,
            multiplier: 4.0,
            window_s: 10.0,
            polarity: Polarity::Negative,
            min_threshold: None,
        }
    }
}

impl ThresholdConfig {
    pub fn window_samples(&self, fs: f64) -> Option<usize> {
        if self.window_s <= 0.0 {
            return None;
        }
        Some(((self.window_s * fs).round() as usize).max(1))
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct ExtractionConfig {
    pub pre_peak: usize,
    pub post_peak: usize,
    pub peak_search_ms: f64,
    pub shadow_ms: f64,
    /// Events larger than this many noise sigmas are rejected as artifacts.
    pub artifact_multiplier: Option<f64>,
    pub max_spikes_per_channel: Option<usize>,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            pre_peak: 10,
            post_peak: 22,
            peak_search_ms: 0.5,
            shadow_ms: 1.0,
            artifact_multiplier: None,
            max_spikes_per_channel: None,
        }
    }
}

impl ExtractionConfig {
    pub fn waveform_length(&self) -> usize {
        self.pre_peak + self.post_peak
    }

    pub fn peak_search_samples(&self, fs: f64) -> usize {
        ms_to_samples(self.peak_search_ms, fs).max(1)
    }

    pub fn shadow_samples(&self, fs: f64) -> usize {
        ms_to_samples(self.shadow_ms, fs)
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct OutputConfig {
    /// PLX timestamp clock in Hz. Defaults to the rounded sample rate.
    pub timestamp_frequency: Option<f64>,
    pub bits_per_sample: u8,
    pub max_magnitude_mv: u16,
    /// Fixed waveform gain. `None` picks a gain per channel from its largest spike.
    pub gain: Option<u32>,
    pub comment: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            timestamp_frequency: None,
            bits_per_sample: 12,
            max_magnitude_mv: 3000,
            gain: None,
            comment: String::new(),
        }
    }
}

fn ms_to_samples(ms: f64, fs: f64) -> usize {
    (ms * fs / 1000.0).round().max(0.0) as usize
}

fn invalid(message: String) -> Error {
    Error::InvalidConfig(message)
}

impl Config {
    /// Checks every section against the sample rate of the recording it will run on.
    pub fn validate(&self, fs: f64) -> Result<()> {
        if !(fs.is_finite() && fs > 0.0) {
            return Err(invalid(format!("sample rate must be positive, got {}", fs)));
        }

        let filter = &self.filter;
        let nyquist = fs / 2.0;
        if !(filter.f_low > 0.0 && filter.f_low < filter.f_high && filter.f_high < nyquist) {
            return Err(invalid(format!(
                "band-pass edges must satisfy 0 < f_low < f_high < {} Hz, got {}..{}",
                nyquist, filter.f_low, filter.f_high
            )));
        }
        if filter.order == 0 || filter.order > 8 {
            return Err(invalid(format!(
                "filter order must be between 1 and 8, got {}",
                filter.order
            )));
        }

        let threshold = &self.threshold;
        if !(threshold.multiplier.is_finite() && threshold.multiplier > 0.0) {
            return Err(invalid(format!(
                "threshold multiplier must be positive, got {}",
                threshold.multiplier
            )));
        }
        if !(threshold.window_s.is_finite() && threshold.window_s >= 0.0) {
            return Err(invalid(format!(
                "threshold window must be >= 0 s, got {}",
                threshold.window_s
            )));
        }
        if let Some(floor) = threshold.min_threshold {
            if !(floor.is_finite() && floor >= 0.0) {
                return Err(invalid(format!("min_threshold must be >= 0, got {}", floor)));
            }
        }

        let extraction = &self.extraction;
        if extraction.post_peak == 0 {
            return Err(invalid("post_peak must include the peak sample".to_string()));
        }
        if !(extraction.peak_search_ms.is_finite() && extraction.peak_search_ms > 0.0) {
            return Err(invalid(format!(
                "peak_search_ms must be positive, got {}",
                extraction.peak_search_ms
            )));
        }
        if !(extraction.shadow_ms.is_finite() && extraction.shadow_ms >= 0.0) {
            return Err(invalid(format!(
                "shadow_ms must be >= 0, got {}",
                extraction.shadow_ms
            )));
        }
        if let Some(artifact) = extraction.artifact_multiplier {
            if artifact <= threshold.multiplier {
                return Err(invalid(format!(
                    "artifact_multiplier ({}) must exceed the threshold multiplier ({})",
                    artifact, threshold.multiplier
                )));
            }
        }
        if extraction.waveform_length() > i16::MAX as usize {
            return Err(invalid(format!(
                "waveform length {} does not fit a PLX block",
                extraction.waveform_length()
            )));
        }

        let output = &self.output;
        if !(8..=16).contains(&output.bits_per_sample) {
            return Err(invalid(format!(
                "bits_per_sample must be between 8 and 16, got {}",
                output.bits_per_sample
            )));
        }
        if output.max_magnitude_mv == 0 {
            return Err(invalid("max_magnitude_mv must be positive".to_string()));
        }
        if let Some(ts_freq) = output.timestamp_frequency {
            if !(ts_freq.is_finite() && ts_freq >= 1.0) {
                return Err(invalid(format!(
                    "timestamp_frequency must be >= 1 Hz, got {}",
                    ts_freq
                )));
            }
        }
        if output.gain == Some(0) {
            return Err(invalid("gain must be at least 1".to_string()));
        }
        if output.comment.len() > 127 {
            return Err(invalid("comment must be shorter than 128 bytes".to_string()));
        }

        Ok(())
    }
}

pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config> {
    let config_str = fs::read_to_string(path)?;
    Ok(serde_yaml::from_str(&config_str)?)
}

pub fn save_config<P: AsRef<Path>>(config: &Config, path: P) -> Result<()> {
    let yaml = serde_yaml::to_string(config)?;
    fs::write(path, yaml)?;
    Ok(())
}
