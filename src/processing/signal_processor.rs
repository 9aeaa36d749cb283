use super::detectors::spike::SpikeExtractor;
use super::detectors::threshold::{AdaptiveThreshold, Polarity, ThresholdProfile};
use super::detectors::Spike;
use super::filters::bandpass::BandPassFilter;
use crate::config::Config;
use crate::error::{Error, Result};
use crate::recording::{Channel, Recording};

use colored::Colorize;
use rayon::prelude::*;
use std::time::Instant;

// -----------------------------------------------------------------------------
// RESULTS
// -----------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct ChannelSpikes {
    pub channel: u16,
    pub name: String,
    pub spikes: Vec<Spike>,
    pub thresholds: ThresholdProfile,
    pub edge_clipped: usize,
    pub artifacts: usize,
    pub capped: bool,
}

impl ChannelSpikes {
    pub fn mean_threshold(&self) -> f32 {
        self.thresholds.mean_threshold()
    }

    pub fn firing_rate(&self, duration_s: f64) -> f64 {
        if duration_s > 0.0 {
            self.spikes.len() as f64 / duration_s
        } else {
            0.0
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DetectionReport {
    pub sample_rate: f64,
    pub num_samples: usize,
    pub polarity: Polarity,
    pub pre_peak: usize,
    pub waveform_length: usize,
    pub channels: Vec<ChannelSpikes>,
}

impl DetectionReport {
    pub fn total_spikes(&self) -> usize {
        self.channels.iter().map(|c| c.spikes.len()).sum()
    }

    pub fn duration_s(&self) -> f64 {
        self.num_samples as f64 / self.sample_rate
    }

    pub fn channel(&self, number: u16) -> Option<&ChannelSpikes> {
        self.channels.iter().find(|c| c.channel == number)
    }

    /// Every spike across channels, ordered by peak index then channel number.
    pub fn spikes_in_time_order(&self) -> Vec<&Spike> {
        let mut spikes: Vec<&Spike> = self.channels.iter().flat_map(|c| &c.spikes).collect();
        spikes.sort_by_key(|s| (s.index, s.channel));
        spikes
    }
}

// -----------------------------------------------------------------------------
// CHANNEL PROCESSOR
// -----------------------------------------------------------------------------

/// Filter, threshold and extraction stages for a single channel.
pub struct ChannelProcessor {
    filter: BandPassFilter,
    threshold: AdaptiveThreshold,
    extractor: SpikeExtractor,
}

impl ChannelProcessor {
    pub fn new(config: &Config, fs: f64) -> Result<Self> {
        Ok(Self {
            filter: BandPassFilter::new(config.filter.clone(), fs)?,
            threshold: AdaptiveThreshold::new(&config.threshold, fs),
            extractor: SpikeExtractor::new(&config.extraction, config.threshold.polarity, fs),
        })
    }

    pub fn process(&mut self, channel: &Channel) -> ChannelSpikes {
        let filtered = self.filter.apply(&channel.samples);
        let profile = self.threshold.compute(&filtered);
        let extraction = self.extractor.extract(channel.number, &filtered, &profile);

        ChannelSpikes {
            channel: channel.number,
            name: channel.name.clone(),
            spikes: extraction.spikes,
            thresholds: profile,
            edge_clipped: extraction.edge_clipped,
            artifacts: extraction.artifacts,
            capped: extraction.capped,
        }
    }
}

// -----------------------------------------------------------------------------
// SPIKE DETECTOR
// -----------------------------------------------------------------------------

pub struct SpikeDetector {
    config: Config,
}

impl SpikeDetector {
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    fn select_channels<'a>(&self, recording: &'a Recording) -> Result<Vec<&'a Channel>> {
        match &self.config.processor.channels {
            None => Ok(recording.channels.iter().collect()),
            Some(numbers) => numbers
                .iter()
                .map(|&number| {
                    recording.channel(number).ok_or_else(|| {
                        Error::InvalidConfig(format!(
                            "channel {} is not present in the recording",
                            number
                        ))
                    })
                })
                .collect(),
        }
    }

    pub fn run(&self, recording: &Recording) -> Result<DetectionReport> {
        recording.validate()?;
        let fs = recording.sample_rate;
        self.config.validate(fs)?;

        let channels = self.select_channels(recording)?;
        let verbose = self.config.processor.verbose;
        let duration_s = recording.duration_s();

        let results = channels
            .par_iter()
            .map(|channel| -> Result<ChannelSpikes> {
                let start = Instant::now();
                let mut processor = ChannelProcessor::new(&self.config, fs)?;
                let result = processor.process(channel);

                if verbose {
                    println!(
                        "{} {} - {} spikes ({:.1} Hz), threshold {:.3e}, {} clipped, {} artifacts in {:?}",
                        "channel".cyan(),
                        channel.name,
                        result.spikes.len(),
                        result.firing_rate(duration_s),
                        result.mean_threshold(),
                        result.edge_clipped,
                        result.artifacts,
                        start.elapsed()
                    );
                }
                Ok(result)
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(DetectionReport {
            sample_rate: fs,
            num_samples: recording.num_samples(),
            polarity: self.config.threshold.polarity,
            pre_peak: self.config.extraction.pre_peak,
            waveform_length: self.config.extraction.waveform_length(),
            channels: results,
        })
    }
}
