// src/recording.rs
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::error::{Error, Result};

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum VoltageUnits {
    Volts,
    Millivolts,
    Microvolts,
}

impl VoltageUnits {
    /// Multiplier taking a value in these units to millivolts.
    pub fn to_millivolts(self) -> f64 {
        match self {
            VoltageUnits::Volts => 1000.0,
            VoltageUnits::Millivolts => 1.0,
            VoltageUnits::Microvolts => 0.001,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Channel {
    pub number: u16,
    pub name: String,
    pub samples: Vec<f32>,
}

impl Channel {
    pub fn new(number: u16, samples: Vec<f32>) -> Self {
        Self {
            number,
            name: default_channel_name(number),
            samples,
        }
    }
}

pub fn default_channel_name(number: u16) -> String {
    format!("ch{:03}", number)
}

/// A block of multi-channel voltage data held in memory.
#[derive(Debug, Clone, PartialEq)]
pub struct Recording {
    pub sample_rate: f64,
    pub channels: Vec<Channel>,
}

impl Recording {
    pub fn new(sample_rate: f64, channels: Vec<Channel>) -> Result<Self> {
        let recording = Self {
            sample_rate,
            channels,
        };
        recording.validate()?;
        Ok(recording)
    }

    /// Builds a recording from bare sample vectors, numbering channels from 1.
    pub fn from_samples(sample_rate: f64, data: Vec<Vec<f32>>) -> Result<Self> {
        if data.len() > u16::MAX as usize {
            return Err(Error::InvalidRecording(format!(
                "too many channels: {}",
                data.len()
            )));
        }
        let channels = data
            .into_iter()
            .enumerate()
            .map(|(idx, samples)| Channel::new(idx as u16 + 1, samples))
            .collect();
        Self::new(sample_rate, channels)
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.sample_rate.is_finite() && self.sample_rate > 0.0) {
            return Err(Error::InvalidRecording(format!(
                "sample rate must be positive, got {}",
                self.sample_rate
            )));
        }
        let first = self
            .channels
            .first()
            .ok_or_else(|| Error::InvalidRecording("recording has no channels".to_string()))?;

        let mut seen = HashSet::new();
        for channel in &self.channels {
            if channel.number == 0 {
                return Err(Error::InvalidRecording(format!(
                    "channel '{}' has number 0; channels are numbered from 1",
                    channel.name
                )));
            }
            if !seen.insert(channel.number) {
                return Err(Error::InvalidRecording(format!(
                    "duplicate channel number {}",
                    channel.number
                )));
            }
            if channel.samples.len() != first.samples.len() {
                return Err(Error::InvalidRecording(format!(
                    "channel {} has {} samples, expected {}",
                    channel.number,
                    channel.samples.len(),
                    first.samples.len()
                )));
            }
        }
        Ok(())
    }

    pub fn num_samples(&self) -> usize {
        self.channels.first().map_or(0, |c| c.samples.len())
    }

    pub fn duration_s(&self) -> f64 {
        self.num_samples() as f64 / self.sample_rate
    }

    pub fn channel(&self, number: u16) -> Option<&Channel> {
        self.channels.iter().find(|c| c.number == number)
    }
}
