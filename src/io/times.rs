use serde::Serialize;
use std::path::Path;

use crate::error::Result;
use crate::processing::signal_processor::DetectionReport;

#[derive(Debug, Serialize)]
struct SpikeTimeRow {
    channel: u16,
    unit: u16,
    sample_index: usize,
    time_s: f64,
    amplitude: f32,
    threshold: f32,
}

/// Writes one row per spike, in time order, next to the PLX output.
pub fn write_spike_times<P: AsRef<Path>>(path: P, report: &DetectionReport) -> Result<usize> {
    let mut wtr = csv::Writer::from_path(path)?;
    let spikes = report.spikes_in_time_order();

    for spike in &spikes {
        wtr.serialize(SpikeTimeRow {
            channel: spike.channel,
            unit: 0,
            sample_index: spike.index,
            time_s: spike.time_s(report.sample_rate),
            amplitude: spike.amplitude,
            threshold: spike.threshold,
        })?;
    }
    wtr.flush()?;
    Ok(spikes.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::processing::detectors::threshold::{Polarity, ThresholdProfile};
    use crate::processing::detectors::Spike;
    use crate::processing::signal_processor::ChannelSpikes;

    #[test]
    fn writes_header_and_rows_in_time_order() {
        let make = |channel, index| Spike {
            channel,
            index,
            threshold_index: index,
            amplitude: -2.0,
            threshold: -1.0,
            waveform: vec![],
        };
        let report = DetectionReport {
            sample_rate: 1000.0,
            num_samples: 5000,
            polarity: Polarity::Negative,
            pre_peak: 0,
            waveform_length: 0,
            channels: vec![
                ChannelSpikes {
                    channel: 1,
                    name: "a".to_string(),
                    spikes: vec![make(1, 3000)],
                    thresholds: ThresholdProfile::constant(5000, 0.25, 1.0),
                    edge_clipped: 0,
                    artifacts: 0,
                    capped: false,
                },
                ChannelSpikes {
                    channel: 2,
                    name: "b".to_string(),
                    spikes: vec![make(2, 1500)],
                    thresholds: ThresholdProfile::constant(5000, 0.25, 1.0),
                    edge_clipped: 0,
                    artifacts: 0,
                    capped: false,
                },
            ],
        };

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("times.csv");
        assert_eq!(write_spike_times(&path, &report).unwrap(), 2);

        let text = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "channel,unit,sample_index,time_s,amplitude,threshold");
        assert_eq!(lines[1], "2,0,1500,1.5,-2.0,-1.0");
        assert_eq!(lines[2], "1,0,3000,3.0,-2.0,-1.0");
    }
}
