use super::threshold::{Polarity, ThresholdProfile};
use super::Spike;
use crate::config::ExtractionConfig;

/// Spikes kept on one channel plus counts of the events that were dropped.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Extraction {
    pub spikes: Vec<Spike>,
    /// Events whose waveform window ran off either end of the recording.
    pub edge_clipped: usize,
    /// Events rejected for exceeding the artifact limit.
    pub artifacts: usize,
    /// Set when `max_spikes_per_channel` stopped the scan early.
    pub capped: bool,
}

pub struct SpikeExtractor {
    polarity: Polarity,
    pre_peak: usize,
    post_peak: usize,
    peak_search: usize,
    shadow: usize,
    artifact_multiplier: Option<f32>,
    max_spikes: Option<usize>,
}

impl SpikeExtractor {
    pub fn new(config: &ExtractionConfig, polarity: Polarity, fs: f64) -> Self {
        Self {
            polarity,
            pre_peak: config.pre_peak,
            post_peak: config.post_peak,
            peak_search: config.peak_search_samples(fs),
            shadow: config.shadow_samples(fs),
            artifact_multiplier: config.artifact_multiplier.map(|m| m as f32),
            max_spikes: config.max_spikes_per_channel,
        }
    }

    pub fn waveform_length(&self) -> usize {
        self.pre_peak + self.post_peak
    }

    pub fn extract(&self, channel: u16, filtered: &[f32], profile: &ThresholdProfile) -> Extraction {
        let mut extraction = Extraction::default();
        let n = filtered.len();
        let mut index = 1;

        while index < n {
            if !self.is_crossing(filtered, profile, index) {
                index += 1;
                continue;
            }

            let peak = self.find_peak(filtered, index);

            if peak < self.pre_peak || peak + self.post_peak > n {
                extraction.edge_clipped += 1;
                index += 1;
                continue;
            }

            let next_allowed = (peak + self.shadow).max(index + 1);

            if let Some(multiplier) = self.artifact_multiplier {
                if filtered[peak].abs() > multiplier * profile.noise_at(peak) {
                    extraction.artifacts += 1;
                    index = next_allowed;
                    continue;
                }
            }

            if self.max_spikes == Some(extraction.spikes.len()) {
                extraction.capped = true;
                break;
            }

            extraction.spikes.push(Spike {
                channel,
                index: peak,
                threshold_index: index,
                amplitude: filtered[peak],
                threshold: self.polarity.signed_for(profile.threshold_at(index), filtered[peak]),
                waveform: filtered[peak - self.pre_peak..peak + self.post_peak].to_vec(),
            });
            index = next_allowed;
        }

        extraction
    }

    fn is_crossing(&self, filtered: &[f32], profile: &ThresholdProfile, index: usize) -> bool {
        let threshold = profile.threshold_at(index);
        if threshold <= 0.0 {
            return false;
        }
        let previous_threshold = profile.threshold_at(index - 1);
        self.polarity.is_beyond(filtered[index], threshold)
            && !self.polarity.is_beyond(filtered[index - 1], previous_threshold)
    }

    /// Most extreme sample in the search window starting at the crossing; earliest wins ties.
    fn find_peak(&self, filtered: &[f32], crossing: usize) -> usize {
        let end = (crossing + self.peak_search).min(filtered.len());
        (crossing + 1..end).fold(crossing, |best, candidate| {
            if self.polarity.is_more_extreme(filtered[candidate], filtered[best]) {
                candidate
            } else {
                best
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FS: f64 = 10000.0;

    fn extractor(polarity: Polarity, config: ExtractionConfig) -> SpikeExtractor {
        SpikeExtractor::new(&config, polarity, FS)
    }

    fn small_config() -> ExtractionConfig {
        // 4 samples before the peak, 6 from it, 5-sample search, 10-sample shadow
        ExtractionConfig {
            pre_peak: 4,
            post_peak: 6,
            peak_search_ms: 0.5,
            shadow_ms: 1.0,
            ..ExtractionConfig::default()
        }
    }

    fn insert_spike(signal: &mut [f32], at: usize, depth: f32) {
        signal[at - 1] = -0.6 * depth;
        signal[at] = -depth;
        signal[at + 1] = -0.4 * depth;
        signal[at + 2] = 0.2 * depth;
    }

    #[test]
    fn aligns_waveform_on_peak() {
        let mut signal = vec![0.0; 100];
        insert_spike(&mut signal, 40, 5.0);
        let profile = ThresholdProfile::constant(100, 0.5, 2.0);

        let extraction = extractor(Polarity::Negative, small_config()).extract(3, &signal, &profile);

        assert_eq!(extraction.spikes.len(), 1);
        let spike = &extraction.spikes[0];
        assert_eq!(spike.channel, 3);
        assert_eq!(spike.threshold_index, 39);
        assert_eq!(spike.index, 40);
        assert_eq!(spike.amplitude, -5.0);
        assert_eq!(spike.threshold, -2.0);
        assert_eq!(spike.waveform.len(), 10);
        assert_eq!(spike.waveform[4], -5.0);
        assert_eq!(spike.waveform[3], -3.0);
    }

    #[test]
    fn shadow_suppresses_close_events() {
        let mut signal = vec![0.0; 200];
        insert_spike(&mut signal, 40, 5.0);
        insert_spike(&mut signal, 46, 5.0); // inside the 10-sample shadow
        insert_spike(&mut signal, 80, 5.0);
        let profile = ThresholdProfile::constant(200, 0.5, 2.0);

        let extraction = extractor(Polarity::Negative, small_config()).extract(1, &signal, &profile);
        let peaks: Vec<usize> = extraction.spikes.iter().map(|s| s.index).collect();
        assert_eq!(peaks, vec![40, 80]);
    }

    #[test]
    fn zero_shadow_allows_back_to_back_events() {
        let mut signal = vec![0.0; 200];
        insert_spike(&mut signal, 40, 5.0);
        insert_spike(&mut signal, 46, 5.0);
        let profile = ThresholdProfile::constant(200, 0.5, 2.0);
        let config = ExtractionConfig {
            shadow_ms: 0.0,
            peak_search_ms: 0.2,
            ..small_config()
        };

        let extraction = extractor(Polarity::Negative, config).extract(1, &signal, &profile);
        let peaks: Vec<usize> = extraction.spikes.iter().map(|s| s.index).collect();
        assert_eq!(peaks, vec![40, 46]);
    }

    #[test]
    fn drops_events_at_the_edges() {
        let mut signal = vec![0.0; 60];
        insert_spike(&mut signal, 2, 5.0);
        insert_spike(&mut signal, 30, 5.0);
        insert_spike(&mut signal, 56, 5.0);
        let profile = ThresholdProfile::constant(60, 0.5, 2.0);

        let extraction = extractor(Polarity::Negative, small_config()).extract(1, &signal, &profile);
        assert_eq!(extraction.spikes.len(), 1);
        assert_eq!(extraction.spikes[0].index, 30);
        assert_eq!(extraction.edge_clipped, 2);
    }

    #[test]
    fn rejects_artifacts() {
        let mut signal = vec![0.0; 200];
        insert_spike(&mut signal, 40, 50.0);
        insert_spike(&mut signal, 120, 5.0);
        let profile = ThresholdProfile::constant(200, 0.5, 2.0);
        let config = ExtractionConfig {
            artifact_multiplier: Some(20.0),
            ..small_config()
        };

        let extraction = extractor(Polarity::Negative, config).extract(1, &signal, &profile);
        assert_eq!(extraction.artifacts, 1);
        assert_eq!(extraction.spikes.len(), 1);
        assert_eq!(extraction.spikes[0].index, 120);
    }

    #[test]
    fn artifacts_start_a_shadow() {
        let mut signal = vec![0.0; 200];
        insert_spike(&mut signal, 40, 50.0);
        insert_spike(&mut signal, 46, 5.0); // inside the artifact's shadow
        insert_spike(&mut signal, 80, 5.0);
        let profile = ThresholdProfile::constant(200, 0.5, 2.0);
        let config = ExtractionConfig {
            artifact_multiplier: Some(20.0),
            ..small_config()
        };

        let extraction = extractor(Polarity::Negative, config).extract(1, &signal, &profile);
        let peaks: Vec<usize> = extraction.spikes.iter().map(|s| s.index).collect();
        assert_eq!(extraction.artifacts, 1);
        assert_eq!(peaks, vec![80]);
    }

    #[test]
    fn edge_clipped_events_do_not_start_a_shadow() {
        let mut signal = vec![0.0; 100];
        insert_spike(&mut signal, 2, 5.0); // peak before pre_peak
        insert_spike(&mut signal, 8, 5.0); // 6 samples later, within the shadow length
        let profile = ThresholdProfile::constant(100, 0.5, 2.0);

        let extraction = extractor(Polarity::Negative, small_config()).extract(1, &signal, &profile);
        let peaks: Vec<usize> = extraction.spikes.iter().map(|s| s.index).collect();
        assert_eq!(extraction.edge_clipped, 1);
        assert_eq!(peaks, vec![8]);
    }

    #[test]
    fn earliest_peak_wins_ties() {
        let mut signal = vec![0.0; 100];
        signal[39] = -3.0;
        signal[40] = -5.0;
        signal[41] = -4.0;
        signal[42] = -5.0;
        let profile = ThresholdProfile::constant(100, 0.5, 2.0);
        let negative = extractor(Polarity::Negative, small_config()).extract(1, &signal, &profile);
        assert_eq!(negative.spikes[0].index, 40);

        let mut signal = vec![0.0; 100];
        signal[39] = -3.0;
        signal[40] = -5.0;
        signal[41] = 5.0;
        let both = extractor(Polarity::Both, small_config()).extract(1, &signal, &profile);
        assert_eq!(both.spikes[0].index, 40);
        assert_eq!(both.spikes[0].threshold, -2.0);
    }

    #[test]
    fn follows_polarity() {
        let mut signal = vec![0.0; 100];
        insert_spike(&mut signal, 40, -5.0); // upward event
        let profile = ThresholdProfile::constant(100, 0.5, 2.0);

        let negative = extractor(Polarity::Negative, small_config()).extract(1, &signal, &profile);
        assert!(negative.spikes.is_empty());

        let positive = extractor(Polarity::Positive, small_config()).extract(1, &signal, &profile);
        assert_eq!(positive.spikes.len(), 1);
        assert_eq!(positive.spikes[0].amplitude, 5.0);
        assert_eq!(positive.spikes[0].threshold, 2.0);

        let both = extractor(Polarity::Both, small_config()).extract(1, &signal, &profile);
        assert_eq!(both.spikes[0].index, 40);
    }

    #[test]
    fn caps_spike_count() {
        let mut signal = vec![0.0; 300];
        for at in [40, 80, 120, 160] {
            insert_spike(&mut signal, at, 5.0);
        }
        let profile = ThresholdProfile::constant(300, 0.5, 2.0);
        let config = ExtractionConfig {
            max_spikes_per_channel: Some(2),
            ..small_config()
        };

        let extraction = extractor(Polarity::Negative, config).extract(1, &signal, &profile);
        assert_eq!(extraction.spikes.len(), 2);
        assert!(extraction.capped);
        assert_eq!(extraction.spikes[1].index, 80);
    }

    #[test]
    fn zero_threshold_detects_nothing() {
        let profile = ThresholdProfile::constant(50, 0.0, 0.0);
        let signal: Vec<f32> = (0..50).map(|i| if i % 2 == 0 { 1.0 } else { -1.0 }).collect();
        let extraction = extractor(Polarity::Both, small_config()).extract(1, &signal, &profile);
        assert!(extraction.spikes.is_empty());
    }
}
