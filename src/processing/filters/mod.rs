pub mod bandpass;

/// Reflection padding actually applied to a signal of `len` samples.
pub fn reflection_len(pad_length: usize, len: usize) -> usize {
    pad_length.min(len.saturating_sub(1))
}

pub trait FilterInstance: Send {
    fn filter_sample(&mut self, sample: f64) -> f64;

    /// Clears the sample history.
    fn reset(&mut self);

    /// Loads the history as if `value` had been held at the input forever.
    fn prime(&mut self, value: f64);

    /// Number of samples of reflection padding used by `filtfilt`.
    fn pad_length(&self) -> usize;

    /// Causal single pass over a whole channel.
    fn filter_signal(&mut self, data: &[f32]) -> Vec<f32> {
        self.reset();
        if let Some(&first) = data.first() {
            self.prime(first as f64);
        }
        data.iter()
            .map(|&sample| self.filter_sample(sample as f64) as f32)
            .collect()
    }

    /// Zero-phase forward-backward pass with odd reflection padding at both ends.
    fn filtfilt(&mut self, data: &[f32]) -> Vec<f32> {
        let n = data.len();
        if n == 0 {
            return Vec::new();
        }
        let pad = reflection_len(self.pad_length(), n);

        let first = data[0] as f64;
        let last = data[n - 1] as f64;
        let mut padded: Vec<f64> = Vec::with_capacity(n + 2 * pad);
        padded.extend((1..=pad).rev().map(|k| 2.0 * first - data[k] as f64));
        padded.extend(data.iter().map(|&x| x as f64));
        padded.extend((1..=pad).map(|k| 2.0 * last - data[n - 1 - k] as f64));

        let mut forward = self.run_primed(&padded);
        forward.reverse();
        let mut backward = self.run_primed(&forward);
        backward.reverse();

        backward[pad..pad + n].iter().map(|&y| y as f32).collect()
    }

    #[doc(hidden)]
    fn run_primed(&mut self, samples: &[f64]) -> Vec<f64> {
        self.reset();
        if let Some(&first) = samples.first() {
            self.prime(first);
        }
        samples
            .iter()
            .map(|&sample| self.filter_sample(sample))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn padding_is_capped_below_the_signal_length() {
        assert_eq!(reflection_len(27, 1000), 27);
        assert_eq!(reflection_len(27, 28), 27);
        assert_eq!(reflection_len(27, 10), 9);
        assert_eq!(reflection_len(27, 1), 0);
        assert_eq!(reflection_len(27, 0), 0);
    }
}
