use std::path::Path;

use crate::error::{Error, Result};
use crate::recording::{default_channel_name, Channel, Recording};

/// Reads one column per channel and one row per sample.
pub fn read_recording_csv<P: AsRef<Path>>(
    path: P,
    sample_rate: f64,
    has_headers: bool,
) -> Result<Recording> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(has_headers)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_path(path)?;

    let names: Option<Vec<String>> = if has_headers {
        Some(rdr.headers()?.iter().map(str::to_string).collect())
    } else {
        None
    };

    let mut data: Vec<Vec<f32>> = Vec::new();
    let first_row = if has_headers { 2 } else { 1 };

    for (row_idx, result) in rdr.records().enumerate() {
        let record = result?;
        let row = first_row + row_idx;

        if data.is_empty() {
            let width = names.as_ref().map_or(record.len(), Vec::len);
            data = vec![Vec::new(); width];
        }
        if record.len() != data.len() {
            return Err(Error::InvalidRecording(format!(
                "row {} has {} columns, expected {}",
                row,
                record.len(),
                data.len()
            )));
        }

        for (col_idx, value) in record.iter().enumerate() {
            let sample: f32 = value.parse().map_err(|_| {
                Error::InvalidRecording(format!(
                    "row {}, column {}: '{}' is not a number",
                    row,
                    col_idx + 1,
                    value
                ))
            })?;
            data[col_idx].push(sample);
        }
    }

    if data.is_empty() {
        if let Some(names) = &names {
            data = vec![Vec::new(); names.len()];
        }
    }

    let channels = data
        .into_iter()
        .enumerate()
        .map(|(idx, samples)| {
            let number = idx as u16 + 1;
            let name = names
                .as_ref()
                .and_then(|n| n.get(idx))
                .filter(|n| !n.is_empty())
                .cloned()
                .unwrap_or_else(|| default_channel_name(number));
            Channel {
                number,
                name,
                samples,
            }
        })
        .collect();

    Recording::new(sample_rate, channels)
}

pub fn write_recording_csv<P: AsRef<Path>>(recording: &Recording, path: P) -> Result<()> {
    let mut wtr = csv::Writer::from_path(path)?;
    wtr.write_record(recording.channels.iter().map(|c| c.name.as_str()))?;

    for index in 0..recording.num_samples() {
        wtr.write_record(
            recording
                .channels
                .iter()
                .map(|c| c.samples[index].to_string()),
        )?;
    }
    wtr.flush()?;
    Ok(())
}
