use chrono::Local;
use colored::Colorize;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use crate::config::Config;
use crate::error::{Error, Result};
use crate::io::csv_recording::read_recording_csv;
use crate::io::plx::{write_plx, PlxSettings, PlxSummary};
use crate::io::sev::read_sev_recording;
use crate::io::times::write_spike_times;
use crate::processing::signal_processor::{DetectionReport, SpikeDetector};
use crate::recording::Recording;
use crate::utils::log::{log_csv, log_with_header};

#[derive(Debug, Clone)]
pub enum InputSource {
    Csv { path: PathBuf, has_headers: bool },
    /// One SEV file per channel of the same stream.
    Sev { paths: Vec<PathBuf> },
}

impl InputSource {
    /// Picks the reader from the file extension.
    pub fn from_paths(paths: Vec<PathBuf>, has_headers: bool) -> Result<Self> {
        let is_sev = |p: &PathBuf| {
            p.extension()
                .map_or(false, |e| e.eq_ignore_ascii_case("sev"))
        };
        if paths.is_empty() {
            return Err(Error::InvalidConfig("no input files given".to_string()));
        }
        if paths.iter().all(is_sev) {
            return Ok(InputSource::Sev { paths });
        }
        match <[PathBuf; 1]>::try_from(paths) {
            Ok([path]) => Ok(InputSource::Csv { path, has_headers }),
            Err(_) => Err(Error::InvalidConfig(
                "give either one CSV file or one or more SEV files".to_string(),
            )),
        }
    }

    pub fn describe(&self) -> String {
        match self {
            InputSource::Csv { path, .. } => path.display().to_string(),
            InputSource::Sev { paths } => match paths.first() {
                Some(first) if paths.len() > 1 => {
                    format!("{} (+{} SEV files)", first.display(), paths.len() - 1)
                }
                Some(first) => first.display().to_string(),
                None => String::new(),
            },
        }
    }
}

#[derive(Debug, Clone)]
pub struct ProcessOptions {
    pub input: InputSource,
    pub output: PathBuf,
    pub times_csv: Option<PathBuf>,
    pub log_dir: Option<PathBuf>,
    pub config: Config,
}

#[derive(Debug, Clone)]
pub struct RunSummary {
    pub report: DetectionReport,
    pub plx: PlxSummary,
    pub elapsed: Duration,
}

pub fn load_recording(input: &InputSource, config: &Config) -> Result<Recording> {
    let sample_rate = config.processor.sample_rate;
    match input {
        InputSource::Csv { path, has_headers } => {
            let sample_rate = sample_rate.ok_or_else(|| {
                Error::InvalidConfig("CSV input needs processor.sample_rate".to_string())
            })?;
            read_recording_csv(path, sample_rate, *has_headers)
        }
        InputSource::Sev { paths } => read_sev_recording(paths, sample_rate),
    }
}

fn write_logs(log_dir: &Path, options: &ProcessOptions, summary: &RunSummary) -> Result<()> {
    let report = &summary.report;
    let per_channel = report
        .channels
        .iter()
        .map(|c| {
            format!(
                "{} ({}): {} spikes, threshold {:.4e}, {} clipped, {} artifacts{}",
                c.channel,
                c.name,
                c.spikes.len(),
                c.mean_threshold(),
                c.edge_clipped,
                c.artifacts,
                if c.capped { ", capped" } else { "" }
            )
        })
        .collect::<Vec<_>>()
        .join("\n");

    log_with_header(
        log_dir,
        "spike_detection.log",
        &format!("{} -> {}", options.input.describe(), options.output.display()),
        &per_channel,
    )?;

    log_csv(
        log_dir,
        "runs.csv",
        &[
            "timestamp",
            "input",
            "output",
            "channels",
            "samples",
            "sample_rate",
            "spikes",
            "elapsed_ms",
        ],
        &[
            Local::now().to_rfc3339(),
            options.input.describe(),
            options.output.display().to_string(),
            report.channels.len().to_string(),
            report.num_samples.to_string(),
            report.sample_rate.to_string(),
            report.total_spikes().to_string(),
            summary.elapsed.as_millis().to_string(),
        ],
    )?;
    Ok(())
}

/// Loads a recording, detects spikes on every selected channel and writes the PLX file.
pub fn process_file(options: &ProcessOptions) -> Result<RunSummary> {
    let start = Instant::now();

    println!("{} {}", "Loading".green().bold(), options.input.describe());
    let recording = load_recording(&options.input, &options.config)?;
    println!(
        "Loaded {} channels x {} samples at {:.4} Hz ({:.1} s)",
        recording.channels.len(),
        recording.num_samples(),
        recording.sample_rate,
        recording.duration_s()
    );

    let detector = SpikeDetector::new(options.config.clone());
    let report = detector.run(&recording)?;
    println!(
        "{} {} spikes across {} channels",
        "Detected".green().bold(),
        report.total_spikes(),
        report.channels.len()
    );
    for channel in report.channels.iter().filter(|c| c.capped) {
        println!(
            "{} channel {} hit max_spikes_per_channel",
            "warning:".yellow().bold(),
            channel.channel
        );
    }

    let plx = write_plx(
        &options.output,
        &report,
        &PlxSettings::from_config(&options.config),
    )?;
    println!(
        "{} {} ({} bytes)",
        "Wrote".green().bold(),
        options.output.display(),
        plx.bytes_written
    );

    if let Some(times_path) = &options.times_csv {
        let rows = write_spike_times(times_path, &report)?;
        println!("{} {} ({} rows)", "Wrote".green().bold(), times_path.display(), rows);
    }

    let summary = RunSummary {
        report,
        plx,
        elapsed: start.elapsed(),
    };

    if let Some(log_dir) = &options.log_dir {
        write_logs(log_dir, options, &summary)?;
    }

    println!("Finished in {:?}", summary.elapsed);
    Ok(summary)
}
