use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use colored::Colorize;
use std::path::PathBuf;

use tdt_spikes::io::csv_recording::write_recording_csv;
use tdt_spikes::io::plx::read_plx;
use tdt_spikes::local::process_file::{process_file, InputSource, ProcessOptions};
use tdt_spikes::simulate::{simulate, SimulationConfig};
use tdt_spikes::{load_config, save_config, Config, VoltageUnits};

/// Offline spike detection for TDT recordings, writing Plexon PLX files.
#[derive(Parser)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Detect spikes in a recording and write them to a PLX file.
    Detect {
        /// One CSV file (one column per channel) or one or more SEV files.
        #[arg(required = true)]
        inputs: Vec<PathBuf>,

        /// YAML configuration; defaults are used for anything it leaves out.
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Output PLX path.
        #[arg(short, long, default_value = "spikes.plx")]
        output: PathBuf,

        /// Also write spike times to this CSV file.
        #[arg(long)]
        times_csv: Option<PathBuf>,

        /// Sampling rate in Hz. Required for CSV input, overrides SEV headers.
        #[arg(short = 'r', long)]
        sample_rate: Option<f64>,

        /// The CSV input has no header row.
        #[arg(long)]
        no_headers: bool,

        /// Append run logs to this directory.
        #[arg(long, default_value = "logs")]
        log_dir: PathBuf,

        /// Do not write run logs.
        #[arg(long)]
        no_logs: bool,

        #[arg(short, long)]
        verbose: bool,
    },
    /// Print the headers and per-channel spike counts of a PLX file.
    Inspect { path: PathBuf },
    /// Write a synthetic recording with known spikes to a CSV file.
    Simulate {
        #[arg(short, long, default_value = "simulated.csv")]
        output: PathBuf,

        #[arg(long, default_value_t = 24414.0625)]
        sample_rate: f64,

        #[arg(long, default_value_t = 10.0)]
        duration: f64,

        #[arg(long, default_value_t = 4)]
        channels: usize,

        /// Background noise standard deviation in microvolts.
        #[arg(long, default_value_t = 10.0)]
        noise_uv: f64,

        #[arg(long, default_value_t = 20.0)]
        rate_hz: f64,

        #[arg(long, default_value_t = 100.0)]
        amplitude_uv: f64,

        #[arg(long, default_value_t = 0)]
        seed: u64,
    },
    /// Write the default configuration as YAML.
    InitConfig {
        #[arg(default_value = "config.yaml")]
        path: PathBuf,

        /// Overwrite an existing file.
        #[arg(long)]
        force: bool,
    },
}

fn main() -> Result<(), anyhow::Error> {
    match Cli::parse().command {
        Command::Detect {
            inputs,
            config,
            output,
            times_csv,
            sample_rate,
            no_headers,
            log_dir,
            no_logs,
            verbose,
        } => {
            let mut config = match config {
                Some(path) => load_config(&path)
                    .with_context(|| format!("failed to load config {}", path.display()))?,
                None => Config::default(),
            };
            if sample_rate.is_some() {
                config.processor.sample_rate = sample_rate;
            }
            config.processor.verbose |= verbose;

            let options = ProcessOptions {
                input: InputSource::from_paths(inputs, !no_headers)?,
                output,
                times_csv,
                log_dir: (!no_logs).then_some(log_dir),
                config,
            };
            process_file(&options)?;
        }
        Command::Inspect { path } => {
            let plx = read_plx(&path).with_context(|| format!("failed to read {}", path.display()))?;
            let header = &plx.header;
            println!("{} {}", "PLX".green().bold(), path.display());
            println!("  version:        {}", header.version);
            println!("  comment:        {}", header.comment);
            if let Some(recorded_at) = header.recorded_at {
                println!("  recorded:       {}", recorded_at);
            }
            println!("  timestamp freq: {} Hz", header.ad_frequency);
            println!("  waveform freq:  {} Hz", header.waveform_freq);
            println!(
                "  waveform:       {} points, {} before threshold",
                header.num_points_wave, header.num_points_pre_thr
            );
            println!(
                "  duration:       {:.3} s",
                header.last_timestamp / header.ad_frequency.max(1) as f64
            );
            println!("  spikes:         {}", plx.spikes.len());
            for channel in &plx.channels {
                let count = header
                    .ts_counts
                    .get(channel.channel as usize)
                    .map_or(0, |counts| counts[0]);
                println!(
                    "  {:>4} {:<16} gain {:>6}  threshold {:>6}  {} spikes",
                    channel.channel, channel.name, channel.gain, channel.threshold, count
                );
            }
        }
        Command::Simulate {
            output,
            sample_rate,
            duration,
            channels,
            noise_uv,
            rate_hz,
            amplitude_uv,
            seed,
        } => {
            let sim = SimulationConfig {
                sample_rate,
                duration_s: duration,
                num_channels: channels,
                noise_uv,
                spike_rate_hz: rate_hz,
                spike_amplitude_uv: amplitude_uv,
                units: VoltageUnits::Volts,
                seed,
            };
            let (recording, truth) = simulate(&sim)?;
            write_recording_csv(&recording, &output)?;
            println!(
                "{} {} ({} channels, {} spikes, {} Hz, volts)",
                "Wrote".green().bold(),
                output.display(),
                recording.channels.len(),
                truth.iter().map(Vec::len).sum::<usize>(),
                sample_rate
            );
        }
        Command::InitConfig { path, force } => {
            if path.exists() && !force {
                bail!("{} already exists, pass --force to overwrite", path.display());
            }
            save_config(&Config::default(), &path)?;
            println!("{} {}", "Wrote".green().bold(), path.display());
        }
    }
    Ok(())
}
