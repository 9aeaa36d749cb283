//! Plexon PLX files: writer for detected spikes and a reader for inspecting them.
//!
//! Layout (little-endian): a 7504-byte file header, one 1020-byte header per
//! spike channel, 296-byte event and slow channel headers, then a stream of
//! data blocks. Every spike block carries a 16-byte block header followed by
//! its i16 waveform samples.

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use chrono::{Datelike, Local, NaiveDate, NaiveDateTime, Timelike};
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use crate::config::{Config, OutputConfig};
use crate::error::{Error, Result};
use crate::processing::signal_processor::{ChannelSpikes, DetectionReport};
use crate::recording::VoltageUnits;

pub const PLX_MAGIC: u32 = 0x5845_4c50; // "PLEX"
pub const PLX_VERSION: i32 = 106;
pub const FILE_HEADER_BYTES: usize = 7504;
pub const CHANNEL_HEADER_BYTES: usize = 1020;
pub const EVENT_HEADER_BYTES: usize = 296;
pub const SLOW_HEADER_BYTES: usize = 296;
pub const BLOCK_HEADER_BYTES: usize = 16;
pub const MAX_CHANNELS: usize = 128;

const COUNT_CHANNELS: usize = 130;
const COUNT_UNITS: usize = 5;
const COUNT_EVENTS: usize = 512;
const BLOCK_SPIKE: i16 = 1;
const MAX_SLOW_CHANNELS: usize = 1024;
const MAX_BLOCK_SAMPLES: usize = i16::MAX as usize;
const MAX_TIMESTAMP: u64 = (1 << 40) - 1;

#[derive(Debug, Clone, PartialEq)]
pub struct PlxFileHeader {
    pub version: i32,
    pub comment: String,
    pub ad_frequency: i32,
    pub num_dsp_channels: i32,
    pub num_event_channels: i32,
    pub num_slow_channels: i32,
    pub num_points_wave: i32,
    pub num_points_pre_thr: i32,
    pub recorded_at: Option<NaiveDateTime>,
    pub fast_read: i32,
    pub waveform_freq: i32,
    pub last_timestamp: f64,
    pub trodalness: u8,
    pub data_trodalness: u8,
    pub bits_per_spike_sample: u8,
    pub bits_per_slow_sample: u8,
    pub spike_max_magnitude_mv: u16,
    pub slow_max_magnitude_mv: u16,
    pub spike_pre_amp_gain: u16,
    pub acquiring_software: String,
    pub processing_software: String,
    pub ts_counts: Vec<[i32; COUNT_UNITS]>,
    pub wf_counts: Vec<[i32; COUNT_UNITS]>,
    pub ev_counts: Vec<i32>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlxChannelHeader {
    pub name: String,
    pub sig_name: String,
    pub channel: i32,
    pub wf_rate: i32,
    pub sig: i32,
    pub reference: i32,
    pub gain: i32,
    pub filter: i32,
    pub threshold: i32,
    pub method: i32,
    pub n_units: i32,
    pub sort_width: i32,
    pub sort_beg: i32,
    pub comment: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlxSpike {
    pub channel: u16,
    pub unit: u16,
    pub timestamp: u64,
    pub waveform: Vec<i16>,
}

#[derive(Debug, Clone)]
pub struct PlxFile {
    pub header: PlxFileHeader,
    pub channels: Vec<PlxChannelHeader>,
    pub spikes: Vec<PlxSpike>,
}

impl PlxFile {
    pub fn channel_header(&self, channel: u16) -> Option<&PlxChannelHeader> {
        self.channels.iter().find(|c| c.channel == channel as i32)
    }

    /// Converts a spike's ADC values back to millivolts.
    pub fn waveform_mv(&self, spike: &PlxSpike) -> Option<Vec<f64>> {
        let gain = self.channel_header(spike.channel)?.gain.max(1) as f64;
        let full_scale = 2f64.powi(self.header.bits_per_spike_sample as i32 - 1);
        let pre_amp = self.header.spike_pre_amp_gain.max(1) as f64;
        let mv_per_bit =
            self.header.spike_max_magnitude_mv as f64 / (full_scale * gain * pre_amp);
        Some(spike.waveform.iter().map(|&v| v as f64 * mv_per_bit).collect())
    }

    pub fn timestamp_s(&self, spike: &PlxSpike) -> f64 {
        spike.timestamp as f64 / self.header.ad_frequency.max(1) as f64
    }
}

// -----------------------------------------------------------------------------
// WRITER
// -----------------------------------------------------------------------------

/// Everything besides the detection report that goes into the file.
#[derive(Debug, Clone)]
pub struct PlxSettings {
    pub output: OutputConfig,
    pub units: VoltageUnits,
    pub band: (f64, f64),
    pub recorded_at: NaiveDateTime,
}

impl PlxSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            output: config.output.clone(),
            units: config.processor.input_units,
            band: (config.filter.f_low, config.filter.f_high),
            recorded_at: Local::now().naive_local(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlxSummary {
    pub num_channels: usize,
    pub spikes_written: usize,
    pub ad_frequency: i32,
    pub bytes_written: u64,
    /// Waveform gain chosen for each channel, in header order.
    pub gains: Vec<(u16, i32)>,
}

struct ChannelScale {
    gain: i32,
    to_adc: f64,
    limit: f64,
}

impl ChannelScale {
    fn new(channel: &ChannelSpikes, settings: &PlxSettings) -> Self {
        let output = &settings.output;
        let to_mv = settings.units.to_millivolts();
        let full_scale = 2f64.powi(output.bits_per_sample as i32 - 1);
        let max_mv = output.max_magnitude_mv as f64;

        let gain = match output.gain {
            Some(gain) => gain.min(i32::MAX as u32) as i32,
            None => {
                let peak_mv = channel
                    .spikes
                    .iter()
                    .flat_map(|s| s.waveform.iter())
                    .fold(0.0f64, |acc, &v| acc.max((v as f64 * to_mv).abs()));
                if peak_mv > 0.0 {
                    (0.9 * max_mv / peak_mv).floor().clamp(1.0, i32::MAX as f64) as i32
                } else {
                    1
                }
            }
        };

        Self {
            gain,
            to_adc: to_mv * full_scale * gain as f64 / max_mv,
            limit: full_scale,
        }
    }

    fn to_adc(&self, value: f32) -> i16 {
        (value as f64 * self.to_adc)
            .round()
            .clamp(-self.limit, self.limit - 1.0) as i16
    }
}

struct TimestampClock {
    ad_frequency: i32,
    ticks_per_sample: f64,
}

impl TimestampClock {
    fn new(sample_rate: f64, output: &OutputConfig) -> Self {
        let ad_frequency = output
            .timestamp_frequency
            .unwrap_or(sample_rate)
            .round()
            .max(1.0) as i32;
        Self {
            ad_frequency,
            ticks_per_sample: ad_frequency as f64 / sample_rate,
        }
    }

    fn ticks(&self, index: usize) -> Result<u64> {
        let ticks = (index as f64 * self.ticks_per_sample).round() as u64;
        if ticks > MAX_TIMESTAMP {
            return Err(Error::InvalidRecording(format!(
                "sample {} does not fit a 40-bit PLX timestamp",
                index
            )));
        }
        Ok(ticks)
    }
}

fn write_fixed_str<W: Write>(writer: &mut W, text: &str, len: usize) -> Result<()> {
    let mut bytes = vec![0u8; len];
    let source = text.as_bytes();
    let n = source.len().min(len - 1);
    bytes[..n].copy_from_slice(&source[..n]);
    writer.write_all(&bytes)?;
    Ok(())
}

fn write_zeros<W: Write>(writer: &mut W, len: usize) -> Result<()> {
    writer.write_all(&vec![0u8; len])?;
    Ok(())
}

fn check_channels(report: &DetectionReport) -> Result<()> {
    if report.channels.len() > MAX_CHANNELS {
        return Err(Error::InvalidRecording(format!(
            "PLX files hold at most {} channels, got {}",
            MAX_CHANNELS,
            report.channels.len()
        )));
    }
    if let Some(channel) = report
        .channels
        .iter()
        .find(|c| c.channel == 0 || c.channel as usize > MAX_CHANNELS)
    {
        return Err(Error::InvalidRecording(format!(
            "channel number {} is outside the PLX range 1..={}",
            channel.channel, MAX_CHANNELS
        )));
    }
    Ok(())
}

fn write_file_header<W: Write>(
    writer: &mut W,
    report: &DetectionReport,
    settings: &PlxSettings,
    clock: &TimestampClock,
) -> Result<()> {
    let output = &settings.output;
    let when = settings.recorded_at;
    let last_timestamp = match report.num_samples {
        0 => 0.0,
        n => clock.ticks(n - 1)? as f64,
    };

    writer.write_u32::<LittleEndian>(PLX_MAGIC)?;
    writer.write_i32::<LittleEndian>(PLX_VERSION)?;
    write_fixed_str(writer, &output.comment, 128)?;
    writer.write_i32::<LittleEndian>(clock.ad_frequency)?;
    writer.write_i32::<LittleEndian>(report.channels.len() as i32)?;
    writer.write_i32::<LittleEndian>(0)?; // event channels
    writer.write_i32::<LittleEndian>(0)?; // slow channels
    writer.write_i32::<LittleEndian>(report.waveform_length as i32)?;
    writer.write_i32::<LittleEndian>(report.pre_peak as i32)?;
    writer.write_i32::<LittleEndian>(when.year())?;
    writer.write_i32::<LittleEndian>(when.month() as i32)?;
    writer.write_i32::<LittleEndian>(when.day() as i32)?;
    writer.write_i32::<LittleEndian>(when.hour() as i32)?;
    writer.write_i32::<LittleEndian>(when.minute() as i32)?;
    writer.write_i32::<LittleEndian>(when.second() as i32)?;
    writer.write_i32::<LittleEndian>(0)?; // fast read
    writer.write_i32::<LittleEndian>(report.sample_rate.round() as i32)?;
    writer.write_f64::<LittleEndian>(last_timestamp)?;
    writer.write_u8(1)?; // trodalness
    writer.write_u8(1)?; // data trodalness
    writer.write_u8(output.bits_per_sample)?;
    writer.write_u8(12)?;
    writer.write_u16::<LittleEndian>(output.max_magnitude_mv)?;
    writer.write_u16::<LittleEndian>(5000)?;
    writer.write_u16::<LittleEndian>(1)?; // spike pre-amp gain
    write_fixed_str(writer, "TDT", 18)?;
    write_fixed_str(writer, env!("CARGO_PKG_NAME"), 18)?;
    write_zeros(writer, 10)?;

    let mut counts = vec![[0i32; COUNT_UNITS]; COUNT_CHANNELS];
    for channel in &report.channels {
        counts[channel.channel as usize][0] = channel.spikes.len() as i32;
    }
    for _ in 0..2 {
        // timestamp counts then waveform counts
        for row in &counts {
            for &count in row {
                writer.write_i32::<LittleEndian>(count)?;
            }
        }
    }
    write_zeros(writer, COUNT_EVENTS * 4)?;
    Ok(())
}

fn write_channel_header<W: Write>(
    writer: &mut W,
    channel: &ChannelSpikes,
    scale: &ChannelScale,
    report: &DetectionReport,
    settings: &PlxSettings,
) -> Result<()> {
    let name = format!("sig{:03}", channel.channel);
    let threshold = scale.to_adc(report.polarity.signed(channel.mean_threshold()));
    let comment = format!(
        "{} {:.0}-{:.0} Hz",
        channel.name, settings.band.0, settings.band.1
    );

    write_fixed_str(writer, &name, 32)?;
    write_fixed_str(writer, &name, 32)?;
    writer.write_i32::<LittleEndian>(channel.channel as i32)?;
    writer.write_i32::<LittleEndian>(10)?; // waveform rate
    writer.write_i32::<LittleEndian>(channel.channel as i32)?;
    writer.write_i32::<LittleEndian>(0)?; // reference
    writer.write_i32::<LittleEndian>(scale.gain)?;
    writer.write_i32::<LittleEndian>(0)?; // filter
    writer.write_i32::<LittleEndian>(threshold as i32)?;
    writer.write_i32::<LittleEndian>(1)?; // sort method: boxes
    writer.write_i32::<LittleEndian>(0)?; // units
    write_zeros(writer, 5 * 64 * 2)?; // templates
    write_zeros(writer, 5 * 4)?; // fit
    writer.write_i32::<LittleEndian>(report.waveform_length as i32)?;
    write_zeros(writer, 5 * 2 * 4 * 2)?; // boxes
    writer.write_i32::<LittleEndian>(0)?; // sort start
    write_fixed_str(writer, &comment, 128)?;
    writer.write_u8(0)?; // source id
    writer.write_u8(0)?;
    writer.write_u16::<LittleEndian>(channel.channel)?;
    write_zeros(writer, 10 * 4)?;
    Ok(())
}

/// Writes the detection report as a PLX stream.
pub fn write_plx_to<W: Write>(
    writer: &mut W,
    report: &DetectionReport,
    settings: &PlxSettings,
) -> Result<PlxSummary> {
    check_channels(report)?;
    let clock = TimestampClock::new(report.sample_rate, &settings.output);
    let scales: Vec<ChannelScale> = report
        .channels
        .iter()
        .map(|c| ChannelScale::new(c, settings))
        .collect();

    write_file_header(writer, report, settings, &clock)?;
    for (channel, scale) in report.channels.iter().zip(&scales) {
        write_channel_header(writer, channel, scale, report, settings)?;
    }

    let mut bytes_written = (FILE_HEADER_BYTES + report.channels.len() * CHANNEL_HEADER_BYTES) as u64;
    // Order by tick: neighbouring samples share a tick on a clock slower than the sample rate.
    let mut blocks = report
        .channels
        .iter()
        .zip(&scales)
        .flat_map(|(channel, scale)| channel.spikes.iter().map(move |spike| (spike, scale)))
        .map(|(spike, scale)| -> Result<_> { Ok((clock.ticks(spike.index)?, spike, scale)) })
        .collect::<Result<Vec<_>>>()?;
    blocks.sort_by_key(|(timestamp, spike, _)| (*timestamp, spike.channel));

    for &(timestamp, spike, scale) in &blocks {
        writer.write_i16::<LittleEndian>(BLOCK_SPIKE)?;
        writer.write_u16::<LittleEndian>((timestamp >> 32) as u16)?;
        writer.write_u32::<LittleEndian>((timestamp & 0xffff_ffff) as u32)?;
        writer.write_i16::<LittleEndian>(spike.channel as i16)?;
        writer.write_i16::<LittleEndian>(0)?; // unsorted
        writer.write_i16::<LittleEndian>(1)?;
        writer.write_i16::<LittleEndian>(spike.waveform.len() as i16)?;
        for &value in &spike.waveform {
            writer.write_i16::<LittleEndian>(scale.to_adc(value))?;
        }
        bytes_written += (BLOCK_HEADER_BYTES + 2 * spike.waveform.len()) as u64;
    }
    writer.flush()?;

    Ok(PlxSummary {
        num_channels: report.channels.len(),
        spikes_written: blocks.len(),
        ad_frequency: clock.ad_frequency,
        bytes_written,
        gains: report
            .channels
            .iter()
            .zip(&scales)
            .map(|(c, s)| (c.channel, s.gain))
            .collect(),
    })
}

pub fn write_plx<P: AsRef<Path>>(
    path: P,
    report: &DetectionReport,
    settings: &PlxSettings,
) -> Result<PlxSummary> {
    let mut writer = BufWriter::new(File::create(path)?);
    write_plx_to(&mut writer, report, settings)
}

// -----------------------------------------------------------------------------
// READER
// -----------------------------------------------------------------------------

fn read_fixed_str<R: Read>(reader: &mut R, len: usize) -> Result<String> {
    let mut bytes = vec![0u8; len];
    reader.read_exact(&mut bytes)?;
    let end = bytes.iter().position(|&b| b == 0).unwrap_or(len);
    Ok(String::from_utf8_lossy(&bytes[..end]).into_owned())
}

fn skip<R: Read>(reader: &mut R, len: usize) -> Result<()> {
    let copied = std::io::copy(&mut reader.by_ref().take(len as u64), &mut std::io::sink())?;
    if copied != len as u64 {
        return Err(Error::format("PLX", "file ends inside a header"));
    }
    Ok(())
}

fn read_counts<R: Read>(reader: &mut R) -> Result<Vec<[i32; COUNT_UNITS]>> {
    let mut counts = vec![[0i32; COUNT_UNITS]; COUNT_CHANNELS];
    for row in counts.iter_mut() {
        for count in row.iter_mut() {
            *count = reader.read_i32::<LittleEndian>()?;
        }
    }
    Ok(counts)
}

fn parse_file_header(raw: &[u8]) -> Result<PlxFileHeader> {
    let mut cursor = raw;
    let reader = &mut cursor;

    let magic = reader.read_u32::<LittleEndian>()?;
    if magic != PLX_MAGIC {
        return Err(Error::format(
            "PLX",
            format!("bad magic number {:#010x}", magic),
        ));
    }
    let version = reader.read_i32::<LittleEndian>()?;
    let comment = read_fixed_str(reader, 128)?;
    let ad_frequency = reader.read_i32::<LittleEndian>()?;
    let num_dsp_channels = reader.read_i32::<LittleEndian>()?;
    let num_event_channels = reader.read_i32::<LittleEndian>()?;
    let num_slow_channels = reader.read_i32::<LittleEndian>()?;
    let num_points_wave = reader.read_i32::<LittleEndian>()?;
    let num_points_pre_thr = reader.read_i32::<LittleEndian>()?;

    let mut date = [0i32; 6];
    for field in date.iter_mut() {
        *field = reader.read_i32::<LittleEndian>()?;
    }
    let recorded_at = NaiveDate::from_ymd_opt(date[0], date[1] as u32, date[2] as u32)
        .and_then(|d| d.and_hms_opt(date[3] as u32, date[4] as u32, date[5] as u32));

    let fast_read = reader.read_i32::<LittleEndian>()?;
    let waveform_freq = reader.read_i32::<LittleEndian>()?;
    let last_timestamp = reader.read_f64::<LittleEndian>()?;
    let trodalness = reader.read_u8()?;
    let data_trodalness = reader.read_u8()?;
    let bits_per_spike_sample = reader.read_u8()?;
    let bits_per_slow_sample = reader.read_u8()?;
    let spike_max_magnitude_mv = reader.read_u16::<LittleEndian>()?;
    let slow_max_magnitude_mv = reader.read_u16::<LittleEndian>()?;
    let spike_pre_amp_gain = reader.read_u16::<LittleEndian>()?;
    let acquiring_software = read_fixed_str(reader, 18)?;
    let processing_software = read_fixed_str(reader, 18)?;
    skip(reader, 10)?;

    let ts_counts = read_counts(reader)?;
    let wf_counts = read_counts(reader)?;
    let mut ev_counts = vec![0i32; COUNT_EVENTS];
    for count in ev_counts.iter_mut() {
        *count = reader.read_i32::<LittleEndian>()?;
    }

    if num_dsp_channels < 0 || num_event_channels < 0 || num_slow_channels < 0 {
        return Err(Error::format("PLX", "negative channel count in header"));
    }
    if num_dsp_channels as usize > MAX_CHANNELS
        || num_event_channels as usize > COUNT_EVENTS
        || num_slow_channels as usize > MAX_SLOW_CHANNELS
    {
        return Err(Error::format(
            "PLX",
            format!(
                "implausible channel counts in header: {} spike, {} event, {} slow",
                num_dsp_channels, num_event_channels, num_slow_channels
            ),
        ));
    }

    Ok(PlxFileHeader {
        version,
        comment,
        ad_frequency,
        num_dsp_channels,
        num_event_channels,
        num_slow_channels,
        num_points_wave,
        num_points_pre_thr,
        recorded_at,
        fast_read,
        waveform_freq,
        last_timestamp,
        trodalness,
        data_trodalness,
        bits_per_spike_sample,
        bits_per_slow_sample,
        spike_max_magnitude_mv,
        slow_max_magnitude_mv,
        spike_pre_amp_gain,
        acquiring_software,
        processing_software,
        ts_counts,
        wf_counts,
        ev_counts,
    })
}

fn parse_channel_header(raw: &[u8]) -> Result<PlxChannelHeader> {
    let mut cursor = raw;
    let reader = &mut cursor;

    let name = read_fixed_str(reader, 32)?;
    let sig_name = read_fixed_str(reader, 32)?;
    let mut fields = [0i32; 9];
    for field in fields.iter_mut() {
        *field = reader.read_i32::<LittleEndian>()?;
    }
    skip(reader, 5 * 64 * 2 + 5 * 4)?;
    let sort_width = reader.read_i32::<LittleEndian>()?;
    skip(reader, 5 * 2 * 4 * 2)?;
    let sort_beg = reader.read_i32::<LittleEndian>()?;
    let comment = read_fixed_str(reader, 128)?;

    Ok(PlxChannelHeader {
        name,
        sig_name,
        channel: fields[0],
        wf_rate: fields[1],
        sig: fields[2],
        reference: fields[3],
        gain: fields[4],
        filter: fields[5],
        threshold: fields[6],
        method: fields[7],
        n_units: fields[8],
        sort_width,
        sort_beg,
        comment,
    })
}

/// Fills `buf` completely, or returns false if the stream was already at its end.
fn read_block_header<R: Read>(reader: &mut R, buf: &mut [u8]) -> Result<bool> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        }
    }
    match filled {
        0 => Ok(false),
        n if n == buf.len() => Ok(true),
        n => Err(Error::format(
            "PLX",
            format!("truncated data block header ({} of {} bytes)", n, buf.len()),
        )),
    }
}

pub fn read_plx_from<R: Read>(reader: &mut R) -> Result<PlxFile> {
    let mut raw = vec![0u8; FILE_HEADER_BYTES];
    reader
        .read_exact(&mut raw)
        .map_err(|_| Error::format("PLX", "file is shorter than the PLX header"))?;
    let header = parse_file_header(&raw)?;

    let mut channels = Vec::with_capacity(header.num_dsp_channels as usize);
    let mut raw = vec![0u8; CHANNEL_HEADER_BYTES];
    for _ in 0..header.num_dsp_channels {
        reader
            .read_exact(&mut raw)
            .map_err(|_| Error::format("PLX", "file ends inside a channel header"))?;
        channels.push(parse_channel_header(&raw)?);
    }
    skip(
        reader,
        header.num_event_channels as usize * EVENT_HEADER_BYTES
            + header.num_slow_channels as usize * SLOW_HEADER_BYTES,
    )?;

    let mut spikes = Vec::new();
    let mut block = [0u8; BLOCK_HEADER_BYTES];
    while read_block_header(reader, &mut block)? {
        let mut cursor = &block[..];
        let block_type = cursor.read_i16::<LittleEndian>()?;
        let upper = cursor.read_u16::<LittleEndian>()? as u64;
        let lower = cursor.read_u32::<LittleEndian>()? as u64;
        let channel = cursor.read_i16::<LittleEndian>()?;
        let unit = cursor.read_i16::<LittleEndian>()?;
        let num_waveforms = cursor.read_i16::<LittleEndian>()?.max(0) as usize;
        let num_words = cursor.read_i16::<LittleEndian>()?.max(0) as usize;

        let num_samples = num_waveforms * num_words;
        if num_samples > MAX_BLOCK_SAMPLES
            || (block_type == BLOCK_SPIKE && num_words > header.num_points_wave.max(0) as usize)
        {
            return Err(Error::format(
                "PLX",
                format!(
                    "data block of {} x {} samples does not fit the header",
                    num_waveforms, num_words
                ),
            ));
        }
        let mut samples = vec![0i16; num_samples];
        reader
            .read_i16_into::<LittleEndian>(&mut samples)
            .map_err(|_| Error::format("PLX", "file ends inside a waveform"))?;

        if block_type != BLOCK_SPIKE {
            continue;
        }
        let timestamp = ((upper & 0xff) << 32) | lower;
        if num_waveforms == 0 {
            spikes.push(PlxSpike {
                channel: channel.max(0) as u16,
                unit: unit.max(0) as u16,
                timestamp,
                waveform: Vec::new(),
            });
        }
        for waveform in samples.chunks(num_words.max(1)).take(num_waveforms) {
            spikes.push(PlxSpike {
                channel: channel.max(0) as u16,
                unit: unit.max(0) as u16,
                timestamp,
                waveform: waveform.to_vec(),
            });
        }
    }

    Ok(PlxFile {
        header,
        channels,
        spikes,
    })
}

pub fn read_plx<P: AsRef<Path>>(path: P) -> Result<PlxFile> {
    let mut reader = BufReader::with_capacity(65536, File::open(path)?);
    read_plx_from(&mut reader)
}
