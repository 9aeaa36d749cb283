//! Reader for TDT SEV stream files (one channel of one stream per file).

use byteorder::{LittleEndian, ReadBytesExt};
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use crate::error::{Error, Result};
use crate::recording::{Channel, Recording};

pub const SEV_HEADER_BYTES: usize = 40;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SevDataFormat {
    Float32,
    Int32,
    Int16,
    Int8,
    Float64,
    Int64,
}

impl SevDataFormat {
    fn from_code(code: u8) -> Result<Self> {
        match code & 0x07 {
            0 => Ok(SevDataFormat::Float32),
            1 => Ok(SevDataFormat::Int32),
            2 => Ok(SevDataFormat::Int16),
            3 => Ok(SevDataFormat::Int8),
            4 => Ok(SevDataFormat::Float64),
            5 => Ok(SevDataFormat::Int64),
            other => Err(Error::format("SEV", format!("unknown data format {}", other))),
        }
    }

    pub fn code(self) -> u8 {
        match self {
            SevDataFormat::Float32 => 0,
            SevDataFormat::Int32 => 1,
            SevDataFormat::Int16 => 2,
            SevDataFormat::Int8 => 3,
            SevDataFormat::Float64 => 4,
            SevDataFormat::Int64 => 5,
        }
    }

    pub fn width(self) -> usize {
        match self {
            SevDataFormat::Int8 => 1,
            SevDataFormat::Int16 => 2,
            SevDataFormat::Float32 | SevDataFormat::Int32 => 4,
            SevDataFormat::Float64 | SevDataFormat::Int64 => 8,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SevHeader {
    pub file_size_bytes: u64,
    pub file_version: u8,
    pub event_name: String,
    pub channel_num: u16,
    pub total_num_channels: u16,
    pub sample_width_bytes: u16,
    pub data_format: SevDataFormat,
    pub decimate: u8,
    pub rate: u16,
}

impl SevHeader {
    /// Sampling rate encoded in the header. Version 0 files do not carry one.
    pub fn sample_rate(&self) -> Option<f64> {
        if self.file_version == 0 || self.decimate == 0 {
            return None;
        }
        Some(2f64.powi(self.rate as i32) * 25_000_000.0 / 4096.0 / self.decimate as f64)
    }
}

#[derive(Debug, Clone)]
pub struct SevFile {
    pub header: SevHeader,
    pub samples: Vec<f32>,
}

fn read_header<R: Read>(reader: &mut R) -> Result<SevHeader> {
    let mut raw = [0u8; SEV_HEADER_BYTES];
    reader
        .read_exact(&mut raw)
        .map_err(|_| Error::format("SEV", "file is shorter than its 40-byte header"))?;
    let mut cursor = &raw[..];

    let file_size_bytes = cursor.read_u64::<LittleEndian>()?;
    let mut file_type = [0u8; 3];
    cursor.read_exact(&mut file_type)?;
    if &file_type != b"SEV" {
        return Err(Error::format(
            "SEV",
            format!("bad file type {:?}", String::from_utf8_lossy(&file_type)),
        ));
    }
    let file_version = cursor.read_u8()?;

    let mut name = [0u8; 4];
    cursor.read_exact(&mut name)?;
    if file_version < 2 {
        name.reverse();
    }
    let event_name = String::from_utf8_lossy(&name)
        .trim_end_matches('\0')
        .to_string();

    let channel_num = cursor.read_u16::<LittleEndian>()?;
    let total_num_channels = cursor.read_u16::<LittleEndian>()?;
    let sample_width_bytes = cursor.read_u16::<LittleEndian>()?;
    let _reserved = cursor.read_u16::<LittleEndian>()?;
    let data_format = SevDataFormat::from_code(cursor.read_u8()?)?;
    let decimate = cursor.read_u8()?;
    let rate = cursor.read_u16::<LittleEndian>()?;

    if sample_width_bytes as usize != data_format.width() {
        return Err(Error::format(
            "SEV",
            format!(
                "sample width {} does not match {:?}",
                sample_width_bytes, data_format
            ),
        ));
    }

    Ok(SevHeader {
        file_size_bytes,
        file_version,
        event_name,
        channel_num,
        total_num_channels,
        sample_width_bytes,
        data_format,
        decimate,
        rate,
    })
}

fn decode_samples(payload: &[u8], format: SevDataFormat) -> Result<Vec<f32>> {
    let width = format.width();
    if payload.len() % width != 0 {
        return Err(Error::format(
            "SEV",
            format!(
                "payload of {} bytes is not a multiple of the {}-byte sample width",
                payload.len(),
                width
            ),
        ));
    }

    let mut cursor = payload;
    let count = payload.len() / width;
    let mut samples = Vec::with_capacity(count);
    for _ in 0..count {
        let sample = match format {
            SevDataFormat::Float32 => cursor.read_f32::<LittleEndian>()?,
            SevDataFormat::Int32 => cursor.read_i32::<LittleEndian>()? as f32,
            SevDataFormat::Int16 => cursor.read_i16::<LittleEndian>()? as f32,
            SevDataFormat::Int8 => cursor.read_i8()? as f32,
            SevDataFormat::Float64 => cursor.read_f64::<LittleEndian>()? as f32,
            SevDataFormat::Int64 => cursor.read_i64::<LittleEndian>()? as f32,
        };
        samples.push(sample);
    }
    Ok(samples)
}

pub fn read_sev<P: AsRef<Path>>(path: P) -> Result<SevFile> {
    let mut reader = BufReader::with_capacity(65536, File::open(path)?);
    let header = read_header(&mut reader)?;

    let mut payload = Vec::new();
    reader.read_to_end(&mut payload)?;
    let samples = decode_samples(&payload, header.data_format)?;

    Ok(SevFile { header, samples })
}

/// Combines single-channel SEV files into one recording ordered by channel number.
pub fn read_sev_recording<P: AsRef<Path>>(
    paths: &[P],
    sample_rate_override: Option<f64>,
) -> Result<Recording> {
    let mut files = paths
        .iter()
        .map(|p| read_sev(p))
        .collect::<Result<Vec<SevFile>>>()?;
    files.sort_by_key(|f| f.header.channel_num);

    let mut sample_rate = sample_rate_override;
    if sample_rate.is_none() {
        for file in &files {
            let rate = file.header.sample_rate().ok_or_else(|| {
                Error::InvalidRecording(format!(
                    "SEV channel {} carries no sample rate; pass one explicitly",
                    file.header.channel_num
                ))
            })?;
            match sample_rate {
                Some(existing) if (existing - rate).abs() > 1e-9 => {
                    return Err(Error::InvalidRecording(format!(
                        "SEV channels disagree on sample rate: {} vs {}",
                        existing, rate
                    )));
                }
                _ => sample_rate = Some(rate),
            }
        }
    }
    let sample_rate = sample_rate
        .ok_or_else(|| Error::InvalidRecording("no SEV files given".to_string()))?;

    let channels = files
        .into_iter()
        .map(|file| {
            let name = if file.header.event_name.is_empty() {
                format!("ch{:03}", file.header.channel_num)
            } else {
                format!("{}{:03}", file.header.event_name, file.header.channel_num)
            };
            Channel {
                number: file.header.channel_num,
                name,
                samples: file.samples,
            }
        })
        .collect();

    Recording::new(sample_rate, channels)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use byteorder::WriteBytesExt;
    use std::io::Write;

    pub(crate) fn sev_bytes(channel: u16, version: u8, format: SevDataFormat, payload: &[u8]) -> Vec<u8> {
        let mut bytes = Vec::new();
        bytes
            .write_u64::<LittleEndian>((SEV_HEADER_BYTES + payload.len()) as u64)
            .unwrap();
        bytes.write_all(b"SEV").unwrap();
        bytes.write_u8(version).unwrap();
        bytes.write_all(b"Wav1").unwrap();
        bytes.write_u16::<LittleEndian>(channel).unwrap();
        bytes.write_u16::<LittleEndian>(16).unwrap();
        bytes.write_u16::<LittleEndian>(format.width() as u16).unwrap();
        bytes.write_u16::<LittleEndian>(0).unwrap();
        bytes.write_u8(format.code()).unwrap();
        bytes.write_u8(1).unwrap(); // decimate
        bytes.write_u16::<LittleEndian>(12).unwrap(); // 2^12 * 25 MHz / 2^12
        bytes.resize(SEV_HEADER_BYTES, 0);
        bytes.extend_from_slice(payload);
        bytes
    }

    fn f32_payload(values: &[f32]) -> Vec<u8> {
        let mut payload = Vec::new();
        for &v in values {
            payload.write_f32::<LittleEndian>(v).unwrap();
        }
        payload
    }

    #[test]
    fn decodes_float_stream() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a_Wav1_Ch3.sev");
        let bytes = sev_bytes(3, 2, SevDataFormat::Float32, &f32_payload(&[0.5, -0.25, 1e-5]));
        std::fs::write(&path, bytes).unwrap();

        let file = read_sev(&path).unwrap();
        assert_eq!(file.header.event_name, "Wav1");
        assert_eq!(file.header.channel_num, 3);
        assert_eq!(file.header.sample_rate(), Some(25_000_000.0));
        assert_eq!(file.samples, vec![0.5, -0.25, 1e-5]);
    }

    #[test]
    fn old_versions_store_name_reversed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("old.sev");
        std::fs::write(&path, sev_bytes(1, 1, SevDataFormat::Int16, &[1, 0, 0xff, 0xff])).unwrap();

        let file = read_sev(&path).unwrap();
        assert_eq!(file.header.event_name, "1vaW");
        assert_eq!(file.samples, vec![1.0, -1.0]);
    }

    #[test]
    fn rejects_truncated_payload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.sev");
        std::fs::write(&path, sev_bytes(1, 2, SevDataFormat::Float32, &[0, 0, 0])).unwrap();
        assert!(matches!(read_sev(&path), Err(Error::Format { .. })));

        std::fs::write(&path, b"SEV").unwrap();
        assert!(read_sev(&path).is_err());
    }

    #[test]
    fn rejects_width_that_disagrees_with_format() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("width.sev");
        let mut bytes = sev_bytes(1, 2, SevDataFormat::Float32, &f32_payload(&[1.0, 2.0]));
        // sample_width_bytes sits after size, type, version, name, channel and channel count
        bytes[20..22].copy_from_slice(&2u16.to_le_bytes());
        std::fs::write(&path, bytes).unwrap();

        match read_sev(&path) {
            Err(Error::Format { message, .. }) => assert!(message.contains("sample width 2")),
            other => panic!("expected a format error, got {:?}", other),
        }
    }

    #[test]
    fn version_zero_needs_a_rate() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("v0.sev");
        std::fs::write(&path, sev_bytes(1, 0, SevDataFormat::Float32, &f32_payload(&[1.0]))).unwrap();

        assert!(read_sev_recording(&[&path], None).is_err());
        let recording = read_sev_recording(&[&path], Some(1000.0)).unwrap();
        assert_eq!(recording.sample_rate, 1000.0);
    }

    #[test]
    fn combines_channels_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let second = dir.path().join("ch2.sev");
        let first = dir.path().join("ch1.sev");
        std::fs::write(&second, sev_bytes(2, 2, SevDataFormat::Float32, &f32_payload(&[2.0, 2.0]))).unwrap();
        std::fs::write(&first, sev_bytes(1, 2, SevDataFormat::Float32, &f32_payload(&[1.0, 1.0]))).unwrap();

        let recording = read_sev_recording(&[&second, &first], None).unwrap();
        assert_eq!(recording.channels[0].number, 1);
        assert_eq!(recording.channels[0].name, "Wav1001");
        assert_eq!(recording.channels[1].samples, vec![2.0, 2.0]);

        let short = dir.path().join("ch3.sev");
        std::fs::write(&short, sev_bytes(3, 2, SevDataFormat::Float32, &f32_payload(&[3.0]))).unwrap();
        assert!(read_sev_recording(&[&first, &short], None).is_err());
    }
}
