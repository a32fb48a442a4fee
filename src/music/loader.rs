use std::fs::File;
use std::path::{Path, PathBuf};

use symphonia::core::audio::{AudioBufferRef, Signal};
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

use crate::error::{MusicError, Result};

/// Decoded audio with metadata
#[derive(Debug, Clone)]
pub struct AudioData {
    /// Interleaved samples in [-1, 1]
    pub samples: Vec<f32>,

    /// Sample rate in Hz
    pub sample_rate: u32,

    /// Channel count
    pub channels: u16,

    /// Duration in seconds
    pub duration: f64,

    /// Source path
    pub file_path: PathBuf,
}

impl AudioData {
    /// Mono mix of all channels
    pub fn mono_samples(&self) -> Vec<f32> {
        if self.channels <= 1 {
            return self.samples.clone();
        }
        self.samples
            .chunks(self.channels as usize)
            .map(|frame| frame.iter().sum::<f32>() / self.channels as f32)
            .collect()
    }
}

/// Audio loader: WAV through hound, everything else (including the audio
/// track of video containers) through Symphonia.
pub struct AudioLoader;

impl AudioLoader {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<AudioData> {
        let path = path.as_ref();
        let extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .unwrap_or("")
            .to_lowercase();

        match extension.as_str() {
            "wav" => Self::load_wav(path),
            "mp3" | "flac" | "ogg" | "m4a" | "aac" | "mp4" | "mov" | "mkv" | "webm" => {
                Self::load_with_symphonia(path)
            }
            _ => Err(MusicError::UnsupportedFormat { format: extension }.into()),
        }
    }

    fn load_wav(path: &Path) -> Result<AudioData> {
        let reader = hound::WavReader::open(path).map_err(|_| MusicError::LoadFailed {
            path: path.display().to_string(),
        })?;

        let spec = reader.spec();
        let sample_rate = spec.sample_rate;
        let channels = spec.channels;

        let samples: Vec<f32> = match spec.sample_format {
            hound::SampleFormat::Float => reader
                .into_samples::<f32>()
                .collect::<std::result::Result<Vec<_>, _>>()
                .map_err(|_| MusicError::LoadFailed {
                    path: path.display().to_string(),
                })?,
            hound::SampleFormat::Int => {
                let bit_depth = spec.bits_per_sample;
                let ints: std::result::Result<Vec<i32>, _> = reader.into_samples().collect();
                ints.map_err(|_| MusicError::LoadFailed {
                    path: path.display().to_string(),
                })?
                .into_iter()
                .map(|sample| int_to_float(sample, bit_depth))
                .collect()
            }
        };

        let duration = samples.len() as f64 / (sample_rate as f64 * channels as f64);

        Ok(AudioData {
            samples,
            sample_rate,
            channels,
            duration,
            file_path: path.to_path_buf(),
        })
    }

    fn load_with_symphonia(path: &Path) -> Result<AudioData> {
        let load_failed = || MusicError::LoadFailed {
            path: path.display().to_string(),
        };

        let file = File::open(path).map_err(|_| load_failed())?;
        let mss = MediaSourceStream::new(Box::new(file), Default::default());

        let mut hint = Hint::new();
        if let Some(extension) = path.extension().and_then(|e| e.to_str()) {
            hint.with_extension(extension);
        }

        let probed = symphonia::default::get_probe()
            .format(
                &hint,
                mss,
                &FormatOptions::default(),
                &MetadataOptions::default(),
            )
            .map_err(|_| load_failed())?;
        let mut format = probed.format;

        let track = format
            .tracks()
            .iter()
            .find(|t| t.codec_params.codec != CODEC_TYPE_NULL && t.codec_params.sample_rate.is_some())
            .ok_or_else(load_failed)?;
        let track_id = track.id;

        let sample_rate = track.codec_params.sample_rate.ok_or_else(load_failed)?;
        let channels = track
            .codec_params
            .channels
            .map(|c| c.count() as u16)
            .unwrap_or(1);

        let mut decoder = symphonia::default::get_codecs()
            .make(&track.codec_params, &DecoderOptions::default())
            .map_err(|_| load_failed())?;

        let mut samples = Vec::new();
        loop {
            let packet = match format.next_packet() {
                Ok(packet) => packet,
                Err(SymphoniaError::ResetRequired) => {
                    decoder.reset();
                    continue;
                }
                Err(_) => break,
            };

            if packet.track_id() != track_id {
                continue;
            }

            match decoder.decode(&packet) {
                Ok(decoded) => interleave_to_f32(&decoded, &mut samples),
                Err(SymphoniaError::DecodeError(_)) => continue,
                Err(_) => break,
            }
        }

        let duration = samples.len() as f64 / (sample_rate as f64 * channels as f64);

        Ok(AudioData {
            samples,
            sample_rate,
            channels,
            duration,
            file_path: path.to_path_buf(),
        })
    }
}

/// Convert an integer sample to float in [-1, 1]
fn int_to_float(sample: i32, bit_depth: u16) -> f32 {
    match bit_depth {
        8 => (sample as f32 - 128.0) / 128.0,
        16 => sample as f32 / 32768.0,
        24 => sample as f32 / 8_388_608.0,
        32 => sample as f32 / 2_147_483_648.0,
        _ => sample as f32 / 32768.0,
    }
}

/// Interleave a decoded Symphonia buffer into f32 samples
fn interleave_to_f32(buffer: &AudioBufferRef, output: &mut Vec<f32>) {
    macro_rules! interleave {
        ($buf:expr, $convert:expr) => {{
            let channels = $buf.spec().channels.count();
            let frames = $buf.frames();
            for frame_idx in 0..frames {
                for ch in 0..channels {
                    output.push($convert($buf.chan(ch)[frame_idx]));
                }
            }
        }};
    }

    match buffer {
        AudioBufferRef::F32(buf) => interleave!(buf, |s: f32| s),
        AudioBufferRef::F64(buf) => interleave!(buf, |s: f64| s as f32),
        AudioBufferRef::S32(buf) => interleave!(buf, |s: i32| s as f32 / 2_147_483_648.0),
        AudioBufferRef::S16(buf) => interleave!(buf, |s: i16| s as f32 / 32768.0),
        AudioBufferRef::U8(buf) => interleave!(buf, |s: u8| (s as f32 - 128.0) / 128.0),
        _ => {
            tracing::warn!("Unsupported audio buffer format, skipping packet");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn write_test_wav(path: &Path, sample_rate: u32, channels: u16, seconds: f64) {
        let spec = hound::WavSpec {
            channels,
            sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(path, spec).unwrap();
        let total = (sample_rate as f64 * seconds) as usize;
        for i in 0..total {
            let t = i as f32 / sample_rate as f32;
            let value = (2.0 * std::f32::consts::PI * 440.0 * t).sin();
            for _ in 0..channels {
                writer.write_sample((value * i16::MAX as f32 * 0.5) as i16).unwrap();
            }
        }
        writer.finalize().unwrap();
    }

    #[test]
    fn test_load_wav() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("tone.wav");
        write_test_wav(&path, 22_050, 1, 1.0);

        let audio = AudioLoader::load(&path).unwrap();
        assert_eq!(audio.sample_rate, 22_050);
        assert_eq!(audio.channels, 1);
        assert!((audio.duration - 1.0).abs() < 0.01);
    }

    #[test]
    fn test_mono_mix() {
        let audio = AudioData {
            samples: vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0],
            sample_rate: 44_100,
            channels: 2,
            duration: 1.0,
            file_path: PathBuf::from("test.wav"),
        };
        assert_eq!(audio.mono_samples(), vec![1.5, 3.5, 5.5]);
    }

    #[test]
    fn test_unsupported_format() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.xyz");
        std::fs::write(&path, b"dummy").unwrap();

        let result = AudioLoader::load(&path);
        assert!(result.is_err());
    }

    #[test]
    fn test_int_to_float_conversion() {
        assert_eq!(int_to_float(0, 16), 0.0);
        assert_eq!(int_to_float(-32768, 16), -1.0);
        assert_eq!(int_to_float(128, 8), 0.0);
    }
}
