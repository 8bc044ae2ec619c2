//! WAV file decoding for the segmentation analyzer.

use std::path::PathBuf;

use hound::{SampleFormat, WavReader};
use intonation_core::audio::DecodeSource;
use intonation_core::{SampleBuffer, SourceError};

/// Reads the first channel of a WAV file.
#[derive(Debug, Clone)]
pub struct WavDecoder {
    path: PathBuf,
}

impl WavDecoder {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl DecodeSource for WavDecoder {
    fn decode(&mut self) -> Result<SampleBuffer, SourceError> {
        let reader = WavReader::open(&self.path)
            .map_err(|err| SourceError::Decode(format!("{}: {}", self.path.display(), err)))?;
        let spec = reader.spec();
        let channels = spec.channels.max(1) as usize;

        let interleaved: Vec<f32> = match spec.sample_format {
            SampleFormat::Float => reader
                .into_samples::<f32>()
                .collect::<Result<_, _>>()
                .map_err(|err| SourceError::Decode(err.to_string()))?,
            SampleFormat::Int => {
                if !(1..=32).contains(&spec.bits_per_sample) {
                    return Err(SourceError::UnsupportedFormat(format!(
                        "{}-bit integer samples",
                        spec.bits_per_sample
                    )));
                }
                let scale = 1.0 / (1u64 << (spec.bits_per_sample - 1)) as f32;
                reader
                    .into_samples::<i32>()
                    .map(|sample| sample.map(|s| s as f32 * scale))
                    .collect::<Result<_, _>>()
                    .map_err(|err| SourceError::Decode(err.to_string()))?
            }
        };

        let samples: Vec<f32> = interleaved.into_iter().step_by(channels).collect();
        tracing::info!(
            "[DECODE] {}: {} samples at {} Hz ({} channel(s), first used)",
            self.path.display(),
            samples.len(),
            spec.sample_rate,
            channels
        );
        Ok(SampleBuffer::new(samples, spec.sample_rate))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hound::{WavSpec, WavWriter};
    use std::f32::consts::PI;

    fn write_wav(path: &std::path::Path, spec: WavSpec, frames: usize) {
        let mut writer = WavWriter::create(path, spec).expect("create wav");
        for i in 0..frames {
            let left = 0.5 * (2.0 * PI * 440.0 * i as f32 / spec.sample_rate as f32).sin();
            for channel in 0..spec.channels {
                let value = if channel == 0 { left } else { 0.0 };
                match spec.sample_format {
                    SampleFormat::Float => writer.write_sample(value).unwrap(),
                    SampleFormat::Int => writer.write_sample((value * 32767.0) as i16).unwrap(),
                }
            }
        }
        writer.finalize().expect("finalize wav");
    }

    #[test]
    fn decodes_first_channel_of_stereo_pcm() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tone.wav");
        let spec = WavSpec {
            channels: 2,
            sample_rate: 44100,
            bits_per_sample: 16,
            sample_format: SampleFormat::Int,
        };
        write_wav(&path, spec, 4410);

        let buffer = WavDecoder::new(&path).decode().unwrap();
        assert_eq!(buffer.sample_rate, 44100);
        assert_eq!(buffer.len(), 4410);
        let peak = buffer.samples.iter().cloned().fold(0.0_f32, f32::max);
        assert!((peak - 0.5).abs() < 0.01, "peak {peak}");
    }

    #[test]
    fn decodes_float_wav_for_analysis() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tone.wav");
        let spec = WavSpec {
            channels: 1,
            sample_rate: 44100,
            bits_per_sample: 32,
            sample_format: SampleFormat::Float,
        };
        write_wav(&path, spec, 44100 / 2);

        let events = intonation_core::SegmentAnalyzer::default()
            .analyze_source(&mut WavDecoder::new(&path))
            .unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].label.to_string(), "A4");
    }

    #[test]
    fn missing_file_is_a_decode_error() {
        let err = WavDecoder::new("/no/such/file.wav").decode().unwrap_err();
        assert!(matches!(err, SourceError::Decode(_)));
    }
}
