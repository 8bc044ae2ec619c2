//! # Audio Source Module
//!
//! This module defines the two audio sources the core consumes and a
//! real-time capture implementation using CPAL (Cross-Platform Audio Library).
//!
//! ## Features
//! - [`CaptureSource`]: a continuous stream of fixed-size frames
//! - [`DecodeSource`]: one fully buffered recording
//! - [`CpalCapture`]: default input device, downmixed to mono, framed

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::SupportedStreamConfigRange;
use crossbeam_channel::Sender;

use crate::config::DEFAULT_FRAME_SIZE;
use crate::error::SourceError;
use crate::SampleBuffer;

/// Preferred capture sample rate in Hz.
pub const TARGET_SAMPLE_RATE: u32 = 44100;

/// A live source of fixed-size sample frames.
pub trait CaptureSource {
    /// Starts delivering frames into `frames` and returns the sample rate.
    ///
    /// A failure here is the single start-up failure of the source; frames
    /// themselves never carry errors.
    fn start(&mut self, frames: Sender<Vec<f32>>) -> Result<u32, SourceError>;

    /// Stops delivering frames. Stopping an idle source is a no-op.
    fn stop(&mut self);
}

/// A source that yields one complete recording.
pub trait DecodeSource {
    fn decode(&mut self) -> Result<SampleBuffer, SourceError>;
}

/// Captures audio from the default input device.
///
/// # Audio Configuration
/// - Sample Rate: 44.1 kHz when supported, otherwise the closest available
/// - Format: 32-bit float
/// - Channels: any, averaged down to mono
/// - Frame Size: 4096 samples (~93ms at 44.1kHz) by default
pub struct CpalCapture {
    frame_size: usize,
    stream: Option<cpal::Stream>,
}

impl CpalCapture {
    pub fn new(frame_size: usize) -> Self {
        Self {
            frame_size: frame_size.max(1),
            stream: None,
        }
    }
}

impl Default for CpalCapture {
    fn default() -> Self {
        Self::new(DEFAULT_FRAME_SIZE)
    }
}

impl CaptureSource for CpalCapture {
    fn start(&mut self, frames: Sender<Vec<f32>>) -> Result<u32, SourceError> {
        if self.stream.is_some() {
            return Err(SourceError::CaptureStart("capture already running".into()));
        }

        let host = cpal::default_host();
        let device = host.default_input_device().ok_or(SourceError::NoInputDevice)?;

        match device.name() {
            Ok(name) => tracing::info!("[CAPTURE] Using audio input device: {}", name),
            Err(err) => tracing::warn!("[CAPTURE] Input device has no readable name: {}", err),
        }

        let configs = device
            .supported_input_configs()
            .map_err(|err| SourceError::CaptureStart(err.to_string()))?
            .collect::<Vec<_>>();
        let supported_config = find_supported_config(configs, TARGET_SAMPLE_RATE)
            .ok_or_else(|| SourceError::UnsupportedFormat("no f32 input format found".into()))?;

        let target = cpal::SampleRate(TARGET_SAMPLE_RATE);
        let config = if supported_config.min_sample_rate() <= target
            && target <= supported_config.max_sample_rate()
        {
            supported_config.with_sample_rate(target)
        } else {
            supported_config.with_max_sample_rate()
        };

        let sample_rate = config.sample_rate().0;
        let channels = config.channels().max(1) as usize;
        let config: cpal::StreamConfig = config.into();

        tracing::info!(
            "[CAPTURE] Selected sample rate: {} Hz, {} channel(s)",
            sample_rate,
            channels
        );

        let err_fn = |err| tracing::warn!("[CAPTURE] An error occurred on the audio stream: {}", err);

        let frame_size = self.frame_size;
        // This buffer will accumulate mono audio data from the callback.
        let mut pending = Vec::with_capacity(frame_size * 2);

        let stream = device
            .build_input_stream(
                &config,
                move |data: &[f32], _: &cpal::InputCallbackInfo| {
                    pending.extend(
                        data.chunks(channels)
                            .map(|frame| frame.iter().sum::<f32>() / frame.len() as f32),
                    );

                    // While we have enough data for a full frame, send it.
                    while pending.len() >= frame_size {
                        let frame: Vec<f32> = pending.drain(..frame_size).collect();
                        // Drop the frame if the consumer is behind.
                        let _ = frames.try_send(frame);
                    }
                },
                err_fn,
                None,
            )
            .map_err(|err| SourceError::CaptureStart(err.to_string()))?;

        stream
            .play()
            .map_err(|err| SourceError::CaptureStart(err.to_string()))?;

        self.stream = Some(stream);
        Ok(sample_rate)
    }

    fn stop(&mut self) {
        if let Some(stream) = self.stream.take() {
            if let Err(err) = stream.pause() {
                tracing::warn!("[CAPTURE] Failed to pause stream: {}", err);
            }
            tracing::info!("[CAPTURE] Capture stopped");
        }
    }
}

/// Finds the best supported configuration for the target sample rate.
///
/// Prefers 32-bit float, then mono, then the range closest to `target_rate`.
fn find_supported_config(
    configs: Vec<SupportedStreamConfigRange>,
    target_rate: u32,
) -> Option<SupportedStreamConfigRange> {
    configs
        .into_iter()
        .filter(|c| c.sample_format() == cpal::SampleFormat::F32)
        .min_by_key(|c| {
            let min = c.min_sample_rate().0;
            let max = c.max_sample_rate().0;
            let rate_diff = if (min..=max).contains(&target_rate) {
                0
            } else {
                min.abs_diff(target_rate).min(max.abs_diff(target_rate))
            };
            (c.channels() != 1, rate_diff)
        })
}
