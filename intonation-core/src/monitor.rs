//! # Live Monitoring Module
//!
//! Frame-by-frame pitch monitoring of a live capture stream.
//!
//! The monitor holds nothing across ticks except its running flag: each
//! frame is gated by loudness, estimated, mapped and reported on its own.
//! Iteration is driven from outside, either by calling [`LiveMonitor::tick`]
//! from a scheduler or by handing the frame channel to [`LiveMonitor::run`].

use crossbeam_channel::{Receiver, Sender, select};
use serde::Serialize;

use crate::audio::CaptureSource;
use crate::config::MonitorConfig;
use crate::error::SourceError;
use crate::pitch::{PitchResult, detect_pitch_with_limit, rms_volume};
use crate::tuning::{NoteLabel, frequency_to_note};

/// Frames buffered between the capture callback and the monitor.
const FRAME_QUEUE_CAPACITY: usize = 8;

/// One voiced frame.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Detection {
    /// Estimated frequency in Hz.
    pub frequency: f32,
    #[serde(flatten)]
    pub label: NoteLabel,
}

/// Receives everything the monitor reports.
pub trait MonitorSink {
    fn on_detection(&mut self, detection: &Detection);

    /// Raw frame of every tick, voiced or not.
    fn on_waveform(&mut self, _frame: &[f32]) {}

    fn on_error(&mut self, _error: &SourceError) {}
}

impl<S: MonitorSink + ?Sized> MonitorSink for &mut S {
    fn on_detection(&mut self, detection: &Detection) {
        (**self).on_detection(detection);
    }

    fn on_waveform(&mut self, frame: &[f32]) {
        (**self).on_waveform(frame);
    }

    fn on_error(&mut self, error: &SourceError) {
        (**self).on_error(error);
    }
}

/// Tagged form of the [`MonitorSink`] callbacks.
#[derive(Debug)]
pub enum MonitorEvent {
    Detection(Detection),
    Waveform(Vec<f32>),
    Error(String),
}

/// Forwards monitor callbacks over a channel.
///
/// Detections and errors wait for room in a bounded channel. Waveform frames
/// are dropped when the channel is full. A disconnected receiver drops
/// everything.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    sender: Sender<MonitorEvent>,
    forward_waveform: bool,
}

impl ChannelSink {
    pub fn new(sender: Sender<MonitorEvent>) -> Self {
        Self {
            sender,
            forward_waveform: true,
        }
    }

    /// Skips waveform events, for consumers that only want detections.
    pub fn without_waveform(mut self) -> Self {
        self.forward_waveform = false;
        self
    }
}

impl MonitorSink for ChannelSink {
    fn on_detection(&mut self, detection: &Detection) {
        if self.sender.send(MonitorEvent::Detection(*detection)).is_err() {
            tracing::trace!("[MONITOR] Event receiver gone, detection dropped");
        }
    }

    fn on_waveform(&mut self, frame: &[f32]) {
        if !self.forward_waveform {
            return;
        }
        if let Err(err) = self.sender.try_send(MonitorEvent::Waveform(frame.to_vec())) {
            let reason = if err.is_full() { "channel full" } else { "receiver gone" };
            tracing::trace!("[MONITOR] Waveform frame dropped: {}", reason);
        }
    }

    fn on_error(&mut self, error: &SourceError) {
        if self.sender.send(MonitorEvent::Error(error.to_string())).is_err() {
            tracing::trace!("[MONITOR] Event receiver gone, error dropped: {}", error);
        }
    }
}

/// Live pitch monitor.
pub struct LiveMonitor<S: MonitorSink> {
    sink: S,
    config: MonitorConfig,
    sample_rate: u32,
    running: bool,
}

impl<S: MonitorSink> LiveMonitor<S> {
    pub fn new(sink: S, config: MonitorConfig) -> Self {
        Self {
            sink,
            config,
            sample_rate: 0,
            running: false,
        }
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn sink_mut(&mut self) -> &mut S {
        &mut self.sink
    }

    pub fn into_sink(self) -> S {
        self.sink
    }

    /// Starts `source` and returns the channel its frames arrive on.
    ///
    /// A start-up failure is reported once to the sink and returned.
    pub fn start(&mut self, source: &mut dyn CaptureSource) -> Result<Receiver<Vec<f32>>, SourceError> {
        let (frames_tx, frames_rx) = crossbeam_channel::bounded(FRAME_QUEUE_CAPACITY);
        match source.start(frames_tx) {
            Ok(sample_rate) => {
                self.begin(sample_rate);
                Ok(frames_rx)
            }
            Err(err) => {
                tracing::warn!("[MONITOR] Capture failed to start: {}", err);
                self.sink.on_error(&err);
                Err(err)
            }
        }
    }

    /// Marks the monitor as running at `sample_rate`, for callers that
    /// feed [`tick`](Self::tick) from their own audio callback.
    pub fn begin(&mut self, sample_rate: u32) {
        self.sample_rate = sample_rate;
        self.running = true;
        tracing::info!("[MONITOR] Listening at {} Hz", sample_rate);
    }

    /// Stops the monitor and its source immediately.
    pub fn stop(&mut self, source: &mut dyn CaptureSource) {
        source.stop();
        self.halt();
    }

    /// Clears the running flag without touching any source.
    pub fn halt(&mut self) {
        if self.running {
            tracing::info!("[MONITOR] Stopped");
        }
        self.running = false;
    }

    /// Processes one frame.
    ///
    /// The frame is always forwarded to the waveform sink. Silent frames and
    /// frames without a pitch produce nothing; a voiced frame produces one
    /// detection, which is also returned. Does nothing while stopped.
    pub fn tick(&mut self, frame: &[f32]) -> Option<Detection> {
        if !self.running {
            return None;
        }

        let volume = rms_volume(frame);
        self.sink.on_waveform(frame);

        if volume < self.config.volume_threshold {
            return None;
        }

        let frequency = match detect_pitch_with_limit(
            frame,
            self.sample_rate,
            self.config.max_detectable_frequency,
        ) {
            PitchResult::Detected(frequency) => frequency,
            PitchResult::Undetected => return None,
        };

        // The mapper still validates the estimate; a rejected one is logged and skipped.
        let label = match frequency_to_note(frequency) {
            Ok(label) => label,
            Err(err) => {
                tracing::error!("[MONITOR] {}", err);
                return None;
            }
        };

        let detection = Detection { frequency, label };
        tracing::debug!(
            "[MONITOR] {:.1} Hz -> {} ({:+} cents)",
            frequency,
            label,
            label.cents
        );
        self.sink.on_detection(&detection);
        Some(detection)
    }

    /// Drives [`tick`](Self::tick) from `frames` until `shutdown` yields or
    /// disconnects, the monitor is halted, or the frame stream closes.
    ///
    /// A closed frame stream while running is reported as
    /// [`SourceError::StreamClosed`].
    pub fn run<T>(&mut self, frames: &Receiver<Vec<f32>>, shutdown: &Receiver<T>) {
        while self.running {
            select! {
                recv(frames) -> frame => match frame {
                    Ok(frame) => {
                        self.tick(&frame);
                    }
                    Err(_) => {
                        let err = SourceError::StreamClosed;
                        tracing::warn!("[MONITOR] {}", err);
                        self.sink.on_error(&err);
                        self.halt();
                    }
                },
                recv(shutdown) -> _ => self.halt(),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::PI;

    #[derive(Default)]
    struct RecordingSink {
        detections: Vec<Detection>,
        waveforms: usize,
        errors: Vec<String>,
    }

    impl MonitorSink for RecordingSink {
        fn on_detection(&mut self, detection: &Detection) {
            self.detections.push(*detection);
        }

        fn on_waveform(&mut self, _frame: &[f32]) {
            self.waveforms += 1;
        }

        fn on_error(&mut self, error: &SourceError) {
            self.errors.push(error.to_string());
        }
    }

    fn sine(freq: f32, amplitude: f32) -> Vec<f32> {
        (0..4096)
            .map(|i| amplitude * (2.0 * PI * freq * i as f32 / 44100.0).sin())
            .collect()
    }

    fn running_monitor() -> LiveMonitor<RecordingSink> {
        let mut monitor = LiveMonitor::new(RecordingSink::default(), MonitorConfig::default());
        monitor.begin(44100);
        monitor
    }

    #[test]
    fn voiced_frame_emits_one_detection() {
        let mut monitor = running_monitor();
        let detection = monitor.tick(&sine(440.0, 0.5)).expect("voiced frame");
        assert_eq!(detection.label.note_index, 9);
        assert_eq!(detection.label.octave, 4);
        assert_eq!(monitor.sink().detections.len(), 1);
        assert_eq!(monitor.sink().waveforms, 1);
    }

    #[test]
    fn quiet_frame_is_forwarded_but_not_detected() {
        let mut monitor = running_monitor();
        // RMS of a 0.01 amplitude sine is ~0.007
        assert!(monitor.tick(&sine(440.0, 0.01)).is_none());
        assert!(monitor.tick(&vec![0.0; 4096]).is_none());
        assert!(monitor.sink().detections.is_empty());
        assert_eq!(monitor.sink().waveforms, 2);
    }

    #[test]
    fn stopped_monitor_ignores_frames() {
        let mut monitor = LiveMonitor::new(RecordingSink::default(), MonitorConfig::default());
        assert!(monitor.tick(&sine(440.0, 0.5)).is_none());
        assert_eq!(monitor.sink().waveforms, 0);
    }

    #[test]
    fn run_reports_closed_stream() {
        let mut monitor = running_monitor();
        let (frames_tx, frames_rx) = crossbeam_channel::unbounded();
        let (_shutdown_tx, shutdown_rx) = crossbeam_channel::unbounded::<()>();
        frames_tx.send(sine(440.0, 0.5)).unwrap();
        drop(frames_tx);

        monitor.run(&frames_rx, &shutdown_rx);

        assert!(!monitor.is_running());
        assert_eq!(monitor.sink().detections.len(), 1);
        assert_eq!(monitor.sink().errors, vec![SourceError::StreamClosed.to_string()]);
    }

    #[test]
    fn channel_sink_tags_events() {
        let (tx, rx) = crossbeam_channel::unbounded();
        let mut monitor = LiveMonitor::new(ChannelSink::new(tx), MonitorConfig::default());
        monitor.begin(44100);
        monitor.tick(&sine(880.0, 0.5));

        let events: Vec<MonitorEvent> = rx.try_iter().collect();
        assert!(matches!(events[0], MonitorEvent::Waveform(ref frame) if frame.len() == 4096));
        assert!(matches!(events[1], MonitorEvent::Detection(d) if d.label.octave == 5));
    }

    #[test]
    fn detection_waits_for_a_full_channel() {
        let (tx, rx) = crossbeam_channel::bounded(1);
        let mut monitor = LiveMonitor::new(ChannelSink::new(tx), MonitorConfig::default());
        monitor.begin(44100);

        // The waveform fills the only slot; the detection has to wait for the consumer.
        let consumer = std::thread::spawn(move || {
            std::thread::sleep(std::time::Duration::from_millis(50));
            rx.iter().collect::<Vec<MonitorEvent>>()
        });
        assert!(monitor.tick(&sine(440.0, 0.5)).is_some());
        drop(monitor);

        let events = consumer.join().unwrap();
        assert_eq!(events.len(), 2);
        assert!(matches!(events[0], MonitorEvent::Waveform(ref frame) if frame.len() == 4096));
        assert!(matches!(events[1], MonitorEvent::Detection(d) if d.label.note_index == 9));
    }

    #[test]
    fn errors_wait_for_a_full_channel() {
        let (tx, rx) = crossbeam_channel::bounded(1);
        let mut sink = ChannelSink::new(tx);
        sink.on_waveform(&[0.0; 16]);
        sink.on_waveform(&[0.0; 16]);

        let consumer = std::thread::spawn(move || {
            std::thread::sleep(std::time::Duration::from_millis(50));
            rx.iter().collect::<Vec<MonitorEvent>>()
        });
        sink.on_error(&SourceError::StreamClosed);
        drop(sink);

        let events = consumer.join().unwrap();
        assert_eq!(events.len(), 2, "second waveform should have been dropped");
        assert!(matches!(events[0], MonitorEvent::Waveform(_)));
        assert!(matches!(events[1], MonitorEvent::Error(ref message) if *message == SourceError::StreamClosed.to_string()));
    }
}
