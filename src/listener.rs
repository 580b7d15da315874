//! Two-stage listener state machine: `AwaitingKeyword` → `RecordingInstruction`
//! → dispatch (spec §4.4). Drives the Audio Source, Ring Buffers, VAD
//! Analyzer and Adaptive Threshold Estimator; the sole thread that blocks
//! on `start_listening`.
//!
//! Thread-orchestration style (named `std::thread::Builder`, level-triggered
//! `Arc<AtomicBool>` shutdown) grounded on the teacher's `recorder.rs`,
//! generalized from "spawn capture/writer threads and wait" to "drive
//! keyword/instruction stages sequentially on the calling thread".

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::audio::capture::AudioSource;
use crate::audio::ring_buffer::RingBuffer;
use crate::audio::threshold::AdaptiveThreshold;
use crate::audio::vad::{self, VadParams};
use crate::config::Config;
use crate::error::AudioDeviceError;
use crate::sound::{FeedbackEvent, SoundSink};
use crate::transcribe::{normalize, Transcriber, TranscriptionRequest};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListenerState {
    Idle,
    AwaitingKeyword,
    RecordingInstruction,
}

const BYTES_PER_SAMPLE: u32 = 2;

/// Cloneable cancellation handle returned by [`Listener::handle`].
#[derive(Clone)]
pub struct ListenerHandle {
    is_listening: Arc<AtomicBool>,
}

impl ListenerHandle {
    pub fn stop(&self) {
        self.is_listening.store(false, Ordering::Relaxed);
    }
}

pub struct Listener {
    config: Config,
    keyword_buffer: Arc<RingBuffer>,
    instruction_buffer: Arc<RingBuffer>,
    threshold: AdaptiveThreshold,
    vad_params: VadParams,
    is_listening: Arc<AtomicBool>,
    state: ListenerState,
    transcriber: Arc<dyn Transcriber>,
    sounds: Arc<SoundSink>,
    normalized_keyword: String,
}

impl Listener {
    pub fn new(
        config: Config,
        transcriber: Arc<dyn Transcriber>,
        sounds: Arc<SoundSink>,
    ) -> Result<Self, crate::error::ConfigError> {
        let normalized_keyword = normalize(&config.keyword.keyword);
        if normalized_keyword.trim().is_empty() {
            return Err(crate::error::ConfigError::MissingOption("keyword"));
        }

        let keyword_buffer = Arc::new(RingBuffer::with_duration(
            config.capture.sample_rate,
            BYTES_PER_SAMPLE,
            config.keyword.keyword_queue_length_seconds,
        ));
        let instruction_buffer = Arc::new(RingBuffer::with_duration(
            config.capture.sample_rate,
            BYTES_PER_SAMPLE,
            config.keyword.instruction_queue_length_seconds,
        ));

        let vad_params = VadParams {
            bucket_count: config.vad.speech_bucket_count,
            required_leading_silence_ratio: config.vad.required_leading_silence_ratio,
            required_speech_ratio: config.vad.required_speech_ratio,
            required_trailing_silence_ratio: config.vad.required_trailing_silence_ratio,
        };
        let threshold =
            AdaptiveThreshold::new(config.vad.min_silence_threshold, config.vad.ambiance_level_factor);

        Ok(Self {
            config,
            keyword_buffer,
            instruction_buffer,
            threshold,
            vad_params,
            is_listening: Arc::new(AtomicBool::new(false)),
            state: ListenerState::Idle,
            transcriber,
            sounds,
            normalized_keyword,
        })
    }

    pub fn state(&self) -> ListenerState {
        self.state
    }

    /// Level-triggered cancellation signal: sets `is_listening = false`. The
    /// loop exits at the next check inside either stage; an in-flight
    /// transcription or sleep runs to completion (spec §5).
    pub fn stop_listening(&self) {
        self.is_listening.store(false, Ordering::Relaxed);
    }

    /// A cloneable, `Send`-able handle that can signal `stop_listening` from
    /// another thread while `start_listening` blocks the calling thread.
    pub fn handle(&self) -> ListenerHandle {
        ListenerHandle {
            is_listening: self.is_listening.clone(),
        }
    }

    /// Blocks the calling thread until `stop_listening()` is called. Calling
    /// this while already listening is a no-op, logged as a warning
    /// (spec §4.4 tie-breaks).
    pub fn start_listening(
        &mut self,
        mut on_instruction: impl FnMut(&str),
    ) -> Result<(), AudioDeviceError> {
        if self.is_listening.swap(true, Ordering::Relaxed) {
            tracing::warn!("start_listening called while already listening; ignoring");
            return Ok(());
        }

        self.sounds.play(FeedbackEvent::Startup);

        while self.is_listening.load(Ordering::Relaxed) {
            self.state = ListenerState::AwaitingKeyword;
            self.run_awaiting_keyword_stage()?;

            if !self.is_listening.load(Ordering::Relaxed) {
                break;
            }

            self.sounds.play(FeedbackEvent::Ready);
            self.keyword_buffer.clear();
            self.instruction_buffer.clear();

            self.state = ListenerState::RecordingInstruction;
            let instruction_text = self.run_recording_instruction_stage()?;

            on_instruction(&instruction_text);

            self.keyword_buffer.clear();
            self.instruction_buffer.clear();
        }

        self.state = ListenerState::Idle;
        Ok(())
    }

    fn run_awaiting_keyword_stage(&mut self) -> Result<(), AudioDeviceError> {
        let source = AudioSource::open(
            self.keyword_buffer.clone(),
            self.config.capture.input_device.as_deref(),
            self.config.capture.sample_rate,
        )?;

        loop {
            if !self.is_listening.load(Ordering::Relaxed) {
                break;
            }

            let snapshot = self.keyword_buffer.snapshot();
            let threshold = self.threshold.current();
            let (relevant, mean_abs) = vad::is_keyword_buffer_relevant(
                &snapshot,
                self.keyword_buffer.capacity(),
                threshold,
                &self.vad_params,
            );
            self.threshold.record(mean_abs);

            if relevant {
                let request = TranscriptionRequest {
                    samples: &snapshot,
                    sample_rate: self.config.capture.sample_rate,
                    language: &self.config.transcription.language,
                    hot_words: vec![(self.config.keyword.keyword.clone(), 10)],
                };
                let text = match self.transcriber.transcribe(&request) {
                    Ok(text) => text,
                    Err(e) => {
                        tracing::warn!(error = %e, "transcription failed during keyword stage");
                        String::new()
                    }
                };
                let normalized = normalize(&text);
                if normalized.contains(&self.normalized_keyword) {
                    tracing::info!("keyword detected");
                    break;
                }
            }

            std::thread::sleep(Duration::from_secs_f32(
                self.config.keyword.queue_check_interval_seconds,
            ));
        }

        source.close();
        Ok(())
    }

    fn run_recording_instruction_stage(&mut self) -> Result<String, AudioDeviceError> {
        let source = AudioSource::open(
            self.instruction_buffer.clone(),
            self.config.capture.input_device.as_deref(),
            self.config.capture.sample_rate,
        )?;

        loop {
            if !self.is_listening.load(Ordering::Relaxed) {
                break;
            }

            let snapshot = self.instruction_buffer.snapshot();
            let threshold = self.threshold.current();
            let done = vad::is_instruction_buffer_done(
                &snapshot,
                self.instruction_buffer.capacity(),
                threshold,
                &self.vad_params,
            );
            if done || snapshot.len() >= self.instruction_buffer.capacity() {
                break;
            }

            std::thread::sleep(Duration::from_secs_f32(
                self.config.keyword.queue_check_interval_seconds,
            ));
        }

        source.close();

        let snapshot = self.instruction_buffer.snapshot();
        let request = TranscriptionRequest {
            samples: &snapshot,
            sample_rate: self.config.capture.sample_rate,
            language: &self.config.transcription.language,
            hot_words: Vec::new(),
        };
        let text = match self.transcriber.transcribe(&request) {
            Ok(text) => text,
            Err(e) => {
                tracing::warn!(error = %e, "transcription failed during instruction stage");
                String::new()
            }
        };
        Ok(normalize(&text))
    }
}
