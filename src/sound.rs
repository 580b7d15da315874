//! Feedback-sound sink: fire-and-forget playback keyed by a closed set of
//! semantic event names (spec §3/§6). Grounded on
//! `original_source/src/sound.py`'s `_LoadedSounds`/`load_sounds`/
//! `_play_sound`, reimplemented over `cpal` output + `hound` WAV decode
//! (the teacher's I/O stack) instead of `sounddevice`/`numpy`.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FeedbackEvent {
    Startup,
    Ready,
    Understood,
    Ok,
    No,
}

impl FeedbackEvent {
    fn filename(self) -> &'static str {
        match self {
            FeedbackEvent::Startup => "startup.wav",
            FeedbackEvent::Ready => "ready.wav",
            FeedbackEvent::Understood => "understood.wav",
            FeedbackEvent::Ok => "ok.wav",
            FeedbackEvent::No => "no.wav",
        }
    }
}

#[derive(Clone)]
struct Waveform {
    samples: Arc<Vec<f32>>,
    channels: u16,
    sample_rate: u32,
}

/// Holds decoded waveforms for every event that loaded successfully. Events
/// with no matching (or unreadable) file are silently skipped on playback.
pub struct SoundSink {
    output_device: Option<String>,
    sounds: HashMap<&'static str, Waveform>,
}

impl SoundSink {
    /// Scans `resources_dir` for `<event>.wav` files and decodes each with
    /// `hound`, matching `original_source/src/sound.py`'s `load_sounds()`.
    /// Unreadable files are logged and skipped, never fatal.
    pub fn load(resources_dir: &Path, output_device: Option<String>) -> Self {
        let mut sounds = HashMap::new();
        for event in [
            FeedbackEvent::Startup,
            FeedbackEvent::Ready,
            FeedbackEvent::Understood,
            FeedbackEvent::Ok,
            FeedbackEvent::No,
        ] {
            let path = resources_dir.join(event.filename());
            match decode_wav(&path) {
                Ok(waveform) => {
                    sounds.insert(event.filename(), waveform);
                }
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "could not load sound");
                }
            }
        }
        tracing::info!(count = sounds.len(), "feedback sounds loaded");
        Self {
            output_device,
            sounds,
        }
    }

    /// A sink with no loaded sounds — every `play` is a silent no-op. Used
    /// in tests and wherever feedback audio is undesirable.
    pub fn silent() -> Self {
        Self {
            output_device: None,
            sounds: HashMap::new(),
        }
    }

    /// Best-effort, non-blocking playback: spawns the output stream on a
    /// detached thread and returns immediately. Failures are logged, never
    /// propagated (spec §3: "playback is best-effort and non-blocking").
    pub fn play(&self, event: FeedbackEvent) {
        let Some(waveform) = self.sounds.get(event.filename()).cloned() else {
            return;
        };
        let output_device = self.output_device.clone();
        std::thread::spawn(move || {
            if let Err(e) = play_waveform(&waveform, output_device.as_deref()) {
                tracing::warn!(error = %e, "could not play feedback sound");
            }
        });
    }
}

fn decode_wav(path: &Path) -> Result<Waveform, hound::Error> {
    let mut reader = hound::WavReader::open(path)?;
    let spec = reader.spec();
    let samples: Vec<f32> = match spec.sample_format {
        hound::SampleFormat::Int => reader
            .samples::<i16>()
            .map(|s| s.map(|v| v as f32 / 32768.0))
            .collect::<Result<Vec<_>, _>>()?,
        hound::SampleFormat::Float => reader.samples::<f32>().collect::<Result<Vec<_>, _>>()?,
    };
    Ok(Waveform {
        samples: Arc::new(samples),
        channels: spec.channels,
        sample_rate: spec.sample_rate,
    })
}

fn play_waveform(waveform: &Waveform, device_name: Option<&str>) -> Result<(), String> {
    let host = cpal::default_host();
    let device = match device_name {
        Some(name) => {
            let needle = name.to_lowercase();
            host.output_devices()
                .map_err(|e| e.to_string())?
                .find(|d| {
                    d.name()
                        .map(|n| n.to_lowercase().contains(&needle))
                        .unwrap_or(false)
                })
                .ok_or_else(|| format!("no output device matching '{name}'"))?
        }
        None => host
            .default_output_device()
            .ok_or_else(|| "no default output device".to_string())?,
    };

    let config = cpal::StreamConfig {
        channels: waveform.channels,
        sample_rate: cpal::SampleRate(waveform.sample_rate),
        buffer_size: cpal::BufferSize::Default,
    };

    let samples = waveform.samples.clone();
    let mut cursor = 0usize;
    let done = Arc::new(std::sync::atomic::AtomicBool::new(false));
    let done_writer = done.clone();

    let stream = device
        .build_output_stream(
            &config,
            move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                for sample in data.iter_mut() {
                    *sample = samples.get(cursor).copied().unwrap_or(0.0);
                    cursor += 1;
                }
                if cursor >= samples.len() {
                    done_writer.store(true, std::sync::atomic::Ordering::Relaxed);
                }
            },
            |err| tracing::warn!(error = %err, "feedback sound stream error"),
            None,
        )
        .map_err(|e| e.to_string())?;

    stream.play().map_err(|e| e.to_string())?;

    let frame_duration = waveform.samples.len() as f32
        / (waveform.sample_rate as f32 * waveform.channels.max(1) as f32);
    std::thread::sleep(std::time::Duration::from_secs_f32(frame_duration + 0.1));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_silent_sink_never_panics() {
        let sink = SoundSink::silent();
        sink.play(FeedbackEvent::Startup);
        sink.play(FeedbackEvent::Ok);
    }

    #[test]
    fn test_load_missing_directory_yields_empty_sink() {
        let sink = SoundSink::load(Path::new("/nonexistent/resources"), None);
        assert_eq!(sink.sounds.len(), 0);
    }
}
