//! Cross-platform microphone capture via `cpal`.
//!
//! Replaces the teacher's WASAPI-only `MicCapture` with a backend that works
//! on ALSA/CoreAudio/WASAPI alike, matching the device-name substring
//! contract of spec §6. Samples are pushed into the caller's `RingBuffer`
//! from cpal's own driver-owned callback thread — the source never polls.

use std::sync::Arc;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};

use crate::audio::ring_buffer::RingBuffer;
use crate::error::AudioDeviceError;

/// An open capture stream. Dropping it (or calling `close`) stops the stream
/// and releases the device.
pub struct AudioSource {
    stream: cpal::Stream,
}

impl AudioSource {
    /// Opens the named (or default) input device and starts streaming mono
    /// PCM at `sample_rate` into `sink.extend(...)` from cpal's callback
    /// thread. `device_name` is matched as a case-insensitive substring
    /// against the platform's device enumeration.
    pub fn open(
        sink: Arc<RingBuffer>,
        device_name: Option<&str>,
        sample_rate: u32,
    ) -> Result<Self, AudioDeviceError> {
        let host = cpal::default_host();
        let device = find_input_device(&host, device_name)?;

        let config = cpal::StreamConfig {
            channels: 1,
            sample_rate: cpal::SampleRate(sample_rate),
            buffer_size: cpal::BufferSize::Default,
        };

        let stream = device
            .build_input_stream(
                &config,
                move |data: &[i16], _: &cpal::InputCallbackInfo| {
                    sink.extend(data);
                },
                move |err| {
                    tracing::warn!(error = %err, "audio input stream error");
                },
                None,
            )
            .map_err(|e| AudioDeviceError::BuildStream(e.to_string()))?;

        stream
            .play()
            .map_err(|e| AudioDeviceError::StartStream(e.to_string()))?;

        tracing::info!(sample_rate, device = device_name, "capture stream opened");
        Ok(Self { stream })
    }

    /// Stops the stream. Dropping `AudioSource` has the same effect.
    pub fn close(self) {
        let _ = self.stream.pause();
    }
}

fn find_input_device(
    host: &cpal::Host,
    device_name: Option<&str>,
) -> Result<cpal::Device, AudioDeviceError> {
    match device_name {
        Some(name) => {
            let needle = name.to_lowercase();
            let devices = host
                .input_devices()
                .map_err(|e| AudioDeviceError::BuildStream(e.to_string()))?;
            for device in devices {
                if let Ok(dev_name) = device.name() {
                    if dev_name.to_lowercase().contains(&needle) {
                        return Ok(device);
                    }
                }
            }
            Err(AudioDeviceError::NoMatchingDevice(name.to_string()))
        }
        None => host
            .default_input_device()
            .ok_or_else(|| AudioDeviceError::NoMatchingDevice("<default>".to_string())),
    }
}
