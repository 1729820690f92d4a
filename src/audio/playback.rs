//! Playback of synthesized replies on the configured output device.
//!
//! Synthesis hands us a complete WAV blob; playback decodes it and drives
//! a cpal output stream to completion. Everything here is blocking and is
//! expected to run inside `spawn_blocking`.

use crate::config::AudioConfig;
use crate::error::{DroidError, Result};
use cpal::StreamConfig;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use std::io::Cursor;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{error, info};

/// Decode a WAV blob and play it to completion.
///
/// # Errors
///
/// Returns [`DroidError::Audio`] if the blob cannot be decoded or the
/// output stream cannot be started.
pub fn play_wav(config: &AudioConfig, wav: &[u8]) -> Result<()> {
    let (samples, sample_rate) = decode_wav_mono(wav)?;
    play_samples(config, &samples, sample_rate)
}

/// Play mono f32 samples to completion on the configured output device.
///
/// # Errors
///
/// Returns [`DroidError::Audio`] on device or stream failure.
pub fn play_samples(config: &AudioConfig, samples: &[f32], sample_rate: u32) -> Result<()> {
    let host = cpal::default_host();

    let device = match config.output_device {
        Some(ref name) => host
            .output_devices()
            .map_err(|e| DroidError::Audio(format!("cannot enumerate devices: {e}")))?
            .find(|d| {
                d.description()
                    .ok()
                    .map(|desc| desc.name() == name)
                    .unwrap_or(false)
            })
            .ok_or_else(|| DroidError::Audio(format!("output device '{name}' not found")))?,
        None => host
            .default_output_device()
            .ok_or_else(|| DroidError::Audio("no default output device".into()))?,
    };

    let device_name = device
        .description()
        .map(|d| d.name().to_owned())
        .unwrap_or_else(|_| "<unknown>".into());
    info!("playing {} samples on '{device_name}'", samples.len());

    let stream_config = StreamConfig {
        channels: 1,
        sample_rate,
        buffer_size: cpal::BufferSize::Default,
    };

    let cursor = Arc::new(Mutex::new(PlayCursor {
        samples: samples.to_vec(),
        position: 0,
        finished: samples.is_empty(),
    }));
    let cursor_cb = Arc::clone(&cursor);

    let stream = device
        .build_output_stream(
            &stream_config,
            move |data: &mut [f32], _info: &cpal::OutputCallbackInfo| {
                let mut cur = match cursor_cb.lock() {
                    Ok(c) => c,
                    Err(_) => return,
                };
                for sample in data.iter_mut() {
                    if cur.position < cur.samples.len() {
                        *sample = cur.samples[cur.position];
                        cur.position += 1;
                    } else {
                        *sample = 0.0;
                        cur.finished = true;
                    }
                }
            },
            move |err| {
                error!("output stream error: {err}");
            },
            None,
        )
        .map_err(|e| DroidError::Audio(format!("failed to build output stream: {e}")))?;

    stream
        .play()
        .map_err(|e| DroidError::Audio(format!("failed to start output stream: {e}")))?;

    loop {
        std::thread::sleep(Duration::from_millis(10));
        let cur = cursor
            .lock()
            .map_err(|e| DroidError::Audio(format!("playback cursor poisoned: {e}")))?;
        if cur.finished {
            break;
        }
    }

    drop(stream);
    Ok(())
}

struct PlayCursor {
    samples: Vec<f32>,
    position: usize,
    finished: bool,
}

/// Decode a WAV blob to mono f32 samples.
fn decode_wav_mono(wav: &[u8]) -> Result<(Vec<f32>, u32)> {
    let mut reader = hound::WavReader::new(Cursor::new(wav))
        .map_err(|e| DroidError::Audio(format!("invalid WAV: {e}")))?;
    let spec = reader.spec();

    let samples: Vec<f32> = match spec.sample_format {
        hound::SampleFormat::Int => {
            let max = (1i64 << (spec.bits_per_sample - 1)) as f32;
            reader
                .samples::<i32>()
                .map(|s| {
                    s.map(|v| v as f32 / max)
                        .map_err(|e| DroidError::Audio(format!("WAV read error: {e}")))
                })
                .collect::<Result<Vec<f32>>>()?
        }
        hound::SampleFormat::Float => reader
            .samples::<f32>()
            .map(|s| s.map_err(|e| DroidError::Audio(format!("WAV read error: {e}"))))
            .collect::<Result<Vec<f32>>>()?,
    };

    let mono = if spec.channels > 1 {
        let ch = spec.channels as usize;
        samples
            .chunks(ch)
            .map(|frame| frame.iter().sum::<f32>() / ch as f32)
            .collect()
    } else {
        samples
    };

    Ok((mono, spec.sample_rate))
}
