//! Microphone capture through a leased input device.
//!
//! The cpal stream lives on a dedicated worker thread (streams are not
//! `Send`); chunks arrive on an async channel. Dropping the
//! [`CaptureStream`] stops the worker and frees the native handle before
//! the drop returns, which is what lets the arbiter guarantee
//! release-then-acquire handoff.

use crate::audio::{AudioChunk, MicLease};
use crate::config::AudioConfig;
use crate::error::{DroidError, Result};
use cpal::StreamConfig;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use std::marker::PhantomData;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tracing::{debug, error, info};

/// Chunks buffered between the audio thread and the consumer.
const CHUNK_CHANNEL_SIZE: usize = 64;
/// Poll interval for the worker's stop flag.
const STOP_POLL: Duration = Duration::from_millis(20);

/// A running capture stream tied to a [`MicLease`].
pub struct CaptureStream<'lease> {
    rx: mpsc::Receiver<AudioChunk>,
    stop: Arc<AtomicBool>,
    worker: Option<std::thread::JoinHandle<()>>,
    _lease: PhantomData<&'lease MicLease>,
}

impl CaptureStream<'_> {
    /// Receive the next chunk of mono samples at the configured rate.
    ///
    /// Returns `None` if the audio thread has stopped.
    pub async fn next_chunk(&mut self) -> Option<AudioChunk> {
        self.rx.recv().await
    }
}

impl Drop for CaptureStream<'_> {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Release);
        if let Some(worker) = self.worker.take() {
            // Joining frees the native input handle; bounded by STOP_POLL.
            let _ = worker.join();
        }
    }
}

/// Open a capture stream on the leased microphone.
///
/// Audio is converted to mono and resampled to `config.input_sample_rate`
/// before delivery.
///
/// # Errors
///
/// Returns [`DroidError::Audio`] if the device cannot be found or the
/// stream cannot be started.
pub fn open<'lease>(
    _lease: &'lease MicLease,
    config: &AudioConfig,
) -> Result<CaptureStream<'lease>> {
    let (tx, rx) = mpsc::channel::<AudioChunk>(CHUNK_CHANNEL_SIZE);
    let (ready_tx, ready_rx) = std::sync::mpsc::channel::<Result<()>>();
    let stop = Arc::new(AtomicBool::new(false));

    let worker_stop = Arc::clone(&stop);
    let device_name = config.input_device.clone();
    let target_rate = config.input_sample_rate;

    let worker = std::thread::Builder::new()
        .name("mic-capture".into())
        .spawn(move || match start_stream(device_name, target_rate, tx) {
            Ok(stream) => {
                let _ = ready_tx.send(Ok(()));
                while !worker_stop.load(Ordering::Acquire) {
                    std::thread::sleep(STOP_POLL);
                }
                drop(stream);
            }
            Err(e) => {
                let _ = ready_tx.send(Err(e));
            }
        })
        .map_err(|e| DroidError::Audio(format!("cannot spawn capture thread: {e}")))?;

    match ready_rx.recv_timeout(Duration::from_secs(5)) {
        Ok(Ok(())) => Ok(CaptureStream {
            rx,
            stop,
            worker: Some(worker),
            _lease: PhantomData,
        }),
        Ok(Err(e)) => {
            let _ = worker.join();
            Err(e)
        }
        Err(_) => {
            stop.store(true, Ordering::Release);
            let _ = worker.join();
            Err(DroidError::Audio("capture thread did not start".into()))
        }
    }
}

/// Resolve the input device and start the native stream.
fn start_stream(
    device_name: Option<String>,
    target_rate: u32,
    tx: mpsc::Sender<AudioChunk>,
) -> Result<cpal::Stream> {
    let host = cpal::default_host();

    let device = match device_name {
        Some(ref name) => host
            .input_devices()
            .map_err(|e| DroidError::Audio(format!("cannot enumerate devices: {e}")))?
            .find(|d| {
                d.description()
                    .ok()
                    .map(|desc| desc.name() == name)
                    .unwrap_or(false)
            })
            .ok_or_else(|| DroidError::Audio(format!("input device '{name}' not found")))?,
        None => host
            .default_input_device()
            .ok_or_else(|| DroidError::Audio("no default input device".into()))?,
    };

    let default_config = device
        .default_input_config()
        .map_err(|e| DroidError::Audio(format!("no default input config: {e}")))?;
    let native_rate = default_config.sample_rate();
    let native_channels = default_config.channels();

    let stream_config = StreamConfig {
        channels: native_channels,
        sample_rate: native_rate,
        buffer_size: cpal::BufferSize::Default,
    };

    info!("capturing at {native_rate}Hz/{native_channels}ch, delivering {target_rate}Hz mono");

    let stream = device
        .build_input_stream(
            &stream_config,
            move |data: &[f32], _info: &cpal::InputCallbackInfo| {
                let samples = condition(data, native_channels, native_rate, target_rate);
                let chunk = AudioChunk {
                    samples,
                    sample_rate: target_rate,
                    captured_at: Instant::now(),
                };
                // Never block the audio thread; a full channel drops.
                if tx.try_send(chunk).is_err() {
                    debug!("capture channel full, dropping chunk");
                }
            },
            move |err| {
                error!("input stream error: {err}");
            },
            None,
        )
        .map_err(|e| DroidError::Audio(format!("failed to build input stream: {e}")))?;

    stream
        .play()
        .map_err(|e| DroidError::Audio(format!("failed to start input stream: {e}")))?;

    Ok(stream)
}

/// Mix to mono and resample to the target rate.
fn condition(data: &[f32], channels: u16, native_rate: u32, target_rate: u32) -> Vec<f32> {
    let mono: Vec<f32> = if channels > 1 {
        let ch = channels as usize;
        data.chunks(ch)
            .map(|frame| frame.iter().sum::<f32>() / ch as f32)
            .collect()
    } else {
        data.to_vec()
    };

    if native_rate == target_rate {
        return mono;
    }
    resample_linear(&mono, native_rate, target_rate)
}

/// Linear-interpolation resampler. Good enough for speech-band capture.
fn resample_linear(samples: &[f32], from_rate: u32, to_rate: u32) -> Vec<f32> {
    if samples.is_empty() || from_rate == 0 || to_rate == 0 {
        return Vec::new();
    }
    let ratio = from_rate as f64 / to_rate as f64;
    let out_len = ((samples.len() as f64) / ratio).floor() as usize;
    let mut out = Vec::with_capacity(out_len);
    for i in 0..out_len {
        let pos = i as f64 * ratio;
        let base = pos.floor() as usize;
        let frac = (pos - base as f64) as f32;
        let a = samples[base];
        let b = samples.get(base + 1).copied().unwrap_or(a);
        out.push(a + (b - a) * frac);
    }
    out
}
