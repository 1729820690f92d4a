//! Wake phrase detection: the engine boundary and the listener driving it.

pub mod spotter;

use crate::audio::{AudioChunk, MicArbiter, capture};
use crate::config::AudioConfig;
use crate::error::{DroidError, Result, WakeEngineError};
use crate::locale::Locale;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Boundary contract for a wake-word engine.
///
/// Implementations consume 16 kHz mono sample chunks and report which
/// configured keyword fired, by index. Engine faults use the
/// [`WakeEngineError`] taxonomy and are fatal to the process.
pub trait WakeEngine: Send {
    /// Feed one chunk of samples. Returns the index of the keyword that
    /// fired, if any.
    fn process(&mut self, samples: &[f32]) -> std::result::Result<Option<usize>, WakeEngineError>;

    /// Discard buffered audio, e.g. after a detection.
    fn reset(&mut self);
}

/// A detected occurrence of one configured wake phrase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WakeEvent {
    /// Index of the keyword that fired.
    pub keyword: usize,
    /// Session locale selected by the keyword.
    pub locale: Locale,
    /// When the detection happened.
    pub detected_at: Instant,
}

/// Listens on the microphone until a wake phrase fires.
pub struct WakeListener {
    engine: Box<dyn WakeEngine>,
    arbiter: MicArbiter,
    audio: AudioConfig,
}

impl WakeListener {
    #[must_use]
    pub fn new(engine: Box<dyn WakeEngine>, arbiter: MicArbiter, audio: AudioConfig) -> Self {
        Self {
            engine,
            arbiter,
            audio,
        }
    }

    /// Block until a wake phrase is detected.
    ///
    /// Holds the microphone lease while listening and releases it (stopping
    /// capture and freeing the native handle) before returning, so the
    /// recognizer can acquire the device next. Returns `Ok(None)` when the
    /// cancellation token fires: an interrupt unwinds cleanly without
    /// re-raising.
    ///
    /// # Errors
    ///
    /// Propagates engine faults ([`WakeEngineError`], fatal) and capture
    /// failures.
    pub async fn wait_for_wake(&mut self, cancel: &CancellationToken) -> Result<Option<WakeEvent>> {
        let lease = self.arbiter.acquire().await;
        let mut frames = capture::open(&lease, &self.audio)?;
        info!("listening for wake phrase");

        let outcome = loop {
            tokio::select! {
                () = cancel.cancelled() => break Ok(None),
                chunk = frames.next_chunk() => {
                    let Some(chunk) = chunk else {
                        break Err(DroidError::Audio("capture stream ended".into()));
                    };
                    match poll_engine(self.engine.as_mut(), &chunk) {
                        Ok(Some(event)) => break Ok(Some(event)),
                        Ok(None) => {}
                        Err(e) => break Err(e),
                    }
                }
            }
        };

        // Release order matters: recorder first, then the lease.
        drop(frames);
        drop(lease);
        outcome
    }
}

/// Feed one chunk to the engine and turn a detection into a [`WakeEvent`].
fn poll_engine(engine: &mut dyn WakeEngine, chunk: &AudioChunk) -> Result<Option<WakeEvent>> {
    match engine.process(&chunk.samples) {
        Ok(Some(keyword)) => {
            engine.reset();
            let event = WakeEvent {
                keyword,
                locale: Locale::from_keyword_index(keyword),
                detected_at: Instant::now(),
            };
            info!("wake phrase {} detected ({:?})", event.keyword, event.locale);
            Ok(Some(event))
        }
        Ok(None) => Ok(None),
        Err(e) => Err(DroidError::Wake(e)),
    }
}
