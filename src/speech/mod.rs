//! Speech I/O against the external speech service.
//!
//! One recognize-once operation (microphone → endpointed utterance → text)
//! and one speak operation (text → markup → synthesized WAV → playback).
//! No state is carried across calls.

pub mod endpoint;
pub mod service;

use crate::audio::{MicArbiter, capture, playback};
use crate::config::{AudioConfig, SpeechConfig};
use crate::error::{DroidError, Result};
use crate::locale::Locale;
use crate::speech::endpoint::Endpointer;
use crate::speech::service::SpeechService;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Outcome of a single recognize-once call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Recognition {
    /// The utterance was recognized as text.
    Recognized(String),
    /// Nothing usable was heard.
    NoMatch,
    /// Recognition was cancelled with a reason. Callers log the reason and
    /// treat this exactly like [`Recognition::NoMatch`].
    Cancelled(String),
}

/// The speech operations a dialogue session depends on.
#[async_trait]
pub trait Speech: Send + Sync {
    /// Recognize one utterance in `locale`.
    async fn recognize_once(&self, locale: Locale) -> Result<Recognition>;

    /// Synthesize and play `text` with the locale's fixed voice. Failures
    /// are non-fatal; callers log and continue.
    async fn speak(&self, text: &str, locale: Locale) -> Result<()>;
}

/// Production speech I/O: leased microphone capture plus the HTTP service.
pub struct SpeechIo {
    service: Arc<dyn SpeechService>,
    arbiter: MicArbiter,
    audio: AudioConfig,
    speech: SpeechConfig,
}

impl SpeechIo {
    #[must_use]
    pub fn new(
        service: Arc<dyn SpeechService>,
        arbiter: MicArbiter,
        audio: AudioConfig,
        speech: SpeechConfig,
    ) -> Self {
        Self {
            service,
            arbiter,
            audio,
            speech,
        }
    }
}

#[async_trait]
impl Speech for SpeechIo {
    /// Holds the microphone lease for the duration of the call and releases
    /// it on return; capture stops before the recognizer request goes out.
    async fn recognize_once(&self, locale: Locale) -> Result<Recognition> {
        let lease = self.arbiter.acquire().await;
        let mut frames = capture::open(&lease, &self.audio)?;
        let mut endpointer = Endpointer::new(&self.speech.endpointing, self.audio.input_sample_rate);
        info!("listening for one utterance ({})", locale.tag());

        let initial = Duration::from_secs(self.speech.endpointing.initial_silence_secs);
        let max_utterance = Duration::from_secs(self.speech.endpointing.max_utterance_secs);
        let mut deadline = tokio::time::Instant::now() + initial;
        let mut speech_started = false;

        let utterance = loop {
            tokio::select! {
                () = tokio::time::sleep_until(deadline) => {
                    // Initial silence ran out, or the utterance hit its cap.
                    break endpointer.flush();
                }
                chunk = frames.next_chunk() => {
                    let Some(chunk) = chunk else { break endpointer.flush(); };
                    if let Some(utterance) = endpointer.push(&chunk.samples) {
                        break Some(utterance);
                    }
                    if endpointer.in_speech() && !speech_started {
                        speech_started = true;
                        deadline = tokio::time::Instant::now() + max_utterance;
                    }
                }
            }
        };

        // Free the native capture handle before the service round-trip.
        drop(frames);

        let recognition = match utterance {
            None => {
                info!("no speech captured");
                Recognition::NoMatch
            }
            Some(samples) => {
                let wav = service::encode_wav_mono16(&samples, self.audio.input_sample_rate)?;
                self.service.recognize(wav, locale).await?
            }
        };

        drop(lease);
        Ok(recognition)
    }

    async fn speak(&self, text: &str, locale: Locale) -> Result<()> {
        let ssml = build_ssml(text, locale);
        let wav = self.service.synthesize(&ssml, locale).await?;

        let audio = self.audio.clone();
        tokio::task::spawn_blocking(move || playback::play_wav(&audio, &wav))
            .await
            .map_err(|e| DroidError::Synthesis(format!("playback task failed: {e}")))?
    }
}

/// Wrap reply text in the synthesis markup envelope with the locale's voice.
///
/// The reply may itself carry emphasis markup; it is passed through, not
/// escaped.
#[must_use]
pub fn build_ssml(text: &str, locale: Locale) -> String {
    format!(
        "<speak xmlns=\"http://www.w3.org/2001/10/synthesis\" \
         xmlns:mstts=\"http://www.w3.org/2001/mstts\" \
         version=\"1.0\" xml:lang=\"{lang}\">\
         <voice name=\"{voice}\">{text}</voice>\
         </speak>",
        lang = locale.voice_lang(),
        voice = locale.voice(),
    )
}
