//! HTTP client for the external speech service.
//!
//! Two operations: recognize one utterance (WAV in, text or a classified
//! non-result out) and synthesize markup to WAV bytes. Authentication is a
//! subscription key plus region; endpoint URLs can be overridden for
//! non-standard deployments and tests.

use crate::config::SpeechConfig;
use crate::error::{DroidError, Result};
use crate::locale::Locale;
use crate::speech::Recognition;
use async_trait::async_trait;
use serde::Deserialize;
use std::io::Cursor;
use tracing::{info, warn};

/// Boundary contract for the speech service.
#[async_trait]
pub trait SpeechService: Send + Sync {
    /// Recognize a single utterance. Transport and service failures come
    /// back as [`Recognition::Cancelled`]; they are recoverable.
    async fn recognize(&self, wav: Vec<u8>, locale: Locale) -> Result<Recognition>;

    /// Synthesize a markup document to WAV bytes.
    ///
    /// # Errors
    ///
    /// Returns [`DroidError::Synthesis`]; callers log and continue.
    async fn synthesize(&self, ssml: &str, locale: Locale) -> Result<Vec<u8>>;
}

/// Wire format of a recognize-once response.
#[derive(Debug, Deserialize)]
struct RecognizeResponse {
    #[serde(rename = "RecognitionStatus")]
    status: String,
    #[serde(rename = "DisplayText", default)]
    display_text: String,
}

/// Speech service client over HTTP.
pub struct HttpSpeechService {
    client: reqwest::Client,
    key: String,
    stt_url: String,
    tts_url: String,
}

impl HttpSpeechService {
    /// Build a client for `region`, honoring endpoint overrides from config.
    #[must_use]
    pub fn new(config: &SpeechConfig, key: String, region: &str) -> Self {
        let stt_url = config.stt_endpoint.clone().unwrap_or_else(|| {
            format!(
                "https://{region}.stt.speech.microsoft.com/speech/recognition/conversation/cognitiveservices/v1"
            )
        });
        let tts_url = config.tts_endpoint.clone().unwrap_or_else(|| {
            format!("https://{region}.tts.speech.microsoft.com/cognitiveservices/v1")
        });
        Self {
            client: reqwest::Client::new(),
            key,
            stt_url,
            tts_url,
        }
    }
}

#[async_trait]
impl SpeechService for HttpSpeechService {
    async fn recognize(&self, wav: Vec<u8>, locale: Locale) -> Result<Recognition> {
        let response = self
            .client
            .post(&self.stt_url)
            .query(&[("language", locale.tag()), ("format", "simple")])
            .header("Ocp-Apim-Subscription-Key", &self.key)
            .header(
                "Content-Type",
                "audio/wav; codecs=audio/pcm; samplerate=16000",
            )
            .body(wav)
            .send()
            .await;

        let response = match response {
            Ok(r) => r,
            Err(e) => return Ok(Recognition::Cancelled(format!("transport error: {e}"))),
        };

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Ok(Recognition::Cancelled(format!(
                "recognizer returned {status}: {body}"
            )));
        }

        let parsed: RecognizeResponse = match response.json().await {
            Ok(p) => p,
            Err(e) => return Ok(Recognition::Cancelled(format!("malformed response: {e}"))),
        };

        match parsed.status.as_str() {
            "Success" => {
                info!("recognized: \"{}\"", parsed.display_text);
                Ok(Recognition::Recognized(parsed.display_text))
            }
            "NoMatch" | "InitialSilenceTimeout" | "BabbleTimeout" => {
                info!("no speech recognized ({})", parsed.status);
                Ok(Recognition::NoMatch)
            }
            other => Ok(Recognition::Cancelled(format!(
                "recognition ended with status {other}"
            ))),
        }
    }

    async fn synthesize(&self, ssml: &str, _locale: Locale) -> Result<Vec<u8>> {
        let response = self
            .client
            .post(&self.tts_url)
            .header("Ocp-Apim-Subscription-Key", &self.key)
            .header("Content-Type", "application/ssml+xml")
            .header("X-Microsoft-OutputFormat", "riff-16khz-16bit-mono-pcm")
            .body(ssml.to_owned())
            .send()
            .await
            .map_err(|e| DroidError::Synthesis(format!("transport error: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(DroidError::Synthesis(format!(
                "synthesizer returned {status}: {body}"
            )));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| DroidError::Synthesis(format!("body read error: {e}")))?;
        if bytes.is_empty() {
            warn!("synthesizer returned an empty body");
        }
        Ok(bytes.to_vec())
    }
}

/// Encode mono f32 samples as a 16-bit PCM WAV blob for the recognizer.
///
/// # Errors
///
/// Returns [`DroidError::Recognition`] on encoder failure.
pub fn encode_wav_mono16(samples: &[f32], sample_rate: u32) -> Result<Vec<u8>> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer = hound::WavWriter::new(&mut cursor, spec)
            .map_err(|e| DroidError::Recognition(format!("WAV encode error: {e}")))?;
        for &s in samples {
            let value = (s * 32767.0).clamp(-32768.0, 32767.0) as i16;
            writer
                .write_sample(value)
                .map_err(|e| DroidError::Recognition(format!("WAV encode error: {e}")))?;
        }
        writer
            .finalize()
            .map_err(|e| DroidError::Recognition(format!("WAV encode error: {e}")))?;
    }
    Ok(cursor.into_inner())
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use crate::config::SpeechConfig;
    use wiremock::matchers::{header, method, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn service(server: &MockServer) -> HttpSpeechService {
        let config = SpeechConfig {
            stt_endpoint: Some(format!("{}/stt", server.uri())),
            tts_endpoint: Some(format!("{}/tts", server.uri())),
            ..SpeechConfig::default()
        };
        HttpSpeechService::new(&config, "test-key".into(), "unused-region")
    }

    #[tokio::test]
    async fn recognize_success_returns_text() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(query_param("language", "en-US"))
            .and(header("Ocp-Apim-Subscription-Key", "test-key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "RecognitionStatus": "Success",
                "DisplayText": "What is the capital of Finland?"
            })))
            .mount(&server)
            .await;

        let result = service(&server)
            .recognize(vec![0; 16], Locale::English)
            .await
            .unwrap();
        assert_eq!(
            result,
            Recognition::Recognized("What is the capital of Finland?".into())
        );
    }

    #[tokio::test]
    async fn recognize_no_match_statuses() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "RecognitionStatus": "InitialSilenceTimeout"
            })))
            .mount(&server)
            .await;

        let result = service(&server)
            .recognize(vec![0; 16], Locale::Finnish)
            .await
            .unwrap();
        assert_eq!(result, Recognition::NoMatch);
    }

    #[tokio::test]
    async fn recognize_http_error_is_cancelled_not_fatal() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(401).set_body_string("bad key"))
            .mount(&server)
            .await;

        let result = service(&server)
            .recognize(vec![0; 16], Locale::English)
            .await
            .unwrap();
        assert!(matches!(result, Recognition::Cancelled(reason) if reason.contains("401")));
    }

    #[tokio::test]
    async fn synthesize_returns_audio_bytes() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(header("Content-Type", "application/ssml+xml"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"RIFFfake".to_vec()))
            .mount(&server)
            .await;

        let bytes = service(&server)
            .synthesize("<speak>hi</speak>", Locale::English)
            .await
            .unwrap();
        assert_eq!(bytes, b"RIFFfake");
    }

    #[tokio::test]
    async fn synthesize_error_is_synthesis_kind() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let err = service(&server)
            .synthesize("<speak>hi</speak>", Locale::English)
            .await
            .unwrap_err();
        assert!(matches!(err, DroidError::Synthesis(_)));
    }

    #[test]
    fn wav_encoding_round_trips_through_hound() {
        let samples = vec![0.0f32, 0.5, -0.5, 1.0];
        let blob = encode_wav_mono16(&samples, 16_000).unwrap();
        let reader = hound::WavReader::new(Cursor::new(blob)).unwrap();
        assert_eq!(reader.spec().channels, 1);
        assert_eq!(reader.spec().sample_rate, 16_000);
        assert_eq!(reader.len(), 4);
    }
}
