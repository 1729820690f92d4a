//! Configuration types and startup credential loading.
//!
//! Tunables live in a TOML file (default `~/.rubberduck/config.toml`);
//! secrets are resolved from the environment exactly once at startup.
//! A missing required credential is a fatal [`DroidError::Config`].

use crate::error::{DroidError, Result};
use crate::locale::Locale;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// Top-level configuration for the droid.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DroidConfig {
    /// Audio capture/playback settings.
    pub audio: AudioConfig,
    /// Wake phrase detection settings.
    pub wake: WakeConfig,
    /// Speech service and utterance endpointing settings.
    pub speech: SpeechConfig,
    /// Reasoning service settings.
    pub agent: AgentConfig,
    /// Session and status-screen settings.
    pub conversation: ConversationConfig,
    /// Face animation settings.
    pub display: DisplayConfig,
    /// Long-term memory file store settings.
    pub memory: MemoryConfig,
}

impl DroidConfig {
    /// Load configuration from `path`, or from the default location when
    /// `path` is `None`. A missing file yields the defaults.
    ///
    /// # Errors
    ///
    /// Returns [`DroidError::Config`] if the file exists but cannot be read
    /// or parsed.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = match path {
            Some(p) => p.to_path_buf(),
            None => default_root().join("config.toml"),
        };
        if !path.exists() {
            return Ok(Self::default());
        }
        let body = std::fs::read_to_string(&path)
            .map_err(|e| DroidError::Config(format!("cannot read {}: {e}", path.display())))?;
        toml::from_str(&body)
            .map_err(|e| DroidError::Config(format!("invalid config {}: {e}", path.display())))
    }
}

/// Default droid state directory (`~/.rubberduck`).
#[must_use]
pub fn default_root() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".rubberduck")
}

/// Audio I/O configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    /// Capture sample rate in Hz. The wake engine and the speech service
    /// both consume 16 kHz mono.
    pub input_sample_rate: u32,
    /// Input device name (None = system default).
    pub input_device: Option<String>,
    /// Named output device the synthesized replies play on
    /// (None = system default).
    pub output_device: Option<String>,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            input_sample_rate: 16_000,
            input_device: None,
            output_device: None,
        }
    }
}

/// Wake phrase detection configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WakeConfig {
    /// Configured wake phrases, in keyword-index order: index 0 selects the
    /// English session locale, index 1 the Finnish one. Each name is a
    /// directory of reference recordings under `references_root`.
    pub keywords: Vec<String>,
    /// Root directory holding one reference-recording directory per keyword.
    pub references_root: PathBuf,
    /// Detection score threshold in (0, 1].
    pub threshold: f32,
    /// Access credential for hosted wake engines. The bundled spotter does
    /// not use it.
    pub access_key: Option<String>,
}

impl Default for WakeConfig {
    fn default() -> Self {
        Self {
            keywords: vec!["hey-droid".to_owned(), "hei-droidi".to_owned()],
            references_root: default_root().join("wakewords"),
            threshold: 0.72,
            access_key: None,
        }
    }
}

/// Speech service configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SpeechConfig {
    /// Recognizer endpoint override. When `None` the endpoint is derived
    /// from the service region.
    pub stt_endpoint: Option<String>,
    /// Synthesizer endpoint override.
    pub tts_endpoint: Option<String>,
    /// Utterance endpointing settings for recognize-once capture.
    pub endpointing: EndpointingConfig,
}

impl Default for SpeechConfig {
    fn default() -> Self {
        Self {
            stt_endpoint: None,
            tts_endpoint: None,
            endpointing: EndpointingConfig::default(),
        }
    }
}

/// Utterance endpointing configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EndpointingConfig {
    /// RMS energy threshold for speech. Typical values for f32 samples in
    /// \[-1, 1\]: 0.005 very sensitive, 0.01 normal, 0.02 noisy rooms.
    pub energy_threshold: f32,
    /// Trailing silence in ms that ends an utterance.
    pub trailing_silence_ms: u32,
    /// Minimum utterance length in ms; shorter bursts are discarded.
    pub min_speech_ms: u32,
    /// How long to wait for the user to start speaking before giving up
    /// with a no-match result.
    pub initial_silence_secs: u64,
    /// Hard cap on a single utterance.
    pub max_utterance_secs: u64,
}

impl Default for EndpointingConfig {
    fn default() -> Self {
        Self {
            energy_threshold: 0.01,
            trailing_silence_ms: 1200,
            min_speech_ms: 300,
            initial_silence_secs: 8,
            max_utterance_secs: 30,
        }
    }
}

/// Reasoning service configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    /// Chat-completions endpoint base URL (must include the version prefix).
    pub endpoint: String,
    /// Model identifier sent with each request.
    pub model: String,
    /// Bounded timeout for one service call, in seconds. An elapsed timeout
    /// is a transient failure, never a hang.
    pub request_timeout_secs: u64,
    /// Upper bound on capability-invocation rounds within one query.
    pub max_tool_rounds: usize,
    /// User id the long-term memory store is keyed by.
    pub user_id: String,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://api.openai.com/v1".to_owned(),
            model: "gpt-4.1".to_owned(),
            request_timeout_secs: 120,
            max_tool_rounds: 4,
            user_id: "default_user".to_owned(),
        }
    }
}

/// Session and status-screen configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConversationConfig {
    /// Locale assumed before any wake phrase has fired (startup banner,
    /// readiness announcement).
    pub default_locale: Locale,
    /// Idle gap in seconds after which the agent context is reset.
    pub reset_after_secs: u64,
    /// Status-screen prompt shown while waiting for the wake phrase.
    pub wake_prompt: String,
    /// Line spoken once at startup.
    pub ready_line: String,
}

impl Default for ConversationConfig {
    fn default() -> Self {
        Self {
            default_locale: Locale::English,
            reset_after_secs: 900,
            wake_prompt: "Wake me by saying\n'Hey Droid!'".to_owned(),
            ready_line: "I'm ready".to_owned(),
        }
    }
}

/// Face animation configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayConfig {
    /// Minimum pause between face frames, in seconds.
    pub min_frame_secs: u64,
    /// Maximum pause between face frames, in seconds.
    pub max_frame_secs: u64,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            min_frame_secs: 1,
            max_frame_secs: 3,
        }
    }
}

/// Long-term memory file store configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MemoryConfig {
    /// Root directory for memory files.
    pub root_dir: PathBuf,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            root_dir: default_root(),
        }
    }
}

/// Secrets resolved from the environment at startup.
///
/// The custom [`Debug`] redacts every value so credentials cannot leak
/// through logs.
pub struct Credentials {
    /// Speech service subscription key (`SPEECH_KEY`).
    pub speech_key: String,
    /// Speech service region (`SPEECH_REGION`).
    pub speech_region: String,
    /// Reasoning service API key (`AGENT_API_KEY`).
    pub agent_api_key: String,
    /// Web search API key (`SEARCH_API_KEY`); search degrades to a stub
    /// capability when absent.
    pub search_api_key: Option<String>,
    /// Hosted wake engine credential (`WAKE_ACCESS_KEY`); unused by the
    /// bundled spotter.
    pub wake_access_key: Option<String>,
}

impl Credentials {
    /// Resolve all credentials from the environment.
    ///
    /// # Errors
    ///
    /// Returns [`DroidError::Config`] if any required variable is unset or
    /// empty.
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            speech_key: require_env("SPEECH_KEY")?,
            speech_region: require_env("SPEECH_REGION")?,
            agent_api_key: require_env("AGENT_API_KEY")?,
            search_api_key: optional_env("SEARCH_API_KEY"),
            wake_access_key: optional_env("WAKE_ACCESS_KEY"),
        })
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("speech_key", &redact(&self.speech_key))
            .field("speech_region", &self.speech_region)
            .field("agent_api_key", &redact(&self.agent_api_key))
            .field(
                "search_api_key",
                &self.search_api_key.as_ref().map(|_| "[REDACTED]"),
            )
            .field(
                "wake_access_key",
                &self.wake_access_key.as_ref().map(|_| "[REDACTED]"),
            )
            .finish()
    }
}

fn redact(s: &str) -> &str {
    if s.is_empty() { "" } else { "[REDACTED]" }
}

fn require_env(name: &str) -> Result<String> {
    optional_env(name).ok_or_else(|| {
        DroidError::Config(format!(
            "environment variable '{name}' is not set or is empty"
        ))
    })
}

fn optional_env(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    #[test]
    fn defaults_are_sane() {
        let config = DroidConfig::default();
        assert_eq!(config.audio.input_sample_rate, 16_000);
        assert_eq!(config.wake.keywords.len(), 2);
        assert_eq!(config.conversation.reset_after_secs, 900);
        assert!(config.agent.request_timeout_secs > 0);
    }

    #[test]
    fn load_missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = DroidConfig::load(Some(&dir.path().join("nope.toml"))).unwrap();
        assert_eq!(config.agent.model, DroidConfig::default().agent.model);
    }

    #[test]
    fn load_partial_file_keeps_defaults_elsewhere() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[agent]\nmodel = \"droid-mini\"\n").unwrap();
        let config = DroidConfig::load(Some(&path)).unwrap();
        assert_eq!(config.agent.model, "droid-mini");
        assert_eq!(config.wake.threshold, WakeConfig::default().threshold);
    }

    #[test]
    fn load_rejects_invalid_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "not toml at all [[").unwrap();
        assert!(matches!(
            DroidConfig::load(Some(&path)),
            Err(DroidError::Config(_))
        ));
    }

    #[test]
    fn credentials_debug_is_redacted() {
        let creds = Credentials {
            speech_key: "sekrit".into(),
            speech_region: "westeurope".into(),
            agent_api_key: "also-sekrit".into(),
            search_api_key: Some("sekrit-too".into()),
            wake_access_key: None,
        };
        let debug = format!("{creds:?}");
        assert!(!debug.contains("sekrit"));
        assert!(debug.contains("westeurope"));
    }
}
