//! Error types for the droid orchestrator.

/// Faults raised by a wake-word engine.
///
/// Every variant is fatal: the supervisor performs cleanup and terminates
/// the process. Hosted engines classify licence problems into the activation
/// variants; the bundled spotter only ever raises [`WakeEngineError::Engine`]
/// and [`WakeEngineError::Activation`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WakeEngineError {
    /// Engine could not be activated (bad credential, missing keyword model).
    #[error("wake engine activation error: {0}")]
    Activation(String),

    /// The access credential has reached its device limit.
    #[error("wake engine activation limit reached: {0}")]
    ActivationLimit(String),

    /// The access credential was refused.
    #[error("wake engine activation refused: {0}")]
    ActivationRefused(String),

    /// The access credential has been throttled.
    #[error("wake engine activation throttled: {0}")]
    ActivationThrottled(String),

    /// Any other engine or recorder failure.
    #[error("wake engine failure: {0}")]
    Engine(String),
}

/// Top-level error type for the droid orchestrator.
#[derive(Debug, thiserror::Error)]
pub enum DroidError {
    /// Wake-word engine fault. Always fatal.
    #[error(transparent)]
    Wake(#[from] WakeEngineError),

    /// Audio device or stream error.
    #[error("audio error: {0}")]
    Audio(String),

    /// Speech recognition transport or protocol error.
    #[error("recognition error: {0}")]
    Recognition(String),

    /// Speech synthesis error. Logged by callers, never escalated.
    #[error("synthesis error: {0}")]
    Synthesis(String),

    /// Reasoning service error. Transient at call time (the session
    /// continues with an empty answer); fatal only from startup validation.
    #[error("agent error: {0}")]
    Agent(String),

    /// Configuration or missing-credential error. Fatal at startup.
    #[error("config error: {0}")]
    Config(String),

    /// Long-term memory backend error.
    #[error("memory error: {0}")]
    Memory(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Channel send/receive error.
    #[error("channel error: {0}")]
    Channel(String),
}

/// Convenience result type.
pub type Result<T> = std::result::Result<T, DroidError>;
