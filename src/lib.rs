//! Rubberduck: a wake-word driven voice assistant orchestrator for an
//! embedded droid.
//!
//! The droid waits for a spoken wake phrase, captures one question,
//! forwards it to a tool-augmented reasoning service, speaks the reply,
//! and goes back to waiting — while an independent loop animates the face
//! display.
//!
//! # Architecture
//!
//! Two concurrent activities share one piece of state:
//! - **Supervisor → WakeListener → DialogueSession**: the fully sequential
//!   orchestration flow. The single microphone is handed between the wake
//!   listener and the recognizer through an exclusive lease.
//! - **PresenceAnimator**: an independent repeating task reading the shared
//!   display mode and rendering face frames until shutdown.
//!
//! Speech recognition, synthesis, and reasoning are external services,
//! reached over HTTP and modeled as traits at the boundary.

pub mod agent;
pub mod audio;
pub mod config;
pub mod conversation;
pub mod display;
pub mod error;
pub mod locale;
pub mod response;
pub mod session;
pub mod speech;
pub mod supervisor;
pub mod wake;

pub use config::{Credentials, DroidConfig};
pub use error::{DroidError, Result, WakeEngineError};
pub use locale::Locale;
pub use session::SessionEnd;
pub use supervisor::Supervisor;
