//! Shared display state and the two fire-and-forget surfaces: the face
//! (eye animations) and the status screen (replace-on-write text).

pub mod animator;

use std::sync::{Arc, Mutex};
use tracing::{debug, info};

/// What the droid is currently doing, as shown on the face.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DisplayMode {
    /// Waiting for the wake phrase.
    #[default]
    Sleeping,
    /// Capturing the user's speech.
    Listening,
    /// Waiting on the reasoning service.
    Thinking,
    /// Playing the synthesized reply.
    Speaking,
}

/// The single shared display value: mode plus the status line.
#[derive(Debug, Clone, Default)]
pub struct DisplayState {
    pub mode: DisplayMode,
    pub text: String,
}

/// Handle to the shared display state.
///
/// Written coarsely by the supervisor and the dialogue session, read by the
/// presence animator. Last-write-wins is all the animator needs.
#[derive(Clone, Default)]
pub struct SharedDisplay {
    inner: Arc<Mutex<DisplayState>>,
}

impl SharedDisplay {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_mode(&self, mode: DisplayMode) {
        self.with_state(|state| state.mode = mode);
        debug!("display mode -> {mode:?}");
    }

    pub fn set_text(&self, text: &str) {
        self.with_state(|state| state.text = text.to_owned());
    }

    #[must_use]
    pub fn mode(&self) -> DisplayMode {
        let mut mode = DisplayMode::Sleeping;
        self.with_state(|state| mode = state.mode);
        mode
    }

    #[must_use]
    pub fn snapshot(&self) -> DisplayState {
        let mut snapshot = DisplayState::default();
        self.with_state(|state| snapshot = state.clone());
        snapshot
    }

    fn with_state(&self, f: impl FnOnce(&mut DisplayState)) {
        // A poisoned lock still holds a usable last-written value.
        let mut guard = match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        f(&mut guard);
    }
}

/// The face surface: discrete eye animations plus poweroff.
pub trait FaceSurface: Send + Sync {
    fn draw_eyes(&self);
    fn draw_sleepy_eyes(&self);
    fn poweroff(&self);
}

/// The status surface: one replace-on-write text line plus poweroff.
pub trait StatusSurface: Send + Sync {
    fn show_text(&self, text: &str);
    fn poweroff(&self);
}

/// Console-backed face for development hosts without display hardware.
#[derive(Debug, Default)]
pub struct ConsoleFace;

impl FaceSurface for ConsoleFace {
    fn draw_eyes(&self) {
        debug!("face: ( o)( o)");
    }

    fn draw_sleepy_eyes(&self) {
        debug!("face: ( -)( -)");
    }

    fn poweroff(&self) {
        info!("face display off");
    }
}

/// Console-backed status screen.
#[derive(Debug, Default)]
pub struct ConsoleStatus;

impl StatusSurface for ConsoleStatus {
    fn show_text(&self, text: &str) {
        info!("status: {}", text.replace('\n', " / "));
    }

    fn poweroff(&self) {
        info!("status display off");
    }
}
