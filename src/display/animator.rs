//! The presence animator: an independent loop that keeps the face alive.
//!
//! Runs for the process lifetime, decoupled from the dialogue flow except
//! through the shared display mode. Sleeping gets drowsy eyes, everything
//! else gets open eyes, with a randomized pause between frames so the
//! droid does not blink like a metronome.

use crate::config::DisplayConfig;
use crate::display::{DisplayMode, FaceSurface, SharedDisplay};
use rand::Rng;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Powers the face off exactly once, on whatever path drops it.
struct PoweroffGuard {
    face: Arc<dyn FaceSurface>,
}

impl Drop for PoweroffGuard {
    fn drop(&mut self) {
        self.face.poweroff();
    }
}

/// Independent face animation loop.
pub struct PresenceAnimator {
    face: Arc<dyn FaceSurface>,
    display: SharedDisplay,
    min_pause: Duration,
    max_pause: Duration,
}

impl PresenceAnimator {
    #[must_use]
    pub fn new(face: Arc<dyn FaceSurface>, display: SharedDisplay, config: &DisplayConfig) -> Self {
        let min_pause = Duration::from_secs(config.min_frame_secs.min(config.max_frame_secs));
        let max_pause = Duration::from_secs(config.max_frame_secs.max(config.min_frame_secs));
        Self {
            face,
            display,
            min_pause,
            max_pause,
        }
    }

    /// Render frames until `stop` fires.
    ///
    /// The face poweroff runs exactly once on every exit path: normal loop
    /// end, cancellation mid-sleep, or the whole future being dropped.
    pub async fn run(self, stop: CancellationToken) {
        let guard = PoweroffGuard {
            face: Arc::clone(&self.face),
        };
        info!("presence animator started");

        while !stop.is_cancelled() {
            match self.display.mode() {
                DisplayMode::Sleeping => self.face.draw_sleepy_eyes(),
                _ => self.face.draw_eyes(),
            }

            let pause = self.next_pause();
            tokio::select! {
                () = stop.cancelled() => break,
                () = tokio::time::sleep(pause) => {}
            }
        }

        info!("presence animator stopping");
        drop(guard);
    }

    fn next_pause(&self) -> Duration {
        if self.max_pause <= self.min_pause {
            return self.min_pause;
        }
        rand::thread_rng().gen_range(self.min_pause..=self.max_pause)
    }
}
