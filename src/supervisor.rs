//! Top-level control loop.
//!
//! The supervisor owns process lifetime: it validates the agent once,
//! starts the presence animator, then alternates wake listening with
//! dialogue sessions until an exit command, a fatal wake error, or an
//! interrupt. Cleanup ordering on the way out is a correctness
//! requirement: leaked native audio handles keep the device from
//! reinitializing.

use crate::agent::AgentGateway;
use crate::config::DroidConfig;
use crate::conversation::ConversationSession;
use crate::display::animator::PresenceAnimator;
use crate::display::{DisplayMode, FaceSurface, SharedDisplay, StatusSurface};
use crate::error::Result;
use crate::session::{DialogueSession, SessionEnd};
use crate::speech::Speech;
use crate::wake::WakeListener;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// Owns and coordinates every long-lived collaborator.
pub struct Supervisor {
    config: DroidConfig,
    wake: WakeListener,
    speech: Arc<dyn Speech>,
    gateway: Arc<AgentGateway>,
    display: SharedDisplay,
    face: Arc<dyn FaceSurface>,
    status: Arc<dyn StatusSurface>,
}

impl Supervisor {
    #[must_use]
    pub fn new(
        config: DroidConfig,
        wake: WakeListener,
        speech: Arc<dyn Speech>,
        gateway: Arc<AgentGateway>,
        display: SharedDisplay,
        face: Arc<dyn FaceSurface>,
        status: Arc<dyn StatusSurface>,
    ) -> Self {
        Self {
            config,
            wake,
            speech,
            gateway,
            display,
            face,
            status,
        }
    }

    /// Run until exit, interrupt, or a fatal error.
    ///
    /// # Errors
    ///
    /// Returns the fatal error after cleanup has completed. Startup agent
    /// validation failures surface here before anything is spawned.
    pub async fn run(mut self) -> Result<()> {
        // The agent is validated once, not per call.
        self.gateway.validate().await?;

        self.show(
            DisplayMode::Sleeping,
            &format!("Rubberduck Droid\nv{}", env!("CARGO_PKG_VERSION")),
        );

        let stop = CancellationToken::new();
        let animator = PresenceAnimator::new(
            Arc::clone(&self.face),
            self.display.clone(),
            &self.config.display,
        );
        let animator_task = tokio::spawn(animator.run(stop.clone()));

        let ready_line = self.config.conversation.ready_line.clone();
        let default_locale = self.config.conversation.default_locale;
        if let Err(e) = self.speech.speak(&ready_line, default_locale).await {
            warn!("readiness announcement failed: {e}");
        }

        let outcome = tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("interrupt received, shutting down");
                Ok(())
            }
            result = self.wake_cycle(&stop) => result,
        };

        // Shutdown ordering is load-bearing: stop the animator and wait for
        // its poweroff to run, power off the status screen, release the
        // wake engine and any recorder handles, only then exit.
        stop.cancel();
        if animator_task.await.is_err() {
            warn!("animator task did not shut down cleanly");
        }
        self.status.poweroff();
        drop(self.wake);

        match &outcome {
            Ok(()) => info!("droid shut down cleanly"),
            Err(e) => error!("droid terminating after fatal error: {e}"),
        }
        outcome
    }

    /// Alternate wake listening and dialogue sessions.
    async fn wake_cycle(&mut self, stop: &CancellationToken) -> Result<()> {
        let reset_after = Duration::from_secs(self.config.conversation.reset_after_secs);

        loop {
            self.show(DisplayMode::Sleeping, &self.config.conversation.wake_prompt);

            // Fatal engine errors propagate; None means cancelled.
            let Some(event) = self.wake.wait_for_wake(stop).await? else {
                return Ok(());
            };

            self.show(DisplayMode::Listening, "How can I help?");

            let mut session =
                ConversationSession::new(event.locale).with_reset_after(reset_after);
            let dialogue = DialogueSession::new(
                Arc::clone(&self.speech),
                Arc::clone(&self.gateway),
                self.display.clone(),
                Arc::clone(&self.status),
            );
            let end = dialogue.run(&mut session).await?;

            self.show(DisplayMode::Sleeping, "Sleepy time.");

            if end == SessionEnd::Exit {
                info!("exit command ends the process");
                return Ok(());
            }
        }
    }

    /// Update the shared display state and the status screen together.
    fn show(&self, mode: DisplayMode, text: &str) {
        self.display.set_mode(mode);
        self.display.set_text(text);
        self.status.show_text(text);
    }
}
