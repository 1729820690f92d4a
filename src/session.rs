//! The per-wake-event dialogue loop.
//!
//! One session runs from a wake detection until recognition yields nothing
//! or the user asks to exit: recognize → (maybe reset memory) → query the
//! agent → split the reply → speak it, then listen again.

use crate::agent::AgentGateway;
use crate::conversation::{ConversationSession, ConversationTurn};
use crate::display::{DisplayMode, SharedDisplay, StatusSurface};
use crate::error::Result;
use crate::response;
use crate::speech::{Recognition, Speech};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Why a dialogue session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEnd {
    /// Recognition produced nothing; go back to wake listening.
    Silence,
    /// The user said "exit": the session ends and the whole process
    /// terminates with it.
    Exit,
}

/// Drives one dialogue session to completion.
pub struct DialogueSession {
    speech: Arc<dyn Speech>,
    gateway: Arc<AgentGateway>,
    display: SharedDisplay,
    status: Arc<dyn StatusSurface>,
}

impl DialogueSession {
    #[must_use]
    pub fn new(
        speech: Arc<dyn Speech>,
        gateway: Arc<AgentGateway>,
        display: SharedDisplay,
        status: Arc<dyn StatusSurface>,
    ) -> Self {
        Self {
            speech,
            gateway,
            display,
            status,
        }
    }

    /// Loop through turns until the session ends.
    ///
    /// # Errors
    ///
    /// Propagates only non-recoverable errors; recognition non-results and
    /// synthesis failures end the turn or are logged, per the error
    /// taxonomy.
    pub async fn run(&self, session: &mut ConversationSession) -> Result<SessionEnd> {
        let locale = session.locale();
        info!("dialogue session started ({})", locale.tag());

        loop {
            self.show(DisplayMode::Listening, &format!("Listening… ({})", locale.tag()));

            let question = match self.speech.recognize_once(locale).await? {
                Recognition::Recognized(text) if !text.trim().is_empty() => text,
                Recognition::Recognized(_) | Recognition::NoMatch => {
                    info!("nothing recognized, session ends");
                    return Ok(SessionEnd::Silence);
                }
                Recognition::Cancelled(reason) => {
                    // Treated exactly like a no-match.
                    warn!("recognition cancelled: {reason}");
                    return Ok(SessionEnd::Silence);
                }
            };

            if question.trim().to_lowercase().starts_with("exit") {
                info!("exit command received");
                return Ok(SessionEnd::Exit);
            }

            self.show(DisplayMode::Thinking, "Thinking…");

            if session.should_reset(Instant::now()) {
                info!("session idle past the reset gap");
                self.gateway.reset_memory().await?;
            }

            let raw_reply = self.gateway.query(&question, session).await?;
            let reply = response::split_summary(&raw_reply, locale);

            self.show(DisplayMode::Speaking, &reply.summary);

            if reply.spoken.trim().is_empty() {
                warn!("agent produced no speakable reply");
            } else if let Err(e) = self.speech.speak(&reply.spoken, locale).await {
                // Synthesis and playback failures never end the session.
                warn!("could not speak reply: {e}");
            }

            let turn = ConversationTurn {
                question,
                raw_reply,
                spoken: reply.spoken,
                summary: reply.summary,
                at: Instant::now(),
            };
            debug!(
                "turn complete: {} chars in, {} chars spoken",
                turn.question.len(),
                turn.spoken.len()
            );
            session.mark_activity(turn.at);
            // The turn is dropped here; nothing is kept in the core.
        }
    }

    /// Update the shared display state and the status screen together.
    fn show(&self, mode: DisplayMode, text: &str) {
        self.display.set_mode(mode);
        self.display.set_text(text);
        self.status.show_text(text);
    }
}
