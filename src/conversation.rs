//! Per-session conversation state and the inactivity reset policy.
//!
//! The droid keeps no turn history of its own; the reasoning service holds
//! the conversation context. What the core tracks is *when* the user last
//! spoke, so that a long-idle context is reset to the canonical seed
//! dialogue before the next question reaches the service.

use crate::locale::Locale;
use std::time::{Duration, Instant};

/// Idle gap after which the agent's conversation memory is reset.
pub const RESET_AFTER: Duration = Duration::from_secs(900);

/// One user/assistant exchange of the canonical seed dialogue.
#[derive(Debug, Clone, Copy)]
pub struct SeedExchange {
    pub user: &'static str,
    pub assistant: &'static str,
}

/// Few-shot dialogue restored into the agent's context on every reset.
///
/// The answers demonstrate the expected reply shape: one sentence per line,
/// emphasis markup allowed, and a trailing summary row.
pub const SEED_DIALOGUE: &[SeedExchange] = &[
    SeedExchange {
        user: "How can I convert string to lowercase in Python?",
        assistant: "It is quite simple.\n You can use the <emphasis level=\"moderate\">lower</emphasis> method to convert given string to lowercase\n\n Summary: lower",
    },
    SeedExchange {
        user: "How about uppercase?",
        assistant: "Use the <emphasis level=\"moderate\">upper</emphasis> method.\n It will convert given string to uppercase\n\n Summary: upper",
    },
    SeedExchange {
        user: "What is the capital of Finland?",
        assistant: "<emphasis level=\"moderate\">Helsinki</emphasis>, of course.\n Did you really have to ask.\n\n Summary: Helsinki",
    },
];

/// A single completed exchange within a session.
///
/// Owned by the active dialogue session and discarded once spoken; long-term
/// memory, if any, lives behind the agent's memory capability.
#[derive(Debug, Clone)]
pub struct ConversationTurn {
    pub question: String,
    pub raw_reply: String,
    pub spoken: String,
    pub summary: String,
    pub at: Instant,
}

/// State for one wake-to-sleep dialogue session.
#[derive(Debug, Clone)]
pub struct ConversationSession {
    locale: Locale,
    reset_after: Duration,
    last_activity: Instant,
}

impl ConversationSession {
    /// Start a session in `locale`, with activity marked now.
    #[must_use]
    pub fn new(locale: Locale) -> Self {
        Self::with_last_activity(locale, Instant::now())
    }

    /// Rebuild a session with a known last-activity instant.
    #[must_use]
    pub fn with_last_activity(locale: Locale, last_activity: Instant) -> Self {
        Self {
            locale,
            reset_after: RESET_AFTER,
            last_activity,
        }
    }

    /// Override the reset gap (defaults to [`RESET_AFTER`]).
    #[must_use]
    pub fn with_reset_after(mut self, reset_after: Duration) -> Self {
        self.reset_after = reset_after;
        self
    }

    #[must_use]
    pub fn locale(&self) -> Locale {
        self.locale
    }

    #[must_use]
    pub fn last_activity(&self) -> Instant {
        self.last_activity
    }

    /// Whether the idle gap up to `now` requires a memory reset before the
    /// next agent query. The gap must strictly exceed the threshold.
    #[must_use]
    pub fn should_reset(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.last_activity) > self.reset_after
    }

    /// Record activity at `now`. Last activity strictly increases within a
    /// session; a stale `now` is ignored.
    pub fn mark_activity(&mut self, now: Instant) {
        if now > self.last_activity {
            self.last_activity = now;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reset_required_after_long_gap() {
        let session = ConversationSession::new(Locale::English);
        let t0 = session.last_activity();
        assert!(session.should_reset(t0 + Duration::from_secs(901)));
    }

    #[test]
    fn no_reset_within_gap() {
        let session = ConversationSession::new(Locale::English);
        let t0 = session.last_activity();
        assert!(!session.should_reset(t0 + Duration::from_secs(899)));
        // The boundary itself does not trigger: the gap must exceed it.
        assert!(!session.should_reset(t0 + Duration::from_secs(900)));
    }

    #[test]
    fn activity_strictly_increases() {
        let mut session = ConversationSession::new(Locale::Finnish);
        let t0 = session.last_activity();
        session.mark_activity(t0 + Duration::from_secs(5));
        assert_eq!(session.last_activity(), t0 + Duration::from_secs(5));
        // A stale instant never rolls the clock back.
        session.mark_activity(t0);
        assert_eq!(session.last_activity(), t0 + Duration::from_secs(5));
    }

    #[test]
    fn custom_reset_gap() {
        let session = ConversationSession::new(Locale::English)
            .with_reset_after(Duration::from_secs(10));
        let t0 = session.last_activity();
        assert!(session.should_reset(t0 + Duration::from_secs(11)));
        assert!(!session.should_reset(t0 + Duration::from_secs(10)));
    }

    #[test]
    fn seed_dialogue_shape() {
        assert_eq!(SEED_DIALOGUE.len(), 3);
        for exchange in SEED_DIALOGUE {
            assert!(exchange.assistant.contains("Summary: "));
        }
    }
}
