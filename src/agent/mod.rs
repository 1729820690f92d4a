//! Gateway to the external tool-augmented reasoning service.
//!
//! The gateway serializes service access to one in-flight call so that
//! memory resets and queries can never interleave against the same
//! conversation context, and absorbs transient transport failures into an
//! empty answer the session can shrug off.

pub mod capability;
pub mod memory;
pub mod search;
pub mod service;

use crate::agent::service::AgentService;
use crate::conversation::ConversationSession;
use crate::error::{DroidError, Result};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{info, warn};

/// Serialized front door to the reasoning service.
pub struct AgentGateway {
    service: Arc<dyn AgentService>,
    /// Concurrency ceiling of one: an additional caller waits, never runs
    /// in parallel.
    call_slot: Mutex<()>,
}

impl AgentGateway {
    #[must_use]
    pub fn new(service: Arc<dyn AgentService>) -> Self {
        Self {
            service,
            call_slot: Mutex::new(()),
        }
    }

    /// Validate the service once at startup. Any failure here is fatal.
    ///
    /// # Errors
    ///
    /// Propagates the service's validation error.
    pub async fn validate(&self) -> Result<()> {
        let _slot = self.call_slot.lock().await;
        self.service.validate().await
    }

    /// Ask one question and return the raw reply text.
    ///
    /// Transient service failures (network, timeout) are logged and come
    /// back as an empty answer; the session continues. No retry.
    ///
    /// # Errors
    ///
    /// Propagates only non-transient errors.
    pub async fn query(&self, question: &str, session: &ConversationSession) -> Result<String> {
        let _slot = self.call_slot.lock().await;
        info!("querying agent ({})", session.locale().tag());
        match self.service.query(question).await {
            Ok(reply) => Ok(reply),
            Err(DroidError::Agent(reason)) => {
                warn!("agent call failed, continuing with empty answer: {reason}");
                Ok(String::new())
            }
            Err(other) => Err(other),
        }
    }

    /// Reset the service's conversation context to the seed dialogue.
    ///
    /// # Errors
    ///
    /// Propagates service errors; the caller decides whether to continue.
    pub async fn reset_memory(&self) -> Result<()> {
        let _slot = self.call_slot.lock().await;
        info!("requesting conversation memory reset");
        self.service.reset().await
    }
}
