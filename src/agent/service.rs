//! HTTP client for the external reasoning service.
//!
//! Speaks the chat-completions wire format: the conversation context
//! (persona, seed dialogue, prior turns) lives client-side and is sent with
//! every query; capability schemas are advertised as tools and invoked
//! locally when the service requests them. Every call carries a bounded
//! timeout so an unresponsive service can never hang a dialogue session.

use crate::agent::capability::Capability;
use crate::config::AgentConfig;
use crate::conversation::SEED_DIALOGUE;
use crate::error::{DroidError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{info, warn};

/// Persona and reply-shape instructions sent as the system message.
const SYSTEM_PROMPT: &str = "Act as humorous Star Wars droid. Answer each \
sentence in your own line separated by newline character. Sentences can \
include speech synthesis markup language (SSML) emphasis tags. The last row \
contains a short couple of words summary. Keep the answer under 600 \
characters.\n\n\
When answering questions about current events or when you don't know \
something, use the search tool to find accurate information.";

/// Hard cap on the client-side message history.
const MAX_HISTORY_MESSAGES: usize = 64;

/// Boundary contract for the reasoning service.
#[async_trait]
pub trait AgentService: Send + Sync {
    /// Check credentials and configuration once at startup.
    ///
    /// # Errors
    ///
    /// Returns [`DroidError::Config`] on an authentication or endpoint
    /// problem; any validation error is fatal at startup.
    async fn validate(&self) -> Result<()>;

    /// Ask one question and return the raw reply text.
    ///
    /// # Errors
    ///
    /// Returns [`DroidError::Agent`] on transport failures and timeouts;
    /// the gateway turns those into an empty answer.
    async fn query(&self, question: &str) -> Result<String>;

    /// Restore the canonical seed dialogue as the conversation context.
    async fn reset(&self) -> Result<()>;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    tool_calls: Option<Vec<ToolCall>>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    tool_call_id: Option<String>,
}

impl ChatMessage {
    fn text(role: &str, content: &str) -> Self {
        Self {
            role: role.to_owned(),
            content: Some(content.to_owned()),
            tool_calls: None,
            tool_call_id: None,
        }
    }

    fn tool_output(call_id: &str, output: String) -> Self {
        Self {
            role: "tool".to_owned(),
            content: Some(output),
            tool_calls: None,
            tool_call_id: Some(call_id.to_owned()),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ToolCall {
    id: String,
    #[serde(rename = "type")]
    kind: String,
    function: FunctionCall,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct FunctionCall {
    name: String,
    arguments: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChatMessage,
}

/// Reasoning service client over HTTP.
pub struct HttpAgentService {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    model: String,
    max_tool_rounds: usize,
    capabilities: Vec<Arc<dyn Capability>>,
    history: Mutex<Vec<ChatMessage>>,
}

impl HttpAgentService {
    /// Build a client from config; the context starts at the seed dialogue.
    ///
    /// # Errors
    ///
    /// Returns [`DroidError::Config`] if the HTTP client cannot be built.
    pub fn new(
        config: &AgentConfig,
        api_key: String,
        capabilities: Vec<Arc<dyn Capability>>,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| DroidError::Config(format!("cannot build agent client: {e}")))?;

        Ok(Self {
            client,
            endpoint: config.endpoint.trim_end_matches('/').to_owned(),
            api_key,
            model: config.model.clone(),
            max_tool_rounds: config.max_tool_rounds,
            capabilities,
            history: Mutex::new(seed_context()),
        })
    }

    fn tool_schemas(&self) -> Vec<serde_json::Value> {
        self.capabilities
            .iter()
            .map(|capability| {
                serde_json::json!({
                    "type": "function",
                    "function": {
                        "name": capability.name(),
                        "description": capability.description(),
                        "parameters": capability.schema(),
                    }
                })
            })
            .collect()
    }

    async fn complete(&self, messages: &[ChatMessage]) -> Result<ChatMessage> {
        let mut body = serde_json::json!({
            "model": self.model,
            "messages": messages,
        });
        if !self.capabilities.is_empty() {
            body["tools"] = serde_json::Value::Array(self.tool_schemas());
        }

        let response = self
            .client
            .post(format!("{}/chat/completions", self.endpoint))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| DroidError::Agent(format!("request failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(DroidError::Agent(format!(
                "service returned {status}: {body}"
            )));
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| DroidError::Agent(format!("malformed response: {e}")))?;
        parsed
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message)
            .ok_or_else(|| DroidError::Agent("response carried no choices".into()))
    }

    async fn run_capability(&self, call: &ToolCall) -> String {
        let Some(capability) = self
            .capabilities
            .iter()
            .find(|c| c.name() == call.function.name)
        else {
            return format!("Unknown tool: {}", call.function.name);
        };

        // Arguments may be a JSON document or opaque text; capabilities
        // handle the string fallback themselves.
        let args = serde_json::from_str::<serde_json::Value>(&call.function.arguments)
            .unwrap_or_else(|_| serde_json::Value::String(call.function.arguments.clone()));

        match capability.invoke(args).await {
            Ok(output) => output,
            Err(e) => {
                warn!("capability '{}' failed: {e}", call.function.name);
                format!("Tool error: {e}")
            }
        }
    }
}

#[async_trait]
impl AgentService for HttpAgentService {
    async fn validate(&self) -> Result<()> {
        let response = self
            .client
            .get(format!("{}/models", self.endpoint))
            .bearer_auth(&self.api_key)
            .send()
            .await
            .map_err(|e| DroidError::Config(format!("agent validation failed: {e}")))?;

        if !response.status().is_success() {
            return Err(DroidError::Config(format!(
                "agent credentials rejected: {}",
                response.status()
            )));
        }
        info!("agent service validated");
        Ok(())
    }

    async fn query(&self, question: &str) -> Result<String> {
        let mut history = self.history.lock().await;
        history.push(ChatMessage::text("user", question));
        trim_history(&mut history);

        let mut rounds = 0;
        loop {
            let message = self.complete(&history).await?;
            history.push(message.clone());

            let calls = message.tool_calls.unwrap_or_default();
            if calls.is_empty() {
                return Ok(message.content.unwrap_or_default());
            }

            if rounds >= self.max_tool_rounds {
                return Err(DroidError::Agent(format!(
                    "capability round limit ({}) reached",
                    self.max_tool_rounds
                )));
            }
            rounds += 1;

            for call in &calls {
                info!("invoking capability '{}'", call.function.name);
                let output = self.run_capability(call).await;
                history.push(ChatMessage::tool_output(&call.id, output));
            }
        }
    }

    async fn reset(&self) -> Result<()> {
        let mut history = self.history.lock().await;
        *history = seed_context();
        info!("conversation context reset to seed dialogue");
        Ok(())
    }
}

/// System persona plus the canonical seed dialogue.
fn seed_context() -> Vec<ChatMessage> {
    let mut messages = vec![ChatMessage::text("system", SYSTEM_PROMPT)];
    for exchange in SEED_DIALOGUE {
        messages.push(ChatMessage::text("user", exchange.user));
        messages.push(ChatMessage::text("assistant", exchange.assistant));
    }
    messages
}

/// Drop the oldest non-seed turns once the history outgrows the cap.
fn trim_history(history: &mut Vec<ChatMessage>) {
    let seed_len = 1 + SEED_DIALOGUE.len() * 2;
    if history.len() > MAX_HISTORY_MESSAGES {
        let excess = history.len() - MAX_HISTORY_MESSAGES;
        history.drain(seed_len..seed_len + excess);
    }
}
