//! Web search capability for current-events questions.
//!
//! Queries a SerpAPI-style endpoint and formats the organic results for
//! the reasoning service. Without a search credential the capability stays
//! advertised but answers that search is unavailable, so the service can
//! say so instead of hallucinating.

use crate::agent::capability::Capability;
use crate::error::{DroidError, Result};
use async_trait::async_trait;
use serde::Deserialize;
use tracing::info;

const DEFAULT_ENDPOINT: &str = "https://serpapi.com/search.json";
const MAX_RESULTS: usize = 5;

const UNAVAILABLE: &str = "I'm sorry, I don't have access to web search at the moment. \
     Please provide a search API key in the environment variables to enable this feature.";

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    organic_results: Vec<OrganicResult>,
}

#[derive(Debug, Deserialize)]
struct OrganicResult {
    #[serde(default)]
    title: String,
    #[serde(default)]
    link: String,
    #[serde(default)]
    snippet: String,
}

/// Search capability backed by an HTTP search API.
pub struct WebSearchCapability {
    client: reqwest::Client,
    api_key: Option<String>,
    endpoint: String,
}

impl WebSearchCapability {
    #[must_use]
    pub fn new(api_key: Option<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key,
            endpoint: DEFAULT_ENDPOINT.to_owned(),
        }
    }

    /// Override the endpoint (tests, self-hosted proxies).
    #[must_use]
    pub fn with_endpoint(mut self, endpoint: String) -> Self {
        self.endpoint = endpoint;
        self
    }
}

#[async_trait]
impl Capability for WebSearchCapability {
    fn name(&self) -> &str {
        "search"
    }

    fn description(&self) -> &str {
        "Useful for when you need to answer questions about current events \
         or search for specific information."
    }

    fn schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "query": {
                    "type": "string",
                    "description": "The search query"
                }
            },
            "required": ["query"]
        })
    }

    async fn invoke(&self, args: serde_json::Value) -> Result<String> {
        let Some(api_key) = self.api_key.as_deref() else {
            return Ok(UNAVAILABLE.to_owned());
        };

        let query = args
            .get("query")
            .and_then(|v| v.as_str())
            .filter(|q| !q.trim().is_empty())
            .ok_or_else(|| DroidError::Agent("search: missing query argument".into()))?;

        info!("web search: \"{query}\"");
        let response = self
            .client
            .get(&self.endpoint)
            .query(&[("q", query), ("api_key", api_key), ("engine", "google")])
            .send()
            .await
            .map_err(|e| DroidError::Agent(format!("search request failed: {e}")))?;

        if !response.status().is_success() {
            return Err(DroidError::Agent(format!(
                "search returned {}",
                response.status()
            )));
        }

        let parsed: SearchResponse = response
            .json()
            .await
            .map_err(|e| DroidError::Agent(format!("malformed search response: {e}")))?;

        if parsed.organic_results.is_empty() {
            return Ok(format!("No results found for \"{query}\"."));
        }

        let mut output = format!("Search results for \"{query}\":\n");
        for (i, result) in parsed.organic_results.iter().take(MAX_RESULTS).enumerate() {
            output.push_str(&format!(
                "{}. {} — {}\n   {}\n",
                i + 1,
                result.title,
                result.link,
                result.snippet
            ));
        }
        Ok(output)
    }
}
