//! Uniform tool capabilities advertised to the reasoning service.
//!
//! Whatever a capability wraps — an HTTP search API, a file-backed memory
//! store — the gateway sees one shape: name, description, argument schema,
//! and an invoke that takes JSON and returns text for the service.

use crate::error::Result;
use async_trait::async_trait;

/// A tool the reasoning service may invoke during a query.
#[async_trait]
pub trait Capability: Send + Sync {
    /// Capability name as advertised to the service.
    fn name(&self) -> &str;

    /// Human-readable description the service uses to pick the tool.
    fn description(&self) -> &str;

    /// JSON Schema of the invoke arguments.
    fn schema(&self) -> serde_json::Value;

    /// Execute with the given JSON arguments.
    ///
    /// # Errors
    ///
    /// Invocation failures surface as [`crate::error::DroidError`]; the
    /// caller reports them back to the service as tool output rather than
    /// aborting the query.
    async fn invoke(&self, args: serde_json::Value) -> Result<String>;
}
