//! Long-term memory capability: request protocol, backend boundary, and
//! the bundled file store.
//!
//! The request protocol is an explicit tagged union with a single parser
//! and a fixed fallback: anything unparsable or not an object is a
//! retrieval with the raw input as the query. The store itself sits behind
//! [`MemoryBackend`], keyed by user id; the bundled backend keeps items in
//! a TOML block inside a markdown file so they are easy to inspect and
//! edit by hand.

use crate::agent::capability::Capability;
use crate::error::{DroidError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::info;

/// Default number of items a retrieval returns.
const DEFAULT_RETRIEVE_LIMIT: usize = 10;

/// A parsed memory request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MemoryRequest {
    /// Remember something.
    Store {
        kind: String,
        content: String,
        category: String,
        tags: Vec<String>,
    },
    /// Look something up.
    Retrieve { query: String, limit: usize },
    /// Forget a stored item by id.
    Remove { id: String },
}

impl MemoryRequest {
    /// Parse a raw tool input.
    ///
    /// Accepts an object with an `action` field, or a string holding JSON
    /// for one. Everything else — plain text, numbers, objects with an
    /// unknown or missing action — falls back to
    /// `Retrieve { query: <raw input> }`.
    #[must_use]
    pub fn parse(input: &serde_json::Value) -> Self {
        // A string input may itself be a JSON document.
        if let Some(text) = input.as_str() {
            if let Ok(embedded) = serde_json::from_str::<serde_json::Value>(text) {
                if embedded.is_object() {
                    return Self::parse(&embedded);
                }
            }
            return Self::retrieve_fallback(text);
        }

        let Some(object) = input.as_object() else {
            return Self::retrieve_fallback(&render(input));
        };

        let action = object
            .get("action")
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_lowercase();

        match action.as_str() {
            "store" => Self::Store {
                kind: field(object, "memory_type").unwrap_or_else(|| "fact".into()),
                content: field(object, "content").unwrap_or_default(),
                category: field(object, "category").unwrap_or_else(|| "general".into()),
                tags: object
                    .get("tags")
                    .and_then(|v| v.as_array())
                    .map(|tags| {
                        tags.iter()
                            .filter_map(|t| t.as_str().map(str::to_owned))
                            .collect()
                    })
                    .unwrap_or_default(),
            },
            "retrieve" => Self::Retrieve {
                query: field(object, "query").unwrap_or_default(),
                limit: object
                    .get("limit")
                    .and_then(|v| v.as_u64())
                    .map_or(DEFAULT_RETRIEVE_LIMIT, |v| v as usize),
            },
            "remove" => match field(object, "memory_id") {
                Some(id) => Self::Remove { id },
                None => Self::retrieve_fallback(&render(input)),
            },
            _ => Self::retrieve_fallback(&render(input)),
        }
    }

    fn retrieve_fallback(query: &str) -> Self {
        Self::Retrieve {
            query: query.to_owned(),
            limit: DEFAULT_RETRIEVE_LIMIT,
        }
    }
}

fn field(object: &serde_json::Map<String, serde_json::Value>, name: &str) -> Option<String> {
    object.get(name).and_then(|v| v.as_str()).map(str::to_owned)
}

fn render(value: &serde_json::Value) -> String {
    match value.as_str() {
        Some(s) => s.to_owned(),
        None => value.to_string(),
    }
}

/// One remembered item.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryItem {
    pub id: String,
    pub kind: String,
    pub content: String,
    pub category: String,
    #[serde(default)]
    pub tags: Vec<String>,
}

/// Boundary contract for the long-term memory store, keyed by user id.
#[async_trait]
pub trait MemoryBackend: Send + Sync {
    /// Persist an item, returning its id.
    async fn store(&self, item: MemoryItem) -> Result<String>;

    /// Newest-first items matching `query`.
    async fn retrieve(&self, query: &str, limit: usize) -> Result<Vec<MemoryItem>>;

    /// Remove an item by id.
    async fn remove(&self, id: &str) -> Result<()>;
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct MemoryFile {
    #[serde(default)]
    items: Vec<MemoryItem>,
}

/// File-backed memory store: one markdown file per user under
/// `<root>/memory/`, items in a fenced TOML block.
pub struct FileMemoryBackend {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileMemoryBackend {
    #[must_use]
    pub fn new(root_dir: &Path, user_id: &str) -> Self {
        Self {
            path: root_dir.join("memory").join(format!("{user_id}.md")),
            lock: Mutex::new(()),
        }
    }

    fn load(&self) -> Result<MemoryFile> {
        if !self.path.exists() {
            return Ok(MemoryFile::default());
        }
        let body = std::fs::read_to_string(&self.path)?;
        let toml = extract_toml_block(&body)
            .ok_or_else(|| DroidError::Memory("memory file missing ```toml``` block".into()))?;
        toml::from_str(&toml).map_err(|e| DroidError::Memory(format!("invalid memory file: {e}")))
    }

    fn save(&self, file: &MemoryFile) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let data = toml::to_string_pretty(file)
            .map_err(|e| DroidError::Memory(format!("failed to serialize memory: {e}")))?;
        let md = format!(
            "# Droid Memory\n\n\
             This file is managed by the droid. It is safe to edit by hand.\n\n\
             ```toml\n{data}```\n"
        );
        std::fs::write(&self.path, md)?;
        Ok(())
    }
}

#[async_trait]
impl MemoryBackend for FileMemoryBackend {
    async fn store(&self, mut item: MemoryItem) -> Result<String> {
        let _guard = self.lock.lock().await;
        if item.id.is_empty() {
            item.id = uuid::Uuid::new_v4().to_string();
        }
        let id = item.id.clone();
        let mut file = self.load()?;
        file.items.push(item);
        self.save(&file)?;
        info!("stored memory {id}");
        Ok(id)
    }

    async fn retrieve(&self, query: &str, limit: usize) -> Result<Vec<MemoryItem>> {
        let _guard = self.lock.lock().await;
        let file = self.load()?;
        let words: Vec<String> = query
            .split_whitespace()
            .map(str::to_lowercase)
            .collect();

        let mut hits: Vec<MemoryItem> = file
            .items
            .into_iter()
            .filter(|item| {
                if words.is_empty() {
                    return true;
                }
                let haystack = format!(
                    "{} {} {}",
                    item.content.to_lowercase(),
                    item.category.to_lowercase(),
                    item.tags.join(" ").to_lowercase()
                );
                words.iter().any(|w| haystack.contains(w))
            })
            .collect();
        hits.reverse(); // newest first
        hits.truncate(limit);
        Ok(hits)
    }

    async fn remove(&self, id: &str) -> Result<()> {
        let _guard = self.lock.lock().await;
        let mut file = self.load()?;
        let before = file.items.len();
        file.items.retain(|item| item.id != id);
        if file.items.len() == before {
            return Err(DroidError::Memory(format!("no memory with id {id}")));
        }
        self.save(&file)?;
        Ok(())
    }
}

fn extract_toml_block(md: &str) -> Option<String> {
    let mut in_block = false;
    let mut lines = Vec::new();
    for raw in md.lines() {
        let line = raw.trim_end();
        if !in_block {
            if line.trim() == "```toml" {
                in_block = true;
            }
            continue;
        }
        if line.trim() == "```" {
            break;
        }
        lines.push(line);
    }
    if lines.is_empty() {
        None
    } else {
        Some(lines.join("\n"))
    }
}

/// The memory capability advertised to the reasoning service.
pub struct MemoryCapability {
    backend: Arc<dyn MemoryBackend>,
}

impl MemoryCapability {
    #[must_use]
    pub fn new(backend: Arc<dyn MemoryBackend>) -> Self {
        Self { backend }
    }
}

#[async_trait]
impl Capability for MemoryCapability {
    fn name(&self) -> &str {
        "long_term_memory"
    }

    fn description(&self) -> &str {
        "Store, retrieve, and remove long-term memories about the user. \
         Use {\"action\": \"store\", \"memory_type\": ..., \"content\": ..., \"category\": ...} to remember, \
         {\"action\": \"retrieve\", \"query\": ...} or a plain search string to look up, and \
         {\"action\": \"remove\", \"memory_id\": ...} to forget."
    }

    fn schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "action": {
                    "type": "string",
                    "enum": ["store", "retrieve", "remove"],
                    "description": "Action to perform"
                },
                "memory_type": {
                    "type": "string",
                    "description": "Type of memory: fact, trait, preference, context"
                },
                "content": {"type": "string", "description": "The memory content"},
                "category": {"type": "string", "description": "Category or topic"},
                "tags": {"type": "array", "items": {"type": "string"}},
                "query": {"type": "string", "description": "Search query"},
                "limit": {"type": "integer", "description": "Max items to return"},
                "memory_id": {"type": "string", "description": "Id of the item to remove"}
            }
        })
    }

    async fn invoke(&self, args: serde_json::Value) -> Result<String> {
        match MemoryRequest::parse(&args) {
            MemoryRequest::Store {
                kind,
                content,
                category,
                tags,
            } => {
                let id = self
                    .backend
                    .store(MemoryItem {
                        id: String::new(),
                        kind,
                        content,
                        category,
                        tags,
                    })
                    .await?;
                Ok(format!("Memory stored successfully with ID: {id}"))
            }
            MemoryRequest::Retrieve { query, limit } => {
                let items = self.backend.retrieve(&query, limit).await?;
                if items.is_empty() {
                    return Ok("No memories found matching the query.".to_owned());
                }
                let mut out = format!("Found {} memories:\n", items.len());
                for item in items {
                    out.push_str(&format!(
                        "- ID: {} | [{}] {} (Category: {})\n",
                        item.id, item.kind, item.content, item.category
                    ));
                }
                Ok(out)
            }
            MemoryRequest::Remove { id } => {
                self.backend.remove(&id).await?;
                Ok(format!("Memory with ID {id} deleted successfully."))
            }
        }
    }
}
