//! Tool trait and registry
//!
//! The set of tool identifiers is closed ([`ToolKind`]); each assistant
//! profile registers the subset it exposes. Dispatch always yields exactly
//! one [`ToolOutcome`] per invocation: unknown names, tool errors and even
//! panics come back as error outcomes.

use crate::context::ContextStore;
use crate::error::AgentError;
use crate::models::{
    AgentProfile, ToolDefinition, ToolErrorKind, ToolInvocation, ToolOutcome,
};
use crate::Result;
use futures::future::join_all;
use futures::FutureExt;
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;
use std::fmt;
use std::panic::AssertUnwindSafe;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tracing::{debug, warn};
use uuid::Uuid;

pub mod accounts;
pub mod books;
pub mod journal;
pub mod memory;

pub use books::Books;

/// Every tool the assistants know about
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ToolKind {
    SearchAccounts,
    AccountBalances,
    DraftJournalEntry,
    RememberContext,
    RecallContext,
    ForgetContext,
}

impl ToolKind {
    pub const ALL: [ToolKind; 6] = [
        ToolKind::SearchAccounts,
        ToolKind::AccountBalances,
        ToolKind::DraftJournalEntry,
        ToolKind::RememberContext,
        ToolKind::RecallContext,
        ToolKind::ForgetContext,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ToolKind::SearchAccounts => "search_accounts",
            ToolKind::AccountBalances => "account_balances",
            ToolKind::DraftJournalEntry => "draft_journal_entry",
            ToolKind::RememberContext => "remember_context",
            ToolKind::RecallContext => "recall_context",
            ToolKind::ForgetContext => "forget_context",
        }
    }
}

impl FromStr for ToolKind {
    type Err = AgentError;

    fn from_str(s: &str) -> Result<Self> {
        ToolKind::ALL
            .into_iter()
            .find(|k| k.as_str() == s)
            .ok_or_else(|| AgentError::UnknownTool(s.to_string()))
    }
}

impl fmt::Display for ToolKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

//
// ================= Input Schema =================
//

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    String,
    Number,
    Integer,
    Boolean,
    Array,
    Object,
}

impl FieldType {
    fn json_name(&self) -> &'static str {
        match self {
            FieldType::String => "string",
            FieldType::Number => "number",
            FieldType::Integer => "integer",
            FieldType::Boolean => "boolean",
            FieldType::Array => "array",
            FieldType::Object => "object",
        }
    }
}

#[derive(Debug, Clone)]
pub struct FieldSpec {
    pub name: &'static str,
    pub field_type: FieldType,
    pub required: bool,
    pub description: &'static str,
    /// JSON schema for array items
    pub items: Option<Value>,
}

impl FieldSpec {
    pub fn required(name: &'static str, field_type: FieldType, description: &'static str) -> Self {
        Self {
            name,
            field_type,
            required: true,
            description,
            items: None,
        }
    }

    pub fn optional(name: &'static str, field_type: FieldType, description: &'static str) -> Self {
        Self {
            required: false,
            ..Self::required(name, field_type, description)
        }
    }

    pub fn with_items(mut self, items: Value) -> Self {
        self.items = Some(items);
        self
    }
}

/// Advisory input description handed to the provider
#[derive(Debug, Clone, Default)]
pub struct InputSchema {
    pub fields: Vec<FieldSpec>,
}

impl InputSchema {
    pub fn new(fields: Vec<FieldSpec>) -> Self {
        Self { fields }
    }

    pub fn to_json_schema(&self) -> Value {
        let mut properties = Map::new();
        for field in &self.fields {
            let mut prop = json!({
                "type": field.field_type.json_name(),
                "description": field.description,
            });
            if let Some(items) = &field.items {
                prop["items"] = items.clone();
            }
            properties.insert(field.name.to_string(), prop);
        }

        let required: Vec<&str> = self
            .fields
            .iter()
            .filter(|f| f.required)
            .map(|f| f.name)
            .collect();

        json!({
            "type": "object",
            "properties": properties,
            "required": required,
        })
    }
}

//
// ================= Tool Trait =================
//

/// Failure reported by a tool
#[derive(Error, Debug)]
pub enum ToolError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("{0}")]
    Failed(String),

    #[error("context store failure: {0}")]
    Persistence(String),
}

impl ToolError {
    pub fn kind(&self) -> ToolErrorKind {
        match self {
            ToolError::InvalidInput(_) => ToolErrorKind::InvalidInput,
            ToolError::Failed(_) => ToolErrorKind::Execution,
            ToolError::Persistence(_) => ToolErrorKind::Persistence,
        }
    }
}

/// Per-run information handed to every tool execution
#[derive(Debug, Clone)]
pub struct ToolContext {
    pub run_id: Uuid,
    pub profile: AgentProfile,
}

/// Trait for a single tool
#[async_trait::async_trait]
pub trait Tool: Send + Sync {
    fn kind(&self) -> ToolKind;
    fn description(&self) -> &'static str;
    fn input_schema(&self) -> InputSchema;
    async fn execute(
        &self,
        input: &Value,
        ctx: &ToolContext,
    ) -> std::result::Result<Value, ToolError>;

    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.kind().as_str().to_string(),
            description: self.description().to_string(),
            input_schema: self.input_schema().to_json_schema(),
        }
    }
}

//
// ================= Input Helpers =================
//

pub(crate) fn require_str<'a>(input: &'a Value, field: &str) -> std::result::Result<&'a str, ToolError> {
    optional_str(input, field)
        .ok_or_else(|| ToolError::InvalidInput(format!("Expected non-empty '{}'", field)))
}

pub(crate) fn optional_str<'a>(input: &'a Value, field: &str) -> Option<&'a str> {
    input
        .get(field)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

//
// ================= Registry =================
//

/// Tool registry for looking up and executing tools
pub struct ToolRegistry {
    tools: BTreeMap<ToolKind, Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: BTreeMap::new(),
        }
    }

    pub fn register(&mut self, tool: Arc<dyn Tool>) -> Result<()> {
        let kind = tool.kind();
        if self.tools.contains_key(&kind) {
            return Err(AgentError::DuplicateTool(kind.to_string()));
        }
        self.tools.insert(kind, tool);
        Ok(())
    }

    /// Look up a tool by the name the provider used
    pub fn resolve(&self, name: &str) -> Result<Arc<dyn Tool>> {
        let kind: ToolKind = name.parse()?;
        self.tools
            .get(&kind)
            .cloned()
            .ok_or_else(|| AgentError::UnknownTool(name.to_string()))
    }

    pub fn list(&self) -> Vec<&'static str> {
        self.tools.keys().map(|k| k.as_str()).collect()
    }

    /// Manifest sent to the provider, in stable order
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.tools.values().map(|t| t.definition()).collect()
    }

    /// Execute one invocation. Never fails: every problem becomes an error outcome.
    pub async fn dispatch(&self, invocation: &ToolInvocation, ctx: &ToolContext) -> ToolOutcome {
        let tool = match self.resolve(&invocation.name) {
            Ok(tool) => tool,
            Err(e) => {
                warn!(run_id = %ctx.run_id, tool = %invocation.name, "Provider requested unknown tool");
                return ToolOutcome::failure(invocation, ToolErrorKind::UnknownTool, e.to_string());
            }
        };

        let input = match &invocation.input {
            Value::Object(_) => invocation.input.clone(),
            Value::Null => Value::Object(Map::new()),
            _ => {
                return ToolOutcome::failure(
                    invocation,
                    ToolErrorKind::InvalidInput,
                    "tool input must be a JSON object",
                )
            }
        };

        let start = Instant::now();
        let result = AssertUnwindSafe(tool.execute(&input, ctx))
            .catch_unwind()
            .await;
        let elapsed_ms = start.elapsed().as_millis() as u64;

        match result {
            Ok(Ok(data)) => {
                debug!(run_id = %ctx.run_id, tool = %invocation.name, elapsed_ms, "Tool succeeded");
                ToolOutcome::success(invocation, data)
            }
            Ok(Err(e)) => {
                warn!(
                    run_id = %ctx.run_id,
                    tool = %invocation.name,
                    elapsed_ms,
                    error = %e,
                    "Tool failed"
                );
                ToolOutcome::failure(invocation, e.kind(), e.to_string())
            }
            Err(_) => {
                warn!(run_id = %ctx.run_id, tool = %invocation.name, "Tool panicked");
                ToolOutcome::failure(
                    invocation,
                    ToolErrorKind::Execution,
                    format!("{} crashed while executing", invocation.name),
                )
            }
        }
    }

    /// Execute a turn's invocations concurrently; outcomes keep invocation order
    pub async fn dispatch_all(
        &self,
        invocations: &[ToolInvocation],
        ctx: &ToolContext,
    ) -> Vec<ToolOutcome> {
        join_all(invocations.iter().map(|inv| self.dispatch(inv, ctx))).await
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Build the registry for an assistant profile.
pub fn create_registry(
    profile: AgentProfile,
    books: Arc<Books>,
    store: Arc<dyn ContextStore>,
    suggestion_limit: usize,
) -> Result<ToolRegistry> {
    let mut registry = ToolRegistry::new();

    registry.register(Arc::new(accounts::SearchAccountsTool::new(
        books.clone(),
        suggestion_limit,
    )))?;
    registry.register(Arc::new(accounts::AccountBalancesTool::new(books.clone())))?;

    if profile == AgentProfile::Bookkeeping {
        registry.register(Arc::new(journal::DraftJournalEntryTool::new(books)))?;
    }

    registry.register(Arc::new(memory::RememberContextTool::new(store.clone())))?;
    registry.register(Arc::new(memory::RecallContextTool::new(store.clone())))?;
    registry.register(Arc::new(memory::ForgetContextTool::new(store)))?;

    Ok(registry)
}
