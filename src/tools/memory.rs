//! Tools that read and write remembered context
//!
//! Writes and deletes are explicit user requests, so store failures are
//! reported as persistence errors and end the run.

use super::{
    optional_str, require_str, FieldSpec, FieldType, InputSchema, Tool, ToolContext, ToolError,
    ToolKind,
};
use crate::context::ContextStore;
use crate::models::{LinkedEntity, NoteCategory, NoteSelector};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

fn category_list() -> String {
    NoteCategory::ALL
        .iter()
        .map(|c| c.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

fn parse_category(raw: &str) -> Result<NoteCategory, ToolError> {
    raw.parse().map_err(|_| {
        ToolError::InvalidInput(format!(
            "Unknown category '{}'; expected one of {}",
            raw,
            category_list()
        ))
    })
}

pub struct RememberContextTool {
    store: Arc<dyn ContextStore>,
}

impl RememberContextTool {
    pub fn new(store: Arc<dyn ContextStore>) -> Self {
        Self { store }
    }
}

#[async_trait::async_trait]
impl Tool for RememberContextTool {
    fn kind(&self) -> ToolKind {
        ToolKind::RememberContext
    }

    fn description(&self) -> &'static str {
        "Save a note to remember in future conversations. Only use when the user asks you to remember something."
    }

    fn input_schema(&self) -> InputSchema {
        InputSchema::new(vec![
            FieldSpec::required(
                "category",
                FieldType::String,
                "One of preference, account_mapping, vendor, correction, general",
            ),
            FieldSpec::required("content", FieldType::String, "The fact to remember"),
            FieldSpec::optional("linked_entity_kind", FieldType::String, "Entity type, e.g. agent, property, vendor"),
            FieldSpec::optional("linked_entity_id", FieldType::String, "Identifier of the linked entity"),
        ])
    }

    async fn execute(&self, input: &Value, ctx: &ToolContext) -> Result<Value, ToolError> {
        let category = parse_category(require_str(input, "category")?)?;
        let content = require_str(input, "content")?;

        let linked_entity = match (
            optional_str(input, "linked_entity_kind"),
            optional_str(input, "linked_entity_id"),
        ) {
            (Some(kind), Some(id)) => Some(LinkedEntity {
                kind: kind.to_string(),
                id: id.to_string(),
            }),
            (None, None) => None,
            _ => {
                return Err(ToolError::InvalidInput(
                    "linked_entity_kind and linked_entity_id must be given together".to_string(),
                ))
            }
        };

        let note_id = self
            .store
            .save_note(category, content, linked_entity)
            .await
            .map_err(|e| ToolError::Persistence(e.to_string()))?;

        info!(run_id = %ctx.run_id, %note_id, %category, "Saved context note");

        Ok(json!({
            "saved": true,
            "note_id": note_id,
            "category": category,
        }))
    }
}

pub struct RecallContextTool {
    store: Arc<dyn ContextStore>,
}

impl RecallContextTool {
    pub fn new(store: Arc<dyn ContextStore>) -> Self {
        Self { store }
    }
}

#[async_trait::async_trait]
impl Tool for RecallContextTool {
    fn kind(&self) -> ToolKind {
        ToolKind::RecallContext
    }

    fn description(&self) -> &'static str {
        "List remembered notes with their ids, optionally for one category"
    }

    fn input_schema(&self) -> InputSchema {
        InputSchema::new(vec![FieldSpec::optional(
            "category",
            FieldType::String,
            "Restrict to one category",
        )])
    }

    async fn execute(&self, input: &Value, _ctx: &ToolContext) -> Result<Value, ToolError> {
        let category = optional_str(input, "category")
            .map(parse_category)
            .transpose()?;

        let notes = self
            .store
            .load_notes(category)
            .await
            .map_err(|e| ToolError::Failed(format!("Could not read remembered notes: {}", e)))?;

        Ok(json!({
            "count": notes.len(),
            "notes": notes,
        }))
    }
}

pub struct ForgetContextTool {
    store: Arc<dyn ContextStore>,
}

impl ForgetContextTool {
    pub fn new(store: Arc<dyn ContextStore>) -> Self {
        Self { store }
    }
}

#[async_trait::async_trait]
impl Tool for ForgetContextTool {
    fn kind(&self) -> ToolKind {
        ToolKind::ForgetContext
    }

    fn description(&self) -> &'static str {
        "Delete remembered notes by note id, or every note whose text contains the given phrase"
    }

    fn input_schema(&self) -> InputSchema {
        InputSchema::new(vec![
            FieldSpec::optional("note_id", FieldType::String, "Id of the note to delete"),
            FieldSpec::optional("text", FieldType::String, "Delete notes containing this phrase"),
        ])
    }

    async fn execute(&self, input: &Value, ctx: &ToolContext) -> Result<Value, ToolError> {
        let selector = match (optional_str(input, "note_id"), optional_str(input, "text")) {
            (Some(raw), _) => NoteSelector::Id(Uuid::parse_str(raw).map_err(|_| {
                ToolError::InvalidInput(format!("'{}' is not a valid note id", raw))
            })?),
            (None, Some(text)) => NoteSelector::TextMatch(text.to_string()),
            (None, None) => {
                return Err(ToolError::InvalidInput(
                    "Provide either 'note_id' or 'text'".to_string(),
                ))
            }
        };

        let deleted = self
            .store
            .delete_note(&selector)
            .await
            .map_err(|e| ToolError::Persistence(e.to_string()))?;

        info!(run_id = %ctx.run_id, deleted, "Deleted context notes");

        Ok(json!({ "deleted": deleted }))
    }
}
