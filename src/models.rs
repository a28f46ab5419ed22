//! Core data models for the assistant
//!
//! Conversation types serialize directly to the provider's message shape:
//! a turn's content is either a bare string or a list of typed blocks.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

//
// ================= Profiles =================
//

/// Which assistant the loop is running as; selects policy text and tools
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum AgentProfile {
    #[default]
    Bookkeeping,
    FinancialAnalysis,
}

impl AgentProfile {
    pub fn as_str(&self) -> &'static str {
        match self {
            AgentProfile::Bookkeeping => "bookkeeping",
            AgentProfile::FinancialAnalysis => "financial_analysis",
        }
    }
}

impl FromStr for AgentProfile {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "bookkeeping" | "bookkeeper" => Ok(AgentProfile::Bookkeeping),
            "financial_analysis" | "analysis" | "analyst" => Ok(AgentProfile::FinancialAnalysis),
            other => Err(format!("unknown assistant profile '{}'", other)),
        }
    }
}

impl fmt::Display for AgentProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

//
// ================= Conversation =================
//

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ConversationTurn {
    pub role: Role,
    pub content: TurnContent,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum TurnContent {
    Text(String),
    Blocks(Vec<ContentBlock>),
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    Text {
        text: String,
    },
    ToolUse(ToolInvocation),
    ToolResult {
        tool_use_id: String,
        content: String,
        #[serde(default)]
        is_error: bool,
    },
    /// Block types this crate does not act on (thinking, citations, ...)
    #[serde(other)]
    Unsupported,
}

impl ConversationTurn {
    pub fn user_text(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: TurnContent::Text(text.into()),
        }
    }

    pub fn assistant_text(text: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: TurnContent::Text(text.into()),
        }
    }

    pub fn assistant_blocks(blocks: Vec<ContentBlock>) -> Self {
        Self {
            role: Role::Assistant,
            content: TurnContent::Blocks(blocks),
        }
    }

    /// A user turn carrying the outcomes for every invocation of the
    /// preceding assistant turn
    pub fn tool_outcomes(outcomes: &[ToolOutcome]) -> Self {
        Self {
            role: Role::User,
            content: TurnContent::Blocks(outcomes.iter().map(ToolOutcome::to_block).collect()),
        }
    }

    /// Tool invocations requested in this turn, in order
    pub fn invocations(&self) -> Vec<&ToolInvocation> {
        match &self.content {
            TurnContent::Text(_) => Vec::new(),
            TurnContent::Blocks(blocks) => blocks
                .iter()
                .filter_map(|b| match b {
                    ContentBlock::ToolUse(inv) => Some(inv),
                    _ => None,
                })
                .collect(),
        }
    }
}

//
// ================= Tool I/O =================
//

/// A tool call requested by the provider
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolInvocation {
    pub id: String,
    pub name: String,
    #[serde(default = "empty_input", deserialize_with = "input_or_empty")]
    pub input: Value,
}

fn empty_input() -> Value {
    Value::Object(Map::new())
}

/// A missing or null tool input is sent back to the provider as `{}`
fn input_or_empty<'de, D>(deserializer: D) -> std::result::Result<Value, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::Null => Ok(empty_input()),
        input => Ok(input),
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ToolErrorKind {
    InvalidInput,
    Execution,
    UnknownTool,
    /// Context store write/delete failed; aborts the run
    Persistence,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum OutcomePayload {
    Success { data: Value },
    Error { message: String, kind: ToolErrorKind },
}

/// Result of executing one [`ToolInvocation`]
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolOutcome {
    pub invocation_id: String,
    pub tool_name: String,
    pub payload: OutcomePayload,
    pub is_error: bool,
}

impl ToolOutcome {
    pub fn success(invocation: &ToolInvocation, data: Value) -> Self {
        Self {
            invocation_id: invocation.id.clone(),
            tool_name: invocation.name.clone(),
            payload: OutcomePayload::Success { data },
            is_error: false,
        }
    }

    pub fn failure(
        invocation: &ToolInvocation,
        kind: ToolErrorKind,
        message: impl Into<String>,
    ) -> Self {
        Self {
            invocation_id: invocation.id.clone(),
            tool_name: invocation.name.clone(),
            payload: OutcomePayload::Error {
                message: message.into(),
                kind,
            },
            is_error: true,
        }
    }

    pub fn data(&self) -> Option<&Value> {
        match &self.payload {
            OutcomePayload::Success { data } => Some(data),
            OutcomePayload::Error { .. } => None,
        }
    }

    pub fn error_kind(&self) -> Option<ToolErrorKind> {
        match &self.payload {
            OutcomePayload::Success { .. } => None,
            OutcomePayload::Error { kind, .. } => Some(*kind),
        }
    }

    pub fn to_block(&self) -> ContentBlock {
        let content = match &self.payload {
            OutcomePayload::Success { data } => data.to_string(),
            OutcomePayload::Error { message, .. } => format!("Error: {}", message),
        };

        ContentBlock::ToolResult {
            tool_use_id: self.invocation_id.clone(),
            content,
            is_error: self.is_error,
        }
    }
}

/// Tool manifest entry sent to the provider
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub input_schema: Value,
}

//
// ================= Remembered Context =================
//

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum NoteCategory {
    Preference,
    AccountMapping,
    Vendor,
    Correction,
    General,
}

impl NoteCategory {
    pub const ALL: [NoteCategory; 5] = [
        NoteCategory::Preference,
        NoteCategory::AccountMapping,
        NoteCategory::Vendor,
        NoteCategory::Correction,
        NoteCategory::General,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            NoteCategory::Preference => "preference",
            NoteCategory::AccountMapping => "account_mapping",
            NoteCategory::Vendor => "vendor",
            NoteCategory::Correction => "correction",
            NoteCategory::General => "general",
        }
    }
}

impl FromStr for NoteCategory {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase().replace(['-', ' '], "_");
        NoteCategory::ALL
            .into_iter()
            .find(|c| c.as_str() == normalized)
            .ok_or_else(|| format!("unknown note category '{}'", s))
    }
}

impl fmt::Display for NoteCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LinkedEntity {
    pub kind: String,
    pub id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ContextNote {
    pub note_id: Uuid,
    pub category: NoteCategory,
    pub content: String,
    pub linked_entity: Option<LinkedEntity>,
    pub created_at: DateTime<Utc>,
}

/// Which notes a delete request targets
#[derive(Debug, Clone, PartialEq)]
pub enum NoteSelector {
    Id(Uuid),
    /// Case-insensitive substring of the note content
    TextMatch(String),
}

//
// ================= Run Result =================
//

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Artifacts {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entry_draft: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggestions: Option<Vec<Value>>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Termination {
    Completed,
    IterationLimit,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunResult {
    pub run_id: Uuid,
    pub answer: String,
    pub artifacts: Artifacts,
    pub tool_calls_made: Vec<String>,
    pub iterations: u32,
    pub termination: Termination,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_turn_wire_shape() {
        let turn = ConversationTurn::assistant_blocks(vec![
            ContentBlock::Text {
                text: "Looking that up".to_string(),
            },
            ContentBlock::ToolUse(ToolInvocation {
                id: "toolu_01".to_string(),
                name: "search_accounts".to_string(),
                input: json!({ "query": "interest" }),
            }),
        ]);

        let value = serde_json::to_value(&turn).unwrap();
        assert_eq!(value["role"], "assistant");
        assert_eq!(value["content"][0]["type"], "text");
        assert_eq!(value["content"][1]["type"], "tool_use");
        assert_eq!(value["content"][1]["id"], "toolu_01");
        assert_eq!(value["content"][1]["input"]["query"], "interest");

        let plain = serde_json::to_value(ConversationTurn::user_text("hi")).unwrap();
        assert_eq!(plain["content"], "hi");
    }

    #[test]
    fn test_unsupported_blocks_deserialize() {
        let blocks: Vec<ContentBlock> = serde_json::from_value(json!([
            { "type": "thinking", "thinking": "..." },
            { "type": "text", "text": "Answer" }
        ]))
        .unwrap();

        assert_eq!(blocks[0], ContentBlock::Unsupported);
        assert_eq!(
            blocks[1],
            ContentBlock::Text {
                text: "Answer".to_string()
            }
        );
    }

    #[test]
    fn test_tool_use_without_input_becomes_empty_object() {
        let blocks: Vec<ContentBlock> = serde_json::from_value(json!([
            { "type": "tool_use", "id": "toolu_1", "name": "recall_context" },
            { "type": "tool_use", "id": "toolu_2", "name": "recall_context", "input": null }
        ]))
        .unwrap();

        for block in &blocks {
            let ContentBlock::ToolUse(invocation) = block else {
                panic!("expected tool_use, got {:?}", block);
            };
            assert_eq!(invocation.input, json!({}));
        }
        let echoed = serde_json::to_value(&blocks[1]).unwrap();
        assert_eq!(echoed["input"], json!({}));
    }

    #[test]
    fn test_outcome_block_marks_errors() {
        let invocation = ToolInvocation {
            id: "toolu_02".to_string(),
            name: "draft_journal_entry".to_string(),
            input: json!({}),
        };

        let outcome = ToolOutcome::failure(&invocation, ToolErrorKind::InvalidInput, "lines required");
        match outcome.to_block() {
            ContentBlock::ToolResult {
                tool_use_id,
                content,
                is_error,
            } => {
                assert_eq!(tool_use_id, "toolu_02");
                assert!(content.contains("lines required"));
                assert!(is_error);
            }
            other => panic!("unexpected block {:?}", other),
        }
    }

    #[test]
    fn test_note_category_parsing() {
        assert_eq!("Account Mapping".parse::<NoteCategory>(), Ok(NoteCategory::AccountMapping));
        assert_eq!("vendor".parse::<NoteCategory>(), Ok(NoteCategory::Vendor));
        assert!("payroll".parse::<NoteCategory>().is_err());
    }
}
