//! Artifact extraction from tool outcomes
//!
//! Outcomes are observed as each turn's dispatch completes. Later
//! qualifying outcomes replace earlier ones; failures never do.

use crate::models::{Artifacts, ToolOutcome};
use crate::tools::ToolKind;
use serde_json::Value;

#[derive(Debug, Clone)]
pub struct ArtifactAccumulator {
    suggestion_limit: usize,
    entry_draft: Option<Value>,
    suggestions: Option<Vec<Value>>,
}

impl ArtifactAccumulator {
    pub fn new(suggestion_limit: usize) -> Self {
        Self {
            suggestion_limit,
            entry_draft: None,
            suggestions: None,
        }
    }

    pub fn observe(&mut self, outcome: &ToolOutcome) {
        let Some(data) = outcome.data() else {
            return;
        };

        match outcome.tool_name.parse::<ToolKind>() {
            Ok(ToolKind::DraftJournalEntry) => {
                self.entry_draft = Some(data.clone());
            }
            Ok(ToolKind::SearchAccounts) => {
                if let Some(matches) = data.get("matches").and_then(Value::as_array) {
                    if !matches.is_empty() && matches.len() <= self.suggestion_limit {
                        self.suggestions = Some(matches.clone());
                    }
                }
            }
            _ => {}
        }
    }

    pub fn observe_all(&mut self, outcomes: &[ToolOutcome]) {
        for outcome in outcomes {
            self.observe(outcome);
        }
    }

    pub fn finish(self) -> Artifacts {
        Artifacts {
            entry_draft: self.entry_draft,
            suggestions: self.suggestions,
        }
    }
}
