//! Balanced journal-entry drafting
//!
//! Produces a draft only; nothing is posted to the ledger.

use super::books::{cents_to_amount, parse_cents, Books};
use super::{
    optional_str, require_str, FieldSpec, FieldType, InputSchema, Tool, ToolContext, ToolError,
    ToolKind,
};
use chrono::{NaiveDate, Utc};
use serde_json::{json, Value};
use std::sync::Arc;

pub struct DraftJournalEntryTool {
    books: Arc<Books>,
}

impl DraftJournalEntryTool {
    pub fn new(books: Arc<Books>) -> Self {
        Self { books }
    }

    fn draft_line(&self, index: usize, line: &Value) -> Result<(Value, i64, i64), ToolError> {
        let position = index + 1;
        let code = line
            .get("account_code")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .ok_or_else(|| {
                ToolError::InvalidInput(format!("Line {} is missing 'account_code'", position))
            })?;

        let account = self.books.account(code).ok_or_else(|| {
            ToolError::InvalidInput(format!(
                "Line {}: account '{}' is not in the chart of accounts; use search_accounts first",
                position, code
            ))
        })?;

        let amount = |field: &str| -> Result<i64, ToolError> {
            match line.get(field) {
                None | Some(Value::Null) => Ok(0),
                Some(v) => parse_cents(v).ok_or_else(|| {
                    ToolError::InvalidInput(format!("Line {}: '{}' is not an amount", position, field))
                }),
            }
        };
        let debit = amount("debit")?;
        let credit = amount("credit")?;

        if debit < 0 || credit < 0 {
            return Err(ToolError::InvalidInput(format!(
                "Line {}: amounts must be positive",
                position
            )));
        }
        if (debit > 0) == (credit > 0) {
            return Err(ToolError::InvalidInput(format!(
                "Line {}: provide exactly one of debit or credit",
                position
            )));
        }

        let drafted = json!({
            "account_code": account.code,
            "account_name": account.name,
            "debit": cents_to_amount(debit),
            "credit": cents_to_amount(credit),
            "memo": optional_str(line, "memo"),
        });

        Ok((drafted, debit, credit))
    }
}

#[async_trait::async_trait]
impl Tool for DraftJournalEntryTool {
    fn kind(&self) -> ToolKind {
        ToolKind::DraftJournalEntry
    }

    fn description(&self) -> &'static str {
        "Draft a balanced double-entry journal entry for review. Debits must equal credits."
    }

    fn input_schema(&self) -> InputSchema {
        InputSchema::new(vec![
            FieldSpec::required("memo", FieldType::String, "What the entry records"),
            FieldSpec::optional("date", FieldType::String, "Entry date, YYYY-MM-DD (defaults to today)"),
            FieldSpec::required("lines", FieldType::Array, "Entry lines, at least two")
                .with_items(json!({
                    "type": "object",
                    "properties": {
                        "account_code": { "type": "string" },
                        "debit": { "type": "number" },
                        "credit": { "type": "number" },
                        "memo": { "type": "string" }
                    },
                    "required": ["account_code"]
                })),
        ])
    }

    async fn execute(&self, input: &Value, _ctx: &ToolContext) -> Result<Value, ToolError> {
        let memo = require_str(input, "memo")?;

        let date = match optional_str(input, "date") {
            Some(raw) => NaiveDate::parse_from_str(raw, "%Y-%m-%d").map_err(|_| {
                ToolError::InvalidInput(format!("'{}' is not a YYYY-MM-DD date", raw))
            })?,
            None => Utc::now().date_naive(),
        };

        let lines = input
            .get("lines")
            .and_then(Value::as_array)
            .ok_or_else(|| ToolError::InvalidInput("Expected 'lines' array".to_string()))?;

        if lines.len() < 2 {
            return Err(ToolError::InvalidInput(
                "A journal entry needs at least two lines".to_string(),
            ));
        }

        let mut drafted = Vec::with_capacity(lines.len());
        let mut total_debits = 0i64;
        let mut total_credits = 0i64;

        for (index, line) in lines.iter().enumerate() {
            let (value, debit, credit) = self.draft_line(index, line)?;
            total_debits = total_debits.checked_add(debit).ok_or_else(entry_too_large)?;
            total_credits = total_credits.checked_add(credit).ok_or_else(entry_too_large)?;
            drafted.push(value);
        }

        if total_debits != total_credits {
            return Err(ToolError::InvalidInput(format!(
                "Entry is out of balance: debits {:.2} vs credits {:.2}",
                cents_to_amount(total_debits),
                cents_to_amount(total_credits)
            )));
        }

        Ok(json!({
            "date": date.format("%Y-%m-%d").to_string(),
            "memo": memo,
            "lines": drafted,
            "total_debits": cents_to_amount(total_debits),
            "total_credits": cents_to_amount(total_credits),
            "balanced": true,
        }))
    }
}

fn entry_too_large() -> ToolError {
    ToolError::InvalidInput("Entry totals exceed the largest supported amount".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::AgentProfile;
    use uuid::Uuid;

    fn tool() -> DraftJournalEntryTool {
        DraftJournalEntryTool::new(Arc::new(Books::brokerage_sample()))
    }

    fn ctx() -> ToolContext {
        ToolContext {
            run_id: Uuid::new_v4(),
            profile: AgentProfile::Bookkeeping,
        }
    }

    #[tokio::test]
    async fn test_balanced_entry_drafted() {
        let output = tool()
            .execute(
                &json!({
                    "memo": "April LOC interest",
                    "date": "2026-04-30",
                    "lines": [
                        { "account_code": "7100", "debit": 412.35 },
                        { "account_code": "1000", "credit": "412.35" }
                    ]
                }),
                &ctx(),
            )
            .await
            .unwrap();

        assert_eq!(output["balanced"], true);
        assert_eq!(output["date"], "2026-04-30");
        assert_eq!(output["lines"][0]["account_name"], "Interest Expense - Line of Credit");
        assert_eq!(output["total_debits"], output["total_credits"]);
    }

    #[tokio::test]
    async fn test_unbalanced_entry_rejected() {
        let err = tool()
            .execute(
                &json!({
                    "memo": "Rent",
                    "lines": [
                        { "account_code": "6200", "debit": 3500 },
                        { "account_code": "1000", "credit": 3400 }
                    ]
                }),
                &ctx(),
            )
            .await
            .unwrap_err();

        assert!(err.to_string().contains("out of balance"));
    }

    #[tokio::test]
    async fn test_line_needs_exactly_one_side() {
        let err = tool()
            .execute(
                &json!({
                    "memo": "Bad line",
                    "lines": [
                        { "account_code": "6200", "debit": 10, "credit": 10 },
                        { "account_code": "1000", "credit": 10 }
                    ]
                }),
                &ctx(),
            )
            .await
            .unwrap_err();

        assert!(err.to_string().contains("exactly one"));
    }

    #[tokio::test]
    async fn test_oversized_amounts_rejected() {
        let err = tool()
            .execute(
                &json!({
                    "memo": "Typo",
                    "lines": [
                        { "account_code": "6200", "debit": 1e300 },
                        { "account_code": "1000", "credit": 1e300 }
                    ]
                }),
                &ctx(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::InvalidInput(_)));

        let limit = json!({ "account_code": "6200", "debit": 1_000_000_000_000.0 });
        let mut lines = vec![limit; 100_000];
        lines.push(json!({ "account_code": "1000", "credit": 10 }));
        let err = tool()
            .execute(&json!({ "memo": "Overflow", "lines": lines }), &ctx())
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::InvalidInput(_)));
        assert!(err.to_string().contains("largest supported amount"));
    }

    #[tokio::test]
    async fn test_unknown_account_rejected() {
        let err = tool()
            .execute(
                &json!({
                    "memo": "Mystery",
                    "lines": [
                        { "account_code": "9999", "debit": 10 },
                        { "account_code": "1000", "credit": 10 }
                    ]
                }),
                &ctx(),
            )
            .await
            .unwrap_err();

        assert!(matches!(err, ToolError::InvalidInput(_)));
        assert!(err.to_string().contains("9999"));
    }
}
