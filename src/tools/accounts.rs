//! Chart-of-accounts lookup and balance tools

use super::books::{cents_to_amount, AccountKind, Books};
use super::{
    optional_str, require_str, FieldSpec, FieldType, InputSchema, Tool, ToolContext, ToolError,
    ToolKind,
};
use serde_json::{json, Value};
use std::sync::Arc;

/// Hard cap on matches returned regardless of the requested limit
const MAX_SEARCH_RESULTS: usize = 25;

pub struct SearchAccountsTool {
    books: Arc<Books>,
    default_limit: usize,
}

impl SearchAccountsTool {
    pub fn new(books: Arc<Books>, default_limit: usize) -> Self {
        Self {
            books,
            default_limit: default_limit.max(1),
        }
    }
}

#[async_trait::async_trait]
impl Tool for SearchAccountsTool {
    fn kind(&self) -> ToolKind {
        ToolKind::SearchAccounts
    }

    fn description(&self) -> &'static str {
        "Search the chart of accounts by keyword or account code and return candidate accounts"
    }

    fn input_schema(&self) -> InputSchema {
        InputSchema::new(vec![
            FieldSpec::required("query", FieldType::String, "Keywords, vendor name or account code"),
            FieldSpec::optional("limit", FieldType::Integer, "Maximum number of matches"),
        ])
    }

    async fn execute(&self, input: &Value, _ctx: &ToolContext) -> Result<Value, ToolError> {
        let query = require_str(input, "query")?;
        let limit = input
            .get("limit")
            .and_then(Value::as_u64)
            .map(|n| n as usize)
            .unwrap_or(self.default_limit)
            .clamp(1, MAX_SEARCH_RESULTS);

        let matches: Vec<Value> = self
            .books
            .search(query)
            .into_iter()
            .take(limit)
            .map(|a| {
                json!({
                    "code": a.code,
                    "name": a.name,
                    "kind": a.kind,
                    "description": a.description,
                })
            })
            .collect();

        Ok(json!({
            "query": query,
            "match_count": matches.len(),
            "matches": matches,
        }))
    }
}

pub struct AccountBalancesTool {
    books: Arc<Books>,
}

impl AccountBalancesTool {
    pub fn new(books: Arc<Books>) -> Self {
        Self { books }
    }
}

#[async_trait::async_trait]
impl Tool for AccountBalancesTool {
    fn kind(&self) -> ToolKind {
        ToolKind::AccountBalances
    }

    fn description(&self) -> &'static str {
        "Report posted balances by account, optionally filtered by account codes or account kind"
    }

    fn input_schema(&self) -> InputSchema {
        InputSchema::new(vec![
            FieldSpec::optional("account_codes", FieldType::Array, "Account codes to report")
                .with_items(json!({ "type": "string" })),
            FieldSpec::optional(
                "kind",
                FieldType::String,
                "One of asset, liability, equity, income, expense",
            ),
        ])
    }

    async fn execute(&self, input: &Value, _ctx: &ToolContext) -> Result<Value, ToolError> {
        let kind = optional_str(input, "kind")
            .map(|k| k.parse::<AccountKind>().map_err(ToolError::InvalidInput))
            .transpose()?;

        let codes: Option<Vec<&str>> = input
            .get("account_codes")
            .and_then(Value::as_array)
            .map(|arr| arr.iter().filter_map(Value::as_str).map(str::trim).collect());

        if let Some(codes) = &codes {
            let unknown: Vec<&str> = codes
                .iter()
                .copied()
                .filter(|c| self.books.account(c).is_none())
                .collect();
            if !unknown.is_empty() {
                return Err(ToolError::InvalidInput(format!(
                    "Unknown account code(s): {}",
                    unknown.join(", ")
                )));
            }
        }

        let mut total_cents = 0i64;
        let balances: Vec<Value> = self
            .books
            .accounts()
            .iter()
            .filter(|a| kind.map_or(true, |k| a.kind == k))
            .filter(|a| {
                codes
                    .as_ref()
                    .map_or(true, |codes| codes.contains(&a.code.as_str()))
            })
            .map(|a| {
                let cents = self.books.balance_cents(a);
                total_cents += cents;
                json!({
                    "code": a.code,
                    "name": a.name,
                    "kind": a.kind,
                    "balance": cents_to_amount(cents),
                })
            })
            .collect();

        Ok(json!({
            "balances": balances,
            "total": cents_to_amount(total_cents),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::AgentProfile;
    use uuid::Uuid;

    fn ctx() -> ToolContext {
        ToolContext {
            run_id: Uuid::new_v4(),
            profile: AgentProfile::FinancialAnalysis,
        }
    }

    #[tokio::test]
    async fn test_search_respects_limit() {
        let tool = SearchAccountsTool::new(Arc::new(Books::brokerage_sample()), 5);
        let output = tool
            .execute(&json!({ "query": "commission income fees", "limit": 2 }), &ctx())
            .await
            .unwrap();

        assert_eq!(output["match_count"], 2);
        assert_eq!(output["matches"].as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_search_requires_query() {
        let tool = SearchAccountsTool::new(Arc::new(Books::brokerage_sample()), 5);
        let err = tool.execute(&json!({}), &ctx()).await.unwrap_err();
        assert!(matches!(err, ToolError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn test_balances_by_kind() {
        let tool = AccountBalancesTool::new(Arc::new(Books::brokerage_sample()));
        let output = tool
            .execute(&json!({ "kind": "income" }), &ctx())
            .await
            .unwrap();

        let balances = output["balances"].as_array().unwrap();
        assert_eq!(balances.len(), 3);
        assert_eq!(output["total"], 18000.0);
    }

    #[tokio::test]
    async fn test_unknown_codes_rejected() {
        let tool = AccountBalancesTool::new(Arc::new(Books::brokerage_sample()));
        let err = tool
            .execute(&json!({ "account_codes": ["9999"] }), &ctx())
            .await
            .unwrap_err();

        assert!(err.to_string().contains("9999"));
    }
}
