//! Read-only view of the brokerage books the tools work against
//!
//! Amounts are integer cents. The ledger itself lives in the hosted data
//! store; this is the slice the assistants need.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum AccountKind {
    Asset,
    Liability,
    Equity,
    Income,
    Expense,
}

impl AccountKind {
    /// Assets and expenses grow with debits
    pub fn is_debit_normal(&self) -> bool {
        matches!(self, AccountKind::Asset | AccountKind::Expense)
    }
}

impl FromStr for AccountKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "asset" | "assets" => Ok(AccountKind::Asset),
            "liability" | "liabilities" => Ok(AccountKind::Liability),
            "equity" => Ok(AccountKind::Equity),
            "income" | "revenue" => Ok(AccountKind::Income),
            "expense" | "expenses" => Ok(AccountKind::Expense),
            other => Err(format!("unknown account kind '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    pub code: String,
    pub name: String,
    pub kind: AccountKind,
    pub description: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerLine {
    pub account_code: String,
    pub date: NaiveDate,
    pub debit_cents: i64,
    pub credit_cents: i64,
    pub memo: String,
}

pub struct Books {
    accounts: Vec<Account>,
    ledger: Vec<LedgerLine>,
}

impl Books {
    pub fn new(accounts: Vec<Account>, ledger: Vec<LedgerLine>) -> Self {
        Self { accounts, ledger }
    }

    pub fn accounts(&self) -> &[Account] {
        &self.accounts
    }

    pub fn account(&self, code: &str) -> Option<&Account> {
        let code = code.trim();
        self.accounts.iter().find(|a| a.code == code)
    }

    /// Rank accounts against a free-text query. Exact code hits first, then
    /// by number of query words found in name or description.
    pub fn search(&self, query: &str) -> Vec<&Account> {
        let lowered = query.to_lowercase();
        let words: Vec<&str> = lowered
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| w.len() > 2 || w.chars().all(|c| c.is_ascii_digit()))
            .filter(|w| !w.is_empty())
            .collect();

        let mut scored: Vec<(usize, &Account)> = self
            .accounts
            .iter()
            .filter_map(|account| {
                let haystack =
                    format!("{} {}", account.name, account.description).to_lowercase();
                let mut score = words.iter().filter(|w| haystack.contains(**w)).count();
                if words.iter().any(|w| *w == account.code) {
                    score += 10;
                }
                (score > 0).then_some((score, account))
            })
            .collect();

        scored.sort_by(|a, b| b.0.cmp(&a.0).then_with(|| a.1.code.cmp(&b.1.code)));
        scored.into_iter().map(|(_, a)| a).collect()
    }

    /// Balance in the account's normal direction
    pub fn balance_cents(&self, account: &Account) -> i64 {
        let (debits, credits) = self
            .ledger
            .iter()
            .filter(|l| l.account_code == account.code)
            .fold((0i64, 0i64), |(d, c), l| (d + l.debit_cents, c + l.credit_cents));

        if account.kind.is_debit_normal() {
            debits - credits
        } else {
            credits - debits
        }
    }

    /// Chart of accounts and a handful of posted entries for a small brokerage
    pub fn brokerage_sample() -> Self {
        let account = |code: &str, name: &str, kind: AccountKind, description: &str| Account {
            code: code.to_string(),
            name: name.to_string(),
            kind,
            description: description.to_string(),
        };

        let accounts = vec![
            account("1000", "Operating Cash", AccountKind::Asset, "Main business checking account"),
            account("1010", "Trust Account - Escrow Deposits", AccountKind::Asset, "Earnest money held in trust for clients"),
            account("1200", "Commissions Receivable", AccountKind::Asset, "Commissions earned on closed deals not yet received"),
            account("1500", "Office Equipment", AccountKind::Asset, "Computers, furniture and signage"),
            account("2000", "Accounts Payable", AccountKind::Liability, "Vendor bills awaiting payment"),
            account("2100", "Agent Commissions Payable", AccountKind::Liability, "Agent splits owed on closed deals"),
            account("2300", "Line of Credit", AccountKind::Liability, "Revolving bank line of credit principal"),
            account("2400", "Escrow Liability", AccountKind::Liability, "Client funds owed back from the trust account"),
            account("3000", "Owner's Equity", AccountKind::Equity, "Owner capital contributions and draws"),
            account("4000", "Commission Income", AccountKind::Income, "Gross commission income from closed transactions"),
            account("4100", "Referral Fee Income", AccountKind::Income, "Referral fees received from other brokerages"),
            account("4200", "Property Management Fees", AccountKind::Income, "Monthly management fees from rental owners"),
            account("5000", "Agent Commission Expense", AccountKind::Expense, "Agent share of commission splits"),
            account("6000", "Advertising & Marketing", AccountKind::Expense, "Listing ads, signs, photography and promotion"),
            account("6100", "MLS & Association Dues", AccountKind::Expense, "MLS access fees and realtor association dues"),
            account("6200", "Office Rent", AccountKind::Expense, "Monthly office lease payments"),
            account("6300", "Software Subscriptions", AccountKind::Expense, "CRM, transaction management and accounting software"),
            account("6400", "E&O Insurance", AccountKind::Expense, "Errors and omissions insurance premiums"),
            account("7100", "Interest Expense - Line of Credit", AccountKind::Expense, "Interest charged on the revolving bank line of credit"),
            account("7200", "Bank Fees", AccountKind::Expense, "Service charges and wire fees"),
        ];

        let line = |code: &str, (y, m, d): (i32, u32, u32), debit: i64, credit: i64, memo: &str| LedgerLine {
            account_code: code.to_string(),
            date: NaiveDate::from_ymd_opt(y, m, d).unwrap_or_default(),
            debit_cents: debit,
            credit_cents: credit,
            memo: memo.to_string(),
        };

        let ledger = vec![
            line("1000", (2026, 1, 2), 5_000_000, 0, "Owner contribution"),
            line("3000", (2026, 1, 2), 0, 5_000_000, "Owner contribution"),
            line("1000", (2026, 2, 14), 1_800_000, 0, "Commission received - 42 Elm St"),
            line("4000", (2026, 2, 14), 0, 1_800_000, "Commission received - 42 Elm St"),
            line("5000", (2026, 2, 14), 1_080_000, 0, "Agent split - 42 Elm St"),
            line("2100", (2026, 2, 14), 0, 1_080_000, "Agent split - 42 Elm St"),
            line("6200", (2026, 3, 1), 350_000, 0, "March office rent"),
            line("1000", (2026, 3, 1), 0, 350_000, "March office rent"),
            line("7100", (2026, 3, 31), 42_500, 0, "LOC interest - March"),
            line("1000", (2026, 3, 31), 0, 42_500, "LOC interest - March"),
        ];

        Self::new(accounts, ledger)
    }
}

/// Largest accepted amount in dollars; anything bigger is rejected
pub const MAX_AMOUNT: f64 = 1_000_000_000_000.0;

/// Parse a money amount (number, or string like "$1,234.50") into cents
pub fn parse_cents(value: &Value) -> Option<i64> {
    let amount = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => {
            let cleaned: String = s.chars().filter(|c| !matches!(c, '$' | ',' | ' ')).collect();
            if cleaned.is_empty() {
                return None;
            }
            cleaned.parse::<f64>().ok()?
        }
        _ => return None,
    };

    (amount.is_finite() && amount.abs() <= MAX_AMOUNT).then(|| (amount * 100.0).round() as i64)
}

pub fn cents_to_amount(cents: i64) -> f64 {
    cents as f64 / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_search_ranks_line_of_credit_interest_first() {
        let books = Books::brokerage_sample();
        let results = books.search("interest on our line of credit");

        assert!(!results.is_empty());
        assert_eq!(results[0].code, "7100");
        assert!(results.iter().any(|a| a.code == "2300"));
    }

    #[test]
    fn test_search_by_code() {
        let books = Books::brokerage_sample();
        let results = books.search("6200");
        assert_eq!(results[0].name, "Office Rent");
    }

    #[test]
    fn test_balances_follow_normal_side() {
        let books = Books::brokerage_sample();
        let cash = books.account("1000").unwrap();
        let income = books.account("4000").unwrap();

        assert_eq!(books.balance_cents(cash), 5_000_000 + 1_800_000 - 350_000 - 42_500);
        assert_eq!(books.balance_cents(income), 1_800_000);
    }

    #[test]
    fn test_parse_cents() {
        assert_eq!(parse_cents(&json!(12.34)), Some(1234));
        assert_eq!(parse_cents(&json!("$1,250.5")), Some(125_050));
        assert_eq!(parse_cents(&json!("")), None);
        assert_eq!(parse_cents(&json!(null)), None);
    }

    #[test]
    fn test_parse_cents_rejects_huge_amounts() {
        assert_eq!(parse_cents(&json!(1e300)), None);
        assert_eq!(parse_cents(&json!("-99999999999999999999")), None);
        assert_eq!(
            parse_cents(&json!(MAX_AMOUNT)),
            Some(100_000_000_000_000)
        );
    }
}
