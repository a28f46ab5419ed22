//! Back-Office Assistant
//!
//! Tool-calling assistants for a real-estate brokerage back office:
//! - Bookkeeping: categorizes transactions and drafts balanced journal entries
//! - Financial analysis: answers questions about balances and activity
//!
//! Both run the same conversation loop against a remote model provider,
//! with rate-limit retries, an iteration ceiling, and remembered context
//! that seeds every run.
//!
//! UNIFIED LOOP:
//! QUERY → PROVIDER → TOOLS → PROVIDER ... → ANSWER + ARTIFACTS

pub mod agent;
pub mod api;
pub mod config;
pub mod context;
pub mod error;
pub mod models;
pub mod provider;
pub mod retry;
pub mod tools;

pub use error::Result;

// Re-export common types
pub use models::*;
pub use agent::{Agent, LoopSettings};
