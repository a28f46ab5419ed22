//! Remembered context
//!
//! Durable notes that seed the system instruction of every run. The agent
//! loop only reads them (once, at the start of a run); writes and deletes
//! happen through the remember/forget tools.

use crate::models::{ContextNote, LinkedEntity, NoteCategory, NoteSelector};
use crate::Result;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

pub mod memory;
pub mod postgres;

pub use memory::InMemoryContextStore;
pub use postgres::PostgresContextStore;

/// Trait for note persistence
#[async_trait::async_trait]
pub trait ContextStore: Send + Sync {
    /// Notes ordered oldest first
    async fn load_notes(&self, category: Option<NoteCategory>) -> Result<Vec<ContextNote>>;

    async fn save_note(
        &self,
        category: NoteCategory,
        content: &str,
        linked_entity: Option<LinkedEntity>,
    ) -> Result<Uuid>;

    /// Returns how many notes were removed
    async fn delete_note(&self, selector: &NoteSelector) -> Result<u64>;
}

/// Read notes for a run. A failing store degrades to no remembered context.
pub async fn load_remembered_context(
    store: &dyn ContextStore,
    category: Option<NoteCategory>,
) -> Vec<ContextNote> {
    match store.load_notes(category).await {
        Ok(notes) => notes,
        Err(error) => {
            warn!(
                "Remembered context unavailable, continuing without it: {}",
                error
            );
            Vec::new()
        }
    }
}

/// Postgres when a database URL is configured, in-memory otherwise
pub fn build_context_store(database_url: Option<&str>) -> Arc<dyn ContextStore> {
    if let Some(url) = database_url {
        match PostgresContextStore::connect_lazy(url) {
            Ok(store) => {
                info!("Context store backend: postgres");
                return Arc::new(store);
            }
            Err(error) => {
                warn!(
                    "Failed to initialize postgres context store, falling back to in-memory: {}",
                    error
                );
            }
        }
    }

    info!("Context store backend: in-memory");
    Arc::new(InMemoryContextStore::new())
}
