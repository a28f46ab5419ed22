//! In-memory context store for development and tests

use super::ContextStore;
use crate::models::{ContextNote, LinkedEntity, NoteCategory, NoteSelector};
use crate::Result;
use chrono::Utc;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

pub struct InMemoryContextStore {
    notes: Arc<RwLock<Vec<ContextNote>>>,
}

impl InMemoryContextStore {
    pub fn new() -> Self {
        Self {
            notes: Arc::new(RwLock::new(Vec::new())),
        }
    }
}

impl Default for InMemoryContextStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl ContextStore for InMemoryContextStore {
    async fn load_notes(&self, category: Option<NoteCategory>) -> Result<Vec<ContextNote>> {
        let notes = self.notes.read().await;
        Ok(notes
            .iter()
            .filter(|n| category.map_or(true, |c| n.category == c))
            .cloned()
            .collect())
    }

    async fn save_note(
        &self,
        category: NoteCategory,
        content: &str,
        linked_entity: Option<LinkedEntity>,
    ) -> Result<Uuid> {
        let note = ContextNote {
            note_id: Uuid::new_v4(),
            category,
            content: content.to_string(),
            linked_entity,
            created_at: Utc::now(),
        };
        let note_id = note.note_id;

        self.notes.write().await.push(note);
        Ok(note_id)
    }

    async fn delete_note(&self, selector: &NoteSelector) -> Result<u64> {
        let mut notes = self.notes.write().await;
        let before = notes.len();

        match selector {
            NoteSelector::Id(id) => notes.retain(|n| n.note_id != *id),
            NoteSelector::TextMatch(text) => {
                let needle = text.to_lowercase();
                notes.retain(|n| !n.content.to_lowercase().contains(&needle));
            }
        }

        Ok((before - notes.len()) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_save_then_load_returns_note_once() {
        let store = InMemoryContextStore::new();
        let text = "Escrow deposits always go to account 1010";

        store
            .save_note(NoteCategory::AccountMapping, text, None)
            .await
            .unwrap();

        let notes = store.load_notes(None).await.unwrap();
        assert_eq!(notes.iter().filter(|n| n.content == text).count(), 1);
    }

    #[tokio::test]
    async fn test_delete_by_id_removes_note() {
        let store = InMemoryContextStore::new();
        let id = store
            .save_note(NoteCategory::Vendor, "Zillow invoices are advertising", None)
            .await
            .unwrap();
        store
            .save_note(NoteCategory::Vendor, "Comcast is software", None)
            .await
            .unwrap();

        assert_eq!(store.delete_note(&NoteSelector::Id(id)).await.unwrap(), 1);

        let notes = store.load_notes(None).await.unwrap();
        assert!(notes.iter().all(|n| n.note_id != id));
        assert_eq!(notes.len(), 1);
    }

    #[tokio::test]
    async fn test_delete_by_text_match_is_case_insensitive() {
        let store = InMemoryContextStore::new();
        store
            .save_note(NoteCategory::Preference, "Round mileage to whole miles", None)
            .await
            .unwrap();

        let deleted = store
            .delete_note(&NoteSelector::TextMatch("MILEAGE".into()))
            .await
            .unwrap();
        assert_eq!(deleted, 1);
        assert!(store.load_notes(None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_category_filter() {
        let store = InMemoryContextStore::new();
        store.save_note(NoteCategory::Vendor, "a", None).await.unwrap();
        store.save_note(NoteCategory::Correction, "b", None).await.unwrap();

        let vendors = store.load_notes(Some(NoteCategory::Vendor)).await.unwrap();
        assert_eq!(vendors.len(), 1);
        assert_eq!(vendors[0].content, "a");
    }
}
