//! Project note storage.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use paperstack_core::error::Result;

/// A note saved against a project, optionally tied to a paper.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Note {
    pub id: String,
    pub project_id: String,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub paper_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Note {
    pub fn new(
        project_id: impl Into<String>,
        content: impl Into<String>,
        paper_id: Option<String>,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            project_id: project_id.into(),
            content: content.into(),
            paper_id,
            created_at: Utc::now(),
        }
    }
}

/// Storage boundary for notes.
#[async_trait]
pub trait NoteStore: Send + Sync {
    /// Persist a note and return its id.
    async fn save(&self, note: Note) -> Result<String>;

    /// All notes for a project, oldest first.
    async fn list(&self, project_id: &str) -> Result<Vec<Note>>;
}

/// Append-only in-memory note store.
#[derive(Default)]
pub struct InMemoryNoteStore {
    notes: RwLock<Vec<Note>>,
}

impl InMemoryNoteStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl NoteStore for InMemoryNoteStore {
    async fn save(&self, note: Note) -> Result<String> {
        let id = note.id.clone();
        self.notes.write().await.push(note);
        Ok(id)
    }

    async fn list(&self, project_id: &str) -> Result<Vec<Note>> {
        Ok(self
            .notes
            .read()
            .await
            .iter()
            .filter(|n| n.project_id == project_id)
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn save_and_list() {
        let store = InMemoryNoteStore::new();
        let note = Note::new("proj-1", "Compare with the 2602.11047 baseline", None);
        let id = store.save(note.clone()).await.unwrap();
        assert_eq!(id, note.id);

        let notes = store.list("proj-1").await.unwrap();
        assert_eq!(notes.len(), 1);
        assert_eq!(notes[0].content, "Compare with the 2602.11047 baseline");
    }

    #[tokio::test]
    async fn list_filters_by_project() {
        let store = InMemoryNoteStore::new();
        store.save(Note::new("proj-1", "a", None)).await.unwrap();
        store
            .save(Note::new("proj-2", "b", Some("2601.03112".into())))
            .await
            .unwrap();

        assert_eq!(store.list("proj-1").await.unwrap().len(), 1);
        let proj2 = store.list("proj-2").await.unwrap();
        assert_eq!(proj2.len(), 1);
        assert_eq!(proj2[0].paper_id.as_deref(), Some("2601.03112"));
    }

    #[tokio::test]
    async fn empty_project_lists_nothing() {
        let store = InMemoryNoteStore::new();
        assert!(store.list("proj-x").await.unwrap().is_empty());
    }
}
