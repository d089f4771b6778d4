use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::cache::{load_json, save_json, KeyValueStore, StoreError};

pub const NOTES_KEY: &str = "parikrama_notes";

const UNTITLED: &str = "Untitled";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Note {
  pub id: String,
  pub title: String,
  pub body: String,
  #[serde(rename = "createdAt")]
  pub created_at: String,
}

#[derive(Debug, thiserror::Error)]
pub enum NoteError {
  #[error("a note needs a title or a body")]
  Empty,
  #[error("no note with id {0}")]
  NotFound(String),
  #[error(transparent)]
  Store(#[from] StoreError),
}

/// Personal notes, newest first, stored as one JSON list.
pub struct Notebook<S> {
  storage: Arc<S>,
}

impl<S: KeyValueStore> Notebook<S> {
  pub fn new(storage: Arc<S>) -> Self {
    Self { storage }
  }

  /// All notes; an unreadable list reads as empty.
  pub fn list(&self) -> Vec<Note> {
    load_json(self.storage.as_ref(), NOTES_KEY, Vec::new())
  }

  /// Add a note at the top of the list.
  pub fn add(&self, title: &str, body: &str) -> Result<Note, NoteError> {
    let title = normalize(title, body)?;
    let mut notes = self.list();

    let mut id = Utc::now().timestamp_millis();
    while notes.iter().any(|n| n.id == id.to_string()) {
      id += 1;
    }

    let note = Note {
      id: id.to_string(),
      title,
      body: body.to_string(),
      created_at: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
    };
    notes.insert(0, note.clone());
    save_json(self.storage.as_ref(), NOTES_KEY, &notes)?;

    tracing::debug!(id = %note.id, "added note");
    Ok(note)
  }

  /// Replace the title and body of an existing note.
  pub fn edit(&self, id: &str, title: &str, body: &str) -> Result<Note, NoteError> {
    let title = normalize(title, body)?;
    let mut notes = self.list();

    let note = notes
      .iter_mut()
      .find(|n| n.id == id)
      .ok_or_else(|| NoteError::NotFound(id.to_string()))?;
    note.title = title;
    note.body = body.to_string();
    let updated = note.clone();

    save_json(self.storage.as_ref(), NOTES_KEY, &notes)?;
    Ok(updated)
  }

  pub fn delete(&self, id: &str) -> Result<(), NoteError> {
    let mut notes = self.list();
    let before = notes.len();
    notes.retain(|n| n.id != id);
    if notes.len() == before {
      return Err(NoteError::NotFound(id.to_string()));
    }

    save_json(self.storage.as_ref(), NOTES_KEY, &notes)?;
    Ok(())
  }
}

/// Trimmed title, `Untitled` when only a body was given.
fn normalize(title: &str, body: &str) -> Result<String, NoteError> {
  let title = title.trim();
  if title.is_empty() && body.trim().is_empty() {
    return Err(NoteError::Empty);
  }
  Ok(if title.is_empty() { UNTITLED } else { title }.to_string())
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::cache::SqliteStorage;

  fn notebook() -> Notebook<SqliteStorage> {
    Notebook::new(Arc::new(SqliteStorage::open_in_memory().unwrap()))
  }

  #[test]
  fn test_add_puts_newest_first() {
    let notes = notebook();
    let first = notes.add("Pandals", "College Square first").unwrap();
    let second = notes.add("  Food  ", "").unwrap();

    let listed = notes.list();
    assert_eq!(listed, vec![second.clone(), first]);
    assert_eq!(second.title, "Food");
  }

  #[test]
  fn test_add_rejects_empty_note() {
    let notes = notebook();
    assert!(matches!(notes.add("  ", "\n"), Err(NoteError::Empty)));
    assert!(notes.list().is_empty());
  }

  #[test]
  fn test_body_only_note_is_untitled() {
    let notes = notebook();
    let note = notes.add("", "Carry water").unwrap();
    assert_eq!(note.title, "Untitled");
  }

  #[test]
  fn test_ids_are_unique() {
    let notes = notebook();
    let a = notes.add("a", "").unwrap();
    let b = notes.add("b", "").unwrap();
    assert_ne!(a.id, b.id);
  }

  #[test]
  fn test_edit_and_delete() {
    let notes = notebook();
    let note = notes.add("Pandals", "").unwrap();

    let edited = notes.edit(&note.id, "Pandal list", "Bagbazar").unwrap();
    assert_eq!(edited.created_at, note.created_at);
    assert_eq!(notes.list(), vec![edited]);

    notes.delete(&note.id).unwrap();
    assert!(notes.list().is_empty());
  }

  #[test]
  fn test_unknown_id() {
    let notes = notebook();
    assert!(matches!(notes.edit("42", "x", ""), Err(NoteError::NotFound(_))));
    assert!(matches!(notes.delete("42"), Err(NoteError::NotFound(_))));
  }

  #[test]
  fn test_corrupt_list_reads_as_empty() {
    let storage = Arc::new(SqliteStorage::open_in_memory().unwrap());
    storage.set(NOTES_KEY, "{broken").unwrap();
    let notes = Notebook::new(storage);
    assert!(notes.list().is_empty());
  }
}
