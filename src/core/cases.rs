//! Case persistence.
//!
//! A case is a named conversation. The active case and an index of every
//! case are stored as two JSON documents in a [`KeyValueStore`], always
//! replaced whole. [`CaseService`] is the only writer.

use std::collections::HashMap;
use std::fs;
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Duration, Local, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use tracing::error;

use crate::core::message::ConversationTurn;

pub const CURRENT_CASE_KEY: &str = "verum_omnis_current_case";
pub const CASES_LIST_KEY: &str = "verum_omnis_cases";

const CONTEXT_TURNS: usize = 10;
const CONTEXT_TURN_CHARS: usize = 200;

#[derive(Debug, thiserror::Error)]
pub enum CaseError {
    #[error("failed to write {key}: {source}")]
    Write {
        key: String,
        #[source]
        source: io::Error,
    },
    #[error("failed to read {key}: {source}")]
    Read {
        key: String,
        #[source]
        source: io::Error,
    },
    /// The stored document exists but does not parse. Writes that would
    /// replace it are refused so no other case is lost.
    #[error("{key} is unreadable, leaving it untouched: {source}")]
    Corrupt {
        key: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to encode case data: {0}")]
    Encode(#[from] serde_json::Error),
}

pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> io::Result<Option<String>>;
    fn set(&self, key: &str, value: &str) -> io::Result<()>;
    fn remove(&self, key: &str) -> io::Result<()>;
}

/// One JSON file per key inside a directory.
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> io::Result<Option<String>> {
        match fs::read_to_string(self.path_for(key)) {
            Ok(contents) => Ok(Some(contents)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn set(&self, key: &str, value: &str) -> io::Result<()> {
        fs::create_dir_all(&self.dir)?;
        let mut temp_file = NamedTempFile::new_in(&self.dir)?;
        temp_file.write_all(value.as_bytes())?;
        temp_file.as_file_mut().sync_all()?;
        temp_file
            .persist(self.path_for(key))
            .map_err(|err| err.error)?;
        Ok(())
    }

    fn remove(&self, key: &str) -> io::Result<()> {
        match fs::remove_file(self.path_for(key)) {
            Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e),
            _ => Ok(()),
        }
    }
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn entries(&self) -> std::sync::MutexGuard<'_, HashMap<String, String>> {
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> io::Result<Option<String>> {
        Ok(self.entries().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> io::Result<()> {
        self.entries().insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> io::Result<()> {
        self.entries().remove(key);
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaseRecord {
    pub id: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub messages: Vec<ConversationTurn>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
}

#[derive(Clone)]
pub struct CaseService {
    store: Arc<dyn KeyValueStore>,
}

impl CaseService {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryStore::new()))
    }

    fn read_strict<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, CaseError> {
        let contents = self.store.get(key).map_err(|source| CaseError::Read {
            key: key.to_string(),
            source,
        })?;
        let Some(contents) = contents else {
            return Ok(None);
        };
        serde_json::from_str(&contents)
            .map(Some)
            .map_err(|source| CaseError::Corrupt {
                key: key.to_string(),
                source,
            })
    }

    /// Lenient read for display: unreadable documents are logged and
    /// treated as absent.
    fn read<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.read_strict(key).unwrap_or_else(|e| {
            error!("{e}");
            None
        })
    }

    fn write<T: Serialize>(&self, key: &str, value: &T) -> Result<(), CaseError> {
        let json = serde_json::to_string(value)?;
        self.store.set(key, &json).map_err(|source| CaseError::Write {
            key: key.to_string(),
            source,
        })
    }

    pub fn current_case(&self) -> Option<CaseRecord> {
        self.read(CURRENT_CASE_KEY)
    }

    pub fn all_cases(&self) -> Vec<CaseRecord> {
        self.read(CASES_LIST_KEY).unwrap_or_default()
    }

    /// The index as stored. Every path that rewrites the index goes through
    /// here, so an unreadable index is reported instead of replaced.
    fn indexed_cases(&self) -> Result<Vec<CaseRecord>, CaseError> {
        Ok(self.read_strict(CASES_LIST_KEY)?.unwrap_or_default())
    }

    /// Persist `case` as the active case and mirror it into the index.
    /// `updated_at` always moves forward, even within one clock tick.
    /// Nothing is written if the index cannot be read.
    pub fn save_current_case(&self, case: &mut CaseRecord) -> Result<(), CaseError> {
        let mut cases = self.indexed_cases()?;
        let now = Utc::now();
        case.updated_at = if now > case.updated_at {
            now
        } else {
            case.updated_at + Duration::milliseconds(1)
        };
        match cases.iter_mut().find(|c| c.id == case.id) {
            Some(existing) => *existing = case.clone(),
            None => cases.push(case.clone()),
        }
        self.write(CURRENT_CASE_KEY, case)?;
        self.write(CASES_LIST_KEY, &cases)
    }

    pub fn create_case(&self, name: Option<&str>) -> Result<CaseRecord, CaseError> {
        let now = Utc::now();
        let existing: Vec<String> = self.indexed_cases()?.into_iter().map(|c| c.id).collect();
        let mut millis = now.timestamp_millis();
        let mut id = format!("case_{millis}");
        while existing.contains(&id) {
            millis += 1;
            id = format!("case_{millis}");
        }

        let name = name
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| format!("Case {}", Local::now().format("%Y-%m-%d")));

        let mut case = CaseRecord {
            id,
            name,
            created_at: now,
            updated_at: now,
            messages: Vec::new(),
            summary: None,
        };
        self.save_current_case(&mut case)?;
        Ok(case)
    }

    pub fn clear_current_case(&self) -> Result<(), CaseError> {
        self.store
            .remove(CURRENT_CASE_KEY)
            .map_err(|source| CaseError::Write {
                key: CURRENT_CASE_KEY.to_string(),
                source,
            })
    }

    /// Make the case with `id` active. Returns `None` if it is not indexed.
    pub fn load_case(&self, id: &str) -> Result<Option<CaseRecord>, CaseError> {
        let Some(case) = self.all_cases().into_iter().find(|c| c.id == id) else {
            return Ok(None);
        };
        self.write(CURRENT_CASE_KEY, &case)?;
        Ok(Some(case))
    }

    /// Remove a case from the index, clearing it if it is the active one.
    pub fn delete_case(&self, id: &str) -> Result<bool, CaseError> {
        let mut cases = self.indexed_cases()?;
        let before = cases.len();
        cases.retain(|c| c.id != id);
        let removed = cases.len() != before;
        self.write(CASES_LIST_KEY, &cases)?;

        if self.current_case().is_some_and(|current| current.id == id) {
            self.clear_current_case()?;
        }
        Ok(removed)
    }
}

fn truncate_chars(text: &str, limit: usize) -> String {
    match text.char_indices().nth(limit) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None => text.to_string(),
    }
}

/// Summary of a case prepended to the system instruction for continuity.
/// Empty when the case has no turns with content.
pub fn build_case_context(case: &CaseRecord) -> String {
    let recent: Vec<&ConversationTurn> = case
        .messages
        .iter()
        .filter(|turn| !turn.local_only && turn.has_content())
        .collect();
    if recent.is_empty() {
        return String::new();
    }
    let recent = &recent[recent.len().saturating_sub(CONTEXT_TURNS)..];

    let history = recent
        .iter()
        .enumerate()
        .map(|(idx, turn)| {
            let role = if turn.is_user() { "User" } else { "Verum Omnis" };
            let timestamp = turn
                .timestamp
                .map(|ts| format!(" [{}]", ts.format("%Y-%m-%d %H:%M:%S UTC")))
                .unwrap_or_default();
            format!(
                "{}. {role}{timestamp}: {}",
                idx + 1,
                truncate_chars(&turn.text, CONTEXT_TURN_CHARS)
            )
        })
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        "ONGOING CASE CONTEXT:\n\
         Case Name: {}\n\
         Started: {}\n\
         Total Messages: {}\n\n\
         Recent Conversation History:\n\
         {history}\n\n\
         Continue the analysis based on this ongoing case context.",
        case.name,
        case.created_at.format("%Y-%m-%d %H:%M:%S UTC"),
        case.messages.len(),
    )
}
