// Bounded, persisted log of past analyses. Best effort: the in-memory list
// stays authoritative even when the write-through to disk fails.
use std::{fs, path::PathBuf};

use anyhow::Context;
use chrono::Utc;
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};

use crate::analyzer::Analysis;

pub const HISTORY_CAP: usize = 50;
const ERROR_PREFIX_CHARS: usize = 100;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryRecord {
    pub id: i64,
    pub error: String,
    pub timestamp: String,
    pub explanation: Analysis,
}

pub struct HistoryStore {
    path: PathBuf,
    items: Vec<HistoryRecord>,
    last_id: i64,
}

impl HistoryStore {
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            items: Vec::new(),
            last_id: 0,
        }
    }

    pub fn default_path() -> anyhow::Result<PathBuf> {
        let proj = ProjectDirs::from("com", "errsight", "errsight")
            .context("no home directory for history storage")?;
        Ok(proj.data_dir().join("history.json"))
    }

    /// Replace in-memory state from disk. Missing or corrupt data falls back
    /// to an empty list rather than failing the caller.
    pub fn load(&mut self) {
        self.items = fs::read_to_string(&self.path)
            .ok()
            .and_then(|s| serde_json::from_str(&s).ok())
            .unwrap_or_default();
        self.items.truncate(HISTORY_CAP);
        self.last_id = self.items.first().map(|r| r.id).unwrap_or(0);
    }

    pub fn append(&mut self, error_text: &str, analysis: Analysis) -> HistoryRecord {
        let now = Utc::now();
        // Keep ids non-decreasing even if the clock steps backwards.
        let id = now.timestamp_millis().max(self.last_id);
        self.last_id = id;
        let record = HistoryRecord {
            id,
            error: error_text.chars().take(ERROR_PREFIX_CHARS).collect(),
            timestamp: now.to_rfc3339(),
            explanation: analysis,
        };
        self.items.insert(0, record.clone());
        self.items.truncate(HISTORY_CAP);
        self.save();
        record
    }

    /// Newest first.
    pub fn list(&self) -> &[HistoryRecord] {
        &self.items
    }

    pub fn clear(&mut self) {
        self.items.clear();
        self.save();
    }

    fn save(&self) {
        if let Some(dir) = self.path.parent() {
            let _ = fs::create_dir_all(dir);
        }
        match serde_json::to_string_pretty(&self.items) {
            Ok(json) => {
                if let Err(e) = fs::write(&self.path, json) {
                    tracing::warn!("failed to persist history to {}: {e}", self.path.display());
                }
            }
            Err(e) => tracing::warn!("failed to serialize history: {e}"),
        }
    }
}
