//! Recognition history.
//!
//! Every completed recognition is appended to `recognitions.json` in the
//! data directory. The log is advisory: failures are logged and
//! swallowed, a recognition never fails because history could not be
//! written.

use crate::fields::FieldMap;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use uuid::Uuid;

const HISTORY_FILE: &str = "recognitions.json";
const SNIPPET_LEN: usize = 400;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub file_path: PathBuf,
    pub fields_used: Vec<String>,
    /// Head of the recognized text, enough to identify the document
    pub ocr_text_snippet: String,
    #[serde(skip_deserializing, default = "FieldMap::new")]
    pub fields: FieldMap,
}

pub struct HistoryLog {
    path: PathBuf,
}

impl HistoryLog {
    pub fn new(data_dir: &Path) -> Self {
        Self {
            path: data_dir.join(HISTORY_FILE),
        }
    }

    /// Append one recognition outcome. Any I/O or serialization problem
    /// is logged and dropped.
    pub async fn record(
        &self,
        file_path: &Path,
        fields_used: &[String],
        text: &str,
        fields: &FieldMap,
    ) {
        let entry = HistoryEntry {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            file_path: file_path.to_path_buf(),
            fields_used: fields_used.to_vec(),
            ocr_text_snippet: text.chars().take(SNIPPET_LEN).collect(),
            fields: fields.clone(),
        };

        if let Err(e) = self.append(entry).await {
            tracing::warn!("[History] Failed to record recognition: {}", e);
        }
    }

    async fn append(&self, entry: HistoryEntry) -> Result<(), String> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| format!("create {}: {}", parent.display(), e))?;
        }

        // A corrupt or missing log restarts empty rather than blocking
        let mut entries: Vec<serde_json::Value> = match tokio::fs::read_to_string(&self.path).await
        {
            Ok(raw) => serde_json::from_str(raw.trim()).unwrap_or_default(),
            Err(_) => Vec::new(),
        };

        let value =
            serde_json::to_value(&entry).map_err(|e| format!("serialize entry: {}", e))?;
        entries.push(value);

        let serialized = serde_json::to_string_pretty(&entries)
            .map_err(|e| format!("serialize history: {}", e))?;

        // Write-then-rename keeps the log whole if we die mid-write
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, serialized)
            .await
            .map_err(|e| format!("write {}: {}", tmp.display(), e))?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .map_err(|e| format!("rename {}: {}", self.path.display(), e))?;

        Ok(())
    }

    /// Load all recorded entries, oldest first.
    pub async fn load(&self) -> Vec<serde_json::Value> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(raw) => serde_json::from_str(raw.trim()).unwrap_or_default(),
            Err(_) => Vec::new(),
        }
    }
}
