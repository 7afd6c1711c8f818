use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use log::{debug, info, warn};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::mailbox::InboxMessage;

/// One handled message as stored on disk
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessedRecord {
    pub message_id: String,
    pub processed_at: DateTime<Utc>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct HistoryFile {
    #[serde(default)]
    processed: Vec<ProcessedRecord>,
    /// Bare id list written by earlier versions of the agent
    #[serde(default, skip_serializing)]
    processed_ids: Vec<String>,
    #[serde(default, deserialize_with = "lenient_timestamp")]
    last_updated: Option<DateTime<Utc>>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawTimestamp {
    Epoch(f64),
    Text(String),
    Other(serde::de::IgnoredAny),
}

/// Accepts RFC 3339, naive ISO 8601 (taken as UTC) or epoch seconds.
/// Anything else reads as `None` instead of rejecting the whole file.
fn lenient_timestamp<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let parsed = match Option::<RawTimestamp>::deserialize(deserializer)? {
        Some(RawTimestamp::Epoch(secs)) if secs.is_finite() => {
            DateTime::from_timestamp(secs.trunc() as i64, (secs.fract() * 1e9) as u32)
        }
        Some(RawTimestamp::Text(text)) => DateTime::parse_from_rfc3339(&text)
            .map(|dt| dt.with_timezone(&Utc))
            .ok()
            .or_else(|| {
                NaiveDateTime::parse_from_str(&text, "%Y-%m-%dT%H:%M:%S%.f")
                    .ok()
                    .map(|naive| Utc.from_utc_datetime(&naive))
            }),
        _ => None,
    };
    Ok(parsed)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackerStats {
    pub total_processed: usize,
    pub history_file_exists: bool,
    pub last_updated: Option<DateTime<Utc>>,
}

/// Set of message ids already handled, persisted across runs.
///
/// Owned by the orchestration loop; there is exactly one writer. Every
/// `persist` goes through a temporary file in the same directory which is
/// renamed over the store, so a crash mid-write keeps the previous history.
#[derive(Debug)]
pub struct ProcessingTracker {
    path: PathBuf,
    processed: HashMap<String, DateTime<Utc>>,
    dirty: bool,
}

impl ProcessingTracker {
    /// Load the history at `path`. A missing or unreadable store yields an
    /// empty tracker: losing history means duplicate replies at worst.
    pub fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();

        let mut dirty = false;
        let processed = match read_history(&path) {
            Ok(Some(history)) => {
                let mut map: HashMap<_, _> = history
                    .processed
                    .into_iter()
                    .map(|record| (record.message_id, record.processed_at))
                    .collect();

                if !history.processed_ids.is_empty() {
                    let imported_at = Utc::now();
                    let before = map.len();
                    for id in history.processed_ids {
                        map.entry(id).or_insert(imported_at);
                    }
                    info!(
                        "Imported {} id(s) from the legacy processed_ids list",
                        map.len() - before
                    );
                    // Rewritten in the current layout on the next flush
                    dirty = true;
                }

                info!("📂 Loaded {} processed message id(s) from {}", map.len(), path.display());
                map
            }
            Ok(None) => {
                info!("No processing history at {}, starting empty", path.display());
                HashMap::new()
            }
            Err(e) => {
                warn!("⚠️  Could not load processing history from {}: {:#} - starting empty", path.display(), e);
                HashMap::new()
            }
        };

        ProcessingTracker {
            path,
            processed,
            dirty,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn len(&self) -> usize {
        self.processed.len()
    }

    pub fn is_empty(&self) -> bool {
        self.processed.is_empty()
    }

    pub fn has_unsaved_changes(&self) -> bool {
        self.dirty
    }

    pub fn contains(&self, message_id: &str) -> bool {
        self.processed.contains_key(message_id)
    }

    /// Record `message_id`. Returns false when it was already tracked.
    pub fn mark_processed(&mut self, message_id: &str) -> bool {
        if self.processed.contains_key(message_id) {
            debug!("Message {} already tracked", message_id);
            return false;
        }
        self.processed.insert(message_id.to_string(), Utc::now());
        self.dirty = true;
        true
    }

    /// Keep only the messages not handled yet, in their original order
    pub fn filter_new(&self, messages: Vec<InboxMessage>) -> Vec<InboxMessage> {
        messages
            .into_iter()
            .filter(|message| !self.contains(&message.id))
            .collect()
    }

    pub fn persist(&mut self) -> Result<()> {
        let mut records: Vec<ProcessedRecord> = self
            .processed
            .iter()
            .map(|(id, at)| ProcessedRecord {
                message_id: id.clone(),
                processed_at: *at,
            })
            .collect();
        records.sort_by(|a, b| {
            a.processed_at
                .cmp(&b.processed_at)
                .then_with(|| a.message_id.cmp(&b.message_id))
        });

        let history = HistoryFile {
            processed: records,
            processed_ids: Vec::new(),
            last_updated: Some(Utc::now()),
        };

        write_atomically(&self.path, &history)?;
        self.dirty = false;

        debug!("Saved {} processed message id(s) to {}", self.len(), self.path.display());
        Ok(())
    }

    /// Forget every tracked id and persist the empty history
    pub fn clear(&mut self) -> Result<()> {
        self.processed.clear();
        self.dirty = true;
        self.persist()?;
        info!("🧹 Cleared processed messages history");
        Ok(())
    }

    pub fn stats(&self) -> TrackerStats {
        let history_file_exists = self.path.exists();
        let last_updated = if history_file_exists {
            match read_history(&self.path) {
                Ok(history) => history.and_then(|h| h.last_updated),
                Err(e) => {
                    warn!("Unable to read history file for stats: {:#}", e);
                    None
                }
            }
        } else {
            None
        };

        TrackerStats {
            total_processed: self.len(),
            history_file_exists,
            last_updated,
        }
    }
}

fn read_history(path: &Path) -> Result<Option<HistoryFile>> {
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e).context("Unable to read history file"),
    };

    let history = serde_json::from_str(&content).context("History file is not valid JSON")?;
    Ok(Some(history))
}

fn write_atomically(path: &Path, history: &HistoryFile) -> Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    std::fs::create_dir_all(&dir)
        .with_context(|| format!("Unable to create directory {}", dir.display()))?;

    // Removed on drop unless persisted, so early returns leave no stray file
    let mut tmp = tempfile::NamedTempFile::new_in(&dir)
        .context("Unable to create temporary history file")?;

    serde_json::to_writer_pretty(&mut tmp, history).context("Unable to serialize history")?;
    tmp.flush().context("Unable to flush history file")?;
    tmp.as_file()
        .sync_all()
        .context("Unable to sync history file")?;

    tmp.persist(path)
        .map_err(|e| e.error)
        .with_context(|| format!("Unable to replace {}", path.display()))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mark_processed_is_idempotent_in_memory() {
        let dir = tempfile::tempdir().unwrap();
        let mut tracker = ProcessingTracker::load(dir.path().join("history.json"));

        assert!(tracker.mark_processed("a"));
        let first = tracker.processed["a"];
        assert!(!tracker.mark_processed("a"));
        assert_eq!(tracker.processed["a"], first);
        assert_eq!(tracker.len(), 1);
    }

    #[test]
    fn test_persist_leaves_no_temporary_files() {
        let dir = tempfile::tempdir().unwrap();
        let mut tracker = ProcessingTracker::load(dir.path().join("history.json"));
        tracker.mark_processed("a");
        tracker.persist().unwrap();
        tracker.persist().unwrap();

        let entries: Vec<_> = std::fs::read_dir(dir.path()).unwrap().collect();
        assert_eq!(entries.len(), 1);
        assert!(!tracker.has_unsaved_changes());
    }

    #[test]
    fn test_persist_creates_parent_directory() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state").join("history.json");
        let mut tracker = ProcessingTracker::load(&path);
        tracker.mark_processed("a");
        tracker.persist().unwrap();
        assert!(path.exists());
    }

    #[test]
    fn test_last_updated_accepts_epoch_seconds_and_junk() {
        let history: HistoryFile =
            serde_json::from_str(r#"{"processed_ids": ["x"], "last_updated": 1714557600.5}"#).unwrap();
        assert_eq!(history.processed_ids, vec!["x".to_string()]);
        assert_eq!(
            history.last_updated.map(|at| at.timestamp_millis()),
            Some(1_714_557_600_500)
        );

        let history: HistoryFile =
            serde_json::from_str(r#"{"processed": [], "last_updated": "yesterday"}"#).unwrap();
        assert!(history.last_updated.is_none());

        let history: HistoryFile = serde_json::from_str(r#"{"last_updated": null}"#).unwrap();
        assert!(history.last_updated.is_none());
    }
}
