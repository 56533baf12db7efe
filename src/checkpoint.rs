//! Durable scan progress.
//!
//! A checkpoint is one JSON document holding every record fingerprinted so
//! far, the set of paths already attempted and the settings the records were
//! produced under. Loading never fails: anything unreadable, malformed or
//! produced under different settings is discarded and the scan starts clean.

use crate::config::CheckpointConfig;
use crate::error::CheckpointError;
use crate::record::FingerprintRecord;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

/// In-memory progress of a scan.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CheckpointState {
    pub records: Vec<FingerprintRecord>,
    /// Every path attempted, including ones that failed to fingerprint.
    pub processed: HashSet<String>,
}

impl CheckpointState {
    pub fn is_empty(&self) -> bool {
        self.records.is_empty() && self.processed.is_empty()
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct CheckpointDocument {
    timestamp: String,
    config: CheckpointConfig,
    processed_files: Vec<String>,
    records: Vec<FingerprintRecord>,
}

/// Metadata of a checkpoint on disk, read without config validation.
#[derive(Debug, Clone, PartialEq)]
pub struct CheckpointSummary {
    pub saved_at: DateTime<Utc>,
    pub config: CheckpointConfig,
    pub processed_files: usize,
    pub records: usize,
}

pub struct CheckpointStore {
    path: PathBuf,
}

impl CheckpointStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Load saved progress, or an empty state if there is nothing usable.
    pub fn load(&self, expected: &CheckpointConfig) -> CheckpointState {
        if !self.path.exists() {
            log::debug!("No checkpoint at {}", self.path.display());
            return CheckpointState::default();
        }

        let document = match self.read_document() {
            Ok(document) => document,
            Err(reason) => {
                log::warn!(
                    "Failed to load checkpoint {}: {}. Starting fresh.",
                    self.path.display(),
                    reason
                );
                return CheckpointState::default();
            }
        };

        if document.config != *expected {
            log::warn!(
                "Checkpoint config mismatch ({:?} saved, {:?} requested). Starting fresh.",
                document.config,
                expected
            );
            return CheckpointState::default();
        }

        let processed: HashSet<String> = document.processed_files.into_iter().collect();
        log::info!(
            "Resumed from checkpoint: {} files already processed (saved {})",
            processed.len(),
            document.timestamp
        );

        CheckpointState {
            records: document.records,
            processed,
        }
    }

    /// Write `state` so that an interrupted write never yields a document
    /// that loads with partial records.
    pub fn save(
        &self,
        state: &CheckpointState,
        config: &CheckpointConfig,
    ) -> Result<(), CheckpointError> {
        let mut processed_files: Vec<String> = state.processed.iter().cloned().collect();
        processed_files.sort();

        let document = CheckpointDocument {
            timestamp: Utc::now().to_rfc3339(),
            config: *config,
            processed_files,
            records: state.records.clone(),
        };

        let tmp_path = self.tmp_path();
        {
            let file = File::create(&tmp_path)?;
            let mut writer = BufWriter::new(file);
            serde_json::to_writer_pretty(&mut writer, &document)?;
            writer.flush()?;
            writer.get_ref().sync_all()?;
        }
        fs::rename(&tmp_path, &self.path)?;

        log::debug!(
            "Checkpoint saved: {} files processed",
            document.processed_files.len()
        );
        Ok(())
    }

    /// Remove the checkpoint. Failures are logged, not returned.
    pub fn clear(&self) {
        if !self.path.exists() {
            return;
        }
        match fs::remove_file(&self.path) {
            Ok(()) => log::debug!("Checkpoint file removed"),
            Err(e) => log::warn!(
                "Failed to remove checkpoint {}: {}",
                self.path.display(),
                e
            ),
        }
    }

    pub fn inspect(&self) -> Result<CheckpointSummary, CheckpointError> {
        let document = self.read_document()?;
        let saved_at = parse_timestamp(&document.timestamp).ok_or_else(|| {
            CheckpointError::Invalid {
                message: format!("invalid timestamp {:?}", document.timestamp),
            }
        })?;

        Ok(CheckpointSummary {
            saved_at,
            config: document.config,
            processed_files: document.processed_files.len(),
            records: document.records.len(),
        })
    }

    fn read_document(&self) -> Result<CheckpointDocument, CheckpointError> {
        let file = File::open(&self.path)?;
        let document: CheckpointDocument = serde_json::from_reader(BufReader::new(file))?;

        if parse_timestamp(&document.timestamp).is_none() {
            return Err(CheckpointError::Invalid {
                message: format!("invalid timestamp {:?}", document.timestamp),
            });
        }

        // A record must never be trusted without its path in the processed set.
        let processed: HashSet<&str> = document
            .processed_files
            .iter()
            .map(String::as_str)
            .collect();
        if let Some(orphan) = document
            .records
            .iter()
            .find(|r| !processed.contains(r.path.as_str()))
        {
            return Err(CheckpointError::Invalid {
                message: format!("record {} is not marked as processed", orphan.path),
            });
        }

        let mut seen: HashSet<&str> = HashSet::with_capacity(document.records.len());
        if let Some(dup) = document.records.iter().find(|r| !seen.insert(r.path.as_str())) {
            return Err(CheckpointError::Invalid {
                message: format!("record {} appears more than once", dup.path),
            });
        }

        let expected_bits = (document.config.hash_size * document.config.hash_size) as usize;
        if let Some(bad) = document.records.iter().find(|r| {
            r.hashes
                .all()
                .iter()
                .any(|h| h.bit_len() != expected_bits)
        }) {
            return Err(CheckpointError::Invalid {
                message: format!("record {} has fingerprints of the wrong width", bad.path),
            });
        }

        Ok(document)
    }

    fn tmp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{Fingerprint, OrientationHashes};
    use tempfile::TempDir;

    fn config(threshold: u32) -> CheckpointConfig {
        CheckpointConfig {
            threshold,
            hash_size: 8,
            min_resolution: 100,
        }
    }

    fn record(path: &str, hash: u64) -> FingerprintRecord {
        FingerprintRecord::new(
            path,
            800,
            600,
            50_000,
            "JPEG",
            OrientationHashes {
                rot0: Fingerprint::from_u64(hash),
                rot90: Fingerprint::from_u64(hash.rotate_left(1)),
                rot180: Fingerprint::from_u64(hash.rotate_left(2)),
                rot270: Fingerprint::from_u64(hash.rotate_left(3)),
            },
        )
        .with_bit_depth(Some(24))
        .with_exif(true)
    }

    fn sample_state() -> CheckpointState {
        let mut state = CheckpointState::default();
        state.records.push(record("test1.jpg", 0xabc123));
        state.records.push(record("test2.jpg", 0xdef456));
        state.processed.insert("test1.jpg".to_string());
        state.processed.insert("test2.jpg".to_string());
        // attempted but failed to fingerprint
        state.processed.insert("broken.jpg".to_string());
        state
    }

    #[test]
    fn test_save_then_load_roundtrip() {
        let temp_dir = TempDir::new().unwrap();
        let store = CheckpointStore::new(temp_dir.path().join("checkpoint.json"));
        let state = sample_state();

        store.save(&state, &config(10)).unwrap();
        assert!(store.exists());

        let loaded = store.load(&config(10));
        assert_eq!(loaded.processed, state.processed);
        assert_eq!(loaded.records, state.records);
    }

    #[test]
    fn test_save_leaves_no_temp_file() {
        let temp_dir = TempDir::new().unwrap();
        let store = CheckpointStore::new(temp_dir.path().join("checkpoint.json"));
        store.save(&sample_state(), &config(10)).unwrap();

        let names: Vec<String> = fs::read_dir(temp_dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["checkpoint.json".to_string()]);
    }

    #[test]
    fn test_config_mismatch_yields_empty_state() {
        let temp_dir = TempDir::new().unwrap();
        let store = CheckpointStore::new(temp_dir.path().join("checkpoint.json"));
        store.save(&sample_state(), &config(10)).unwrap();

        let loaded = store.load(&config(15));
        assert!(loaded.is_empty());

        let other_min_res = CheckpointConfig {
            min_resolution: 50,
            ..config(10)
        };
        assert!(store.load(&other_min_res).is_empty());
    }

    #[test]
    fn test_missing_file_yields_empty_state() {
        let temp_dir = TempDir::new().unwrap();
        let store = CheckpointStore::new(temp_dir.path().join("nope.json"));
        assert!(store.load(&config(10)).is_empty());
    }

    #[test]
    fn test_corrupt_file_yields_empty_state() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("checkpoint.json");
        fs::write(&path, b"{\"timestamp\": \"2024-01-01T00:00:00Z\", \"proc").unwrap();

        let store = CheckpointStore::new(&path);
        assert!(store.load(&config(10)).is_empty());
    }

    #[test]
    fn test_loosely_typed_record_rejects_whole_document() {
        let temp_dir = TempDir::new().unwrap();
        let store = CheckpointStore::new(temp_dir.path().join("checkpoint.json"));
        store.save(&sample_state(), &config(10)).unwrap();

        let mut value: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(store.path()).unwrap()).unwrap();
        value["records"][1]["width"] = serde_json::json!("wide");
        fs::write(store.path(), serde_json::to_string(&value).unwrap()).unwrap();

        assert!(store.load(&config(10)).is_empty());
    }

    #[test]
    fn test_unknown_field_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let store = CheckpointStore::new(temp_dir.path().join("checkpoint.json"));
        store.save(&sample_state(), &config(10)).unwrap();

        let mut value: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(store.path()).unwrap()).unwrap();
        value["records"][0]["phash_45"] = serde_json::json!("00");
        fs::write(store.path(), serde_json::to_string(&value).unwrap()).unwrap();

        assert!(store.load(&config(10)).is_empty());
    }

    #[test]
    fn test_bad_fingerprint_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let store = CheckpointStore::new(temp_dir.path().join("checkpoint.json"));
        store.save(&sample_state(), &config(10)).unwrap();

        let mut value: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(store.path()).unwrap()).unwrap();
        value["records"][0]["hashes"]["rot90"] = serde_json::json!("xyz");
        fs::write(store.path(), serde_json::to_string(&value).unwrap()).unwrap();
        assert!(store.load(&config(10)).is_empty());

        value["records"][0]["hashes"]["rot90"] = serde_json::json!("abcd");
        fs::write(store.path(), serde_json::to_string(&value).unwrap()).unwrap();
        assert!(store.load(&config(10)).is_empty());
    }

    #[test]
    fn test_orphan_record_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let store = CheckpointStore::new(temp_dir.path().join("checkpoint.json"));
        let mut state = sample_state();
        state.processed.remove("test2.jpg");
        store.save(&state, &config(10)).unwrap();

        assert!(store.load(&config(10)).is_empty());
    }

    #[test]
    fn test_duplicate_record_path_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let store = CheckpointStore::new(temp_dir.path().join("checkpoint.json"));
        let mut state = CheckpointState::default();
        state.records.push(record("same.jpg", 0xabc123));
        state.records.push(record("same.jpg", 0xabc123));
        state.processed.insert("same.jpg".to_string());
        store.save(&state, &config(10)).unwrap();

        assert!(store.load(&config(10)).is_empty());
        assert!(matches!(
            store.inspect(),
            Err(CheckpointError::Invalid { .. })
        ));
    }

    #[test]
    fn test_clear_removes_file() {
        let temp_dir = TempDir::new().unwrap();
        let store = CheckpointStore::new(temp_dir.path().join("checkpoint.json"));
        store.save(&sample_state(), &config(10)).unwrap();

        store.clear();
        assert!(!store.exists());
        // clearing twice is harmless
        store.clear();
    }

    #[test]
    fn test_inspect_reports_counts() {
        let temp_dir = TempDir::new().unwrap();
        let store = CheckpointStore::new(temp_dir.path().join("checkpoint.json"));
        store.save(&sample_state(), &config(12)).unwrap();

        let summary = store.inspect().unwrap();
        assert_eq!(summary.config, config(12));
        assert_eq!(summary.processed_files, 3);
        assert_eq!(summary.records, 2);
    }
}
