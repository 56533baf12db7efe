use crate::config::DedupConfig;
use crate::pipeline::ScanOutcome;
use crate::record::FingerprintRecord;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportSummary {
    pub total_images: usize,
    pub duplicate_groups: usize,
    pub threshold: u32,
    pub hash_size: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportGroup {
    pub group_id: usize,
    pub images: Vec<FingerprintRecord>,
}

/// Machine-readable result of a scan.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Report {
    pub summary: ReportSummary,
    pub groups: Vec<ReportGroup>,
}

impl Report {
    pub fn new(outcome: &ScanOutcome, config: &DedupConfig) -> Self {
        Self {
            summary: ReportSummary {
                total_images: outcome.total_images,
                duplicate_groups: outcome.groups.len(),
                threshold: config.threshold,
                hash_size: config.hash_size,
            },
            groups: outcome
                .groups
                .iter()
                .map(|g| ReportGroup {
                    group_id: g.id,
                    images: g.members.clone(),
                })
                .collect(),
        }
    }

    pub fn write_json(&self, path: &Path) -> std::io::Result<()> {
        let mut writer = BufWriter::new(File::create(path)?);
        serde_json::to_writer_pretty(&mut writer, self)?;
        writer.flush()
    }
}

/// Human-readable byte count, e.g. `1.5 MB`.
pub fn format_file_size(size_bytes: u64) -> String {
    let mut size = size_bytes as f64;
    for unit in ["B", "KB", "MB", "GB"] {
        if size < 1024.0 {
            return format!("{:.1} {}", size, unit);
        }
        size /= 1024.0;
    }
    format!("{:.1} TB", size)
}
