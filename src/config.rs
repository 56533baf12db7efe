use crate::error::DedupError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const SUPPORTED_HASH_SIZES: [u32; 3] = [8, 16, 32];
pub const DEFAULT_CHECKPOINT_NAME: &str = ".dedup_checkpoint.json";

/// Settings for one deduplication run.
///
/// Threshold guidance for `hash_size = 8`: 0-5 near-identical, 6-10 very
/// similar, 11-15 similar with more variation, 16+ likely different. Scale by
/// roughly 4x for `hash_size = 16`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DedupConfig {
    /// Maximum rotation-invariant Hamming distance for a match.
    pub threshold: u32,
    pub hash_size: u32,
    /// Images whose smaller side is below this are skipped.
    pub min_resolution: u32,
    pub use_ssim: bool,
    pub ssim_threshold: f64,
    /// Matches with a distance above this are refined with SSIM.
    /// `None` means `threshold / 2`.
    pub refine_cutoff: Option<u32>,
    pub aspect_tolerance: f64,
    pub checkpoint_interval: usize,
    pub resume: bool,
    pub checkpoint_file: Option<PathBuf>,
}

impl Default for DedupConfig {
    fn default() -> Self {
        Self {
            threshold: 10,
            hash_size: 8,
            min_resolution: 100,
            use_ssim: false,
            ssim_threshold: 0.95,
            refine_cutoff: None,
            aspect_tolerance: 0.05,
            checkpoint_interval: 100,
            resume: false,
            checkpoint_file: None,
        }
    }
}

impl DedupConfig {
    pub fn validate(&self) -> Result<(), DedupError> {
        if !SUPPORTED_HASH_SIZES.contains(&self.hash_size) {
            return Err(DedupError::InvalidConfig {
                message: format!(
                    "hash size {} is not one of {:?}",
                    self.hash_size, SUPPORTED_HASH_SIZES
                ),
            });
        }
        if !(self.aspect_tolerance > 0.0) {
            return Err(DedupError::InvalidConfig {
                message: format!(
                    "aspect tolerance must be positive, got {}",
                    self.aspect_tolerance
                ),
            });
        }
        if self.checkpoint_interval == 0 {
            return Err(DedupError::InvalidConfig {
                message: "checkpoint interval must be at least 1".to_string(),
            });
        }
        if !(-1.0..=1.0).contains(&self.ssim_threshold) {
            return Err(DedupError::InvalidConfig {
                message: format!(
                    "SSIM threshold must be within -1..1, got {}",
                    self.ssim_threshold
                ),
            });
        }
        Ok(())
    }

    pub fn refine_cutoff(&self) -> u32 {
        self.refine_cutoff.unwrap_or(self.threshold / 2)
    }

    pub fn checkpoint_path(&self, root: &Path) -> PathBuf {
        self.checkpoint_file
            .clone()
            .unwrap_or_else(|| root.join(DEFAULT_CHECKPOINT_NAME))
    }

    /// The settings a checkpoint's records depend on.
    pub fn checkpoint_config(&self) -> CheckpointConfig {
        CheckpointConfig {
            threshold: self.threshold,
            hash_size: self.hash_size,
            min_resolution: self.min_resolution,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CheckpointConfig {
    pub threshold: u32,
    pub hash_size: u32,
    pub min_resolution: u32,
}
