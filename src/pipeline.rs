use crate::checkpoint::{CheckpointState, CheckpointStore};
use crate::cluster::{ClusterStats, Clusterer};
use crate::config::{CheckpointConfig, DedupConfig};
use crate::error::DedupError;
use crate::record::FingerprintRecord;
use crate::scanner;
use crate::scoring::{DuplicateGroup, score_groups};
use crate::source::{FsImageSource, ImageSource};
use crossbeam_channel::Sender;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Instant;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanProgress {
    pub phase: ScanPhase,
    pub processed: usize,
    pub total: usize,
    pub current: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum ScanPhase {
    Discovery,
    Fingerprinting,
    Comparing,
    Scoring,
    Complete,
}

/// What a finished run hands to the report consumer.
#[derive(Debug, Clone)]
pub struct ScanOutcome {
    pub groups: Vec<DuplicateGroup>,
    /// Images successfully fingerprinted, including ones restored from a
    /// checkpoint.
    pub total_images: usize,
    /// Images attempted in this run that could not be fingerprinted.
    pub skipped: usize,
    pub stats: ClusterStats,
}

impl ScanOutcome {
    pub fn duplicate_count(&self) -> usize {
        self.groups.iter().map(|g| g.len().saturating_sub(1)).sum()
    }
}

/// One deduplication run over a directory tree.
///
/// Each instance owns its progress channel; nothing is shared between runs.
pub struct Deduplicator<S = FsImageSource> {
    config: DedupConfig,
    source: S,
    refine: bool,
    progress_sender: Option<Sender<ScanProgress>>,
}

impl Deduplicator<FsImageSource> {
    pub fn new(config: DedupConfig) -> Result<Self, DedupError> {
        let source = FsImageSource::new(config.hash_size, config.min_resolution);
        Self::with_source(config, source)
    }
}

impl<S: ImageSource> Deduplicator<S> {
    pub fn with_source(config: DedupConfig, source: S) -> Result<Self, DedupError> {
        config.validate()?;
        let refine = resolve_refinement(&config);
        Ok(Self {
            config,
            source,
            refine,
            progress_sender: None,
        })
    }

    pub fn with_progress_sender(mut self, sender: Sender<ScanProgress>) -> Self {
        self.progress_sender = Some(sender);
        self
    }

    /// Whether borderline matches will be checked with SSIM.
    pub fn is_refining(&self) -> bool {
        self.refine
    }

    pub fn run(&self, root: &Path) -> Result<ScanOutcome, DedupError> {
        if !root.exists() {
            return Err(DedupError::MissingRoot {
                path: root.to_path_buf(),
            });
        }
        if !root.is_dir() {
            return Err(DedupError::NotADirectory {
                path: root.to_path_buf(),
            });
        }

        let store = CheckpointStore::new(self.config.checkpoint_path(root));
        let mut state = if self.config.resume {
            store.load(&self.config.checkpoint_config())
        } else {
            CheckpointState::default()
        };

        self.send_progress(ScanPhase::Discovery, 0, 0, root.to_string_lossy());
        let images = scanner::find_images(root);

        let skipped = self.fingerprint_all(&images, &mut state, &store);
        if state.records.is_empty() {
            log::warn!("No valid images to process");
        }

        let (groups, stats) = self.cluster(&state.records);
        if groups.is_empty() {
            log::info!("No duplicate groups found");
        }

        store.clear();

        let total_images = state.records.len();
        self.send_progress(ScanPhase::Complete, total_images, total_images, "");
        Ok(ScanOutcome {
            groups,
            total_images,
            skipped,
            stats,
        })
    }

    /// Fingerprint every image not yet in `state`, checkpointing after each
    /// batch and once more at the end. Returns how many images were skipped.
    pub fn fingerprint_all(
        &self,
        images: &[PathBuf],
        state: &mut CheckpointState,
        store: &CheckpointStore,
    ) -> usize {
        let discovered: HashSet<String> = images
            .iter()
            .map(|p| p.to_string_lossy().into_owned())
            .collect();
        let before = state.records.len();
        state.records.retain(|r| discovered.contains(&r.path));
        if state.records.len() < before {
            log::info!(
                "Dropped {} checkpointed records for files that no longer exist",
                before - state.records.len()
            );
        }

        let pending: Vec<&PathBuf> = images
            .iter()
            .filter(|p| !state.processed.contains(&*p.to_string_lossy()))
            .collect();
        let total = images.len();
        let mut done = total - pending.len();
        let mut skipped = 0;

        log::info!(
            "Processing {} images ({} already done) and computing perceptual hashes...",
            pending.len(),
            done
        );
        let start = Instant::now();
        let checkpoint_config = self.config.checkpoint_config();

        for batch in pending.chunks(self.config.checkpoint_interval) {
            let results: Vec<(String, Option<FingerprintRecord>)> = batch
                .par_iter()
                .map(|path| {
                    let id = path.to_string_lossy().into_owned();
                    match self.source.fingerprint(path) {
                        Ok(record) => (id, Some(record)),
                        Err(e) => {
                            log::warn!("Failed to process {}: {}", id, e);
                            (id, None)
                        }
                    }
                })
                .collect();

            let last = results.last().map(|(id, _)| id.clone()).unwrap_or_default();
            for (id, record) in results {
                match record {
                    Some(record) => state.records.push(record),
                    None => skipped += 1,
                }
                state.processed.insert(id);
            }

            done += batch.len();
            self.send_progress(ScanPhase::Fingerprinting, done, total, last);
            self.save_checkpoint(store, state, &checkpoint_config);
        }

        self.save_checkpoint(store, state, &checkpoint_config);
        log::info!(
            "Successfully processed {} images ({} skipped) in {:.2?}",
            state.records.len(),
            skipped,
            start.elapsed()
        );
        skipped
    }

    /// Cluster `records` and score the resulting groups.
    pub fn cluster(&self, records: &[FingerprintRecord]) -> (Vec<DuplicateGroup>, ClusterStats) {
        self.send_progress(ScanPhase::Comparing, 0, records.len(), "");

        log::info!("Finding duplicate groups...");
        let clusterer = Clusterer::new(self.config.threshold, self.config.aspect_tolerance);

        #[cfg(feature = "ssim")]
        let refiner = crate::similarity::StructuralSimilarity::new(&self.source);
        #[cfg(feature = "ssim")]
        let clusterer = if self.refine {
            clusterer.with_refiner(
                &refiner,
                self.config.ssim_threshold,
                self.config.refine_cutoff(),
            )
        } else {
            clusterer
        };

        let (indices, stats) = clusterer.find_groups(records);
        log::info!(
            "Performed {} comparisons, found {} similar pairs",
            stats.comparisons,
            stats.matches
        );
        if stats.refined > 0 {
            log::info!("SSIM refined {} borderline pairs", stats.refined);
        }
        log::info!("Found {} duplicate groups", stats.groups);

        self.send_progress(ScanPhase::Scoring, 0, indices.len(), "");
        log::info!("Calculating quality scores and identifying keepers...");
        (score_groups(records, &indices), stats)
    }

    fn save_checkpoint(
        &self,
        store: &CheckpointStore,
        state: &CheckpointState,
        config: &CheckpointConfig,
    ) {
        if let Err(e) = store.save(state, config) {
            log::warn!("Failed to save checkpoint {}: {}", store.path().display(), e);
        }
    }

    fn send_progress(&self, phase: ScanPhase, processed: usize, total: usize, current: impl Into<String>) {
        if let Some(sender) = &self.progress_sender {
            let _ = sender.send(ScanProgress {
                phase,
                processed,
                total,
                current: current.into(),
            });
        }
    }
}

fn resolve_refinement(config: &DedupConfig) -> bool {
    if !config.use_ssim {
        return false;
    }
    if cfg!(feature = "ssim") {
        true
    } else {
        log::warn!("SSIM requested but support was not compiled in. Skipping SSIM refinement.");
        false
    }
}
