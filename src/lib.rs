//! Find visually duplicate images and recommend which copy to keep.
//!
//! Images are fingerprinted with a perceptual hash in all four orientations,
//! compared within aspect-ratio buckets by minimum Hamming distance, joined
//! into groups with union-find and ranked by a quality score. Long scans
//! checkpoint their progress and can resume after an interruption.
//!
//! Nothing here deletes or moves files.

pub mod bucket;
pub mod checkpoint;
pub mod cluster;
pub mod config;
pub mod error;
pub mod exif;
pub mod pipeline;
pub mod record;
pub mod report;
pub mod scanner;
pub mod scoring;
pub mod similarity;
pub mod source;

pub use checkpoint::{CheckpointState, CheckpointStore};
pub use cluster::{ClusterStats, Clusterer, UnionFind};
pub use config::{CheckpointConfig, DedupConfig};
pub use error::{CheckpointError, DedupError, SourceError};
pub use pipeline::{Deduplicator, ScanOutcome, ScanPhase, ScanProgress};
pub use record::{Fingerprint, FingerprintRecord, OrientationHashes};
pub use report::Report;
pub use scoring::DuplicateGroup;
pub use similarity::{PairRefiner, distance};
pub use source::{FsImageSource, ImageSource};
