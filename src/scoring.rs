use crate::record::FingerprintRecord;
use serde::{Deserialize, Serialize};

pub const WEIGHT_RESOLUTION: f64 = 0.50;
pub const WEIGHT_FILE_SIZE: f64 = 0.20;
pub const WEIGHT_METADATA: f64 = 0.15;
pub const WEIGHT_FORMAT: f64 = 0.15;

/// One set of duplicates with scores, group id and keeper filled in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DuplicateGroup {
    pub id: usize,
    pub members: Vec<FingerprintRecord>,
}

impl DuplicateGroup {
    pub fn keeper(&self) -> Option<&FingerprintRecord> {
        self.members.iter().find(|m| m.is_keeper)
    }

    pub fn culled(&self) -> impl Iterator<Item = &FingerprintRecord> {
        self.members.iter().filter(|m| !m.is_keeper)
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}

/// Score in 0..=100: resolution 50%, file size 20%, EXIF presence 15%,
/// lossless format 15% (lossy earns half). Rounded to two decimals.
pub fn quality_score(record: &FingerprintRecord, max_resolution: u64, max_file_size: u64) -> f64 {
    let resolution_score = if max_resolution > 0 {
        record.resolution() as f64 / max_resolution as f64 * 100.0
    } else {
        0.0
    };
    let file_size_score = if max_file_size > 0 {
        record.file_size as f64 / max_file_size as f64 * 100.0
    } else {
        0.0
    };
    let metadata_bonus = if record.has_exif { 100.0 } else { 0.0 };
    let format_bonus = if record.is_lossless { 100.0 } else { 50.0 };

    let score = resolution_score * WEIGHT_RESOLUTION
        + file_size_score * WEIGHT_FILE_SIZE
        + metadata_bonus * WEIGHT_METADATA
        + format_bonus * WEIGHT_FORMAT;

    (score * 100.0).round() / 100.0
}

/// Score every member, stamp `group_id` and mark exactly one keeper: the
/// highest score, the earliest member on a tie.
pub fn assign_group(group_id: usize, members: &mut [FingerprintRecord]) {
    let max_resolution = members.iter().map(|m| m.resolution()).max().unwrap_or(0);
    let max_file_size = members.iter().map(|m| m.file_size).max().unwrap_or(0);

    let mut keeper: Option<(usize, f64)> = None;
    for (idx, member) in members.iter_mut().enumerate() {
        member.quality_score = quality_score(member, max_resolution, max_file_size);
        member.group_id = Some(group_id);
        member.is_keeper = false;

        match keeper {
            Some((_, best)) if member.quality_score <= best => {}
            _ => keeper = Some((idx, member.quality_score)),
        }
    }

    if let Some((idx, _)) = keeper {
        members[idx].is_keeper = true;
    }
}

/// Build scored groups from clustered record indices. Group ids follow the
/// order of `groups`.
pub fn score_groups(records: &[FingerprintRecord], groups: &[Vec<usize>]) -> Vec<DuplicateGroup> {
    groups
        .iter()
        .enumerate()
        .map(|(id, indices)| {
            let mut members: Vec<FingerprintRecord> = indices
                .iter()
                .map(|&i| {
                    let mut member = records[i].clone();
                    member.clear_derived();
                    member
                })
                .collect();
            assign_group(id, &mut members);
            DuplicateGroup { id, members }
        })
        .collect()
}
