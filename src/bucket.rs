use crate::record::FingerprintRecord;
use std::collections::HashMap;

/// Bucket key for an aspect ratio: the nearest multiple of `tolerance`,
/// expressed as that multiple's integer index.
///
/// Ratios that straddle a rounding boundary land in adjacent buckets and are
/// never compared. That false negative is the price of the pre-filter.
pub fn bucket_key(aspect_ratio: f64, tolerance: f64) -> i64 {
    (aspect_ratio / tolerance).round() as i64
}

/// Partition record indices into aspect-ratio buckets.
///
/// Buckets come out in order of first appearance and each keeps its members
/// in record order.
pub fn bucket_by_aspect(records: &[FingerprintRecord], tolerance: f64) -> Vec<Vec<usize>> {
    let mut slots: HashMap<i64, usize> = HashMap::new();
    let mut buckets: Vec<Vec<usize>> = Vec::new();

    for (idx, record) in records.iter().enumerate() {
        let key = bucket_key(record.aspect_ratio(), tolerance);
        let slot = *slots.entry(key).or_insert_with(|| {
            buckets.push(Vec::new());
            buckets.len() - 1
        });
        buckets[slot].push(idx);
    }

    buckets
}

/// Number of unordered pairs the clusterer will compare.
pub fn pair_count(buckets: &[Vec<usize>]) -> usize {
    buckets
        .iter()
        .map(|b| b.len() * b.len().saturating_sub(1) / 2)
        .sum()
}
