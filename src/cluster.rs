use crate::bucket::{bucket_by_aspect, pair_count};
use crate::record::FingerprintRecord;
use crate::similarity::{PairRefiner, distance};
use rayon::prelude::*;
use std::collections::HashMap;

/// Disjoint-set forest over `0..n`.
///
/// `union` links the first root under the second without balancing; path
/// halving in `find` keeps the trees shallow.
#[derive(Debug, Clone)]
pub struct UnionFind {
    parent: Vec<usize>,
}

impl UnionFind {
    pub fn new(n: usize) -> Self {
        Self {
            parent: (0..n).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.parent.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parent.is_empty()
    }

    pub fn find(&mut self, mut x: usize) -> usize {
        while self.parent[x] != x {
            self.parent[x] = self.parent[self.parent[x]];
            x = self.parent[x];
        }
        x
    }

    /// Returns `false` when `a` and `b` were already connected.
    pub fn union(&mut self, a: usize, b: usize) -> bool {
        let ra = self.find(a);
        let rb = self.find(b);
        if ra == rb {
            return false;
        }
        self.parent[ra] = rb;
        true
    }

    pub fn connected(&mut self, a: usize, b: usize) -> bool {
        self.find(a) == self.find(b)
    }

    /// Sets with at least `min_size` members. Members are ascending and sets
    /// are ordered by their smallest member.
    pub fn sets(&mut self, min_size: usize) -> Vec<Vec<usize>> {
        let mut slots: HashMap<usize, usize> = HashMap::new();
        let mut sets: Vec<Vec<usize>> = Vec::new();
        for idx in 0..self.parent.len() {
            let root = self.find(idx);
            let slot = *slots.entry(root).or_insert_with(|| {
                sets.push(Vec::new());
                sets.len() - 1
            });
            sets[slot].push(idx);
        }
        sets.retain(|s| s.len() >= min_size);
        sets
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ClusterStats {
    pub comparisons: usize,
    pub matches: usize,
    pub refined: usize,
    pub groups: usize,
}

struct Refinement<'a> {
    refiner: &'a dyn PairRefiner,
    min_score: f64,
    cutoff: u32,
}

/// Turns pairwise matches into duplicate groups.
pub struct Clusterer<'a> {
    threshold: u32,
    aspect_tolerance: f64,
    refinement: Option<Refinement<'a>>,
}

enum PairOutcome {
    Match { refined: bool },
    Rejected { refined: bool },
    Distant,
}

impl<'a> Clusterer<'a> {
    pub fn new(threshold: u32, aspect_tolerance: f64) -> Self {
        Self {
            threshold,
            aspect_tolerance,
            refinement: None,
        }
    }

    /// Require pairs whose distance is above `cutoff` to also score at
    /// least `min_score` with `refiner`.
    pub fn with_refiner(mut self, refiner: &'a dyn PairRefiner, min_score: f64, cutoff: u32) -> Self {
        self.refinement = Some(Refinement {
            refiner,
            min_score,
            cutoff,
        });
        self
    }

    fn compare(&self, a: &FingerprintRecord, b: &FingerprintRecord) -> PairOutcome {
        let dist = distance(a, b);
        if dist > self.threshold {
            return PairOutcome::Distant;
        }

        match &self.refinement {
            Some(r) if dist > r.cutoff => {
                let score = r.refiner.similarity(a, b);
                if score >= r.min_score {
                    PairOutcome::Match { refined: true }
                } else {
                    log::debug!(
                        "Refinement rejected {} ~ {} (distance {}, score {:.3})",
                        a.path,
                        b.path,
                        dist,
                        score
                    );
                    PairOutcome::Rejected { refined: true }
                }
            }
            _ => PairOutcome::Match { refined: false },
        }
    }

    /// Group record indices that are connected by matches within their
    /// aspect-ratio bucket. Singletons are dropped.
    ///
    /// Pairs are compared on the rayon pool; unions happen on the calling
    /// thread.
    pub fn find_groups(&self, records: &[FingerprintRecord]) -> (Vec<Vec<usize>>, ClusterStats) {
        let buckets = bucket_by_aspect(records, self.aspect_tolerance);
        let comparisons = pair_count(&buckets);

        let outcomes: Vec<(usize, usize, PairOutcome)> = buckets
            .par_iter()
            .flat_map_iter(|bucket| {
                (0..bucket.len()).flat_map(move |i| {
                    (i + 1..bucket.len()).filter_map(move |j| {
                        let (a, b) = (bucket[i], bucket[j]);
                        match self.compare(&records[a], &records[b]) {
                            PairOutcome::Distant => None,
                            outcome => Some((a, b, outcome)),
                        }
                    })
                })
            })
            .collect();

        let mut forest = UnionFind::new(records.len());
        let mut stats = ClusterStats {
            comparisons,
            ..Default::default()
        };
        for (a, b, outcome) in outcomes {
            match outcome {
                PairOutcome::Match { refined } => {
                    stats.matches += 1;
                    stats.refined += refined as usize;
                    forest.union(a, b);
                }
                PairOutcome::Rejected { refined } => {
                    stats.refined += refined as usize;
                }
                PairOutcome::Distant => {}
            }
        }

        let groups = forest.sets(2);
        stats.groups = groups.len();
        (groups, stats)
    }
}
