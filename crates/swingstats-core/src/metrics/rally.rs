// Rally-length buckets.

use std::collections::{BTreeMap, HashMap};

use serde::Serialize;

use crate::model::{Point, PointKey, Shot};
use crate::stats::ratio;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum RallyBucket {
    Short,
    Medium,
    Long,
    VeryLong,
}

impl RallyBucket {
    pub const ALL: [RallyBucket; 4] = [
        RallyBucket::Short,
        RallyBucket::Medium,
        RallyBucket::Long,
        RallyBucket::VeryLong,
    ];

    /// Bucket for a rally of `length` shots; `None` for an empty rally.
    pub fn from_length(length: u32) -> Option<Self> {
        match length {
            0 => None,
            1..=4 => Some(RallyBucket::Short),
            5..=8 => Some(RallyBucket::Medium),
            9..=12 => Some(RallyBucket::Long),
            _ => Some(RallyBucket::VeryLong),
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            RallyBucket::Short => "Short (1-4)",
            RallyBucket::Medium => "Medium (5-8)",
            RallyBucket::Long => "Long (9-12)",
            RallyBucket::VeryLong => "Very Long (13+)",
        }
    }

    /// Column-name stem for the wide table.
    pub fn key(&self) -> &'static str {
        match self {
            RallyBucket::Short => "short",
            RallyBucket::Medium => "medium",
            RallyBucket::Long => "long",
            RallyBucket::VeryLong => "very_long",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RallyBucketStats {
    pub bucket: RallyBucket,
    pub label: &'static str,
    pub points: u32,
    pub won: u32,
    pub win_pct: f64,
    pub avg_length: f64,
}

/// One entry per bucket, in bucket order, empty buckets included.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RallyMetrics {
    pub buckets: Vec<RallyBucketStats>,
}

impl Default for RallyMetrics {
    fn default() -> Self {
        compute_rally(&[], &[], "")
    }
}

impl RallyMetrics {
    pub fn bucket(&self, bucket: RallyBucket) -> Option<&RallyBucketStats> {
        self.buckets.iter().find(|b| b.bucket == bucket)
    }
}

/// Rally length of each point: shots that are neither serves nor feeds.
pub fn rally_lengths(shots: &[Shot]) -> BTreeMap<PointKey, u32> {
    let mut lengths = BTreeMap::new();
    for s in shots.iter().filter(|s| s.is_rally_shot()) {
        *lengths.entry(s.key()).or_insert(0) += 1;
    }
    lengths
}

/// Bucket one match's points by rally length and report the subject's win
/// rate per bucket. Points without a rally shot, and rallies with no
/// matching point, are left out.
pub fn compute_rally(points: &[Point], shots: &[Shot], subject: &str) -> RallyMetrics {
    let winners: HashMap<PointKey, &str> = points
        .iter()
        .map(|p| (p.key(), p.point_winner.as_str()))
        .collect();

    // bucket -> (points, won, total length)
    let mut tally: BTreeMap<RallyBucket, (u32, u32, u32)> = BTreeMap::new();
    for (key, length) in rally_lengths(shots) {
        let Some(winner) = winners.get(&key) else {
            continue;
        };
        let Some(bucket) = RallyBucket::from_length(length) else {
            continue;
        };
        let entry = tally.entry(bucket).or_default();
        entry.0 += 1;
        entry.1 += u32::from(*winner == subject);
        entry.2 += length;
    }

    let buckets = RallyBucket::ALL
        .iter()
        .map(|&bucket| {
            let (points, won, total) = tally.get(&bucket).copied().unwrap_or_default();
            RallyBucketStats {
                bucket,
                label: bucket.label(),
                points,
                won,
                win_pct: ratio(won, points),
                avg_length: ratio(total, points),
            }
        })
        .collect();

    RallyMetrics { buckets }
}
