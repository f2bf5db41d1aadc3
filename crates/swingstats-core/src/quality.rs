// Cross-checks between the Points and Shots tables.
//
// The two sheets are exported independently and can disagree. Neither is
// treated as authoritative: disagreements are reported, not corrected.

use std::collections::BTreeMap;
use std::fmt;

use uuid::Uuid;

use crate::model::{detail, Point, PointKey, Shot};

#[derive(Debug, Clone, PartialEq)]
pub enum DiscrepancyKind {
    /// The final shot's result contradicts the point's detail tag.
    FinalShotResult {
        detail: String,
        expected: &'static str,
        actual: String,
    },
    /// The final shot was hit by the wrong player for the detail tag.
    FinalShotPlayer {
        detail: String,
        expected: String,
        actual: String,
    },
    /// Shot numbers do not run 1, 2, 3, ... in increasing order.
    ShotSequence { numbers: Vec<u32> },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Discrepancy {
    pub match_id: Uuid,
    pub key: PointKey,
    pub kind: DiscrepancyKind,
}

impl fmt::Display for Discrepancy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let k = &self.key;
        write!(f, "set {} game {} point {}: ", k.set, k.game, k.point)?;
        match &self.kind {
            DiscrepancyKind::FinalShotResult {
                detail,
                expected,
                actual,
            } => write!(f, "'{detail}' expects a final shot {expected}, found {actual}"),
            DiscrepancyKind::FinalShotPlayer {
                detail,
                expected,
                actual,
            } => write!(f, "'{detail}' expects the final shot by {expected}, found {actual}"),
            DiscrepancyKind::ShotSequence { numbers } => {
                write!(f, "shot numbers {numbers:?} do not increase from 1")
            }
        }
    }
}

/// What a detail tag implies about the last shot of the point.
#[derive(Clone, Copy)]
enum Expectation {
    /// Point winner hit it and it landed.
    WinnerIn,
    /// Point loser hit it and it missed.
    LoserMiss,
}

fn expectation(tag: &str) -> Option<Expectation> {
    match tag {
        detail::ACE | detail::SERVICE_WINNER | detail::FOREHAND_WINNER | detail::BACKHAND_WINNER => {
            Some(Expectation::WinnerIn)
        }
        detail::DOUBLE_FAULT | detail::FOREHAND_UNFORCED_ERROR | detail::BACKHAND_UNFORCED_ERROR => {
            Some(Expectation::LoserMiss)
        }
        _ => None,
    }
}

/// Compare every point against its shots. `points` should be enriched so
/// that `point_winner` names the same player as the shots' `player`; `shots`
/// are the raw rows, feeds included.
pub fn reconcile(points: &[Point], shots: &[Shot]) -> Vec<Discrepancy> {
    let mut by_point: BTreeMap<(Uuid, PointKey), Vec<&Shot>> = BTreeMap::new();
    for s in shots {
        by_point.entry((s.match_id, s.key())).or_default().push(s);
    }

    let mut found = Vec::new();

    for ((match_id, key), group) in &by_point {
        let numbers: Vec<u32> = group.iter().map(|s| s.shot).collect();
        let increasing = numbers.windows(2).all(|w| w[0] < w[1]);
        if numbers.first() != Some(&1) || !increasing {
            found.push(Discrepancy {
                match_id: *match_id,
                key: *key,
                kind: DiscrepancyKind::ShotSequence { numbers },
            });
        }
    }

    for p in points {
        let Some(expect) = expectation(&p.detail) else {
            continue;
        };
        let Some(last) = by_point
            .get(&(p.match_id, p.key()))
            .and_then(|group| group.iter().filter(|s| !s.is_feed()).max_by_key(|s| s.shot))
        else {
            continue;
        };

        let (result_ok, expected_result, player_ok) = match expect {
            Expectation::WinnerIn => (last.is_in(), "In", last.player == p.point_winner),
            Expectation::LoserMiss => (last.is_miss(), "Out or Net", last.player != p.point_winner),
        };

        if !result_ok {
            found.push(Discrepancy {
                match_id: p.match_id,
                key: p.key(),
                kind: DiscrepancyKind::FinalShotResult {
                    detail: p.detail.clone(),
                    expected: expected_result,
                    actual: last.result.clone(),
                },
            });
        }
        if !player_ok {
            let expected = match expect {
                Expectation::WinnerIn => p.point_winner.clone(),
                Expectation::LoserMiss => format!("the opponent of {}", p.point_winner),
            };
            found.push(Discrepancy {
                match_id: p.match_id,
                key: p.key(),
                kind: DiscrepancyKind::FinalShotPlayer {
                    detail: p.detail.clone(),
                    expected,
                    actual: last.player.clone(),
                },
            });
        }
    }

    found
}
