// Cross-match tactical patterns over enriched points: first-point impact,
// serve-first advantage, streaks and per-score performance.

use std::collections::BTreeMap;

use serde::Serialize;
use uuid::Uuid;

use crate::model::Point;
use crate::stats::WinRate;

/// Streak lengths above this are pooled together.
pub const MAX_STREAK: u32 = 10;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FirstPointOutcome {
    /// Games won by the subject when they won the first point.
    pub subject_won_first: WinRate,
    /// Games won by the subject when the opponent won the first point.
    pub opponent_won_first: WinRate,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ServeFirstAdvantage {
    /// Sets won by the subject when serving the set's first point.
    pub subject_served_first: WinRate,
    pub opponent_served_first: WinRate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StreakKind {
    Win,
    Loss,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StreakStat {
    pub kind: StreakKind,
    /// Current streak length, capped at [`MAX_STREAK`].
    pub length: u32,
    /// How the following point went.
    pub next_point: WinRate,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoreStat {
    /// "host-guest" score label, e.g. "30-40".
    pub score: String,
    pub points: WinRate,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TacticalSummary {
    pub first_point: FirstPointOutcome,
    pub serve_first: ServeFirstAdvantage,
    pub streaks: Vec<StreakStat>,
    pub game_scores: Vec<ScoreStat>,
}

pub fn analyze(points: &[Point], subject: &str) -> TacticalSummary {
    TacticalSummary {
        first_point: first_point_outcome(points, subject),
        serve_first: serve_first_advantage(points, subject),
        streaks: streak_patterns(points, subject),
        game_scores: game_score_performance(points, subject),
    }
}

/// Points sorted by match, set, game and point number.
fn chronological(points: &[Point]) -> Vec<&Point> {
    let mut sorted: Vec<&Point> = points.iter().collect();
    sorted.sort_by_key(|p| (p.match_id, p.set, p.game, p.point));
    sorted
}

/// First and last point of every group produced by `group_key`, on
/// chronologically ordered points.
fn first_and_last<'a, K, F>(sorted: &[&'a Point], group_key: F) -> BTreeMap<K, (&'a Point, &'a Point)>
where
    K: Ord,
    F: Fn(&Point) -> K,
{
    let mut groups: BTreeMap<K, (&Point, &Point)> = BTreeMap::new();
    for &p in sorted {
        groups
            .entry(group_key(p))
            .and_modify(|(_, last)| *last = p)
            .or_insert((p, p));
    }
    groups
}

pub fn first_point_outcome(points: &[Point], subject: &str) -> FirstPointOutcome {
    let sorted = chronological(points);
    let games = first_and_last(&sorted, |p| (p.match_id, p.set, p.game));

    let mut out = FirstPointOutcome::default();
    for (first, last) in games.values() {
        let won_game = last.point_winner == subject;
        if first.point_winner == subject {
            out.subject_won_first.record(won_game);
        } else {
            out.opponent_won_first.record(won_game);
        }
    }
    out
}

pub fn serve_first_advantage(points: &[Point], subject: &str) -> ServeFirstAdvantage {
    let sorted = chronological(points);
    let sets = first_and_last(&sorted, |p| (p.match_id, p.set));

    let mut out = ServeFirstAdvantage::default();
    for (first, last) in sets.values() {
        let won_set = last.point_winner == subject;
        if first.match_server == subject {
            out.subject_served_first.record(won_set);
        } else {
            out.opponent_served_first.record(won_set);
        }
    }
    out
}

/// Win rate on the next point after a run of consecutive wins or losses.
/// Streaks reset at the start of each match; the last point of a match has
/// no next point and is not counted.
pub fn streak_patterns(points: &[Point], subject: &str) -> Vec<StreakStat> {
    let sorted = chronological(points);
    let mut tally: BTreeMap<(StreakKind, u32), WinRate> = BTreeMap::new();

    let mut current: Option<(Uuid, StreakKind, u32)> = None;
    for (i, p) in sorted.iter().enumerate() {
        let kind = if p.point_winner == subject {
            StreakKind::Win
        } else {
            StreakKind::Loss
        };
        let length = match current {
            Some((match_id, k, n)) if match_id == p.match_id && k == kind => n + 1,
            _ => 1,
        };
        current = Some((p.match_id, kind, length));

        let Some(next) = sorted.get(i + 1).filter(|n| n.match_id == p.match_id) else {
            continue;
        };
        tally
            .entry((kind, length.min(MAX_STREAK)))
            .or_default()
            .record(next.point_winner == subject);
    }

    tally
        .into_iter()
        .map(|((kind, length), next_point)| StreakStat {
            kind,
            length,
            next_point,
        })
        .collect()
}

/// Win rate at each game score, most frequent score first. Points with a
/// missing score are skipped.
pub fn game_score_performance(points: &[Point], subject: &str) -> Vec<ScoreStat> {
    let mut tally: BTreeMap<String, WinRate> = BTreeMap::new();
    for p in points {
        let (Some(host), Some(guest)) = (p.host_game_score.as_deref(), p.guest_game_score.as_deref())
        else {
            continue;
        };
        let (host, guest) = (host.trim(), guest.trim());
        if host.is_empty() || guest.is_empty() {
            continue;
        }
        tally
            .entry(format!("{host}-{guest}"))
            .or_default()
            .record(p.point_winner == subject);
    }

    let mut stats: Vec<ScoreStat> = tally
        .into_iter()
        .map(|(score, points)| ScoreStat { score, points })
        .collect();
    // Stable sort keeps equal counts in label order.
    stats.sort_by(|a, b| b.points.played.cmp(&a.points.played));
    stats
}
