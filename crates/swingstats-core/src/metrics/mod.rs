// Metrics engine: one record of derived statistics per match, relative to
// the analysis subject.

pub mod games;
pub mod outcomes;
pub mod rally;
pub mod serve;

use std::fmt;
use std::sync::Arc;

use anyhow::Result;
use chrono::NaiveDate;
use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use crate::cache::AnalyticsCache;
use crate::db::Database;
use crate::enrich::AnalysisTables;
use crate::model::{Match, Point, Shot};
use crate::quality;
use crate::stats::{ratio, WinRate};

pub use games::{ClutchMetrics, GameKind, GameMetrics, TieBreakMetrics};
pub use outcomes::{BreakPointMetrics, OutcomeMetrics, WinnerErrorRatio};
pub use rally::{RallyBucket, RallyMetrics};
pub use serve::{ReturnMetrics, ServeMetrics};

// ---------------------------------------------------------------------------
// Match metrics record
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TotalsMetrics {
    pub total_points: u32,
    pub points_won: u32,
    pub points_won_pct: f64,
    /// More than half the points won. A proxy: the exports carry no final
    /// score.
    pub match_won: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MatchMetrics {
    pub match_id: Uuid,
    pub match_date: Option<NaiveDate>,
    pub opponent: String,
    pub location: String,
    pub totals: TotalsMetrics,
    pub serve: ServeMetrics,
    pub returns: ReturnMetrics,
    pub outcomes: OutcomeMetrics,
    pub break_points: BreakPointMetrics,
    pub games: GameMetrics,
    pub tie_breaks: TieBreakMetrics,
    pub rally: RallyMetrics,
    pub clutch: ClutchMetrics,
}

/// A single cell of the wide metrics table.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum MetricValue {
    Text(String),
    Count(u32),
    Signed(i64),
    Number(f64),
    Flag(bool),
    Ratio(WinnerErrorRatio),
}

impl fmt::Display for MetricValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MetricValue::Text(s) => f.write_str(s),
            MetricValue::Count(n) => write!(f, "{n}"),
            MetricValue::Signed(n) => write!(f, "{n}"),
            MetricValue::Number(v) => write!(f, "{v}"),
            MetricValue::Flag(b) => write!(f, "{b}"),
            MetricValue::Ratio(r) => write!(f, "{r}"),
        }
    }
}

impl From<u32> for MetricValue {
    fn from(v: u32) -> Self {
        MetricValue::Count(v)
    }
}

impl From<i64> for MetricValue {
    fn from(v: i64) -> Self {
        MetricValue::Signed(v)
    }
}

impl From<f64> for MetricValue {
    fn from(v: f64) -> Self {
        MetricValue::Number(v)
    }
}

impl From<bool> for MetricValue {
    fn from(v: bool) -> Self {
        MetricValue::Flag(v)
    }
}

impl From<WinnerErrorRatio> for MetricValue {
    fn from(v: WinnerErrorRatio) -> Self {
        MetricValue::Ratio(v)
    }
}

impl From<String> for MetricValue {
    fn from(v: String) -> Self {
        MetricValue::Text(v)
    }
}

/// Ordered (name, value) pairs making up one row of the wide table.
#[derive(Default)]
struct Row(Vec<(String, MetricValue)>);

impl Row {
    fn push(&mut self, name: impl Into<String>, value: impl Into<MetricValue>) {
        self.0.push((name.into(), value.into()));
    }

    fn rate(&mut self, prefix: &str, rate: &WinRate) {
        self.push(format!("{prefix}_played"), rate.played);
        self.push(format!("{prefix}_won"), rate.won);
        self.push(format!("{prefix}_won_pct"), rate.win_pct);
    }
}

impl MatchMetrics {
    /// Zero-valued record for a match with no points.
    fn empty(m: &Match) -> Self {
        Self::zeroed(m.match_id, m.match_date, &m.guest_team, &m.location)
    }

    fn zeroed(match_id: Uuid, match_date: Option<NaiveDate>, opponent: &str, location: &str) -> Self {
        Self {
            match_id,
            match_date,
            opponent: opponent.to_string(),
            location: location.to_string(),
            totals: TotalsMetrics::default(),
            serve: ServeMetrics::default(),
            returns: ReturnMetrics::default(),
            outcomes: OutcomeMetrics::default(),
            break_points: BreakPointMetrics::default(),
            games: GameMetrics::default(),
            tie_breaks: TieBreakMetrics::default(),
            rally: RallyMetrics::default(),
            clutch: ClutchMetrics::default(),
        }
    }

    /// Flatten the record into the wide per-match table: stable column
    /// names in a fixed order.
    pub fn columns(&self) -> Vec<(String, MetricValue)> {
        let mut row = Row::default();

        row.push("match_id", self.match_id.to_string());
        row.push(
            "match_date",
            self.match_date.map(|d| d.to_string()).unwrap_or_default(),
        );
        row.push("opponent", self.opponent.clone());
        row.push("location", self.location.clone());

        let t = &self.totals;
        row.push("total_points", t.total_points);
        row.push("points_won", t.points_won);
        row.push("points_won_pct", t.points_won_pct);
        row.push("match_won", t.match_won);

        let s = &self.serve;
        row.push("total_serve_points", s.total_serve_points);
        row.push("aces", s.aces);
        row.push("service_winners", s.service_winners);
        row.push("double_faults", s.double_faults);
        row.push("first_serve_pct", s.first_serve_pct);
        row.push("first_serve_won_pct", s.first_serve_won_pct);
        row.push("first_serve_speed", s.first_serve_speed);
        row.push("second_serve_pct", s.second_serve_pct);
        row.push("second_serve_won_pct", s.second_serve_won_pct);
        row.push("second_serve_speed", s.second_serve_speed);

        let r = &self.returns;
        row.push("return_points", r.return_points);
        row.push("return_points_won", r.return_points_won);
        row.push("return_points_won_pct", r.return_points_won_pct);
        row.push("first_return_won_pct", r.first_return_won_pct);
        row.push("first_return_speed", r.first_return_speed);
        row.push("second_return_won_pct", r.second_return_won_pct);
        row.push("second_return_speed", r.second_return_speed);

        let o = &self.outcomes;
        row.push("winners", o.winners);
        row.push("forehand_winners", o.forehand_winners);
        row.push("backhand_winners", o.backhand_winners);
        row.push("unforced_errors", o.unforced_errors);
        row.push("forehand_errors", o.forehand_errors);
        row.push("backhand_errors", o.backhand_errors);
        row.push("double_faults_lost", o.double_faults_lost);
        row.push("opponent_unforced_errors", o.opponent_unforced_errors);
        row.push("opponent_forehand_errors", o.opponent_forehand_errors);
        row.push("opponent_backhand_errors", o.opponent_backhand_errors);
        row.push("opponent_double_faults", o.opponent_double_faults);
        row.push("winner_error_ratio", o.winner_error_ratio);
        row.push("forehand_winner_error_ratio", o.forehand_winner_error_ratio);
        row.push("backhand_winner_error_ratio", o.backhand_winner_error_ratio);
        row.push("positive_shots", o.positive_shots);
        row.push("negative_shots", o.negative_shots);
        row.push("net_points", o.net_points);

        let b = &self.break_points;
        row.push("break_point_opportunities", b.opportunities);
        row.push("break_points_won", b.won);
        row.push("break_points_won_pct", b.won_pct);
        row.push("break_points_against", b.against);
        row.push("break_points_saved", b.saved);
        row.push("break_points_saved_pct", b.saved_pct);

        row.rate("service_games", &self.games.service_games);
        row.rate("return_games", &self.games.return_games);

        row.rate("set_tie_breaks", &self.tie_breaks.set_tie_breaks);
        row.rate("match_tie_breaks", &self.tie_breaks.match_tie_breaks);
        row.rate("tie_break_points", &self.tie_breaks.tie_break_points);

        for b in &self.rally.buckets {
            let stem = format!("rally_{}", b.bucket.key());
            row.push(format!("{stem}_points"), b.points);
            row.push(format!("{stem}_won"), b.won);
            row.push(format!("{stem}_win_pct"), b.win_pct);
            row.push(format!("{stem}_avg_length"), b.avg_length);
        }

        let c = &self.clutch;
        row.rate("clutch_break_point", &c.break_point);
        row.rate("clutch_set_point", &c.set_point);
        row.rate("clutch_deuce_or_ad", &c.deuce_or_ad);
        row.rate("clutch_tight_game", &c.tight_game);
        row.push("pressure_point_share", c.pressure_point_share);

        row.0
    }
}

// ---------------------------------------------------------------------------
// Computation
// ---------------------------------------------------------------------------

fn compute_totals(points: &[Point], subject: &str) -> TotalsMetrics {
    let total_points = points.len() as u32;
    let points_won = points.iter().filter(|p| p.point_winner == subject).count() as u32;
    let points_won_pct = ratio(points_won, total_points);
    TotalsMetrics {
        total_points,
        points_won,
        points_won_pct,
        match_won: points_won_pct > 0.5,
    }
}

fn compute_one(m: &Match, points: &[Point], shots: &[Shot], subject: &str) -> MatchMetrics {
    if points.is_empty() {
        return MatchMetrics::empty(m);
    }

    let subject_shots: Vec<&Shot> = shots.iter().filter(|s| s.player == subject).collect();
    // Tie-breaks are identified first: clutch statistics only make sense in
    // regular games.
    let kinds = games::classify_games(points);

    MatchMetrics {
        totals: compute_totals(points, subject),
        serve: serve::compute_serve(points, &subject_shots, subject),
        returns: serve::compute_returns(points, &subject_shots, subject),
        outcomes: outcomes::compute_outcomes(points, subject),
        break_points: outcomes::compute_break_points(points, subject),
        games: games::compute_games(points, subject),
        tie_breaks: games::compute_tie_breaks(points, &kinds, subject),
        rally: rally::compute_rally(points, shots, subject),
        clutch: games::compute_clutch(points, &kinds, subject),
        ..MatchMetrics::empty(m)
    }
}

/// One record per match, in `matches` order. `points` must already be
/// enriched (role tokens resolved to names) and `shots` free of feeds.
///
/// Matches without points get an all-zero record.
pub fn compute_match_metrics(
    matches: &[Match],
    points: &[Point],
    shots: &[Shot],
    subject: &str,
) -> Vec<MatchMetrics> {
    matches
        .iter()
        .map(|m| {
            let match_points: Vec<Point> = points
                .iter()
                .filter(|p| p.match_id == m.match_id)
                .cloned()
                .collect();
            let match_shots: Vec<Shot> = shots
                .iter()
                .filter(|s| s.match_id == m.match_id)
                .cloned()
                .collect();
            compute_one(m, &match_points, &match_shots, subject)
        })
        .collect()
}

/// Header row of the wide table. Identical for every match.
pub fn column_names() -> Vec<String> {
    MatchMetrics::zeroed(Uuid::nil(), None, "", "")
        .columns()
        .into_iter()
        .map(|(name, _)| name)
        .collect()
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

/// Reads through the cache, enriches, and computes the metrics table for one
/// analysis subject.
pub struct MetricsEngine<'a> {
    db: &'a Database,
    cache: &'a AnalyticsCache,
    subject: String,
}

impl<'a> MetricsEngine<'a> {
    pub fn new(db: &'a Database, cache: &'a AnalyticsCache, subject: impl Into<String>) -> Self {
        Self {
            db,
            cache,
            subject: subject.into(),
        }
    }

    pub fn subject(&self) -> &str {
        &self.subject
    }

    /// Enriched tables for the subject.
    pub fn analysis(&self) -> Result<Arc<AnalysisTables>> {
        self.cache.analysis(self.db, &self.subject)
    }

    /// The per-match metrics table, computed once until the next ingestion.
    /// Data-quality discrepancies are logged, not fatal.
    pub fn match_metrics(&self) -> Result<Arc<Vec<MatchMetrics>>> {
        self.cache.metrics_with(&self.subject, || {
            let tables = self.cache.tables(self.db)?;
            let analysis = self.analysis()?;

            let discrepancies = quality::reconcile(&analysis.points, &tables.shots);
            for d in &discrepancies {
                warn!(match_id = %d.match_id, "data quality: {d}");
            }

            let metrics = compute_match_metrics(
                &analysis.matches,
                &analysis.points,
                &analysis.shots,
                &self.subject,
            );
            info!(
                matches = metrics.len(),
                discrepancies = discrepancies.len(),
                "computed match metrics for {}",
                self.subject
            );
            Ok(metrics)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::detail;
    use crate::test_support::{point, sample_match, shot, SUBJECT};

    const OPP: &str = "Jane Doe";

    /// Helper: a match with a handful of enriched points and shots.
    fn fixture() -> (Match, Vec<Point>, Vec<Shot>) {
        let m = sample_match(OPP);
        let mut points = vec![
            point(1, 1, 1, SUBJECT, SUBJECT, detail::ACE),
            point(1, 1, 2, SUBJECT, SUBJECT, detail::FOREHAND_WINNER),
            point(1, 2, 1, OPP, OPP, detail::BACKHAND_UNFORCED_ERROR),
            point(1, 2, 2, OPP, SUBJECT, detail::FOREHAND_UNFORCED_ERROR),
        ];
        for p in &mut points {
            p.match_id = m.match_id;
        }
        let mut shots = vec![
            shot(1, 1, 1, 1, SUBJECT, "first_serve", "Serve", "In"),
            shot(1, 1, 2, 1, SUBJECT, "first_serve", "Serve", "In"),
            shot(1, 1, 2, 2, OPP, "first_return", "Backhand", "In"),
            shot(1, 1, 2, 3, SUBJECT, "groundstroke", "Forehand", "In"),
            shot(1, 2, 1, 1, OPP, "first_serve", "Serve", "In"),
            shot(1, 2, 1, 2, SUBJECT, "first_return", "Backhand", "Net"),
        ];
        for s in &mut shots {
            s.match_id = m.match_id;
        }
        (m, points, shots)
    }

    #[test]
    fn one_record_per_match() {
        let (m, points, shots) = fixture();
        let other = sample_match("Someone Else");

        let metrics = compute_match_metrics(&[m.clone(), other.clone()], &points, &shots, SUBJECT);

        assert_eq!(metrics.len(), 2);
        assert_eq!(metrics[0].match_id, m.match_id);
        assert_eq!(metrics[0].opponent, OPP);
        assert_eq!(metrics[0].totals.total_points, 4);
        assert_eq!(metrics[0].totals.points_won, 3);
        assert!(metrics[0].totals.match_won);
        assert_eq!(metrics[0].serve.aces, 1);
        assert_eq!(metrics[0].outcomes.winners, 1);
        assert_eq!(metrics[0].outcomes.net_points, 1);
        assert_eq!(metrics[0].games.service_games.won, 1);
        assert_eq!(metrics[0].returns.first_return_won_pct, 0.0);

        // The second match has no points of its own.
        assert_eq!(metrics[1].match_id, other.match_id);
        assert_eq!(metrics[1].totals, TotalsMetrics::default());
    }

    #[test]
    fn empty_match_record_is_all_zeros() {
        let m = sample_match(OPP);
        let metrics = compute_match_metrics(&[m], &[], &[], SUBJECT);
        let row = metrics[0].columns();
        for (name, value) in &row[4..] {
            match value {
                MetricValue::Count(n) => assert_eq!(*n, 0, "{name}"),
                MetricValue::Signed(n) => assert_eq!(*n, 0, "{name}"),
                MetricValue::Number(v) => assert_eq!(*v, 0.0, "{name}"),
                MetricValue::Flag(b) => assert!(!b, "{name}"),
                MetricValue::Ratio(r) => assert_eq!(*r, WinnerErrorRatio::Finite(0.0), "{name}"),
                MetricValue::Text(_) => panic!("unexpected text column {name}"),
            }
        }
    }

    #[test]
    fn columns_are_unique_and_match_the_header() {
        let (m, points, shots) = fixture();
        let metrics = compute_match_metrics(&[m], &points, &shots, SUBJECT);
        let names: Vec<String> = metrics[0].columns().into_iter().map(|(n, _)| n).collect();

        assert_eq!(names, column_names());
        let unique: std::collections::HashSet<&String> = names.iter().collect();
        assert_eq!(unique.len(), names.len());
        assert!(names.contains(&"net_points".to_string()));
        assert!(names.contains(&"rally_very_long_win_pct".to_string()));
    }

    #[test]
    fn unbounded_ratio_renders_as_inf() {
        let (m, points, shots) = fixture();
        let metrics = compute_match_metrics(&[m], &points, &shots, SUBJECT);
        let row = metrics[0].columns();
        let (_, value) = row
            .iter()
            .find(|(name, _)| name == "forehand_winner_error_ratio")
            .unwrap();
        assert_eq!(value.to_string(), "inf");
    }

    #[test]
    fn engine_caches_until_invalidated() {
        let db = Database::open(":memory:").unwrap();
        let cache = AnalyticsCache::new();
        let engine = MetricsEngine::new(&db, &cache, SUBJECT);

        assert!(engine.match_metrics().unwrap().is_empty());

        let (m, mut points, shots) = fixture();
        for p in &mut points {
            p.match_server = if p.match_server == SUBJECT { "host" } else { "guest" }.into();
            p.point_winner = if p.point_winner == SUBJECT { "host" } else { "guest" }.into();
        }
        db.store_match_bundle(&m, &points, &shots).unwrap();
        assert!(engine.match_metrics().unwrap().is_empty());

        cache.invalidate();
        let metrics = engine.match_metrics().unwrap();
        assert_eq!(metrics.len(), 1);
        assert_eq!(metrics[0].totals.points_won, 3);
    }
}
