// Point outcomes read from the `detail` tag: winners, unforced errors,
// errors the opponent gave away, net points and break points.

use std::fmt;

use serde::{Serialize, Serializer};

use crate::model::{detail, Point};
use crate::stats::ratio;

// ---------------------------------------------------------------------------
// Winner/error ratio
// ---------------------------------------------------------------------------

/// Winners divided by errors. A match with winners but no errors has no
/// finite ratio and is reported as `Unbounded`; 0/0 is `Finite(0.0)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum WinnerErrorRatio {
    Finite(f64),
    Unbounded,
}

impl WinnerErrorRatio {
    pub fn new(winners: u32, errors: u32) -> Self {
        match (winners, errors) {
            (0, 0) => WinnerErrorRatio::Finite(0.0),
            (_, 0) => WinnerErrorRatio::Unbounded,
            (w, e) => WinnerErrorRatio::Finite(w as f64 / e as f64),
        }
    }

    /// Numeric value, `f64::INFINITY` when unbounded.
    pub fn value(&self) -> f64 {
        match self {
            WinnerErrorRatio::Finite(v) => *v,
            WinnerErrorRatio::Unbounded => f64::INFINITY,
        }
    }

    pub fn is_unbounded(&self) -> bool {
        matches!(self, WinnerErrorRatio::Unbounded)
    }
}

impl Default for WinnerErrorRatio {
    fn default() -> Self {
        WinnerErrorRatio::Finite(0.0)
    }
}

impl fmt::Display for WinnerErrorRatio {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WinnerErrorRatio::Finite(v) => write!(f, "{v}"),
            WinnerErrorRatio::Unbounded => f.write_str("inf"),
        }
    }
}

// JSON has no infinity, so the sentinel travels as the string "inf".
impl Serialize for WinnerErrorRatio {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            WinnerErrorRatio::Finite(v) => serializer.serialize_f64(*v),
            WinnerErrorRatio::Unbounded => serializer.serialize_str("inf"),
        }
    }
}

// ---------------------------------------------------------------------------
// Outcome metrics
// ---------------------------------------------------------------------------

/// Winners and errors by side, for the subject and against the opponent.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct OutcomeMetrics {
    /// Forehand plus backhand winners. Aces and service winners are counted
    /// under serve.
    pub winners: u32,
    pub forehand_winners: u32,
    pub backhand_winners: u32,
    pub unforced_errors: u32,
    pub forehand_errors: u32,
    pub backhand_errors: u32,
    /// Points lost to a double fault, whoever was recorded as serving.
    pub double_faults_lost: u32,
    pub opponent_forehand_errors: u32,
    pub opponent_backhand_errors: u32,
    pub opponent_double_faults: u32,
    /// Opponent forehand and backhand unforced errors plus double faults.
    pub opponent_unforced_errors: u32,
    pub winner_error_ratio: WinnerErrorRatio,
    pub forehand_winner_error_ratio: WinnerErrorRatio,
    pub backhand_winner_error_ratio: WinnerErrorRatio,
    /// Points the subject created: winners + opponent unforced errors.
    pub positive_shots: u32,
    /// Points the subject gave away: unforced errors + double faults.
    pub negative_shots: u32,
    pub net_points: i64,
}

pub fn compute_outcomes(points: &[Point], subject: &str) -> OutcomeMetrics {
    let mut m = OutcomeMetrics::default();

    for p in points {
        let won = p.point_winner == subject;
        match (won, p.detail.as_str()) {
            (true, detail::FOREHAND_WINNER) => m.forehand_winners += 1,
            (true, detail::BACKHAND_WINNER) => m.backhand_winners += 1,
            (true, detail::FOREHAND_UNFORCED_ERROR) => m.opponent_forehand_errors += 1,
            (true, detail::BACKHAND_UNFORCED_ERROR) => m.opponent_backhand_errors += 1,
            (true, detail::DOUBLE_FAULT) => m.opponent_double_faults += 1,
            (false, detail::FOREHAND_UNFORCED_ERROR) => m.forehand_errors += 1,
            (false, detail::BACKHAND_UNFORCED_ERROR) => m.backhand_errors += 1,
            (false, detail::DOUBLE_FAULT) => m.double_faults_lost += 1,
            _ => {}
        }
    }

    m.winners = m.forehand_winners + m.backhand_winners;
    m.unforced_errors = m.forehand_errors + m.backhand_errors;
    m.opponent_unforced_errors =
        m.opponent_forehand_errors + m.opponent_backhand_errors + m.opponent_double_faults;

    m.winner_error_ratio = WinnerErrorRatio::new(m.winners, m.unforced_errors);
    m.forehand_winner_error_ratio = WinnerErrorRatio::new(m.forehand_winners, m.forehand_errors);
    m.backhand_winner_error_ratio = WinnerErrorRatio::new(m.backhand_winners, m.backhand_errors);

    m.positive_shots = m.winners + m.opponent_unforced_errors;
    m.negative_shots = m.unforced_errors + m.double_faults_lost;
    m.net_points = i64::from(m.positive_shots) - i64::from(m.negative_shots);
    m
}

// ---------------------------------------------------------------------------
// Break points
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BreakPointMetrics {
    /// Break points on the opponent's serve.
    pub opportunities: u32,
    pub won: u32,
    pub won_pct: f64,
    /// Break points on the subject's serve.
    pub against: u32,
    pub saved: u32,
    pub saved_pct: f64,
}

pub fn compute_break_points(points: &[Point], subject: &str) -> BreakPointMetrics {
    let mut m = BreakPointMetrics::default();
    for p in points.iter().filter(|p| p.break_point) {
        let won = p.point_winner == subject;
        if p.match_server == subject {
            m.against += 1;
            m.saved += u32::from(won);
        } else {
            m.opportunities += 1;
            m.won += u32::from(won);
        }
    }
    m.won_pct = ratio(m.won, m.opportunities);
    m.saved_pct = ratio(m.saved, m.against);
    m
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{point, SUBJECT};

    const OPP: &str = "Jane Doe";

    /// Helper: `n` copies of a point with the given server/winner/detail.
    fn repeat(n: usize, server: &str, winner: &str, tag: &str) -> Vec<Point> {
        (0..n)
            .map(|i| point(1, 1, i as u32 + 1, server, winner, tag))
            .collect()
    }

    // -----------------------------------------------------------------------
    // Winner/error ratio
    // -----------------------------------------------------------------------

    #[test]
    fn ratio_conventions() {
        assert_eq!(WinnerErrorRatio::new(5, 0), WinnerErrorRatio::Unbounded);
        assert_eq!(WinnerErrorRatio::new(0, 0), WinnerErrorRatio::Finite(0.0));
        assert_eq!(WinnerErrorRatio::new(3, 3), WinnerErrorRatio::Finite(1.0));
        assert_eq!(WinnerErrorRatio::new(0, 4), WinnerErrorRatio::Finite(0.0));
        assert!(WinnerErrorRatio::new(5, 0).value().is_infinite());
    }

    #[test]
    fn unbounded_ratio_serializes_as_inf() {
        let json = serde_json::to_string(&WinnerErrorRatio::Unbounded).unwrap();
        assert_eq!(json, "\"inf\"");
        let json = serde_json::to_string(&WinnerErrorRatio::Finite(1.5)).unwrap();
        assert_eq!(json, "1.5");
        assert_eq!(WinnerErrorRatio::Unbounded.to_string(), "inf");
    }

    // -----------------------------------------------------------------------
    // Outcomes
    // -----------------------------------------------------------------------

    #[test]
    fn net_points_scenario() {
        let mut points = Vec::new();
        points.extend(repeat(2, SUBJECT, SUBJECT, detail::FOREHAND_WINNER));
        points.extend(repeat(2, OPP, SUBJECT, detail::BACKHAND_WINNER));
        points.extend(repeat(4, OPP, SUBJECT, detail::FOREHAND_UNFORCED_ERROR));
        points.extend(repeat(1, SUBJECT, SUBJECT, detail::BACKHAND_UNFORCED_ERROR));
        points.extend(repeat(1, OPP, SUBJECT, detail::DOUBLE_FAULT));
        points.extend(repeat(3, SUBJECT, OPP, detail::FOREHAND_UNFORCED_ERROR));
        points.extend(repeat(1, SUBJECT, OPP, detail::DOUBLE_FAULT));

        let m = compute_outcomes(&points, SUBJECT);

        assert_eq!(m.winners, 4);
        assert_eq!(m.opponent_unforced_errors, 6);
        assert_eq!(m.unforced_errors, 3);
        assert_eq!(m.double_faults_lost, 1);
        assert_eq!(m.positive_shots, 10);
        assert_eq!(m.negative_shots, 4);
        assert_eq!(m.net_points, 6);
    }

    #[test]
    fn net_points_can_be_negative() {
        let points = repeat(3, SUBJECT, OPP, detail::BACKHAND_UNFORCED_ERROR);
        assert_eq!(compute_outcomes(&points, SUBJECT).net_points, -3);
    }

    #[test]
    fn side_ratios_follow_the_conventions() {
        let mut points = repeat(2, SUBJECT, SUBJECT, detail::FOREHAND_WINNER);
        points.extend(repeat(2, SUBJECT, OPP, detail::BACKHAND_UNFORCED_ERROR));

        let m = compute_outcomes(&points, SUBJECT);

        assert_eq!(m.forehand_winner_error_ratio, WinnerErrorRatio::Unbounded);
        assert_eq!(m.backhand_winner_error_ratio, WinnerErrorRatio::Finite(0.0));
        assert_eq!(m.winner_error_ratio, WinnerErrorRatio::Finite(1.0));
    }

    #[test]
    fn aces_are_not_groundstroke_winners() {
        let points = repeat(3, SUBJECT, SUBJECT, detail::ACE);
        let m = compute_outcomes(&points, SUBJECT);
        assert_eq!(m.winners, 0);
        assert_eq!(m.winner_error_ratio, WinnerErrorRatio::Finite(0.0));
    }

    // -----------------------------------------------------------------------
    // Break points
    // -----------------------------------------------------------------------

    #[test]
    fn break_points_split_by_server() {
        let mut points = Vec::new();
        for (server, winner) in [(OPP, SUBJECT), (OPP, OPP), (OPP, OPP), (SUBJECT, SUBJECT)] {
            let mut p = point(1, 1, 1, server, winner, "");
            p.break_point = true;
            points.push(p);
        }
        // Not a break point; ignored.
        points.push(point(1, 1, 2, OPP, SUBJECT, ""));

        let m = compute_break_points(&points, SUBJECT);

        assert_eq!(m.opportunities, 3);
        assert_eq!(m.won, 1);
        assert!((m.won_pct - 1.0 / 3.0).abs() < 1e-9);
        assert_eq!(m.against, 1);
        assert_eq!(m.saved, 1);
        assert_eq!(m.saved_pct, 1.0);
    }

    #[test]
    fn no_break_points_gives_zero_percentages() {
        let m = compute_break_points(&[], SUBJECT);
        assert_eq!(m.won_pct, 0.0);
        assert_eq!(m.saved_pct, 0.0);
    }
}
