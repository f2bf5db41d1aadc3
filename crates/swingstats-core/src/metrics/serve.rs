// Serve and return statistics.
//
// Percentages that depend on whether a serve landed join the subject's serve
// (or return) shots back to points on (set, game, point). Each point counts
// once however many matching shots it has.

use std::collections::HashSet;

use serde::Serialize;

use crate::model::{detail, shot_type, Point, PointKey, Shot};
use crate::stats::{mean, ratio};

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ServeMetrics {
    pub total_serve_points: u32,
    pub aces: u32,
    pub service_winners: u32,
    pub double_faults: u32,
    /// First serves in over serve points.
    pub first_serve_pct: f64,
    /// Points won over first serves in.
    pub first_serve_won_pct: f64,
    /// Second serves in over second serve attempts.
    pub second_serve_pct: f64,
    pub second_serve_won_pct: f64,
    pub first_serve_speed: f64,
    pub second_serve_speed: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ReturnMetrics {
    pub return_points: u32,
    pub return_points_won: u32,
    pub return_points_won_pct: f64,
    pub first_return_won_pct: f64,
    pub second_return_won_pct: f64,
    pub first_return_speed: f64,
    pub second_return_speed: f64,
}

/// Serve statistics over the points `subject` served. `subject_shots` are the
/// subject's shots in the same match.
pub fn compute_serve(points: &[Point], subject_shots: &[&Shot], subject: &str) -> ServeMetrics {
    let serve_points: Vec<&Point> = points.iter().filter(|p| p.match_server == subject).collect();
    if serve_points.is_empty() {
        return ServeMetrics::default();
    }

    let won_with = |tag: &str| {
        serve_points
            .iter()
            .filter(|p| p.point_winner == subject && p.detail == tag)
            .count() as u32
    };
    let aces = won_with(detail::ACE);
    let service_winners = won_with(detail::SERVICE_WINNER);
    let double_faults = serve_points
        .iter()
        .filter(|p| p.point_winner != subject && p.detail == detail::DOUBLE_FAULT)
        .count() as u32;

    let first: Vec<&Shot> = of_type(subject_shots, shot_type::FIRST_SERVE);
    let second: Vec<&Shot> = of_type(subject_shots, shot_type::SECOND_SERVE);

    // Counted in distinct points, not shot rows.
    let first_landed = landed_keys(&first);
    let second_landed = landed_keys(&second);
    let first_in = first_landed.len() as u32;
    let second_in = second_landed.len() as u32;
    let second_attempts = all_keys(&second).len() as u32;

    let first_won = points_won_at(&serve_points, first_landed, subject);
    let second_won = points_won_at(&serve_points, second_landed, subject);

    ServeMetrics {
        total_serve_points: serve_points.len() as u32,
        aces,
        service_winners,
        double_faults,
        first_serve_pct: ratio(first_in, serve_points.len() as u32),
        first_serve_won_pct: ratio(first_won.won, first_in),
        second_serve_pct: ratio(second_in, second_attempts),
        second_serve_won_pct: ratio(second_won.won, second_in),
        first_serve_speed: mean(first.iter().map(|s| s.speed)),
        second_serve_speed: mean(second.iter().map(|s| s.speed)),
    }
}

/// Return statistics over the points the opponent served.
pub fn compute_returns(points: &[Point], subject_shots: &[&Shot], subject: &str) -> ReturnMetrics {
    let return_points: Vec<&Point> = points.iter().filter(|p| p.match_server != subject).collect();
    if return_points.is_empty() {
        return ReturnMetrics::default();
    }

    let return_points_won = return_points
        .iter()
        .filter(|p| p.point_winner == subject)
        .count() as u32;

    let first = of_type(subject_shots, shot_type::FIRST_RETURN);
    let second = of_type(subject_shots, shot_type::SECOND_RETURN);

    let first_tally = points_won_at(&return_points, all_keys(&first), subject);
    let second_tally = points_won_at(&return_points, all_keys(&second), subject);

    ReturnMetrics {
        return_points: return_points.len() as u32,
        return_points_won,
        return_points_won_pct: ratio(return_points_won, return_points.len() as u32),
        first_return_won_pct: ratio(first_tally.won, first_tally.played),
        second_return_won_pct: ratio(second_tally.won, second_tally.played),
        first_return_speed: mean(first.iter().map(|s| s.speed)),
        second_return_speed: mean(second.iter().map(|s| s.speed)),
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

struct Tally {
    played: u32,
    won: u32,
}

fn of_type<'a>(shots: &[&'a Shot], kind: &str) -> Vec<&'a Shot> {
    shots.iter().copied().filter(|s| s.shot_type == kind).collect()
}

fn landed_keys(shots: &[&Shot]) -> HashSet<PointKey> {
    shots.iter().filter(|s| s.is_in()).map(|s| s.key()).collect()
}

fn all_keys(shots: &[&Shot]) -> HashSet<PointKey> {
    shots.iter().map(|s| s.key()).collect()
}

/// Points whose key is in `keys`, and how many of them `subject` won.
fn points_won_at(points: &[&Point], keys: HashSet<PointKey>, subject: &str) -> Tally {
    points
        .iter()
        .filter(|p| keys.contains(&p.key()))
        .fold(Tally { played: 0, won: 0 }, |mut t, p| {
            t.played += 1;
            if p.point_winner == subject {
                t.won += 1;
            }
            t
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{point, shot, SUBJECT};

    const OPP: &str = "Jane Doe";

    /// Helper: a subject serve of `kind` with the given result and speed.
    fn serve(pt: u32, kind: &str, result: &str, speed: f64) -> Shot {
        Shot {
            speed: Some(speed),
            ..shot(1, 1, pt, 1, SUBJECT, kind, "Serve", result)
        }
    }

    #[test]
    fn serve_percentages_join_shots_to_points() {
        let points = vec![
            point(1, 1, 1, SUBJECT, SUBJECT, detail::ACE),
            point(1, 1, 2, SUBJECT, OPP, ""),
            point(1, 1, 3, SUBJECT, SUBJECT, ""),
            point(1, 1, 4, SUBJECT, OPP, detail::DOUBLE_FAULT),
            point(1, 2, 1, OPP, SUBJECT, ""),
        ];
        let shots = vec![
            serve(1, shot_type::FIRST_SERVE, "In", 180.0),
            serve(2, shot_type::FIRST_SERVE, "In", 170.0),
            serve(3, shot_type::FIRST_SERVE, "Out", 175.0),
            serve(3, shot_type::SECOND_SERVE, "In", 130.0),
            serve(4, shot_type::FIRST_SERVE, "Net", 165.0),
            serve(4, shot_type::SECOND_SERVE, "Out", 140.0),
        ];
        let subject_shots: Vec<&Shot> = shots.iter().collect();

        let m = compute_serve(&points, &subject_shots, SUBJECT);

        assert_eq!(m.total_serve_points, 4);
        assert_eq!(m.aces, 1);
        assert_eq!(m.double_faults, 1);
        assert_eq!(m.first_serve_pct, 0.5);
        assert_eq!(m.first_serve_won_pct, 0.5);
        assert_eq!(m.second_serve_pct, 0.5);
        assert_eq!(m.second_serve_won_pct, 1.0);
        assert_eq!(m.first_serve_speed, 172.5);
        assert_eq!(m.second_serve_speed, 135.0);
    }

    #[test]
    fn duplicate_serve_rows_count_a_point_once() {
        let points = vec![point(1, 1, 1, SUBJECT, SUBJECT, "")];
        let shots = vec![
            serve(1, shot_type::FIRST_SERVE, "In", 180.0),
            serve(1, shot_type::FIRST_SERVE, "In", 180.0),
        ];
        let subject_shots: Vec<&Shot> = shots.iter().collect();

        let m = compute_serve(&points, &subject_shots, SUBJECT);
        assert_eq!(m.first_serve_pct, 1.0);
        assert_eq!(m.first_serve_won_pct, 1.0);
    }

    #[test]
    fn repeated_second_serve_rows_stay_within_one() {
        let points = vec![point(1, 1, 1, SUBJECT, OPP, "")];
        let shots = vec![
            serve(1, shot_type::FIRST_SERVE, "Out", 180.0),
            serve(1, shot_type::SECOND_SERVE, "In", 130.0),
            serve(1, shot_type::SECOND_SERVE, "In", 130.0),
        ];
        let subject_shots: Vec<&Shot> = shots.iter().collect();

        let m = compute_serve(&points, &subject_shots, SUBJECT);

        assert_eq!(m.first_serve_pct, 0.0);
        assert_eq!(m.second_serve_pct, 1.0);
        assert_eq!(m.second_serve_won_pct, 0.0);
    }

    #[test]
    fn no_serve_points_gives_zeros() {
        let points = vec![point(1, 1, 1, OPP, SUBJECT, "")];
        let m = compute_serve(&points, &[], SUBJECT);
        assert_eq!(m, ServeMetrics::default());
    }

    #[test]
    fn first_return_won_pct_is_zero_without_opponent_serves() {
        let points = vec![point(1, 1, 1, SUBJECT, SUBJECT, "")];
        let m = compute_returns(&points, &[], SUBJECT);
        assert_eq!(m.first_return_won_pct, 0.0);
        assert_eq!(m.return_points_won_pct, 0.0);
    }

    #[test]
    fn return_percentages_use_return_shots() {
        let points = vec![
            point(1, 2, 1, OPP, SUBJECT, ""),
            point(1, 2, 2, OPP, OPP, ""),
            point(1, 2, 3, OPP, SUBJECT, ""),
        ];
        let shots = vec![
            Shot {
                speed: Some(90.0),
                ..shot(1, 2, 1, 2, SUBJECT, shot_type::FIRST_RETURN, "Forehand", "In")
            },
            Shot {
                speed: Some(70.0),
                ..shot(1, 2, 2, 2, SUBJECT, shot_type::FIRST_RETURN, "Backhand", "Out")
            },
            shot(1, 2, 3, 3, SUBJECT, shot_type::SECOND_RETURN, "Forehand", "In"),
        ];
        let subject_shots: Vec<&Shot> = shots.iter().collect();

        let m = compute_returns(&points, &subject_shots, SUBJECT);

        assert_eq!(m.return_points, 3);
        assert_eq!(m.return_points_won, 2);
        assert_eq!(m.first_return_won_pct, 0.5);
        assert_eq!(m.second_return_won_pct, 1.0);
        assert_eq!(m.first_return_speed, 80.0);
        // Second return has no speed reading.
        assert_eq!(m.second_return_speed, 0.0);
    }
}
