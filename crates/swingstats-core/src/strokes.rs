// Per-stroke quality of the subject's shots, judged by how points end.

use std::collections::BTreeMap;

use serde::Serialize;
use uuid::Uuid;

use crate::model::{PointKey, Shot};
use crate::stats::ratio;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct StrokeProfile {
    pub stroke: String,
    /// Shots of this stroke hit by the subject.
    pub total: u32,
    /// Subject hit the final shot of the point and it missed.
    pub errors: u32,
    /// Subject hit the final shot of the point and it landed.
    pub winners: u32,
    /// Opponent missed the final shot right after this stroke.
    pub forced_errors: u32,
    /// Opponent's final shot landed after this stroke.
    pub forced_against: u32,
    pub error_pct: f64,
    pub winner_pct: f64,
    pub forced_error_pct: f64,
    pub forced_against_pct: f64,
}

/// Profile every stroke the subject used, worst error rate first.
///
/// `shots` should be free of feeds; any that remain are ignored.
pub fn stroke_profile(shots: &[Shot], subject: &str) -> Vec<StrokeProfile> {
    let mut profiles: BTreeMap<&str, StrokeProfile> = BTreeMap::new();
    let mut by_point: BTreeMap<(Uuid, PointKey), Vec<&Shot>> = BTreeMap::new();

    for s in shots.iter().filter(|s| !s.is_feed()) {
        by_point.entry((s.match_id, s.key())).or_default().push(s);
        if s.player == subject {
            profiles.entry(s.stroke.as_str()).or_default().total += 1;
        }
    }

    for group in by_point.values_mut() {
        group.sort_by_key(|s| s.shot);
        let Some((last, before)) = group.split_last() else {
            continue;
        };

        if last.player == subject {
            let entry = profiles.entry(last.stroke.as_str()).or_default();
            if last.is_in() {
                entry.winners += 1;
            } else if last.is_miss() {
                entry.errors += 1;
            }
            continue;
        }

        let Some(setup) = before.iter().rev().find(|s| s.player == subject) else {
            continue;
        };
        let entry = profiles.entry(setup.stroke.as_str()).or_default();
        if last.is_in() {
            entry.forced_against += 1;
        } else if last.is_miss() {
            entry.forced_errors += 1;
        }
    }

    let mut out: Vec<StrokeProfile> = profiles
        .into_iter()
        .map(|(stroke, mut p)| {
            p.stroke = stroke.to_string();
            p.error_pct = ratio(p.errors, p.total);
            p.winner_pct = ratio(p.winners, p.total);
            p.forced_error_pct = ratio(p.forced_errors, p.total);
            p.forced_against_pct = ratio(p.forced_against, p.total);
            p
        })
        .collect();
    out.sort_by(|a, b| b.error_pct.total_cmp(&a.error_pct));
    out
}
