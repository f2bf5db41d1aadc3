// Join points to their match and resolve role tokens into player names;
// prepare shots for analysis.

use std::collections::{BTreeMap, HashMap};

use tracing::warn;
use uuid::Uuid;

use crate::model::{Match, Point, Shot, StoredTables, HOST_TOKEN};

pub const DOWN_THE_LINE: &str = "down the line";
pub const CROSS_COURT: &str = "cross court";

/// Tables ready for the metrics engine: points carry player names, shots are
/// free of feeds.
#[derive(Debug, Clone, Default)]
pub struct AnalysisTables {
    pub matches: Vec<Match>,
    pub points: Vec<Point>,
    pub shots: Vec<Shot>,
}

impl AnalysisTables {
    pub fn prepare(tables: &StoredTables, subject: &str) -> Self {
        Self {
            matches: tables.matches.clone(),
            points: enrich(&tables.points, &tables.matches, subject),
            shots: prepare_shots(&tables.shots),
        }
    }
}

/// "host" resolves to the analysis subject; any other token is the opponent.
pub fn resolve_role(token: &str, subject: &str, guest_team: &str) -> String {
    if token == HOST_TOKEN {
        subject.to_string()
    } else {
        guest_team.to_string()
    }
}

/// Left-join points to matches on `match_id` and replace the role tokens in
/// `match_server` and `point_winner`. Pure: the inputs are not modified.
///
/// A point whose match is unknown still has "host" resolved to the subject;
/// with no guest name, other tokens are kept as they are.
pub fn enrich(points: &[Point], matches: &[Match], subject: &str) -> Vec<Point> {
    let guests: HashMap<Uuid, &str> = matches
        .iter()
        .map(|m| (m.match_id, m.guest_team.as_str()))
        .collect();

    let mut orphans: BTreeMap<Uuid, usize> = BTreeMap::new();
    let enriched = points
        .iter()
        .map(|p| {
            let mut out = p.clone();
            match guests.get(&p.match_id) {
                Some(guest) => {
                    out.match_server = resolve_role(&p.match_server, subject, guest);
                    out.point_winner = resolve_role(&p.point_winner, subject, guest);
                }
                None => {
                    out.match_server = resolve_role(&p.match_server, subject, &p.match_server);
                    out.point_winner = resolve_role(&p.point_winner, subject, &p.point_winner);
                    *orphans.entry(p.match_id).or_default() += 1;
                }
            }
            out
        })
        .collect();

    for (match_id, count) in &orphans {
        warn!(%match_id, "{count} points reference a match that is not stored; opponent name unknown");
    }
    enriched
}

/// Classify a shot's direction from the sign of its lateral hit and bounce
/// coordinates. Mirroring a shot hit from the far half flips both signs, so
/// the comparison holds for either end of the court.
pub fn derive_direction(hit_x: f64, bounce_x: f64) -> Option<&'static str> {
    if hit_x == 0.0 || bounce_x == 0.0 {
        return None;
    }
    if (hit_x < 0.0) == (bounce_x < 0.0) {
        Some(DOWN_THE_LINE)
    } else {
        Some(CROSS_COURT)
    }
}

/// Drop feed strokes and fill `direction` from geometry where it can be
/// derived; otherwise the exported value is kept.
pub fn prepare_shots(shots: &[Shot]) -> Vec<Shot> {
    shots
        .iter()
        .filter(|s| !s.is_feed())
        .map(|s| {
            let mut out = s.clone();
            if let (Some(hx), Some(bx)) = (s.hit_x, s.bounce_x) {
                if let Some(direction) = derive_direction(hx, bx) {
                    out.direction = Some(direction.to_string());
                }
            }
            out
        })
        .collect()
}
