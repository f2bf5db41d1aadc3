// Shared builders for unit tests.

use chrono::NaiveDate;

use crate::identity::derive_match_identity;
use crate::model::{Match, Point, Shot};

pub const SUBJECT: &str = "Joao Cassis";

/// A dated match against `guest`, with an id derived from its metadata.
pub fn sample_match(guest: &str) -> Match {
    let start_time = NaiveDate::from_ymd_opt(2024, 6, 15)
        .unwrap()
        .and_hms_opt(10, 30, 0)
        .unwrap();
    Match {
        match_id: derive_match_identity(start_time, "Riverside Club", SUBJECT, guest),
        start_time,
        location: "Riverside Club".into(),
        host_team: SUBJECT.into(),
        guest_team: guest.into(),
        match_date: NaiveDate::from_ymd_opt(2024, 6, 15),
    }
}

pub fn point(set: u32, game: u32, pt: u32, server: &str, winner: &str, detail: &str) -> Point {
    Point {
        set,
        game,
        point: pt,
        serve_state: "first_serve".into(),
        match_server: server.into(),
        point_winner: winner.into(),
        detail: detail.into(),
        ..Default::default()
    }
}

/// Same as [`point`] with game-score tokens.
pub fn scored_point(
    set: u32,
    game: u32,
    pt: u32,
    server: &str,
    winner: &str,
    host_score: &str,
    guest_score: &str,
) -> Point {
    Point {
        host_game_score: Some(host_score.into()),
        guest_game_score: Some(guest_score.into()),
        ..point(set, game, pt, server, winner, "")
    }
}

#[allow(clippy::too_many_arguments)]
pub fn shot(
    set: u32,
    game: u32,
    pt: u32,
    n: u32,
    player: &str,
    shot_type: &str,
    stroke: &str,
    result: &str,
) -> Shot {
    Shot {
        set,
        game,
        point: pt,
        shot: n,
        player: player.into(),
        shot_type: shot_type.into(),
        stroke: stroke.into(),
        result: result.into(),
        ..Default::default()
    }
}
