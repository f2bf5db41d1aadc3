// Canonical record types for matches, points and shots.

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Role token used by the exports for the recording player.
pub const HOST_TOKEN: &str = "host";

// ---------------------------------------------------------------------------
// Vocabulary
// ---------------------------------------------------------------------------

/// Point `detail` tags that drive winner/error attribution.
pub mod detail {
    pub const ACE: &str = "Ace";
    pub const SERVICE_WINNER: &str = "Service Winner";
    pub const DOUBLE_FAULT: &str = "Double Fault";
    pub const FOREHAND_WINNER: &str = "Forehand Winner";
    pub const BACKHAND_WINNER: &str = "Backhand Winner";
    pub const FOREHAND_UNFORCED_ERROR: &str = "Forehand Unforced Error";
    pub const BACKHAND_UNFORCED_ERROR: &str = "Backhand Unforced Error";
}

/// Shot `type` values.
pub mod shot_type {
    pub const FIRST_SERVE: &str = "first_serve";
    pub const SECOND_SERVE: &str = "second_serve";
    pub const FIRST_RETURN: &str = "first_return";
    pub const SECOND_RETURN: &str = "second_return";
}

/// Shot `stroke` values with special handling.
pub mod stroke {
    pub const FEED: &str = "Feed";
    pub const SERVE: &str = "Serve";
}

/// Shot `result` values.
pub mod shot_result {
    pub const IN: &str = "In";
    pub const OUT: &str = "Out";
    pub const NET: &str = "Net";
}

// ---------------------------------------------------------------------------
// Records
// ---------------------------------------------------------------------------

/// One played match, created from a workbook's Settings sheet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Match {
    pub match_id: Uuid,
    pub start_time: NaiveDateTime,
    pub location: String,
    pub host_team: String,
    pub guest_team: String,
    pub match_date: Option<NaiveDate>,
}

/// Position of a point inside its match. Shots join to points on this key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PointKey {
    pub set: u32,
    pub game: u32,
    pub point: u32,
}

/// One point. `match_server` and `point_winner` hold role tokens
/// ("host"/"guest") as stored, and player names after enrichment.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub match_id: Uuid,
    pub set: u32,
    pub game: u32,
    pub point: u32,
    pub serve_state: String,
    pub match_server: String,
    pub host_game_score: Option<String>,
    pub guest_game_score: Option<String>,
    pub point_winner: String,
    pub detail: String,
    pub break_point: bool,
    pub set_point: bool,
    pub favorited: bool,
    pub start_time: Option<String>,
    pub video_time: Option<f64>,
    pub duration: Option<f64>,
}

impl Point {
    pub fn key(&self) -> PointKey {
        PointKey {
            set: self.set,
            game: self.game,
            point: self.point,
        }
    }
}

/// One stroke within a point.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Shot {
    pub match_id: Uuid,
    pub set: u32,
    pub game: u32,
    pub point: u32,
    pub shot: u32,
    pub player: String,
    #[serde(rename = "type")]
    pub shot_type: String,
    pub stroke: String,
    pub spin: Option<String>,
    pub speed: Option<f64>,
    pub bounce_depth: Option<String>,
    pub bounce_zone: Option<String>,
    pub bounce_side: Option<String>,
    pub bounce_x: Option<f64>,
    pub bounce_y: Option<f64>,
    pub hit_depth: Option<String>,
    pub hit_zone: Option<String>,
    pub hit_side: Option<String>,
    pub hit_x: Option<f64>,
    pub hit_y: Option<f64>,
    pub hit_z: Option<f64>,
    pub direction: Option<String>,
    pub result: String,
    pub favorited: bool,
    pub start_time: Option<String>,
    pub video_time: Option<f64>,
}

impl Shot {
    pub fn key(&self) -> PointKey {
        PointKey {
            set: self.set,
            game: self.game,
            point: self.point,
        }
    }

    /// Feeds are practice set-up strokes, not live play.
    pub fn is_feed(&self) -> bool {
        self.stroke == stroke::FEED
    }

    pub fn is_in(&self) -> bool {
        self.result == shot_result::IN
    }

    /// The ball ended out of play (long/wide or into the net).
    pub fn is_miss(&self) -> bool {
        self.result == shot_result::OUT || self.result == shot_result::NET
    }

    /// Counts toward rally length: anything that is neither a serve nor a feed.
    pub fn is_rally_shot(&self) -> bool {
        self.stroke != stroke::FEED && self.stroke != stroke::SERVE
    }
}

/// The three stored tables, as read back from the database.
#[derive(Debug, Clone, Default)]
pub struct StoredTables {
    pub matches: Vec<Match>,
    pub points: Vec<Point>,
    pub shots: Vec<Shot>,
}
