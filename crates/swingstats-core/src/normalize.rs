// Header normalization: map export column headers onto the canonical schema
// and convert sheet rows into typed records.
//
// Each mapping entry names the source header the export uses and whether the
// rest of the pipeline depends on it. Missing required headers fail the file
// with `SchemaMismatch` instead of silently producing empty columns.

use std::collections::HashMap;

use chrono::NaiveDateTime;
use tracing::debug;
use uuid::Uuid;

use crate::error::IngestError;
use crate::model::{Point, Shot};
use crate::workbook::{Cell, Sheet};

pub const SETTINGS_SHEET: &str = "Settings";
pub const POINTS_SHEET: &str = "Points";
pub const SHOTS_SHEET: &str = "Shots";

/// One source header and the canonical field it fills.
#[derive(Debug, Clone, Copy)]
pub struct ColumnSpec {
    pub source: &'static str,
    pub canonical: &'static str,
    pub required: bool,
}

const fn required(source: &'static str, canonical: &'static str) -> ColumnSpec {
    ColumnSpec {
        source,
        canonical,
        required: true,
    }
}

const fn optional(source: &'static str, canonical: &'static str) -> ColumnSpec {
    ColumnSpec {
        source,
        canonical,
        required: false,
    }
}

pub const POINT_COLUMNS: &[ColumnSpec] = &[
    required("Point", "point"),
    required("Game", "game"),
    required("Set", "set"),
    required("Serve State", "serve_state"),
    required("Match Server", "match_server"),
    required("Host Game Score", "host_game_score"),
    required("Guest Game Score", "guest_game_score"),
    required("Point Winner", "point_winner"),
    required("Detail", "detail"),
    required("Break Point", "break_point"),
    required("Set Point", "set_point"),
    optional("Favorited", "favorited"),
    optional("Start Time", "start_time"),
    optional("Video Time", "video_time"),
    optional("Duration", "duration"),
];

pub const SHOT_COLUMNS: &[ColumnSpec] = &[
    required("Player", "player"),
    required("Shot", "shot"),
    required("Type", "type"),
    required("Stroke", "stroke"),
    optional("Spin", "spin"),
    required("Speed (KM/H)", "speed"),
    required("Point", "point"),
    required("Game", "game"),
    required("Set", "set"),
    optional("Bounce Depth", "bounce_depth"),
    optional("Bounce Zone", "bounce_zone"),
    optional("Bounce Side", "bounce_side"),
    optional("Bounce (x)", "bounce_x"),
    optional("Bounce (y)", "bounce_y"),
    optional("Hit Depth", "hit_depth"),
    optional("Hit Zone", "hit_zone"),
    optional("Hit Side", "hit_side"),
    optional("Hit (x)", "hit_x"),
    optional("Hit (y)", "hit_y"),
    optional("Hit (z)", "hit_z"),
    optional("Direction", "direction"),
    required("Result", "result"),
    optional("Favorited", "favorited"),
    optional("Start Time", "start_time"),
    optional("Video Time", "video_time"),
];

pub const SETTINGS_COLUMNS: &[ColumnSpec] = &[
    required("Start Time", "start_time"),
    required("Location", "location"),
    required("Host Team", "host_team"),
    required("Guest Team", "guest_team"),
];

// ---------------------------------------------------------------------------
// Column resolution
// ---------------------------------------------------------------------------

/// Canonical field → column index for one sheet.
pub struct ColumnMap<'a> {
    sheet: &'a Sheet,
    index: HashMap<&'static str, usize>,
}

/// Resolve `specs` against the sheet headers. Fails with every missing
/// required header listed.
pub fn resolve_columns<'a>(
    sheet: &'a Sheet,
    specs: &[ColumnSpec],
) -> Result<ColumnMap<'a>, IngestError> {
    let mut index = HashMap::new();
    let mut missing = Vec::new();

    for spec in specs {
        match sheet.column(spec.source) {
            Some(col) => {
                index.insert(spec.canonical, col);
            }
            None if spec.required => missing.push(spec.source.to_string()),
            None => {}
        }
    }

    if !missing.is_empty() {
        return Err(IngestError::SchemaMismatch {
            sheet: sheet.name().to_string(),
            missing,
        });
    }

    for header in sheet.headers() {
        if !specs.iter().any(|s| s.source == header) {
            debug!("sheet `{}`: ignoring unmapped column `{}`", sheet.name(), header);
        }
    }

    Ok(ColumnMap { sheet, index })
}

impl ColumnMap<'_> {
    fn cell(&self, row: usize, field: &str) -> &Cell {
        static EMPTY: Cell = Cell::Empty;
        match self.index.get(field) {
            Some(&col) => self.sheet.cell(row, col),
            None => &EMPTY,
        }
    }

    fn invalid(&self, row: usize, field: &str, message: &str) -> IngestError {
        IngestError::InvalidCell {
            sheet: self.sheet.name().to_string(),
            // 1-based, counting the header row, to match what a spreadsheet shows.
            row: row + 2,
            column: field.to_string(),
            message: message.to_string(),
        }
    }

    fn index_value(&self, row: usize, field: &str) -> Result<u32, IngestError> {
        let cell = self.cell(row, field);
        if cell.is_empty() {
            return Err(self.invalid(row, field, "is empty"));
        }
        cell.as_u32()
            .ok_or_else(|| self.invalid(row, field, "is not a whole number"))
    }

    fn text(&self, row: usize, field: &str) -> Option<String> {
        self.cell(row, field).as_text()
    }

    fn text_or_empty(&self, row: usize, field: &str) -> String {
        self.text(row, field).unwrap_or_default()
    }

    fn number(&self, row: usize, field: &str) -> Result<Option<f64>, IngestError> {
        let cell = self.cell(row, field);
        if cell.is_empty() {
            return Ok(None);
        }
        cell.as_f64()
            .map(Some)
            .ok_or_else(|| self.invalid(row, field, "is not a number"))
    }

    /// Empty flags read as false.
    fn flag(&self, row: usize, field: &str) -> Result<bool, IngestError> {
        let cell = self.cell(row, field);
        if cell.is_empty() {
            return Ok(false);
        }
        cell.as_bool()
            .ok_or_else(|| self.invalid(row, field, "is not a boolean"))
    }

    fn datetime(&self, row: usize, field: &str) -> Option<NaiveDateTime> {
        self.cell(row, field).as_datetime()
    }
}

// ---------------------------------------------------------------------------
// Record conversion
// ---------------------------------------------------------------------------

/// Convert a Points sheet into canonical points tagged with `match_id`.
pub fn normalize_points(sheet: &Sheet, match_id: Uuid) -> Result<Vec<Point>, IngestError> {
    let cols = resolve_columns(sheet, POINT_COLUMNS)?;
    let mut points = Vec::with_capacity(sheet.row_count());

    for row in 0..sheet.row_count() {
        if sheet.is_blank_row(row) {
            continue;
        }
        points.push(Point {
            match_id,
            set: cols.index_value(row, "set")?,
            game: cols.index_value(row, "game")?,
            point: cols.index_value(row, "point")?,
            serve_state: cols.text_or_empty(row, "serve_state"),
            match_server: cols.text_or_empty(row, "match_server"),
            host_game_score: cols.text(row, "host_game_score"),
            guest_game_score: cols.text(row, "guest_game_score"),
            point_winner: cols.text_or_empty(row, "point_winner"),
            detail: cols.text_or_empty(row, "detail"),
            break_point: cols.flag(row, "break_point")?,
            set_point: cols.flag(row, "set_point")?,
            favorited: cols.flag(row, "favorited")?,
            start_time: cols.text(row, "start_time"),
            video_time: cols.number(row, "video_time")?,
            duration: cols.number(row, "duration")?,
        });
    }

    Ok(points)
}

/// Convert a Shots sheet into canonical shots tagged with `match_id`.
pub fn normalize_shots(sheet: &Sheet, match_id: Uuid) -> Result<Vec<Shot>, IngestError> {
    let cols = resolve_columns(sheet, SHOT_COLUMNS)?;
    let mut shots = Vec::with_capacity(sheet.row_count());

    for row in 0..sheet.row_count() {
        if sheet.is_blank_row(row) {
            continue;
        }
        shots.push(Shot {
            match_id,
            set: cols.index_value(row, "set")?,
            game: cols.index_value(row, "game")?,
            point: cols.index_value(row, "point")?,
            shot: cols.index_value(row, "shot")?,
            player: cols.text_or_empty(row, "player"),
            shot_type: cols.text_or_empty(row, "type"),
            stroke: cols.text_or_empty(row, "stroke"),
            spin: cols.text(row, "spin"),
            speed: cols.number(row, "speed")?,
            bounce_depth: cols.text(row, "bounce_depth"),
            bounce_zone: cols.text(row, "bounce_zone"),
            bounce_side: cols.text(row, "bounce_side"),
            bounce_x: cols.number(row, "bounce_x")?,
            bounce_y: cols.number(row, "bounce_y")?,
            hit_depth: cols.text(row, "hit_depth"),
            hit_zone: cols.text(row, "hit_zone"),
            hit_side: cols.text(row, "hit_side"),
            hit_x: cols.number(row, "hit_x")?,
            hit_y: cols.number(row, "hit_y")?,
            hit_z: cols.number(row, "hit_z")?,
            direction: cols.text(row, "direction"),
            result: cols.text_or_empty(row, "result"),
            favorited: cols.flag(row, "favorited")?,
            start_time: cols.text(row, "start_time"),
            video_time: cols.number(row, "video_time")?,
        });
    }

    Ok(shots)
}

/// Match metadata read from the first data row of the Settings sheet.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchSettings {
    pub start_time: NaiveDateTime,
    pub location: String,
    pub host_team: String,
    pub guest_team: String,
}

/// Read match metadata. Missing headers, a missing data row or an
/// unparseable start time are metadata failures; blank names read as "".
pub fn read_settings(sheet: &Sheet) -> Result<MatchSettings, IngestError> {
    let cols = resolve_columns(sheet, SETTINGS_COLUMNS).map_err(|e| match e {
        IngestError::SchemaMismatch { missing, .. } => IngestError::MetadataExtraction {
            message: format!("Settings sheet lacks {}", missing.join(", ")),
        },
        other => other,
    })?;

    if sheet.row_count() == 0 || sheet.is_blank_row(0) {
        return Err(IngestError::MetadataExtraction {
            message: "Settings sheet has no data row".into(),
        });
    }

    let start_time =
        cols.datetime(0, "start_time")
            .ok_or_else(|| IngestError::MetadataExtraction {
                message: format!(
                    "unparseable start time {:?}",
                    cols.text(0, "start_time").unwrap_or_default()
                ),
            })?;

    Ok(MatchSettings {
        start_time,
        location: cols.text_or_empty(0, "location"),
        host_team: cols.text_or_empty(0, "host_team"),
        guest_team: cols.text_or_empty(0, "guest_team"),
    })
}
