// SQLite persistence for ingested matches, points and shots.

use std::collections::HashSet;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use anyhow::{Context, Result};
use chrono::{NaiveDate, NaiveDateTime};
use rusqlite::types::Type;
use rusqlite::{params, Connection, Row, Transaction};
use uuid::Uuid;

use crate::model::{Match, Point, Shot, StoredTables};

pub const DEFAULT_BUSY_TIMEOUT_MS: u32 = 5000;

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
const DATE_FORMAT: &str = "%Y-%m-%d";

/// SQLite-backed store for the three match tables. Insert-only from the
/// ingestion side; reads return whole tables.
///
/// One `Database` is opened per process and passed by reference to the
/// ingestion and metrics components.
pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    /// Open (or create) a SQLite database at `path` and ensure all tables
    /// exist. Pass `":memory:"` for an ephemeral in-memory database (useful
    /// for tests).
    pub fn open(path: &str) -> Result<Self> {
        Self::open_with_busy_timeout(path, DEFAULT_BUSY_TIMEOUT_MS)
    }

    /// Same as [`Database::open`] with an explicit busy timeout. Missing
    /// parent directories of an on-disk `path` are created.
    pub fn open_with_busy_timeout(path: &str, busy_timeout_ms: u32) -> Result<Self> {
        if path != ":memory:" {
            if let Some(parent) = Path::new(path).parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent).with_context(|| {
                    format!("failed to create database directory {}", parent.display())
                })?;
            }
        }

        let conn = Connection::open(path)
            .with_context(|| format!("failed to open database at {path}"))?;

        conn.execute_batch(&format!(
            "PRAGMA journal_mode = WAL;
             PRAGMA busy_timeout = {busy_timeout_ms};
             PRAGMA foreign_keys = ON;"
        ))
        .context("failed to set database pragmas")?;

        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS swingvision_matches (
                match_id    TEXT PRIMARY KEY,
                start_time  TEXT NOT NULL,
                location    TEXT NOT NULL,
                host_team   TEXT NOT NULL,
                guest_team  TEXT NOT NULL,
                match_date  TEXT,
                ingested_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
            );

            CREATE TABLE IF NOT EXISTS swingvision_points (
                match_id         TEXT NOT NULL REFERENCES swingvision_matches(match_id),
                "set"            INTEGER NOT NULL,
                game             INTEGER NOT NULL,
                point            INTEGER NOT NULL,
                serve_state      TEXT NOT NULL,
                match_server     TEXT NOT NULL,
                host_game_score  TEXT,
                guest_game_score TEXT,
                point_winner     TEXT NOT NULL,
                detail           TEXT NOT NULL,
                break_point      INTEGER NOT NULL,
                set_point        INTEGER NOT NULL,
                favorited        INTEGER NOT NULL,
                start_time       TEXT,
                video_time       REAL,
                duration         REAL,
                PRIMARY KEY (match_id, "set", game, point)
            );

            CREATE TABLE IF NOT EXISTS swingvision_shots (
                match_id     TEXT NOT NULL REFERENCES swingvision_matches(match_id),
                "set"        INTEGER NOT NULL,
                game         INTEGER NOT NULL,
                point        INTEGER NOT NULL,
                shot         INTEGER NOT NULL,
                player       TEXT NOT NULL,
                type         TEXT NOT NULL,
                stroke       TEXT NOT NULL,
                spin         TEXT,
                speed        REAL,
                bounce_depth TEXT,
                bounce_zone  TEXT,
                bounce_side  TEXT,
                bounce_x     REAL,
                bounce_y     REAL,
                hit_depth    TEXT,
                hit_zone     TEXT,
                hit_side     TEXT,
                hit_x        REAL,
                hit_y        REAL,
                hit_z        REAL,
                direction    TEXT,
                result       TEXT NOT NULL,
                favorited    INTEGER NOT NULL,
                start_time   TEXT,
                video_time   REAL,
                PRIMARY KEY (match_id, "set", game, point, shot)
            );
            "#,
        )
        .context("failed to create database schema")?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Acquire the database connection.
    ///
    /// Panics if the mutex is poisoned (another thread panicked while
    /// holding the lock). This should never happen in normal operation.
    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().expect("database mutex poisoned")
    }

    /// Liveness check run before first use.
    pub fn ping(&self) -> Result<()> {
        let conn = self.conn();
        let one: i64 = conn
            .query_row("SELECT 1", [], |row| row.get(0))
            .context("database ping failed")?;
        anyhow::ensure!(one == 1, "database ping returned {one}");
        Ok(())
    }

    /// Run `f` inside a single transaction. The transaction commits only if
    /// `f` returns `Ok`; any error rolls back everything `f` wrote.
    pub fn with_transaction<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Transaction<'_>) -> Result<T>,
    {
        let mut conn = self.conn();
        let tx = conn.transaction().context("failed to begin transaction")?;
        let value = f(&tx)?;
        tx.commit().context("failed to commit transaction")?;
        Ok(value)
    }

    // ------------------------------------------------------------------
    // Writes (run inside `with_transaction`)
    // ------------------------------------------------------------------

    /// Insert one match row. A duplicate `match_id` is an error, not a no-op.
    pub fn insert_match(conn: &Connection, m: &Match) -> Result<()> {
        conn.execute(
            "INSERT INTO swingvision_matches
                (match_id, start_time, location, host_team, guest_team, match_date)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                m.match_id.to_string(),
                m.start_time.format(TIMESTAMP_FORMAT).to_string(),
                m.location,
                m.host_team,
                m.guest_team,
                m.match_date.map(|d| d.format(DATE_FORMAT).to_string()),
            ],
        )
        .context("failed to insert match")?;
        Ok(())
    }

    pub fn insert_points(conn: &Connection, points: &[Point]) -> Result<usize> {
        let mut stmt = conn
            .prepare_cached(
                r#"INSERT INTO swingvision_points
                    (match_id, "set", game, point, serve_state, match_server,
                     host_game_score, guest_game_score, point_winner, detail,
                     break_point, set_point, favorited, start_time, video_time, duration)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16)"#,
            )
            .context("failed to prepare point insert")?;

        for p in points {
            stmt.execute(params![
                p.match_id.to_string(),
                p.set,
                p.game,
                p.point,
                p.serve_state,
                p.match_server,
                p.host_game_score,
                p.guest_game_score,
                p.point_winner,
                p.detail,
                p.break_point,
                p.set_point,
                p.favorited,
                p.start_time,
                p.video_time,
                p.duration,
            ])
            .with_context(|| {
                format!(
                    "failed to insert point (set {}, game {}, point {})",
                    p.set, p.game, p.point
                )
            })?;
        }
        Ok(points.len())
    }

    pub fn insert_shots(conn: &Connection, shots: &[Shot]) -> Result<usize> {
        let mut stmt = conn
            .prepare_cached(
                r#"INSERT INTO swingvision_shots
                    (match_id, "set", game, point, shot, player, type, stroke, spin, speed,
                     bounce_depth, bounce_zone, bounce_side, bounce_x, bounce_y,
                     hit_depth, hit_zone, hit_side, hit_x, hit_y, hit_z,
                     direction, result, favorited, start_time, video_time)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13,
                         ?14, ?15, ?16, ?17, ?18, ?19, ?20, ?21, ?22, ?23, ?24, ?25, ?26)"#,
            )
            .context("failed to prepare shot insert")?;

        for s in shots {
            stmt.execute(params![
                s.match_id.to_string(),
                s.set,
                s.game,
                s.point,
                s.shot,
                s.player,
                s.shot_type,
                s.stroke,
                s.spin,
                s.speed,
                s.bounce_depth,
                s.bounce_zone,
                s.bounce_side,
                s.bounce_x,
                s.bounce_y,
                s.hit_depth,
                s.hit_zone,
                s.hit_side,
                s.hit_x,
                s.hit_y,
                s.hit_z,
                s.direction,
                s.result,
                s.favorited,
                s.start_time,
                s.video_time,
            ])
            .with_context(|| {
                format!(
                    "failed to insert shot {} (set {}, game {}, point {})",
                    s.shot, s.set, s.game, s.point
                )
            })?;
        }
        Ok(shots.len())
    }

    /// Persist a match with all of its points and shots as one unit. Either
    /// all three writes land or none do.
    pub fn store_match_bundle(&self, m: &Match, points: &[Point], shots: &[Shot]) -> Result<()> {
        self.with_transaction(|tx| {
            Self::insert_match(tx, m)?;
            Self::insert_points(tx, points)?;
            Self::insert_shots(tx, shots)?;
            Ok(())
        })
    }

    // ------------------------------------------------------------------
    // Reads
    // ------------------------------------------------------------------

    /// Ids of every stored match: the deduplication set.
    pub fn known_match_ids(&self) -> Result<HashSet<Uuid>> {
        let conn = self.conn();
        let mut stmt = conn
            .prepare("SELECT match_id FROM swingvision_matches")
            .context("failed to prepare match id query")?;
        let ids = stmt
            .query_map([], |row| uuid_column(row, 0))
            .context("failed to query match ids")?
            .collect::<std::result::Result<HashSet<_>, _>>()
            .context("failed to map match id rows")?;
        Ok(ids)
    }

    /// Return the number of stored matches.
    pub fn match_count(&self) -> Result<usize> {
        let conn = self.conn();
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM swingvision_matches", [], |row| {
                row.get(0)
            })
            .context("failed to count matches")?;
        Ok(count as usize)
    }

    /// Read all three tables. Matches come back in start-time order, points
    /// and shots in (match, set, game, point[, shot]) order.
    pub fn load_tables(&self) -> Result<StoredTables> {
        let conn = self.conn();

        let matches = conn
            .prepare(
                "SELECT match_id, start_time, location, host_team, guest_team, match_date
                 FROM swingvision_matches ORDER BY start_time, match_id",
            )
            .context("failed to prepare match query")?
            .query_map([], |row| {
                Ok(Match {
                    match_id: uuid_column(row, 0)?,
                    start_time: datetime_column(row, 1)?,
                    location: row.get(2)?,
                    host_team: row.get(3)?,
                    guest_team: row.get(4)?,
                    match_date: date_column(row, 5)?,
                })
            })
            .context("failed to query matches")?
            .collect::<std::result::Result<Vec<_>, _>>()
            .context("failed to map match rows")?;

        let points = conn
            .prepare(
                r#"SELECT match_id, "set", game, point, serve_state, match_server,
                          host_game_score, guest_game_score, point_winner, detail,
                          break_point, set_point, favorited, start_time, video_time, duration
                   FROM swingvision_points ORDER BY match_id, "set", game, point"#,
            )
            .context("failed to prepare point query")?
            .query_map([], |row| {
                Ok(Point {
                    match_id: uuid_column(row, 0)?,
                    set: row.get(1)?,
                    game: row.get(2)?,
                    point: row.get(3)?,
                    serve_state: row.get(4)?,
                    match_server: row.get(5)?,
                    host_game_score: row.get(6)?,
                    guest_game_score: row.get(7)?,
                    point_winner: row.get(8)?,
                    detail: row.get(9)?,
                    break_point: row.get(10)?,
                    set_point: row.get(11)?,
                    favorited: row.get(12)?,
                    start_time: row.get(13)?,
                    video_time: row.get(14)?,
                    duration: row.get(15)?,
                })
            })
            .context("failed to query points")?
            .collect::<std::result::Result<Vec<_>, _>>()
            .context("failed to map point rows")?;

        let shots = conn
            .prepare(
                r#"SELECT match_id, "set", game, point, shot, player, type, stroke, spin, speed,
                          bounce_depth, bounce_zone, bounce_side, bounce_x, bounce_y,
                          hit_depth, hit_zone, hit_side, hit_x, hit_y, hit_z,
                          direction, result, favorited, start_time, video_time
                   FROM swingvision_shots ORDER BY match_id, "set", game, point, shot"#,
            )
            .context("failed to prepare shot query")?
            .query_map([], |row| {
                Ok(Shot {
                    match_id: uuid_column(row, 0)?,
                    set: row.get(1)?,
                    game: row.get(2)?,
                    point: row.get(3)?,
                    shot: row.get(4)?,
                    player: row.get(5)?,
                    shot_type: row.get(6)?,
                    stroke: row.get(7)?,
                    spin: row.get(8)?,
                    speed: row.get(9)?,
                    bounce_depth: row.get(10)?,
                    bounce_zone: row.get(11)?,
                    bounce_side: row.get(12)?,
                    bounce_x: row.get(13)?,
                    bounce_y: row.get(14)?,
                    hit_depth: row.get(15)?,
                    hit_zone: row.get(16)?,
                    hit_side: row.get(17)?,
                    hit_x: row.get(18)?,
                    hit_y: row.get(19)?,
                    hit_z: row.get(20)?,
                    direction: row.get(21)?,
                    result: row.get(22)?,
                    favorited: row.get(23)?,
                    start_time: row.get(24)?,
                    video_time: row.get(25)?,
                })
            })
            .context("failed to query shots")?
            .collect::<std::result::Result<Vec<_>, _>>()
            .context("failed to map shot rows")?;

        Ok(StoredTables {
            matches,
            points,
            shots,
        })
    }
}

// ---------------------------------------------------------------------------
// Column decoding
// ---------------------------------------------------------------------------

fn conversion_error(
    idx: usize,
    err: impl std::error::Error + Send + Sync + 'static,
) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(err))
}

fn uuid_column(row: &Row<'_>, idx: usize) -> rusqlite::Result<Uuid> {
    let raw: String = row.get(idx)?;
    Uuid::parse_str(&raw).map_err(|e| conversion_error(idx, e))
}

fn datetime_column(row: &Row<'_>, idx: usize) -> rusqlite::Result<NaiveDateTime> {
    let raw: String = row.get(idx)?;
    NaiveDateTime::parse_from_str(&raw, TIMESTAMP_FORMAT).map_err(|e| conversion_error(idx, e))
}

fn date_column(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<NaiveDate>> {
    let raw: Option<String> = row.get(idx)?;
    raw.map(|s| NaiveDate::parse_from_str(&s, DATE_FORMAT).map_err(|e| conversion_error(idx, e)))
        .transpose()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{point, sample_match, shot};

    /// Helper: create a fresh in-memory database for each test.
    fn test_db() -> Database {
        Database::open(":memory:").expect("in-memory database should open")
    }

    // ------------------------------------------------------------------
    // Schema / open
    // ------------------------------------------------------------------

    #[test]
    fn open_creates_missing_parent_directories() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("not-yet-created").join("swingstats.db");

        let db = Database::open(path.to_str().unwrap()).expect("should create the directory");

        db.ping().unwrap();
        assert!(path.is_file());
    }

    #[test]
    fn open_creates_tables() {
        let db = test_db();
        let conn = db.conn();

        let tables: Vec<String> = conn
            .prepare("SELECT name FROM sqlite_master WHERE type='table' ORDER BY name")
            .unwrap()
            .query_map([], |row| row.get(0))
            .unwrap()
            .collect::<Result<Vec<_>, _>>()
            .unwrap();

        assert!(tables.contains(&"swingvision_matches".to_string()));
        assert!(tables.contains(&"swingvision_points".to_string()));
        assert!(tables.contains(&"swingvision_shots".to_string()));
    }

    #[test]
    fn ping_succeeds_on_open_database() {
        test_db().ping().unwrap();
    }

    // ------------------------------------------------------------------
    // Bundles
    // ------------------------------------------------------------------

    #[test]
    fn store_and_load_round_trip() {
        let db = test_db();
        let m = sample_match("Jane Doe");
        let mut p = point(1, 1, 1, "host", "host", "Ace");
        p.match_id = m.match_id;
        p.host_game_score = Some("15".into());
        p.break_point = true;
        let mut s = shot(1, 1, 1, 1, "Joao Cassis", "first_serve", "Serve", "In");
        s.match_id = m.match_id;
        s.speed = Some(168.4);

        db.store_match_bundle(&m, &[p.clone()], &[s.clone()]).unwrap();

        let tables = db.load_tables().unwrap();
        assert_eq!(tables.matches, vec![m]);
        assert_eq!(tables.points, vec![p]);
        assert_eq!(tables.shots, vec![s]);
    }

    #[test]
    fn known_match_ids_lists_stored_matches() {
        let db = test_db();
        assert!(db.known_match_ids().unwrap().is_empty());

        let a = sample_match("Jane Doe");
        let b = sample_match("John Roe");
        db.store_match_bundle(&a, &[], &[]).unwrap();
        db.store_match_bundle(&b, &[], &[]).unwrap();

        let ids = db.known_match_ids().unwrap();
        assert_eq!(ids.len(), 2);
        assert!(ids.contains(&a.match_id));
        assert!(ids.contains(&b.match_id));
        assert_eq!(db.match_count().unwrap(), 2);
    }

    #[test]
    fn match_without_date_round_trips_as_none() {
        let db = test_db();
        let mut m = sample_match("Jane Doe");
        m.match_date = None;
        db.store_match_bundle(&m, &[], &[]).unwrap();
        assert_eq!(db.load_tables().unwrap().matches[0].match_date, None);
    }

    #[test]
    fn failed_shot_insert_rolls_back_match_and_points() {
        let db = test_db();
        let m = sample_match("Jane Doe");
        let mut p = point(1, 1, 1, "host", "host", "Ace");
        p.match_id = m.match_id;
        let mut s = shot(1, 1, 1, 1, "Joao Cassis", "first_serve", "Serve", "In");
        s.match_id = m.match_id;

        // Two shots with the same key violate the primary key.
        let result = db.store_match_bundle(&m, &[p], &[s.clone(), s]);
        assert!(result.is_err());

        let tables = db.load_tables().unwrap();
        assert!(tables.matches.is_empty());
        assert!(tables.points.is_empty());
        assert!(tables.shots.is_empty());
    }

    #[test]
    fn duplicate_match_insert_is_an_error() {
        let db = test_db();
        let m = sample_match("Jane Doe");
        db.store_match_bundle(&m, &[], &[]).unwrap();
        assert!(db.store_match_bundle(&m, &[], &[]).is_err());
        assert_eq!(db.match_count().unwrap(), 1);
    }

    #[test]
    fn foreign_keys_enforced() {
        let db = test_db();
        // A point whose match was never stored should fail because
        // foreign_keys = ON.
        let p = point(1, 1, 1, "host", "host", "Ace");
        let result = db.with_transaction(|tx| Database::insert_points(tx, &[p]));
        assert!(result.is_err());
    }

    #[test]
    fn with_transaction_returns_closure_value() {
        let db = test_db();
        let m = sample_match("Jane Doe");
        let n = db
            .with_transaction(|tx| {
                Database::insert_match(tx, &m)?;
                Ok(42)
            })
            .unwrap();
        assert_eq!(n, 42);
        assert_eq!(db.match_count().unwrap(), 1);
    }
}
