// Workbook ingestion: metadata, identity, dedup, normalization and one
// transactional write per match.

use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};

use tracing::{info, warn};
use uuid::Uuid;

use crate::cache::AnalyticsCache;
use crate::db::Database;
use crate::error::IngestError;
use crate::identity::{derive_match_identity, extract_match_date};
use crate::model::Match;
use crate::normalize::{
    normalize_points, normalize_shots, read_settings, POINTS_SHEET, SETTINGS_SHEET, SHOTS_SHEET,
};
use crate::workbook::Workbook;

// ---------------------------------------------------------------------------
// Outcomes
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// The match identity is already stored, or appeared earlier in the
    /// same batch.
    AlreadyIngested,
}

#[derive(Debug)]
pub enum IngestOutcome {
    Uploaded {
        match_id: Uuid,
        points: usize,
        shots: usize,
    },
    Skipped {
        match_id: Uuid,
        reason: SkipReason,
    },
    Failed(IngestError),
}

impl IngestOutcome {
    pub fn match_id(&self) -> Option<Uuid> {
        match self {
            IngestOutcome::Uploaded { match_id, .. } | IngestOutcome::Skipped { match_id, .. } => {
                Some(*match_id)
            }
            IngestOutcome::Failed(_) => None,
        }
    }

    pub fn is_uploaded(&self) -> bool {
        matches!(self, IngestOutcome::Uploaded { .. })
    }

    pub fn is_skipped(&self) -> bool {
        matches!(self, IngestOutcome::Skipped { .. })
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, IngestOutcome::Failed(_))
    }
}

impl fmt::Display for IngestOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IngestOutcome::Uploaded {
                match_id,
                points,
                shots,
            } => write!(f, "uploaded {match_id} ({points} points, {shots} shots)"),
            IngestOutcome::Skipped { match_id, .. } => write!(f, "skipped {match_id} (already ingested)"),
            IngestOutcome::Failed(err) => write!(f, "failed: {err}"),
        }
    }
}

/// What happened to one input file.
#[derive(Debug)]
pub struct FileReport {
    pub file: PathBuf,
    pub outcome: IngestOutcome,
}

/// Counts over a batch of reports.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchSummary {
    pub uploaded: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl BatchSummary {
    pub fn from_reports(reports: &[FileReport]) -> Self {
        reports.iter().fold(Self::default(), |mut s, r| {
            match r.outcome {
                IngestOutcome::Uploaded { .. } => s.uploaded += 1,
                IngestOutcome::Skipped { .. } => s.skipped += 1,
                IngestOutcome::Failed(_) => s.failed += 1,
            }
            s
        })
    }
}

// ---------------------------------------------------------------------------
// Ingestor
// ---------------------------------------------------------------------------

pub struct Ingestor<'a> {
    db: &'a Database,
    cache: &'a AnalyticsCache,
}

impl<'a> Ingestor<'a> {
    pub fn new(db: &'a Database, cache: &'a AnalyticsCache) -> Self {
        Self { db, cache }
    }

    /// Ingest one export file (an `.xlsx` workbook or a directory of CSV
    /// sheets).
    pub fn ingest_file(&self, path: &Path) -> IngestOutcome {
        match self.db.known_match_ids() {
            Ok(mut known) => self.ingest_path(path, &mut known),
            Err(e) => IngestOutcome::Failed(IngestError::storage(e)),
        }
    }

    /// Ingest files one after another. A failure affects only its own file;
    /// a file whose match was stored earlier in the batch is skipped.
    pub fn ingest_batch<P: AsRef<Path>>(&self, paths: &[P]) -> Vec<FileReport> {
        let mut known = match self.db.known_match_ids() {
            Ok(known) => known,
            Err(e) => {
                let message = format!("{e:#}");
                warn!("could not read stored match ids: {message}");
                return paths
                    .iter()
                    .map(|p| FileReport {
                        file: p.as_ref().to_path_buf(),
                        outcome: IngestOutcome::Failed(IngestError::IngestionFailed {
                            message: message.clone(),
                        }),
                    })
                    .collect();
            }
        };

        let reports: Vec<FileReport> = paths
            .iter()
            .map(|p| {
                let path = p.as_ref();
                FileReport {
                    file: path.to_path_buf(),
                    outcome: self.ingest_path(path, &mut known),
                }
            })
            .collect();

        let summary = BatchSummary::from_reports(&reports);
        info!(
            uploaded = summary.uploaded,
            skipped = summary.skipped,
            failed = summary.failed,
            "batch ingestion finished"
        );
        reports
    }

    /// Ingest an already-loaded workbook. `file_name` supplies the match
    /// date when it embeds one.
    pub fn ingest_workbook(&self, file_name: &str, workbook: &Workbook) -> IngestOutcome {
        match self.db.known_match_ids() {
            Ok(mut known) => self.finish(file_name, self.ingest_loaded(file_name, workbook, &mut known)),
            Err(e) => IngestOutcome::Failed(IngestError::storage(e)),
        }
    }

    fn ingest_path(&self, path: &Path, known: &mut HashSet<Uuid>) -> IngestOutcome {
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let result = Workbook::open(path).and_then(|wb| self.ingest_loaded(&file_name, &wb, known));
        self.finish(&file_name, result)
    }

    fn finish(&self, file_name: &str, result: Result<IngestOutcome, IngestError>) -> IngestOutcome {
        match result {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!("{file_name}: {e}");
                IngestOutcome::Failed(e)
            }
        }
    }

    fn ingest_loaded(
        &self,
        file_name: &str,
        workbook: &Workbook,
        known: &mut HashSet<Uuid>,
    ) -> Result<IngestOutcome, IngestError> {
        let settings = read_settings(workbook.sheet(SETTINGS_SHEET)?)?;
        let match_id = derive_match_identity(
            settings.start_time,
            &settings.location,
            &settings.host_team,
            &settings.guest_team,
        );

        if known.contains(&match_id) {
            info!("{file_name}: match {match_id} already ingested, skipping");
            return Ok(IngestOutcome::Skipped {
                match_id,
                reason: SkipReason::AlreadyIngested,
            });
        }

        let points = normalize_points(workbook.sheet(POINTS_SHEET)?, match_id)?;
        let shots = normalize_shots(workbook.sheet(SHOTS_SHEET)?, match_id)?;

        let m = Match {
            match_id,
            start_time: settings.start_time,
            location: settings.location.trim().to_string(),
            host_team: settings.host_team.trim().to_string(),
            guest_team: settings.guest_team.trim().to_string(),
            match_date: extract_match_date(file_name),
        };

        self.db
            .store_match_bundle(&m, &points, &shots)
            .map_err(IngestError::storage)?;

        known.insert(match_id);
        self.cache.invalidate();

        info!(
            points = points.len(),
            shots = shots.len(),
            "{file_name}: stored match {match_id} against {}",
            m.guest_team
        );
        Ok(IngestOutcome::Uploaded {
            match_id,
            points: points.len(),
            shots: shots.len(),
        })
    }
}
