// Memoized table reads and derived tables.
//
// Every entry is dropped by `invalidate()`, which the ingestor calls after a
// successful write. Reads after that go back to the database.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use anyhow::Result;
use tracing::debug;

use crate::db::Database;
use crate::enrich::AnalysisTables;
use crate::metrics::MatchMetrics;
use crate::model::StoredTables;

#[derive(Default)]
pub struct AnalyticsCache {
    tables: Mutex<Option<Arc<StoredTables>>>,
    /// Enriched tables, keyed by analysis subject.
    analysis: Mutex<HashMap<String, Arc<AnalysisTables>>>,
    /// Per-match metrics, keyed by analysis subject.
    metrics: Mutex<HashMap<String, Arc<Vec<MatchMetrics>>>>,
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().expect("cache mutex poisoned")
}

impl AnalyticsCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// The three stored tables, read from `db` on first use.
    pub fn tables(&self, db: &Database) -> Result<Arc<StoredTables>> {
        let mut slot = lock(&self.tables);
        if let Some(tables) = slot.as_ref() {
            return Ok(Arc::clone(tables));
        }
        let tables = Arc::new(db.load_tables()?);
        debug!(
            matches = tables.matches.len(),
            points = tables.points.len(),
            shots = tables.shots.len(),
            "loaded stored tables"
        );
        *slot = Some(Arc::clone(&tables));
        Ok(tables)
    }

    /// Stored tables enriched for `subject`.
    pub fn analysis(&self, db: &Database, subject: &str) -> Result<Arc<AnalysisTables>> {
        if let Some(hit) = lock(&self.analysis).get(subject) {
            return Ok(Arc::clone(hit));
        }
        let tables = self.tables(db)?;
        let prepared = Arc::new(AnalysisTables::prepare(&tables, subject));
        lock(&self.analysis).insert(subject.to_string(), Arc::clone(&prepared));
        Ok(prepared)
    }

    /// Cached metrics for `subject`, or the result of `compute` stored for
    /// next time. Errors are not cached.
    pub fn metrics_with<F>(&self, subject: &str, compute: F) -> Result<Arc<Vec<MatchMetrics>>>
    where
        F: FnOnce() -> Result<Vec<MatchMetrics>>,
    {
        if let Some(hit) = lock(&self.metrics).get(subject) {
            return Ok(Arc::clone(hit));
        }
        let computed = Arc::new(compute()?);
        lock(&self.metrics).insert(subject.to_string(), Arc::clone(&computed));
        Ok(computed)
    }

    /// Drop every cached entry.
    pub fn invalidate(&self) {
        *lock(&self.tables) = None;
        lock(&self.analysis).clear();
        lock(&self.metrics).clear();
        debug!("analytics cache invalidated");
    }

    /// Whether the stored tables are currently cached.
    pub fn is_warm(&self) -> bool {
        lock(&self.tables).is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{sample_match, SUBJECT};

    fn test_db() -> Database {
        Database::open(":memory:").expect("in-memory db")
    }

    #[test]
    fn tables_are_read_once_until_invalidated() {
        let db = test_db();
        let cache = AnalyticsCache::new();

        assert!(!cache.is_warm());
        assert!(cache.tables(&db).unwrap().matches.is_empty());
        assert!(cache.is_warm());

        // A write behind the cache's back is not observed...
        db.store_match_bundle(&sample_match("Jane Doe"), &[], &[]).unwrap();
        assert!(cache.tables(&db).unwrap().matches.is_empty());

        // ...until the cache is invalidated.
        cache.invalidate();
        assert!(!cache.is_warm());
        assert_eq!(cache.tables(&db).unwrap().matches.len(), 1);
    }

    #[test]
    fn metrics_are_computed_once_per_subject() {
        let cache = AnalyticsCache::new();
        let mut calls = 0;

        cache
            .metrics_with(SUBJECT, || {
                calls += 1;
                Ok(Vec::new())
            })
            .unwrap();
        cache
            .metrics_with(SUBJECT, || {
                calls += 1;
                Ok(Vec::new())
            })
            .unwrap();

        assert_eq!(calls, 1);
    }

    #[test]
    fn failed_metrics_computation_is_not_cached() {
        let cache = AnalyticsCache::new();
        assert!(cache
            .metrics_with(SUBJECT, || anyhow::bail!("boom"))
            .is_err());

        let mut called = false;
        cache
            .metrics_with(SUBJECT, || {
                called = true;
                Ok(Vec::new())
            })
            .unwrap();
        assert!(called);
    }

    #[test]
    fn invalidate_clears_metrics() {
        let cache = AnalyticsCache::new();
        cache.metrics_with(SUBJECT, || Ok(Vec::new())).unwrap();
        cache.invalidate();

        let mut recomputed = false;
        cache
            .metrics_with(SUBJECT, || {
                recomputed = true;
                Ok(Vec::new())
            })
            .unwrap();
        assert!(recomputed);
    }

    #[test]
    fn analysis_tables_resolve_roles_for_the_subject() {
        let db = test_db();
        let m = sample_match("Jane Doe");
        let mut p = crate::test_support::point(1, 1, 1, "host", "guest", "Ace");
        p.match_id = m.match_id;
        db.store_match_bundle(&m, &[p], &[]).unwrap();

        let cache = AnalyticsCache::new();
        let analysis = cache.analysis(&db, SUBJECT).unwrap();
        assert_eq!(analysis.points[0].match_server, SUBJECT);
        assert_eq!(analysis.points[0].point_winner, "Jane Doe");
    }
}
