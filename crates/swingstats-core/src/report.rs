// Output writers for the metrics table and the cross-match analysis.

use std::fs;
use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::info;

use crate::enrich::AnalysisTables;
use crate::metrics::{column_names, MatchMetrics};
use crate::strokes::{stroke_profile, StrokeProfile};
use crate::tactics::{self, TacticalSummary};

pub const METRICS_CSV: &str = "metrics.csv";
pub const METRICS_JSON: &str = "metrics.json";
pub const ANALYSIS_JSON: &str = "analysis.json";

/// Cross-match analysis for one subject.
#[derive(Debug, Clone, Serialize)]
pub struct AnalysisReport {
    pub subject: String,
    pub matches: usize,
    pub tactics: TacticalSummary,
    pub strokes: Vec<StrokeProfile>,
}

impl AnalysisReport {
    pub fn build(tables: &AnalysisTables, subject: &str) -> Self {
        Self {
            subject: subject.to_string(),
            matches: tables.matches.len(),
            tactics: tactics::analyze(&tables.points, subject),
            strokes: stroke_profile(&tables.shots, subject),
        }
    }
}

/// Write the wide metrics table as CSV: one header row, one row per match.
pub fn write_metrics_csv<W: Write>(out: W, metrics: &[MatchMetrics]) -> Result<()> {
    let mut wtr = csv::Writer::from_writer(out);
    wtr.write_record(column_names())
        .context("failed to write metrics header")?;
    for m in metrics {
        let row: Vec<String> = m.columns().into_iter().map(|(_, v)| v.to_string()).collect();
        wtr.write_record(&row)
            .with_context(|| format!("failed to write metrics for match {}", m.match_id))?;
    }
    wtr.flush().context("failed to flush metrics CSV")?;
    Ok(())
}

/// Write the metrics records as a JSON array, keeping the nested grouping.
pub fn write_metrics_json<W: Write>(out: W, metrics: &[MatchMetrics]) -> Result<()> {
    serde_json::to_writer_pretty(out, metrics).context("failed to serialize metrics")
}

/// Write every report file into `dir`, creating it if needed.
pub fn write_all(dir: &Path, metrics: &[MatchMetrics], analysis: &AnalysisReport) -> Result<()> {
    fs::create_dir_all(dir)
        .with_context(|| format!("failed to create output directory {}", dir.display()))?;

    let csv_path = dir.join(METRICS_CSV);
    let file = fs::File::create(&csv_path)
        .with_context(|| format!("failed to create {}", csv_path.display()))?;
    write_metrics_csv(file, metrics)?;

    let json_path = dir.join(METRICS_JSON);
    let file = fs::File::create(&json_path)
        .with_context(|| format!("failed to create {}", json_path.display()))?;
    write_metrics_json(file, metrics)?;

    let analysis_path = dir.join(ANALYSIS_JSON);
    let file = fs::File::create(&analysis_path)
        .with_context(|| format!("failed to create {}", analysis_path.display()))?;
    serde_json::to_writer_pretty(file, analysis).context("failed to serialize analysis")?;

    info!(
        matches = metrics.len(),
        "wrote reports to {}",
        dir.display()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::compute_match_metrics;
    use crate::model::detail;
    use crate::test_support::{point, sample_match, SUBJECT};

    const OPP: &str = "Jane Doe";

    fn metrics() -> Vec<MatchMetrics> {
        let m = sample_match(OPP);
        let mut points = vec![
            point(1, 1, 1, SUBJECT, SUBJECT, detail::FOREHAND_WINNER),
            point(1, 1, 2, SUBJECT, OPP, ""),
        ];
        for p in &mut points {
            p.match_id = m.match_id;
        }
        compute_match_metrics(&[m], &points, &[], SUBJECT)
    }

    #[test]
    fn csv_has_header_and_one_row_per_match() {
        let mut buf = Vec::new();
        write_metrics_csv(&mut buf, &metrics()).unwrap();
        let text = String::from_utf8(buf).unwrap();

        let mut rdr = csv::Reader::from_reader(text.as_bytes());
        let headers = rdr.headers().unwrap().clone();
        assert_eq!(headers.len(), column_names().len());
        assert_eq!(&headers[0], "match_id");

        let rows: Vec<csv::StringRecord> = rdr.records().map(|r| r.unwrap()).collect();
        assert_eq!(rows.len(), 1);
        let col = headers.iter().position(|h| h == "winner_error_ratio").unwrap();
        // One winner, no unforced errors.
        assert_eq!(&rows[0][col], "inf");
    }

    #[test]
    fn empty_table_still_writes_header() {
        let mut buf = Vec::new();
        write_metrics_csv(&mut buf, &[]).unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert_eq!(text.lines().count(), 1);
    }

    #[test]
    fn json_keeps_nested_groups() {
        let mut buf = Vec::new();
        write_metrics_json(&mut buf, &metrics()).unwrap();
        let value: serde_json::Value = serde_json::from_slice(&buf).unwrap();

        assert_eq!(value[0]["opponent"], OPP);
        assert_eq!(value[0]["totals"]["total_points"], 2);
        assert_eq!(value[0]["outcomes"]["winner_error_ratio"], "inf");
    }

    #[test]
    fn write_all_creates_the_three_files() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("nested");
        let report = AnalysisReport::build(&AnalysisTables::default(), SUBJECT);

        write_all(&out, &metrics(), &report).unwrap();

        assert!(out.join(METRICS_CSV).is_file());
        assert!(out.join(METRICS_JSON).is_file());
        let analysis: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(out.join(ANALYSIS_JSON)).unwrap()).unwrap();
        assert_eq!(analysis["subject"], SUBJECT);
        assert_eq!(analysis["matches"], 0);
    }
}
