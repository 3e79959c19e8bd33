//! Quality indicators over one patient's IMV monitoring history.

use serde::Serialize;

use super::models::{VmiRecord, WeaningStatus};
use super::scores::round_to;

/// Summary of a set of IMV records. Recomputed on demand, never stored.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct QualityMetrics {
    pub total_records: usize,
    /// Percentage of records with protective ventilation.
    pub protective_ventilation_rate: f64,
    pub average_vt_per_kg: f64,
    pub average_driving_pressure: f64,
    /// Percentage of weaning candidates (or patients on trial) with an SBT done.
    pub sbt_completion_rate: f64,
    pub average_mobilization_level: f64,
}

fn percent(part: usize, whole: usize) -> f64 {
    if whole == 0 {
        return 0.0;
    }
    round_to(part as f64 / whole as f64 * 100.0, 1)
}

pub fn compute_quality_metrics(records: &[VmiRecord]) -> QualityMetrics {
    if records.is_empty() {
        return QualityMetrics::default();
    }

    let total = records.len();
    let n = total as f64;

    let protective = records
        .iter()
        .filter(|r| r.assessment.metrics.protective_ventilation)
        .count();

    let vt_sum: f64 = records.iter().map(|r| r.assessment.metrics.vt_per_kg).sum();
    let dp_sum: f64 = records.iter().map(|r| r.assessment.metrics.driving_pressure).sum();
    let mobility_sum: f64 = records
        .iter()
        .map(|r| r.entry.mobilization_level.value() as f64)
        .sum();

    let candidates: Vec<_> = records
        .iter()
        .filter(|r| {
            matches!(
                r.entry.weaning_status,
                WeaningStatus::Candidate | WeaningStatus::SbtTrial
            )
        })
        .collect();
    let sbt_done = candidates
        .iter()
        .filter(|r| r.entry.sbt_performed.unwrap_or(false))
        .count();

    QualityMetrics {
        total_records: total,
        protective_ventilation_rate: percent(protective, total),
        average_vt_per_kg: round_to(vt_sum / n, 1),
        average_driving_pressure: round_to(dp_sum / n, 1),
        sbt_completion_rate: percent(sbt_done, candidates.len()),
        average_mobilization_level: round_to(mobility_sum / n, 1),
    }
}
