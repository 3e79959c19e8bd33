//! Clinical calculation and alerting engine.
//!
//! Pure functions only: nothing here reads the clock, the store or the
//! network. The host assigns identity and timestamps and persists what
//! these functions return.

pub mod alerts;
mod error;
pub mod models;
pub mod quality;
pub mod scores;
pub mod vmi;

pub use alerts::{generate_hfnc_alerts, generate_imv_alerts, generate_niv_alerts, Alert, Tone};
pub use error::EngineError;
pub use models::*;
pub use quality::{compute_quality_metrics, QualityMetrics};
pub use scores::{score_hacor_for_niv, score_hacor_standalone, score_rox, HacorPolicy};
pub use vmi::compute_vmi_metrics;

/// Metrics and alerts for an IMV entry.
pub fn assess_vmi(entry: &VmiEntry) -> VmiAssessment {
    let metrics = compute_vmi_metrics(entry);
    let alerts = generate_imv_alerts(entry, &metrics);
    VmiAssessment { metrics, alerts }
}

/// HACOR (NIV cutoffs) and alerts for an NIV entry.
pub fn assess_niv(entry: &NivEntry) -> Result<NivAssessment, EngineError> {
    let hacor = score_hacor_for_niv(&scores::niv_hacor_inputs(entry)?);
    Ok(NivAssessment {
        hacor_score: hacor.score,
        hacor_risk: hacor.risk,
        alerts: generate_niv_alerts(entry, Some(hacor.score)),
    })
}

/// ROX and alerts for an HFNC entry.
pub fn assess_hfnc(entry: &HfncEntry) -> Result<HfncAssessment, EngineError> {
    let rox = score_rox(&RoxInputs {
        spo2: entry.spo2,
        fio2: entry.fio2,
        respiratory_rate: entry.respiratory_rate,
    })?;
    Ok(HfncAssessment {
        rox_index: rox.index,
        rox_risk: rox.risk,
        alerts: generate_hfnc_alerts(entry, Some(rox.index)),
    })
}
