//! Invasive ventilation metrics: Vt/kg, driving pressure, P/F, static
//! compliance and the lung-protective ventilation check.

use super::models::{VmiEntry, VmiMetrics};
use super::scores::round_to;

pub const MAX_PROTECTIVE_VT_PER_KG: f64 = 8.0;
pub const MAX_PROTECTIVE_PLATEAU: f64 = 30.0;
pub const MAX_PROTECTIVE_DRIVING_PRESSURE: f64 = 15.0;

/// A value that can take part in a calculation: present, finite and non-zero.
fn usable(value: Option<f64>) -> Option<f64> {
    value.filter(|v| v.is_finite() && *v != 0.0)
}

/// Derive the IMV metrics for an entry.
///
/// Missing or zero prerequisites never produce NaN: Vt/kg and driving
/// pressure fall back to 0, P/F and compliance are left out.
pub fn compute_vmi_metrics(entry: &VmiEntry) -> VmiMetrics {
    let vt_expired = usable(entry.tidal_volume_expired);
    let plateau = usable(entry.plateau_pressure);
    let peep = entry.peep.filter(|v| v.is_finite());

    let vt_per_kg = match (vt_expired, usable(entry.predicted_body_weight)) {
        (Some(vt), Some(pbw)) => round_to(vt / pbw, 1),
        _ => 0.0,
    };

    let driving_pressure = match (plateau, peep) {
        (Some(pplat), Some(peep)) => pplat - peep,
        _ => 0.0,
    };

    let pf_ratio = match (usable(entry.pao2), usable(entry.fio2)) {
        (Some(pao2), Some(fio2)) => Some(round_to(pao2 / (fio2 / 100.0), 0)),
        _ => None,
    };

    let compliance = match vt_expired {
        Some(vt) if driving_pressure > 0.0 => Some(round_to(vt / driving_pressure, 1)),
        _ => None,
    };

    let plateau_ok = entry
        .plateau_pressure
        .is_some_and(|p| p <= MAX_PROTECTIVE_PLATEAU);
    let protective_ventilation = vt_per_kg > 0.0
        && vt_per_kg <= MAX_PROTECTIVE_VT_PER_KG
        && plateau_ok
        && driving_pressure > 0.0
        && driving_pressure <= MAX_PROTECTIVE_DRIVING_PRESSURE;

    VmiMetrics {
        vt_per_kg,
        driving_pressure,
        pf_ratio,
        compliance,
        protective_ventilation,
    }
}
