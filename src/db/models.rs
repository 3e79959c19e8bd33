//! Database model types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::engine::{RiskLevel, SupportType};

/// An ICU ward unit with a fixed number of beds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sector {
    pub id: i64,
    pub name: String,
    pub beds: u32,
}

/// Units created on first start.
pub fn default_sectors() -> Vec<Sector> {
    [("UCI A", 8), ("UCI B", 6), ("UCI C", 10), ("Aislamiento", 4)]
        .into_iter()
        .map(|(name, beds)| Sector {
            id: 0,
            name: name.to_string(),
            beds,
        })
        .collect()
}

/// A patient occupying one bed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Patient {
    pub id: i64,
    pub alias: String,
    pub sector_id: i64,
    pub bed: u32,
    pub support_type: SupportType,
    pub predicted_body_weight: Option<f64>,
    pub created_at: DateTime<Utc>,
}

/// Fields a caller supplies when creating or editing a patient.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatientInput {
    pub alias: String,
    pub sector_id: i64,
    pub bed: u32,
    pub support_type: SupportType,
    #[serde(default)]
    pub predicted_body_weight: Option<f64>,
}

/// One bed in a sector's bed map.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BedSlot {
    pub bed: u32,
    pub patient: Option<Patient>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScoreKind {
    Hacor,
    Rox,
}

impl ScoreKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScoreKind::Hacor => "hacor",
            ScoreKind::Rox => "rox",
        }
    }
}

impl FromStr for ScoreKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "hacor" => Ok(ScoreKind::Hacor),
            "rox" => Ok(ScoreKind::Rox),
            other => Err(format!("unknown score kind: {}", other)),
        }
    }
}

/// A saved result from the standalone HACOR/ROX calculator.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoreRecord {
    pub id: i64,
    pub patient_id: i64,
    pub kind: ScoreKind,
    pub value: f64,
    pub risk: RiskLevel,
    pub inputs: serde_json::Value,
    pub recorded_at: DateTime<Utc>,
}

/// Monitoring modules, one per supported ventilation modality.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Modality {
    Vmi,
    Niv,
    Hfnc,
}

impl Modality {
    pub fn as_str(&self) -> &'static str {
        match self {
            Modality::Vmi => "vmi",
            Modality::Niv => "niv",
            Modality::Hfnc => "hfnc",
        }
    }

    /// The support type a patient must be on to be monitored by this module.
    pub fn support_type(&self) -> SupportType {
        match self {
            Modality::Vmi => SupportType::Imv,
            Modality::Niv => SupportType::Niv,
            Modality::Hfnc => SupportType::Hfnc,
        }
    }
}

impl fmt::Display for Modality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
