//! Value types consumed and produced by the clinical engine.
//!
//! Entries are what the bedside form captures; assessments are what the
//! engine derives from them. Records pair the two with the identity and
//! timestamp the host assigns when it persists them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::error::EngineError;

/// Respiratory support a patient is currently receiving.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SupportType {
    Imv,
    Niv,
    Hfnc,
    ConventionalOxygen,
    RoomAir,
}

impl SupportType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SupportType::Imv => "imv",
            SupportType::Niv => "niv",
            SupportType::Hfnc => "hfnc",
            SupportType::ConventionalOxygen => "conventional-oxygen",
            SupportType::RoomAir => "room-air",
        }
    }
}

impl fmt::Display for SupportType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SupportType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "imv" => Ok(SupportType::Imv),
            "niv" => Ok(SupportType::Niv),
            "hfnc" => Ok(SupportType::Hfnc),
            "conventional-oxygen" => Ok(SupportType::ConventionalOxygen),
            "room-air" => Ok(SupportType::RoomAir),
            other => Err(format!("unknown support type: {}", other)),
        }
    }
}

/// Three-level risk category. Ordering is only meaningful within one score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

impl RiskLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::Low => "low",
            RiskLevel::Medium => "medium",
            RiskLevel::High => "high",
        }
    }
}

impl FromStr for RiskLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "low" => Ok(RiskLevel::Low),
            "medium" => Ok(RiskLevel::Medium),
            "high" => Ok(RiskLevel::High),
            other => Err(format!("unknown risk level: {}", other)),
        }
    }
}

// ============================================================================
// Scores
// ============================================================================

/// HACOR inputs. `oxygenation` is the PaO2/FiO2 ratio in mmHg.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HacorInputs {
    pub heart_rate: f64,
    /// Arterial pH.
    pub acidosis: f64,
    /// Glasgow Coma Scale, nominally 3..=15.
    pub consciousness: i32,
    pub oxygenation: f64,
    pub respiratory_rate: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HacorScore {
    pub score: u8,
    pub risk: RiskLevel,
}

/// ROX inputs. FiO2 is a percentage (21..=100), not a fraction.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RoxInputs {
    pub spo2: f64,
    pub fio2: f64,
    pub respiratory_rate: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RoxScore {
    pub index: f64,
    pub risk: RiskLevel,
}

// ============================================================================
// Invasive mechanical ventilation
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AsynchronyType {
    IneffectiveEffort,
    DoubleTrigger,
    PrematureCycling,
    DelayedCycling,
    AutoPeep,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AsynchronyFrequency {
    Rare,
    Occasional,
    Frequent,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum WeaningStatus {
    #[default]
    NotCandidate,
    Candidate,
    SbtTrial,
    Extubated,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SbtResult {
    Success,
    Failure,
}

/// ICU mobility level, 0 (none) through 4.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "u8")]
pub struct MobilizationLevel(u8);

impl MobilizationLevel {
    pub const MAX: u8 = 4;

    pub fn value(&self) -> u8 {
        self.0
    }
}

impl TryFrom<i64> for MobilizationLevel {
    type Error = EngineError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        if (0..=Self::MAX as i64).contains(&value) {
            Ok(Self(value as u8))
        } else {
            Err(EngineError::OutOfRange {
                field: "mobilization_level",
                value,
                min: 0,
                max: Self::MAX as i64,
            })
        }
    }
}

impl From<MobilizationLevel> for u8 {
    fn from(level: MobilizationLevel) -> Self {
        level.0
    }
}

/// One IMV monitoring entry as captured at the bedside.
///
/// Numeric fields are optional because the form may be saved partially;
/// a zero is treated the same as a missing value by the calculator.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VmiEntry {
    // Lung protection
    pub predicted_body_weight: Option<f64>,
    pub tidal_volume_set: Option<f64>,
    pub tidal_volume_expired: Option<f64>,
    pub plateau_pressure: Option<f64>,
    pub peep: Option<f64>,
    pub vent_mode: String,
    pub fio2: Option<f64>,
    pub respiratory_rate: Option<f64>,

    // Synchrony
    pub has_asynchrony: bool,
    pub asynchrony_types: Vec<AsynchronyType>,
    pub asynchrony_frequency: Option<AsynchronyFrequency>,

    // Oxygenation and gases
    pub spo2: Option<f64>,
    pub pao2: Option<f64>,
    pub paco2: Option<f64>,
    pub ph: Option<f64>,

    // Weaning
    pub weaning_status: WeaningStatus,
    pub sbt_performed: Option<bool>,
    pub sbt_type: Option<String>,
    pub sbt_result: Option<SbtResult>,
    pub sbt_failure_reason: Option<String>,

    // Mobilization
    pub mobilization_level: MobilizationLevel,
    pub mobilization_barrier: Option<String>,
}

/// Values derived from a [`VmiEntry`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct VmiMetrics {
    pub vt_per_kg: f64,
    pub driving_pressure: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pf_ratio: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub compliance: Option<f64>,
    pub protective_ventilation: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VmiAssessment {
    #[serde(flatten)]
    pub metrics: VmiMetrics,
    pub alerts: Vec<String>,
}

// ============================================================================
// Non-invasive ventilation
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum NivInterface {
    #[default]
    FullFace,
    Oronasal,
    Nasal,
    Helmet,
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SkinIntegrity {
    #[default]
    NoLesions,
    MildErythema,
    #[serde(rename = "pressure-injury-1-2")]
    PressureInjury,
    SevereInjury,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NivMode {
    Cpap,
    #[default]
    Bipap,
    Other,
}

/// One NIV monitoring entry, including the bedside HACOR components.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NivEntry {
    pub interface_type: NivInterface,
    #[serde(default)]
    pub interface_other: Option<String>,
    pub skin_integrity: SkinIntegrity,
    #[serde(default)]
    pub lesion_locations: Vec<String>,
    #[serde(default)]
    pub skin_notes: Option<String>,
    pub mode: NivMode,
    #[serde(default)]
    pub mode_other: Option<String>,
    pub ipap: f64,
    pub epap: f64,
    pub fio2: f64,
    /// Leak in L/min.
    #[serde(default)]
    pub leak: Option<f64>,
    pub heart_rate: f64,
    pub ph: f64,
    pub consciousness: i32,
    pub pao2: f64,
    pub respiratory_rate: f64,
    #[serde(default)]
    pub previous_imv_days: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NivAssessment {
    pub hacor_score: u8,
    pub hacor_risk: RiskLevel,
    pub alerts: Vec<String>,
}

// ============================================================================
// High-flow nasal cannula
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CannulaFit {
    #[default]
    WellAdapted,
    Discomfort,
    SignificantLeak,
}

/// One HFNC monitoring entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HfncEntry {
    /// L/min
    pub flow: f64,
    pub fio2: f64,
    #[serde(default)]
    pub temperature: Option<f64>,
    pub cannula_fit: CannulaFit,
    #[serde(default)]
    pub cannula_notes: Option<String>,
    pub humidification_working: bool,
    #[serde(default)]
    pub humidification_issue: Option<String>,
    pub spo2: f64,
    pub respiratory_rate: f64,
}

impl Default for HfncEntry {
    fn default() -> Self {
        Self {
            flow: 0.0,
            fio2: 21.0,
            temperature: None,
            cannula_fit: CannulaFit::WellAdapted,
            cannula_notes: None,
            humidification_working: true,
            humidification_issue: None,
            spo2: 0.0,
            respiratory_rate: 0.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HfncAssessment {
    pub rox_index: f64,
    pub rox_risk: RiskLevel,
    pub alerts: Vec<String>,
}

// ============================================================================
// Persisted records
// ============================================================================

/// A monitoring record: the entry, what the engine derived from it, and
/// the identity the host assigned when storing it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonitoringRecord<E, A> {
    pub id: i64,
    pub patient_id: i64,
    pub recorded_at: DateTime<Utc>,
    #[serde(flatten)]
    pub entry: E,
    #[serde(flatten)]
    pub assessment: A,
}

pub type VmiRecord = MonitoringRecord<VmiEntry, VmiAssessment>;
pub type NivRecord = MonitoringRecord<NivEntry, NivAssessment>;
pub type HfncRecord = MonitoringRecord<HfncEntry, HfncAssessment>;
