//! HACOR and ROX bedside scores.
//!
//! HACOR is scored identically everywhere, but the risk cutoffs differ
//! between the standalone calculator and NIV monitoring. Both tables are
//! kept as separate [`HacorPolicy`] values.

use super::error::{require_divisor, require_finite, EngineError};
use super::models::{HacorInputs, HacorScore, NivEntry, RiskLevel, RoxInputs, RoxScore};

/// ROX at or above this is low risk of HFNC failure.
pub const ROX_LOW_RISK: f64 = 4.88;
/// ROX at or above this (and below [`ROX_LOW_RISK`]) is medium risk.
pub const ROX_MEDIUM_RISK: f64 = 3.85;

/// Highest score the HACOR rules can produce.
pub const HACOR_MAX: u8 = 6;

/// Round half away from zero to `places` decimals.
pub fn round_to(value: f64, places: i32) -> f64 {
    let factor = 10f64.powi(places);
    (value * factor).round() / factor
}

/// Risk cutoff table applied to a HACOR score.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HacorPolicy {
    /// Standalone calculator: 5..=7 medium, above 7 high.
    ///
    /// The high band sits above [`HACOR_MAX`] and cannot be reached.
    Standalone,
    /// NIV monitoring: 3 and up medium, 5 and up high.
    Niv,
}

impl HacorPolicy {
    pub fn classify(&self, score: u8) -> RiskLevel {
        match self {
            HacorPolicy::Standalone => {
                if score > 7 {
                    RiskLevel::High
                } else if score >= 5 {
                    RiskLevel::Medium
                } else {
                    RiskLevel::Low
                }
            }
            HacorPolicy::Niv => {
                if score >= 5 {
                    RiskLevel::High
                } else if score >= 3 {
                    RiskLevel::Medium
                } else {
                    RiskLevel::Low
                }
            }
        }
    }
}

/// Raw HACOR points. Every axis only compares against a threshold, so
/// out-of-range inputs (GCS 0, pH 9) just score or don't.
pub fn hacor_points(inputs: &HacorInputs) -> u8 {
    let mut score = 0;

    if inputs.heart_rate >= 120.0 {
        score += 1;
    }
    if inputs.acidosis < 7.35 {
        score += 1;
    }
    if inputs.consciousness < 15 {
        score += 1;
    }
    // Oxygenation counts twice below 150.
    if inputs.oxygenation < 200.0 {
        score += 1;
    }
    if inputs.oxygenation < 150.0 {
        score += 1;
    }
    if inputs.respiratory_rate > 30.0 {
        score += 1;
    }

    score
}

/// HACOR as reported by the standalone score calculator.
pub fn score_hacor_standalone(inputs: &HacorInputs) -> HacorScore {
    score_hacor(inputs, HacorPolicy::Standalone)
}

/// HACOR as reported inside NIV monitoring.
pub fn score_hacor_for_niv(inputs: &HacorInputs) -> HacorScore {
    score_hacor(inputs, HacorPolicy::Niv)
}

pub fn score_hacor(inputs: &HacorInputs, policy: HacorPolicy) -> HacorScore {
    let score = hacor_points(inputs);
    HacorScore {
        score,
        risk: policy.classify(score),
    }
}

/// Build HACOR inputs from an NIV entry, deriving P/F from PaO2 and FiO2 (%).
pub fn niv_hacor_inputs(entry: &NivEntry) -> Result<HacorInputs, EngineError> {
    let pao2 = require_finite("pao2", entry.pao2)?;
    let fio2 = require_divisor("fio2", entry.fio2)?;

    Ok(HacorInputs {
        heart_rate: entry.heart_rate,
        acidosis: entry.ph,
        consciousness: entry.consciousness,
        oxygenation: pao2 / (fio2 / 100.0),
        respiratory_rate: entry.respiratory_rate,
    })
}

pub fn classify_rox(index: f64) -> RiskLevel {
    if index >= ROX_LOW_RISK {
        RiskLevel::Low
    } else if index >= ROX_MEDIUM_RISK {
        RiskLevel::Medium
    } else {
        RiskLevel::High
    }
}

/// ROX index: SpO2 / FiO2 / respiratory rate, with FiO2 as a percentage.
///
/// Risk is classified on the unrounded quotient; the reported index is
/// rounded to two decimals. Shared by the standalone calculator and HFNC
/// monitoring.
pub fn score_rox(inputs: &RoxInputs) -> Result<RoxScore, EngineError> {
    let spo2 = require_finite("spo2", inputs.spo2)?;
    let fio2 = require_divisor("fio2", inputs.fio2)?;
    let respiratory_rate = require_divisor("respiratory_rate", inputs.respiratory_rate)?;

    let raw = spo2 / fio2 / respiratory_rate;
    tracing::debug!(raw, "ROX computed");

    Ok(RoxScore {
        index: round_to(raw, 2),
        risk: classify_rox(raw),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn calm() -> HacorInputs {
        HacorInputs {
            heart_rate: 80.0,
            acidosis: 7.40,
            consciousness: 15,
            oxygenation: 300.0,
            respiratory_rate: 18.0,
        }
    }

    fn worst() -> HacorInputs {
        HacorInputs {
            heart_rate: 140.0,
            acidosis: 7.20,
            consciousness: 9,
            oxygenation: 90.0,
            respiratory_rate: 38.0,
        }
    }

    #[test]
    fn test_hacor_axes() {
        assert_eq!(hacor_points(&calm()), 0);
        assert_eq!(hacor_points(&worst()), HACOR_MAX);

        let hr = HacorInputs { heart_rate: 120.0, ..calm() };
        assert_eq!(hacor_points(&hr), 1);

        let ph = HacorInputs { acidosis: 7.35, ..calm() };
        assert_eq!(hacor_points(&ph), 0);

        let pf_moderate = HacorInputs { oxygenation: 180.0, ..calm() };
        assert_eq!(hacor_points(&pf_moderate), 1);

        let pf_severe = HacorInputs { oxygenation: 149.0, ..calm() };
        assert_eq!(hacor_points(&pf_severe), 2);

        let rr = HacorInputs { respiratory_rate: 30.0, ..calm() };
        assert_eq!(hacor_points(&rr), 0);
    }

    #[test]
    fn test_hacor_tolerates_out_of_range_gcs() {
        let low = HacorInputs { consciousness: 0, ..calm() };
        let high = HacorInputs { consciousness: 40, ..calm() };
        assert_eq!(hacor_points(&low), 1);
        assert_eq!(hacor_points(&high), 0);
    }

    #[test]
    fn test_hacor_policies_stay_distinct() {
        assert_eq!(HacorPolicy::Standalone.classify(4), RiskLevel::Low);
        assert_eq!(HacorPolicy::Standalone.classify(5), RiskLevel::Medium);
        assert_eq!(HacorPolicy::Standalone.classify(6), RiskLevel::Medium);

        assert_eq!(HacorPolicy::Niv.classify(2), RiskLevel::Low);
        assert_eq!(HacorPolicy::Niv.classify(3), RiskLevel::Medium);
        assert_eq!(HacorPolicy::Niv.classify(5), RiskLevel::High);

        let standalone = score_hacor_standalone(&worst());
        let niv = score_hacor_for_niv(&worst());
        assert_eq!(standalone.score, niv.score);
        assert_eq!(standalone.risk, RiskLevel::Medium);
        assert_eq!(niv.risk, RiskLevel::High);
    }

    #[test]
    fn test_standalone_high_band_is_unreachable() {
        // The table only says high above 7, and no input reaches 7.
        assert_eq!(HacorPolicy::Standalone.classify(8), RiskLevel::High);
        assert_ne!(score_hacor_standalone(&worst()).risk, RiskLevel::High);
    }

    #[test]
    fn test_niv_inputs_derive_pf_ratio() {
        let entry = NivEntry {
            heart_rate: 110.0,
            ph: 7.31,
            consciousness: 14,
            pao2: 70.0,
            fio2: 50.0,
            respiratory_rate: 32.0,
            ..Default::default()
        };
        let inputs = niv_hacor_inputs(&entry).unwrap();
        assert_eq!(inputs.oxygenation, 140.0);
        assert_eq!(score_hacor_for_niv(&inputs).score, 5);

        let no_fio2 = NivEntry { fio2: 0.0, ..entry };
        assert!(matches!(
            niv_hacor_inputs(&no_fio2),
            Err(EngineError::InvalidDivisor { field: "fio2", .. })
        ));
    }

    #[test]
    fn test_rox_uses_fio2_percent() {
        let rox = score_rox(&RoxInputs { spo2: 95.0, fio2: 50.0, respiratory_rate: 20.0 }).unwrap();
        assert_eq!(rox.index, 0.1);
        assert_eq!(rox.risk, RiskLevel::High);
    }

    #[test]
    fn test_rox_cutoffs() {
        assert_eq!(classify_rox(4.88), RiskLevel::Low);
        assert_eq!(classify_rox(4.87), RiskLevel::Medium);
        assert_eq!(classify_rox(3.85), RiskLevel::Medium);
        assert_eq!(classify_rox(3.84), RiskLevel::High);
    }

    #[test]
    fn test_rox_rejects_zero_divisors() {
        let zero_fio2 = RoxInputs { spo2: 95.0, fio2: 0.0, respiratory_rate: 20.0 };
        assert!(matches!(
            score_rox(&zero_fio2),
            Err(EngineError::InvalidDivisor { field: "fio2", .. })
        ));

        let zero_rr = RoxInputs { spo2: 95.0, fio2: 40.0, respiratory_rate: 0.0 };
        assert!(matches!(
            score_rox(&zero_rr),
            Err(EngineError::InvalidDivisor { field: "respiratory_rate", .. })
        ));

        let nan_spo2 = RoxInputs { spo2: f64::NAN, fio2: 40.0, respiratory_rate: 20.0 };
        assert_eq!(score_rox(&nan_spo2), Err(EngineError::NonFinite { field: "spo2" }));
    }

    #[test]
    fn test_scores_are_repeatable() {
        let inputs = RoxInputs { spo2: 92.0, fio2: 0.4, respiratory_rate: 24.0 };
        assert_eq!(score_rox(&inputs), score_rox(&inputs));
        assert_eq!(score_hacor_standalone(&worst()), score_hacor_standalone(&worst()));
    }

    #[test]
    fn test_round_to() {
        assert_eq!(round_to(37.333333, 1), 37.3);
        assert_eq!(round_to(159.5, 0), 160.0);
        assert_eq!(round_to(-0.25, 1), -0.3);
        // Binary halves round on the scaled product, not the decimal text.
        assert_eq!(round_to(0.35, 1), 0.4);
    }

    proptest! {
        #[test]
        fn hacor_stays_in_range(
            hr in 0.0..250.0f64,
            ph in 6.5..8.0f64,
            gcs in 0..20i32,
            pf in 0.0..600.0f64,
            rr in 0.0..70.0f64,
        ) {
            let inputs = HacorInputs {
                heart_rate: hr,
                acidosis: ph,
                consciousness: gcs,
                oxygenation: pf,
                respiratory_rate: rr,
            };
            let result = score_hacor_standalone(&inputs);
            prop_assert!(result.score <= HACOR_MAX);
            prop_assert_ne!(result.risk, RiskLevel::High);
        }

        #[test]
        fn hacor_is_monotone_in_each_axis(
            hr in 0.0..250.0f64,
            ph in 6.5..8.0f64,
            gcs in 3..=15i32,
            pf in 0.0..600.0f64,
            rr in 0.0..70.0f64,
            bump in 0.0..100.0f64,
            gcs_drop in 0..12i32,
        ) {
            let base = HacorInputs {
                heart_rate: hr,
                acidosis: ph,
                consciousness: gcs,
                oxygenation: pf,
                respiratory_rate: rr,
            };
            let score = hacor_points(&base);

            let faster = HacorInputs { heart_rate: hr + bump, ..base };
            let more_acidotic = HacorInputs { acidosis: ph - bump / 100.0, ..base };
            let less_alert = HacorInputs { consciousness: gcs - gcs_drop, ..base };
            let worse_oxygenation = HacorInputs { oxygenation: pf - bump, ..base };
            let more_tachypneic = HacorInputs { respiratory_rate: rr + bump, ..base };

            prop_assert!(hacor_points(&faster) >= score);
            prop_assert!(hacor_points(&more_acidotic) >= score);
            prop_assert!(hacor_points(&less_alert) >= score);
            prop_assert!(hacor_points(&worse_oxygenation) >= score);
            prop_assert!(hacor_points(&more_tachypneic) >= score);
        }
    }
}
