//! Clinical alert rules for IMV, NIV and HFNC monitoring.
//!
//! Each modality has an ordered table of cascades. A cascade is a group of
//! mutually exclusive rules (first match wins); cascades are independent of
//! each other and are evaluated top to bottom, so the output order is the
//! table order, not severity order. Nothing is deduplicated.

use serde::Serialize;
use std::fmt;

use super::models::{
    AsynchronyFrequency, CannulaFit, HfncEntry, NivEntry, SkinIntegrity, VmiEntry, VmiMetrics,
    WeaningStatus,
};
use super::scores::{ROX_LOW_RISK, ROX_MEDIUM_RISK};

/// Prefix that marks a reassuring finding in the rendered alert text.
pub const POSITIVE_MARK: &str = "✓ ";

pub const FIO2_LIMIT: f64 = 60.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Tone {
    Positive,
    Warning,
}

/// A fired rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Alert {
    pub code: &'static str,
    pub tone: Tone,
    pub message: &'static str,
}

impl Alert {
    pub fn is_positive(&self) -> bool {
        self.tone == Tone::Positive
    }
}

impl fmt::Display for Alert {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.tone {
            Tone::Positive => write!(f, "{}{}", POSITIVE_MARK, self.message),
            Tone::Warning => f.write_str(self.message),
        }
    }
}

/// A single predicate and the alert it raises.
pub struct Rule<C> {
    pub code: &'static str,
    pub tone: Tone,
    pub message: &'static str,
    pub when: C,
}

impl<C> Rule<C> {
    fn alert(&self) -> Alert {
        Alert {
            code: self.code,
            tone: self.tone,
            message: self.message,
        }
    }
}

/// Mutually exclusive rules on one clinical axis.
pub struct Cascade<C: 'static> {
    pub axis: &'static str,
    pub rules: &'static [Rule<C>],
}

/// Run every cascade in order, keeping at most one alert per cascade.
pub fn evaluate<C: Copy>(table: &[Cascade<C>], mut fires: impl FnMut(C) -> bool) -> Vec<Alert> {
    let mut alerts = Vec::new();
    for cascade in table {
        if let Some(rule) = cascade.rules.iter().find(|r| fires(r.when)) {
            tracing::debug!(axis = cascade.axis, code = rule.code, "alert rule fired");
            alerts.push(rule.alert());
        }
    }
    alerts
}

fn render(alerts: Vec<Alert>) -> Vec<String> {
    alerts.iter().map(Alert::to_string).collect()
}

// ============================================================================
// IMV
// ============================================================================

pub type ImvCheck = fn(&VmiEntry, &VmiMetrics) -> bool;

fn above(value: Option<f64>, limit: f64) -> bool {
    value.is_some_and(|v| v > limit)
}

pub static IMV_RULES: &[Cascade<ImvCheck>] = &[
    Cascade {
        axis: "vt-per-kg",
        rules: &[
            Rule {
                code: "imv.vt-high",
                tone: Tone::Warning,
                message: "Vt/kg elevado - Considerar reducción para ventilación protectiva (objetivo: 6-8 ml/kg)",
                when: |_, m| m.vt_per_kg > 8.0,
            },
            Rule {
                code: "imv.vt-very-low",
                tone: Tone::Warning,
                message: "Vt/kg muy bajo - Verificar si es intencional o revisar configuración",
                when: |_, m| m.vt_per_kg > 0.0 && m.vt_per_kg < 4.0,
            },
        ],
    },
    Cascade {
        axis: "plateau-pressure",
        rules: &[
            Rule {
                code: "imv.plateau-high",
                tone: Tone::Warning,
                message: "Pplat > 30 cmH₂O - Alto riesgo de barotrauma y volutrauma",
                when: |e, _| above(e.plateau_pressure, 30.0),
            },
            Rule {
                code: "imv.plateau-caution",
                tone: Tone::Warning,
                message: "Pplat entre 28-30 cmH₂O - Zona de precaución, considerar optimización",
                when: |e, _| above(e.plateau_pressure, 28.0),
            },
        ],
    },
    Cascade {
        axis: "driving-pressure",
        rules: &[
            Rule {
                code: "imv.driving-pressure-high",
                tone: Tone::Warning,
                message: "Driving pressure > 15 cmH₂O - Fuerte predictor de mortalidad en SDRA",
                when: |_, m| m.driving_pressure > 15.0,
            },
            Rule {
                code: "imv.driving-pressure-elevated",
                tone: Tone::Warning,
                message: "Driving pressure elevada - Considerar reducir Vt o aumentar PEEP si es apropiado",
                when: |_, m| m.driving_pressure > 13.0,
            },
        ],
    },
    Cascade {
        axis: "peep",
        rules: &[Rule {
            code: "imv.peep-low",
            tone: Tone::Warning,
            message: "PEEP baja - Riesgo de atelectrauma (colapso-apertura cíclico)",
            when: |e, _| e.peep.is_some_and(|p| p < 5.0),
        }],
    },
    Cascade {
        axis: "compliance",
        rules: &[Rule {
            code: "imv.compliance-low",
            tone: Tone::Warning,
            message: "Compliance muy baja - Pulmón extremadamente rígido, considerar estrategias avanzadas",
            when: |_, m| m.compliance.is_some_and(|c| c < 30.0),
        }],
    },
    Cascade {
        axis: "pf-ratio",
        rules: &[
            Rule {
                code: "imv.pf-severe",
                tone: Tone::Warning,
                message: "P/F < 100 - SDRA severo. Considerar prono, reclutamiento, ECMO según contexto",
                when: |_, m| m.pf_ratio.is_some_and(|pf| pf < 100.0),
            },
            Rule {
                code: "imv.pf-moderate",
                tone: Tone::Warning,
                message: "P/F < 200 - SDRA moderado/severo. Optimizar estrategia ventilatoria",
                when: |_, m| m.pf_ratio.is_some_and(|pf| pf < 200.0),
            },
        ],
    },
    Cascade {
        axis: "asynchrony",
        rules: &[
            Rule {
                code: "imv.asynchrony-frequent",
                tone: Tone::Warning,
                message: "Asincronías frecuentes - Revisar trigger, flujo, modo ventilatorio y nivel de sedación",
                when: |e, _| {
                    e.has_asynchrony && e.asynchrony_frequency == Some(AsynchronyFrequency::Frequent)
                },
            },
            Rule {
                code: "imv.asynchrony-occasional",
                tone: Tone::Warning,
                message: "Asincronías ocasionales detectadas - Monitorear evolución",
                when: |e, _| {
                    e.has_asynchrony
                        && e.asynchrony_frequency == Some(AsynchronyFrequency::Occasional)
                },
            },
        ],
    },
    Cascade {
        axis: "weaning",
        rules: &[Rule {
            code: "imv.sbt-missing",
            tone: Tone::Warning,
            message: "Paciente candidato a destete sin SBT registrada - Considerar realizar prueba",
            when: |e, _| {
                e.weaning_status == WeaningStatus::Candidate && !e.sbt_performed.unwrap_or(false)
            },
        }],
    },
    Cascade {
        axis: "mobilization",
        rules: &[Rule {
            code: "imv.mobilization-missing",
            tone: Tone::Warning,
            message: "Sin movilización documentada - Registrar barreras o considerar inicio progresivo",
            when: |e, _| {
                e.mobilization_level.value() == 0
                    && e.mobilization_barrier.as_deref().map_or(true, str::is_empty)
            },
        }],
    },
    Cascade {
        axis: "fio2",
        rules: &[Rule {
            code: "imv.fio2-high",
            tone: Tone::Warning,
            message: "FiO₂ > 60% - Riesgo de toxicidad por oxígeno. Optimizar PEEP para reducir FiO₂",
            when: |e, _| above(e.fio2, FIO2_LIMIT),
        }],
    },
    Cascade {
        axis: "protective-ventilation",
        rules: &[Rule {
            code: "imv.protective",
            tone: Tone::Positive,
            message: "Ventilación protectiva lograda - Vt/kg, Pplat y ΔP en rangos objetivo",
            when: |_, m| m.protective_ventilation,
        }],
    },
];

pub fn imv_alerts(entry: &VmiEntry, metrics: &VmiMetrics) -> Vec<Alert> {
    evaluate(IMV_RULES, |check| check(entry, metrics))
}

pub fn generate_imv_alerts(entry: &VmiEntry, metrics: &VmiMetrics) -> Vec<String> {
    render(imv_alerts(entry, metrics))
}

// ============================================================================
// NIV
// ============================================================================

/// NIV rules see the entry and the HACOR score, if one was computed.
pub type NivCheck = fn(&NivEntry, Option<u8>) -> bool;

pub static NIV_RULES: &[Cascade<NivCheck>] = &[
    Cascade {
        axis: "hacor",
        rules: &[
            Rule {
                code: "niv.hacor-high",
                tone: Tone::Warning,
                message: "HACOR > 5 - Alto riesgo de fracaso de VNI. Considerar escalada a VMI si no hay mejoría",
                when: |_, hacor| hacor.is_some_and(|s| s > 5),
            },
            Rule {
                code: "niv.hacor-moderate",
                tone: Tone::Warning,
                message: "HACOR 3-5 - Riesgo moderado. Monitoreo estrecho y reevaluación frecuente",
                when: |_, hacor| hacor.is_some_and(|s| s >= 3),
            },
            Rule {
                code: "niv.hacor-low",
                tone: Tone::Positive,
                message: "HACOR < 3 - Bajo riesgo de fracaso de VNI",
                when: |_, hacor| hacor.is_some(),
            },
        ],
    },
    Cascade {
        axis: "skin-integrity",
        rules: &[
            Rule {
                code: "niv.skin-severe",
                tone: Tone::Warning,
                message: "Lesión por presión severa - Revisar interfaz, ajuste y considerar cambio de tipo",
                when: |e, _| e.skin_integrity == SkinIntegrity::SevereInjury,
            },
            Rule {
                code: "niv.skin-pressure-injury",
                tone: Tone::Warning,
                message: "Lesión por presión detectada - Optimizar ajuste de interfaz y protección cutánea",
                when: |e, _| e.skin_integrity == SkinIntegrity::PressureInjury,
            },
            Rule {
                code: "niv.skin-erythema",
                tone: Tone::Warning,
                message: "Eritema leve - Monitorear evolución y ajustar interfaz si es necesario",
                when: |e, _| e.skin_integrity == SkinIntegrity::MildErythema,
            },
        ],
    },
    Cascade {
        axis: "leak",
        rules: &[Rule {
            code: "niv.leak-high",
            tone: Tone::Warning,
            message: "Fuga elevada (> 30 L/min) - Revisar ajuste de interfaz para optimizar efectividad",
            when: |e, _| e.leak.is_some_and(|l| l > 30.0),
        }],
    },
    Cascade {
        axis: "fio2",
        rules: &[Rule {
            code: "niv.fio2-high",
            tone: Tone::Warning,
            message: "FiO₂ > 60% - Considerar si VNI es el soporte adecuado o si requiere escalada",
            when: |e, _| e.fio2 > FIO2_LIMIT,
        }],
    },
    Cascade {
        axis: "previous-imv",
        rules: &[Rule {
            code: "niv.prolonged-imv",
            tone: Tone::Warning,
            message: "Paciente con VMI prolongada previa - Mayor riesgo de debilidad muscular respiratoria",
            when: |e, _| e.previous_imv_days.is_some_and(|d| d > 7.0),
        }],
    },
];

pub fn niv_alerts(entry: &NivEntry, hacor_score: Option<u8>) -> Vec<Alert> {
    evaluate(NIV_RULES, |check| check(entry, hacor_score))
}

pub fn generate_niv_alerts(entry: &NivEntry, hacor_score: Option<u8>) -> Vec<String> {
    render(niv_alerts(entry, hacor_score))
}

// ============================================================================
// HFNC
// ============================================================================

/// HFNC rules see the entry and the rounded ROX index, if one was computed.
pub type HfncCheck = fn(&HfncEntry, Option<f64>) -> bool;

pub static HFNC_RULES: &[Cascade<HfncCheck>] = &[
    Cascade {
        axis: "rox",
        rules: &[
            Rule {
                code: "hfnc.rox-low-risk",
                tone: Tone::Positive,
                message: "ROX ≥ 4.88 - Bajo riesgo de fracaso de HFNC. Buena respuesta al tratamiento",
                when: |_, rox| rox.is_some_and(|i| i >= ROX_LOW_RISK),
            },
            Rule {
                code: "hfnc.rox-moderate",
                tone: Tone::Warning,
                message: "ROX 3.85-4.88 - Riesgo moderado. Monitoreo estrecho y reevaluación",
                when: |_, rox| rox.is_some_and(|i| i >= ROX_MEDIUM_RISK),
            },
            Rule {
                code: "hfnc.rox-high-risk",
                tone: Tone::Warning,
                message: "ROX < 3.85 - Alto riesgo de fracaso. Considerar escalada a VNI o VMI",
                when: |_, rox| rox.is_some(),
            },
        ],
    },
    Cascade {
        axis: "flow",
        rules: &[
            Rule {
                code: "hfnc.flow-low",
                tone: Tone::Warning,
                message: "Flujo < 30 L/min - Verificar si es adecuado para HFNC o considerar dispositivo convencional",
                when: |e, _| e.flow < 30.0,
            },
            Rule {
                code: "hfnc.flow-high",
                tone: Tone::Warning,
                message: "Flujo muy alto (> 60 L/min) - Verificar tolerancia del paciente",
                when: |e, _| e.flow > 60.0,
            },
        ],
    },
    Cascade {
        axis: "fio2",
        rules: &[Rule {
            code: "hfnc.fio2-high",
            tone: Tone::Warning,
            message: "FiO₂ > 60% - Evaluar si HFNC es suficiente o si requiere soporte ventilatorio",
            when: |e, _| e.fio2 > FIO2_LIMIT,
        }],
    },
    Cascade {
        axis: "humidification",
        rules: &[Rule {
            code: "hfnc.humidification-failed",
            tone: Tone::Warning,
            message: "Humidificación no funcionando - Riesgo de sequedad de mucosas y menor efectividad",
            when: |e, _| !e.humidification_working,
        }],
    },
    Cascade {
        axis: "cannula-fit",
        rules: &[
            Rule {
                code: "hfnc.cannula-leak",
                tone: Tone::Warning,
                message: "Fuga significativa en cánula - Revisar tamaño y posición para optimizar efectividad",
                when: |e, _| e.cannula_fit == CannulaFit::SignificantLeak,
            },
            Rule {
                code: "hfnc.cannula-discomfort",
                tone: Tone::Warning,
                message: "Paciente refiere molestias - Evaluar ajuste y considerar cambio de tamaño",
                when: |e, _| e.cannula_fit == CannulaFit::Discomfort,
            },
        ],
    },
];

pub fn hfnc_alerts(entry: &HfncEntry, rox_index: Option<f64>) -> Vec<Alert> {
    evaluate(HFNC_RULES, |check| check(entry, rox_index))
}

pub fn generate_hfnc_alerts(entry: &HfncEntry, rox_index: Option<f64>) -> Vec<String> {
    render(hfnc_alerts(entry, rox_index))
}
