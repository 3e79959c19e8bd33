//! HTTP request handlers.

use super::AppState;
use crate::db::{BedSlot, DbError, Patient, PatientInput, ScoreKind, ScoreRecord, Sector};
use crate::engine::{
    self, EngineError, HacorInputs, HacorScore, HfncEntry, HfncRecord, NivEntry, NivRecord,
    QualityMetrics, RoxInputs, RoxScore, VmiAssessment, VmiEntry, VmiRecord,
};

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde::Deserialize;
use thiserror::Error;

// ============================================================================
// Errors
// ============================================================================

/// Errors surfaced by the API, mapped to HTTP status codes.
#[derive(Error, Debug)]
pub enum ApiError {
    #[error(transparent)]
    Db(#[from] DbError),
    #[error(transparent)]
    Engine(#[from] EngineError),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Db(DbError::NotFound) => StatusCode::NOT_FOUND,
            ApiError::Db(DbError::Conflict(_)) => StatusCode::CONFLICT,
            ApiError::Db(DbError::Invalid(_)) => StatusCode::BAD_REQUEST,
            ApiError::Db(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Engine(_) => StatusCode::UNPROCESSABLE_ENTITY,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!("Request failed: {}", self);
        }
        (status, Json(serde_json::json!({ "error": self.to_string() }))).into_response()
    }
}

type ApiResult<T> = Result<T, ApiError>;

pub async fn handle_health() -> &'static str {
    "ok"
}

// ============================================================================
// API: Sectors
// ============================================================================

pub async fn handle_get_sectors(State(state): State<AppState>) -> ApiResult<Json<Vec<Sector>>> {
    Ok(Json(state.store.list_sectors()?))
}

pub async fn handle_get_sector_beds(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<Json<Vec<BedSlot>>> {
    Ok(Json(state.store.sector_beds(id)?))
}

pub async fn handle_get_sector_patients(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<Json<Vec<Patient>>> {
    state.store.get_sector(id)?;
    Ok(Json(state.store.list_sector_patients(id)?))
}

// ============================================================================
// API: Patients
// ============================================================================

pub async fn handle_get_patients(State(state): State<AppState>) -> ApiResult<Json<Vec<Patient>>> {
    Ok(Json(state.store.list_patients()?))
}

pub async fn handle_create_patient(
    State(state): State<AppState>,
    Json(req): Json<PatientInput>,
) -> ApiResult<(StatusCode, Json<Patient>)> {
    let patient = state.store.add_patient(&req)?;
    Ok((StatusCode::CREATED, Json(patient)))
}

pub async fn handle_get_patient(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<Json<Patient>> {
    Ok(Json(state.store.get_patient(id)?))
}

pub async fn handle_update_patient(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(req): Json<PatientInput>,
) -> ApiResult<Json<Patient>> {
    Ok(Json(state.store.update_patient(id, &req)?))
}

pub async fn handle_delete_patient(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<StatusCode> {
    state.store.delete_patient(id)?;
    Ok(StatusCode::NO_CONTENT)
}

// ============================================================================
// API: Calculators
// ============================================================================

pub async fn handle_calculate_hacor(Json(inputs): Json<HacorInputs>) -> Json<HacorScore> {
    Json(engine::score_hacor_standalone(&inputs))
}

pub async fn handle_calculate_rox(Json(inputs): Json<RoxInputs>) -> ApiResult<Json<RoxScore>> {
    Ok(Json(engine::score_rox(&inputs)?))
}

/// Preview metrics and alerts for an IMV entry without saving it.
pub async fn handle_calculate_vmi(Json(entry): Json<VmiEntry>) -> Json<VmiAssessment> {
    Json(engine::assess_vmi(&entry))
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", content = "inputs", rename_all = "lowercase")]
pub enum CreateScoreRequest {
    Hacor(HacorInputs),
    Rox(RoxInputs),
}

pub async fn handle_get_scores(
    State(state): State<AppState>,
    Path(patient_id): Path<i64>,
) -> ApiResult<Json<Vec<ScoreRecord>>> {
    state.store.get_patient(patient_id)?;
    Ok(Json(state.store.list_patient_scores(patient_id)?))
}

pub async fn handle_create_score(
    State(state): State<AppState>,
    Path(patient_id): Path<i64>,
    Json(req): Json<CreateScoreRequest>,
) -> ApiResult<(StatusCode, Json<ScoreRecord>)> {
    let (kind, value, risk, inputs) = match req {
        CreateScoreRequest::Hacor(inputs) => {
            let result = engine::score_hacor_standalone(&inputs);
            (
                ScoreKind::Hacor,
                f64::from(result.score),
                result.risk,
                serde_json::to_value(inputs).map_err(DbError::from)?,
            )
        }
        CreateScoreRequest::Rox(inputs) => {
            let result = engine::score_rox(&inputs)?;
            (
                ScoreKind::Rox,
                result.index,
                result.risk,
                serde_json::to_value(inputs).map_err(DbError::from)?,
            )
        }
    };

    let record = state.store.add_score(patient_id, kind, value, risk, inputs)?;
    tracing::info!(
        "Saved {} score {} ({}) for patient {}",
        kind.as_str(),
        record.value,
        record.risk.as_str(),
        patient_id
    );
    Ok((StatusCode::CREATED, Json(record)))
}

// ============================================================================
// API: IMV monitoring
// ============================================================================

pub async fn handle_create_vmi_record(
    State(state): State<AppState>,
    Path(patient_id): Path<i64>,
    Json(mut entry): Json<VmiEntry>,
) -> ApiResult<(StatusCode, Json<VmiRecord>)> {
    let patient = state.store.get_patient(patient_id)?;
    if entry.predicted_body_weight.is_none() {
        entry.predicted_body_weight = patient.predicted_body_weight;
    }

    let assessment = engine::assess_vmi(&entry);
    let record = state.store.add_vmi_record(patient_id, entry, assessment)?;
    tracing::info!(
        "IMV record {} for patient {}: {} alerts",
        record.id,
        patient_id,
        record.assessment.alerts.len()
    );
    Ok((StatusCode::CREATED, Json(record)))
}

pub async fn handle_get_vmi_records(
    State(state): State<AppState>,
    Path(patient_id): Path<i64>,
) -> ApiResult<Json<Vec<VmiRecord>>> {
    state.store.get_patient(patient_id)?;
    Ok(Json(state.store.list_patient_vmi_records(patient_id)?))
}

pub async fn handle_get_vmi_record(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<Json<VmiRecord>> {
    Ok(Json(state.store.get_vmi_record(id)?))
}

pub async fn handle_get_vmi_quality(
    State(state): State<AppState>,
    Path(patient_id): Path<i64>,
) -> ApiResult<Json<QualityMetrics>> {
    state.store.get_patient(patient_id)?;
    let records = state.store.list_patient_vmi_records(patient_id)?;
    Ok(Json(engine::compute_quality_metrics(&records)))
}

// ============================================================================
// API: NIV monitoring
// ============================================================================

pub async fn handle_create_niv_record(
    State(state): State<AppState>,
    Path(patient_id): Path<i64>,
    Json(entry): Json<NivEntry>,
) -> ApiResult<(StatusCode, Json<NivRecord>)> {
    let assessment = engine::assess_niv(&entry)?;
    let record = state.store.add_niv_record(patient_id, entry, assessment)?;
    tracing::info!(
        "NIV record {} for patient {}: HACOR {} ({})",
        record.id,
        patient_id,
        record.assessment.hacor_score,
        record.assessment.hacor_risk.as_str()
    );
    Ok((StatusCode::CREATED, Json(record)))
}

pub async fn handle_get_niv_records(
    State(state): State<AppState>,
    Path(patient_id): Path<i64>,
) -> ApiResult<Json<Vec<NivRecord>>> {
    state.store.get_patient(patient_id)?;
    Ok(Json(state.store.list_patient_niv_records(patient_id)?))
}

pub async fn handle_get_niv_record(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<Json<NivRecord>> {
    Ok(Json(state.store.get_niv_record(id)?))
}

// ============================================================================
// API: HFNC monitoring
// ============================================================================

pub async fn handle_create_hfnc_record(
    State(state): State<AppState>,
    Path(patient_id): Path<i64>,
    Json(entry): Json<HfncEntry>,
) -> ApiResult<(StatusCode, Json<HfncRecord>)> {
    let assessment = engine::assess_hfnc(&entry)?;
    let record = state.store.add_hfnc_record(patient_id, entry, assessment)?;
    tracing::info!(
        "HFNC record {} for patient {}: ROX {} ({})",
        record.id,
        patient_id,
        record.assessment.rox_index,
        record.assessment.rox_risk.as_str()
    );
    Ok((StatusCode::CREATED, Json(record)))
}

pub async fn handle_get_hfnc_records(
    State(state): State<AppState>,
    Path(patient_id): Path<i64>,
) -> ApiResult<Json<Vec<HfncRecord>>> {
    state.store.get_patient(patient_id)?;
    Ok(Json(state.store.list_patient_hfnc_records(patient_id)?))
}

pub async fn handle_get_hfnc_record(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<Json<HfncRecord>> {
    Ok(Json(state.store.get_hfnc_record(id)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ServerConfig;
    use crate::db::Store;
    use crate::engine::{RiskLevel, SupportType};
    use std::sync::Arc;
    use tempfile::NamedTempFile;
    use tokio_test::{assert_err, assert_ok};

    fn test_state() -> (NamedTempFile, AppState) {
        let tmp = NamedTempFile::new().unwrap();
        let store = Store::new(tmp.path()).unwrap();
        store.seed_default_sectors().unwrap();
        let state = AppState {
            config: ServerConfig::default(),
            store: Arc::new(store),
        };
        (tmp, state)
    }

    async fn admit(state: &AppState, bed: u32, support_type: SupportType) -> Patient {
        let input = PatientInput {
            alias: format!("PAC-{:03}", bed),
            sector_id: 2,
            bed,
            support_type,
            predicted_body_weight: Some(70.0),
        };
        let (status, Json(patient)) =
            assert_ok!(handle_create_patient(State(state.clone()), Json(input)).await);
        assert_eq!(status, StatusCode::CREATED);
        patient
    }

    async fn error_body(err: ApiError) -> (StatusCode, serde_json::Value) {
        let response = err.into_response();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_error_mapping() {
        assert_eq!(ApiError::from(DbError::NotFound).status(), StatusCode::NOT_FOUND);
        assert_eq!(
            ApiError::from(DbError::Conflict("bed".into())).status(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            ApiError::from(DbError::Invalid("alias".into())).status(),
            StatusCode::BAD_REQUEST
        );

        let (status, body) = error_body(ApiError::from(EngineError::NonFinite { field: "spo2" })).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["error"], "spo2 must be a finite number");
    }

    #[tokio::test]
    async fn test_calculators() {
        let Json(hacor) = handle_calculate_hacor(Json(HacorInputs {
            heart_rate: 130.0,
            acidosis: 7.30,
            consciousness: 12,
            oxygenation: 140.0,
            respiratory_rate: 35.0,
        }))
        .await;
        assert_eq!(hacor.score, 6);
        assert_eq!(hacor.risk, RiskLevel::Medium);

        let Json(rox) = assert_ok!(
            handle_calculate_rox(Json(RoxInputs { spo2: 95.0, fio2: 50.0, respiratory_rate: 20.0 })).await
        );
        assert_eq!(rox.index, 0.1);

        let err = assert_err!(
            handle_calculate_rox(Json(RoxInputs { spo2: 95.0, fio2: 50.0, respiratory_rate: 0.0 })).await
        );
        assert_eq!(err.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn test_patient_lifecycle() {
        let (_tmp, state) = test_state();
        let patient = admit(&state, 1, SupportType::Niv).await;

        let Json(beds) = assert_ok!(handle_get_sector_beds(State(state.clone()), Path(2)).await);
        assert_eq!(beds.len(), 6);
        assert_eq!(beds[0].patient.as_ref().map(|p| p.id), Some(patient.id));

        let duplicate = PatientInput {
            alias: "PAC-999".to_string(),
            sector_id: 2,
            bed: 1,
            support_type: SupportType::RoomAir,
            predicted_body_weight: None,
        };
        let err = assert_err!(handle_create_patient(State(state.clone()), Json(duplicate)).await);
        assert_eq!(err.status(), StatusCode::CONFLICT);

        let status = assert_ok!(handle_delete_patient(State(state.clone()), Path(patient.id)).await);
        assert_eq!(status, StatusCode::NO_CONTENT);

        let err = assert_err!(handle_get_patient(State(state.clone()), Path(patient.id)).await);
        assert_eq!(err.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_saved_scores() {
        let (_tmp, state) = test_state();
        let patient = admit(&state, 2, SupportType::Hfnc).await;

        let req: CreateScoreRequest = serde_json::from_value(serde_json::json!({
            "type": "rox",
            "inputs": { "spo2": 95, "fio2": 50, "respiratory_rate": 20 }
        }))
        .unwrap();
        let (status, Json(record)) =
            assert_ok!(handle_create_score(State(state.clone()), Path(patient.id), Json(req)).await);
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(record.kind, ScoreKind::Rox);
        assert_eq!(record.risk, RiskLevel::High);

        let Json(scores) = assert_ok!(handle_get_scores(State(state.clone()), Path(patient.id)).await);
        assert_eq!(scores.len(), 1);
        assert_eq!(scores[0].inputs["fio2"], 50.0);
    }

    #[tokio::test]
    async fn test_vmi_record_uses_patient_weight() {
        let (_tmp, state) = test_state();
        let patient = admit(&state, 3, SupportType::Imv).await;

        let entry = VmiEntry {
            tidal_volume_expired: Some(560.0),
            plateau_pressure: Some(25.0),
            peep: Some(10.0),
            ..Default::default()
        };
        let (_, Json(record)) = assert_ok!(
            handle_create_vmi_record(State(state.clone()), Path(patient.id), Json(entry)).await
        );
        assert_eq!(record.entry.predicted_body_weight, Some(70.0));
        assert_eq!(record.assessment.metrics.vt_per_kg, 8.0);
        assert!(record.assessment.metrics.protective_ventilation);

        let Json(fetched) = assert_ok!(handle_get_vmi_record(State(state.clone()), Path(record.id)).await);
        assert_eq!(fetched.assessment, record.assessment);

        let Json(quality) = assert_ok!(handle_get_vmi_quality(State(state.clone()), Path(patient.id)).await);
        assert_eq!(quality.total_records, 1);
        assert_eq!(quality.protective_ventilation_rate, 100.0);
    }

    #[tokio::test]
    async fn test_modules_follow_support_type() {
        let (_tmp, state) = test_state();
        let patient = admit(&state, 4, SupportType::Niv).await;

        let hfnc = HfncEntry {
            flow: 40.0,
            fio2: 40.0,
            spo2: 95.0,
            respiratory_rate: 20.0,
            ..Default::default()
        };
        let err = assert_err!(
            handle_create_hfnc_record(State(state.clone()), Path(patient.id), Json(hfnc)).await
        );
        assert_eq!(err.status(), StatusCode::CONFLICT);

        let niv = NivEntry {
            heart_rate: 100.0,
            ph: 7.38,
            consciousness: 15,
            pao2: 90.0,
            fio2: 40.0,
            respiratory_rate: 24.0,
            ipap: 12.0,
            epap: 5.0,
            ..Default::default()
        };
        let (_, Json(record)) = assert_ok!(
            handle_create_niv_record(State(state.clone()), Path(patient.id), Json(niv)).await
        );
        assert_eq!(record.assessment.hacor_score, 0);
        assert_eq!(record.assessment.hacor_risk, RiskLevel::Low);

        let Json(history) = assert_ok!(handle_get_niv_records(State(state.clone()), Path(patient.id)).await);
        assert_eq!(history.len(), 1);

        let bad = NivEntry { fio2: 0.0, ..record.entry.clone() };
        let err = assert_err!(
            handle_create_niv_record(State(state.clone()), Path(patient.id), Json(bad)).await
        );
        assert_eq!(err.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }
}
