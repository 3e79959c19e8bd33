//! SQLite database store implementation.

use chrono::{DateTime, NaiveDateTime, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Result as SqlResult, Row};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::Path;
use std::str::FromStr;
use std::sync::{Arc, Mutex, MutexGuard};
use thiserror::Error;

use super::models::*;
use crate::engine::{
    HfncAssessment, HfncEntry, HfncRecord, MonitoringRecord, NivAssessment, NivEntry, NivRecord,
    RiskLevel, VmiAssessment, VmiEntry, VmiRecord,
};

mod embedded {
    refinery::embed_migrations!("migrations");
}

const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.9f";

/// Database error types.
#[derive(Error, Debug)]
pub enum DbError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("Migration error: {0}")]
    Migration(String),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("Not found")]
    NotFound,
    #[error("Conflict: {0}")]
    Conflict(String),
    #[error("Invalid: {0}")]
    Invalid(String),
    #[error("Database connection lock poisoned")]
    Poisoned,
}

/// Thread-safe database store.
#[derive(Clone)]
pub struct Store {
    conn: Arc<Mutex<Connection>>,
}

impl Store {
    /// Create a new store with the given database path.
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self, DbError> {
        let conn = Connection::open(path)?;
        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        store.init()?;
        Ok(store)
    }

    /// Enable foreign keys and apply embedded migrations.
    fn init(&self) -> Result<(), DbError> {
        let mut conn = self.conn()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;

        let report = embedded::migrations::runner()
            .run(&mut *conn)
            .map_err(|e| DbError::Migration(e.to_string()))?;
        for migration in report.applied_migrations() {
            tracing::info!("Applied migration {}", migration);
        }

        Ok(())
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>, DbError> {
        self.conn.lock().map_err(|_| DbError::Poisoned)
    }

    // --- Sectors ---

    /// Add a new sector and return its ID.
    pub fn add_sector(&self, sector: &mut Sector) -> Result<i64, DbError> {
        if sector.name.trim().is_empty() {
            return Err(DbError::Invalid("sector name is required".to_string()));
        }
        if sector.beds == 0 {
            return Err(DbError::Invalid("sector needs at least one bed".to_string()));
        }

        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO sectors (name, beds) VALUES (?1, ?2)",
            params![sector.name, sector.beds],
        )?;
        let id = conn.last_insert_rowid();
        sector.id = id;
        Ok(id)
    }

    /// Insert the default units when no sector exists yet.
    pub fn seed_default_sectors(&self) -> Result<usize, DbError> {
        if !self.list_sectors()?.is_empty() {
            return Ok(0);
        }

        let mut seeded = 0;
        for mut sector in default_sectors() {
            self.add_sector(&mut sector)?;
            seeded += 1;
        }
        Ok(seeded)
    }

    /// Get all sectors.
    pub fn list_sectors(&self) -> Result<Vec<Sector>, DbError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare("SELECT id, name, beds FROM sectors ORDER BY id")?;
        let sectors = stmt
            .query_map([], sector_from_row)?
            .collect::<SqlResult<Vec<_>>>()?;
        Ok(sectors)
    }

    /// Get a sector by ID.
    pub fn get_sector(&self, id: i64) -> Result<Sector, DbError> {
        let conn = self.conn()?;
        query_sector(&conn, id)
    }

    /// Every bed of a sector with its occupant, if any.
    pub fn sector_beds(&self, sector_id: i64) -> Result<Vec<BedSlot>, DbError> {
        let sector = self.get_sector(sector_id)?;
        let mut patients = self.list_sector_patients(sector_id)?;

        let beds = (1..=sector.beds)
            .map(|bed| {
                let patient = patients
                    .iter()
                    .position(|p| p.bed == bed)
                    .map(|i| patients.swap_remove(i));
                BedSlot { bed, patient }
            })
            .collect();
        Ok(beds)
    }

    // --- Patients ---

    /// Admit a patient to a free bed.
    pub fn add_patient(&self, input: &PatientInput) -> Result<Patient, DbError> {
        let conn = self.conn()?;
        validate_patient(&conn, input, None)?;

        let created_at = Utc::now();
        conn.execute(
            "INSERT INTO patients (alias, sector_id, bed, support_type, predicted_body_weight, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                input.alias.trim(),
                input.sector_id,
                input.bed,
                input.support_type.as_str(),
                input.predicted_body_weight,
                format_db_time(&created_at),
            ],
        )?;
        let id = conn.last_insert_rowid();
        tracing::info!(
            "Admitted patient {} to sector {} bed {} ({})",
            id,
            input.sector_id,
            input.bed,
            input.support_type
        );

        query_patient(&conn, id)
    }

    /// Edit a patient in place. Support type changes are not versioned.
    pub fn update_patient(&self, id: i64, input: &PatientInput) -> Result<Patient, DbError> {
        let conn = self.conn()?;
        query_patient(&conn, id)?;
        validate_patient(&conn, input, Some(id))?;

        conn.execute(
            "UPDATE patients SET alias=?1, sector_id=?2, bed=?3, support_type=?4, predicted_body_weight=?5 WHERE id=?6",
            params![
                input.alias.trim(),
                input.sector_id,
                input.bed,
                input.support_type.as_str(),
                input.predicted_body_weight,
                id,
            ],
        )?;

        query_patient(&conn, id)
    }

    /// Get a patient by ID.
    pub fn get_patient(&self, id: i64) -> Result<Patient, DbError> {
        let conn = self.conn()?;
        query_patient(&conn, id)
    }

    /// Get all patients.
    pub fn list_patients(&self) -> Result<Vec<Patient>, DbError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!("{} ORDER BY sector_id, bed", PATIENT_SELECT))?;
        let patients = stmt
            .query_map([], patient_from_row)?
            .collect::<SqlResult<Vec<_>>>()?;
        Ok(patients)
    }

    /// Get the patients of one sector, ordered by bed.
    pub fn list_sector_patients(&self, sector_id: i64) -> Result<Vec<Patient>, DbError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!("{} WHERE sector_id = ?1 ORDER BY bed", PATIENT_SELECT))?;
        let patients = stmt
            .query_map(params![sector_id], patient_from_row)?
            .collect::<SqlResult<Vec<_>>>()?;
        Ok(patients)
    }

    /// Delete a patient together with its scores and monitoring records.
    pub fn delete_patient(&self, id: i64) -> Result<(), DbError> {
        let conn = self.conn()?;
        let tx = conn.unchecked_transaction()?;

        tx.execute("DELETE FROM scores WHERE patient_id = ?1", params![id])?;
        tx.execute("DELETE FROM monitoring_records WHERE patient_id = ?1", params![id])?;
        let deleted = tx.execute("DELETE FROM patients WHERE id = ?1", params![id])?;
        if deleted == 0 {
            return Err(DbError::NotFound);
        }

        tx.commit()?;
        tracing::info!("Deleted patient {} and its records", id);
        Ok(())
    }

    // --- Calculator scores ---

    /// Save a standalone calculator result for a patient.
    pub fn add_score(
        &self,
        patient_id: i64,
        kind: ScoreKind,
        value: f64,
        risk: RiskLevel,
        inputs: serde_json::Value,
    ) -> Result<ScoreRecord, DbError> {
        let conn = self.conn()?;
        query_patient(&conn, patient_id)?;

        let recorded_at = Utc::now();
        conn.execute(
            "INSERT INTO scores (patient_id, kind, value, risk, inputs, recorded_at) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                patient_id,
                kind.as_str(),
                value,
                risk.as_str(),
                serde_json::to_string(&inputs)?,
                format_db_time(&recorded_at),
            ],
        )?;

        Ok(ScoreRecord {
            id: conn.last_insert_rowid(),
            patient_id,
            kind,
            value,
            risk,
            inputs,
            recorded_at,
        })
    }

    /// Get a patient's saved scores, newest first.
    pub fn list_patient_scores(&self, patient_id: i64) -> Result<Vec<ScoreRecord>, DbError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT id, patient_id, kind, value, risk, inputs, recorded_at FROM scores
             WHERE patient_id = ?1 ORDER BY recorded_at DESC, id DESC",
        )?;

        let scores = stmt
            .query_map(params![patient_id], |row| {
                Ok(ScoreRecord {
                    id: row.get(0)?,
                    patient_id: row.get(1)?,
                    kind: parse_column(2, row.get(2)?)?,
                    value: row.get(3)?,
                    risk: parse_column(4, row.get(4)?)?,
                    inputs: json_column(5, row.get(5)?)?,
                    recorded_at: time_column(6, row.get(6)?)?,
                })
            })?
            .collect::<SqlResult<Vec<_>>>()?;

        Ok(scores)
    }

    // --- Monitoring records ---

    /// Store a monitoring entry and its assessment.
    ///
    /// The patient must currently be on the support type the module covers.
    pub fn add_monitoring_record<E, A>(
        &self,
        modality: Modality,
        patient_id: i64,
        entry: E,
        assessment: A,
    ) -> Result<MonitoringRecord<E, A>, DbError>
    where
        E: Serialize,
        A: Serialize,
    {
        let conn = self.conn()?;
        let patient = query_patient(&conn, patient_id)?;
        if patient.support_type != modality.support_type() {
            return Err(DbError::Conflict(format!(
                "{} monitoring requires support type {}, patient is on {}",
                modality,
                modality.support_type(),
                patient.support_type
            )));
        }

        let recorded_at = Utc::now();
        conn.execute(
            "INSERT INTO monitoring_records (patient_id, modality, entry, assessment, recorded_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                patient_id,
                modality.as_str(),
                serde_json::to_string(&entry)?,
                serde_json::to_string(&assessment)?,
                format_db_time(&recorded_at),
            ],
        )?;

        Ok(MonitoringRecord {
            id: conn.last_insert_rowid(),
            patient_id,
            recorded_at,
            entry,
            assessment,
        })
    }

    /// Get a monitoring record by ID within one module.
    pub fn get_monitoring_record<E, A>(
        &self,
        modality: Modality,
        id: i64,
    ) -> Result<MonitoringRecord<E, A>, DbError>
    where
        E: DeserializeOwned,
        A: DeserializeOwned,
    {
        let conn = self.conn()?;
        conn.query_row(
            "SELECT id, patient_id, recorded_at, entry, assessment FROM monitoring_records
             WHERE id = ?1 AND modality = ?2",
            params![id, modality.as_str()],
            record_from_row,
        )
        .optional()?
        .ok_or(DbError::NotFound)
    }

    /// Get a patient's records for one module, newest first.
    pub fn list_monitoring_records<E, A>(
        &self,
        modality: Modality,
        patient_id: i64,
    ) -> Result<Vec<MonitoringRecord<E, A>>, DbError>
    where
        E: DeserializeOwned,
        A: DeserializeOwned,
    {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT id, patient_id, recorded_at, entry, assessment FROM monitoring_records
             WHERE patient_id = ?1 AND modality = ?2 ORDER BY recorded_at DESC, id DESC",
        )?;

        let records = stmt
            .query_map(params![patient_id, modality.as_str()], record_from_row)?
            .collect::<SqlResult<Vec<_>>>()?;
        Ok(records)
    }

    pub fn add_vmi_record(
        &self,
        patient_id: i64,
        entry: VmiEntry,
        assessment: VmiAssessment,
    ) -> Result<VmiRecord, DbError> {
        self.add_monitoring_record(Modality::Vmi, patient_id, entry, assessment)
    }

    pub fn get_vmi_record(&self, id: i64) -> Result<VmiRecord, DbError> {
        self.get_monitoring_record(Modality::Vmi, id)
    }

    pub fn list_patient_vmi_records(&self, patient_id: i64) -> Result<Vec<VmiRecord>, DbError> {
        self.list_monitoring_records(Modality::Vmi, patient_id)
    }

    pub fn add_niv_record(
        &self,
        patient_id: i64,
        entry: NivEntry,
        assessment: NivAssessment,
    ) -> Result<NivRecord, DbError> {
        self.add_monitoring_record(Modality::Niv, patient_id, entry, assessment)
    }

    pub fn get_niv_record(&self, id: i64) -> Result<NivRecord, DbError> {
        self.get_monitoring_record(Modality::Niv, id)
    }

    pub fn list_patient_niv_records(&self, patient_id: i64) -> Result<Vec<NivRecord>, DbError> {
        self.list_monitoring_records(Modality::Niv, patient_id)
    }

    pub fn add_hfnc_record(
        &self,
        patient_id: i64,
        entry: HfncEntry,
        assessment: HfncAssessment,
    ) -> Result<HfncRecord, DbError> {
        self.add_monitoring_record(Modality::Hfnc, patient_id, entry, assessment)
    }

    pub fn get_hfnc_record(&self, id: i64) -> Result<HfncRecord, DbError> {
        self.get_monitoring_record(Modality::Hfnc, id)
    }

    pub fn list_patient_hfnc_records(&self, patient_id: i64) -> Result<Vec<HfncRecord>, DbError> {
        self.list_monitoring_records(Modality::Hfnc, patient_id)
    }
}

const PATIENT_SELECT: &str =
    "SELECT id, alias, sector_id, bed, support_type, predicted_body_weight, created_at FROM patients";

fn query_sector(conn: &Connection, id: i64) -> Result<Sector, DbError> {
    conn.query_row(
        "SELECT id, name, beds FROM sectors WHERE id = ?1",
        params![id],
        sector_from_row,
    )
    .optional()?
    .ok_or(DbError::NotFound)
}

fn query_patient(conn: &Connection, id: i64) -> Result<Patient, DbError> {
    conn.query_row(
        &format!("{} WHERE id = ?1", PATIENT_SELECT),
        params![id],
        patient_from_row,
    )
    .optional()?
    .ok_or(DbError::NotFound)
}

/// Check alias, weight, sector and bed for a patient about to be written.
/// `current` is the patient being edited, whose own bed does not conflict.
fn validate_patient(conn: &Connection, input: &PatientInput, current: Option<i64>) -> Result<(), DbError> {
    if input.alias.trim().is_empty() {
        return Err(DbError::Invalid("alias is required".to_string()));
    }
    if let Some(pbw) = input.predicted_body_weight {
        if !pbw.is_finite() || pbw <= 0.0 {
            return Err(DbError::Invalid(format!("invalid predicted body weight: {}", pbw)));
        }
    }

    let sector = match query_sector(conn, input.sector_id) {
        Ok(s) => s,
        Err(DbError::NotFound) => {
            return Err(DbError::Invalid(format!("unknown sector {}", input.sector_id)))
        }
        Err(e) => return Err(e),
    };
    if input.bed == 0 || input.bed > sector.beds {
        return Err(DbError::Invalid(format!(
            "bed {} does not exist in {} (1-{})",
            input.bed, sector.name, sector.beds
        )));
    }

    let occupant: Option<i64> = conn
        .query_row(
            "SELECT id FROM patients WHERE sector_id = ?1 AND bed = ?2",
            params![input.sector_id, input.bed],
            |row| row.get(0),
        )
        .optional()?;
    match occupant {
        Some(other) if Some(other) != current => Err(DbError::Conflict(format!(
            "bed {} in {} is occupied",
            input.bed, sector.name
        ))),
        _ => Ok(()),
    }
}

fn sector_from_row(row: &Row<'_>) -> SqlResult<Sector> {
    Ok(Sector {
        id: row.get(0)?,
        name: row.get(1)?,
        beds: row.get(2)?,
    })
}

fn patient_from_row(row: &Row<'_>) -> SqlResult<Patient> {
    Ok(Patient {
        id: row.get(0)?,
        alias: row.get(1)?,
        sector_id: row.get(2)?,
        bed: row.get(3)?,
        support_type: parse_column(4, row.get(4)?)?,
        predicted_body_weight: row.get(5)?,
        created_at: time_column(6, row.get(6)?)?,
    })
}

fn record_from_row<E, A>(row: &Row<'_>) -> SqlResult<MonitoringRecord<E, A>>
where
    E: DeserializeOwned,
    A: DeserializeOwned,
{
    Ok(MonitoringRecord {
        id: row.get(0)?,
        patient_id: row.get(1)?,
        recorded_at: time_column(2, row.get(2)?)?,
        entry: json_column(3, row.get(3)?)?,
        assessment: json_column(4, row.get(4)?)?,
    })
}

fn parse_column<T: FromStr<Err = String>>(idx: usize, raw: String) -> SqlResult<T> {
    raw.parse()
        .map_err(|e: String| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, e.into()))
}

fn json_column<T: DeserializeOwned>(idx: usize, raw: String) -> SqlResult<T> {
    serde_json::from_str(&raw)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn time_column(idx: usize, raw: String) -> SqlResult<DateTime<Utc>> {
    parse_db_time(&raw).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            idx,
            Type::Text,
            format!("unparseable timestamp: {}", raw).into(),
        )
    })
}

fn format_db_time(time: &DateTime<Utc>) -> String {
    time.format(TIME_FORMAT).to_string()
}

/// Parse a datetime string from the database.
fn parse_db_time(s: &str) -> Option<DateTime<Utc>> {
    let formats = [TIME_FORMAT, "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%d %H:%M:%S"];

    for fmt in &formats {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(DateTime::from_naive_utc_and_offset(dt, Utc));
        }
    }

    DateTime::parse_from_rfc3339(s)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}
