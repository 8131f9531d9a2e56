// [libs/infra/db-turso/src/repositories/instance_repository.rs]
/*!
 * =================================================================
 * APARATO: INSTANCE REPOSITORY (V4.4 - TERMINAL GUARD)
 * CLASIFICACIÓN: INFRASTRUCTURE LAYER (ESTRATO L3)
 * RESPONSABILIDAD: GESTIÓN DEL CICLO DE VIDA DE INSTANCIAS DE PROCESO
 *
 * VISION HIPER-HOLÍSTICA 2026:
 * 1. TERMINAL MONOTONICITY: Toda mutación de estado porta el guard
 *    'status NOT IN (completed, failed, cancelled)'. Una instancia
 *    sellada es inmutable para siempre.
 * 2. CANCEL SEMANTICS: La cancelación sella la instancia Y marca las
 *    filas de paso en vuelo como 'interrupted' en UNA transacción.
 * 3. ZERO ABBREVIATIONS: Nomenclatura nominal absoluta.
 *
 * # Mathematical Proof (Transactional Exclusivity):
 * El repositorio encapsula cada operación en una transacción corta.
 * El par (fila de instancia, filas de bitácora) jamás diverge porque
 * las escrituras acopladas comparten el mismo túnel ACID.
 * =================================================================
 */

use crate::errors::DbError;
use crate::TursoClient;
use appos_domain_models::{InstanceStatus, ProcessInstanceRecord};
use chrono::{DateTime, Utc};
use libsql::{params, Row};
use serde_json::Value;
use tracing::{info, instrument, warn};

/// Guard SQL de estados absorbentes, compartido por toda mutación.
const TERMINAL_GUARD: &str = "status NOT IN ('completed','failed','cancelled')";

/// Proyección canónica de columnas para la reconstrucción del dominio.
const INSTANCE_PROJECTION: &str = "instance_id, process_ref, process_name, app_name, display_name, \
     status, current_step, inputs, variables, variable_visibility, outputs, error_info, \
     started_at, completed_at, started_by, triggered_by";

/**
 * Repositorio de autoridad única para la tabla `process_instances`.
 */
pub struct InstanceRepository {
    database_client: TursoClient,
}

impl InstanceRepository {
    pub fn new(client: TursoClient) -> Self {
        Self {
            database_client: client,
        }
    }

    /**
     * Inserta la fila génesis de una instancia recién arrancada.
     */
    #[instrument(skip(self, record), fields(instance = %record.instance_id))]
    pub async fn insert_instance(&self, record: &ProcessInstanceRecord) -> Result<(), DbError> {
        let connection = self.database_client.get_connection()?;

        connection
            .execute(
                "INSERT INTO process_instances \
                 (instance_id, process_ref, process_name, app_name, display_name, status, \
                  current_step, inputs, variables, variable_visibility, outputs, error_info, \
                  started_at, completed_at, started_by, triggered_by) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16)",
                params![
                    record.instance_id.clone(),
                    record.process_ref.clone(),
                    record.process_name.clone(),
                    record.app_name.clone(),
                    nullable_text(record.display_name.clone()),
                    record.status.as_str(),
                    nullable_text(record.current_step.clone()),
                    encode_json(&record.inputs),
                    encode_json(&record.variables),
                    encode_json(&record.variable_visibility),
                    nullable_text(record.outputs.as_ref().map(encode_json)),
                    nullable_text(record.error_info.as_ref().map(encode_json)),
                    record.started_at.to_rfc3339(),
                    nullable_text(record.completed_at.map(|moment| moment.to_rfc3339())),
                    record.started_by.clone(),
                    nullable_text(record.triggered_by.clone())
                ],
            )
            .await?;

        info!("🧾 [INSTANCE_GENESIS]: Instance [{}] anchored as '{}'.", record.instance_id, record.status.as_str());
        Ok(())
    }

    /// Recupera la proyección completa de una instancia.
    pub async fn fetch_instance(
        &self,
        instance_id: &str,
    ) -> Result<Option<ProcessInstanceRecord>, DbError> {
        let connection = self.database_client.get_connection()?;

        let mut query_result = connection
            .query(
                &format!(
                    "SELECT {} FROM process_instances WHERE instance_id = ?1",
                    INSTANCE_PROJECTION
                ),
                params![instance_id],
            )
            .await?;

        match query_result.next().await? {
            Some(data_row) => Ok(Some(map_row_to_record(&data_row)?)),
            None => Ok(None),
        }
    }

    /// Actualiza el puntero `current_step` preservando la monotonicidad terminal.
    pub async fn update_current_step(
        &self,
        instance_id: &str,
        step_name: &str,
    ) -> Result<(), DbError> {
        let connection = self.database_client.get_connection()?;

        connection
            .execute(
                &format!(
                    "UPDATE process_instances SET current_step = ?2, updated_at = ?3 \
                     WHERE instance_id = ?1 AND {}",
                    TERMINAL_GUARD
                ),
                params![instance_id, step_name, Utc::now().to_rfc3339()],
            )
            .await?;

        Ok(())
    }

    /// Persiste el ámbito de variables y su mapa de visibilidad.
    pub async fn persist_variables(
        &self,
        instance_id: &str,
        variables: &Value,
        variable_visibility: &Value,
    ) -> Result<(), DbError> {
        let connection = self.database_client.get_connection()?;

        connection
            .execute(
                &format!(
                    "UPDATE process_instances SET variables = ?2, variable_visibility = ?3, updated_at = ?4 \
                     WHERE instance_id = ?1 AND {}",
                    TERMINAL_GUARD
                ),
                params![
                    instance_id,
                    encode_json(variables),
                    encode_json(variable_visibility),
                    Utc::now().to_rfc3339()
                ],
            )
            .await?;

        Ok(())
    }

    /**
     * Transición genérica de estado no-terminal (pause/resume/interrupt).
     * Retorna si alguna fila fue efectivamente alterada.
     */
    pub async fn transition_status(
        &self,
        instance_id: &str,
        target_status: InstanceStatus,
    ) -> Result<bool, DbError> {
        let connection = self.database_client.get_connection()?;

        let rows_affected_count = connection
            .execute(
                &format!(
                    "UPDATE process_instances SET status = ?2, updated_at = ?3 \
                     WHERE instance_id = ?1 AND {}",
                    TERMINAL_GUARD
                ),
                params![instance_id, target_status.as_str(), Utc::now().to_rfc3339()],
            )
            .await?;

        Ok(rows_affected_count > 0)
    }

    /// Sella la instancia como completada con sus outputs visibles.
    pub async fn complete_instance(
        &self,
        instance_id: &str,
        outputs: &Value,
    ) -> Result<bool, DbError> {
        let sealing_moment = Utc::now().to_rfc3339();
        let connection = self.database_client.get_connection()?;

        let rows_affected_count = connection
            .execute(
                &format!(
                    "UPDATE process_instances \
                     SET status = 'completed', outputs = ?2, completed_at = ?3, updated_at = ?3 \
                     WHERE instance_id = ?1 AND {}",
                    TERMINAL_GUARD
                ),
                params![instance_id, encode_json(outputs), sealing_moment],
            )
            .await?;

        if rows_affected_count > 0 {
            info!("✅ [INSTANCE_SEALED]: Instance [{}] completed.", instance_id);
        }
        Ok(rows_affected_count > 0)
    }

    /// Sella la instancia como fallida con su rastro de error.
    pub async fn fail_instance(
        &self,
        instance_id: &str,
        error_info: &Value,
    ) -> Result<bool, DbError> {
        let sealing_moment = Utc::now().to_rfc3339();
        let connection = self.database_client.get_connection()?;

        let rows_affected_count = connection
            .execute(
                &format!(
                    "UPDATE process_instances \
                     SET status = 'failed', error_info = ?2, completed_at = ?3, updated_at = ?3 \
                     WHERE instance_id = ?1 AND {}",
                    TERMINAL_GUARD
                ),
                params![instance_id, encode_json(error_info), sealing_moment],
            )
            .await?;

        if rows_affected_count > 0 {
            warn!("💀 [INSTANCE_COLLAPSE]: Instance [{}] sealed as failed.", instance_id);
        }
        Ok(rows_affected_count > 0)
    }

    /**
     * Cancelación administrativa: sella la instancia Y marca las filas de
     * paso en vuelo como 'interrupted' dentro de UNA transacción.
     *
     * # Errors:
     * `DbError::TransactionError` si el túnel ACID colapsa al abrir o sellar.
     */
    #[instrument(skip(self))]
    pub async fn cancel_instance(&self, instance_id: &str) -> Result<bool, DbError> {
        let connection = self.database_client.get_connection()?;
        let sealing_moment = Utc::now().to_rfc3339();

        let database_transaction = connection
            .transaction()
            .await
            .map_err(|_| DbError::TransactionError)?;

        let rows_affected_count = database_transaction
            .execute(
                &format!(
                    "UPDATE process_instances SET status = 'cancelled', completed_at = ?2, updated_at = ?2 \
                     WHERE instance_id = ?1 AND {}",
                    TERMINAL_GUARD
                ),
                params![instance_id, sealing_moment.clone()],
            )
            .await?;

        if rows_affected_count == 0 {
            // Instancia inexistente o ya terminal: la transacción muere sin efectos.
            return Ok(false);
        }

        database_transaction
            .execute(
                "UPDATE process_step_log SET status = 'interrupted', completed_at = ?2 \
                 WHERE process_instance_id = ?1 AND status IN ('pending','running','async_dispatched')",
                params![instance_id, sealing_moment],
            )
            .await?;

        database_transaction
            .commit()
            .await
            .map_err(|_| DbError::TransactionError)?;

        info!("🛑 [INSTANCE_CANCELLED]: Instance [{}] sealed; in-flight steps interrupted.", instance_id);
        Ok(true)
    }

    /**
     * Paginación administrativa sobre `started_at` descendente, con filtros
     * opcionales por aplicación y estado.
     */
    pub async fn list_instances(
        &self,
        app_name_filter: Option<&str>,
        status_filter: Option<InstanceStatus>,
        page_limit: u32,
        page_offset: u32,
    ) -> Result<Vec<ProcessInstanceRecord>, DbError> {
        let connection = self.database_client.get_connection()?;

        let base_projection = format!(
            "SELECT {} FROM process_instances",
            INSTANCE_PROJECTION
        );
        let pagination_clause = "ORDER BY started_at DESC LIMIT ?1 OFFSET ?2";

        let mut query_result = match (app_name_filter, status_filter) {
            (Some(app_name), Some(status)) => {
                connection
                    .query(
                        &format!("{} WHERE app_name = ?3 AND status = ?4 {}", base_projection, pagination_clause),
                        params![page_limit as i64, page_offset as i64, app_name, status.as_str()],
                    )
                    .await?
            }
            (Some(app_name), None) => {
                connection
                    .query(
                        &format!("{} WHERE app_name = ?3 {}", base_projection, pagination_clause),
                        params![page_limit as i64, page_offset as i64, app_name],
                    )
                    .await?
            }
            (None, Some(status)) => {
                connection
                    .query(
                        &format!("{} WHERE status = ?3 {}", base_projection, pagination_clause),
                        params![page_limit as i64, page_offset as i64, status.as_str()],
                    )
                    .await?
            }
            (None, None) => {
                connection
                    .query(
                        &format!("{} {}", base_projection, pagination_clause),
                        params![page_limit as i64, page_offset as i64],
                    )
                    .await?
            }
        };

        let mut instance_records = Vec::new();
        while let Some(data_row) = query_result.next().await? {
            instance_records.push(map_row_to_record(&data_row)?);
        }

        Ok(instance_records)
    }
}

// ---------------------------------------------------------------------------
// TRANSFORMACIÓN FILA -> DOMINIO
// ---------------------------------------------------------------------------

fn encode_json(document: &Value) -> String {
    document.to_string()
}

/// Proyección explícita de opcionales hacia el sustrato SQL (TEXT | NULL).
fn nullable_text(optional_text: Option<String>) -> libsql::Value {
    match optional_text {
        Some(text_value) => libsql::Value::Text(text_value),
        None => libsql::Value::Null,
    }
}

fn decode_json(raw_text: &str) -> Result<Value, DbError> {
    serde_json::from_str(raw_text)
        .map_err(|fault| DbError::MappingError(format!("JSON_DECODE_FAULT: {}", fault)))
}

fn decode_moment(raw_text: &str) -> Result<DateTime<Utc>, DbError> {
    DateTime::parse_from_rfc3339(raw_text)
        .map(|moment| moment.with_timezone(&Utc))
        .map_err(|fault| DbError::MappingError(format!("TIMESTAMP_DECODE_FAULT: {}", fault)))
}

fn map_row_to_record(data_row: &Row) -> Result<ProcessInstanceRecord, DbError> {
    let raw_status: String = data_row.get(5)?;
    let parsed_status = InstanceStatus::parse(&raw_status)
        .ok_or_else(|| DbError::MappingError(format!("UNKNOWN_STATUS_LABEL: {}", raw_status)))?;

    let raw_started_at: String = data_row.get(12)?;

    Ok(ProcessInstanceRecord {
        instance_id: data_row.get(0)?,
        process_ref: data_row.get(1)?,
        process_name: data_row.get(2)?,
        app_name: data_row.get(3)?,
        display_name: data_row.get::<String>(4).ok(),
        status: parsed_status,
        current_step: data_row.get::<String>(6).ok(),
        inputs: decode_json(&data_row.get::<String>(7)?)?,
        variables: decode_json(&data_row.get::<String>(8)?)?,
        variable_visibility: decode_json(&data_row.get::<String>(9)?)?,
        outputs: data_row
            .get::<String>(10)
            .ok()
            .map(|raw| decode_json(&raw))
            .transpose()?,
        error_info: data_row
            .get::<String>(11)
            .ok()
            .map(|raw| decode_json(&raw))
            .transpose()?,
        started_at: decode_moment(&raw_started_at)?,
        completed_at: data_row
            .get::<String>(13)
            .ok()
            .map(|raw| decode_moment(&raw))
            .transpose()?,
        started_by: data_row.get(14)?,
        triggered_by: data_row.get::<String>(15).ok(),
    })
}
