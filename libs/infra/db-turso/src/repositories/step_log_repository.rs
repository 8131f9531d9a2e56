// [libs/infra/db-turso/src/repositories/step_log_repository.rs]
/*!
 * =================================================================
 * APARATO: STEP LOG REPOSITORY (V4.5 - NATURAL KEY LEDGER)
 * CLASIFICACIÓN: INFRASTRUCTURE LAYER (ESTRATO L3)
 * RESPONSABILIDAD: BITÁCORA DURABLE APPEND-ONLY DE PASOS
 *
 * VISION HIPER-HOLÍSTICA 2026:
 * 1. IDEMPOTENT APPEND: La apertura de un intento usa INSERT OR IGNORE
 *    contra la llave natural (instancia, paso, intento); una entrega
 *    duplicada de la cola colapsa sobre la fila existente.
 * 2. GUARDED SEALING: El sellado de un intento solo alcanza filas aún
 *    no terminales, de modo que el primer resultado registrado gana.
 * 3. PAIRED WRITE: El sellado exitoso con variables compromete la fila
 *    de bitácora y la mutación de instancia en UNA transacción.
 *
 * # Mathematical Proof (At-Least-Once Collapse):
 * Sea T una tarea entregada n >= 1 veces. Cada entrega intenta la misma
 * tripleta (i, s, a). La primera inserción fija la fila; las n-1
 * restantes son absorbidas por OR IGNORE y el guard de sellado, de modo
 * que la bitácora converge a exactamente una fila terminal por intento.
 * =================================================================
 */

use crate::errors::DbError;
use crate::TursoClient;
use appos_domain_models::{StepLogRecord, StepStatus};
use chrono::{DateTime, Utc};
use libsql::{params, Row};
use serde_json::Value;
use tracing::{debug, instrument};

/// Estados de fila aún no sellados, elegibles para el sellado guardado.
const OPEN_ROW_GUARD: &str = "status IN ('pending','running','async_dispatched')";

const STEP_LOG_PROJECTION: &str = "process_instance_id, step_name, rule_ref, status, started_at, \
     completed_at, duration_ms, inputs, outputs, error_info, attempt, is_fire_and_forget, is_parallel";

/**
 * Repositorio de autoridad única para la tabla `process_step_log`.
 */
pub struct StepLogRepository {
    database_client: TursoClient,
}

impl StepLogRepository {
    pub fn new(client: TursoClient) -> Self {
        Self {
            database_client: client,
        }
    }

    /**
     * Abre la fila de un intento (status inicial, normalmente 'running').
     * Idempotente ante re-entregas: OR IGNORE sobre la llave natural.
     */
    #[instrument(skip(self, record), fields(instance = %record.instance_id, step = %record.step_name, attempt = record.attempt))]
    pub async fn open_attempt(&self, record: &StepLogRecord) -> Result<(), DbError> {
        let connection = self.database_client.get_connection()?;

        connection
            .execute(
                "INSERT OR IGNORE INTO process_step_log \
                 (process_instance_id, step_name, rule_ref, status, started_at, completed_at, \
                  duration_ms, inputs, outputs, error_info, attempt, is_fire_and_forget, is_parallel) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
                params![
                    record.instance_id.clone(),
                    record.step_name.clone(),
                    record.rule_ref.clone(),
                    record.status.as_str(),
                    record.started_at.to_rfc3339(),
                    nullable_text(record.completed_at.map(|moment| moment.to_rfc3339())),
                    nullable_real(record.duration_ms),
                    nullable_text(record.inputs.as_ref().map(Value::to_string)),
                    nullable_text(record.outputs.as_ref().map(Value::to_string)),
                    nullable_text(record.error_info.as_ref().map(Value::to_string)),
                    record.attempt as i64,
                    record.is_fire_and_forget as i64,
                    record.is_parallel as i64
                ],
            )
            .await?;

        debug!("📒 [STEP_LEDGER]: Attempt row opened as '{}'.", record.status.as_str());
        Ok(())
    }

    /**
     * Inserta directamente una fila terminal (skipped, o el marcador de
     * despacho async_dispatched de intento 0). Idempotente por llave natural.
     */
    pub async fn record_terminal_row(&self, record: &StepLogRecord) -> Result<(), DbError> {
        self.open_attempt(record).await
    }

    /**
     * Sella un intento abierto con su estado final. El guard de fila
     * abierta garantiza que el primer resultado registrado prevalezca.
     * Retorna si la fila fue efectivamente sellada.
     */
    #[instrument(skip(self, outputs, error_info))]
    pub async fn seal_attempt(
        &self,
        instance_id: &str,
        step_name: &str,
        attempt: u32,
        final_status: StepStatus,
        duration_ms: Option<f64>,
        outputs: Option<&Value>,
        error_info: Option<&Value>,
    ) -> Result<bool, DbError> {
        let connection = self.database_client.get_connection()?;

        let rows_affected_count = connection
            .execute(
                &format!(
                    "UPDATE process_step_log \
                     SET status = ?4, completed_at = ?5, duration_ms = ?6, outputs = ?7, error_info = ?8 \
                     WHERE process_instance_id = ?1 AND step_name = ?2 AND attempt = ?3 AND {}",
                    OPEN_ROW_GUARD
                ),
                params![
                    instance_id,
                    step_name,
                    attempt as i64,
                    final_status.as_str(),
                    Utc::now().to_rfc3339(),
                    nullable_real(duration_ms),
                    nullable_text(outputs.map(Value::to_string)),
                    nullable_text(error_info.map(Value::to_string))
                ],
            )
            .await?;

        Ok(rows_affected_count > 0)
    }

    /**
     * Escritura acoplada del contrato de historia durable: sella la fila
     * de bitácora Y persiste las variables mutadas de la instancia en
     * UNA transacción, de modo que el par jamás diverja.
     */
    #[instrument(skip(self, outputs, variables, variable_visibility))]
    pub async fn seal_success_with_variables(
        &self,
        instance_id: &str,
        step_name: &str,
        attempt: u32,
        duration_ms: f64,
        outputs: Option<&Value>,
        variables: &Value,
        variable_visibility: &Value,
    ) -> Result<bool, DbError> {
        let connection = self.database_client.get_connection()?;
        let sealing_moment = Utc::now().to_rfc3339();

        let database_transaction = connection
            .transaction()
            .await
            .map_err(|_| DbError::TransactionError)?;

        let rows_affected_count = database_transaction
            .execute(
                &format!(
                    "UPDATE process_step_log \
                     SET status = 'completed', completed_at = ?4, duration_ms = ?5, outputs = ?6 \
                     WHERE process_instance_id = ?1 AND step_name = ?2 AND attempt = ?3 AND {}",
                    OPEN_ROW_GUARD
                ),
                params![
                    instance_id,
                    step_name,
                    attempt as i64,
                    sealing_moment.clone(),
                    duration_ms,
                    nullable_text(outputs.map(Value::to_string))
                ],
            )
            .await?;

        database_transaction
            .execute(
                "UPDATE process_instances \
                 SET variables = ?2, variable_visibility = ?3, updated_at = ?4 \
                 WHERE instance_id = ?1 AND status NOT IN ('completed','failed','cancelled')",
                params![
                    instance_id,
                    variables.to_string(),
                    variable_visibility.to_string(),
                    sealing_moment
                ],
            )
            .await?;

        database_transaction
            .commit()
            .await
            .map_err(|_| DbError::TransactionError)?;

        Ok(rows_affected_count > 0)
    }

    /// Historia completa de una instancia en orden de arranque de intento.
    pub async fn fetch_history(&self, instance_id: &str) -> Result<Vec<StepLogRecord>, DbError> {
        let connection = self.database_client.get_connection()?;

        let mut query_result = connection
            .query(
                &format!(
                    "SELECT {} FROM process_step_log \
                     WHERE process_instance_id = ?1 ORDER BY started_at ASC, id ASC",
                    STEP_LOG_PROJECTION
                ),
                params![instance_id],
            )
            .await?;

        let mut history_records = Vec::new();
        while let Some(data_row) = query_result.next().await? {
            history_records.push(map_row_to_record(&data_row)?);
        }

        Ok(history_records)
    }

    /// Filas de un paso específico, en orden de intento (auditoría de reintentos).
    pub async fn fetch_step_rows(
        &self,
        instance_id: &str,
        step_name: &str,
    ) -> Result<Vec<StepLogRecord>, DbError> {
        let connection = self.database_client.get_connection()?;

        let mut query_result = connection
            .query(
                &format!(
                    "SELECT {} FROM process_step_log \
                     WHERE process_instance_id = ?1 AND step_name = ?2 ORDER BY attempt ASC",
                    STEP_LOG_PROJECTION
                ),
                params![instance_id, step_name],
            )
            .await?;

        let mut step_records = Vec::new();
        while let Some(data_row) = query_result.next().await? {
            step_records.push(map_row_to_record(&data_row)?);
        }

        Ok(step_records)
    }
}

// ---------------------------------------------------------------------------
// TRANSFORMACIÓN FILA -> DOMINIO
// ---------------------------------------------------------------------------

fn nullable_text(optional_text: Option<String>) -> libsql::Value {
    match optional_text {
        Some(text_value) => libsql::Value::Text(text_value),
        None => libsql::Value::Null,
    }
}

fn nullable_real(optional_real: Option<f64>) -> libsql::Value {
    match optional_real {
        Some(real_value) => libsql::Value::Real(real_value),
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

fn map_row_to_record(data_row: &Row) -> Result<StepLogRecord, DbError> {
    let raw_status: String = data_row.get(3)?;
    let parsed_status = StepStatus::parse(&raw_status)
        .ok_or_else(|| DbError::MappingError(format!("UNKNOWN_STEP_STATUS_LABEL: {}", raw_status)))?;

    Ok(StepLogRecord {
        instance_id: data_row.get(0)?,
        step_name: data_row.get(1)?,
        rule_ref: data_row.get(2)?,
        status: parsed_status,
        started_at: decode_moment(&data_row.get::<String>(4)?)?,
        completed_at: data_row
            .get::<String>(5)
            .ok()
            .map(|raw| decode_moment(&raw))
            .transpose()?,
        duration_ms: data_row.get::<f64>(6).ok(),
        inputs: data_row
            .get::<String>(7)
            .ok()
            .map(|raw| decode_json(&raw))
            .transpose()?,
        outputs: data_row
            .get::<String>(8)
            .ok()
            .map(|raw| decode_json(&raw))
            .transpose()?,
        error_info: data_row
            .get::<String>(9)
            .ok()
            .map(|raw| decode_json(&raw))
            .transpose()?,
        attempt: data_row.get::<i64>(10)? as u32,
        is_fire_and_forget: data_row.get::<i64>(11)? != 0,
        is_parallel: data_row.get::<i64>(12)? != 0,
    })
}
