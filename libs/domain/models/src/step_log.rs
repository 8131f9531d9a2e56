// [libs/domain/models/src/step_log.rs]
/*!
 * =================================================================
 * APARATO: STEP LOG MODELS (V3.1 - APPEND ONLY LEDGER)
 * CLASIFICACIÓN: DOMAIN MODELS (ESTRATO L2)
 * RESPONSABILIDAD: CONTRATOS DE LA BITÁCORA DURABLE DE PASOS
 *
 * # Mathematical Proof (Idempotency Key):
 * La tripleta (instancia, paso, intento) es la llave natural de la
 * bitácora. Una re-entrega at-least-once del mismo task produce la misma
 * tripleta y la inserción idempotente colapsa el duplicado.
 * =================================================================
 */

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Estados locales de un paso dentro de la bitácora.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Skipped,
    /// Marcador de despacho para miembros fire-and-forget (intento 0).
    AsyncDispatched,
    /// El worker fue cancelado o la instancia selló antes del resultado.
    Interrupted,
}

impl StepStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Skipped => "skipped",
            Self::AsyncDispatched => "async_dispatched",
            Self::Interrupted => "interrupted",
        }
    }

    pub fn parse(raw_label: &str) -> Option<Self> {
        match raw_label {
            "pending" => Some(Self::Pending),
            "running" => Some(Self::Running),
            "completed" => Some(Self::Completed),
            "failed" => Some(Self::Failed),
            "skipped" => Some(Self::Skipped),
            "async_dispatched" => Some(Self::AsyncDispatched),
            "interrupted" => Some(Self::Interrupted),
            _ => None,
        }
    }
}

/**
 * Fila de la bitácora `process_step_log`. Append-only por instancia.
 */
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepLogRecord {
    pub instance_id: String,
    pub step_name: String,
    pub rule_ref: String,
    pub status: StepStatus,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub duration_ms: Option<f64>,
    /// Capturados solo si el paso porta `log_inputs`.
    pub inputs: Option<Value>,
    /// Capturados solo si el paso porta `log_outputs`.
    pub outputs: Option<Value>,
    pub error_info: Option<Value>,
    /// 1-indexado para resultados; 0 reservado al marcador de despacho.
    pub attempt: u32,
    pub is_fire_and_forget: bool,
    pub is_parallel: bool,
}

impl StepLogRecord {
    /// Esqueleto de fila con los campos opcionales vacíos.
    pub fn skeleton(
        instance_id: &str,
        step_name: &str,
        rule_ref: &str,
        status: StepStatus,
        attempt: u32,
    ) -> Self {
        Self {
            instance_id: instance_id.to_string(),
            step_name: step_name.to_string(),
            rule_ref: rule_ref.to_string(),
            status,
            started_at: Utc::now(),
            completed_at: None,
            duration_ms: None,
            inputs: None,
            outputs: None,
            error_info: None,
            attempt,
            is_fire_and_forget: false,
            is_parallel: false,
        }
    }
}
