// [libs/domain/models/src/instance.rs]
/*!
 * =================================================================
 * APARATO: PROCESS INSTANCE MODELS (V3.1 - DURABLE IDENTITY)
 * CLASIFICACIÓN: DOMAIN MODELS (ESTRATO L2)
 * RESPONSABILIDAD: CONTRATOS DE CICLO DE VIDA DE INSTANCIAS
 *
 * # Mathematical Proof (Terminal Monotonicity):
 * El conjunto {completed, failed, cancelled} es absorbente: toda
 * transición de estado en el repositorio porta un guard que excluye
 * filas ya terminales, de modo que ninguna escritura posterior puede
 * resucitar una instancia sellada.
 * =================================================================
 */

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Máquina de estados soberana de una instancia de proceso.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstanceStatus {
    Pending,
    Running,
    Paused,
    Completed,
    Failed,
    Cancelled,
    Interrupted,
}

impl InstanceStatus {
    /// Estados absorbentes: ninguna escritura posterior los altera.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Paused => "paused",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
            Self::Interrupted => "interrupted",
        }
    }

    /// Reconstruye el estado desde su forma persistida.
    pub fn parse(raw_label: &str) -> Option<Self> {
        match raw_label {
            "pending" => Some(Self::Pending),
            "running" => Some(Self::Running),
            "paused" => Some(Self::Paused),
            "completed" => Some(Self::Completed),
            "failed" => Some(Self::Failed),
            "cancelled" => Some(Self::Cancelled),
            "interrupted" => Some(Self::Interrupted),
            _ => None,
        }
    }
}

/**
 * Proyección durable completa de una instancia (fila de `process_instances`).
 */
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessInstanceRecord {
    /// Identidad opaca global (`proc_` + 12 hex).
    pub instance_id: String,
    pub process_ref: String,
    pub process_name: String,
    pub app_name: String,
    pub display_name: Option<String>,
    pub status: InstanceStatus,
    /// Último paso despachado.
    pub current_step: Option<String>,
    /// Inmutables tras el arranque.
    pub inputs: Value,
    /// Ámbito mutable de variables del proceso.
    pub variables: Value,
    /// Etiqueta de visibilidad por variable ('output' | 'internal').
    pub variable_visibility: Value,
    pub outputs: Option<Value>,
    pub error_info: Option<Value>,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub started_by: String,
    pub triggered_by: Option<String>,
}

impl ProcessInstanceRecord {
    /// Deriva los outputs de la instancia: variables etiquetadas 'output'.
    pub fn derive_visible_outputs(&self) -> Value {
        let mut exposed_outputs = serde_json::Map::new();

        if let (Some(variable_map), Some(visibility_map)) =
            (self.variables.as_object(), self.variable_visibility.as_object())
        {
            for (variable_name, visibility_tag) in visibility_map {
                if visibility_tag.as_str() == Some("output") {
                    if let Some(variable_value) = variable_map.get(variable_name) {
                        exposed_outputs.insert(variable_name.clone(), variable_value.clone());
                    }
                }
            }
        }

        Value::Object(exposed_outputs)
    }
}

/// Descriptor ligero devuelto al arrancar o consultar instancias.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstanceDescriptor {
    pub instance_id: String,
    pub process_ref: String,
    pub process_name: String,
    pub app_name: String,
    pub status: InstanceStatus,
    pub started_at: DateTime<Utc>,
}

impl From<&ProcessInstanceRecord> for InstanceDescriptor {
    fn from(record: &ProcessInstanceRecord) -> Self {
        Self {
            instance_id: record.instance_id.clone(),
            process_ref: record.process_ref.clone(),
            process_name: record.process_name.clone(),
            app_name: record.app_name.clone(),
            status: record.status,
            started_at: record.started_at,
        }
    }
}
