// [libs/domain/engine/src/sink.rs]
/*!
 * =================================================================
 * APARATO: AUDIT SINK SEAM (V1.1 - APPEND ONLY EMISSION)
 * CLASIFICACIÓN: DOMAIN SERVICES (ESTRATO L2)
 * RESPONSABILIDAD: EMISIÓN ESTRUCTURADA DE RASTROS DE AUDITORÍA
 *
 * Interfaz consumida: los colectores y formatos de archivo viven fuera
 * del núcleo; el motor solo emite entradas estructuradas.
 * =================================================================
 */

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Entrada estructurada del flujo de auditoría de la plataforma.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditRecord {
    /// Estrato emisor ('executor', 'scheduler', 'chronos', 'credentials').
    pub stratum: String,
    /// Clase del suceso ('instance.started', 'step.completed', 'tick.dropped', ...).
    pub event_kind: String,
    pub subject: String,
    pub detail: Value,
    pub emitted_at: DateTime<Utc>,
}

impl AuditRecord {
    pub fn now(stratum: &str, event_kind: &str, subject: &str, detail: Value) -> Self {
        Self {
            stratum: stratum.to_string(),
            event_kind: event_kind.to_string(),
            subject: subject.to_string(),
            detail,
            emitted_at: Utc::now(),
        }
    }
}

/// Sumidero append-only de rastros. La implementación durable es externa.
pub trait AuditSink: Send + Sync {
    fn emit(&self, record: AuditRecord);
}
