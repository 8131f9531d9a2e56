// [apps/orchestrator/src/services/audit_sink.rs]
/*!
 * =================================================================
 * APARATO: AUDIT SINK ADAPTERS (V2.0 - PANOPTICON EMISSION)
 * CLASIFICACIÓN: APPLICATION SERVICES (ESTRATO L4)
 * RESPONSABILIDAD: ADAPTADORES DEL SUMIDERO DE AUDITORÍA
 *
 * Los colectores durables viven fuera del núcleo; aquí se adaptan la
 * emisión al flujo de logs unificado y un sumidero en RAM para el
 * Proving Grounds.
 * =================================================================
 */

use appos_domain_engine::{AuditRecord, AuditSink};
use std::sync::Mutex;
use tracing::info;

/// Ruteo de rastros hacia el flujo de logs estructurado (target panopticon).
pub struct PanopticonSink;

impl AuditSink for PanopticonSink {
    fn emit(&self, record: AuditRecord) {
        info!(
            target: "panopticon",
            stratum = %record.stratum,
            event = %record.event_kind,
            subject = %record.subject,
            "📜 [AUDIT]: {}",
            record.detail
        );
    }
}

/// Sumidero en RAM: captura los rastros para su escrutinio en tests.
#[derive(Default)]
pub struct MemoryAuditSink {
    captured_records: Mutex<Vec<AuditRecord>>,
}

impl MemoryAuditSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn captured(&self) -> Vec<AuditRecord> {
        self.captured_records
            .lock()
            .expect("FATAL: Audit capture lock poisoned.")
            .clone()
    }

    /// Rastros de una clase específica, en orden de emisión.
    pub fn captured_of_kind(&self, event_kind: &str) -> Vec<AuditRecord> {
        self.captured()
            .into_iter()
            .filter(|record| record.event_kind == event_kind)
            .collect()
    }
}

impl AuditSink for MemoryAuditSink {
    fn emit(&self, record: AuditRecord) {
        self.captured_records
            .lock()
            .expect("FATAL: Audit capture lock poisoned.")
            .push(record);
    }
}
