// [apps/orchestrator/src/services/mod.rs]
/*!
 * =================================================================
 * APARATO: SERVICES BARREL (V5.0 - PROCESS CORE)
 * CLASIFICACIÓN: APPLICATION SERVICES (ESTRATO L4)
 * RESPONSABILIDAD: EXPOSICIÓN NOMINAL DE LOS SERVICIOS DE MANDO
 * =================================================================
 */

// --- ESTRATO DE EJECUCIÓN ---

/// Ejecutor de instancias: arranque, pasos, barrera paralela, admin.
pub mod executor;

// --- ESTRATO DE TRIGGERS Y TIEMPO ---

/// Autoridad de triggers: escaneo del registro y despacho de eventos.
pub mod scheduler;
/// Daemon cron de fronteras de minuto con catch-up acotado.
pub mod chronos;

// --- ESTRATO DE SEGURIDAD Y OBSERVABILIDAD ---

/// Custodia de secretos de Sistemas Conectados y cabeceras derivadas.
pub mod credential_manager;
/// Adaptadores del sumidero de auditoría (Panóptico y RAM).
pub mod audit_sink;

pub use audit_sink::{MemoryAuditSink, PanopticonSink};
pub use chronos::ChronosScheduler;
pub use credential_manager::CredentialManager;
pub use executor::{ProcessExecutor, StepTask, STEP_TASK_NAME};
pub use scheduler::ProcessScheduler;
