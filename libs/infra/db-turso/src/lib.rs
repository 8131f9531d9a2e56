// [libs/infra/db-turso/src/lib.rs]
/*!
 * =================================================================
 * APARATO: PERSISTENCE GATEWAY (V4.0 - PLATFORM LEDGER)
 * CLASIFICACIÓN: INFRASTRUCTURE LAYER (ESTRATO L3)
 * RESPONSABILIDAD: EXPOSICIÓN NOMINAL DEL ADAPTADOR DE PERSISTENCIA
 * =================================================================
 */

pub mod client;
pub mod errors;
pub mod schema;
pub mod repositories;

pub use client::TursoClient;
pub use errors::DbError;
pub use repositories::connected_system_repository::ConnectedSystemRepository;
pub use repositories::instance_repository::InstanceRepository;
pub use repositories::step_log_repository::StepLogRepository;
