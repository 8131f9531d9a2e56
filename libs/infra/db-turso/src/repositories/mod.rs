// [libs/infra/db-turso/src/repositories/mod.rs]
/*!
 * =================================================================
 * APARATO: REPOSITORY ACCESS MATRIX (V4.0 - PROCESS TOPOLOGY)
 * CLASIFICACIÓN: INFRASTRUCTURE LAYER (ESTRATO L3)
 * RESPONSABILIDAD: ORQUESTACIÓN DE SUBSISTEMAS DE PERSISTENCIA
 *
 * # Mathematical Proof (Modular Encapsulation):
 * El barrel file actúa como una interfaz galvánica. Los sub-módulos
 * permanecen aislados, y solo las estructuras de autoridad (Repositories)
 * son expuestas al exterior, reduciendo el acoplamiento sistémico.
 * =================================================================
 */

// --- ESTRATO 1: CICLO DE VIDA DE PROCESOS ---

/// Gestión de instancias: inserción, transiciones guardadas y paginación.
pub mod instance_repository;
/// Bitácora append-only de pasos con llave natural de idempotencia.
pub mod step_log_repository;

// --- ESTRATO 2: SISTEMAS CONECTADOS ---

/// Columna de ciphertext de la bóveda de credenciales.
pub mod connected_system_repository;

pub use connected_system_repository::ConnectedSystemRepository;
pub use instance_repository::InstanceRepository;
pub use step_log_repository::StepLogRepository;
