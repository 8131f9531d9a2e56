// [apps/orchestrator/src/lib.rs]
/*!
 * =================================================================
 * APARATO: ORCHESTRATOR LIBRARY ROOT (V5.0 - PROCESS AUTHORITY)
 * CLASIFICACIÓN: CRATE ROOT (ESTRATO L1-APP)
 * RESPONSABILIDAD: DEFINICIÓN SUPREMA DEL ÁRBOL DE MÓDULOS
 *
 * VISION HIPER-HOLÍSTICA 2026:
 * 1. MODULE HIERARCHY HARDENING: Establece la autoridad única de
 *    módulos, permitiendo que 'crate::' sea resuelto de forma
 *    determinista tanto en la librería como en el binario.
 * 2. PUBLIC INTERFACE: Expone 'prelude' para facilitar la ignición
 *    del Kernel desde el binario 'main.rs' y el Proving Grounds.
 *
 * # Mathematical Proof (Modular Encapsulation):
 * Al declarar 'pub mod' aquí, Rust genera un grafo de visibilidad
 * donde 'state' y 'services' son hermanos bajo el mismo tronco
 * 'crate', habilitando la inyección de dependencias en compilación.
 * =================================================================
 */

// --- ESTRATO DE DATOS Y ESTADO (L1-APP) ---
/// Contenedor de composición del núcleo de procesos.
pub mod state;

// --- ESTRATO DE MANDO Y SERVICIOS ---
/// Núcleo de mando y control para la ignición de servicios.
pub mod kernel;
/// Ejecutor de instancias, planificador, daemon Chronos y credenciales.
pub mod services;

/**
 * PRELUDIO DEL ORQUESTADOR
 *
 * Re-exportación estratégica de los componentes necesarios para la
 * ignición mínima del sistema. Reduce el acoplamiento en 'main.rs'.
 */
pub mod prelude {
    pub use crate::kernel::OrchestratorKernel;
    pub use crate::services::chronos::ChronosScheduler;
    pub use crate::services::credential_manager::CredentialManager;
    pub use crate::services::executor::{ProcessExecutor, StepTask, STEP_TASK_NAME};
    pub use crate::services::scheduler::ProcessScheduler;
    pub use crate::state::AppState;
}
