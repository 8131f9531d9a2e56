// [apps/orchestrator/src/state/mod.rs]
/*!
 * =================================================================
 * APARATO: SOVEREIGN STATE CONTAINER (V5.1 - COMPOSITION ROOT)
 * CLASIFICACIÓN: APPLICATION STATE (ESTRATO L1-APP)
 * RESPONSABILIDAD: COMPOSICIÓN DE REGISTROS, REPOSITORIOS Y SERVICIOS
 *
 * VISION HIPER-HOLÍSTICA 2026:
 * 1. COMPOSITION ROOT: El estado maestro compone registros, oráculo,
 *    cola, bóveda y ejecutor en el arranque y los desarma al apagar.
 *    Cero estado mutable a nivel de módulo en el núcleo.
 * 2. NOMINAL PURITY: Uso de 'Arc<T>' para inmutabilidad compartida;
 *    erradicación total de singletons globales.
 *
 * # Mathematical Proof (Deterministic Ignition Graph):
 * La construcción sigue el orden topológico de dependencias:
 * repositorios -> registros -> ejecutor -> planificadores. Cualquier
 * permutación alternativa rompería la inyección en compilación, por lo
 * que el grafo de ignición es único y verificable.
 * =================================================================
 */

use crate::services::chronos::ChronosScheduler;
use crate::services::credential_manager::CredentialManager;
use crate::services::executor::ProcessExecutor;
use crate::services::scheduler::ProcessScheduler;
use crate::services::PanopticonSink;
use appos_domain_engine::{
    AllowAllOracle, AuditSink, Clock, EventTriggerRegistry, InMemoryObjectRegistry, PolicyOracle,
    ScheduleTriggerRegistry, SystemClock,
};
use appos_infra_db::{
    ConnectedSystemRepository, InstanceRepository, StepLogRepository, TursoClient,
};
use appos_infra_queue::MemoryTaskQueue;
use std::sync::Arc;
use tracing::debug;

/**
 * Contenedor de estado compartido (Thread-Safe) del núcleo de procesos.
 * Actúa como la placa base donde se conectan todos los estratos.
 */
#[derive(Clone)]
pub struct AppState {
    /// Cliente del Ledger de plataforma (libSQL).
    pub database_client: TursoClient,
    /// Registro de objetos declarados (reglas, procesos).
    pub object_registry: Arc<InMemoryObjectRegistry>,
    /// Oráculo de permisos consumido por el despachador de reglas.
    pub policy_oracle: Arc<dyn PolicyOracle>,
    /// Índice evento -> procesos suscritos.
    pub event_triggers: Arc<EventTriggerRegistry>,
    /// Índice de schedules cron por proceso.
    pub schedule_triggers: Arc<ScheduleTriggerRegistry>,
    /// Cola de tareas de pasos con pool de workers acotado.
    pub task_queue: Arc<MemoryTaskQueue>,
    /// Sumidero de rastros de auditoría.
    pub audit_sink: Arc<dyn AuditSink>,
    /// Costura de tiempo para ejecutor y daemon Chronos.
    pub system_clock: Arc<dyn Clock>,

    // --- REPOSITORIOS DE AUTORIDAD (L3) ---
    pub instance_repository: Arc<InstanceRepository>,
    pub step_log_repository: Arc<StepLogRepository>,
    pub connected_system_repository: Arc<ConnectedSystemRepository>,

    // --- SERVICIOS DE MANDO (L4) ---
    pub process_executor: Arc<ProcessExecutor>,
    pub process_scheduler: Arc<ProcessScheduler>,
    pub chronos_scheduler: Arc<ChronosScheduler>,
    pub credential_manager: Arc<CredentialManager>,
}

impl AppState {
    /**
     * Forja el Estado Maestro inyectando todas las dependencias en orden
     * topológico. El secreto maestro respeta la precedencia soberana
     * (entorno -> explícito -> fallback de desarrollo).
     */
    pub fn new(database_client: TursoClient, explicit_master_secret: Option<&str>) -> Self {
        debug!("🧬 [APP_STATE]: Executing sovereign ignition sequence V5.1...");

        // 1. REPOSITORIOS DE AUTORIDAD
        let instance_repository = Arc::new(InstanceRepository::new(database_client.clone()));
        let step_log_repository = Arc::new(StepLogRepository::new(database_client.clone()));
        let connected_system_repository =
            Arc::new(ConnectedSystemRepository::new(database_client.clone()));

        // 2. REGISTROS, ORÁCULO Y COSTURAS
        let object_registry = Arc::new(InMemoryObjectRegistry::new());
        let policy_oracle: Arc<dyn PolicyOracle> = Arc::new(AllowAllOracle);
        let event_triggers = Arc::new(EventTriggerRegistry::new());
        let schedule_triggers = Arc::new(ScheduleTriggerRegistry::new());
        let task_queue = MemoryTaskQueue::new();
        let audit_sink: Arc<dyn AuditSink> = Arc::new(PanopticonSink);
        let system_clock: Arc<dyn Clock> = Arc::new(SystemClock);

        // 3. EJECUTOR SOBERANO + INSCRIPCIÓN EN LA COLA
        let process_executor = ProcessExecutor::new(
            object_registry.clone(),
            Arc::clone(&policy_oracle),
            Arc::clone(&instance_repository),
            Arc::clone(&step_log_repository),
            task_queue.clone(),
            Arc::clone(&system_clock),
            Arc::clone(&audit_sink),
        );
        Arc::clone(&process_executor).register_task_handlers();

        // 4. PLANIFICADORES (TRIGGERS + CHRONOS)
        let process_scheduler = Arc::new(ProcessScheduler::new(
            object_registry.clone(),
            Arc::clone(&event_triggers),
            Arc::clone(&schedule_triggers),
            Arc::clone(&process_executor),
        ));

        let chronos_scheduler = ChronosScheduler::new(
            Arc::clone(&schedule_triggers),
            Arc::clone(&process_executor),
            Arc::clone(&system_clock),
            Arc::clone(&audit_sink),
        );

        // 5. CUSTODIA DE CREDENCIALES
        let credential_manager = Arc::new(CredentialManager::new(
            Arc::clone(&connected_system_repository),
            explicit_master_secret,
        ));

        Self {
            database_client,
            object_registry,
            policy_oracle,
            event_triggers,
            schedule_triggers,
            task_queue,
            audit_sink,
            system_clock,
            instance_repository,
            step_log_repository,
            connected_system_repository,
            process_executor,
            process_scheduler,
            chronos_scheduler,
            credential_manager,
        }
    }
}
