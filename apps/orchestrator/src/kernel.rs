// INICIO DEL ARCHIVO [apps/orchestrator/src/kernel.rs]
/**
 * =================================================================
 * APARATO: ORCHESTRATOR SOVEREIGN KERNEL (V5.2 - PROCESS CORE)
 * CLASIFICACIÓN: COMPOSITION ROOT (ESTRATO L1-APP)
 * RESPONSABILIDAD: BOOTSTRAP DE INFRAESTRUCTURA E IGNICIÓN SEGURA
 *
 * VISION HIPER-HOLÍSTICA:
 * Actúa como la placa base donde se conectan todos los servicios del
 * núcleo de procesos: Ledger, pool de workers, escaneo de triggers y
 * el daemon Chronos. Exactamente UN Chronos por despliegue.
 * =================================================================
 */

use crate::state::AppState;
use appos_infra_db::TursoClient;
use tracing::{info, instrument};

pub struct OrchestratorKernel {
    pub application_state: AppState,
    worker_concurrency: usize,
}

impl OrchestratorKernel {
    /**
     * Realiza la ignición del cliente del Ledger y el estado maestro.
     * Establece la conexión a la base de datos antes de levantar servicios.
     */
    #[instrument(skip(database_access_token))]
    pub async fn ignite(
        database_connection_url: &str,
        database_access_token: Option<String>,
        worker_concurrency: usize,
    ) -> Self {
        let database_client = TursoClient::connect(database_connection_url, database_access_token)
            .await
            .expect("FATAL: Database link collapse. Ignition aborted.");

        Self {
            application_state: AppState::new(database_client, None),
            worker_concurrency,
        }
    }

    /**
     * Lanza la ejecución de todas las operaciones autónomas del núcleo.
     * Configura los daemons de fondo y espera la señal de apagado.
     */
    pub async fn launch_platform_operations(self) {
        let shared_application_state = self.application_state.clone();

        // --- 1. IGNICIÓN DEL POOL DE WORKERS DE PASOS ---
        std::sync::Arc::clone(&shared_application_state.task_queue)
            .ignite_worker_pool(self.worker_concurrency);

        // --- 2. ESCANEO DE TRIGGERS DECLARADOS ---
        // Puebla los índices de eventos y schedules desde el registro.
        shared_application_state.process_scheduler.initialize();

        // --- 3. DAEMON CHRONOS (FRONTERAS DE MINUTO) ---
        // Un único daemon por despliegue: cada frontera se procesa una vez.
        let chronos_handle = shared_application_state
            .chronos_scheduler
            .clone()
            .ignite_chronos_daemon();

        info!("🚀 [KERNEL_ONLINE]: Process core operational. Awaiting shutdown signal.");

        // --- 4. VIGILIA DE APAGADO ---
        if let Err(signal_fault) = tokio::signal::ctrl_c().await {
            tracing::error!("💀 [KERNEL]: Shutdown signal listener collapsed: {}", signal_fault);
        }

        info!("🌙 [KERNEL]: Shutdown signal received. Draining worker pool...");
        chronos_handle.abort();
        shared_application_state.task_queue.shutdown();
    }
}
// FIN DEL ARCHIVO [apps/orchestrator/src/kernel.rs]
