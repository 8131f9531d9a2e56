// [apps/orchestrator/src/main.rs]
/*!
 * =================================================================
 * APARATO: ORCHESTRATOR MAIN ENTRY POINT (V5.0 - PROCESS CORE)
 * CLASIFICACIÓN: APPLICATION SHELL (ESTRATO L1-APP)
 * RESPONSABILIDAD: BOOTSTRAP DE INFRAESTRUCTURA E IGNICIÓN SEGURA
 *
 * VISION HIPER-HOLÍSTICA 2026:
 * 1. ENV SOVEREIGNTY: Las coordenadas (Ledger, token, concurrencia)
 *    se capturan vía clap con herencia de variables de entorno.
 * 2. ZERO ABBREVIATIONS: Nomenclatura nominal absoluta en la captura
 *    de entorno y configuración del runtime.
 *
 * # Mathematical Proof (Deterministic Ignition):
 * El proceso garantiza que el esquema del Ledger se solidifique antes
 * de encender el pool de workers, previniendo estados de carrera donde
 * un paso persista contra tablas aún no cristalizadas.
 * =================================================================
 */

use appos_orchestrator::prelude::*;

use appos_shared_heimdall::init_tracing;
use clap::Parser;
use dotenvy::dotenv;
use tracing::info;

/// Coordenadas de ignición del núcleo de procesos AppOS.
#[derive(Parser, Debug)]
#[command(name = "appos-orchestrator", about = "Núcleo de procesos de la plataforma AppOS")]
struct IgnitionCoordinates {
    /// URL del Ledger de plataforma (archivo local, remoto o memoria).
    #[arg(long, env = "DATABASE_URL", default_value = "file:appos_platform.db")]
    database_url: String,

    /// Token de acceso para Ledgers remotos.
    #[arg(long, env = "TURSO_AUTH_TOKEN")]
    database_token: Option<String>,

    /// Workers simultáneos del pool de pasos.
    #[arg(long, env = "APPOS_WORKER_CONCURRENCY", default_value_t = 4)]
    worker_concurrency: usize,
}

/**
 * Punto de ignición supremo del binario del Orquestador.
 */
fn main() -> anyhow::Result<()> {
    // 1. CARGA DE ENTORNO SOBERANO
    dotenv().ok();

    // 2. INICIALIZACIÓN DE OBSERVABILIDAD NEURAL (HEIMDALL)
    init_tracing("appos_orchestrator");

    let ignition_coordinates = IgnitionCoordinates::parse();

    // 3. CONSTRUCCIÓN DEL RUNTIME SOBERANO
    let runtime_orchestrator = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;

    runtime_orchestrator.block_on(async {
        info!("🛰️  [COMMAND_CENTER]: Global ignition sequence starting...");

        // 4. CONSTRUCCIÓN DEL KERNEL SOBERANO (ESTRATO L1-APP)
        let kernel_instance = OrchestratorKernel::ignite(
            &ignition_coordinates.database_url,
            ignition_coordinates.database_token,
            ignition_coordinates.worker_concurrency,
        )
        .await;

        // 5. OPERACIONES AUTÓNOMAS + VIGILIA DE APAGADO
        kernel_instance.launch_platform_operations().await;
    });

    Ok(())
}
