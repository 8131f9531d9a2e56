// [libs/infra/db-turso/src/schema.rs]
/**
 * =================================================================
 * APARATO: PLATFORM DATABASE SCHEMA (V4.3 - PROCESS STRATA)
 * CLASIFICACIÓN: INFRASTRUCTURE LAYER (ESTRATO L3)
 * RESPONSABILIDAD: GOBERNANZA ESTRUCTURAL E IDEMPOTENCIA TOTAL
 *
 * VISION HIPER-HOLÍSTICA:
 * 1. PROCESS LEDGER: Tablas de instancias y bitácora de pasos con CHECK
 *    constraints espejo de las máquinas de estado del dominio.
 * 2. NATURAL KEY: Índice único (instancia, paso, intento) como llave de
 *    idempotencia ante entregas at-least-once de la cola.
 * 3. IDEMPOTENCIA: Gestión de errores para migraciones en caliente.
 * 4. PERFORMANCE: Índices de aceleración para paginación y fan-in.
 * =================================================================
 */

use anyhow::{Context, Result};
use libsql::Connection;
use tracing::{debug, info, warn};

/**
 * ESTRATO 1: SOLIDIFICACIÓN (Génesis de Tablas)
 * Define las entidades durables del núcleo de procesos.
 */
const PLATFORM_TABLES: &[(&str, &str)] = &[
    ("TABLE_PROCESS_INSTANCES", r#"
        CREATE TABLE IF NOT EXISTS process_instances (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            instance_id TEXT UNIQUE NOT NULL,
            process_ref TEXT NOT NULL,
            process_name TEXT NOT NULL,
            app_name TEXT NOT NULL,
            display_name TEXT,
            status TEXT NOT NULL DEFAULT 'running'
                CHECK (status IN ('pending','running','paused','completed','failed','cancelled','interrupted')),
            current_step TEXT,
            inputs TEXT NOT NULL DEFAULT '{}',
            variables TEXT NOT NULL DEFAULT '{}',
            outputs TEXT,
            error_info TEXT,
            started_at DATETIME NOT NULL,
            completed_at DATETIME,
            started_by TEXT NOT NULL DEFAULT 'system',
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP,
            updated_at DATETIME DEFAULT CURRENT_TIMESTAMP
        );
    "#),
    ("TABLE_PROCESS_STEP_LOG", r#"
        CREATE TABLE IF NOT EXISTS process_step_log (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            process_instance_id TEXT NOT NULL,
            step_name TEXT NOT NULL,
            rule_ref TEXT NOT NULL,
            status TEXT NOT NULL
                CHECK (status IN ('pending','running','completed','failed','skipped','async_dispatched','interrupted')),
            started_at DATETIME NOT NULL,
            completed_at DATETIME,
            duration_ms REAL,
            inputs TEXT,
            outputs TEXT,
            error_info TEXT,
            attempt INTEGER NOT NULL DEFAULT 1,
            is_parallel INTEGER NOT NULL DEFAULT 0
        );
    "#),
    ("TABLE_CONNECTED_SYSTEMS", r#"
        CREATE TABLE IF NOT EXISTS connected_systems (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT UNIQUE NOT NULL,
            system_type TEXT NOT NULL DEFAULT 'custom'
                CHECK (system_type IN ('database','rest_api','ftp','smtp','imap','custom')),
            description TEXT,
            auth_type TEXT NOT NULL DEFAULT 'none'
                CHECK (auth_type IN ('none','basic','oauth2','api_key','certificate')),
            credentials_encrypted TEXT,
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP,
            updated_at DATETIME DEFAULT CURRENT_TIMESTAMP
        );
    "#),
];

/**
 * ESTRATO 2: EVOLUCIÓN (Mutaciones de Columna)
 * Asegura que las tablas existentes se adapten a las nuevas capacidades.
 */
const EVOLUTIONARY_STRATA: &[(&str, &str)] = &[
    // --- VISIBILIDAD DE VARIABLES Y RASTRO DE DISPARO ---
    ("INSTANCE_VISIBILITY", "ALTER TABLE process_instances ADD COLUMN variable_visibility TEXT NOT NULL DEFAULT '{}'"),
    ("INSTANCE_TRIGGERED_BY", "ALTER TABLE process_instances ADD COLUMN triggered_by TEXT"),

    // --- SOPORTE DE GRUPOS PARALELOS ---
    ("STEP_LOG_FIRE_AND_FORGET", "ALTER TABLE process_step_log ADD COLUMN is_fire_and_forget INTEGER NOT NULL DEFAULT 0"),

    // --- GOBERNANZA DE SISTEMAS CONECTADOS ---
    ("CONNECTED_SYSTEM_ACTIVE", "ALTER TABLE connected_systems ADD COLUMN is_active INTEGER NOT NULL DEFAULT 1"),
];

/**
 * ESTRATO 3: ENDURECIMIENTO (Índices de Aceleración)
 * Optimiza paginación de instancias, lectura de historia y la llave natural.
 */
const ACCELERATION_INDEXES: &[(&str, &str)] = &[
    ("IDX_PI_APP_STATUS", "CREATE INDEX IF NOT EXISTS idx_pi_app_status ON process_instances(app_name, status);"),
    ("IDX_PI_STARTED", "CREATE INDEX IF NOT EXISTS idx_pi_started ON process_instances(started_at);"),
    ("IDX_PSL_INSTANCE_STEP", "CREATE INDEX IF NOT EXISTS idx_psl_instance_step ON process_step_log(process_instance_id, step_name, started_at);"),
    // Llave natural de idempotencia ante entregas duplicadas de la cola
    ("IDX_PSL_NATURAL_KEY", "CREATE UNIQUE INDEX IF NOT EXISTS idx_psl_natural_key ON process_step_log(process_instance_id, step_name, attempt);"),
];

/**
 * Ejecuta la secuencia maestra de sincronización del esquema estructural.
 *
 * # Errors:
 * Retorna error si alguna tabla base falla en solidificarse, indicando
 * un colapso en el enlace con el Ledger.
 */
pub async fn apply_platform_schema(database_connection: &Connection) -> Result<()> {
    info!("🏗️ [SCHEMA_ENGINE]: Initiating structural synchronization V4.3...");

    solidify_base_strata(database_connection).await?;
    execute_evolutionary_repair(database_connection).await?;
    harden_access_layer(database_connection).await?;

    info!("✅ [SCHEMA_ENGINE]: Platform Ledger V4.3 level and certified.");
    Ok(())
}

async fn solidify_base_strata(db: &Connection) -> Result<()> {
    for (identifier, sql) in PLATFORM_TABLES {
        debug!("  ↳ Solidifying: {}", identifier);
        db.execute(*sql, ()).await
            .with_context(|| format!("CRITICAL_SOLIDIFICATION_FAULT: {}", identifier))?;
    }
    Ok(())
}

async fn execute_evolutionary_repair(db: &Connection) -> Result<()> {
    for (identifier, sql) in EVOLUTIONARY_STRATA {
        match db.execute(*sql, ()).await {
            Ok(_) => debug!("  🟢 [REPAIR_OK]: Applied evolutionary stratum {}", identifier),
            Err(e) => {
                let message = e.to_string();
                if message.contains("duplicate column name") {
                    debug!("  ⚪ [REPAIR_SKIP]: {} already level.", identifier);
                } else {
                    warn!("  ⚠️ [REPAIR_BYPASS]: {} check incomplete: {}", identifier, message);
                }
            }
        }
    }
    Ok(())
}

async fn harden_access_layer(db: &Connection) -> Result<()> {
    for (identifier, sql) in ACCELERATION_INDEXES {
        debug!("  ↳ Hardening: {}", identifier);
        db.execute(*sql, ()).await
            .with_context(|| format!("CRITICAL_HARDENING_FAULT: {}", identifier))?;
    }
    Ok(())
}
