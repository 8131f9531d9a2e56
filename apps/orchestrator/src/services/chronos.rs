// INICIO DEL ARCHIVO [apps/orchestrator/src/services/chronos.rs]
/**
 * =================================================================
 * APARATO: CHRONOS SCHEDULER SERVICE (V4.4 - MINUTE SOVEREIGN)
 * CLASIFICACIÓN: APPLICATION SERVICES (ESTRATO L4)
 * RESPONSABILIDAD: DESPACHO CRON EN FRONTERAS DE MINUTO CON CATCH-UP
 *
 * VISION HIPER-HOLÍSTICA 2026:
 * 1. MINUTE DISCIPLINE: El daemon despierta en cada frontera de minuto
 *    del reloj de pared y evalúa cada schedule habilitado en SU zona.
 * 2. BOUNDED CATCH-UP: Tras una pausa larga dispara a lo sumo una
 *    instancia por (schedule, frontera perdida), de la más vieja a la
 *    más nueva, acotado a una ventana de 10 minutos; las fronteras más
 *    viejas se descartan con rastro de auditoría.
 * 3. FLEET DEDUP: El kernel enciende EXACTAMENTE un daemon Chronos por
 *    despliegue; cada frontera se procesa una única vez.
 *
 * # Mathematical Proof (Storm Suppression):
 * Sea una pausa de p minutos. Sin ventana, el reencendido dispararía
 * O(p * schedules) instancias. Con la ventana W=10, el límite superior
 * es O(W * schedules), constante respecto de la duración de la pausa.
 * =================================================================
 */

use crate::services::executor::ProcessExecutor;
use appos_domain_engine::{AuditRecord, AuditSink, Clock, ScheduleTriggerRegistry};
use chrono::{DateTime, Duration as ChronoDuration, DurationRound, Utc};
use serde_json::json;
use std::sync::Arc;
use tracing::{debug, error, info, instrument};

/// Ventana máxima de recuperación de fronteras perdidas, en minutos.
pub const CATCHUP_WINDOW_MINUTES: i64 = 10;

/// Principal nominal de los arranques por schedule.
const SYSTEM_PRINCIPAL: &str = "system";

/**
 * Daemon de planificación cron del núcleo de procesos.
 */
pub struct ChronosScheduler {
    schedule_triggers: Arc<ScheduleTriggerRegistry>,
    process_executor: Arc<ProcessExecutor>,
    system_clock: Arc<dyn Clock>,
    audit_sink: Arc<dyn AuditSink>,
}

impl ChronosScheduler {
    pub fn new(
        schedule_triggers: Arc<ScheduleTriggerRegistry>,
        process_executor: Arc<ProcessExecutor>,
        system_clock: Arc<dyn Clock>,
        audit_sink: Arc<dyn AuditSink>,
    ) -> Arc<Self> {
        Arc::new(Self {
            schedule_triggers,
            process_executor,
            system_clock,
            audit_sink,
        })
    }

    /**
     * Enciende el bucle de fronteras de minuto en el runtime de Tokio.
     */
    #[instrument(skip(self))]
    pub fn ignite_chronos_daemon(self: Arc<Self>) -> tokio::task::JoinHandle<()> {
        info!("🕰️  [CHRONOS]: Minute-boundary daemon ignited (catch-up window {}m).", CATCHUP_WINDOW_MINUTES);

        tokio::spawn(async move {
            let mut last_evaluated_boundary = floor_to_minute(self.system_clock.now());

            loop {
                // 1. PAUSA HASTA LA PRÓXIMA FRONTERA DE MINUTO
                let current_moment = self.system_clock.now();
                let next_boundary = floor_to_minute(current_moment) + ChronoDuration::minutes(1);
                let pause_until_boundary = (next_boundary - current_moment)
                    .to_std()
                    .unwrap_or_else(|_| std::time::Duration::from_secs(1));
                self.system_clock.sleep(pause_until_boundary).await;

                // 2. EVALUACIÓN DE FRONTERAS VENCIDAS (CATCH-UP ACOTADO)
                let awakened_boundary = floor_to_minute(self.system_clock.now());
                let (due_boundaries, dropped_count) =
                    compute_due_boundaries(last_evaluated_boundary, awakened_boundary);

                if dropped_count > 0 {
                    self.audit_sink.emit(AuditRecord::now(
                        "chronos",
                        "tick.dropped",
                        "catch_up_window",
                        json!({"dropped_boundaries": dropped_count, "window_minutes": CATCHUP_WINDOW_MINUTES}),
                    ));
                }

                for due_boundary in &due_boundaries {
                    self.fire_boundary(*due_boundary).await;
                }

                last_evaluated_boundary = awakened_boundary;
            }
        })
    }

    /**
     * Dispara todos los schedules habilitados que correspondan a la
     * frontera dada en su zona horaria nominal.
     */
    #[instrument(skip(self), fields(boundary = %minute_boundary.to_rfc3339()))]
    pub async fn fire_boundary(&self, minute_boundary: DateTime<Utc>) {
        for schedule_binding in self.schedule_triggers.enabled_schedules() {
            if !schedule_binding
                .cron_expression
                .matches_in_zone(minute_boundary, schedule_binding.time_zone)
            {
                continue;
            }

            let schedule_inputs = json!({
                "trigger": "schedule",
                "ts": minute_boundary.to_rfc3339(),
            });

            match self
                .process_executor
                .start_process(&schedule_binding.process_ref, schedule_inputs, SYSTEM_PRINCIPAL, true)
                .await
            {
                Ok(instance_descriptor) => {
                    info!(
                        "⏰ [CHRONOS]: Schedule '{}' ignited {} at {}.",
                        schedule_binding.cron_expression.source(),
                        instance_descriptor.instance_id,
                        minute_boundary.to_rfc3339()
                    );
                }
                Err(ignition_fault) => {
                    error!(
                        "❌ [CHRONOS]: Schedule for [{}] failed to ignite: {}",
                        schedule_binding.process_ref, ignition_fault
                    );
                }
            }
        }

        debug!("💓 [CHRONOS]: Boundary {} evaluated.", minute_boundary.to_rfc3339());
    }
}

/// Trunca un instante a su frontera de minuto.
pub fn floor_to_minute(moment: DateTime<Utc>) -> DateTime<Utc> {
    moment
        .duration_trunc(ChronoDuration::minutes(1))
        .expect("minute truncation cannot overflow")
}

/**
 * Fronteras vencidas entre la última evaluada (exclusiva) y la actual
 * (inclusiva), recortadas a la ventana de catch-up. Retorna las
 * fronteras a disparar (de la más vieja a la más nueva) y el conteo de
 * fronteras descartadas por exceder la ventana.
 */
pub fn compute_due_boundaries(
    last_evaluated_boundary: DateTime<Utc>,
    current_boundary: DateTime<Utc>,
) -> (Vec<DateTime<Utc>>, u64) {
    if current_boundary <= last_evaluated_boundary {
        return (Vec::new(), 0);
    }

    let total_missed = ((current_boundary - last_evaluated_boundary).num_minutes()).max(0) as u64;
    let dropped_count = total_missed.saturating_sub(CATCHUP_WINDOW_MINUTES as u64);

    // Conservamos las fronteras MÁS RECIENTES dentro de la ventana.
    let first_retained_boundary = if dropped_count > 0 {
        current_boundary - ChronoDuration::minutes(CATCHUP_WINDOW_MINUTES - 1)
    } else {
        last_evaluated_boundary + ChronoDuration::minutes(1)
    };

    let mut due_boundaries = Vec::new();
    let mut boundary_cursor = first_retained_boundary;
    while boundary_cursor <= current_boundary {
        due_boundaries.push(boundary_cursor);
        boundary_cursor += ChronoDuration::minutes(1);
    }

    (due_boundaries, dropped_count)
}

// FIN DEL ARCHIVO [apps/orchestrator/src/services/chronos.rs]
