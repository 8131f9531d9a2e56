// [tests/mirror/apps/orchestrator/services/chronos_catchup.test.rs]
/*!
 * =================================================================
 * APARATO: CERTIFICADOR DEL DAEMON CHRONOS (V4.2)
 * CLASIFICACIÓN: TRINITY EVIDENCE // ESTRATO L4-MIRROR
 * RESPONSABILIDAD: AUDITORÍA DE FRONTERAS DE MINUTO Y ZONAS NOMINALES
 *
 * VISION HIPER-HOLÍSTICA 2026:
 * 1. BOUNDARY DEDUP: Una frontera procesada enciende a lo sumo una
 *    instancia por schedule.
 * 2. ZONE FIDELITY: La correspondencia cron se evalúa en la zona del
 *    schedule, no en UTC.
 * 3. SYSTEM PRINCIPAL: Los arranques por schedule portan el principal
 *    'system' y el payload {trigger, ts}.
 * =================================================================
 */

use appos_domain_engine::{rule_fn, ProcessBlueprint};
use appos_domain_models::process::{step, ProcessMetadata};
use appos_domain_models::InstanceStatus;
use appos_infra_db::TursoClient;
use appos_orchestrator::prelude::*;
use appos_orchestrator::services::chronos::{compute_due_boundaries, CATCHUP_WINDOW_MINUTES};
use chrono::{DateTime, TimeZone, Utc};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

async fn ignite_state(memory_anchor_label: &str) -> AppState {
    let database_client = TursoClient::connect(
        &format!("file:{}?mode=memory&cache=shared", memory_anchor_label),
        None,
    )
    .await
    .expect("CRITICAL_FAULT: Failed to anchor in-memory platform ledger.");

    let state = AppState::new(database_client, Some("mirror-test-master-secret"));
    state.task_queue.clone().ignite_worker_pool(2);
    state
}

fn register_tick_process(state: &AppState, process_ref: &str) {
    state
        .object_registry
        .register_rule("app.rules.r_tick", rule_fn(|_| Ok(json!({}))));
    state.object_registry.register_process(
        process_ref,
        ProcessMetadata::default(),
        ProcessBlueprint::Fixed(Arc::new(|| vec![step("tick", "r_tick").seal()])),
    );
}

fn utc_boundary(hour: u32, minute: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 1, 15, hour, minute, 0).unwrap()
}

async fn count_instances(state: &AppState, process_ref: &str) -> usize {
    state
        .process_executor
        .list_instances(Some("app"), None, 100, 0)
        .await
        .expect("LEDGER_FAULT")
        .into_iter()
        .filter(|record| record.process_ref == process_ref)
        .count()
}

/**
 * PROPIEDAD P8: una frontera enciende exactamente una instancia por
 * schedule correspondiente; los schedules ajenos quedan en silencio.
 */
#[tokio::test]
async fn certify_boundary_fires_exactly_one_instance_per_schedule() {
    println!("\n🗄️  [INICIO]: Auditoría de despacho por frontera...");
    let state = ignite_state("mem_chronos_fire").await;

    register_tick_process(&state, "app.processes.p_every_minute");
    register_tick_process(&state, "app.processes.p_dawn_patrol");

    state
        .schedule_triggers
        .register("app.processes.p_every_minute", "* * * * *", "UTC", true)
        .expect("valid schedule");
    state
        .schedule_triggers
        .register("app.processes.p_dawn_patrol", "30 5 * * *", "UTC", true)
        .expect("valid schedule");

    // Frontera 14:30 UTC: solo el schedule de cada-minuto corresponde.
    state.chronos_scheduler.fire_boundary(utc_boundary(14, 30)).await;

    assert_eq!(count_instances(&state, "app.processes.p_every_minute").await, 1);
    assert_eq!(count_instances(&state, "app.processes.p_dawn_patrol").await, 0);

    // El payload transporta el contrato {trigger, ts} y el principal 'system'.
    let ignited_records = state
        .process_executor
        .list_instances(Some("app"), None, 10, 0)
        .await
        .expect("LEDGER_FAULT");
    let tick_record = ignited_records
        .iter()
        .find(|record| record.process_ref == "app.processes.p_every_minute")
        .expect("tick instance must exist");

    assert_eq!(tick_record.started_by, "system");
    assert_eq!(tick_record.inputs["trigger"], json!("schedule"));
    assert_eq!(
        tick_record.inputs["ts"],
        json!(utc_boundary(14, 30).to_rfc3339())
    );
    println!("   ✅ Despacho por frontera certificado.");
}

/**
 * ZONE FIDELITY: '30 9 * * *' en America/New_York corresponde a la
 * frontera 14:30 UTC en invierno, y a ninguna otra.
 */
#[tokio::test]
async fn certify_schedule_zone_projection() {
    let state = ignite_state("mem_chronos_zone").await;

    register_tick_process(&state, "app.processes.p_newyork");
    state
        .schedule_triggers
        .register("app.processes.p_newyork", "30 9 * * *", "America/New_York", true)
        .expect("valid schedule");

    state.chronos_scheduler.fire_boundary(utc_boundary(9, 30)).await;
    assert_eq!(count_instances(&state, "app.processes.p_newyork").await, 0);

    state.chronos_scheduler.fire_boundary(utc_boundary(14, 30)).await;
    assert_eq!(count_instances(&state, "app.processes.p_newyork").await, 1);

    // La instancia encendida completa de punta a punta en el pool.
    for _ in 0..100 {
        let records = state
            .process_executor
            .list_instances(Some("app"), Some(InstanceStatus::Completed), 10, 0)
            .await
            .expect("LEDGER_FAULT");
        if !records.is_empty() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    panic!("TIMEOUT: scheduled instance never completed");
}

/**
 * SCHEDULES DESHABILITADOS: jamás disparan.
 */
#[tokio::test]
async fn certify_disabled_schedules_stay_silent() {
    let state = ignite_state("mem_chronos_disabled").await;

    register_tick_process(&state, "app.processes.p_dormant");
    state
        .schedule_triggers
        .register("app.processes.p_dormant", "* * * * *", "UTC", false)
        .expect("valid schedule");

    state.chronos_scheduler.fire_boundary(utc_boundary(8, 0)).await;
    assert_eq!(count_instances(&state, "app.processes.p_dormant").await, 0);
}

/**
 * CATCH-UP: la ventana de 10 minutos acota la recuperación tras pausas
 * largas; las fronteras antiguas se descartan.
 */
#[test]
fn certify_catch_up_window_arithmetic() {
    // Pausa corta: todas las fronteras sobreviven, de vieja a nueva.
    let (due, dropped) = compute_due_boundaries(utc_boundary(10, 0), utc_boundary(10, 3));
    assert_eq!(dropped, 0);
    assert_eq!(
        due,
        vec![utc_boundary(10, 1), utc_boundary(10, 2), utc_boundary(10, 3)]
    );

    // Pausa de una hora: solo las 10 más recientes sobreviven.
    let (due, dropped) = compute_due_boundaries(utc_boundary(10, 0), utc_boundary(11, 0));
    assert_eq!(due.len(), CATCHUP_WINDOW_MINUTES as usize);
    assert_eq!(dropped, 60 - CATCHUP_WINDOW_MINUTES as u64);
    assert_eq!(due.first().copied(), Some(utc_boundary(10, 51)));
    assert_eq!(due.last().copied(), Some(utc_boundary(11, 0)));
    assert!(due.windows(2).all(|pair| pair[0] < pair[1]), "oldest first");
}
