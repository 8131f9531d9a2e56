// [tests/mirror/apps/orchestrator/services/event_dispatch.test.rs]
/*!
 * =================================================================
 * APARATO: CERTIFICADOR DE DESPACHO DE EVENTOS (V4.1)
 * CLASIFICACIÓN: TRINITY EVIDENCE // ESTRATO L4-MIRROR
 * RESPONSABILIDAD: AUDITORÍA DEL FAN-OUT DE EVENTOS Y PREDICADOS
 *
 * VISION HIPER-HOLÍSTICA 2026:
 * 1. PREDICATE GATE: Un predicado falsy suprime su trigger sin tocar
 *    a los hermanos.
 * 2. ORDER FIDELITY: El fan-out respeta el orden de inscripción.
 * 3. SIBLING ISOLATION: Un trigger podrido jamás bloquea al resto.
 * =================================================================
 */

use appos_domain_engine::{rule_fn, ProcessBlueprint};
use appos_domain_models::process::{step, ProcessMetadata};
use appos_domain_models::{EventPredicate, InstanceStatus, TriggerSpec};
use appos_infra_db::TursoClient;
use appos_orchestrator::prelude::*;
use serde_json::json;
use std::sync::Arc;

async fn ignite_state(memory_anchor_label: &str) -> AppState {
    let database_client = TursoClient::connect(
        &format!("file:{}?mode=memory&cache=shared", memory_anchor_label),
        None,
    )
    .await
    .expect("CRITICAL_FAULT: Failed to anchor in-memory platform ledger.");

    AppState::new(database_client, Some("mirror-test-master-secret"))
}

fn register_single_step_process(state: &AppState, process_ref: &str) {
    state
        .object_registry
        .register_rule("app.rules.r_ok", rule_fn(|_| Ok(json!({}))));
    state.object_registry.register_process(
        process_ref,
        ProcessMetadata::default(),
        ProcessBlueprint::Fixed(Arc::new(|| vec![step("only", "r_ok").seal()])),
    );
}

/**
 * ESCENARIO 6: predicado 'premium' filtra; el trigger sin predicado dispara.
 */
#[tokio::test]
async fn certify_predicate_filters_and_default_fires() {
    println!("\n🗄️  [INICIO]: Auditoría de filtrado por predicado...");
    let state = ignite_state("mem_evt_predicate").await;

    register_single_step_process(&state, "app.processes.p_premium");
    register_single_step_process(&state, "app.processes.p_default");

    let premium_gate: EventPredicate = Arc::new(|event_payload| {
        event_payload.get("tier").and_then(|value| value.as_str()) == Some("premium")
    });

    state
        .event_triggers
        .register("order.placed", "app.processes.p_premium", Some(premium_gate));
    state
        .event_triggers
        .register("order.placed", "app.processes.p_default", None);

    let started_descriptors = state
        .process_scheduler
        .fire_event("order.placed", json!({"tier": "basic"}), "operator_1", false)
        .await;

    // PROPIEDAD P7: exactamente una instancia, la del trigger sin predicado.
    assert_eq!(started_descriptors.len(), 1);
    assert_eq!(started_descriptors[0].process_ref, "app.processes.p_default");
    assert_eq!(started_descriptors[0].status, InstanceStatus::Running);

    // El payload premium enciende AMBOS triggers, en orden de inscripción.
    let premium_descriptors = state
        .process_scheduler
        .fire_event("order.placed", json!({"tier": "premium"}), "operator_1", false)
        .await;

    assert_eq!(premium_descriptors.len(), 2);
    assert_eq!(premium_descriptors[0].process_ref, "app.processes.p_premium");
    assert_eq!(premium_descriptors[1].process_ref, "app.processes.p_default");
    println!("   ✅ Filtrado por predicado certificado.");
}

/**
 * EVENTO SIN SUSCRIPTORES: retorno vacío, sin efectos.
 */
#[tokio::test]
async fn certify_unsubscribed_event_is_inert() {
    let state = ignite_state("mem_evt_inert").await;

    let started_descriptors = state
        .process_scheduler
        .fire_event("ghost.event", json!({}), "operator_1", false)
        .await;

    assert!(started_descriptors.is_empty());
}

/**
 * AISLAMIENTO DE HERMANOS: un trigger hacia una referencia fantasma se
 * traga y los hermanos disparan igual.
 */
#[tokio::test]
async fn certify_rotten_trigger_never_blocks_siblings() {
    let state = ignite_state("mem_evt_rotten").await;

    register_single_step_process(&state, "app.processes.p_alive");

    state
        .event_triggers
        .register("record.updated", "app.processes.p_ghost", None);
    state
        .event_triggers
        .register("record.updated", "app.processes.p_alive", None);

    let started_descriptors = state
        .process_scheduler
        .fire_event("record.updated", json!({"id": 7}), "operator_1", false)
        .await;

    assert_eq!(started_descriptors.len(), 1);
    assert_eq!(started_descriptors[0].process_ref, "app.processes.p_alive");
}

/**
 * ESCANEO DE ARRANQUE: los metadatos declarados pueblan ambos índices.
 */
#[tokio::test]
async fn certify_initialize_scans_declared_triggers() {
    let state = ignite_state("mem_evt_scan").await;

    state
        .object_registry
        .register_rule("app.rules.r_ok", rule_fn(|_| Ok(json!({}))));
    state.object_registry.register_process(
        "app.processes.p_declared",
        ProcessMetadata {
            name: "p_declared".into(),
            display_name: "Declared Process".into(),
            triggers: vec![
                TriggerSpec::event("customer.created"),
                TriggerSpec::schedule_in_zone("0 2 * * *", "America/New_York"),
                // Schedule podrido: se rechaza en el escaneo sin colapsar.
                TriggerSpec::schedule("not a cron"),
            ],
        },
        ProcessBlueprint::Fixed(Arc::new(|| vec![step("only", "r_ok").seal()])),
    );

    state.process_scheduler.initialize();

    assert_eq!(state.event_triggers.count(), 1);
    assert_eq!(state.schedule_triggers.count(), 1);
    assert_eq!(
        state.event_triggers.get_triggers("customer.created")[0].process_ref,
        "app.processes.p_declared"
    );

    // Idempotencia del escaneo.
    state.process_scheduler.initialize();
    assert_eq!(state.event_triggers.count(), 1);

    // El evento declarado enciende el proceso de punta a punta.
    let started_descriptors = state
        .process_scheduler
        .fire_event("customer.created", json!({"id": 1}), "operator_1", false)
        .await;
    assert_eq!(started_descriptors.len(), 1);
}
