// [tests/mirror/apps/orchestrator/services/executor_lifecycle.test.rs]
/*!
 * =================================================================
 * APARATO: CERTIFICADOR DE CICLO DE VIDA DEL EJECUTOR (V5.1)
 * CLASIFICACIÓN: TRINITY EVIDENCE // ESTRATO L4-MIRROR
 * RESPONSABILIDAD: AUDITORÍA DEL CAMINO FELIZ, REINTENTOS Y POLÍTICAS
 *
 * VISION HIPER-HOLÍSTICA 2026:
 * 1. HAPPY PATH: Cadena lineal A -> B sellada como 'completed' con
 *    bitácora ordenada y monotonia de marcas temporales.
 * 2. RETRY LEDGER: Cada intento deja SU fila; el presupuesto 2+1
 *    produce exactamente [failed, failed, completed].
 * 3. POLICY BRANCH: 'on_error=skip' preserva el avance de la cadena.
 * 4. TERMINAL MONOTONICITY: Una instancia sellada es inmutable.
 * =================================================================
 */

use appos_domain_engine::{rule_fn, EngineError, ProcessBlueprint};
use appos_domain_models::process::{step, OnErrorPolicy, ProcessMetadata};
use appos_domain_models::{InstanceStatus, StepStatus};
use appos_infra_db::TursoClient;
use appos_orchestrator::prelude::*;
use serde_json::json;
use std::sync::atomic::{AtomicU32, Ordering};
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

/**
 * ESCENARIO 1: Camino feliz lineal A -> B.
 */
#[tokio::test]
async fn certify_linear_happy_path() {
    println!("\n🗄️  [INICIO]: Auditoría del camino feliz lineal...");
    let state = ignite_state("mem_exec_happy").await;

    state
        .object_registry
        .register_rule("app.rules.r_a", rule_fn(|_| Ok(json!({}))));
    state
        .object_registry
        .register_rule("app.rules.r_b", rule_fn(|_| Ok(json!({}))));
    state.object_registry.register_process(
        "app.processes.p1",
        ProcessMetadata::default(),
        ProcessBlueprint::Fixed(Arc::new(|| {
            vec![step("A", "r_a").seal(), step("B", "r_b").seal()]
        })),
    );

    let descriptor = state
        .process_executor
        .start_process("app.processes.p1", json!({"x": 1}), "operator_1", false)
        .await
        .expect("DISPATCH_FAULT: Linear process must start.");

    let sealed_instance = state
        .process_executor
        .get_instance(&descriptor.instance_id)
        .await
        .expect("LEDGER_FAULT")
        .expect("INSTANCE_VANISHED");

    assert_eq!(sealed_instance.status, InstanceStatus::Completed);
    assert_eq!(sealed_instance.inputs, json!({"x": 1}));
    assert!(
        sealed_instance.completed_at.expect("completed_at must seal") > sealed_instance.started_at,
        "TEMPORAL_FAULT: completion must strictly follow ignition"
    );

    let step_history = state
        .process_executor
        .get_step_history(&descriptor.instance_id)
        .await
        .expect("LEDGER_FAULT");

    assert_eq!(step_history.len(), 2, "exactly one row per step");
    assert_eq!(step_history[0].step_name, "A");
    assert_eq!(step_history[0].status, StepStatus::Completed);
    assert_eq!(step_history[0].attempt, 1);
    assert_eq!(step_history[0].rule_ref, "app.rules.r_a", "bare rule refs must qualify");
    assert_eq!(step_history[1].step_name, "B");
    assert_eq!(step_history[1].status, StepStatus::Completed);
    assert_eq!(step_history[1].attempt, 1);

    // PROPIEDAD P2: orden de definición => started_at no decreciente.
    assert!(step_history[0].started_at <= step_history[1].started_at);
    println!("   ✅ Camino feliz certificado.");
}

/**
 * ESCENARIO 2: Dos colapsos transitorios y éxito en el tercer intento.
 */
#[tokio::test]
async fn certify_retry_then_succeed_ledger() {
    println!("\n🗄️  [INICIO]: Auditoría de contabilidad de reintentos...");
    let state = ignite_state("mem_exec_retry").await;

    let invocation_counter = Arc::new(AtomicU32::new(0));
    let counter_for_rule = Arc::clone(&invocation_counter);

    state.object_registry.register_rule(
        "app.rules.r_flaky",
        rule_fn(move |_| {
            let invocation_ordinal = counter_for_rule.fetch_add(1, Ordering::SeqCst) + 1;
            if invocation_ordinal <= 2 {
                Err(EngineError::Transient("simulated ledger deadlock".into()))
            } else {
                Ok(json!({}))
            }
        }),
    );
    state.object_registry.register_process(
        "app.processes.p_retry",
        ProcessMetadata::default(),
        ProcessBlueprint::Fixed(Arc::new(|| vec![step("A", "r_flaky").retry(2, 0).seal()])),
    );

    let descriptor = state
        .process_executor
        .start_process("app.processes.p_retry", json!({}), "operator_1", false)
        .await
        .expect("DISPATCH_FAULT");

    let sealed_instance = state
        .process_executor
        .get_instance(&descriptor.instance_id)
        .await
        .expect("LEDGER_FAULT")
        .expect("INSTANCE_VANISHED");
    assert_eq!(sealed_instance.status, InstanceStatus::Completed);

    // PROPIEDAD P3: una fila por intento, estados [failed, failed, completed].
    let attempt_rows = state
        .process_executor
        .get_step_history(&descriptor.instance_id)
        .await
        .expect("LEDGER_FAULT");

    assert_eq!(attempt_rows.len(), 3);
    assert_eq!(
        attempt_rows.iter().map(|row| row.attempt).collect::<Vec<_>>(),
        vec![1, 2, 3]
    );
    assert_eq!(attempt_rows[0].status, StepStatus::Failed);
    assert_eq!(attempt_rows[1].status, StepStatus::Failed);
    assert_eq!(attempt_rows[2].status, StepStatus::Completed);
    assert_eq!(invocation_counter.load(Ordering::SeqCst), 3);
    println!("   ✅ Contabilidad de reintentos certificada.");
}

/**
 * ESCENARIO 3: 'on_error=skip' preserva el avance de la cadena.
 */
#[tokio::test]
async fn certify_on_error_skip_preserves_the_chain() {
    println!("\n🗄️  [INICIO]: Auditoría de la política skip...");
    let state = ignite_state("mem_exec_skip").await;

    state.object_registry.register_rule(
        "app.rules.r_doomed",
        rule_fn(|_| Err(EngineError::Transient("permanent outage".into()))),
    );
    state
        .object_registry
        .register_rule("app.rules.r_b", rule_fn(|_| Ok(json!({}))));
    state.object_registry.register_process(
        "app.processes.p_skip",
        ProcessMetadata::default(),
        ProcessBlueprint::Fixed(Arc::new(|| {
            vec![
                step("A", "r_doomed").on_error(OnErrorPolicy::Skip).seal(),
                step("B", "r_b").seal(),
            ]
        })),
    );

    let descriptor = state
        .process_executor
        .start_process("app.processes.p_skip", json!({}), "operator_1", false)
        .await
        .expect("DISPATCH_FAULT");

    let sealed_instance = state
        .process_executor
        .get_instance(&descriptor.instance_id)
        .await
        .expect("LEDGER_FAULT")
        .expect("INSTANCE_VANISHED");
    assert_eq!(sealed_instance.status, InstanceStatus::Completed);

    let step_history = state
        .process_executor
        .get_step_history(&descriptor.instance_id)
        .await
        .expect("LEDGER_FAULT");

    assert_eq!(step_history.len(), 2);
    assert_eq!(step_history[0].step_name, "A");
    assert_eq!(step_history[0].status, StepStatus::Failed);
    assert_eq!(step_history[0].attempt, 1);
    assert!(step_history[0].error_info.is_some(), "failed row must carry its trace");
    assert_eq!(step_history[1].step_name, "B");
    assert_eq!(step_history[1].status, StepStatus::Completed);
    println!("   ✅ Política skip certificada.");
}

/**
 * POLÍTICA 'fail': la instancia sella con error_info del paso culpable.
 */
#[tokio::test]
async fn certify_on_error_fail_seals_the_instance() {
    let state = ignite_state("mem_exec_fail").await;

    state.object_registry.register_rule(
        "app.rules.r_doomed",
        rule_fn(|_| Err(EngineError::Transient("unrecoverable".into()))),
    );
    state
        .object_registry
        .register_rule("app.rules.r_b", rule_fn(|_| Ok(json!({}))));
    state.object_registry.register_process(
        "app.processes.p_fail",
        ProcessMetadata::default(),
        ProcessBlueprint::Fixed(Arc::new(|| {
            vec![step("A", "r_doomed").seal(), step("B", "r_b").seal()]
        })),
    );

    let descriptor = state
        .process_executor
        .start_process("app.processes.p_fail", json!({}), "operator_1", false)
        .await
        .expect("DISPATCH_FAULT");

    let sealed_instance = state
        .process_executor
        .get_instance(&descriptor.instance_id)
        .await
        .expect("LEDGER_FAULT")
        .expect("INSTANCE_VANISHED");

    assert_eq!(sealed_instance.status, InstanceStatus::Failed);
    let error_document = sealed_instance.error_info.expect("error_info must seal");
    assert_eq!(error_document["failed_step"], json!("A"));

    // El paso B jamás corrió.
    let step_history = state
        .process_executor
        .get_step_history(&descriptor.instance_id)
        .await
        .expect("LEDGER_FAULT");
    assert!(step_history.iter().all(|row| row.step_name != "B"));

    // PROPIEDAD P4: el sellado es absorbente.
    let cancellation_verdict = state
        .process_executor
        .cancel(&descriptor.instance_id)
        .await
        .expect("LEDGER_FAULT");
    assert!(!cancellation_verdict, "terminal instances reject cancellation");

    let still_failed = state
        .process_executor
        .get_instance(&descriptor.instance_id)
        .await
        .expect("LEDGER_FAULT")
        .expect("INSTANCE_VANISHED");
    assert_eq!(still_failed.status, InstanceStatus::Failed);
}

/**
 * MAPEOS: output_mapping alimenta variables 'output' y los outputs
 * finales de la instancia; input_mapping enlaza variables a parámetros.
 */
#[tokio::test]
async fn certify_variable_mappings_and_visible_outputs() {
    let state = ignite_state("mem_exec_mappings").await;

    state.object_registry.register_rule(
        "app.rules.r_enrich",
        rule_fn(|inputs| {
            let base = inputs.get("x").and_then(|v| v.as_i64()).unwrap_or(0);
            Ok(json!({"enriched": base * 10}))
        }),
    );
    state.object_registry.register_rule(
        "app.rules.r_consume",
        rule_fn(|inputs| {
            let enriched = inputs.get("value").and_then(|v| v.as_i64()).unwrap_or(-1);
            Ok(json!({"final": enriched + 1}))
        }),
    );
    state.object_registry.register_process(
        "app.processes.p_map",
        ProcessMetadata::default(),
        ProcessBlueprint::Fixed(Arc::new(|| {
            vec![
                step("enrich", "r_enrich").output("enriched", "enriched_value").seal(),
                step("consume", "r_consume")
                    .input("value", "enriched_value")
                    .output("final", "final_value")
                    .seal(),
            ]
        })),
    );

    let descriptor = state
        .process_executor
        .start_process("app.processes.p_map", json!({"x": 4}), "operator_1", false)
        .await
        .expect("DISPATCH_FAULT");

    let sealed_instance = state
        .process_executor
        .get_instance(&descriptor.instance_id)
        .await
        .expect("LEDGER_FAULT")
        .expect("INSTANCE_VANISHED");

    assert_eq!(sealed_instance.status, InstanceStatus::Completed);
    assert_eq!(sealed_instance.variables["enriched_value"], json!(40));
    assert_eq!(sealed_instance.variables["final_value"], json!(41));

    let visible_outputs = sealed_instance.outputs.expect("outputs must seal");
    assert_eq!(visible_outputs["enriched_value"], json!(40));
    assert_eq!(visible_outputs["final_value"], json!(41));
}

/**
 * CONDICIONES: falsy omite el paso; las expresiones hostiles son fail-open.
 */
#[tokio::test]
async fn certify_condition_skip_and_fail_open() {
    let state = ignite_state("mem_exec_condition").await;

    state
        .object_registry
        .register_rule("app.rules.r_ok", rule_fn(|_| Ok(json!({}))));
    state.object_registry.register_process(
        "app.processes.p_cond",
        ProcessMetadata::default(),
        ProcessBlueprint::Fixed(Arc::new(|| {
            vec![
                step("guarded", "r_ok").condition("tier == \"premium\"").seal(),
                step("hostile", "r_ok").condition("flags > 3").seal(),
                step("always", "r_ok").seal(),
            ]
        })),
    );

    let descriptor = state
        .process_executor
        .start_process(
            "app.processes.p_cond",
            json!({"tier": "basic", "flags": {"a": 1}}),
            "operator_1",
            false,
        )
        .await
        .expect("DISPATCH_FAULT");

    let step_history = state
        .process_executor
        .get_step_history(&descriptor.instance_id)
        .await
        .expect("LEDGER_FAULT");

    let row_for = |name: &str| {
        step_history
            .iter()
            .find(|row| row.step_name == name)
            .unwrap_or_else(|| panic!("row '{}' must exist", name))
    };

    assert_eq!(row_for("guarded").status, StepStatus::Skipped);
    // Operandos incomparables => fail-open => el paso corre.
    assert_eq!(row_for("hostile").status, StepStatus::Completed);
    assert_eq!(row_for("always").status, StepStatus::Completed);
}

/**
 * PROCESO VACÍO: sella 'completed' de inmediato, sin bitácora.
 */
#[tokio::test]
async fn certify_empty_process_completes_instantly() {
    let state = ignite_state("mem_exec_empty").await;

    state.object_registry.register_process(
        "app.processes.p_void",
        ProcessMetadata::default(),
        ProcessBlueprint::Fixed(Arc::new(Vec::new)),
    );

    let descriptor = state
        .process_executor
        .start_process("app.processes.p_void", json!({}), "operator_1", false)
        .await
        .expect("DISPATCH_FAULT");

    assert_eq!(descriptor.status, InstanceStatus::Completed);

    let history = state
        .process_executor
        .get_step_history(&descriptor.instance_id)
        .await
        .expect("LEDGER_FAULT");
    assert!(history.is_empty());
}

/**
 * ARRANQUE: referencias desconocidas y tipos errados se rechazan síncrono.
 */
#[tokio::test]
async fn certify_start_rejections_surface_to_the_caller() {
    let state = ignite_state("mem_exec_reject").await;

    state
        .object_registry
        .register_rule("app.rules.r_lonely", rule_fn(|_| Ok(json!({}))));

    let ghost_verdict = state
        .process_executor
        .start_process("app.processes.ghost", json!({}), "operator_1", false)
        .await;
    assert!(matches!(ghost_verdict, Err(EngineError::Dispatch { .. })));

    let wrong_type_verdict = state
        .process_executor
        .start_process("app.rules.r_lonely", json!({}), "operator_1", false)
        .await;
    assert!(matches!(wrong_type_verdict, Err(EngineError::Dispatch { .. })));
}
