// [tests/mirror/libs/infra/db_turso/instance_persistence.test.rs]
/*!
 * =================================================================
 * APARATO: CERTIFICADOR DE PERSISTENCIA DE INSTANCIAS (V4.3)
 * CLASIFICACIÓN: TRINITY EVIDENCE // ESTRATO L3-MIRROR
 * RESPONSABILIDAD: AUDITORÍA DE LLAVE NATURAL, GUARDAS Y CANCELACIÓN
 *
 * VISION HIPER-HOLÍSTICA 2026:
 * 1. NATURAL KEY: La tripleta (instancia, paso, intento) colapsa
 *    entregas duplicadas de la cola (PROPIEDAD P1).
 * 2. TERMINAL GUARD: Toda mutación posterior al sellado es un no-op
 *    (PROPIEDAD P4).
 * 3. CANCEL PAIRING: La cancelación sella la instancia Y marca los
 *    pasos en vuelo como 'interrupted' en una transacción.
 * =================================================================
 */

use appos_domain_models::{InstanceStatus, ProcessInstanceRecord, StepLogRecord, StepStatus};
use appos_infra_db::{InstanceRepository, StepLogRepository, TursoClient};
use chrono::Utc;
use serde_json::json;

async fn ignite_ledger(memory_anchor_label: &str) -> (InstanceRepository, StepLogRepository) {
    let database_client = TursoClient::connect(
        &format!("file:{}?mode=memory&cache=shared", memory_anchor_label),
        None,
    )
    .await
    .expect("CRITICAL_FAULT: Failed to anchor in-memory platform ledger.");

    (
        InstanceRepository::new(database_client.clone()),
        StepLogRepository::new(database_client),
    )
}

fn genesis_record(instance_id: &str) -> ProcessInstanceRecord {
    ProcessInstanceRecord {
        instance_id: instance_id.to_string(),
        process_ref: "crm.processes.onboard_customer".into(),
        process_name: "onboard_customer".into(),
        app_name: "crm".into(),
        display_name: Some("Onboard Customer".into()),
        status: InstanceStatus::Running,
        current_step: None,
        inputs: json!({"customer_id": 123}),
        variables: json!({}),
        variable_visibility: json!({}),
        outputs: None,
        error_info: None,
        started_at: Utc::now(),
        completed_at: None,
        started_by: "operator_7".into(),
        triggered_by: Some("crm.processes.onboard_customer".into()),
    }
}

/**
 * IDA Y VUELTA: la proyección persistida reconstruye el dominio completo.
 */
#[tokio::test]
async fn certify_instance_projection_roundtrip() {
    println!("\n🗄️  [INICIO]: Auditoría de proyección de instancias...");
    let (instance_repository, _) = ignite_ledger("mem_pi_roundtrip").await;

    let genesis = genesis_record("proc_aa11bb22cc33");
    instance_repository
        .insert_instance(&genesis)
        .await
        .expect("GENESIS_FAULT");

    let recovered = instance_repository
        .fetch_instance("proc_aa11bb22cc33")
        .await
        .expect("LEDGER_FAULT")
        .expect("INSTANCE_VANISHED");

    assert_eq!(recovered.process_ref, genesis.process_ref);
    assert_eq!(recovered.status, InstanceStatus::Running);
    assert_eq!(recovered.inputs, genesis.inputs);
    assert_eq!(recovered.display_name.as_deref(), Some("Onboard Customer"));
    assert_eq!(recovered.started_by, "operator_7");
    assert!(recovered.completed_at.is_none());
    assert!(instance_repository
        .fetch_instance("proc_ghost000000")
        .await
        .expect("LEDGER_FAULT")
        .is_none());
    println!("   ✅ Proyección certificada.");
}

/**
 * PROPIEDAD P1: la llave natural colapsa entregas duplicadas, y el
 * sellado guardado deja prevalecer el primer resultado.
 */
#[tokio::test]
async fn certify_natural_key_idempotency() {
    let (instance_repository, step_log_repository) = ignite_ledger("mem_pi_idempotent").await;
    instance_repository
        .insert_instance(&genesis_record("proc_idem00000001"))
        .await
        .expect("GENESIS_FAULT");

    let attempt_row = StepLogRecord::skeleton(
        "proc_idem00000001",
        "validate",
        "crm.rules.validate_customer",
        StepStatus::Running,
        1,
    );

    // Entrega duplicada: la segunda apertura colapsa sobre la primera.
    step_log_repository.open_attempt(&attempt_row).await.expect("OPEN_FAULT");
    step_log_repository.open_attempt(&attempt_row).await.expect("OPEN_FAULT");

    let open_rows = step_log_repository
        .fetch_step_rows("proc_idem00000001", "validate")
        .await
        .expect("LEDGER_FAULT");
    assert_eq!(open_rows.len(), 1, "duplicate delivery must collapse (P1)");

    // Primer sellado gana; el segundo es rechazado por el guard.
    let first_seal = step_log_repository
        .seal_attempt(
            "proc_idem00000001",
            "validate",
            1,
            StepStatus::Completed,
            Some(12.5),
            None,
            None,
        )
        .await
        .expect("SEAL_FAULT");
    assert!(first_seal);

    let second_seal = step_log_repository
        .seal_attempt(
            "proc_idem00000001",
            "validate",
            1,
            StepStatus::Failed,
            Some(99.0),
            None,
            Some(&json!({"error": "late duplicate"})),
        )
        .await
        .expect("SEAL_FAULT");
    assert!(!second_seal, "sealed rows are immutable");

    let sealed_rows = step_log_repository
        .fetch_step_rows("proc_idem00000001", "validate")
        .await
        .expect("LEDGER_FAULT");
    assert_eq!(sealed_rows[0].status, StepStatus::Completed);
    assert_eq!(sealed_rows[0].duration_ms, Some(12.5));
}

/**
 * ESCRITURA ACOPLADA: fila de bitácora + variables en una transacción.
 */
#[tokio::test]
async fn certify_paired_success_write() {
    let (instance_repository, step_log_repository) = ignite_ledger("mem_pi_paired").await;
    instance_repository
        .insert_instance(&genesis_record("proc_paired000001"))
        .await
        .expect("GENESIS_FAULT");

    let attempt_row = StepLogRecord::skeleton(
        "proc_paired000001",
        "enrich",
        "crm.rules.enrich_account",
        StepStatus::Running,
        1,
    );
    step_log_repository.open_attempt(&attempt_row).await.expect("OPEN_FAULT");

    let sealed = step_log_repository
        .seal_success_with_variables(
            "proc_paired000001",
            "enrich",
            1,
            7.25,
            Some(&json!({"profile": "gold"})),
            &json!({"account_profile": "gold"}),
            &json!({"account_profile": "output"}),
        )
        .await
        .expect("PAIRED_FAULT");
    assert!(sealed);

    let instance_view = instance_repository
        .fetch_instance("proc_paired000001")
        .await
        .expect("LEDGER_FAULT")
        .expect("INSTANCE_VANISHED");
    assert_eq!(instance_view.variables["account_profile"], json!("gold"));
    assert_eq!(instance_view.variable_visibility["account_profile"], json!("output"));

    let history = step_log_repository
        .fetch_history("proc_paired000001")
        .await
        .expect("LEDGER_FAULT");
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].status, StepStatus::Completed);
    assert_eq!(history[0].outputs, Some(json!({"profile": "gold"})));
}

/**
 * PROPIEDAD P4: los estados terminales son absorbentes.
 */
#[tokio::test]
async fn certify_terminal_monotonicity_guard() {
    let (instance_repository, _) = ignite_ledger("mem_pi_terminal").await;
    instance_repository
        .insert_instance(&genesis_record("proc_term00000001"))
        .await
        .expect("GENESIS_FAULT");

    let completed = instance_repository
        .complete_instance("proc_term00000001", &json!({"result": 1}))
        .await
        .expect("SEAL_FAULT");
    assert!(completed);

    // Toda mutación posterior es un no-op.
    assert!(!instance_repository
        .fail_instance("proc_term00000001", &json!({"error": "late"}))
        .await
        .expect("LEDGER_FAULT"));
    assert!(!instance_repository
        .transition_status("proc_term00000001", InstanceStatus::Paused)
        .await
        .expect("LEDGER_FAULT"));
    assert!(!instance_repository
        .cancel_instance("proc_term00000001")
        .await
        .expect("LEDGER_FAULT"));

    let final_view = instance_repository
        .fetch_instance("proc_term00000001")
        .await
        .expect("LEDGER_FAULT")
        .expect("INSTANCE_VANISHED");
    assert_eq!(final_view.status, InstanceStatus::Completed);
    assert_eq!(final_view.outputs, Some(json!({"result": 1})));
}

/**
 * CANCELACIÓN ACOPLADA: la instancia sella 'cancelled' y las filas en
 * vuelo pasan a 'interrupted' en la misma transacción.
 */
#[tokio::test]
async fn certify_cancel_interrupts_in_flight_steps() {
    let (instance_repository, step_log_repository) = ignite_ledger("mem_pi_cancel").await;
    instance_repository
        .insert_instance(&genesis_record("proc_cancel000001"))
        .await
        .expect("GENESIS_FAULT");

    let in_flight_row = StepLogRecord::skeleton(
        "proc_cancel000001",
        "long_haul",
        "crm.rules.long_haul",
        StepStatus::Running,
        1,
    );
    step_log_repository.open_attempt(&in_flight_row).await.expect("OPEN_FAULT");

    let cancelled = instance_repository
        .cancel_instance("proc_cancel000001")
        .await
        .expect("CANCEL_FAULT");
    assert!(cancelled);

    let instance_view = instance_repository
        .fetch_instance("proc_cancel000001")
        .await
        .expect("LEDGER_FAULT")
        .expect("INSTANCE_VANISHED");
    assert_eq!(instance_view.status, InstanceStatus::Cancelled);
    assert!(instance_view.completed_at.is_some());

    let history = step_log_repository
        .fetch_history("proc_cancel000001")
        .await
        .expect("LEDGER_FAULT");
    assert_eq!(history[0].status, StepStatus::Interrupted);

    // Cancelación repetida: no-op absorbente.
    assert!(!instance_repository
        .cancel_instance("proc_cancel000001")
        .await
        .expect("LEDGER_FAULT"));
}

/**
 * PAGINACIÓN: filtros (app, status) y orden descendente por arranque.
 */
#[tokio::test]
async fn certify_instance_pagination_filters() {
    let (instance_repository, _) = ignite_ledger("mem_pi_pagination").await;

    for ordinal in 0..5 {
        let mut record = genesis_record(&format!("proc_page0000000{}", ordinal));
        record.app_name = if ordinal % 2 == 0 { "crm".into() } else { "billing".into() };
        record.started_at = Utc::now();
        instance_repository.insert_instance(&record).await.expect("GENESIS_FAULT");
    }
    instance_repository
        .complete_instance("proc_page00000000", &json!({}))
        .await
        .expect("SEAL_FAULT");

    let crm_records = instance_repository
        .list_instances(Some("crm"), None, 10, 0)
        .await
        .expect("LEDGER_FAULT");
    assert_eq!(crm_records.len(), 3);
    assert!(crm_records.iter().all(|record| record.app_name == "crm"));

    let completed_records = instance_repository
        .list_instances(Some("crm"), Some(InstanceStatus::Completed), 10, 0)
        .await
        .expect("LEDGER_FAULT");
    assert_eq!(completed_records.len(), 1);
    assert_eq!(completed_records[0].instance_id, "proc_page00000000");

    let paged_records = instance_repository
        .list_instances(None, None, 2, 0)
        .await
        .expect("LEDGER_FAULT");
    assert_eq!(paged_records.len(), 2);
}
