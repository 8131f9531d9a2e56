// [tests/mirror/libs/infra/db_turso/connected_system_vault.test.rs]
/*!
 * =================================================================
 * APARATO: CERTIFICADOR DE LA COLUMNA DE CIPHERTEXT (V4.1)
 * CLASIFICACIÓN: TRINITY EVIDENCE // ESTRATO L3-MIRROR
 * RESPONSABILIDAD: AUDITORÍA DE CUSTODIA Y ROTACIÓN ATÓMICA
 *
 * VISION HIPER-HOLÍSTICA 2026:
 * 1. COLUMN DISCIPLINE: El repositorio jamás toca columnas ajenas al
 *    ciphertext; el clear preserva la fila del sistema.
 * 2. ATOMIC ROTATION: Una fila fantasma a mitad de rotación aborta el
 *    reemplazo completo (rollback del túnel ACID).
 * =================================================================
 */

use appos_infra_db::{ConnectedSystemRepository, DbError, TursoClient};

async fn ignite_vault(memory_anchor_label: &str) -> ConnectedSystemRepository {
    let database_client = TursoClient::connect(
        &format!("file:{}?mode=memory&cache=shared", memory_anchor_label),
        None,
    )
    .await
    .expect("CRITICAL_FAULT: Failed to anchor in-memory platform ledger.");

    ConnectedSystemRepository::new(database_client)
}

/**
 * CUSTODIA NOMINAL: store/fetch/has/clear sobre la columna sellada.
 */
#[tokio::test]
async fn certify_ciphertext_column_lifecycle() {
    println!("\n🗄️  [INICIO]: Auditoría de la columna de ciphertext...");
    let repository = ignite_vault("mem_cs_lifecycle").await;

    repository.ensure_system("stripe_api", "rest_api").await.expect("SETUP_FAULT");
    // Inscripción repetida: no-op idempotente.
    repository.ensure_system("stripe_api", "rest_api").await.expect("SETUP_FAULT");

    assert!(!repository.has_ciphertext("stripe_api").await.expect("LEDGER_FAULT"));
    assert!(repository
        .fetch_ciphertext("stripe_api")
        .await
        .expect("LEDGER_FAULT")
        .is_none());

    repository
        .store_ciphertext("stripe_api", "AQIDBA==")
        .await
        .expect("STORE_FAULT");

    assert!(repository.has_ciphertext("stripe_api").await.expect("LEDGER_FAULT"));
    assert_eq!(
        repository.fetch_ciphertext("stripe_api").await.expect("LEDGER_FAULT"),
        Some("AQIDBA==".to_string())
    );

    // Reemplazo atómico del secreto vigente.
    repository
        .store_ciphertext("stripe_api", "BQYHCA==")
        .await
        .expect("STORE_FAULT");
    assert_eq!(
        repository.fetch_ciphertext("stripe_api").await.expect("LEDGER_FAULT"),
        Some("BQYHCA==".to_string())
    );

    // El clear borra SOLO el ciphertext; la fila sobrevive.
    repository.clear_ciphertext("stripe_api").await.expect("CLEAR_FAULT");
    assert!(!repository.has_ciphertext("stripe_api").await.expect("LEDGER_FAULT"));
    repository
        .store_ciphertext("stripe_api", "CQoLDA==")
        .await
        .expect("row must survive the clear");
    println!("   ✅ Columna de ciphertext certificada.");
}

/**
 * GOBERNANZA: sellar contra un sistema no inscrito rechaza con
 * CONNECTED_SYSTEM_NOT_FOUND.
 */
#[tokio::test]
async fn certify_store_rejects_ghost_systems() {
    let repository = ignite_vault("mem_cs_ghost").await;

    let ghost_verdict = repository.store_ciphertext("ghost_system", "AQID").await;
    assert!(matches!(ghost_verdict, Err(DbError::ConnectedSystemNotFound)));
}

/**
 * ROTACIÓN ATÓMICA: el inventario completo rota o no rota nada.
 */
#[tokio::test]
async fn certify_rotation_is_all_or_nothing() {
    let repository = ignite_vault("mem_cs_rotation").await;

    repository.ensure_system("alpha", "rest_api").await.expect("SETUP_FAULT");
    repository.ensure_system("beta", "database").await.expect("SETUP_FAULT");
    repository.store_ciphertext("alpha", "old_alpha").await.expect("STORE_FAULT");
    repository.store_ciphertext("beta", "old_beta").await.expect("STORE_FAULT");

    // Inventario ordenado por nombre para la rotación.
    let inventory = repository.all_ciphertexts().await.expect("LEDGER_FAULT");
    assert_eq!(
        inventory,
        vec![
            ("alpha".to_string(), "old_alpha".to_string()),
            ("beta".to_string(), "old_beta".to_string()),
        ]
    );

    // FASE HOSTIL: una fila fantasma a mitad del lote aborta TODO.
    let poisoned_batch = vec![
        ("alpha".to_string(), "new_alpha".to_string()),
        ("ghost".to_string(), "new_ghost".to_string()),
        ("beta".to_string(), "new_beta".to_string()),
    ];
    let poisoned_verdict = repository.replace_all_ciphertexts(&poisoned_batch).await;
    assert!(matches!(poisoned_verdict, Err(DbError::ConnectedSystemNotFound)));

    // El rollback preserva el inventario previo bit-perfecto.
    assert_eq!(
        repository.fetch_ciphertext("alpha").await.expect("LEDGER_FAULT"),
        Some("old_alpha".to_string()),
        "ATOMICITY_FAULT: partial rotation leaked"
    );
    assert_eq!(
        repository.fetch_ciphertext("beta").await.expect("LEDGER_FAULT"),
        Some("old_beta".to_string())
    );

    // FASE NOMINAL: el lote íntegro compromete.
    let leveled_batch = vec![
        ("alpha".to_string(), "new_alpha".to_string()),
        ("beta".to_string(), "new_beta".to_string()),
    ];
    repository.replace_all_ciphertexts(&leveled_batch).await.expect("ROTATION_FAULT");

    assert_eq!(
        repository.fetch_ciphertext("alpha").await.expect("LEDGER_FAULT"),
        Some("new_alpha".to_string())
    );
    assert_eq!(
        repository.fetch_ciphertext("beta").await.expect("LEDGER_FAULT"),
        Some("new_beta".to_string())
    );
}
