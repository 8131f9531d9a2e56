// [tests/mirror/apps/orchestrator/services/credential_rotation.test.rs]
/*!
 * =================================================================
 * APARATO: CERTIFICADOR DE CUSTODIA DE CREDENCIALES (V5.2)
 * CLASIFICACIÓN: TRINITY EVIDENCE // ESTRATO L4-MIRROR
 * RESPONSABILIDAD: AUDITORÍA DE IDA Y VUELTA, ROTACIÓN Y CABECERAS
 *
 * VISION HIPER-HOLÍSTICA 2026:
 * 1. ROUNDTRIP: set -> get reconstruye el documento bit-perfecto.
 * 2. ROTATION PRESERVATION: Tras rotar K1 -> K2, el plaintext
 *    recuperado es idéntico al previo y la llave vieja queda muerta.
 * 3. HEADER DOCTRINE: basic/api_key/oauth2 derivan sus cabeceras; los
 *    secretos ausentes producen cabeceras vacías, jamás errores.
 * =================================================================
 */

use appos_domain_engine::{EngineError, SecurityReason};
use appos_domain_models::{AuthConfig, AuthKind};
use appos_infra_db::repositories::ConnectedSystemRepository;
use appos_infra_db::TursoClient;
use appos_orchestrator::prelude::*;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use serde_json::json;
use std::sync::Arc;

async fn ignite_vault(memory_anchor_label: &str) -> Arc<ConnectedSystemRepository> {
    // La precedencia del secreto maestro lee el entorno primero; los
    // tests exigen determinismo del argumento explícito.
    std::env::remove_var("APPOS_SECRET_KEY");

    let database_client = TursoClient::connect(
        &format!("file:{}?mode=memory&cache=shared", memory_anchor_label),
        None,
    )
    .await
    .expect("CRITICAL_FAULT: Failed to anchor in-memory platform ledger.");

    Arc::new(ConnectedSystemRepository::new(database_client))
}

/**
 * ESCENARIO 5: ida y vuelta, rotación K1 -> K2 y cabecera Basic.
 */
#[tokio::test]
async fn certify_roundtrip_rotation_and_basic_header() {
    println!("\n🗄️  [INICIO]: Auditoría de custodia y rotación...");
    let repository = ignite_vault("mem_cred_rotation").await;
    repository
        .ensure_system("sys", "rest_api")
        .await
        .expect("SETUP_FAULT");

    let manager = CredentialManager::new(Arc::clone(&repository), Some("K1"));
    let credential_document = json!({"username": "u", "password": "p"});

    manager
        .set_credentials("sys", &credential_document)
        .await
        .expect("SEAL_FAULT");

    assert!(manager.has_credentials("sys").await.expect("LEDGER_FAULT"));

    // PROPIEDAD P5: roundtrip bajo la llave vigente.
    let recovered_document = manager
        .get_credentials("sys")
        .await
        .expect("OPEN_FAULT")
        .expect("secret must exist");
    assert_eq!(recovered_document, credential_document);

    // PROPIEDAD P6: la rotación preserva el plaintext.
    let rotated_count = manager.rotate_key("K2").await.expect("ROTATION_FAULT");
    assert_eq!(rotated_count, 1);

    let post_rotation_document = manager
        .get_credentials("sys")
        .await
        .expect("OPEN_FAULT")
        .expect("secret must survive rotation");
    assert_eq!(post_rotation_document, credential_document);

    // Un gestor forjado con K2 abre; uno anclado en K1 es rechazado.
    let successor_manager = CredentialManager::new(Arc::clone(&repository), Some("K2"));
    assert_eq!(
        successor_manager
            .get_credentials("sys")
            .await
            .expect("OPEN_FAULT")
            .expect("secret must exist"),
        credential_document
    );

    let stale_manager = CredentialManager::new(Arc::clone(&repository), Some("K1"));
    let stale_verdict = stale_manager.get_credentials("sys").await;
    assert!(matches!(
        stale_verdict,
        Err(EngineError::Security { reason: SecurityReason::AuthTagMismatch, .. })
    ));

    // Cabecera Basic derivada del secreto rotado.
    let derived_headers = manager
        .get_auth_headers("sys", &AuthConfig { auth_kind: AuthKind::Basic, header: None, prefix: None })
        .await
        .expect("HEADER_FAULT");

    assert_eq!(
        derived_headers.get("Authorization").map(String::as_str),
        Some(format!("Basic {}", BASE64.encode("u:p")).as_str())
    );
    println!("   ✅ Custodia y rotación certificadas.");
}

/**
 * CABECERAS: api_key con prefijo y sin prefijo, oauth2 y estilos ciegos.
 */
#[tokio::test]
async fn certify_header_derivation_styles() {
    let repository = ignite_vault("mem_cred_headers").await;
    repository
        .ensure_system("stripe_api", "rest_api")
        .await
        .expect("SETUP_FAULT");

    let manager = CredentialManager::new(Arc::clone(&repository), Some("header-secret"));
    manager
        .set_credentials(
            "stripe_api",
            &json!({"api_key": "sk_live_0001", "access_token": "tok_123"}),
        )
        .await
        .expect("SEAL_FAULT");

    // api_key con cabecera y prefijo nominales.
    let prefixed_headers = manager
        .get_auth_headers(
            "stripe_api",
            &AuthConfig {
                auth_kind: AuthKind::ApiKey,
                header: Some("X-Api-Key".into()),
                prefix: Some("Key".into()),
            },
        )
        .await
        .expect("HEADER_FAULT");
    assert_eq!(
        prefixed_headers.get("X-Api-Key").map(String::as_str),
        Some("Key sk_live_0001")
    );

    // Prefijo en blanco: el valor viaja desnudo.
    let bare_headers = manager
        .get_auth_headers(
            "stripe_api",
            &AuthConfig {
                auth_kind: AuthKind::ApiKey,
                header: Some("X-Api-Key".into()),
                prefix: Some("".into()),
            },
        )
        .await
        .expect("HEADER_FAULT");
    assert_eq!(
        bare_headers.get("X-Api-Key").map(String::as_str),
        Some("sk_live_0001")
    );

    // oauth2: portador derivado del access_token almacenado.
    let bearer_headers = manager
        .get_auth_headers(
            "stripe_api",
            &AuthConfig { auth_kind: AuthKind::Oauth2, header: None, prefix: None },
        )
        .await
        .expect("HEADER_FAULT");
    assert_eq!(
        bearer_headers.get("Authorization").map(String::as_str),
        Some("Bearer tok_123")
    );

    // Estilos 'none', 'certificate' y desconocidos: cabeceras vacías.
    for blind_style in [AuthKind::None, AuthKind::Certificate, AuthKind::Unknown] {
        let empty_headers = manager
            .get_auth_headers(
                "stripe_api",
                &AuthConfig { auth_kind: blind_style, header: None, prefix: None },
            )
            .await
            .expect("HEADER_FAULT");
        assert!(empty_headers.is_empty());
    }
}

/**
 * SECRETOS AUSENTES: cabeceras vacías más advertencia, jamás errores.
 */
#[tokio::test]
async fn certify_missing_secrets_never_raise() {
    let repository = ignite_vault("mem_cred_missing").await;
    repository
        .ensure_system("hollow_system", "rest_api")
        .await
        .expect("SETUP_FAULT");

    let manager = CredentialManager::new(Arc::clone(&repository), Some("missing-secret"));

    assert!(!manager.has_credentials("hollow_system").await.expect("LEDGER_FAULT"));
    assert!(manager
        .get_credentials("hollow_system")
        .await
        .expect("OPEN_FAULT")
        .is_none());

    let empty_headers = manager
        .get_auth_headers(
            "hollow_system",
            &AuthConfig { auth_kind: AuthKind::Basic, header: None, prefix: None },
        )
        .await
        .expect("HEADER_FAULT");
    assert!(empty_headers.is_empty());
}

/**
 * GOBERNANZA: set contra un sistema fantasma rechaza; delete limpia solo
 * el ciphertext y la fila del sistema sobrevive.
 */
#[tokio::test]
async fn certify_set_rejection_and_delete_semantics() {
    let repository = ignite_vault("mem_cred_governance").await;
    repository
        .ensure_system("db_primary", "database")
        .await
        .expect("SETUP_FAULT");

    let manager = CredentialManager::new(Arc::clone(&repository), Some("governance-secret"));

    let ghost_verdict = manager
        .set_credentials("ghost_system", &json!({"password": "x"}))
        .await;
    assert!(matches!(ghost_verdict, Err(EngineError::Validation(_))));

    manager
        .set_credentials("db_primary", &json!({"password": "hunter2"}))
        .await
        .expect("SEAL_FAULT");
    assert!(manager.has_credentials("db_primary").await.expect("LEDGER_FAULT"));

    manager.delete_credentials("db_primary").await.expect("CLEAR_FAULT");
    assert!(!manager.has_credentials("db_primary").await.expect("LEDGER_FAULT"));

    // La fila del sistema permanece: un nuevo secreto puede sellarse.
    manager
        .set_credentials("db_primary", &json!({"password": "hunter3"}))
        .await
        .expect("row must survive the clear");
}
