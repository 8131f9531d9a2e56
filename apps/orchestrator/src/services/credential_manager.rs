// INICIO DEL ARCHIVO [apps/orchestrator/src/services/credential_manager.rs]
/*!
 * =================================================================
 * APARATO: CREDENTIAL MANAGER (V5.3 - SEALED CUSTODY)
 * CLASIFICACIÓN: APPLICATION SERVICES (ESTRATO L4)
 * RESPONSABILIDAD: CUSTODIA DE SECRETOS DE SISTEMAS CONECTADOS
 *
 * VISION HIPER-HOLÍSTICA 2026:
 * 1. ZERO CACHING: El plaintext vive en RAM solo durante la llamada.
 *    Cada operación es una transacción corta contra el Ledger; jamás
 *    se sirve plaintext obsoleto.
 * 2. ATOMIC ROTATION: La rotación descifra TODO el inventario con la
 *    llave vigente, re-cifra con la nueva y compromete en UNA
 *    transacción; un fallo por fila aborta la rotación completa y la
 *    llave activa no cambia.
 * 3. HEADER DOCTRINE: Los secretos ausentes producen cabeceras vacías
 *    más advertencia; el fallo de autenticación emerge aguas abajo en
 *    el canal del llamado HTTP, jamás aquí.
 * =================================================================
 */

use appos_core_vault::{resolve_master_secret, CipherEngine, VaultError};
use appos_domain_engine::{EngineError, SecurityReason};
use appos_domain_models::{AuthConfig, AuthKind};
use appos_infra_db::{ConnectedSystemRepository, DbError};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use tracing::{info, instrument, warn};

/**
 * Gestor de credenciales: bóveda AES-256-GCM + columna de ciphertext.
 */
pub struct CredentialManager {
    /// Motor de cifrado vigente; se permuta íntegro tras una rotación.
    cipher_engine: RwLock<CipherEngine>,
    connected_systems: Arc<ConnectedSystemRepository>,
}

impl CredentialManager {
    /**
     * Forja el gestor resolviendo el secreto maestro con la precedencia
     * soberana: entorno -> argumento explícito -> fallback de desarrollo.
     */
    pub fn new(
        connected_systems: Arc<ConnectedSystemRepository>,
        explicit_secret: Option<&str>,
    ) -> Self {
        let master_secret = resolve_master_secret(explicit_secret);

        Self {
            cipher_engine: RwLock::new(CipherEngine::from_secret(&master_secret)),
            connected_systems,
        }
    }

    // -------------------------------------------------------------------
    // CIFRADO / DESCIFRADO
    // -------------------------------------------------------------------

    /// Sella un documento de credenciales con la llave vigente.
    pub fn encrypt(&self, credential_document: &Value) -> Result<Vec<u8>, EngineError> {
        self.cipher_engine
            .read()
            .expect("FATAL: Cipher engine lock poisoned.")
            .encrypt_document(credential_document)
            .map_err(map_vault_fault)
    }

    /// Abre un payload sellado con la llave vigente.
    pub fn decrypt(&self, sealed_payload: &[u8]) -> Result<Value, EngineError> {
        self.cipher_engine
            .read()
            .expect("FATAL: Cipher engine lock poisoned.")
            .decrypt_document(sealed_payload)
            .map_err(map_vault_fault)
    }

    // -------------------------------------------------------------------
    // OPERACIONES SOBRE EL LEDGER
    // -------------------------------------------------------------------

    /**
     * Cifra y reemplaza atómicamente el secreto del sistema.
     *
     * # Errors:
     * `EngineError::Validation` si el Sistema Conectado no está inscrito.
     */
    #[instrument(skip(self, credential_document))]
    pub async fn set_credentials(
        &self,
        connected_system_name: &str,
        credential_document: &Value,
    ) -> Result<(), EngineError> {
        let sealed_payload = self.encrypt(credential_document)?;

        self.connected_systems
            .store_ciphertext(connected_system_name, &BASE64.encode(sealed_payload))
            .await
            .map_err(map_db_fault)?;

        info!("🔐 [CREDENTIALS]: Secret sealed for system [{}].", connected_system_name);
        Ok(())
    }

    /**
     * Recupera y descifra el secreto del sistema. None cuando el sistema
     * no porta ciphertext. Sin caché: siempre se lee el Ledger.
     */
    pub async fn get_credentials(
        &self,
        connected_system_name: &str,
    ) -> Result<Option<Value>, EngineError> {
        let stored_ciphertext = self
            .connected_systems
            .fetch_ciphertext(connected_system_name)
            .await
            .map_err(map_db_fault)?;

        let Some(ciphertext_base64) = stored_ciphertext else {
            return Ok(None);
        };

        let sealed_payload = BASE64.decode(ciphertext_base64.as_bytes()).map_err(|fault| {
            EngineError::security(
                SecurityReason::CorruptPayload,
                format!("BASE64_DECODE_FAULT: {}", fault),
            )
        })?;

        self.decrypt(&sealed_payload).map(Some)
    }

    /// Limpia el ciphertext; la fila del sistema permanece.
    pub async fn delete_credentials(&self, connected_system_name: &str) -> Result<(), EngineError> {
        self.connected_systems
            .clear_ciphertext(connected_system_name)
            .await
            .map_err(map_db_fault)?;

        info!("🧹 [CREDENTIALS]: Secret cleared for system [{}].", connected_system_name);
        Ok(())
    }

    /// Consulta de metadatos: jamás descifra.
    pub async fn has_credentials(&self, connected_system_name: &str) -> Result<bool, EngineError> {
        self.connected_systems
            .has_ciphertext(connected_system_name)
            .await
            .map_err(map_db_fault)
    }

    /**
     * Rotación de llave maestra: descifra todo el inventario con la llave
     * vigente, re-cifra con la nueva y compromete en UNA transacción.
     * Solo tras el commit el gestor permuta a la llave nueva.
     *
     * Retorna el número de sistemas rotados.
     */
    #[instrument(skip(self, new_master_secret))]
    pub async fn rotate_key(&self, new_master_secret: &str) -> Result<usize, EngineError> {
        let successor_engine = CipherEngine::from_secret(new_master_secret);

        let ciphertext_inventory = self
            .connected_systems
            .all_ciphertexts()
            .await
            .map_err(map_db_fault)?;

        // FASE 1: RE-SELLADO EN RAM (abortable sin efectos)
        let mut reencrypted_inventory = Vec::with_capacity(ciphertext_inventory.len());
        for (system_name, ciphertext_base64) in &ciphertext_inventory {
            let sealed_payload = BASE64.decode(ciphertext_base64.as_bytes()).map_err(|fault| {
                EngineError::security(
                    SecurityReason::CorruptPayload,
                    format!("BASE64_DECODE_FAULT on '{}': {}", system_name, fault),
                )
            })?;

            let credential_document = self.decrypt(&sealed_payload)?;
            let resealed_payload = successor_engine
                .encrypt_document(&credential_document)
                .map_err(map_vault_fault)?;

            reencrypted_inventory.push((system_name.clone(), BASE64.encode(resealed_payload)));
        }

        // FASE 2: COMPROMISO ATÓMICO EN EL LEDGER
        self.connected_systems
            .replace_all_ciphertexts(&reencrypted_inventory)
            .await
            .map_err(map_db_fault)?;

        // FASE 3: PERMUTA DE LLAVE ACTIVA (post-commit)
        *self
            .cipher_engine
            .write()
            .expect("FATAL: Cipher engine lock poisoned.") = successor_engine;

        info!("🔄 [CREDENTIALS]: Master key rotated across {} systems.", reencrypted_inventory.len());
        Ok(reencrypted_inventory.len())
    }

    // -------------------------------------------------------------------
    // DERIVACIÓN DE CABECERAS HTTP
    // -------------------------------------------------------------------

    /**
     * Deriva las cabeceras de autenticación del sistema según su
     * descriptor. Los secretos ausentes producen cabeceras vacías más
     * advertencia; jamás un error.
     */
    #[instrument(skip(self, auth_config))]
    pub async fn get_auth_headers(
        &self,
        connected_system_name: &str,
        auth_config: &AuthConfig,
    ) -> Result<HashMap<String, String>, EngineError> {
        if auth_config.auth_kind == AuthKind::None {
            return Ok(HashMap::new());
        }

        let Some(credential_document) = self.get_credentials(connected_system_name).await? else {
            warn!(
                "⚠️  [CREDENTIALS]: No secret for [{}] (auth style {:?}). Empty headers derived.",
                connected_system_name, auth_config.auth_kind
            );
            return Ok(HashMap::new());
        };

        let mut derived_headers = HashMap::new();

        match auth_config.auth_kind {
            AuthKind::Basic => {
                let username = credential_field(&credential_document, "username");
                let password = credential_field(&credential_document, "password");
                let basic_token = BASE64.encode(format!("{}:{}", username, password));
                derived_headers.insert("Authorization".to_string(), format!("Basic {}", basic_token));
            }
            AuthKind::ApiKey => {
                let header_name = auth_config
                    .header
                    .clone()
                    .unwrap_or_else(|| "Authorization".to_string());
                let value_prefix = auth_config
                    .prefix
                    .clone()
                    .unwrap_or_else(|| "Bearer".to_string());
                let api_key = credential_field(&credential_document, "api_key");

                let header_value = if value_prefix.is_empty() {
                    api_key
                } else {
                    format!("{} {}", value_prefix, api_key)
                };
                derived_headers.insert(header_name, header_value);
            }
            AuthKind::Oauth2 => {
                let access_token = credential_field(&credential_document, "access_token");
                if access_token.is_empty() {
                    warn!(
                        "⚠️  [CREDENTIALS]: No access_token stored for [{}]. Empty headers derived.",
                        connected_system_name
                    );
                } else {
                    derived_headers
                        .insert("Authorization".to_string(), format!("Bearer {}", access_token));
                }
            }
            AuthKind::Certificate => {
                // El material de certificado se aplica en la capa de transporte.
            }
            AuthKind::Unknown => {
                warn!(
                    "⚠️  [CREDENTIALS]: Unknown auth style declared by [{}]. Empty headers derived.",
                    connected_system_name
                );
            }
            AuthKind::None => unreachable!("auth style None short-circuits above"),
        }

        Ok(derived_headers)
    }
}

// ---------------------------------------------------------------------------
// SOPORTE DE MAPEOS
// ---------------------------------------------------------------------------

fn credential_field(credential_document: &Value, field_name: &str) -> String {
    credential_document
        .get(field_name)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

fn map_vault_fault(fault: VaultError) -> EngineError {
    match fault {
        VaultError::AuthTagMismatch => {
            EngineError::security(SecurityReason::AuthTagMismatch, fault.to_string())
        }
        VaultError::CorruptPayload(_) => {
            EngineError::security(SecurityReason::CorruptPayload, fault.to_string())
        }
        VaultError::EncryptionFailure(_) => EngineError::Validation(fault.to_string()),
    }
}

fn map_db_fault(fault: DbError) -> EngineError {
    match fault {
        DbError::ConnectedSystemNotFound => {
            EngineError::Validation("CONNECTED_SYSTEM_NOT_FOUND".to_string())
        }
        transient_fault => EngineError::Transient(transient_fault.to_string()),
    }
}
// FIN DEL ARCHIVO [apps/orchestrator/src/services/credential_manager.rs]
