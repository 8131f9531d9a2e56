// INICIO DEL ARCHIVO [libs/core/vault-engine/src/lib.rs]
/*!
 * =================================================================
 * APARATO: CRYPTOGRAPHIC VAULT ENGINE (V4.1 - SELF-DESCRIBING)
 * CLASIFICACIÓN: CORE SECURITY (ESTRATO L1)
 * RESPONSABILIDAD: CIFRADO AUTENTICADO DE CREDENCIALES AES-256-GCM
 *
 * VISION HIPER-HOLÍSTICA:
 * Implementa la contraparte simétrica del gestor de credenciales de la
 * plataforma. El payload transporta versión, nonce y etiqueta de
 * autenticación embebidos, de modo que una rotación de llave maestra no
 * requiere esquema externo alguno.
 *
 * # Mathematical Proof (Tamper Evidence):
 * GCM acopla el texto cifrado a una etiqueta de autenticación de 128 bits.
 * Cualquier mutación de un solo bit en el payload colapsa la verificación
 * y el motor rehúsa revelar plaintext parcial.
 * =================================================================
 */

use aes_gcm::{
    aead::{Aead, AeadCore, KeyInit, OsRng},
    Aes256Gcm, Key, Nonce,
};
use sha2::{Digest, Sha256};
use thiserror::Error;

/// Variable de entorno que transporta el secreto maestro de la plataforma.
pub const MASTER_SECRET_ENVIRONMENT_KEY: &str = "APPOS_SECRET_KEY";

/// Secreto de desarrollo. Los despliegues de producción DEBEN proveer
/// `APPOS_SECRET_KEY`; este valor existe solo para entornos locales.
pub const DEVELOPMENT_FALLBACK_SECRET: &str = "appos-dev-key-change-in-production";

#[derive(Error, Debug, PartialEq, Eq)]
pub enum VaultError {
    /// La etiqueta GCM no valida: payload manipulado o llave incorrecta.
    #[error("[L1_VAULT_FAULT]: AUTH_TAG_MISMATCH -> Integrity compromised or incorrect master key")]
    AuthTagMismatch,

    /// El payload no respeta el contrato estructural (versión, longitud, UTF-8, JSON).
    #[error("[L1_VAULT_FAULT]: CORRUPT_PAYLOAD -> {0}")]
    CorruptPayload(String),

    /// El motor AEAD rechazó la operación de sellado.
    #[error("[L1_VAULT_FAULT]: SEALING_MALFUNCTION -> {0}")]
    EncryptionFailure(String),
}

/// Resuelve el secreto maestro con precedencia soberana:
/// entorno -> argumento explícito -> fallback de desarrollo.
pub fn resolve_master_secret(explicit_secret: Option<&str>) -> String {
    std::env::var(MASTER_SECRET_ENVIRONMENT_KEY)
        .ok()
        .filter(|value| !value.is_empty())
        .or_else(|| explicit_secret.map(|value| value.to_string()))
        .unwrap_or_else(|| DEVELOPMENT_FALLBACK_SECRET.to_string())
}

/**
 * Motor de cifrado autenticado para documentos de credenciales.
 *
 * El plaintext es SIEMPRE la forma canónica del documento JSON (llaves
 * ordenadas, UTF-8), garantizando que dos mapas equivalentes produzcan
 * payloads comparables bajo la misma llave y nonce.
 */
pub struct CipherEngine {
    gcm_cipher: Aes256Gcm,
}

impl CipherEngine {
    /// Versión estructural del payload sellado.
    pub const PAYLOAD_VERSION: u8 = 1;
    /// Longitud del vector de inicialización GCM (96 bits).
    const NONCE_LENGTH_BYTES: usize = 12;
    /// Longitud mínima estructural: versión + nonce + etiqueta GCM.
    const MINIMUM_PAYLOAD_BYTES: usize = 1 + Self::NONCE_LENGTH_BYTES + 16;

    /**
     * Forja un motor a partir de un secreto textual.
     *
     * # Mathematical Proof:
     * SHA-256 comprime el secreto arbitrario en una llave uniforme de
     * 256 bits, el espacio exacto que exige AES-256-GCM.
     */
    pub fn from_secret(master_secret: &str) -> Self {
        let derived_key_digest = Sha256::digest(master_secret.as_bytes());
        let gcm_key = Key::<Aes256Gcm>::from_slice(&derived_key_digest);

        Self {
            gcm_cipher: Aes256Gcm::new(gcm_key),
        }
    }

    /**
     * Sella un documento JSON en un payload auto-descriptivo.
     *
     * Estructura del artefacto: `[versión (1B) | nonce (12B) | ciphertext+tag]`.
     */
    pub fn encrypt_document(&self, credential_document: &serde_json::Value) -> Result<Vec<u8>, VaultError> {
        // serde_json canonicaliza por llaves ordenadas (BTreeMap interno)
        let canonical_plaintext = serde_json::to_vec(credential_document)
            .map_err(|fault| VaultError::EncryptionFailure(fault.to_string()))?;

        let initialization_nonce = Aes256Gcm::generate_nonce(&mut OsRng);

        let ciphertext_with_tag = self
            .gcm_cipher
            .encrypt(&initialization_nonce, canonical_plaintext.as_ref())
            .map_err(|fault| VaultError::EncryptionFailure(fault.to_string()))?;

        let mut sealed_payload = Vec::with_capacity(1 + Self::NONCE_LENGTH_BYTES + ciphertext_with_tag.len());
        sealed_payload.push(Self::PAYLOAD_VERSION);
        sealed_payload.extend_from_slice(&initialization_nonce);
        sealed_payload.extend_from_slice(&ciphertext_with_tag);

        Ok(sealed_payload)
    }

    /**
     * Abre un payload sellado y reconstruye el documento JSON.
     *
     * # Errors:
     * - `VaultError::CorruptPayload`: estructura, versión, UTF-8 o JSON inválidos.
     * - `VaultError::AuthTagMismatch`: etiqueta GCM rechazada. Sin revelado parcial.
     */
    pub fn decrypt_document(&self, sealed_payload: &[u8]) -> Result<serde_json::Value, VaultError> {
        if sealed_payload.len() < Self::MINIMUM_PAYLOAD_BYTES {
            return Err(VaultError::CorruptPayload(format!(
                "PAYLOAD_TRUNCATED: {} bytes below structural minimum",
                sealed_payload.len()
            )));
        }

        let payload_version = sealed_payload[0];
        if payload_version != Self::PAYLOAD_VERSION {
            return Err(VaultError::CorruptPayload(format!(
                "UNKNOWN_PAYLOAD_VERSION: {}",
                payload_version
            )));
        }

        let nonce_segment = &sealed_payload[1..1 + Self::NONCE_LENGTH_BYTES];
        let ciphertext_segment = &sealed_payload[1 + Self::NONCE_LENGTH_BYTES..];
        let initialization_nonce = Nonce::from_slice(nonce_segment);

        let decrypted_plaintext = self
            .gcm_cipher
            .decrypt(initialization_nonce, ciphertext_segment)
            .map_err(|_| VaultError::AuthTagMismatch)?;

        let credential_document: serde_json::Value = serde_json::from_slice(&decrypted_plaintext)
            .map_err(|fault| VaultError::CorruptPayload(format!("JSON_DECODE_FAULT: {}", fault)))?;

        Ok(credential_document)
    }
}

// FIN DEL ARCHIVO [libs/core/vault-engine/src/lib.rs]
