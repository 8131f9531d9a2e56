// [libs/domain/models/src/connection.rs]
/*!
 * =================================================================
 * APARATO: CONNECTED SYSTEM MODELS (V2.2 - AUTH DESCRIPTORS)
 * CLASIFICACIÓN: DOMAIN MODELS (ESTRATO L2)
 * RESPONSABILIDAD: DESCRIPTORES DE AUTENTICACIÓN POR SISTEMA CONECTADO
 * =================================================================
 */

use serde::{Deserialize, Serialize};

/// Estilo de autenticación HTTP declarado por un Sistema Conectado.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum AuthKind {
    #[default]
    None,
    Basic,
    ApiKey,
    Oauth2,
    /// El material de certificado se aplica en la capa de transporte.
    Certificate,
    /// Estilos no reconocidos degradan a cabeceras vacías con advertencia.
    #[serde(other)]
    Unknown,
}

/**
 * Descriptor de configuración de autenticación de un Sistema Conectado.
 * El secreto vive en la bóveda; este descriptor solo gobierna la FORMA
 * de las cabeceras derivadas.
 */
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AuthConfig {
    #[serde(rename = "type", default)]
    pub auth_kind: AuthKind,
    /// Cabecera destino para `api_key` (default: Authorization).
    #[serde(default)]
    pub header: Option<String>,
    /// Prefijo del valor para `api_key` (default: Bearer; vacío = sin prefijo).
    #[serde(default)]
    pub prefix: Option<String>,
}
