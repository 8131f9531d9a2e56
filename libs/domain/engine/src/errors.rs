// [libs/domain/engine/src/errors.rs]
/*!
 * =================================================================
 * APARATO: ENGINE ERROR CATALOG (V5.1 - SEMANTIC STRATA)
 * CLASIFICACIÓN: DOMAIN CORE (ESTRATO L2)
 * RESPONSABILIDAD: CATALOGACIÓN SEMÁNTICA DE FALLOS DEL MOTOR
 *
 * VISION HIPER-HOLÍSTICA 2026:
 * 1. FOUR KINDS DOCTRINE: Validation se rechaza síncrono en el registro;
 *    Security jamás se reintenta; Dispatch colapsa el paso honrando
 *    'on_error'; Transient es re-entregable por la cola independiente
 *    del presupuesto de reintentos del paso.
 * 2. PANOPTICON COMPLIANCE: Mensajes con prefijo de estrato para su
 *    renderizado cromático en la consola de administración.
 * 3. ZERO ABBREVIATIONS: Nomenclatura nominal absoluta.
 * =================================================================
 */

use thiserror::Error;

/// Causa específica de una violación de seguridad.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SecurityReason {
    /// Etiqueta de autenticación GCM rechazada (manipulación o llave errónea).
    AuthTagMismatch,
    /// Payload cifrado estructuralmente inválido.
    CorruptPayload,
    /// El oráculo de permisos negó la invocación.
    PermissionDenied,
}

/// Causa específica de un rechazo de despacho.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchReason {
    /// La referencia no existe en el registro de objetos.
    UnknownRef,
    /// El objeto resuelto no porta el tipo esperado.
    WrongType,
    /// La regla devolvió una forma incompatible con el mapeo de salidas.
    BadShape,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    /// Entrada malformada: cron inválido, forma de paso ilegal, zona desconocida.
    #[error("[L2_ENGINE_FAULT]: VALIDATION_REJECTED -> {0}")]
    Validation(String),

    /// Violación de seguridad. Se reporta al principal invocante; jamás se reintenta.
    #[error("[L2_ENGINE_FAULT]: SECURITY_VIOLATION ({reason:?}) -> {detail}")]
    Security {
        reason: SecurityReason,
        detail: String,
    },

    /// Rechazo de despacho. Colapsa el paso de inmediato honrando 'on_error'.
    #[error("[L2_ENGINE_FAULT]: DISPATCH_REJECTED ({reason:?}) -> {detail}")]
    Dispatch {
        reason: DispatchReason,
        detail: String,
    },

    /// Perturbación transitoria marcada explícitamente (deadlock, hipo de cola).
    #[error("[L2_ENGINE_FAULT]: TRANSIENT_DISTURBANCE -> {0}")]
    Transient(String),
}

impl EngineError {
    /// Clasificación transitoria: todo lo no marcado es permanente.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transient(_))
    }

    /// Las violaciones de seguridad jamás entran al bucle de reintentos.
    pub fn is_security(&self) -> bool {
        matches!(self, Self::Security { .. })
    }

    /// Etiqueta nominal del tipo para el campo `error_info.type`.
    pub fn kind_label(&self) -> &'static str {
        match self {
            Self::Validation(_) => "ValidationError",
            Self::Security { .. } => "SecurityError",
            Self::Dispatch { .. } => "DispatchError",
            Self::Transient(_) => "TransientError",
        }
    }

    /// Constructor abreviado para rechazos de despacho.
    pub fn dispatch(reason: DispatchReason, detail: impl Into<String>) -> Self {
        Self::Dispatch {
            reason,
            detail: detail.into(),
        }
    }

    /// Constructor abreviado para violaciones de seguridad.
    pub fn security(reason: SecurityReason, detail: impl Into<String>) -> Self {
        Self::Security {
            reason,
            detail: detail.into(),
        }
    }
}

impl From<appos_domain_models::DefinitionViolation> for EngineError {
    fn from(violation: appos_domain_models::DefinitionViolation) -> Self {
        Self::Validation(violation.to_string())
    }
}
