// [libs/domain/engine/src/policy.rs]
/*!
 * =================================================================
 * APARATO: POLICY ORACLE SEAM (V2.1 - CONSUMED INTERFACE)
 * CLASIFICACIÓN: DOMAIN SERVICES (ESTRATO L2)
 * RESPONSABILIDAD: VEREDICTO DE AUTORIZACIÓN PRINCIPAL -> OBJETO
 * =================================================================
 */

/// Veredicto del oráculo de permisos de la plataforma.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PolicyDecision {
    Allow,
    Deny(String),
}

/// Interfaz consumida: la implementación real vive en el estrato de
/// gobernanza de la plataforma (grupos, roles, visibilidad).
pub trait PolicyOracle: Send + Sync {
    fn check(&self, principal: &str, object_reference: &str, action: &str) -> PolicyDecision;
}

/// Oráculo permisivo para despliegues de desarrollo y Proving Grounds.
pub struct AllowAllOracle;

impl PolicyOracle for AllowAllOracle {
    fn check(&self, _principal: &str, _object_reference: &str, _action: &str) -> PolicyDecision {
        PolicyDecision::Allow
    }
}
