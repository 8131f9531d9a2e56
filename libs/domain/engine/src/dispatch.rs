// [libs/domain/engine/src/dispatch.rs]
/*!
 * =================================================================
 * APARATO: RULE DISPATCHER (V5.1 - POLICY GATED)
 * CLASIFICACIÓN: DOMAIN SERVICES (ESTRATO L2)
 * RESPONSABILIDAD: DESPACHO DINÁMICO DE REGLAS POR REFERENCIA PUNTEADA
 *
 * # Mathematical Proof (Opaque Invocation):
 * El despachador es la única puerta entre el ejecutor y las reglas.
 * Al concentrar aquí el veredicto del oráculo y la verificación del tipo,
 * el ejecutor permanece ciego al contenido de la regla y el contrato de
 * seguridad no puede ser eludido por ningún paso.
 * =================================================================
 */

use crate::errors::{DispatchReason, EngineError, SecurityReason};
use crate::policy::{PolicyDecision, PolicyOracle};
use crate::registry::{ObjectHandler, ObjectRegistry, ObjectType};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, instrument, warn};

/**
 * Puerta única de invocación de reglas: resolución, permiso, ejecución.
 */
pub struct RuleDispatcher {
    object_registry: Arc<dyn ObjectRegistry>,
    policy_oracle: Arc<dyn PolicyOracle>,
}

impl RuleDispatcher {
    pub fn new(object_registry: Arc<dyn ObjectRegistry>, policy_oracle: Arc<dyn PolicyOracle>) -> Self {
        Self {
            object_registry,
            policy_oracle,
        }
    }

    /**
     * Despacha una regla con el documento de inputs dado.
     *
     * # Errors:
     * - `Dispatch(UnknownRef)`: la referencia no existe.
     * - `Dispatch(WrongType)`: el objeto no es una regla.
     * - `Security(PermissionDenied)`: el oráculo negó la invocación.
     * - Cualquier fallo propio de la regla, sin reclasificar.
     */
    #[instrument(skip(self, rule_inputs), fields(rule = %rule_reference, principal = %principal))]
    pub async fn dispatch_rule(
        &self,
        principal: &str,
        rule_reference: &str,
        rule_inputs: Value,
    ) -> Result<Value, EngineError> {
        let resolved_object = self.object_registry.resolve(rule_reference).ok_or_else(|| {
            EngineError::dispatch(
                DispatchReason::UnknownRef,
                format!("rule reference not registered: {}", rule_reference),
            )
        })?;

        if resolved_object.object_type != ObjectType::Rule {
            return Err(EngineError::dispatch(
                DispatchReason::WrongType,
                format!(
                    "expected rule, got '{}': {}",
                    resolved_object.object_type.as_str(),
                    rule_reference
                ),
            ));
        }

        if let PolicyDecision::Deny(denial_reason) =
            self.policy_oracle.check(principal, rule_reference, "execute")
        {
            warn!("⛔ [DISPATCH_DENIED]: Oracle blocked [{}] for [{}]: {}", rule_reference, principal, denial_reason);
            return Err(EngineError::security(
                SecurityReason::PermissionDenied,
                denial_reason,
            ));
        }

        match &resolved_object.handler {
            ObjectHandler::Rule(executable_unit) => {
                debug!("⚙️  [DISPATCH]: Invoking rule [{}].", rule_reference);
                executable_unit.execute(rule_inputs).await
            }
            _ => Err(EngineError::dispatch(
                DispatchReason::WrongType,
                format!("handler/type divergence for: {}", rule_reference),
            )),
        }
    }
}
