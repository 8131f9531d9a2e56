// [libs/domain/engine/src/lib.rs]
/*!
 * =================================================================
 * APARATO: ENGINE DOMAIN GATEWAY (V5.0 - PROCESS CORE)
 * CLASIFICACIÓN: DOMAIN SERVICES (ESTRATO L2)
 * RESPONSABILIDAD: EXPOSICIÓN NOMINAL DE LOS SERVICIOS DEL MOTOR
 * =================================================================
 */

pub mod errors;
pub mod registry;
pub mod policy;
pub mod dispatch;
pub mod condition;
pub mod triggers;
pub mod clock;
pub mod sink;

pub use errors::{DispatchReason, EngineError, SecurityReason};
pub use registry::{
    rule_fn, InMemoryObjectRegistry, ObjectHandler, ObjectRegistry, ObjectType, ProcessBlueprint,
    RegisteredObject, RuleExecutable,
};
pub use policy::{AllowAllOracle, PolicyDecision, PolicyOracle};
pub use dispatch::RuleDispatcher;
pub use condition::evaluate_condition;
pub use triggers::{EventTriggerBinding, EventTriggerRegistry, ScheduleBinding, ScheduleTriggerRegistry};
pub use clock::{Clock, SystemClock};
pub use sink::{AuditRecord, AuditSink};
