// [libs/domain/models/src/lib.rs]
/*!
 * =================================================================
 * APARATO: DOMAIN MODELS GATEWAY (V3.0 - PROCESS CORE)
 * CLASIFICACIÓN: DOMAIN MODELS (ESTRATO L2)
 * RESPONSABILIDAD: EXPOSICIÓN NOMINAL DE CONTRATOS DEL DOMINIO
 * =================================================================
 */

pub mod process;
pub mod instance;
pub mod step_log;
pub mod triggers;
pub mod connection;

pub use process::{
    parallel, step, DefinitionViolation, OnErrorPolicy, ProcessDefinition, ProcessMetadata,
    StepBuilder, StepDefinition, StepNode,
};
pub use instance::{InstanceDescriptor, InstanceStatus, ProcessInstanceRecord};
pub use step_log::{StepLogRecord, StepStatus};
pub use triggers::{EventPredicate, TriggerSpec};
pub use connection::{AuthConfig, AuthKind};
