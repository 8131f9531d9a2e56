// [apps/orchestrator/src/services/scheduler.rs]
/*!
 * =================================================================
 * APARATO: PROCESS SCHEDULER (V4.2 - TRIGGER AUTHORITY)
 * CLASIFICACIÓN: APPLICATION SERVICES (ESTRATO L4)
 * RESPONSABILIDAD: ESCANEO DE TRIGGERS Y DESPACHO DE EVENTOS
 *
 * VISION HIPER-HOLÍSTICA 2026:
 * 1. STARTUP SCAN: 'initialize' recorre el registro de objetos y puebla
 *    los índices de eventos y schedules desde los metadatos declarados.
 * 2. SIBLING ISOLATION: Un trigger que colapsa al arrancar su proceso
 *    se registra y se traga; jamás bloquea a sus hermanos.
 * 3. ORDER FIDELITY: El fan-out de un evento respeta el orden de
 *    inscripción de los triggers.
 * =================================================================
 */

use crate::services::executor::ProcessExecutor;
use appos_domain_engine::{EventTriggerRegistry, ObjectRegistry, ScheduleTriggerRegistry};
use appos_domain_models::{InstanceDescriptor, TriggerSpec};
use serde_json::Value;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, error, info, instrument, warn};

/**
 * Autoridad de triggers: puebla los registros y despacha eventos.
 */
pub struct ProcessScheduler {
    object_registry: Arc<dyn ObjectRegistry>,
    event_triggers: Arc<EventTriggerRegistry>,
    schedule_triggers: Arc<ScheduleTriggerRegistry>,
    process_executor: Arc<ProcessExecutor>,
    scan_completed: AtomicBool,
}

impl ProcessScheduler {
    pub fn new(
        object_registry: Arc<dyn ObjectRegistry>,
        event_triggers: Arc<EventTriggerRegistry>,
        schedule_triggers: Arc<ScheduleTriggerRegistry>,
        process_executor: Arc<ProcessExecutor>,
    ) -> Self {
        Self {
            object_registry,
            event_triggers,
            schedule_triggers,
            process_executor,
            scan_completed: AtomicBool::new(false),
        }
    }

    /**
     * Escanea los procesos registrados y puebla ambos índices de triggers.
     * Idempotente: el segundo escaneo es un no-op.
     */
    #[instrument(skip(self))]
    pub fn initialize(&self) {
        if self.scan_completed.swap(true, Ordering::SeqCst) {
            return;
        }

        let mut process_count = 0usize;
        let mut event_trigger_count = 0usize;
        let mut schedule_trigger_count = 0usize;

        for registered_object in self.object_registry.snapshot() {
            if registered_object.object_type != appos_domain_engine::ObjectType::Process {
                continue;
            }
            process_count += 1;

            for trigger_declaration in &registered_object.metadata.triggers {
                match trigger_declaration {
                    TriggerSpec::Event { event_name, predicate } => {
                        self.event_triggers.register(
                            event_name,
                            &registered_object.reference,
                            predicate.clone(),
                        );
                        event_trigger_count += 1;
                    }
                    TriggerSpec::Schedule { cron_expression, time_zone, enabled } => {
                        match self.schedule_triggers.register(
                            &registered_object.reference,
                            cron_expression,
                            time_zone,
                            *enabled,
                        ) {
                            Ok(()) => schedule_trigger_count += 1,
                            Err(validation_fault) => warn!(
                                "⚠️  [SCHEDULER]: Schedule for [{}] rejected: {}",
                                registered_object.reference, validation_fault
                            ),
                        }
                    }
                }
            }
        }

        info!(
            "🗂️  [SCHEDULER]: Trigger scan sealed: {} processes, {} event triggers, {} schedules.",
            process_count, event_trigger_count, schedule_trigger_count
        );
    }

    /**
     * Dispara un evento nominal: arranca todo proceso suscrito cuyo
     * predicado esté ausente o sea truthy.
     *
     * Los fallos de arranque se registran y se tragan; el llamador
     * recibe los descriptores de las instancias que SÍ arrancaron.
     */
    #[instrument(skip(self, event_payload), fields(event = %event_name))]
    pub async fn fire_event(
        &self,
        event_name: &str,
        event_payload: Value,
        user_id: &str,
        async_execution: bool,
    ) -> Vec<InstanceDescriptor> {
        let subscribed_bindings = self.event_triggers.get_triggers(event_name);
        if subscribed_bindings.is_empty() {
            debug!("💤 [SCHEDULER]: No triggers registered for event [{}].", event_name);
            return Vec::new();
        }

        let mut started_descriptors = Vec::new();

        for trigger_binding in subscribed_bindings {
            if let Some(event_predicate) = &trigger_binding.predicate {
                if !event_predicate(&event_payload) {
                    debug!(
                        "🧹 [SCHEDULER]: Predicate filtered {} -> {}.",
                        event_name, trigger_binding.process_ref
                    );
                    continue;
                }
            }

            match self
                .process_executor
                .start_process(
                    &trigger_binding.process_ref,
                    event_payload.clone(),
                    user_id,
                    async_execution,
                )
                .await
            {
                Ok(instance_descriptor) => {
                    info!(
                        "⚡ [SCHEDULER]: Event '{}' ignited {} -> {}.",
                        event_name, trigger_binding.process_ref, instance_descriptor.instance_id
                    );
                    started_descriptors.push(instance_descriptor);
                }
                Err(ignition_fault) => {
                    // Aislamiento de hermanos: un trigger podrido no bloquea al resto.
                    error!(
                        "❌ [SCHEDULER]: Event '{}' failed to ignite {}: {}",
                        event_name, trigger_binding.process_ref, ignition_fault
                    );
                }
            }
        }

        started_descriptors
    }
}
