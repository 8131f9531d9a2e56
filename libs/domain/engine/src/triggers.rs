// [libs/domain/engine/src/triggers.rs]
/*!
 * =================================================================
 * APARATO: TRIGGER REGISTRIES (V4.0 - STIMULUS INDEX)
 * CLASIFICACIÓN: DOMAIN SERVICES (ESTRATO L2)
 * RESPONSABILIDAD: ÍNDICES EN MEMORIA ESTÍMULO -> PROCESO
 *
 * VISION HIPER-HOLÍSTICA 2026:
 * 1. ORDEN DE INSCRIPCIÓN: los triggers de un evento disparan en el orden
 *    en que fueron registrados; la pareja (evento, proceso) se deduplica.
 * 2. LOCK DISCIPLINE: un RwLock por registro. Las mutaciones son raras
 *    (arranque, hot-reload); las lecturas clonan snapshots y proceden
 *    sin retener el candado.
 * 3. VALIDACIÓN SÍNCRONA: un schedule malformado (cron o zona) se rechaza
 *    en el registro con ValidationError, jamás en el daemon.
 * =================================================================
 */

use crate::errors::EngineError;
use appos_core_cron::CronExpression;
use appos_domain_models::EventPredicate;
use chrono_tz::Tz;
use std::collections::BTreeMap;
use std::sync::RwLock;
use tracing::debug;

/// Enlace evento -> proceso con predicado opcional de filtrado.
#[derive(Clone)]
pub struct EventTriggerBinding {
    pub process_ref: String,
    pub predicate: Option<EventPredicate>,
}

impl std::fmt::Debug for EventTriggerBinding {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("EventTriggerBinding")
            .field("process_ref", &self.process_ref)
            .field("has_predicate", &self.predicate.is_some())
            .finish()
    }
}

/**
 * Índice en memoria: nombre de evento -> secuencia ordenada de enlaces.
 */
#[derive(Default)]
pub struct EventTriggerRegistry {
    bindings_by_event: RwLock<BTreeMap<String, Vec<EventTriggerBinding>>>,
}

impl EventTriggerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inscribe un enlace; la pareja (evento, proceso) duplicada se ignora.
    pub fn register(&self, event_name: &str, process_ref: &str, predicate: Option<EventPredicate>) {
        let mut bindings_guard = self
            .bindings_by_event
            .write()
            .expect("FATAL: Event trigger lock poisoned.");

        let event_bindings = bindings_guard.entry(event_name.to_string()).or_default();
        if event_bindings
            .iter()
            .any(|binding| binding.process_ref == process_ref)
        {
            return;
        }

        event_bindings.push(EventTriggerBinding {
            process_ref: process_ref.to_string(),
            predicate,
        });
        debug!("🔗 [EVENT_TRIGGERS]: {} -> {} inscribed.", event_name, process_ref);
    }

    /// Remueve el primer enlace que corresponda a la pareja dada.
    pub fn unregister(&self, event_name: &str, process_ref: &str) {
        let mut bindings_guard = self
            .bindings_by_event
            .write()
            .expect("FATAL: Event trigger lock poisoned.");

        if let Some(event_bindings) = bindings_guard.get_mut(event_name) {
            if let Some(binding_position) = event_bindings
                .iter()
                .position(|binding| binding.process_ref == process_ref)
            {
                event_bindings.remove(binding_position);
            }
        }
    }

    /// Snapshot de los enlaces de un evento, en orden de inscripción.
    pub fn get_triggers(&self, event_name: &str) -> Vec<EventTriggerBinding> {
        self.bindings_by_event
            .read()
            .expect("FATAL: Event trigger lock poisoned.")
            .get(event_name)
            .cloned()
            .unwrap_or_default()
    }

    /// Nombres de todos los eventos con al menos un enlace.
    pub fn event_names(&self) -> Vec<String> {
        self.bindings_by_event
            .read()
            .expect("FATAL: Event trigger lock poisoned.")
            .keys()
            .cloned()
            .collect()
    }

    pub fn clear(&self) {
        self.bindings_by_event
            .write()
            .expect("FATAL: Event trigger lock poisoned.")
            .clear();
    }

    /// Volumen total de enlaces a través de todos los eventos.
    pub fn count(&self) -> usize {
        self.bindings_by_event
            .read()
            .expect("FATAL: Event trigger lock poisoned.")
            .values()
            .map(Vec::len)
            .sum()
    }
}

/// Enlace cron -> proceso ya compilado y situado en su zona nominal.
#[derive(Debug, Clone)]
pub struct ScheduleBinding {
    pub process_ref: String,
    pub cron_expression: CronExpression,
    pub time_zone: Tz,
    pub enabled: bool,
}

/**
 * Índice ordenado de schedules. Un proceso puede portar múltiples
 * schedules; `unregister` los remueve todos.
 */
#[derive(Default)]
pub struct ScheduleTriggerRegistry {
    schedule_bindings: RwLock<Vec<ScheduleBinding>>,
}

impl ScheduleTriggerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /**
     * Inscribe un schedule tras validar la expresión y la zona.
     *
     * # Errors:
     * `EngineError::Validation` ante cron malformado (conteo de campos o
     * gramática) o zona horaria desconocida.
     */
    pub fn register(
        &self,
        process_ref: &str,
        cron_expression: &str,
        time_zone: &str,
        enabled: bool,
    ) -> Result<(), EngineError> {
        let compiled_expression = CronExpression::parse(cron_expression)
            .map_err(|parse_fault| EngineError::Validation(parse_fault.to_string()))?;

        let resolved_zone: Tz = time_zone.parse().map_err(|_| {
            EngineError::Validation(format!("UNKNOWN_TIME_ZONE: '{}'", time_zone))
        })?;

        self.schedule_bindings
            .write()
            .expect("FATAL: Schedule trigger lock poisoned.")
            .push(ScheduleBinding {
                process_ref: process_ref.to_string(),
                cron_expression: compiled_expression,
                time_zone: resolved_zone,
                enabled,
            });

        debug!("🗓️  [SCHEDULE_TRIGGERS]: {} @ '{}' ({}) inscribed.", process_ref, cron_expression, time_zone);
        Ok(())
    }

    /// Remueve TODOS los schedules del proceso dado.
    pub fn unregister(&self, process_ref: &str) {
        self.schedule_bindings
            .write()
            .expect("FATAL: Schedule trigger lock poisoned.")
            .retain(|binding| binding.process_ref != process_ref);
    }

    pub fn schedules(&self) -> Vec<ScheduleBinding> {
        self.schedule_bindings
            .read()
            .expect("FATAL: Schedule trigger lock poisoned.")
            .clone()
    }

    pub fn enabled_schedules(&self) -> Vec<ScheduleBinding> {
        self.schedule_bindings
            .read()
            .expect("FATAL: Schedule trigger lock poisoned.")
            .iter()
            .filter(|binding| binding.enabled)
            .cloned()
            .collect()
    }

    pub fn clear(&self) {
        self.schedule_bindings
            .write()
            .expect("FATAL: Schedule trigger lock poisoned.")
            .clear();
    }

    pub fn count(&self) -> usize {
        self.schedule_bindings
            .read()
            .expect("FATAL: Schedule trigger lock poisoned.")
            .len()
    }
}
