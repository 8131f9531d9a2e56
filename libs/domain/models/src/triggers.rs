// [libs/domain/models/src/triggers.rs]
/*!
 * =================================================================
 * APARATO: TRIGGER SPEC MODELS (V2.0 - STIMULUS CONTRACTS)
 * CLASIFICACIÓN: DOMAIN MODELS (ESTRATO L2)
 * RESPONSABILIDAD: ENLACES DECLARATIVOS ESTÍMULO -> PROCESO
 * =================================================================
 */

use serde_json::Value;
use std::sync::Arc;

/// Predicado de filtrado evaluado contra el payload del evento.
/// Retorno falsy => el trigger no arranca instancia.
pub type EventPredicate = Arc<dyn Fn(&Value) -> bool + Send + Sync>;

/// Declaración de disparo portada en los metadatos de un proceso.
#[derive(Clone)]
pub enum TriggerSpec {
    /// Evento nominal de plataforma (ciclo de vida de récord, webhook, manual).
    Event {
        event_name: String,
        predicate: Option<EventPredicate>,
    },
    /// Frontera de minuto gobernada por expresión cron en una zona nominal.
    Schedule {
        cron_expression: String,
        time_zone: String,
        enabled: bool,
    },
}

impl TriggerSpec {
    /// Constructor de evento sin predicado.
    pub fn event(event_name: &str) -> Self {
        Self::Event {
            event_name: event_name.to_string(),
            predicate: None,
        }
    }

    /// Constructor de evento con predicado de filtrado.
    pub fn event_filtered(event_name: &str, predicate: EventPredicate) -> Self {
        Self::Event {
            event_name: event_name.to_string(),
            predicate: Some(predicate),
        }
    }

    /// Constructor de schedule habilitado en UTC.
    pub fn schedule(cron_expression: &str) -> Self {
        Self::Schedule {
            cron_expression: cron_expression.to_string(),
            time_zone: "UTC".to_string(),
            enabled: true,
        }
    }

    /// Constructor de schedule en zona nominal.
    pub fn schedule_in_zone(cron_expression: &str, time_zone: &str) -> Self {
        Self::Schedule {
            cron_expression: cron_expression.to_string(),
            time_zone: time_zone.to_string(),
            enabled: true,
        }
    }
}

impl std::fmt::Debug for TriggerSpec {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Event { event_name, predicate } => formatter
                .debug_struct("Event")
                .field("event_name", event_name)
                .field("has_predicate", &predicate.is_some())
                .finish(),
            Self::Schedule { cron_expression, time_zone, enabled } => formatter
                .debug_struct("Schedule")
                .field("cron_expression", cron_expression)
                .field("time_zone", time_zone)
                .field("enabled", enabled)
                .finish(),
        }
    }
}
