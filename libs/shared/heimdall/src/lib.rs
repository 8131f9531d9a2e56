// [libs/shared/heimdall/src/lib.rs]
/*!
 * =================================================================
 * APARATO: HEIMDALL OBSERVABILITY BOOTSTRAP (V9.0 - COLLAPSE MONITOR)
 * CLASIFICACIÓN: SHARED UTILITY (ESTRATO L4)
 * RESPONSABILIDAD: PERFILES DE TRAZADO Y VIGILANCIA DE COLAPSOS
 *
 * VISION HIPER-HOLÍSTICA 2026:
 * 1. PROFILE DRIVEN: Cada binario del núcleo de procesos declara un
 *    'ObservabilityProfile'; el filtro se compone desde las tablas de
 *    estratos del dominio y de supresión de ruido, no desde cadenas
 *    escritas a mano en cada servicio.
 * 2. JSON OVERRIDE: La emisión JSON se decide por perfil de compilación
 *    O por la variable 'APPOS_LOG_JSON', permitiendo ingesta
 *    estructurada también en despliegues de desarrollo.
 * 3. HOOK CHAINING: El monitor de colapsos encadena el hook de pánico
 *    previo en vez de sustituirlo, de modo que los arneses de prueba y
 *    los capturadores del host conservan su propio rastro.
 *
 * # Mathematical Proof (Filter Composition):
 * El filtro efectivo es la unión disjunta de tres conjuntos de
 * directivas: {servicio}, ESTRATOS_DEL_NÚCLEO y SUPRESIÓN_DE_RUIDO.
 * Al componerse desde tablas constantes, dos binarios con el mismo
 * perfil producen filtros bit-idénticos, y la cobertura de estratos no
 * puede divergir silenciosamente entre el orquestador y sus daemons.
 * =================================================================
 */

use std::panic;
use tracing::{error, info};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt as formatting_layer, EnvFilter};

/// Variable de entorno que fuerza la emisión JSON fuera de producción.
pub const JSON_EMISSION_ENVIRONMENT_KEY: &str = "APPOS_LOG_JSON";

/// Estratos del núcleo de procesos que heredan el piso del servicio.
const PROCESS_CORE_STRATA: &[&str] = &[
    "appos_domain_engine",
    "appos_infra_queue",
    "appos_infra_db",
];

/// Infraestructura ruidosa acotada a su severidad mínima útil.
const NOISE_SUPPRESSION_DIRECTIVES: &[(&str, &str)] = &[
    ("libsql", "error"),
    ("hyper", "warn"),
    ("rustls", "warn"),
];

/**
 * Perfil de observabilidad de un binario del núcleo de procesos.
 */
#[derive(Debug, Clone)]
pub struct ObservabilityProfile {
    /// Identidad nominal del servicio (target raíz del filtro).
    pub service_nominal_identifier: String,
    /// Piso de severidad del servicio y de los estratos del núcleo.
    pub severity_floor: &'static str,
    /// Emisión JSON forzada (además del perfil release).
    pub force_json_emission: bool,
}

impl ObservabilityProfile {
    /// Perfil canónico: piso 'debug' en desarrollo, 'info' en producción,
    /// con el override de JSON leído del entorno.
    pub fn for_service(service_nominal_identifier: &str) -> Self {
        let json_override = std::env::var(JSON_EMISSION_ENVIRONMENT_KEY)
            .map(|raw_flag| matches!(raw_flag.as_str(), "1" | "true" | "TRUE"))
            .unwrap_or(false);

        Self {
            service_nominal_identifier: service_nominal_identifier.to_string(),
            severity_floor: if cfg!(debug_assertions) { "debug" } else { "info" },
            force_json_emission: json_override,
        }
    }
}

/**
 * Compone la cadena de directivas del filtro desde las tablas soberanas.
 * Pura y determinista: el mismo perfil produce el mismo filtro.
 */
pub fn compose_filter_directives(profile: &ObservabilityProfile) -> String {
    let mut filter_directives = Vec::with_capacity(
        1 + PROCESS_CORE_STRATA.len() + NOISE_SUPPRESSION_DIRECTIVES.len(),
    );

    filter_directives.push(format!(
        "{}={}",
        profile.service_nominal_identifier, profile.severity_floor
    ));

    for core_stratum in PROCESS_CORE_STRATA {
        filter_directives.push(format!("{}={}", core_stratum, profile.severity_floor));
    }

    for (noisy_crate, capped_severity) in NOISE_SUPPRESSION_DIRECTIVES {
        filter_directives.push(format!("{}={}", noisy_crate, capped_severity));
    }

    filter_directives.join(",")
}

/// Ignición con el perfil canónico del servicio.
pub fn init_tracing(service_nominal_identifier: &str) {
    init_with_profile(ObservabilityProfile::for_service(service_nominal_identifier));
}

/**
 * Ignición completa: suscriptor global + monitor de colapsos.
 *
 * # Errors:
 * Retorna pánico si otro suscriptor global ya fue inicializado.
 */
pub fn init_with_profile(observability_profile: ObservabilityProfile) {
    // 1. FILTRO EFECTIVO: el entorno manda; las tablas son el fallback.
    let environmental_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| compose_filter_directives(&observability_profile).into());

    // 2. MODO DE EMISIÓN: release O override explícito => JSON plano.
    let emit_structured_json =
        observability_profile.force_json_emission || !cfg!(debug_assertions);

    if emit_structured_json {
        tracing_subscriber::registry()
            .with(environmental_filter)
            .with(formatting_layer::layer().json().flatten_event(true))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(environmental_filter)
            .with(formatting_layer::layer().compact().with_target(false))
            .init();
    }

    // 3. MONITOR DE COLAPSOS (encadenado, no sustitutivo)
    install_collapse_monitor(observability_profile.service_nominal_identifier.clone());

    info!(
        "🧿 [HEIMDALL]: Observability profile armed for [{}] (json = {}).",
        observability_profile.service_nominal_identifier, emit_structured_json
    );
}

/**
 * Instala el monitor de colapsos preservando el hook de pánico previo.
 * Un pánico en un worker de pasos deja su rastro estructurado ANTES de
 * ceder el control al capturador original del runtime.
 */
fn install_collapse_monitor(service_identifier: String) {
    let prior_panic_hook = panic::take_hook();

    panic::set_hook(Box::new(move |panic_metadata| {
        let collapse_coordinates = panic_metadata
            .location()
            .map(|location| format!("{}:{}", location.file(), location.line()))
            .unwrap_or_else(|| "UNCHARTED_STRATA".to_string());

        error!(
            target: "collapse_monitor",
            service = %service_identifier,
            coordinates = %collapse_coordinates,
            "☄️ [WORKER_COLLAPSE]: {}",
            describe_panic_payload(panic_metadata.payload())
        );

        prior_panic_hook(panic_metadata);
    }));
}

/// Extrae la descripción textual del payload de un pánico.
fn describe_panic_payload(panic_payload: &(dyn std::any::Any + Send)) -> &str {
    if let Some(static_message) = panic_payload.downcast_ref::<&str>() {
        return static_message;
    }
    if let Some(owned_message) = panic_payload.downcast_ref::<String>() {
        return owned_message.as_str();
    }
    "OPAQUE_COLLAPSE_PAYLOAD"
}
