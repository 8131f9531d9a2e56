// [libs/domain/models/src/process.rs]
/*!
 * =================================================================
 * APARATO: PROCESS DEFINITION MODELS (V3.2 - BLUEPRINT CONTRACTS)
 * CLASIFICACIÓN: DOMAIN MODELS (ESTRATO L2)
 * RESPONSABILIDAD: CONTRATOS SOBERANOS DE PASOS Y DEFINICIONES
 *
 * VISION HIPER-HOLÍSTICA 2026:
 * 1. SHAPE DISCIPLINE: Un proceso es una lista lineal de pasos donde un
 *    nodo puede ser secuencial o un grupo paralelo de pasos secuenciales.
 *    El anidamiento de paralelos queda vetado a nivel de tipos: el
 *    constructor 'parallel' solo acepta pasos secuenciales.
 * 2. BUILDER FLUIDO: 'step(...)' y 'parallel(...)' producen tipos valor
 *    puros; el ejecutor re-invoca el blueprint en cada despacho y el
 *    índice del paso es el contrato entre encolado y ejecución.
 * 3. NOMINAL PURITY: Nomenclatura nominal absoluta en todos los campos.
 * =================================================================
 */

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

/// Política de resolución ante el agotamiento de reintentos de un paso.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum OnErrorPolicy {
    /// Colapsa la instancia completa (política por defecto).
    #[default]
    Fail,
    /// Registra el fallo y continúa con el siguiente paso.
    Skip,
    /// Semántica idéntica a Skip, preservada por paridad con el DSL de autor.
    Continue,
}

impl OnErrorPolicy {
    /// Interpreta la forma textual del DSL. Toda etiqueta desconocida
    /// degrada a `Fail` (el tie-break conservador de la plataforma).
    pub fn parse(raw_label: &str) -> Self {
        match raw_label {
            "skip" => Self::Skip,
            "continue" => Self::Continue,
            _ => Self::Fail,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Fail => "fail",
            Self::Skip => "skip",
            Self::Continue => "continue",
        }
    }
}

/**
 * Definición completa de un paso secuencial: una invocación de regla con
 * su propia política de condición, reintento y fallo.
 */
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepDefinition {
    /// Nombre único del paso dentro de la definición.
    pub name: String,
    /// Referencia de la regla, posiblemente sin calificar (`validate` vs `crm.rules.validate`).
    pub rule: String,
    /// Enlace parámetro-de-regla -> variable-de-proceso. Ausente = se reenvían los inputs.
    pub input_mapping: Option<BTreeMap<String, String>>,
    /// Enlace salida-de-regla -> variable-de-proceso.
    pub output_mapping: Option<BTreeMap<String, String>>,
    /// Reintentos adicionales tras el primer fallo.
    pub retry_count: u32,
    /// Pausa fija entre reintentos.
    pub retry_delay_seconds: u64,
    /// Expresión del sublenguaje de condiciones; falsy => paso omitido.
    pub condition: Option<String>,
    pub on_error: OnErrorPolicy,
    /// Solo significativo dentro de grupos paralelos: no bloquea la barrera.
    pub fire_and_forget: bool,
    /// Captura de inputs en la bitácora de pasos.
    pub log_inputs: bool,
    /// Captura de outputs en la bitácora de pasos.
    pub log_outputs: bool,
}

/// Nodo de la lista de pasos: secuencial o grupo paralelo.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "node_type", content = "definition")]
pub enum StepNode {
    Sequential(StepDefinition),
    Parallel { members: Vec<StepDefinition> },
}

impl StepNode {
    /// Nombre nominal del nodo para el puntero `current_step`.
    pub fn display_name(&self) -> String {
        match self {
            Self::Sequential(definition) => definition.name.clone(),
            Self::Parallel { members } => {
                let member_names: Vec<&str> =
                    members.iter().map(|member| member.name.as_str()).collect();
                format!("parallel[{}]", member_names.join(","))
            }
        }
    }
}

/// Metadatos de presentación y disparo de un proceso registrado.
#[derive(Clone, Default)]
pub struct ProcessMetadata {
    pub name: String,
    pub display_name: String,
    pub triggers: Vec<crate::triggers::TriggerSpec>,
}

impl std::fmt::Debug for ProcessMetadata {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("ProcessMetadata")
            .field("name", &self.name)
            .field("display_name", &self.display_name)
            .field("trigger_count", &self.triggers.len())
            .finish()
    }
}

/**
 * Definición materializada de un proceso: la lista de pasos producida por
 * el blueprint, más metadatos del registro.
 */
#[derive(Debug, Clone)]
pub struct ProcessDefinition {
    pub reference: String,
    pub steps: Vec<StepNode>,
    pub metadata: ProcessMetadata,
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum DefinitionViolation {
    #[error("[L2_DEFINITION_FAULT]: DUPLICATE_STEP_NAME -> '{0}'")]
    DuplicateStepName(String),

    #[error("[L2_DEFINITION_FAULT]: EMPTY_RULE_REFERENCE -> step '{0}'")]
    EmptyRuleReference(String),

    #[error("[L2_DEFINITION_FAULT]: FIRE_AND_FORGET_CANNOT_FAIL -> step '{0}'")]
    FireAndForgetWithFailPolicy(String),
}

impl ProcessDefinition {
    /**
     * Certifica los invariantes estructurales de la definición:
     * nombres únicos, referencias de regla presentes y la implicación
     * `fire_and_forget => on_error != fail`.
     */
    pub fn validate(&self) -> Result<(), DefinitionViolation> {
        let mut observed_step_names = std::collections::BTreeSet::new();

        for definition in self.iter_step_definitions() {
            if !observed_step_names.insert(definition.name.clone()) {
                return Err(DefinitionViolation::DuplicateStepName(definition.name.clone()));
            }
            if definition.rule.trim().is_empty() {
                return Err(DefinitionViolation::EmptyRuleReference(definition.name.clone()));
            }
            if definition.fire_and_forget && definition.on_error == OnErrorPolicy::Fail {
                return Err(DefinitionViolation::FireAndForgetWithFailPolicy(
                    definition.name.clone(),
                ));
            }
        }

        Ok(())
    }

    /// Recorre todas las definiciones secuenciales, aplanando grupos paralelos.
    pub fn iter_step_definitions(&self) -> impl Iterator<Item = &StepDefinition> {
        self.steps.iter().flat_map(|node| match node {
            StepNode::Sequential(definition) => std::slice::from_ref(definition).iter(),
            StepNode::Parallel { members } => members.iter(),
        })
    }
}

// ---------------------------------------------------------------------------
// BUILDER FLUIDO (DSL de autoría de procesos)
// ---------------------------------------------------------------------------

/**
 * Constructor fluido de pasos secuenciales.
 *
 * ```
 * use appos_domain_models::process::{step, parallel, OnErrorPolicy};
 *
 * let steps = vec![
 *     step("validate", "validate_customer").seal(),
 *     parallel(vec![
 *         step("email", "send_welcome").fire_and_forget().on_error(OnErrorPolicy::Skip),
 *         step("notify", "notify_sales").fire_and_forget().on_error(OnErrorPolicy::Skip),
 *     ]),
 * ];
 * ```
 */
#[derive(Debug, Clone)]
pub struct StepBuilder {
    definition: StepDefinition,
}

/// Abre la construcción de un paso secuencial enlazado a una regla.
pub fn step(step_name: &str, rule_reference: &str) -> StepBuilder {
    StepBuilder {
        definition: StepDefinition {
            name: step_name.to_string(),
            rule: rule_reference.to_string(),
            input_mapping: None,
            output_mapping: None,
            retry_count: 0,
            retry_delay_seconds: 5,
            condition: None,
            on_error: OnErrorPolicy::Fail,
            fire_and_forget: false,
            log_inputs: false,
            log_outputs: false,
        },
    }
}

/// Agrupa pasos secuenciales ya construidos en un nodo paralelo.
/// El anidamiento de paralelos es estructuralmente imposible por firma.
pub fn parallel(member_builders: Vec<StepBuilder>) -> StepNode {
    StepNode::Parallel {
        members: member_builders
            .into_iter()
            .map(|builder| builder.definition)
            .collect(),
    }
}

impl StepBuilder {
    /// Enlaza un parámetro de la regla a una variable del proceso.
    pub fn input(mut self, rule_parameter: &str, process_variable: &str) -> Self {
        self.definition
            .input_mapping
            .get_or_insert_with(BTreeMap::new)
            .insert(rule_parameter.to_string(), process_variable.to_string());
        self
    }

    /// Enlaza una salida de la regla a una variable del proceso.
    pub fn output(mut self, rule_output: &str, process_variable: &str) -> Self {
        self.definition
            .output_mapping
            .get_or_insert_with(BTreeMap::new)
            .insert(rule_output.to_string(), process_variable.to_string());
        self
    }

    /// Configura el régimen de reintentos de espera fija.
    pub fn retry(mut self, additional_attempts: u32, delay_seconds: u64) -> Self {
        self.definition.retry_count = additional_attempts;
        self.definition.retry_delay_seconds = delay_seconds;
        self
    }

    /// Condición de ejecución evaluada contra el ámbito de variables.
    pub fn condition(mut self, condition_expression: &str) -> Self {
        self.definition.condition = Some(condition_expression.to_string());
        self
    }

    pub fn on_error(mut self, policy: OnErrorPolicy) -> Self {
        self.definition.on_error = policy;
        self
    }

    pub fn fire_and_forget(mut self) -> Self {
        self.definition.fire_and_forget = true;
        self
    }

    pub fn log_inputs(mut self) -> Self {
        self.definition.log_inputs = true;
        self
    }

    pub fn log_outputs(mut self) -> Self {
        self.definition.log_outputs = true;
        self
    }

    /// Sella el paso como nodo secuencial de la definición.
    pub fn seal(self) -> StepNode {
        StepNode::Sequential(self.definition)
    }

    /// Acceso directo a la definición (consumido por `parallel`).
    pub fn into_definition(self) -> StepDefinition {
        self.definition
    }
}
