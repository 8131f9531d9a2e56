// [libs/domain/engine/src/registry.rs]
/*!
 * =================================================================
 * APARATO: OBJECT REGISTRY (V5.2 - TYPED HANDLES)
 * CLASIFICACIÓN: DOMAIN SERVICES (ESTRATO L2)
 * RESPONSABILIDAD: RESOLUCIÓN DE REFERENCIAS A MANEJADORES TIPADOS
 *
 * VISION HIPER-HOLÍSTICA 2026:
 * 1. TAGGED DISPATCH: La tabla de llamadas se indexa por el tipo del
 *    objeto; el despacho dinámico por nombre punteado cruza la frontera
 *    como documento JSON sin esquema.
 * 2. BLUEPRINT DUALITY: Los dos perfiles de manejador de proceso del DSL
 *    (aridad cero vs receptor de inputs) se expresan como variantes
 *    nominales de 'ProcessBlueprint'.
 * 3. LOCK DISCIPLINE: Escrituras raras (arranque, hot-reload) bajo un
 *    RwLock único; las lecturas dominan y clonan Arc, no objetos.
 * =================================================================
 */

use crate::errors::EngineError;
use appos_domain_models::process::{ProcessMetadata, StepNode};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};
use tracing::debug;

/// Etiqueta de tipo de los objetos declarables de la plataforma.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectType {
    Rule,
    Process,
    Record,
    ConnectedSystem,
    Document,
    Interface,
}

impl ObjectType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Rule => "rule",
            Self::Process => "process",
            Self::Record => "record",
            Self::ConnectedSystem => "connected_system",
            Self::Document => "document",
            Self::Interface => "interface",
        }
    }
}

/// Unidad ejecutable opaca direccionada por referencia punteada.
#[async_trait]
pub trait RuleExecutable: Send + Sync {
    async fn execute(&self, inputs: Value) -> Result<Value, EngineError>;
}

/// Adaptador para reglas síncronas expresadas como cierres puros.
struct SynchronousRule<F>
where
    F: Fn(Value) -> Result<Value, EngineError> + Send + Sync,
{
    rule_body: F,
}

#[async_trait]
impl<F> RuleExecutable for SynchronousRule<F>
where
    F: Fn(Value) -> Result<Value, EngineError> + Send + Sync,
{
    async fn execute(&self, inputs: Value) -> Result<Value, EngineError> {
        (self.rule_body)(inputs)
    }
}

/// Eleva un cierre síncrono a la costura asíncrona de reglas.
pub fn rule_fn<F>(rule_body: F) -> Arc<dyn RuleExecutable>
where
    F: Fn(Value) -> Result<Value, EngineError> + Send + Sync + 'static,
{
    Arc::new(SynchronousRule { rule_body })
}

/**
 * Manejador de proceso: produce la lista de pasos bajo demanda.
 *
 * Los blueprints DEBEN ser deterministas: el ejecutor re-invoca el
 * blueprint en cada despacho y el índice del paso es el contrato entre
 * el encolado y la ejecución.
 */
#[derive(Clone)]
pub enum ProcessBlueprint {
    /// Perfil de aridad cero: la definición no depende de los inputs.
    Fixed(Arc<dyn Fn() -> Vec<StepNode> + Send + Sync>),
    /// Perfil parametrizado: la definición lee el mapa de inputs.
    Parameterized(Arc<dyn Fn(&Value) -> Vec<StepNode> + Send + Sync>),
}

impl ProcessBlueprint {
    /// Materializa la lista de pasos para los inputs dados.
    pub fn materialize(&self, inputs: &Value) -> Vec<StepNode> {
        match self {
            Self::Fixed(builder) => builder(),
            Self::Parameterized(builder) => builder(inputs),
        }
    }
}

/// Manejador tipado adjunto a un objeto registrado.
#[derive(Clone)]
pub enum ObjectHandler {
    Rule(Arc<dyn RuleExecutable>),
    Process(ProcessBlueprint),
    /// Tipos cuyo manejador vive fuera del núcleo (records, documentos, UI).
    Opaque,
}

/// Entrada resuelta del registro: tipo + manejador + metadatos.
#[derive(Clone)]
pub struct RegisteredObject {
    pub reference: String,
    pub object_type: ObjectType,
    /// Primer segmento punteado de la referencia.
    pub app_name: String,
    pub metadata: ProcessMetadata,
    pub handler: ObjectHandler,
}

impl std::fmt::Debug for RegisteredObject {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("RegisteredObject")
            .field("reference", &self.reference)
            .field("object_type", &self.object_type)
            .field("app_name", &self.app_name)
            .finish()
    }
}

/// Interfaz consumida de resolución de objetos. La implementación de
/// producción la entrega el escáner de fuentes de la plataforma.
pub trait ObjectRegistry: Send + Sync {
    fn resolve(&self, reference: &str) -> Option<Arc<RegisteredObject>>;
    /// Vista inmutable de todos los objetos (para el escaneo de triggers).
    fn snapshot(&self) -> Vec<Arc<RegisteredObject>>;
}

/**
 * Registro en memoria: la implementación de referencia usada por el
 * kernel y por el Proving Grounds.
 */
#[derive(Default)]
pub struct InMemoryObjectRegistry {
    registered_objects: RwLock<BTreeMap<String, Arc<RegisteredObject>>>,
}

impl InMemoryObjectRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inscribe un objeto completo; reemplaza cualquier entrada previa.
    pub fn register(&self, object: RegisteredObject) {
        debug!("📚 [REGISTRY]: Object [{}] inscribed as {}.", object.reference, object.object_type.as_str());
        self.registered_objects
            .write()
            .expect("FATAL: Registry lock poisoned.")
            .insert(object.reference.clone(), Arc::new(object));
    }

    /// Inscribe una regla ejecutable con metadatos mínimos.
    pub fn register_rule(&self, reference: &str, executable: Arc<dyn RuleExecutable>) {
        self.register(RegisteredObject {
            reference: reference.to_string(),
            object_type: ObjectType::Rule,
            app_name: leading_segment(reference),
            metadata: ProcessMetadata {
                name: trailing_segment(reference),
                ..ProcessMetadata::default()
            },
            handler: ObjectHandler::Rule(executable),
        });
    }

    /// Inscribe un proceso con su blueprint y metadatos declarativos.
    pub fn register_process(
        &self,
        reference: &str,
        metadata: ProcessMetadata,
        blueprint: ProcessBlueprint,
    ) {
        self.register(RegisteredObject {
            reference: reference.to_string(),
            object_type: ObjectType::Process,
            app_name: leading_segment(reference),
            metadata,
            handler: ObjectHandler::Process(blueprint),
        });
    }

    pub fn clear(&self) {
        self.registered_objects
            .write()
            .expect("FATAL: Registry lock poisoned.")
            .clear();
    }

    pub fn count(&self) -> usize {
        self.registered_objects
            .read()
            .expect("FATAL: Registry lock poisoned.")
            .len()
    }
}

impl ObjectRegistry for InMemoryObjectRegistry {
    fn resolve(&self, reference: &str) -> Option<Arc<RegisteredObject>> {
        self.registered_objects
            .read()
            .expect("FATAL: Registry lock poisoned.")
            .get(reference)
            .cloned()
    }

    fn snapshot(&self) -> Vec<Arc<RegisteredObject>> {
        self.registered_objects
            .read()
            .expect("FATAL: Registry lock poisoned.")
            .values()
            .cloned()
            .collect()
    }
}

/// Primer segmento punteado de una referencia (`crm.processes.x` -> `crm`).
pub fn leading_segment(reference: &str) -> String {
    reference.split('.').next().unwrap_or_default().to_string()
}

/// Último segmento punteado de una referencia.
pub fn trailing_segment(reference: &str) -> String {
    reference.rsplit('.').next().unwrap_or_default().to_string()
}
