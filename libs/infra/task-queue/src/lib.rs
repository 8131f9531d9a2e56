// INICIO DEL ARCHIVO [libs/infra/task-queue/src/lib.rs]
/*!
 * =================================================================
 * APARATO: TASK QUEUE ENGINE (V3.1 - AT-LEAST-ONCE POOL)
 * CLASIFICACIÓN: INFRASTRUCTURE LAYER (ESTRATO L3)
 * RESPONSABILIDAD: ENCOLADO CONFIABLE Y POOL DE WORKERS ACOTADO
 *
 * VISION HIPER-HOLÍSTICA 2026:
 * 1. CONTRACT FIRST: 'TaskQueue' es la interfaz consumida por el motor;
 *    la implementación en proceso sirve despliegues de un solo nodo y
 *    el Proving Grounds. Un broker externo puede sustituirla sin tocar
 *    el ejecutor.
 * 2. AT-LEAST-ONCE: Un fallo transitorio del handler re-entrega la tarea
 *    hasta el techo de la cola, independiente del presupuesto de
 *    reintentos del paso.
 * 3. BOUNDED CONCURRENCY: Un semáforo acota los workers simultáneos
 *    (default 4). El orden dentro de una cadena secuencial emerge del
 *    encolado-tras-completar del ejecutor.
 *
 * # Mathematical Proof (Serialized Chains):
 * Sea C una cadena secuencial de tareas t1..tn donde t(k+1) solo se
 * encola al completar t(k). Aunque el pool procese N instancias en
 * paralelo, dentro de C existe a lo sumo una tarea viva, por lo que el
 * orden de definición se preserva sin candados entre workers.
 * =================================================================
 */

use async_trait::async_trait;
use futures::future::BoxFuture;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{mpsc, Notify, Semaphore};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

/// Concurrencia por nodo recomendada por la plataforma.
pub const DEFAULT_WORKER_CONCURRENCY: usize = 4;
/// Techo de re-entregas de la cola ante fallos transitorios del handler.
const REDELIVERY_CEILING: u32 = 3;
/// Pausa fija entre re-entregas de la cola.
const REDELIVERY_PAUSE: Duration = Duration::from_millis(250);

#[derive(Error, Debug)]
pub enum QueueError {
    /// Ninguna rutina registrada para el nombre de tarea entregado.
    #[error("[L3_QUEUE_FAULT]: HANDLER_MISSING -> {0}")]
    HandlerMissing(String),

    /// El canal interno de transmisión colapsó (apagado del proceso).
    #[error("[L3_QUEUE_FAULT]: CHANNEL_COLLAPSED")]
    ChannelCollapsed,

    /// Perturbación transitoria: la cola re-entrega hasta su techo.
    #[error("[L3_QUEUE_FAULT]: TRANSIENT_DISTURBANCE -> {0}")]
    Transient(String),

    /// Fallo permanente del handler: la tarea muere con rastro forense.
    #[error("[L3_QUEUE_FAULT]: PERMANENT_COLLAPSE -> {0}")]
    Permanent(String),
}

/// Opciones de encolado del contrato de plataforma.
#[derive(Debug, Clone)]
pub struct EnqueueOptions {
    /// Cola nominal destino (particionado lógico, no prioridad).
    pub queue: String,
    /// Retraso de visibilidad antes de la primera entrega.
    pub delay: Option<Duration>,
}

impl Default for EnqueueOptions {
    fn default() -> Self {
        Self {
            queue: "process_steps".to_string(),
            delay: None,
        }
    }
}

/// Rutina asíncrona registrada para un nombre de tarea.
pub type TaskHandler =
    Arc<dyn Fn(Value) -> BoxFuture<'static, Result<(), QueueError>> + Send + Sync>;

/// Sobre interno de entrega con contador de re-entregas.
#[derive(Clone)]
struct TaskEnvelope {
    task_id: String,
    task_name: String,
    payload: Value,
    queue: String,
    delay: Option<Duration>,
    delivery_attempt: u32,
}

/// Interfaz consumida de encolado confiable con entrega at-least-once.
#[async_trait]
pub trait TaskQueue: Send + Sync {
    async fn enqueue(
        &self,
        task_name: &str,
        payload: Value,
        options: EnqueueOptions,
    ) -> Result<(), QueueError>;

    fn register_handler(&self, task_name: &str, handler: TaskHandler);
}

/**
 * Implementación en proceso: alimentador mpsc + despachador + semáforo.
 */
pub struct MemoryTaskQueue {
    transmission_sender: mpsc::UnboundedSender<TaskEnvelope>,
    reception_receiver: Mutex<Option<mpsc::UnboundedReceiver<TaskEnvelope>>>,
    handler_table: RwLock<HashMap<String, TaskHandler>>,
    shutdown_beacon: Arc<Notify>,
}

impl MemoryTaskQueue {
    pub fn new() -> Arc<Self> {
        let (sender, receiver) = mpsc::unbounded_channel();

        Arc::new(Self {
            transmission_sender: sender,
            reception_receiver: Mutex::new(Some(receiver)),
            handler_table: RwLock::new(HashMap::new()),
            shutdown_beacon: Arc::new(Notify::new()),
        })
    }

    /**
     * Enciende el despachador y el pool de workers acotado.
     *
     * # Panics:
     * Si el pool ya fue encendido (el receptor interno ya fue tomado).
     */
    #[instrument(skip(self))]
    pub fn ignite_worker_pool(self: Arc<Self>, worker_concurrency: usize) -> JoinHandle<()> {
        let mut reception_receiver = self
            .reception_receiver
            .lock()
            .expect("FATAL: Queue receiver lock poisoned.")
            .take()
            .expect("FATAL: Worker pool already ignited.");

        let queue_reference = Arc::clone(&self);
        let concurrency_semaphore = Arc::new(Semaphore::new(worker_concurrency.max(1)));
        let shutdown_beacon = Arc::clone(&self.shutdown_beacon);

        info!("🏭 [TASK_QUEUE]: Worker pool ignited (concurrency = {}).", worker_concurrency.max(1));

        tokio::spawn(async move {
            loop {
                let next_envelope = tokio::select! {
                    delivered = reception_receiver.recv() => delivered,
                    _ = shutdown_beacon.notified() => {
                        info!("🌙 [TASK_QUEUE]: Shutdown beacon received. Dispatcher draining out.");
                        break;
                    }
                };

                let Some(task_envelope) = next_envelope else {
                    break;
                };

                let concurrency_permit = match Arc::clone(&concurrency_semaphore).acquire_owned().await {
                    Ok(permit) => permit,
                    Err(_) => break,
                };

                let queue_for_worker = Arc::clone(&queue_reference);
                tokio::spawn(async move {
                    queue_for_worker.deliver_envelope(task_envelope).await;
                    drop(concurrency_permit);
                });
            }
        })
    }

    /// Apaga el despachador; las tareas en vuelo terminan su entrega.
    pub fn shutdown(&self) {
        self.shutdown_beacon.notify_waiters();
    }

    /**
     * Entrega un sobre a su handler con disciplina at-least-once.
     */
    async fn deliver_envelope(&self, task_envelope: TaskEnvelope) {
        if let Some(visibility_delay) = task_envelope.delay {
            tokio::time::sleep(visibility_delay).await;
        }

        let resolved_handler = self
            .handler_table
            .read()
            .expect("FATAL: Handler table lock poisoned.")
            .get(&task_envelope.task_name)
            .cloned();

        let Some(task_handler) = resolved_handler else {
            error!(
                "💀 [TASK_QUEUE]: No handler for task [{}] (id {}). Delivery dropped.",
                task_envelope.task_name, task_envelope.task_id
            );
            return;
        };

        debug!(
            "📦 [TASK_QUEUE]: Delivering [{}] (id {}, queue {}, delivery {}).",
            task_envelope.task_name, task_envelope.task_id, task_envelope.queue, task_envelope.delivery_attempt
        );

        match task_handler(task_envelope.payload.clone()).await {
            Ok(()) => {
                // Ack implícito: la entrega muere con éxito.
            }
            Err(QueueError::Transient(disturbance_detail)) => {
                if task_envelope.delivery_attempt < REDELIVERY_CEILING {
                    warn!(
                        "♻️  [TASK_QUEUE]: Transient fault on [{}] (id {}): {}. Redelivering ({}/{}).",
                        task_envelope.task_name,
                        task_envelope.task_id,
                        disturbance_detail,
                        task_envelope.delivery_attempt + 1,
                        REDELIVERY_CEILING
                    );

                    let redelivery_envelope = TaskEnvelope {
                        delivery_attempt: task_envelope.delivery_attempt + 1,
                        delay: Some(REDELIVERY_PAUSE),
                        ..task_envelope
                    };

                    if self.transmission_sender.send(redelivery_envelope).is_err() {
                        error!("💀 [TASK_QUEUE]: Redelivery channel collapsed.");
                    }
                } else {
                    error!(
                        "💀 [TASK_QUEUE]: Task [{}] (id {}) exhausted queue redeliveries: {}",
                        task_envelope.task_name, task_envelope.task_id, disturbance_detail
                    );
                }
            }
            Err(handler_fault) => {
                error!(
                    "💀 [TASK_QUEUE]: Task [{}] (id {}) died permanently: {}",
                    task_envelope.task_name, task_envelope.task_id, handler_fault
                );
            }
        }
    }
}

#[async_trait]
impl TaskQueue for MemoryTaskQueue {
    async fn enqueue(
        &self,
        task_name: &str,
        payload: Value,
        options: EnqueueOptions,
    ) -> Result<(), QueueError> {
        let task_envelope = TaskEnvelope {
            task_id: Uuid::new_v4().to_string(),
            task_name: task_name.to_string(),
            payload,
            queue: options.queue,
            delay: options.delay,
            delivery_attempt: 1,
        };

        self.transmission_sender
            .send(task_envelope)
            .map_err(|_| QueueError::ChannelCollapsed)
    }

    fn register_handler(&self, task_name: &str, handler: TaskHandler) {
        self.handler_table
            .write()
            .expect("FATAL: Handler table lock poisoned.")
            .insert(task_name.to_string(), handler);
        debug!("🧩 [TASK_QUEUE]: Handler inscribed for [{}].", task_name);
    }
}

// FIN DEL ARCHIVO [libs/infra/task-queue/src/lib.rs]
