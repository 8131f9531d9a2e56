// INICIO DEL ARCHIVO [apps/orchestrator/src/services/executor.rs]
/*!
 * =================================================================
 * APARATO: PROCESS EXECUTOR (V5.6 - SOVEREIGN STEP ENGINE)
 * CLASIFICACIÓN: APPLICATION SERVICES (ESTRATO L4)
 * RESPONSABILIDAD: CICLO DE VIDA COMPLETO DE INSTANCIAS DE PROCESO
 *
 * VISION HIPER-HOLÍSTICA 2026:
 * 1. INDEX CONTRACT: Los blueprints son deterministas; el task de paso
 *    transporta (instancia, proceso, índice) y el worker re-materializa
 *    la definición en cada despacho.
 * 2. RETRY DOCTRINE: Cada intento deja su propia fila en la bitácora.
 *    Las violaciones de seguridad jamás entran al bucle de reintentos;
 *    el resto respeta el presupuesto del paso con pausa fija.
 * 3. FAN-IN BARRIER: Los grupos paralelos convergen por un contador
 *    (instancia, índice). Los miembros fire-and-forget no bloquean.
 * 4. TERMINAL DISCIPLINE: Los workers consultan el estado en cada
 *    frontera de paso y descartan tareas de instancias selladas.
 *
 * # Mathematical Proof (Durable History Pairing):
 * Toda transición toca o bien la fila de instancia, o bien una fila de
 * bitácora, o ambas dentro de una transacción (sellado con variables).
 * Bajo entregas at-least-once, la llave natural (instancia, paso,
 * intento) colapsa duplicados y la historia converge a un único rastro.
 * =================================================================
 */

use appos_domain_engine::{
    evaluate_condition, AuditRecord, AuditSink, Clock, DispatchReason, EngineError, ObjectHandler,
    ObjectRegistry, PolicyOracle, RuleDispatcher,
};
use appos_domain_models::{
    InstanceDescriptor, InstanceStatus, OnErrorPolicy, ProcessDefinition, ProcessInstanceRecord,
    StepDefinition, StepLogRecord, StepNode, StepStatus,
};
use appos_infra_db::{InstanceRepository, StepLogRepository};
use appos_infra_queue::{EnqueueOptions, QueueError, TaskQueue};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing::{debug, error, info, instrument, warn};

/// Nombre nominal del task de ejecución de paso en la cola.
pub const STEP_TASK_NAME: &str = "appos.process.execute_step";

/// Carga del task de paso: el contrato entre encolado y ejecución.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepTask {
    pub instance_id: String,
    pub process_ref: String,
    pub step_index: usize,
    /// Índice del miembro dentro de un grupo paralelo, si aplica.
    pub parallel_member: Option<usize>,
}

/// Veredicto interno de la ejecución de un paso individual.
#[derive(Debug, Clone, PartialEq, Eq)]
enum StepOutcome {
    Completed,
    Skipped,
    Failed {
        policy: OnErrorPolicy,
        kind_label: &'static str,
        detail: String,
    },
    /// La instancia selló (failed/cancelled) antes del resultado.
    Interrupted,
}

/**
 * Ejecutor soberano de procesos: arranque, despacho de pasos, barrera
 * de convergencia paralela y acciones administrativas.
 */
pub struct ProcessExecutor {
    object_registry: Arc<dyn ObjectRegistry>,
    rule_dispatcher: RuleDispatcher,
    instance_repository: Arc<InstanceRepository>,
    step_log_repository: Arc<StepLogRepository>,
    task_queue: Arc<dyn TaskQueue>,
    system_clock: Arc<dyn Clock>,
    audit_sink: Arc<dyn AuditSink>,
    /// Barreras de fan-in vivas, llaveadas por (instancia, índice de grupo).
    parallel_barriers: Mutex<HashMap<(String, usize), usize>>,
}

impl ProcessExecutor {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        object_registry: Arc<dyn ObjectRegistry>,
        policy_oracle: Arc<dyn PolicyOracle>,
        instance_repository: Arc<InstanceRepository>,
        step_log_repository: Arc<StepLogRepository>,
        task_queue: Arc<dyn TaskQueue>,
        system_clock: Arc<dyn Clock>,
        audit_sink: Arc<dyn AuditSink>,
    ) -> Arc<Self> {
        let rule_dispatcher = RuleDispatcher::new(Arc::clone(&object_registry), policy_oracle);

        Arc::new(Self {
            object_registry,
            rule_dispatcher,
            instance_repository,
            step_log_repository,
            task_queue,
            system_clock,
            audit_sink,
            parallel_barriers: Mutex::new(HashMap::new()),
        })
    }

    /// Inscribe la rutina del task de paso en la cola de la plataforma.
    pub fn register_task_handlers(self: Arc<Self>) {
        let executor_reference = Arc::clone(&self);

        self.task_queue.register_handler(
            STEP_TASK_NAME,
            Arc::new(move |task_payload| {
                let executor_for_task = Arc::clone(&executor_reference);
                Box::pin(async move {
                    let step_task: StepTask = serde_json::from_value(task_payload)
                        .map_err(|fault| QueueError::Permanent(format!("MALFORMED_STEP_TASK: {}", fault)))?;
                    executor_for_task.execute_step_task(step_task).await
                })
            }),
        );
    }

    // -------------------------------------------------------------------
    // ARRANQUE DE INSTANCIAS
    // -------------------------------------------------------------------

    /**
     * Arranca una nueva instancia del proceso referenciado.
     *
     * # Errors:
     * Solo fallos de registro/validación alcanzan al llamador; todo
     * fallo a nivel de paso se refleja en el estado de la instancia.
     */
    #[instrument(skip(self, inputs), fields(process = %process_ref, user = %user_id))]
    pub async fn start_process(
        &self,
        process_ref: &str,
        inputs: Value,
        user_id: &str,
        async_execution: bool,
    ) -> Result<InstanceDescriptor, EngineError> {
        let definition = self.materialize_definition(process_ref, &inputs)?;
        definition.validate()?;

        let instance_id = generate_instance_id();
        let ignition_moment = self.system_clock.now();
        let is_empty_process = definition.steps.is_empty();

        let process_name = if definition.metadata.name.is_empty() {
            process_ref.rsplit('.').next().unwrap_or(process_ref).to_string()
        } else {
            definition.metadata.name.clone()
        };

        let genesis_record = ProcessInstanceRecord {
            instance_id: instance_id.clone(),
            process_ref: process_ref.to_string(),
            process_name,
            app_name: process_ref.split('.').next().unwrap_or_default().to_string(),
            display_name: (!definition.metadata.display_name.is_empty())
                .then(|| definition.metadata.display_name.clone()),
            // Proceso vacío: sella como completada de inmediato.
            status: if is_empty_process { InstanceStatus::Completed } else { InstanceStatus::Running },
            current_step: None,
            inputs,
            variables: json!({}),
            variable_visibility: json!({}),
            outputs: is_empty_process.then(|| json!({})),
            error_info: None,
            started_at: ignition_moment,
            completed_at: is_empty_process.then(|| ignition_moment),
            started_by: user_id.to_string(),
            triggered_by: Some(process_ref.to_string()),
        };

        self.instance_repository
            .insert_instance(&genesis_record)
            .await
            .map_err(db_transient)?;

        info!(
            "🚀 [EXECUTOR]: Process {} -> instance {} ({} steps, async={}).",
            process_ref,
            instance_id,
            definition.steps.len(),
            async_execution
        );
        self.audit_sink.emit(AuditRecord::now(
            "executor",
            "instance.started",
            &instance_id,
            json!({"process_ref": process_ref, "started_by": user_id}),
        ));

        if !is_empty_process {
            if async_execution {
                self.enqueue_step(&instance_id, process_ref, 0, None).await?;
            } else {
                self.run_steps_synchronously(&instance_id, process_ref).await?;
            }
        }

        Ok(InstanceDescriptor::from(&genesis_record))
    }

    // -------------------------------------------------------------------
    // DESPACHO DE PASOS (WORKER)
    // -------------------------------------------------------------------

    /**
     * Rutina del worker: ejecuta el task de paso entregado por la cola.
     * Los fallos de infraestructura emergen como transitorios para que
     * la cola re-entregue; la lógica de pasos se resuelve internamente.
     */
    #[instrument(skip(self), fields(instance = %step_task.instance_id, index = step_task.step_index))]
    pub async fn execute_step_task(&self, step_task: StepTask) -> Result<(), QueueError> {
        match self.execute_step_task_internal(&step_task).await {
            Ok(()) => Ok(()),
            Err(EngineError::Transient(disturbance_detail)) => {
                Err(QueueError::Transient(disturbance_detail))
            }
            Err(permanent_fault) => {
                error!("💀 [EXECUTOR]: Step task collapsed permanently: {}", permanent_fault);
                Err(QueueError::Permanent(permanent_fault.to_string()))
            }
        }
    }

    async fn execute_step_task_internal(&self, step_task: &StepTask) -> Result<(), EngineError> {
        // 1. RECARGA DE INSTANCIA (frontera de paso)
        let Some(instance_record) = self
            .instance_repository
            .fetch_instance(&step_task.instance_id)
            .await
            .map_err(db_transient)?
        else {
            error!("👻 [EXECUTOR]: Instance {} vanished. Task dropped.", step_task.instance_id);
            return Ok(());
        };

        if instance_record.status.is_terminal() {
            debug!("🛑 [EXECUTOR]: Instance {} already sealed. Task dropped.", instance_record.instance_id);
            return Ok(());
        }
        if instance_record.status == InstanceStatus::Paused {
            debug!("⏸️  [EXECUTOR]: Instance {} paused. Task held for resume.", instance_record.instance_id);
            return Ok(());
        }

        // 2. RE-MATERIALIZACIÓN DE LA DEFINICIÓN (contrato de índice)
        let definition =
            self.materialize_definition(&step_task.process_ref, &instance_record.inputs)?;

        if step_task.step_index >= definition.steps.len() {
            return self.finalize_instance(&step_task.instance_id).await;
        }

        match (&definition.steps[step_task.step_index], step_task.parallel_member) {
            (StepNode::Parallel { members }, None) => {
                self.open_parallel_group(&instance_record, step_task, members, definition.steps.len())
                    .await
            }
            (StepNode::Parallel { members }, Some(member_index)) => {
                let Some(member_definition) = members.get(member_index) else {
                    error!("👻 [EXECUTOR]: Parallel member {} out of contract. Task dropped.", member_index);
                    return Ok(());
                };
                self.run_parallel_member(
                    &instance_record,
                    step_task,
                    member_definition,
                    definition.steps.len(),
                )
                .await
            }
            (StepNode::Sequential(step_definition), _) => {
                self.run_sequential_node(&instance_record, step_task, step_definition, definition.steps.len())
                    .await
            }
        }
    }

    /// Nodo secuencial: ejecutar, decidir política, avanzar la cadena.
    async fn run_sequential_node(
        &self,
        instance_record: &ProcessInstanceRecord,
        step_task: &StepTask,
        step_definition: &StepDefinition,
        total_steps: usize,
    ) -> Result<(), EngineError> {
        self.instance_repository
            .update_current_step(&instance_record.instance_id, &step_definition.name)
            .await
            .map_err(db_transient)?;

        let step_outcome = self
            .run_single_step(instance_record, step_definition, false)
            .await?;

        match step_outcome {
            StepOutcome::Failed { policy: OnErrorPolicy::Fail, kind_label, detail } => {
                self.seal_instance_failure(&instance_record.instance_id, step_definition, kind_label, &detail)
                    .await
            }
            StepOutcome::Interrupted => Ok(()),
            _ => {
                self.advance_chain(
                    &instance_record.instance_id,
                    &step_task.process_ref,
                    step_task.step_index + 1,
                    total_steps,
                )
                .await
            }
        }
    }

    /// Apertura de grupo paralelo: barrera + despacho simultáneo de miembros.
    async fn open_parallel_group(
        &self,
        instance_record: &ProcessInstanceRecord,
        step_task: &StepTask,
        members: &[StepDefinition],
        total_steps: usize,
    ) -> Result<(), EngineError> {
        let group_label = StepNode::Parallel { members: members.to_vec() }.display_name();
        self.instance_repository
            .update_current_step(&instance_record.instance_id, &group_label)
            .await
            .map_err(db_transient)?;

        let counted_member_total = members
            .iter()
            .filter(|member| !member.fire_and_forget)
            .count();

        self.parallel_barriers
            .lock()
            .expect("FATAL: Barrier lock poisoned.")
            .insert(
                (instance_record.instance_id.clone(), step_task.step_index),
                counted_member_total,
            );

        info!(
            "🔀 [EXECUTOR]: Parallel group [{}] opened ({} members, {} gating).",
            group_label,
            members.len(),
            counted_member_total
        );

        for (member_index, member_definition) in members.iter().enumerate() {
            if member_definition.fire_and_forget {
                // Marcador de despacho (intento 0): el miembro no bloquea la barrera.
                let mut dispatch_marker = StepLogRecord::skeleton(
                    &instance_record.instance_id,
                    &member_definition.name,
                    &member_definition.rule,
                    StepStatus::AsyncDispatched,
                    0,
                );
                dispatch_marker.started_at = self.system_clock.now();
                dispatch_marker.completed_at = Some(dispatch_marker.started_at);
                dispatch_marker.is_fire_and_forget = true;
                dispatch_marker.is_parallel = true;
                self.step_log_repository
                    .record_terminal_row(&dispatch_marker)
                    .await
                    .map_err(db_transient)?;
            }

            self.enqueue_step(
                &instance_record.instance_id,
                &step_task.process_ref,
                step_task.step_index,
                Some(member_index),
            )
            .await?;
        }

        if counted_member_total == 0 {
            // Grupo íntegramente fire-and-forget: la cadena no espera.
            self.barrier_discard(&instance_record.instance_id, step_task.step_index);
            self.advance_chain(
                &instance_record.instance_id,
                &step_task.process_ref,
                step_task.step_index + 1,
                total_steps,
            )
            .await?;
        }

        Ok(())
    }

    /// Miembro paralelo: ejecutar y converger por la barrera de fan-in.
    async fn run_parallel_member(
        &self,
        instance_record: &ProcessInstanceRecord,
        step_task: &StepTask,
        member_definition: &StepDefinition,
        total_steps: usize,
    ) -> Result<(), EngineError> {
        let step_outcome = self
            .run_single_step(instance_record, member_definition, true)
            .await?;

        match step_outcome {
            StepOutcome::Failed { policy: OnErrorPolicy::Fail, kind_label, detail }
                if !member_definition.fire_and_forget =>
            {
                // Un miembro bloqueante colapsó: la instancia muere y la
                // barrera se desecha; los miembros pendientes registrarán
                // 'interrupted' al completar.
                self.barrier_discard(&instance_record.instance_id, step_task.step_index);
                self.seal_instance_failure(&instance_record.instance_id, member_definition, kind_label, &detail)
                    .await
            }
            StepOutcome::Interrupted => Ok(()),
            _ => {
                if member_definition.fire_and_forget {
                    return Ok(());
                }

                let barrier_released = self.barrier_mark_member_complete(
                    &instance_record.instance_id,
                    step_task.step_index,
                );

                if barrier_released {
                    debug!("🧲 [EXECUTOR]: Fan-in barrier released at index {}.", step_task.step_index);
                    self.advance_chain(
                        &instance_record.instance_id,
                        &step_task.process_ref,
                        step_task.step_index + 1,
                        total_steps,
                    )
                    .await?;
                }
                Ok(())
            }
        }
    }

    // -------------------------------------------------------------------
    // EJECUCIÓN DE UN PASO INDIVIDUAL (CONDICIÓN + REINTENTOS + BITÁCORA)
    // -------------------------------------------------------------------

    /**
     * Ejecuta un paso con su condición, mapeos y presupuesto de reintentos.
     * Cada intento deja su propia fila en la bitácora durable.
     */
    async fn run_single_step(
        &self,
        instance_record: &ProcessInstanceRecord,
        step_definition: &StepDefinition,
        is_parallel: bool,
    ) -> Result<StepOutcome, EngineError> {
        // Estado fresco de variables: la fila pudo mutar desde el despacho.
        let fresh_instance = self
            .instance_repository
            .fetch_instance(&instance_record.instance_id)
            .await
            .map_err(db_transient)?
            .unwrap_or_else(|| instance_record.clone());

        // 1. CONDICIÓN (fail-open ante expresiones hostiles)
        if let Some(condition_expression) = &step_definition.condition {
            let condition_scope =
                build_condition_scope(&fresh_instance.inputs, &fresh_instance.variables);

            if !evaluate_condition(condition_expression, &condition_scope) {
                let mut skipped_row = StepLogRecord::skeleton(
                    &fresh_instance.instance_id,
                    &step_definition.name,
                    &step_definition.rule,
                    StepStatus::Skipped,
                    1,
                );
                skipped_row.started_at = self.system_clock.now();
                skipped_row.completed_at = Some(skipped_row.started_at);
                skipped_row.duration_ms = Some(0.0);
                skipped_row.is_parallel = is_parallel;
                skipped_row.is_fire_and_forget = step_definition.fire_and_forget;

                self.step_log_repository
                    .record_terminal_row(&skipped_row)
                    .await
                    .map_err(db_transient)?;

                info!("⏭️  [EXECUTOR]: Step '{}' skipped (condition not met).", step_definition.name);
                return Ok(StepOutcome::Skipped);
            }
        }

        // 2. CALIFICACIÓN DE LA REFERENCIA DE REGLA
        let effective_rule_ref = qualify_rule_reference(
            &step_definition.rule,
            &fresh_instance.process_ref,
        );

        // 3. CONSTRUCCIÓN DEL DOCUMENTO DE INPUTS
        let step_inputs = build_step_inputs(step_definition, &fresh_instance);

        // 4. BUCLE DE INTENTOS
        let total_attempt_budget = step_definition.retry_count + 1;

        for attempt_ordinal in 1..=total_attempt_budget {
            let mut attempt_row = StepLogRecord::skeleton(
                &fresh_instance.instance_id,
                &step_definition.name,
                &effective_rule_ref,
                StepStatus::Running,
                attempt_ordinal,
            );
            attempt_row.started_at = self.system_clock.now();
            attempt_row.is_parallel = is_parallel;
            attempt_row.is_fire_and_forget = step_definition.fire_and_forget;
            attempt_row.inputs = step_definition.log_inputs.then(|| step_inputs.clone());

            self.step_log_repository
                .open_attempt(&attempt_row)
                .await
                .map_err(db_transient)?;

            let attempt_chronometer = Instant::now();
            let dispatch_verdict = self
                .rule_dispatcher
                .dispatch_rule(&fresh_instance.started_by, &effective_rule_ref, step_inputs.clone())
                .await;
            let duration_ms = attempt_chronometer.elapsed().as_secs_f64() * 1000.0;

            // Forma incompatible con el mapeo de salidas => colapso del paso.
            let dispatch_verdict = match dispatch_verdict {
                Ok(rule_output)
                    if step_definition.output_mapping.is_some() && !rule_output.is_object() =>
                {
                    Err(EngineError::dispatch(
                        DispatchReason::BadShape,
                        format!(
                            "rule '{}' returned a non-mapping while output_mapping is declared",
                            effective_rule_ref
                        ),
                    ))
                }
                other_verdict => other_verdict,
            };

            // Frontera post-regla: ¿la instancia colapsó mientras corríamos?
            let live_status = self.fetch_instance_status(&fresh_instance.instance_id).await?;
            if matches!(live_status, Some(InstanceStatus::Failed | InstanceStatus::Cancelled)) {
                self.step_log_repository
                    .seal_attempt(
                        &fresh_instance.instance_id,
                        &step_definition.name,
                        attempt_ordinal,
                        StepStatus::Interrupted,
                        Some(duration_ms),
                        None,
                        None,
                    )
                    .await
                    .map_err(db_transient)?;
                return Ok(StepOutcome::Interrupted);
            }

            match dispatch_verdict {
                Ok(rule_output) => {
                    // 5. MAPEO DE SALIDAS -> VARIABLES (etiquetadas 'output')
                    let mut mutated_variables = fresh_instance.variables.clone();
                    let mut mutated_visibility = fresh_instance.variable_visibility.clone();
                    let mut variables_dirty = false;

                    if let (Some(output_mapping), Some(output_document)) =
                        (&step_definition.output_mapping, rule_output.as_object())
                    {
                        for (rule_output_name, process_variable_name) in output_mapping {
                            if let Some(mapped_value) = output_document.get(rule_output_name) {
                                ensure_object(&mut mutated_variables)
                                    .insert(process_variable_name.clone(), mapped_value.clone());
                                ensure_object(&mut mutated_visibility)
                                    .insert(process_variable_name.clone(), json!("output"));
                                variables_dirty = true;
                            }
                        }
                    }

                    let logged_outputs = step_definition.log_outputs.then(|| rule_output.clone());

                    if variables_dirty {
                        self.step_log_repository
                            .seal_success_with_variables(
                                &fresh_instance.instance_id,
                                &step_definition.name,
                                attempt_ordinal,
                                duration_ms,
                                logged_outputs.as_ref(),
                                &mutated_variables,
                                &mutated_visibility,
                            )
                            .await
                            .map_err(db_transient)?;
                    } else {
                        self.step_log_repository
                            .seal_attempt(
                                &fresh_instance.instance_id,
                                &step_definition.name,
                                attempt_ordinal,
                                StepStatus::Completed,
                                Some(duration_ms),
                                logged_outputs.as_ref(),
                                None,
                            )
                            .await
                            .map_err(db_transient)?;
                    }

                    info!(
                        "✅ [EXECUTOR]: Step '{}' completed in {:.1}ms (attempt {}).",
                        step_definition.name, duration_ms, attempt_ordinal
                    );
                    self.audit_sink.emit(AuditRecord::now(
                        "executor",
                        "step.completed",
                        &fresh_instance.instance_id,
                        json!({"step": step_definition.name, "attempt": attempt_ordinal}),
                    ));

                    return Ok(StepOutcome::Completed);
                }
                Err(rule_fault) => {
                    let fault_trace = format!("{:?}", rule_fault);
                    let error_document = json!({
                        "error": rule_fault.to_string(),
                        "type": rule_fault.kind_label(),
                        "trace": fault_trace,
                    });

                    self.step_log_repository
                        .seal_attempt(
                            &fresh_instance.instance_id,
                            &step_definition.name,
                            attempt_ordinal,
                            StepStatus::Failed,
                            Some(duration_ms),
                            None,
                            Some(&error_document),
                        )
                        .await
                        .map_err(db_transient)?;

                    let retry_budget_remains = attempt_ordinal <= step_definition.retry_count;

                    if retry_budget_remains && !rule_fault.is_security() {
                        warn!(
                            "♻️  [EXECUTOR]: Step '{}' failed (attempt {}/{}): {}. Retrying in {}s.",
                            step_definition.name,
                            attempt_ordinal,
                            total_attempt_budget,
                            rule_fault,
                            step_definition.retry_delay_seconds
                        );
                        self.system_clock
                            .sleep(Duration::from_secs(step_definition.retry_delay_seconds))
                            .await;
                        continue;
                    }

                    warn!(
                        "💥 [EXECUTOR]: Step '{}' exhausted its budget ({}): {}",
                        step_definition.name,
                        step_definition.on_error.as_str(),
                        rule_fault
                    );
                    self.audit_sink.emit(AuditRecord::now(
                        "executor",
                        "step.failed",
                        &fresh_instance.instance_id,
                        json!({"step": step_definition.name, "attempt": attempt_ordinal, "policy": step_definition.on_error.as_str()}),
                    ));

                    return Ok(StepOutcome::Failed {
                        policy: step_definition.on_error,
                        kind_label: rule_fault.kind_label(),
                        detail: rule_fault.to_string(),
                    });
                }
            }
        }

        // Inalcanzable: el bucle siempre retorna dentro del presupuesto.
        Ok(StepOutcome::Failed {
            policy: step_definition.on_error,
            kind_label: "DispatchError",
            detail: "retry budget exhausted".to_string(),
        })
    }

    // -------------------------------------------------------------------
    // AVANCE DE CADENA Y SELLADO
    // -------------------------------------------------------------------

    /// Encola el siguiente paso, o sella la instancia al agotar la lista.
    async fn advance_chain(
        &self,
        instance_id: &str,
        process_ref: &str,
        next_step_index: usize,
        total_steps: usize,
    ) -> Result<(), EngineError> {
        if next_step_index >= total_steps {
            return self.finalize_instance(instance_id).await;
        }

        let live_status = self.fetch_instance_status(instance_id).await?;
        match live_status {
            Some(status) if status.is_terminal() => {
                debug!("🛑 [EXECUTOR]: Chain halted; instance {} sealed.", instance_id);
                Ok(())
            }
            _ => self.enqueue_step(instance_id, process_ref, next_step_index, None).await,
        }
    }

    /// Sella la instancia como completada con sus outputs visibles.
    async fn finalize_instance(&self, instance_id: &str) -> Result<(), EngineError> {
        let Some(instance_record) = self
            .instance_repository
            .fetch_instance(instance_id)
            .await
            .map_err(db_transient)?
        else {
            return Ok(());
        };

        if instance_record.status.is_terminal() || instance_record.status == InstanceStatus::Paused {
            return Ok(());
        }

        let visible_outputs = instance_record.derive_visible_outputs();
        let sealed = self
            .instance_repository
            .complete_instance(instance_id, &visible_outputs)
            .await
            .map_err(db_transient)?;

        if sealed {
            self.audit_sink.emit(AuditRecord::now(
                "executor",
                "instance.completed",
                instance_id,
                json!({"outputs": visible_outputs}),
            ));
        }
        Ok(())
    }

    /// Sella la instancia como fallida con el rastro del paso culpable.
    async fn seal_instance_failure(
        &self,
        instance_id: &str,
        failed_step: &StepDefinition,
        fault_kind_label: &str,
        fault_detail: &str,
    ) -> Result<(), EngineError> {
        let error_document = json!({
            "error": fault_detail,
            "type": fault_kind_label,
            "failed_step": failed_step.name,
        });

        let sealed = self
            .instance_repository
            .fail_instance(instance_id, &error_document)
            .await
            .map_err(db_transient)?;

        if sealed {
            self.audit_sink.emit(AuditRecord::now(
                "executor",
                "instance.failed",
                instance_id,
                error_document,
            ));
        }
        Ok(())
    }

    // -------------------------------------------------------------------
    // MODO SÍNCRONO (utilidades y Proving Grounds)
    // -------------------------------------------------------------------

    /// Itera la lista completa de pasos en el hilo del llamador.
    async fn run_steps_synchronously(
        &self,
        instance_id: &str,
        process_ref: &str,
    ) -> Result<(), EngineError> {
        let mut step_index = 0usize;

        loop {
            let Some(instance_record) = self
                .instance_repository
                .fetch_instance(instance_id)
                .await
                .map_err(db_transient)?
            else {
                return Ok(());
            };

            if instance_record.status.is_terminal() {
                return Ok(());
            }

            let definition = self.materialize_definition(process_ref, &instance_record.inputs)?;

            if step_index >= definition.steps.len() {
                return self.finalize_instance(instance_id).await;
            }

            match &definition.steps[step_index] {
                StepNode::Sequential(step_definition) => {
                    self.instance_repository
                        .update_current_step(instance_id, &step_definition.name)
                        .await
                        .map_err(db_transient)?;

                    match self.run_single_step(&instance_record, step_definition, false).await? {
                        StepOutcome::Failed { policy: OnErrorPolicy::Fail, kind_label, detail } => {
                            return self
                                .seal_instance_failure(instance_id, step_definition, kind_label, &detail)
                                .await;
                        }
                        StepOutcome::Interrupted => return Ok(()),
                        _ => {}
                    }
                }
                StepNode::Parallel { members } => {
                    let group_label =
                        StepNode::Parallel { members: members.clone() }.display_name();
                    self.instance_repository
                        .update_current_step(instance_id, &group_label)
                        .await
                        .map_err(db_transient)?;

                    // En modo síncrono los miembros corren en secuencia.
                    for member_definition in members {
                        if member_definition.fire_and_forget {
                            let mut dispatch_marker = StepLogRecord::skeleton(
                                instance_id,
                                &member_definition.name,
                                &member_definition.rule,
                                StepStatus::AsyncDispatched,
                                0,
                            );
                            dispatch_marker.started_at = self.system_clock.now();
                            dispatch_marker.completed_at = Some(dispatch_marker.started_at);
                            dispatch_marker.is_fire_and_forget = true;
                            dispatch_marker.is_parallel = true;
                            self.step_log_repository
                                .record_terminal_row(&dispatch_marker)
                                .await
                                .map_err(db_transient)?;
                        }

                        let member_instance_view = self
                            .instance_repository
                            .fetch_instance(instance_id)
                            .await
                            .map_err(db_transient)?
                            .unwrap_or_else(|| instance_record.clone());

                        let member_outcome = self
                            .run_single_step(&member_instance_view, member_definition, true)
                            .await?;

                        match member_outcome {
                            StepOutcome::Failed { policy: OnErrorPolicy::Fail, kind_label, detail }
                                if !member_definition.fire_and_forget =>
                            {
                                return self
                                    .seal_instance_failure(instance_id, member_definition, kind_label, &detail)
                                    .await;
                            }
                            StepOutcome::Interrupted => return Ok(()),
                            _ => {}
                        }
                    }
                }
            }

            step_index += 1;
        }
    }

    // -------------------------------------------------------------------
    // OPERACIONES ADMINISTRATIVAS Y VISTAS
    // -------------------------------------------------------------------

    pub async fn get_instance(
        &self,
        instance_id: &str,
    ) -> Result<Option<ProcessInstanceRecord>, EngineError> {
        self.instance_repository
            .fetch_instance(instance_id)
            .await
            .map_err(db_transient)
    }

    pub async fn get_step_history(
        &self,
        instance_id: &str,
    ) -> Result<Vec<StepLogRecord>, EngineError> {
        self.step_log_repository
            .fetch_history(instance_id)
            .await
            .map_err(db_transient)
    }

    pub async fn list_instances(
        &self,
        app_name_filter: Option<&str>,
        status_filter: Option<InstanceStatus>,
        page_limit: u32,
        page_offset: u32,
    ) -> Result<Vec<ProcessInstanceRecord>, EngineError> {
        self.instance_repository
            .list_instances(app_name_filter, status_filter, page_limit, page_offset)
            .await
            .map_err(db_transient)
    }

    /**
     * Cancelación administrativa: sella la instancia y marca los pasos en
     * vuelo como interrumpidos; los workers descartan tareas posteriores.
     */
    #[instrument(skip(self))]
    pub async fn cancel(&self, instance_id: &str) -> Result<bool, EngineError> {
        let cancelled = self
            .instance_repository
            .cancel_instance(instance_id)
            .await
            .map_err(db_transient)?;

        if cancelled {
            self.audit_sink.emit(AuditRecord::now(
                "executor",
                "instance.cancelled",
                instance_id,
                json!({}),
            ));
        }
        Ok(cancelled)
    }

    /// Pausa administrativa: la instancia retiene en la próxima frontera.
    pub async fn pause(&self, instance_id: &str) -> Result<bool, EngineError> {
        let instance_view = self.get_instance(instance_id).await?;
        match instance_view {
            Some(record) if record.status == InstanceStatus::Running => self
                .instance_repository
                .transition_status(instance_id, InstanceStatus::Paused)
                .await
                .map_err(db_transient),
            _ => Ok(false),
        }
    }

    /**
     * Reanudación: re-encola el paso retenido (el sucesor del último
     * despachado) y devuelve la instancia a 'running'.
     */
    #[instrument(skip(self))]
    pub async fn resume(&self, instance_id: &str) -> Result<bool, EngineError> {
        let Some(instance_record) = self.get_instance(instance_id).await? else {
            return Ok(false);
        };
        if instance_record.status != InstanceStatus::Paused {
            return Ok(false);
        }

        let definition =
            self.materialize_definition(&instance_record.process_ref, &instance_record.inputs)?;

        let held_step_index = match &instance_record.current_step {
            None => 0,
            Some(last_dispatched_label) => {
                match definition
                    .steps
                    .iter()
                    .position(|node| &node.display_name() == last_dispatched_label)
                {
                    Some(found_index) => {
                        // Grupo paralelo pausado a mitad de convergencia:
                        // la barrera pendiente obliga a re-abrir el grupo.
                        if self.barrier_pending(&instance_record.instance_id, found_index) {
                            self.barrier_discard(&instance_record.instance_id, found_index);
                            found_index
                        } else {
                            found_index + 1
                        }
                    }
                    None => {
                        warn!(
                            "⚠️  [EXECUTOR]: current_step '{}' unknown after resume; restarting chain.",
                            last_dispatched_label
                        );
                        0
                    }
                }
            }
        };

        let transitioned = self
            .instance_repository
            .transition_status(instance_id, InstanceStatus::Running)
            .await
            .map_err(db_transient)?;

        if transitioned {
            self.enqueue_step(
                instance_id,
                &instance_record.process_ref,
                held_step_index,
                None,
            )
            .await?;
        }

        Ok(transitioned)
    }

    // -------------------------------------------------------------------
    // SOPORTE INTERNO
    // -------------------------------------------------------------------

    /// Resuelve el proceso y materializa su lista de pasos.
    fn materialize_definition(
        &self,
        process_ref: &str,
        inputs: &Value,
    ) -> Result<ProcessDefinition, EngineError> {
        let registered_object = self.object_registry.resolve(process_ref).ok_or_else(|| {
            EngineError::dispatch(
                DispatchReason::UnknownRef,
                format!("process reference not registered: {}", process_ref),
            )
        })?;

        let ObjectHandler::Process(process_blueprint) = &registered_object.handler else {
            return Err(EngineError::dispatch(
                DispatchReason::WrongType,
                format!(
                    "expected process, got '{}': {}",
                    registered_object.object_type.as_str(),
                    process_ref
                ),
            ));
        };

        Ok(ProcessDefinition {
            reference: process_ref.to_string(),
            steps: process_blueprint.materialize(inputs),
            metadata: registered_object.metadata.clone(),
        })
    }

    async fn fetch_instance_status(
        &self,
        instance_id: &str,
    ) -> Result<Option<InstanceStatus>, EngineError> {
        Ok(self
            .instance_repository
            .fetch_instance(instance_id)
            .await
            .map_err(db_transient)?
            .map(|record| record.status))
    }

    async fn enqueue_step(
        &self,
        instance_id: &str,
        process_ref: &str,
        step_index: usize,
        parallel_member: Option<usize>,
    ) -> Result<(), EngineError> {
        let step_task = StepTask {
            instance_id: instance_id.to_string(),
            process_ref: process_ref.to_string(),
            step_index,
            parallel_member,
        };

        let task_payload = serde_json::to_value(&step_task)
            .map_err(|fault| EngineError::Transient(format!("TASK_ENCODE_FAULT: {}", fault)))?;

        self.task_queue
            .enqueue(STEP_TASK_NAME, task_payload, EnqueueOptions::default())
            .await
            .map_err(|fault| EngineError::Transient(fault.to_string()))
    }

    fn barrier_mark_member_complete(&self, instance_id: &str, group_index: usize) -> bool {
        let barrier_key = (instance_id.to_string(), group_index);
        let mut barriers_guard = self
            .parallel_barriers
            .lock()
            .expect("FATAL: Barrier lock poisoned.");

        match barriers_guard.get_mut(&barrier_key) {
            Some(remaining_members) => {
                *remaining_members = remaining_members.saturating_sub(1);
                if *remaining_members == 0 {
                    barriers_guard.remove(&barrier_key);
                    true
                } else {
                    false
                }
            }
            // Barrera desechada (fallo de hermano o re-entrega tardía).
            None => false,
        }
    }

    fn barrier_pending(&self, instance_id: &str, group_index: usize) -> bool {
        self.parallel_barriers
            .lock()
            .expect("FATAL: Barrier lock poisoned.")
            .contains_key(&(instance_id.to_string(), group_index))
    }

    fn barrier_discard(&self, instance_id: &str, group_index: usize) {
        self.parallel_barriers
            .lock()
            .expect("FATAL: Barrier lock poisoned.")
            .remove(&(instance_id.to_string(), group_index));
    }
}

// ---------------------------------------------------------------------------
// FUNCIONES PURAS DE SOPORTE
// ---------------------------------------------------------------------------

/// Genera la identidad opaca de instancia: `proc_` + 12 hex aleatorios.
fn generate_instance_id() -> String {
    let mut entropy_buffer = [0u8; 6];
    rand::thread_rng().fill_bytes(&mut entropy_buffer);
    format!("proc_{}", hex::encode(entropy_buffer))
}

/// Califica una referencia de regla desnuda con `<app>.rules.`.
fn qualify_rule_reference(rule_reference: &str, process_ref: &str) -> String {
    if rule_reference.contains('.') {
        return rule_reference.to_string();
    }

    match process_ref.split('.').next() {
        Some(app_name) if !app_name.is_empty() => {
            format!("{}.rules.{}", app_name, rule_reference)
        }
        _ => rule_reference.to_string(),
    }
}

/// Ámbito de condición: inputs en la base, variables encima.
fn build_condition_scope(inputs: &Value, variables: &Value) -> Value {
    let mut scope_document = serde_json::Map::new();

    if let Some(input_map) = inputs.as_object() {
        for (input_name, input_value) in input_map {
            scope_document.insert(input_name.clone(), input_value.clone());
        }
    }
    if let Some(variable_map) = variables.as_object() {
        for (variable_name, variable_value) in variable_map {
            scope_document.insert(variable_name.clone(), variable_value.clone());
        }
    }

    Value::Object(scope_document)
}

/// Documento de inputs del paso: mapeo explícito o reenvío de inputs.
fn build_step_inputs(step_definition: &StepDefinition, instance_record: &ProcessInstanceRecord) -> Value {
    match &step_definition.input_mapping {
        Some(input_mapping) => {
            let mut bound_inputs = serde_json::Map::new();
            let variable_map = instance_record.variables.as_object();

            for (rule_parameter, process_variable) in input_mapping {
                let bound_value = variable_map
                    .and_then(|variables| variables.get(process_variable))
                    .cloned()
                    .unwrap_or(Value::Null);
                bound_inputs.insert(rule_parameter.clone(), bound_value);
            }

            Value::Object(bound_inputs)
        }
        None => instance_record.inputs.clone(),
    }
}

/// Garantiza la forma de objeto de un documento mutable de variables.
fn ensure_object(document: &mut Value) -> &mut serde_json::Map<String, Value> {
    if !document.is_object() {
        *document = Value::Object(serde_json::Map::new());
    }
    document.as_object_mut().expect("object form was just ensured")
}

/// Los fallos de infraestructura emergen como transitorios (re-entrega).
fn db_transient(fault: appos_infra_db::DbError) -> EngineError {
    EngineError::Transient(fault.to_string())
}

// FIN DEL ARCHIVO [apps/orchestrator/src/services/executor.rs]
