// Archivo: state_manager.rs
// Propósito: `StateManager`, único punto que muta `RunState`s.
//
// Por evento: se toma el slot de la instancia (un `Mutex` por instancia en
// un `DashMap`), se carga el estado (memoria o log), se aplica la función de
// transición, se persiste el evento + índice activo y, ya fuera del lock, se
// llama a los output handlers en orden de registro. Los eventos que
// devuelven los handlers entran de nuevo por `receive`.
use crate::errors::SchedulerError;
use crate::handlers::OutputHandler;
use dashmap::DashMap;
use flow::{engine, ActiveStateRepository, ConfigRepository, Event, EventKind, EventRepository, FlowError, RunState,
           SequenceEvent, State, Storage, Trigger};
use log::{debug, error, info, warn};
use std::any::Any;
use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use wf_domain::{WorkflowId, WorkflowInstance};

/// Estado en memoria de una instancia.
///
/// `state == None` obliga a recargar desde el log en el próximo evento.
/// Un slot `retired` ya fue quitado del mapa: quien lo encuentre debe volver
/// a buscar.
#[derive(Debug, Default)]
struct Slot {
    state: Option<RunState>,
    retired: bool,
}

type SlotRef = Arc<Mutex<Slot>>;

pub struct StateManager<S>
    where S: Storage + ?Sized
{
    storage: Arc<S>,
    slots: DashMap<WorkflowInstance, SlotRef>,
    handlers: Vec<Arc<dyn OutputHandler>>,
    closed: AtomicBool,
}

impl<S> StateManager<S> where S: Storage + ?Sized
{
    pub fn new(storage: Arc<S>) -> Self {
        Self { storage, slots: DashMap::new(), handlers: Vec::new(), closed: AtomicBool::new(false) }
    }

    /// Registra un handler; se invocan en orden de registro.
    pub fn with_handler(mut self, handler: Arc<dyn OutputHandler>) -> Self {
        self.handlers.push(handler);
        self
    }

    pub fn storage(&self) -> &Arc<S> {
        &self.storage
    }

    /// Aplica `event` en el siguiente contador de su instancia.
    pub fn receive(&self, event: Event) -> Result<(), SchedulerError> {
        self.process(event, None)
    }

    /// Igual que `receive`, pero un manager cerrado no es error.
    pub fn receive_ignore_closed(&self, event: Event) -> Result<(), SchedulerError> {
        match self.receive(event) {
            Err(SchedulerError::IsClosed) => {
                debug!("manager cerrado, evento descartado");
                Ok(())
            }
            other => other,
        }
    }

    /// Aplica un evento con contador explícito. Un contador distinto del
    /// siguiente esperado se rechaza sin modificar nada.
    pub fn receive_sequenced(&self, event: SequenceEvent) -> Result<(), SchedulerError> {
        let counter = event.counter;
        self.process(event.event, Some(counter))
    }

    /// Dispara una ejecución de `instance`.
    pub fn trigger(&self, instance: WorkflowInstance, trigger: Trigger) -> Result<(), SchedulerError> {
        self.receive(Event::trigger(instance, trigger))
    }

    /// Índice de instancias activas del almacenamiento primario.
    pub fn list_active(&self) -> Result<HashMap<WorkflowInstance, i64>, SchedulerError> {
        Ok(self.storage.read_active_states()?)
    }

    /// Eventos de la instancia en orden de contador.
    pub fn history(&self, instance: &WorkflowInstance) -> Result<Vec<SequenceEvent>, SchedulerError> {
        Ok(self.storage.read_events(instance)?)
    }

    /// Historias de todas las instancias de un workflow.
    pub fn execution_history(&self,
                             workflow_id: &WorkflowId)
                             -> Result<Vec<(WorkflowInstance, Vec<SequenceEvent>)>, SchedulerError> {
        Ok(self.storage.execution_history(workflow_id)?)
    }

    /// Estado actual de la instancia: el de memoria si está cargado, si no
    /// el resultado de plegar su historia (puede ser terminal). `None` si
    /// nunca recibió eventos.
    pub fn get(&self, instance: &WorkflowInstance) -> Result<Option<RunState>, SchedulerError> {
        let slot = self.slots.get(instance).map(|r| r.value().clone());
        if let Some(slot) = slot {
            if let Some(state) = lock_slot(&slot).state.clone() {
                if state.state != State::New {
                    return Ok(Some(state));
                }
            }
        }
        if self.storage.latest_stored_counter(instance)?.is_none() {
            return Ok(None);
        }
        Ok(Some(self.fold_history(instance)?))
    }

    /// Estados no terminales cargados en memoria.
    pub fn active_states(&self) -> Vec<RunState> {
        // Se copian los slots antes de bloquearlos: nunca se toma un lock de
        // slot con un shard del mapa tomado.
        let slots: Vec<SlotRef> = self.slots.iter().map(|e| e.value().clone()).collect();
        let mut states: Vec<RunState> = slots.iter()
                                             .filter_map(|slot| lock_slot(slot).state.clone())
                                             .filter(|s| !s.is_terminal() && s.state != State::New)
                                             .collect();
        states.sort_by(|a, b| a.workflow_instance.cmp(&b.workflow_instance));
        states
    }

    /// Reconstruye en memoria cada instancia viva plegando su historia y
    /// vuelve a invocar los handlers sobre el estado restaurado. El índice
    /// activo se reconcilia con el log: se agregan las instancias vivas que
    /// faltan, se corrigen contadores atrasados y se quitan las terminadas.
    /// Devuelve cuántas instancias se restauraron.
    pub fn restore(&self) -> Result<usize, SchedulerError> {
        self.ensure_open()?;
        let indexed = self.storage.read_active_states()?;
        let latest = self.storage.latest_stored_counters()?;
        let mut candidates: Vec<&WorkflowInstance> = indexed.keys().chain(latest.keys()).collect();
        candidates.sort();
        candidates.dedup();

        let mut restored = Vec::with_capacity(indexed.len());
        for instance in candidates {
            let state = self.with_slot(instance, |slot| {
                                let state = self.fold_history(instance)?;
                                slot.state = Some(state.clone());
                                Ok(state)
                            })?;
            let live = !state.is_terminal() && state.state != State::New;
            match (indexed.get(instance), live) {
                (Some(_), false) => {
                    warn!("{} figuraba activa pero su historia termina en {}; se quita del índice", instance, state.state);
                    self.storage.delete_active_state(instance)?;
                }
                (None, false) => {}
                (Some(&counter), true) if counter == state.counter => restored.push(state),
                (indexed_counter, true) => {
                    warn!("{}: índice activo desalineado ({:?}, log en {}); se reconcilia",
                          instance, indexed_counter, state.counter);
                    self.storage.write_active_state(instance, state.counter)?;
                    restored.push(state);
                }
            }
        }
        info!("restauradas {} instancias activas", restored.len());
        for state in &restored {
            self.run_handlers(state);
        }
        Ok(restored.len())
    }

    /// A partir de aquí `receive` falla con `IsClosed`. Las transiciones en
    /// curso terminan normalmente.
    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
        info!("state manager cerrado");
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    fn ensure_open(&self) -> Result<(), SchedulerError> {
        if self.is_closed() {
            Err(SchedulerError::IsClosed)
        } else {
            Ok(())
        }
    }

    fn process(&self, event: Event, counter: Option<i64>) -> Result<(), SchedulerError> {
        self.ensure_open()?;
        let instance = event.workflow_instance.clone();
        let committed = self.with_slot(&instance, |slot| self.commit(slot, event, counter))?;
        self.run_handlers(&committed);
        Ok(())
    }

    /// Ejecuta `f` con el slot de `instance` bloqueado. Al terminar, un slot
    /// sin estado útil (terminal, `NEW` o pendiente de recarga) se retira del
    /// mapa.
    fn with_slot<T, F>(&self, instance: &WorkflowInstance, f: F) -> Result<T, SchedulerError>
        where F: FnOnce(&mut Slot) -> Result<T, SchedulerError>
    {
        loop {
            let slot = self.slots
                           .entry(instance.clone())
                           .or_insert_with(|| Arc::new(Mutex::new(Slot::default())))
                           .value()
                           .clone();
            let mut guard = lock_slot(&slot);
            if guard.retired {
                continue;
            }
            let result = f(&mut guard);
            let idle = match &guard.state {
                Some(s) => s.is_terminal() || s.state == State::New,
                None => true,
            };
            if idle {
                guard.retired = true;
                self.slots.remove_if(instance, |_, current| Arc::ptr_eq(current, &slot));
            }
            return result;
        }
    }

    fn commit(&self, slot: &mut Slot, event: Event, counter: Option<i64>) -> Result<RunState, SchedulerError> {
        let current = match slot.state.take() {
            Some(state) => state,
            None => self.load(&event.workflow_instance)?,
        };
        let counter = counter.unwrap_or_else(|| current.next_counter());
        let seq = SequenceEvent::new(event, counter);

        let next = match engine::transition(&current, &seq) {
            Ok(next) => next,
            Err(rejection) => {
                warn!("{}: evento '{}' rechazado: {}", current.workflow_instance, seq.event.kind.name(), rejection);
                slot.state = Some(current);
                return Err(rejection.into());
            }
        };

        if let EventKind::TriggerExecution { trigger } = &seq.event.kind {
            if let Err(e) = self.check_trigger_gate(&current.workflow_instance, trigger) {
                slot.state = Some(current);
                return Err(e);
            }
        }

        if let Err(e) = self.persist(&seq, &next) {
            error!("{}: no se pudo persistir el evento {}: {}", next.workflow_instance, seq.counter, e);
            // El append pudo haber llegado al log: se recarga desde ahí y la
            // carga realinea el índice.
            slot.state = None;
            return Err(e.into());
        }
        debug!("{}: {} -> {} (counter {})", next.workflow_instance, current.state, next.state, next.counter);
        slot.state = Some(next.clone());
        Ok(next)
    }

    /// Kill switch global para cualquier trigger; flag `enabled` sólo para
    /// triggers naturales.
    fn check_trigger_gate(&self, instance: &WorkflowInstance, trigger: &Trigger) -> Result<(), SchedulerError> {
        if !self.storage.global_enabled()? {
            info!("{}: trigger bloqueado por el kill switch global", instance);
            return Err(SchedulerError::TriggerBlocked("triggers deshabilitados globalmente".into()));
        }
        if trigger.is_natural() && !self.storage.enabled(instance.workflow_id())? {
            info!("{}: trigger natural bloqueado, workflow deshabilitado", instance);
            return Err(SchedulerError::TriggerBlocked(format!("workflow {} deshabilitado", instance.workflow_id())));
        }
        Ok(())
    }

    fn persist(&self, seq: &SequenceEvent, next: &RunState) -> flow::Result<()> {
        self.storage.write_event(seq)?;
        self.sync_active_index(next)
    }

    /// Carga el estado desde el log. Si hay historia, el índice activo se
    /// alinea con el resultado del pliegue: un evento anterior pudo quedar en
    /// el log sin su entrada de índice.
    fn load(&self, instance: &WorkflowInstance) -> Result<RunState, SchedulerError> {
        match self.storage.latest_stored_counter(instance)? {
            None => Ok(RunState::fresh(instance.clone(), -1)),
            Some(last) => {
                let state = self.fold_history(instance)?;
                self.sync_active_index(&state)?;
                if state.is_terminal() {
                    Ok(RunState::fresh(instance.clone(), last))
                } else {
                    Ok(state)
                }
            }
        }
    }

    fn sync_active_index(&self, state: &RunState) -> flow::Result<()> {
        if state.is_terminal() || state.state == State::New {
            self.storage.delete_active_state(&state.workflow_instance)
        } else {
            self.storage.write_active_state(&state.workflow_instance, state.counter)
        }
    }

    fn fold_history(&self, instance: &WorkflowInstance) -> Result<RunState, SchedulerError> {
        let events = self.storage.read_events(instance)?;
        engine::fold(instance, &events).map_err(|r| {
                                           SchedulerError::Flow(FlowError::Conflict(format!("historia inconsistente para {}: {}",
                                                                                            instance, r)))
                                       })
    }

    fn run_handlers(&self, state: &RunState) {
        let mut follow_ups = Vec::new();
        for handler in &self.handlers {
            match catch_unwind(AssertUnwindSafe(|| handler.transition_into(state))) {
                Ok(Ok(events)) => follow_ups.extend(events),
                Ok(Err(e)) => {
                    self.force_halt(state, format!("handler {} falló: {}", handler.name(), e));
                    return;
                }
                Err(payload) => {
                    self.force_halt(state, format!("handler {} abortó: {}", handler.name(), panic_message(&*payload)));
                    return;
                }
            }
        }
        for event in follow_ups {
            match self.receive(event) {
                Ok(()) | Err(SchedulerError::IsClosed) => {}
                // Ya registrados al rechazarse.
                Err(SchedulerError::Rejected(_)) | Err(SchedulerError::TriggerBlocked(_)) => {}
                Err(e) => error!("{}: evento de seguimiento fallido: {}", state.workflow_instance, e),
            }
        }
    }

    fn force_halt(&self, state: &RunState, reason: String) {
        error!("{}: {}", state.workflow_instance, reason);
        if state.is_terminal() {
            return;
        }
        if let Err(e) = self.receive_ignore_closed(Event::halt(state.workflow_instance.clone(), Some(reason))) {
            error!("{}: no se pudo forzar el halt: {}", state.workflow_instance, e);
        }
    }
}

/// Bloquea el slot. Un slot envenenado se recupera marcándolo para recarga.
fn lock_slot(slot: &Mutex<Slot>) -> MutexGuard<'_, Slot> {
    slot.lock().unwrap_or_else(|poisoned| {
                   warn!("slot envenenado, se recarga desde el log");
                   let mut guard = poisoned.into_inner();
                   guard.state = None;
                   guard
               })
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload.downcast_ref::<&str>()
           .map(|s| s.to_string())
           .or_else(|| payload.downcast_ref::<String>().cloned())
           .unwrap_or_else(|| "panic".to_string())
}
