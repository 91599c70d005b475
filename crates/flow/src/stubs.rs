// Archivo: stubs.rs
// Propósito: implementaciones en memoria de los repositorios para pruebas y
// wiring rápido. No son durables.
//
// Los repositorios exponen inyección de fallos (`set_fail_writes`) y retardo
// artificial (`set_write_delay`) para ejercitar los caminos de error del
// State Manager y del mirror.
use crate::domain::SequenceEvent;
use crate::errors::{FlowError, Result};
use crate::repository::{ActiveStateRepository, ConfigRepository, EventRepository};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;
use wf_domain::{Workflow, WorkflowId, WorkflowInstance, WorkflowState};

fn lock<T>(m: &Mutex<T>) -> Result<MutexGuard<'_, T>> {
    m.lock().map_err(|e| FlowError::Storage(format!("mutex poisoned: {:?}", e)))
}

/// Controles de fallo compartidos por los stubs.
#[derive(Debug, Default)]
struct FaultControl {
    fail_writes: AtomicBool,
    fail_active_writes: AtomicBool,
    write_delay_ms: AtomicU64,
}

impl FaultControl {
    fn before_write(&self, what: &str) -> Result<()> {
        let delay = self.write_delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            std::thread::sleep(Duration::from_millis(delay));
        }
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(FlowError::Storage(format!("escritura simulada fallida: {}", what)));
        }
        Ok(())
    }

    fn before_active_write(&self) -> Result<()> {
        if self.fail_active_writes.load(Ordering::SeqCst) {
            return Err(FlowError::Storage("escritura simulada fallida: active_state".into()));
        }
        self.before_write("active_state")
    }
}

/// Log de eventos + índice activo en memoria.
#[derive(Debug, Default)]
pub struct InMemoryEventRepository {
    events: Mutex<HashMap<WorkflowInstance, Vec<SequenceEvent>>>,
    active: Mutex<HashMap<WorkflowInstance, i64>>,
    faults: FaultControl,
}

impl InMemoryEventRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Hace fallar todas las escrituras siguientes con `FlowError::Storage`.
    pub fn set_fail_writes(&self, fail: bool) {
        self.faults.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub fn set_write_delay(&self, delay: Duration) {
        self.faults.write_delay_ms.store(delay.as_millis() as u64, Ordering::SeqCst);
    }

    /// Hace fallar sólo las escrituras del índice activo; el log sigue
    /// aceptando eventos.
    pub fn set_fail_active_writes(&self, fail: bool) {
        self.faults.fail_active_writes.store(fail, Ordering::SeqCst);
    }

    /// Número total de eventos almacenados (todas las instancias).
    pub fn event_count(&self) -> usize {
        self.events.lock().unwrap_or_else(|e| e.into_inner()).values().map(Vec::len).sum()
    }
}

impl ActiveStateRepository for InMemoryEventRepository {
    fn read_active_states(&self) -> Result<HashMap<WorkflowInstance, i64>> {
        Ok(lock(&self.active)?.clone())
    }

    fn write_active_state(&self, instance: &WorkflowInstance, counter: i64) -> Result<()> {
        self.faults.before_active_write()?;
        lock(&self.active)?.insert(instance.clone(), counter);
        Ok(())
    }

    fn delete_active_state(&self, instance: &WorkflowInstance) -> Result<()> {
        self.faults.before_active_write()?;
        lock(&self.active)?.remove(instance);
        Ok(())
    }
}

impl EventRepository for InMemoryEventRepository {
    fn write_event(&self, event: &SequenceEvent) -> Result<()> {
        self.faults.before_write("event")?;
        let mut events = lock(&self.events)?;
        let log = events.entry(event.workflow_instance().clone()).or_default();
        let expected = log.last().map(|e| e.counter + 1).unwrap_or(0);
        if event.counter != expected {
            return Err(FlowError::Conflict(format!("{}: contador {} esperado {}",
                                                   event.workflow_instance(),
                                                   event.counter,
                                                   expected)));
        }
        log.push(event.clone());
        Ok(())
    }

    fn read_events(&self, instance: &WorkflowInstance) -> Result<Vec<SequenceEvent>> {
        Ok(lock(&self.events)?.get(instance).cloned().unwrap_or_default())
    }

    fn latest_stored_counter(&self, instance: &WorkflowInstance) -> Result<Option<i64>> {
        Ok(lock(&self.events)?.get(instance).and_then(|log| log.last()).map(|e| e.counter))
    }

    fn latest_stored_counters(&self) -> Result<HashMap<WorkflowInstance, i64>> {
        Ok(lock(&self.events)?.iter()
                              .filter_map(|(instance, log)| log.last().map(|e| (instance.clone(), e.counter)))
                              .collect())
    }

    fn execution_history(&self, workflow_id: &WorkflowId) -> Result<Vec<(WorkflowInstance, Vec<SequenceEvent>)>> {
        let events = lock(&self.events)?;
        let mut grouped: BTreeMap<WorkflowInstance, Vec<SequenceEvent>> = BTreeMap::new();
        for (instance, log) in events.iter() {
            if instance.workflow_id() == workflow_id && !log.is_empty() {
                grouped.insert(instance.clone(), log.clone());
            }
        }
        Ok(grouped.into_iter().collect())
    }
}

/// Store de configuración en memoria. También implementa
/// `ActiveStateRepository` para servir como destino del mirror.
#[derive(Debug, Default)]
pub struct InMemoryConfigRepository {
    workflows: Mutex<HashMap<WorkflowId, Workflow>>,
    states: Mutex<HashMap<WorkflowId, WorkflowState>>,
    global: Mutex<Option<bool>>,
    active: Mutex<HashMap<WorkflowInstance, i64>>,
    faults: FaultControl,
}

impl InMemoryConfigRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Hace fallar las escrituras del índice activo (espejo).
    pub fn set_fail_writes(&self, fail: bool) {
        self.faults.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Retardo aplicado a cada escritura del índice activo.
    pub fn set_write_delay(&self, delay: Duration) {
        self.faults.write_delay_ms.store(delay.as_millis() as u64, Ordering::SeqCst);
    }
}

impl ConfigRepository for InMemoryConfigRepository {
    fn workflow(&self, id: &WorkflowId) -> Result<Option<Workflow>> {
        Ok(lock(&self.workflows)?.get(id).cloned())
    }

    fn store_workflow(&self, workflow: &Workflow) -> Result<()> {
        lock(&self.workflows)?.insert(workflow.id().clone(), workflow.clone());
        Ok(())
    }

    fn workflow_state(&self, id: &WorkflowId) -> Result<Option<WorkflowState>> {
        Ok(lock(&self.states)?.get(id).cloned())
    }

    fn patch_state(&self, id: &WorkflowId, delta: &WorkflowState) -> Result<()> {
        lock(&self.states)?.entry(id.clone()).or_default().patch(delta);
        Ok(())
    }

    fn patch_component_state(&self, component_id: &str, delta: &WorkflowState) -> Result<()> {
        let ids: Vec<WorkflowId> = lock(&self.workflows)?.keys()
                                                         .filter(|id| id.component_id() == component_id)
                                                         .cloned()
                                                         .collect();
        let mut states = lock(&self.states)?;
        for id in ids {
            states.entry(id).or_default().patch(delta);
        }
        Ok(())
    }

    fn enabled_workflows(&self) -> Result<HashSet<WorkflowId>> {
        Ok(lock(&self.states)?.iter()
                              .filter(|(_, s)| s.enabled == Some(true))
                              .map(|(id, _)| id.clone())
                              .collect())
    }

    fn global_enabled(&self) -> Result<bool> {
        Ok(lock(&self.global)?.unwrap_or(true))
    }

    fn set_global_enabled(&self, enabled: bool) -> Result<bool> {
        let mut global = lock(&self.global)?;
        let previous = global.unwrap_or(true);
        *global = Some(enabled);
        Ok(previous)
    }
}

impl ActiveStateRepository for InMemoryConfigRepository {
    fn read_active_states(&self) -> Result<HashMap<WorkflowInstance, i64>> {
        Ok(lock(&self.active)?.clone())
    }

    fn write_active_state(&self, instance: &WorkflowInstance, counter: i64) -> Result<()> {
        self.faults.before_write("mirror active_state")?;
        lock(&self.active)?.insert(instance.clone(), counter);
        Ok(())
    }

    fn delete_active_state(&self, instance: &WorkflowInstance) -> Result<()> {
        self.faults.before_write("mirror active_state")?;
        lock(&self.active)?.remove(instance);
        Ok(())
    }
}

/// Log + configuración en memoria detrás de un único handle (`Storage`).
#[derive(Debug, Default)]
pub struct InMemoryStorage {
    pub events: InMemoryEventRepository,
    pub config: InMemoryConfigRepository,
}

impl InMemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ActiveStateRepository for InMemoryStorage {
    fn read_active_states(&self) -> Result<HashMap<WorkflowInstance, i64>> {
        self.events.read_active_states()
    }

    fn write_active_state(&self, instance: &WorkflowInstance, counter: i64) -> Result<()> {
        self.events.write_active_state(instance, counter)
    }

    fn delete_active_state(&self, instance: &WorkflowInstance) -> Result<()> {
        self.events.delete_active_state(instance)
    }
}

impl EventRepository for InMemoryStorage {
    fn write_event(&self, event: &SequenceEvent) -> Result<()> {
        self.events.write_event(event)
    }

    fn read_events(&self, instance: &WorkflowInstance) -> Result<Vec<SequenceEvent>> {
        self.events.read_events(instance)
    }

    fn latest_stored_counter(&self, instance: &WorkflowInstance) -> Result<Option<i64>> {
        self.events.latest_stored_counter(instance)
    }

    fn latest_stored_counters(&self) -> Result<HashMap<WorkflowInstance, i64>> {
        self.events.latest_stored_counters()
    }

    fn execution_history(&self, workflow_id: &WorkflowId) -> Result<Vec<(WorkflowInstance, Vec<SequenceEvent>)>> {
        self.events.execution_history(workflow_id)
    }
}

impl ConfigRepository for InMemoryStorage {
    fn workflow(&self, id: &WorkflowId) -> Result<Option<Workflow>> {
        self.config.workflow(id)
    }

    fn store_workflow(&self, workflow: &Workflow) -> Result<()> {
        self.config.store_workflow(workflow)
    }

    fn workflow_state(&self, id: &WorkflowId) -> Result<Option<WorkflowState>> {
        self.config.workflow_state(id)
    }

    fn patch_state(&self, id: &WorkflowId, delta: &WorkflowState) -> Result<()> {
        self.config.patch_state(id, delta)
    }

    fn patch_component_state(&self, component_id: &str, delta: &WorkflowState) -> Result<()> {
        self.config.patch_component_state(component_id, delta)
    }

    fn enabled_workflows(&self) -> Result<HashSet<WorkflowId>> {
        self.config.enabled_workflows()
    }

    fn global_enabled(&self) -> Result<bool> {
        self.config.global_enabled()
    }

    fn set_global_enabled(&self, enabled: bool) -> Result<bool> {
        self.config.set_global_enabled(enabled)
    }
}
