// Archivo: aggregate.rs
// Propósito: `AggregateStorage`, que combina el log primario con el store
// de configuración secundario y replica el índice de activas en segundo
// plano.
//
// Reglas de ruteo:
// - eventos y lecturas del índice activo -> primario;
// - configuración -> secundario;
// - escrituras/borrados del índice activo -> se despacha primero la copia
//   espejo al secundario y luego se escribe (síncronamente) en el primario.
//   El resultado devuelto es siempre el del primario.
use crate::mirror::{MirrorJob, MirrorPolicy, MirrorStats, MirrorWorker};
use flow::{ActiveStateRepository, ConfigRepository, EventRepository, Result, SequenceEvent};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use wf_domain::{Workflow, WorkflowId, WorkflowInstance, WorkflowState};

pub struct AggregateStorage<P, S>
    where P: EventRepository,
          S: ConfigRepository + ActiveStateRepository + 'static
{
    primary: Arc<P>,
    secondary: Arc<S>,
    mirror: MirrorWorker,
}

impl<P, S> AggregateStorage<P, S>
    where P: EventRepository,
          S: ConfigRepository + ActiveStateRepository + 'static
{
    pub fn new(primary: Arc<P>, secondary: Arc<S>, policy: MirrorPolicy) -> Result<Self> {
        let mirror = MirrorWorker::start(&policy)?;
        Ok(Self { primary, secondary, mirror })
    }

    pub fn primary(&self) -> &Arc<P> {
        &self.primary
    }

    pub fn secondary(&self) -> &Arc<S> {
        &self.secondary
    }

    /// Copia espejo del índice activo, leída del secundario.
    pub fn secondary_active_states(&self) -> Result<HashMap<WorkflowInstance, i64>> {
        self.secondary.read_active_states()
    }

    pub fn mirror_stats(&self) -> MirrorStats {
        self.mirror.stats()
    }

    /// Espera a que el mirror drene su cola (útil en pruebas y al cerrar).
    pub fn wait_mirror_idle(&self, timeout: Duration) -> bool {
        self.mirror.wait_idle(timeout)
    }

    pub fn shutdown(&self) {
        self.mirror.shutdown();
    }
}

impl<P, S> ActiveStateRepository for AggregateStorage<P, S>
    where P: EventRepository,
          S: ConfigRepository + ActiveStateRepository + 'static
{
    fn read_active_states(&self) -> Result<HashMap<WorkflowInstance, i64>> {
        self.primary.read_active_states()
    }

    fn write_active_state(&self, instance: &WorkflowInstance, counter: i64) -> Result<()> {
        let secondary = self.secondary.clone();
        let target = instance.clone();
        let job: MirrorJob = Box::new(move || secondary.write_active_state(&target, counter));
        self.mirror.dispatch(&format!("write_active_state {}", instance), job);
        self.primary.write_active_state(instance, counter)
    }

    fn delete_active_state(&self, instance: &WorkflowInstance) -> Result<()> {
        let secondary = self.secondary.clone();
        let target = instance.clone();
        let job: MirrorJob = Box::new(move || secondary.delete_active_state(&target));
        self.mirror.dispatch(&format!("delete_active_state {}", instance), job);
        self.primary.delete_active_state(instance)
    }
}

impl<P, S> EventRepository for AggregateStorage<P, S>
    where P: EventRepository,
          S: ConfigRepository + ActiveStateRepository + 'static
{
    fn write_event(&self, event: &SequenceEvent) -> Result<()> {
        self.primary.write_event(event)
    }

    fn read_events(&self, instance: &WorkflowInstance) -> Result<Vec<SequenceEvent>> {
        self.primary.read_events(instance)
    }

    fn latest_stored_counter(&self, instance: &WorkflowInstance) -> Result<Option<i64>> {
        self.primary.latest_stored_counter(instance)
    }

    fn latest_stored_counters(&self) -> Result<HashMap<WorkflowInstance, i64>> {
        self.primary.latest_stored_counters()
    }

    fn execution_history(&self, workflow_id: &WorkflowId) -> Result<Vec<(WorkflowInstance, Vec<SequenceEvent>)>> {
        self.primary.execution_history(workflow_id)
    }
}

impl<P, S> ConfigRepository for AggregateStorage<P, S>
    where P: EventRepository,
          S: ConfigRepository + ActiveStateRepository + 'static
{
    fn workflow(&self, id: &WorkflowId) -> Result<Option<Workflow>> {
        self.secondary.workflow(id)
    }

    fn store_workflow(&self, workflow: &Workflow) -> Result<()> {
        self.secondary.store_workflow(workflow)
    }

    fn workflow_state(&self, id: &WorkflowId) -> Result<Option<WorkflowState>> {
        self.secondary.workflow_state(id)
    }

    fn patch_state(&self, id: &WorkflowId, delta: &WorkflowState) -> Result<()> {
        self.secondary.patch_state(id, delta)
    }

    fn patch_component_state(&self, component_id: &str, delta: &WorkflowState) -> Result<()> {
        self.secondary.patch_component_state(component_id, delta)
    }

    fn enabled_workflows(&self) -> Result<HashSet<WorkflowId>> {
        self.secondary.enabled_workflows()
    }

    fn global_enabled(&self) -> Result<bool> {
        self.secondary.global_enabled()
    }

    fn set_global_enabled(&self, enabled: bool) -> Result<bool> {
        self.secondary.set_global_enabled(enabled)
    }

    fn enabled(&self, id: &WorkflowId) -> Result<bool> {
        self.secondary.enabled(id)
    }

    fn docker_image(&self, id: &WorkflowId) -> Result<Option<String>> {
        self.secondary.docker_image(id)
    }
}
