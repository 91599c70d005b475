// Archivo: repository.rs
// Propósito: contratos de persistencia. Separan el log de eventos, el índice
// de instancias activas y el store de configuración para poder combinar
// backends distintos (ver `AggregateStorage` en `wf-persistence`).
use crate::domain::SequenceEvent;
use crate::errors::Result;
use std::collections::{HashMap, HashSet};
use wf_domain::{resolve_docker_image, Workflow, WorkflowId, WorkflowInstance, WorkflowState};

/// Índice de instancias no terminales con el último contador aplicado.
pub trait ActiveStateRepository: Send + Sync {
    /// Instancias activas y su último contador.
    fn read_active_states(&self) -> Result<HashMap<WorkflowInstance, i64>>;

    /// Inserta o reemplaza la entrada de `instance`.
    fn write_active_state(&self, instance: &WorkflowInstance, counter: i64) -> Result<()>;

    /// Elimina la entrada; no falla si no existe.
    fn delete_active_state(&self, instance: &WorkflowInstance) -> Result<()>;
}

/// Log append-only de `SequenceEvent` por instancia.
pub trait EventRepository: ActiveStateRepository {
    /// Agrega un evento. Debe devolver `FlowError::Conflict` si el contador
    /// no es exactamente el último almacenado + 1 (0 para el primero).
    fn write_event(&self, event: &SequenceEvent) -> Result<()>;

    /// Eventos de la instancia en orden ascendente de contador.
    fn read_events(&self, instance: &WorkflowInstance) -> Result<Vec<SequenceEvent>>;

    /// Último contador almacenado para la instancia, si existe alguno.
    fn latest_stored_counter(&self, instance: &WorkflowInstance) -> Result<Option<i64>>;

    /// Último contador de cada instancia con eventos. Permite reconstruir el
    /// índice activo a partir del log.
    fn latest_stored_counters(&self) -> Result<HashMap<WorkflowInstance, i64>>;

    /// Historia agrupada por instancia para todas las instancias de un
    /// workflow, ordenada por clave de instancia.
    fn execution_history(&self, workflow_id: &WorkflowId) -> Result<Vec<(WorkflowInstance, Vec<SequenceEvent>)>>;
}

/// Store de definiciones de workflow, estado por workflow y switch global.
pub trait ConfigRepository: Send + Sync {
    fn workflow(&self, id: &WorkflowId) -> Result<Option<Workflow>>;

    /// Crea o reemplaza la definición.
    fn store_workflow(&self, workflow: &Workflow) -> Result<()>;

    /// Estado almacenado del workflow; `None` si nunca se escribió.
    fn workflow_state(&self, id: &WorkflowId) -> Result<Option<WorkflowState>>;

    /// Aplica los campos presentes de `delta` sobre el estado actual.
    fn patch_state(&self, id: &WorkflowId, delta: &WorkflowState) -> Result<()>;

    /// Aplica `delta` a todos los workflows almacenados del componente.
    fn patch_component_state(&self, component_id: &str, delta: &WorkflowState) -> Result<()>;

    /// Ids de los workflows con `enabled == Some(true)`.
    fn enabled_workflows(&self) -> Result<HashSet<WorkflowId>>;

    /// Switch global de triggers; `true` cuando no se configuró.
    fn global_enabled(&self) -> Result<bool>;

    /// Cambia el switch global y devuelve el valor previo.
    fn set_global_enabled(&self, enabled: bool) -> Result<bool>;

    /// Un workflow sin flag explícito está deshabilitado.
    fn enabled(&self, id: &WorkflowId) -> Result<bool> {
        Ok(self.workflow_state(id)?.map(|s| s.is_enabled()).unwrap_or(false))
    }

    /// Imagen efectiva: override de estado antes que la del schedule.
    fn docker_image(&self, id: &WorkflowId) -> Result<Option<String>> {
        let workflow = match self.workflow(id)? {
            Some(w) => w,
            None => return Ok(None),
        };
        let state = self.workflow_state(id)?.unwrap_or_default();
        Ok(resolve_docker_image(&workflow, &state))
    }
}

/// Todo lo que necesita el State Manager: log de eventos, índice activo y
/// configuración detrás de un mismo handle.
pub trait Storage: EventRepository + ConfigRepository {}

impl<T> Storage for T where T: EventRepository + ConfigRepository + ?Sized {}
