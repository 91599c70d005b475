// Archivo: domain.rs
// Propósito: eventos de ciclo de vida de una instancia y su envoltura
// secuenciada (`SequenceEvent`), unidad de almacenamiento del log.
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use wf_domain::{ExecutionDescription, WorkflowInstance};

/// Origen de un trigger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Trigger {
    /// Generado por el propio schedule del workflow.
    Natural,
    /// Pedido explícito de un operador.
    Adhoc { id: String },
    /// Parte de un backfill.
    Backfill { id: String },
}

impl Trigger {
    /// Sólo los triggers naturales dependen del flag `enabled` del workflow.
    pub fn is_natural(&self) -> bool {
        matches!(self, Trigger::Natural)
    }
}

/// Variantes de evento. Conjunto cerrado: la función de transición hace
/// `match` exhaustivo sobre este enum.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventKind {
    TriggerExecution { trigger: Trigger },
    Dequeue,
    Submit { description: ExecutionDescription },
    Submitted { execution_id: String },
    Started,
    Terminate { exit_code: Option<i32> },
    RunError { message: String },
    Timeout,
    RetryAfter { delay_millis: u64 },
    Success,
    Stop,
    Halt { reason: Option<String> },
}

impl EventKind {
    /// Nombre corto y estable, usado en logs y como columna `event_type`.
    pub fn name(&self) -> &'static str {
        match self {
            EventKind::TriggerExecution { .. } => "triggerExecution",
            EventKind::Dequeue => "dequeue",
            EventKind::Submit { .. } => "submit",
            EventKind::Submitted { .. } => "submitted",
            EventKind::Started => "started",
            EventKind::Terminate { .. } => "terminate",
            EventKind::RunError { .. } => "runError",
            EventKind::Timeout => "timeout",
            EventKind::RetryAfter { .. } => "retryAfter",
            EventKind::Success => "success",
            EventKind::Stop => "stop",
            EventKind::Halt { .. } => "halt",
        }
    }
}

/// Evento dirigido a una instancia.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    pub workflow_instance: WorkflowInstance,
    pub kind: EventKind,
}

impl Event {
    pub fn new(workflow_instance: WorkflowInstance, kind: EventKind) -> Self {
        Self { workflow_instance, kind }
    }

    pub fn trigger(instance: WorkflowInstance, trigger: Trigger) -> Self {
        Self::new(instance, EventKind::TriggerExecution { trigger })
    }

    pub fn dequeue(instance: WorkflowInstance) -> Self {
        Self::new(instance, EventKind::Dequeue)
    }

    pub fn submit(instance: WorkflowInstance, description: ExecutionDescription) -> Self {
        Self::new(instance, EventKind::Submit { description })
    }

    pub fn submitted(instance: WorkflowInstance, execution_id: impl Into<String>) -> Self {
        Self::new(instance, EventKind::Submitted { execution_id: execution_id.into() })
    }

    pub fn started(instance: WorkflowInstance) -> Self {
        Self::new(instance, EventKind::Started)
    }

    pub fn terminate(instance: WorkflowInstance, exit_code: Option<i32>) -> Self {
        Self::new(instance, EventKind::Terminate { exit_code })
    }

    pub fn run_error(instance: WorkflowInstance, message: impl Into<String>) -> Self {
        Self::new(instance, EventKind::RunError { message: message.into() })
    }

    pub fn timeout(instance: WorkflowInstance) -> Self {
        Self::new(instance, EventKind::Timeout)
    }

    pub fn retry_after(instance: WorkflowInstance, delay_millis: u64) -> Self {
        Self::new(instance, EventKind::RetryAfter { delay_millis })
    }

    pub fn success(instance: WorkflowInstance) -> Self {
        Self::new(instance, EventKind::Success)
    }

    pub fn stop(instance: WorkflowInstance) -> Self {
        Self::new(instance, EventKind::Stop)
    }

    pub fn halt(instance: WorkflowInstance, reason: Option<String>) -> Self {
        Self::new(instance, EventKind::Halt { reason })
    }
}

/// Evento con su contador por instancia: la unidad durable del log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SequenceEvent {
    pub event: Event,
    pub counter: i64,
    pub timestamp: DateTime<Utc>,
}

impl SequenceEvent {
    /// Crea el evento secuenciado con timestamp actual.
    pub fn new(event: Event, counter: i64) -> Self {
        Self { event, counter, timestamp: Utc::now() }
    }

    pub fn with_timestamp(event: Event, counter: i64, timestamp: DateTime<Utc>) -> Self {
        Self { event, counter, timestamp }
    }

    pub fn workflow_instance(&self) -> &WorkflowInstance {
        &self.event.workflow_instance
    }
}
