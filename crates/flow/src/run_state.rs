// Archivo: run_state.rs
// Propósito: estado materializado de una instancia (`RunState`), resultado
// de plegar su historia de `SequenceEvent` desde `NEW`.
use crate::domain::Trigger;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use wf_domain::{ExecutionDescription, WorkflowInstance};

/// Tag de la máquina de estados de ejecución.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum State {
    New,
    Queued,
    Prepare,
    Submitting,
    Submitted,
    Running,
    Terminated,
    Failed,
    Error,
    Done,
    Halted,
}

impl State {
    /// Un estado terminal no acepta eventos y nunca está en el índice de
    /// instancias activas.
    pub fn is_terminal(self) -> bool {
        match self {
            State::Error | State::Done | State::Halted => true,
            State::New
            | State::Queued
            | State::Prepare
            | State::Submitting
            | State::Submitted
            | State::Running
            | State::Terminated
            | State::Failed => false,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            State::New => "NEW",
            State::Queued => "QUEUED",
            State::Prepare => "PREPARE",
            State::Submitting => "SUBMITTING",
            State::Submitted => "SUBMITTED",
            State::Running => "RUNNING",
            State::Terminated => "TERMINATED",
            State::Failed => "FAILED",
            State::Error => "ERROR",
            State::Done => "DONE",
            State::Halted => "HALTED",
        }
    }
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Datos acumulados por la instancia a lo largo de sus transiciones.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateData {
    pub trigger: Option<Trigger>,
    /// Intentos de ejecución (se incrementa en cada `dequeue`).
    pub tries: u32,
    pub retry_delay_millis: Option<u64>,
    pub execution_id: Option<String>,
    pub execution_description: Option<ExecutionDescription>,
    pub last_exit: Option<i32>,
    /// Motivos de halt, errores de ejecución y timeouts, en orden.
    pub messages: Vec<String>,
}

/// Estado de una instancia con el último contador aplicado.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunState {
    pub workflow_instance: WorkflowInstance,
    pub state: State,
    /// Contador del último evento aplicado; -1 si nunca hubo eventos.
    pub counter: i64,
    /// Timestamp del último evento aplicado.
    pub timestamp: Option<DateTime<Utc>>,
    pub data: StateData,
}

impl RunState {
    /// Estado `NEW` implícito. `counter` es el último contador almacenado
    /// para la instancia (o -1), de modo que el primer evento del nuevo run
    /// continúa la secuencia sin huecos.
    pub fn fresh(workflow_instance: WorkflowInstance, counter: i64) -> Self {
        Self { workflow_instance, state: State::New, counter, timestamp: None, data: StateData::default() }
    }

    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }

    pub fn next_counter(&self) -> i64 {
        self.counter + 1
    }
}
