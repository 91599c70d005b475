// Archivo: errors.rs
// Propósito: definir los errores de almacenamiento, los rechazos de la
// función de transición y el alias Result<T> usado por las APIs del crate.
use crate::run_state::State;
use thiserror::Error;

/// Errores comunes de almacenamiento de eventos y configuración.
///
/// - `NotFound`: entidad no encontrada.
/// - `Conflict`: contador fuera de secuencia o historia inconsistente.
/// - `Storage`: error al acceder al almacenamiento externo.
/// - `Serialization`: payload almacenado ilegible.
/// - `Other`: cualquier otro error.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FlowError {
  /// Entidad no encontrada.
  #[error("No encontrado: {0}")]
  NotFound(String),
  /// Conflicto de secuencia (contador esperado distinto).
  #[error("Conflicto: {0}")]
  Conflict(String),
  /// Error genérico de almacenamiento (BD, red, mutex envenenado).
  #[error("Error de almacenamiento: {0}")]
  Storage(String),
  /// Error de (de)serialización de eventos o configuraciones.
  #[error("Error de serialización: {0}")]
  Serialization(String),
  /// Otro tipo de error.
  #[error("Otro: {0}")]
  Other(String),
}

impl From<serde_json::Error> for FlowError {
  fn from(e: serde_json::Error) -> Self {
    Self::Serialization(e.to_string())
  }
}

impl From<wf_domain::DomainError> for FlowError {
  fn from(e: wf_domain::DomainError) -> Self {
    Self::Serialization(e.to_string())
  }
}

/// Motivo por el que la función de transición rechaza un evento. Un rechazo
/// nunca modifica el estado.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Rejection {
  /// El estado actual es terminal y no acepta más eventos.
  #[error("la instancia está en estado terminal {state}")]
  Terminal { state: State },
  /// El contador del evento no es el siguiente esperado.
  #[error("contador {actual} fuera de secuencia, se esperaba {expected}")]
  CounterMismatch { expected: i64, actual: i64 },
  /// El evento no es válido para el estado actual.
  #[error("evento '{event}' inválido en estado {state}")]
  InvalidTransition { state: State, event: &'static str },
  /// El evento apunta a otra instancia.
  #[error("evento para {event_instance} aplicado sobre {state_instance}")]
  ForeignInstance { state_instance: String, event_instance: String },
}

/// Alias de resultado usado por las APIs del crate.
pub type Result<T> = std::result::Result<T, FlowError>;
