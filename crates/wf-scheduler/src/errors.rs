use flow::{FlowError, Rejection};
use thiserror::Error;
use wf_domain::DomainError;

// Errores del State Manager y de los handlers.
//
// `Rejected` y `TriggerBlocked` no son fallos de infraestructura: el evento
// simplemente no se aplicó. `IsClosed` se distingue para que los handlers
// puedan ignorarlo durante el apagado.
#[derive(Error, Debug)]
pub enum SchedulerError {
  /// El manager fue cerrado con `close()`.
  #[error("el state manager está cerrado")]
  IsClosed,

  /// La función de transición rechazó el evento.
  #[error("evento rechazado: {0}")]
  Rejected(#[from] Rejection),

  /// Kill switch global o flag `enabled` del workflow impiden el trigger.
  #[error("trigger bloqueado: {0}")]
  TriggerBlocked(String),

  /// Errores de la capa de almacenamiento.
  #[error("Error de flujo: {0}")]
  Flow(#[from] FlowError),

  /// Errores de validación de valores del dominio.
  #[error("Error de dominio: {0}")]
  Domain(#[from] DomainError),

  /// Fallo inesperado de un output handler.
  #[error("Error de handler: {0}")]
  Handler(String),

  /// Configuración inválida (variables de entorno).
  #[error("Error de configuración: {0}")]
  Config(String),
}
