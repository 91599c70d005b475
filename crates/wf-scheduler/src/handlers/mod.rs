//! Output handlers: se invocan tras cada transición confirmada y devuelven
//! eventos de seguimiento que el State Manager vuelve a aplicar.

mod execution_description;
mod logger;
mod termination;

pub use execution_description::{ExecutionDescriptionHandler, ResolutionError};
pub use logger::TransitionLogger;
pub use termination::{RetryPolicy, TerminationHandler};

use crate::errors::SchedulerError;
use flow::{Event, RunState};

/// Reacción a un estado recién confirmado.
pub trait OutputHandler: Send + Sync {
    /// Nombre del handler, usado en logs y en motivos de halt.
    fn name(&self) -> &str;

    /// Eventos a aplicar como consecuencia de haber entrado en `state`.
    /// Un `Err` (o un panic) fuerza el halt de la instancia.
    fn transition_into(&self, state: &RunState) -> Result<Vec<Event>, SchedulerError>;
}
