use super::OutputHandler;
use crate::errors::SchedulerError;
use flow::{Event, RunState};
use log::info;

/// Registra cada transición confirmada.
#[derive(Debug, Default)]
pub struct TransitionLogger;

impl OutputHandler for TransitionLogger {
    fn name(&self) -> &str {
        "transition-logger"
    }

    fn transition_into(&self, state: &RunState) -> Result<Vec<Event>, SchedulerError> {
        info!("{} -> {} (counter {}, tries {})",
              state.workflow_instance,
              state.state,
              state.counter,
              state.data.tries);
        Ok(Vec::new())
    }
}
