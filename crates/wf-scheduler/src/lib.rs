//! wf-scheduler: State Manager y output handlers del orquestador.
//!
//! El `StateManager` aplica eventos sobre instancias de workflow usando la
//! función de transición de `flow`, persiste cada transición a través de un
//! `flow::Storage` y reacciona con los `OutputHandler` registrados.

pub mod config;
pub mod errors;
pub mod handlers;
pub mod state_manager;

pub use config::SchedulerConfig;
pub use errors::SchedulerError;
pub use handlers::{ExecutionDescriptionHandler, OutputHandler, ResolutionError, RetryPolicy, TerminationHandler,
                   TransitionLogger};
pub use state_manager::StateManager;

use flow::Storage;
use std::sync::Arc;

/// Manager con los handlers estándar: resolución de ejecución, terminación
/// con reintentos y log de transiciones.
pub fn standard_manager<S>(storage: Arc<S>, config: &SchedulerConfig) -> StateManager<S>
    where S: Storage + 'static
{
    StateManager::new(storage.clone()).with_handler(Arc::new(TransitionLogger))
                                      .with_handler(Arc::new(ExecutionDescriptionHandler::new(storage)))
                                      .with_handler(Arc::new(TerminationHandler::new(config.retry)))
}
