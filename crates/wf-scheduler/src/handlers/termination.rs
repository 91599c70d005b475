// Archivo: termination.rs
// Propósito: decide qué sigue tras TERMINATED o FAILED: éxito, reintento
// con backoff exponencial o parada definitiva.
use super::OutputHandler;
use crate::errors::SchedulerError;
use flow::{Event, RunState, State};
use log::info;

/// Política de reintentos.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Intentos máximos (incluido el primero).
    pub max_tries: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self { max_tries: 3, base_delay_ms: 60_000, max_delay_ms: 3_600_000 }
    }
}

impl RetryPolicy {
    /// Espera antes del siguiente intento tras `tries` intentos:
    /// `base * 2^(tries-1)`, acotado por `max_delay_ms`.
    pub fn delay_for(&self, tries: u32) -> u64 {
        let exp = tries.saturating_sub(1).min(32);
        self.base_delay_ms.saturating_mul(1u64 << exp).min(self.max_delay_ms)
    }
}

pub struct TerminationHandler {
    policy: RetryPolicy,
}

impl TerminationHandler {
    pub fn new(policy: RetryPolicy) -> Self {
        Self { policy }
    }

    fn retry_or_stop(&self, state: &RunState) -> Event {
        let instance = state.workflow_instance.clone();
        if state.data.tries < self.policy.max_tries {
            let delay = self.policy.delay_for(state.data.tries);
            info!("{}: reintento {} en {} ms", instance, state.data.tries + 1, delay);
            Event::retry_after(instance, delay)
        } else {
            info!("{}: sin más reintentos tras {} intentos", instance, state.data.tries);
            Event::stop(instance)
        }
    }
}

impl OutputHandler for TerminationHandler {
    fn name(&self) -> &str {
        "termination"
    }

    fn transition_into(&self, state: &RunState) -> Result<Vec<Event>, SchedulerError> {
        let next = match state.state {
            State::Terminated if state.data.last_exit == Some(0) => Event::success(state.workflow_instance.clone()),
            State::Terminated | State::Failed => self.retry_or_stop(state),
            _ => return Ok(Vec::new()),
        };
        Ok(vec![next])
    }
}
