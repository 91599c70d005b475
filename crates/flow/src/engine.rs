// Archivo: engine.rs
// Propósito: función de transición pura de la máquina de estados y pliegue
// (`fold`) de una historia de eventos sobre `RunState`.
//
// Nada en este módulo hace I/O: los callers (State Manager, restauración)
// deciden qué persistir con el resultado.
use crate::domain::{EventKind, SequenceEvent};
use crate::errors::Rejection;
use crate::run_state::{RunState, State};
use wf_domain::WorkflowInstance;

/// Aplica `event` sobre `current`.
///
/// Orden de validación:
/// 1. el evento debe pertenecer a la misma instancia,
/// 2. el estado actual no puede ser terminal,
/// 3. el contador debe ser exactamente `current.counter + 1`,
/// 4. el par (estado, evento) debe estar en la tabla de transiciones.
///
/// Un rechazo deja `current` intacto.
pub fn transition(current: &RunState, event: &SequenceEvent) -> Result<RunState, Rejection> {
    if event.workflow_instance() != &current.workflow_instance {
        return Err(Rejection::ForeignInstance { state_instance: current.workflow_instance.to_key(),
                                                event_instance: event.workflow_instance().to_key() });
    }
    if current.is_terminal() {
        return Err(Rejection::Terminal { state: current.state });
    }
    let expected = current.next_counter();
    if event.counter != expected {
        return Err(Rejection::CounterMismatch { expected, actual: event.counter });
    }

    let mut next = current.clone();
    let from = current.state;
    let invalid = || Rejection::InvalidTransition { state: from, event: event.event.kind.name() };

    next.state = match &event.event.kind {
        EventKind::TriggerExecution { trigger } => match from {
            State::New => {
                next.data.trigger = Some(trigger.clone());
                next.data.tries = 0;
                State::Queued
            }
            _ => return Err(invalid()),
        },
        EventKind::Dequeue => match from {
            State::Queued => {
                next.data.tries += 1;
                next.data.retry_delay_millis = None;
                State::Prepare
            }
            _ => return Err(invalid()),
        },
        EventKind::Submit { description } => match from {
            State::Prepare => {
                next.data.execution_description = Some(description.clone());
                State::Submitting
            }
            _ => return Err(invalid()),
        },
        EventKind::Submitted { execution_id } => match from {
            State::Submitting => {
                next.data.execution_id = Some(execution_id.clone());
                State::Submitted
            }
            _ => return Err(invalid()),
        },
        EventKind::Started => match from {
            State::Submitted => State::Running,
            _ => return Err(invalid()),
        },
        EventKind::Terminate { exit_code } => match from {
            State::Submitted | State::Running => {
                next.data.last_exit = *exit_code;
                State::Terminated
            }
            _ => return Err(invalid()),
        },
        EventKind::RunError { message } => match from {
            State::Prepare | State::Submitting | State::Submitted | State::Running => {
                next.data.messages.push(message.clone());
                State::Failed
            }
            _ => return Err(invalid()),
        },
        EventKind::Timeout => match from {
            State::Queued | State::Prepare | State::Submitting | State::Submitted | State::Running => {
                next.data.messages.push("timeout".to_string());
                State::Failed
            }
            _ => return Err(invalid()),
        },
        EventKind::RetryAfter { delay_millis } => match from {
            State::Terminated | State::Failed => {
                next.data.retry_delay_millis = Some(*delay_millis);
                next.data.execution_id = None;
                State::Queued
            }
            _ => return Err(invalid()),
        },
        EventKind::Success => match from {
            State::Terminated => State::Done,
            _ => return Err(invalid()),
        },
        EventKind::Stop => match from {
            State::Terminated | State::Failed => State::Error,
            _ => return Err(invalid()),
        },
        // Terminales ya filtrados arriba: halt vale desde cualquier otro estado.
        EventKind::Halt { reason } => {
            if let Some(reason) = reason {
                next.data.messages.push(reason.clone());
            }
            State::Halted
        }
    };

    next.counter = event.counter;
    next.timestamp = Some(event.timestamp);
    Ok(next)
}

/// Reconstruye el estado de `instance` aplicando `events` en orden desde
/// `NEW`. Tras alcanzar un estado terminal el siguiente evento arranca un run
/// nuevo sobre un `NEW` implícito que conserva el contador.
pub fn fold<'a, I>(instance: &WorkflowInstance, events: I) -> Result<RunState, Rejection>
    where I: IntoIterator<Item = &'a SequenceEvent>
{
    let mut state = RunState::fresh(instance.clone(), -1);
    for event in events {
        if state.is_terminal() {
            state = RunState::fresh(instance.clone(), state.counter);
        }
        state = transition(&state, event)?;
    }
    Ok(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Event, Trigger};
    use wf_domain::WorkflowId;

    fn instance() -> WorkflowInstance {
        WorkflowInstance::new(WorkflowId::new("styx", "hourly").unwrap(), "2016-09-14T10").unwrap()
    }

    fn seq(event: Event, counter: i64) -> SequenceEvent {
        SequenceEvent::new(event, counter)
    }

    #[test]
    fn trigger_moves_new_to_queued() {
        let state = RunState::fresh(instance(), -1);
        let next = transition(&state, &seq(Event::trigger(instance(), Trigger::Natural), 0)).unwrap();
        assert_eq!(next.state, State::Queued);
        assert_eq!(next.counter, 0);
        assert_eq!(next.data.trigger, Some(Trigger::Natural));
        assert!(next.timestamp.is_some());
    }

    #[test]
    fn rejection_leaves_state_untouched() {
        let state = RunState::fresh(instance(), -1);
        let before = state.clone();
        let err = transition(&state, &seq(Event::dequeue(instance()), 0)).unwrap_err();
        assert_eq!(err, Rejection::InvalidTransition { state: State::New, event: "dequeue" });
        assert_eq!(state, before);
    }

    #[test]
    fn counter_must_be_next() {
        let state = RunState::fresh(instance(), -1);
        let err = transition(&state, &seq(Event::trigger(instance(), Trigger::Natural), 3)).unwrap_err();
        assert_eq!(err, Rejection::CounterMismatch { expected: 0, actual: 3 });
    }

    #[test]
    fn halt_is_accepted_from_new() {
        let state = RunState::fresh(instance(), 4);
        let next = transition(&state, &seq(Event::halt(instance(), Some("manual".into())), 5)).unwrap();
        assert_eq!(next.state, State::Halted);
        assert_eq!(next.data.messages, vec!["manual".to_string()]);
    }

    #[test]
    fn fold_restarts_after_terminal() {
        let i = instance();
        let events = vec![seq(Event::trigger(i.clone(), Trigger::Natural), 0),
                          seq(Event::halt(i.clone(), None), 1),
                          seq(Event::trigger(i.clone(), Trigger::Adhoc { id: "a1".into() }), 2)];
        let state = fold(&i, &events).unwrap();
        assert_eq!(state.state, State::Queued);
        assert_eq!(state.counter, 2);
        assert_eq!(state.data.trigger, Some(Trigger::Adhoc { id: "a1".into() }));
        assert!(state.data.messages.is_empty());
    }
}
