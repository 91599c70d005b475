use flow::{engine, Event, Rejection, RunState, SequenceEvent, State, Trigger};
use wf_domain::{ExecutionDescription, WorkflowId, WorkflowInstance};

fn instance(param: &str) -> WorkflowInstance {
  WorkflowInstance::new(WorkflowId::new("styx", "daily").unwrap(), param).unwrap()
}

fn description() -> ExecutionDescription {
  ExecutionDescription { docker_image: "busybox:1".into(),
                         docker_args: vec!["echo".into(), "hi".into()],
                         secret: None,
                         commit_sha: Some("abc123".into()) }
}

/// Aplica los eventos en orden y devuelve todos los estados intermedios.
fn drive(i: &WorkflowInstance, events: Vec<Event>) -> Vec<RunState> {
  let mut state = RunState::fresh(i.clone(), -1);
  let mut out = Vec::new();
  for e in events {
    let seq = SequenceEvent::new(e, state.next_counter());
    state = engine::transition(&state, &seq).unwrap();
    out.push(state.clone());
  }
  out
}

#[test]
fn happy_path_reaches_done() {
  let i = instance("2016-09-14");
  let states = drive(&i,
                     vec![Event::trigger(i.clone(), Trigger::Natural),
                          Event::dequeue(i.clone()),
                          Event::submit(i.clone(), description()),
                          Event::submitted(i.clone(), "exec-1"),
                          Event::started(i.clone()),
                          Event::terminate(i.clone(), Some(0)),
                          Event::success(i.clone())]);
  let tags: Vec<State> = states.iter().map(|s| s.state).collect();
  assert_eq!(tags,
             vec![State::Queued,
                  State::Prepare,
                  State::Submitting,
                  State::Submitted,
                  State::Running,
                  State::Terminated,
                  State::Done]);
  let last = states.last().unwrap();
  assert_eq!(last.counter, 6);
  assert_eq!(last.data.tries, 1);
  assert_eq!(last.data.execution_id.as_deref(), Some("exec-1"));
  assert_eq!(last.data.execution_description, Some(description()));
  assert_eq!(last.data.last_exit, Some(0));
  assert!(last.is_terminal());
}

#[test]
fn failed_run_can_be_retried_and_counts_tries() {
  let i = instance("2016-09-15");
  let states = drive(&i,
                     vec![Event::trigger(i.clone(), Trigger::Natural),
                          Event::dequeue(i.clone()),
                          Event::run_error(i.clone(), "image pull failed"),
                          Event::retry_after(i.clone(), 1_000),
                          Event::dequeue(i.clone())]);
  let failed = &states[2];
  assert_eq!(failed.state, State::Failed);
  assert_eq!(failed.data.messages, vec!["image pull failed".to_string()]);
  assert_eq!(states[3].state, State::Queued);
  assert_eq!(states[3].data.retry_delay_millis, Some(1_000));
  let again = &states[4];
  assert_eq!(again.state, State::Prepare);
  assert_eq!(again.data.tries, 2);
  assert_eq!(again.data.retry_delay_millis, None);
}

#[test]
fn timeout_and_stop_end_in_error() {
  let i = instance("2016-09-16");
  let states = drive(&i,
                     vec![Event::trigger(i.clone(), Trigger::Backfill { id: "bf-1".into() }),
                          Event::timeout(i.clone()),
                          Event::stop(i.clone())]);
  assert_eq!(states[1].state, State::Failed);
  assert_eq!(states[1].data.messages, vec!["timeout".to_string()]);
  assert_eq!(states[2].state, State::Error);
  assert!(states[2].is_terminal());
}

#[test]
fn terminal_state_rejects_everything() {
  let i = instance("2016-09-17");
  let halted = drive(&i, vec![Event::halt(i.clone(), Some("bye".into()))]).pop().unwrap();
  let err = engine::transition(&halted, &SequenceEvent::new(Event::trigger(i.clone(), Trigger::Natural), 1))
    .unwrap_err();
  assert_eq!(err, Rejection::Terminal { state: State::Halted });
}

#[test]
fn foreign_instance_is_rejected_before_counter_check() {
  let a = instance("a");
  let b = instance("b");
  let state = RunState::fresh(a, -1);
  let err = engine::transition(&state, &SequenceEvent::new(Event::trigger(b, Trigger::Natural), 9)).unwrap_err();
  assert!(matches!(err, Rejection::ForeignInstance { .. }));
}

#[test]
fn invalid_pairs_are_rejected() {
  let i = instance("2016-09-18");
  let queued = drive(&i, vec![Event::trigger(i.clone(), Trigger::Natural)]).pop().unwrap();
  for event in [Event::success(i.clone()), Event::started(i.clone()), Event::stop(i.clone())] {
    let name = event.kind.name();
    let err = engine::transition(&queued, &SequenceEvent::new(event, 1)).unwrap_err();
    assert_eq!(err, Rejection::InvalidTransition { state: State::Queued, event: name });
  }
}

#[test]
fn fold_matches_step_by_step_application() {
  let i = instance("2016-09-19");
  let events = vec![Event::trigger(i.clone(), Trigger::Natural),
                    Event::dequeue(i.clone()),
                    Event::submit(i.clone(), description())];
  let stepwise = drive(&i, events.clone()).pop().unwrap();
  let seqs: Vec<SequenceEvent> =
    events.into_iter().enumerate().map(|(n, e)| SequenceEvent::new(e, n as i64)).collect();
  let folded = engine::fold(&i, &seqs).unwrap();
  assert_eq!(folded.state, stepwise.state);
  assert_eq!(folded.counter, stepwise.counter);
  assert_eq!(folded.data, stepwise.data);
}

#[test]
fn state_display_is_uppercase() {
  assert_eq!(State::Submitting.to_string(), "SUBMITTING");
  assert!(!State::Failed.is_terminal());
  assert!(State::Done.is_terminal());
}
