use flow::{ActiveStateRepository, ConfigRepository, Event, EventRepository, FlowError, InMemoryConfigRepository,
           InMemoryEventRepository, SequenceEvent, Trigger};
use wf_domain::{Schedule, Workflow, WorkflowId, WorkflowInstance, WorkflowState};

fn wid(c: &str, e: &str) -> WorkflowId {
  WorkflowId::new(c, e).unwrap()
}

#[test]
fn write_event_enforces_counter_sequence() {
  let repo = InMemoryEventRepository::new();
  let i = WorkflowInstance::new(wid("c", "e"), "p").unwrap();
  assert_eq!(repo.latest_stored_counter(&i).unwrap(), None);

  let err = repo.write_event(&SequenceEvent::new(Event::trigger(i.clone(), Trigger::Natural), 1)).unwrap_err();
  assert!(matches!(err, FlowError::Conflict(_)));

  repo.write_event(&SequenceEvent::new(Event::trigger(i.clone(), Trigger::Natural), 0)).unwrap();
  repo.write_event(&SequenceEvent::new(Event::dequeue(i.clone()), 1)).unwrap();
  let dup = repo.write_event(&SequenceEvent::new(Event::dequeue(i.clone()), 1));
  assert!(matches!(dup, Err(FlowError::Conflict(_))));

  assert_eq!(repo.latest_stored_counter(&i).unwrap(), Some(1));
  let counters: Vec<i64> = repo.read_events(&i).unwrap().iter().map(|e| e.counter).collect();
  assert_eq!(counters, vec![0, 1]);
}

#[test]
fn execution_history_groups_by_instance() {
  let repo = InMemoryEventRepository::new();
  let id = wid("c", "e");
  for p in ["b", "a"] {
    let i = WorkflowInstance::new(id.clone(), p).unwrap();
    repo.write_event(&SequenceEvent::new(Event::trigger(i, Trigger::Natural), 0)).unwrap();
  }
  let other = WorkflowInstance::new(wid("c", "other"), "a").unwrap();
  repo.write_event(&SequenceEvent::new(Event::trigger(other, Trigger::Natural), 0)).unwrap();

  let history = repo.execution_history(&id).unwrap();
  let params: Vec<&str> = history.iter().map(|(i, _)| i.parameter()).collect();
  assert_eq!(params, vec!["a", "b"]);
  assert!(history.iter().all(|(_, events)| events.len() == 1));
}

#[test]
fn active_index_and_failure_injection() {
  let repo = InMemoryEventRepository::new();
  let i = WorkflowInstance::new(wid("c", "e"), "p").unwrap();
  repo.write_active_state(&i, 3).unwrap();
  assert_eq!(repo.read_active_states().unwrap().get(&i), Some(&3));

  repo.set_fail_writes(true);
  assert!(matches!(repo.delete_active_state(&i), Err(FlowError::Storage(_))));
  repo.set_fail_writes(false);
  repo.delete_active_state(&i).unwrap();
  repo.delete_active_state(&i).unwrap();
  assert!(repo.read_active_states().unwrap().is_empty());

  repo.set_fail_active_writes(true);
  assert!(matches!(repo.write_active_state(&i, 4), Err(FlowError::Storage(_))));
  repo.write_event(&SequenceEvent::new(Event::trigger(i.clone(), Trigger::Natural), 0)).unwrap();
  repo.set_fail_active_writes(false);
  assert!(repo.read_active_states().unwrap().is_empty());
  assert_eq!(repo.latest_stored_counters().unwrap().get(&i), Some(&0));
}

#[test]
fn config_defaults_and_patches() {
  let cfg = InMemoryConfigRepository::new();
  let a = wid("comp", "a");
  let b = wid("comp", "b");
  let other = wid("other", "x");

  assert!(cfg.global_enabled().unwrap());
  assert!(!cfg.enabled(&a).unwrap());
  assert_eq!(cfg.workflow_state(&a).unwrap(), None);

  for id in [&a, &b, &other] {
    cfg.store_workflow(&Workflow::new(id.clone(), Schedule { docker_image: Some("img:1".into()),
                                                             ..Schedule::default() }))
       .unwrap();
  }
  cfg.patch_component_state("comp", &WorkflowState::default().with_enabled(true)).unwrap();
  assert_eq!(cfg.enabled_workflows().unwrap(), [a.clone(), b.clone()].into_iter().collect());

  cfg.patch_state(&a, &WorkflowState::default().with_docker_image("img:2")).unwrap();
  assert!(cfg.enabled(&a).unwrap());
  assert_eq!(cfg.docker_image(&a).unwrap().as_deref(), Some("img:2"));
  assert_eq!(cfg.docker_image(&b).unwrap().as_deref(), Some("img:1"));
  assert_eq!(cfg.docker_image(&wid("missing", "x")).unwrap(), None);

  assert!(cfg.set_global_enabled(false).unwrap());
  assert!(!cfg.set_global_enabled(true).unwrap());
}
