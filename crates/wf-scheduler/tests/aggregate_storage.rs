use flow::{ConfigRepository, Event, InMemoryConfigRepository, InMemoryEventRepository, State, Trigger};
use std::sync::Arc;
use std::time::Duration;
use wf_domain::{Schedule, Workflow, WorkflowId, WorkflowInstance, WorkflowState};
use wf_persistence::{AggregateStorage, MirrorPolicy};
use wf_scheduler::{standard_manager, SchedulerConfig};

#[test]
fn manager_over_aggregate_storage_keeps_mirror_in_step() {
  let primary = Arc::new(InMemoryEventRepository::new());
  let secondary = Arc::new(InMemoryConfigRepository::new());
  let storage = Arc::new(AggregateStorage::new(primary.clone(), secondary.clone(), MirrorPolicy::default()).unwrap());

  let id = WorkflowId::new("styx", "daily").unwrap();
  storage.store_workflow(&Workflow::new(id.clone(),
                                        Schedule { docker_image: Some("busybox:1".into()),
                                                   docker_args: Some(vec!["true".into()]),
                                                   secret: None }))
         .unwrap();
  storage.patch_state(&id, &WorkflowState::default().with_enabled(true)).unwrap();

  let manager = standard_manager(storage.clone(), &SchedulerConfig::default());
  let running = WorkflowInstance::new(id.clone(), "2016-09-14").unwrap();
  let finished = WorkflowInstance::new(id.clone(), "2016-09-15").unwrap();

  for i in [&running, &finished] {
    manager.trigger(i.clone(), Trigger::Natural).unwrap();
    manager.receive(Event::dequeue(i.clone())).unwrap();
    manager.receive(Event::submitted(i.clone(), "exec")).unwrap();
  }
  manager.receive(Event::terminate(finished.clone(), Some(0))).unwrap();

  assert!(storage.wait_mirror_idle(Duration::from_secs(5)));
  let primary_index = manager.list_active().unwrap();
  let mirrored = storage.secondary_active_states().unwrap();
  assert_eq!(primary_index, mirrored);
  assert_eq!(primary_index.get(&running), Some(&3));
  assert!(!primary_index.contains_key(&finished));
  assert_eq!(manager.get(&finished).unwrap().map(|s| s.state), Some(State::Done));
  assert_eq!(storage.mirror_stats().failed, 0);
}

#[test]
fn broken_mirror_never_blocks_transitions() {
  let primary = Arc::new(InMemoryEventRepository::new());
  let secondary = Arc::new(InMemoryConfigRepository::new());
  secondary.set_fail_writes(true);
  let storage = Arc::new(AggregateStorage::new(primary, secondary, MirrorPolicy::default()).unwrap());
  let manager = standard_manager(storage.clone(), &SchedulerConfig::default());
  let i = WorkflowInstance::new(WorkflowId::new("c", "e").unwrap(), "p").unwrap();

  manager.trigger(i.clone(), Trigger::Adhoc { id: "manual".into() }).unwrap();
  assert!(storage.wait_mirror_idle(Duration::from_secs(5)));
  assert_eq!(manager.list_active().unwrap().get(&i), Some(&0));
  assert!(storage.secondary_active_states().unwrap().is_empty());
  assert!(storage.mirror_stats().failed >= 1);
}
