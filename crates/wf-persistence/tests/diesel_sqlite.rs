use flow::{ActiveStateRepository, ConfigRepository, Event, EventRepository, FlowError, SequenceEvent, Trigger};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;
use wf_domain::{ExecutionDescription, Schedule, Secret, Workflow, WorkflowId, WorkflowInstance, WorkflowState};
use wf_persistence::{new_aggregate_from_env, AggregateStorage, DieselConfigRepository, DieselEventRepository, MirrorPolicy};

// Base SQLite en archivo temporal: evita problemas de parsing de URIs con
// distintas builds de sqlite.
fn temp_db(tag: &str) -> PathBuf {
  std::env::temp_dir().join(format!("wf_{}_{}.db", tag, Uuid::new_v4()))
}

fn cleanup(path: &PathBuf) {
  let _ = std::fs::remove_file(path);
  let _ = std::fs::remove_file(path.with_extension("db-wal"));
  let _ = std::fs::remove_file(path.with_extension("db-shm"));
}

fn instance(p: &str) -> WorkflowInstance {
  WorkflowInstance::new(WorkflowId::new("styx", "daily").unwrap(), p).unwrap()
}

#[test]
fn event_log_roundtrip_and_counter_guard() {
  if cfg!(feature = "pg") {
    eprintln!("skipping sqlite-only persistence test because 'pg' feature is enabled");
    return;
  }
  let path = temp_db("events");
  let repo = DieselEventRepository::new(path.to_str().unwrap()).expect("repo");
  let i = instance("2016-09-14");
  let description = ExecutionDescription { docker_image: "busybox:1".into(),
                                           docker_args: vec!["true".into()],
                                           secret: Some(Secret { name: "s".into(), mount_path: "/s".into() }),
                                           commit_sha: None };

  assert_eq!(repo.latest_stored_counter(&i).unwrap(), None);
  repo.write_event(&SequenceEvent::new(Event::trigger(i.clone(), Trigger::Adhoc { id: "x".into() }), 0)).unwrap();
  repo.write_event(&SequenceEvent::new(Event::dequeue(i.clone()), 1)).unwrap();
  repo.write_event(&SequenceEvent::new(Event::submit(i.clone(), description.clone()), 2)).unwrap();

  let skipped = repo.write_event(&SequenceEvent::new(Event::started(i.clone()), 5));
  assert!(matches!(skipped, Err(FlowError::Conflict(_))));
  let duplicate = repo.write_event(&SequenceEvent::new(Event::started(i.clone()), 2));
  assert!(matches!(duplicate, Err(FlowError::Conflict(_))));

  assert_eq!(repo.latest_stored_counter(&i).unwrap(), Some(2));
  let events = repo.read_events(&i).unwrap();
  let counters: Vec<i64> = events.iter().map(|e| e.counter).collect();
  assert_eq!(counters, vec![0, 1, 2]);
  assert_eq!(events[0].event.kind, Event::trigger(i.clone(), Trigger::Adhoc { id: "x".into() }).kind);
  assert_eq!(events[2].event, Event::submit(i.clone(), description));

  repo.write_event(&SequenceEvent::new(Event::trigger(instance("2016-09-13"), Trigger::Natural), 0)).unwrap();
  let history = repo.execution_history(&WorkflowId::new("styx", "daily").unwrap()).unwrap();
  let summary: Vec<(String, usize)> = history.iter().map(|(i, ev)| (i.parameter().to_string(), ev.len())).collect();
  assert_eq!(summary, vec![("2016-09-13".to_string(), 1), ("2016-09-14".to_string(), 3)]);

  let latest = repo.latest_stored_counters().unwrap();
  assert_eq!(latest.len(), 2);
  assert_eq!(latest.get(&i), Some(&2));
  assert_eq!(latest.get(&instance("2016-09-13")), Some(&0));
  cleanup(&path);
}

#[test]
fn active_index_upserts_and_deletes() {
  if cfg!(feature = "pg") {
    return;
  }
  let path = temp_db("active");
  let repo = DieselEventRepository::new(path.to_str().unwrap()).expect("repo");
  let i = instance("p");
  repo.write_active_state(&i, 0).unwrap();
  repo.write_active_state(&i, 3).unwrap();
  assert_eq!(repo.read_active_states().unwrap().get(&i), Some(&3));
  repo.delete_active_state(&i).unwrap();
  repo.delete_active_state(&i).unwrap();
  assert!(repo.read_active_states().unwrap().is_empty());
  cleanup(&path);
}

#[test]
fn config_store_persists_workflows_and_flags() {
  if cfg!(feature = "pg") {
    return;
  }
  let path = temp_db("config");
  let cfg = DieselConfigRepository::new(path.to_str().unwrap()).expect("config");
  let a = WorkflowId::new("comp", "a").unwrap();
  let b = WorkflowId::new("comp", "b").unwrap();
  let schedule = Schedule { docker_image: Some("img:1".into()),
                            docker_args: Some(vec!["run".into()]),
                            secret: None };
  cfg.store_workflow(&Workflow::new(a.clone(), schedule.clone())).unwrap();
  cfg.store_workflow(&Workflow::new(b.clone(), Schedule::default())).unwrap();
  assert_eq!(cfg.workflow(&a).unwrap().map(|w| w.schedule().clone()), Some(schedule));
  assert_eq!(cfg.workflow(&WorkflowId::new("comp", "zzz").unwrap()).unwrap(), None);

  assert!(!cfg.enabled(&a).unwrap());
  cfg.patch_component_state("comp", &WorkflowState::default().with_enabled(true)).unwrap();
  cfg.patch_state(&a, &WorkflowState::default().with_docker_image("img:2").with_commit_sha("abc")).unwrap();
  let state = cfg.workflow_state(&a).unwrap().expect("state row");
  assert_eq!(state.enabled, Some(true));
  assert_eq!(state.commit_sha.as_deref(), Some("abc"));
  assert_eq!(cfg.docker_image(&a).unwrap().as_deref(), Some("img:2"));
  assert_eq!(cfg.enabled_workflows().unwrap(), [a.clone(), b.clone()].into_iter().collect());

  assert!(cfg.global_enabled().unwrap());
  assert!(cfg.set_global_enabled(false).unwrap());
  assert!(!cfg.global_enabled().unwrap());
  cleanup(&path);
}

#[test]
fn aggregate_over_two_sqlite_files_mirrors_active_index() {
  if cfg!(feature = "pg") {
    return;
  }
  let primary_path = temp_db("primary");
  let secondary_path = temp_db("secondary");
  let primary = Arc::new(DieselEventRepository::new(primary_path.to_str().unwrap()).expect("primary"));
  let secondary = Arc::new(DieselConfigRepository::new(secondary_path.to_str().unwrap()).expect("secondary"));
  let agg = AggregateStorage::new(primary, secondary, MirrorPolicy::default()).expect("aggregate");
  let i = instance("mirror");
  agg.write_active_state(&i, 2).unwrap();
  assert!(agg.wait_mirror_idle(Duration::from_secs(10)));
  assert_eq!(agg.read_active_states().unwrap().get(&i), Some(&2));
  assert_eq!(agg.secondary_active_states().unwrap().get(&i), Some(&2));
  agg.shutdown();
  drop(agg);
  cleanup(&primary_path);
  cleanup(&secondary_path);
}

#[test]
fn primary_and_mirror_indexes_stay_apart_on_one_sqlite_file() {
  if cfg!(feature = "pg") {
    return;
  }
  let path = temp_db("shared");
  let url = path.to_str().unwrap();
  let primary = Arc::new(DieselEventRepository::new(url).expect("primary"));
  let secondary = Arc::new(DieselConfigRepository::new(url).expect("secondary"));
  let agg = AggregateStorage::new(primary.clone(), secondary.clone(), MirrorPolicy::default()).expect("aggregate");
  let i = instance("shared");

  agg.write_active_state(&i, 0).unwrap();
  agg.write_active_state(&i, 1).unwrap();
  agg.delete_active_state(&i).unwrap();
  assert!(agg.wait_mirror_idle(Duration::from_secs(10)));
  assert!(agg.read_active_states().unwrap().is_empty());
  assert!(agg.secondary_active_states().unwrap().is_empty());

  // Una escritura espejo tardía solo toca la copia del secundario.
  secondary.write_active_state(&i, 1).unwrap();
  assert!(primary.read_active_states().unwrap().is_empty());
  assert_eq!(agg.secondary_active_states().unwrap().get(&i), Some(&1));

  primary.write_active_state(&i, 7).unwrap();
  secondary.delete_active_state(&i).unwrap();
  assert_eq!(agg.read_active_states().unwrap().get(&i), Some(&7));
  agg.shutdown();
  drop(agg);
  cleanup(&path);
}

#[test]
fn env_default_layout_shares_one_database() {
  if cfg!(feature = "pg") {
    return;
  }
  let path = temp_db("env");
  std::env::set_var("WF_PRIMARY_DB_URL", path.to_str().unwrap());
  std::env::remove_var("WF_SECONDARY_DB_URL");
  let agg = new_aggregate_from_env(MirrorPolicy { queue_capacity: 1, ..MirrorPolicy::default() }).expect("aggregate");
  let i = instance("env");

  agg.write_active_state(&i, 0).unwrap();
  agg.write_active_state(&i, 1).unwrap();
  agg.delete_active_state(&i).unwrap();
  assert!(agg.read_active_states().unwrap().is_empty());
  assert!(agg.wait_mirror_idle(Duration::from_secs(10)));
  assert!(agg.read_active_states().unwrap().is_empty(), "un trabajo espejo reescribió el índice primario");

  agg.secondary().write_active_state(&i, 1).unwrap();
  assert!(agg.read_active_states().unwrap().is_empty());
  agg.shutdown();
  drop(agg);
  cleanup(&path);
}
