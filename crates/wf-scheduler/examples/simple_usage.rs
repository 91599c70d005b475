use flow::{ConfigRepository, Event, InMemoryStorage, Trigger};
use std::sync::Arc;
use wf_domain::{Schedule, Workflow, WorkflowId, WorkflowInstance, WorkflowState};
use wf_scheduler::{standard_manager, SchedulerConfig};

// Ejemplo mínimo: un workflow en memoria llevado de NEW a DONE.
fn main() -> Result<(), Box<dyn std::error::Error>> {
    let storage = Arc::new(InMemoryStorage::new());
    let id = WorkflowId::new("demo", "daily")?;
    storage.store_workflow(&Workflow::new(id.clone(),
                                          Schedule { docker_image: Some("busybox:1".into()),
                                                     docker_args: Some(vec!["echo".into(), "hola".into()]),
                                                     secret: None }))?;
    storage.patch_state(&id, &WorkflowState::default().with_enabled(true))?;

    let manager = standard_manager(storage.clone(), &SchedulerConfig::default());
    let instance = WorkflowInstance::new(id, "2016-09-14")?;
    manager.trigger(instance.clone(), Trigger::Natural)?;
    manager.receive(Event::dequeue(instance.clone()))?;
    manager.receive(Event::submitted(instance.clone(), "exec-1"))?;
    manager.receive(Event::started(instance.clone()))?;
    manager.receive(Event::terminate(instance.clone(), Some(0)))?;

    for event in manager.history(&instance)? {
        println!("{:>3} {}", event.counter, event.event.kind.name());
    }
    println!("estado final: {:?}", manager.get(&instance)?.map(|s| s.state));
    Ok(())
}
