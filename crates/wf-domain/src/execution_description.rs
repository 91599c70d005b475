// execution_description.rs
use crate::{Secret, Workflow, WorkflowState};
use serde::{Deserialize, Serialize};

/// Parámetros resueltos, listos para ejecutar una instancia.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionDescription {
  pub docker_image: String,
  pub docker_args: Vec<String>,
  pub secret: Option<Secret>,
  pub commit_sha: Option<String>,
}

/// Imagen docker efectiva: el override del `WorkflowState` siempre gana; la
/// imagen del `Schedule` sólo se usa cuando no hay override.
pub fn resolve_docker_image(workflow: &Workflow, state: &WorkflowState) -> Option<String> {
  state.docker_image.clone().or_else(|| workflow.schedule().docker_image.clone())
}
