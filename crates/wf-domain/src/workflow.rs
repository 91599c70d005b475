// workflow.rs
use crate::WorkflowId;
use serde::{Deserialize, Serialize};

/// Secreto montado en el contenedor al ejecutar.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Secret {
  pub name: String,
  pub mount_path: String,
}

/// Configuración estática de ejecución de un workflow.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schedule {
  pub docker_image: Option<String>,
  pub docker_args: Option<Vec<String>>,
  pub secret: Option<Secret>,
}

/// Definición de un workflow: id más su `Schedule`. Sólo el store de
/// configuración la crea o reemplaza.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Workflow {
  id: WorkflowId,
  schedule: Schedule,
}

impl Workflow {
  pub fn new(id: WorkflowId, schedule: Schedule) -> Self {
    Self { id, schedule }
  }

  pub fn id(&self) -> &WorkflowId {
    &self.id
  }

  pub fn schedule(&self) -> &Schedule {
    &self.schedule
  }
}
