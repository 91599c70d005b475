// ids.rs
use crate::DomainError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Separador usado en las claves textuales de workflows e instancias.
const KEY_SEPARATOR: char = '#';

/// Identificador de un workflow: (componente, endpoint).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct WorkflowId {
  component_id: String,
  endpoint_id: String,
}

impl WorkflowId {
  pub fn new(component_id: &str, endpoint_id: &str) -> Result<Self, DomainError> {
    validate_part("component_id", component_id)?;
    validate_part("endpoint_id", endpoint_id)?;
    Ok(Self { component_id: component_id.to_string(), endpoint_id: endpoint_id.to_string() })
  }

  pub fn component_id(&self) -> &str {
    &self.component_id
  }

  pub fn endpoint_id(&self) -> &str {
    &self.endpoint_id
  }

  /// Clave estable `componente#endpoint`.
  pub fn to_key(&self) -> String {
    format!("{}{}{}", self.component_id, KEY_SEPARATOR, self.endpoint_id)
  }
}

impl fmt::Display for WorkflowId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.to_key())
  }
}

/// Una ejecución concreta de un workflow, identificada por el parámetro de
/// partición (por ejemplo `2016-09-14` o `2016-09-14T17`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct WorkflowInstance {
  workflow_id: WorkflowId,
  parameter: String,
}

impl WorkflowInstance {
  pub fn new(workflow_id: WorkflowId, parameter: &str) -> Result<Self, DomainError> {
    if parameter.trim().is_empty() {
      return Err(DomainError::Validation("El parámetro de la instancia no puede estar vacío".to_string()));
    }
    Ok(Self { workflow_id, parameter: parameter.to_string() })
  }

  pub fn workflow_id(&self) -> &WorkflowId {
    &self.workflow_id
  }

  pub fn parameter(&self) -> &str {
    &self.parameter
  }

  /// Clave estable `componente#endpoint#parametro`.
  pub fn to_key(&self) -> String {
    format!("{}{}{}", self.workflow_id.to_key(), KEY_SEPARATOR, self.parameter)
  }

  /// Inverso de `to_key`. El parámetro puede contener el separador; el
  /// componente y el endpoint no.
  pub fn from_key(key: &str) -> Result<Self, DomainError> {
    let mut parts = key.splitn(3, KEY_SEPARATOR);
    match (parts.next(), parts.next(), parts.next()) {
      (Some(component), Some(endpoint), Some(parameter)) => {
        Self::new(WorkflowId::new(component, endpoint)?, parameter)
      }
      _ => Err(DomainError::Validation(format!("Clave de instancia inválida: '{}'", key))),
    }
  }
}

impl fmt::Display for WorkflowInstance {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.to_key())
  }
}

fn validate_part(name: &str, value: &str) -> Result<(), DomainError> {
  if value.trim().is_empty() {
    return Err(DomainError::Validation(format!("{} no puede estar vacío", name)));
  }
  if value.contains(KEY_SEPARATOR) {
    return Err(DomainError::Validation(format!("{} no puede contener '{}'", name, KEY_SEPARATOR)));
  }
  Ok(())
}
