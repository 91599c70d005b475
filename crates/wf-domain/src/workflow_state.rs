// workflow_state.rs
use serde::{Deserialize, Serialize};

/// Estado dinámico por workflow. Todos los campos son opcionales: un valor
/// de este tipo sirve tanto de estado almacenado como de parche parcial.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowState {
  pub enabled: Option<bool>,
  pub docker_image: Option<String>,
  pub commit_sha: Option<String>,
}

impl WorkflowState {
  pub fn with_enabled(mut self, enabled: bool) -> Self {
    self.enabled = Some(enabled);
    self
  }

  pub fn with_docker_image(mut self, image: impl Into<String>) -> Self {
    self.docker_image = Some(image.into());
    self
  }

  pub fn with_commit_sha(mut self, sha: impl Into<String>) -> Self {
    self.commit_sha = Some(sha.into());
    self
  }

  /// Aplica `delta` sobre `self`: sólo cambian los campos presentes.
  pub fn patch(&mut self, delta: &WorkflowState) {
    if let Some(enabled) = delta.enabled {
      self.enabled = Some(enabled);
    }
    if let Some(image) = &delta.docker_image {
      self.docker_image = Some(image.clone());
    }
    if let Some(sha) = &delta.commit_sha {
      self.commit_sha = Some(sha.clone());
    }
  }

  /// Un workflow sin flag explícito se considera deshabilitado.
  pub fn is_enabled(&self) -> bool {
    self.enabled.unwrap_or(false)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn patch_only_touches_supplied_fields() {
    let mut state = WorkflowState::default().with_enabled(true).with_docker_image("img:1");
    state.patch(&WorkflowState::default().with_commit_sha("abc123"));
    assert_eq!(state.enabled, Some(true));
    assert_eq!(state.docker_image.as_deref(), Some("img:1"));
    assert_eq!(state.commit_sha.as_deref(), Some("abc123"));

    state.patch(&WorkflowState::default().with_enabled(false));
    assert!(!state.is_enabled());
    assert_eq!(state.docker_image.as_deref(), Some("img:1"));
  }
}
