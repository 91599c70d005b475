// Archivo: execution_description.rs
// Propósito: al entrar en PREPARE resuelve la `ExecutionDescription` de la
// instancia a partir de la configuración y emite `submit`, o `halt` con el
// motivo si falta algo.
use super::OutputHandler;
use crate::errors::SchedulerError;
use flow::{ConfigRepository, Event, FlowError, RunState, State};
use log::{debug, warn};
use std::sync::Arc;
use thiserror::Error;
use wf_domain::{resolve_docker_image, ExecutionDescription, WorkflowId};

/// Motivo por el que no se pudo resolver la descripción. El `Display` es el
/// motivo que queda registrado en el halt.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResolutionError {
    #[error("missing workflow {0}")]
    MissingWorkflow(WorkflowId),
    #[error("no docker args")]
    NoDockerArgs,
    #[error("missing state")]
    MissingState,
    #[error("no docker image")]
    NoDockerImage,
    #[error("configuration store failure: {0}")]
    Storage(FlowError),
}

impl From<FlowError> for ResolutionError {
    fn from(e: FlowError) -> Self {
        ResolutionError::Storage(e)
    }
}

pub struct ExecutionDescriptionHandler<C>
    where C: ConfigRepository + ?Sized
{
    config: Arc<C>,
}

impl<C> ExecutionDescriptionHandler<C> where C: ConfigRepository + ?Sized
{
    pub fn new(config: Arc<C>) -> Self {
        Self { config }
    }

    /// Resuelve la descripción de ejecución de `workflow_id`.
    pub fn resolve(&self, workflow_id: &WorkflowId) -> Result<ExecutionDescription, ResolutionError> {
        let workflow = self.config
                           .workflow(workflow_id)?
                           .ok_or_else(|| ResolutionError::MissingWorkflow(workflow_id.clone()))?;
        let docker_args = workflow.schedule().docker_args.clone().ok_or(ResolutionError::NoDockerArgs)?;
        let state = self.config.workflow_state(workflow_id)?.ok_or(ResolutionError::MissingState)?;
        let docker_image = resolve_docker_image(&workflow, &state).ok_or(ResolutionError::NoDockerImage)?;
        Ok(ExecutionDescription { docker_image,
                                  docker_args,
                                  secret: workflow.schedule().secret.clone(),
                                  commit_sha: state.commit_sha.clone() })
    }
}

impl<C> OutputHandler for ExecutionDescriptionHandler<C> where C: ConfigRepository + ?Sized
{
    fn name(&self) -> &str {
        "execution-description"
    }

    fn transition_into(&self, state: &RunState) -> Result<Vec<Event>, SchedulerError> {
        if state.state != State::Prepare {
            return Ok(Vec::new());
        }
        let instance = state.workflow_instance.clone();
        match self.resolve(instance.workflow_id()) {
            Ok(description) => {
                debug!("{}: imagen resuelta {}", instance, description.docker_image);
                Ok(vec![Event::submit(instance, description)])
            }
            Err(reason) => {
                warn!("{}: no se pudo resolver la ejecución: {}", instance, reason);
                Ok(vec![Event::halt(instance, Some(reason.to_string()))])
            }
        }
    }
}
