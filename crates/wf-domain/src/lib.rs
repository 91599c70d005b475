mod errors;
mod execution_description;
mod ids;
mod workflow;
mod workflow_state;

pub use errors::DomainError;
pub use execution_description::{resolve_docker_image, ExecutionDescription};
pub use ids::{WorkflowId, WorkflowInstance};
pub use workflow::{Schedule, Secret, Workflow};
pub use workflow_state::WorkflowState;
