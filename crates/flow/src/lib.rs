//! Crate `flow` — modelo de eventos y máquina de estados de instancias
//!
//! Este crate define los eventos de ciclo de vida (`Event`, `SequenceEvent`),
//! el estado materializado de una instancia (`RunState`), la función de
//! transición pura (`engine`) y los contratos de persistencia
//! (`EventRepository`, `ActiveStateRepository`, `ConfigRepository`), junto con
//! implementaciones en memoria útiles para pruebas (`stubs`).
//!
//! Diseño resumido:
//! - Event sourcing: cada `SequenceEvent` lleva un contador por instancia
//!   estrictamente creciente; el `RunState` se obtiene plegando la historia.
//! - La función de transición no hace I/O: recibe estado + evento y devuelve
//!   el siguiente estado o un `Rejection`.
//! - El índice de instancias activas contiene sólo estados no terminales.
//!
//! Ejemplo rápido:
//! ```rust
//! use flow::{engine, Event, RunState, SequenceEvent, Trigger};
//! use wf_domain::{WorkflowId, WorkflowInstance};
//! let id = WorkflowId::new("component", "endpoint").unwrap();
//! let instance = WorkflowInstance::new(id, "2016-09-14").unwrap();
//! let state = RunState::fresh(instance.clone(), -1);
//! let trigger = SequenceEvent::new(Event::trigger(instance, Trigger::Natural), 0);
//! let next = engine::transition(&state, &trigger).unwrap();
//! assert_eq!(next.counter, 0);
//! ```
pub mod domain;
pub mod engine;
pub mod errors;
pub mod repository;
pub mod run_state;
pub mod stubs;

pub use domain::*;
pub use errors::*;
pub use repository::*;
pub use run_state::*;
pub use stubs::*;
