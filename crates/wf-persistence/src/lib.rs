//! Persistencia del orquestador.
//!
//! - `DieselEventRepository`: log de eventos + índice de activas (primario).
//! - `DieselConfigRepository`: workflows, estado por workflow, switch global
//!   y copia espejo del índice de activas (secundario).
//! - `AggregateStorage`: combina ambos y replica el índice activo al
//!   secundario con un `MirrorWorker` de un solo hilo.
//!
//! El backend se elige con la feature `pg` (Postgres); sin ella se usa SQLite.

mod active_persistence;
pub mod aggregate;
mod config_persistence;
mod db;
mod event_persistence;
pub mod mirror;
pub mod schema;

pub use aggregate::AggregateStorage;
pub use config_persistence::DieselConfigRepository;
pub use db::{primary_url_from_env, secondary_url_from_env, MIGRATIONS};
pub use event_persistence::DieselEventRepository;
pub use mirror::{MirrorJob, MirrorPolicy, MirrorStats, MirrorWorker};

use std::sync::Arc;

/// Storage Diesel completo tal como lo usa el scheduler.
pub type DieselStorage = AggregateStorage<DieselEventRepository, DieselConfigRepository>;

/// Construye el `AggregateStorage` Diesel desde las variables de entorno
/// (`WF_PRIMARY_DB_URL`/`DATABASE_URL` y `WF_SECONDARY_DB_URL`).
pub fn new_aggregate_from_env(policy: MirrorPolicy) -> flow::Result<DieselStorage> {
    let primary = Arc::new(DieselEventRepository::new_from_env()?);
    let secondary = Arc::new(DieselConfigRepository::new_from_env()?);
    AggregateStorage::new(primary, secondary, policy)
}
