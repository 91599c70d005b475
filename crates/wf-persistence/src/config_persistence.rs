// Archivo: config_persistence.rs
// Propósito: store de configuración sobre Diesel (`DieselConfigRepository`):
// definiciones de workflow, estado por workflow, switch global y la copia
// espejo del índice de instancias activas.
use crate::active_persistence::{self, ActiveIndex};
use crate::db::{build_pool, checkout, map_db_err, DbPool};
use crate::schema;
use crate::schema::settings::dsl as settings_dsl;
use crate::schema::workflow_states::dsl as state_dsl;
use crate::schema::workflows::dsl as wf_dsl;
use diesel::prelude::*;
use flow::{ActiveStateRepository, ConfigRepository, FlowError, Result};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use wf_domain::{Schedule, Workflow, WorkflowId, WorkflowInstance, WorkflowState};

const GLOBAL_ENABLED: &str = "global_enabled";

#[derive(Debug, Queryable, Insertable)]
#[diesel(table_name = schema::workflows)]
struct WorkflowRow {
    pub workflow_key: String,
    pub component_id: String,
    pub endpoint_id: String,
    pub schedule: String,
}

#[derive(Debug, Queryable, Insertable)]
#[diesel(table_name = schema::workflow_states)]
struct WorkflowStateRow {
    pub workflow_key: String,
    pub component_id: String,
    pub endpoint_id: String,
    pub enabled: Option<bool>,
    pub docker_image: Option<String>,
    pub commit_sha: Option<String>,
}

#[derive(Debug, Queryable, Insertable)]
#[diesel(table_name = schema::settings)]
struct SettingRow {
    pub name: String,
    pub flag: bool,
}

/// Repositorio Diesel de configuración.
pub struct DieselConfigRepository {
    pool: Arc<DbPool>,
}

impl DieselConfigRepository {
    pub fn new(database_url: &str) -> Result<Self> {
        Ok(Self { pool: Arc::new(build_pool(database_url)?) })
    }

    /// Construye el repositorio desde `WF_SECONDARY_DB_URL` (o la URL
    /// primaria si no está definida).
    pub fn new_from_env() -> Result<Self> {
        Self::new(&crate::db::secondary_url_from_env()?)
    }

    fn write_state(&self, id: &WorkflowId, state: &WorkflowState) -> Result<()> {
        let mut conn = checkout(&self.pool)?;
        let key = id.to_key();
        let row = WorkflowStateRow { workflow_key: key.clone(),
                                     component_id: id.component_id().to_string(),
                                     endpoint_id: id.endpoint_id().to_string(),
                                     enabled: state.enabled,
                                     docker_image: state.docker_image.clone(),
                                     commit_sha: state.commit_sha.clone() };
        map_db_err(conn.transaction(|c| {
                           diesel::delete(state_dsl::workflow_states.filter(state_dsl::workflow_key.eq(&key))).execute(c)?;
                           diesel::insert_into(state_dsl::workflow_states).values(&row).execute(c)
                       }))?;
        Ok(())
    }

    fn read_flag(&self, name: &str) -> Result<Option<bool>> {
        let mut conn = checkout(&self.pool)?;
        map_db_err(settings_dsl::settings.filter(settings_dsl::name.eq(name))
                                         .select(settings_dsl::flag)
                                         .first::<bool>(&mut conn)
                                         .optional())
    }
}

impl ConfigRepository for DieselConfigRepository {
    fn workflow(&self, id: &WorkflowId) -> Result<Option<Workflow>> {
        let mut conn = checkout(&self.pool)?;
        let row = map_db_err(wf_dsl::workflows.filter(wf_dsl::workflow_key.eq(id.to_key()))
                                              .first::<WorkflowRow>(&mut conn)
                                              .optional())?;
        match row {
            Some(r) => {
                let schedule: Schedule = serde_json::from_str(&r.schedule)?;
                Ok(Some(Workflow::new(WorkflowId::new(&r.component_id, &r.endpoint_id)?, schedule)))
            }
            None => Ok(None),
        }
    }

    fn store_workflow(&self, workflow: &Workflow) -> Result<()> {
        let mut conn = checkout(&self.pool)?;
        let key = workflow.id().to_key();
        let row = WorkflowRow { workflow_key: key.clone(),
                                component_id: workflow.id().component_id().to_string(),
                                endpoint_id: workflow.id().endpoint_id().to_string(),
                                schedule: serde_json::to_string(workflow.schedule())? };
        map_db_err(conn.transaction(|c| {
                           diesel::delete(wf_dsl::workflows.filter(wf_dsl::workflow_key.eq(&key))).execute(c)?;
                           diesel::insert_into(wf_dsl::workflows).values(&row).execute(c)
                       }))?;
        Ok(())
    }

    fn workflow_state(&self, id: &WorkflowId) -> Result<Option<WorkflowState>> {
        let mut conn = checkout(&self.pool)?;
        let row = map_db_err(state_dsl::workflow_states.filter(state_dsl::workflow_key.eq(id.to_key()))
                                                       .first::<WorkflowStateRow>(&mut conn)
                                                       .optional())?;
        Ok(row.map(|r| WorkflowState { enabled: r.enabled, docker_image: r.docker_image, commit_sha: r.commit_sha }))
    }

    fn patch_state(&self, id: &WorkflowId, delta: &WorkflowState) -> Result<()> {
        let mut state = self.workflow_state(id)?.unwrap_or_default();
        state.patch(delta);
        self.write_state(id, &state)
    }

    fn patch_component_state(&self, component_id: &str, delta: &WorkflowState) -> Result<()> {
        let rows = {
            let mut conn = checkout(&self.pool)?;
            map_db_err(wf_dsl::workflows.filter(wf_dsl::component_id.eq(component_id))
                                        .load::<WorkflowRow>(&mut conn))?
        };
        for row in rows {
            let id = WorkflowId::new(&row.component_id, &row.endpoint_id)?;
            self.patch_state(&id, delta)?;
        }
        Ok(())
    }

    fn enabled_workflows(&self) -> Result<HashSet<WorkflowId>> {
        let mut conn = checkout(&self.pool)?;
        let rows = map_db_err(state_dsl::workflow_states.filter(state_dsl::enabled.eq(true))
                                                        .load::<WorkflowStateRow>(&mut conn))?;
        rows.iter()
            .map(|r| WorkflowId::new(&r.component_id, &r.endpoint_id).map_err(FlowError::from))
            .collect()
    }

    fn global_enabled(&self) -> Result<bool> {
        Ok(self.read_flag(GLOBAL_ENABLED)?.unwrap_or(true))
    }

    fn set_global_enabled(&self, enabled: bool) -> Result<bool> {
        let previous = self.global_enabled()?;
        let mut conn = checkout(&self.pool)?;
        let row = SettingRow { name: GLOBAL_ENABLED.to_string(), flag: enabled };
        map_db_err(conn.transaction(|c| {
                           diesel::delete(settings_dsl::settings.filter(settings_dsl::name.eq(GLOBAL_ENABLED))).execute(c)?;
                           diesel::insert_into(settings_dsl::settings).values(&row).execute(c)
                       }))?;
        Ok(previous)
    }
}

impl ActiveStateRepository for DieselConfigRepository {
    fn read_active_states(&self) -> Result<HashMap<WorkflowInstance, i64>> {
        active_persistence::read_all(&self.pool, ActiveIndex::Mirror)
    }

    fn write_active_state(&self, instance: &WorkflowInstance, counter: i64) -> Result<()> {
        active_persistence::write(&self.pool, ActiveIndex::Mirror, instance, counter)
    }

    fn delete_active_state(&self, instance: &WorkflowInstance) -> Result<()> {
        active_persistence::delete(&self.pool, ActiveIndex::Mirror, instance)
    }
}
