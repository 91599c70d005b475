// Archivo: active_persistence.rs
// Propósito: acceso al índice de instancias activas. El log primario usa
// `active_states`; el store de configuración mantiene su copia espejo en
// `mirrored_active_states`, de modo que ambos pueden compartir base de datos.
use crate::db::{checkout, map_db_err, DbPool};
use crate::schema;
use crate::schema::active_states::dsl as active_dsl;
use crate::schema::mirrored_active_states::dsl as mirror_dsl;
use diesel::prelude::*;
use flow::Result;
use std::collections::HashMap;
use wf_domain::{WorkflowId, WorkflowInstance};

/// Tabla que respalda un índice de activas.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ActiveIndex {
    Primary,
    Mirror,
}

#[derive(Debug, Queryable, Insertable)]
#[diesel(table_name = schema::active_states)]
struct ActiveStateRow {
    pub instance_key: String,
    pub component_id: String,
    pub endpoint_id: String,
    pub parameter: String,
    pub counter: i64,
}

#[derive(Debug, Queryable, Insertable)]
#[diesel(table_name = schema::mirrored_active_states)]
struct MirroredActiveStateRow {
    pub instance_key: String,
    pub component_id: String,
    pub endpoint_id: String,
    pub parameter: String,
    pub counter: i64,
}

fn to_entry(component_id: &str, endpoint_id: &str, parameter: &str) -> Result<WorkflowInstance> {
    let id = WorkflowId::new(component_id, endpoint_id)?;
    Ok(WorkflowInstance::new(id, parameter)?)
}

pub(crate) fn read_all(pool: &DbPool, index: ActiveIndex) -> Result<HashMap<WorkflowInstance, i64>> {
    let mut conn = checkout(pool)?;
    let mut out = HashMap::new();
    match index {
        ActiveIndex::Primary => {
            for row in map_db_err(active_dsl::active_states.load::<ActiveStateRow>(&mut conn))? {
                out.insert(to_entry(&row.component_id, &row.endpoint_id, &row.parameter)?, row.counter);
            }
        }
        ActiveIndex::Mirror => {
            for row in map_db_err(mirror_dsl::mirrored_active_states.load::<MirroredActiveStateRow>(&mut conn))? {
                out.insert(to_entry(&row.component_id, &row.endpoint_id, &row.parameter)?, row.counter);
            }
        }
    }
    Ok(out)
}

/// Upsert como delete + insert dentro de una transacción.
pub(crate) fn write(pool: &DbPool, index: ActiveIndex, instance: &WorkflowInstance, counter: i64) -> Result<()> {
    let mut conn = checkout(pool)?;
    let key = instance.to_key();
    let component_id = instance.workflow_id().component_id().to_string();
    let endpoint_id = instance.workflow_id().endpoint_id().to_string();
    let parameter = instance.parameter().to_string();
    match index {
        ActiveIndex::Primary => {
            let row = ActiveStateRow { instance_key: key.clone(), component_id, endpoint_id, parameter, counter };
            map_db_err(conn.transaction(|c| {
                               diesel::delete(active_dsl::active_states.filter(active_dsl::instance_key.eq(&key))).execute(c)?;
                               diesel::insert_into(active_dsl::active_states).values(&row).execute(c)
                           }))?;
        }
        ActiveIndex::Mirror => {
            let row = MirroredActiveStateRow { instance_key: key.clone(), component_id, endpoint_id, parameter, counter };
            map_db_err(conn.transaction(|c| {
                               diesel::delete(mirror_dsl::mirrored_active_states.filter(mirror_dsl::instance_key.eq(&key))).execute(c)?;
                               diesel::insert_into(mirror_dsl::mirrored_active_states).values(&row).execute(c)
                           }))?;
        }
    }
    Ok(())
}

pub(crate) fn delete(pool: &DbPool, index: ActiveIndex, instance: &WorkflowInstance) -> Result<()> {
    let mut conn = checkout(pool)?;
    let key = instance.to_key();
    match index {
        ActiveIndex::Primary => {
            map_db_err(diesel::delete(active_dsl::active_states.filter(active_dsl::instance_key.eq(&key))).execute(&mut conn))?;
        }
        ActiveIndex::Mirror => {
            map_db_err(diesel::delete(mirror_dsl::mirrored_active_states.filter(mirror_dsl::instance_key.eq(&key))).execute(&mut conn))?;
        }
    }
    Ok(())
}
