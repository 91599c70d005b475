// Archivo: event_persistence.rs
// Propósito: log de eventos sobre Diesel (`DieselEventRepository`). Es el
// almacenamiento primario: eventos + índice de instancias activas.
use crate::active_persistence::{self, ActiveIndex};
use crate::db::{build_pool, checkout, map_db_err, DbPool};
use crate::schema;
use crate::schema::sequence_events::dsl as ev_dsl;
use chrono::{TimeZone, Utc};
use diesel::prelude::*;
use diesel::result::Error as DieselError;
use flow::{ActiveStateRepository, Event, EventKind, EventRepository, FlowError, Result, SequenceEvent};
use std::collections::HashMap;
use std::sync::Arc;
use wf_domain::{WorkflowId, WorkflowInstance};

#[derive(Debug, Queryable, Insertable)]
#[diesel(table_name = schema::sequence_events)]
struct SequenceEventRow {
    pub instance_key: String,
    pub component_id: String,
    pub endpoint_id: String,
    pub parameter: String,
    pub counter: i64,
    pub event_type: String,
    pub payload: String,
    pub created_at_ts: i64,
}

impl SequenceEventRow {
    fn from_event(event: &SequenceEvent) -> Result<Self> {
        let instance = event.workflow_instance();
        Ok(Self { instance_key: instance.to_key(),
                  component_id: instance.workflow_id().component_id().to_string(),
                  endpoint_id: instance.workflow_id().endpoint_id().to_string(),
                  parameter: instance.parameter().to_string(),
                  counter: event.counter,
                  event_type: event.event.kind.name().to_string(),
                  payload: serde_json::to_string(&event.event.kind)?,
                  created_at_ts: event.timestamp.timestamp_millis() })
    }

    fn into_event(self) -> Result<SequenceEvent> {
        let id = WorkflowId::new(&self.component_id, &self.endpoint_id)?;
        let instance = WorkflowInstance::new(id, &self.parameter)?;
        let kind: EventKind = serde_json::from_str(&self.payload)?;
        let timestamp = Utc.timestamp_millis_opt(self.created_at_ts).single().ok_or_else(|| {
                               FlowError::Serialization(format!("timestamp inválido: {}", self.created_at_ts))
                           })?;
        Ok(SequenceEvent::with_timestamp(Event::new(instance, kind), self.counter, timestamp))
    }
}

/// Repositorio Diesel del log de eventos.
pub struct DieselEventRepository {
    pool: Arc<DbPool>,
}

impl DieselEventRepository {
    /// Abre (o crea) la base y aplica migraciones.
    pub fn new(database_url: &str) -> Result<Self> {
        Ok(Self { pool: Arc::new(build_pool(database_url)?) })
    }

    /// Construye el repositorio desde `WF_PRIMARY_DB_URL` / `DATABASE_URL`.
    pub fn new_from_env() -> Result<Self> {
        Self::new(&crate::db::primary_url_from_env()?)
    }
}

impl ActiveStateRepository for DieselEventRepository {
    fn read_active_states(&self) -> Result<HashMap<WorkflowInstance, i64>> {
        active_persistence::read_all(&self.pool, ActiveIndex::Primary)
    }

    fn write_active_state(&self, instance: &WorkflowInstance, counter: i64) -> Result<()> {
        active_persistence::write(&self.pool, ActiveIndex::Primary, instance, counter)
    }

    fn delete_active_state(&self, instance: &WorkflowInstance) -> Result<()> {
        active_persistence::delete(&self.pool, ActiveIndex::Primary, instance)
    }
}

impl EventRepository for DieselEventRepository {
    fn write_event(&self, event: &SequenceEvent) -> Result<()> {
        let row = SequenceEventRow::from_event(event)?;
        let mut conn = checkout(&self.pool)?;
        // La transacción devuelve el conflicto como valor para no perderlo
        // dentro del error de Diesel.
        map_db_err(conn.transaction::<Result<()>, DieselError, _>(|c| {
                                         let latest = ev_dsl::sequence_events
                                             .filter(ev_dsl::instance_key.eq(&row.instance_key))
                                             .select(diesel::dsl::max(ev_dsl::counter))
                                             .first::<Option<i64>>(c)?;
                                         let expected = latest.map(|n| n + 1).unwrap_or(0);
                                         if row.counter != expected {
                                             return Ok(Err(FlowError::Conflict(format!("{}: contador {} esperado {}",
                                                                                       row.instance_key,
                                                                                       row.counter,
                                                                                       expected))));
                                         }
                                         diesel::insert_into(ev_dsl::sequence_events).values(&row).execute(c)?;
                                         Ok(Ok(()))
                                     }))?
    }

    fn read_events(&self, instance: &WorkflowInstance) -> Result<Vec<SequenceEvent>> {
        let mut conn = checkout(&self.pool)?;
        let rows = map_db_err(ev_dsl::sequence_events.filter(ev_dsl::instance_key.eq(instance.to_key()))
                                                     .order(ev_dsl::counter.asc())
                                                     .load::<SequenceEventRow>(&mut conn))?;
        rows.into_iter().map(SequenceEventRow::into_event).collect()
    }

    fn latest_stored_counter(&self, instance: &WorkflowInstance) -> Result<Option<i64>> {
        let mut conn = checkout(&self.pool)?;
        map_db_err(ev_dsl::sequence_events.filter(ev_dsl::instance_key.eq(instance.to_key()))
                                          .select(diesel::dsl::max(ev_dsl::counter))
                                          .first::<Option<i64>>(&mut conn))
    }

    fn latest_stored_counters(&self) -> Result<HashMap<WorkflowInstance, i64>> {
        let mut conn = checkout(&self.pool)?;
        let rows = map_db_err(ev_dsl::sequence_events.group_by((ev_dsl::instance_key,
                                                                 ev_dsl::component_id,
                                                                 ev_dsl::endpoint_id,
                                                                 ev_dsl::parameter))
                                                     .select((ev_dsl::component_id,
                                                              ev_dsl::endpoint_id,
                                                              ev_dsl::parameter,
                                                              diesel::dsl::max(ev_dsl::counter)))
                                                     .load::<(String, String, String, Option<i64>)>(&mut conn))?;
        let mut out = HashMap::with_capacity(rows.len());
        for (component_id, endpoint_id, parameter, counter) in rows {
            if let Some(counter) = counter {
                let id = WorkflowId::new(&component_id, &endpoint_id)?;
                out.insert(WorkflowInstance::new(id, &parameter)?, counter);
            }
        }
        Ok(out)
    }

    fn execution_history(&self, workflow_id: &WorkflowId) -> Result<Vec<(WorkflowInstance, Vec<SequenceEvent>)>> {
        let mut conn = checkout(&self.pool)?;
        let rows = map_db_err(ev_dsl::sequence_events.filter(ev_dsl::component_id.eq(workflow_id.component_id()))
                                                     .filter(ev_dsl::endpoint_id.eq(workflow_id.endpoint_id()))
                                                     .order((ev_dsl::parameter.asc(), ev_dsl::counter.asc()))
                                                     .load::<SequenceEventRow>(&mut conn))?;
        let mut grouped: Vec<(WorkflowInstance, Vec<SequenceEvent>)> = Vec::new();
        for row in rows {
            let event = row.into_event()?;
            match grouped.last_mut() {
                Some((instance, events)) if instance == event.workflow_instance() => events.push(event),
                _ => grouped.push((event.workflow_instance().clone(), vec![event])),
            }
        }
        Ok(grouped)
    }
}
