// Esquema Diesel compartido por el log de eventos y el store de configuración.
// Tablas: sequence_events, active_states, mirrored_active_states, workflows,
// workflow_states, settings
use diesel::allow_tables_to_appear_in_same_query;
diesel::table! {
    sequence_events (instance_key, counter) {
        instance_key -> Text,
        component_id -> Text,
        endpoint_id -> Text,
        parameter -> Text,
        counter -> BigInt,
        event_type -> Text,
        payload -> Text,
        created_at_ts -> BigInt,
    }
}
diesel::table! {
    active_states (instance_key) {
        instance_key -> Text,
        component_id -> Text,
        endpoint_id -> Text,
        parameter -> Text,
        counter -> BigInt,
    }
}
diesel::table! {
    mirrored_active_states (instance_key) {
        instance_key -> Text,
        component_id -> Text,
        endpoint_id -> Text,
        parameter -> Text,
        counter -> BigInt,
    }
}
diesel::table! {
    workflows (workflow_key) {
        workflow_key -> Text,
        component_id -> Text,
        endpoint_id -> Text,
        schedule -> Text,
    }
}
diesel::table! {
    workflow_states (workflow_key) {
        workflow_key -> Text,
        component_id -> Text,
        endpoint_id -> Text,
        enabled -> Nullable<Bool>,
        docker_image -> Nullable<Text>,
        commit_sha -> Nullable<Text>,
    }
}
diesel::table! {
    settings (name) {
        name -> Text,
        flag -> Bool,
    }
}
allow_tables_to_appear_in_same_query!(sequence_events, active_states, mirrored_active_states, workflows, workflow_states, settings);
