use rusqlite::Connection;
use serde_json::json;

use crate::ipc::error::{err, ok};
use crate::ipc::handlers::setup::timetable_settings;
use crate::ipc::helpers::{optional_str, required_str, HandlerErr};
use crate::ipc::types::{AppState, Request};
use crate::store::SqliteStore;
use crate::timetable::layout::LayoutConfig;
use crate::timetable::persistence::assigned_only;
use crate::timetable::view::{by_class, by_teacher, render_grid};
use crate::timetable::{Slot, TimetableFilter, TimetableStore};

fn require_class(store: &SqliteStore<'_>, class_id: &str) -> Result<(), HandlerErr> {
    match store.class_exists(class_id) {
        Ok(true) => Ok(()),
        Ok(false) => Err(HandlerErr::new("not_found", "class not found")
            .with_details(json!({ "classId": class_id }))),
        Err(e) => Err(HandlerErr::db("db_query_failed", e)),
    }
}

fn parse_period_count(params: &serde_json::Value) -> Result<Option<u32>, HandlerErr> {
    match params.get("periodCount") {
        None | Some(serde_json::Value::Null) => Ok(None),
        Some(v) => v
            .as_u64()
            .and_then(|n| u32::try_from(n).ok())
            .filter(|n| *n >= 1)
            .map(Some)
            .ok_or_else(|| HandlerErr::bad_params("periodCount must be a positive integer")),
    }
}

fn timetable_get(conn: &Connection, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let filter = TimetableFilter {
        class_id: optional_str(params, "classId"),
        teacher_id: optional_str(params, "teacherId"),
    };
    let store = SqliteStore::new(conn);
    let entries = store
        .timetable(&filter)
        .map_err(|e| HandlerErr::db("db_query_failed", e))?;
    let revision = match filter.class_id.as_deref() {
        Some(class_id) => Some(
            store
                .revision(class_id)
                .map_err(|e| HandlerErr::db("db_query_failed", e))?,
        ),
        None => None,
    };
    Ok(json!({ "entries": entries, "revision": revision }))
}

fn timetable_by_class(conn: &Connection, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let class_id = required_str(params, "classId")?;
    let requested = parse_period_count(params)?;
    let store = SqliteStore::new(conn);
    require_class(&store, &class_id)?;

    let entries = store
        .timetable(&TimetableFilter::class(class_id.as_str()))
        .map_err(|e| HandlerErr::db("db_query_failed", e))?;
    let revision = store
        .revision(&class_id)
        .map_err(|e| HandlerErr::db("db_query_failed", e))?;

    let default_count = match requested {
        Some(n) => n,
        None => {
            timetable_settings(conn)
                .map_err(|e| HandlerErr::db("db_query_failed", e))?
                .default_period_count
        }
    };
    let max_period = entries.iter().map(|e| e.slot.period_number).max();
    let layout = LayoutConfig::for_data(default_count, max_period);

    Ok(json!({
        "classId": class_id,
        "days": by_class(&entries),
        "grid": render_grid(&entries, &layout),
        "revision": revision
    }))
}

fn timetable_by_teacher(conn: &Connection, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let teacher_id = required_str(params, "teacherId")?;
    let entries = SqliteStore::new(conn)
        .timetable(&TimetableFilter::teacher(teacher_id.as_str()))
        .map_err(|e| HandlerErr::db("db_query_failed", e))?;
    let schedule = by_teacher(&entries);
    Ok(json!({
        "teacherId": teacher_id,
        "days": schedule.days,
        "summary": schedule.summary
    }))
}

fn timetable_bulk_save(conn: &Connection, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let class_id = required_str(params, "classId")?;
    let expected_revision = optional_str(params, "expectedRevision");
    let Some(raw) = params.get("slots").filter(|v| v.is_array()) else {
        return Err(HandlerErr::bad_params("slots must be an array"));
    };
    let mut slots: Vec<Slot> = serde_json::from_value(raw.clone())
        .map_err(|e| HandlerErr::bad_params(format!("invalid slots: {}", e)))?;
    for slot in &mut slots {
        if slot.class_id.is_empty() {
            slot.class_id = class_id.clone();
        }
    }

    let payload = assigned_only(&slots);
    let skipped = slots.len() - payload.len();
    let receipt = SqliteStore::new(conn)
        .bulk_save_timetable(&class_id, &payload, expected_revision.as_deref())
        .map_err(|e| {
            tracing::warn!(class_id = %class_id, code = e.code(), error = %e, "bulk save rejected");
            HandlerErr::from(e)
        })?;
    tracing::info!(class_id = %class_id, saved = receipt.saved, skipped, "timetable bulk saved");

    Ok(json!({
        "classId": receipt.class_id,
        "saved": receipt.saved,
        "skipped": skipped,
        "revision": receipt.revision
    }))
}

fn handle_timetable_get(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    match timetable_get(conn, &req.params) {
        Ok(result) => ok(&req.id, result),
        Err(error) => error.response(&req.id),
    }
}

fn handle_timetable_by_class(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    match timetable_by_class(conn, &req.params) {
        Ok(result) => ok(&req.id, result),
        Err(error) => error.response(&req.id),
    }
}

fn handle_timetable_by_teacher(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    match timetable_by_teacher(conn, &req.params) {
        Ok(result) => ok(&req.id, result),
        Err(error) => error.response(&req.id),
    }
}

fn handle_timetable_bulk_save(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    match timetable_bulk_save(conn, &req.params) {
        Ok(result) => ok(&req.id, result),
        Err(error) => error.response(&req.id),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "timetable.get" => Some(handle_timetable_get(state, req)),
        "timetable.byClass" => Some(handle_timetable_by_class(state, req)),
        "timetable.byTeacher" => Some(handle_timetable_by_teacher(state, req)),
        "timetable.bulkSave" => Some(handle_timetable_bulk_save(state, req)),
        _ => None,
    }
}
