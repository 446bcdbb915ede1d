use rusqlite::Connection;
use serde_json::json;
use uuid::Uuid;

use crate::ipc::error::{err, ok};
use crate::ipc::helpers::{optional_str, required_str, HandlerErr};
use crate::ipc::types::{AppState, Request};
use crate::store::SqliteStore;
use crate::timetable::TimetableStore;

fn require_class(store: &SqliteStore<'_>, class_id: &str) -> Result<(), HandlerErr> {
    match store.class_exists(class_id) {
        Ok(true) => Ok(()),
        Ok(false) => Err(HandlerErr::new("not_found", "class not found")
            .with_details(json!({ "classId": class_id }))),
        Err(e) => Err(HandlerErr::db("db_query_failed", e)),
    }
}

fn subjects_create(conn: &Connection, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let class_id = required_str(params, "classId")?;
    let name = required_str(params, "name")?;
    let code = optional_str(params, "code");
    require_class(&SqliteStore::new(conn), &class_id)?;

    let subject_id = Uuid::new_v4().to_string();
    conn.execute(
        "INSERT INTO subjects(id, class_id, name, code) VALUES(?, ?, ?, ?)",
        (&subject_id, &class_id, &name, &code),
    )
    .map_err(|e| HandlerErr::db("db_insert_failed", e).with_details(json!({ "table": "subjects" })))?;

    Ok(json!({ "subjectId": subject_id }))
}

fn subjects_list_by_class(conn: &Connection, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let class_id = required_str(params, "classId")?;
    let store = SqliteStore::new(conn);
    require_class(&store, &class_id)?;
    let subjects = store
        .subjects_by_class(&class_id)
        .map_err(|e| HandlerErr::db("db_query_failed", e))?;
    Ok(json!({ "subjects": subjects }))
}

fn handle_subjects_create(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    match subjects_create(conn, &req.params) {
        Ok(result) => ok(&req.id, result),
        Err(error) => error.response(&req.id),
    }
}

fn handle_subjects_list_by_class(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    match subjects_list_by_class(conn, &req.params) {
        Ok(result) => ok(&req.id, result),
        Err(error) => error.response(&req.id),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "subjects.create" => Some(handle_subjects_create(state, req)),
        "subjects.listByClass" => Some(handle_subjects_list_by_class(state, req)),
        _ => None,
    }
}
