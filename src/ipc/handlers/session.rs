use std::collections::HashMap;

use serde_json::json;

use crate::ipc::error::ok;
use crate::ipc::handlers::setup::timetable_settings;
use crate::ipc::helpers::{require_db, required_coordinate, required_str, HandlerErr};
use crate::ipc::types::{AppState, Request};
use crate::store::SqliteStore;
use crate::timetable::{CandidatePatch, ScheduleEditingSession};

type Sessions = HashMap<String, ScheduleEditingSession>;

fn session_mut<'a>(
    sessions: &'a mut Sessions,
    params: &serde_json::Value,
) -> Result<&'a mut ScheduleEditingSession, HandlerErr> {
    let session_id = required_str(params, "sessionId")?;
    sessions.get_mut(&session_id).ok_or_else(|| {
        HandlerErr::new("not_found", "timetable session not found")
            .with_details(json!({ "sessionId": session_id }))
    })
}

fn snapshot(session: &ScheduleEditingSession) -> serde_json::Value {
    json!(session.snapshot())
}

fn session_open(state: &mut AppState, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let conn = require_db(state)?;
    let class_id = required_str(params, "classId")?;
    let store = SqliteStore::new(conn);
    match store.class_exists(&class_id) {
        Ok(true) => {}
        Ok(false) => {
            return Err(HandlerErr::new("not_found", "class not found")
                .with_details(json!({ "classId": class_id })))
        }
        Err(e) => return Err(HandlerErr::db("db_query_failed", e)),
    }
    let settings = timetable_settings(conn).map_err(|e| HandlerErr::db("db_query_failed", e))?;

    let session = ScheduleEditingSession::open(&store, &class_id, settings.default_period_count)
        .map_err(|e| HandlerErr::db("db_query_failed", e))?;
    let result = snapshot(&session);
    state.sessions.insert(session.id().to_string(), session);
    Ok(result)
}

fn session_get(state: &mut AppState, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let session = session_mut(&mut state.sessions, params)?;
    Ok(snapshot(session))
}

fn session_open_cell(state: &mut AppState, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let session = session_mut(&mut state.sessions, params)?;
    let at = required_coordinate(params)?;
    let candidate = session.open_cell(at)?;
    Ok(json!({
        "at": at,
        "candidate": candidate,
        "canCommit": candidate.has_subject()
    }))
}

fn session_edit_cell(state: &mut AppState, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let session = session_mut(&mut state.sessions, params)?;
    let Some(raw) = params.get("patch").filter(|v| v.is_object()) else {
        return Err(HandlerErr::bad_params("patch must be an object"));
    };
    let patch: CandidatePatch = serde_json::from_value(raw.clone())
        .map_err(|e| HandlerErr::bad_params(format!("invalid patch: {}", e)))?;
    let candidate = session.edit_cell(patch)?;
    Ok(json!({
        "candidate": candidate,
        "canCommit": candidate.has_subject()
    }))
}

fn session_commit_cell(state: &mut AppState, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let session = session_mut(&mut state.sessions, params)?;
    let outcome = session.commit_cell()?;
    Ok(json!({ "outcome": outcome, "snapshot": snapshot(session) }))
}

fn session_clear_cell(state: &mut AppState, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let session = session_mut(&mut state.sessions, params)?;
    let outcome = session.clear_cell()?;
    Ok(json!({ "outcome": outcome, "snapshot": snapshot(session) }))
}

fn session_cancel_cell(state: &mut AppState, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let session = session_mut(&mut state.sessions, params)?;
    let outcome = session.cancel_cell()?;
    Ok(json!({ "outcome": outcome, "snapshot": snapshot(session) }))
}

fn session_layout(state: &mut AppState, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let session = session_mut(&mut state.sessions, params)?;
    let action = required_str(params, "action")?;
    let period_count = match action.as_str() {
        "increment" => session.add_period(),
        "decrement" => session.remove_period(),
        _ => {
            return Err(HandlerErr::bad_params(
                "action must be one of: increment, decrement",
            ))
        }
    };
    Ok(json!({ "periodCount": period_count, "snapshot": snapshot(session) }))
}

/// A successful save ends the session; a failed one leaves the draft open for retry.
fn session_save(state: &mut AppState, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let conn = state
        .db
        .as_ref()
        .ok_or_else(|| HandlerErr::new("no_workspace", "select a workspace first"))?;
    let session = session_mut(&mut state.sessions, params)?;
    let settings = timetable_settings(conn).map_err(|e| HandlerErr::db("db_query_failed", e))?;

    let receipt = session.save(&SqliteStore::new(conn), settings.detect_concurrent_edits)?;
    let session_id = session.id().to_string();
    state.sessions.remove(&session_id);
    tracing::info!(session_id = %session_id, "timetable session closed after save");

    Ok(json!({
        "classId": receipt.class_id,
        "saved": receipt.saved,
        "revision": receipt.revision,
        "sessionClosed": true
    }))
}

/// Discards the draft; storage is never touched.
fn session_close(state: &mut AppState, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let session = session_mut(&mut state.sessions, params)?;
    let session_id = session.id().to_string();
    let discarded = session.grid().len();
    state.sessions.remove(&session_id);
    tracing::info!(session_id = %session_id, discarded, "timetable session closed");
    Ok(json!({ "ok": true }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let result = match req.method.as_str() {
        "timetable.session.open" => session_open(state, &req.params),
        "timetable.session.get" => session_get(state, &req.params),
        "timetable.session.openCell" => session_open_cell(state, &req.params),
        "timetable.session.editCell" => session_edit_cell(state, &req.params),
        "timetable.session.commitCell" => session_commit_cell(state, &req.params),
        "timetable.session.clearCell" => session_clear_cell(state, &req.params),
        "timetable.session.cancelCell" => session_cancel_cell(state, &req.params),
        "timetable.session.layout" => session_layout(state, &req.params),
        "timetable.session.save" => session_save(state, &req.params),
        "timetable.session.close" => session_close(state, &req.params),
        _ => return None,
    };
    Some(match result {
        Ok(v) => ok(&req.id, v),
        Err(error) => error.response(&req.id),
    })
}
