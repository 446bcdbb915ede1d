use rusqlite::Connection;
use serde_json::json;

use crate::ipc::error::err;
use crate::ipc::types::AppState;
use crate::timetable::{Coordinate, EditorError, SaveError};

pub struct HandlerErr {
    pub code: &'static str,
    pub message: String,
    pub details: Option<serde_json::Value>,
}

impl HandlerErr {
    pub fn new(code: &'static str, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }

    pub fn bad_params(message: impl Into<String>) -> Self {
        Self::new("bad_params", message)
    }

    pub fn db(code: &'static str, e: impl std::fmt::Display) -> Self {
        Self::new(code, e.to_string())
    }

    pub fn response(self, id: &str) -> serde_json::Value {
        err(id, self.code, self.message, self.details)
    }
}

impl From<EditorError> for HandlerErr {
    fn from(e: EditorError) -> Self {
        let details = match &e {
            EditorError::Busy(at) => Some(json!({ "openCell": at })),
            _ => None,
        };
        Self {
            code: e.code(),
            message: e.to_string(),
            details,
        }
    }
}

impl From<SaveError> for HandlerErr {
    fn from(e: SaveError) -> Self {
        Self {
            code: e.code(),
            message: e.to_string(),
            details: e.details(),
        }
    }
}

pub fn require_db(state: &AppState) -> Result<&Connection, HandlerErr> {
    state
        .db
        .as_ref()
        .ok_or_else(|| HandlerErr::new("no_workspace", "select a workspace first"))
}

pub fn required_str(params: &serde_json::Value, key: &str) -> Result<String, HandlerErr> {
    params
        .get(key)
        .and_then(|v| v.as_str())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| HandlerErr::bad_params(format!("missing {}", key)))
}

/// Trimmed string param; blank counts as absent.
pub fn optional_str(params: &serde_json::Value, key: &str) -> Option<String> {
    params
        .get(key)
        .and_then(|v| v.as_str())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

pub fn required_coordinate(params: &serde_json::Value) -> Result<Coordinate, HandlerErr> {
    let day = params
        .get("day")
        .and_then(|v| v.as_u64())
        .ok_or_else(|| HandlerErr::bad_params("missing/invalid day"))?;
    let period = params
        .get("period")
        .and_then(|v| v.as_u64())
        .ok_or_else(|| HandlerErr::bad_params("missing/invalid period"))?;
    let day = u8::try_from(day).map_err(|_| HandlerErr::bad_params("day out of range"))?;
    let period = u32::try_from(period).map_err(|_| HandlerErr::bad_params("period out of range"))?;
    Coordinate::new(day, period).map_err(|e| {
        HandlerErr::new("invalid_slot", e.to_string())
            .with_details(json!({ "day": day, "period": period }))
    })
}
