use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;

use super::grid::ScheduleGridModel;
use super::slot::{Coordinate, SlotError, SlotFields};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EditorError {
    #[error("no cell is open")]
    NotOpen,
    #[error("another cell is still open")]
    Busy(Coordinate),
    #[error("choose a subject before saving the cell")]
    MissingSubject,
    #[error("subject {0} is not offered for this class")]
    UnknownSubject(String),
    #[error("teacher {0} is not on the roster")]
    UnknownTeacher(String),
    #[error("rosters are still loading")]
    Loading,
    #[error(transparent)]
    InvalidSlot(#[from] SlotError),
}

impl EditorError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::NotOpen => "editor_closed",
            Self::Busy(_) => "editor_busy",
            Self::MissingSubject => "missing_subject",
            Self::UnknownSubject(_) => "unknown_subject",
            Self::UnknownTeacher(_) => "unknown_teacher",
            Self::Loading => "session_loading",
            Self::InvalidSlot(_) => "invalid_slot",
        }
    }
}

/// Field changes to a candidate. An absent field is left alone; an explicit
/// `null` clears it.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CandidatePatch {
    #[serde(default, deserialize_with = "present")]
    pub subject_id: Option<Option<String>>,
    #[serde(default, deserialize_with = "present")]
    pub teacher_id: Option<Option<String>>,
    #[serde(default, deserialize_with = "present")]
    pub start_time: Option<Option<String>>,
    #[serde(default, deserialize_with = "present")]
    pub end_time: Option<Option<String>>,
    #[serde(default, deserialize_with = "present")]
    pub room: Option<Option<String>>,
}

fn present<'de, D>(d: D) -> Result<Option<Option<String>>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<String>::deserialize(d).map(Some)
}

impl CandidatePatch {
    fn apply(self, candidate: &mut SlotFields) {
        let pairs = [
            (self.subject_id, &mut candidate.subject_id),
            (self.teacher_id, &mut candidate.teacher_id),
            (self.start_time, &mut candidate.start_time),
            (self.end_time, &mut candidate.end_time),
            (self.room, &mut candidate.room),
        ];
        for (change, field) in pairs {
            if let Some(v) = change {
                *field = v;
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditorState {
    Closed,
    Editing {
        at: Coordinate,
        candidate: SlotFields,
        existing: bool,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "camelCase")]
pub enum EditorOutcome {
    Committed { at: Coordinate },
    Cleared { at: Coordinate },
    Cancelled { at: Coordinate },
}

/// Single-cell editing state machine. Only one cell can be open at a time.
#[derive(Debug, Clone)]
pub struct SlotEditor {
    state: EditorState,
}

impl Default for SlotEditor {
    fn default() -> Self {
        Self {
            state: EditorState::Closed,
        }
    }
}

impl SlotEditor {
    pub fn state(&self) -> &EditorState {
        &self.state
    }

    pub fn is_open(&self) -> bool {
        matches!(self.state, EditorState::Editing { .. })
    }

    pub fn candidate(&self) -> Option<(Coordinate, &SlotFields)> {
        match &self.state {
            EditorState::Editing { at, candidate, .. } => Some((*at, candidate)),
            EditorState::Closed => None,
        }
    }

    pub fn can_commit(&self) -> bool {
        self.candidate()
            .map(|(_, c)| c.has_subject())
            .unwrap_or(false)
    }

    /// Seed a candidate from the slot at `at`, or an empty one.
    pub fn open(&mut self, at: Coordinate, grid: &ScheduleGridModel) -> Result<&SlotFields, EditorError> {
        if let EditorState::Editing { at: open_at, .. } = &self.state {
            return Err(EditorError::Busy(*open_at));
        }
        let existing = grid.get_slot(at);
        self.state = EditorState::Editing {
            at,
            candidate: existing.map(|s| s.fields()).unwrap_or_default(),
            existing: existing.is_some(),
        };
        match &self.state {
            EditorState::Editing { candidate, .. } => Ok(candidate),
            EditorState::Closed => Err(EditorError::NotOpen),
        }
    }

    pub fn edit(&mut self, patch: CandidatePatch) -> Result<&SlotFields, EditorError> {
        match &mut self.state {
            EditorState::Editing { candidate, .. } => {
                patch.apply(candidate);
                Ok(candidate)
            }
            EditorState::Closed => Err(EditorError::NotOpen),
        }
    }

    /// Merge the candidate into the grid. A rejected commit keeps the cell open.
    pub fn commit(&mut self, grid: &mut ScheduleGridModel) -> Result<EditorOutcome, EditorError> {
        let EditorState::Editing { at, candidate, .. } = &self.state else {
            return Err(EditorError::NotOpen);
        };
        if !candidate.has_subject() {
            return Err(EditorError::MissingSubject);
        }
        candidate.validate_times()?;

        let at = *at;
        if let EditorState::Editing { candidate, .. } =
            std::mem::replace(&mut self.state, EditorState::Closed)
        {
            grid.assign_slot(at, candidate);
        }
        tracing::debug!(day = at.day_name(), period = at.period_number, "cell committed");
        Ok(EditorOutcome::Committed { at })
    }

    pub fn clear(&mut self, grid: &mut ScheduleGridModel) -> Result<EditorOutcome, EditorError> {
        let at = self.close()?;
        grid.remove_slot(at);
        tracing::debug!(day = at.day_name(), period = at.period_number, "cell cleared");
        Ok(EditorOutcome::Cleared { at })
    }

    pub fn cancel(&mut self) -> Result<EditorOutcome, EditorError> {
        let at = self.close()?;
        Ok(EditorOutcome::Cancelled { at })
    }

    fn close(&mut self) -> Result<Coordinate, EditorError> {
        match std::mem::replace(&mut self.state, EditorState::Closed) {
            EditorState::Editing { at, .. } => Ok(at),
            EditorState::Closed => Err(EditorError::NotOpen),
        }
    }
}
