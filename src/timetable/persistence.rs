use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

use super::grid::ScheduleGridModel;
use super::slot::{Coordinate, Placed, Slot, SlotError};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Subject {
    pub id: String,
    pub class_id: String,
    pub name: String,
    pub code: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Teacher {
    pub id: String,
    pub name: String,
    pub email: Option<String>,
}

/// A persisted slot joined with the names the read views display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TimetableEntry {
    pub id: String,
    #[serde(flatten)]
    pub slot: Slot,
    pub subject_name: Option<String>,
    pub subject_code: Option<String>,
    pub teacher_name: Option<String>,
    pub class_name: String,
    pub section: Option<String>,
}

impl Placed for TimetableEntry {
    fn coordinate(&self) -> Coordinate {
        self.slot.coordinate()
    }
}

/// Either filter may be omitted; omitted means "all".
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimetableFilter {
    #[serde(default)]
    pub class_id: Option<String>,
    #[serde(default)]
    pub teacher_id: Option<String>,
}

impl TimetableFilter {
    pub fn class(class_id: impl Into<String>) -> Self {
        Self {
            class_id: Some(class_id.into()),
            teacher_id: None,
        }
    }

    pub fn teacher(teacher_id: impl Into<String>) -> Self {
        Self {
            class_id: None,
            teacher_id: Some(teacher_id.into()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveReceipt {
    pub class_id: String,
    pub saved: usize,
    pub revision: String,
}

#[derive(Debug, Error)]
pub enum SaveError {
    #[error("a save is already in flight for class {0}")]
    InFlight(String),
    #[error("class not found: {0}")]
    ClassNotFound(String),
    #[error("timetable changed since it was loaded (expected {expected}, found {actual})")]
    RevisionConflict { expected: String, actual: String },
    #[error("subject {0} is not offered for this class")]
    UnknownSubject(String),
    #[error("teacher not found: {0}")]
    UnknownTeacher(String),
    #[error(transparent)]
    InvalidSlot(#[from] SlotError),
    #[error(transparent)]
    Store(#[from] anyhow::Error),
}

impl SaveError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::InFlight(_) => "save_in_flight",
            Self::ClassNotFound(_) => "not_found",
            Self::RevisionConflict { .. } => "revision_conflict",
            Self::UnknownSubject(_) => "unknown_subject",
            Self::UnknownTeacher(_) => "unknown_teacher",
            Self::InvalidSlot(_) => "invalid_slot",
            Self::Store(_) => "save_failed",
        }
    }

    pub fn details(&self) -> Option<serde_json::Value> {
        match self {
            Self::RevisionConflict { expected, actual } => Some(serde_json::json!({
                "expectedRevision": expected,
                "currentRevision": actual,
            })),
            _ => None,
        }
    }
}

/// What the scheduler consumes from the rest of the application.
pub trait TimetableStore {
    fn subjects_by_class(&self, class_id: &str) -> anyhow::Result<Vec<Subject>>;
    fn teachers(&self) -> anyhow::Result<Vec<Teacher>>;
    fn timetable(&self, filter: &TimetableFilter) -> anyhow::Result<Vec<TimetableEntry>>;
    fn revision(&self, class_id: &str) -> anyhow::Result<String>;

    /// Replace the whole persisted slot set of `class_id` with `slots`.
    /// Any persisted coordinate missing from `slots` is dropped.
    fn bulk_save_timetable(
        &self,
        class_id: &str,
        slots: &[Slot],
        expected_revision: Option<&str>,
    ) -> Result<SaveReceipt, SaveError>;
}

/// Keep only slots that carry a subject, in coordinate order.
pub fn assigned_only<'a, I>(slots: I) -> Vec<Slot>
where
    I: IntoIterator<Item = &'a Slot>,
{
    let mut out: Vec<Slot> = slots.into_iter().filter(|s| s.is_assigned()).cloned().collect();
    out.sort_by_key(|s| s.coordinate());
    out
}

/// Content digest of a class's slot set; equal sets give equal revisions
/// regardless of input order.
pub fn revision_of(slots: &[Slot]) -> String {
    let mut ordered: Vec<&Slot> = slots.iter().collect();
    ordered.sort_by_key(|s| s.coordinate());

    let mut hasher = Sha256::new();
    for s in ordered {
        let line = format!(
            "{}|{}|{}|{}|{}|{}|{}\n",
            s.day_of_week,
            s.period_number,
            s.subject_id.as_deref().unwrap_or(""),
            s.teacher_id.as_deref().unwrap_or(""),
            s.start_time.as_deref().unwrap_or(""),
            s.end_time.as_deref().unwrap_or(""),
            s.room.as_deref().unwrap_or(""),
        );
        hasher.update(line.as_bytes());
    }
    format!("{:x}", hasher.finalize())
}

/// Commits a class draft as one replace-all write.
#[derive(Debug, Default)]
pub struct BulkPersistence {
    in_flight: bool,
}

impl BulkPersistence {
    pub fn is_in_flight(&self) -> bool {
        self.in_flight
    }

    /// Mark a save as pending and return the payload to send.
    pub fn begin(&mut self, grid: &ScheduleGridModel) -> Result<Vec<Slot>, SaveError> {
        if self.in_flight {
            return Err(SaveError::InFlight(grid.class_id().to_string()));
        }
        self.in_flight = true;
        Ok(assigned_only(grid.slots()))
    }

    pub fn finish(&mut self) {
        self.in_flight = false;
    }

    /// Send the filtered draft. The draft is borrowed immutably: on failure it
    /// is exactly what the user had before pressing save.
    pub fn save<S>(
        &mut self,
        store: &S,
        grid: &ScheduleGridModel,
        expected_revision: Option<&str>,
    ) -> Result<SaveReceipt, SaveError>
    where
        S: TimetableStore + ?Sized,
    {
        let payload = self.begin(grid)?;
        let result = store.bulk_save_timetable(grid.class_id(), &payload, expected_revision);
        self.finish();

        match &result {
            Ok(receipt) => tracing::info!(
                class_id = %receipt.class_id,
                saved = receipt.saved,
                revision = %receipt.revision,
                "timetable saved"
            ),
            Err(e) => tracing::warn!(
                class_id = %grid.class_id(),
                code = e.code(),
                error = %e,
                "timetable save failed"
            ),
        }
        result
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::cell::{Cell, RefCell};
    use std::collections::HashMap;

    /// In-memory store that records every bulk save it receives.
    #[derive(Default)]
    pub struct MemoryStore {
        pub classes: HashMap<String, (String, Option<String>)>,
        pub subjects: Vec<Subject>,
        pub teachers: Vec<Teacher>,
        pub slots: RefCell<Vec<Slot>>,
        pub saves: RefCell<Vec<(String, Vec<Slot>)>>,
        pub fail_saves: Cell<bool>,
        pub fail_subjects: bool,
        pub fail_teachers: bool,
    }

    impl MemoryStore {
        pub fn with_class(class_id: &str) -> Self {
            let mut store = Self::default();
            store
                .classes
                .insert(class_id.to_string(), (format!("Class {}", class_id), None));
            store
        }

        pub fn seed(&self, slots: Vec<Slot>) {
            *self.slots.borrow_mut() = slots;
        }
    }

    impl TimetableStore for MemoryStore {
        fn subjects_by_class(&self, class_id: &str) -> anyhow::Result<Vec<Subject>> {
            if self.fail_subjects {
                anyhow::bail!("subject service unavailable");
            }
            Ok(self
                .subjects
                .iter()
                .filter(|s| s.class_id == class_id)
                .cloned()
                .collect())
        }

        fn teachers(&self) -> anyhow::Result<Vec<Teacher>> {
            if self.fail_teachers {
                anyhow::bail!("teacher service unavailable");
            }
            Ok(self.teachers.clone())
        }

        fn timetable(&self, filter: &TimetableFilter) -> anyhow::Result<Vec<TimetableEntry>> {
            let slots = self.slots.borrow();
            Ok(slots
                .iter()
                .enumerate()
                .filter(|(_, s)| {
                    filter.class_id.as_deref().map_or(true, |c| s.class_id == c)
                        && filter
                            .teacher_id
                            .as_deref()
                            .map_or(true, |t| s.teacher_id.as_deref() == Some(t))
                })
                .map(|(i, s)| {
                    let (class_name, section) =
                        self.classes.get(&s.class_id).cloned().unwrap_or_default();
                    TimetableEntry {
                        id: format!("e{}", i),
                        slot: s.clone(),
                        subject_name: None,
                        subject_code: None,
                        teacher_name: None,
                        class_name,
                        section,
                    }
                })
                .collect())
        }

        fn revision(&self, class_id: &str) -> anyhow::Result<String> {
            let slots: Vec<Slot> = self
                .slots
                .borrow()
                .iter()
                .filter(|s| s.class_id == class_id)
                .cloned()
                .collect();
            Ok(revision_of(&slots))
        }

        fn bulk_save_timetable(
            &self,
            class_id: &str,
            slots: &[Slot],
            expected_revision: Option<&str>,
        ) -> Result<SaveReceipt, SaveError> {
            self.saves
                .borrow_mut()
                .push((class_id.to_string(), slots.to_vec()));
            if self.fail_saves.get() {
                return Err(SaveError::Store(anyhow::anyhow!("connection reset")));
            }
            if !self.classes.contains_key(class_id) {
                return Err(SaveError::ClassNotFound(class_id.to_string()));
            }
            let current = self.revision(class_id)?;
            if let Some(expected) = expected_revision {
                if expected != current {
                    return Err(SaveError::RevisionConflict {
                        expected: expected.to_string(),
                        actual: current,
                    });
                }
            }
            let mut all = self.slots.borrow_mut();
            all.retain(|s| s.class_id != class_id);
            all.extend(slots.iter().cloned());
            Ok(SaveReceipt {
                class_id: class_id.to_string(),
                saved: slots.len(),
                revision: revision_of(slots),
            })
        }
    }
}
