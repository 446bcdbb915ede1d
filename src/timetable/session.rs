use serde::Serialize;

use super::editor::{CandidatePatch, EditorError, EditorOutcome, SlotEditor};
use super::grid::ScheduleGridModel;
use super::layout::LayoutConfig;
use super::persistence::{
    BulkPersistence, SaveError, SaveReceipt, Subject, Teacher, TimetableFilter, TimetableStore,
};
use super::slot::{Coordinate, Slot, SlotFields};
use super::view::{render_grid, RenderedGrid};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum SessionPhase {
    Loading,
    Ready,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OpenCell<'a> {
    pub at: Coordinate,
    pub candidate: &'a SlotFields,
    pub can_commit: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot<'a> {
    pub session_id: &'a str,
    pub class_id: &'a str,
    pub phase: SessionPhase,
    pub period_count: u32,
    pub base_revision: &'a str,
    pub draft_count: usize,
    pub saving: bool,
    pub subjects: &'a [Subject],
    pub teachers: &'a [Teacher],
    pub roster_warnings: &'a [String],
    pub open_cell: Option<OpenCell<'a>>,
    pub grid: RenderedGrid<Slot>,
}

/// Everything one timetable dialog owns while it is open.
#[derive(Debug)]
pub struct ScheduleEditingSession {
    id: String,
    grid: ScheduleGridModel,
    editor: SlotEditor,
    layout: LayoutConfig,
    persistence: BulkPersistence,
    subjects: Vec<Subject>,
    teachers: Vec<Teacher>,
    roster_warnings: Vec<String>,
    phase: SessionPhase,
    base_revision: String,
}

impl ScheduleEditingSession {
    /// A session seeded with persisted entries, still waiting on rosters.
    pub fn new(
        class_id: &str,
        entries: &[Slot],
        base_revision: String,
        default_period_count: u32,
    ) -> Self {
        let mut grid = ScheduleGridModel::new(class_id);
        grid.load(entries);
        let layout = LayoutConfig::for_data(default_period_count, grid.max_period());
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            grid,
            editor: SlotEditor::default(),
            layout,
            persistence: BulkPersistence::default(),
            subjects: Vec::new(),
            teachers: Vec::new(),
            roster_warnings: Vec::new(),
            phase: SessionPhase::Loading,
            base_revision,
        }
    }

    /// Load the class timetable, then both rosters. A roster that fails to
    /// load becomes an empty list plus a warning; the timetable itself must load.
    pub fn open<S>(store: &S, class_id: &str, default_period_count: u32) -> anyhow::Result<Self>
    where
        S: TimetableStore + ?Sized,
    {
        let entries = store.timetable(&TimetableFilter::class(class_id))?;
        let slots: Vec<Slot> = entries.into_iter().map(|e| e.slot).collect();
        let revision = store.revision(class_id)?;

        let mut session = Self::new(class_id, &slots, revision, default_period_count);
        session.attach_rosters(store.subjects_by_class(class_id), store.teachers());
        tracing::info!(
            session_id = %session.id,
            class_id,
            slots = session.grid.len(),
            period_count = session.layout.period_count(),
            "timetable session opened"
        );
        Ok(session)
    }

    pub fn attach_rosters(
        &mut self,
        subjects: anyhow::Result<Vec<Subject>>,
        teachers: anyhow::Result<Vec<Teacher>>,
    ) {
        match subjects {
            Ok(v) => self.subjects = v,
            Err(e) => {
                tracing::warn!(class_id = %self.grid.class_id(), error = %e, "subject roster unavailable");
                self.roster_warnings
                    .push(format!("subjects could not be loaded: {}", e));
            }
        }
        match teachers {
            Ok(v) => self.teachers = v,
            Err(e) => {
                tracing::warn!(class_id = %self.grid.class_id(), error = %e, "teacher roster unavailable");
                self.roster_warnings
                    .push(format!("teachers could not be loaded: {}", e));
            }
        }
        self.phase = SessionPhase::Ready;
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn class_id(&self) -> &str {
        self.grid.class_id()
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    pub fn grid(&self) -> &ScheduleGridModel {
        &self.grid
    }

    pub fn layout(&self) -> &LayoutConfig {
        &self.layout
    }

    pub fn base_revision(&self) -> &str {
        &self.base_revision
    }

    pub fn roster_warnings(&self) -> &[String] {
        &self.roster_warnings
    }

    fn ensure_ready(&self) -> Result<(), EditorError> {
        match self.phase {
            SessionPhase::Ready => Ok(()),
            SessionPhase::Loading => Err(EditorError::Loading),
        }
    }

    pub fn open_cell(&mut self, at: Coordinate) -> Result<&SlotFields, EditorError> {
        self.ensure_ready()?;
        self.editor.open(at, &self.grid)
    }

    /// Apply a patch to the open cell. Subject and teacher ids must come from
    /// the loaded rosters.
    pub fn edit_cell(&mut self, patch: CandidatePatch) -> Result<&SlotFields, EditorError> {
        self.ensure_ready()?;
        if let Some(Some(id)) = patch.subject_id.as_ref().map(|v| blank_to_none(v.as_deref())) {
            if !self.subjects.iter().any(|s| s.id == id) {
                return Err(EditorError::UnknownSubject(id.to_string()));
            }
        }
        if let Some(Some(id)) = patch.teacher_id.as_ref().map(|v| blank_to_none(v.as_deref())) {
            if !self.teachers.iter().any(|t| t.id == id) {
                return Err(EditorError::UnknownTeacher(id.to_string()));
            }
        }
        self.editor.edit(patch)
    }

    pub fn commit_cell(&mut self) -> Result<EditorOutcome, EditorError> {
        self.editor.commit(&mut self.grid)
    }

    pub fn clear_cell(&mut self) -> Result<EditorOutcome, EditorError> {
        self.editor.clear(&mut self.grid)
    }

    pub fn cancel_cell(&mut self) -> Result<EditorOutcome, EditorError> {
        self.editor.cancel()
    }

    pub fn add_period(&mut self) -> u32 {
        self.layout.increment()
    }

    pub fn remove_period(&mut self) -> u32 {
        self.layout.decrement()
    }

    /// Persist the committed draft. With `check_revision` the save only
    /// succeeds if nobody else saved this class since the session loaded.
    pub fn save<S>(&mut self, store: &S, check_revision: bool) -> Result<SaveReceipt, SaveError>
    where
        S: TimetableStore + ?Sized,
    {
        let expected = check_revision.then_some(self.base_revision.as_str());
        let receipt = self.persistence.save(store, &self.grid, expected)?;
        self.base_revision = receipt.revision.clone();
        Ok(receipt)
    }

    pub fn snapshot(&self) -> SessionSnapshot<'_> {
        SessionSnapshot {
            session_id: &self.id,
            class_id: self.grid.class_id(),
            phase: self.phase,
            period_count: self.layout.period_count(),
            base_revision: &self.base_revision,
            draft_count: self.grid.len(),
            saving: self.persistence.is_in_flight(),
            subjects: &self.subjects,
            teachers: &self.teachers,
            roster_warnings: &self.roster_warnings,
            open_cell: self.editor.candidate().map(|(at, candidate)| OpenCell {
                at,
                candidate,
                can_commit: self.editor.can_commit(),
            }),
            grid: render_grid(self.grid.slots(), &self.layout),
        }
    }
}

fn blank_to_none(v: Option<&str>) -> Option<&str> {
    v.map(str::trim).filter(|s| !s.is_empty())
}
