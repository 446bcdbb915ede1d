//! Weekly class timetable: the draft grid, the cell editor, the visible
//! layout, replace-all persistence and the read projections.

pub mod editor;
pub mod grid;
pub mod layout;
pub mod persistence;
pub mod session;
pub mod slot;
pub mod view;

pub use editor::{CandidatePatch, EditorError};
pub use layout::DEFAULT_PERIOD_COUNT;
pub use persistence::{SaveError, TimetableFilter, TimetableStore};
pub use session::ScheduleEditingSession;
pub use slot::{Coordinate, Slot};
