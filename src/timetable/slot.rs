use chrono::NaiveTime;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Monday..Saturday. Sunday is never part of the grid.
pub const DAY_COUNT: u8 = 6;
pub const DAY_NAMES: [&str; DAY_COUNT as usize] = [
    "Monday",
    "Tuesday",
    "Wednesday",
    "Thursday",
    "Friday",
    "Saturday",
];

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SlotError {
    #[error("day_of_week must be in 0..=5, got {0}")]
    DayOutOfRange(u8),
    #[error("period_number must be >= 1")]
    PeriodOutOfRange,
    #[error("{field} must be HH:MM or HH:MM:SS, got {value:?}")]
    BadTime { field: &'static str, value: String },
    #[error("slot belongs to class {found}, expected {expected}")]
    ClassMismatch { expected: String, found: String },
    #[error("duplicate slot at day {day}, period {period}")]
    DuplicateCoordinate { day: u8, period: u32 },
}

/// A (day_of_week, period_number) cell address within one class.
///
/// Ordering is day-major so ordered maps iterate the way the week reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Coordinate {
    pub day_of_week: u8,
    pub period_number: u32,
}

impl Coordinate {
    pub fn new(day_of_week: u8, period_number: u32) -> Result<Self, SlotError> {
        if day_of_week >= DAY_COUNT {
            return Err(SlotError::DayOutOfRange(day_of_week));
        }
        if period_number == 0 {
            return Err(SlotError::PeriodOutOfRange);
        }
        Ok(Self {
            day_of_week,
            period_number,
        })
    }

    pub fn day_name(&self) -> &'static str {
        DAY_NAMES[self.day_of_week as usize]
    }
}

/// The editable part of a slot: everything except its address.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SlotFields {
    #[serde(default)]
    pub subject_id: Option<String>,
    #[serde(default)]
    pub teacher_id: Option<String>,
    #[serde(default)]
    pub start_time: Option<String>,
    #[serde(default)]
    pub end_time: Option<String>,
    #[serde(default)]
    pub room: Option<String>,
}

impl SlotFields {
    pub fn has_subject(&self) -> bool {
        non_blank(self.subject_id.as_deref()).is_some()
    }

    pub fn validate_times(&self) -> Result<(), SlotError> {
        check_time("start_time", self.start_time.as_deref())?;
        check_time("end_time", self.end_time.as_deref())
    }

    /// Blank optional strings are stored as absent.
    pub fn normalized(mut self) -> Self {
        for field in [
            &mut self.subject_id,
            &mut self.teacher_id,
            &mut self.start_time,
            &mut self.end_time,
            &mut self.room,
        ] {
            *field = field
                .take()
                .and_then(|v| non_blank(Some(v.as_str())).map(str::to_string));
        }
        self
    }
}

/// One (day, period) record of a class timetable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Slot {
    #[serde(default)]
    pub class_id: String,
    pub day_of_week: u8,
    pub period_number: u32,
    #[serde(default)]
    pub subject_id: Option<String>,
    #[serde(default)]
    pub teacher_id: Option<String>,
    #[serde(default)]
    pub start_time: Option<String>,
    #[serde(default)]
    pub end_time: Option<String>,
    #[serde(default)]
    pub room: Option<String>,
}

impl Slot {
    pub fn new(class_id: impl Into<String>, at: Coordinate, fields: SlotFields) -> Self {
        Self {
            class_id: class_id.into(),
            day_of_week: at.day_of_week,
            period_number: at.period_number,
            subject_id: fields.subject_id,
            teacher_id: fields.teacher_id,
            start_time: fields.start_time,
            end_time: fields.end_time,
            room: fields.room,
        }
    }

    /// Unchecked address; use `validate` before trusting it.
    pub fn coordinate(&self) -> Coordinate {
        Coordinate {
            day_of_week: self.day_of_week,
            period_number: self.period_number,
        }
    }

    /// A slot without a subject is an empty cell and is never persisted.
    pub fn is_assigned(&self) -> bool {
        non_blank(self.subject_id.as_deref()).is_some()
    }

    pub fn fields(&self) -> SlotFields {
        SlotFields {
            subject_id: self.subject_id.clone(),
            teacher_id: self.teacher_id.clone(),
            start_time: self.start_time.clone(),
            end_time: self.end_time.clone(),
            room: self.room.clone(),
        }
    }

    pub fn validate(&self) -> Result<Coordinate, SlotError> {
        let at = Coordinate::new(self.day_of_week, self.period_number)?;
        self.fields().validate_times()?;
        Ok(at)
    }
}

/// Anything that sits on a grid cell.
pub trait Placed {
    fn coordinate(&self) -> Coordinate;
}

impl Placed for Slot {
    fn coordinate(&self) -> Coordinate {
        Slot::coordinate(self)
    }
}

fn non_blank(v: Option<&str>) -> Option<&str> {
    v.map(str::trim).filter(|s| !s.is_empty())
}

fn check_time(field: &'static str, value: Option<&str>) -> Result<(), SlotError> {
    let Some(raw) = non_blank(value) else {
        return Ok(());
    };
    let parsed = NaiveTime::parse_from_str(raw, "%H:%M:%S")
        .or_else(|_| NaiveTime::parse_from_str(raw, "%H:%M"));
    match parsed {
        Ok(_) => Ok(()),
        Err(_) => Err(SlotError::BadTime {
            field,
            value: raw.to_string(),
        }),
    }
}
