use std::collections::{BTreeMap, HashSet};

use serde::Serialize;

use super::layout::LayoutConfig;
use super::persistence::TimetableEntry;
use super::slot::{Coordinate, Placed, DAY_COUNT, DAY_NAMES};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DayGroup<T> {
    pub day_of_week: u8,
    pub label: &'static str,
    pub entries: Vec<T>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TeacherSummary {
    pub total_periods: usize,
    pub distinct_subjects: usize,
    pub distinct_classes: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TeacherSchedule {
    pub days: Vec<DayGroup<TimetableEntry>>,
    pub summary: TeacherSummary,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum GridCell<T> {
    Empty { at: Coordinate },
    Assigned { at: Coordinate, slot: T },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GridRow<T> {
    pub period_number: u32,
    pub cells: Vec<GridCell<T>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderedGrid<T> {
    pub period_count: u32,
    pub days: Vec<&'static str>,
    pub rows: Vec<GridRow<T>>,
    /// Slots that exist but sit below the last visible row.
    pub hidden_assigned: usize,
}

/// Group by day (all six days, even when empty), each day ordered by period.
pub fn group_by_day<T>(items: &[T]) -> Vec<DayGroup<T>>
where
    T: Placed + Clone,
{
    let mut days: Vec<DayGroup<T>> = (0..DAY_COUNT)
        .map(|d| DayGroup {
            day_of_week: d,
            label: DAY_NAMES[d as usize],
            entries: Vec::new(),
        })
        .collect();
    for item in items {
        let d = item.coordinate().day_of_week;
        if let Some(group) = days.get_mut(d as usize) {
            group.entries.push(item.clone());
        }
    }
    for group in &mut days {
        group.entries.sort_by_key(|e| e.coordinate().period_number);
    }
    days
}

pub fn by_class(entries: &[TimetableEntry]) -> Vec<DayGroup<TimetableEntry>> {
    group_by_day(entries)
}

pub fn by_teacher(entries: &[TimetableEntry]) -> TeacherSchedule {
    TeacherSchedule {
        days: group_by_day(entries),
        summary: teacher_summary(entries),
    }
}

pub fn teacher_summary(entries: &[TimetableEntry]) -> TeacherSummary {
    let subjects: HashSet<&str> = entries
        .iter()
        .filter_map(|e| e.slot.subject_id.as_deref())
        .collect();
    let classes: HashSet<(&str, &str)> = entries
        .iter()
        .map(|e| (e.class_name.as_str(), e.section.as_deref().unwrap_or("")))
        .collect();
    TeacherSummary {
        total_periods: entries.len(),
        distinct_subjects: subjects.len(),
        distinct_classes: classes.len(),
    }
}

/// Lay `items` out on the visible grid. Every visible cell is present, as an
/// explicit placeholder when nothing is assigned there.
pub fn render_grid<'a, T, I>(items: I, layout: &LayoutConfig) -> RenderedGrid<T>
where
    T: Placed + Clone + 'a,
    I: IntoIterator<Item = &'a T>,
{
    let mut by_coord: BTreeMap<Coordinate, &T> = BTreeMap::new();
    let mut hidden_assigned = 0;
    for item in items {
        let at = item.coordinate();
        if layout.is_visible(at) {
            by_coord.insert(at, item);
        } else {
            hidden_assigned += 1;
        }
    }

    let rows = layout
        .periods()
        .map(|period_number| GridRow {
            period_number,
            cells: layout
                .days()
                .map(|day_of_week| {
                    let at = Coordinate {
                        day_of_week,
                        period_number,
                    };
                    match by_coord.get(&at) {
                        Some(slot) => GridCell::Assigned {
                            at,
                            slot: (*slot).clone(),
                        },
                        None => GridCell::Empty { at },
                    }
                })
                .collect(),
        })
        .collect();

    RenderedGrid {
        period_count: layout.period_count(),
        days: DAY_NAMES.to_vec(),
        rows,
        hidden_assigned,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timetable::slot::{Slot, SlotFields};

    fn entry(class: (&str, Option<&str>), day: u8, period: u32, subject: &str) -> TimetableEntry {
        TimetableEntry {
            id: format!("{}-{}-{}", class.0, day, period),
            slot: Slot::new(
                class.0,
                Coordinate::new(day, period).expect("coordinate"),
                SlotFields {
                    subject_id: Some(subject.to_string()),
                    teacher_id: Some("T1".into()),
                    ..Default::default()
                },
            ),
            subject_name: None,
            subject_code: None,
            teacher_name: Some("Ada".into()),
            class_name: class.0.to_string(),
            section: class.1.map(str::to_string),
        }
    }

    #[test]
    fn by_class_groups_days_and_sorts_periods() {
        let c = ("Grade 7", Some("A"));
        let entries = vec![
            entry(c, 2, 5, "MATH"),
            entry(c, 0, 3, "SCI"),
            entry(c, 2, 1, "ART"),
            entry(c, 0, 1, "HIST"),
        ];
        let days = by_class(&entries);

        assert_eq!(days.len(), 6);
        assert_eq!(days[0].label, "Monday");
        let monday: Vec<u32> = days[0]
            .entries
            .iter()
            .map(|e| e.slot.period_number)
            .collect();
        let wednesday: Vec<u32> = days[2]
            .entries
            .iter()
            .map(|e| e.slot.period_number)
            .collect();
        assert_eq!(monday, vec![1, 3]);
        assert_eq!(wednesday, vec![1, 5]);
        assert!(days[5].entries.is_empty());
        assert_eq!(entries.len(), 4, "input untouched");
    }

    #[test]
    fn teacher_summary_counts_distinct_classes_and_subjects() {
        let a = ("Grade 7", Some("A"));
        let b = ("Grade 7", Some("B"));
        let c = ("Grade 8", None);
        let mut entries = vec![
            entry(a, 0, 1, "MATH"),
            entry(b, 0, 2, "MATH"),
            entry(c, 1, 1, "SCI"),
            entry(a, 3, 4, "SCI"),
            entry(c, 4, 6, "MATH"),
        ];
        let forward = by_teacher(&entries).summary;
        entries.reverse();
        let backward = by_teacher(&entries).summary;

        assert_eq!(forward, backward);
        assert_eq!(forward.total_periods, 5);
        assert_eq!(forward.distinct_classes, 3);
        assert_eq!(forward.distinct_subjects, 2);
    }

    #[test]
    fn grid_has_placeholders_and_reports_hidden_rows() {
        let c = ("Grade 7", None);
        let entries = vec![entry(c, 0, 1, "MATH"), entry(c, 3, 7, "SCI")];

        let mut layout = LayoutConfig::for_data(5, None);
        let grid = render_grid(&entries, &layout);
        assert_eq!(grid.rows.len(), 5);
        assert!(grid.rows.iter().all(|r| r.cells.len() == 6));
        assert_eq!(grid.hidden_assigned, 1);
        assert!(matches!(grid.rows[0].cells[0], GridCell::Assigned { .. }));
        assert!(matches!(grid.rows[0].cells[1], GridCell::Empty { .. }));

        layout.increment();
        layout.increment();
        let grid = render_grid(&entries, &layout);
        assert_eq!(grid.hidden_assigned, 0);
        assert!(matches!(grid.rows[6].cells[3], GridCell::Assigned { .. }));
    }

    #[test]
    fn empty_cell_serializes_as_placeholder() {
        let layout = LayoutConfig::for_data(1, None);
        let grid = render_grid::<TimetableEntry, _>(&[], &layout);
        let v = serde_json::to_value(&grid).expect("json");
        assert_eq!(v["rows"][0]["cells"][0]["kind"], "empty");
        assert_eq!(v["rows"][0]["cells"][0]["at"]["dayOfWeek"], 0);
        assert_eq!(v["hiddenAssigned"], 0);
    }
}
