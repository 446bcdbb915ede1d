use std::collections::BTreeMap;

use super::slot::{Coordinate, Slot, SlotFields};

/// Draft slot set for exactly one class during an editing session.
///
/// Keyed by coordinate, so a cell holds at most one slot no matter how the
/// draft was reached.
#[derive(Debug, Clone)]
pub struct ScheduleGridModel {
    class_id: String,
    slots: BTreeMap<Coordinate, Slot>,
}

impl ScheduleGridModel {
    pub fn new(class_id: impl Into<String>) -> Self {
        Self {
            class_id: class_id.into(),
            slots: BTreeMap::new(),
        }
    }

    pub fn class_id(&self) -> &str {
        &self.class_id
    }

    /// Replace the draft with copies of `entries`. Entries for other classes
    /// are skipped; a later entry on the same coordinate replaces an earlier one.
    pub fn load(&mut self, entries: &[Slot]) {
        self.slots.clear();
        for entry in entries {
            if entry.class_id != self.class_id {
                tracing::warn!(
                    class_id = %self.class_id,
                    foreign_class_id = %entry.class_id,
                    "skipping timetable entry for another class"
                );
                continue;
            }
            self.slots.insert(entry.coordinate(), entry.clone());
        }
    }

    pub fn get_slot(&self, at: Coordinate) -> Option<&Slot> {
        self.slots.get(&at)
    }

    /// Remove whatever sits at `at`, then place `data` there if it carries a
    /// subject. Returns the slot that was displaced, if any.
    pub fn assign_slot(&mut self, at: Coordinate, data: SlotFields) -> Option<Slot> {
        let previous = self.slots.remove(&at);
        let data = data.normalized();
        if data.has_subject() {
            self.slots
                .insert(at, Slot::new(self.class_id.clone(), at, data));
        }
        previous
    }

    pub fn remove_slot(&mut self, at: Coordinate) -> Option<Slot> {
        self.slots.remove(&at)
    }

    pub fn slots(&self) -> impl Iterator<Item = &Slot> {
        self.slots.values()
    }

    pub fn draft(&self) -> Vec<Slot> {
        self.slots.values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn max_period(&self) -> Option<u32> {
        self.slots.keys().map(|c| c.period_number).max()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn at(day: u8, period: u32) -> Coordinate {
        Coordinate::new(day, period).expect("coordinate")
    }

    fn subject(id: &str) -> SlotFields {
        SlotFields {
            subject_id: Some(id.to_string()),
            ..Default::default()
        }
    }

    fn entry(day: u8, period: u32, subject_id: Option<&str>) -> Slot {
        Slot::new(
            "C1",
            at(day, period),
            SlotFields {
                subject_id: subject_id.map(str::to_string),
                teacher_id: Some("T1".into()),
                ..Default::default()
            },
        )
    }

    #[test]
    fn assign_replaces_instead_of_appending() {
        let mut grid = ScheduleGridModel::new("C1");
        grid.assign_slot(at(0, 1), subject("MATH"));
        let displaced = grid.assign_slot(at(0, 1), subject("SCI"));

        assert_eq!(grid.len(), 1);
        assert_eq!(
            displaced.and_then(|s| s.subject_id).as_deref(),
            Some("MATH")
        );
        assert_eq!(
            grid.get_slot(at(0, 1)).and_then(|s| s.subject_id.as_deref()),
            Some("SCI")
        );
    }

    #[test]
    fn assign_with_empty_subject_acts_as_remove() {
        let mut grid = ScheduleGridModel::new("C1");
        grid.assign_slot(at(3, 2), subject("MATH"));
        grid.assign_slot(at(3, 2), subject("  "));
        assert!(grid.get_slot(at(3, 2)).is_none());
        assert!(grid.is_empty());
    }

    #[test]
    fn remove_is_idempotent() {
        let mut grid = ScheduleGridModel::new("C1");
        grid.assign_slot(at(1, 1), subject("ART"));
        let before = grid.draft();

        assert!(grid.remove_slot(at(4, 4)).is_none());
        assert_eq!(grid.draft(), before);

        assert!(grid.remove_slot(at(1, 1)).is_some());
        assert!(grid.remove_slot(at(1, 1)).is_none());
        assert!(grid.is_empty());
    }

    #[test]
    fn uniqueness_holds_over_mixed_operations() {
        let mut grid = ScheduleGridModel::new("C1");
        for i in 0..200u32 {
            let c = at((i % 6) as u8, 1 + (i * 7) % 5);
            if i % 3 == 0 {
                grid.remove_slot(c);
            } else {
                grid.assign_slot(c, subject(&format!("S{}", i)));
            }
        }
        let coords: Vec<_> = grid.slots().map(|s| s.coordinate()).collect();
        let unique: HashSet<_> = coords.iter().copied().collect();
        assert_eq!(coords.len(), unique.len());
    }

    #[test]
    fn load_seeds_every_entry_and_leaves_input_alone() {
        let entries = vec![
            entry(0, 1, Some("MATH")),
            entry(2, 3, Some("SCI")),
            entry(5, 9, None),
        ];
        let snapshot = entries.clone();

        let mut grid = ScheduleGridModel::new("C1");
        grid.load(&entries);

        assert_eq!(entries, snapshot);
        for e in &entries {
            assert_eq!(grid.get_slot(e.coordinate()), Some(e));
        }
        assert_eq!(grid.max_period(), Some(9));
    }

    #[test]
    fn load_skips_foreign_class_and_keeps_last_duplicate() {
        let mut foreign = entry(1, 1, Some("HIST"));
        foreign.class_id = "C2".into();
        let entries = vec![
            entry(0, 1, Some("MATH")),
            entry(0, 1, Some("SCI")),
            foreign,
        ];

        let mut grid = ScheduleGridModel::new("C1");
        grid.load(&entries);

        assert_eq!(grid.len(), 1);
        assert_eq!(
            grid.get_slot(at(0, 1)).and_then(|s| s.subject_id.as_deref()),
            Some("SCI")
        );
    }
}
