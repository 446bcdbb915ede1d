use std::collections::HashSet;

use anyhow::Context;
use rusqlite::{Connection, OptionalExtension};

use crate::timetable::persistence::{
    revision_of, SaveError, SaveReceipt, Subject, Teacher, TimetableEntry, TimetableFilter,
    TimetableStore,
};
use crate::timetable::slot::{Slot, SlotError};

/// `TimetableStore` over the workspace database.
pub struct SqliteStore<'a> {
    conn: &'a Connection,
}

impl<'a> SqliteStore<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    pub fn class_exists(&self, class_id: &str) -> anyhow::Result<bool> {
        let found: Option<i64> = self
            .conn
            .query_row("SELECT 1 FROM classes WHERE id = ?", [class_id], |r| r.get(0))
            .optional()?;
        Ok(found.is_some())
    }

    fn class_slots(&self, class_id: &str) -> anyhow::Result<Vec<Slot>> {
        let mut stmt = self.conn.prepare(
            "SELECT class_id, day_of_week, period_number, subject_id, teacher_id,
                    start_time, end_time, room
             FROM timetable_entries
             WHERE class_id = ?
             ORDER BY day_of_week, period_number",
        )?;
        let rows = stmt
            .query_map([class_id], |r| {
                Ok(Slot {
                    class_id: r.get(0)?,
                    day_of_week: r.get(1)?,
                    period_number: r.get(2)?,
                    subject_id: r.get(3)?,
                    teacher_id: r.get(4)?,
                    start_time: r.get(5)?,
                    end_time: r.get(6)?,
                    room: r.get(7)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Normalize and check a replace-all payload before anything is written.
    fn prepare_payload(&self, class_id: &str, slots: &[Slot]) -> Result<Vec<Slot>, SaveError> {
        let offered: HashSet<String> = self
            .subjects_by_class(class_id)?
            .into_iter()
            .map(|s| s.id)
            .collect();
        let mut known_teachers: HashSet<String> = HashSet::new();
        let mut seen = HashSet::new();
        let mut out = Vec::with_capacity(slots.len());

        for slot in slots {
            if slot.class_id != class_id {
                return Err(SlotError::ClassMismatch {
                    expected: class_id.to_string(),
                    found: slot.class_id.clone(),
                }
                .into());
            }
            let at = slot.validate()?;
            if !seen.insert(at) {
                return Err(SlotError::DuplicateCoordinate {
                    day: at.day_of_week,
                    period: at.period_number,
                }
                .into());
            }

            let normalized = Slot::new(class_id, at, slot.fields().normalized());
            let subject_id = normalized.subject_id.clone().unwrap_or_default();
            if !offered.contains(&subject_id) {
                return Err(SaveError::UnknownSubject(subject_id));
            }
            if let Some(teacher_id) = normalized.teacher_id.as_deref() {
                if !known_teachers.contains(teacher_id) {
                    if !self.teacher_exists(teacher_id)? {
                        return Err(SaveError::UnknownTeacher(teacher_id.to_string()));
                    }
                    known_teachers.insert(teacher_id.to_string());
                }
            }
            out.push(normalized);
        }
        out.sort_by_key(|s| s.coordinate());
        Ok(out)
    }

    fn teacher_exists(&self, teacher_id: &str) -> anyhow::Result<bool> {
        let found: Option<i64> = self
            .conn
            .query_row("SELECT 1 FROM teachers WHERE id = ?", [teacher_id], |r| r.get(0))
            .optional()?;
        Ok(found.is_some())
    }
}

impl TimetableStore for SqliteStore<'_> {
    fn subjects_by_class(&self, class_id: &str) -> anyhow::Result<Vec<Subject>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, class_id, name, code FROM subjects WHERE class_id = ? ORDER BY name",
        )?;
        let rows = stmt
            .query_map([class_id], |r| {
                Ok(Subject {
                    id: r.get(0)?,
                    class_id: r.get(1)?,
                    name: r.get(2)?,
                    code: r.get(3)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    fn teachers(&self) -> anyhow::Result<Vec<Teacher>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, name, email FROM teachers ORDER BY name")?;
        let rows = stmt
            .query_map([], |r| {
                Ok(Teacher {
                    id: r.get(0)?,
                    name: r.get(1)?,
                    email: r.get(2)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    fn timetable(&self, filter: &TimetableFilter) -> anyhow::Result<Vec<TimetableEntry>> {
        let mut stmt = self.conn.prepare(
            "SELECT e.id, e.class_id, e.day_of_week, e.period_number, e.subject_id,
                    e.teacher_id, e.start_time, e.end_time, e.room,
                    s.name, s.code, t.name, c.name, c.section
             FROM timetable_entries e
             JOIN classes c ON c.id = e.class_id
             LEFT JOIN subjects s ON s.id = e.subject_id
             LEFT JOIN teachers t ON t.id = e.teacher_id
             WHERE (?1 IS NULL OR e.class_id = ?1)
               AND (?2 IS NULL OR e.teacher_id = ?2)
             ORDER BY c.name, c.section, e.day_of_week, e.period_number",
        )?;
        let rows = stmt
            .query_map(
                (filter.class_id.as_deref(), filter.teacher_id.as_deref()),
                |r| {
                    Ok(TimetableEntry {
                        id: r.get(0)?,
                        slot: Slot {
                            class_id: r.get(1)?,
                            day_of_week: r.get(2)?,
                            period_number: r.get(3)?,
                            subject_id: r.get(4)?,
                            teacher_id: r.get(5)?,
                            start_time: r.get(6)?,
                            end_time: r.get(7)?,
                            room: r.get(8)?,
                        },
                        subject_name: r.get(9)?,
                        subject_code: r.get(10)?,
                        teacher_name: r.get(11)?,
                        class_name: r.get(12)?,
                        section: r.get(13)?,
                    })
                },
            )?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    fn revision(&self, class_id: &str) -> anyhow::Result<String> {
        Ok(revision_of(&self.class_slots(class_id)?))
    }

    fn bulk_save_timetable(
        &self,
        class_id: &str,
        slots: &[Slot],
        expected_revision: Option<&str>,
    ) -> Result<SaveReceipt, SaveError> {
        if !self.class_exists(class_id)? {
            return Err(SaveError::ClassNotFound(class_id.to_string()));
        }
        let payload = self.prepare_payload(class_id, slots)?;

        let tx = self
            .conn
            .unchecked_transaction()
            .context("begin timetable transaction")?;

        if let Some(expected) = expected_revision {
            let current = self.revision(class_id)?;
            if current != expected {
                return Err(SaveError::RevisionConflict {
                    expected: expected.to_string(),
                    actual: current,
                });
            }
        }

        tx.execute(
            "DELETE FROM timetable_entries WHERE class_id = ?",
            [class_id],
        )
        .context("clear class timetable")?;

        let updated_at = chrono::Utc::now().to_rfc3339();
        {
            let mut insert = tx
                .prepare(
                    "INSERT INTO timetable_entries(
                        id, class_id, day_of_week, period_number, subject_id,
                        teacher_id, start_time, end_time, room, updated_at)
                     VALUES(?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
                )
                .context("prepare timetable insert")?;
            for s in &payload {
                insert
                    .execute((
                        uuid::Uuid::new_v4().to_string(),
                        &s.class_id,
                        s.day_of_week,
                        s.period_number,
                        &s.subject_id,
                        &s.teacher_id,
                        &s.start_time,
                        &s.end_time,
                        &s.room,
                        &updated_at,
                    ))
                    .with_context(|| {
                        format!(
                            "insert slot day {} period {}",
                            s.day_of_week, s.period_number
                        )
                    })?;
            }
        }

        tx.commit().context("commit timetable")?;

        Ok(SaveReceipt {
            class_id: class_id.to_string(),
            saved: payload.len(),
            revision: revision_of(&payload),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;
    use crate::timetable::slot::{Coordinate, SlotFields};

    fn setup() -> Connection {
        let conn = Connection::open_in_memory().expect("open");
        db::init_schema(&conn).expect("schema");
        conn.execute(
            "INSERT INTO classes(id, name, section) VALUES('C1', 'Grade 7', 'A'), ('C2', 'Grade 8', NULL)",
            [],
        )
        .expect("classes");
        conn.execute(
            "INSERT INTO subjects(id, class_id, name, code) VALUES
               ('MATH', 'C1', 'Mathematics', 'MA'),
               ('SCI', 'C1', 'Science', NULL),
               ('HIST', 'C2', 'History', NULL)",
            [],
        )
        .expect("subjects");
        conn.execute(
            "INSERT INTO teachers(id, name, email) VALUES('T1', 'Ada', NULL), ('T2', 'Grace', NULL)",
            [],
        )
        .expect("teachers");
        conn
    }

    fn slot(class_id: &str, day: u8, period: u32, subject: &str, teacher: Option<&str>) -> Slot {
        Slot::new(
            class_id,
            Coordinate::new(day, period).expect("coordinate"),
            SlotFields {
                subject_id: Some(subject.into()),
                teacher_id: teacher.map(str::to_string),
                ..Default::default()
            },
        )
    }

    #[test]
    fn bulk_save_replaces_everything_for_the_class() {
        let conn = setup();
        let store = SqliteStore::new(&conn);
        store
            .bulk_save_timetable(
                "C1",
                &[
                    slot("C1", 0, 1, "MATH", Some("T1")),
                    slot("C1", 2, 3, "SCI", None),
                ],
                None,
            )
            .expect("first save");
        store
            .bulk_save_timetable("C2", &[slot("C2", 1, 1, "HIST", Some("T1"))], None)
            .expect("other class");

        let receipt = store
            .bulk_save_timetable("C1", &[slot("C1", 4, 5, "SCI", Some("T2"))], None)
            .expect("second save");
        assert_eq!(receipt.saved, 1);

        let c1 = store.timetable(&TimetableFilter::class("C1")).expect("read");
        assert_eq!(c1.len(), 1);
        assert_eq!(c1[0].slot.coordinate(), Coordinate::new(4, 5).expect("coordinate"));
        assert_eq!(c1[0].subject_name.as_deref(), Some("Science"));
        assert_eq!(c1[0].teacher_name.as_deref(), Some("Grace"));
        assert_eq!(c1[0].class_name, "Grade 7");
        assert_eq!(c1[0].section.as_deref(), Some("A"));

        let c2 = store.timetable(&TimetableFilter::class("C2")).expect("read");
        assert_eq!(c2.len(), 1, "other classes are untouched");
        assert_eq!(store.revision("C1").expect("revision"), receipt.revision);
    }

    #[test]
    fn filters_combine_and_default_to_all() {
        let conn = setup();
        let store = SqliteStore::new(&conn);
        store
            .bulk_save_timetable(
                "C1",
                &[
                    slot("C1", 0, 1, "MATH", Some("T1")),
                    slot("C1", 0, 2, "SCI", Some("T2")),
                ],
                None,
            )
            .expect("save");
        store
            .bulk_save_timetable("C2", &[slot("C2", 1, 1, "HIST", Some("T1"))], None)
            .expect("save");

        let all = store.timetable(&TimetableFilter::default()).expect("all");
        assert_eq!(all.len(), 3);
        let t1 = store.timetable(&TimetableFilter::teacher("T1")).expect("t1");
        assert_eq!(t1.len(), 2);
        let both = store
            .timetable(&TimetableFilter {
                class_id: Some("C1".into()),
                teacher_id: Some("T1".into()),
            })
            .expect("both");
        assert_eq!(both.len(), 1);
    }

    #[test]
    fn invalid_payloads_write_nothing() {
        let conn = setup();
        let store = SqliteStore::new(&conn);
        store
            .bulk_save_timetable("C1", &[slot("C1", 0, 1, "MATH", None)], None)
            .expect("seed");
        let before = store.revision("C1").expect("revision");

        let cases: Vec<(Vec<Slot>, &str)> = vec![
            (vec![slot("C1", 0, 1, "HIST", None)], "unknown_subject"),
            (vec![slot("C1", 0, 1, "MATH", Some("T9"))], "unknown_teacher"),
            (
                vec![slot("C1", 0, 1, "MATH", None), slot("C1", 0, 1, "SCI", None)],
                "invalid_slot",
            ),
            (vec![slot("C2", 0, 1, "MATH", None)], "invalid_slot"),
        ];
        for (payload, code) in cases {
            let e = store
                .bulk_save_timetable("C1", &payload, None)
                .expect_err("rejected");
            assert_eq!(e.code(), code, "{}", e);
        }

        let mut sunday = slot("C1", 0, 1, "MATH", None);
        sunday.day_of_week = 6;
        let e = store
            .bulk_save_timetable("C1", &[sunday], None)
            .expect_err("sunday");
        assert_eq!(e.code(), "invalid_slot");

        assert_eq!(store.revision("C1").expect("revision"), before);
        let missing = store
            .bulk_save_timetable("nope", &[], None)
            .expect_err("missing class");
        assert_eq!(missing.code(), "not_found");
    }

    #[test]
    fn revision_mismatch_is_rejected() {
        let conn = setup();
        let store = SqliteStore::new(&conn);
        let initial = store.revision("C1").expect("revision");
        store
            .bulk_save_timetable("C1", &[slot("C1", 0, 1, "MATH", None)], Some(&initial))
            .expect("matching revision saves");

        let e = store
            .bulk_save_timetable("C1", &[], Some(&initial))
            .expect_err("stale");
        assert_eq!(e.code(), "revision_conflict");
        assert_eq!(
            store.timetable(&TimetableFilter::class("C1")).expect("read").len(),
            1
        );
    }
}
