use rusqlite::{Connection, OptionalExtension};
use std::path::Path;

pub const DB_FILE_NAME: &str = "timetable.sqlite3";

pub fn open_db(workspace: &Path) -> anyhow::Result<Connection> {
    std::fs::create_dir_all(workspace)?;
    let db_path = workspace.join(DB_FILE_NAME);
    let conn = Connection::open(db_path)?;
    init_schema(&conn)?;
    Ok(conn)
}

pub fn init_schema(conn: &Connection) -> anyhow::Result<()> {
    conn.execute("PRAGMA foreign_keys = ON", [])?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS classes(
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            section TEXT
        )",
        [],
    )?;
    // Workspaces created before sections existed.
    ensure_classes_section(conn)?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS teachers(
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            email TEXT
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS subjects(
            id TEXT PRIMARY KEY,
            class_id TEXT NOT NULL,
            name TEXT NOT NULL,
            code TEXT,
            FOREIGN KEY(class_id) REFERENCES classes(id)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_subjects_class ON subjects(class_id)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS timetable_entries(
            id TEXT PRIMARY KEY,
            class_id TEXT NOT NULL,
            day_of_week INTEGER NOT NULL CHECK(day_of_week BETWEEN 0 AND 5),
            period_number INTEGER NOT NULL CHECK(period_number >= 1),
            subject_id TEXT NOT NULL,
            teacher_id TEXT,
            start_time TEXT,
            end_time TEXT,
            room TEXT,
            updated_at TEXT,
            FOREIGN KEY(class_id) REFERENCES classes(id),
            FOREIGN KEY(subject_id) REFERENCES subjects(id),
            FOREIGN KEY(teacher_id) REFERENCES teachers(id),
            UNIQUE(class_id, day_of_week, period_number)
        )",
        [],
    )?;
    ensure_timetable_updated_at(conn)?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_timetable_class ON timetable_entries(class_id)",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_timetable_teacher ON timetable_entries(teacher_id)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS settings(
            key TEXT PRIMARY KEY,
            value_json TEXT NOT NULL
        )",
        [],
    )?;

    Ok(())
}

pub fn settings_get_json(conn: &Connection, key: &str) -> anyhow::Result<Option<serde_json::Value>> {
    let raw: Option<String> = conn
        .query_row(
            "SELECT value_json FROM settings WHERE key = ?",
            [key],
            |r| r.get(0),
        )
        .optional()?;
    match raw {
        Some(s) => Ok(Some(serde_json::from_str(&s)?)),
        None => Ok(None),
    }
}

pub fn settings_set_json(conn: &Connection, key: &str, value: &serde_json::Value) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO settings(key, value_json) VALUES(?, ?)
         ON CONFLICT(key) DO UPDATE SET value_json = excluded.value_json",
        (key, serde_json::to_string(value)?),
    )?;
    Ok(())
}

fn ensure_classes_section(conn: &Connection) -> anyhow::Result<()> {
    if table_has_column(conn, "classes", "section")? {
        return Ok(());
    }
    conn.execute("ALTER TABLE classes ADD COLUMN section TEXT", [])?;
    Ok(())
}

fn ensure_timetable_updated_at(conn: &Connection) -> anyhow::Result<()> {
    if table_has_column(conn, "timetable_entries", "updated_at")? {
        return Ok(());
    }
    conn.execute("ALTER TABLE timetable_entries ADD COLUMN updated_at TEXT", [])?;
    Ok(())
}

fn table_has_column(conn: &Connection, table: &str, column: &str) -> anyhow::Result<bool> {
    let sql = format!("PRAGMA table_info({})", table);
    let mut stmt = conn.prepare(&sql)?;
    let mut rows = stmt.query([])?;
    while let Some(row) = rows.next()? {
        let name: String = row.get(1)?;
        if name == column {
            return Ok(true);
        }
    }
    Ok(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schema_is_idempotent_and_migrates_old_classes() {
        let conn = Connection::open_in_memory().expect("open");
        conn.execute("CREATE TABLE classes(id TEXT PRIMARY KEY, name TEXT NOT NULL)", [])
            .expect("legacy classes table");
        conn.execute("INSERT INTO classes(id, name) VALUES('c1', 'Grade 7')", [])
            .expect("legacy row");

        init_schema(&conn).expect("first init");
        init_schema(&conn).expect("second init");

        assert!(table_has_column(&conn, "classes", "section").expect("pragma"));
        let section: Option<String> = conn
            .query_row("SELECT section FROM classes WHERE id = 'c1'", [], |r| r.get(0))
            .expect("row");
        assert_eq!(section, None);
    }

    #[test]
    fn settings_round_trip_json() {
        let conn = Connection::open_in_memory().expect("open");
        init_schema(&conn).expect("init");

        assert!(settings_get_json(&conn, "setup.timetable").expect("get").is_none());
        settings_set_json(&conn, "setup.timetable", &serde_json::json!({ "defaultPeriodCount": 6 }))
            .expect("set");
        settings_set_json(&conn, "setup.timetable", &serde_json::json!({ "defaultPeriodCount": 7 }))
            .expect("overwrite");
        let v = settings_get_json(&conn, "setup.timetable")
            .expect("get")
            .expect("present");
        assert_eq!(v["defaultPeriodCount"], 7);
    }
}
