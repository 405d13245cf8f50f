//! # Schema Store
//!
//! Table definitions for the seven Community Connect tables and the routines
//! that (re)build them.
//!
//! ## Drop / Create Order
//! Tables are dropped child-first (associations, then `event`, then `skill`,
//! `volunteer` and `organisation`) and created parent-first, so foreign keys
//! never point at a missing table.
//!
//! Named CHECK constraints let a failure be traced back to its rule (see
//! [`crate::error::Rule::from_sqlite_message`]).

use crate::error::ConnectResult;
use rusqlite::Connection;
use tracing::{debug, info};

/// Table names in creation (parent-first) order
pub const TABLES: [&str; 7] = [
    "organisation",
    "volunteer",
    "skill",
    "event",
    "volunteer_event",
    "volunteer_skill",
    "event_skill",
];

/// Table names in drop (child-first) order
pub const DROP_ORDER: [&str; 7] = [
    "event_skill",
    "volunteer_skill",
    "volunteer_event",
    "event",
    "skill",
    "volunteer",
    "organisation",
];

const CREATE_ORGANISATION: &str = r#"
CREATE TABLE organisation (
    org_id INTEGER PRIMARY KEY AUTOINCREMENT,
    org_name TEXT NOT NULL UNIQUE,
    contact_email TEXT NOT NULL
        CONSTRAINT ck_organisation_email
        CHECK (instr(contact_email, '@') > 1
               AND instr(substr(contact_email, instr(contact_email, '@')), '.') > 0),
    phone TEXT NOT NULL
        CONSTRAINT ck_organisation_phone CHECK (length(phone) >= 10),
    address TEXT NOT NULL,
    org_type TEXT NOT NULL
        CONSTRAINT ck_organisation_type_enum
        CHECK (org_type IN ('Charity', 'Community Group', 'Non-Profit', 'Government', 'Educational')),
    description TEXT
)"#;

const CREATE_VOLUNTEER: &str = r#"
CREATE TABLE volunteer (
    volunteer_id INTEGER PRIMARY KEY AUTOINCREMENT,
    first_name TEXT NOT NULL,
    last_name TEXT NOT NULL,
    date_of_birth DATE NOT NULL,
    email TEXT NOT NULL UNIQUE
        CONSTRAINT ck_volunteer_email
        CHECK (instr(email, '@') > 1
               AND instr(substr(email, instr(email, '@')), '.') > 0),
    phone TEXT NOT NULL
        CONSTRAINT ck_volunteer_phone CHECK (length(phone) >= 10),
    address TEXT NOT NULL,
    registration_date DATE NOT NULL DEFAULT (date('now'))
)"#;

const CREATE_SKILL: &str = r#"
CREATE TABLE skill (
    skill_id INTEGER PRIMARY KEY AUTOINCREMENT,
    skill_name TEXT NOT NULL UNIQUE,
    skill_description TEXT,
    skill_category TEXT NOT NULL
        CONSTRAINT ck_skill_category_enum
        CHECK (skill_category IN ('Medical', 'Administrative', 'Physical', 'Technical',
                                  'Communication', 'Educational', 'Creative'))
)"#;

const CREATE_EVENT: &str = r#"
CREATE TABLE event (
    event_id INTEGER PRIMARY KEY AUTOINCREMENT,
    org_id INTEGER NOT NULL REFERENCES organisation(org_id) ON DELETE CASCADE,
    event_name TEXT NOT NULL,
    description TEXT,
    start_date DATE NOT NULL,
    end_date DATE NOT NULL,
    location TEXT NOT NULL,
    max_volunteers INTEGER NOT NULL
        CONSTRAINT ck_event_capacity CHECK (max_volunteers > 0),
    CONSTRAINT ck_event_dates CHECK (end_date >= start_date)
)"#;

const CREATE_VOLUNTEER_EVENT: &str = r#"
CREATE TABLE volunteer_event (
    volunteer_id INTEGER NOT NULL REFERENCES volunteer(volunteer_id) ON DELETE CASCADE,
    event_id INTEGER NOT NULL REFERENCES event(event_id) ON DELETE CASCADE,
    registration_date DATE NOT NULL DEFAULT (date('now')),
    attendance_status TEXT NOT NULL DEFAULT 'Registered'
        CONSTRAINT ck_volunteer_event_status_enum
        CHECK (attendance_status IN ('Registered', 'Attended', 'No-Show', 'Cancelled')),
    PRIMARY KEY (volunteer_id, event_id)
)"#;

const CREATE_VOLUNTEER_SKILL: &str = r#"
CREATE TABLE volunteer_skill (
    volunteer_id INTEGER NOT NULL REFERENCES volunteer(volunteer_id) ON DELETE CASCADE,
    skill_id INTEGER NOT NULL REFERENCES skill(skill_id) ON DELETE CASCADE,
    proficiency_level TEXT NOT NULL
        CONSTRAINT ck_volunteer_skill_proficiency_enum
        CHECK (proficiency_level IN ('Beginner', 'Intermediate', 'Advanced', 'Expert')),
    years_experience INTEGER NOT NULL DEFAULT 0
        CONSTRAINT ck_volunteer_skill_years CHECK (years_experience >= 0),
    PRIMARY KEY (volunteer_id, skill_id)
)"#;

const CREATE_EVENT_SKILL: &str = r#"
CREATE TABLE event_skill (
    event_id INTEGER NOT NULL REFERENCES event(event_id) ON DELETE CASCADE,
    skill_id INTEGER NOT NULL REFERENCES skill(skill_id) ON DELETE CASCADE,
    priority TEXT NOT NULL
        CONSTRAINT ck_event_skill_priority_enum
        CHECK (priority IN ('Essential', 'Preferred', 'Bonus')),
    min_proficiency TEXT NOT NULL
        CONSTRAINT ck_event_skill_proficiency_enum
        CHECK (min_proficiency IN ('Beginner', 'Intermediate', 'Advanced', 'Expert')),
    PRIMARY KEY (event_id, skill_id)
)"#;

const CREATE_INDEXES: &str = r#"
CREATE INDEX idx_event_org ON event(org_id);
CREATE INDEX idx_volunteer_event_event ON volunteer_event(event_id);
CREATE INDEX idx_volunteer_skill_skill ON volunteer_skill(skill_id);
CREATE INDEX idx_event_skill_skill ON event_skill(skill_id);
"#;

/// Create statements in the same order as [`TABLES`]
const CREATE_STATEMENTS: [&str; 7] = [
    CREATE_ORGANISATION,
    CREATE_VOLUNTEER,
    CREATE_SKILL,
    CREATE_EVENT,
    CREATE_VOLUNTEER_EVENT,
    CREATE_VOLUNTEER_SKILL,
    CREATE_EVENT_SKILL,
];

/// Drops every table child-first, then recreates them with their constraints
pub fn create_schema(conn: &Connection) -> ConnectResult<()> {
    for table in DROP_ORDER {
        debug!("Dropping table: {}", table);
        conn.execute_batch(&format!("DROP TABLE IF EXISTS {}", table))?;
    }

    for (table, ddl) in TABLES.iter().zip(CREATE_STATEMENTS) {
        conn.execute_batch(ddl)?;
        debug!("Created table: {}", table);
    }
    conn.execute_batch(CREATE_INDEXES)?;

    info!("Schema created ({} tables)", TABLES.len());
    Ok(())
}

/// Names of the Community Connect tables that currently exist, sorted
pub fn table_names(conn: &Connection) -> ConnectResult<Vec<String>> {
    let mut stmt = conn.prepare(
        "SELECT name FROM sqlite_master
         WHERE type = 'table' AND name NOT LIKE 'sqlite_%'
         ORDER BY name",
    )?;
    let names = stmt
        .query_map([], |row| row.get::<_, String>(0))?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(names
        .into_iter()
        .filter(|name| TABLES.contains(&name.as_str()))
        .collect())
}

/// True when all seven tables are present
pub fn schema_exists(conn: &Connection) -> ConnectResult<bool> {
    Ok(table_names(conn)?.len() == TABLES.len())
}

/// Row count per table, in [`TABLES`] order
pub fn row_counts(conn: &Connection) -> ConnectResult<Vec<(String, i64)>> {
    let mut counts = Vec::with_capacity(TABLES.len());
    for table in TABLES {
        let sql = format!("SELECT COUNT(*) FROM {}", table);
        let count: i64 = conn.query_row(&sql, [], |row| row.get(0))?;
        counts.push((table.to_string(), count));
    }
    Ok(counts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ConnectError, Rule};

    fn open() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch("PRAGMA foreign_keys=ON;").unwrap();
        create_schema(&conn).unwrap();
        conn
    }

    fn violation(err: rusqlite::Error) -> Rule {
        match ConnectError::from(err) {
            ConnectError::ConstraintViolation { rule } => rule,
            other => panic!("expected constraint violation, got {:?}", other),
        }
    }

    #[test]
    fn test_create_schema_builds_all_tables() {
        let conn = open();
        let mut expected: Vec<String> = TABLES.iter().map(|t| t.to_string()).collect();
        expected.sort();
        assert_eq!(table_names(&conn).unwrap(), expected);
        assert!(schema_exists(&conn).unwrap());
    }

    #[test]
    fn test_create_schema_is_repeatable() {
        let conn = open();
        conn.execute(
            "INSERT INTO skill (skill_name, skill_category) VALUES ('First Aid', 'Medical')",
            [],
        )
        .unwrap();
        create_schema(&conn).unwrap();
        assert!(row_counts(&conn).unwrap().iter().all(|(_, n)| *n == 0));
    }

    #[test]
    fn test_event_check_constraints_are_named() {
        let conn = open();
        conn.execute(
            "INSERT INTO organisation (org_name, contact_email, phone, address, org_type)
             VALUES ('Org', 'org@example.org', '0298765432', 'Sydney', 'Charity')",
            [],
        )
        .unwrap();

        let err = conn
            .execute(
                "INSERT INTO event (org_id, event_name, start_date, end_date, location, max_volunteers)
                 VALUES (1, 'Backwards', '2025-05-02', '2025-05-01', 'Park', 5)",
                [],
            )
            .unwrap_err();
        assert_eq!(violation(err), Rule::InvalidDateRange);

        let err = conn
            .execute(
                "INSERT INTO event (org_id, event_name, start_date, end_date, location, max_volunteers)
                 VALUES (1, 'Empty', '2025-05-01', '2025-05-01', 'Park', 0)",
                [],
            )
            .unwrap_err();
        assert_eq!(violation(err), Rule::InvalidCapacity);
    }

    #[test]
    fn test_unknown_enumeration_text_is_rejected() {
        let conn = open();
        let err = conn
            .execute(
                "INSERT INTO skill (skill_name, skill_category) VALUES ('Juggling', 'Circus')",
                [],
            )
            .unwrap_err();
        assert_eq!(violation(err), Rule::InvalidEnumeration);
    }
}
