//! # Row Primitives
//!
//! Insert-returning-id, fetch-by-id, update and delete for each table. These
//! run on whatever connection or transaction the caller holds; they never
//! open their own, so several of them can be composed into one atomic write.
//!
//! Fetches return `Ok(None)` for a missing row; updates and deletes report
//! the number of affected rows and leave the not-found decision to callers.

use crate::error::ConnectResult;
use crate::model::{
    AttendanceStatus, Event, EventSkill, NewEvent, NewOrganisation, NewSkill, NewVolunteer,
    Organisation, Skill, Volunteer, VolunteerEvent, VolunteerSkill,
};
use chrono::NaiveDate;
use rusqlite::{params, Connection, OptionalExtension, Row};

const VOLUNTEER_COLUMNS: &str = "volunteer_id, first_name, last_name, date_of_birth, email, \
                                 phone, address, registration_date";
const ORGANISATION_COLUMNS: &str =
    "org_id, org_name, contact_email, phone, address, org_type, description";
const SKILL_COLUMNS: &str = "skill_id, skill_name, skill_description, skill_category";
const EVENT_COLUMNS: &str = "event_id, org_id, event_name, description, start_date, end_date, \
                             location, max_volunteers";

// ============================================================================
// Row mappers
// ============================================================================

pub(crate) fn volunteer_from_row(row: &Row<'_>) -> rusqlite::Result<Volunteer> {
    Ok(Volunteer {
        volunteer_id: row.get(0)?,
        first_name: row.get(1)?,
        last_name: row.get(2)?,
        date_of_birth: row.get(3)?,
        email: row.get(4)?,
        phone: row.get(5)?,
        address: row.get(6)?,
        registration_date: row.get(7)?,
    })
}

pub(crate) fn organisation_from_row(row: &Row<'_>) -> rusqlite::Result<Organisation> {
    Ok(Organisation {
        org_id: row.get(0)?,
        org_name: row.get(1)?,
        contact_email: row.get(2)?,
        phone: row.get(3)?,
        address: row.get(4)?,
        org_type: row.get(5)?,
        description: row.get(6)?,
    })
}

pub(crate) fn skill_from_row(row: &Row<'_>) -> rusqlite::Result<Skill> {
    Ok(Skill {
        skill_id: row.get(0)?,
        skill_name: row.get(1)?,
        skill_description: row.get(2)?,
        skill_category: row.get(3)?,
    })
}

pub(crate) fn event_from_row(row: &Row<'_>) -> rusqlite::Result<Event> {
    Ok(Event {
        event_id: row.get(0)?,
        org_id: row.get(1)?,
        event_name: row.get(2)?,
        description: row.get(3)?,
        start_date: row.get(4)?,
        end_date: row.get(5)?,
        location: row.get(6)?,
        max_volunteers: row.get(7)?,
    })
}

// ============================================================================
// Volunteer
// ============================================================================

pub fn insert_volunteer(
    conn: &Connection,
    v: &NewVolunteer,
    registration_date: NaiveDate,
) -> ConnectResult<i64> {
    conn.execute(
        "INSERT INTO volunteer (first_name, last_name, date_of_birth, email, phone, address, registration_date)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            v.first_name.trim(),
            v.last_name.trim(),
            v.date_of_birth,
            v.email.trim(),
            v.phone.trim(),
            v.address.trim(),
            registration_date
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn fetch_volunteer(conn: &Connection, id: i64) -> ConnectResult<Option<Volunteer>> {
    let sql = format!("SELECT {} FROM volunteer WHERE volunteer_id = ?1", VOLUNTEER_COLUMNS);
    Ok(conn.query_row(&sql, [id], volunteer_from_row).optional()?)
}

pub fn fetch_volunteer_by_email(conn: &Connection, email: &str) -> ConnectResult<Option<Volunteer>> {
    let sql = format!("SELECT {} FROM volunteer WHERE email = ?1", VOLUNTEER_COLUMNS);
    Ok(conn.query_row(&sql, [email.trim()], volunteer_from_row).optional()?)
}

pub fn list_volunteers(conn: &Connection) -> ConnectResult<Vec<Volunteer>> {
    let sql = format!(
        "SELECT {} FROM volunteer ORDER BY last_name, first_name",
        VOLUNTEER_COLUMNS
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map([], volunteer_from_row)?;
    Ok(rows.collect::<Result<Vec<_>, _>>()?)
}

/// Updates phone and address; returns affected rows
pub fn update_volunteer_contact(
    conn: &Connection,
    id: i64,
    phone: &str,
    address: Option<&str>,
) -> ConnectResult<usize> {
    let affected = match address {
        Some(address) => conn.execute(
            "UPDATE volunteer SET phone = ?1, address = ?2 WHERE volunteer_id = ?3",
            params![phone.trim(), address.trim(), id],
        )?,
        None => conn.execute(
            "UPDATE volunteer SET phone = ?1 WHERE volunteer_id = ?2",
            params![phone.trim(), id],
        )?,
    };
    Ok(affected)
}

pub fn delete_volunteer(conn: &Connection, id: i64) -> ConnectResult<usize> {
    Ok(conn.execute("DELETE FROM volunteer WHERE volunteer_id = ?1", [id])?)
}

// ============================================================================
// Organisation
// ============================================================================

pub fn insert_organisation(conn: &Connection, o: &NewOrganisation) -> ConnectResult<i64> {
    conn.execute(
        "INSERT INTO organisation (org_name, contact_email, phone, address, org_type, description)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            o.org_name.trim(),
            o.contact_email.trim(),
            o.phone.trim(),
            o.address.trim(),
            o.org_type,
            o.description
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn fetch_organisation(conn: &Connection, id: i64) -> ConnectResult<Option<Organisation>> {
    let sql = format!("SELECT {} FROM organisation WHERE org_id = ?1", ORGANISATION_COLUMNS);
    Ok(conn.query_row(&sql, [id], organisation_from_row).optional()?)
}

pub fn list_organisations(conn: &Connection) -> ConnectResult<Vec<Organisation>> {
    let sql = format!("SELECT {} FROM organisation ORDER BY org_name", ORGANISATION_COLUMNS);
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map([], organisation_from_row)?;
    Ok(rows.collect::<Result<Vec<_>, _>>()?)
}

pub fn delete_organisation(conn: &Connection, id: i64) -> ConnectResult<usize> {
    Ok(conn.execute("DELETE FROM organisation WHERE org_id = ?1", [id])?)
}

// ============================================================================
// Skill
// ============================================================================

pub fn insert_skill(conn: &Connection, s: &NewSkill) -> ConnectResult<i64> {
    conn.execute(
        "INSERT INTO skill (skill_name, skill_description, skill_category) VALUES (?1, ?2, ?3)",
        params![s.skill_name.trim(), s.skill_description, s.skill_category],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn fetch_skill(conn: &Connection, id: i64) -> ConnectResult<Option<Skill>> {
    let sql = format!("SELECT {} FROM skill WHERE skill_id = ?1", SKILL_COLUMNS);
    Ok(conn.query_row(&sql, [id], skill_from_row).optional()?)
}

pub fn list_skills(conn: &Connection) -> ConnectResult<Vec<Skill>> {
    let sql = format!(
        "SELECT {} FROM skill ORDER BY skill_category, skill_name",
        SKILL_COLUMNS
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map([], skill_from_row)?;
    Ok(rows.collect::<Result<Vec<_>, _>>()?)
}

// ============================================================================
// Event
// ============================================================================

pub fn insert_event(conn: &Connection, e: &NewEvent) -> ConnectResult<i64> {
    conn.execute(
        "INSERT INTO event (org_id, event_name, description, start_date, end_date, location, max_volunteers)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            e.org_id,
            e.event_name.trim(),
            e.description,
            e.start_date,
            e.end_date,
            e.location.trim(),
            e.max_volunteers
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn fetch_event(conn: &Connection, id: i64) -> ConnectResult<Option<Event>> {
    let sql = format!("SELECT {} FROM event WHERE event_id = ?1", EVENT_COLUMNS);
    Ok(conn.query_row(&sql, [id], event_from_row).optional()?)
}

/// Deletes the event; `ON DELETE CASCADE` removes its registrations and skill needs
pub fn delete_event(conn: &Connection, id: i64) -> ConnectResult<usize> {
    Ok(conn.execute("DELETE FROM event WHERE event_id = ?1", [id])?)
}

// ============================================================================
// Associations
// ============================================================================

pub fn insert_volunteer_skill(conn: &Connection, vs: &VolunteerSkill) -> ConnectResult<()> {
    conn.execute(
        "INSERT INTO volunteer_skill (volunteer_id, skill_id, proficiency_level, years_experience)
         VALUES (?1, ?2, ?3, ?4)",
        params![vs.volunteer_id, vs.skill_id, vs.proficiency_level, vs.years_experience],
    )?;
    Ok(())
}

pub fn insert_event_skill(conn: &Connection, es: &EventSkill) -> ConnectResult<()> {
    conn.execute(
        "INSERT INTO event_skill (event_id, skill_id, priority, min_proficiency)
         VALUES (?1, ?2, ?3, ?4)",
        params![es.event_id, es.skill_id, es.priority, es.min_proficiency],
    )?;
    Ok(())
}

pub fn fetch_registration(
    conn: &Connection,
    volunteer_id: i64,
    event_id: i64,
) -> ConnectResult<Option<VolunteerEvent>> {
    Ok(conn
        .query_row(
            "SELECT volunteer_id, event_id, registration_date, attendance_status
             FROM volunteer_event WHERE volunteer_id = ?1 AND event_id = ?2",
            [volunteer_id, event_id],
            |row| {
                Ok(VolunteerEvent {
                    volunteer_id: row.get(0)?,
                    event_id: row.get(1)?,
                    registration_date: row.get(2)?,
                    attendance_status: row.get(3)?,
                })
            },
        )
        .optional()?)
}

pub fn update_attendance(
    conn: &Connection,
    volunteer_id: i64,
    event_id: i64,
    status: AttendanceStatus,
) -> ConnectResult<usize> {
    Ok(conn.execute(
        "UPDATE volunteer_event SET attendance_status = ?1 WHERE volunteer_id = ?2 AND event_id = ?3",
        params![status, volunteer_id, event_id],
    )?)
}

/// Registration rows for one event, oldest first
pub fn registrations_for_event(conn: &Connection, event_id: i64) -> ConnectResult<Vec<VolunteerEvent>> {
    let mut stmt = conn.prepare(
        "SELECT volunteer_id, event_id, registration_date, attendance_status
         FROM volunteer_event WHERE event_id = ?1
         ORDER BY registration_date, volunteer_id",
    )?;
    let rows = stmt.query_map([event_id], |row| {
        Ok(VolunteerEvent {
            volunteer_id: row.get(0)?,
            event_id: row.get(1)?,
            registration_date: row.get(2)?,
            attendance_status: row.get(3)?,
        })
    })?;
    Ok(rows.collect::<Result<Vec<_>, _>>()?)
}

pub fn skills_for_volunteer(conn: &Connection, volunteer_id: i64) -> ConnectResult<Vec<VolunteerSkill>> {
    let mut stmt = conn.prepare(
        "SELECT volunteer_id, skill_id, proficiency_level, years_experience
         FROM volunteer_skill WHERE volunteer_id = ?1 ORDER BY skill_id",
    )?;
    let rows = stmt.query_map([volunteer_id], |row| {
        Ok(VolunteerSkill {
            volunteer_id: row.get(0)?,
            skill_id: row.get(1)?,
            proficiency_level: row.get(2)?,
            years_experience: row.get(3)?,
        })
    })?;
    Ok(rows.collect::<Result<Vec<_>, _>>()?)
}

pub fn skills_for_event(conn: &Connection, event_id: i64) -> ConnectResult<Vec<EventSkill>> {
    let mut stmt = conn.prepare(
        "SELECT event_id, skill_id, priority, min_proficiency
         FROM event_skill WHERE event_id = ?1 ORDER BY skill_id",
    )?;
    let rows = stmt.query_map([event_id], |row| {
        Ok(EventSkill {
            event_id: row.get(0)?,
            skill_id: row.get(1)?,
            priority: row.get(2)?,
            min_proficiency: row.get(3)?,
        })
    })?;
    Ok(rows.collect::<Result<Vec<_>, _>>()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ConnectError, Rule};
    use crate::model::{OrgType, Priority, Proficiency, SkillCategory};
    use crate::schema::create_schema;

    fn open() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch("PRAGMA foreign_keys=ON;").unwrap();
        create_schema(&conn).unwrap();
        conn
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn volunteer(email: &str) -> NewVolunteer {
        NewVolunteer {
            first_name: "Emma".into(),
            last_name: "Thompson".into(),
            date_of_birth: date(1992, 7, 21),
            email: email.into(),
            phone: "0423456789".into(),
            address: "12 Harbour St, Sydney".into(),
        }
    }

    fn organisation() -> NewOrganisation {
        NewOrganisation {
            org_name: "Food Bank".into(),
            contact_email: "info@foodbank.org.au".into(),
            phone: "0298765432".into(),
            address: "Alexandria NSW".into(),
            org_type: OrgType::Charity,
            description: Some("Food relief".into()),
        }
    }

    #[test]
    fn test_volunteer_insert_fetch_update_delete() {
        let conn = open();
        let id = insert_volunteer(&conn, &volunteer("emma@example.com"), date(2025, 5, 1)).unwrap();

        let fetched = fetch_volunteer(&conn, id).unwrap().unwrap();
        assert_eq!(fetched.email, "emma@example.com");
        assert_eq!(fetched.registration_date, date(2025, 5, 1));
        assert_eq!(fetched.date_of_birth, date(1992, 7, 21));

        assert_eq!(update_volunteer_contact(&conn, id, "0499999999", None).unwrap(), 1);
        assert_eq!(fetch_volunteer(&conn, id).unwrap().unwrap().phone, "0499999999");

        assert_eq!(delete_volunteer(&conn, id).unwrap(), 1);
        assert!(fetch_volunteer(&conn, id).unwrap().is_none());
        assert_eq!(delete_volunteer(&conn, id).unwrap(), 0);
    }

    #[test]
    fn test_duplicate_email_is_classified() {
        let conn = open();
        insert_volunteer(&conn, &volunteer("dup@example.com"), date(2025, 5, 1)).unwrap();
        let err = insert_volunteer(&conn, &volunteer("dup@example.com"), date(2025, 5, 1)).unwrap_err();
        assert!(matches!(
            err,
            ConnectError::ConstraintViolation { rule: Rule::DuplicateEmail }
        ));
    }

    #[test]
    fn test_enums_round_trip_through_columns() {
        let conn = open();
        let org_id = insert_organisation(&conn, &organisation()).unwrap();
        let org = fetch_organisation(&conn, org_id).unwrap().unwrap();
        assert_eq!(org.org_type, OrgType::Charity);

        let skill_id = insert_skill(
            &conn,
            &NewSkill {
                skill_name: "First Aid".into(),
                skill_description: None,
                skill_category: SkillCategory::Medical,
            },
        )
        .unwrap();
        let event_id = insert_event(
            &conn,
            &NewEvent {
                org_id,
                event_name: "Food Drive".into(),
                description: None,
                start_date: date(2025, 8, 1),
                end_date: date(2025, 8, 3),
                location: "Alexandria".into(),
                max_volunteers: 10,
            },
        )
        .unwrap();
        insert_event_skill(
            &conn,
            &EventSkill {
                event_id,
                skill_id,
                priority: Priority::Essential,
                min_proficiency: Proficiency::Intermediate,
            },
        )
        .unwrap();

        let needs = skills_for_event(&conn, event_id).unwrap();
        assert_eq!(needs.len(), 1);
        assert_eq!(needs[0].priority, Priority::Essential);
        assert_eq!(needs[0].min_proficiency, Proficiency::Intermediate);
    }

    #[test]
    fn test_delete_organisation_cascades_to_events() {
        let conn = open();
        let org_id = insert_organisation(&conn, &organisation()).unwrap();
        let event_id = insert_event(
            &conn,
            &NewEvent {
                org_id,
                event_name: "Sort Day".into(),
                description: None,
                start_date: date(2025, 9, 1),
                end_date: date(2025, 9, 1),
                location: "Warehouse".into(),
                max_volunteers: 3,
            },
        )
        .unwrap();

        assert_eq!(delete_organisation(&conn, org_id).unwrap(), 1);
        assert!(fetch_event(&conn, event_id).unwrap().is_none());
    }
}
