//! # Query Layer
//!
//! Side-effect-free reads: skill search, the organisation roster join, event
//! statistics, the volunteer directory with calculated fields, and the
//! reporting aggregates. Each query runs inside one read transaction, so it
//! never sees half of a multi-row write.
//!
//! Queries that match nothing return an empty `Vec`. The only failures are
//! malformed parameters (`InvalidArgument`) and store errors.

use crate::crud;
use crate::db::{CapacityPolicy, ConnectStore};
use crate::error::{ConnectError, ConnectResult, Entity};
use crate::model::{
    today, AttendanceStatus, Event, OrgType, Organisation, Proficiency, Skill, SkillCategory,
    Volunteer,
};
use crate::validate::{escape_like, validate_id, validate_pattern};
use chrono::NaiveDate;
use rusqlite::Connection;
use serde::Serialize;
use std::sync::Arc;
use tracing::debug;

// ============================================================================
// Result rows
// ============================================================================

/// One volunteer/skill pair matched by a skill search
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkillMatch {
    pub volunteer_id: i64,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: String,
    pub skill_name: String,
    pub proficiency_level: Proficiency,
    pub years_experience: i64,
}

/// A volunteer's registration for one of an organisation's events
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OrganisationVolunteer {
    pub volunteer_id: i64,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: String,
    pub event_id: i64,
    pub event_name: String,
    pub start_date: NaiveDate,
    pub location: String,
    pub registration_date: NaiveDate,
    pub attendance_status: AttendanceStatus,
    pub org_name: String,
}

/// How full an event is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Occupancy {
    Full,
    Partial,
    Empty,
}

impl Occupancy {
    pub fn of(count: i64, capacity: i64) -> Self {
        if count >= capacity {
            Occupancy::Full
        } else if count > 0 {
            Occupancy::Partial
        } else {
            Occupancy::Empty
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EventStatistics {
    pub event_id: i64,
    pub event_name: String,
    pub org_name: String,
    pub volunteer_count: i64,
    pub max_volunteers: i64,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub duration_days: i64,
    pub occupancy: Occupancy,
}

/// A volunteer with calculated full name and age
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DirectoryEntry {
    pub volunteer_id: i64,
    pub full_name: String,
    pub email: String,
    pub phone: String,
    pub address: String,
    pub date_of_birth: NaiveDate,
    pub age: u32,
    pub registration_date: NaiveDate,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SkillDistribution {
    pub skill_name: String,
    pub skill_category: SkillCategory,
    pub volunteer_count: i64,
    pub avg_experience: f64,
    pub max_experience: i64,
    pub min_experience: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OrganisationSummary {
    pub org_name: String,
    pub org_type: OrgType,
    pub total_events: i64,
    pub unique_volunteers: i64,
    pub total_registrations: i64,
    /// `None` for an organisation without events
    pub avg_event_capacity: Option<f64>,
}

/// An event with the name of the organisation running it
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EventListing {
    #[serde(flatten)]
    pub event: Event,
    pub org_name: String,
}

// ============================================================================
// SQL helpers
// ============================================================================

/// `CASE` expression turning a proficiency column into its sort rank
fn proficiency_rank_sql(column: &str) -> String {
    let arms: String = Proficiency::ALL
        .iter()
        .map(|p| format!(" WHEN '{}' THEN {}", p.as_str(), p.rank()))
        .collect();
    format!("CASE {}{} ELSE 0 END", column, arms)
}

/// Extra join condition for registrations that count as registrants
fn registrant_filter(policy: CapacityPolicy, alias: &str) -> String {
    match policy {
        CapacityPolicy::CountAll => String::new(),
        CapacityPolicy::ExcludeCancelled => {
            format!(" AND {}.attendance_status <> 'Cancelled'", alias)
        }
    }
}

/// Whole calendar years between `date_of_birth` and `on`
pub fn age_on(date_of_birth: NaiveDate, on: NaiveDate) -> u32 {
    on.years_since(date_of_birth).unwrap_or(0)
}

// ============================================================================
// Queries
// ============================================================================

/// Volunteers holding a skill whose name contains `pattern`.
///
/// Ordered Expert to Beginner, then by years of experience descending.
pub fn search_volunteers_by_skill(conn: &Connection, pattern: &str) -> ConnectResult<Vec<SkillMatch>> {
    let pattern = validate_pattern(pattern)?;
    let sql = format!(
        "SELECT v.volunteer_id, v.first_name, v.last_name, v.email, v.phone,
                s.skill_name, vs.proficiency_level, vs.years_experience
         FROM volunteer v
         JOIN volunteer_skill vs ON v.volunteer_id = vs.volunteer_id
         JOIN skill s ON vs.skill_id = s.skill_id
         WHERE s.skill_name LIKE ?1 ESCAPE '\\'
         ORDER BY {} DESC, vs.years_experience DESC, v.last_name, v.first_name, s.skill_name",
        proficiency_rank_sql("vs.proficiency_level")
    );
    let like = format!("%{}%", escape_like(pattern));
    debug!("Skill search for {:?}", like);

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map([like], |row| {
        Ok(SkillMatch {
            volunteer_id: row.get(0)?,
            first_name: row.get(1)?,
            last_name: row.get(2)?,
            email: row.get(3)?,
            phone: row.get(4)?,
            skill_name: row.get(5)?,
            proficiency_level: row.get(6)?,
            years_experience: row.get(7)?,
        })
    })?;
    Ok(rows.collect::<Result<Vec<_>, _>>()?)
}

/// Registrations for every event of one organisation
pub fn organisation_volunteers(conn: &Connection, org_id: i64) -> ConnectResult<Vec<OrganisationVolunteer>> {
    validate_id("org_id", org_id)?;
    let mut stmt = conn.prepare(
        "SELECT v.volunteer_id, v.first_name, v.last_name, v.email, v.phone,
                e.event_id, e.event_name, e.start_date, e.location,
                ve.registration_date, ve.attendance_status,
                o.org_name
         FROM volunteer v
         INNER JOIN volunteer_event ve ON v.volunteer_id = ve.volunteer_id
         INNER JOIN event e ON ve.event_id = e.event_id
         INNER JOIN organisation o ON e.org_id = o.org_id
         WHERE o.org_id = ?1
         ORDER BY e.start_date, v.last_name, v.first_name",
    )?;
    let rows = stmt.query_map([org_id], |row| {
        Ok(OrganisationVolunteer {
            volunteer_id: row.get(0)?,
            first_name: row.get(1)?,
            last_name: row.get(2)?,
            email: row.get(3)?,
            phone: row.get(4)?,
            event_id: row.get(5)?,
            event_name: row.get(6)?,
            start_date: row.get(7)?,
            location: row.get(8)?,
            registration_date: row.get(9)?,
            attendance_status: row.get(10)?,
            org_name: row.get(11)?,
        })
    })?;
    Ok(rows.collect::<Result<Vec<_>, _>>()?)
}

/// Registrant count, capacity and duration for every event, fullest first
pub fn event_statistics(conn: &Connection, policy: CapacityPolicy) -> ConnectResult<Vec<EventStatistics>> {
    let sql = format!(
        "SELECT e.event_id, e.event_name, o.org_name,
                COUNT(ve.volunteer_id) AS volunteer_count,
                e.max_volunteers, e.start_date, e.end_date,
                CAST(julianday(e.end_date) - julianday(e.start_date) AS INTEGER) AS duration_days
         FROM event e
         JOIN organisation o ON e.org_id = o.org_id
         LEFT JOIN volunteer_event ve ON e.event_id = ve.event_id{}
         GROUP BY e.event_id, e.event_name, o.org_name, e.max_volunteers, e.start_date, e.end_date
         ORDER BY volunteer_count DESC, e.event_name",
        registrant_filter(policy, "ve")
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map([], |row| {
        let volunteer_count: i64 = row.get(3)?;
        let max_volunteers: i64 = row.get(4)?;
        Ok(EventStatistics {
            event_id: row.get(0)?,
            event_name: row.get(1)?,
            org_name: row.get(2)?,
            volunteer_count,
            max_volunteers,
            start_date: row.get(5)?,
            end_date: row.get(6)?,
            duration_days: row.get(7)?,
            occupancy: Occupancy::of(volunteer_count, max_volunteers),
        })
    })?;
    Ok(rows.collect::<Result<Vec<_>, _>>()?)
}

/// Every volunteer with full name and age as of `on`, ordered by full name
pub fn volunteer_directory(conn: &Connection, on: NaiveDate) -> ConnectResult<Vec<DirectoryEntry>> {
    let mut stmt = conn.prepare(
        "SELECT volunteer_id,
                (first_name || ' ' || last_name) AS full_name,
                email, phone, address, date_of_birth, registration_date
         FROM volunteer
         ORDER BY full_name",
    )?;
    let rows = stmt.query_map([], |row| {
        let date_of_birth: NaiveDate = row.get(5)?;
        Ok(DirectoryEntry {
            volunteer_id: row.get(0)?,
            full_name: row.get(1)?,
            email: row.get(2)?,
            phone: row.get(3)?,
            address: row.get(4)?,
            date_of_birth,
            age: age_on(date_of_birth, on),
            registration_date: row.get(6)?,
        })
    })?;
    Ok(rows.collect::<Result<Vec<_>, _>>()?)
}

/// Experience spread for each skill at least one volunteer holds
pub fn skill_distribution(conn: &Connection) -> ConnectResult<Vec<SkillDistribution>> {
    let mut stmt = conn.prepare(
        "SELECT s.skill_name, s.skill_category,
                COUNT(vs.volunteer_id) AS volunteer_count,
                AVG(vs.years_experience), MAX(vs.years_experience), MIN(vs.years_experience)
         FROM skill s
         LEFT JOIN volunteer_skill vs ON s.skill_id = vs.skill_id
         GROUP BY s.skill_id, s.skill_name, s.skill_category
         HAVING COUNT(vs.volunteer_id) > 0
         ORDER BY volunteer_count DESC, s.skill_category, s.skill_name",
    )?;
    let rows = stmt.query_map([], |row| {
        Ok(SkillDistribution {
            skill_name: row.get(0)?,
            skill_category: row.get(1)?,
            volunteer_count: row.get(2)?,
            avg_experience: row.get(3)?,
            max_experience: row.get(4)?,
            min_experience: row.get(5)?,
        })
    })?;
    Ok(rows.collect::<Result<Vec<_>, _>>()?)
}

/// Events and engagement per organisation
pub fn organisation_summary(conn: &Connection) -> ConnectResult<Vec<OrganisationSummary>> {
    let mut stmt = conn.prepare(
        "SELECT o.org_name, o.org_type,
                COUNT(DISTINCT e.event_id) AS total_events,
                COUNT(DISTINCT ve.volunteer_id) AS unique_volunteers,
                COUNT(ve.volunteer_id) AS total_registrations,
                (SELECT AVG(e2.max_volunteers) FROM event e2 WHERE e2.org_id = o.org_id)
         FROM organisation o
         LEFT JOIN event e ON o.org_id = e.org_id
         LEFT JOIN volunteer_event ve ON e.event_id = ve.event_id
         GROUP BY o.org_id, o.org_name, o.org_type
         ORDER BY total_events DESC, unique_volunteers DESC, o.org_name",
    )?;
    let rows = stmt.query_map([], |row| {
        Ok(OrganisationSummary {
            org_name: row.get(0)?,
            org_type: row.get(1)?,
            total_events: row.get(2)?,
            unique_volunteers: row.get(3)?,
            total_registrations: row.get(4)?,
            avg_event_capacity: row.get(5)?,
        })
    })?;
    Ok(rows.collect::<Result<Vec<_>, _>>()?)
}

/// All events with their organisation's name, soonest first
pub fn list_events(conn: &Connection) -> ConnectResult<Vec<EventListing>> {
    let mut stmt = conn.prepare(
        "SELECT e.event_id, e.org_id, e.event_name, e.description, e.start_date, e.end_date,
                e.location, e.max_volunteers, o.org_name
         FROM event e
         JOIN organisation o ON e.org_id = o.org_id
         ORDER BY e.start_date, e.event_name",
    )?;
    let rows = stmt.query_map([], |row| {
        Ok(EventListing {
            event: crud::event_from_row(row)?,
            org_name: row.get(8)?,
        })
    })?;
    Ok(rows.collect::<Result<Vec<_>, _>>()?)
}

// ============================================================================
// QueryService
// ============================================================================

/// Read-side service shared by the HTTP shell
#[derive(Clone)]
pub struct QueryService {
    store: Arc<ConnectStore>,
}

impl QueryService {
    pub fn new(store: Arc<ConnectStore>) -> Self {
        Self { store }
    }

    pub async fn search_volunteers_by_skill(&self, pattern: String) -> ConnectResult<Vec<SkillMatch>> {
        self.store
            .read(move |conn| search_volunteers_by_skill(conn, &pattern))
            .await
    }

    pub async fn organisation_volunteers(&self, org_id: i64) -> ConnectResult<Vec<OrganisationVolunteer>> {
        self.store
            .read(move |conn| organisation_volunteers(conn, org_id))
            .await
    }

    pub async fn event_statistics(&self) -> ConnectResult<Vec<EventStatistics>> {
        let policy = self.store.capacity_policy();
        self.store.read(move |conn| event_statistics(conn, policy)).await
    }

    pub async fn volunteer_directory(&self) -> ConnectResult<Vec<DirectoryEntry>> {
        let on = today();
        self.store.read(move |conn| volunteer_directory(conn, on)).await
    }

    pub async fn skill_distribution(&self) -> ConnectResult<Vec<SkillDistribution>> {
        self.store.read(skill_distribution).await
    }

    pub async fn organisation_summary(&self) -> ConnectResult<Vec<OrganisationSummary>> {
        self.store.read(organisation_summary).await
    }

    pub async fn list_volunteers(&self) -> ConnectResult<Vec<Volunteer>> {
        self.store.read(crud::list_volunteers).await
    }

    pub async fn list_organisations(&self) -> ConnectResult<Vec<Organisation>> {
        self.store.read(crud::list_organisations).await
    }

    pub async fn list_skills(&self) -> ConnectResult<Vec<Skill>> {
        self.store.read(crud::list_skills).await
    }

    pub async fn list_events(&self) -> ConnectResult<Vec<EventListing>> {
        self.store.read(list_events).await
    }

    pub async fn get_volunteer(&self, volunteer_id: i64) -> ConnectResult<Volunteer> {
        self.store
            .read(move |conn| crud::fetch_volunteer(conn, volunteer_id))
            .await?
            .ok_or_else(|| ConnectError::not_found(Entity::Volunteer, volunteer_id))
    }

    pub async fn get_organisation(&self, org_id: i64) -> ConnectResult<Organisation> {
        self.store
            .read(move |conn| crud::fetch_organisation(conn, org_id))
            .await?
            .ok_or_else(|| ConnectError::not_found(Entity::Organisation, org_id))
    }

    pub async fn get_event(&self, event_id: i64) -> ConnectResult<Event> {
        self.store
            .read(move |conn| crud::fetch_event(conn, event_id))
            .await?
            .ok_or_else(|| ConnectError::not_found(Entity::Event, event_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::seed;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn seeded() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch("PRAGMA foreign_keys=ON;").unwrap();
        crate::schema::create_schema(&conn).unwrap();
        seed::seed_sample_data(&conn).unwrap();
        conn
    }

    #[test]
    fn test_first_aid_search_orders_by_rank_then_years() {
        let conn = seeded();
        let matches = search_volunteers_by_skill(&conn, "First Aid").unwrap();

        // every holder of "First Aid" (skill 1) and "Advanced First Aid" (skill 2)
        let mut found: Vec<(i64, &str)> = matches
            .iter()
            .map(|m| (m.volunteer_id, m.skill_name.as_str()))
            .collect();
        found.sort();
        assert_eq!(
            found,
            vec![
                (1, "First Aid"),
                (2, "First Aid"),
                (3, "First Aid"),
                (4, "First Aid"),
                (5, "Advanced First Aid"),
                (8, "Advanced First Aid"),
            ]
        );
        for pair in matches.windows(2) {
            let (a, b) = (&pair[0], &pair[1]);
            assert!(
                a.proficiency_level > b.proficiency_level
                    || (a.proficiency_level == b.proficiency_level
                        && a.years_experience >= b.years_experience),
                "{:?} should not precede {:?}",
                a,
                b
            );
        }

        // an Expert with 8 years outranks an Advanced with 10
        let expert = matches
            .iter()
            .position(|m| m.proficiency_level == Proficiency::Expert && m.years_experience == 8)
            .unwrap();
        let advanced = matches
            .iter()
            .position(|m| m.proficiency_level == Proficiency::Advanced && m.years_experience == 10)
            .unwrap();
        assert!(expert < advanced);
    }

    #[test]
    fn test_search_is_case_insensitive_and_literal() {
        let conn = seeded();
        assert_eq!(
            search_volunteers_by_skill(&conn, "first aid").unwrap().len(),
            search_volunteers_by_skill(&conn, "First Aid").unwrap().len()
        );
        assert!(search_volunteers_by_skill(&conn, "%").unwrap().is_empty());
        assert!(search_volunteers_by_skill(&conn, "Underwater Welding").unwrap().is_empty());
        assert!(matches!(
            search_volunteers_by_skill(&conn, "  "),
            Err(ConnectError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_organisation_volunteers_ordering() {
        let conn = seeded();
        let rows = organisation_volunteers(&conn, 1).unwrap();
        assert!(!rows.is_empty());
        for pair in rows.windows(2) {
            let a = (&pair[0].start_date, &pair[0].last_name, &pair[0].first_name);
            let b = (&pair[1].start_date, &pair[1].last_name, &pair[1].first_name);
            assert!(a <= b);
        }
        assert!(organisation_volunteers(&conn, 9999).unwrap().is_empty());
        assert!(matches!(
            organisation_volunteers(&conn, 0),
            Err(ConnectError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_event_statistics_includes_empty_events() {
        let conn = seeded();
        conn.execute(
            "INSERT INTO event (org_id, event_name, start_date, end_date, location, max_volunteers)
             VALUES (1, 'Quiet Meeting', '2025-12-01', '2025-12-03', 'Office', 4)",
            [],
        )
        .unwrap();

        let stats = event_statistics(&conn, CapacityPolicy::CountAll).unwrap();
        let total_events: i64 = conn
            .query_row("SELECT COUNT(*) FROM event", [], |r| r.get(0))
            .unwrap();
        assert_eq!(stats.len() as i64, total_events);

        let quiet = stats.iter().find(|s| s.event_name == "Quiet Meeting").unwrap();
        assert_eq!(quiet.volunteer_count, 0);
        assert_eq!(quiet.duration_days, 2);
        assert_eq!(quiet.occupancy, Occupancy::Empty);

        for pair in stats.windows(2) {
            assert!(pair[0].volunteer_count >= pair[1].volunteer_count);
        }
    }

    #[test]
    fn test_volunteer_directory_calculated_fields() {
        let conn = seeded();
        let on = date(2025, 6, 1);
        let entries = volunteer_directory(&conn, on).unwrap();
        let volunteers = crud::list_volunteers(&conn).unwrap();
        assert_eq!(entries.len(), volunteers.len());

        for pair in entries.windows(2) {
            assert!(pair[0].full_name <= pair[1].full_name);
        }
        for entry in &entries {
            let v = volunteers.iter().find(|v| v.volunteer_id == entry.volunteer_id).unwrap();
            assert_eq!(entry.full_name, v.full_name());
            assert_eq!(entry.age, age_on(v.date_of_birth, on));
        }
    }

    #[test]
    fn test_age_on_birthday_boundary() {
        let dob = date(1990, 6, 15);
        assert_eq!(age_on(dob, date(2025, 6, 14)), 34);
        assert_eq!(age_on(dob, date(2025, 6, 15)), 35);
        assert_eq!(age_on(date(2000, 2, 29), date(2025, 2, 28)), 24);
    }

    #[test]
    fn test_skill_distribution_and_summary() {
        let conn = seeded();
        let distribution = skill_distribution(&conn).unwrap();
        assert!(distribution.iter().all(|d| d.volunteer_count > 0));
        assert!(distribution
            .iter()
            .all(|d| d.min_experience as f64 <= d.avg_experience && d.avg_experience <= d.max_experience as f64));

        let summary = organisation_summary(&conn).unwrap();
        let org_count: i64 = conn
            .query_row("SELECT COUNT(*) FROM organisation", [], |r| r.get(0))
            .unwrap();
        assert_eq!(summary.len() as i64, org_count);
        assert!(summary.iter().all(|s| s.unique_volunteers <= s.total_registrations));
    }

    #[tokio::test]
    async fn test_deleted_event_leaves_organisation_roster() {
        let store = Arc::new(ConnectStore::in_memory().await.unwrap());
        seed::initialize(&store, true).await.unwrap();
        let queries = QueryService::new(Arc::clone(&store));
        let writes = crate::writes::RegistrationService::new(Arc::clone(&store));

        let before = queries.organisation_volunteers(1).await.unwrap();
        let event_id = before[0].event_id;
        let remaining = before.iter().filter(|r| r.event_id != event_id).count();

        writes.delete_event(event_id).await.unwrap();

        let after = queries.organisation_volunteers(1).await.unwrap();
        assert_eq!(after.len(), remaining);
        assert!(after.iter().all(|r| r.event_id != event_id));
        assert!(matches!(
            queries.get_event(event_id).await,
            Err(ConnectError::NotFound { entity: Entity::Event, .. })
        ));
    }

    #[tokio::test]
    async fn test_service_rejects_bad_pattern_and_id() {
        let store = Arc::new(ConnectStore::in_memory().await.unwrap());
        seed::initialize(&store, true).await.unwrap();
        let queries = QueryService::new(store);

        assert!(matches!(
            queries.search_volunteers_by_skill("   ".to_string()).await,
            Err(ConnectError::InvalidArgument(_))
        ));
        assert!(matches!(
            queries.organisation_volunteers(0).await,
            Err(ConnectError::InvalidArgument(_))
        ));
        assert_eq!(
            queries.search_volunteers_by_skill("  first aid ".to_string()).await.unwrap().len(),
            6
        );
    }

    #[test]
    fn test_occupancy_bands() {
        assert_eq!(Occupancy::of(0, 5), Occupancy::Empty);
        assert_eq!(Occupancy::of(3, 5), Occupancy::Partial);
        assert_eq!(Occupancy::of(5, 5), Occupancy::Full);
    }
}
