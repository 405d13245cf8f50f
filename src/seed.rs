//! Schema initialisation and the sample data set.
//!
//! [`initialize`] drops, recreates and optionally seeds the database inside
//! one write transaction. Sample rows carry explicit ids and fixed dates, so
//! running it twice produces the same tables with the same contents.

use crate::db::ConnectStore;
use crate::error::ConnectResult;
use crate::schema::{create_schema, row_counts, schema_exists};
use rusqlite::Connection;
use tracing::info;

const SAMPLE_SKILLS: &str = r#"
INSERT INTO skill (skill_id, skill_name, skill_description, skill_category) VALUES
    (1, 'First Aid', 'Basic first aid and incident response', 'Medical'),
    (2, 'Advanced First Aid', 'Remote area and advanced trauma care', 'Medical'),
    (3, 'Food Handling', 'Safe food preparation and storage', 'Physical'),
    (4, 'Event Coordination', 'Planning rosters and running the day', 'Administrative'),
    (5, 'Web Development', 'Building and maintaining websites', 'Technical'),
    (6, 'Public Speaking', 'Presenting to groups', 'Communication'),
    (7, 'Tutoring', 'One-on-one academic support', 'Educational'),
    (8, 'Graphic Design', 'Posters, flyers and social media artwork', 'Creative'),
    (9, 'Heavy Lifting', 'Moving stock and equipment', 'Physical'),
    (10, 'Translation', 'Interpreting for community members', 'Communication');
"#;

const SAMPLE_ORGANISATIONS: &str = r#"
INSERT INTO organisation (org_id, org_name, contact_email, phone, address, org_type, description) VALUES
    (1, 'Sydney Food Bank', 'contact@sydneyfoodbank.org.au', '0291234567',
        '12 Harbour St, Sydney NSW 2000', 'Charity', 'Food relief for families in need'),
    (2, 'Harbour Clean-Up Crew', 'crew@harbourcleanup.org', '0292345678',
        '5 Wharf Rd, Balmain NSW 2041', 'Community Group', 'Monthly foreshore clean-ups'),
    (3, 'Westside Youth Mentoring', 'info@westsideyouth.org.au', '0293456789',
        '88 Church St, Parramatta NSW 2150', 'Non-Profit', NULL),
    (4, 'City Library Services', 'library@city.nsw.gov.au', '0294567890',
        '1 George St, Sydney NSW 2000', 'Government', 'Literacy and digital skills programs');
"#;

const SAMPLE_VOLUNTEERS: &str = r#"
INSERT INTO volunteer (volunteer_id, first_name, last_name, date_of_birth, email, phone, address, registration_date) VALUES
    (1, 'Amelia', 'Nguyen', '1988-03-14', 'amelia.nguyen@example.com', '0412345678', '3 King St, Newtown NSW 2042', '2024-01-15'),
    (2, 'Oliver', 'Smith', '1975-11-02', 'oliver.smith@example.com', '0423456789', '21 Park Ave, Ashfield NSW 2131', '2024-02-03'),
    (3, 'Priya', 'Patel', '1999-07-21', 'priya.patel@example.com', '0434567890', '7 Station Rd, Auburn NSW 2144', '2024-02-20'),
    (4, 'Lucas', 'Brown', '2003-05-09', 'lucas.brown@example.com', '0445678901', '45 Beach Rd, Bondi NSW 2026', '2024-03-11'),
    (5, 'Chloe', 'Wilson', '1992-09-30', 'chloe.wilson@example.com', '0456789012', '9 Hill St, Ryde NSW 2112', '2024-03-28'),
    (6, 'Mateo', 'Garcia', '1983-12-17', 'mateo.garcia@example.com', '0467890123', '16 River Rd, Lane Cove NSW 2066', '2024-04-05'),
    (7, 'Hannah', 'Kim', '1995-06-01', 'hannah.kim@example.com', '0478901234', '30 Queen St, Glebe NSW 2037', '2024-04-19'),
    (8, 'Jack', 'Taylor', '1969-02-25', 'jack.taylor@example.com', '0489012345', '2 Ocean Pde, Manly NSW 2095', '2024-05-02');
"#;

const SAMPLE_EVENTS: &str = r#"
INSERT INTO event (event_id, org_id, event_name, description, start_date, end_date, location, max_volunteers) VALUES
    (1, 1, 'Winter Food Drive', 'Collecting and sorting donated food', '2025-06-07', '2025-06-08', 'Sydney Food Bank Warehouse', 6),
    (2, 1, 'Community Kitchen', 'Cooking hot meals for guests', '2025-07-12', '2025-07-12', 'St Mary''s Hall', 4),
    (3, 2, 'Balmain Foreshore Clean-Up', NULL, '2025-06-21', '2025-06-21', 'Mort Bay Park', 10),
    (4, 3, 'Homework Club', 'After-school tutoring sessions', '2025-08-04', '2025-08-29', 'Parramatta Youth Centre', 3),
    (5, 4, 'Digital Skills Workshop', 'Helping seniors get online', '2025-09-15', '2025-09-16', 'City Library Level 2', 2),
    (6, 2, 'Spring Harbour Sweep', 'Kayak-based litter collection', '2025-10-11', '2025-10-11', 'Rushcutters Bay', 8);
"#;

const SAMPLE_VOLUNTEER_SKILLS: &str = r#"
INSERT INTO volunteer_skill (volunteer_id, skill_id, proficiency_level, years_experience) VALUES
    (1, 1, 'Expert', 8),
    (1, 4, 'Advanced', 5),
    (2, 1, 'Advanced', 10),
    (2, 9, 'Intermediate', 4),
    (3, 1, 'Intermediate', 3),
    (3, 5, 'Expert', 6),
    (3, 10, 'Advanced', 7),
    (4, 1, 'Beginner', 1),
    (4, 9, 'Advanced', 2),
    (5, 2, 'Advanced', 6),
    (5, 7, 'Expert', 9),
    (6, 3, 'Expert', 12),
    (6, 6, 'Intermediate', 3),
    (7, 8, 'Advanced', 4),
    (7, 7, 'Intermediate', 2),
    (8, 3, 'Advanced', 15),
    (8, 2, 'Beginner', 0);
"#;

const SAMPLE_EVENT_SKILLS: &str = r#"
INSERT INTO event_skill (event_id, skill_id, priority, min_proficiency) VALUES
    (1, 9, 'Essential', 'Beginner'),
    (1, 1, 'Preferred', 'Intermediate'),
    (2, 3, 'Essential', 'Intermediate'),
    (3, 1, 'Essential', 'Beginner'),
    (4, 7, 'Essential', 'Intermediate'),
    (5, 5, 'Preferred', 'Intermediate'),
    (5, 6, 'Bonus', 'Beginner'),
    (6, 2, 'Essential', 'Advanced');
"#;

const SAMPLE_REGISTRATIONS: &str = r#"
INSERT INTO volunteer_event (volunteer_id, event_id, registration_date, attendance_status) VALUES
    (1, 1, '2025-05-20', 'Registered'),
    (2, 1, '2025-05-21', 'Registered'),
    (4, 1, '2025-05-25', 'Cancelled'),
    (6, 2, '2025-06-30', 'Registered'),
    (8, 2, '2025-07-01', 'Registered'),
    (1, 3, '2025-06-01', 'Attended'),
    (3, 3, '2025-06-02', 'Attended'),
    (4, 3, '2025-06-02', 'No-Show'),
    (5, 4, '2025-07-15', 'Registered'),
    (7, 4, '2025-07-16', 'Registered'),
    (3, 5, '2025-09-01', 'Registered'),
    (7, 5, '2025-09-02', 'Registered');
"#;

/// Inserts the sample rows into an empty schema, parents first
pub fn seed_sample_data(conn: &Connection) -> ConnectResult<()> {
    for batch in [
        SAMPLE_SKILLS,
        SAMPLE_ORGANISATIONS,
        SAMPLE_VOLUNTEERS,
        SAMPLE_EVENTS,
        SAMPLE_VOLUNTEER_SKILLS,
        SAMPLE_EVENT_SKILLS,
        SAMPLE_REGISTRATIONS,
    ] {
        conn.execute_batch(batch)?;
    }
    Ok(())
}

/// Drops and recreates every table, then loads the sample data if `seed` is set.
///
/// Runs as one transaction: a failure part way leaves the previous database
/// untouched.
pub async fn initialize(store: &ConnectStore, seed: bool) -> ConnectResult<Vec<(String, i64)>> {
    let counts = store
        .write(move |tx| {
            create_schema(tx)?;
            if seed {
                seed_sample_data(tx)?;
            }
            row_counts(tx)
        })
        .await?;
    info!("Database initialised (seeded: {}): {:?}", seed, counts);
    Ok(counts)
}

/// Creates the schema only when tables are missing. Returns true if it did.
pub async fn ensure_schema(store: &ConnectStore) -> ConnectResult<bool> {
    let created = store
        .write(|tx| {
            if schema_exists(tx)? {
                return Ok(false);
            }
            create_schema(tx)?;
            Ok(true)
        })
        .await?;
    if created {
        info!("Created missing schema");
    }
    Ok(created)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crud;
    use crate::schema::table_names;

    #[tokio::test]
    async fn test_initialize_is_deterministic() {
        let store = ConnectStore::in_memory().await.unwrap();
        let first = initialize(&store, true).await.unwrap();
        let first_tables = store.read(table_names).await.unwrap();
        let first_volunteers = store.read(crud::list_volunteers).await.unwrap();

        let second = initialize(&store, true).await.unwrap();
        let second_tables = store.read(table_names).await.unwrap();
        let second_volunteers = store.read(crud::list_volunteers).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(first_tables, second_tables);
        assert_eq!(first_volunteers, second_volunteers);
        assert!(first.iter().all(|(_, n)| *n > 0));
    }

    #[tokio::test]
    async fn test_initialize_without_seed_is_empty() {
        let store = ConnectStore::in_memory().await.unwrap();
        let counts = initialize(&store, false).await.unwrap();
        assert_eq!(counts.len(), 7);
        assert!(counts.iter().all(|(_, n)| *n == 0));
    }

    #[tokio::test]
    async fn test_ensure_schema_keeps_existing_data() {
        let store = ConnectStore::in_memory().await.unwrap();
        assert!(ensure_schema(&store).await.unwrap());

        initialize(&store, true).await.unwrap();
        assert!(!ensure_schema(&store).await.unwrap());
        let volunteers = store.read(crud::list_volunteers).await.unwrap();
        assert_eq!(volunteers.len(), 8);
    }

    #[test]
    fn test_sample_registrations_fit_capacity() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch("PRAGMA foreign_keys=ON;").unwrap();
        create_schema(&conn).unwrap();
        seed_sample_data(&conn).unwrap();

        let overfull: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM event e
                 WHERE (SELECT COUNT(*) FROM volunteer_event ve WHERE ve.event_id = e.event_id)
                     > e.max_volunteers",
                [],
                |r| r.get(0),
            )
            .unwrap();
        assert_eq!(overfull, 0);
    }
}
