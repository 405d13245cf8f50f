//! # Integrity Layer
//!
//! Cross-row rules that column constraints cannot express. Every function
//! here takes the caller's open transaction, so a check and the write it
//! guards are never separated by another writer.
//!
//! ## Capacity
//! A registration is a single conditional insert: the row is only written if
//! the event's counted registrations are below `max_volunteers`. Zero rows
//! inserted after the existence checks passed means the event is full.
//!
//! Moving a registration out of `Cancelled` takes a place back, so under
//! [`CapacityPolicy::ExcludeCancelled`] it is checked against capacity too.

use crate::crud;
use crate::db::CapacityPolicy;
use crate::error::{ConnectError, ConnectResult, Entity};
use crate::model::AttendanceStatus;
use chrono::NaiveDate;
use rusqlite::{params, Connection, OptionalExtension};
use tracing::{debug, warn};

/// Fails with `NotFound` unless a row with `id` exists for `entity`
pub fn ensure_exists(conn: &Connection, entity: Entity, id: i64) -> ConnectResult<()> {
    let sql = match entity {
        Entity::Volunteer => "SELECT 1 FROM volunteer WHERE volunteer_id = ?1",
        Entity::Organisation => "SELECT 1 FROM organisation WHERE org_id = ?1",
        Entity::Skill => "SELECT 1 FROM skill WHERE skill_id = ?1",
        Entity::Event => "SELECT 1 FROM event WHERE event_id = ?1",
        Entity::Registration => {
            return Err(ConnectError::InvalidArgument(
                "registrations are keyed by volunteer and event".to_string(),
            ))
        }
    };
    let found = conn
        .query_row(sql, [id], |_| Ok(()))
        .optional()?
        .is_some();
    if !found {
        debug!("Missing {} {}", entity, id);
        return Err(ConnectError::not_found(entity, id));
    }
    Ok(())
}

fn counted_filter(policy: CapacityPolicy) -> &'static str {
    match policy {
        CapacityPolicy::CountAll => "",
        CapacityPolicy::ExcludeCancelled => " AND attendance_status <> 'Cancelled'",
    }
}

/// Registrations of `event_id` that count against its capacity
pub fn registration_count(
    conn: &Connection,
    event_id: i64,
    policy: CapacityPolicy,
) -> ConnectResult<i64> {
    let sql = format!(
        "SELECT COUNT(*) FROM volunteer_event WHERE event_id = ?1{}",
        counted_filter(policy)
    );
    Ok(conn.query_row(&sql, [event_id], |row| row.get(0))?)
}

/// Fails with `CapacityExceeded` if one more registration would overfill the event
pub fn check_capacity(conn: &Connection, event_id: i64, policy: CapacityPolicy) -> ConnectResult<()> {
    let max: i64 = conn
        .query_row(
            "SELECT max_volunteers FROM event WHERE event_id = ?1",
            [event_id],
            |row| row.get(0),
        )
        .optional()?
        .ok_or_else(|| ConnectError::not_found(Entity::Event, event_id))?;
    if registration_count(conn, event_id, policy)? >= max {
        return Err(ConnectError::CapacityExceeded { event_id });
    }
    Ok(())
}

/// Registers a volunteer for an event if both exist and the event has room.
///
/// The count and the insert are one statement, evaluated inside the
/// caller's transaction.
pub fn register_within_capacity(
    conn: &Connection,
    volunteer_id: i64,
    event_id: i64,
    registration_date: NaiveDate,
    policy: CapacityPolicy,
) -> ConnectResult<()> {
    ensure_exists(conn, Entity::Volunteer, volunteer_id)?;
    ensure_exists(conn, Entity::Event, event_id)?;

    let sql = format!(
        "INSERT INTO volunteer_event (volunteer_id, event_id, registration_date, attendance_status)
         SELECT ?1, ?2, ?3, ?4
         WHERE (SELECT COUNT(*) FROM volunteer_event WHERE event_id = ?2{})
             < (SELECT max_volunteers FROM event WHERE event_id = ?2)",
        counted_filter(policy)
    );
    let inserted = conn.execute(
        &sql,
        params![volunteer_id, event_id, registration_date, AttendanceStatus::Registered],
    )?;

    if inserted == 0 {
        warn!("Event {} is full, rejected volunteer {}", event_id, volunteer_id);
        return Err(ConnectError::CapacityExceeded { event_id });
    }
    Ok(())
}

/// Changes a registration's attendance status.
///
/// Reactivating a cancelled registration is refused with `CapacityExceeded`
/// when cancelled rows are not counted and the event has since filled up.
pub fn set_attendance_within_capacity(
    conn: &Connection,
    volunteer_id: i64,
    event_id: i64,
    status: AttendanceStatus,
    policy: CapacityPolicy,
) -> ConnectResult<()> {
    ensure_exists(conn, Entity::Volunteer, volunteer_id)?;
    ensure_exists(conn, Entity::Event, event_id)?;
    let current = crud::fetch_registration(conn, volunteer_id, event_id)?
        .ok_or_else(|| ConnectError::not_found(Entity::Registration, volunteer_id))?;

    let reactivating = policy == CapacityPolicy::ExcludeCancelled
        && current.attendance_status == AttendanceStatus::Cancelled
        && status != AttendanceStatus::Cancelled;
    if reactivating {
        if let Err(err) = check_capacity(conn, event_id, policy) {
            warn!(
                "Event {} is full, volunteer {} stays cancelled",
                event_id, volunteer_id
            );
            return Err(err);
        }
    }

    crud::update_attendance(conn, volunteer_id, event_id, status)?;
    Ok(())
}
