//! # Error Handling Module
//!
//! Typed failures for every Write and Query operation. The core never renders
//! user-facing prose; the HTTP shell turns these into JSON bodies with a stable
//! machine-readable code.

use axum::{
    extract::rejection::{JsonRejection, PathRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use rusqlite::ErrorCode;
use serde_json::json;
use std::fmt;
use thiserror::Error;

/// Result type alias for Community Connect operations
pub type ConnectResult<T> = Result<T, ConnectError>;

/// Entity kinds that can be reported as missing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Entity {
    Volunteer,
    Organisation,
    Skill,
    Event,
    /// Keyed by volunteer and event; `NotFound` carries the volunteer id
    Registration,
}

impl Entity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Entity::Volunteer => "volunteer",
            Entity::Organisation => "organisation",
            Entity::Skill => "skill",
            Entity::Event => "event",
            Entity::Registration => "registration",
        }
    }
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identity of a violated rule, whether caught at the boundary or by SQLite
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rule {
    DuplicateEmail,
    DuplicateOrganisationName,
    DuplicateSkillName,
    DuplicateRegistration,
    DuplicateVolunteerSkill,
    DuplicateEventSkill,
    InvalidEmail,
    InvalidPhone,
    InvalidDateRange,
    InvalidCapacity,
    InvalidExperience,
    InvalidDateOfBirth,
    InvalidEnumeration,
    MissingField(String),
    ForeignKey,
    /// A constraint SQLite reported that has no dedicated rule
    Other(String),
}

impl Rule {
    pub fn code(&self) -> &'static str {
        match self {
            Rule::DuplicateEmail => "DUPLICATE_EMAIL",
            Rule::DuplicateOrganisationName => "DUPLICATE_ORGANISATION_NAME",
            Rule::DuplicateSkillName => "DUPLICATE_SKILL_NAME",
            Rule::DuplicateRegistration => "DUPLICATE_REGISTRATION",
            Rule::DuplicateVolunteerSkill => "DUPLICATE_VOLUNTEER_SKILL",
            Rule::DuplicateEventSkill => "DUPLICATE_EVENT_SKILL",
            Rule::InvalidEmail => "INVALID_EMAIL",
            Rule::InvalidPhone => "INVALID_PHONE",
            Rule::InvalidDateRange => "INVALID_DATE_RANGE",
            Rule::InvalidCapacity => "INVALID_CAPACITY",
            Rule::InvalidExperience => "INVALID_EXPERIENCE",
            Rule::InvalidDateOfBirth => "INVALID_DATE_OF_BIRTH",
            Rule::InvalidEnumeration => "INVALID_ENUMERATION",
            Rule::MissingField(_) => "MISSING_FIELD",
            Rule::ForeignKey => "FOREIGN_KEY",
            Rule::Other(_) => "CONSTRAINT",
        }
    }

    /// Classifies the message SQLite attaches to a constraint failure.
    ///
    /// Named CHECK constraints report their name (`ck_event_dates`), UNIQUE and
    /// NOT NULL report `table.column` lists.
    pub fn from_sqlite_message(message: &str) -> Rule {
        if let Some(cols) = message.strip_prefix("UNIQUE constraint failed: ") {
            return match cols {
                "volunteer.email" => Rule::DuplicateEmail,
                "organisation.org_name" => Rule::DuplicateOrganisationName,
                "skill.skill_name" => Rule::DuplicateSkillName,
                c if c.starts_with("volunteer_event.") => Rule::DuplicateRegistration,
                c if c.starts_with("volunteer_skill.") => Rule::DuplicateVolunteerSkill,
                c if c.starts_with("event_skill.") => Rule::DuplicateEventSkill,
                other => Rule::Other(other.to_string()),
            };
        }
        if let Some(name) = message.strip_prefix("CHECK constraint failed: ") {
            return match name {
                "ck_volunteer_email" | "ck_organisation_email" => Rule::InvalidEmail,
                "ck_volunteer_phone" | "ck_organisation_phone" => Rule::InvalidPhone,
                "ck_event_dates" => Rule::InvalidDateRange,
                "ck_event_capacity" => Rule::InvalidCapacity,
                "ck_volunteer_skill_years" => Rule::InvalidExperience,
                n if n.starts_with("ck_") && n.ends_with("_enum") => Rule::InvalidEnumeration,
                other => Rule::Other(other.to_string()),
            };
        }
        if let Some(column) = message.strip_prefix("NOT NULL constraint failed: ") {
            let field = column.rsplit('.').next().unwrap_or(column);
            return Rule::MissingField(field.to_string());
        }
        if message.starts_with("FOREIGN KEY constraint failed") {
            return Rule::ForeignKey;
        }
        Rule::Other(message.to_string())
    }
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rule::MissingField(field) => write!(f, "MISSING_FIELD({})", field),
            Rule::Other(detail) => write!(f, "CONSTRAINT({})", detail),
            rule => f.write_str(rule.code()),
        }
    }
}

/// Error type for all Community Connect operations
#[derive(Error, Debug)]
pub enum ConnectError {
    /// Format, uniqueness or range rule broken
    #[error("Constraint violation: {rule}")]
    ConstraintViolation { rule: Rule },

    /// Referenced row absent
    #[error("Not found: {entity} {id}")]
    NotFound { entity: Entity, id: i64 },

    /// Registration would exceed the event's max_volunteers
    #[error("Capacity exceeded for event {event_id}")]
    CapacityExceeded { event_id: i64 },

    /// Malformed query or request parameter
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Connection, initialisation or unexpected store failure
    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),
}

impl ConnectError {
    pub fn violation(rule: Rule) -> Self {
        ConnectError::ConstraintViolation { rule }
    }

    pub fn not_found(entity: Entity, id: i64) -> Self {
        ConnectError::NotFound { entity, id }
    }

    /// Returns the appropriate HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            ConnectError::ConstraintViolation { rule } => match rule {
                Rule::DuplicateEmail
                | Rule::DuplicateOrganisationName
                | Rule::DuplicateSkillName
                | Rule::DuplicateRegistration
                | Rule::DuplicateVolunteerSkill
                | Rule::DuplicateEventSkill => StatusCode::CONFLICT,
                _ => StatusCode::UNPROCESSABLE_ENTITY,
            },
            ConnectError::NotFound { .. } => StatusCode::NOT_FOUND,
            ConnectError::CapacityExceeded { .. } => StatusCode::CONFLICT,
            ConnectError::InvalidArgument(_) => StatusCode::BAD_REQUEST,
            ConnectError::StoreUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    /// Returns a machine-readable error code
    pub fn error_code(&self) -> &'static str {
        match self {
            ConnectError::ConstraintViolation { rule } => rule.code(),
            ConnectError::NotFound { .. } => "NOT_FOUND",
            ConnectError::CapacityExceeded { .. } => "CAPACITY_EXCEEDED",
            ConnectError::InvalidArgument(_) => "INVALID_ARGUMENT",
            ConnectError::StoreUnavailable(_) => "STORE_UNAVAILABLE",
        }
    }
}

/// Converts ConnectError into an Axum HTTP response
impl IntoResponse for ConnectError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = Json(json!({
            "error": {
                "code": self.error_code(),
                "message": self.to_string(),
            },
            "success": false,
        }));

        (status, body).into_response()
    }
}

/// Constraint failures carry their rule, everything else means the store is unusable
impl From<rusqlite::Error> for ConnectError {
    fn from(err: rusqlite::Error) -> Self {
        match &err {
            rusqlite::Error::SqliteFailure(failure, message)
                if failure.code == ErrorCode::ConstraintViolation =>
            {
                let rule = message
                    .as_deref()
                    .map(Rule::from_sqlite_message)
                    .unwrap_or_else(|| Rule::Other(err.to_string()));
                ConnectError::ConstraintViolation { rule }
            }
            _ => ConnectError::StoreUnavailable(err.to_string()),
        }
    }
}

/// Convert tokio-rusqlite errors to ConnectError
impl From<tokio_rusqlite::Error> for ConnectError {
    fn from(err: tokio_rusqlite::Error) -> Self {
        match err {
            tokio_rusqlite::Error::Rusqlite(inner) => inner.into(),
            other => ConnectError::StoreUnavailable(other.to_string()),
        }
    }
}

/// Unparseable bodies, unknown enumeration text and malformed ids
impl From<JsonRejection> for ConnectError {
    fn from(rejection: JsonRejection) -> Self {
        ConnectError::InvalidArgument(rejection.body_text())
    }
}

impl From<PathRejection> for ConnectError {
    fn from(rejection: PathRejection) -> Self {
        ConnectError::InvalidArgument(rejection.body_text())
    }
}

impl From<QueryRejection> for ConnectError {
    fn from(rejection: QueryRejection) -> Self {
        ConnectError::InvalidArgument(rejection.body_text())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unique_messages_map_to_rules() {
        assert_eq!(
            Rule::from_sqlite_message("UNIQUE constraint failed: volunteer.email"),
            Rule::DuplicateEmail
        );
        assert_eq!(
            Rule::from_sqlite_message(
                "UNIQUE constraint failed: volunteer_event.volunteer_id, volunteer_event.event_id"
            ),
            Rule::DuplicateRegistration
        );
        assert_eq!(
            Rule::from_sqlite_message("UNIQUE constraint failed: skill.skill_name"),
            Rule::DuplicateSkillName
        );
    }

    #[test]
    fn test_check_and_not_null_messages_map_to_rules() {
        assert_eq!(
            Rule::from_sqlite_message("CHECK constraint failed: ck_event_dates"),
            Rule::InvalidDateRange
        );
        assert_eq!(
            Rule::from_sqlite_message("CHECK constraint failed: ck_volunteer_event_status_enum"),
            Rule::InvalidEnumeration
        );
        assert_eq!(
            Rule::from_sqlite_message("NOT NULL constraint failed: volunteer.last_name"),
            Rule::MissingField("last_name".to_string())
        );
        assert_eq!(
            Rule::from_sqlite_message("FOREIGN KEY constraint failed"),
            Rule::ForeignKey
        );
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(
            ConnectError::violation(Rule::DuplicateEmail).status_code(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            ConnectError::violation(Rule::InvalidPhone).status_code(),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            ConnectError::not_found(Entity::Event, 7).status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ConnectError::CapacityExceeded { event_id: 1 }.error_code(),
            "CAPACITY_EXCEEDED"
        );
    }
}
