//! # Boundary Validation
//!
//! Re-checks caller input against the same rules the column CHECKs enforce, so
//! bad input is rejected with a typed rule before a statement is prepared.
//!
//! ## Rules
//! - Required text fields must not be blank
//! - Email: something before the last `@`, and a `.` after it
//! - Phone: after stripping spaces, `-`, `(` and `)`, only digits, at least 10
//! - Date of birth strictly before today
//! - Event end date on or after its start date, capacity above zero
//! - Years of experience never negative

use crate::error::{ConnectError, ConnectResult, Rule};
use crate::model::{NewEvent, NewOrganisation, NewSkill, NewVolunteer, SkillClaim};
use chrono::NaiveDate;
use lazy_static::lazy_static;
use regex::Regex;

/// Minimum digits in a phone number
pub const MIN_PHONE_DIGITS: usize = 10;

/// Longest accepted skill search pattern
pub const MAX_PATTERN_LENGTH: usize = 100;

lazy_static! {
    /// Local part, then a domain containing at least one dot
    static ref EMAIL_REGEX: Regex = Regex::new(r"^[^@\s]+@[^@\s]*\.[^@\s]*$").unwrap();

    /// Characters users commonly type between phone digits
    static ref PHONE_SEPARATORS: Regex = Regex::new(r"[\s\-()]").unwrap();
}

fn require(field: &str, value: &str) -> ConnectResult<()> {
    if value.trim().is_empty() {
        return Err(ConnectError::violation(Rule::MissingField(field.to_string())));
    }
    Ok(())
}

pub fn validate_email(email: &str) -> ConnectResult<()> {
    if !EMAIL_REGEX.is_match(email.trim()) {
        return Err(ConnectError::violation(Rule::InvalidEmail));
    }
    Ok(())
}

pub fn validate_phone(phone: &str) -> ConnectResult<()> {
    let digits = PHONE_SEPARATORS.replace_all(phone, "");
    if digits.len() < MIN_PHONE_DIGITS || !digits.chars().all(|c| c.is_ascii_digit()) {
        return Err(ConnectError::violation(Rule::InvalidPhone));
    }
    Ok(())
}

pub fn validate_date_range(start: NaiveDate, end: NaiveDate) -> ConnectResult<()> {
    if end < start {
        return Err(ConnectError::violation(Rule::InvalidDateRange));
    }
    Ok(())
}

pub fn validate_volunteer(v: &NewVolunteer, today: NaiveDate) -> ConnectResult<()> {
    require("first_name", &v.first_name)?;
    require("last_name", &v.last_name)?;
    require("address", &v.address)?;
    validate_email(&v.email)?;
    validate_phone(&v.phone)?;
    if v.date_of_birth >= today {
        return Err(ConnectError::violation(Rule::InvalidDateOfBirth));
    }
    Ok(())
}

pub fn validate_organisation(o: &NewOrganisation) -> ConnectResult<()> {
    require("org_name", &o.org_name)?;
    require("address", &o.address)?;
    validate_email(&o.contact_email)?;
    validate_phone(&o.phone)
}

pub fn validate_skill(s: &NewSkill) -> ConnectResult<()> {
    require("skill_name", &s.skill_name)
}

pub fn validate_event(e: &NewEvent) -> ConnectResult<()> {
    require("event_name", &e.event_name)?;
    require("location", &e.location)?;
    validate_date_range(e.start_date, e.end_date)?;
    if e.max_volunteers <= 0 {
        return Err(ConnectError::violation(Rule::InvalidCapacity));
    }
    Ok(())
}

pub fn validate_skill_claim(claim: &SkillClaim) -> ConnectResult<()> {
    if claim.years_experience < 0 {
        return Err(ConnectError::violation(Rule::InvalidExperience));
    }
    Ok(())
}

/// Ids handed to queries must be positive
pub fn validate_id(name: &str, id: i64) -> ConnectResult<()> {
    if id <= 0 {
        return Err(ConnectError::InvalidArgument(format!(
            "{} must be positive, got {}",
            name, id
        )));
    }
    Ok(())
}

/// Checks a skill search pattern and returns it trimmed
pub fn validate_pattern(pattern: &str) -> ConnectResult<&str> {
    let trimmed = pattern.trim();
    if trimmed.is_empty() {
        return Err(ConnectError::InvalidArgument(
            "skill pattern must not be blank".to_string(),
        ));
    }
    if trimmed.chars().count() > MAX_PATTERN_LENGTH {
        return Err(ConnectError::InvalidArgument(format!(
            "skill pattern longer than {} characters",
            MAX_PATTERN_LENGTH
        )));
    }
    Ok(trimmed)
}

/// Escapes LIKE wildcards so the pattern matches literally (ESCAPE '\')
pub fn escape_like(pattern: &str) -> String {
    let mut escaped = String::with_capacity(pattern.len() + 2);
    for c in pattern.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rule_of(result: ConnectResult<()>) -> Rule {
        match result {
            Err(ConnectError::ConstraintViolation { rule }) => rule,
            other => panic!("expected constraint violation, got {:?}", other),
        }
    }

    #[test]
    fn test_validate_email() {
        assert!(validate_email("sarah.j@email.com").is_ok());
        assert!(validate_email("a@b.co").is_ok());

        assert_eq!(rule_of(validate_email("no-at-sign.com")), Rule::InvalidEmail);
        assert_eq!(rule_of(validate_email("user@localhost")), Rule::InvalidEmail);
        assert_eq!(rule_of(validate_email("@domain.com")), Rule::InvalidEmail);
    }

    #[test]
    fn test_validate_phone() {
        assert!(validate_phone("0412345678").is_ok());
        assert!(validate_phone("(02) 9876-5432").is_ok());

        assert_eq!(rule_of(validate_phone("12345")), Rule::InvalidPhone);
        assert_eq!(rule_of(validate_phone("04123456ab")), Rule::InvalidPhone);
    }

    #[test]
    fn test_validate_volunteer() {
        let today = NaiveDate::from_ymd_opt(2025, 6, 1).unwrap();
        let mut v = NewVolunteer {
            first_name: "Sarah".into(),
            last_name: "Johnson".into(),
            date_of_birth: NaiveDate::from_ymd_opt(1990, 3, 15).unwrap(),
            email: "sarah@example.com".into(),
            phone: "0412345678".into(),
            address: "1 George St".into(),
        };
        assert!(validate_volunteer(&v, today).is_ok());

        v.date_of_birth = today;
        assert_eq!(rule_of(validate_volunteer(&v, today)), Rule::InvalidDateOfBirth);

        v.date_of_birth = NaiveDate::from_ymd_opt(1990, 3, 15).unwrap();
        v.last_name = "  ".into();
        assert_eq!(
            rule_of(validate_volunteer(&v, today)),
            Rule::MissingField("last_name".to_string())
        );
    }

    #[test]
    fn test_validate_pattern() {
        assert_eq!(validate_pattern("  First Aid ").unwrap(), "First Aid");
        assert!(validate_pattern("   ").is_err());
        assert!(validate_pattern(&"x".repeat(MAX_PATTERN_LENGTH + 1)).is_err());
    }

    #[test]
    fn test_escape_like() {
        assert_eq!(escape_like("100%_sure"), "100\\%\\_sure");
        assert_eq!(escape_like("First Aid"), "First Aid");
    }
}
