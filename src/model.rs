//! # Data Model
//!
//! Rows of the seven tables and the closed enumerations stored in them.
//!
//! ## Textual Encoding
//!
//! | Enum              | Stored text                                              |
//! |-------------------|----------------------------------------------------------|
//! | `OrgType`         | Charity, Community Group, Non-Profit, Government, Educational |
//! | `SkillCategory`   | Medical, Administrative, Physical, Technical, Communication, Educational, Creative |
//! | `AttendanceStatus`| Registered, Attended, No-Show, Cancelled                 |
//! | `Proficiency`     | Beginner, Intermediate, Advanced, Expert                 |
//! | `Priority`        | Essential, Preferred, Bonus                              |
//!
//! Unknown text is rejected when parsed from caller input, and surfaces as a
//! conversion failure when read back from a damaged store.

use crate::error::ConnectError;
use chrono::NaiveDate;
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Declares a closed enumeration persisted as fixed text.
macro_rules! text_enum {
    (
        $(#[$meta:meta])*
        $name:ident { $($variant:ident => $text:literal),+ $(,)? }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum $name {
            $(
                #[serde(rename = $text)]
                $variant,
            )+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            /// Returns the text stored in the database
            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $text,)+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = ConnectError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok($name::$variant),)+
                    other => Err(ConnectError::InvalidArgument(format!(
                        "unknown {} '{}'",
                        stringify!($name),
                        other
                    ))),
                }
            }
        }

        impl ToSql for $name {
            fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
                Ok(ToSqlOutput::from(self.as_str()))
            }
        }

        impl FromSql for $name {
            fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
                value
                    .as_str()?
                    .parse()
                    .map_err(|e: ConnectError| FromSqlError::Other(Box::new(e)))
            }
        }
    };
}

text_enum! {
    /// Kind of organisation
    OrgType {
        Charity => "Charity",
        CommunityGroup => "Community Group",
        NonProfit => "Non-Profit",
        Government => "Government",
        Educational => "Educational",
    }
}

text_enum! {
    /// Broad grouping of a skill
    SkillCategory {
        Medical => "Medical",
        Administrative => "Administrative",
        Physical => "Physical",
        Technical => "Technical",
        Communication => "Communication",
        Educational => "Educational",
        Creative => "Creative",
    }
}

text_enum! {
    /// Attendance state of a volunteer's event registration
    AttendanceStatus {
        Registered => "Registered",
        Attended => "Attended",
        NoShow => "No-Show",
        Cancelled => "Cancelled",
    }
}

text_enum! {
    /// Self-reported skill level. Variants are declared lowest first so the
    /// derived ordering matches Expert > Advanced > Intermediate > Beginner.
    #[derive(PartialOrd, Ord)]
    Proficiency {
        Beginner => "Beginner",
        Intermediate => "Intermediate",
        Advanced => "Advanced",
        Expert => "Expert",
    }
}

text_enum! {
    /// How strongly an event needs a skill
    Priority {
        Essential => "Essential",
        Preferred => "Preferred",
        Bonus => "Bonus",
    }
}

impl Proficiency {
    /// Sort rank used by SQL ordering (Beginner = 1 .. Expert = 4)
    pub fn rank(&self) -> i64 {
        match self {
            Proficiency::Beginner => 1,
            Proficiency::Intermediate => 2,
            Proficiency::Advanced => 3,
            Proficiency::Expert => 4,
        }
    }
}

/// Current local date, used for registration dates and ages
pub fn today() -> NaiveDate {
    chrono::Local::now().date_naive()
}

// ============================================================================
// Volunteers
// ============================================================================

/// Fields submitted when registering a volunteer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewVolunteer {
    pub first_name: String,
    pub last_name: String,
    pub date_of_birth: NaiveDate,
    pub email: String,
    pub phone: String,
    pub address: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Volunteer {
    pub volunteer_id: i64,
    pub first_name: String,
    pub last_name: String,
    pub date_of_birth: NaiveDate,
    pub email: String,
    pub phone: String,
    pub address: String,
    pub registration_date: NaiveDate,
}

impl Volunteer {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

// ============================================================================
// Organisations
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewOrganisation {
    pub org_name: String,
    pub contact_email: String,
    pub phone: String,
    pub address: String,
    pub org_type: OrgType,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Organisation {
    pub org_id: i64,
    pub org_name: String,
    pub contact_email: String,
    pub phone: String,
    pub address: String,
    pub org_type: OrgType,
    pub description: Option<String>,
}

// ============================================================================
// Skills
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewSkill {
    pub skill_name: String,
    #[serde(default)]
    pub skill_description: Option<String>,
    pub skill_category: SkillCategory,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Skill {
    pub skill_id: i64,
    pub skill_name: String,
    pub skill_description: Option<String>,
    pub skill_category: SkillCategory,
}

// ============================================================================
// Events
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewEvent {
    pub org_id: i64,
    pub event_name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub location: String,
    pub max_volunteers: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    pub event_id: i64,
    pub org_id: i64,
    pub event_name: String,
    pub description: Option<String>,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub location: String,
    pub max_volunteers: i64,
}

// ============================================================================
// Associations
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VolunteerEvent {
    pub volunteer_id: i64,
    pub event_id: i64,
    pub registration_date: NaiveDate,
    pub attendance_status: AttendanceStatus,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VolunteerSkill {
    pub volunteer_id: i64,
    pub skill_id: i64,
    pub proficiency_level: Proficiency,
    pub years_experience: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventSkill {
    pub event_id: i64,
    pub skill_id: i64,
    pub priority: Priority,
    pub min_proficiency: Proficiency,
}

/// A skill claimed by a volunteer during registration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkillClaim {
    pub skill_id: i64,
    pub proficiency_level: Proficiency,
    pub years_experience: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_round_trip_for_multi_word_variants() {
        assert_eq!(OrgType::CommunityGroup.as_str(), "Community Group");
        assert_eq!("Non-Profit".parse::<OrgType>().unwrap(), OrgType::NonProfit);
        assert_eq!("No-Show".parse::<AttendanceStatus>().unwrap(), AttendanceStatus::NoShow);
    }

    #[test]
    fn test_unknown_text_is_rejected() {
        assert!(matches!(
            "expert".parse::<Proficiency>(),
            Err(ConnectError::InvalidArgument(_))
        ));
        assert!("Sports".parse::<SkillCategory>().is_err());
    }

    #[test]
    fn test_proficiency_ordering() {
        assert!(Proficiency::Expert > Proficiency::Advanced);
        assert!(Proficiency::Advanced > Proficiency::Intermediate);
        assert!(Proficiency::Intermediate > Proficiency::Beginner);
        assert_eq!(Proficiency::Expert.rank(), 4);
    }

    #[test]
    fn test_serde_uses_stored_text() {
        let json = serde_json::to_string(&AttendanceStatus::NoShow).unwrap();
        assert_eq!(json, "\"No-Show\"");
        let parsed: OrgType = serde_json::from_str("\"Community Group\"").unwrap();
        assert_eq!(parsed, OrgType::CommunityGroup);
    }
}
