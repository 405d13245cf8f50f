//! # Transactional Write Operations
//!
//! Every operation validates its input at the boundary, then performs all of
//! its row mutations inside one IMMEDIATE transaction through
//! [`ConnectStore::write`]. A failure at any step drops the transaction, so
//! the store is left exactly as it was before the call.

use crate::crud;
use crate::db::ConnectStore;
use crate::error::{ConnectError, ConnectResult, Entity, Rule};
use crate::integrity::{ensure_exists, register_within_capacity, set_attendance_within_capacity};
use crate::model::{
    today, AttendanceStatus, EventSkill, NewEvent, NewOrganisation, NewSkill, NewVolunteer,
    Priority, Proficiency, SkillClaim, VolunteerSkill,
};
use crate::validate;
use std::sync::Arc;
use tracing::{info, warn};

/// Write-side service shared by the HTTP shell
#[derive(Clone)]
pub struct RegistrationService {
    store: Arc<ConnectStore>,
}

impl RegistrationService {
    pub fn new(store: Arc<ConnectStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<ConnectStore> {
        &self.store
    }

    // ========================================================================
    // Volunteers
    // ========================================================================

    /// Inserts one volunteer and returns the assigned id
    pub async fn register_volunteer(&self, volunteer: NewVolunteer) -> ConnectResult<i64> {
        self.register_volunteer_with_skills_and_events(volunteer, Vec::new(), Vec::new())
            .await
    }

    /// Inserts a volunteer, their skills and their event sign-ups as one unit.
    ///
    /// Skills are inserted in order, then events are registered in order, each
    /// capacity-checked. If any step fails nothing is persisted.
    pub async fn register_volunteer_with_skills_and_events(
        &self,
        volunteer: NewVolunteer,
        skills: Vec<SkillClaim>,
        event_ids: Vec<i64>,
    ) -> ConnectResult<i64> {
        let registered_on = today();
        validate::validate_volunteer(&volunteer, registered_on)?;
        for claim in &skills {
            validate::validate_skill_claim(claim)?;
        }

        let policy = self.store.capacity_policy();
        let email = volunteer.email.clone();
        let (skill_count, event_count) = (skills.len(), event_ids.len());

        let result = self
            .store
            .write(move |tx| {
                let volunteer_id = crud::insert_volunteer(tx, &volunteer, registered_on)?;

                for claim in &skills {
                    ensure_exists(tx, Entity::Skill, claim.skill_id)?;
                    crud::insert_volunteer_skill(
                        tx,
                        &VolunteerSkill {
                            volunteer_id,
                            skill_id: claim.skill_id,
                            proficiency_level: claim.proficiency_level,
                            years_experience: claim.years_experience,
                        },
                    )?;
                }

                for event_id in &event_ids {
                    register_within_capacity(tx, volunteer_id, *event_id, registered_on, policy)?;
                }

                Ok(volunteer_id)
            })
            .await;

        match &result {
            Ok(id) => info!(
                "Registered volunteer {} ({}) with {} skills, {} events",
                id, email, skill_count, event_count
            ),
            Err(e) => warn!("Volunteer registration for {} rolled back: {}", email, e),
        }
        result
    }

    /// Replaces a volunteer's phone number
    pub async fn update_volunteer_phone(&self, volunteer_id: i64, phone: String) -> ConnectResult<()> {
        validate::validate_phone(&phone)?;
        self.store
            .write(move |tx| {
                if crud::update_volunteer_contact(tx, volunteer_id, &phone, None)? == 0 {
                    return Err(ConnectError::not_found(Entity::Volunteer, volunteer_id));
                }
                Ok(())
            })
            .await?;
        info!("Updated phone for volunteer {}", volunteer_id);
        Ok(())
    }

    /// Replaces phone and address together
    pub async fn update_volunteer_contact(
        &self,
        volunteer_id: i64,
        phone: String,
        address: String,
    ) -> ConnectResult<()> {
        validate::validate_phone(&phone)?;
        if address.trim().is_empty() {
            return Err(ConnectError::violation(Rule::MissingField("address".to_string())));
        }
        self.store
            .write(move |tx| {
                if crud::update_volunteer_contact(tx, volunteer_id, &phone, Some(&address))? == 0 {
                    return Err(ConnectError::not_found(Entity::Volunteer, volunteer_id));
                }
                Ok(())
            })
            .await?;
        info!("Updated contact details for volunteer {}", volunteer_id);
        Ok(())
    }

    /// Removes a volunteer together with their skills and registrations
    pub async fn delete_volunteer(&self, volunteer_id: i64) -> ConnectResult<()> {
        self.store
            .write(move |tx| {
                if crud::delete_volunteer(tx, volunteer_id)? == 0 {
                    return Err(ConnectError::not_found(Entity::Volunteer, volunteer_id));
                }
                Ok(())
            })
            .await?;
        info!("Deleted volunteer {}", volunteer_id);
        Ok(())
    }

    /// Adds one skill to an existing volunteer
    pub async fn add_volunteer_skill(&self, volunteer_id: i64, claim: SkillClaim) -> ConnectResult<()> {
        validate::validate_skill_claim(&claim)?;
        self.store
            .write(move |tx| {
                ensure_exists(tx, Entity::Volunteer, volunteer_id)?;
                ensure_exists(tx, Entity::Skill, claim.skill_id)?;
                crud::insert_volunteer_skill(
                    tx,
                    &VolunteerSkill {
                        volunteer_id,
                        skill_id: claim.skill_id,
                        proficiency_level: claim.proficiency_level,
                        years_experience: claim.years_experience,
                    },
                )
            })
            .await?;
        info!("Volunteer {} added skill {}", volunteer_id, claim.skill_id);
        Ok(())
    }

    // ========================================================================
    // Organisations, skills, events
    // ========================================================================

    pub async fn create_organisation(&self, organisation: NewOrganisation) -> ConnectResult<i64> {
        validate::validate_organisation(&organisation)?;
        let id = self
            .store
            .write(move |tx| crud::insert_organisation(tx, &organisation))
            .await?;
        info!("Created organisation {}", id);
        Ok(id)
    }

    /// Removes an organisation; its events and their associations cascade
    pub async fn delete_organisation(&self, org_id: i64) -> ConnectResult<()> {
        self.store
            .write(move |tx| {
                if crud::delete_organisation(tx, org_id)? == 0 {
                    return Err(ConnectError::not_found(Entity::Organisation, org_id));
                }
                Ok(())
            })
            .await?;
        info!("Deleted organisation {}", org_id);
        Ok(())
    }

    pub async fn create_skill(&self, skill: NewSkill) -> ConnectResult<i64> {
        validate::validate_skill(&skill)?;
        let id = self.store.write(move |tx| crud::insert_skill(tx, &skill)).await?;
        info!("Created skill {}", id);
        Ok(id)
    }

    /// Creates an event for an existing organisation
    pub async fn create_event(&self, event: NewEvent) -> ConnectResult<i64> {
        validate::validate_event(&event)?;
        let id = self
            .store
            .write(move |tx| {
                ensure_exists(tx, Entity::Organisation, event.org_id)?;
                crud::insert_event(tx, &event)
            })
            .await?;
        info!("Created event {}", id);
        Ok(id)
    }

    /// Records that an event needs a skill at a minimum proficiency
    pub async fn add_event_skill(
        &self,
        event_id: i64,
        skill_id: i64,
        priority: Priority,
        min_proficiency: Proficiency,
    ) -> ConnectResult<()> {
        self.store
            .write(move |tx| {
                ensure_exists(tx, Entity::Event, event_id)?;
                ensure_exists(tx, Entity::Skill, skill_id)?;
                crud::insert_event_skill(
                    tx,
                    &EventSkill {
                        event_id,
                        skill_id,
                        priority,
                        min_proficiency,
                    },
                )
            })
            .await?;
        info!("Event {} needs skill {} ({})", event_id, skill_id, priority);
        Ok(())
    }

    /// Removes an event; its registrations and skill needs cascade
    pub async fn delete_event(&self, event_id: i64) -> ConnectResult<()> {
        self.store
            .write(move |tx| {
                if crud::delete_event(tx, event_id)? == 0 {
                    return Err(ConnectError::not_found(Entity::Event, event_id));
                }
                Ok(())
            })
            .await?;
        info!("Deleted event {}", event_id);
        Ok(())
    }

    // ========================================================================
    // Registrations
    // ========================================================================

    /// Signs an existing volunteer up for an event, capacity permitting
    pub async fn register_for_event(&self, volunteer_id: i64, event_id: i64) -> ConnectResult<()> {
        let policy = self.store.capacity_policy();
        let day = today();
        self.store
            .write(move |tx| register_within_capacity(tx, volunteer_id, event_id, day, policy))
            .await?;
        info!("Volunteer {} registered for event {}", volunteer_id, event_id);
        Ok(())
    }

    /// Updates attendance. A cancelled registration only comes back if the
    /// event still has room for it.
    pub async fn set_attendance(
        &self,
        volunteer_id: i64,
        event_id: i64,
        status: AttendanceStatus,
    ) -> ConnectResult<()> {
        let policy = self.store.capacity_policy();
        self.store
            .write(move |tx| {
                set_attendance_within_capacity(tx, volunteer_id, event_id, status, policy)
            })
            .await?;
        info!(
            "Volunteer {} marked {} for event {}",
            volunteer_id, status, event_id
        );
        Ok(())
    }
}
