//! Race Service
//!
//! Orchestrates registry, user directory, result store and simulation
//! engine behind the operations clients call.
//!
//! ## Results lifecycle (per race)
//!
//! ```text
//!   NoResults ──simulate (race past, ≥1 participant)──► HasResults
//!       │                                                   │
//!   get_results → []                          get_results / simulate → stored set
//! ```
//!
//! `HasResults` is terminal. Registration is only accepted while the race
//! date lies in the future.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Serialize, Deserialize};
use tracing::{info, instrument};

use super::clock::Clock;
use super::error::RaceError;
use super::model::{RaceId, RaceSummary, Registration, ResultSet, User, UserId};
use super::registry::ParticipantRegistry;
use super::simulation::{SimulationEngine, SimulationParams};
use super::store::{CreateOutcome, ResultStore};
use super::users::UserDirectory;

/// A race the user is registered for.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfileRegistration {
    /// Race identifier.
    pub race_id: RaceId,
    /// Race title.
    pub race_title: String,
    /// Race date.
    pub race_date: DateTime<Utc>,
    /// Race venue.
    pub race_location: String,
    /// Whether the race date has passed (results can be viewed).
    pub finished: bool,
}

/// A user and their registrations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    /// The user.
    pub user: User,
    /// Races registered for, in id order.
    pub registrations: Vec<ProfileRegistration>,
}

/// Entry point for every race operation.
pub struct RaceService {
    registry: Arc<ParticipantRegistry>,
    users: Arc<UserDirectory>,
    store: Arc<ResultStore>,
    engine: SimulationEngine,
    clock: Arc<dyn Clock>,
}

impl RaceService {
    /// Wire the service together.
    pub fn new(
        registry: Arc<ParticipantRegistry>,
        users: Arc<UserDirectory>,
        store: Arc<ResultStore>,
        clock: Arc<dyn Clock>,
        params: SimulationParams,
    ) -> Self {
        let engine = SimulationEngine::new(registry.clone(), store.clone(), params);
        Self {
            registry,
            users,
            store,
            engine,
            clock,
        }
    }

    /// Log in (creating the user on first login).
    pub async fn login(&self, email: &str, full_name: &str) -> Result<User, RaceError> {
        let user = self.users.login(email, full_name).await?;
        info!("User {} logged in", user.id);
        Ok(user)
    }

    /// Look up a user.
    pub async fn user(&self, user_id: UserId) -> Result<User, RaceError> {
        self.users.get(user_id).await
    }

    /// Every race in the catalogue.
    pub async fn list_races(&self) -> Vec<RaceSummary> {
        self.registry.races().await
    }

    /// One race, with participant display names.
    pub async fn get_race(&self, race_id: RaceId) -> Result<RaceSummary, RaceError> {
        Ok(self.registry.race(race_id).await?.summary())
    }

    /// Stored results, or an empty set if the race was not simulated yet.
    pub async fn get_results(&self, race_id: RaceId) -> Result<Arc<ResultSet>, RaceError> {
        self.registry.race(race_id).await?;
        Ok(self.store.get_results(race_id).await?)
    }

    /// Produce results for a finished race, or return the stored ones.
    #[instrument(skip(self))]
    pub async fn simulate(&self, race_id: RaceId) -> Result<CreateOutcome, RaceError> {
        let race = self.registry.race(race_id).await?;

        let existing = self.store.get_results(race_id).await?;
        if !existing.is_empty() {
            return Ok(CreateOutcome {
                results: existing,
                was_created: false,
            });
        }

        if !race.is_past(self.clock.now()) {
            return Err(RaceError::RaceNotFinished(race_id));
        }

        let outcome = self.engine.simulate(race_id).await?;
        info!(
            "Race {} results ready ({} entries, created: {})",
            race_id,
            outcome.results.len(),
            outcome.was_created
        );
        Ok(outcome)
    }

    /// Register a user for an upcoming race.
    #[instrument(skip(self))]
    pub async fn register(&self, race_id: RaceId, user_id: UserId) -> Result<Registration, RaceError> {
        let user = self.users.get(user_id).await?;

        let registration = self
            .registry
            .register(race_id, user_id, user.display_name(), self.clock.now())
            .await?;
        info!("User {} registered for race {}", user_id, race_id);
        Ok(registration)
    }

    /// A user and the races they are registered for.
    pub async fn profile(&self, user_id: UserId) -> Result<Profile, RaceError> {
        let user = self.users.get(user_id).await?;
        let now = self.clock.now();

        let registrations = self
            .registry
            .registrations_for(user_id)
            .await
            .into_iter()
            .map(|race| ProfileRegistration {
                race_id: race.id,
                finished: race.is_past(now),
                race_title: race.title,
                race_date: race.date,
                race_location: race.location,
            })
            .collect();

        Ok(Profile { user, registrations })
    }
}
