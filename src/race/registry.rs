//! Participant Registry
//!
//! Owns every race and its roster. Registration checks (date, capacity,
//! duplicates) and the append happen under one write lock, so two
//! concurrent registrations can never both take the last place.
//!
//! Simulation takes its roster through [`ParticipantRegistry::close_roster`],
//! under the same lock. After that no registration lands, so a committed
//! result set always covers the whole roster.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use super::error::{ConflictKind, RaceError};
use super::model::{Participant, Race, RaceId, RaceSummary, Registration, UserId};

/// Holds, per race, the ordered set of registered users.
pub struct ParticipantRegistry {
    races: RwLock<BTreeMap<RaceId, Race>>,
}

impl ParticipantRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            races: RwLock::new(BTreeMap::new()),
        }
    }

    /// Create a registry seeded with `races`.
    pub fn with_races(races: impl IntoIterator<Item = Race>) -> Result<Self, RaceError> {
        let mut map = BTreeMap::new();
        for race in races {
            if map.contains_key(&race.id) {
                return Err(RaceError::Conflict(ConflictKind::DuplicateRace));
            }
            map.insert(race.id, race);
        }
        Ok(Self {
            races: RwLock::new(map),
        })
    }

    /// Add a race to the catalogue.
    pub async fn insert_race(&self, race: Race) -> Result<(), RaceError> {
        let mut races = self.races.write().await;
        if races.contains_key(&race.id) {
            return Err(RaceError::Conflict(ConflictKind::DuplicateRace));
        }
        races.insert(race.id, race);
        Ok(())
    }

    /// Participant display names in registration order.
    pub async fn list_participants(&self, race_id: RaceId) -> Result<Vec<String>, RaceError> {
        let races = self.races.read().await;
        races
            .get(&race_id)
            .map(Race::participant_names)
            .ok_or(RaceError::RaceNotFound(race_id))
    }

    /// Append `user_id` to the race roster while registration is open at `now`.
    pub async fn register(
        &self,
        race_id: RaceId,
        user_id: UserId,
        display_name: &str,
        now: DateTime<Utc>,
    ) -> Result<Registration, RaceError> {
        self.append(race_id, user_id, display_name, Some(now)).await
    }

    /// Append `user_id` regardless of the race date. Used to seed rosters
    /// of races that already took place.
    pub async fn enroll(
        &self,
        race_id: RaceId,
        user_id: UserId,
        display_name: &str,
    ) -> Result<Registration, RaceError> {
        self.append(race_id, user_id, display_name, None).await
    }

    async fn append(
        &self,
        race_id: RaceId,
        user_id: UserId,
        display_name: &str,
        now: Option<DateTime<Utc>>,
    ) -> Result<Registration, RaceError> {
        let mut races = self.races.write().await;
        let race = races
            .get_mut(&race_id)
            .ok_or(RaceError::RaceNotFound(race_id))?;

        let open = match now {
            Some(now) => race.accepts_registrations(now),
            None => !race.roster_closed,
        };
        if !open {
            return Err(RaceError::RegistrationClosed(race_id));
        }

        if race.is_registered(user_id) {
            return Err(RaceError::Conflict(ConflictKind::AlreadyRegistered));
        }

        if race.is_full() {
            return Err(RaceError::Conflict(ConflictKind::RaceFull));
        }

        race.participants.push(Participant {
            user_id,
            display_name: display_name.to_string(),
        });

        Ok(Registration { race_id, user_id })
    }

    /// Freeze the roster and return its display names in registration order.
    pub async fn close_roster(&self, race_id: RaceId) -> Result<Vec<String>, RaceError> {
        let mut races = self.races.write().await;
        let race = races
            .get_mut(&race_id)
            .ok_or(RaceError::RaceNotFound(race_id))?;
        race.roster_closed = true;
        Ok(race.participant_names())
    }

    /// Snapshot of one race.
    pub async fn race(&self, race_id: RaceId) -> Result<Race, RaceError> {
        let races = self.races.read().await;
        races
            .get(&race_id)
            .cloned()
            .ok_or(RaceError::RaceNotFound(race_id))
    }

    /// Summaries of every race, in id order.
    pub async fn races(&self) -> Vec<RaceSummary> {
        let races = self.races.read().await;
        races.values().map(Race::summary).collect()
    }

    /// Races the user is registered for, in id order.
    pub async fn registrations_for(&self, user_id: UserId) -> Vec<Race> {
        let races = self.races.read().await;
        races
            .values()
            .filter(|race| race.is_registered(user_id))
            .cloned()
            .collect()
    }

    /// Number of races in the catalogue.
    pub async fn race_count(&self) -> usize {
        self.races.read().await.len()
    }
}

impl Default for ParticipantRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use chrono::{Duration, TimeZone};

    fn before_start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2029, 12, 1, 9, 0, 0).unwrap()
    }

    fn race(id: u64, capacity: u32) -> Race {
        let date = Utc.with_ymd_and_hms(2030, 1, 1, 9, 0, 0).unwrap();
        Race::new(RaceId::new(id), format!("Race {}", id), date, "Lyon", capacity)
    }

    #[tokio::test]
    async fn test_register_and_list() {
        let registry = ParticipantRegistry::with_races([race(1, 3)]).unwrap();

        registry.register(RaceId::new(1), UserId::new(10), "Alice", before_start()).await.unwrap();
        registry.register(RaceId::new(1), UserId::new(11), "Bob", before_start()).await.unwrap();

        let names = registry.list_participants(RaceId::new(1)).await.unwrap();
        assert_eq!(names, vec!["Alice", "Bob"]);
    }

    #[tokio::test]
    async fn test_unknown_race() {
        let registry = ParticipantRegistry::new();

        let result = registry.list_participants(RaceId::new(5)).await;
        assert!(matches!(result, Err(RaceError::RaceNotFound(id)) if id == RaceId::new(5)));

        let result = registry.register(RaceId::new(5), UserId::new(1), "Alice", before_start()).await;
        assert!(matches!(result, Err(RaceError::RaceNotFound(_))));
    }

    #[tokio::test]
    async fn test_capacity_invariant() {
        let registry = ParticipantRegistry::with_races([race(1, 3)]).unwrap();

        for user in 0..3 {
            registry
                .register(RaceId::new(1), UserId::new(user), &format!("Runner {}", user), before_start())
                .await
                .unwrap();
        }

        let result = registry.register(RaceId::new(1), UserId::new(99), "Late", before_start()).await;
        assert!(matches!(result, Err(RaceError::Conflict(ConflictKind::RaceFull))));
        assert_eq!(registry.list_participants(RaceId::new(1)).await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_duplicate_registration() {
        let registry = ParticipantRegistry::with_races([race(1, 3)]).unwrap();

        registry.register(RaceId::new(1), UserId::new(1), "Alice", before_start()).await.unwrap();
        let result = registry.register(RaceId::new(1), UserId::new(1), "Alice", before_start()).await;

        assert!(matches!(result, Err(RaceError::Conflict(ConflictKind::AlreadyRegistered))));
    }

    #[tokio::test]
    async fn test_duplicate_race_rejected() {
        assert!(ParticipantRegistry::with_races([race(1, 3), race(1, 4)]).is_err());

        let registry = ParticipantRegistry::with_races([race(1, 3)]).unwrap();
        let result = registry.insert_race(race(1, 5)).await;
        assert!(matches!(result, Err(RaceError::Conflict(ConflictKind::DuplicateRace))));

        registry.insert_race(race(2, 5)).await.unwrap();
        assert_eq!(registry.race_count().await, 2);
    }

    #[tokio::test]
    async fn test_registrations_for_user() {
        let registry = ParticipantRegistry::with_races([race(1, 3), race(2, 3), race(3, 3)]).unwrap();

        registry.register(RaceId::new(3), UserId::new(7), "Alice", before_start()).await.unwrap();
        registry.register(RaceId::new(1), UserId::new(7), "Alice", before_start()).await.unwrap();
        registry.register(RaceId::new(2), UserId::new(8), "Bob", before_start()).await.unwrap();

        let ids: Vec<RaceId> = registry
            .registrations_for(UserId::new(7))
            .await
            .iter()
            .map(|r| r.id)
            .collect();
        assert_eq!(ids, vec![RaceId::new(1), RaceId::new(3)]);
    }

    #[tokio::test]
    async fn test_registration_closed_after_race_date() {
        let registry = ParticipantRegistry::with_races([race(1, 3)]).unwrap();
        let date = registry.race(RaceId::new(1)).await.unwrap().date;

        let result = registry
            .register(RaceId::new(1), UserId::new(1), "Alice", date + Duration::seconds(1))
            .await;
        assert!(matches!(result, Err(RaceError::RegistrationClosed(_))));

        registry.enroll(RaceId::new(1), UserId::new(1), "Alice").await.unwrap();
        assert_eq!(registry.list_participants(RaceId::new(1)).await.unwrap(), vec!["Alice"]);
    }

    #[tokio::test]
    async fn test_closed_roster_rejects_registrations() {
        let registry = ParticipantRegistry::with_races([race(1, 3)]).unwrap();
        registry.register(RaceId::new(1), UserId::new(1), "Alice", before_start()).await.unwrap();

        let roster = registry.close_roster(RaceId::new(1)).await.unwrap();
        assert_eq!(roster, vec!["Alice"]);

        let result = registry.register(RaceId::new(1), UserId::new(2), "Bob", before_start()).await;
        assert!(matches!(result, Err(RaceError::RegistrationClosed(_))));
        let result = registry.enroll(RaceId::new(1), UserId::new(2), "Bob").await;
        assert!(matches!(result, Err(RaceError::RegistrationClosed(_))));

        assert_eq!(registry.list_participants(RaceId::new(1)).await.unwrap(), roster);
        assert!(matches!(
            registry.close_roster(RaceId::new(9)).await,
            Err(RaceError::RaceNotFound(_))
        ));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_registrations_respect_capacity() {
        let registry = Arc::new(ParticipantRegistry::with_races([race(1, 5)]).unwrap());

        let handles: Vec<_> = (0..20)
            .map(|user| {
                let registry = registry.clone();
                tokio::spawn(async move {
                    registry
                        .register(RaceId::new(1), UserId::new(user), &format!("Runner {}", user), before_start())
                        .await
                })
            })
            .collect();

        let mut accepted = 0;
        for handle in handles {
            if handle.await.unwrap().is_ok() {
                accepted += 1;
            }
        }

        assert_eq!(accepted, 5);
        assert_eq!(registry.race(RaceId::new(1)).await.unwrap().remaining(), 0);
    }
}
