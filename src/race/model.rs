//! Race Domain Types
//!
//! Races, registrations, users and result sets.
//! Collections use BTreeMap/Vec so iteration order is deterministic.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Serialize, Deserialize};

use crate::core::hash::{DigestHasher, ResultDigest};

// =============================================================================
// IDENTIFIERS
// =============================================================================

/// Unique race identifier.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RaceId(u64);

impl RaceId {
    /// Wrap a raw id.
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Raw id.
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for RaceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique user identifier. Opaque to the race core.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(u64);

impl UserId {
    /// Wrap a raw id.
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Raw id.
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// =============================================================================
// USERS
// =============================================================================

/// A user known to the directory.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// User identifier.
    pub id: UserId,
    /// Login key.
    pub email: String,
    /// Full name, shown in rosters and results.
    pub full_name: String,
}

impl User {
    /// Name shown to other users. Falls back to the email when no name was given.
    pub fn display_name(&self) -> &str {
        if self.full_name.is_empty() {
            &self.email
        } else {
            &self.full_name
        }
    }
}

// =============================================================================
// RACES
// =============================================================================

/// A registered participant, with the display name captured at registration.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Participant {
    /// Registered user.
    pub user_id: UserId,
    /// Display name at registration time.
    pub display_name: String,
}

/// A (race, user) binding. Immutable once created.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Registration {
    /// Race registered for.
    pub race_id: RaceId,
    /// Registered user.
    pub user_id: UserId,
}

/// A race with its capacity-limited roster.
///
/// Invariant: `participants.len() <= capacity`, no user appears twice.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Race {
    /// Race identifier.
    pub id: RaceId,
    /// Title.
    pub title: String,
    /// Scheduled start.
    pub date: DateTime<Utc>,
    /// Venue.
    pub location: String,
    /// Maximum number of registrations.
    pub capacity: u32,
    /// Participants in registration order.
    #[serde(default)]
    pub participants: Vec<Participant>,
    /// Set once a simulation has taken the roster; no appends after that.
    #[serde(default)]
    pub roster_closed: bool,
}

impl Race {
    /// Create a race with an empty roster.
    pub fn new(
        id: RaceId,
        title: impl Into<String>,
        date: DateTime<Utc>,
        location: impl Into<String>,
        capacity: u32,
    ) -> Self {
        Self {
            id,
            title: title.into(),
            date,
            location: location.into(),
            capacity,
            participants: Vec::new(),
            roster_closed: false,
        }
    }

    /// Check if every place is taken.
    pub fn is_full(&self) -> bool {
        self.participants.len() >= self.capacity as usize
    }

    /// Places left.
    pub fn remaining(&self) -> u32 {
        self.capacity.saturating_sub(self.participants.len() as u32)
    }

    /// Check if the user already holds a place.
    pub fn is_registered(&self, user_id: UserId) -> bool {
        self.participants.iter().any(|p| p.user_id == user_id)
    }

    /// Check if the race date lies before `now`.
    pub fn is_past(&self, now: DateTime<Utc>) -> bool {
        self.date < now
    }

    /// Check if the roster still accepts registrations at `now`.
    pub fn accepts_registrations(&self, now: DateTime<Utc>) -> bool {
        !self.roster_closed && !self.is_past(now)
    }

    /// Participant display names in registration order.
    pub fn participant_names(&self) -> Vec<String> {
        self.participants.iter().map(|p| p.display_name.clone()).collect()
    }

    /// Summary served to clients.
    pub fn summary(&self) -> RaceSummary {
        RaceSummary {
            id: self.id,
            title: self.title.clone(),
            date: self.date,
            location: self.location.clone(),
            capacity: self.capacity,
            remaining: self.remaining(),
            participants: self.participant_names(),
        }
    }
}

/// Race as seen by clients.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RaceSummary {
    /// Race identifier.
    pub id: RaceId,
    /// Title.
    pub title: String,
    /// Scheduled start.
    pub date: DateTime<Utc>,
    /// Venue.
    pub location: String,
    /// Maximum number of registrations.
    pub capacity: u32,
    /// Places left.
    pub remaining: u32,
    /// Participant display names in registration order.
    pub participants: Vec<String>,
}

// =============================================================================
// RESULTS
// =============================================================================

/// One finisher.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultEntry {
    /// Race the entry belongs to.
    pub race_id: RaceId,
    /// Dense 1-based rank.
    pub rank: u32,
    /// Participant display name.
    pub name: String,
    /// Elapsed time in milliseconds.
    pub time_ms: u64,
}

impl ResultEntry {
    /// Elapsed time in fractional seconds.
    pub fn time_seconds(&self) -> f64 {
        self.time_ms as f64 / 1000.0
    }
}

/// The complete, ordered ranking for one race.
///
/// Entries are sorted by rank; ranks are exactly `1..=len`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultSet {
    /// Race the set belongs to.
    pub race_id: RaceId,
    /// Entries in rank order.
    pub entries: Vec<ResultEntry>,
}

impl ResultSet {
    /// Set with no entries: "not simulated yet".
    pub fn empty(race_id: RaceId) -> Self {
        Self {
            race_id,
            entries: Vec::new(),
        }
    }

    /// Check if the set has no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check the rank invariant: ranks are exactly 1..=N in order.
    pub fn has_dense_ranks(&self) -> bool {
        self.entries
            .iter()
            .enumerate()
            .all(|(i, e)| e.rank as usize == i + 1 && e.race_id == self.race_id)
    }

    /// Digest over race id and every entry in rank order.
    pub fn digest(&self) -> ResultDigest {
        let mut hasher = DigestHasher::for_result_set();
        hasher.update_u64(self.race_id.get());
        hasher.update_u32(self.entries.len() as u32);
        for entry in &self.entries {
            hasher.update_u32(entry.rank);
            hasher.update_str(&entry.name);
            hasher.update_u64(entry.time_ms);
        }
        hasher.finalize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn sample_race(capacity: u32) -> Race {
        let date = Utc.with_ymd_and_hms(2025, 6, 1, 9, 0, 0).unwrap();
        Race::new(RaceId::new(1), "Trail des Crêtes", date, "Annecy", capacity)
    }

    #[test]
    fn test_race_capacity_helpers() {
        let mut race = sample_race(2);
        assert_eq!(race.remaining(), 2);
        assert!(!race.is_full());

        race.participants.push(Participant {
            user_id: UserId::new(1),
            display_name: "Alice".into(),
        });
        race.participants.push(Participant {
            user_id: UserId::new(2),
            display_name: "Bob".into(),
        });

        assert_eq!(race.remaining(), 0);
        assert!(race.is_full());
        assert!(race.is_registered(UserId::new(2)));
        assert!(!race.is_registered(UserId::new(3)));
        assert_eq!(race.participant_names(), vec!["Alice", "Bob"]);
    }

    #[test]
    fn test_race_is_past() {
        let race = sample_race(1);
        let before = Utc.with_ymd_and_hms(2025, 5, 31, 0, 0, 0).unwrap();
        let after = Utc.with_ymd_and_hms(2025, 6, 2, 0, 0, 0).unwrap();

        assert!(!race.is_past(before));
        assert!(race.is_past(after));
        assert!(!race.is_past(race.date));
    }

    #[test]
    fn test_accepts_registrations() {
        let mut race = sample_race(1);
        let before = Utc.with_ymd_and_hms(2025, 5, 31, 0, 0, 0).unwrap();
        let after = Utc.with_ymd_and_hms(2025, 6, 2, 0, 0, 0).unwrap();

        assert!(race.accepts_registrations(before));
        assert!(!race.accepts_registrations(after));

        race.roster_closed = true;
        assert!(!race.accepts_registrations(before));
    }

    #[test]
    fn test_display_name_falls_back_to_email() {
        let user = User {
            id: UserId::new(1),
            email: "a@example.com".into(),
            full_name: String::new(),
        };
        assert_eq!(user.display_name(), "a@example.com");
    }

    #[test]
    fn test_result_set_digest_tracks_content() {
        let race_id = RaceId::new(9);
        let set = ResultSet {
            race_id,
            entries: vec![
                ResultEntry { race_id, rank: 1, name: "Alice".into(), time_ms: 3_600_000 },
                ResultEntry { race_id, rank: 2, name: "Bob".into(), time_ms: 3_700_000 },
            ],
        };

        assert!(set.has_dense_ranks());
        assert_eq!(set.digest(), set.clone().digest());

        let mut changed = set.clone();
        changed.entries[1].time_ms += 1;
        assert_ne!(set.digest(), changed.digest());
        assert_ne!(set.digest(), ResultSet::empty(race_id).digest());
    }

    #[test]
    fn test_dense_ranks_detects_gaps() {
        let race_id = RaceId::new(9);
        let set = ResultSet {
            race_id,
            entries: vec![
                ResultEntry { race_id, rank: 1, name: "Alice".into(), time_ms: 1 },
                ResultEntry { race_id, rank: 3, name: "Bob".into(), time_ms: 2 },
            ],
        };
        assert!(!set.has_dense_ranks());
    }

    #[test]
    fn test_time_seconds() {
        let entry = ResultEntry {
            race_id: RaceId::new(1),
            rank: 1,
            name: "Alice".into(),
            time_ms: 3_723_500,
        };
        assert_eq!(entry.time_seconds(), 3723.5);
    }

    #[test]
    fn test_ids_serialize_as_numbers() {
        let json = serde_json::to_string(&RaceId::new(42)).unwrap();
        assert_eq!(json, "42");
        let id: UserId = serde_json::from_str("7").unwrap();
        assert_eq!(id, UserId::new(7));
    }
}
