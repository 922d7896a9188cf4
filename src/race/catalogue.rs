//! Race Catalogue
//!
//! Input format for the seeded race list, plus a demo catalogue used when
//! no catalogue file is configured.
//!
//! ```json
//! [
//!   { "id": 1, "title": "Trail des Crêtes", "date": "2025-06-01T09:00:00Z",
//!     "location": "Annecy", "capacity": 50 }
//! ]
//! ```

use std::path::Path;

use chrono::{DateTime, Duration, Utc};
use serde::{Serialize, Deserialize};
use tracing::info;

use super::error::RaceError;
use super::model::{Race, RaceId};
use super::registry::ParticipantRegistry;
use super::users::UserDirectory;

/// Catalogue loading errors.
#[derive(Debug, thiserror::Error)]
pub enum CatalogueError {
    /// File could not be read.
    #[error("Failed to read catalogue: {0}")]
    Io(#[from] std::io::Error),

    /// File is not a valid catalogue.
    #[error("Failed to parse catalogue: {0}")]
    Parse(#[from] serde_json::Error),

    /// Catalogue content violates a race invariant.
    #[error("Invalid catalogue: {0}")]
    Invalid(#[from] RaceError),
}

/// One race as written in a catalogue file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogueEntry {
    /// Race identifier.
    pub id: RaceId,
    /// Title.
    pub title: String,
    /// Scheduled start (RFC 3339).
    pub date: DateTime<Utc>,
    /// Venue.
    pub location: String,
    /// Maximum number of registrations.
    pub capacity: u32,
}

impl From<CatalogueEntry> for Race {
    fn from(entry: CatalogueEntry) -> Self {
        Race::new(entry.id, entry.title, entry.date, entry.location, entry.capacity)
    }
}

/// Parse a catalogue from JSON text.
pub fn parse_catalogue(json: &str) -> Result<Vec<Race>, CatalogueError> {
    let entries: Vec<CatalogueEntry> = serde_json::from_str(json)?;
    Ok(entries.into_iter().map(Race::from).collect())
}

/// Build a registry from a catalogue file.
pub fn load_catalogue(path: &Path) -> Result<ParticipantRegistry, CatalogueError> {
    let json = std::fs::read_to_string(path)?;
    let races = parse_catalogue(&json)?;
    info!("Loaded {} races from {}", races.len(), path.display());
    Ok(ParticipantRegistry::with_races(races)?)
}

/// Demo races around `now`: two finished, two upcoming.
pub fn demo_races(now: DateTime<Utc>) -> Vec<Race> {
    vec![
        Race::new(RaceId::new(1), "Trail des Crêtes", now - Duration::days(30), "Annecy", 40),
        Race::new(RaceId::new(2), "Enduro du Vercors", now - Duration::days(3), "Villard-de-Lans", 25),
        Race::new(RaceId::new(3), "Roc des Alpilles", now + Duration::days(14), "Saint-Rémy", 60),
        Race::new(RaceId::new(4), "Raid des Volcans", now + Duration::days(60), "Clermont-Ferrand", 3),
    ]
}

const DEMO_RUNNERS: [(&str, &str); 6] = [
    ("alice@demo.local", "Alice Martin"),
    ("bob@demo.local", "Bob Bernard"),
    ("carol@demo.local", "Carol Petit"),
    ("dave@demo.local", "Dave Durand"),
    ("eve@demo.local", "Eve Leroy"),
    ("frank@demo.local", "Frank Moreau"),
];

/// Seed the demo catalogue: demo runners are registered for the finished
/// races, so those can be simulated straight away.
pub async fn seed_demo(
    registry: &ParticipantRegistry,
    users: &UserDirectory,
    now: DateTime<Utc>,
) -> Result<(), RaceError> {
    let races = demo_races(now);
    let finished: Vec<RaceId> = races
        .iter()
        .filter(|race| race.is_past(now))
        .map(|race| race.id)
        .collect();

    for race in races {
        registry.insert_race(race).await?;
    }

    for (email, name) in DEMO_RUNNERS {
        let user = users.login(email, name).await?;
        for race_id in &finished {
            registry.enroll(*race_id, user.id, user.display_name()).await?;
        }
    }

    info!("Seeded demo catalogue ({} finished races)", finished.len());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_parse_catalogue() {
        let json = r#"[
            { "id": 1, "title": "Trail", "date": "2025-06-01T09:00:00Z", "location": "Annecy", "capacity": 3 },
            { "id": 2, "title": "Enduro", "date": "2030-01-01T09:00:00Z", "location": "Lyon", "capacity": 10 }
        ]"#;

        let races = parse_catalogue(json).unwrap();
        assert_eq!(races.len(), 2);
        assert_eq!(races[0].id, RaceId::new(1));
        assert_eq!(races[0].capacity, 3);
        assert!(races[0].participants.is_empty());
        assert_eq!(races[1].date, Utc.with_ymd_and_hms(2030, 1, 1, 9, 0, 0).unwrap());
    }

    #[test]
    fn test_parse_catalogue_rejects_garbage() {
        assert!(matches!(parse_catalogue("{ nope"), Err(CatalogueError::Parse(_))));
    }

    #[test]
    fn test_load_catalogue_rejects_duplicate_ids() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("races.json");
        std::fs::write(
            &path,
            r#"[
                { "id": 1, "title": "A", "date": "2025-06-01T09:00:00Z", "location": "X", "capacity": 3 },
                { "id": 1, "title": "B", "date": "2025-06-01T09:00:00Z", "location": "Y", "capacity": 3 }
            ]"#,
        )
        .unwrap();

        assert!(matches!(load_catalogue(&path), Err(CatalogueError::Invalid(_))));
    }

    #[test]
    fn test_load_catalogue_missing_file() {
        let result = load_catalogue(Path::new("/definitely/not/here.json"));
        assert!(matches!(result, Err(CatalogueError::Io(_))));
    }

    #[tokio::test]
    async fn test_seed_demo() {
        let now = Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap();
        let registry = ParticipantRegistry::new();
        let users = UserDirectory::new();

        seed_demo(&registry, &users, now).await.unwrap();

        assert_eq!(registry.race_count().await, 4);
        assert_eq!(users.user_count().await, DEMO_RUNNERS.len());
        assert_eq!(
            registry.list_participants(RaceId::new(1)).await.unwrap().len(),
            DEMO_RUNNERS.len()
        );
        assert!(registry.list_participants(RaceId::new(3)).await.unwrap().is_empty());
    }
}
