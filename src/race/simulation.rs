//! Result Simulation Engine
//!
//! Turns a race roster into a ranked result set. Generation is a pure
//! function of (race id, participant names, params):
//!
//! 1. The race RNG draws the winner's pace (`base`).
//! 2. Each participant's RNG, keyed by registration position, draws a
//!    slowdown relative to `base` plus sub-second jitter.
//! 3. Finishers are sorted by (time, position) and ranked 1..N.
//! 4. A time that does not strictly exceed its predecessor's is pushed
//!    to predecessor + 1 ms, so times strictly increase with rank.
//!
//! Persistence goes through [`ResultStore::create_if_absent`]; running the
//! engine again for a simulated race returns the stored set.

use std::sync::Arc;

use tracing::{debug, instrument};

use crate::core::rng::DeterministicRng;
use super::error::RaceError;
use super::model::{RaceId, ResultEntry, ResultSet};
use super::registry::ParticipantRegistry;
use super::store::{CreateOutcome, ResultStore};

/// Gap inserted between finishers whose generated times collide.
pub const TIE_BREAK_MS: u64 = 1;

/// Sub-second jitter range added to every time.
const JITTER_MS: u32 = 1000;

/// Tuning for generated times.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SimulationParams {
    /// Fastest possible winning time.
    pub base_time_ms: u32,
    /// Range added to `base_time_ms` per race.
    pub base_spread_ms: u32,
    /// Maximum slowdown relative to the winner's pace, in permille.
    pub field_spread_permille: u32,
}

impl Default for SimulationParams {
    fn default() -> Self {
        Self {
            base_time_ms: 45 * 60 * 1000,   // 45 min
            base_spread_ms: 60 * 60 * 1000, // up to +1 h
            field_spread_permille: 350,     // back of the field up to +35%
        }
    }
}

/// Generate the ranked result set for a roster.
pub fn generate_results(race_id: RaceId, names: &[String], params: &SimulationParams) -> ResultSet {
    let mut race_rng = DeterministicRng::for_race(race_id.get());
    let base = params.base_time_ms as u64 + race_rng.next_int(params.base_spread_ms) as u64;

    let finishers: Vec<(String, u64)> = names
        .iter()
        .enumerate()
        .map(|(position, name)| {
            let mut rng = DeterministicRng::for_participant(race_id.get(), position as u32);
            let slowdown = base * rng.next_int(params.field_spread_permille) as u64 / 1000;
            let jitter = rng.next_int(JITTER_MS) as u64;
            (name.clone(), base + slowdown + jitter)
        })
        .collect();

    rank_finishers(race_id, &finishers)
}

/// Rank `(name, time_ms)` finishers, given in registration order, by time.
/// Ties keep registration order.
pub fn rank_finishers(race_id: RaceId, finishers: &[(String, u64)]) -> ResultSet {
    let mut order: Vec<(u64, usize)> = finishers
        .iter()
        .enumerate()
        .map(|(position, (_, time))| (*time, position))
        .collect();
    order.sort_unstable();

    let mut entries = Vec::with_capacity(order.len());
    let mut previous: Option<u64> = None;

    for (index, (time, position)) in order.into_iter().enumerate() {
        let time = match previous {
            Some(prev) if time <= prev => prev + TIE_BREAK_MS,
            _ => time,
        };
        previous = Some(time);

        entries.push(ResultEntry {
            race_id,
            rank: index as u32 + 1,
            name: finishers[position].0.clone(),
            time_ms: time,
        });
    }

    ResultSet { race_id, entries }
}

/// Produces and persists result sets, once per race.
pub struct SimulationEngine {
    registry: Arc<ParticipantRegistry>,
    store: Arc<ResultStore>,
    params: SimulationParams,
}

impl SimulationEngine {
    /// Create an engine over a registry and store.
    pub fn new(
        registry: Arc<ParticipantRegistry>,
        store: Arc<ResultStore>,
        params: SimulationParams,
    ) -> Self {
        Self { registry, store, params }
    }

    /// Simulate a race and commit its results if none exist yet.
    ///
    /// Returns the committed set; `was_created` is false when an earlier
    /// simulation already committed one.
    #[instrument(skip(self))]
    pub async fn simulate(&self, race_id: RaceId) -> Result<CreateOutcome, RaceError> {
        let names = self.registry.close_roster(race_id).await?;
        if names.is_empty() {
            return Err(RaceError::EmptyParticipants(race_id));
        }

        let candidate = generate_results(race_id, &names, &self.params);
        debug!("Generated {} results for race {}", candidate.len(), race_id);

        Ok(self.store.create_if_absent(race_id, candidate).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use proptest::prelude::*;

    use crate::race::model::{Race, UserId};

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    fn timed(list: &[(&str, u64)]) -> Vec<(String, u64)> {
        list.iter().map(|(name, time)| (name.to_string(), *time)).collect()
    }

    async fn engine_with(race_id: RaceId, roster: &[&str]) -> (SimulationEngine, Arc<ResultStore>) {
        let date = Utc.with_ymd_and_hms(2024, 5, 1, 9, 0, 0).unwrap();
        let registry = Arc::new(
            ParticipantRegistry::with_races([Race::new(race_id, "Test", date, "Here", 10)]).unwrap(),
        );
        for (i, name) in roster.iter().enumerate() {
            registry.enroll(race_id, UserId::new(i as u64 + 1), name).await.unwrap();
        }
        let store = Arc::new(ResultStore::in_memory());
        let engine = SimulationEngine::new(registry, store.clone(), SimulationParams::default());
        (engine, store)
    }

    #[test]
    fn test_generate_results_is_reproducible() {
        let roster = names(&["Alice", "Bob", "Carol", "Dave"]);
        let a = generate_results(RaceId::new(1), &roster, &SimulationParams::default());
        let b = generate_results(RaceId::new(1), &roster, &SimulationParams::default());

        assert_eq!(a, b);
        assert_eq!(a.digest(), b.digest());
    }

    #[test]
    fn test_generate_results_varies_by_race() {
        let roster = names(&["Alice", "Bob", "Carol", "Dave"]);
        let a = generate_results(RaceId::new(1), &roster, &SimulationParams::default());
        let b = generate_results(RaceId::new(2), &roster, &SimulationParams::default());

        assert_ne!(a.digest(), b.digest());
    }

    #[test]
    fn test_two_participant_scenario() {
        let roster = names(&["Alice", "Bob"]);
        let set = generate_results(RaceId::new(1), &roster, &SimulationParams::default());

        assert_eq!(set.len(), 2);
        assert!(set.has_dense_ranks());
        assert!(set.entries[0].time_ms < set.entries[1].time_ms);

        let mut seen: Vec<&str> = set.entries.iter().map(|e| e.name.as_str()).collect();
        seen.sort_unstable();
        assert_eq!(seen, vec!["Alice", "Bob"]);
    }

    #[test]
    fn test_times_are_plausible() {
        let params = SimulationParams::default();
        let roster: Vec<String> = (0..50).map(|i| format!("Runner {}", i)).collect();
        let set = generate_results(RaceId::new(11), &roster, &params);

        let floor = params.base_time_ms as u64;
        let ceiling = (params.base_time_ms + params.base_spread_ms) as u64 * 1350 / 1000 + 1000 + 50;
        for entry in &set.entries {
            assert!(entry.time_ms >= floor, "{} too fast", entry.time_ms);
            assert!(entry.time_ms <= ceiling, "{} too slow", entry.time_ms);
        }
    }

    #[test]
    fn test_tie_break_keeps_position_order() {
        let finishers = timed(&[("Alice", 5000), ("Bob", 5000), ("Carol", 4000), ("Dave", 5000)]);
        let set = rank_finishers(RaceId::new(1), &finishers);

        let order: Vec<(&str, u64)> = set
            .entries
            .iter()
            .map(|e| (e.name.as_str(), e.time_ms))
            .collect();
        assert_eq!(
            order,
            vec![("Carol", 4000), ("Alice", 5000), ("Bob", 5001), ("Dave", 5002)]
        );
    }

    #[test]
    fn test_tie_break_cascades_into_next_time() {
        let set = rank_finishers(RaceId::new(1), &timed(&[("Alice", 100), ("Bob", 100), ("Carol", 101)]));

        let times: Vec<u64> = set.entries.iter().map(|e| e.time_ms).collect();
        assert_eq!(times, vec![100, 101, 102]);
        assert_eq!(set.entries[2].name, "Carol");
    }

    #[test]
    fn test_rank_finishers_empty() {
        let set = rank_finishers(RaceId::new(1), &[]);
        assert!(set.is_empty());
    }

    #[tokio::test]
    async fn test_simulate_commits_once() {
        let (engine, store) = engine_with(RaceId::new(1), &["Alice", "Bob"]).await;

        let first = engine.simulate(RaceId::new(1)).await.unwrap();
        assert!(first.was_created);
        assert_eq!(first.results.len(), 2);

        let second = engine.simulate(RaceId::new(1)).await.unwrap();
        assert!(!second.was_created);
        assert_eq!(*second.results, *first.results);

        assert_eq!(*store.get_results(RaceId::new(1)).await.unwrap(), *first.results);
    }

    #[tokio::test]
    async fn test_simulate_freezes_roster() {
        let (engine, _) = engine_with(RaceId::new(1), &["Alice", "Bob"]).await;

        let outcome = engine.simulate(RaceId::new(1)).await.unwrap();

        let late = engine.registry.enroll(RaceId::new(1), UserId::new(50), "Late").await;
        assert!(matches!(late, Err(RaceError::RegistrationClosed(_))));
        assert_eq!(
            engine.registry.list_participants(RaceId::new(1)).await.unwrap().len(),
            outcome.results.len()
        );
    }

    #[tokio::test]
    async fn test_simulate_empty_roster() {
        let (engine, store) = engine_with(RaceId::new(1), &[]).await;

        let result = engine.simulate(RaceId::new(1)).await;
        assert!(matches!(result, Err(RaceError::EmptyParticipants(_))));
        assert!(store.get_results(RaceId::new(1)).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_simulate_unknown_race() {
        let (engine, _) = engine_with(RaceId::new(1), &["Alice"]).await;

        let result = engine.simulate(RaceId::new(2)).await;
        assert!(matches!(result, Err(RaceError::RaceNotFound(_))));
    }

    proptest! {
        #[test]
        fn prop_ranks_are_total(race in 0u64..10_000, count in 1usize..60) {
            let roster: Vec<String> = (0..count).map(|i| format!("Runner {}", i)).collect();
            let set = generate_results(RaceId::new(race), &roster, &SimulationParams::default());

            prop_assert_eq!(set.len(), count);
            prop_assert!(set.has_dense_ranks());
            for pair in set.entries.windows(2) {
                prop_assert!(pair[0].time_ms < pair[1].time_ms);
            }
        }

        #[test]
        fn prop_tie_break_yields_strict_order(times in proptest::collection::vec(0u64..20, 1..40)) {
            let roster: Vec<String> = (0..times.len()).map(|i| format!("Runner {}", i)).collect();
            let finishers: Vec<(String, u64)> = roster.iter().cloned().zip(times.iter().copied()).collect();
            let set = rank_finishers(RaceId::new(1), &finishers);

            prop_assert_eq!(set.len(), times.len());
            prop_assert!(set.has_dense_ranks());
            for pair in set.entries.windows(2) {
                prop_assert!(pair[0].time_ms < pair[1].time_ms);
            }

            let mut names: Vec<String> = set.entries.iter().map(|e| e.name.clone()).collect();
            names.sort();
            let mut expected = roster.clone();
            expected.sort();
            prop_assert_eq!(names, expected);
        }
    }
}
