//! Race domain errors.

use thiserror::Error;

use super::model::{RaceId, UserId};

/// Why a registration conflicted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictKind {
    /// Every place is taken.
    RaceFull,
    /// The user already holds a place.
    AlreadyRegistered,
    /// A race with that id is already in the catalogue.
    DuplicateRace,
}

impl std::fmt::Display for ConflictKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let text = match self {
            ConflictKind::RaceFull => "race is full",
            ConflictKind::AlreadyRegistered => "already registered",
            ConflictKind::DuplicateRace => "race already exists",
        };
        f.write_str(text)
    }
}

/// Errors reported to callers of the race service.
///
/// All of these are recoverable. "Already simulated" is not an error:
/// simulating twice returns the stored result set.
#[derive(Debug, Clone, Error)]
pub enum RaceError {
    /// Race does not exist.
    #[error("race {0} not found")]
    RaceNotFound(RaceId),

    /// User does not exist.
    #[error("user {0} not found")]
    UserNotFound(UserId),

    /// Duplicate registration or capacity exceeded.
    #[error("conflict: {0}")]
    Conflict(ConflictKind),

    /// Race date has passed.
    #[error("registration closed for race {0}")]
    RegistrationClosed(RaceId),

    /// Results requested before the race took place.
    #[error("race {0} has not finished yet")]
    RaceNotFinished(RaceId),

    /// Nothing to simulate.
    #[error("no participants to simulate for race {0}")]
    EmptyParticipants(RaceId),

    /// Malformed request data.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Persistence failed; safe to retry.
    #[error("result store unavailable: {0}")]
    Unavailable(String),
}
