//! Protocol Messages
//!
//! Wire format for client-server communication over WebSocket.
//! Every message is a JSON object tagged by `type`.
//!
//! Requests on one connection are answered in order, one response each.

use serde::{Serialize, Deserialize};

use crate::race::error::{ConflictKind, RaceError};
use crate::race::model::{RaceId, RaceSummary, Registration, ResultEntry, ResultSet, User, UserId};
use crate::race::service::Profile;
use crate::race::store::CreateOutcome;

// =============================================================================
// CLIENT -> SERVER MESSAGES
// =============================================================================

/// Messages sent from client to server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Log in by email; binds the returned user to the connection.
    Login(LoginRequest),

    /// Bind an existing user id to the connection.
    Identify(IdentifyRequest),

    /// Browse every race.
    ListRaces,

    /// One race with its participants.
    GetRace { race_id: RaceId },

    /// Stored results (empty if not simulated yet).
    GetResults { race_id: RaceId },

    /// Produce results for a finished race, or return the stored ones.
    Simulate { race_id: RaceId },

    /// Register the connection's user for a race.
    Register { race_id: RaceId },

    /// The connection's user and their registrations.
    Me,

    /// Ping for latency measurement.
    Ping { timestamp: u64 },
}

/// Login request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoginRequest {
    /// Login key.
    pub email: String,
    /// Full name (used as display name).
    #[serde(default)]
    pub full_name: String,
}

/// Identity request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentifyRequest {
    /// Opaque user identifier.
    pub user_id: UserId,
    /// JWT, required when the server has authentication configured.
    #[serde(default)]
    pub token: Option<String>,
}

// =============================================================================
// SERVER -> CLIENT MESSAGES
// =============================================================================

/// Messages sent from server to client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Identity accepted.
    Identified(IdentifyResult),

    /// Logged-in user.
    User(User),

    /// User profile.
    Profile(Profile),

    /// Race list.
    Races { races: Vec<RaceSummary> },

    /// Single race.
    Race(RaceSummary),

    /// Stored results.
    Results(ResultsView),

    /// Results after a simulate request.
    Simulated(SimulationView),

    /// Registration accepted.
    Registered(Registration),

    /// Pong response.
    Pong { timestamp: u64, server_time: u64 },

    /// Error message.
    Error(ServerError),

    /// Server is shutting down.
    Shutdown { reason: String },
}

/// Identity result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentifyResult {
    /// Bound user.
    pub user_id: UserId,
    /// Server version.
    pub server_version: String,
}

/// One finisher as sent to clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultEntryView {
    /// Dense 1-based rank.
    pub rank: u32,
    /// Participant display name.
    pub name: String,
    /// Elapsed time in milliseconds.
    pub time_ms: u64,
    /// Elapsed time in seconds.
    pub time_seconds: f64,
}

impl From<&ResultEntry> for ResultEntryView {
    fn from(entry: &ResultEntry) -> Self {
        Self {
            rank: entry.rank,
            name: entry.name.clone(),
            time_ms: entry.time_ms,
            time_seconds: entry.time_seconds(),
        }
    }
}

/// Results for one race.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultsView {
    /// Race identifier.
    pub race_id: RaceId,
    /// Entries in rank order; empty if not simulated yet.
    pub entries: Vec<ResultEntryView>,
}

impl From<&ResultSet> for ResultsView {
    fn from(set: &ResultSet) -> Self {
        Self {
            race_id: set.race_id,
            entries: set.entries.iter().map(ResultEntryView::from).collect(),
        }
    }
}

/// Outcome of a simulate request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationView {
    /// Race identifier.
    pub race_id: RaceId,
    /// Whether this request produced the results.
    pub created: bool,
    /// Entries in rank order.
    pub entries: Vec<ResultEntryView>,
}

impl From<&CreateOutcome> for SimulationView {
    fn from(outcome: &CreateOutcome) -> Self {
        Self {
            race_id: outcome.results.race_id,
            created: outcome.was_created,
            entries: outcome.results.entries.iter().map(ResultEntryView::from).collect(),
        }
    }
}

/// Server error message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerError {
    /// Error code.
    pub code: ErrorCode,
    /// Human-readable message.
    pub message: String,
}

impl ServerError {
    /// Build an error message.
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl From<&RaceError> for ServerError {
    fn from(err: &RaceError) -> Self {
        let code = match err {
            RaceError::RaceNotFound(_) | RaceError::UserNotFound(_) => ErrorCode::NotFound,
            RaceError::Conflict(ConflictKind::DuplicateRace) => ErrorCode::InternalError,
            RaceError::Conflict(_) => ErrorCode::Conflict,
            RaceError::RegistrationClosed(_) => ErrorCode::RegistrationClosed,
            RaceError::RaceNotFinished(_) => ErrorCode::RaceNotFinished,
            RaceError::EmptyParticipants(_) => ErrorCode::EmptyParticipants,
            RaceError::InvalidInput(_) => ErrorCode::InvalidInput,
            RaceError::Unavailable(_) => ErrorCode::Unavailable,
        };
        Self::new(code, err.to_string())
    }
}

/// Error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    /// Identity rejected.
    AuthFailed,
    /// Operation needs an identity first.
    NotAuthenticated,
    /// Malformed message or field.
    InvalidInput,
    /// Race or user not found.
    NotFound,
    /// Duplicate registration or race full.
    Conflict,
    /// Race date has passed.
    RegistrationClosed,
    /// Race has not taken place yet.
    RaceNotFinished,
    /// No participants to simulate.
    EmptyParticipants,
    /// Storage temporarily unavailable; retry.
    Unavailable,
    /// Internal error.
    InternalError,
}

// =============================================================================
// SERIALIZATION HELPERS
// =============================================================================

impl ClientMessage {
    /// Serialize to JSON string.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Deserialize from JSON string.
    pub fn from_json(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }
}

impl ServerMessage {
    /// Serialize to JSON string.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Deserialize from JSON string.
    pub fn from_json(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }

    /// Shorthand for an error response.
    pub fn error(code: ErrorCode, message: impl Into<String>) -> Self {
        ServerMessage::Error(ServerError::new(code, message))
    }
}
