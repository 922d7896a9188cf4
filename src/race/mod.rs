//! Race Module
//!
//! Registration, result simulation and result storage.
//!
//! ## Module Structure
//!
//! - `model`: Races, users, registrations, result sets
//! - `registry`: Per-race rosters with capacity and duplicate checks
//! - `users`: Login-by-email user directory
//! - `simulation`: Deterministic result generation and ranking
//! - `store`: At-most-once result persistence
//! - `service`: Orchestrator behind the client operations
//! - `catalogue`: Seeded race list
//! - `clock`: Time source for the temporal gates

pub mod catalogue;
pub mod clock;
pub mod error;
pub mod model;
pub mod registry;
pub mod service;
pub mod simulation;
pub mod store;
pub mod users;

// Re-export key types
pub use clock::{Clock, FixedClock, SystemClock};
pub use error::{ConflictKind, RaceError};
pub use model::{Race, RaceId, RaceSummary, Registration, ResultEntry, ResultSet, User, UserId};
pub use registry::ParticipantRegistry;
pub use service::{Profile, RaceService};
pub use simulation::{SimulationEngine, SimulationParams};
pub use store::{CreateOutcome, FileBackend, MemoryBackend, ResultBackend, ResultStore, StoreError};
pub use users::UserDirectory;
