//! # Race Results Server
//!
//! Backend for a race-registration platform: users register for upcoming
//! races, and once a race has taken place a reproducible result set is
//! simulated and stored exactly once.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    RACE RESULTS SERVER                       │
//! ├─────────────────────────────────────────────────────────────┤
//! │  core/           - Deterministic primitives                  │
//! │  ├── rng.rs      - Seeded Xorshift128+ PRNG                  │
//! │  └── hash.rs     - Result set digests                        │
//! │                                                              │
//! │  race/           - Domain                                    │
//! │  ├── model.rs    - Races, users, result sets                 │
//! │  ├── registry.rs - Rosters, capacity, duplicates             │
//! │  ├── users.rs    - Login-by-email directory                  │
//! │  ├── simulation.rs - Time generation and ranking             │
//! │  ├── store.rs    - At-most-once result persistence           │
//! │  ├── service.rs  - Operations and temporal gates             │
//! │  ├── catalogue.rs- Race list loading, demo data              │
//! │  └── clock.rs    - Time source                               │
//! │                                                              │
//! │  network/        - WebSocket front end                       │
//! │  ├── server.rs   - Connections and request routing           │
//! │  ├── protocol.rs - Message types                             │
//! │  └── auth.rs     - Identity verification                     │
//! │                                                              │
//! │  config.rs       - Environment configuration                 │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Result Guarantees
//!
//! - A race has at most one committed result set, ever.
//! - Concurrent `simulate` calls for one race all return that same set.
//! - Simulating the same race with the same roster yields the same
//!   times: all randomness comes from a PRNG seeded by the race id.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod config;
pub mod core;
pub mod network;
pub mod race;

// Re-export commonly used types
pub use core::rng::DeterministicRng;
pub use race::{RaceError, RaceId, RaceService, ResultSet, ResultStore, UserId};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
