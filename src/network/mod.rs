//! Network Layer
//!
//! WebSocket front end for the race service.
//! Owns per-connection identity; all race rules live in `race/`.

pub mod auth;
pub mod protocol;
pub mod server;

pub use auth::{AuthConfig, TokenClaims, AuthError, authorize, validate_token};
pub use protocol::{
    ClientMessage, ServerMessage, ServerError, ErrorCode, ResultsView, SimulationView,
};
pub use server::{RaceServer, ServerConfig, RaceServerError};
