//! Image explanation API server library.
//!
//! Exposes the building blocks (config, state, error handling, routes,
//! progress streaming, background tasks) so integration tests and the
//! binary entrypoint share them.

pub mod background;
pub mod config;
pub mod engine;
pub mod error;
pub mod handlers;
pub mod response;
pub mod router;
pub mod routes;
pub mod state;
