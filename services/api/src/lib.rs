//! Relay API Library Crate
//!
//! This library contains the HTTP side of the command gateway: configuration,
//! application state, the background batch executor, API handlers and
//! routing. The `api` binary is a thin wrapper around this library.

pub mod config;
pub mod executor;
pub mod handlers;
pub mod models;
pub mod router;
pub mod state;
