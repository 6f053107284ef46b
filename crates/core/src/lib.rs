//! Relay Core
//!
//! The command gateway's domain logic: the command batch model, access to the
//! robot's actuators, the per-kind handlers and the in-order batch dispatcher.
//! The HTTP service in `services/api` is a thin layer on top of this crate.

pub mod actuator;
pub mod command;
pub mod dispatcher;
pub mod handlers;
