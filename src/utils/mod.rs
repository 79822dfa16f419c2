//! Process-level helpers.
//!
//! Stateless utilities shared by the facade and the directory backends.

pub mod bootstrap;
pub mod retry;
