//! Abstract interfaces for sse-fanout components.
//!
//! These traits define the contracts for:
//! - Subscription metadata storage (local or shared across processes)

pub mod directory;

pub use directory::{DirectoryError, Result, SubscriptionDirectory};
