//! Shared directory integration tests.
//!
//! Tests the SubscriptionDirectory interface against all implementations.
//! Each implementation binary imports these test functions and runs them.

pub mod directory_tests;
