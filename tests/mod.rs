//! Test suite for the dieselsync sync core
//!
//! Integration tests drive a real [`SyncEngine`] against a wiremock backend.

pub mod common;
pub mod property;
