//! Property-based tests

pub mod calculations_proptest;
pub mod queue_proptest;
