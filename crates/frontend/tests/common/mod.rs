//! # Common Test Infrastructure


/// Scripted collaborators.
pub mod fakes;

/// Fetch harness.
pub mod harness;
