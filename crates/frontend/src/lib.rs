//! Decoupled instruction-supply front end for a cycle-level CPU simulator.
//!
//! This crate models the part of an out-of-order core that decides what to
//! fetch next, with the following:
//! 1. **BPU:** A multi-stage branch predictor that runs ahead of fetch through
//!    the fetch stream queue (FSQ) and the fetch target queue (FTQ), with
//!    override bubbles and exact speculative-history rollback.
//! 2. **Fetch:** A per-thread fetch state machine that walks FTQ targets,
//!    issues split two-line translation/cache requests and decodes the
//!    assembled window through an external decoder.
//! 3. **Configuration:** Serde-backed parameters with defaults and validation.
//! 4. **Statistics:** Plain counters for the predictor and the fetch stage.

/// Common types (addresses, identifiers, faults, errors).
pub mod common;
/// Front-end configuration (defaults, policies, hierarchical config structures).
pub mod config;
/// Decoupled branch prediction unit (queues, history, components, coordinator).
pub mod bpu;
/// Fetch engine (buffer, requests, status, collaborator ports, signals).
pub mod fetch;
/// Predictor and fetch statistics.
pub mod stats;

/// Root configuration type; use `FrontendConfig::default()` or `FrontendConfig::from_json`.
pub use crate::config::FrontendConfig;
/// The prediction unit; owned by `Fetch` or driven directly.
pub use crate::bpu::DecoupledBpu;
/// Fatal modeling error returned by every fallible operation.
pub use crate::common::FrontendError;
/// The fetch stage.
pub use crate::fetch::Fetch;
