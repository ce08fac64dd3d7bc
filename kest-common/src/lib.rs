//! Shared types for the KEST scenario testing engine.
//!
//! This crate holds the leaf vocabulary the engine and the reporter agree
//! on: the event model, error summaries, duration strings, cluster
//! contexts, manifest parsing, and name generation. It contains no engine
//! logic and no I/O.

pub mod context;
pub mod duration;
pub mod error;
pub mod events;
pub mod manifest;
pub mod naming;

pub use context::ClusterContext;
pub use duration::{DurationMs, InvalidDuration};
pub use error::ErrorSummary;
pub use events::{events_to_yaml, Event, RetryReason};
pub use manifest::{kubectl_type, Manifest, ManifestError, ManifestSource, ResourceRef};
pub use naming::{generated_name, random_suffix, NAMESPACE_PREFIX};
