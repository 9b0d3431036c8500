//! Sensorwatch - sensor online/offline reconciliation.
//!
//! Polls a sensor telemetry API, compares each sensor's online flag with the
//! last persisted status, stores the result, and fans changes out to push
//! notifications and a time-series database.
//!
//! ```text
//! StructureDirectory ─┐
//!                     ▼
//!            ReconciliationEngine ──► SensorStateStore
//!                     │
//!                     ├──► NotificationSink (transitions only)
//!                     └──► MetricsSink (every sensor, every pass)
//! ```

// Collaborator wiring for the binaries
pub mod bootstrap;

// Environment / TOML configuration
pub mod config;

// Morning digest over stored state
pub mod digest;

// Sensor telemetry API client
pub mod directory;

// Reconciliation pass and classification
pub mod engine;

pub mod error;

// Time-series sink
pub mod metrics;

// Core data model
pub mod model;

// Push notification sink
pub mod notify;

// Persisted sensor status
pub mod store;

pub use engine::{PassSummary, ReconciliationEngine, Transition};
pub use error::{Error, Result};
pub use model::{ObservedSensor, SensorStatusRecord, StoredStatus, Structure};
