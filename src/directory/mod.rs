//! Structure directory - the third-party sensor telemetry API.
//!
//! ```text
//! GET {base}/structures        -> [{ id, name }]   (or { "values": [...] })
//! GET {base}/structures/{id}   -> { sensors: [{ eui, online, userConfig: { name } }] }
//! ```
//!
//! Listings are returned together with a count of entries that were dropped
//! for missing fields, so the engine can report them without failing.

pub mod api;
pub mod payload;

use crate::error::Result;
use crate::model::{ObservedSensor, Structure};
use async_trait::async_trait;

pub use api::DirectoryClient;

/// Entries decoded from one directory listing.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Listing<T> {
    pub items: Vec<T>,
    /// Entries skipped because required fields were absent
    pub malformed: usize,
}

impl<T> Listing<T> {
    pub fn new(items: Vec<T>) -> Self {
        Self { items, malformed: 0 }
    }
}

impl<T> Default for Listing<T> {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

/// Source of monitored structures and their sensors.
///
/// # Errors
/// - `Error::DirectoryUnavailable` - transport failure or non-success status
/// - `Error::MalformedResponse` - the body is not the expected shape at all
#[async_trait]
pub trait StructureDirectory: Send + Sync {
    /// Lists every monitored structure.
    async fn list_structures(&self) -> Result<Listing<Structure>>;

    /// Lists the sensors of one structure with their current online flag.
    async fn list_sensors(&self, structure: &Structure) -> Result<Listing<ObservedSensor>>;
}
