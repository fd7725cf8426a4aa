//! Storage layer: processed-state map, matter registry, runtime status snapshot.
//!
//! Each store is one JSON document read and written wholesale; writes go to a
//! temporary file in the same directory and are renamed into place.

mod error;
mod json;
mod registry;
mod state;
mod status;

pub use error::StoreError;
pub use registry::MatterRegistry;
pub use state::{ProcessedState, ProcessedStateStore};
pub use status::StatusFile;

/// File names inside the data directory.
pub const PROCESSED_STATE_FILE: &str = "processed_state.json";
pub const MATTERS_FILE: &str = "matters.json";
pub const STATUS_FILE: &str = "status.json";
