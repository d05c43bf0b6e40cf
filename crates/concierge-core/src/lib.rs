//! # Concierge Core
//!
//! Shared vocabulary for the Concierge workspace: conversation and tool types,
//! the seams to external collaborators (completion, embedding, records, calendar),
//! configuration and the error taxonomy.

pub mod config;
pub mod error;
pub mod traits;
pub mod types;

pub use config::ConciergeConfig;
pub use error::{ConciergeError, Result};
