//! Seams to the external collaborators.

pub mod embedder;
pub mod provider;
pub mod records;
pub mod tool;

pub use embedder::Embedder;
pub use provider::Provider;
pub use records::{AppendLog, Calendar, CalendarEvent};
pub use tool::Tool;
