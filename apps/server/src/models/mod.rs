//! Domain models for the listing endpoints

pub mod listing;
pub mod resource;

pub use listing::{EventRow, EventStatus, ListingRow, LogRow, ParticipantRow, StatusFilter};
pub use resource::{ColumnDef, ColumnKind, FilterColumns, Resource, UnknownResource};
