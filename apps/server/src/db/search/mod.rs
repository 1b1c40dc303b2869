//! Listing search: request parsing, validation, predicate building and execution

pub mod engine;
pub mod envelope;
pub mod escape;
pub mod params;
pub mod parser;

pub use engine::{EngineSettings, QueryEngine};
pub use envelope::{PaginationInfo, ResultEnvelope, ResultMeta};
pub use escape::sanitize_search;
pub use params::{FilterSpec, PaginationSpec, SortDirection, SortSpec};
pub use parser::{ParsedRequest, RequestParser};
