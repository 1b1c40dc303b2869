//! Certificate admin data-access layer
//!
//! Shared by every admin listing endpoint (participants, events, activity logs):
//! - A bounded pool of backing-store handles with retry and back-off
//! - A short-lived result cache in front of pool-executed queries
//! - A query engine turning untrusted request parameters into validated, paginated listings

pub mod clock;
pub mod config;
pub mod db;
pub mod error;
pub mod logging;
pub mod models;

pub use config::Config;
pub use error::{Error, Result};
