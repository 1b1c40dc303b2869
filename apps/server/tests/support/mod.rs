#![allow(dead_code)]

pub mod connectors;
pub mod fixtures;

pub use connectors::*;
pub use fixtures::*;
