//! Structured listing query
//!
//! A [`ListQuery`] is the store-neutral form of one listing request: an AND-list of conditions,
//! one sort column, and an offset/limit window. The Postgres client compiles it to SQL
//! ([`sql`]); the in-memory store evaluates it directly.

mod bind;
pub mod sql;

pub use bind::BindValue;

use crate::models::Resource;
use chrono::{DateTime, NaiveDate, Utc};

#[derive(Debug, Clone, PartialEq)]
pub struct ListQuery {
    pub resource: Resource,
    /// All conditions must hold.
    pub conditions: Vec<Condition>,
    pub order: OrderBy,
    pub offset: i64,
    pub limit: i64,
}

impl ListQuery {
    pub fn new(resource: Resource) -> Self {
        Self {
            resource,
            conditions: Vec::new(),
            order: OrderBy {
                column: resource.default_sort_field(),
                ascending: false,
            },
            offset: 0,
            limit: 12,
        }
    }

    pub fn with_condition(mut self, condition: Condition) -> Self {
        self.conditions.push(condition);
        self
    }

    pub fn order_by(mut self, column: &'static str, ascending: bool) -> Self {
        self.order = OrderBy { column, ascending };
        self
    }

    pub fn window(mut self, offset: i64, limit: i64) -> Self {
        self.offset = offset;
        self.limit = limit;
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    /// Case-insensitive substring match against at least one of `columns`.
    AnyContains {
        columns: Vec<&'static str>,
        needle: String,
    },
    Compare {
        column: &'static str,
        op: CompareOp,
        value: FilterValue,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    Lt,
    Lte,
    Gt,
    Gte,
}

impl CompareOp {
    pub fn as_sql(self) -> &'static str {
        match self {
            CompareOp::Eq => "=",
            CompareOp::Lt => "<",
            CompareOp::Lte => "<=",
            CompareOp::Gt => ">",
            CompareOp::Gte => ">=",
        }
    }

    pub fn holds(self, ordering: std::cmp::Ordering) -> bool {
        use std::cmp::Ordering::*;
        match self {
            CompareOp::Eq => ordering == Equal,
            CompareOp::Lt => ordering == Less,
            CompareOp::Lte => ordering != Greater,
            CompareOp::Gt => ordering == Greater,
            CompareOp::Gte => ordering != Less,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum FilterValue {
    Text(String),
    Bool(bool),
    Timestamp(DateTime<Utc>),
    Date(NaiveDate),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrderBy {
    pub column: &'static str,
    pub ascending: bool,
}
