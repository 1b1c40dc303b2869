//! Listing resources and their column tables
//!
//! Each resource kind owns a fixed table describing which columns exist, how they are selected
//! in SQL, which of them may be sorted on, which are searched by free text, and which column each
//! structured filter applies to.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Resource {
    Participants,
    Events,
    Logs,
}

/// Value kind of a column, used to bind and compare filter values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    Uuid,
    Text,
    Bool,
    Timestamp,
    Date,
    Integer,
    Json,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnDef {
    /// Name exposed in rows, filters and sort keys.
    pub name: &'static str,
    /// SQL expression selecting the column from the resource's FROM clause.
    pub expr: &'static str,
    pub kind: ColumnKind,
}

/// Column each structured filter targets. `None` means the filter does not apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FilterColumns {
    pub tag: Option<&'static str>,
    pub created_by: Option<&'static str>,
    pub linked_id: Option<&'static str>,
    /// Boolean column backing the active/revoked status filter.
    pub revoked: Option<&'static str>,
    /// Date column the upcoming/ongoing/ended filter compares with today.
    pub event_date: Option<&'static str>,
    /// Column `date_from`/`date_to` bound.
    pub date_range: &'static str,
}

const fn col(name: &'static str, expr: &'static str, kind: ColumnKind) -> ColumnDef {
    ColumnDef { name, expr, kind }
}

const PARTICIPANT_COLUMNS: &[ColumnDef] = &[
    col("id", "p.id", ColumnKind::Uuid),
    col("event_id", "p.event_id", ColumnKind::Uuid),
    col("name", "p.name", ColumnKind::Text),
    col("email", "p.email", ColumnKind::Text),
    col("certificate_id", "p.certificate_id", ColumnKind::Text),
    col("revoked", "p.revoked", ColumnKind::Bool),
    col("revoked_at", "p.revoked_at", ColumnKind::Timestamp),
    col("created_at", "p.created_at", ColumnKind::Timestamp),
    col("event_name", "e.event_name", ColumnKind::Text),
    col("event_code", "e.event_code", ColumnKind::Text),
    col("event_date", "e.date", ColumnKind::Date),
    col("tag", "e.tag", ColumnKind::Text),
    col("created_by", "e.created_by", ColumnKind::Uuid),
];

const EVENT_COLUMNS: &[ColumnDef] = &[
    col("id", "ev.id", ColumnKind::Uuid),
    col("event_name", "ev.event_name", ColumnKind::Text),
    col("event_code", "ev.event_code", ColumnKind::Text),
    col("description", "ev.description", ColumnKind::Text),
    col("date", "ev.date", ColumnKind::Date),
    col("tag", "ev.tag", ColumnKind::Text),
    col("created_by", "ev.created_by", ColumnKind::Uuid),
    col("created_at", "ev.created_at", ColumnKind::Timestamp),
    col(
        "participant_count",
        "COALESCE(pc.participant_count, 0)",
        ColumnKind::Integer,
    ),
    col(
        "certificate_count",
        "COALESCE(pc.certificate_count, 0)",
        ColumnKind::Integer,
    ),
];

const LOG_COLUMNS: &[ColumnDef] = &[
    col("id", "l.id", ColumnKind::Uuid),
    col("action", "l.action", ColumnKind::Text),
    col("user_id", "l.user_id", ColumnKind::Uuid),
    col("user_email", "l.user_email", ColumnKind::Text),
    col("event_id", "l.event_id", ColumnKind::Uuid),
    col("participant_id", "l.participant_id", ColumnKind::Uuid),
    col("metadata", "l.metadata", ColumnKind::Json),
    col("created_at", "l.created_at", ColumnKind::Timestamp),
];

const PARTICIPANT_FROM: &str = "participants p LEFT JOIN events e ON e.id = p.event_id";

// Counts come from one grouped aggregate instead of a lookup per event row.
const EVENT_FROM: &str = "events ev \
    LEFT JOIN (\
        SELECT event_id, COUNT(*) AS participant_count, COUNT(certificate_id) AS certificate_count \
        FROM participants GROUP BY event_id\
    ) pc ON pc.event_id = ev.id";

const LOG_FROM: &str = "activity_logs l";

impl Resource {
    pub const ALL: [Resource; 3] = [Resource::Participants, Resource::Events, Resource::Logs];

    pub fn as_str(self) -> &'static str {
        match self {
            Resource::Participants => "participants",
            Resource::Events => "events",
            Resource::Logs => "logs",
        }
    }

    /// Fields accepted as `sort_by`.
    pub fn sortable_fields(self) -> &'static [&'static str] {
        match self {
            Resource::Participants => &[
                "name",
                "email",
                "certificate_id",
                "created_at",
                "revoked_at",
                "event_name",
                "event_code",
            ],
            Resource::Events => &[
                "event_name",
                "event_code",
                "date",
                "created_at",
                "participant_count",
                "certificate_count",
            ],
            Resource::Logs => &["action", "created_at", "user_email"],
        }
    }

    pub fn is_sortable(self, field: &str) -> bool {
        self.sortable_fields().contains(&field)
    }

    /// Creation-timestamp column used when no (or an unknown) sort field is given.
    pub fn default_sort_field(self) -> &'static str {
        "created_at"
    }

    /// Whitelisted sort column for `field`, falling back to the default.
    pub fn resolve_sort_field(self, field: &str) -> &'static str {
        self.sortable_fields()
            .iter()
            .copied()
            .find(|f| *f == field)
            .unwrap_or_else(|| self.default_sort_field())
    }

    /// Columns matched by free-text search tokens.
    pub fn search_fields(self) -> &'static [&'static str] {
        match self {
            Resource::Participants => &["name", "email", "certificate_id"],
            Resource::Events => &["event_name", "event_code", "description"],
            Resource::Logs => &["action", "user_email", "metadata"],
        }
    }

    pub fn columns(self) -> &'static [ColumnDef] {
        match self {
            Resource::Participants => PARTICIPANT_COLUMNS,
            Resource::Events => EVENT_COLUMNS,
            Resource::Logs => LOG_COLUMNS,
        }
    }

    pub fn column(self, name: &str) -> Option<&'static ColumnDef> {
        self.columns().iter().find(|c| c.name == name)
    }

    pub fn from_clause(self) -> &'static str {
        match self {
            Resource::Participants => PARTICIPANT_FROM,
            Resource::Events => EVENT_FROM,
            Resource::Logs => LOG_FROM,
        }
    }

    pub fn filter_columns(self) -> FilterColumns {
        match self {
            Resource::Participants => FilterColumns {
                tag: Some("tag"),
                created_by: Some("created_by"),
                linked_id: Some("event_id"),
                revoked: Some("revoked"),
                event_date: None,
                date_range: "created_at",
            },
            Resource::Events => FilterColumns {
                tag: Some("tag"),
                created_by: Some("created_by"),
                linked_id: Some("id"),
                revoked: None,
                event_date: Some("date"),
                date_range: "date",
            },
            Resource::Logs => FilterColumns {
                tag: None,
                created_by: Some("user_id"),
                linked_id: Some("event_id"),
                revoked: None,
                event_date: None,
                date_range: "created_at",
            },
        }
    }
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown resource '{0}' (expected participants, events or logs)")]
pub struct UnknownResource(pub String);

impl FromStr for Resource {
    type Err = UnknownResource;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "participants" => Ok(Resource::Participants),
            "events" => Ok(Resource::Events),
            "logs" => Ok(Resource::Logs),
            other => Err(UnknownResource(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_whitelisted_field_is_a_column() {
        for resource in Resource::ALL {
            for field in resource.sortable_fields() {
                assert!(
                    resource.column(field).is_some(),
                    "{resource}: sort field {field} has no column"
                );
            }
            for field in resource.search_fields() {
                assert!(resource.column(field).is_some());
            }
            assert!(resource.column(resource.default_sort_field()).is_some());
        }
    }

    #[test]
    fn filter_columns_exist() {
        for resource in Resource::ALL {
            let fc = resource.filter_columns();
            for name in [fc.tag, fc.created_by, fc.linked_id, fc.revoked, fc.event_date]
                .into_iter()
                .flatten()
                .chain([fc.date_range])
            {
                assert!(resource.column(name).is_some(), "{resource}: {name}");
            }
        }
    }

    #[test]
    fn unknown_sort_field_resolves_to_creation_timestamp() {
        assert_eq!(Resource::Events.resolve_sort_field("participant_count"), "participant_count");
        assert_eq!(Resource::Events.resolve_sort_field("password"), "created_at");
        assert_eq!(Resource::Logs.resolve_sort_field("name"), "created_at");
    }

    #[test]
    fn parses_resource_names() {
        assert_eq!("Events".parse::<Resource>(), Ok(Resource::Events));
        let err = "users".parse::<Resource>().unwrap_err();
        assert_eq!(err, UnknownResource("users".into()));
        assert_eq!(
            err.to_string(),
            "unknown resource 'users' (expected participants, events or logs)"
        );
    }
}
