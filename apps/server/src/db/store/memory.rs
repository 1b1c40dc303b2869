//! In-process store
//!
//! Holds participants, events and activity logs as JSON objects and evaluates [`ListQuery`]s the
//! way the SQL compiler's output behaves on Postgres: participants carry their event's name,
//! code, date, tag and creator; events carry participant and certificate counts; NULLs never
//! match a condition and sort last in either direction.

use super::{Connector, StoreClient, StorePage};
use crate::db::query::{Condition, FilterValue, ListQuery};
use crate::error::StoreError;
use crate::models::{ColumnDef, ColumnKind, Resource};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use parking_lot::{Mutex, RwLock};
use serde_json::{Map, Value as JsonValue};
use std::cmp::Ordering;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering as AtomicOrdering};
use std::sync::Arc;

#[derive(Debug, Default)]
struct Tables {
    participants: Vec<JsonValue>,
    events: Vec<JsonValue>,
    logs: Vec<JsonValue>,
}

impl Tables {
    fn table_mut(&mut self, resource: Resource) -> &mut Vec<JsonValue> {
        match resource {
            Resource::Participants => &mut self.participants,
            Resource::Events => &mut self.events,
            Resource::Logs => &mut self.logs,
        }
    }
}

/// Shared in-memory tables. Clones see the same data.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    tables: Arc<RwLock<Tables>>,
    failures: Arc<Mutex<VecDeque<StoreError>>>,
    fetches: Arc<AtomicUsize>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a stored row. For participants and events, `row` holds only the base table's
    /// columns; joined and aggregated columns are computed at query time.
    pub fn insert(&self, resource: Resource, row: JsonValue) {
        self.tables.write().table_mut(resource).push(row);
    }

    pub fn len(&self, resource: Resource) -> usize {
        let tables = self.tables.read();
        match resource {
            Resource::Participants => tables.participants.len(),
            Resource::Events => tables.events.len(),
            Resource::Logs => tables.logs.len(),
        }
    }

    /// Make the next `fetch_page` calls fail with `errors`, in order.
    pub fn fail_next(&self, errors: impl IntoIterator<Item = StoreError>) {
        self.failures.lock().extend(errors);
    }

    /// Number of `fetch_page` calls that reached the store, failed ones included.
    pub fn fetch_count(&self) -> usize {
        self.fetches.load(AtomicOrdering::SeqCst)
    }

    fn fetch(&self, query: &ListQuery) -> Result<StorePage, StoreError> {
        self.fetches.fetch_add(1, AtomicOrdering::SeqCst);
        if let Some(err) = self.failures.lock().pop_front() {
            return Err(err);
        }

        let resource = query.resource;
        let mut rows: Vec<JsonValue> = self
            .materialize(resource)
            .into_iter()
            .filter(|row| {
                query
                    .conditions
                    .iter()
                    .all(|c| matches_condition(resource, row, c))
            })
            .collect();

        sort_rows(resource, &mut rows, query.order.column, query.order.ascending);

        let total = rows.len() as i64;
        let offset = query.offset.max(0) as usize;
        let limit = query.limit.max(0) as usize;
        let rows = rows.into_iter().skip(offset).take(limit).collect();

        Ok(StorePage { rows, total })
    }

    fn materialize(&self, resource: Resource) -> Vec<JsonValue> {
        let tables = self.tables.read();
        match resource {
            Resource::Participants => {
                let events: HashMap<&str, &JsonValue> = tables
                    .events
                    .iter()
                    .filter_map(|e| Some((e.get("id")?.as_str()?, e)))
                    .collect();
                tables
                    .participants
                    .iter()
                    .map(|p| {
                        let event = p
                            .get("event_id")
                            .and_then(JsonValue::as_str)
                            .and_then(|id| events.get(id).copied());
                        let mut row = project(resource, p);
                        if let (Some(event), JsonValue::Object(map)) = (event, &mut row) {
                            for (out, src) in [
                                ("event_name", "event_name"),
                                ("event_code", "event_code"),
                                ("event_date", "date"),
                                ("tag", "tag"),
                                ("created_by", "created_by"),
                            ] {
                                map.insert(out.to_string(), field(event, src));
                            }
                        }
                        row
                    })
                    .collect()
            }
            Resource::Events => {
                let mut counts: HashMap<&str, (i64, i64)> = HashMap::new();
                for p in &tables.participants {
                    if let Some(event_id) = p.get("event_id").and_then(JsonValue::as_str) {
                        let entry = counts.entry(event_id).or_default();
                        entry.0 += 1;
                        if !field(p, "certificate_id").is_null() {
                            entry.1 += 1;
                        }
                    }
                }
                tables
                    .events
                    .iter()
                    .map(|e| {
                        let (participants, certificates) = e
                            .get("id")
                            .and_then(JsonValue::as_str)
                            .and_then(|id| counts.get(id).copied())
                            .unwrap_or_default();
                        let mut row = project(resource, e);
                        if let JsonValue::Object(map) = &mut row {
                            map.insert("participant_count".into(), participants.into());
                            map.insert("certificate_count".into(), certificates.into());
                        }
                        row
                    })
                    .collect()
            }
            Resource::Logs => tables.logs.iter().map(|l| project(resource, l)).collect(),
        }
    }
}

/// Copy every column of `resource` from `source`, defaulting absent ones to null.
fn project(resource: Resource, source: &JsonValue) -> JsonValue {
    let mut map = Map::new();
    for col in resource.columns() {
        let value = match (col.kind, field(source, col.name)) {
            (ColumnKind::Bool, JsonValue::Null) if col.name == "revoked" => JsonValue::Bool(false),
            (_, v) => v,
        };
        map.insert(col.name.to_string(), value);
    }
    JsonValue::Object(map)
}

fn field(row: &JsonValue, name: &str) -> JsonValue {
    row.get(name).cloned().unwrap_or(JsonValue::Null)
}

fn text_form(value: &JsonValue) -> Option<String> {
    match value {
        JsonValue::Null => None,
        JsonValue::String(s) => Some(s.clone()),
        other => {
            let mut out = String::new();
            write_jsonb_text(other, &mut out);
            Some(out)
        }
    }
}

/// Render the way Postgres prints `jsonb::text`: `", "` and `": "` separators, object keys
/// ordered by length and then bytewise.
fn write_jsonb_text(value: &JsonValue, out: &mut String) {
    match value {
        JsonValue::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push_str(", ");
                }
                write_jsonb_text(item, out);
            }
            out.push(']');
        }
        JsonValue::Object(map) => {
            let mut entries: Vec<_> = map.iter().collect();
            entries.sort_by(|(a, _), (b, _)| a.len().cmp(&b.len()).then_with(|| a.cmp(b)));
            out.push('{');
            for (i, (key, item)) in entries.into_iter().enumerate() {
                if i > 0 {
                    out.push_str(", ");
                }
                out.push_str(&JsonValue::String(key.clone()).to_string());
                out.push_str(": ");
                write_jsonb_text(item, out);
            }
            out.push('}');
        }
        scalar => out.push_str(&scalar.to_string()),
    }
}

fn as_timestamp(value: &JsonValue) -> Option<DateTime<Utc>> {
    let s = value.as_str()?;
    DateTime::parse_from_rfc3339(s)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

fn as_date(value: &JsonValue) -> Option<NaiveDate> {
    let s = value.as_str()?;
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .or_else(|| as_timestamp(value).map(|dt| dt.date_naive()))
}

fn matches_condition(resource: Resource, row: &JsonValue, condition: &Condition) -> bool {
    match condition {
        Condition::AnyContains { columns, needle } => {
            let needle = needle.to_lowercase();
            columns
                .iter()
                .filter(|c| resource.column(c).is_some())
                .filter_map(|c| text_form(&field(row, c)))
                .any(|text| text.to_lowercase().contains(&needle))
        }
        Condition::Compare { column, op, value } => {
            if resource.column(column).is_none() {
                return false;
            }
            let cell = field(row, column);
            let ordering = match value {
                FilterValue::Text(v) => text_form(&cell).map(|t| t.as_str().cmp(v.as_str())),
                FilterValue::Bool(v) => cell.as_bool().map(|b| b.cmp(v)),
                FilterValue::Timestamp(v) => as_timestamp(&cell).map(|t| t.cmp(v)),
                FilterValue::Date(v) => as_date(&cell).map(|d| d.cmp(v)),
            };
            ordering.is_some_and(|o| op.holds(o))
        }
    }
}

fn compare_cells(col: &ColumnDef, a: &JsonValue, b: &JsonValue) -> Ordering {
    match col.kind {
        ColumnKind::Integer => a.as_i64().cmp(&b.as_i64()),
        ColumnKind::Bool => a.as_bool().cmp(&b.as_bool()),
        ColumnKind::Timestamp => as_timestamp(a).cmp(&as_timestamp(b)),
        ColumnKind::Date => as_date(a).cmp(&as_date(b)),
        ColumnKind::Uuid | ColumnKind::Text | ColumnKind::Json => text_form(a).cmp(&text_form(b)),
    }
}

fn sort_rows(resource: Resource, rows: &mut [JsonValue], column: &str, ascending: bool) {
    let Some(col) = resource
        .column(column)
        .or_else(|| resource.column(resource.default_sort_field()))
    else {
        return;
    };
    let id = resource.column("id");

    rows.sort_by(|a, b| {
        let (va, vb) = (field(a, col.name), field(b, col.name));
        let primary = match (va.is_null(), vb.is_null()) {
            (true, true) => Ordering::Equal,
            (true, false) => return Ordering::Greater,
            (false, true) => return Ordering::Less,
            (false, false) => compare_cells(col, &va, &vb),
        };
        let ordering = primary.then_with(|| match id {
            Some(id) => compare_cells(id, &field(a, "id"), &field(b, "id")),
            None => Ordering::Equal,
        });
        if ascending {
            ordering
        } else {
            ordering.reverse()
        }
    });
}

/// Handle onto a [`MemoryStore`].
#[derive(Debug, Clone)]
pub struct MemoryClient {
    store: MemoryStore,
}

#[async_trait]
impl StoreClient for MemoryClient {
    async fn fetch_page(&mut self, query: &ListQuery) -> Result<StorePage, StoreError> {
        self.store.fetch(query)
    }
}

impl Connector for MemoryStore {
    type Client = MemoryClient;

    fn connect(&self) -> MemoryClient {
        MemoryClient {
            store: self.clone(),
        }
    }
}
