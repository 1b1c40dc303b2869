//! Rows returned by the admin listing endpoints

use chrono::{DateTime, NaiveDate, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use uuid::Uuid;

use super::Resource;

/// A row type the query engine can list.
pub trait ListingRow: DeserializeOwned + Serialize + Send + Sync + 'static {
    const RESOURCE: Resource;

    /// Fill fields derived at read time rather than stored.
    fn compute_derived(&mut self, _today: NaiveDate) {}
}

/// Certificate status filter for participants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatusFilter {
    All,
    Active,
    Revoked,
}

impl StatusFilter {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "all" => Some(Self::All),
            "active" => Some(Self::Active),
            "revoked" => Some(Self::Revoked),
            _ => None,
        }
    }
}

/// Where an event sits relative to today.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventStatus {
    Upcoming,
    Ongoing,
    Ended,
}

impl EventStatus {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "upcoming" => Some(Self::Upcoming),
            "ongoing" => Some(Self::Ongoing),
            "ended" => Some(Self::Ended),
            _ => None,
        }
    }

    /// Upcoming if the event is after today, ongoing on the day itself, ended otherwise.
    pub fn for_date(event_date: NaiveDate, today: NaiveDate) -> Self {
        if event_date > today {
            Self::Upcoming
        } else if event_date == today {
            Self::Ongoing
        } else {
            Self::Ended
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParticipantRow {
    pub id: Uuid,
    pub event_id: Option<Uuid>,
    pub name: String,
    pub email: Option<String>,
    pub certificate_id: Option<String>,
    #[serde(default)]
    pub revoked: bool,
    pub revoked_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub event_name: Option<String>,
    pub event_code: Option<String>,
    pub event_date: Option<NaiveDate>,
    pub tag: Option<String>,
    pub created_by: Option<Uuid>,
}

impl ListingRow for ParticipantRow {
    const RESOURCE: Resource = Resource::Participants;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventRow {
    pub id: Uuid,
    pub event_name: String,
    pub event_code: Option<String>,
    pub description: Option<String>,
    pub date: NaiveDate,
    pub tag: Option<String>,
    pub created_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub participant_count: i64,
    #[serde(default)]
    pub certificate_count: i64,
    /// Derived from `date`; never stored.
    #[serde(default)]
    pub status: Option<EventStatus>,
}

impl ListingRow for EventRow {
    const RESOURCE: Resource = Resource::Events;

    fn compute_derived(&mut self, today: NaiveDate) {
        self.status = Some(EventStatus::for_date(self.date, today));
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogRow {
    pub id: Uuid,
    pub action: String,
    pub user_id: Option<Uuid>,
    pub user_email: Option<String>,
    pub event_id: Option<Uuid>,
    pub participant_id: Option<Uuid>,
    #[serde(default)]
    pub metadata: JsonValue,
    pub created_at: DateTime<Utc>,
}

impl ListingRow for LogRow {
    const RESOURCE: Resource = Resource::Logs;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn event_status_relative_to_today() {
        let today = day(2024, 6, 15);
        assert_eq!(EventStatus::for_date(day(2024, 6, 16), today), EventStatus::Upcoming);
        assert_eq!(EventStatus::for_date(day(2024, 6, 15), today), EventStatus::Ongoing);
        assert_eq!(EventStatus::for_date(day(2024, 6, 14), today), EventStatus::Ended);
    }

    #[test]
    fn event_row_decodes_store_json_and_derives_status() {
        let mut row: EventRow = serde_json::from_value(json!({
            "id": "6f1c8a52-4f55-4a8e-9d0e-3f1f3c1c9a11",
            "event_name": "Rust Workshop",
            "event_code": "RW-24",
            "description": null,
            "date": "2024-07-01",
            "tag": "workshop",
            "created_by": null,
            "created_at": "2024-05-01T09:30:00.123456+00:00",
            "participant_count": 42,
            "certificate_count": 40
        }))
        .expect("decodes");

        assert_eq!(row.status, None);
        row.compute_derived(day(2024, 7, 1));
        assert_eq!(row.status, Some(EventStatus::Ongoing));
        assert_eq!(row.participant_count, 42);
    }

    #[test]
    fn enum_filters_only_accept_exact_values() {
        assert_eq!(StatusFilter::parse("revoked"), Some(StatusFilter::Revoked));
        assert_eq!(StatusFilter::parse("Revoked"), None);
        assert_eq!(EventStatus::parse("ended"), Some(EventStatus::Ended));
        assert_eq!(EventStatus::parse("past"), None);
    }
}
