use certadmin::clock::ManualClock;
use certadmin::db::cache::QueryCache;
use certadmin::db::pool::{ConnectionPool, PoolConfig};
use certadmin::db::search::{EngineSettings, QueryEngine};
use certadmin::db::store::MemoryStore;
use certadmin::models::Resource;
use chrono::{DateTime, TimeZone, Utc};
use serde_json::json;
use std::sync::Arc;
use uuid::Uuid;

/// "Now" for listing tests: 2024-06-15 12:00 UTC.
pub fn test_now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 15, 12, 0, 0).unwrap()
}

pub fn raw(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

pub struct Seeded {
    pub rust_workshop: Uuid,
    pub cloud_summit: Uuid,
    pub rust_meetup: Uuid,
}

/// Three events (upcoming, ongoing and ended relative to [`test_now`]), four participants and
/// three activity log entries.
pub fn seed(store: &MemoryStore) -> Seeded {
    let rust_workshop = Uuid::new_v4();
    let cloud_summit = Uuid::new_v4();
    let rust_meetup = Uuid::new_v4();
    let admin = Uuid::new_v4();

    for event in [
        json!({"id": rust_workshop, "event_name": "Rust Workshop", "event_code": "RW-24",
               "description": "Hands-on ownership and borrowing", "date": "2024-06-20",
               "tag": "workshop", "created_by": admin, "created_at": "2024-05-01T08:00:00Z"}),
        json!({"id": cloud_summit, "event_name": "Cloud Summit", "event_code": "CS-24",
               "description": null, "date": "2024-06-15",
               "tag": "conference", "created_by": admin, "created_at": "2024-05-02T08:00:00Z"}),
        json!({"id": rust_meetup, "event_name": "Rust Meetup", "event_code": "RM-23",
               "description": "Monthly meetup", "date": "2024-03-10",
               "tag": "meetup", "created_by": null, "created_at": "2024-05-03T08:00:00Z"}),
    ] {
        store.insert(Resource::Events, event);
    }

    for participant in [
        json!({"id": Uuid::new_v4(), "event_id": rust_workshop, "name": "John Smith",
               "email": "john.s@example.com", "certificate_id": "CERT-100", "revoked": false,
               "created_at": "2024-06-01T10:00:00Z"}),
        json!({"id": Uuid::new_v4(), "event_id": rust_workshop, "name": "Johnny Appleseed",
               "email": "johnny@example.com", "certificate_id": null, "revoked": false,
               "created_at": "2024-06-02T09:00:00Z"}),
        json!({"id": Uuid::new_v4(), "event_id": cloud_summit, "name": "Jane Smith",
               "email": "jane@example.com", "certificate_id": "CERT-101", "revoked": true,
               "revoked_at": "2024-06-10T00:00:00Z", "created_at": "2024-06-03T00:00:00Z"}),
        json!({"id": Uuid::new_v4(), "event_id": cloud_summit, "name": "Bob Stone",
               "email": "john.smith@example.org", "certificate_id": "CERT-102", "revoked": false,
               "created_at": "2024-06-04T15:30:00Z"}),
    ] {
        store.insert(Resource::Participants, participant);
    }

    for log in [
        json!({"id": Uuid::new_v4(), "action": "participants.import", "user_id": admin,
               "user_email": "admin@example.com", "event_id": rust_workshop,
               "metadata": {"source": "csv-upload", "rows": 2},
               "created_at": "2024-06-01T09:00:00Z"}),
        json!({"id": Uuid::new_v4(), "action": "certificate.revoke", "user_id": admin,
               "user_email": "admin@example.com", "event_id": cloud_summit,
               "metadata": {"reason": "duplicate"}, "created_at": "2024-06-10T00:00:00Z"}),
        json!({"id": Uuid::new_v4(), "action": "event.create", "user_id": null,
               "user_email": "ops@example.com", "event_id": rust_meetup,
               "metadata": {}, "created_at": "2024-05-03T08:00:00Z"}),
    ] {
        store.insert(Resource::Logs, log);
    }

    Seeded {
        rust_workshop,
        cloud_summit,
        rust_meetup,
    }
}

pub struct TestEngine {
    pub engine: QueryEngine<MemoryStore>,
    pub store: MemoryStore,
    pub clock: Arc<ManualClock>,
    pub seeded: Seeded,
}

/// Engine over a seeded in-memory store with the clock pinned at [`test_now`].
pub fn test_engine() -> TestEngine {
    let store = MemoryStore::new();
    let seeded = seed(&store);
    let clock = Arc::new(ManualClock::new(test_now()));
    let pool = Arc::new(ConnectionPool::new(store.clone(), PoolConfig::default()));
    let cache = Arc::new(QueryCache::new(clock.clone()));
    let engine = QueryEngine::new(pool, cache, EngineSettings::default());
    TestEngine {
        engine,
        store,
        clock,
        seeded,
    }
}
