use super::{Resource, ResourceEvent, ResourceHeader, ResourceSummary};
use crate::clock::{epoch_plus_one_second, Clock};
use crate::db::ConnectionPool;
use crate::error::{CoreError, CoreResult};
use crate::periodic::{self, RESOURCE_CLAIM};
use chrono::{DateTime, TimeZone, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use serde_json::Value;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

pub struct NewResource {
    pub id: String,
    pub api_version: String,
    pub kind: String,
    pub application: String,
    pub metadata: Value,
    pub spec: Value,
}

pub struct StoreOutcome {
    pub uid: String,
    pub newly_created: bool,
}

pub struct ResourceRepository {
    pool: ConnectionPool,
    clock: Arc<dyn Clock>,
    uid_counter: AtomicU64,
}

fn millis_to_datetime(millis: i64) -> DateTime<Utc> {
    Utc.timestamp_millis_opt(millis).single().unwrap_or_else(Utc::now)
}

fn row_to_resource(row: &rusqlite::Row) -> rusqlite::Result<(String, String, String, String, String, String, String)> {
    Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?, row.get(4)?, row.get(5)?, row.get(6)?))
}

fn parse_resource(
    (uid, id, api_version, kind, application, metadata, spec): (String, String, String, String, String, String, String),
) -> CoreResult<Resource> {
    Ok(Resource {
        uid,
        id,
        api_version,
        kind,
        application,
        metadata: serde_json::from_str(&metadata)
            .map_err(|e| CoreError::TransientStoreError(format!("corrupt resource metadata: {e}")))?,
        spec: serde_json::from_str(&spec)
            .map_err(|e| CoreError::TransientStoreError(format!("corrupt resource spec: {e}")))?,
    })
}

impl ResourceRepository {
    pub fn new(pool: ConnectionPool, clock: Arc<dyn Clock>) -> Self {
        Self { pool, clock, uid_counter: AtomicU64::new(0) }
    }

    fn now_millis(&self) -> i64 {
        self.clock.now().timestamp_millis()
    }

    fn allocate_uid(&self) -> String {
        let counter = self.uid_counter.fetch_add(1, Ordering::Relaxed) % 1_000_000;
        format!("{:013}-{:06}", self.now_millis(), counter)
    }

    /// `store(resource)`: upsert by `id`. A fresh `uid` is allocated only
    /// on first insert; subsequent stores of the same `id` preserve it.
    /// The last-checked row is seeded to epoch+1s so a new resource is
    /// immediately due.
    pub fn store(&self, new: &NewResource) -> CoreResult<StoreOutcome> {
        let mut conn = self.pool.get()?;
        let tx = conn.transaction_with_behavior(rusqlite::TransactionBehavior::Immediate)?;

        let existing_uid: Option<String> = tx
            .prepare("SELECT uid FROM resource WHERE id = ?1")?
            .query_row(params![new.id], |row| row.get(0))
            .optional()?;

        let (uid, newly_created) = match existing_uid {
            Some(uid) => {
                tx.execute(
                    "UPDATE resource SET api_version = ?2, kind = ?3, application = ?4, metadata = ?5, spec = ?6
                     WHERE uid = ?1",
                    params![
                        uid,
                        new.api_version,
                        new.kind,
                        new.application,
                        new.metadata.to_string(),
                        new.spec.to_string(),
                    ],
                )?;
                (uid, false)
            }
            None => {
                let uid = self.allocate_uid();
                tx.execute(
                    "INSERT INTO resource (uid, id, api_version, kind, application, metadata, spec)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                    params![
                        uid,
                        new.id,
                        new.api_version,
                        new.kind,
                        new.application,
                        new.metadata.to_string(),
                        new.spec.to_string(),
                    ],
                )?;
                (uid, true)
            }
        };

        periodic::ensure_last_checked_row(&tx, &RESOURCE_CLAIM, &uid, epoch_plus_one_second().timestamp_millis())?;
        tx.commit()?;
        Ok(StoreOutcome { uid, newly_created })
    }

    fn select_by_id(conn: &Connection, id: &str) -> CoreResult<Option<Resource>> {
        conn.prepare("SELECT uid, id, api_version, kind, application, metadata, spec FROM resource WHERE id = ?1")?
            .query_row(params![id], row_to_resource)
            .optional()?
            .map(parse_resource)
            .transpose()
    }

    pub fn get(&self, id: &str) -> CoreResult<Resource> {
        let conn = self.pool.get()?;
        Self::select_by_id(&conn, id)?.ok_or_else(|| CoreError::NoSuchResourceId(id.to_string()))
    }

    pub fn get_resources_by_application(&self, app: &str) -> CoreResult<Vec<Resource>> {
        let conn = self.pool.get()?;
        let mut stmt = conn.prepare(
            "SELECT uid, id, api_version, kind, application, metadata, spec FROM resource WHERE application = ?1",
        )?;
        let rows = stmt.query_map(params![app], row_to_resource)?;
        rows.collect::<Result<Vec<_>, _>>()?.into_iter().map(parse_resource).collect()
    }

    pub fn get_resource_ids_by_application(&self, app: &str) -> CoreResult<Vec<String>> {
        let conn = self.pool.get()?;
        let mut stmt = conn.prepare("SELECT id FROM resource WHERE application = ?1")?;
        let ids = stmt.query_map(params![app], |row| row.get(0))?;
        ids.collect::<Result<Vec<_>, _>>().map_err(CoreError::from)
    }

    pub fn has_managed_resources(&self, app: &str) -> CoreResult<bool> {
        let conn = self.pool.get()?;
        let count: i64 =
            conn.query_row("SELECT COUNT(*) FROM resource WHERE application = ?1", params![app], |row| row.get(0))?;
        Ok(count > 0)
    }

    /// `getSummaryByApplication`: a minimal `{id, kind, status}` projection.
    /// `status` is read from a top-level `status` field on the resource's
    /// spec when present; the concrete resource-type collaborator that
    /// would compute a richer summary is outside this core (§6).
    pub fn get_summary_by_application(&self, app: &str) -> CoreResult<Vec<ResourceSummary>> {
        Ok(self
            .get_resources_by_application(app)?
            .into_iter()
            .map(|r| ResourceSummary {
                id: r.id,
                kind: r.kind,
                status: r.spec.get("status").cloned().unwrap_or(Value::Null),
            })
            .collect())
    }

    /// `delete(id)`: removes the resource, its events, and its last-check
    /// row.
    pub fn delete(&self, id: &str) -> CoreResult<()> {
        let mut conn = self.pool.get()?;
        let tx = conn.transaction_with_behavior(rusqlite::TransactionBehavior::Immediate)?;

        let uid: Option<String> =
            tx.prepare("SELECT uid FROM resource WHERE id = ?1")?.query_row(params![id], |row| row.get(0)).optional()?;
        let Some(uid) = uid else {
            return Err(CoreError::NoSuchResourceId(id.to_string()));
        };

        tx.execute("DELETE FROM resource_event WHERE resource_uid = ?1", params![uid])?;
        tx.execute("DELETE FROM resource_last_checked WHERE resource_uid = ?1", params![uid])?;
        tx.execute("DELETE FROM resource WHERE uid = ?1", params![uid])?;
        tx.commit()?;
        Ok(())
    }

    pub fn delete_by_application(&self, app: &str) -> CoreResult<usize> {
        let mut conn = self.pool.get()?;
        let tx = conn.transaction_with_behavior(rusqlite::TransactionBehavior::Immediate)?;

        let uids: Vec<String> = tx
            .prepare("SELECT uid FROM resource WHERE application = ?1")?
            .query_map(params![app], |row| row.get(0))?
            .collect::<Result<_, _>>()?;

        for uid in &uids {
            tx.execute("DELETE FROM resource_event WHERE resource_uid = ?1", params![uid])?;
            tx.execute("DELETE FROM resource_last_checked WHERE resource_uid = ?1", params![uid])?;
            tx.execute("DELETE FROM resource WHERE uid = ?1", params![uid])?;
        }

        tx.commit()?;
        Ok(uids.len())
    }

    /// `allResources`: streams lightweight headers to `visit`, single-pass.
    pub fn all_resources(&self, mut visit: impl FnMut(ResourceHeader) -> CoreResult<()>) -> CoreResult<()> {
        let conn = self.pool.get()?;
        let mut stmt = conn.prepare("SELECT id, api_version, kind FROM resource")?;
        let mut rows = stmt.query([])?;
        while let Some(row) = rows.next()? {
            visit(ResourceHeader { id: row.get(0)?, api_version: row.get(1)?, kind: row.get(2)? })?;
        }
        Ok(())
    }

    /// `eventHistory(id, limit)`: newest-first, up to `limit`. Fails
    /// `NoSuchResourceId` if the resource has no recorded events (unknown
    /// and no-history are conflated, per §4.4). Ties on `timestamp` break
    /// on insertion order (`rowid DESC`), since two events can share a
    /// millisecond under a coarse clock or rapid appends.
    pub fn event_history(&self, id: &str, limit: i64) -> CoreResult<Vec<ResourceEvent>> {
        if limit <= 0 {
            return Err(CoreError::InvalidArgument(format!("eventHistory limit must be positive, got {limit}")));
        }

        let conn = self.pool.get()?;
        let uid: Option<String> =
            conn.prepare("SELECT uid FROM resource WHERE id = ?1")?.query_row(params![id], |row| row.get(0)).optional()?;
        let Some(uid) = uid else {
            return Err(CoreError::NoSuchResourceId(id.to_string()));
        };

        let mut stmt = conn.prepare(
            "SELECT timestamp, kind, payload FROM resource_event
             WHERE resource_uid = ?1 ORDER BY timestamp DESC, rowid DESC LIMIT ?2",
        )?;
        let rows = stmt.query_map(params![uid, limit], |row| {
            Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?, row.get::<_, String>(2)?))
        })?;

        let mut events = Vec::new();
        for row in rows {
            let (timestamp, kind, payload) = row?;
            let payload: Value = serde_json::from_str(&payload)
                .map_err(|e| CoreError::TransientStoreError(format!("corrupt event payload: {e}")))?;
            events.push(ResourceEvent {
                resource_id: id.to_string(),
                timestamp: millis_to_datetime(timestamp),
                kind,
                payload,
                suppress_repeats: false,
            });
        }

        if events.is_empty() {
            return Err(CoreError::NoSuchResourceId(id.to_string()));
        }
        Ok(events)
    }

    /// `appendHistory(event)`: appends, dropping silently if `event`
    /// declares suppress-repeats and the most recent event for the
    /// resource shares its `kind`. The repeat check and the insert run in
    /// one transaction; under heavy write contention a duplicate may still
    /// slip through (documented best-effort, see DESIGN.md).
    pub fn append_history(&self, event: &ResourceEvent) -> CoreResult<()> {
        let mut conn = self.pool.get()?;
        let tx = conn.transaction_with_behavior(rusqlite::TransactionBehavior::Immediate)?;

        let uid: Option<String> = tx
            .prepare("SELECT uid FROM resource WHERE id = ?1")?
            .query_row(params![event.resource_id], |row| row.get(0))
            .optional()?;
        let Some(uid) = uid else {
            return Err(CoreError::NoSuchResourceId(event.resource_id.clone()));
        };

        if event.suppress_repeats {
            let last_kind: Option<String> = tx
                .prepare(
                    "SELECT kind FROM resource_event WHERE resource_uid = ?1 ORDER BY timestamp DESC, rowid DESC LIMIT 1",
                )?
                .query_row(params![uid], |row| row.get(0))
                .optional()?;
            if last_kind.as_deref() == Some(event.kind.as_str()) {
                tx.commit()?;
                return Ok(());
            }
        }

        tx.execute(
            "INSERT INTO resource_event (resource_uid, timestamp, kind, payload) VALUES (?1, ?2, ?3, ?4)",
            params![uid, event.timestamp.timestamp_millis(), event.kind, event.payload.to_string()],
        )?;
        tx.commit()?;
        Ok(())
    }

    /// The claim-for-check protocol: returns up to `limit` resource uids
    /// due for a check, advancing their last-checked timestamp
    /// atomically. See `periodic` for the shared mechanics.
    pub fn items_due_for_check(&self, min_since_last_millis: i64, limit: i64) -> CoreResult<Vec<String>> {
        let mut conn = self.pool.get()?;
        let tx = conn.transaction_with_behavior(rusqlite::TransactionBehavior::Immediate)?;
        let claimed = periodic::claim_due(&tx, &RESOURCE_CLAIM, self.now_millis(), min_since_last_millis, limit)?;
        tx.commit()?;
        Ok(claimed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use crate::db::migrations::migrate;
    use chrono::Utc;
    use serde_json::json;

    fn repo() -> (ResourceRepository, Arc<FixedClock>) {
        let manager = r2d2_sqlite::SqliteConnectionManager::memory();
        let pool = r2d2::Pool::builder().max_size(1).build(manager).unwrap();
        {
            let mut conn = pool.get().unwrap();
            migrate(&mut conn).unwrap();
        }
        let clock = Arc::new(FixedClock::new(Utc::now()));
        (ResourceRepository::new(pool, clock.clone()), clock)
    }

    fn sample() -> NewResource {
        NewResource {
            id: "r1".to_string(),
            api_version: "v1".to_string(),
            kind: "Widget".to_string(),
            application: "keeldemo".to_string(),
            metadata: json!({"name": "r1"}),
            spec: json!({"replicas": 3}),
        }
    }

    #[test]
    fn store_allocates_uid_once_and_preserves_it_on_update() {
        let (repo, _clock) = repo();
        let first = repo.store(&sample()).unwrap();
        assert!(first.newly_created);

        let mut updated = sample();
        updated.spec = json!({"replicas": 5});
        let second = repo.store(&updated).unwrap();
        assert!(!second.newly_created);
        assert_eq!(first.uid, second.uid);

        let fetched = repo.get("r1").unwrap();
        assert_eq!(fetched.spec, json!({"replicas": 5}));
    }

    #[test]
    fn get_unknown_resource_fails() {
        let (repo, _clock) = repo();
        let err = repo.get("ghost").unwrap_err();
        assert!(matches!(err, CoreError::NoSuchResourceId(_)));
    }

    #[test]
    fn delete_then_event_history_fails_not_found() {
        let (repo, _clock) = repo();
        repo.store(&sample()).unwrap();
        repo.delete("r1").unwrap();
        assert!(repo.get("r1").is_err());
        let err = repo.event_history("r1", 10).unwrap_err();
        assert!(matches!(err, CoreError::NoSuchResourceId(_)));
    }

    #[test]
    fn event_history_rejects_nonpositive_limit() {
        let (repo, _clock) = repo();
        repo.store(&sample()).unwrap();
        let err = repo.event_history("r1", 0).unwrap_err();
        assert!(matches!(err, CoreError::InvalidArgument(_)));
    }

    #[test]
    fn event_history_without_events_is_not_found() {
        let (repo, _clock) = repo();
        repo.store(&sample()).unwrap();
        let err = repo.event_history("r1", 10).unwrap_err();
        assert!(matches!(err, CoreError::NoSuchResourceId(_)));
    }

    #[test]
    fn append_history_suppresses_consecutive_repeats() {
        let (repo, clock) = repo();
        repo.store(&sample()).unwrap();

        let event = |kind: &str| ResourceEvent {
            resource_id: "r1".to_string(),
            timestamp: clock.now(),
            kind: kind.to_string(),
            payload: json!({}),
            suppress_repeats: true,
        };

        repo.append_history(&event("reconciled")).unwrap();
        repo.append_history(&event("reconciled")).unwrap();
        repo.append_history(&event("failed")).unwrap();

        let history = repo.event_history("r1", 10).unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].kind, "failed");
        assert_eq!(history[1].kind, "reconciled");
    }

    #[test]
    fn scenario_6_claim_and_reclaim_after_clock_advance() {
        let (repo, clock) = repo();
        repo.store(&sample()).unwrap();

        let one_hour = 3_600_000;
        let first = repo.items_due_for_check(one_hour, 10).unwrap();
        assert_eq!(first.len(), 1);
        let second = repo.items_due_for_check(one_hour, 10).unwrap();
        assert!(second.is_empty());

        clock.advance(chrono::Duration::hours(1) + chrono::Duration::seconds(1));
        let third = repo.items_due_for_check(one_hour, 10).unwrap();
        assert_eq!(third, first);
    }

    #[test]
    fn all_resources_streams_headers() {
        let (repo, _clock) = repo();
        repo.store(&sample()).unwrap();
        let mut seen = Vec::new();
        repo.all_resources(|header| {
            seen.push(header.id);
            Ok(())
        })
        .unwrap();
        assert_eq!(seen, vec!["r1".to_string()]);
    }
}
