use super::{ConstraintState, DeliveryConfig, Environment};
use crate::artifact::ArtifactType;
use crate::clock::Clock;
use crate::db::ConnectionPool;
use crate::error::{CoreError, CoreResult};
use crate::periodic::{self, DELIVERY_CONFIG_CLAIM};
use chrono::{DateTime, TimeZone, Utc};
use rusqlite::{params, Connection, OptionalExtension, Transaction};
use std::collections::HashSet;
use std::sync::Arc;

pub struct DeliveryConfigRepository {
    pool: ConnectionPool,
    clock: Arc<dyn Clock>,
}

fn millis_to_datetime(millis: i64) -> DateTime<Utc> {
    Utc.timestamp_millis_opt(millis).single().unwrap_or_else(Utc::now)
}

impl DeliveryConfigRepository {
    pub fn new(pool: ConnectionPool, clock: Arc<dyn Clock>) -> Self {
        Self { pool, clock }
    }

    fn now_millis(&self) -> i64 {
        self.clock.now().timestamp_millis()
    }

    /// `store(config)`: upsert by name, reconciling environment and
    /// artifact membership. Detached environments/artifacts are removed
    /// from their join tables but promotion and constraint history for
    /// them is left in place (see DESIGN.md, Open Question 1).
    pub fn store(&self, config: &DeliveryConfig) -> CoreResult<()> {
        let mut conn = self.pool.get()?;
        let tx = conn.transaction_with_behavior(rusqlite::TransactionBehavior::Immediate)?;

        tx.execute(
            "INSERT INTO delivery_config (name, application) VALUES (?1, ?2)
             ON CONFLICT(name) DO UPDATE SET application = excluded.application",
            params![config.name, config.application],
        )?;

        self.reconcile_environments(&tx, config)?;
        self.reconcile_artifacts(&tx, config)?;

        periodic::ensure_last_checked_row(
            &tx,
            &DELIVERY_CONFIG_CLAIM,
            &config.name,
            crate::clock::epoch_plus_one_second().timestamp_millis(),
        )?;

        tx.commit()?;
        Ok(())
    }

    fn reconcile_environments(&self, tx: &Transaction, config: &DeliveryConfig) -> CoreResult<()> {
        let existing: HashSet<String> = tx
            .prepare("SELECT name FROM environment WHERE config_name = ?1")?
            .query_map(params![config.name], |row| row.get(0))?
            .collect::<Result<_, _>>()?;
        let desired: HashSet<String> = config.environments.iter().map(|e| e.name.clone()).collect();

        for removed in existing.difference(&desired) {
            tx.execute(
                "DELETE FROM environment WHERE config_name = ?1 AND name = ?2",
                params![config.name, removed],
            )?;
            tx.execute(
                "DELETE FROM environment_resource WHERE config_name = ?1 AND env_name = ?2",
                params![config.name, removed],
            )?;
            tx.execute(
                "DELETE FROM environment_artifact WHERE config_name = ?1 AND env_name = ?2",
                params![config.name, removed],
            )?;
        }

        for env in &config.environments {
            tx.execute(
                "INSERT INTO environment (config_name, name, constraints) VALUES (?1, ?2, ?3)
                 ON CONFLICT(config_name, name) DO UPDATE SET constraints = excluded.constraints",
                params![config.name, env.name, env.constraints.to_string()],
            )?;
            self.reconcile_resources(tx, config, env)?;
        }
        Ok(())
    }

    fn reconcile_resources(&self, tx: &Transaction, config: &DeliveryConfig, env: &Environment) -> CoreResult<()> {
        let existing: HashSet<String> = tx
            .prepare("SELECT resource_id FROM environment_resource WHERE config_name = ?1 AND env_name = ?2")?
            .query_map(params![config.name, env.name], |row| row.get(0))?
            .collect::<Result<_, _>>()?;
        let desired: HashSet<String> = env.resource_ids.iter().cloned().collect();

        for removed in existing.difference(&desired) {
            tx.execute(
                "DELETE FROM environment_resource WHERE config_name = ?1 AND env_name = ?2 AND resource_id = ?3",
                params![config.name, env.name, removed],
            )?;
        }
        for added in desired.difference(&existing) {
            tx.execute(
                "INSERT INTO environment_resource (config_name, env_name, resource_id) VALUES (?1, ?2, ?3)",
                params![config.name, env.name, added],
            )?;
        }
        Ok(())
    }

    fn reconcile_artifacts(&self, tx: &Transaction, config: &DeliveryConfig) -> CoreResult<()> {
        let existing: HashSet<(String, String)> = tx
            .prepare("SELECT artifact_name, artifact_type FROM delivery_config_artifact WHERE config_name = ?1")?
            .query_map(params![config.name], |row| Ok((row.get(0)?, row.get(1)?)))?
            .collect::<Result<_, _>>()?;
        let desired: HashSet<(String, String)> =
            config.artifacts.iter().map(|(n, t)| (n.clone(), t.as_str().to_string())).collect();

        for (name, type_str) in existing.difference(&desired) {
            tx.execute(
                "DELETE FROM delivery_config_artifact WHERE config_name = ?1 AND artifact_name = ?2 AND artifact_type = ?3",
                params![config.name, name, type_str],
            )?;
        }
        for (name, type_str) in desired.difference(&existing) {
            tx.execute(
                "INSERT INTO delivery_config_artifact (config_name, artifact_name, artifact_type) VALUES (?1, ?2, ?3)",
                params![config.name, name, type_str],
            )?;
        }

        // environment_artifact mirrors the full cross-product of this
        // config's environments and artifacts; versionsByEnvironment joins
        // through it per-environment.
        let env_names: Vec<String> = tx
            .prepare("SELECT name FROM environment WHERE config_name = ?1")?
            .query_map(params![config.name], |row| row.get(0))?
            .collect::<Result<_, _>>()?;

        tx.execute("DELETE FROM environment_artifact WHERE config_name = ?1", params![config.name])?;
        for env_name in &env_names {
            for (name, type_str) in &desired {
                tx.execute(
                    "INSERT INTO environment_artifact (config_name, env_name, artifact_name, artifact_type) VALUES (?1, ?2, ?3, ?4)",
                    params![config.name, env_name, name, type_str],
                )?;
            }
        }
        Ok(())
    }

    fn load_config(conn: &Connection, name: &str) -> CoreResult<Option<DeliveryConfig>> {
        let application: Option<String> = conn
            .prepare("SELECT application FROM delivery_config WHERE name = ?1")?
            .query_row(params![name], |row| row.get(0))
            .optional()?;
        let Some(application) = application else { return Ok(None) };

        let artifacts: Vec<(String, ArtifactType)> = conn
            .prepare("SELECT artifact_name, artifact_type FROM delivery_config_artifact WHERE config_name = ?1")?
            .query_map(params![name], |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)))?
            .collect::<Result<Vec<_>, _>>()?
            .into_iter()
            .filter_map(|(n, t)| ArtifactType::parse(&t).map(|t| (n, t)))
            .collect();

        let env_names: Vec<String> = conn
            .prepare("SELECT name FROM environment WHERE config_name = ?1")?
            .query_map(params![name], |row| row.get(0))?
            .collect::<Result<_, _>>()?;

        let mut environments = Vec::new();
        for env_name in env_names {
            let constraints_raw: String = conn
                .prepare("SELECT constraints FROM environment WHERE config_name = ?1 AND name = ?2")?
                .query_row(params![name, env_name], |row| row.get(0))?;
            let constraints = serde_json::from_str(&constraints_raw).unwrap_or(serde_json::Value::Null);
            let resource_ids: Vec<String> = conn
                .prepare("SELECT resource_id FROM environment_resource WHERE config_name = ?1 AND env_name = ?2")?
                .query_map(params![name, env_name], |row| row.get(0))?
                .collect::<Result<_, _>>()?;
            environments.push(Environment { name: env_name, constraints, resource_ids });
        }

        Ok(Some(DeliveryConfig { name: name.to_string(), application, artifacts, environments }))
    }

    pub fn get(&self, name: &str) -> CoreResult<DeliveryConfig> {
        let conn = self.pool.get()?;
        Self::load_config(&conn, name)?.ok_or_else(|| CoreError::NoSuchDeliveryConfigName(name.to_string()))
    }

    pub fn environment_for(&self, resource_id: &str) -> CoreResult<Option<String>> {
        let conn = self.pool.get()?;
        let env: Option<String> = conn
            .prepare("SELECT env_name FROM environment_resource WHERE resource_id = ?1")?
            .query_row(params![resource_id], |row| row.get(0))
            .optional()?;
        Ok(env)
    }

    pub fn delivery_config_for(&self, resource_id: &str) -> CoreResult<Option<String>> {
        let conn = self.pool.get()?;
        let config: Option<String> = conn
            .prepare("SELECT config_name FROM environment_resource WHERE resource_id = ?1")?
            .query_row(params![resource_id], |row| row.get(0))
            .optional()?;
        Ok(config)
    }

    pub fn get_by_application(&self, app: &str) -> CoreResult<Vec<DeliveryConfig>> {
        let conn = self.pool.get()?;
        let names: Vec<String> = conn
            .prepare("SELECT name FROM delivery_config WHERE application = ?1")?
            .query_map(params![app], |row| row.get(0))?
            .collect::<Result<_, _>>()?;
        names
            .into_iter()
            .map(|name| Self::load_config(&conn, &name).transpose())
            .flatten()
            .collect()
    }

    /// `deleteByApplication`: removes the configs and their environment
    /// bindings but leaves `resource` rows and promotion/constraint
    /// history untouched.
    pub fn delete_by_application(&self, app: &str) -> CoreResult<usize> {
        let mut conn = self.pool.get()?;
        let tx = conn.transaction_with_behavior(rusqlite::TransactionBehavior::Immediate)?;

        let names: Vec<String> = tx
            .prepare("SELECT name FROM delivery_config WHERE application = ?1")?
            .query_map(params![app], |row| row.get(0))?
            .collect::<Result<_, _>>()?;

        for name in &names {
            tx.execute("DELETE FROM environment_resource WHERE config_name = ?1", params![name])?;
            tx.execute("DELETE FROM environment_artifact WHERE config_name = ?1", params![name])?;
            tx.execute("DELETE FROM delivery_config_artifact WHERE config_name = ?1", params![name])?;
            tx.execute("DELETE FROM environment WHERE config_name = ?1", params![name])?;
            tx.execute("DELETE FROM delivery_config_last_checked WHERE config_name = ?1", params![name])?;
            tx.execute("DELETE FROM delivery_config WHERE name = ?1", params![name])?;
        }

        tx.commit()?;
        Ok(names.len())
    }

    /// `storeConstraintState`: latest write wins per `(config, env, version,
    /// type)`. Returns true if this call changed the stored state.
    pub fn store_constraint_state(&self, state: &ConstraintState) -> CoreResult<bool> {
        let mut conn = self.pool.get()?;
        let tx = conn.transaction_with_behavior(rusqlite::TransactionBehavior::Immediate)?;

        let existing: Option<(String, Option<String>, Option<i64>, Option<String>)> = tx
            .prepare(
                "SELECT status, judged_by, judged_at, comment FROM constraint_state
                 WHERE config_name = ?1 AND env_name = ?2 AND version = ?3 AND type = ?4",
            )?
            .query_row(
                params![state.config_name, state.env_name, state.version, state.constraint_type],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)),
            )
            .optional()?;

        let judged_at_millis = state.judged_at.map(|t| t.timestamp_millis());
        let new_tuple = (state.status.clone(), state.judged_by.clone(), judged_at_millis, state.comment.clone());
        if existing.as_ref() == Some(&new_tuple) {
            tx.commit()?;
            return Ok(false);
        }

        tx.execute(
            "INSERT INTO constraint_state
                (config_name, env_name, version, type, status, judged_by, judged_at, comment, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
             ON CONFLICT(config_name, env_name, version, type) DO UPDATE SET
                status = excluded.status,
                judged_by = excluded.judged_by,
                judged_at = excluded.judged_at,
                comment = excluded.comment,
                updated_at = excluded.updated_at",
            params![
                state.config_name,
                state.env_name,
                state.version,
                state.constraint_type,
                state.status,
                state.judged_by,
                judged_at_millis,
                state.comment,
                self.now_millis(),
            ],
        )?;
        tx.commit()?;
        Ok(true)
    }

    fn row_to_constraint_state(
        config_name: String,
        env_name: String,
        version: String,
        constraint_type: String,
        status: String,
        judged_by: Option<String>,
        judged_at: Option<i64>,
        comment: Option<String>,
    ) -> ConstraintState {
        ConstraintState {
            config_name,
            env_name,
            version,
            constraint_type,
            status,
            judged_by,
            judged_at: judged_at.map(millis_to_datetime),
            comment,
        }
    }

    pub fn get_constraint_state(
        &self,
        config: &str,
        env: &str,
        version: &str,
        constraint_type: &str,
    ) -> CoreResult<Option<ConstraintState>> {
        let conn = self.pool.get()?;
        conn.prepare(
            "SELECT config_name, env_name, version, type, status, judged_by, judged_at, comment
             FROM constraint_state WHERE config_name = ?1 AND env_name = ?2 AND version = ?3 AND type = ?4",
        )?
        .query_row(params![config, env, version, constraint_type], |row| {
            Ok(Self::row_to_constraint_state(
                row.get(0)?,
                row.get(1)?,
                row.get(2)?,
                row.get(3)?,
                row.get(4)?,
                row.get(5)?,
                row.get(6)?,
                row.get(7)?,
            ))
        })
        .optional()
        .map_err(CoreError::from)
    }

    /// For each `(config, env, type)` belonging to `app`, the single most
    /// recent state across all versions.
    pub fn constraint_state_for_application(&self, app: &str) -> CoreResult<Vec<ConstraintState>> {
        let conn = self.pool.get()?;
        let mut stmt = conn.prepare(
            "SELECT cs.config_name, cs.env_name, cs.version, cs.type, cs.status, cs.judged_by, cs.judged_at, cs.comment
             FROM constraint_state cs
             JOIN delivery_config dc ON dc.name = cs.config_name
             WHERE dc.application = ?1
             ORDER BY cs.updated_at DESC",
        )?;
        let rows = stmt.query_map(params![app], |row| {
            Ok(Self::row_to_constraint_state(
                row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?, row.get(4)?, row.get(5)?, row.get(6)?, row.get(7)?,
            ))
        })?;

        let mut seen = HashSet::new();
        let mut out = Vec::new();
        for row in rows {
            let state = row?;
            let key = (state.config_name.clone(), state.env_name.clone(), state.constraint_type.clone());
            if seen.insert(key) {
                out.push(state);
            }
        }
        Ok(out)
    }

    /// Most recent `limit` states across all types in `(config, env)`,
    /// newest first.
    pub fn constraint_state_for_environment(
        &self,
        config: &str,
        env: &str,
        limit: u32,
    ) -> CoreResult<Vec<ConstraintState>> {
        let conn = self.pool.get()?;
        let mut stmt = conn.prepare(
            "SELECT config_name, env_name, version, type, status, judged_by, judged_at, comment
             FROM constraint_state
             WHERE config_name = ?1 AND env_name = ?2
             ORDER BY updated_at DESC
             LIMIT ?3",
        )?;
        let rows = stmt.query_map(params![config, env, limit], |row| {
            Ok(Self::row_to_constraint_state(
                row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?, row.get(4)?, row.get(5)?, row.get(6)?, row.get(7)?,
            ))
        })?;
        rows.collect::<Result<_, _>>().map_err(CoreError::from)
    }

    /// The periodically-checked contract on configs, identical in
    /// semantics to the resource repository's `itemsDueForCheck`.
    pub fn due_for_check(&self, min_since_last_millis: i64, limit: i64) -> CoreResult<Vec<String>> {
        let mut conn = self.pool.get()?;
        let tx = conn.transaction_with_behavior(rusqlite::TransactionBehavior::Immediate)?;
        let claimed = periodic::claim_due(&tx, &DELIVERY_CONFIG_CLAIM, self.now_millis(), min_since_last_millis, limit)?;
        tx.commit()?;
        Ok(claimed)
    }
}
