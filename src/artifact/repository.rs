use super::{
    Artifact, ArtifactStatus, ArtifactType, EnvironmentArtifactSummary, PromotionRollup,
    VersioningStrategy,
};
use crate::clock::Clock;
use crate::db::ConnectionPool;
use crate::error::{CoreError, CoreResult};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::sync::Arc;

pub struct ArtifactRepository {
    pool: ConnectionPool,
    clock: Arc<dyn Clock>,
}

fn status_set_to_json(statuses: &[ArtifactStatus]) -> String {
    serde_json::to_string(&statuses.iter().map(|s| s.as_str()).collect::<Vec<_>>())
        .expect("status list serializes")
}

fn status_set_from_json(raw: &str) -> Vec<ArtifactStatus> {
    serde_json::from_str::<Vec<String>>(raw)
        .unwrap_or_default()
        .into_iter()
        .filter_map(|s| ArtifactStatus::parse(&s))
        .collect()
}

fn strategy_to_json(strategy: &VersioningStrategy) -> String {
    serde_json::to_string(strategy).expect("versioning strategy serializes")
}

fn strategy_from_json(raw: &str) -> CoreResult<VersioningStrategy> {
    serde_json::from_str(raw)
        .map_err(|e| CoreError::TransientStoreError(format!("corrupt versioning_strategy: {e}")))
}

fn artifact_from_row(row: &Row) -> rusqlite::Result<(String, String, String, String)> {
    Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?))
}

fn row_to_artifact((name, type_str, status_filter, strategy): (String, String, String, String)) -> CoreResult<Artifact> {
    Ok(Artifact {
        name,
        artifact_type: ArtifactType::parse(&type_str)
            .ok_or_else(|| CoreError::TransientStoreError(format!("corrupt artifact type: {type_str}")))?,
        status_filter: status_set_from_json(&status_filter),
        versioning_strategy: strategy_from_json(&strategy)?,
    })
}

impl ArtifactRepository {
    pub fn new(pool: ConnectionPool, clock: Arc<dyn Clock>) -> Self {
        Self { pool, clock }
    }

    fn now_millis(&self) -> i64 {
        self.clock.now().timestamp_millis()
    }

    fn get_artifact_tx(conn: &Connection, name: &str, artifact_type: ArtifactType) -> CoreResult<Option<Artifact>> {
        let row = conn
            .prepare("SELECT name, type, status_filter, versioning_strategy FROM artifact WHERE name = ?1 AND type = ?2")?
            .query_row(params![name, artifact_type.as_str()], artifact_from_row)
            .optional()?;
        row.map(row_to_artifact).transpose()
    }

    fn require_artifact(conn: &Connection, name: &str, artifact_type: ArtifactType) -> CoreResult<Artifact> {
        Self::get_artifact_tx(conn, name, artifact_type)?
            .ok_or_else(|| Artifact::not_found_error(name, artifact_type))
    }

    /// `register(a)`: true if newly registered, false if already present.
    pub fn register(&self, artifact: &Artifact) -> CoreResult<bool> {
        let conn = self.pool.get()?;
        let existing = Self::get_artifact_tx(&conn, &artifact.name, artifact.artifact_type)?;
        if existing.is_some() {
            return Ok(false);
        }
        conn.prepare(
            "INSERT INTO artifact (name, type, status_filter, versioning_strategy) VALUES (?1, ?2, ?3, ?4)",
        )?
        .execute(params![
            artifact.name,
            artifact.artifact_type.as_str(),
            status_set_to_json(&artifact.status_filter),
            strategy_to_json(&artifact.versioning_strategy),
        ])?;
        Ok(true)
    }

    pub fn is_registered(&self, name: &str, artifact_type: ArtifactType) -> CoreResult<bool> {
        let conn = self.pool.get()?;
        Ok(Self::get_artifact_tx(&conn, name, artifact_type)?.is_some())
    }

    /// `store(a, version, status)`: true if newly stored. First write wins
    /// on status; a later `store` of the same `(artifact, version)` with a
    /// different status is still a no-op (see SPEC_FULL.md Open Question 2).
    pub fn store(
        &self,
        name: &str,
        artifact_type: ArtifactType,
        version: &str,
        status: ArtifactStatus,
    ) -> CoreResult<bool> {
        let conn = self.pool.get()?;
        Self::require_artifact(&conn, name, artifact_type)?;

        let existing: Option<String> = conn
            .prepare("SELECT status FROM artifact_version WHERE artifact_name = ?1 AND artifact_type = ?2 AND version = ?3")?
            .query_row(params![name, artifact_type.as_str(), version], |row| row.get(0))
            .optional()?;

        if existing.is_some() {
            return Ok(false);
        }

        conn.prepare(
            "INSERT INTO artifact_version (artifact_name, artifact_type, version, status) VALUES (?1, ?2, ?3, ?4)",
        )?
        .execute(params![name, artifact_type.as_str(), version, status.as_str()])?;
        Ok(true)
    }

    /// `versions(a, statusFilter?)`: newest-first, optionally restricted to
    /// a status subset.
    pub fn versions(
        &self,
        name: &str,
        artifact_type: ArtifactType,
        status_filter: Option<&[ArtifactStatus]>,
    ) -> CoreResult<Vec<String>> {
        let conn = self.pool.get()?;
        let artifact = Self::require_artifact(&conn, name, artifact_type)?;

        let mut stmt = conn.prepare(
            "SELECT version, status FROM artifact_version WHERE artifact_name = ?1 AND artifact_type = ?2",
        )?;
        let rows = stmt.query_map(params![name, artifact_type.as_str()], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;

        let mut versions = Vec::new();
        for row in rows {
            let (version, status_str) = row?;
            if let Some(filter) = status_filter {
                let Some(status) = ArtifactStatus::parse(&status_str) else { continue };
                if !filter.contains(&status) {
                    continue;
                }
            }
            versions.push(version);
        }

        let comparator = artifact.comparator()?;
        comparator.sort_newest_first(&mut versions);
        Ok(versions)
    }

    /// `getAll(typeFilter?)`.
    pub fn get_all(&self, type_filter: Option<ArtifactType>) -> CoreResult<Vec<Artifact>> {
        let conn = self.pool.get()?;
        let mut stmt = conn.prepare("SELECT name, type, status_filter, versioning_strategy FROM artifact")?;
        let rows = stmt.query_map([], artifact_from_row)?;

        let mut artifacts = Vec::new();
        for row in rows {
            let artifact = row_to_artifact(row?)?;
            if type_filter.is_none_or(|t| t == artifact.artifact_type) {
                artifacts.push(artifact);
            }
        }
        Ok(artifacts)
    }

    /// `approveVersionFor`: true if newly approved. Fails if the artifact
    /// is not registered (invariant 1).
    pub fn approve_version_for(
        &self,
        config: &str,
        name: &str,
        artifact_type: ArtifactType,
        version: &str,
        env: &str,
    ) -> CoreResult<bool> {
        let mut conn = self.pool.get()?;
        let tx = conn.transaction_with_behavior(rusqlite::TransactionBehavior::Immediate)?;
        Self::require_artifact(&tx, name, artifact_type)?;

        let already: Option<i64> = tx
            .prepare(
                "SELECT approved_at FROM environment_artifact_version_promotion
                 WHERE config_name = ?1 AND env_name = ?2 AND artifact_name = ?3 AND artifact_type = ?4 AND version = ?5",
            )?
            .query_row(params![config, env, name, artifact_type.as_str(), version], |row| row.get(0))
            .optional()?;

        if already.is_some() {
            tx.commit()?;
            return Ok(false);
        }

        tx.prepare(
            "INSERT INTO environment_artifact_version_promotion
                (config_name, env_name, artifact_name, artifact_type, version, approved_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        )?
        .execute(params![config, env, name, artifact_type.as_str(), version, self.now_millis()])?;
        tx.commit()?;
        Ok(true)
    }

    pub fn is_approved_for(
        &self,
        config: &str,
        name: &str,
        artifact_type: ArtifactType,
        version: &str,
        env: &str,
    ) -> CoreResult<bool> {
        let conn = self.pool.get()?;
        let approved: Option<i64> = conn
            .prepare(
                "SELECT approved_at FROM environment_artifact_version_promotion
                 WHERE config_name = ?1 AND env_name = ?2 AND artifact_name = ?3 AND artifact_type = ?4 AND version = ?5",
            )?
            .query_row(params![config, env, name, artifact_type.as_str(), version], |row| row.get(0))
            .optional()?;
        Ok(approved.is_some())
    }

    /// `markAsDeployingTo`: no-op unless `version` was approved in `env`.
    /// Clears any other version's in-flight `deploying` marker for this
    /// `(config, artifact, env)` first, preserving `|deploying| <= 1`.
    pub fn mark_as_deploying_to(
        &self,
        config: &str,
        name: &str,
        artifact_type: ArtifactType,
        version: &str,
        env: &str,
    ) -> CoreResult<()> {
        let mut conn = self.pool.get()?;
        let tx = conn.transaction_with_behavior(rusqlite::TransactionBehavior::Immediate)?;

        let approved: Option<i64> = tx
            .prepare(
                "SELECT approved_at FROM environment_artifact_version_promotion
                 WHERE config_name = ?1 AND env_name = ?2 AND artifact_name = ?3 AND artifact_type = ?4 AND version = ?5",
            )?
            .query_row(params![config, env, name, artifact_type.as_str(), version], |row| row.get(0))
            .optional()?;

        if approved.is_none() {
            tx.commit()?;
            return Ok(());
        }

        tx.prepare(
            "UPDATE environment_artifact_version_promotion SET deploying_at = NULL
             WHERE config_name = ?1 AND env_name = ?2 AND artifact_name = ?3 AND artifact_type = ?4
               AND version != ?5 AND deploying_at IS NOT NULL AND deployed_successfully_at IS NULL",
        )?
        .execute(params![config, env, name, artifact_type.as_str(), version])?;

        tx.prepare(
            "UPDATE environment_artifact_version_promotion SET deploying_at = ?6
             WHERE config_name = ?1 AND env_name = ?2 AND artifact_name = ?3 AND artifact_type = ?4 AND version = ?5",
        )?
        .execute(params![config, env, name, artifact_type.as_str(), version, self.now_millis()])?;

        tx.commit()?;
        Ok(())
    }

    /// `markAsSuccessfullyDeployedTo`: sets `current := version`. The prior
    /// current (if any) is untouched in storage — it simply stops being the
    /// maximum `deployed_successfully_at` and falls into `previous` when
    /// the roll-up is computed.
    pub fn mark_as_successfully_deployed_to(
        &self,
        config: &str,
        name: &str,
        artifact_type: ArtifactType,
        version: &str,
        env: &str,
    ) -> CoreResult<()> {
        let mut conn = self.pool.get()?;
        let tx = conn.transaction_with_behavior(rusqlite::TransactionBehavior::Immediate)?;

        let row_exists: Option<i64> = tx
            .prepare(
                "SELECT approved_at FROM environment_artifact_version_promotion
                 WHERE config_name = ?1 AND env_name = ?2 AND artifact_name = ?3 AND artifact_type = ?4 AND version = ?5",
            )?
            .query_row(params![config, env, name, artifact_type.as_str(), version], |row| row.get(0))
            .optional()?;

        if row_exists.is_none() {
            // Successful deployment with no approval record on file still
            // needs a row to hang the timestamp on; create one lazily.
            tx.prepare(
                "INSERT INTO environment_artifact_version_promotion
                    (config_name, env_name, artifact_name, artifact_type, version, approved_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            )?
            .execute(params![config, env, name, artifact_type.as_str(), version, self.now_millis()])?;
        }

        tx.prepare(
            "UPDATE environment_artifact_version_promotion SET deployed_successfully_at = ?6
             WHERE config_name = ?1 AND env_name = ?2 AND artifact_name = ?3 AND artifact_type = ?4 AND version = ?5",
        )?
        .execute(params![config, env, name, artifact_type.as_str(), version, self.now_millis()])?;

        tx.commit()?;
        Ok(())
    }

    pub fn was_successfully_deployed_to(
        &self,
        config: &str,
        name: &str,
        artifact_type: ArtifactType,
        version: &str,
        env: &str,
    ) -> CoreResult<bool> {
        let conn = self.pool.get()?;
        let deployed: Option<i64> = conn
            .prepare(
                "SELECT deployed_successfully_at FROM environment_artifact_version_promotion
                 WHERE config_name = ?1 AND env_name = ?2 AND artifact_name = ?3 AND artifact_type = ?4 AND version = ?5",
            )?
            .query_row(params![config, env, name, artifact_type.as_str(), version], |row| row.get(0))
            .optional()?
            .flatten();
        Ok(deployed.is_some())
    }

    /// `latestVersionApprovedIn`: greatest comparator rank among approved
    /// versions matching `statusFilter` (default: the artifact's own
    /// accepted statuses).
    pub fn latest_version_approved_in(
        &self,
        config: &str,
        name: &str,
        artifact_type: ArtifactType,
        env: &str,
        status_filter: Option<&[ArtifactStatus]>,
    ) -> CoreResult<Option<String>> {
        let conn = self.pool.get()?;
        let artifact = Self::require_artifact(&conn, name, artifact_type)?;
        let effective_filter: Vec<ArtifactStatus> =
            status_filter.map(|f| f.to_vec()).unwrap_or_else(|| artifact.status_filter.clone());

        let mut stmt = conn.prepare(
            "SELECT p.version, v.status FROM environment_artifact_version_promotion p
             JOIN artifact_version v
               ON v.artifact_name = p.artifact_name AND v.artifact_type = p.artifact_type AND v.version = p.version
             WHERE p.config_name = ?1 AND p.env_name = ?2 AND p.artifact_name = ?3 AND p.artifact_type = ?4",
        )?;
        let rows = stmt.query_map(params![config, env, name, artifact_type.as_str()], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;

        let mut candidates = Vec::new();
        for row in rows {
            let (version, status_str) = row?;
            if let Some(status) = ArtifactStatus::parse(&status_str) {
                if effective_filter.contains(&status) {
                    candidates.push(version);
                }
            }
        }

        let comparator = artifact.comparator()?;
        comparator.sort_newest_first(&mut candidates);
        Ok(candidates.into_iter().next())
    }

    /// `versionsByEnvironment(config)`: the per-environment, per-artifact
    /// lifecycle roll-up, scoped to the config's *current* artifact and
    /// environment membership (see SPEC_FULL.md Open Question 1).
    pub fn versions_by_environment(&self, config: &str) -> CoreResult<Vec<EnvironmentArtifactSummary>> {
        let conn = self.pool.get()?;

        let mut env_stmt = conn.prepare("SELECT name FROM environment WHERE config_name = ?1 ORDER BY name")?;
        let envs: Vec<String> =
            env_stmt.query_map(params![config], |row| row.get(0))?.collect::<Result<_, _>>()?;

        let mut artifact_stmt = conn.prepare(
            "SELECT artifact_name, artifact_type FROM environment_artifact
             WHERE config_name = ?1 AND env_name = ?2 ORDER BY artifact_name, artifact_type",
        )?;

        let mut summaries = Vec::new();
        for env in &envs {
            let artifacts: Vec<(String, String)> = artifact_stmt
                .query_map(params![config, env], |row| Ok((row.get(0)?, row.get(1)?)))?
                .collect::<Result<_, _>>()?;

            for (artifact_name, artifact_type_str) in artifacts {
                let Some(artifact_type) = ArtifactType::parse(&artifact_type_str) else { continue };
                let rollup = self.rollup_for(&conn, config, &artifact_name, artifact_type, env)?;
                summaries.push(EnvironmentArtifactSummary {
                    environment: env.clone(),
                    artifact_name,
                    artifact_type,
                    rollup,
                });
            }
        }

        Ok(summaries)
    }

    fn rollup_for(
        &self,
        conn: &Connection,
        config: &str,
        name: &str,
        artifact_type: ArtifactType,
        env: &str,
    ) -> CoreResult<PromotionRollup> {
        let artifact = Self::require_artifact(conn, name, artifact_type)?;

        let all_versions = self.versions(name, artifact_type, Some(&artifact.status_filter))?;

        let mut stmt = conn.prepare(
            "SELECT version, deploying_at, deployed_successfully_at FROM environment_artifact_version_promotion
             WHERE config_name = ?1 AND env_name = ?2 AND artifact_name = ?3 AND artifact_type = ?4",
        )?;
        let rows = stmt.query_map(params![config, env, name, artifact_type.as_str()], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, Option<i64>>(1)?, row.get::<_, Option<i64>>(2)?))
        })?;

        let mut deployed: Vec<(String, i64)> = Vec::new();
        let mut deploying: Option<String> = None;
        for row in rows {
            let (version, deploying_at, deployed_at) = row?;
            if let Some(ts) = deployed_at {
                deployed.push((version, ts));
            } else if deploying_at.is_some() {
                deploying = Some(version);
            }
        }
        deployed.sort_by_key(|(_, ts)| *ts);

        let current = deployed.last().map(|(v, _)| v.clone());
        let previous: Vec<String> =
            deployed[..deployed.len().saturating_sub(1)].iter().map(|(v, _)| v.clone()).collect();

        let excluded: std::collections::HashSet<&str> = current
            .iter()
            .map(String::as_str)
            .chain(deploying.iter().map(String::as_str))
            .chain(previous.iter().map(String::as_str))
            .collect();
        let pending: Vec<String> = all_versions.into_iter().filter(|v| !excluded.contains(v.as_str())).collect();

        Ok(PromotionRollup { pending, current, deploying, previous })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::SystemClock;
    use crate::db::migrations::migrate;

    fn repo() -> ArtifactRepository {
        let manager = r2d2_sqlite::SqliteConnectionManager::memory();
        let pool = r2d2::Pool::builder().max_size(1).build(manager).unwrap();
        {
            let mut conn = pool.get().unwrap();
            migrate(&mut conn).unwrap();
        }
        ArtifactRepository::new(pool, Arc::new(SystemClock))
    }

    fn debian_foo() -> Artifact {
        Artifact {
            name: "foo".to_string(),
            artifact_type: ArtifactType::Debian,
            status_filter: vec![ArtifactStatus::Snapshot],
            versioning_strategy: VersioningStrategy::DebianSemver,
        }
    }

    fn seed_config_with_test_env(repo: &ArtifactRepository, config: &str) {
        let conn = repo.pool.get().unwrap();
        conn.execute("INSERT INTO delivery_config (name, application) VALUES (?1, ?1)", params![config])
            .unwrap();
        conn.execute(
            "INSERT INTO environment (config_name, name, constraints) VALUES (?1, 'test', '[]')",
            params![config],
        )
        .unwrap();
        conn.execute(
            "INSERT INTO environment_artifact (config_name, env_name, artifact_name, artifact_type) VALUES (?1, 'test', 'foo', 'debian')",
            params![config],
        )
        .unwrap();
    }

    #[test]
    fn scenario_1_register_and_sort_dev_chain() {
        let repo = repo();
        assert!(repo.register(&debian_foo()).unwrap());
        assert!(!repo.register(&debian_foo()).unwrap());

        let shuffled = [
            "keeldemo-0.0.1~dev.9-h9.3d2c8ff",
            "keeldemo-0.0.1~dev.10-h10.1d2d542",
            "keeldemo-0.0.1~dev.8-h8.41595c4",
        ];
        for v in shuffled {
            assert!(repo.store("foo", ArtifactType::Debian, v, ArtifactStatus::Snapshot).unwrap());
        }

        let versions = repo.versions("foo", ArtifactType::Debian, None).unwrap();
        assert_eq!(
            versions,
            vec![
                "keeldemo-0.0.1~dev.10-h10.1d2d542",
                "keeldemo-0.0.1~dev.9-h9.3d2c8ff",
                "keeldemo-0.0.1~dev.8-h8.41595c4",
            ]
        );
    }

    #[test]
    fn store_is_idempotent_even_if_status_differs() {
        let repo = repo();
        repo.register(&debian_foo()).unwrap();
        assert!(repo.store("foo", ArtifactType::Debian, "foo-1.0-h1.a", ArtifactStatus::Snapshot).unwrap());
        assert!(!repo.store("foo", ArtifactType::Debian, "foo-1.0-h1.a", ArtifactStatus::Snapshot).unwrap());
        assert!(!repo.store("foo", ArtifactType::Debian, "foo-1.0-h1.a", ArtifactStatus::Release).unwrap());
    }

    #[test]
    fn store_on_unregistered_artifact_fails() {
        let repo = repo();
        let err = repo.store("ghost", ArtifactType::Debian, "ghost-1.0-h1.a", ArtifactStatus::Snapshot).unwrap_err();
        assert!(matches!(err, CoreError::NoSuchArtifact { .. }));
    }

    #[test]
    fn scenario_2_through_4_promotion_lifecycle() {
        let repo = repo();
        repo.register(&debian_foo()).unwrap();
        seed_config_with_test_env(&repo, "my-manifest");

        for v in ["dev.8", "dev.9", "dev.10"] {
            repo.store("foo", ArtifactType::Debian, &format!("keeldemo-0.0.1~{v}-hX.abc"), ArtifactStatus::Snapshot)
                .unwrap();
        }

        let v8 = "keeldemo-0.0.1~dev.8-hX.abc".to_string();
        let v9 = "keeldemo-0.0.1~dev.9-hX.abc".to_string();
        let v10 = "keeldemo-0.0.1~dev.10-hX.abc".to_string();

        // Scenario 2: nothing promoted yet.
        let rollup = repo.rollup_for(&repo.pool.get().unwrap(), "my-manifest", "foo", ArtifactType::Debian, "test").unwrap();
        assert_eq!(rollup.current, None);
        assert_eq!(rollup.deploying, None);
        assert!(rollup.previous.is_empty());
        assert_eq!(rollup.pending.len(), 3);

        // Scenario 3.
        assert!(repo.approve_version_for("my-manifest", "foo", ArtifactType::Debian, &v8, "test").unwrap());
        repo.mark_as_deploying_to("my-manifest", "foo", ArtifactType::Debian, &v8, "test").unwrap();
        assert_eq!(
            repo.latest_version_approved_in("my-manifest", "foo", ArtifactType::Debian, "test", None).unwrap(),
            Some(v8.clone())
        );
        assert!(!repo.was_successfully_deployed_to("my-manifest", "foo", ArtifactType::Debian, &v8, "test").unwrap());

        let rollup = repo.rollup_for(&repo.pool.get().unwrap(), "my-manifest", "foo", ArtifactType::Debian, "test").unwrap();
        assert_eq!(rollup.deploying, Some(v8.clone()));
        let mut pending = rollup.pending.clone();
        pending.sort();
        let mut expected = vec![v9.clone(), v10.clone()];
        expected.sort();
        assert_eq!(pending, expected);

        // Scenario 4.
        repo.mark_as_successfully_deployed_to("my-manifest", "foo", ArtifactType::Debian, &v8, "test").unwrap();
        assert!(repo.approve_version_for("my-manifest", "foo", ArtifactType::Debian, &v9, "test").unwrap());
        repo.mark_as_deploying_to("my-manifest", "foo", ArtifactType::Debian, &v9, "test").unwrap();
        repo.mark_as_successfully_deployed_to("my-manifest", "foo", ArtifactType::Debian, &v9, "test").unwrap();

        let rollup = repo.rollup_for(&repo.pool.get().unwrap(), "my-manifest", "foo", ArtifactType::Debian, "test").unwrap();
        assert_eq!(rollup.current, Some(v9.clone()));
        assert_eq!(rollup.deploying, None);
        assert_eq!(rollup.previous, vec![v8.clone()]);
        assert_eq!(rollup.pending, vec![v10.clone()]);

        assert!(repo.was_successfully_deployed_to("my-manifest", "foo", ArtifactType::Debian, &v8, "test").unwrap());
        assert!(repo.was_successfully_deployed_to("my-manifest", "foo", ArtifactType::Debian, &v9, "test").unwrap());
    }

    #[test]
    fn scenario_5_get_all_by_type() {
        let repo = repo();
        repo.register(&debian_foo()).unwrap();
        repo.register(&Artifact { name: "bar".to_string(), ..debian_foo() }).unwrap();
        repo.register(&Artifact {
            name: "baz".to_string(),
            artifact_type: ArtifactType::Docker,
            status_filter: vec![ArtifactStatus::Release],
            versioning_strategy: VersioningStrategy::DockerTag {
                strategy: super::super::DockerStrategyKind::IncreasingInteger,
                custom_regex: None,
            },
        })
        .unwrap();

        repo.store("foo", ArtifactType::Debian, "foo-1.0-h1.a", ArtifactStatus::Snapshot).unwrap();
        repo.store("bar", ArtifactType::Debian, "bar-1.0-h1.a", ArtifactStatus::Snapshot).unwrap();
        repo.store("baz", ArtifactType::Docker, "3", ArtifactStatus::Release).unwrap();

        assert_eq!(repo.get_all(None).unwrap().len(), 3);
        assert_eq!(repo.get_all(Some(ArtifactType::Docker)).unwrap().len(), 1);
        assert_eq!(repo.get_all(Some(ArtifactType::Debian)).unwrap().len(), 2);
    }

    #[test]
    fn approve_version_for_missing_artifact_fails() {
        let repo = repo();
        let err = repo
            .approve_version_for("cfg", "ghost", ArtifactType::Debian, "ghost-1.0-h1.a", "test")
            .unwrap_err();
        assert!(matches!(err, CoreError::NoSuchArtifact { .. }));
    }

    #[test]
    fn approve_version_for_is_idempotent() {
        let repo = repo();
        repo.register(&debian_foo()).unwrap();
        assert!(repo.approve_version_for("cfg", "foo", ArtifactType::Debian, "foo-1.0-h1.a", "test").unwrap());
        assert!(!repo.approve_version_for("cfg", "foo", ArtifactType::Debian, "foo-1.0-h1.a", "test").unwrap());
    }

    #[test]
    fn mark_as_deploying_to_unapproved_version_is_noop() {
        let repo = repo();
        repo.register(&debian_foo()).unwrap();
        repo.mark_as_deploying_to("cfg", "foo", ArtifactType::Debian, "foo-1.0-h1.a", "test").unwrap();
        assert!(!repo.was_successfully_deployed_to("cfg", "foo", ArtifactType::Debian, "foo-1.0-h1.a", "test").unwrap());
    }
}
