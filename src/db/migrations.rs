use crate::error::CoreResult;
use indoc::indoc;
use rusqlite::Connection;
use rusqlite_migration::{Migrations, M};

pub fn migrate(conn: &mut Connection) -> CoreResult<()> {
    let migrations = Migrations::new(vec![M::up(indoc! { r#"
        CREATE TABLE artifact (
            name TEXT NOT NULL,
            type TEXT NOT NULL,
            status_filter TEXT NOT NULL,
            versioning_strategy TEXT NOT NULL,
            PRIMARY KEY (name, type)
        );

        CREATE TABLE artifact_version (
            artifact_name TEXT NOT NULL,
            artifact_type TEXT NOT NULL,
            version TEXT NOT NULL,
            status TEXT NOT NULL,
            PRIMARY KEY (artifact_name, artifact_type, version),
            FOREIGN KEY (artifact_name, artifact_type) REFERENCES artifact(name, type)
        );

        CREATE TABLE delivery_config (
            name TEXT PRIMARY KEY,
            application TEXT NOT NULL
        );

        CREATE TABLE environment (
            config_name TEXT NOT NULL,
            name TEXT NOT NULL,
            constraints TEXT NOT NULL,
            PRIMARY KEY (config_name, name),
            FOREIGN KEY (config_name) REFERENCES delivery_config(name)
        );

        CREATE TABLE environment_resource (
            config_name TEXT NOT NULL,
            env_name TEXT NOT NULL,
            resource_id TEXT NOT NULL,
            PRIMARY KEY (config_name, env_name, resource_id)
        );
        CREATE INDEX idx_environment_resource_resource ON environment_resource(resource_id);

        CREATE TABLE delivery_config_artifact (
            config_name TEXT NOT NULL,
            artifact_name TEXT NOT NULL,
            artifact_type TEXT NOT NULL,
            PRIMARY KEY (config_name, artifact_name, artifact_type),
            FOREIGN KEY (config_name) REFERENCES delivery_config(name)
        );

        CREATE TABLE environment_artifact (
            config_name TEXT NOT NULL,
            env_name TEXT NOT NULL,
            artifact_name TEXT NOT NULL,
            artifact_type TEXT NOT NULL,
            PRIMARY KEY (config_name, env_name, artifact_name, artifact_type)
        );

        CREATE TABLE environment_artifact_version_promotion (
            config_name TEXT NOT NULL,
            env_name TEXT NOT NULL,
            artifact_name TEXT NOT NULL,
            artifact_type TEXT NOT NULL,
            version TEXT NOT NULL,
            approved_at INTEGER NOT NULL,
            deploying_at INTEGER,
            deployed_successfully_at INTEGER,
            PRIMARY KEY (config_name, env_name, artifact_name, artifact_type, version)
        );
        CREATE INDEX idx_eavp_lookup
            ON environment_artifact_version_promotion(config_name, env_name, artifact_name, artifact_type);

        CREATE TABLE constraint_state (
            config_name TEXT NOT NULL,
            env_name TEXT NOT NULL,
            version TEXT NOT NULL,
            type TEXT NOT NULL,
            status TEXT NOT NULL,
            judged_by TEXT,
            judged_at INTEGER,
            comment TEXT,
            updated_at INTEGER NOT NULL,
            PRIMARY KEY (config_name, env_name, version, type)
        );

        CREATE TABLE delivery_config_last_checked (
            config_name TEXT PRIMARY KEY,
            last_checked_at INTEGER NOT NULL
        );

        CREATE TABLE resource (
            uid TEXT PRIMARY KEY,
            id TEXT NOT NULL UNIQUE,
            api_version TEXT NOT NULL,
            kind TEXT NOT NULL,
            application TEXT NOT NULL,
            metadata TEXT NOT NULL,
            spec TEXT NOT NULL
        );

        CREATE TABLE resource_event (
            resource_uid TEXT NOT NULL,
            timestamp INTEGER NOT NULL,
            kind TEXT NOT NULL,
            payload TEXT NOT NULL,
            FOREIGN KEY (resource_uid) REFERENCES resource(uid)
        );
        CREATE INDEX idx_resource_event_uid_ts ON resource_event(resource_uid, timestamp DESC);

        CREATE TABLE resource_last_checked (
            resource_uid TEXT PRIMARY KEY,
            last_checked_at INTEGER NOT NULL
        );
        "#})]);

    conn.pragma_update(None, "journal_mode", "WAL")?;
    migrations.to_latest(conn)?;
    Ok(())
}
