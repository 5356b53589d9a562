//! The "periodically checked" claim protocol (§4.3/§4.4): atomically select
//! up to `limit` ids whose last-check timestamp is stale, advance their
//! last-check to `now`, and return them — ordered oldest-first, ties
//! broken by id. Shared by the delivery-config repository and the resource
//! repository, which differ only in which last-checked table and id column
//! they operate over.
//!
//! Row-level locking is realized as a `BEGIN IMMEDIATE` transaction: SQLite
//! has no finer-grained lock, so this takes the whole-database write lock
//! for the duration of the claim, which is a stronger guarantee than the
//! contract requires but satisfies it. See DESIGN.md.

use crate::error::CoreResult;
use rusqlite::{params_from_iter, Transaction};

/// Table/column names for one instance of the claim protocol.
pub struct ClaimTarget {
    pub last_checked_table: &'static str,
    pub id_column: &'static str,
}

pub const RESOURCE_CLAIM: ClaimTarget =
    ClaimTarget { last_checked_table: "resource_last_checked", id_column: "resource_uid" };

pub const DELIVERY_CONFIG_CLAIM: ClaimTarget =
    ClaimTarget { last_checked_table: "delivery_config_last_checked", id_column: "config_name" };

/// Must run inside a transaction opened with `TransactionBehavior::Immediate`
/// so concurrent callers serialize on SQLite's single-writer lock instead
/// of racing the select-then-update.
pub fn claim_due(
    tx: &Transaction,
    target: &ClaimTarget,
    now_millis: i64,
    min_since_last_millis: i64,
    limit: i64,
) -> CoreResult<Vec<String>> {
    if limit <= 0 {
        return Ok(Vec::new());
    }

    let threshold = now_millis - min_since_last_millis;
    let select_sql = format!(
        "SELECT {id} FROM {table} WHERE last_checked_at <= ?1 ORDER BY last_checked_at ASC, {id} ASC LIMIT ?2",
        id = target.id_column,
        table = target.last_checked_table,
    );
    let ids: Vec<String> = tx
        .prepare(&select_sql)?
        .query_map(rusqlite::params![threshold, limit], |row| row.get(0))?
        .collect::<Result<_, _>>()?;

    if ids.is_empty() {
        return Ok(ids);
    }

    let placeholders = ids.iter().map(|_| "?").collect::<Vec<_>>().join(",");
    let update_sql = format!(
        "UPDATE {table} SET last_checked_at = ? WHERE {id} IN ({placeholders})",
        id = target.id_column,
        table = target.last_checked_table,
    );
    let mut bind_params: Vec<Box<dyn rusqlite::ToSql>> = vec![Box::new(now_millis)];
    bind_params.extend(ids.iter().cloned().map(|id| Box::new(id) as Box<dyn rusqlite::ToSql>));
    tx.prepare(&update_sql)?.execute(params_from_iter(bind_params.iter()))?;

    Ok(ids)
}

/// Ensures a last-checked row exists for `id`, seeded to epoch+1s if new.
/// Used by `store` on both repositories so a freshly created item is
/// immediately due.
pub fn ensure_last_checked_row(
    tx: &Transaction,
    target: &ClaimTarget,
    id: &str,
    seed_millis: i64,
) -> CoreResult<()> {
    let sql = format!(
        "INSERT OR IGNORE INTO {table} ({id_col}, last_checked_at) VALUES (?1, ?2)",
        table = target.last_checked_table,
        id_col = target.id_column,
    );
    tx.prepare(&sql)?.execute(rusqlite::params![id, seed_millis])?;
    Ok(())
}
