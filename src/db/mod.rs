pub mod migrations;

use crate::error::CoreResult;
use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;

pub type ConnectionPool = Pool<SqliteConnectionManager>;
pub type PooledConnection = r2d2::PooledConnection<SqliteConnectionManager>;

/// Opens a pooled connection to the SQLite file at `path` and brings the
/// schema up to date. Pass `":memory:"` for an ephemeral database (each
/// pooled connection then gets its own independent in-memory database, so
/// callers that need a shared in-memory instance across connections should
/// use a named `file:name?mode=memory&cache=shared` URI instead).
pub fn open_pool(path: &str) -> CoreResult<ConnectionPool> {
    let manager = SqliteConnectionManager::file(path);
    let pool = Pool::new(manager)?;
    {
        let mut conn = pool.get()?;
        migrations::migrate(&mut conn)?;
    }
    Ok(pool)
}
