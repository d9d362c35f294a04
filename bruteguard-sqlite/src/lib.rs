//! SQLite-backed [`ListStore`] for `bruteguard`.
//!
//! Each list is a table of `(id, ip, mask)` rows. Ids come from
//! `AUTOINCREMENT` and are never reused. An insert and its check against both
//! tables run as one statement, so two racing adds of the same pair cannot
//! both succeed. A rejected insert reports the list holding the pair as seen
//! inside the same transaction.

use async_trait::async_trait;
use bruteguard::error::StoreError;
use bruteguard::list::{AddressEntry, Cidr, ListKind, ListStore};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use sqlx::Row;
use std::path::Path;
use std::str::FromStr;

fn table(list: ListKind) -> &'static str {
    match list {
        ListKind::Allow => "allow_list",
        ListKind::Deny => "deny_list",
    }
}

fn unavailable(err: sqlx::Error) -> StoreError {
    tracing::warn!(target: "bruteguard::sqlite", error = %err, "sqlite operation failed");
    StoreError::Unavailable(err.to_string())
}

async fn init_db(db: &SqlitePool) -> Result<(), sqlx::Error> {
    let mut tx = db.begin().await?;
    for list in ListKind::ALL {
        let sql = format!(
            "CREATE TABLE IF NOT EXISTS {} (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                ip TEXT NOT NULL,
                mask INTEGER NOT NULL,
                UNIQUE(ip, mask)
            )",
            table(list)
        );
        sqlx::query(&sql).execute(&mut *tx).await?;
    }
    tx.commit().await
}

/// Allow/deny lists persisted in a SQLite database.
#[derive(Clone, Debug)]
pub struct SqliteListStore {
    db: SqlitePool,
}

impl SqliteListStore {
    /// Open (creating if missing) the database file at `path`.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let opts = SqliteConnectOptions::new()
            .filename(path.as_ref())
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal);
        let db = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(opts)
            .await
            .map_err(unavailable)?;
        Self::from_pool(db).await
    }

    /// A private in-memory database. Contents are lost when the store is dropped.
    pub async fn open_in_memory() -> Result<Self, StoreError> {
        let opts = SqliteConnectOptions::from_str("sqlite::memory:").map_err(unavailable)?;
        // every connection to :memory: is its own database
        let db = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(opts)
            .await
            .map_err(unavailable)?;
        Self::from_pool(db).await
    }

    /// Use an existing pool, creating the list tables if needed.
    pub async fn from_pool(db: SqlitePool) -> Result<Self, StoreError> {
        init_db(&db).await.map_err(unavailable)?;
        Ok(Self { db })
    }
}

#[async_trait]
impl ListStore for SqliteListStore {
    async fn add(&self, list: ListKind, subnet: Cidr) -> Result<u64, StoreError> {
        let sql = format!(
            "INSERT INTO {} (ip, mask)
             SELECT ?1, ?2
             WHERE NOT EXISTS (SELECT 1 FROM allow_list WHERE ip = ?1 AND mask = ?2)
               AND NOT EXISTS (SELECT 1 FROM deny_list WHERE ip = ?1 AND mask = ?2)",
            table(list)
        );
        // the insert takes the write lock, so the holder lookup below sees the
        // state that rejected it
        let mut tx = self.db.begin().await.map_err(unavailable)?;
        let res = sqlx::query(&sql)
            .bind(subnet.ip().to_string())
            .bind(i64::from(subnet.mask()))
            .execute(&mut *tx)
            .await
            .map_err(unavailable)?;

        if res.rows_affected() == 0 {
            let held_by: Option<String> = sqlx::query_scalar(
                "SELECT 'allow' FROM allow_list WHERE ip = ?1 AND mask = ?2
                 UNION ALL
                 SELECT 'deny' FROM deny_list WHERE ip = ?1 AND mask = ?2",
            )
            .bind(subnet.ip().to_string())
            .bind(i64::from(subnet.mask()))
            .fetch_optional(&mut *tx)
            .await
            .map_err(unavailable)?;
            tx.rollback().await.map_err(unavailable)?;
            return match held_by.as_deref() {
                Some("allow") => Err(StoreError::Conflict { list: ListKind::Allow, subnet }),
                Some("deny") => Err(StoreError::Conflict { list: ListKind::Deny, subnet }),
                _ => Err(StoreError::Corrupt(format!("insert of {subnet} rejected but no list holds it"))),
            };
        }
        let id = u64::try_from(res.last_insert_rowid())
            .map_err(|_| StoreError::Corrupt(format!("negative rowid for {subnet}")))?;
        tx.commit().await.map_err(unavailable)?;
        Ok(id)
    }

    async fn remove(&self, list: ListKind, subnet: Cidr) -> Result<(), StoreError> {
        let sql = format!("DELETE FROM {} WHERE ip = ?1 AND mask = ?2", table(list));
        let res = sqlx::query(&sql)
            .bind(subnet.ip().to_string())
            .bind(i64::from(subnet.mask()))
            .execute(&self.db)
            .await
            .map_err(unavailable)?;

        if res.rows_affected() == 0 {
            return Err(StoreError::NotFound { list, subnet });
        }
        Ok(())
    }

    async fn contains_exact(&self, list: ListKind, subnet: Cidr) -> Result<bool, StoreError> {
        let sql = format!("SELECT COUNT(*) FROM {} WHERE ip = ?1 AND mask = ?2", table(list));
        let count: i64 = sqlx::query_scalar(&sql)
            .bind(subnet.ip().to_string())
            .bind(i64::from(subnet.mask()))
            .fetch_one(&self.db)
            .await
            .map_err(unavailable)?;
        Ok(count > 0)
    }

    async fn enumerate(&self, list: ListKind) -> Result<Vec<AddressEntry>, StoreError> {
        let sql = format!("SELECT id, ip, mask FROM {} ORDER BY id", table(list));
        let rows = sqlx::query(&sql).fetch_all(&self.db).await.map_err(unavailable)?;

        let mut entries = Vec::with_capacity(rows.len());
        for row in rows {
            let id: i64 = row.try_get("id").map_err(|e| StoreError::Corrupt(e.to_string()))?;
            let ip: String = row.try_get("ip").map_err(|e| StoreError::Corrupt(e.to_string()))?;
            let mask: i64 = row.try_get("mask").map_err(|e| StoreError::Corrupt(e.to_string()))?;

            let corrupt = |what: String| StoreError::Corrupt(format!("{} row {}: {}", table(list), id, what));
            let mask = u8::try_from(mask).map_err(|_| corrupt(format!("mask {mask} out of range")))?;
            let subnet = Cidr::new(&ip, mask).map_err(|e| corrupt(e.to_string()))?;
            let id = u64::try_from(id).map_err(|_| corrupt("negative id".into()))?;
            entries.push(AddressEntry { subnet, id });
        }
        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn rows_that_fail_validation_are_corrupt() {
        let store = SqliteListStore::open_in_memory().await.unwrap();
        sqlx::query("INSERT INTO deny_list (ip, mask) VALUES ('10.0.0.0', 0)")
            .execute(&store.db)
            .await
            .unwrap();
        let err = store.enumerate(ListKind::Deny).await.unwrap_err();
        assert!(matches!(err, StoreError::Corrupt(msg) if msg.starts_with("deny_list row 1")));
    }
}
