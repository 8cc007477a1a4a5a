use std::str::FromStr;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};

use crate::error::StoreError;
use crate::persistance::SetStore;

const SCHEMA: &str = r#"
    CREATE TABLE IF NOT EXISTS set_members (
        key    TEXT NOT NULL,
        member TEXT NOT NULL,
        PRIMARY KEY (key, member)
    )
"#;

/// SQLite-backed [`SetStore`]: one row per set member.
pub struct Database {
    connection: SqlitePool,
}

impl Database {
    pub async fn init(url: &str, max_connections: u32) -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::from_str(url)?.create_if_missing(true);
        let connection = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(options)
            .await?;

        sqlx::query(SCHEMA).execute(&connection).await?;

        Ok(Self { connection })
    }
}

#[async_trait::async_trait]
impl SetStore for Database {
    async fn add_members(&self, key: &str, members: &[String]) -> Result<(), StoreError> {
        let mut tx = self.connection.begin().await?;

        for member in members {
            sqlx::query(
                r#"
                INSERT OR IGNORE INTO set_members (key, member)
                VALUES (?, ?)
                "#,
            )
            .bind(key)
            .bind(member.as_str())
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn members(&self, key: &str) -> Result<Vec<String>, StoreError> {
        Ok(sqlx::query_scalar::<_, String>(
            r#"
            SELECT member
            FROM set_members
            WHERE key = ?
            ORDER BY rowid
            "#,
        )
        .bind(key)
        .fetch_all(&self.connection)
        .await?)
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM set_members WHERE key = ?")
            .bind(key)
            .execute(&self.connection)
            .await?;
        Ok(())
    }

    async fn remove_member(&self, key: &str, member: &str) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM set_members WHERE key = ? AND member = ?")
            .bind(key)
            .bind(member)
            .execute(&self.connection)
            .await?;
        Ok(())
    }
}
