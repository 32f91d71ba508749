//! The catalog store: templates, networks and storage pools behind one
//! SQLite handle, plus the host profile and media inspector templates are
//! validated against.

mod networks;
mod storagepools;
mod templates;

use crate::error::Result;
use crate::host::HostProfile;
use crate::media::MediaInspector;
use crate::network::Network;
use crate::storagepool::StoragePool;
use chrono::Utc;
use serde::{de::DeserializeOwned, Serialize};
use sqlx::{SqliteConnection, SqlitePool};
use std::collections::HashSet;
use std::sync::Arc;

const TEMPLATES: &str = "templates";
const NETWORKS: &str = "networks";
const STORAGEPOOLS: &str = "storagepools";

#[derive(Clone)]
pub struct Catalog {
    pool: SqlitePool,
    host: Arc<HostProfile>,
    media: Arc<dyn MediaInspector>,
}

impl Catalog {
    pub fn new(pool: SqlitePool, host: HostProfile, media: Arc<dyn MediaInspector>) -> Self {
        Self {
            pool,
            host: Arc::new(host),
            media,
        }
    }

    /// Get a reference to the database pool
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub fn host(&self) -> &HostProfile {
        &self.host
    }

    /// Create the `default` network and storage pool unless they already exist
    pub async fn seed_defaults(&self) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        let now = Utc::now().timestamp();

        let network = Network::default_network();
        sqlx::query("INSERT OR IGNORE INTO networks (name, body, created_at) VALUES (?, ?, ?)")
            .bind(&network.name)
            .bind(serde_json::to_string(&network)?)
            .bind(now)
            .execute(&mut *tx)
            .await?;

        let pool = StoragePool::default_pool();
        sqlx::query("INSERT OR IGNORE INTO storagepools (name, body, created_at) VALUES (?, ?, ?)")
            .bind(&pool.name)
            .bind(serde_json::to_string(&pool)?)
            .bind(now)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        tracing::info!(network = %network.name, pool = %pool.name, "Default resources ready");
        Ok(())
    }
}

#[derive(sqlx::FromRow)]
struct DocumentRow {
    body: String,
    created_at: i64,
}

/// Load one JSON document by name from `table`, with its creation time
async fn fetch_document<T: DeserializeOwned>(
    conn: &mut SqliteConnection,
    table: &'static str,
    name: &str,
) -> Result<Option<(T, i64)>> {
    let query = format!("SELECT body, created_at FROM {} WHERE name = ?", table);
    let row = sqlx::query_as::<_, DocumentRow>(&query)
        .bind(name)
        .fetch_optional(&mut *conn)
        .await?;

    match row {
        Some(row) => Ok(Some((serde_json::from_str(&row.body)?, row.created_at))),
        None => Ok(None),
    }
}

async fn fetch_all_documents<T: DeserializeOwned>(
    conn: &mut SqliteConnection,
    table: &'static str,
) -> Result<Vec<T>> {
    let query = format!("SELECT body, created_at FROM {} ORDER BY created_at, name", table);
    let rows = sqlx::query_as::<_, DocumentRow>(&query)
        .fetch_all(&mut *conn)
        .await?;

    rows.into_iter()
        .map(|row| serde_json::from_str(&row.body).map_err(Into::into))
        .collect()
}

async fn document_exists(
    conn: &mut SqliteConnection,
    table: &'static str,
    name: &str,
) -> Result<bool> {
    let query = format!("SELECT COUNT(*) FROM {} WHERE name = ?", table);
    let (count,): (i64,) = sqlx::query_as(&query)
        .bind(name)
        .fetch_one(&mut *conn)
        .await?;
    Ok(count > 0)
}

async fn document_names(conn: &mut SqliteConnection, table: &'static str) -> Result<HashSet<String>> {
    let query = format!("SELECT name FROM {}", table);
    let rows: Vec<(String,)> = sqlx::query_as(&query).fetch_all(&mut *conn).await?;
    Ok(rows.into_iter().map(|(name,)| name).collect())
}

/// Insert or overwrite a network / storage pool document
async fn write_resource<T: Serialize>(
    conn: &mut SqliteConnection,
    table: &'static str,
    name: &str,
    resource: &T,
    created_at: i64,
) -> Result<()> {
    let query = format!(
        "INSERT INTO {} (name, body, created_at) VALUES (?, ?, ?)
         ON CONFLICT(name) DO UPDATE SET body = excluded.body",
        table
    );
    sqlx::query(&query)
        .bind(name)
        .bind(serde_json::to_string(resource)?)
        .bind(created_at)
        .execute(&mut *conn)
        .await?;
    Ok(())
}

async fn delete_document(conn: &mut SqliteConnection, table: &'static str, name: &str) -> Result<()> {
    let query = format!("DELETE FROM {} WHERE name = ?", table);
    sqlx::query(&query).bind(name).execute(&mut *conn).await?;
    Ok(())
}
