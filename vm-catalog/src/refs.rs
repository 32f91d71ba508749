//! Reverse reference index: network / storage pool name -> templates using it.
//!
//! Rows are rewritten inside the transaction that writes the template, so the
//! index never disagrees with the stored records.

use crate::error::Result;
use crate::template::Template;
use sqlx::SqliteConnection;

#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::Type)]
#[sqlx(rename_all = "lowercase")]
pub enum ReferenceKind {
    Network,
    StoragePool,
}

/// Replace every index row owned by `template`
pub(crate) async fn index_template(conn: &mut SqliteConnection, template: &Template) -> Result<()> {
    unindex_template(conn, &template.name).await?;

    for network in template.referenced_networks() {
        insert_reference(conn, &template.name, ReferenceKind::Network, network).await?;
    }
    for pool in template.referenced_pools() {
        insert_reference(conn, &template.name, ReferenceKind::StoragePool, pool).await?;
    }

    Ok(())
}

pub(crate) async fn unindex_template(conn: &mut SqliteConnection, template: &str) -> Result<()> {
    sqlx::query("DELETE FROM template_refs WHERE template = ?")
        .bind(template)
        .execute(&mut *conn)
        .await?;
    Ok(())
}

async fn insert_reference(
    conn: &mut SqliteConnection,
    template: &str,
    kind: ReferenceKind,
    target: &str,
) -> Result<()> {
    sqlx::query("INSERT OR IGNORE INTO template_refs (template, kind, target) VALUES (?, ?, ?)")
        .bind(template)
        .bind(kind)
        .bind(target)
        .execute(&mut *conn)
        .await?;
    Ok(())
}

/// Templates referencing the given network or pool, sorted by name
pub(crate) async fn referencing_templates(
    conn: &mut SqliteConnection,
    kind: ReferenceKind,
    target: &str,
) -> Result<Vec<String>> {
    let rows: Vec<(String,)> = sqlx::query_as(
        "SELECT template FROM template_refs WHERE kind = ? AND target = ? ORDER BY template",
    )
    .bind(kind)
    .bind(target)
    .fetch_all(&mut *conn)
    .await?;

    Ok(rows.into_iter().map(|(name,)| name).collect())
}
