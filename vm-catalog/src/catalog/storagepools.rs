use super::{
    delete_document, document_exists, fetch_all_documents, fetch_document, write_resource,
    Catalog, STORAGEPOOLS,
};
use crate::error::{CatalogError, Result};
use crate::messages;
use crate::reason;
use crate::refs::{self, ReferenceKind};
use crate::resource::ResourceState;
use crate::storagepool::{
    apply_pool_update, build_pool, CreateStoragePoolRequest, StoragePool, StoragePoolInfo,
    StorageVolume, UpdateStoragePoolRequest,
};
use chrono::Utc;
use sqlx::SqliteConnection;
use tracing::{info, instrument};

fn not_found(name: &str) -> CatalogError {
    CatalogError::NotFound(reason!(messages::POOL_NOT_FOUND, name = name))
}

async fn pool_info(conn: &mut SqliteConnection, pool: &StoragePool) -> Result<StoragePoolInfo> {
    let users = refs::referencing_templates(conn, ReferenceKind::StoragePool, &pool.name).await?;
    Ok(pool.info(!users.is_empty()))
}

async fn load_pool(conn: &mut SqliteConnection, name: &str) -> Result<(StoragePool, i64)> {
    fetch_document::<StoragePool>(conn, STORAGEPOOLS, name)
        .await?
        .ok_or_else(|| not_found(name))
}

impl Catalog {
    #[instrument(skip(self))]
    pub async fn list_storagepools(&self) -> Result<Vec<StoragePoolInfo>> {
        let mut conn = self.pool.acquire().await?;
        let pools: Vec<StoragePool> = fetch_all_documents(&mut conn, STORAGEPOOLS).await?;

        let mut infos = Vec::with_capacity(pools.len());
        for pool in &pools {
            infos.push(pool_info(&mut conn, pool).await?);
        }
        Ok(infos)
    }

    #[instrument(skip(self))]
    pub async fn get_storagepool(&self, name: &str) -> Result<StoragePoolInfo> {
        let mut conn = self.pool.acquire().await?;
        let (pool, _) = load_pool(&mut conn, name).await?;
        pool_info(&mut conn, &pool).await
    }

    #[instrument(skip(self, req), fields(name = %req.name))]
    pub async fn create_storagepool(&self, req: CreateStoragePoolRequest) -> Result<StoragePoolInfo> {
        let pool = build_pool(&req)?;

        let mut tx = self.pool.begin().await?;
        if document_exists(&mut tx, STORAGEPOOLS, &pool.name).await? {
            return Err(CatalogError::InvalidParameter(reason!(
                messages::POOL_EXISTS,
                name = &pool.name
            )));
        }

        write_resource(&mut tx, STORAGEPOOLS, &pool.name, &pool, Utc::now().timestamp()).await?;
        let info = pool_info(&mut tx, &pool).await?;
        tx.commit().await?;

        info!(pool = %pool.name, kind = %pool.kind, "Storage pool created");
        Ok(info)
    }

    /// Change autostart or extend a logical pool with more devices
    #[instrument(skip(self, update))]
    pub async fn update_storagepool(
        &self,
        name: &str,
        update: UpdateStoragePoolRequest,
    ) -> Result<StoragePoolInfo> {
        let mut tx = self.pool.begin().await?;
        let (mut pool, created_at) = load_pool(&mut tx, name).await?;

        apply_pool_update(&mut pool, &update)?;
        write_resource(&mut tx, STORAGEPOOLS, name, &pool, created_at).await?;
        let info = pool_info(&mut tx, &pool).await?;
        tx.commit().await?;

        info!(pool = %name, "Storage pool updated");
        Ok(info)
    }

    pub async fn activate_storagepool(&self, name: &str) -> Result<StoragePoolInfo> {
        self.set_pool_state(name, ResourceState::Active).await
    }

    pub async fn deactivate_storagepool(&self, name: &str) -> Result<StoragePoolInfo> {
        self.set_pool_state(name, ResourceState::Inactive).await
    }

    #[instrument(skip(self))]
    async fn set_pool_state(&self, name: &str, state: ResourceState) -> Result<StoragePoolInfo> {
        let mut tx = self.pool.begin().await?;
        let (mut pool, created_at) = load_pool(&mut tx, name).await?;

        pool.state = state;
        write_resource(&mut tx, STORAGEPOOLS, name, &pool, created_at).await?;
        let info = pool_info(&mut tx, &pool).await?;
        tx.commit().await?;

        info!(pool = %name, ?state, "Storage pool state changed");
        Ok(info)
    }

    #[instrument(skip(self))]
    pub async fn list_storagevolumes(&self, name: &str) -> Result<Vec<StorageVolume>> {
        let mut conn = self.pool.acquire().await?;
        let (pool, _) = load_pool(&mut conn, name).await?;

        Ok(pool
            .volumes
            .iter()
            .map(|volume| StorageVolume {
                name: volume.clone(),
                pool: pool.name.clone(),
            })
            .collect())
    }

    /// Delete a storage pool no template disk lives on
    #[instrument(skip(self))]
    pub async fn delete_storagepool(&self, name: &str) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        let (pool, _) = load_pool(&mut tx, name).await?;

        let users = refs::referencing_templates(&mut tx, ReferenceKind::StoragePool, name).await?;
        if !users.is_empty() {
            return Err(CatalogError::InvalidOperation(reason!(
                messages::POOL_IN_USE,
                name = name,
                templates = users.join(", ")
            )));
        }
        if pool.state.is_active() {
            return Err(CatalogError::InvalidOperation(reason!(
                messages::POOL_ACTIVE,
                name = name
            )));
        }

        delete_document(&mut tx, STORAGEPOOLS, name).await?;
        tx.commit().await?;

        info!(pool = %name, "Storage pool deleted");
        Ok(())
    }
}
