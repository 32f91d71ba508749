use super::{
    delete_document, fetch_all_documents, fetch_document, write_resource, Catalog, NETWORKS,
};
use crate::error::{CatalogError, Result};
use crate::messages;
use crate::network::{build_network, CreateNetworkRequest, Network, NetworkInfo};
use crate::reason;
use crate::refs::{self, ReferenceKind};
use crate::resource::ResourceState;
use chrono::Utc;
use sqlx::SqliteConnection;
use tracing::{info, instrument};

fn not_found(name: &str) -> CatalogError {
    CatalogError::NotFound(reason!(messages::NETWORK_NOT_FOUND, name = name))
}

async fn network_info(conn: &mut SqliteConnection, network: Network) -> Result<NetworkInfo> {
    let users = refs::referencing_templates(conn, ReferenceKind::Network, &network.name).await?;
    Ok(NetworkInfo {
        network,
        in_use: !users.is_empty(),
    })
}

impl Catalog {
    #[instrument(skip(self))]
    pub async fn list_networks(&self) -> Result<Vec<NetworkInfo>> {
        let mut conn = self.pool.acquire().await?;
        let networks: Vec<Network> = fetch_all_documents(&mut conn, NETWORKS).await?;

        let mut infos = Vec::with_capacity(networks.len());
        for network in networks {
            infos.push(network_info(&mut conn, network).await?);
        }
        Ok(infos)
    }

    #[instrument(skip(self))]
    pub async fn get_network(&self, name: &str) -> Result<NetworkInfo> {
        let mut conn = self.pool.acquire().await?;
        let (network, _) = fetch_document::<Network>(&mut conn, NETWORKS, name)
            .await?
            .ok_or_else(|| not_found(name))?;
        network_info(&mut conn, network).await
    }

    #[instrument(skip(self, req), fields(name = %req.name))]
    pub async fn create_network(&self, req: CreateNetworkRequest) -> Result<NetworkInfo> {
        let mut tx = self.pool.begin().await?;
        if fetch_document::<Network>(&mut tx, NETWORKS, &req.name)
            .await?
            .is_some()
        {
            return Err(CatalogError::InvalidParameter(reason!(
                messages::NETWORK_EXISTS,
                name = &req.name
            )));
        }

        let existing: Vec<Network> = fetch_all_documents(&mut tx, NETWORKS).await?;
        let used_subnets: Vec<_> = existing.iter().filter_map(Network::subnet_net).collect();
        let network = build_network(&req, &used_subnets)?;

        write_resource(&mut tx, NETWORKS, &network.name, &network, Utc::now().timestamp()).await?;
        let info = network_info(&mut tx, network).await?;
        tx.commit().await?;

        info!(network = %info.network.name, connection = %info.network.connection, "Network created");
        Ok(info)
    }

    pub async fn activate_network(&self, name: &str) -> Result<NetworkInfo> {
        self.set_network_state(name, ResourceState::Active).await
    }

    pub async fn deactivate_network(&self, name: &str) -> Result<NetworkInfo> {
        self.set_network_state(name, ResourceState::Inactive).await
    }

    #[instrument(skip(self))]
    async fn set_network_state(&self, name: &str, state: ResourceState) -> Result<NetworkInfo> {
        let mut tx = self.pool.begin().await?;
        let (mut network, created_at) = fetch_document::<Network>(&mut tx, NETWORKS, name)
            .await?
            .ok_or_else(|| not_found(name))?;

        network.state = state;
        write_resource(&mut tx, NETWORKS, name, &network, created_at).await?;
        let info = network_info(&mut tx, network).await?;
        tx.commit().await?;

        info!(network = %name, ?state, "Network state changed");
        Ok(info)
    }

    /// Delete a network no template references
    #[instrument(skip(self))]
    pub async fn delete_network(&self, name: &str) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        let (network, _) = fetch_document::<Network>(&mut tx, NETWORKS, name)
            .await?
            .ok_or_else(|| not_found(name))?;

        let users = refs::referencing_templates(&mut tx, ReferenceKind::Network, name).await?;
        if !users.is_empty() {
            return Err(CatalogError::InvalidOperation(reason!(
                messages::NETWORK_IN_USE,
                name = name,
                templates = users.join(", ")
            )));
        }
        if network.state.is_active() {
            return Err(CatalogError::InvalidOperation(reason!(
                messages::NETWORK_ACTIVE,
                name = name
            )));
        }

        delete_document(&mut tx, NETWORKS, name).await?;
        tx.commit().await?;

        info!(network = %name, "Network deleted");
        Ok(())
    }
}
