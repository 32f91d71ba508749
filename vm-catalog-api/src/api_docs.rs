use utoipa::OpenApi;
use vm_catalog::network::Connection;
use vm_catalog::storagepool::{PoolSource, PoolType};
use vm_catalog::template::{
    CpuInfo, CpuInfoPatch, Disk, DiskFormat, DiskRequest, Graphics, GraphicsPatch, GraphicsType,
    Memory, MemoryPatch, PoolRef, PoolRefRequest, SourceMedia, Topology,
};
use vm_catalog::{
    CreateNetworkRequest, CreateStoragePoolRequest, CreateTemplateRequest, Network, NetworkInfo,
    ResourceState, StoragePoolInfo, StorageVolume, Template, TemplateInfo,
    UpdateStoragePoolRequest, UpdateTemplateRequest,
};

#[derive(OpenApi)]
#[openapi(
    paths(
        crate::routes::health::health_check,
        crate::routes::health::readiness_check,
        crate::routes::templates::list_templates,
        crate::routes::templates::create_template,
        crate::routes::templates::get_template,
        crate::routes::templates::update_template,
        crate::routes::templates::delete_template,
        crate::routes::templates::clone_template,
        crate::routes::networks::list_networks,
        crate::routes::networks::create_network,
        crate::routes::networks::get_network,
        crate::routes::networks::activate_network,
        crate::routes::networks::deactivate_network,
        crate::routes::networks::delete_network,
        crate::routes::storagepools::list_storagepools,
        crate::routes::storagepools::create_storagepool,
        crate::routes::storagepools::get_storagepool,
        crate::routes::storagepools::update_storagepool,
        crate::routes::storagepools::activate_storagepool,
        crate::routes::storagepools::deactivate_storagepool,
        crate::routes::storagepools::list_storagevolumes,
        crate::routes::storagepools::delete_storagepool,
    ),
    components(
        schemas(
            Template,
            TemplateInfo,
            CreateTemplateRequest,
            UpdateTemplateRequest,
            SourceMedia,
            Memory,
            MemoryPatch,
            CpuInfo,
            CpuInfoPatch,
            Topology,
            Disk,
            DiskRequest,
            DiskFormat,
            PoolRef,
            PoolRefRequest,
            Graphics,
            GraphicsPatch,
            GraphicsType,
            Network,
            NetworkInfo,
            CreateNetworkRequest,
            Connection,
            StoragePoolInfo,
            CreateStoragePoolRequest,
            UpdateStoragePoolRequest,
            StorageVolume,
            PoolSource,
            PoolType,
            ResourceState
        )
    ),
    tags(
        (name = "vm-catalog-api", description = "VM Template Catalog API")
    )
)]
pub struct ApiDoc;
