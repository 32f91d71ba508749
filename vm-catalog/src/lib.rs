//! Template catalog business logic
//!
//! This crate owns VM templates and the networks and storage pools they
//! reference. It validates and merges template payloads, keeps a reverse
//! index of which templates use which resources, and refuses to delete a
//! resource while a template still points at it. It is consumed by the
//! vm-catalog-api HTTP service.

pub mod catalog;
pub mod db;
pub mod error;
pub mod host;
pub mod media;
pub mod messages;
pub mod network;
pub mod refs;
pub mod resource;
pub mod storagepool;
pub mod template;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use catalog::Catalog;
pub use error::{CatalogError, Result};
pub use host::HostProfile;
pub use media::{FsMediaInspector, MediaInspector, MediaKind};
pub use network::{CreateNetworkRequest, Network, NetworkInfo};
pub use resource::ResourceState;
pub use storagepool::{
    CreateStoragePoolRequest, StoragePool, StoragePoolInfo, StorageVolume,
    UpdateStoragePoolRequest,
};
pub use template::{
    CreateTemplateRequest, Template, TemplateInfo, UpdateOutcome, UpdateTemplateRequest,
};
