//! Storage pool records.

use crate::error::{CatalogError, Result};
use crate::messages;
use crate::reason;
use crate::resource::ResourceState;
use crate::template::validate::validate_name;
use serde::{Deserialize, Serialize};
use std::fmt::{self, Display, Formatter};
use std::str::FromStr;
use utoipa::ToSchema;

pub const DEFAULT_POOL: &str = "default";
pub const DEFAULT_POOL_PATH: &str = "/var/lib/libvirt/images";

/// LUNs a freshly attached SCSI or iSCSI target exposes
const TARGET_UNITS: [&str; 2] = ["unit:0:0:1", "unit:0:0:2"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum PoolType {
    Dir,
    Netfs,
    Scsi,
    Iscsi,
    Logical,
}

impl PoolType {
    const ALL: [PoolType; 5] = [
        PoolType::Dir,
        PoolType::Netfs,
        PoolType::Scsi,
        PoolType::Iscsi,
        PoolType::Logical,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PoolType::Dir => "dir",
            PoolType::Netfs => "netfs",
            PoolType::Scsi => "scsi",
            PoolType::Iscsi => "iscsi",
            PoolType::Logical => "logical",
        }
    }

    /// Pools whose volumes are provisioned outside the catalog; template
    /// disks on them must reference an existing volume.
    pub fn is_readonly(&self) -> bool {
        matches!(self, PoolType::Scsi | PoolType::Iscsi)
    }
}

impl Display for PoolType {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PoolType {
    type Err = CatalogError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        PoolType::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| {
                CatalogError::InvalidParameter(reason!(messages::POOL_INVALID_TYPE, kind = s))
            })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct PoolSource {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub adapter_name: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub devices: Vec<String>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub from_vg: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoragePool {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: PoolType,
    pub path: Option<String>,
    pub source: Option<PoolSource>,
    pub state: ResourceState,
    pub autostart: bool,
    pub volumes: Vec<String>,
}

impl StoragePool {
    /// The directory pool every fresh catalog starts with
    pub fn default_pool() -> Self {
        Self {
            name: DEFAULT_POOL.to_string(),
            kind: PoolType::Dir,
            path: Some(DEFAULT_POOL_PATH.to_string()),
            source: None,
            state: ResourceState::Active,
            autostart: true,
            volumes: Vec::new(),
        }
    }

    pub fn info(&self, in_use: bool) -> StoragePoolInfo {
        StoragePoolInfo {
            name: self.name.clone(),
            kind: self.kind,
            path: self.path.clone(),
            source: self.source.clone(),
            state: self.state,
            autostart: self.autostart,
            nr_volumes: self.volumes.len(),
            in_use,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct StoragePoolInfo {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: PoolType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<PoolSource>,
    pub state: ResourceState,
    pub autostart: bool,
    pub nr_volumes: usize,
    /// Whether any template disk lives on this pool
    pub in_use: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct StorageVolume {
    pub name: String,
    pub pool: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct CreateStoragePoolRequest {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<PoolSource>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub autostart: Option<bool>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct UpdateStoragePoolRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub autostart: Option<bool>,
    /// Devices to add to a logical pool
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub disks: Option<Vec<String>>,
}

fn missing_field(name: &str, kind: PoolType, field: &str) -> CatalogError {
    CatalogError::InvalidParameter(reason!(
        messages::POOL_MISSING_FIELD,
        name = name,
        kind = kind,
        field = field
    ))
}

fn has_value(value: &Option<String>) -> bool {
    value.as_deref().is_some_and(|v| !v.trim().is_empty())
}

/// Validate a create request and build the inactive pool it describes
pub fn build_pool(req: &CreateStoragePoolRequest) -> Result<StoragePool> {
    validate_name("storage pool", &req.name)?;
    let kind: PoolType = req.kind.parse()?;
    let source = req.source.clone().unwrap_or_default();

    match kind {
        PoolType::Dir => {
            if !has_value(&req.path) {
                return Err(missing_field(&req.name, kind, "path"));
            }
        }
        PoolType::Netfs => {
            if !has_value(&source.host) {
                return Err(missing_field(&req.name, kind, "source.host"));
            }
            if !has_value(&source.path) {
                return Err(missing_field(&req.name, kind, "source.path"));
            }
        }
        PoolType::Scsi => {
            if !has_value(&source.adapter_name) {
                return Err(missing_field(&req.name, kind, "source.adapter_name"));
            }
        }
        PoolType::Iscsi => {
            if !has_value(&source.host) {
                return Err(missing_field(&req.name, kind, "source.host"));
            }
            if !has_value(&source.target) {
                return Err(missing_field(&req.name, kind, "source.target"));
            }
        }
        PoolType::Logical => {
            if source.devices.is_empty() && !source.from_vg {
                return Err(missing_field(&req.name, kind, "source.devices"));
            }
        }
    }

    let volumes = if kind.is_readonly() {
        TARGET_UNITS.iter().map(|unit| unit.to_string()).collect()
    } else {
        Vec::new()
    };

    Ok(StoragePool {
        name: req.name.clone(),
        kind,
        path: req.path.clone(),
        source: req.source.clone(),
        state: ResourceState::Inactive,
        autostart: req.autostart.unwrap_or(false),
        volumes,
    })
}

/// Apply an update payload; only logical pools can be extended with devices
pub fn apply_pool_update(pool: &mut StoragePool, update: &UpdateStoragePoolRequest) -> Result<()> {
    if let Some(devices) = &update.disks {
        if pool.kind != PoolType::Logical {
            return Err(CatalogError::InvalidOperation(reason!(
                messages::POOL_NOT_EXTENSIBLE,
                name = &pool.name,
                kind = pool.kind
            )));
        }

        let source = pool.source.get_or_insert_with(PoolSource::default);
        for device in devices {
            if !source.devices.contains(device) {
                source.devices.push(device.clone());
            }
        }
    }

    if let Some(autostart) = update.autostart {
        pool.autostart = autostart;
    }

    Ok(())
}
