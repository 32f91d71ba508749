//! Template records and the request payloads that create and modify them.

pub mod merge;
pub mod validate;

use crate::error::CatalogError;
use crate::messages;
use crate::reason;
use crate::storagepool::PoolType;
use percent_encoding::percent_decode_str;
use serde::de::{Deserializer, Error as _};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt::{self, Display, Formatter};
use std::str::FromStr;
use utoipa::ToSchema;

/// Base path storage pools are addressed by in disk pool references
pub const STORAGEPOOLS_URI: &str = "/api/v1/storagepools";

pub const DEFAULT_MEMORY_MIB: u64 = 1024;
pub const DEFAULT_DISK_SIZE_GIB: u64 = 10;
pub const DEFAULT_LISTEN: &str = "127.0.0.1";

/// Build the reference a disk uses to point at a storage pool
pub fn pool_uri(name: &str) -> String {
    format!("{}/{}", STORAGEPOOLS_URI, name)
}

/// Resolve a disk pool reference (`/api/v1/storagepools/foo` or `foo`) to the pool name
pub fn pool_name_from_ref(reference: &str) -> &str {
    let trimmed = reference.trim_end_matches('/');
    trimmed.rsplit('/').next().unwrap_or(trimmed)
}

/// Pool name a client-supplied reference points at.
///
/// Clients may pass back the percent-encoded `Location` of a pool, so the
/// last segment is decoded before the registry lookup.
pub fn decode_pool_ref(reference: &str) -> String {
    percent_decode_str(pool_name_from_ref(reference))
        .decode_utf8_lossy()
        .into_owned()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum DiskFormat {
    Qcow,
    Qcow2,
    Qed,
    Raw,
    Vmdk,
    Vpc,
}

impl DiskFormat {
    pub const ALL: [DiskFormat; 6] = [
        DiskFormat::Qcow,
        DiskFormat::Qcow2,
        DiskFormat::Qed,
        DiskFormat::Raw,
        DiskFormat::Vmdk,
        DiskFormat::Vpc,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            DiskFormat::Qcow => "qcow",
            DiskFormat::Qcow2 => "qcow2",
            DiskFormat::Qed => "qed",
            DiskFormat::Raw => "raw",
            DiskFormat::Vmdk => "vmdk",
            DiskFormat::Vpc => "vpc",
        }
    }
}

impl Display for DiskFormat {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DiskFormat {
    type Err = CatalogError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        DiskFormat::ALL
            .into_iter()
            .find(|format| format.as_str() == s)
            .ok_or_else(|| {
                CatalogError::InvalidParameter(reason!(
                    messages::TEMPLATE_INVALID_DISK_FORMAT,
                    format = s
                ))
            })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum GraphicsType {
    Vnc,
    Spice,
}

impl FromStr for GraphicsType {
    type Err = CatalogError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "vnc" => Ok(GraphicsType::Vnc),
            "spice" => Ok(GraphicsType::Spice),
            other => Err(CatalogError::InvalidParameter(reason!(
                messages::TEMPLATE_INVALID_GRAPHICS,
                field = "type",
                value = other
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Memory {
    /// MiB assigned at boot
    pub current: u64,
    /// MiB the guest may grow to
    pub maxmemory: u64,
}

impl Default for Memory {
    fn default() -> Self {
        Self {
            current: DEFAULT_MEMORY_MIB,
            maxmemory: DEFAULT_MEMORY_MIB,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Topology {
    pub sockets: u32,
    pub cores: u32,
    pub threads: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct CpuInfo {
    pub vcpus: u32,
    pub maxvcpus: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub topology: Option<Topology>,
}

impl Default for CpuInfo {
    fn default() -> Self {
        Self {
            vcpus: 1,
            maxvcpus: 1,
            topology: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct PoolRef {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: PoolType,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Disk {
    pub index: u32,
    /// GiB; absent for disks backed by a pre-provisioned volume
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    pub format: DiskFormat,
    pub pool: PoolRef,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub volume: Option<String>,
    /// Base image the disk is cloned from
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Graphics {
    #[serde(rename = "type")]
    pub kind: GraphicsType,
    pub listen: String,
}

impl Default for Graphics {
    fn default() -> Self {
        Self {
            kind: GraphicsType::Vnc,
            listen: DEFAULT_LISTEN.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Template {
    pub name: String,
    pub os_distro: String,
    pub os_version: String,
    pub icon: String,
    pub memory: Memory,
    pub cpu_info: CpuInfo,
    pub cdrom: Option<String>,
    pub disks: Vec<Disk>,
    pub networks: Vec<String>,
    pub graphics: Graphics,
    pub folder: Vec<String>,
}

impl Template {
    /// Names of the networks this template attaches to
    pub fn referenced_networks(&self) -> BTreeSet<&str> {
        self.networks.iter().map(String::as_str).collect()
    }

    /// Names of the storage pools backing this template's disks
    pub fn referenced_pools(&self) -> BTreeSet<&str> {
        self.disks
            .iter()
            .map(|disk| pool_name_from_ref(&disk.pool.name))
            .collect()
    }
}

/// A template as reported to clients, with its derived integrity report
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct TemplateInfo {
    #[serde(flatten)]
    pub template: Template,
    /// Field name to the external references that can no longer be resolved
    pub invalid: BTreeMap<String, Vec<String>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct SourceMedia {
    /// `disk` or `netboot`
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct MemoryPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub maxmemory: Option<u64>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct CpuInfoPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vcpus: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub maxvcpus: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub topology: Option<Topology>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct GraphicsPatch {
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub listen: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct PoolRefRequest {
    /// Pool URI or bare pool name
    pub name: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct DiskRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pool: Option<PoolRefRequest>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub volume: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct CreateTemplateRequest {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_media: Option<SourceMedia>,
    /// Shorthand for a `disk` source media pointing at an ISO
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cdrom: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub os_distro: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub os_version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memory: Option<MemoryPatch>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cpu_info: Option<CpuInfoPatch>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub disks: Option<Vec<DiskRequest>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub networks: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub graphics: Option<GraphicsPatch>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub folder: Option<Vec<String>>,
}

/// Present-but-null deserializes to `Some(None)`, a missing key to `None`
fn nullable<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

/// Keys that can only be replaced, never cleared, refuse an explicit `null`
fn non_null<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer)?
        .map(Some)
        .ok_or_else(|| D::Error::custom("null is only accepted for cdrom"))
}

/// Partial update: a present key replaces the stored value; `cdrom: null`
/// clears the CDROM
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct UpdateTemplateRequest {
    #[serde(default, deserialize_with = "non_null", skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "non_null", skip_serializing_if = "Option::is_none")]
    pub os_distro: Option<String>,
    #[serde(default, deserialize_with = "non_null", skip_serializing_if = "Option::is_none")]
    pub os_version: Option<String>,
    #[serde(default, deserialize_with = "non_null", skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    #[serde(default, deserialize_with = "nullable", skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<String>)]
    pub cdrom: Option<Option<String>>,
    #[serde(default, deserialize_with = "non_null", skip_serializing_if = "Option::is_none")]
    pub memory: Option<MemoryPatch>,
    #[serde(default, deserialize_with = "non_null", skip_serializing_if = "Option::is_none")]
    pub cpu_info: Option<CpuInfoPatch>,
    #[serde(default, deserialize_with = "non_null", skip_serializing_if = "Option::is_none")]
    pub disks: Option<Vec<DiskRequest>>,
    #[serde(default, deserialize_with = "non_null", skip_serializing_if = "Option::is_none")]
    pub networks: Option<Vec<String>>,
    #[serde(default, deserialize_with = "non_null", skip_serializing_if = "Option::is_none")]
    pub graphics: Option<GraphicsPatch>,
    #[serde(default, deserialize_with = "non_null", skip_serializing_if = "Option::is_none")]
    pub folder: Option<Vec<String>>,
}

/// Result of applying an update: the stored record and whether it moved
#[derive(Debug, Clone)]
pub struct UpdateOutcome {
    pub template: TemplateInfo,
    pub renamed_from: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pool_name_from_ref() {
        assert_eq!(pool_name_from_ref("/api/v1/storagepools/default"), "default");
        assert_eq!(pool_name_from_ref("/api/v1/storagepools/dir-pool/"), "dir-pool");
        assert_eq!(pool_name_from_ref("bare"), "bare");
        assert_eq!(pool_name_from_ref(&pool_uri("ünïcode")), "ünïcode");
    }

    #[test]
    fn test_update_request_null_handling() {
        let update: UpdateTemplateRequest =
            serde_json::from_value(serde_json::json!({"cdrom": null})).unwrap();
        assert_eq!(update.cdrom, Some(None));

        let update: UpdateTemplateRequest =
            serde_json::from_value(serde_json::json!({"icon": "images/icon-vm.png"})).unwrap();
        assert_eq!(update.cdrom, None);

        for key in ["name", "memory", "graphics", "disks"] {
            let result =
                serde_json::from_value::<UpdateTemplateRequest>(serde_json::json!({ key: null }));
            assert!(result.is_err(), "{} accepted null", key);
        }
    }

    #[test]
    fn test_decode_pool_ref() {
        assert_eq!(
            decode_pool_ref("/api/v1/storagepools/%C3%BCn%C3%AFcode%20pool"),
            "ünïcode pool"
        );
        assert_eq!(decode_pool_ref("/api/v1/storagepools/default"), "default");
        assert_eq!(decode_pool_ref("ünïcode pool"), "ünïcode pool");
    }

    #[test]
    fn test_disk_format_parsing() {
        for format in DiskFormat::ALL {
            assert_eq!(format.as_str().parse::<DiskFormat>().unwrap(), format);
        }
        let err = "vdi".parse::<DiskFormat>().unwrap_err();
        assert_eq!(err.code(), Some("KCHTMPL0027E"));
    }

    #[test]
    fn test_cpu_info_omits_missing_topology() {
        let json = serde_json::to_value(CpuInfo::default()).unwrap();
        assert_eq!(json, serde_json::json!({"vcpus": 1, "maxvcpus": 1}));
    }

    #[test]
    fn test_template_info_flattens_record() {
        let info = TemplateInfo {
            template: Template {
                name: "t1".to_string(),
                os_distro: "unknown".to_string(),
                os_version: "unknown".to_string(),
                icon: "images/icon-vm.png".to_string(),
                memory: Memory::default(),
                cpu_info: CpuInfo::default(),
                cdrom: None,
                disks: vec![],
                networks: vec!["default".to_string()],
                graphics: Graphics::default(),
                folder: vec![],
            },
            invalid: BTreeMap::new(),
        };

        let json = serde_json::to_value(&info).unwrap();
        let mut keys: Vec<_> = json.as_object().unwrap().keys().cloned().collect();
        keys.sort();
        assert_eq!(
            keys,
            vec![
                "cdrom", "cpu_info", "disks", "folder", "graphics", "icon", "invalid", "memory",
                "name", "networks", "os_distro", "os_version"
            ]
        );
        assert!(json["cdrom"].is_null());
    }
}
