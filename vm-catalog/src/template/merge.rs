//! Partial update merging.
//!
//! Top-level scalars and lists replace the stored value when present. The
//! nested `memory`, `cpu_info` and `graphics` objects merge key by key, so a
//! payload that only carries `graphics.listen` keeps the stored
//! `graphics.type`.

use super::{
    CpuInfo, CpuInfoPatch, Disk, Graphics, GraphicsPatch, GraphicsType, Memory, MemoryPatch,
    Template, UpdateTemplateRequest,
};
use crate::error::Result;

impl MemoryPatch {
    pub fn merge_into(&self, memory: &mut Memory) {
        if let Some(current) = self.current {
            memory.current = current;
        }
        if let Some(maxmemory) = self.maxmemory {
            memory.maxmemory = maxmemory;
        }
    }
}

impl CpuInfoPatch {
    pub fn merge_into(&self, cpu_info: &mut CpuInfo) {
        if let Some(vcpus) = self.vcpus {
            cpu_info.vcpus = vcpus;
        }
        if let Some(maxvcpus) = self.maxvcpus {
            cpu_info.maxvcpus = maxvcpus;
        }
        if let Some(topology) = self.topology {
            cpu_info.topology = Some(topology);
        }
    }
}

impl GraphicsPatch {
    pub fn merge_into(&self, graphics: &mut Graphics) -> Result<()> {
        if let Some(kind) = &self.kind {
            graphics.kind = kind.parse::<GraphicsType>()?;
        }
        if let Some(listen) = &self.listen {
            graphics.listen = listen.clone();
        }
        Ok(())
    }
}

/// Drop repeated network names, keeping first occurrence order
pub fn dedup_networks(networks: &[String]) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    networks
        .iter()
        .filter(|name| seen.insert(name.as_str()))
        .cloned()
        .collect()
}

/// Apply an update payload to a stored template.
///
/// `disks` is the already normalized replacement list, since resolving pool
/// types needs the pool registry.
pub fn merge_update(
    current: &Template,
    update: &UpdateTemplateRequest,
    disks: Option<Vec<Disk>>,
) -> Result<Template> {
    let mut merged = current.clone();

    if let Some(name) = &update.name {
        merged.name = name.clone();
    }
    if let Some(os_distro) = &update.os_distro {
        merged.os_distro = os_distro.clone();
    }
    if let Some(os_version) = &update.os_version {
        merged.os_version = os_version.clone();
    }
    if let Some(icon) = &update.icon {
        merged.icon = icon.clone();
    }
    if let Some(cdrom) = &update.cdrom {
        merged.cdrom = cdrom.clone();
    }
    if let Some(folder) = &update.folder {
        merged.folder = folder.clone();
    }
    if let Some(networks) = &update.networks {
        merged.networks = dedup_networks(networks);
    }
    if let Some(disks) = disks {
        merged.disks = disks;
    }

    if let Some(memory) = &update.memory {
        memory.merge_into(&mut merged.memory);
    }
    if let Some(cpu_info) = &update.cpu_info {
        cpu_info.merge_into(&mut merged.cpu_info);
    }
    if let Some(graphics) = &update.graphics {
        graphics.merge_into(&mut merged.graphics)?;
    }

    Ok(merged)
}
