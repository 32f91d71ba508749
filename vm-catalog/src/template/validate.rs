//! Record-level checks run on a template after defaults or merges are applied.
//!
//! These are pure: they only look at the record and the host profile.
//! Checks that need the network and pool registries live in the catalog.

use super::{CpuInfo, Graphics, Memory, Template};
use crate::error::{CatalogError, Result};
use crate::host::{format_mib, HostProfile};
use crate::messages;
use crate::reason;
use std::net::IpAddr;

const REMOTE_SCHEMES: [&str; 4] = ["http", "https", "ftp", "ftps"];

/// Names are used as path segments, so they can not be empty or contain `/`
pub fn validate_name(kind: &str, name: &str) -> Result<()> {
    if name.trim().is_empty() || name.contains('/') {
        return Err(CatalogError::InvalidParameter(reason!(
            messages::INVALID_NAME,
            kind = kind,
            name = name
        )));
    }
    Ok(())
}

/// Check memory against the host and the platform ceiling.
///
/// Host memory is checked first so the reported limit is the one a client
/// can act on.
pub fn validate_memory(memory: &Memory, host: &HostProfile) -> Result<()> {
    if memory.current > host.total_memory_mib {
        return Err(CatalogError::InvalidParameter(reason!(
            messages::VM_MEMORY_ABOVE_HOST,
            mem = memory.current,
            maxmem = host.total_memory_mib
        )));
    }

    if memory.maxmemory > host.max_memory_mib {
        return Err(CatalogError::InvalidParameter(reason!(
            messages::VM_MAXMEMORY_ABOVE_LIMIT,
            maxmem = memory.maxmemory,
            value = format_mib(host.max_memory_mib)
        )));
    }

    if memory.current > memory.maxmemory {
        return Err(CatalogError::InvalidParameter(reason!(
            messages::TEMPLATE_MEMORY_ABOVE_MAX,
            mem = memory.current,
            maxmem = memory.maxmemory
        )));
    }

    Ok(())
}

pub fn validate_cpu_info(cpu_info: &CpuInfo, host: &HostProfile) -> Result<()> {
    if cpu_info.maxvcpus > host.max_vcpus {
        return Err(CatalogError::InvalidParameter(reason!(
            messages::CPU_MAXVCPUS_ABOVE_HOST,
            maxvcpus = cpu_info.maxvcpus,
            limit = host.max_vcpus
        )));
    }

    if cpu_info.vcpus > cpu_info.maxvcpus {
        return Err(CatalogError::InvalidParameter(reason!(
            messages::CPU_VCPUS_ABOVE_MAX,
            vcpus = cpu_info.vcpus,
            maxvcpus = cpu_info.maxvcpus
        )));
    }

    if let Some(topology) = cpu_info.topology {
        let product = topology.sockets as u64 * topology.cores as u64 * topology.threads as u64;
        if topology.threads == 0
            || product != cpu_info.maxvcpus as u64
            || cpu_info.vcpus % topology.threads != 0
        {
            return Err(CatalogError::InvalidParameter(reason!(
                messages::CPU_INVALID_TOPOLOGY,
                maxvcpus = cpu_info.maxvcpus,
                vcpus = cpu_info.vcpus,
                threads = topology.threads
            )));
        }
    }

    Ok(())
}

pub fn validate_graphics(graphics: &Graphics) -> Result<()> {
    if graphics.listen.parse::<IpAddr>().is_err() {
        return Err(CatalogError::InvalidParameter(reason!(
            messages::TEMPLATE_INVALID_GRAPHICS,
            field = "listen",
            value = &graphics.listen
        )));
    }
    Ok(())
}

/// Whether media lives behind a URL rather than on the host filesystem
pub fn is_remote_media(path: &str) -> bool {
    url::Url::parse(path)
        .map(|url| REMOTE_SCHEMES.contains(&url.scheme()) && url.host().is_some())
        .unwrap_or(false)
}

/// Run every registry-independent check on a complete record
pub fn validate_template(template: &Template, host: &HostProfile) -> Result<()> {
    validate_name("template", &template.name)?;
    validate_memory(&template.memory, host)?;
    validate_cpu_info(&template.cpu_info, host)?;
    validate_graphics(&template.graphics)?;
    Ok(())
}
