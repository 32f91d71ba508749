//! Host capabilities the template limits are checked against.

use serde::Serialize;
use sysinfo::System;

/// Maximum memory a guest may be configured with on x86 and most other
/// architectures: 4 TiB, in MiB.
pub const MAX_MEM_LIM: u64 = 4 * 1024 * 1024;

/// PowerPC guests may address four times as much.
pub const MAX_MEM_LIM_PPC64: u64 = 4 * MAX_MEM_LIM;

/// Upper bound of vCPUs a single guest may be defined with.
pub const MAX_VCPUS: u32 = 255;

/// Memory ceiling in MiB for guests on the given architecture
pub fn platform_memory_limit(arch: &str) -> u64 {
    match arch {
        "powerpc64" | "ppc64" | "ppc64le" => MAX_MEM_LIM_PPC64,
        _ => MAX_MEM_LIM,
    }
}

/// Render a MiB quantity the way limits are reported to clients.
pub fn format_mib(mib: u64) -> String {
    const TIB: u64 = 1024 * 1024;
    const GIB: u64 = 1024;
    if mib >= TIB && mib % TIB == 0 {
        format!("{} TiB", mib / TIB)
    } else if mib >= GIB && mib % GIB == 0 {
        format!("{} GiB", mib / GIB)
    } else {
        format!("{} MiB", mib)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HostProfile {
    pub arch: String,
    /// Physical memory of the host, in MiB
    pub total_memory_mib: u64,
    /// Platform ceiling for `memory.maxmemory`, in MiB
    pub max_memory_mib: u64,
    pub max_vcpus: u32,
}

impl HostProfile {
    /// Probe the running host
    pub fn detect() -> Self {
        let mut sys = System::new();
        sys.refresh_memory();
        let arch = std::env::consts::ARCH.to_string();
        let total_memory_mib = sys.total_memory() >> 20;

        tracing::debug!(arch = %arch, total_memory_mib, "Detected host profile");

        Self {
            max_memory_mib: platform_memory_limit(&arch),
            arch,
            total_memory_mib,
            max_vcpus: MAX_VCPUS,
        }
    }

    /// A host with a fixed amount of memory, used when the real host must not leak in
    pub fn fixed(arch: &str, total_memory_mib: u64) -> Self {
        Self {
            arch: arch.to_string(),
            total_memory_mib,
            max_memory_mib: platform_memory_limit(arch),
            max_vcpus: MAX_VCPUS,
        }
    }
}
