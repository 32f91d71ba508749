//! Central registry for client-facing error messages.
//!
//! Every rejection the catalog reports carries a stable code (`KCH*`) that
//! clients match on, plus a human readable template. Templates use
//! `{variable}` placeholders which are substituted by [`ReasonBuilder`],
//! usually through the [`reason!`](crate::reason) macro:
//!
//! ```rust
//! use vm_catalog::{messages, reason};
//!
//! let reason = reason!(messages::TEMPLATE_EXISTS, name = "fedora");
//! assert_eq!(reason.code, "KCHTMPL0001E");
//! assert_eq!(reason.to_string(), "KCHTMPL0001E: Template fedora already exists");
//! ```

use serde::Serialize;
use std::collections::HashMap;
use std::fmt::{self, Display, Formatter};

/// A stable error code paired with its message template
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ErrorMessage {
    pub code: &'static str,
    pub template: &'static str,
}

/// A rendered message ready to be reported to a client
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Reason {
    pub code: &'static str,
    pub message: String,
}

impl Display for Reason {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

pub struct ReasonBuilder {
    message: ErrorMessage,
    vars: HashMap<&'static str, String>,
}

impl ReasonBuilder {
    pub fn new(message: ErrorMessage) -> Self {
        Self {
            message,
            vars: HashMap::new(),
        }
    }

    pub fn var(mut self, key: &'static str, value: impl ToString) -> Self {
        self.vars.insert(key, value.to_string());
        self
    }

    pub fn build(self) -> Reason {
        let mut rendered = self.message.template.to_string();
        for (key, value) in self.vars {
            rendered = rendered.replace(&format!("{{{key}}}"), &value);
        }
        Reason {
            code: self.message.code,
            message: rendered,
        }
    }
}

/// Render an [`ErrorMessage`] into a [`Reason`], substituting named variables.
#[macro_export]
macro_rules! reason {
    ($message:expr) => {
        $crate::messages::ReasonBuilder::new($message).build()
    };
    ($message:expr, $($key:ident = $value:expr),+ $(,)?) => {
        {
            let mut builder = $crate::messages::ReasonBuilder::new($message);
            $(
                builder = builder.var(stringify!($key), $value);
            )+
            builder.build()
        }
    };
}

// ============================================================================
// Shared
// ============================================================================

pub const INVALID_REQUEST_BODY: ErrorMessage = ErrorMessage {
    code: "KCHAPI0001E",
    template: "Unable to parse request body: {detail}",
};

pub const INTERNAL_ERROR: ErrorMessage = ErrorMessage {
    code: "KCHAPI0002E",
    template: "Internal error: {detail}",
};

pub const INVALID_NAME: ErrorMessage = ErrorMessage {
    code: "KCHAPI0004E",
    template: "Invalid {kind} name '{name}': it must be a non-empty string without '/'",
};

// ============================================================================
// Templates
// ============================================================================

pub const TEMPLATE_EXISTS: ErrorMessage = ErrorMessage {
    code: "KCHTMPL0001E",
    template: "Template {name} already exists",
};

pub const TEMPLATE_NOT_FOUND: ErrorMessage = ErrorMessage {
    code: "KCHTMPL0002E",
    template: "Template {name} does not exist",
};

pub const TEMPLATE_NETWORK_MISSING: ErrorMessage = ErrorMessage {
    code: "KCHTMPL0003E",
    template: "Network '{network}' specified for template {template} does not exist",
};

pub const TEMPLATE_POOL_MISSING: ErrorMessage = ErrorMessage {
    code: "KCHTMPL0004E",
    template: "Storage pool {pool} specified for template {template} does not exist",
};

pub const TEMPLATE_POOL_INACTIVE: ErrorMessage = ErrorMessage {
    code: "KCHTMPL0005E",
    template: "Storage pool {pool} specified for template {template} is not active",
};

pub const TEMPLATE_INVALID_CDROM: ErrorMessage = ErrorMessage {
    code: "KCHTMPL0006E",
    template: "Invalid parameter '{param}' specified for CDROM.",
};

pub const TEMPLATE_INVALID_GRAPHICS: ErrorMessage = ErrorMessage {
    code: "KCHTMPL0011E",
    template: "Invalid graphics {field} '{value}'. Type must be vnc or spice and listen an IP address",
};

pub const TEMPLATE_MISSING_SOURCE: ErrorMessage = ErrorMessage {
    code: "KCHTMPL0016E",
    template: "Specify an ISO image as CDROM or a base image to create a template",
};

pub const TEMPLATE_INVALID_SOURCE_TYPE: ErrorMessage = ErrorMessage {
    code: "KCHTMPL0017E",
    template: "Invalid source media type '{kind}'. Use 'disk' or 'netboot'",
};

pub const TEMPLATE_VOLUME_MISSING: ErrorMessage = ErrorMessage {
    code: "KCHTMPL0019E",
    template: "Disk {index} on read-only storage pool {pool} must name an existing volume, got '{volume}'",
};

pub const TEMPLATE_BASE_ON_READONLY_POOL: ErrorMessage = ErrorMessage {
    code: "KCHTMPL0020E",
    template: "Base image {path} can not be cloned onto disk {index} of read-only storage pool {pool}",
};

pub const TEMPLATE_INVALID_DISK_FORMAT: ErrorMessage = ErrorMessage {
    code: "KCHTMPL0027E",
    template: "Invalid disk image format '{format}'. Valid formats: qcow, qcow2, qed, raw, vmdk, vpc.",
};

pub const TEMPLATE_INVALID_DISK_SIZE: ErrorMessage = ErrorMessage {
    code: "KCHTMPL0028E",
    template: "Disk {index} on storage pool {pool} requires a size greater than zero",
};

pub const TEMPLATE_MEMORY_ABOVE_MAX: ErrorMessage = ErrorMessage {
    code: "KCHTMPL0031E",
    template: "Memory value ({mem}MiB) must be equal or lesser than maximum memory value ({maxmem}MiB)",
};

pub const VM_MEMORY_ABOVE_HOST: ErrorMessage = ErrorMessage {
    code: "KCHVM0041E",
    template: "Memory assigned ({mem}MiB) is higher than the maximum allowed in the host: {maxmem}MiB.",
};

pub const VM_MAXMEMORY_ABOVE_LIMIT: ErrorMessage = ErrorMessage {
    code: "KCHVM0079E",
    template: "Maximum memory ({maxmem}MiB) can not be greater than {value}",
};

pub const CPU_VCPUS_ABOVE_MAX: ErrorMessage = ErrorMessage {
    code: "KCHCPUINF0001E",
    template: "The number of vCPUs ({vcpus}) must not be greater than the maximum number of vCPUs ({maxvcpus})",
};

pub const CPU_INVALID_TOPOLOGY: ErrorMessage = ErrorMessage {
    code: "KCHCPUINF0002E",
    template: "Invalid vCPU/topology combination: sockets*cores*threads must equal maxvcpus ({maxvcpus}) and vcpus ({vcpus}) must be a multiple of threads ({threads})",
};

pub const CPU_MAXVCPUS_ABOVE_HOST: ErrorMessage = ErrorMessage {
    code: "KCHCPUINF0004E",
    template: "The maximum number of vCPUs ({maxvcpus}) is greater than the host limit ({limit})",
};

// ============================================================================
// Networks
// ============================================================================

pub const NETWORK_EXISTS: ErrorMessage = ErrorMessage {
    code: "KCHNET0001E",
    template: "Network {name} already exists",
};

pub const NETWORK_NOT_FOUND: ErrorMessage = ErrorMessage {
    code: "KCHNET0002E",
    template: "Network {name} does not exist",
};

pub const NETWORK_INVALID_SUBNET: ErrorMessage = ErrorMessage {
    code: "KCHNET0003E",
    template: "Invalid subnet '{subnet}' for network {name}",
};

pub const NETWORK_INTERFACE_REQUIRED: ErrorMessage = ErrorMessage {
    code: "KCHNET0004E",
    template: "Network {name} with connection {connection} requires at least one interface",
};

pub const NETWORK_ACTIVE: ErrorMessage = ErrorMessage {
    code: "KCHNET0005E",
    template: "Unable to delete active network {name}",
};

pub const NETWORK_INVALID_VLAN: ErrorMessage = ErrorMessage {
    code: "KCHNET0015E",
    template: "Invalid VLAN id '{vlan_id}' for network {name}: it must be between 1 and 4094 and is only allowed on bridge connections",
};

pub const NETWORK_IN_USE: ErrorMessage = ErrorMessage {
    code: "KCHNET0017E",
    template: "Unable to delete network {name}. There are templates linked to this network: {templates}",
};

pub const NETWORK_INVALID_CONNECTION: ErrorMessage = ErrorMessage {
    code: "KCHNET0018E",
    template: "Invalid connection type '{connection}' for network {name}",
};

pub const NETWORK_NO_FREE_SUBNET: ErrorMessage = ErrorMessage {
    code: "KCHNET0021E",
    template: "No free subnet available for network {name}",
};

// ============================================================================
// Storage pools
// ============================================================================

pub const POOL_EXISTS: ErrorMessage = ErrorMessage {
    code: "KCHPOOL0001E",
    template: "Storage pool {name} already exists",
};

pub const POOL_NOT_FOUND: ErrorMessage = ErrorMessage {
    code: "KCHPOOL0002E",
    template: "Storage pool {name} does not exist",
};

pub const POOL_MISSING_FIELD: ErrorMessage = ErrorMessage {
    code: "KCHPOOL0004E",
    template: "Storage pool {name} of type {kind} requires '{field}'",
};

pub const POOL_ACTIVE: ErrorMessage = ErrorMessage {
    code: "KCHPOOL0005E",
    template: "Unable to delete active storage pool {name}",
};

pub const POOL_INVALID_TYPE: ErrorMessage = ErrorMessage {
    code: "KCHPOOL0014E",
    template: "Invalid storage pool type '{kind}'. Valid types: dir, netfs, scsi, iscsi, logical",
};

pub const POOL_NOT_EXTENSIBLE: ErrorMessage = ErrorMessage {
    code: "KCHPOOL0029E",
    template: "Only logical storage pools can be extended; {name} is of type {kind}",
};

pub const POOL_IN_USE: ErrorMessage = ErrorMessage {
    code: "KCHPOOL0035E",
    template: "Unable to delete storage pool {name} as it is associated with templates: {templates}",
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reason_substitutes_every_variable() {
        let reason = reason!(TEMPLATE_MEMORY_ABOVE_MAX, mem = 4096, maxmem = 1024);
        assert_eq!(reason.code, "KCHTMPL0031E");
        assert_eq!(
            reason.message,
            "Memory value (4096MiB) must be equal or lesser than maximum memory value (1024MiB)"
        );
    }

    #[test]
    fn test_reason_without_variables_keeps_template() {
        let reason = reason!(TEMPLATE_MISSING_SOURCE);
        assert_eq!(reason.message, TEMPLATE_MISSING_SOURCE.template);
        assert!(reason.to_string().starts_with("KCHTMPL0016E: "));
    }

    #[test]
    fn test_codes_are_unique() {
        let all = [
            INVALID_REQUEST_BODY,
            INTERNAL_ERROR,
            INVALID_NAME,
            TEMPLATE_EXISTS,
            TEMPLATE_NOT_FOUND,
            TEMPLATE_NETWORK_MISSING,
            TEMPLATE_POOL_MISSING,
            TEMPLATE_POOL_INACTIVE,
            TEMPLATE_INVALID_CDROM,
            TEMPLATE_INVALID_GRAPHICS,
            TEMPLATE_MISSING_SOURCE,
            TEMPLATE_INVALID_SOURCE_TYPE,
            TEMPLATE_VOLUME_MISSING,
            TEMPLATE_BASE_ON_READONLY_POOL,
            TEMPLATE_INVALID_DISK_FORMAT,
            TEMPLATE_INVALID_DISK_SIZE,
            TEMPLATE_MEMORY_ABOVE_MAX,
            VM_MEMORY_ABOVE_HOST,
            VM_MAXMEMORY_ABOVE_LIMIT,
            CPU_VCPUS_ABOVE_MAX,
            CPU_INVALID_TOPOLOGY,
            CPU_MAXVCPUS_ABOVE_HOST,
            NETWORK_EXISTS,
            NETWORK_NOT_FOUND,
            NETWORK_INVALID_SUBNET,
            NETWORK_INTERFACE_REQUIRED,
            NETWORK_ACTIVE,
            NETWORK_INVALID_VLAN,
            NETWORK_IN_USE,
            NETWORK_INVALID_CONNECTION,
            NETWORK_NO_FREE_SUBNET,
            POOL_EXISTS,
            POOL_NOT_FOUND,
            POOL_MISSING_FIELD,
            POOL_ACTIVE,
            POOL_INVALID_TYPE,
            POOL_NOT_EXTENSIBLE,
            POOL_IN_USE,
        ];
        let mut codes: Vec<_> = all.iter().map(|m| m.code).collect();
        codes.sort_unstable();
        codes.dedup();
        assert_eq!(codes.len(), all.len());
    }
}
