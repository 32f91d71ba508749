//! Virtual network records.

use crate::error::{CatalogError, Result};
use crate::messages;
use crate::reason;
use crate::resource::ResourceState;
use crate::template::validate::validate_name;
use ipnet::Ipv4Net;
use serde::{Deserialize, Serialize};
use std::fmt::{self, Display, Formatter};
use std::net::Ipv4Addr;
use std::str::FromStr;
use utoipa::ToSchema;

pub const DEFAULT_NETWORK: &str = "default";
pub const DEFAULT_SUBNET: &str = "192.168.122.0/24";

/// Third octets tried when a routed network is created without a subnet
const AUTO_SUBNET_OCTETS: std::ops::RangeInclusive<u8> = 122..=254;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Connection {
    Isolated,
    Nat,
    Macvtap,
    Bridge,
    Vepa,
    Passthrough,
}

impl Connection {
    const ALL: [Connection; 6] = [
        Connection::Isolated,
        Connection::Nat,
        Connection::Macvtap,
        Connection::Bridge,
        Connection::Vepa,
        Connection::Passthrough,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Connection::Isolated => "isolated",
            Connection::Nat => "nat",
            Connection::Macvtap => "macvtap",
            Connection::Bridge => "bridge",
            Connection::Vepa => "vepa",
            Connection::Passthrough => "passthrough",
        }
    }

    /// Connections that carry their own subnet instead of a host interface
    pub fn is_routed(&self) -> bool {
        matches!(self, Connection::Isolated | Connection::Nat)
    }
}

impl Display for Connection {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Connection {
    type Err = ();

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Connection::ALL
            .into_iter()
            .find(|connection| connection.as_str() == s)
            .ok_or(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Network {
    pub name: String,
    pub connection: Connection,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subnet: Option<String>,
    #[serde(default)]
    pub interfaces: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vlan_id: Option<u16>,
    pub state: ResourceState,
    pub autostart: bool,
}

impl Network {
    /// The NAT network every fresh catalog starts with
    pub fn default_network() -> Self {
        Self {
            name: DEFAULT_NETWORK.to_string(),
            connection: Connection::Nat,
            subnet: Some(DEFAULT_SUBNET.to_string()),
            interfaces: Vec::new(),
            vlan_id: None,
            state: ResourceState::Active,
            autostart: true,
        }
    }

    pub fn subnet_net(&self) -> Option<Ipv4Net> {
        self.subnet.as_deref().and_then(|s| s.parse().ok())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct NetworkInfo {
    #[serde(flatten)]
    pub network: Network,
    /// Whether any template references this network
    pub in_use: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct CreateNetworkRequest {
    pub name: String,
    pub connection: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subnet: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interfaces: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vlan_id: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub autostart: Option<bool>,
}

/// Validate a create request and build the inactive network it describes.
///
/// `used_subnets` are the subnets of existing networks, avoided when a
/// routed network is created without an explicit subnet.
pub fn build_network(req: &CreateNetworkRequest, used_subnets: &[Ipv4Net]) -> Result<Network> {
    validate_name("network", &req.name)?;

    let connection: Connection = req.connection.parse().map_err(|_| {
        CatalogError::InvalidParameter(reason!(
            messages::NETWORK_INVALID_CONNECTION,
            connection = &req.connection,
            name = &req.name
        ))
    })?;

    let interfaces = req.interfaces.clone().unwrap_or_default();
    if !connection.is_routed() && interfaces.is_empty() {
        return Err(CatalogError::InvalidParameter(reason!(
            messages::NETWORK_INTERFACE_REQUIRED,
            name = &req.name,
            connection = connection
        )));
    }

    let vlan_id = match req.vlan_id {
        None => None,
        Some(id) if connection == Connection::Bridge && (1..=4094).contains(&id) => {
            Some(id as u16)
        }
        Some(id) => {
            return Err(CatalogError::InvalidParameter(reason!(
                messages::NETWORK_INVALID_VLAN,
                vlan_id = id,
                name = &req.name
            )))
        }
    };

    let subnet = if connection.is_routed() {
        let net = match &req.subnet {
            Some(subnet) => subnet.parse::<Ipv4Net>().map_err(|_| {
                CatalogError::InvalidParameter(reason!(
                    messages::NETWORK_INVALID_SUBNET,
                    subnet = subnet,
                    name = &req.name
                ))
            })?,
            None => next_free_subnet(used_subnets).ok_or_else(|| {
                CatalogError::InvalidOperation(reason!(
                    messages::NETWORK_NO_FREE_SUBNET,
                    name = &req.name
                ))
            })?,
        };
        Some(net.trunc().to_string())
    } else {
        None
    };

    Ok(Network {
        name: req.name.clone(),
        connection,
        subnet,
        interfaces,
        vlan_id,
        state: ResourceState::Inactive,
        autostart: req.autostart.unwrap_or(true),
    })
}

/// First `192.168.N.0/24` that overlaps none of the used subnets
pub fn next_free_subnet(used: &[Ipv4Net]) -> Option<Ipv4Net> {
    AUTO_SUBNET_OCTETS
        .filter_map(|octet| Ipv4Net::new(Ipv4Addr::new(192, 168, octet, 0), 24).ok())
        .find(|candidate| {
            !used
                .iter()
                .any(|net| net.contains(candidate) || candidate.contains(net))
        })
}
