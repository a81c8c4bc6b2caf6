//! Wire types exchanged with the Cloud.dk control plane.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Server description returned by the control plane.
#[derive(Clone, Debug, Default, Deserialize, Serialize, Eq, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct ServerBody {
    /// Opaque server identifier.
    pub identifier: String,
    /// Hostname assigned at creation.
    pub hostname: String,
    /// User-facing label assigned at creation.
    pub label: String,
    /// Number of virtual CPUs.
    pub cpus: u32,
    /// Memory in megabytes.
    pub memory: u64,
    /// Power state reported by the control plane.
    pub booted: bool,
    /// Network interfaces in the order the control plane reports them.
    pub network_interfaces: Vec<NetworkInterfaceBody>,
}

impl ServerBody {
    /// Returns the first address of the first network interface.
    #[must_use]
    pub fn first_address(&self) -> Option<&str> {
        self.network_interfaces
            .first()
            .and_then(|interface| interface.ip_addresses.first())
            .map(|ip| ip.address.as_str())
    }
}

/// Network interface attached to a server.
#[derive(Clone, Debug, Default, Deserialize, Serialize, Eq, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct NetworkInterfaceBody {
    /// Interface identifier.
    pub identifier: String,
    /// Interface label.
    pub label: String,
    /// Whether this is the primary interface.
    pub primary: bool,
    /// Addresses bound to the interface.
    pub ip_addresses: Vec<IpAddressBody>,
}

/// Address bound to a network interface.
#[derive(Clone, Debug, Default, Deserialize, Serialize, Eq, PartialEq)]
#[serde(default)]
pub struct IpAddressBody {
    /// Textual IP address.
    pub address: String,
    /// Network the address belongs to.
    pub network: String,
    /// Netmask of the network.
    pub netmask: String,
    /// Default gateway.
    pub gateway: String,
}

/// Payload for `POST /cloudservers`.
#[derive(Clone, Deserialize, Serialize, Eq, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ServerCreateBody {
    /// Requested hostname.
    pub hostname: String,
    /// Requested label.
    pub label: String,
    /// Root password applied on first boot.
    pub initial_root_password: String,
    /// Package (size tier) identifier.
    pub package: String,
    /// OS template identifier.
    pub template: String,
    /// Location identifier.
    pub location: String,
}

impl fmt::Debug for ServerCreateBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServerCreateBody")
            .field("hostname", &self.hostname)
            .field("label", &self.label)
            .field("initial_root_password", &"<redacted>")
            .field("package", &self.package)
            .field("template", &self.template)
            .field("location", &self.location)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_body_decodes_camel_case_payload() {
        let payload = r#"{
            "identifier": "abc123",
            "hostname": "host-a",
            "label": "host-a",
            "booted": true,
            "networkInterfaces": [
                {"identifier": "nic0", "primary": true,
                 "ipAddresses": [{"address": "192.0.2.10", "gateway": "192.0.2.1"}]}
            ],
            "template": {"identifier": "ubuntu-18.04-x64"}
        }"#;

        let server: ServerBody =
            serde_json::from_str(payload).unwrap_or_else(|err| panic!("decode: {err}"));

        assert_eq!(server.identifier, "abc123");
        assert!(server.booted);
        assert_eq!(server.first_address(), Some("192.0.2.10"));
    }

    #[test]
    fn first_address_is_none_without_interfaces() {
        let server = ServerBody {
            identifier: String::from("abc123"),
            ..ServerBody::default()
        };
        assert_eq!(server.first_address(), None);
    }

    #[test]
    fn create_body_serialises_initial_password_in_camel_case() {
        let body = ServerCreateBody {
            hostname: String::from("host-a"),
            label: String::from("host-a"),
            initial_root_password: String::from("psecret"),
            package: String::from("pkg1"),
            template: String::from("ubuntu-18.04-x64"),
            location: String::from("loc1"),
        };

        let json = serde_json::to_value(&body).unwrap_or_else(|err| panic!("encode: {err}"));

        assert_eq!(json["initialRootPassword"], "psecret");
        assert!(!format!("{body:?}").contains("psecret"));
    }
}
