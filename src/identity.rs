//! Plugin identity answers reported to the container orchestrator.

use std::fmt;

/// Name the plugin registers under.
pub const DRIVER_NAME: &str = "csi.cloud.dk";

/// Version reported alongside [`DRIVER_NAME`].
pub const DRIVER_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Capability advertised by the plugin.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum PluginCapability {
    /// The plugin implements the controller service.
    ControllerService,
    /// Volumes are only reachable from a subset of nodes.
    VolumeAccessibilityConstraints,
}

impl fmt::Display for PluginCapability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::ControllerService => "CONTROLLER_SERVICE",
            Self::VolumeAccessibilityConstraints => "VOLUME_ACCESSIBILITY_CONSTRAINTS",
        };
        f.write_str(name)
    }
}

/// Name and version of the plugin.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct PluginInfo {
    /// Registered plugin name.
    pub name: String,
    /// Vendor version string.
    pub vendor_version: String,
}

/// Answer to a readiness probe.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct ProbeResponse {
    /// Readiness flag; `None` means the plugin does not report readiness.
    pub ready: Option<bool>,
}

/// Identity service of the plugin. Stateless.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct IdentityService;

impl IdentityService {
    /// Creates the identity service.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Returns the advertised capabilities, in a fixed order.
    #[must_use]
    pub fn capabilities(&self) -> Vec<PluginCapability> {
        vec![
            PluginCapability::ControllerService,
            PluginCapability::VolumeAccessibilityConstraints,
        ]
    }

    /// Returns the plugin name and version.
    #[must_use]
    pub fn plugin_info(&self) -> PluginInfo {
        PluginInfo {
            name: DRIVER_NAME.to_owned(),
            vendor_version: DRIVER_VERSION.to_owned(),
        }
    }

    /// Answers a readiness probe.
    ///
    /// The plugin currently always reports that it is not ready.
    #[must_use]
    pub const fn probe(&self) -> ProbeResponse {
        ProbeResponse { ready: Some(false) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capabilities_list_controller_and_topology() {
        assert_eq!(
            IdentityService::new().capabilities(),
            vec![
                PluginCapability::ControllerService,
                PluginCapability::VolumeAccessibilityConstraints,
            ]
        );
    }

    #[test]
    fn plugin_info_reports_crate_version() {
        let info = IdentityService::new().plugin_info();
        assert_eq!(info.name, "csi.cloud.dk");
        assert_eq!(info.vendor_version, env!("CARGO_PKG_VERSION"));
    }

    #[test]
    fn probe_reports_not_ready() {
        assert_eq!(IdentityService::new().probe().ready, Some(false));
    }

    #[test]
    fn capability_display_uses_wire_names() {
        assert_eq!(
            PluginCapability::VolumeAccessibilityConstraints.to_string(),
            "VOLUME_ACCESSIBILITY_CONSTRAINTS"
        );
    }
}
