// Copyright 2026 Daniel Pelikan
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Capability checks gating discovery and connection.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// A platform permission the link may depend on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Capability {
    /// Open connections and read bonded peers.
    Connect,
    /// Scan for and cancel discovery.
    Scan,
    /// Location access, which older capability models use for Bluetooth.
    Location,
}

/// Which set of capabilities the host platform asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CapabilityModel {
    /// Dedicated Bluetooth capabilities.
    #[default]
    Modern,
    /// Bluetooth gated by location access; connect and scan are implicit.
    Legacy,
}

impl CapabilityModel {
    /// Capabilities that must all be granted before connecting.
    pub fn required(self) -> &'static [Capability] {
        match self {
            Self::Modern => &[Capability::Connect, Capability::Scan],
            Self::Legacy => &[Capability::Location],
        }
    }

    /// Whether a capability is granted without asking under this model.
    pub fn implies(self, capability: Capability) -> bool {
        matches!(
            (self, capability),
            (Self::Legacy, Capability::Connect) | (Self::Legacy, Capability::Scan)
        )
    }
}

/// Read-only permission checks consumed by the link controller.
pub trait PermissionGate: Send + Sync {
    /// Whether a single capability is currently granted.
    fn is_granted(&self, capability: Capability) -> bool;

    /// The capability model in effect.
    fn model(&self) -> CapabilityModel;

    /// Whether everything the model requires for a connection is granted.
    fn link_permitted(&self) -> bool {
        self.model()
            .required()
            .iter()
            .all(|capability| self.is_granted(*capability))
    }
}

/// A fixed set of granted capabilities.
#[derive(Debug, Clone)]
pub struct GrantedCapabilities {
    model: CapabilityModel,
    granted: HashSet<Capability>,
}

impl GrantedCapabilities {
    pub fn new(model: CapabilityModel, granted: impl IntoIterator<Item = Capability>) -> Self {
        Self {
            model,
            granted: granted.into_iter().collect(),
        }
    }

    /// Everything granted.
    pub fn all(model: CapabilityModel) -> Self {
        Self::new(
            model,
            [Capability::Connect, Capability::Scan, Capability::Location],
        )
    }

    /// Nothing granted.
    pub fn none(model: CapabilityModel) -> Self {
        Self::new(model, [])
    }
}

impl PermissionGate for GrantedCapabilities {
    fn is_granted(&self, capability: Capability) -> bool {
        self.model.implies(capability) || self.granted.contains(&capability)
    }

    fn model(&self) -> CapabilityModel {
        self.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_modern_requires_connect_and_scan() {
        let gate = GrantedCapabilities::new(CapabilityModel::Modern, [Capability::Connect]);
        assert!(!gate.link_permitted());

        let gate = GrantedCapabilities::new(
            CapabilityModel::Modern,
            [Capability::Connect, Capability::Scan],
        );
        assert!(gate.link_permitted());
        assert!(!gate.is_granted(Capability::Location));
    }

    #[test]
    fn test_legacy_implies_connect() {
        let gate = GrantedCapabilities::new(CapabilityModel::Legacy, [Capability::Location]);
        assert!(gate.link_permitted());
        assert!(gate.is_granted(Capability::Connect));
        assert!(gate.is_granted(Capability::Scan));

        let gate = GrantedCapabilities::none(CapabilityModel::Legacy);
        assert!(!gate.link_permitted());
    }
}
