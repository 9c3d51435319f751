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

//! Bluetooth communication module.
//!
//! RFCOMM client link to the RC platform.

mod bluez;
mod link;
pub mod mock;
mod permissions;
mod protocol;
mod radio;
mod worker;

pub use bluez::{BluezRadio, BluezStream};
pub use link::{LinkController, LinkError, LinkEvent, MSG_CONNECTION_LOST, MSG_DISCONNECTED};
pub use permissions::{Capability, CapabilityModel, GrantedCapabilities, PermissionGate};
pub use protocol::{Command, Control, DEFAULT_PEER_NAME, SPP_UUID};
pub use radio::{LinkStream, Peer, Radio};
pub use worker::{spawn_link_worker, LinkHandle, LinkStatus};
