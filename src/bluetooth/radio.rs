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

//! Radio subsystem abstraction.

use anyhow::Result;
use bluer::Address;
use std::future::Future;
use std::io;
use tokio::io::AsyncWrite;
use uuid::Uuid;

/// A bonded remote device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Peer {
    pub address: Address,
    pub name: Option<String>,
}

impl Peer {
    /// Name for status messages, falling back to the address.
    pub fn display_name(&self) -> String {
        self.name
            .clone()
            .unwrap_or_else(|| self.address.to_string())
    }
}

/// An open byte stream to a peer.
pub trait LinkStream: AsyncWrite + Unpin + Send + 'static {
    /// Whether the socket still reports itself connected.
    fn is_live(&self) -> bool;
}

/// Primitives the link controller needs from the host radio.
pub trait Radio: Send + Sync + 'static {
    type Stream: LinkStream;

    /// Whether a radio exists on this host.
    fn is_available(&self) -> impl Future<Output = bool> + Send;

    /// Whether the radio is powered on.
    fn is_enabled(&self) -> impl Future<Output = bool> + Send;

    /// Devices the host has already bonded with.
    fn bonded_peers(&self) -> impl Future<Output = Result<Vec<Peer>>> + Send;

    /// Best effort: stop or report a running discovery scan before
    /// connecting. A scan this process cannot stop is not an error.
    fn cancel_discovery(&self) -> impl Future<Output = Result<()>> + Send;

    /// Open a reliable byte stream to `peer` on the given service.
    ///
    /// Completes only once the stream is ready or the attempt failed.
    fn open_stream(
        &self,
        peer: &Peer,
        service: Uuid,
    ) -> impl Future<Output = io::Result<Self::Stream>> + Send;
}
