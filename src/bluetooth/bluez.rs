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

//! BlueZ radio backend.
//!
//! Connects to an RFCOMM service by registering a client profile for the
//! service UUID and letting BlueZ resolve the channel over SDP.

use anyhow::{anyhow, Result};
use bluer::rfcomm::{Profile, ProfileHandle, ReqError, Role, Stream};
use bluer::{Adapter, Session};
use futures::StreamExt;
use std::fmt::Display;
use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::io::AsyncWrite;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::radio::{LinkStream, Peer, Radio};

fn io_error(e: impl Display) -> io::Error {
    io::Error::other(e.to_string())
}

struct Backend {
    session: Session,
    adapter: Adapter,
}

/// Radio backed by the default BlueZ adapter.
pub struct BluezRadio {
    backend: Option<Backend>,
}

impl BluezRadio {
    /// Open a BlueZ session.
    ///
    /// A missing daemon or adapter is not an error here; the radio then
    /// reports itself unavailable.
    pub async fn new() -> Self {
        match Self::open().await {
            Ok(backend) => Self {
                backend: Some(backend),
            },
            Err(e) => {
                warn!("Bluetooth not available: {}", e);
                Self { backend: None }
            }
        }
    }

    async fn open() -> Result<Backend> {
        // Create BlueZ session
        let session = bluer::Session::new().await?;
        info!("BlueZ session created");

        // Get the default adapter
        let adapter = session.default_adapter().await?;
        info!("Using Bluetooth adapter: {}", adapter.name());

        Ok(Backend { session, adapter })
    }

    fn backend(&self) -> Result<&Backend> {
        self.backend
            .as_ref()
            .ok_or_else(|| anyhow!("Bluetooth adapter not available"))
    }
}

impl Radio for BluezRadio {
    type Stream = BluezStream;

    async fn is_available(&self) -> bool {
        self.backend.is_some()
    }

    async fn is_enabled(&self) -> bool {
        match &self.backend {
            Some(backend) => backend.adapter.is_powered().await.unwrap_or(false),
            None => false,
        }
    }

    async fn bonded_peers(&self) -> Result<Vec<Peer>> {
        let adapter = &self.backend()?.adapter;
        let mut peers = Vec::new();

        for address in adapter.device_addresses().await? {
            let device = adapter.device(address)?;
            if device.is_paired().await? {
                let name = device.name().await.unwrap_or(None);
                peers.push(Peer { address, name });
            }
        }

        Ok(peers)
    }

    async fn cancel_discovery(&self) -> Result<()> {
        let adapter = &self.backend()?.adapter;
        // Discovery is reference counted per D-Bus client; this process never
        // starts one, so a running scan belongs to another client.
        if adapter.is_discovering().await? {
            warn!("Discovery is running on {}; connecting anyway", adapter.name());
        }
        Ok(())
    }

    async fn open_stream(&self, peer: &Peer, service: Uuid) -> io::Result<BluezStream> {
        let backend = self.backend().map_err(io_error)?;

        let profile = Profile {
            uuid: service,
            role: Some(Role::Client),
            require_authentication: Some(false),
            require_authorization: Some(false),
            auto_connect: Some(false),
            ..Default::default()
        };
        let mut requests = backend
            .session
            .register_profile(profile)
            .await
            .map_err(io_error)?;
        debug!("Registered RFCOMM client profile {}", service);

        let device = backend.adapter.device(peer.address).map_err(io_error)?;
        let connect = device.connect_profile(&service);
        tokio::pin!(connect);
        let mut connect_done = false;

        let req = loop {
            tokio::select! {
                res = &mut connect, if !connect_done => {
                    connect_done = true;
                    res.map_err(io_error)?;
                    debug!("Profile connect to {} returned", peer.address);
                }
                req = requests.next() => {
                    let req = req.ok_or_else(|| {
                        io::Error::new(io::ErrorKind::ConnectionAborted, "profile unregistered")
                    })?;
                    if req.device() != peer.address {
                        debug!("Rejecting profile connection from {}", req.device());
                        req.reject(ReqError::Rejected);
                        continue;
                    }
                    break req;
                }
            }
        };

        let stream = req.accept().map_err(io_error)?;
        info!("RFCOMM stream open to {}", peer.address);
        Ok(BluezStream {
            stream,
            _profile: Box::new(requests),
        })
    }
}

/// RFCOMM stream that keeps its client profile registered while open.
pub struct BluezStream {
    stream: Stream,
    _profile: Box<ProfileHandle>,
}

impl AsyncWrite for BluezStream {
    fn poll_write(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        Pin::new(&mut self.stream).poll_write(cx, buf)
    }

    fn poll_flush(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.stream).poll_flush(cx)
    }

    fn poll_shutdown(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.stream).poll_shutdown(cx)
    }
}

impl LinkStream for BluezStream {
    fn is_live(&self) -> bool {
        self.stream.peer_addr().is_ok()
    }
}
