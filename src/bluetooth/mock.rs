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

//! In-memory radio for tests and offline simulation.

use anyhow::Result;
use bluer::Address;
use parking_lot::Mutex;
use std::io;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::io::AsyncWrite;
use tracing::info;
use uuid::Uuid;

use super::radio::{LinkStream, Peer, Radio};

/// Everything that reached one simulated socket.
#[derive(Debug, Clone, Default)]
pub struct MockWire {
    pub peer: Option<Address>,
    pub service: Option<Uuid>,
    pub written: Vec<u8>,
    pub flushes: usize,
    pub closed_by_peer: bool,
    pub shut_down: bool,
}

#[derive(Debug)]
struct MockState {
    available: bool,
    enabled: bool,
    bonded: Vec<Peer>,
    discovery_cancels: usize,
    opened: usize,
    refuse_with: Option<String>,
    connect_delay: Option<Duration>,
    fail_close: bool,
    wire: Option<Arc<Mutex<MockWire>>>,
}

/// Simulated radio with a scriptable bonded set and recording sockets.
#[derive(Debug, Clone)]
pub struct MockRadio {
    state: Arc<Mutex<MockState>>,
}

impl Default for MockRadio {
    fn default() -> Self {
        Self::new()
    }
}

impl MockRadio {
    /// A powered radio with nothing bonded.
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(MockState {
                available: true,
                enabled: true,
                bonded: Vec::new(),
                discovery_cancels: 0,
                opened: 0,
                refuse_with: None,
                connect_delay: None,
                fail_close: false,
                wire: None,
            })),
        }
    }

    /// Add a bonded peer with the given name.
    pub fn bond(self, name: &str) -> Self {
        {
            let mut state = self.state.lock();
            let index = state.bonded.len() as u8;
            state.bonded.push(Peer {
                address: Address::new([0x24, 0x6F, 0x28, 0x00, 0x00, index]),
                name: Some(name.to_string()),
            });
        }
        self
    }

    pub fn set_available(&self, available: bool) {
        self.state.lock().available = available;
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.state.lock().enabled = enabled;
    }

    /// Make every following connect attempt fail with `reason`.
    pub fn refuse_connections(&self, reason: Option<&str>) {
        self.state.lock().refuse_with = reason.map(str::to_string);
    }

    /// Delay every following handshake.
    pub fn set_connect_delay(&self, delay: Option<Duration>) {
        self.state.lock().connect_delay = delay;
    }

    /// Make closing the socket report an error.
    pub fn fail_close(&self, fail: bool) {
        self.state.lock().fail_close = fail;
    }

    /// Simulate the peer dropping the current socket.
    pub fn drop_link(&self) {
        if let Some(wire) = &self.state.lock().wire {
            wire.lock().closed_by_peer = true;
        }
    }

    /// Snapshot of the most recently opened socket.
    pub fn wire(&self) -> Option<MockWire> {
        self.state.lock().wire.as_ref().map(|w| w.lock().clone())
    }

    /// Bytes written to the most recently opened socket.
    pub fn written(&self) -> Vec<u8> {
        self.wire().map(|w| w.written).unwrap_or_default()
    }

    pub fn discovery_cancels(&self) -> usize {
        self.state.lock().discovery_cancels
    }

    /// Number of sockets opened successfully.
    pub fn opened(&self) -> usize {
        self.state.lock().opened
    }
}

impl Radio for MockRadio {
    type Stream = MockStream;

    async fn is_available(&self) -> bool {
        self.state.lock().available
    }

    async fn is_enabled(&self) -> bool {
        let state = self.state.lock();
        state.available && state.enabled
    }

    async fn bonded_peers(&self) -> Result<Vec<Peer>> {
        Ok(self.state.lock().bonded.clone())
    }

    async fn cancel_discovery(&self) -> Result<()> {
        self.state.lock().discovery_cancels += 1;
        Ok(())
    }

    async fn open_stream(&self, peer: &Peer, service: Uuid) -> io::Result<MockStream> {
        let delay = self.state.lock().connect_delay;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let mut state = self.state.lock();
        if let Some(reason) = &state.refuse_with {
            return Err(io::Error::new(io::ErrorKind::ConnectionRefused, reason.clone()));
        }

        let wire = Arc::new(Mutex::new(MockWire {
            peer: Some(peer.address),
            service: Some(service),
            ..Default::default()
        }));
        state.wire = Some(wire.clone());
        state.opened += 1;
        info!("[MOCK] Opened stream to {}", peer.display_name());

        Ok(MockStream {
            wire,
            fail_close: state.fail_close,
        })
    }
}

/// Recording socket handed out by [`MockRadio`].
pub struct MockStream {
    wire: Arc<Mutex<MockWire>>,
    fail_close: bool,
}

fn broken_pipe() -> io::Error {
    io::Error::new(io::ErrorKind::BrokenPipe, "connection reset by peer")
}

impl AsyncWrite for MockStream {
    fn poll_write(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        let mut wire = self.wire.lock();
        if wire.closed_by_peer || wire.shut_down {
            return Poll::Ready(Err(broken_pipe()));
        }
        wire.written.extend_from_slice(buf);
        Poll::Ready(Ok(buf.len()))
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        let mut wire = self.wire.lock();
        if wire.closed_by_peer {
            return Poll::Ready(Err(broken_pipe()));
        }
        wire.flushes += 1;
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        self.wire.lock().shut_down = true;
        if self.fail_close {
            return Poll::Ready(Err(io::Error::other("close failed")));
        }
        Poll::Ready(Ok(()))
    }
}

impl LinkStream for MockStream {
    // The peer closing is only noticed on the next write, as with a real socket.
    fn is_live(&self) -> bool {
        !self.wire.lock().shut_down
    }
}
