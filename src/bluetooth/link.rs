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

//! Serial command link to the platform.
//!
//! The controller owns at most one open RFCOMM stream. Every way a link can
//! end (explicit disconnect, failed handshake, failed write) goes through the
//! same teardown, and each operation reports exactly one state transition on
//! the event channel.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use super::permissions::{Capability, PermissionGate};
use super::radio::{LinkStream, Peer, Radio};
use crate::config::LinkConfig;
use crate::state::ConnectionState;

/// Status message after an explicit disconnect.
pub const MSG_DISCONNECTED: &str = "Disconnected";

/// Status message after a write found the link dead.
pub const MSG_CONNECTION_LOST: &str = "Connection lost";

/// Why a connect attempt failed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LinkError {
    #[error("Bluetooth permissions not granted")]
    PermissionDenied,

    #[error("Bluetooth not available")]
    Unavailable,

    #[error("Bluetooth is disabled")]
    Disabled,

    #[error("{0} not found. Pair the device first.")]
    PeerNotFound(String),

    #[error("Connection error: {0}")]
    IoFailure(String),
}

impl LinkError {
    /// The worker owning the controller is gone.
    pub fn worker_stopped() -> Self {
        Self::IoFailure("link worker stopped".to_string())
    }
}

/// Connection state change reported by the controller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkEvent {
    /// A link was established.
    Connected { message: String },
    /// No link is open.
    Disconnected { message: String },
}

impl LinkEvent {
    pub fn connected(message: impl Into<String>) -> Self {
        Self::Connected {
            message: message.into(),
        }
    }

    pub fn disconnected(message: impl Into<String>) -> Self {
        Self::Disconnected {
            message: message.into(),
        }
    }

    pub fn is_connected(&self) -> bool {
        matches!(self, Self::Connected { .. })
    }

    /// Human-readable status for display.
    pub fn message(&self) -> &str {
        match self {
            Self::Connected { message } | Self::Disconnected { message } => message,
        }
    }
}

/// The open connection. The socket is both the handle and the output sink,
/// so the two can never be present independently.
struct Link<S> {
    peer: Peer,
    stream: S,
}

/// Owns the connection to the platform.
pub struct LinkController<R: Radio> {
    radio: R,
    permissions: Arc<dyn PermissionGate>,
    config: LinkConfig,
    link: Option<Link<R::Stream>>,
    events: Option<mpsc::Sender<LinkEvent>>,
}

impl<R: Radio> LinkController<R> {
    /// Create a controller. No connection is opened yet.
    pub fn new(radio: R, permissions: Arc<dyn PermissionGate>, config: LinkConfig) -> Self {
        Self {
            radio,
            permissions,
            config,
            link: None,
            events: None,
        }
    }

    /// Register the event receiver, replacing any previous one.
    pub fn subscribe(&mut self) -> mpsc::Receiver<LinkEvent> {
        let (tx, rx) = mpsc::channel(32);
        if self.events.replace(tx).is_some() {
            debug!("Replaced previous link event subscriber");
        }
        rx
    }

    /// Whether a radio exists on this host.
    pub fn is_available(&self) -> impl Future<Output = bool> + Send + '_ {
        self.radio.is_available()
    }

    /// Whether the radio is powered on.
    pub fn is_enabled(&self) -> impl Future<Output = bool> + Send + '_ {
        self.radio.is_enabled()
    }

    /// Whether a link is open and its socket still reports itself connected.
    pub fn is_connected(&self) -> bool {
        self.link.as_ref().is_some_and(|link| link.stream.is_live())
    }

    /// The peer of the open link, if any.
    pub fn peer(&self) -> Option<&Peer> {
        self.link.as_ref().map(|link| &link.peer)
    }

    pub fn state(&self) -> ConnectionState {
        if self.link.is_some() {
            ConnectionState::Connected
        } else {
            ConnectionState::Disconnected
        }
    }

    /// Connect to the configured peer.
    ///
    /// The outcome is both returned and reported on the event channel.
    pub async fn connect(&mut self) -> Result<Peer, LinkError> {
        info!(
            "Starting connection to '{}'...",
            self.config.target_peer_name
        );

        match self.establish().await {
            Ok(peer) => {
                info!("Connected successfully to {}", peer.display_name());
                self.emit(LinkEvent::connected(format!(
                    "Connected to {}",
                    peer.display_name()
                )))
                .await;
                Ok(peer)
            }
            Err(e) => {
                error!("Connection failed: {}", e);
                self.emit(LinkEvent::disconnected(e.to_string())).await;
                Err(e)
            }
        }
    }

    async fn establish(&mut self) -> Result<Peer, LinkError> {
        let stale = match &self.link {
            Some(link) if link.stream.is_live() => {
                info!("Already connected to {}", link.peer.display_name());
                return Ok(link.peer.clone());
            }
            Some(link) => {
                warn!("Discarding stale link to {}", link.peer.display_name());
                true
            }
            None => false,
        };
        if stale {
            self.teardown().await;
        }

        if !self.permissions.link_permitted() {
            error!("Missing Bluetooth permissions");
            return Err(LinkError::PermissionDenied);
        }

        if !self.radio.is_available().await {
            error!("Bluetooth adapter not available");
            return Err(LinkError::Unavailable);
        }

        if !self.radio.is_enabled().await {
            error!("Bluetooth is disabled");
            return Err(LinkError::Disabled);
        }

        let target = &self.config.target_peer_name;
        let peer = Self::find_peer(&self.radio, self.permissions.as_ref(), target)
            .await
            .ok_or_else(|| LinkError::PeerNotFound(target.clone()))?;
        info!(
            "{} found at {}, connecting...",
            self.config.target_peer_name, peer.address
        );

        match Self::open(&self.radio, &self.config, &peer).await {
            Ok(stream) => {
                self.link = Some(Link {
                    peer: peer.clone(),
                    stream,
                });
                Ok(peer)
            }
            Err(e) => {
                self.teardown().await;
                Err(e)
            }
        }
    }

    /// Search the bonded set for the target name. Without the connect
    /// capability the bonded set reads as empty.
    async fn find_peer(radio: &R, permissions: &dyn PermissionGate, target: &str) -> Option<Peer> {
        let peers = if permissions.is_granted(Capability::Connect) {
            match radio.bonded_peers().await {
                Ok(peers) => peers,
                Err(e) => {
                    warn!("Failed to enumerate bonded devices: {}", e);
                    Vec::new()
                }
            }
        } else {
            debug!("No connect permission, bonded devices not readable");
            Vec::new()
        };
        debug!("Found {} paired devices", peers.len());

        peers.into_iter().find(|peer| {
            debug!("Checking device: {:?}", peer.name);
            peer.name.as_deref() == Some(target)
        })
    }

    async fn open(radio: &R, config: &LinkConfig, peer: &Peer) -> Result<R::Stream, LinkError> {
        // Scanning and connecting at the same time is not allowed.
        if let Err(e) = radio.cancel_discovery().await {
            debug!("Could not cancel discovery: {}", e);
        }

        let timeout = Duration::from_secs(config.connect_timeout_secs);
        match tokio::time::timeout(timeout, radio.open_stream(peer, config.service_uuid)).await {
            Ok(Ok(stream)) => Ok(stream),
            Ok(Err(e)) => Err(LinkError::IoFailure(e.to_string())),
            Err(_) => Err(LinkError::IoFailure(format!(
                "timed out after {}s",
                config.connect_timeout_secs
            ))),
        }
    }

    /// Write a command and flush it to the wire.
    ///
    /// Returns false when no link is open or the write failed. A failed
    /// write closes the link and reports it lost.
    pub async fn send(&mut self, bytes: &[u8]) -> bool {
        let Some(link) = self.link.as_mut() else {
            warn!(
                "Cannot send {:?} - not connected",
                String::from_utf8_lossy(bytes)
            );
            return false;
        };

        let written = async {
            link.stream.write_all(bytes).await?;
            link.stream.flush().await
        }
        .await;

        match written {
            Ok(()) => {
                debug!(
                    "Command sent: {:?} ({} bytes)",
                    String::from_utf8_lossy(bytes),
                    bytes.len()
                );
                true
            }
            Err(e) => {
                error!(
                    "Error sending command {:?}: {}",
                    String::from_utf8_lossy(bytes),
                    e
                );
                self.teardown().await;
                self.emit(LinkEvent::disconnected(MSG_CONNECTION_LOST)).await;
                false
            }
        }
    }

    /// Close the link if one is open. Always reports `Disconnected`.
    pub async fn disconnect(&mut self) {
        info!("Disconnecting...");
        self.teardown().await;
        self.emit(LinkEvent::disconnected(MSG_DISCONNECTED)).await;
    }

    /// Release the link. The slot is cleared before closing so a failed
    /// close still leaves the controller disconnected.
    async fn teardown(&mut self) {
        let Some(mut link) = self.link.take() else {
            return;
        };
        if let Err(e) = link.stream.shutdown().await {
            warn!("Error during disconnect from {}: {}", link.peer.display_name(), e);
        }
        debug!("Link to {} closed", link.peer.display_name());
    }

    async fn emit(&mut self, event: LinkEvent) {
        let Some(tx) = &self.events else {
            debug!("No link event subscriber for {:?}", event);
            return;
        };
        if tx.send(event).await.is_err() {
            debug!("Link event subscriber dropped");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bluetooth::mock::MockRadio;
    use crate::bluetooth::permissions::{CapabilityModel, GrantedCapabilities};

    fn controller(radio: &MockRadio) -> LinkController<MockRadio> {
        LinkController::new(
            radio.clone(),
            Arc::new(GrantedCapabilities::all(CapabilityModel::Modern)),
            LinkConfig::default(),
        )
    }

    fn drain(rx: &mut mpsc::Receiver<LinkEvent>) -> Vec<LinkEvent> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    #[tokio::test]
    async fn test_unavailable_radio() {
        let radio = MockRadio::new().bond("ESP32-AUTO");
        radio.set_available(false);
        let mut link = controller(&radio);
        let mut rx = link.subscribe();

        assert_eq!(link.connect().await, Err(LinkError::Unavailable));
        assert_eq!(link.state(), ConnectionState::Disconnected);

        let events = drain(&mut rx);
        assert!(events.iter().all(|e| !e.is_connected()));
        assert_eq!(
            events,
            vec![LinkEvent::disconnected("Bluetooth not available")]
        );
    }

    #[tokio::test]
    async fn test_permission_checked_first() {
        let radio = MockRadio::new();
        radio.set_available(false);
        let mut link = LinkController::new(
            radio.clone(),
            Arc::new(GrantedCapabilities::none(CapabilityModel::Modern)),
            LinkConfig::default(),
        );

        assert_eq!(link.connect().await, Err(LinkError::PermissionDenied));
    }

    #[tokio::test]
    async fn test_disabled_radio() {
        let radio = MockRadio::new().bond("ESP32-AUTO");
        radio.set_enabled(false);
        let mut link = controller(&radio);

        assert_eq!(link.connect().await, Err(LinkError::Disabled));
        assert_eq!(radio.opened(), 0);
    }

    #[tokio::test]
    async fn test_peer_not_found() {
        let radio = MockRadio::new().bond("OtherDevice");
        let mut link = controller(&radio);

        assert_eq!(
            link.connect().await,
            Err(LinkError::PeerNotFound("ESP32-AUTO".to_string()))
        );
        assert_eq!(radio.discovery_cancels(), 0);
    }

    struct LocationOnly;

    impl PermissionGate for LocationOnly {
        fn is_granted(&self, capability: Capability) -> bool {
            capability == Capability::Location
        }

        fn model(&self) -> CapabilityModel {
            CapabilityModel::Legacy
        }
    }

    #[tokio::test]
    async fn test_unreadable_bonded_set_is_not_found() {
        let radio = MockRadio::new().bond("ESP32-AUTO");
        let mut link = LinkController::new(radio.clone(), Arc::new(LocationOnly), LinkConfig::default());

        assert_eq!(
            link.connect().await,
            Err(LinkError::PeerNotFound("ESP32-AUTO".to_string()))
        );
    }

    #[tokio::test]
    async fn test_connect_and_send() {
        let radio = MockRadio::new().bond("OtherDevice").bond("ESP32-AUTO");
        let mut link = controller(&radio);
        let mut rx = link.subscribe();

        let peer = link.connect().await.unwrap();
        assert_eq!(peer.name.as_deref(), Some("ESP32-AUTO"));
        assert!(link.is_connected());
        assert_eq!(link.state(), ConnectionState::Connected);
        assert_eq!(radio.discovery_cancels(), 1);
        assert_eq!(
            drain(&mut rx),
            vec![LinkEvent::connected("Connected to ESP32-AUTO")]
        );

        assert!(link.send(b"F").await);
        let wire = radio.wire().unwrap();
        assert_eq!(wire.written, b"F");
        assert_eq!(wire.flushes, 1);
        assert_eq!(wire.service, Some(crate::bluetooth::SPP_UUID));
        assert_eq!(wire.peer, Some(peer.address));
        assert!(drain(&mut rx).is_empty());
    }

    #[tokio::test]
    async fn test_send_without_link() {
        let radio = MockRadio::new().bond("ESP32-AUTO");
        let mut link = controller(&radio);
        let mut rx = link.subscribe();

        assert!(!link.send(b"F").await);
        assert!(drain(&mut rx).is_empty());
    }

    #[tokio::test]
    async fn test_send_after_peer_drop() {
        let radio = MockRadio::new().bond("ESP32-AUTO");
        let mut link = controller(&radio);
        let mut rx = link.subscribe();
        link.connect().await.unwrap();
        drain(&mut rx);

        radio.drop_link();
        assert!(!link.send(b"S").await);
        assert_eq!(link.state(), ConnectionState::Disconnected);
        assert!(!link.is_connected());
        assert_eq!(
            drain(&mut rx),
            vec![LinkEvent::disconnected(MSG_CONNECTION_LOST)]
        );

        assert!(!link.send(b"S").await);
        assert!(drain(&mut rx).is_empty());
    }

    #[tokio::test]
    async fn test_disconnect_idempotent() {
        let radio = MockRadio::new().bond("ESP32-AUTO");
        let mut link = controller(&radio);
        let mut rx = link.subscribe();

        link.disconnect().await;
        link.connect().await.unwrap();
        link.disconnect().await;
        link.disconnect().await;

        assert_eq!(link.state(), ConnectionState::Disconnected);
        assert!(radio.wire().unwrap().shut_down);
        assert_eq!(
            drain(&mut rx),
            vec![
                LinkEvent::disconnected(MSG_DISCONNECTED),
                LinkEvent::connected("Connected to ESP32-AUTO"),
                LinkEvent::disconnected(MSG_DISCONNECTED),
                LinkEvent::disconnected(MSG_DISCONNECTED),
            ]
        );
    }

    #[tokio::test]
    async fn test_close_failure_swallowed() {
        let radio = MockRadio::new().bond("ESP32-AUTO");
        radio.fail_close(true);
        let mut link = controller(&radio);
        let mut rx = link.subscribe();
        link.connect().await.unwrap();

        link.disconnect().await;
        assert_eq!(link.state(), ConnectionState::Disconnected);
        assert!(link.peer().is_none());
        assert_eq!(
            drain(&mut rx).last(),
            Some(&LinkEvent::disconnected(MSG_DISCONNECTED))
        );
    }

    #[tokio::test]
    async fn test_handshake_failure() {
        let radio = MockRadio::new().bond("ESP32-AUTO");
        radio.refuse_connections(Some("host is down"));
        let mut link = controller(&radio);
        let mut rx = link.subscribe();

        let err = link.connect().await.unwrap_err();
        assert_eq!(err, LinkError::IoFailure("host is down".to_string()));
        assert_eq!(link.state(), ConnectionState::Disconnected);
        assert_eq!(
            drain(&mut rx),
            vec![LinkEvent::disconnected("Connection error: host is down")]
        );
    }

    #[tokio::test]
    async fn test_handshake_timeout() {
        let radio = MockRadio::new().bond("ESP32-AUTO");
        radio.set_connect_delay(Some(Duration::from_secs(3)));
        let config = LinkConfig {
            connect_timeout_secs: 1,
            ..LinkConfig::default()
        };
        let mut link = LinkController::new(
            radio.clone(),
            Arc::new(GrantedCapabilities::all(CapabilityModel::Modern)),
            config,
        );

        let err = link.connect().await.unwrap_err();
        assert!(matches!(err, LinkError::IoFailure(ref detail) if detail.contains("timed out")));
        assert!(link.peer().is_none());
    }

    #[tokio::test]
    async fn test_connect_when_connected_keeps_link() {
        let radio = MockRadio::new().bond("ESP32-AUTO");
        let mut link = controller(&radio);

        link.connect().await.unwrap();
        link.connect().await.unwrap();
        assert_eq!(radio.opened(), 1);
        assert!(link.is_connected());
    }

    #[tokio::test]
    async fn test_subscribe_replaces_previous() {
        let radio = MockRadio::new();
        let mut link = controller(&radio);
        let mut first = link.subscribe();
        let mut second = link.subscribe();

        link.disconnect().await;
        assert_eq!(first.recv().await, None);
        assert_eq!(
            second.recv().await,
            Some(LinkEvent::disconnected(MSG_DISCONNECTED))
        );
    }
}
