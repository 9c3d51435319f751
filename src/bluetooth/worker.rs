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

//! Background task owning the link controller.
//!
//! All blocking link I/O runs here. Callers talk to it through a
//! [`LinkHandle`]; requests are handled one at a time in arrival order.

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::link::{LinkController, LinkError};
use super::radio::{Peer, Radio};

/// Snapshot of the radio and link.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LinkStatus {
    pub available: bool,
    pub enabled: bool,
    pub connected: bool,
}

/// Request to the link worker.
#[derive(Debug)]
enum LinkRequest {
    Connect {
        reply: Option<oneshot::Sender<Result<Peer, LinkError>>>,
    },
    Send {
        bytes: Vec<u8>,
        reply: Option<oneshot::Sender<bool>>,
    },
    Disconnect {
        reply: Option<oneshot::Sender<()>>,
    },
    Status {
        reply: oneshot::Sender<LinkStatus>,
    },
}

/// Client side of the link worker.
#[derive(Debug, Clone)]
pub struct LinkHandle {
    requests: mpsc::UnboundedSender<LinkRequest>,
}

impl LinkHandle {
    /// Returns false if the worker is gone and the request was dropped.
    fn submit(&self, request: LinkRequest) -> bool {
        if self.requests.send(request).is_err() {
            warn!("Link worker stopped, request dropped");
            return false;
        }
        true
    }

    /// Start connecting without waiting for the outcome.
    pub fn request_connect(&self) -> bool {
        self.submit(LinkRequest::Connect { reply: None })
    }

    /// Queue bytes for sending without waiting for the outcome.
    pub fn request_send(&self, bytes: Vec<u8>) -> bool {
        self.submit(LinkRequest::Send { bytes, reply: None })
    }

    /// Queue a disconnect without waiting for it.
    pub fn request_disconnect(&self) -> bool {
        self.submit(LinkRequest::Disconnect { reply: None })
    }

    /// Connect and wait for the typed outcome.
    pub async fn connect(&self) -> Result<Peer, LinkError> {
        let (tx, rx) = oneshot::channel();
        self.submit(LinkRequest::Connect { reply: Some(tx) });
        rx.await.unwrap_or_else(|_| Err(LinkError::worker_stopped()))
    }

    /// Send bytes and wait until they were flushed or dropped.
    pub async fn send(&self, bytes: Vec<u8>) -> bool {
        let (tx, rx) = oneshot::channel();
        self.submit(LinkRequest::Send {
            bytes,
            reply: Some(tx),
        });
        rx.await.unwrap_or(false)
    }

    /// Disconnect and wait for the link to be released.
    pub async fn disconnect(&self) {
        let _ = self.disconnect_notify().await;
    }

    /// Queue a disconnect; the receiver completes once it was processed.
    pub fn disconnect_notify(&self) -> oneshot::Receiver<()> {
        let (tx, rx) = oneshot::channel();
        self.submit(LinkRequest::Disconnect { reply: Some(tx) });
        rx
    }

    /// Query the radio and link. Answered after every earlier request.
    pub async fn status(&self) -> LinkStatus {
        let (tx, rx) = oneshot::channel();
        self.submit(LinkRequest::Status { reply: tx });
        rx.await.unwrap_or_default()
    }
}

/// Move the controller onto its own task.
///
/// The task exits, releasing any open link, once every handle is dropped.
pub fn spawn_link_worker<R: Radio>(controller: LinkController<R>) -> (LinkHandle, JoinHandle<()>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let task = tokio::spawn(run(controller, rx));
    (LinkHandle { requests: tx }, task)
}

async fn run<R: Radio>(
    mut controller: LinkController<R>,
    mut requests: mpsc::UnboundedReceiver<LinkRequest>,
) {
    info!("Link worker started");

    while let Some(request) = requests.recv().await {
        match request {
            LinkRequest::Connect { reply } => {
                let result = controller.connect().await;
                if let Some(reply) = reply {
                    let _ = reply.send(result);
                }
            }
            LinkRequest::Send { bytes, reply } => {
                let sent = controller.send(&bytes).await;
                debug!("Sent {:?}: {}", String::from_utf8_lossy(&bytes), sent);
                if let Some(reply) = reply {
                    let _ = reply.send(sent);
                }
            }
            LinkRequest::Disconnect { reply } => {
                controller.disconnect().await;
                if let Some(reply) = reply {
                    let _ = reply.send(());
                }
            }
            LinkRequest::Status { reply } => {
                let status = LinkStatus {
                    available: controller.is_available().await,
                    enabled: controller.is_enabled().await,
                    connected: controller.is_connected(),
                };
                let _ = reply.send(status);
            }
        }
    }

    if controller.peer().is_some() {
        controller.disconnect().await;
    }
    info!("Link worker stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bluetooth::mock::MockRadio;
    use crate::bluetooth::permissions::{CapabilityModel, GrantedCapabilities};
    use crate::config::LinkConfig;
    use std::sync::Arc;

    fn spawn(radio: &MockRadio) -> (LinkHandle, JoinHandle<()>) {
        let controller = LinkController::new(
            radio.clone(),
            Arc::new(GrantedCapabilities::all(CapabilityModel::Modern)),
            LinkConfig::default(),
        );
        spawn_link_worker(controller)
    }

    #[tokio::test]
    async fn test_requests_in_order() {
        let radio = MockRadio::new().bond("ESP32-AUTO");
        let (handle, _task) = spawn(&radio);

        handle.request_connect();
        handle.request_send(b"F".to_vec());
        handle.request_send(b"S".to_vec());
        let status = handle.status().await;

        assert!(status.available);
        assert!(status.enabled);
        assert!(status.connected);
        assert_eq!(radio.written(), b"FS");
    }

    #[tokio::test]
    async fn test_typed_outcomes() {
        let radio = MockRadio::new().bond("OtherDevice");
        let (handle, _task) = spawn(&radio);

        assert_eq!(
            handle.connect().await,
            Err(LinkError::PeerNotFound("ESP32-AUTO".to_string()))
        );
        assert!(!handle.send(b"F".to_vec()).await);
    }

    #[tokio::test]
    async fn test_dropping_handles_releases_link() {
        let radio = MockRadio::new().bond("ESP32-AUTO");
        let (handle, task) = spawn(&radio);

        handle.connect().await.unwrap();
        drop(handle);
        task.await.unwrap();

        assert!(radio.wire().unwrap().shut_down);
    }

    #[tokio::test]
    async fn test_requests_after_worker_stopped() {
        let radio = MockRadio::new().bond("ESP32-AUTO");
        let (handle, task) = spawn(&radio);

        task.abort();
        let _ = task.await;

        assert!(!handle.request_connect());
        assert!(!handle.request_send(b"F".to_vec()));
        assert_eq!(handle.connect().await, Err(LinkError::worker_stopped()));
        assert_eq!(radio.opened(), 0);
    }
}
