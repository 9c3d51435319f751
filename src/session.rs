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

//! Session coordination between the presentation layer and the link worker.

use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

use crate::bluetooth::{Command, Control, LinkError, LinkEvent, LinkHandle, LinkStatus};
use crate::state::SessionView;

/// Status message while a connect attempt is in flight.
pub const MSG_CONNECTING: &str = "Connecting...";

/// Owns the [`SessionView`] and forwards user intent to the link worker.
///
/// Runs on the foreground task. Link events only reach the view through
/// [`SessionCoordinator::apply`].
pub struct SessionCoordinator {
    link: LinkHandle,
    events: mpsc::Receiver<LinkEvent>,
    view: watch::Sender<SessionView>,
    released: bool,
}

impl SessionCoordinator {
    pub fn new(link: LinkHandle, events: mpsc::Receiver<LinkEvent>) -> Self {
        let (view, _) = watch::channel(SessionView::default());
        Self {
            link,
            events,
            view,
            released: false,
        }
    }

    /// Observe the session view.
    pub fn subscribe(&self) -> watch::Receiver<SessionView> {
        self.view.subscribe()
    }

    /// Current session view.
    pub fn view(&self) -> SessionView {
        self.view.borrow().clone()
    }

    pub fn link(&self) -> &LinkHandle {
        &self.link
    }

    /// Start connecting. Ignored while an attempt is already in flight.
    pub fn connect(&self) {
        if self.view.borrow().connecting {
            debug!("Connect already in progress");
            return;
        }
        self.view.send_modify(|view| {
            view.connecting = true;
            view.message = MSG_CONNECTING.to_string();
        });
        info!("Attempting to connect...");
        if !self.link.request_connect() {
            self.view.send_modify(|view| {
                view.connecting = false;
                view.connected = false;
                view.message = LinkError::worker_stopped().to_string();
            });
        }
    }

    pub fn disconnect(&self) {
        info!("Disconnecting...");
        self.link.request_disconnect();
    }

    /// Send a command if the view reports connected.
    ///
    /// Returns whether the command was handed to the link.
    pub fn send_command(&self, command: Command) -> bool {
        if !self.view.borrow().connected {
            warn!("Cannot send command {} - not connected", command);
            return false;
        }
        debug!("Sending command: {}", command);
        self.link.request_send(command.to_wire())
    }

    /// Send the command for a press or release edge of a control.
    pub fn control(&self, control: Control, pressed: bool) -> bool {
        self.send_command(control.edge(pressed))
    }

    /// Flip the light flag and send the toggle command.
    ///
    /// The flag flips whether or not the command reaches the platform; there
    /// is no acknowledgement to confirm it. Returns the new flag.
    pub fn toggle_light(&self) -> bool {
        let mut light_on = false;
        self.view.send_modify(|view| {
            view.light_on = !view.light_on;
            light_on = view.light_on;
        });
        self.send_command(Command::ToggleLight);
        info!("Light toggled: {}", light_on);
        light_on
    }

    /// Fold a link event into the view.
    pub fn apply(&self, event: LinkEvent) {
        info!(
            "Connection state changed: {} - {}",
            event.is_connected(),
            event.message()
        );
        self.view.send_modify(|view| {
            view.connected = event.is_connected();
            view.message = event.message().to_string();
            view.connecting = false;
        });
    }

    /// Wait for the next link event without applying it.
    pub async fn recv_event(&mut self) -> Option<LinkEvent> {
        self.events.recv().await
    }

    /// Wait for the next link event and apply it.
    pub async fn next_event(&mut self) -> Option<LinkEvent> {
        let event = self.events.recv().await?;
        self.apply(event.clone());
        Some(event)
    }

    /// Apply every link event that is already queued.
    pub fn drain_events(&mut self) -> usize {
        let mut applied = 0;
        while let Ok(event) = self.events.try_recv() {
            self.apply(event);
            applied += 1;
        }
        applied
    }

    /// Query the link worker, applying link events while waiting so the
    /// worker never stalls on a full event channel.
    pub async fn status(&mut self) -> LinkStatus {
        let pending = self.link.status();
        tokio::pin!(pending);

        loop {
            let event = tokio::select! {
                status = &mut pending => return status,
                event = self.events.recv() => event,
            };
            match event {
                Some(event) => self.apply(event),
                None => return pending.await,
            }
        }
    }

    /// Disconnect and wait for the worker to release the link, applying
    /// events that arrive meanwhile.
    pub async fn shutdown(mut self) {
        info!("Session shutting down - disconnecting");
        let done = self.link.disconnect_notify();
        tokio::pin!(done);

        loop {
            let event = tokio::select! {
                _ = &mut done => break,
                event = self.events.recv() => event,
            };
            match event {
                Some(event) => self.apply(event),
                None => break,
            }
        }

        self.drain_events();
        self.released = true;
    }
}

impl Drop for SessionCoordinator {
    fn drop(&mut self) {
        if !self.released {
            debug!("Session dropped - disconnecting");
            self.link.request_disconnect();
        }
    }
}
