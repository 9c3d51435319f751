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

//! Session state observed by the presentation layer.

use crate::bluetooth::MSG_DISCONNECTED;

/// Connection state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
}

impl ConnectionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Connected => "connected",
        }
    }
}

/// Everything the presentation layer reads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionView {
    /// Whether a link is open.
    pub connected: bool,

    /// Status line to display verbatim.
    pub message: String,

    /// A connect attempt is in flight.
    pub connecting: bool,

    /// Local state of the auxiliary light.
    pub light_on: bool,
}

impl Default for SessionView {
    fn default() -> Self {
        Self {
            connected: false,
            message: MSG_DISCONNECTED.to_string(),
            connecting: false,
            light_on: false,
        }
    }
}

impl SessionView {
    pub fn state(&self) -> ConnectionState {
        if self.connected {
            ConnectionState::Connected
        } else if self.connecting {
            ConnectionState::Connecting
        } else {
            ConnectionState::Disconnected
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_view_state() {
        let mut view = SessionView::default();
        assert_eq!(view.state(), ConnectionState::Disconnected);

        view.connecting = true;
        assert_eq!(view.state(), ConnectionState::Connecting);

        view.connected = true;
        view.connecting = false;
        assert_eq!(view.state(), ConnectionState::Connected);
        assert_eq!(view.state().as_str(), "connected");
    }
}
