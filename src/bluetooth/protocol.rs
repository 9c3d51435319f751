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

//! Wire vocabulary for the RC platform.
//!
//! Every command is a single ASCII byte with no framing, checksum or
//! acknowledgement. One byte is sent per press or release edge.

use std::fmt;
use uuid::Uuid;

/// Standard SPP UUID.
pub const SPP_UUID: Uuid = Uuid::from_u128(0x00001101_0000_1000_8000_00805F9B34FB);

/// Name the platform firmware advertises.
pub const DEFAULT_PEER_NAME: &str = "ESP32-AUTO";

/// Single-byte commands understood by the platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Command {
    Forward,
    Backward,
    /// Stop longitudinal motion.
    Stop,
    Left,
    Right,
    /// Stop lateral motion.
    Center,
    /// Toggle the auxiliary light.
    ToggleLight,
}

impl Command {
    pub const ALL: [Command; 7] = [
        Command::Forward,
        Command::Backward,
        Command::Stop,
        Command::Left,
        Command::Right,
        Command::Center,
        Command::ToggleLight,
    ];

    /// The byte put on the wire.
    pub fn as_byte(self) -> u8 {
        match self {
            Self::Forward => b'F',
            Self::Backward => b'B',
            Self::Stop => b'S',
            Self::Left => b'L',
            Self::Right => b'R',
            Self::Center => b'C',
            Self::ToggleLight => b'N',
        }
    }

    /// Encode for sending.
    pub fn to_wire(self) -> Vec<u8> {
        vec![self.as_byte()]
    }

    /// Decode a wire byte.
    pub fn from_byte(byte: u8) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.as_byte() == byte)
    }

    /// Parse a command from its wire letter or its name (case-insensitive).
    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim();
        if let [byte] = s.as_bytes() {
            return Self::from_byte(byte.to_ascii_uppercase());
        }
        match s.to_uppercase().as_str() {
            "FORWARD" => Some(Self::Forward),
            "BACKWARD" | "BACK" => Some(Self::Backward),
            "STOP" => Some(Self::Stop),
            "LEFT" => Some(Self::Left),
            "RIGHT" => Some(Self::Right),
            "CENTER" => Some(Self::Center),
            "LIGHT" | "TOGGLE_LIGHT" => Some(Self::ToggleLight),
            _ => None,
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_byte() as char)
    }
}

/// Momentary controls on the handheld.
///
/// Pressing starts motion in one direction, releasing stops the axis the
/// control belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Control {
    Forward,
    Backward,
    Left,
    Right,
}

impl Control {
    /// Command sent on the press edge.
    pub fn pressed(self) -> Command {
        match self {
            Self::Forward => Command::Forward,
            Self::Backward => Command::Backward,
            Self::Left => Command::Left,
            Self::Right => Command::Right,
        }
    }

    /// Command sent on the release edge.
    pub fn released(self) -> Command {
        match self {
            Self::Forward | Self::Backward => Command::Stop,
            Self::Left | Self::Right => Command::Center,
        }
    }

    /// Command for the given edge.
    pub fn edge(self, pressed: bool) -> Command {
        if pressed {
            self.pressed()
        } else {
            self.released()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_bytes() {
        let wire: Vec<u8> = Command::ALL.iter().map(|c| c.as_byte()).collect();
        assert_eq!(wire, b"FBSLRCN");
        assert_eq!(Command::Forward.to_wire(), b"F".to_vec());
        assert_eq!(Command::from_byte(b'N'), Some(Command::ToggleLight));
        assert_eq!(Command::from_byte(b'x'), None);
    }

    #[test]
    fn test_command_parse() {
        assert_eq!(Command::parse("f"), Some(Command::Forward));
        assert_eq!(Command::parse("S"), Some(Command::Stop));
        assert_eq!(Command::parse("back"), Some(Command::Backward));
        assert_eq!(Command::parse(" light "), Some(Command::ToggleLight));
        assert_eq!(Command::parse("z"), None);
        assert_eq!(Command::parse(""), None);
    }

    #[test]
    fn test_control_edges() {
        assert_eq!(Control::Forward.edge(true), Command::Forward);
        assert_eq!(Control::Forward.edge(false), Command::Stop);
        assert_eq!(Control::Backward.released(), Command::Stop);
        assert_eq!(Control::Left.pressed(), Command::Left);
        assert_eq!(Control::Right.released(), Command::Center);
    }

    #[test]
    fn test_spp_uuid() {
        assert_eq!(
            SPP_UUID.to_string().to_lowercase(),
            "00001101-0000-1000-8000-00805f9b34fb"
        );
    }
}
