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

//! Line-oriented console front end.

use anyhow::Result;
use std::io::BufRead;
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::bluetooth::Control;
use crate::state::{ConnectionState, SessionView};

/// Actions that can be typed at the console.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsoleAction {
    Connect,
    Disconnect,
    Press(Control),
    Release(Control),
    ToggleLight,
    Status,
    Help,
    Quit,
}

impl ConsoleAction {
    /// Parse one input line. Blank lines yield `None`.
    pub fn parse(line: &str) -> Option<Self> {
        let action = match line.trim().to_lowercase().as_str() {
            "connect" | "c!" => Self::Connect,
            "disconnect" | "d!" => Self::Disconnect,
            "forward" | "f" => Self::Press(Control::Forward),
            "back" | "backward" | "b" => Self::Press(Control::Backward),
            "left" | "l" => Self::Press(Control::Left),
            "right" | "r" => Self::Press(Control::Right),
            "stop" | "s" => Self::Release(Control::Forward),
            "center" | "c" => Self::Release(Control::Left),
            "light" | "n" => Self::ToggleLight,
            "status" | "?" => Self::Status,
            "help" | "h" => Self::Help,
            "quit" | "exit" | "q" => Self::Quit,
            _ => return None,
        };
        Some(action)
    }
}

pub const HELP: &str = "\
connect (c!)      connect to the platform
disconnect (d!)   close the link
forward (f)       start moving forward
back (b)          start moving backward
stop (s)          stop forward/backward motion
left (l)          start turning left
right (r)         start turning right
center (c)        stop turning
light (n)         toggle the light
status (?)        show the session status
quit (q)          disconnect and exit";

/// One status line for the session view.
pub fn render_status(view: &SessionView) -> String {
    let marker = match view.state() {
        ConnectionState::Connected => "●",
        ConnectionState::Connecting => "◐",
        ConnectionState::Disconnected => "○",
    };
    format!(
        "{} {} | light: {}",
        marker,
        view.message,
        if view.light_on { "on" } else { "off" }
    )
}

/// Read console input on a dedicated thread.
pub fn run_console() -> Result<mpsc::UnboundedReceiver<ConsoleAction>> {
    let (action_tx, action_rx) = mpsc::unbounded_channel();

    std::thread::Builder::new()
        .name("console-input".to_string())
        .spawn(move || {
            let stdin = std::io::stdin();
            for line in stdin.lock().lines() {
                let Ok(line) = line else { break };
                if line.trim().is_empty() {
                    continue;
                }
                match ConsoleAction::parse(&line) {
                    Some(action) => {
                        if action_tx.send(action).is_err() {
                            break;
                        }
                    }
                    None => println!("Unknown command: {} (type 'help')", line.trim()),
                }
            }
            debug!("Console input closed");
            let _ = action_tx.send(ConsoleAction::Quit);
        })?;

    info!("Console started");
    Ok(action_rx)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_actions() {
        assert_eq!(ConsoleAction::parse("connect"), Some(ConsoleAction::Connect));
        assert_eq!(
            ConsoleAction::parse(" F "),
            Some(ConsoleAction::Press(Control::Forward))
        );
        assert_eq!(
            ConsoleAction::parse("stop"),
            Some(ConsoleAction::Release(Control::Forward))
        );
        assert_eq!(
            ConsoleAction::parse("c"),
            Some(ConsoleAction::Release(Control::Left))
        );
        assert_eq!(ConsoleAction::parse("n"), Some(ConsoleAction::ToggleLight));
        assert_eq!(ConsoleAction::parse("jump"), None);
    }

    #[test]
    fn test_render_status() {
        let mut view = SessionView::default();
        assert_eq!(render_status(&view), "○ Disconnected | light: off");

        view.connected = true;
        view.message = "Connected to ESP32-AUTO".to_string();
        view.light_on = true;
        assert_eq!(
            render_status(&view),
            "● Connected to ESP32-AUTO | light: on"
        );
    }
}
