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

//! Connect once, send a command string, disconnect.
//!
//! Usage: cargo run --bin probe_link -- [COMMANDS]   (e.g. "FSLC")

use anyhow::{anyhow, Result};
use controlrc_desktop::bluetooth::{spawn_link_worker, BluezRadio, Command, LinkController};
use controlrc_desktop::config::Config;
use std::env;
use std::sync::Arc;
use std::time::Duration;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt::init();

    let commands = env::args().nth(1).unwrap_or_else(|| "N".to_string());
    let commands = commands
        .chars()
        .map(|c| Command::parse(&c.to_string()).ok_or_else(|| anyhow!("Unknown command: {}", c)))
        .collect::<Result<Vec<_>>>()?;

    let config = Config::load()?;
    println!("Looking for '{}'...", config.link.target_peer_name);

    let radio = BluezRadio::new().await;
    let controller = LinkController::new(radio, Arc::new(config.permissions.gate()), config.link);
    let (link, worker) = spawn_link_worker(controller);

    let status = link.status().await;
    println!(
        "Radio available: {}, enabled: {}",
        status.available, status.enabled
    );

    let peer = link.connect().await?;
    println!("Connected to {} ({})", peer.display_name(), peer.address);

    for command in commands {
        let sent = link.send(command.to_wire()).await;
        println!("{} -> {}", command, if sent { "sent" } else { "not sent" });
        tokio::time::sleep(Duration::from_millis(300)).await;
    }

    link.disconnect().await;
    drop(link);
    worker.await?;
    println!("Done!");

    Ok(())
}
