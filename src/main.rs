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

//! ControlRC Desktop Application
//!
//! Usage: controlrc-desktop [--config <path>] [--simulate]

use anyhow::{anyhow, Result};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use controlrc_desktop::bluetooth::{
    mock::MockRadio, spawn_link_worker, BluezRadio, LinkController, LinkEvent, Radio,
};
use controlrc_desktop::config::Config;
use controlrc_desktop::session::SessionCoordinator;
use controlrc_desktop::ui::{self, render_status, ConsoleAction};

struct Args {
    config: Option<PathBuf>,
    simulate: bool,
}

fn parse_args() -> Result<Args> {
    let mut args = Args {
        config: None,
        simulate: false,
    };
    let mut iter = std::env::args().skip(1);
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--config" => {
                let path = iter
                    .next()
                    .ok_or_else(|| anyhow!("--config needs a path"))?;
                args.config = Some(PathBuf::from(path));
            }
            "--simulate" => args.simulate = true,
            other => return Err(anyhow!("Unknown argument: {}", other)),
        }
    }
    Ok(args)
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("controlrc_desktop=info".parse()?),
        )
        .init();

    info!(
        "Starting ControlRC Desktop v{}...",
        env!("CARGO_PKG_VERSION")
    );

    let args = parse_args()?;

    // Load configuration
    let config = match &args.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };
    info!(
        "Configuration loaded, target peer '{}'",
        config.link.target_peer_name
    );

    if args.simulate {
        info!("Using simulated radio");
        let radio = MockRadio::new().bond(&config.link.target_peer_name);
        run(radio, config).await
    } else {
        run(BluezRadio::new().await, config).await
    }
}

enum Input {
    Link(Option<LinkEvent>),
    Action(ConsoleAction),
}

async fn run<R: Radio>(radio: R, config: Config) -> Result<()> {
    let mut controller = LinkController::new(
        radio,
        Arc::new(config.permissions.gate()),
        config.link.clone(),
    );
    let events = controller.subscribe();
    let (link, worker) = spawn_link_worker(controller);

    let mut session = SessionCoordinator::new(link, events);
    let mut view_rx = session.subscribe();
    let mut action_rx = ui::run_console()?;

    println!("{}", ui::HELP);
    println!("{}", render_status(&session.view()));

    loop {
        let input = tokio::select! {
            event = session.recv_event() => Input::Link(event),
            action = action_rx.recv() => Input::Action(action.unwrap_or(ConsoleAction::Quit)),
            _ = tokio::signal::ctrl_c() => {
                info!("Shutdown signal received");
                Input::Action(ConsoleAction::Quit)
            }
        };

        match input {
            Input::Link(Some(event)) => session.apply(event),
            Input::Link(None) => {
                warn!("Link worker stopped");
                break;
            }
            Input::Action(ConsoleAction::Quit) => {
                info!("Quit requested");
                break;
            }
            Input::Action(action) => handle_action(&mut session, action).await,
        }

        if view_rx.has_changed().unwrap_or(false) {
            println!("{}", render_status(&view_rx.borrow_and_update()));
        }
    }

    session.shutdown().await;
    worker.await?;

    info!("ControlRC Desktop stopped");
    Ok(())
}

async fn handle_action(session: &mut SessionCoordinator, action: ConsoleAction) {
    match action {
        ConsoleAction::Connect => session.connect(),
        ConsoleAction::Disconnect => session.disconnect(),
        ConsoleAction::Press(control) => {
            session.control(control, true);
        }
        ConsoleAction::Release(control) => {
            session.control(control, false);
        }
        ConsoleAction::ToggleLight => {
            session.toggle_light();
        }
        ConsoleAction::Status => {
            let status = session.status().await;
            println!(
                "radio available: {}, enabled: {}, link open: {}",
                status.available, status.enabled, status.connected
            );
            println!("{}", render_status(&session.view()));
        }
        ConsoleAction::Help => println!("{}", ui::HELP),
        ConsoleAction::Quit => {}
    }
}
