//! # hwctld — hwctl daemon
//!
//! Reads commands from stdin, one per line, until `quit`, end of input or
//! Ctrl-C; see [`hwctld::commands`] for the syntax. Replies go to stdout,
//! logs to stderr.

use anyhow::Context;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;

use hwctl_app::event_bus::InProcessEventBus;
use hwctld::commands::Command;
use hwctld::config::Config;
use hwctld::controller::{Controller, Outcome, error_chain};
use hwctld::monitor;

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let config = Config::load().context("loading configuration")?;

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(&config.logging.filter))
        .with_writer(std::io::stderr)
        .init();

    let bus = InProcessEventBus::new(config.events.capacity);
    let monitor = tokio::spawn(monitor::run(bus.subscribe()));

    let controller = Controller::build(&config, &bus).context("building devices")?;
    tracing::info!(devices = config.devices.len(), "hwctld ready");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        let line = tokio::select! {
            line = lines.next_line() => line.context("reading stdin")?,
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("interrupted");
                None
            }
        };
        let Some(line) = line else { break };
        if line.trim().is_empty() {
            continue;
        }

        let command = match line.parse::<Command>() {
            Ok(command) => command,
            Err(err) => {
                println!("error: {err}");
                continue;
            }
        };
        match controller.execute(command).await {
            Ok(Outcome::Reply(text)) => println!("{text}"),
            Ok(Outcome::Started(invocation)) => {
                println!("{} started", invocation.task());
                tokio::spawn(async move {
                    if let Err(err) = invocation.await {
                        tracing::warn!(error = %err, "task did not complete");
                    }
                });
            }
            Ok(Outcome::Quit) => break,
            Err(err) => println!("error: {}", error_chain(&err)),
        }
    }

    controller.shutdown();
    drop(controller);
    drop(bus);
    let seen = monitor.await.context("joining event monitor")?;
    tracing::info!(events = seen, "hwctld stopped");
    Ok(())
}
