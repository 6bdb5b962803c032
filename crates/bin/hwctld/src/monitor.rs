//! Event monitor — logs everything published on the bus.

use tokio::sync::broadcast::Receiver;
use tokio::sync::broadcast::error::RecvError;

use hwctl_domain::event::{Event, EventType};

/// Log events from `rx` until the bus is closed. Returns how many were seen.
pub async fn run(mut rx: Receiver<Event>) -> u64 {
    let mut seen = 0;
    loop {
        match rx.recv().await {
            Ok(event) => {
                seen += 1;
                log(&event);
            }
            Err(RecvError::Lagged(skipped)) => {
                tracing::warn!(skipped, "event monitor lagged behind");
            }
            Err(RecvError::Closed) => break,
        }
    }
    seen
}

fn log(event: &Event) {
    let channel = event
        .channel
        .as_ref()
        .map(ToString::to_string)
        .unwrap_or_default();
    match event.event_type {
        EventType::TaskRejected => {
            tracing::warn!(%channel, data = %event.data, "task rejected");
        }
        EventType::TaskSettled if event.data["ok"] == false => {
            tracing::warn!(%channel, data = %event.data, "task failed");
        }
        kind => {
            tracing::debug!(%channel, ?kind, data = %event.data, "event");
        }
    }
}
