use tokio::task::JoinHandle;
use tracing::{info, warn};

use super::{StoreEvent, StoreEvents};

/// Drain a store's health notifications in the background, logging each one.
///
/// The task ends when the store client is dropped.
pub fn spawn_event_listener(mut events: StoreEvents) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            match event {
                StoreEvent::Connected => info!("Coordination store reachable"),
                StoreEvent::Disconnected { reason } => {
                    warn!(reason = %reason, "Coordination store unreachable")
                }
            }
        }
    })
}
