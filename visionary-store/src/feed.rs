//! Background poller for writes made outside this process
//!
//! Writes made by this service refresh and notify inline (see
//! [`Storefront`]). The poller covers everything else: other service
//! instances, the backend's own dashboard, scripts.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::interval;
use tracing::{debug, info};

use crate::storefront::Storefront;

/// Start polling every `period`
///
/// The first tick fires after one full period; startup does its own initial
/// refresh. The task runs until the returned handle is aborted.
pub fn spawn_poller(storefront: Arc<Storefront>, period: Duration) -> JoinHandle<()> {
    info!("Starting change poller (interval: {}s)", period.as_secs());

    tokio::spawn(async move {
        let mut timer = interval(period);
        timer.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        timer.tick().await;

        loop {
            timer.tick().await;
            debug!("Polling backend for changes");
            storefront.poll().await;
        }
    })
}
