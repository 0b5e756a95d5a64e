//! Background services of a connected link: the event bus drain and the
//! periodic status poll.

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use cnclink_core::{tick_period, LinkEvent};

use super::link::DeviceLink;
use crate::firmware::grbl::STATUS_QUERY;

/// Polls between debug summaries
const POLL_LOG_EVERY: u64 = 20;

/// Handles of the tasks started by [`DeviceLink::spawn_services`]
#[derive(Debug)]
pub struct LinkServices {
    /// Event bus drain
    pub drain: JoinHandle<()>,
    /// Status poll
    pub poll: JoinHandle<()>,
}

impl LinkServices {
    /// Abort both tasks
    pub fn shutdown(self) {
        self.drain.abort();
        self.poll.abort();
        tracing::info!("Link services stopped");
    }
}

impl DeviceLink {
    /// Start the bus drain and status poll on the current tokio runtime
    pub fn spawn_services(&self) -> LinkServices {
        let drain = self.bus().spawn_drain(std::sync::Arc::clone(self.queue()));
        let poll = tokio::spawn(poll_status(self.clone()));
        LinkServices { drain, poll }
    }

    /// One status poll cycle.
    ///
    /// Queries the device when connected; a failure is logged and otherwise
    /// ignored. Then queues the current snapshot if configured to, connected
    /// or not, so subscribers that joined between device updates converge.
    pub async fn poll_once(&self) {
        if self.is_connected() {
            let window = self.config().poll_window;
            match self.send_command_async(STATUS_QUERY, window).await {
                Ok(lines) => tracing::trace!("Status poll captured {} lines", lines.len()),
                Err(e) => tracing::warn!("Failed to send status query: {}", e),
            }
        }

        if self.config().publish_snapshot_on_poll {
            self.queue().push(LinkEvent::status_changed(self.status()));
        }
    }
}

async fn poll_status(link: DeviceLink) {
    let period = tick_period(link.config().poll_interval);
    tracing::info!("Status poll started ({:?} interval)", period);

    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut polls: u64 = 0;

    loop {
        ticker.tick().await;
        link.poll_once().await;
        polls += 1;
        if polls % POLL_LOG_EVERY == 0 {
            tracing::debug!("Status poll #{} ({})", polls, link.status());
        }
    }
}
