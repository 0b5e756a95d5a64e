//! Event Bus implementation.
//!
//! A registry of subscriber channels keyed by stable handles, plus the
//! periodic drain that moves queued events out to every subscriber.

use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use uuid::Uuid;

use super::events::LinkEvent;
use super::queue::EventQueue;
use crate::error::SubscriberDeliveryError;

/// Shortest period a periodic task ticks at; zero would busy-loop or panic
pub const MIN_TICK_PERIOD: Duration = Duration::from_millis(1);

/// `period`, raised to [`MIN_TICK_PERIOD`]
pub fn tick_period(period: Duration) -> Duration {
    period.max(MIN_TICK_PERIOD)
}

/// Subscription handle for unsubscribing from events
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(Uuid);

impl SubscriptionId {
    /// Create a new unique subscription ID
    fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl std::fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Sub({})", &self.0.to_string()[..8])
    }
}

/// Sending half held by the bus for one subscriber
pub type EventSender = mpsc::UnboundedSender<LinkEvent>;

/// Receiving half handed to a subscriber
pub type EventReceiver = mpsc::UnboundedReceiver<LinkEvent>;

/// A registered subscriber: its handle and event channel
#[derive(Debug)]
pub struct Subscription {
    /// Handle for `unsubscribe`
    pub id: SubscriptionId,
    /// Events delivered by each drain cycle, in queue order
    pub receiver: EventReceiver,
}

/// Configuration for the event bus
#[derive(Debug, Clone)]
pub struct EventBusConfig {
    /// How often the queue is drained and fanned out.
    pub drain_interval: Duration,
}

impl Default for EventBusConfig {
    fn default() -> Self {
        Self {
            drain_interval: Duration::from_millis(100),
        }
    }
}

/// Outcome of one broadcast
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BroadcastReport {
    /// Events in the cycle
    pub events: usize,
    /// Successful (event, subscriber) deliveries
    pub delivered: usize,
    /// Subscribers removed for failing delivery
    pub removed: usize,
}

/// Fan-out of link events to all registered subscribers
pub struct EventBus {
    /// Registered subscriber channels
    subscribers: Arc<RwLock<HashMap<SubscriptionId, EventSender>>>,
    /// Configuration
    config: EventBusConfig,
}

impl EventBus {
    /// Create a new event bus with default configuration
    pub fn new() -> Self {
        Self::with_config(EventBusConfig::default())
    }

    /// Create a new event bus with custom configuration
    pub fn with_config(config: EventBusConfig) -> Self {
        Self {
            subscribers: Arc::new(RwLock::new(HashMap::new())),
            config,
        }
    }

    /// Register a new subscriber with a fresh unbounded channel
    pub fn subscribe(&self) -> Subscription {
        let (sender, receiver) = mpsc::unbounded_channel();
        let id = self.register(sender);
        Subscription { id, receiver }
    }

    /// Register an existing sender
    ///
    /// Useful when the caller must put something on the channel before
    /// the first drain cycle can reach it.
    pub fn register(&self, sender: EventSender) -> SubscriptionId {
        let id = SubscriptionId::new();
        self.subscribers.write().insert(id, sender);
        tracing::debug!("Subscription {} added", id);
        id
    }

    /// Unsubscribe from events
    ///
    /// Returns true if the subscription was found and removed.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let removed = self.subscribers.write().remove(&id).is_some();
        if removed {
            tracing::debug!("Subscription {} removed", id);
        }
        removed
    }

    /// Get the number of active subscriptions
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.read().len()
    }

    /// Get the current configuration
    pub fn config(&self) -> &EventBusConfig {
        &self.config
    }

    /// Deliver `events`, in order, to every subscriber registered when the
    /// call starts.
    ///
    /// The subscriber set is copied up front, so joins and leaves during the
    /// broadcast take effect from the next one. A subscriber whose channel is
    /// closed is skipped for the rest of the cycle and removed afterwards;
    /// the others still receive every event.
    pub fn broadcast(&self, events: Vec<LinkEvent>) -> BroadcastReport {
        let mut report = BroadcastReport {
            events: events.len(),
            ..Default::default()
        };
        if events.is_empty() {
            return report;
        }

        let mut targets: Vec<(SubscriptionId, EventSender, bool)> = self
            .subscribers
            .read()
            .iter()
            .map(|(id, sender)| (*id, sender.clone(), true))
            .collect();

        if targets.is_empty() {
            tracing::trace!("No subscribers for {} events", events.len());
            return report;
        }

        for event in &events {
            for (id, sender, alive) in targets.iter_mut().filter(|(_, _, alive)| *alive) {
                match deliver(*id, sender, event) {
                    Ok(()) => report.delivered += 1,
                    Err(e) => {
                        tracing::warn!("Dropping subscriber: {}", e);
                        *alive = false;
                    }
                }
            }
        }

        let failed: Vec<SubscriptionId> = targets
            .iter()
            .filter(|(_, _, alive)| !*alive)
            .map(|(id, _, _)| *id)
            .collect();
        if !failed.is_empty() {
            let mut subscribers = self.subscribers.write();
            for id in &failed {
                subscribers.remove(id);
            }
            report.removed = failed.len();
            tracing::info!("Removed {} disconnected subscribers", failed.len());
        }

        tracing::trace!(
            "Broadcast complete: {} events, {} deliveries, {} removed",
            report.events,
            report.delivered,
            report.removed
        );
        report
    }

    /// Run one drain cycle: take the whole queue and broadcast it
    pub fn drain_once(&self, queue: &EventQueue) -> BroadcastReport {
        self.broadcast(queue.drain())
    }

    /// Spawn the periodic drain task on the current tokio runtime
    pub fn spawn_drain(self: &Arc<Self>, queue: Arc<EventQueue>) -> JoinHandle<()> {
        let bus = Arc::clone(self);
        let period = tick_period(self.config.drain_interval);
        tokio::spawn(async move {
            tracing::info!("Event bus drain started ({:?} interval)", period);
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            let mut processed: u64 = 0;
            loop {
                ticker.tick().await;
                let report = bus.drain_once(&queue);
                processed += report.events as u64;
                if report.events > 0 {
                    tracing::debug!("Drained {} events ({} total)", report.events, processed);
                }
            }
        })
    }
}

fn deliver(
    id: SubscriptionId,
    sender: &EventSender,
    event: &LinkEvent,
) -> Result<(), SubscriberDeliveryError> {
    sender
        .send(event.clone())
        .map_err(|_| SubscriberDeliveryError::Closed(id))
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("subscribers", &self.subscriber_count())
            .field("config", &self.config)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lines(rx: &mut EventReceiver) -> Vec<String> {
        let mut out = Vec::new();
        while let Ok(event) = rx.try_recv() {
            if let LinkEvent::DeviceLine { raw, .. } = event {
                out.push(raw);
            }
        }
        out
    }

    #[test]
    fn test_event_bus_creation() {
        let bus = EventBus::new();
        assert_eq!(bus.subscriber_count(), 0);
        assert_eq!(bus.config().drain_interval, Duration::from_millis(100));
    }

    #[test]
    fn test_subscribe_and_unsubscribe() {
        let bus = EventBus::new();

        let sub = bus.subscribe();
        assert_eq!(bus.subscriber_count(), 1);

        assert!(bus.unsubscribe(sub.id));
        assert_eq!(bus.subscriber_count(), 0);

        // Double unsubscribe should return false
        assert!(!bus.unsubscribe(sub.id));
    }

    #[test]
    fn test_broadcast_preserves_order_for_every_subscriber() {
        let bus = EventBus::new();
        let mut a = bus.subscribe();
        let mut b = bus.subscribe();

        let report = bus.broadcast(vec![
            LinkEvent::device_line("1"),
            LinkEvent::device_line("2"),
            LinkEvent::device_line("3"),
        ]);

        assert_eq!(report.events, 3);
        assert_eq!(report.delivered, 6);
        assert_eq!(lines(&mut a.receiver), ["1", "2", "3"]);
        assert_eq!(lines(&mut b.receiver), ["1", "2", "3"]);
    }

    #[test]
    fn test_failed_subscriber_removed_without_blocking_others() {
        let bus = EventBus::new();
        let mut first = bus.subscribe();
        let dead = bus.subscribe();
        let mut last = bus.subscribe();
        drop(dead.receiver);

        let report = bus.broadcast(vec![LinkEvent::device_line("a"), LinkEvent::device_line("b")]);

        assert_eq!(report.removed, 1);
        assert_eq!(report.delivered, 4);
        assert_eq!(bus.subscriber_count(), 2);
        assert_eq!(lines(&mut first.receiver), ["a", "b"]);
        assert_eq!(lines(&mut last.receiver), ["a", "b"]);
    }

    #[test]
    fn test_drain_once_empties_queue() {
        let bus = EventBus::new();
        let queue = EventQueue::new();
        let mut sub = bus.subscribe();

        queue.push(LinkEvent::device_line("x"));
        assert_eq!(bus.drain_once(&queue).events, 1);
        assert!(queue.is_empty());
        assert_eq!(bus.drain_once(&queue).events, 0);
        assert_eq!(lines(&mut sub.receiver), ["x"]);
    }

    #[test]
    fn test_late_subscriber_sees_only_later_cycles() {
        let bus = EventBus::new();
        let queue = EventQueue::new();
        let mut early = bus.subscribe();

        queue.push(LinkEvent::device_line("first"));
        bus.drain_once(&queue);

        let mut late = bus.subscribe();
        queue.push(LinkEvent::device_line("second"));
        bus.drain_once(&queue);

        assert_eq!(lines(&mut early.receiver), ["first", "second"]);
        assert_eq!(lines(&mut late.receiver), ["second"]);
    }

    #[tokio::test]
    async fn test_spawned_drain_delivers() {
        let bus = Arc::new(EventBus::with_config(EventBusConfig {
            drain_interval: Duration::from_millis(10),
        }));
        let queue = Arc::new(EventQueue::new());
        let mut sub = bus.subscribe();
        let task = bus.spawn_drain(Arc::clone(&queue));

        queue.push(LinkEvent::connection_changed(true));
        let event = tokio::time::timeout(Duration::from_secs(2), sub.receiver.recv())
            .await
            .expect("drain should deliver");
        assert_eq!(event, Some(LinkEvent::connection_changed(true)));

        task.abort();
    }

    #[test]
    fn test_tick_period_has_floor() {
        assert_eq!(tick_period(Duration::ZERO), MIN_TICK_PERIOD);
        assert_eq!(tick_period(Duration::from_millis(250)), Duration::from_millis(250));
    }

    #[tokio::test]
    async fn test_zero_drain_interval_still_delivers() {
        let bus = Arc::new(EventBus::with_config(EventBusConfig {
            drain_interval: Duration::ZERO,
        }));
        let queue = Arc::new(EventQueue::new());
        let mut sub = bus.subscribe();
        let task = bus.spawn_drain(Arc::clone(&queue));

        queue.push(LinkEvent::device_line("ok"));
        let event = tokio::time::timeout(Duration::from_secs(2), sub.receiver.recv())
            .await
            .expect("drain should deliver");
        assert_eq!(event, Some(LinkEvent::device_line("ok")));

        task.abort();
    }
}
