//! # CncLink Core
//!
//! Core types shared by the CncLink crates: the machine status snapshot,
//! link events, the event queue and bus, and the error taxonomy.

pub mod data;
pub mod error;
pub mod event_bus;

pub use data::{
    ConnectionState, ConnectionStatus, FeedSpindle, MachineStatus, Position, StatusUpdate,
    UNKNOWN_STATE,
};

pub use error::{
    Error, ProtocolParseError, Result, SubscriberDeliveryError, TransportError, TransportResult,
};

pub use event_bus::{
    BroadcastReport, EventBus, EventBusConfig, EventQueue, EventReceiver, EventSender, LinkEvent,
    Subscription, SubscriptionId, MIN_TICK_PERIOD, tick_period,
};
