//! # Event Bus Module
//!
//! Moves link events from the device I/O thread to any number of
//! subscribers without ever blocking the transport.
//!
//! ## Overview
//!
//! - The device link appends events to a shared [`EventQueue`]
//! - A periodic drain swaps the whole queue out and hands it to the [`EventBus`]
//! - The bus delivers every event, in order, to each registered subscriber
//!   and prunes subscribers whose channel has closed
//!
//! ## Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use cnclink_core::event_bus::{EventBus, EventQueue, LinkEvent};
//!
//! let bus = Arc::new(EventBus::new());
//! let queue = Arc::new(EventQueue::new());
//! let mut sub = bus.subscribe();
//! let drain = bus.spawn_drain(queue.clone());
//!
//! queue.push(LinkEvent::device_line("ok"));
//! let event = sub.receiver.recv().await;
//!
//! bus.unsubscribe(sub.id);
//! drain.abort();
//! ```

mod bus;
mod events;
mod queue;

pub use bus::*;
pub use events::*;
pub use queue::*;
