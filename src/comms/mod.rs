//! Signal propagation between ships.
//!
//! Senders enqueue [`Signal`]s at the [`CommunicationEngine`]; every tick
//! the engine delivers each signal to the receivers inside its propagation
//! window and then advances it.

pub mod devices;
pub mod engine;

pub use devices::{Receiver, ReceiverSlot, Sender, SenderBounds, DEFAULT_TOLERANCE, INBOX_CAPACITY};
pub use engine::{CommsConfig, CommunicationEngine, Signal, SignalReceiver};
