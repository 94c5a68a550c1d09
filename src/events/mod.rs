//! # Events Module
//!
//! Event-driven architecture for GUI-ready progress reporting.
//!
//! ## Design
//! The core library emits events through channels, allowing any UI
//! (CLI, GUI, web) to subscribe and display progress. Senders never
//! block the engine: an absent or slow listener just loses events.
//!
//! ## Example
//! ```rust,ignore
//! let (sender, receiver) = EventChannel::new();
//!
//! // In a separate thread, listen for events
//! std::thread::spawn(move || {
//!     for event in receiver.iter() {
//!         match event {
//!             Event::Analysis(AnalysisEvent::BatchSettled { completed, total, .. }) => {
//!                 println!("Analyzed {completed}/{total}");
//!             }
//!             _ => {}
//!         }
//!     }
//! });
//!
//! // Build the orchestrator with the sender
//! let orchestrator = Orchestrator::builder().events(sender)/* ... */.build()?;
//! ```

mod channel;
mod types;

pub use channel::{EventChannel, EventReceiver, EventSender};
pub use types::*;
