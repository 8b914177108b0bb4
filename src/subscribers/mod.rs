//! # Event subscribers.
//!
//! [`Subscribe`] is the extension point for observing the runtime: every event
//! published on the [`Bus`](crate::events::Bus) is fanned out to the registered
//! subscribers through a [`SubscriberSet`].
//!
//! ```text
//!   Bus ──► subscriber_listener (TaskManager) ──► SubscriberSet::emit
//!                                                    ├──► [queue] ─► LogWriter
//!                                                    └──► [queue] ─► custom ...
//! ```
//!
//! ## Implementing custom subscribers
//! ```no_run
//! use async_trait::async_trait;
//! use taskframe::{Event, EventKind, Subscribe};
//!
//! struct FailureCounter;
//!
//! #[async_trait]
//! impl Subscribe for FailureCounter {
//!     async fn on_event(&self, event: &Event) {
//!         if event.kind == EventKind::TaskFailed {
//!             // increment a counter
//!         }
//!     }
//!     fn name(&self) -> &'static str { "failure-counter" }
//! }
//! ```

mod log;
mod set;
mod subscribe;

pub use log::LogWriter;
pub use set::SubscriberSet;
pub use subscribe::Subscribe;
