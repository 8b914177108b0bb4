//! Backoff policies for transient store failures.
//!
//! ## Contents
//! - [`BackoffPolicy`] how delays between store attempts evolve (first / factor / max + jitter)
//! - [`JitterPolicy`]  randomization strategy to avoid synchronized retries
//!
//! ## Quick wiring
//! ```text
//! Config { store_retry: BackoffPolicy, store_attempts: u32 }
//!      └─► TaskManagerBuilder wraps the store in RetryStore when store_attempts > 1
//!           └─► RetryStore uses backoff.next(attempt) between attempts
//! ```
//!
//! ## Defaults
//! - `BackoffPolicy::default()` → first=100ms, factor=2.0, max=5s, jitter=Equal.
//! - `JitterPolicy::None` when constructed directly.

mod backoff;
mod jitter;

pub use backoff::BackoffPolicy;
pub use jitter::JitterPolicy;
