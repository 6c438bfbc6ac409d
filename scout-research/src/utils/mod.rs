//! Utility modules for scout-research

pub mod retry;

pub use retry::{is_lock_error, retry_with_backoff, RetryPolicy};
