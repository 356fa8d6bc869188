pub mod logging;
pub mod retry;

pub use retry::{retry_async, wait_until, RetryPolicy};
