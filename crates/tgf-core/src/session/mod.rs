//! Session pool, failure classification and the retry loop that ties them together.

pub mod classify;
pub mod pool;
pub mod retry;

pub use classify::{classify, FailureKind};
pub use pool::SessionPool;
pub use retry::{SessionRunner, MAX_RETRIES};
