// Utils module - Utility functions

pub mod network;
pub mod rate_limiter;
pub mod retry;
pub mod shutdown;

pub use network::{Dialer, ProxyConfig};
pub use rate_limiter::{RateLimiter, parse_delay};
pub use retry::{RetryOutcome, RetryPolicy, retry_with_backoff};
pub use shutdown::Shutdown;
