pub mod backoff;
pub mod supervisor;

pub use backoff::{BackoffPolicy, ConnectionState, RetrySchedule};
pub use supervisor::{ConnectionSupervisor, FeedEvent};
