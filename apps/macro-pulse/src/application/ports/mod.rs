//! Application Ports (Driven)
//!
//! Interfaces to the external collaborators the refresh pipeline consumes.
//! Infrastructure adapters implement these; tests substitute stubs.

mod calendar_feed_port;
mod completion_port;
mod feed_error;
mod rate_feed_port;
mod signal_feed_port;

pub use calendar_feed_port::CalendarFeedPort;
#[cfg(test)]
pub use completion_port::MockCompletionPort;
pub use completion_port::{
    ChatMessage, CompletionError, CompletionPort, CompletionRequest, DisabledCompletion, Role,
};
pub use feed_error::FeedError;
pub use rate_feed_port::RateFeedPort;
pub use signal_feed_port::SignalFeedPort;
