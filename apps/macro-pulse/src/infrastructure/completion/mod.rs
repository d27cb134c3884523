//! Completion Service Adapter
//!
//! HTTP implementation of the completion port.

mod client;

pub use client::ChatCompletionClient;
