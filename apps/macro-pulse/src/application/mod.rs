//! Application Layer - Use cases and port definitions.
//!
//! This layer contains the refresh services and the port interfaces
//! that define how the pipeline reaches its external collaborators.

/// Port interfaces for feeds and the completion service.
pub mod ports;

/// Application services for refresh coordination and narrative synthesis.
pub mod services;
