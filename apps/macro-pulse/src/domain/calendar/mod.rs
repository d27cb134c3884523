//! Economic Calendar Domain
//!
//! Canonical event types and the normalization rules that turn provider
//! records into them.

mod event;
pub mod fallback;
mod normalizer;
pub mod regions;
pub mod timestamp;

pub use event::{ActualValue, Event, Importance, NOT_APPLICABLE, PENDING};
pub use normalizer::{EventNormalizer, MAX_NAME_CHARS, MAX_VALUE_CHARS, NormalizedBatch, SkipReason};
