//! Domain Layer
//!
//! Pure types and rules: calendar normalization, market context, narrative
//! parsing and the snapshot model. No I/O.

pub mod calendar;
pub mod market;
pub mod narrative;
pub mod shared;
pub mod snapshot;
