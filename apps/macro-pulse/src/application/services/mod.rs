//! Application Services
//!
//! Services that orchestrate domain logic and coordinate between ports.
//!
//! - `SnapshotStore`: latest generation plus the single-flight flag
//! - `NarrativeSynthesizer`: sectioned report and event commentary
//! - `RefreshCoordinator`: the refresh pipeline and its triggers
//! - `RefreshScheduler`: interval and daily trigger tasks

mod coordinator;
mod scheduler;
mod store;
mod synthesizer;

pub use coordinator::{
    PipelineError, RefreshCoordinator, RefreshPorts, RefreshResult, RefreshSettings,
    TriggerOutcome, TriggerSource,
};
pub use scheduler::{RefreshScheduler, ScheduleSettings, next_daily_run};
pub use store::{SnapshotStore, UpdateGuard};
pub use synthesizer::{CommentaryReport, NarrativeSynthesizer, SynthesizerSettings};
