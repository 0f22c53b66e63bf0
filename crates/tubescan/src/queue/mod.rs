//! The scan job queue: domain types, dedup guard, lifecycle manager,
//! dispatcher and retention sweeper.

pub mod dedup;
pub mod dispatcher;
pub mod job;
pub mod lifecycle;
pub mod sweeper;

pub use dispatcher::{Collaborators, Dispatcher};
pub use job::{AnalysisOptions, JobPriority, JobStatus, JobUpdate, ScanJob};
pub use sweeper::SweepScheduler;
