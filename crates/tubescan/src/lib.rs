pub mod analysis;
pub mod broadcast;
pub mod config;
pub mod db;
pub mod error;
pub mod pipeline;
pub mod queue;
pub mod service;
pub mod telemetry;
pub mod video;

pub use broadcast::{ScanEvent, ScanEventBroadcaster};
pub use config::QueueConfig;
pub use db::Database;
pub use error::TubescanError;
pub use pipeline::{Pipeline, PipelineConfig, StepError};
pub use queue::{
    AnalysisOptions, Collaborators, Dispatcher, JobPriority, JobStatus, JobUpdate, ScanJob,
    SweepScheduler,
};
pub use service::{EnqueueRequest, JobList, JobStats, QueueService};

pub type Result<T> = std::result::Result<T, TubescanError>;
