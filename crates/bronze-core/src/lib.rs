pub mod archive;
pub mod config;
pub mod db;
pub mod enumerate;
pub mod ingestion;
pub mod loader;
pub mod pipelines;
pub mod scheduler;
pub mod storage;

pub use config::BronzeConfig;
pub use ingestion::{FileReport, FileStatus, IngestContext, PipelineRun};
pub use loader::{Database, LoadPolicy, PostgresDatabase};
pub use pipelines::{PipelineDefinition, Plan};
pub use scheduler::{PlanReport, RetryPolicy, Scheduler, TaskStatus};
pub use storage::Storage;
