pub mod queue;
pub mod runner;
pub mod worker;

pub use queue::{local_channel, LocalTaskSource, RemoteTaskSource, TaskSource};
pub use runner::ScrapeRunner;
pub use worker::{TaskRunner, WorkerPool};
