pub mod history_retention_job;

pub use history_retention_job::create_history_retention_job;
