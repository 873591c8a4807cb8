pub mod listing;
pub mod recheck_job;
pub mod snapshot;
