pub mod jobs;
pub mod ping;
