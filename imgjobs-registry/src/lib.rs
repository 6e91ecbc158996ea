//! Volatile job registry used by the dispatch gateway.
//!
//! The registry is the gateway's source of truth for job identity: it assigns
//! identifiers from a running counter, stores the submitted record, and lets
//! orchestration refresh the status from the worker service. Nothing is
//! persisted; a restart starts over from the seeded state.
//!
//! # Architecture
//!
//! - [`JobRegistry`] - identifier assignment plus job storage behind an async lock
//! - [`Job`] - the stored record, which doubles as the upstream wire shape
//! - [`JobStatus`] - lifecycle enum mapped to worker-service status codes
//!
//! # Example
//!
//! ```rust,no_run
//! use imgjobs_registry::{Job, JobRegistry, JobStatus};
//!
//! #[tokio::main]
//! async fn main() {
//!     let registry = JobRegistry::seeded();
//!
//!     let job = registry.create(Job::draft(1, 1, "TWpJSwo=")).await;
//!     println!("created job {}", job.id);
//!
//!     let refreshed = registry
//!         .refresh_status(&job.id, JobStatus::Success)
//!         .await
//!         .unwrap();
//!     assert_eq!(refreshed.status, JobStatus::Success);
//! }
//! ```

mod error;
mod registry;
mod types;

pub use error::RegistryError;
pub use registry::JobRegistry;
pub use types::{Job, JobStatus};
