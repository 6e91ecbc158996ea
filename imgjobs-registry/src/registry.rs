//! Registry storage and identifier assignment.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;

use crate::error::RegistryError;
use crate::types::{Job, JobStatus};

/// Internal storage: the id counter plus the job table.
#[derive(Debug)]
struct RegistryState {
    /// Next id handed out by `create`; never reused within a process.
    next_id: u64,
    jobs: HashMap<String, Job>,
}

impl RegistryState {
    fn empty() -> Self {
        Self {
            next_id: 1,
            jobs: HashMap::new(),
        }
    }
}

/// Volatile job store owning identifier assignment for the gateway.
///
/// Ids are decimal renderings of a monotonically increasing counter, so they
/// stay unique even after hypothetical removals. All access goes through an
/// async `RwLock`; clones share the same underlying state.
#[derive(Debug, Clone)]
pub struct JobRegistry {
    state: Arc<RwLock<RegistryState>>,
}

impl Default for JobRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl JobRegistry {
    /// Create an empty registry; the first assigned id is "1".
    pub fn new() -> Self {
        Self {
            state: Arc::new(RwLock::new(RegistryState::empty())),
        }
    }

    /// Create a registry pre-populated with the three demo jobs the worker
    /// service also knows about; the next assigned id is "4".
    pub fn seeded() -> Self {
        let mut jobs = HashMap::new();
        jobs.insert(
            "1".to_string(),
            Job {
                id: "1".into(),
                tenant_id: 1,
                client_id: 1,
                payload_location: Some("/blob/api/v1/1".into()),
                ..Job::default()
            },
        );
        jobs.insert(
            "2".to_string(),
            Job {
                id: "2".into(),
                tenant_id: 2,
                client_id: 2,
                ..Job::default()
            },
        );
        jobs.insert(
            "3".to_string(),
            Job {
                id: "3".into(),
                tenant_id: 3,
                client_id: 3,
                ..Job::default()
            },
        );
        Self {
            state: Arc::new(RwLock::new(RegistryState { next_id: 4, jobs })),
        }
    }

    /// Store a draft under a freshly assigned id and return the stored record.
    ///
    /// The draft's own id is discarded. Tenant and client identifiers are
    /// fixed here and never altered by later status refreshes.
    pub async fn create(&self, draft: Job) -> Job {
        let mut state = self.state.write().await;
        let id = state.next_id.to_string();
        state.next_id += 1;
        let job = Job {
            id: id.clone(),
            status: JobStatus::Running,
            ..draft
        };
        state.jobs.insert(id, job.clone());
        job
    }

    /// Look up a stored job by id.
    pub async fn get(&self, id: &str) -> Result<Job, RegistryError> {
        let state = self.state.read().await;
        state
            .jobs
            .get(id)
            .cloned()
            .ok_or_else(|| RegistryError::NotFound(id.to_string()))
    }

    /// Overwrite the stored status with a freshly fetched one and return the
    /// updated record. Identity fields are untouched.
    pub async fn refresh_status(
        &self,
        id: &str,
        status: JobStatus,
    ) -> Result<Job, RegistryError> {
        let mut state = self.state.write().await;
        let job = state
            .jobs
            .get_mut(id)
            .ok_or_else(|| RegistryError::NotFound(id.to_string()))?;
        job.status = status;
        Ok(job.clone())
    }

    /// Number of stored jobs.
    pub async fn count(&self) -> usize {
        self.state.read().await.jobs.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_create_assigns_sequential_ids() {
        let registry = JobRegistry::new();
        let first = registry.create(Job::draft(1, 1, "MQo=")).await;
        let second = registry.create(Job::draft(1, 1, "MQo=")).await;
        assert_eq!(first.id, "1");
        assert_eq!(second.id, "2");
    }

    #[tokio::test]
    async fn test_seeded_registry_resumes_at_four() {
        let registry = JobRegistry::seeded();
        assert_eq!(registry.count().await, 3);

        let seeded = registry.get("1").await.unwrap();
        assert_eq!(seeded.tenant_id, 1);
        assert_eq!(seeded.payload_location.as_deref(), Some("/blob/api/v1/1"));

        let created = registry.create(Job::draft(1, 1, "MQo=")).await;
        assert_eq!(created.id, "4");
        assert_eq!(registry.count().await, 4);
    }

    #[tokio::test]
    async fn test_create_fixes_identity_from_draft() {
        let registry = JobRegistry::new();
        let mut draft = Job::draft(7, 9, "MQo=");
        draft.id = "999".into();
        draft.status = JobStatus::Failed;

        let job = registry.create(draft).await;
        assert_eq!(job.id, "1");
        assert_eq!(job.tenant_id, 7);
        assert_eq!(job.client_id, 9);
        assert_eq!(job.status, JobStatus::Running);
        assert!(registry.get("999").await.is_err());
    }

    #[tokio::test]
    async fn test_get_missing_job() {
        let registry = JobRegistry::new();
        let err = registry.get("42").await.unwrap_err();
        assert_eq!(err.to_string(), "no job with id: 42");
    }

    #[tokio::test]
    async fn test_refresh_status_overwrites() {
        let registry = JobRegistry::seeded();
        let updated = registry
            .refresh_status("2", JobStatus::Success)
            .await
            .unwrap();
        assert_eq!(updated.status, JobStatus::Success);
        assert_eq!(updated.tenant_id, 2);

        let fetched = registry.get("2").await.unwrap();
        assert_eq!(fetched.status, JobStatus::Success);
    }

    #[tokio::test]
    async fn test_refresh_missing_job() {
        let registry = JobRegistry::new();
        assert!(matches!(
            registry.refresh_status("8", JobStatus::Failed).await,
            Err(RegistryError::NotFound(_))
        ));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_creates_assign_distinct_ids() {
        let registry = JobRegistry::new();
        let mut handles = Vec::new();
        for _ in 0..32 {
            let registry = registry.clone();
            handles.push(tokio::spawn(async move {
                registry.create(Job::draft(1, 1, "MQo=")).await.id
            }));
        }

        let mut ids = std::collections::HashSet::new();
        for handle in handles {
            assert!(ids.insert(handle.await.unwrap()));
        }
        assert_eq!(ids.len(), 32);
        assert_eq!(registry.count().await, 32);
    }
}
