//! Core types for the job registry.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Lifecycle state of a dispatched job.
///
/// The numeric codes mirror the worker service's wire protocol: 0 running,
/// 1 success, 2 failed, 3 unknown. Codes outside that set are preserved and
/// rendered as the bare number.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum JobStatus {
    #[default]
    Running,
    Success,
    Failed,
    Unknown,
    Other(i32),
}

impl JobStatus {
    /// Map a worker-service numeric code onto a status.
    #[inline]
    pub const fn from_code(code: i32) -> Self {
        match code {
            0 => Self::Running,
            1 => Self::Success,
            2 => Self::Failed,
            3 => Self::Unknown,
            other => Self::Other(other),
        }
    }

    /// The numeric code this status maps back to.
    #[inline]
    pub const fn code(self) -> i32 {
        match self {
            Self::Running => 0,
            Self::Success => 1,
            Self::Failed => 2,
            Self::Unknown => 3,
            Self::Other(code) => code,
        }
    }

    /// Returns true if this status represents a terminal state.
    #[inline]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Success | Self::Failed)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Running => f.write_str("RUNNING"),
            Self::Success => f.write_str("SUCCESS"),
            Self::Failed => f.write_str("FAILED"),
            Self::Unknown => f.write_str("UNKNOWN"),
            Self::Other(code) => write!(f, "{code}"),
        }
    }
}

impl Serialize for JobStatus {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for JobStatus {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        Ok(match text.as_str() {
            "RUNNING" => Self::Running,
            "SUCCESS" => Self::Success,
            "FAILED" => Self::Failed,
            "UNKNOWN" => Self::Unknown,
            other => match other.parse::<i32>() {
                Ok(code) => Self::from_code(code),
                Err(_) => Self::Unknown,
            },
        })
    }
}

/// A unit of dispatched work tracked by the registry.
///
/// The same shape is sent to the worker service on submission, so empty
/// optional fields stay off the wire.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Job {
    /// Registry-assigned identifier, immutable once set.
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub tenant_id: i64,
    #[serde(default)]
    pub client_id: i64,
    /// Encoded payload exactly as submitted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<String>,
    /// Pointer to externally stored payload content.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload_location: Option<String>,
    /// Byte length of the submitted payload string.
    #[serde(default, skip_serializing_if = "payload_size_is_zero")]
    pub payload_size: u64,
    #[serde(default)]
    pub status: JobStatus,
}

fn payload_size_is_zero(size: &u64) -> bool {
    *size == 0
}

impl Job {
    /// Build an unidentified draft for submission; the registry assigns the id.
    pub fn draft(tenant_id: i64, client_id: i64, payload: impl Into<String>) -> Self {
        let payload = payload.into();
        Self {
            id: String::new(),
            tenant_id,
            client_id,
            payload_size: payload.len() as u64,
            payload: Some(payload),
            payload_location: None,
            status: JobStatus::Running,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_rendering() {
        let cases = [
            (0, "RUNNING"),
            (1, "SUCCESS"),
            (2, "FAILED"),
            (3, "UNKNOWN"),
            (15, "15"),
            (-1, "-1"),
        ];
        for (code, expected) in cases {
            assert_eq!(JobStatus::from_code(code).to_string(), expected);
        }
    }

    #[test]
    fn test_status_code_round_trip() {
        for code in [0, 1, 2, 3, 7, 42, -5] {
            assert_eq!(JobStatus::from_code(code).code(), code);
        }
    }

    #[test]
    fn test_terminal_states() {
        assert!(JobStatus::Success.is_terminal());
        assert!(JobStatus::Failed.is_terminal());
        assert!(!JobStatus::Running.is_terminal());
        assert!(!JobStatus::Unknown.is_terminal());
        assert!(!JobStatus::Other(9).is_terminal());
    }

    #[test]
    fn test_status_serializes_as_display_text() {
        assert_eq!(
            serde_json::to_string(&JobStatus::Success).unwrap(),
            "\"SUCCESS\""
        );
        let parsed: JobStatus = serde_json::from_str("\"FAILED\"").unwrap();
        assert_eq!(parsed, JobStatus::Failed);
        let numeric: JobStatus = serde_json::from_str("\"15\"").unwrap();
        assert_eq!(numeric, JobStatus::Other(15));
    }

    #[test]
    fn test_draft_counts_submitted_payload_bytes() {
        let draft = Job::draft(1, 2, "MjIK");
        assert_eq!(draft.tenant_id, 1);
        assert_eq!(draft.client_id, 2);
        assert_eq!(draft.payload_size, 4);
        assert_eq!(draft.payload.as_deref(), Some("MjIK"));
        assert!(draft.id.is_empty());
    }

    #[test]
    fn test_job_serialization_omits_empty_fields() {
        let job = Job {
            id: "3".into(),
            tenant_id: 3,
            client_id: 3,
            ..Job::default()
        };
        let value = serde_json::to_value(&job).unwrap();
        assert_eq!(
            value,
            serde_json::json!({
                "id": "3",
                "tenant_id": 3,
                "client_id": 3,
                "status": "RUNNING",
            })
        );
    }

    #[test]
    fn test_job_deserializes_with_defaults() {
        let job: Job = serde_json::from_str(r#"{"id":"9"}"#).unwrap();
        assert_eq!(job.id, "9");
        assert_eq!(job.tenant_id, 0);
        assert_eq!(job.status, JobStatus::Running);
        assert_eq!(job.payload_location, None);
    }
}
