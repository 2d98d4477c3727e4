use bon::Builder;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::{FromRow, Type};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
#[sqlx(type_name = "job_type", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum JobType {
    Training,
    Inference,
    FileProcessing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
#[sqlx(type_name = "job_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Queued,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl JobStatus {
    pub const ALL: [Self; 6] = [
        Self::Pending,
        Self::Queued,
        Self::Running,
        Self::Completed,
        Self::Failed,
        Self::Cancelled,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Queued => "queued",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }

    /// Completed, failed and cancelled jobs never change status again.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }

    /// The edge table of the job state machine.
    #[must_use]
    pub const fn can_transition_to(self, next: Self) -> bool {
        match (self, next) {
            (Self::Pending, Self::Queued)
            | (Self::Queued, Self::Running)
            | (Self::Running, Self::Running | Self::Completed) => true,
            (Self::Pending | Self::Queued | Self::Running, Self::Failed | Self::Cancelled) => true,
            _ => false,
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| {
                let valid: Vec<&str> = Self::ALL.iter().map(|s| s.as_str()).collect();
                format!("Invalid status: {s}. Valid: {valid:?}")
            })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransitionError {
    #[error("invalid state transition for job {job_id}: {from} -> {to}")]
    InvalidStateTransition {
        job_id: String,
        from: JobStatus,
        to: JobStatus,
    },
}

/// Corresponds to the 'jobs' table, minus the queue bookkeeping columns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Job {
    pub id: String,
    pub job_type: JobType,
    pub status: JobStatus,
    pub user_id: String,
    pub project_id: String,
    pub model_id: Option<String>,
    pub input_params: Option<Value>,
    pub output_params: Option<Value>,
    pub progress_percent: f64,
    pub progress_message: Option<String>,
    pub error_message: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// A job as submitted by the dispatcher, before it has an id.
#[derive(Debug, Clone, Builder)]
pub struct NewJob {
    #[builder(start_fn)]
    pub job_type: JobType,
    #[builder(into)]
    pub user_id: String,
    #[builder(into)]
    pub project_id: String,
    #[builder(into)]
    pub model_id: Option<String>,
    pub input_params: Option<Value>,
}

impl NewJob {
    #[must_use]
    pub fn into_job(self, id: String, now: DateTime<Utc>) -> Job {
        Job {
            id,
            job_type: self.job_type,
            status: JobStatus::Pending,
            user_id: self.user_id,
            project_id: self.project_id,
            model_id: self.model_id,
            input_params: self.input_params,
            output_params: None,
            progress_percent: 0.0,
            progress_message: None,
            error_message: None,
            started_at: None,
            completed_at: None,
            created_at: now,
        }
    }
}

/// Everything that can happen to a job after creation.
#[derive(Debug, Clone, PartialEq)]
pub enum JobEvent {
    Enqueued,
    Started { message: String },
    Progress { percent: f64, message: String },
    Completed { output_params: Value, message: String },
    Failed { error: String },
    Cancelled,
}

impl JobEvent {
    #[must_use]
    pub const fn target_status(&self) -> JobStatus {
        match self {
            Self::Enqueued => JobStatus::Queued,
            Self::Started { .. } | Self::Progress { .. } => JobStatus::Running,
            Self::Completed { .. } => JobStatus::Completed,
            Self::Failed { .. } => JobStatus::Failed,
            Self::Cancelled => JobStatus::Cancelled,
        }
    }

    const fn allowed_from(&self, status: JobStatus) -> bool {
        match self {
            Self::Enqueued => matches!(status, JobStatus::Pending),
            Self::Started { .. } => matches!(status, JobStatus::Queued),
            Self::Progress { .. } | Self::Completed { .. } => matches!(status, JobStatus::Running),
            Self::Failed { .. } | Self::Cancelled => !status.is_terminal(),
        }
    }
}

impl Job {
    /// Applies `event` to the record, rejecting anything outside the state machine.
    ///
    /// The record is left untouched when the transition is rejected.
    pub fn apply(&mut self, event: JobEvent, now: DateTime<Utc>) -> Result<(), TransitionError> {
        let target = event.target_status();
        if !event.allowed_from(self.status) || !self.status.can_transition_to(target) {
            return Err(TransitionError::InvalidStateTransition {
                job_id: self.id.clone(),
                from: self.status,
                to: target,
            });
        }

        match event {
            JobEvent::Enqueued => {}
            JobEvent::Started { message } => {
                self.started_at = Some(now);
                self.progress_percent = 0.0;
                self.progress_message = Some(message);
            }
            JobEvent::Progress { percent, message } => {
                // Progress never goes backwards.
                self.progress_percent = percent.clamp(0.0, 100.0).max(self.progress_percent);
                self.progress_message = Some(message);
            }
            JobEvent::Completed {
                output_params,
                message,
            } => {
                self.completed_at = Some(now);
                self.progress_percent = 100.0;
                self.progress_message = Some(message);
                self.output_params = Some(output_params);
            }
            JobEvent::Failed { error } => {
                self.completed_at = Some(now);
                self.error_message = Some(error);
            }
            JobEvent::Cancelled => {
                self.completed_at = Some(now);
            }
        }
        self.status = target;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn job_in(status: JobStatus) -> Job {
        let mut job = NewJob::builder(JobType::Training)
            .user_id("user")
            .project_id("project")
            .build()
            .into_job("job-1".to_owned(), Utc::now());
        job.status = status;
        job
    }

    fn sample_events() -> Vec<JobEvent> {
        vec![
            JobEvent::Enqueued,
            JobEvent::Started {
                message: "start".into(),
            },
            JobEvent::Progress {
                percent: 50.0,
                message: "half".into(),
            },
            JobEvent::Completed {
                output_params: json!({}),
                message: "done".into(),
            },
            JobEvent::Failed {
                error: "boom".into(),
            },
            JobEvent::Cancelled,
        ]
    }

    #[test]
    fn status_changes_only_follow_state_machine_edges() {
        for status in JobStatus::ALL {
            for event in sample_events() {
                let mut job = job_in(status);
                let target = event.target_status();
                let before = job.clone();
                match job.apply(event, Utc::now()) {
                    Ok(()) => {
                        assert!(status.can_transition_to(target), "{status} -> {target}");
                        assert_eq!(job.status, target);
                    }
                    Err(TransitionError::InvalidStateTransition { from, to, .. }) => {
                        assert_eq!(from, status);
                        assert_eq!(to, target);
                        assert_eq!(job, before, "rejected transition must not mutate");
                    }
                }
            }
        }
    }

    #[test]
    fn terminal_states_reject_everything() {
        for status in [JobStatus::Completed, JobStatus::Failed, JobStatus::Cancelled] {
            assert!(status.is_terminal());
            for next in JobStatus::ALL {
                assert!(!status.can_transition_to(next));
            }
        }
    }

    #[test]
    fn started_sets_timestamp_and_resets_progress() {
        let mut job = job_in(JobStatus::Queued);
        job.apply(
            JobEvent::Started {
                message: "loading".into(),
            },
            Utc::now(),
        )
        .unwrap();

        assert_eq!(job.status, JobStatus::Running);
        assert!(job.started_at.is_some());
        assert_eq!(job.progress_percent, 0.0);
        assert_eq!(job.progress_message.as_deref(), Some("loading"));
    }

    #[test]
    fn cannot_start_twice() {
        let mut job = job_in(JobStatus::Running);
        let result = job.apply(
            JobEvent::Started {
                message: "again".into(),
            },
            Utc::now(),
        );
        assert!(result.is_err());
    }

    #[test]
    fn progress_is_monotonic() {
        let mut job = job_in(JobStatus::Running);
        let progress = |percent: f64| JobEvent::Progress {
            percent,
            message: format!("{percent}"),
        };
        job.apply(progress(40.0), Utc::now()).unwrap();
        job.apply(progress(20.0), Utc::now()).unwrap();
        assert_eq!(job.progress_percent, 40.0);
        job.apply(progress(250.0), Utc::now()).unwrap();
        assert_eq!(job.progress_percent, 100.0);
    }

    #[test]
    fn failure_records_error_and_completion_time() {
        let mut job = job_in(JobStatus::Running);
        job.apply(
            JobEvent::Failed {
                error: "out of memory".into(),
            },
            Utc::now(),
        )
        .unwrap();

        assert_eq!(job.status, JobStatus::Failed);
        assert_eq!(job.error_message.as_deref(), Some("out of memory"));
        assert!(job.completed_at.is_some());
        assert!(job.output_params.is_none());
    }

    #[test]
    fn status_parses_from_its_name() {
        assert_eq!("queued".parse::<JobStatus>(), Ok(JobStatus::Queued));
        assert!("paused".parse::<JobStatus>().is_err());
    }
}
