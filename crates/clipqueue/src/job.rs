use std::path::PathBuf;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Lifecycle phase of a clip job.
///
/// Transitions only move forward along this graph; the single cycle is
/// `Polling` re-arming itself after a "not finished yet" status response.
/// `Failed` is reachable from every non-terminal state.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    Created,
    Submitting,
    AwaitingFirstStatus,
    Polling,
    Downloading,
    DeletingRemote,
    Completed,
    Failed,
}

impl JobState {
    pub fn is_terminal(self) -> bool {
        matches!(self, JobState::Completed | JobState::Failed)
    }

    /// The allowed-transition table. Every state change in the store goes
    /// through [`Job::set_state`], which asserts against this.
    pub fn can_transition(from: JobState, to: JobState) -> bool {
        use JobState::*;
        if to == Failed {
            return !from.is_terminal();
        }
        matches!(
            (from, to),
            (Created, Submitting)
                | (Submitting, AwaitingFirstStatus)
                | (AwaitingFirstStatus, Polling)
                | (Polling, Polling)
                | (Polling, Downloading)
                | (Downloading, DeletingRemote)
                | (Downloading, Completed)
                | (DeletingRemote, Completed)
        )
    }
}

/// Terminal failure attached to a job. Journal and configuration failures are
/// separate types ([`crate::JournalError`], [`crate::ConfigError`]) because
/// they never end a job.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum JobError {
    #[error("clip create/update failed: {0}")]
    CreateOrUpdate(String),

    #[error("status check failed: {0}")]
    StatusCheck(String),

    #[error("timed out waiting for the clip to render")]
    Timeout,

    #[error("remote clip deletion failed: {0}; the downloaded file was kept but the remote clip may be orphaned")]
    Deletion(String),

    #[error("download failed: {0}")]
    Download(String),
}

/// One outstanding generation request, from submission to artifact on disk.
#[derive(Debug)]
pub struct Job {
    pub id: Uuid,
    /// Remote clip id; `None` until the create/update call is acknowledged.
    pub remote_id: Option<String>,
    /// Human-readable label used in notifications.
    pub display_name: String,
    /// Where the downloaded audio gets written.
    pub target_path: PathBuf,
    /// One-shot jobs delete the remote clip after a successful download.
    pub delete_remote_on_completion: bool,
    pub state: JobState,
    /// Anchor for the poll timeout ceiling, set when the job becomes pollable.
    pub poll_started_at: Option<Instant>,
    /// When the last status request was issued; drives the cooldown.
    pub last_poll_at: Option<Instant>,
    /// Download progress in [0, 1], written from the transfer task.
    pub progress: Arc<AtomicU32>,
    pub error: Option<JobError>,
    /// Opaque reference handed through to the notifier.
    pub subject: Option<String>,

    // At-most-one-call guard: a callback is honored only if the job is still
    // in the state that issued it and carries the current epoch.
    pub(crate) in_flight: bool,
    pub(crate) call_epoch: u64,
}

impl Job {
    pub fn new(
        display_name: String,
        target_path: PathBuf,
        delete_remote_on_completion: bool,
        subject: Option<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            remote_id: None,
            display_name,
            target_path,
            delete_remote_on_completion,
            state: JobState::Created,
            poll_started_at: None,
            last_poll_at: None,
            progress: Arc::new(AtomicU32::new(0)),
            error: None,
            subject,
            in_flight: false,
            call_epoch: 0,
        }
    }

    pub(crate) fn set_state(&mut self, to: JobState) {
        debug_assert!(
            JobState::can_transition(self.state, to),
            "illegal job transition {:?} -> {:?}",
            self.state,
            to
        );
        self.state = to;
    }

    /// Marks the next outbound call as issued and returns its epoch.
    pub(crate) fn issue_call(&mut self) -> u64 {
        debug_assert!(!self.in_flight, "job already has a call in flight");
        self.in_flight = true;
        self.call_epoch += 1;
        self.call_epoch
    }

    /// Accepts a completion callback if it matches the outstanding call.
    /// Stale and duplicate deliveries return false and must be ignored.
    pub(crate) fn take_call(&mut self, expected_state: JobState, epoch: u64) -> bool {
        if self.state == expected_state && self.in_flight && self.call_epoch == epoch {
            self.in_flight = false;
            true
        } else {
            false
        }
    }

    pub fn progress_fraction(&self) -> f32 {
        f32::from_bits(self.progress.load(Ordering::Relaxed))
    }

    pub(crate) fn set_progress(progress: &AtomicU32, fraction: f32) {
        progress.store(fraction.clamp(0.0, 1.0).to_bits(), Ordering::Relaxed);
    }
}

/// Read-only snapshot of a job, safe to hand out of the store.
#[derive(Clone, Debug, Serialize)]
pub struct JobView {
    pub id: Uuid,
    pub display_name: String,
    pub remote_id: Option<String>,
    pub state: JobState,
    pub target_path: PathBuf,
    pub delete_remote_on_completion: bool,
    pub download_progress: f32,
    /// True while a remote call for this job is outstanding.
    pub request_pending: bool,
}

impl JobView {
    pub(crate) fn of(job: &Job) -> Self {
        Self {
            id: job.id,
            display_name: job.display_name.clone(),
            remote_id: job.remote_id.clone(),
            state: job.state,
            target_path: job.target_path.clone(),
            delete_remote_on_completion: job.delete_remote_on_completion,
            download_progress: job.progress_fraction(),
            request_pending: job.in_flight,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use JobState::*;

    const ALL: [JobState; 8] = [
        Created,
        Submitting,
        AwaitingFirstStatus,
        Polling,
        Downloading,
        DeletingRemote,
        Completed,
        Failed,
    ];

    #[test]
    fn forward_path_is_allowed() {
        let path = [
            Created,
            Submitting,
            AwaitingFirstStatus,
            Polling,
            Downloading,
            DeletingRemote,
            Completed,
        ];
        for pair in path.windows(2) {
            assert!(
                JobState::can_transition(pair[0], pair[1]),
                "{:?} -> {:?} should be allowed",
                pair[0],
                pair[1]
            );
        }
        assert!(JobState::can_transition(Downloading, Completed));
        assert!(JobState::can_transition(Polling, Polling));
    }

    #[test]
    fn failed_is_reachable_from_every_non_terminal_state() {
        for from in ALL {
            assert_eq!(JobState::can_transition(from, Failed), !from.is_terminal());
        }
    }

    #[test]
    fn no_state_revisits_an_earlier_phase() {
        assert!(!JobState::can_transition(Downloading, Polling));
        assert!(!JobState::can_transition(Polling, AwaitingFirstStatus));
        assert!(!JobState::can_transition(Completed, Polling));
        assert!(!JobState::can_transition(DeletingRemote, Downloading));
        assert!(!JobState::can_transition(Failed, Submitting));
    }

    #[test]
    fn terminal_states_have_no_exits() {
        for to in ALL {
            assert!(!JobState::can_transition(Completed, to));
            assert!(!JobState::can_transition(Failed, to));
        }
    }

    #[test]
    fn take_call_rejects_stale_epoch_and_wrong_state() {
        let mut job = Job::new("n".into(), "out.wav".into(), false, None);
        job.set_state(Submitting);
        let epoch = job.issue_call();

        assert!(!job.take_call(Submitting, epoch - 1));
        assert!(!job.take_call(Polling, epoch));
        assert!(job.take_call(Submitting, epoch));
        // Second delivery of the same completion is a no-op.
        assert!(!job.take_call(Submitting, epoch));
    }
}
