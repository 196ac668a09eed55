use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};
use uuid::Uuid;

use ttsclient::{ClipSpec, TtsService};

use crate::clock::Clock;
use crate::config::{ConfigError, QueueConfig};
use crate::job::{Job, JobError, JobState, JobView};
use crate::notify::{Notifier, Severity};
use crate::persist::{JobJournal, JournalError, PersistedJob};
use crate::scheduler::TickDriver;
use crate::sink::ArtifactSink;

/// Generate (or regenerate) a named clip and write the audio to `target_path`.
#[derive(Clone, Debug)]
pub struct GenerateRequest {
    /// Remote clip id when regenerating an existing clip; `None` creates one.
    pub remote_id: Option<String>,
    pub clip_name: String,
    pub body: String,
    pub voice: String,
    pub target_path: PathBuf,
    /// Opaque reference handed through to the notifier with terminal events.
    pub subject: Option<String>,
}

/// Generate a throwaway clip: the remote resource is deleted once the audio
/// has been downloaded.
#[derive(Clone, Debug)]
pub struct OneShotRequest {
    pub body: String,
    pub voice: String,
    pub target_path: PathBuf,
}

#[derive(Debug, Error)]
pub enum StartError {
    #[error("a job for remote clip {0} is already in flight")]
    AlreadyInFlight(String),
}

/// Everything the store reaches out to, injectable for tests.
pub struct StoreDeps {
    pub service: Arc<dyn TtsService>,
    pub notifier: Arc<dyn Notifier>,
    pub journal: Arc<dyn JobJournal>,
    pub sink: Arc<dyn ArtifactSink>,
    pub clock: Arc<dyn Clock>,
    pub driver: Arc<dyn TickDriver>,
}

struct Inner {
    jobs: HashMap<Uuid, Job>,
}

/// The shared set of in-flight jobs.
///
/// Every mutation funnels through one `RwLock`: the public start/cancel
/// operations, the scheduler tick, and the completion callbacks of each job's
/// own remote calls. The lock is never held across I/O. Jobs leave the map
/// exactly when they reach `Completed` or `Failed`, at which point the
/// notifier fires once and the journal is rewritten.
pub struct JobStore {
    config: QueueConfig,
    service: Arc<dyn TtsService>,
    notifier: Arc<dyn Notifier>,
    journal: Arc<dyn JobJournal>,
    sink: Arc<dyn ArtifactSink>,
    clock: Arc<dyn Clock>,
    driver: Arc<dyn TickDriver>,
    inner: RwLock<Inner>,
}

impl JobStore {
    /// Fails fast on an unusable timing policy; nothing is retried later.
    pub fn new(config: QueueConfig, deps: StoreDeps) -> Result<Arc<Self>, ConfigError> {
        config.validate()?;
        Ok(Arc::new(Self {
            config,
            service: deps.service,
            notifier: deps.notifier,
            journal: deps.journal,
            sink: deps.sink,
            clock: deps.clock,
            driver: deps.driver,
            inner: RwLock::new(Inner {
                jobs: HashMap::new(),
            }),
        }))
    }

    pub async fn start_clip(self: &Arc<Self>, req: GenerateRequest) -> Result<Uuid, StartError> {
        let spec = ClipSpec {
            name: req.clip_name.clone(),
            body: req.body,
            voice: req.voice,
        };
        self.start_job(
            req.remote_id,
            spec,
            req.clip_name,
            req.target_path,
            false,
            req.subject,
        )
        .await
    }

    pub async fn start_one_shot(self: &Arc<Self>, req: OneShotRequest) -> Result<Uuid, StartError> {
        let stem = req
            .target_path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "clip".to_string());
        let spec = ClipSpec {
            name: temporary_clip_name(),
            body: req.body,
            voice: req.voice,
        };
        self.start_job(
            None,
            spec,
            format!("OneShot > {stem}"),
            req.target_path,
            true,
            None,
        )
        .await
    }

    async fn start_job(
        self: &Arc<Self>,
        remote_id: Option<String>,
        spec: ClipSpec,
        display_name: String,
        target_path: PathBuf,
        delete_remote_on_completion: bool,
        subject: Option<String>,
    ) -> Result<Uuid, StartError> {
        let (job_id, epoch) = {
            let mut inner = self.inner.write().await;
            if let Some(rid) = remote_id.as_deref() {
                if lookup_remote(&inner, rid).is_some() {
                    return Err(StartError::AlreadyInFlight(rid.to_string()));
                }
            }

            let mut job = Job::new(display_name, target_path, delete_remote_on_completion, subject);
            job.remote_id = remote_id.clone();
            job.set_state(JobState::Submitting);
            let epoch = job.issue_call();
            let job_id = job.id;
            info!(job_id = %job_id, name = %job.display_name, "job submitted");
            inner.jobs.insert(job_id, job);
            self.journal_locked(&inner);
            (job_id, epoch)
        };
        self.driver.start(self.clone());

        let store = self.clone();
        tokio::spawn(async move {
            let res = store
                .service
                .create_or_update(remote_id.as_deref(), &spec)
                .await;
            store
                .on_submitted(job_id, epoch, res.map_err(|e| e.to_string()))
                .await;
        });
        Ok(job_id)
    }

    /// Removes a job. Completion callbacks of any call it still has in flight
    /// find nothing to act on and are dropped.
    pub async fn cancel(&self, job_id: Uuid) -> bool {
        let mut inner = self.inner.write().await;
        if inner.jobs.remove(&job_id).is_none() {
            return false;
        }
        info!(job_id = %job_id, "job cancelled");
        self.journal_locked(&inner);
        if inner.jobs.is_empty() {
            self.driver.stop();
        }
        true
    }

    pub async fn jobs(&self) -> Vec<JobView> {
        let inner = self.inner.read().await;
        inner.jobs.values().map(JobView::of).collect()
    }

    pub async fn job(&self, job_id: Uuid) -> Option<JobView> {
        let inner = self.inner.read().await;
        inner.jobs.get(&job_id).map(JobView::of)
    }

    pub async fn find_by_remote_id(&self, remote_id: &str) -> Option<JobView> {
        let inner = self.inner.read().await;
        lookup_remote(&inner, remote_id).map(JobView::of)
    }

    /// Rehydrates journaled jobs from a previous run. Jobs that already have a
    /// remote clip id resume polling; jobs interrupted before the service
    /// acknowledged them cannot be resumed and are surfaced as failures.
    /// Returns the number of jobs resumed.
    pub async fn restore(self: &Arc<Self>) -> Result<usize, JournalError> {
        let persisted = self.journal.load()?;
        if persisted.is_empty() {
            return Ok(0);
        }

        let mut resumed = 0;
        {
            let mut inner = self.inner.write().await;
            let now = self.clock.now();
            for p in persisted {
                match p.remote_id {
                    Some(remote_id) => {
                        let mut job = Job::new(
                            p.display_name,
                            p.target_path,
                            p.delete_remote_on_completion,
                            p.subject,
                        );
                        job.id = p.id;
                        job.remote_id = Some(remote_id);
                        // Rehydrated jobs re-enter the poll phase directly;
                        // the timeout ceiling restarts from now.
                        job.state = JobState::AwaitingFirstStatus;
                        job.poll_started_at = Some(now);
                        info!(job_id = %job.id, name = %job.display_name, "restored job, resuming polling");
                        inner.jobs.insert(job.id, job);
                        resumed += 1;
                    }
                    None => {
                        warn!(job_id = %p.id, name = %p.display_name, "journaled job was never acknowledged by the service");
                        let err = JobError::CreateOrUpdate(
                            "interrupted before the service acknowledged the clip; run the generation again".into(),
                        );
                        self.notifier.notify(
                            &format!("{}: {}", p.display_name, err),
                            Severity::Error,
                            p.subject.as_deref(),
                        );
                    }
                }
            }
            self.journal_locked(&inner);
        }
        if resumed > 0 {
            self.driver.start(self.clone());
        }
        Ok(resumed)
    }

    /// One scheduler pass. Applies the timeout ceiling, then issues at most
    /// one status request per job whose cooldown has elapsed. Never blocks on
    /// I/O; the calls complete through [`Self::on_status`].
    pub async fn tick(self: &Arc<Self>, now: Instant) {
        let mut due: Vec<(Uuid, String, u64)> = Vec::new();
        {
            let mut inner = self.inner.write().await;
            let mut timed_out: Vec<Uuid> = Vec::new();
            for (id, job) in inner.jobs.iter_mut() {
                if !matches!(
                    job.state,
                    JobState::AwaitingFirstStatus | JobState::Polling
                ) {
                    continue;
                }
                // The ceiling is anchored at entry into the poll phase and
                // keeps running while a status request is outstanding, so a
                // dropped response cannot park the job forever.
                if let Some(t0) = job.poll_started_at {
                    if now.saturating_duration_since(t0) >= self.config.poll_timeout {
                        timed_out.push(*id);
                        continue;
                    }
                }
                if job.in_flight {
                    continue;
                }
                let cooled = match job.state {
                    JobState::AwaitingFirstStatus => true,
                    _ => job
                        .last_poll_at
                        .map_or(true, |t| {
                            now.saturating_duration_since(t) >= self.config.poll_cooldown
                        }),
                };
                if !cooled {
                    continue;
                }
                let Some(remote_id) = job.remote_id.clone() else {
                    continue;
                };
                if job.state == JobState::AwaitingFirstStatus {
                    job.set_state(JobState::Polling);
                }
                job.last_poll_at = Some(now);
                let epoch = job.issue_call();
                due.push((*id, remote_id, epoch));
            }
            for id in timed_out {
                self.fail_locked(&mut inner, id, JobError::Timeout);
            }
        }

        for (job_id, remote_id, epoch) in due {
            let store = self.clone();
            tokio::spawn(async move {
                let res = store.service.clip_state(&remote_id).await;
                store
                    .on_status(job_id, epoch, res.map_err(|e| e.to_string()))
                    .await;
            });
        }
    }

    /// Tick with the injected clock's current time; the interval driver's
    /// entry point.
    pub async fn tick_now(self: &Arc<Self>) {
        let now = self.clock.now();
        self.tick(now).await;
    }

    async fn on_submitted(self: &Arc<Self>, job_id: Uuid, epoch: u64, res: Result<String, String>) {
        let mut inner = self.inner.write().await;
        let accepted = inner
            .jobs
            .get_mut(&job_id)
            .map_or(false, |j| j.take_call(JobState::Submitting, epoch));
        if !accepted {
            debug!(job_id = %job_id, "stale submit callback ignored");
            return;
        }
        match res {
            Ok(remote_id) => {
                let now = self.clock.now();
                if let Some(job) = inner.jobs.get_mut(&job_id) {
                    job.remote_id = Some(remote_id.clone());
                    job.set_state(JobState::AwaitingFirstStatus);
                    job.poll_started_at = Some(now);
                }
                info!(job_id = %job_id, remote_id = %remote_id, "clip acknowledged, polling");
                self.journal_locked(&inner);
            }
            Err(e) => self.fail_locked(&mut inner, job_id, JobError::CreateOrUpdate(e)),
        }
    }

    async fn on_status(
        self: &Arc<Self>,
        job_id: Uuid,
        epoch: u64,
        res: Result<ttsclient::ClipState, String>,
    ) {
        let mut inner = self.inner.write().await;
        let accepted = inner
            .jobs
            .get_mut(&job_id)
            .map_or(false, |j| j.take_call(JobState::Polling, epoch));
        if !accepted {
            debug!(job_id = %job_id, "stale status callback ignored");
            return;
        }

        let state = match res {
            Ok(state) => state,
            Err(e) => {
                self.fail_locked(&mut inner, job_id, JobError::StatusCheck(e));
                return;
            }
        };
        if !state.finished {
            // Stays in Polling; the cooldown was armed when the request went out.
            debug!(job_id = %job_id, "clip not ready");
            return;
        }
        let Some(url) = state.link else {
            self.fail_locked(
                &mut inner,
                job_id,
                JobError::StatusCheck("finished clip has no download link".into()),
            );
            return;
        };

        let Some(job) = inner.jobs.get_mut(&job_id) else {
            return;
        };
        job.set_state(JobState::Downloading);
        Job::set_progress(&job.progress, 0.0);
        let epoch = job.issue_call();
        let progress = job.progress.clone();
        info!(job_id = %job_id, "clip ready, downloading");
        drop(inner);

        let store = self.clone();
        tokio::spawn(async move {
            let on_progress = move |fraction: f32| Job::set_progress(&progress, fraction);
            let res = store.service.download(&url, &on_progress).await;
            store
                .on_downloaded(job_id, epoch, res.map_err(|e| e.to_string()))
                .await;
        });
    }

    async fn on_downloaded(
        self: &Arc<Self>,
        job_id: Uuid,
        epoch: u64,
        res: Result<Vec<u8>, String>,
    ) {
        let target = {
            let mut inner = self.inner.write().await;
            let accepted = inner
                .jobs
                .get_mut(&job_id)
                .map_or(false, |j| j.take_call(JobState::Downloading, epoch));
            if !accepted {
                debug!(job_id = %job_id, "stale download callback ignored");
                return;
            }
            if let Err(e) = &res {
                self.fail_locked(&mut inner, job_id, JobError::Download(e.clone()));
                return;
            }
            match inner.jobs.get(&job_id) {
                Some(job) => {
                    Job::set_progress(&job.progress, 1.0);
                    job.target_path.clone()
                }
                None => return,
            }
        };
        let bytes = match res {
            Ok(bytes) => bytes,
            Err(_) => return,
        };

        // The artifact write happens outside the lock; transfers can be large.
        let write_res = self.sink.write(&target, &bytes);

        let mut inner = self.inner.write().await;
        match inner.jobs.get(&job_id) {
            Some(job) if job.state == JobState::Downloading => {}
            _ => {
                debug!(job_id = %job_id, "job removed during artifact write");
                return;
            }
        }
        if let Err(e) = write_res {
            self.fail_locked(
                &mut inner,
                job_id,
                JobError::Download(format!("writing {}: {e}", target.display())),
            );
            return;
        }
        info!(job_id = %job_id, path = %target.display(), "artifact written");

        let issued = {
            let Some(job) = inner.jobs.get_mut(&job_id) else {
                return;
            };
            if !job.delete_remote_on_completion {
                None
            } else if let Some(remote_id) = job.remote_id.clone() {
                job.set_state(JobState::DeletingRemote);
                Some((job.issue_call(), remote_id))
            } else {
                None
            }
        };
        let Some((epoch, remote_id)) = issued else {
            self.complete_locked(&mut inner, job_id);
            return;
        };
        drop(inner);

        let store = self.clone();
        tokio::spawn(async move {
            let res = store.service.delete_clip(&remote_id).await;
            store
                .on_deleted(job_id, epoch, res.map_err(|e| e.to_string()))
                .await;
        });
    }

    async fn on_deleted(self: &Arc<Self>, job_id: Uuid, epoch: u64, res: Result<(), String>) {
        let mut inner = self.inner.write().await;
        let accepted = inner
            .jobs
            .get_mut(&job_id)
            .map_or(false, |j| j.take_call(JobState::DeletingRemote, epoch));
        if !accepted {
            debug!(job_id = %job_id, "stale delete callback ignored");
            return;
        }
        match res {
            Ok(()) => self.complete_locked(&mut inner, job_id),
            Err(e) => self.fail_locked(&mut inner, job_id, JobError::Deletion(e)),
        }
    }

    fn complete_locked(&self, inner: &mut Inner, job_id: Uuid) {
        let Some(mut job) = inner.jobs.remove(&job_id) else {
            return;
        };
        job.set_state(JobState::Completed);
        info!(job_id = %job_id, name = %job.display_name, "job completed");
        self.notifier.notify(
            &format!("download complete: {}", job.display_name),
            Severity::Info,
            job.subject.as_deref(),
        );
        self.journal_locked(inner);
        if inner.jobs.is_empty() {
            self.driver.stop();
        }
    }

    fn fail_locked(&self, inner: &mut Inner, job_id: Uuid, err: JobError) {
        let Some(mut job) = inner.jobs.remove(&job_id) else {
            return;
        };
        job.set_state(JobState::Failed);
        job.error = Some(err.clone());
        warn!(job_id = %job_id, name = %job.display_name, error = %err, "job failed");
        self.notifier.notify(
            &format!("{}: {}", job.display_name, err),
            Severity::Error,
            job.subject.as_deref(),
        );
        self.journal_locked(inner);
        if inner.jobs.is_empty() {
            self.driver.stop();
        }
    }

    fn journal_locked(&self, inner: &Inner) {
        let jobs: Vec<PersistedJob> = inner
            .jobs
            .values()
            .map(|job| PersistedJob {
                id: job.id,
                remote_id: job.remote_id.clone(),
                display_name: job.display_name.clone(),
                target_path: job.target_path.clone(),
                delete_remote_on_completion: job.delete_remote_on_completion,
                subject: job.subject.clone(),
            })
            .collect();
        if let Err(e) = self.journal.save(&jobs) {
            warn!("job journal save failed: {e}");
        }
    }
}

fn lookup_remote<'a>(inner: &'a Inner, remote_id: &str) -> Option<&'a Job> {
    inner
        .jobs
        .values()
        .find(|j| j.remote_id.as_deref() == Some(remote_id))
}

fn temporary_clip_name() -> String {
    let millis = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or_default();
    format!("synthd-temp-{millis}")
}
