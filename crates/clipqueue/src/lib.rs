//! Background job pipeline for remote text-to-speech clip generation.
//!
//! A job is born from a single user action ("generate/update this clip",
//! "one-shot generate and forget") and then lives entirely in the background:
//! submit, poll until rendered, download with progress, optionally delete the
//! remote clip, notify. Many jobs share one [`JobStore`] and one scheduler
//! tick; the store journals itself so jobs survive a restart.

mod clock;
mod config;
mod job;
mod notify;
mod persist;
mod scheduler;
mod sink;
mod store;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{
    ConfigError, QueueConfig, DEFAULT_POLL_COOLDOWN, DEFAULT_POLL_TIMEOUT, DEFAULT_TICK_INTERVAL,
};
pub use job::{JobError, JobState, JobView};
pub use notify::{Notifier, Severity, TracingNotifier};
pub use persist::{JobJournal, JournalError, JsonJournal, NullJournal, PersistedJob};
pub use scheduler::{IntervalDriver, TickDriver};
pub use sink::{ArtifactSink, FsSink};
pub use store::{GenerateRequest, JobStore, OneShotRequest, StartError, StoreDeps};
