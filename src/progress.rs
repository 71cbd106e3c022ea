//! Lifecycle and user-visible progress of a single validation job.
//!
//! The service answers a batch with one terminal response, so while a call is
//! outstanding progress is advanced by a synthetic ticker. The ticker lives
//! inside [`ProgressTracker::submit`] and is dropped the moment the call
//! settles, whichever way it settles.

use crate::client::ValidationClient;
use crate::config::Config;
use crate::error::{AppError, Result};
use crate::models::{DIRECT_INPUT, JobState, ValidationJob, ValidationResult};
use crate::normalizer::normalize;
use crate::upload::{FileKind, read_upload};
use std::path::Path;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::{Instant, MissedTickBehavior, interval_at};

/// What observers see of the job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct JobSnapshot {
    pub state: JobState,
    pub progress: u8,
}

/// Synthetic progress while awaiting the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TickPolicy {
    pub interval: Duration,
    pub step: u8,
    /// Ticking never reaches this value or beyond; only completion sets 100.
    pub cap: u8,
}

impl Default for TickPolicy {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(500),
            step: 10,
            cap: 90,
        }
    }
}

impl TickPolicy {
    pub fn from_config(config: &Config) -> Self {
        Self {
            interval: config.tick_interval,
            step: config.tick_step,
            cap: config.tick_cap.min(99),
        }
    }

    fn advance(&self, current: u8) -> u8 {
        current.saturating_add(self.step).min(self.cap).max(current)
    }
}

/// Drives one [`ValidationJob`] through
/// `idle → reading → submitting → awaiting → completed | failed`.
///
/// Terminal states only go back to `idle` through [`ProgressTracker::reset`].
/// Any error raised before submission leaves the tracker `idle`.
#[derive(Debug)]
pub struct ProgressTracker {
    job: ValidationJob,
    policy: TickPolicy,
    updates: watch::Sender<JobSnapshot>,
}

impl ProgressTracker {
    pub fn new(policy: TickPolicy) -> Self {
        let (updates, _) = watch::channel(JobSnapshot::default());
        Self {
            job: ValidationJob::default(),
            policy,
            updates,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(TickPolicy::from_config(config))
    }

    pub fn job(&self) -> &ValidationJob {
        &self.job
    }

    pub fn state(&self) -> JobState {
        self.job.state
    }

    pub fn progress(&self) -> u8 {
        self.job.progress_percent
    }

    pub fn snapshot(&self) -> JobSnapshot {
        JobSnapshot {
            state: self.job.state,
            progress: self.job.progress_percent,
        }
    }

    /// Receives every state change and progress tick.
    pub fn subscribe(&self) -> watch::Receiver<JobSnapshot> {
        self.updates.subscribe()
    }

    fn publish(&self) {
        self.updates.send_replace(self.snapshot());
    }

    fn transition(&mut self, next: JobState) {
        tracing::debug!("Job {} -> {}", self.job.state, next);
        self.job.state = next;
        self.publish();
    }

    fn tick(&mut self) {
        let next = self.policy.advance(self.job.progress_percent);
        if next != self.job.progress_percent {
            self.job.progress_percent = next;
            tracing::trace!(target: "submit_task", "Synthetic progress {}%", next);
            self.publish();
        }
    }

    /// Drops the current job and returns to `idle`.
    pub fn reset(&mut self) {
        if self.job.state != JobState::Idle {
            tracing::info!("Discarding {} job", self.job.state);
        }
        self.job = ValidationJob::default();
        self.publish();
    }

    /// `idle → reading` for a new upload or direct input.
    pub fn begin_reading(&mut self, source: Option<String>) -> Result<()> {
        if self.job.state != JobState::Idle {
            return Err(AppError::InvalidTransition {
                from: self.job.state,
                action: "start a new job",
            });
        }
        self.job = ValidationJob {
            source_identifier: source,
            state: JobState::Reading,
            ..ValidationJob::default()
        };
        self.publish();
        Ok(())
    }

    /// Normalizes the loaded content into the job's addresses.
    ///
    /// When nothing survives normalization the job is discarded and
    /// [`AppError::EmptyInput`] is returned.
    pub fn accept_text(&mut self, text: &str) -> Result<usize> {
        if self.job.state != JobState::Reading {
            return Err(AppError::InvalidTransition {
                from: self.job.state,
                action: "accept input",
            });
        }

        let addresses = normalize(text);
        if addresses.is_empty() {
            tracing::warn!(
                "No email addresses found in {}",
                self.job.source_identifier.as_deref().unwrap_or("input")
            );
            self.reset();
            return Err(AppError::EmptyInput);
        }

        tracing::info!(
            "Accepted {} addresses from {}",
            addresses.len(),
            self.job.source_identifier.as_deref().unwrap_or("input")
        );
        self.job.input_addresses = addresses;
        Ok(self.job.input_addresses.len())
    }

    /// Checks the file type, reads the file and normalizes its content.
    pub async fn load_file(&mut self, path: &Path) -> Result<usize> {
        FileKind::from_path(path)?;

        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        self.begin_reading(Some(name))?;

        match read_upload(path).await {
            Ok(text) => self.accept_text(&text),
            Err(e) => {
                self.reset();
                Err(e)
            }
        }
    }

    /// Starts a job from pasted or typed text.
    pub fn load_direct(&mut self, text: &str) -> Result<usize> {
        self.begin_reading(Some(DIRECT_INPUT.to_string()))?;
        self.accept_text(text)
    }

    /// Submits the job's addresses and waits for the single terminal answer.
    ///
    /// Progress starts at 0 and ticks by `step` every `interval`, capped at
    /// `cap`. On success the job is `completed` at 100%; on failure it is
    /// `failed` and keeps the last ticked value.
    pub async fn submit<C: ValidationClient>(&mut self, client: &C) -> Result<ValidationResult> {
        match self.job.state {
            JobState::Idle => return Err(AppError::EmptyInput),
            JobState::Reading if self.job.input_addresses.is_empty() => {
                self.reset();
                return Err(AppError::EmptyInput);
            }
            JobState::Reading => {}
            other => {
                return Err(AppError::InvalidTransition {
                    from: other,
                    action: "submit",
                });
            }
        }

        self.job.progress_percent = 0;
        self.transition(JobState::Submitting);
        let addresses = self.job.input_addresses.clone();
        let policy = self.policy;

        self.transition(JobState::Awaiting);
        let outcome = {
            let call = client.submit_batch(&addresses);
            tokio::pin!(call);

            let mut ticker = interval_at(Instant::now() + policy.interval, policy.interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    biased;
                    outcome = &mut call => break outcome,
                    _ = ticker.tick() => self.tick(),
                }
            }
        };

        match outcome {
            Ok(mut result) => {
                if result.file_name.is_none() {
                    result.file_name = self
                        .job
                        .source_identifier
                        .clone()
                        .filter(|s| s != DIRECT_INPUT);
                }
                self.job.progress_percent = 100;
                self.transition(JobState::Completed);
                tracing::info!(target: "submit_task",
                    "Job completed: {} of {} addresses classified, {} credits used",
                    crate::categorizer::stats_summary(&result).classified(),
                    result.total_emails,
                    result.credits_used
                );
                Ok(result)
            }
            Err(e) => {
                self.transition(JobState::Failed);
                tracing::error!(target: "submit_task",
                    "Job failed at {}%: {}", self.job.progress_percent, e
                );
                Err(e)
            }
        }
    }
}

impl Default for ProgressTracker {
    fn default() -> Self {
        Self::new(TickPolicy::default())
    }
}
