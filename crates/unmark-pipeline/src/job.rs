// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Job lifecycle: the per-job state machine and its time budget.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use tracing::{debug, warn};
use unmark_core::error::{Result, UnmarkError};
use unmark_core::types::{JobId, JobState, Operation};

/// One run of the engine over one set of inputs.
///
/// States only move forward; see [`JobState::can_transition_to`].
#[derive(Debug)]
pub struct Job {
    id: JobId,
    operation: Option<Operation>,
    state: JobState,
    started_at: DateTime<Utc>,
}

impl Job {
    /// A job whose inputs have been accepted.
    pub fn new(operation: Option<Operation>) -> Self {
        Self {
            id: JobId::new(),
            operation,
            state: JobState::Loaded,
            started_at: Utc::now(),
        }
    }

    pub fn id(&self) -> JobId {
        self.id
    }

    pub fn operation(&self) -> Option<Operation> {
        self.operation
    }

    pub fn state(&self) -> JobState {
        self.state
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// Move to `next`, rejecting any transition the lifecycle does not allow.
    pub fn advance(&mut self, next: JobState) -> Result<()> {
        if !self.state.can_transition_to(next) {
            return Err(UnmarkError::InvalidTransition {
                from: self.state,
                to: next,
            });
        }
        debug!(job_id = %self.id, from = ?self.state, to = ?next, "job state changed");
        self.state = next;
        Ok(())
    }

    /// Record a fatal error. Terminal jobs stay as they are.
    pub fn fail(&mut self, err: &UnmarkError) {
        if self.state.is_terminal() {
            return;
        }
        warn!(job_id = %self.id, state = ?self.state, error = %err, "job failed");
        self.state = JobState::Failed;
    }
}

/// Deadline shared between a job's worker and whoever is waiting on it.
///
/// Workers call [`Budget::check`] between pages; the waiting side calls
/// [`Budget::cancel`] once it has given up.
#[derive(Debug, Clone)]
pub struct Budget {
    limit: Duration,
    deadline: Instant,
    cancelled: Arc<AtomicBool>,
}

impl Budget {
    pub fn new(limit: Duration) -> Self {
        Self {
            limit,
            deadline: Instant::now() + limit,
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Relaxed)
    }

    /// `Err(Timeout)` once the deadline has passed or the job was cancelled.
    pub fn check(&self) -> Result<()> {
        if self.is_cancelled() || Instant::now() >= self.deadline {
            return Err(UnmarkError::Timeout {
                seconds: self.limit.as_secs(),
            });
        }
        Ok(())
    }
}
