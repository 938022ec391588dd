//! Debounced, race-safe live estimation.
//!
//! The estimator is sans-IO: callers report field changes with [`trigger`],
//! poll for a due request with [`take_due`], perform the external call and
//! report back through [`complete`]. Time is always passed in, so deadline
//! handling is deterministic under test.
//!
//! Sequence numbers are issued per trigger. A completion is applied only when
//! it answers the newest issued sequence; anything older is dropped even if it
//! arrives last.
//!
//! [`trigger`]: DebouncedEstimator::trigger
//! [`take_due`]: DebouncedEstimator::take_due
//! [`complete`]: DebouncedEstimator::complete

use alloy::primitives::U256;
use tracing::{debug, warn};

use crate::domain::{EstimateKind, EstimationRequest, EstimationResult, TimestampMs};
use crate::ports::PortError;

pub const DEFAULT_DEBOUNCE_MS: u64 = 500;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompletionOutcome {
    Applied(U256),
    Stale,
    Failed,
}

#[derive(Debug, Clone)]
struct PendingEstimate<I> {
    sequence: u64,
    input: Option<I>,
    due_at_ms: TimestampMs,
}

#[derive(Debug, Clone)]
pub struct DebouncedEstimator<I> {
    kind: EstimateKind,
    window_ms: u64,
    last_issued: u64,
    pending: Option<PendingEstimate<I>>,
    in_flight: Option<u64>,
    latest: Option<EstimationResult>,
    calls_started: u64,
    failures: u64,
}

impl<I> DebouncedEstimator<I> {
    pub fn new(kind: EstimateKind, window_ms: u64) -> Self {
        Self {
            kind,
            window_ms,
            last_issued: 0,
            pending: None,
            in_flight: None,
            latest: None,
            calls_started: 0,
            failures: 0,
        }
    }

    pub fn kind(&self) -> EstimateKind {
        self.kind
    }

    /// Records a change to a watched field. `None` means the current input
    /// fails the estimation precondition; the request still supersedes older
    /// ones but will not reach the ledger.
    pub fn trigger(&mut self, input: Option<I>, now: TimestampMs) -> u64 {
        self.last_issued = self.last_issued.saturating_add(1);
        self.pending = Some(PendingEstimate {
            sequence: self.last_issued,
            input,
            due_at_ms: now.saturating_add_ms(self.window_ms),
        });
        self.last_issued
    }

    pub fn next_deadline(&self) -> Option<TimestampMs> {
        self.pending.as_ref().map(|p| p.due_at_ms)
    }

    pub fn take_due(&mut self, now: TimestampMs) -> Option<EstimationRequest<I>> {
        if self.in_flight.is_some() {
            return None;
        }
        if self.pending.as_ref()?.due_at_ms > now {
            return None;
        }
        let pending = self.pending.take()?;
        let Some(input) = pending.input else {
            debug!(kind = ?self.kind, sequence = pending.sequence, "estimation skipped: input not estimable");
            return None;
        };
        self.in_flight = Some(pending.sequence);
        self.calls_started = self.calls_started.saturating_add(1);
        Some(EstimationRequest {
            kind: self.kind,
            sequence: pending.sequence,
            input,
        })
    }

    pub fn complete(&mut self, sequence: u64, outcome: Result<U256, PortError>) -> CompletionOutcome {
        if self.in_flight == Some(sequence) {
            self.in_flight = None;
        }
        let value = match outcome {
            Ok(value) => value,
            Err(err) => {
                self.failures = self.failures.saturating_add(1);
                warn!(kind = ?self.kind, sequence, error = %err, "estimation failed");
                return CompletionOutcome::Failed;
            }
        };
        let superseded = sequence != self.last_issued;
        let older_than_applied = self.latest.is_some_and(|l| l.sequence >= sequence);
        if superseded || older_than_applied {
            debug!(
                kind = ?self.kind,
                sequence,
                newest = self.last_issued,
                "dropping stale estimate"
            );
            return CompletionOutcome::Stale;
        }
        self.latest = Some(EstimationResult { sequence, value });
        CompletionOutcome::Applied(value)
    }

    pub fn latest(&self) -> Option<EstimationResult> {
        self.latest
    }

    pub fn last_issued(&self) -> u64 {
        self.last_issued
    }

    pub fn is_in_flight(&self) -> bool {
        self.in_flight.is_some()
    }

    pub fn has_pending(&self) -> bool {
        self.pending.is_some()
    }

    pub fn is_idle(&self) -> bool {
        self.pending.is_none() && self.in_flight.is_none()
    }

    pub fn calls_started(&self) -> u64 {
        self.calls_started
    }

    pub fn failures(&self) -> u64 {
        self.failures
    }
}
