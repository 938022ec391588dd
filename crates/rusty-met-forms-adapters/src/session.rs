//! Async driver for one form wizard.
//!
//! All transitions of a session go through one `tokio::sync::Mutex`. The lock
//! is never held across a ledger call: submissions and estimates run as
//! spawned tasks that re-acquire it to record their result, so dropping the
//! caller's future never abandons a submission half way.

use std::sync::{Arc, Mutex as StdMutex};

use serde_json::Value;
use tokio::sync::{Mutex, Notify};
use tracing::{debug, info, warn};

use rusty_met_forms_core::{
    ConfirmOutcome, EstimateInput, EstimateKind, EstimationRequest, FinishOutcome, Form,
    LedgerPort, PortError, ReviewOutcome, Screen, SubmissionFailure, SubmissionTicket,
    TimestampMs, Wizard,
};

use crate::clock::MonotonicClock;
use crate::scheduler::ScheduledTask;

pub type SuccessCallback = Box<dyn FnMut(&Value) + Send>;

#[derive(Debug, Clone, PartialEq)]
pub enum SubmitOutcome {
    Succeeded(Value),
    Failed(SubmissionFailure),
    /// The password was empty; nothing was sent.
    PasswordRequired(String),
}

impl From<FinishOutcome> for SubmitOutcome {
    fn from(outcome: FinishOutcome) -> Self {
        match outcome {
            FinishOutcome::Succeeded(value) => SubmitOutcome::Succeeded(value),
            FinishOutcome::Failed(failure) => SubmitOutcome::Failed(failure),
        }
    }
}

struct Shared<F: Form, L> {
    wizard: Mutex<Wizard<F>>,
    ledger: L,
    clock: MonotonicClock,
    timer: StdMutex<Option<ScheduledTask>>,
    on_success: StdMutex<Option<SuccessCallback>>,
    estimates_settled: Notify,
}

pub struct FormSession<F: Form, L> {
    shared: Arc<Shared<F, L>>,
}

impl<F: Form, L> Clone for FormSession<F, L> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<F, L> FormSession<F, L>
where
    F: Form,
    L: LedgerPort + 'static,
{
    pub fn new(form: F, constraints: F::Constraints, ledger: L, debounce_window_ms: u64) -> Self {
        Self {
            shared: Arc::new(Shared {
                wizard: Mutex::new(Wizard::new(form, constraints, debounce_window_ms)),
                ledger,
                clock: MonotonicClock::start(),
                timer: StdMutex::new(None),
                on_success: StdMutex::new(None),
                estimates_settled: Notify::new(),
            }),
        }
    }

    /// Called once per successful submission with the ledger's result.
    pub fn with_on_success(self, callback: impl FnMut(&Value) + Send + 'static) -> Self {
        match self.shared.on_success.lock() {
            Ok(mut slot) => *slot = Some(Box::new(callback)),
            Err(e) => warn!(error = %e, "success callback lock poisoned"),
        }
        self
    }

    pub fn ledger(&self) -> &L {
        &self.shared.ledger
    }

    pub fn now(&self) -> TimestampMs {
        self.shared.clock.now()
    }

    /// Runs `f` against the current wizard state.
    pub async fn inspect<R>(&self, f: impl FnOnce(&Wizard<F>) -> R) -> R {
        f(&*self.shared.wizard.lock().await)
    }

    /// Form-specific toggles that do not go through field validation.
    pub async fn update_form<R>(&self, f: impl FnOnce(&mut F) -> R) -> R {
        f(self.shared.wizard.lock().await.form_mut())
    }

    pub async fn screen(&self) -> Screen {
        self.shared.wizard.lock().await.screen()
    }

    pub async fn edit(&self, field: F::Field, value: Option<String>) -> Vec<EstimateKind> {
        let mut wizard = self.shared.wizard.lock().await;
        let triggered = wizard.edit(field, value, self.shared.clock.now());
        self.shared.schedule(wizard.next_estimate_deadline());
        triggered
    }

    pub async fn use_max(&self) -> Vec<EstimateKind> {
        let mut wizard = self.shared.wizard.lock().await;
        let triggered = wizard.use_max(self.shared.clock.now());
        self.shared.schedule(wizard.next_estimate_deadline());
        triggered
    }

    pub async fn set_constraints(&self, constraints: F::Constraints) {
        self.shared.wizard.lock().await.set_constraints(constraints);
    }

    pub async fn review(&self) -> Result<ReviewOutcome, PortError> {
        self.shared.wizard.lock().await.review()
    }

    pub async fn back_to_edit(&self) -> Result<(), PortError> {
        self.shared.wizard.lock().await.back_to_edit()
    }

    /// Submits the reviewed snapshot. The ledger is invoked at most once per
    /// call; a second confirm while one is in flight fails with
    /// `Conflict("SUBMISSION_IN_FLIGHT")`.
    pub async fn confirm(&self, password: &str) -> Result<SubmitOutcome, PortError> {
        let ticket = match self.shared.wizard.lock().await.confirm(password)? {
            ConfirmOutcome::PasswordRequired(message) => {
                return Ok(SubmitOutcome::PasswordRequired(message))
            }
            ConfirmOutcome::Dispatch(ticket) => ticket,
        };
        let task = tokio::spawn(Arc::clone(&self.shared).submit(ticket));
        let outcome = task
            .await
            .map_err(|e| PortError::Transport(format!("submission task failed: {e}")))??;
        Ok(outcome.into())
    }

    /// Resolves once no estimate is pending or in flight.
    pub async fn wait_for_estimates(&self) {
        loop {
            let settled = self.shared.estimates_settled.notified();
            tokio::pin!(settled);
            settled.as_mut().enable();
            if self.shared.wizard.lock().await.estimates_idle() {
                return;
            }
            settled.await;
        }
    }
}

impl<F, L> Shared<F, L>
where
    F: Form,
    L: LedgerPort + 'static,
{
    /// Replaces the debounce timer. The previous timer is cancelled; estimate
    /// calls it already started keep running.
    fn schedule(self: &Arc<Self>, deadline: Option<TimestampMs>) {
        let task = deadline.map(|at| {
            let weak = Arc::downgrade(self);
            ScheduledTask::at(self.clock.instant_at(at), move || {
                if let Some(shared) = weak.upgrade() {
                    tokio::spawn(shared.fire());
                }
            })
        });
        match self.timer.lock() {
            Ok(mut slot) => *slot = task,
            Err(e) => warn!(error = %e, "estimate timer lock poisoned"),
        }
    }

    async fn fire(self: Arc<Self>) {
        let due = {
            let mut wizard = self.wizard.lock().await;
            let due = wizard.take_due_estimates(self.clock.now());
            self.schedule(wizard.next_estimate_deadline());
            due
        };
        for request in due {
            tokio::spawn(Arc::clone(&self).drive_estimate(request));
        }
        self.estimates_settled.notify_waiters();
    }

    /// Runs one estimator until it has nothing due. A request that became due
    /// while this call was in flight is sent as soon as the call returns.
    async fn drive_estimate(self: Arc<Self>, mut request: EstimationRequest<EstimateInput>) {
        loop {
            debug!(
                form = ?F::KIND,
                kind = ?request.kind,
                sequence = request.sequence,
                operation = request.input.operation,
                "estimate call started"
            );
            let result = self
                .ledger
                .invoke(request.input.operation, request.input.payload.clone())
                .await;

            let mut wizard = self.wizard.lock().await;
            let outcome = wizard.complete_estimate(&request, result);
            debug!(form = ?F::KIND, kind = ?request.kind, sequence = request.sequence, ?outcome, "estimate call finished");
            match wizard.take_due_estimate(request.kind, self.clock.now()) {
                Some(next) => request = next,
                None => {
                    self.schedule(wizard.next_estimate_deadline());
                    drop(wizard);
                    self.estimates_settled.notify_waiters();
                    return;
                }
            }
        }
    }

    async fn submit(self: Arc<Self>, ticket: SubmissionTicket) -> Result<FinishOutcome, PortError> {
        info!(
            form = ?F::KIND,
            operation = ticket.operation,
            attempt = ticket.attempt,
            "submission started"
        );
        let result = self.ledger.invoke(ticket.operation, ticket.payload).await;
        let outcome = self.wizard.lock().await.finish(ticket.attempt, result)?;
        if let FinishOutcome::Succeeded(value) = &outcome {
            self.notify_success(value);
        }
        Ok(outcome)
    }

    fn notify_success(&self, value: &Value) {
        match self.on_success.lock() {
            Ok(mut slot) => {
                if let Some(callback) = slot.as_mut() {
                    callback(value);
                }
            }
            Err(e) => warn!(error = %e, "success callback lock poisoned"),
        }
    }
}
