use std::collections::BTreeMap;

use alloy::primitives::U256;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::domain::{
    ConfirmationView, ErrorMap, EstimateInput, EstimateKind, EstimationRequest, EstimationResult,
    FailurePolicy, Screen, SubmissionFailure, SubmissionTicket, TimestampMs,
};
use crate::estimator::{CompletionOutcome, DebouncedEstimator};
use crate::forms::Form;
use crate::ports::PortError;
use crate::state_machine::{wizard_transition, StateTransition, WizardAction, WizardStatus};
use crate::validation::validate_password;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReviewOutcome {
    Ready,
    Invalid,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ConfirmOutcome {
    Dispatch(SubmissionTicket),
    PasswordRequired(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum FinishOutcome {
    Succeeded(Value),
    Failed(SubmissionFailure),
}

/// Compose → review → submit workflow for one form instance.
///
/// Live field values and the confirmation snapshot are kept apart: edits and
/// applied estimates always land in the live form, while review and every
/// submission attempt read the snapshot taken when review began.
#[derive(Debug)]
pub struct Wizard<F: Form> {
    form: F,
    constraints: F::Constraints,
    status: WizardStatus,
    errors: ErrorMap<F::Field>,
    password_error: Option<String>,
    snapshot: Option<F::Snapshot>,
    failure: Option<SubmissionFailure>,
    estimators: BTreeMap<EstimateKind, DebouncedEstimator<EstimateInput>>,
    attempts: u64,
    in_flight_attempt: Option<u64>,
    history: Vec<StateTransition<WizardStatus>>,
}

impl<F: Form> Wizard<F> {
    pub fn new(form: F, constraints: F::Constraints, debounce_window_ms: u64) -> Self {
        let estimators = F::ESTIMATES
            .iter()
            .map(|kind| (*kind, DebouncedEstimator::new(*kind, debounce_window_ms)))
            .collect();
        Self {
            form,
            constraints,
            status: WizardStatus::Composing,
            errors: ErrorMap::new(),
            password_error: None,
            snapshot: None,
            failure: None,
            estimators,
            attempts: 0,
            in_flight_attempt: None,
            history: Vec::new(),
        }
    }

    pub fn form(&self) -> &F {
        &self.form
    }

    /// Direct access for form-specific toggles. Does not validate or trigger
    /// estimates; use [`Wizard::edit`] for field values.
    pub fn form_mut(&mut self) -> &mut F {
        &mut self.form
    }

    pub fn constraints(&self) -> &F::Constraints {
        &self.constraints
    }

    pub fn status(&self) -> WizardStatus {
        self.status
    }

    pub fn errors(&self) -> &ErrorMap<F::Field> {
        &self.errors
    }

    pub fn error(&self, field: F::Field) -> Option<&str> {
        self.errors.get(&field).map(String::as_str)
    }

    pub fn password_error(&self) -> Option<&str> {
        self.password_error.as_deref()
    }

    pub fn snapshot(&self) -> Option<&F::Snapshot> {
        self.snapshot.as_ref()
    }

    pub fn failure(&self) -> Option<&SubmissionFailure> {
        self.failure.as_ref()
    }

    pub fn history(&self) -> &[StateTransition<WizardStatus>] {
        &self.history
    }

    pub fn attempts(&self) -> u64 {
        self.attempts
    }

    pub fn is_submitting(&self) -> bool {
        self.status == WizardStatus::Submitting
    }

    /// Replaces the externally supplied constraints (balance, gas policy) and
    /// re-checks fields that currently carry an error.
    pub fn set_constraints(&mut self, constraints: F::Constraints) {
        self.constraints = constraints;
        let flagged: Vec<F::Field> = self.errors.keys().copied().collect();
        for field in flagged {
            self.revalidate(field);
        }
    }

    /// Applies a user edit to the live values. Returns the estimates it
    /// re-triggered. Ignored while a submission is in flight.
    pub fn edit(
        &mut self,
        field: F::Field,
        value: Option<String>,
        now: TimestampMs,
    ) -> Vec<EstimateKind> {
        if self.is_submitting() {
            debug!(form = ?F::KIND, field = ?field, "edit ignored while submitting");
            return Vec::new();
        }
        self.form.set_value(field, value, &self.constraints);
        self.revalidate(field);
        self.trigger_estimates(F::watched_by(field), now)
    }

    /// Fills the amount field with the largest spendable amount.
    pub fn use_max(&mut self, now: TimestampMs) -> Vec<EstimateKind> {
        let (field, value) = F::max_amount(&self.constraints);
        self.edit(field, Some(value), now)
    }

    fn revalidate(&mut self, field: F::Field) {
        match self.form.validate_field(field, &self.constraints) {
            Some(message) => {
                self.errors.insert(field, message);
            }
            None => {
                self.errors.remove(&field);
            }
        }
    }

    fn trigger_estimates(&mut self, kinds: &[EstimateKind], now: TimestampMs) -> Vec<EstimateKind> {
        let mut triggered = Vec::with_capacity(kinds.len());
        for kind in kinds {
            let input = self.form.estimate_input(*kind);
            if let Some(estimator) = self.estimators.get_mut(kind) {
                let sequence = estimator.trigger(input, now);
                debug!(form = ?F::KIND, kind = ?kind, sequence, "estimate triggered");
                triggered.push(*kind);
            }
        }
        triggered
    }

    fn apply(&mut self, action: WizardAction) -> Result<(), PortError> {
        let (to, transition) = wizard_transition(self.status, action)?;
        info!(
            form = ?F::KIND,
            from = ?transition.from,
            to = ?transition.to,
            reason = transition.reason,
            "wizard transition"
        );
        self.status = to;
        self.history.push(transition);
        Ok(())
    }

    /// Runs every field rule. On success the snapshot is frozen and the wizard
    /// moves to review; otherwise it stays in compose with the errors set.
    pub fn review(&mut self) -> Result<ReviewOutcome, PortError> {
        if self.status == WizardStatus::Failed {
            self.back_to_edit()?;
        }
        if self.status != WizardStatus::Composing {
            wizard_transition(self.status, WizardAction::Review)?;
        }
        for field in F::FIELDS {
            self.revalidate(*field);
        }
        if !self.errors.is_empty() {
            debug!(form = ?F::KIND, errors = self.errors.len(), "review blocked by field errors");
            return Ok(ReviewOutcome::Invalid);
        }
        let snapshot = self.form.snapshot(&self.constraints)?;
        self.apply(WizardAction::Review)?;
        self.snapshot = Some(snapshot);
        self.password_error = None;
        Ok(ReviewOutcome::Ready)
    }

    /// Leaves review (or a failed attempt) for compose. Live values are kept;
    /// the snapshot and any flow-level error are dropped.
    pub fn back_to_edit(&mut self) -> Result<(), PortError> {
        self.apply(WizardAction::Edit)?;
        self.snapshot = None;
        self.failure = None;
        self.password_error = None;
        Ok(())
    }

    pub fn confirm(&mut self, password: &str) -> Result<ConfirmOutcome, PortError> {
        if self.status == WizardStatus::Submitting {
            return Err(PortError::Conflict("SUBMISSION_IN_FLIGHT".to_owned()));
        }
        wizard_transition(self.status, WizardAction::Confirm)?;
        if let Some(message) = validate_password(Some(password)) {
            self.password_error = Some(message.clone());
            return Ok(ConfirmOutcome::PasswordRequired(message));
        }
        let snapshot = self
            .snapshot
            .as_ref()
            .ok_or_else(|| PortError::Validation("no confirmation snapshot".to_owned()))?;
        let (operation, payload) = F::submission(snapshot, password);

        self.apply(WizardAction::Confirm)?;
        self.attempts = self.attempts.saturating_add(1);
        self.in_flight_attempt = Some(self.attempts);
        self.failure = None;
        self.password_error = None;
        Ok(ConfirmOutcome::Dispatch(SubmissionTicket {
            attempt: self.attempts,
            operation,
            payload,
        }))
    }

    pub fn finish(
        &mut self,
        attempt: u64,
        result: Result<Value, PortError>,
    ) -> Result<FinishOutcome, PortError> {
        if self.in_flight_attempt != Some(attempt) {
            return Err(PortError::Conflict(format!(
                "STALE_SUBMISSION_RESULT: attempt {attempt}"
            )));
        }
        self.in_flight_attempt = None;
        match result {
            Ok(value) => {
                self.apply(WizardAction::Succeed)?;
                Ok(FinishOutcome::Succeeded(value))
            }
            Err(err) => {
                let failure = SubmissionFailure::from(err);
                warn!(form = ?F::KIND, attempt, kind = ?failure.kind, message = %failure.message, "submission failed");
                self.apply(WizardAction::Fail)?;
                self.failure = Some(failure.clone());
                Ok(FinishOutcome::Failed(failure))
            }
        }
    }

    pub fn screen(&self) -> Screen {
        match self.status {
            WizardStatus::Composing => Screen::Compose,
            WizardStatus::Reviewing => Screen::Review,
            WizardStatus::Submitting => Screen::Pending,
            WizardStatus::Succeeded => Screen::Done,
            WizardStatus::Failed => {
                let credential = self.failure.as_ref().is_some_and(SubmissionFailure::is_credential);
                let review = credential || F::FAILURE_POLICY == FailurePolicy::ReturnToReview;
                if review && self.snapshot.is_some() {
                    Screen::Review
                } else {
                    Screen::Compose
                }
            }
        }
    }

    pub fn confirmation(&self) -> Option<ConfirmationView> {
        self.snapshot.as_ref().map(F::confirmation)
    }

    pub fn estimate(&self, kind: EstimateKind) -> Option<EstimationResult> {
        self.estimators.get(&kind).and_then(DebouncedEstimator::latest)
    }

    pub fn estimator(&self, kind: EstimateKind) -> Option<&DebouncedEstimator<EstimateInput>> {
        self.estimators.get(&kind)
    }

    /// Earliest deadline among estimators that could fire now. Estimators with
    /// a call in flight are skipped; their completion re-checks the deadline.
    pub fn next_estimate_deadline(&self) -> Option<TimestampMs> {
        self.estimators
            .values()
            .filter(|estimator| !estimator.is_in_flight())
            .filter_map(DebouncedEstimator::next_deadline)
            .min()
    }

    pub fn estimates_idle(&self) -> bool {
        self.estimators.values().all(DebouncedEstimator::is_idle)
    }

    pub fn take_due_estimate(
        &mut self,
        kind: EstimateKind,
        now: TimestampMs,
    ) -> Option<EstimationRequest<EstimateInput>> {
        self.estimators.get_mut(&kind)?.take_due(now)
    }

    pub fn take_due_estimates(&mut self, now: TimestampMs) -> Vec<EstimationRequest<EstimateInput>> {
        self.estimators
            .values_mut()
            .filter_map(|estimator| estimator.take_due(now))
            .collect()
    }

    pub fn complete_estimate(
        &mut self,
        request: &EstimationRequest<EstimateInput>,
        result: Result<Value, PortError>,
    ) -> CompletionOutcome {
        let Some(estimator) = self.estimators.get_mut(&request.kind) else {
            return CompletionOutcome::Stale;
        };
        let parsed = result.and_then(|value| extract_estimate(&value, request.input.result_field));
        let outcome = estimator.complete(request.sequence, parsed);
        if let CompletionOutcome::Applied(value) = outcome {
            if let Some(field) = self.form.apply_estimate(request.kind, value) {
                self.revalidate(field);
            }
        }
        outcome
    }
}

/// Reads the single numeric field of an estimation response. Accepts a JSON
/// number or a decimal string. Numbers past `u64` arrive as `f64` and are
/// only exact up to 2^53; ledgers should send large values as strings.
pub fn extract_estimate(response: &Value, field: &str) -> Result<U256, PortError> {
    let raw = response
        .get(field)
        .ok_or_else(|| PortError::Validation(format!("estimate response missing {field}")))?;
    match raw {
        Value::Number(n) => n
            .as_u64()
            .map(U256::from)
            .or_else(|| {
                n.as_f64()
                    .filter(|f| f.is_finite() && *f >= 0.0 && f.fract() == 0.0)
                    .and_then(|f| U256::from_str_radix(&format!("{f:.0}"), 10).ok())
            })
            .ok_or_else(|| PortError::Validation(format!("estimate {field} is not an integer"))),
        Value::String(s) => U256::from_str_radix(s.trim(), 10)
            .map_err(|e| PortError::Validation(format!("estimate {field}: {e}"))),
        _ => Err(PortError::Validation(format!(
            "estimate {field} has unexpected type"
        ))),
    }
}
