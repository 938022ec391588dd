use serde::{Deserialize, Serialize};

use crate::ports::PortError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WizardStatus {
    Composing,
    Reviewing,
    Submitting,
    Succeeded,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WizardAction {
    Review,
    Edit,
    Confirm,
    Succeed,
    Fail,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OnboardingStep {
    Terms,
    Password,
    Phrase,
    Submitting,
    Completed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OnboardingAction {
    AcceptTerms,
    DefinePassword,
    AcceptPhrase,
    Complete,
    Reject,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StateTransition<S> {
    pub from: S,
    pub to: S,
    pub reason: &'static str,
}

pub fn wizard_transition(
    status: WizardStatus,
    action: WizardAction,
) -> Result<(WizardStatus, StateTransition<WizardStatus>), PortError> {
    use WizardAction as A;
    use WizardStatus as S;

    let (to, reason) = match (status, action) {
        (S::Composing, A::Review) => (S::Reviewing, "snapshot_taken"),
        (S::Reviewing, A::Edit) => (S::Composing, "back_to_edit"),
        (S::Reviewing, A::Confirm) => (S::Submitting, "submission_started"),
        (S::Submitting, A::Succeed) => (S::Succeeded, "submission_succeeded"),
        (S::Submitting, A::Fail) => (S::Failed, "submission_failed"),
        (S::Failed, A::Confirm) => (S::Submitting, "submission_retried"),
        (S::Failed, A::Edit) => (S::Composing, "restart_from_compose"),
        _ => {
            return Err(PortError::Validation(format!(
                "illegal wizard transition: {status:?} --{action:?}-->"
            )))
        }
    };
    Ok((
        to,
        StateTransition {
            from: status,
            to,
            reason,
        },
    ))
}

pub fn onboarding_transition(
    step: OnboardingStep,
    action: OnboardingAction,
) -> Result<(OnboardingStep, StateTransition<OnboardingStep>), PortError> {
    use OnboardingAction as A;
    use OnboardingStep as S;

    let (to, reason) = match (step, action) {
        (S::Terms, A::AcceptTerms) => (S::Password, "terms_accepted"),
        (S::Password, A::DefinePassword) => (S::Phrase, "password_defined"),
        (S::Phrase, A::AcceptPhrase) => (S::Submitting, "phrase_accepted"),
        (S::Submitting, A::Complete) => (S::Completed, "wallet_created"),
        (S::Submitting, A::Reject) => (S::Phrase, "wallet_rejected"),
        _ => {
            return Err(PortError::Validation(format!(
                "illegal onboarding transition: {step:?} --{action:?}-->"
            )))
        }
    };
    Ok((
        to,
        StateTransition {
            from: step,
            to,
            reason,
        },
    ))
}
