pub mod domain;
pub mod estimator;
pub mod forms;
pub mod mnemonic;
pub mod ports;
pub mod state_machine;
pub mod units;
pub mod validation;
pub mod wizard;

pub use domain::{
    ConfirmationView, ErrorMap, EstimateInput, EstimateKind, EstimationRequest,
    EstimationResult, FailureKind, FailurePolicy, FormKind, Screen, SubmissionFailure,
    SubmissionTicket, TimestampMs,
};
pub use estimator::{CompletionOutcome, DebouncedEstimator, DEFAULT_DEBOUNCE_MS};
pub use forms::{
    ConvertConstraints, ConvertField, ConvertForm, ConvertSnapshot, Form, GasDefaults,
    GasLimitBounds, SendConstraints, SendField, SendSnapshot, SendTokenForm,
};
pub use mnemonic::{
    AcceptOutcome, Bip39PhraseSource, OnboardingField, OnboardingFlow, OnboardingRequest,
    PhraseMode, RECOVERY_PHRASE_WORDS,
};
pub use ports::{LedgerPort, PhraseSource, PortError};
pub use state_machine::{
    onboarding_transition, wizard_transition, OnboardingAction, OnboardingStep, StateTransition,
    WizardAction, WizardStatus,
};
pub use wizard::{ConfirmOutcome, FinishOutcome, ReviewOutcome, Wizard};
