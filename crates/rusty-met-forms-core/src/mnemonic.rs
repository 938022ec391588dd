//! Recovery-phrase onboarding: terms, password, then either confirming a
//! freshly generated phrase or recovering from an existing one.

use std::fmt;

use bip39::{Language, Mnemonic, MnemonicType};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, info, warn};
use zeroize::Zeroizing;

use crate::domain::ErrorMap;
use crate::ports::{PhraseSource, PortError};
use crate::state_machine::{
    onboarding_transition, OnboardingAction, OnboardingStep, StateTransition,
};
pub use crate::validation::RECOVERY_PHRASE_WORDS;
use crate::validation::{
    phrase_word_count, sanitize_mnemonic, validate_mnemonic, validate_password_creation,
    validate_password_repeat, MSG_PHRASE_MISMATCH,
};

pub const OP_CREATE_WALLET: &str = "create-wallet";

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum OnboardingField {
    Password,
    PasswordAgain,
    UserMnemonic,
    MnemonicAgain,
}

/// What the phrase step currently asks of the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PhraseMode {
    /// The generated phrase is shown for copying.
    Display,
    /// The generated phrase must be typed back.
    Confirm,
    /// An existing phrase is typed in.
    Recover,
}

#[derive(Debug, Clone, Default)]
pub struct Bip39PhraseSource;

impl PhraseSource for Bip39PhraseSource {
    fn generate(&self) -> Result<Zeroizing<String>, PortError> {
        let mnemonic = Mnemonic::new(MnemonicType::Words12, Language::English);
        Ok(Zeroizing::new(mnemonic.phrase().to_owned()))
    }
}

#[derive(Clone)]
pub struct OnboardingRequest {
    pub phrase: Zeroizing<String>,
    pub password: Zeroizing<String>,
    pub data_collection_consent: bool,
}

impl OnboardingRequest {
    pub fn to_payload(&self) -> Value {
        json!({
            "mnemonic": self.phrase.as_str(),
            "password": self.password.as_str(),
            "dataCollection": self.data_collection_consent,
        })
    }
}

impl fmt::Debug for OnboardingRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OnboardingRequest")
            .field("phrase", &"<redacted>")
            .field("password", &"<redacted>")
            .field("data_collection_consent", &self.data_collection_consent)
            .finish()
    }
}

#[derive(Debug, Clone)]
pub enum AcceptOutcome {
    Submit(OnboardingRequest),
    /// The typed phrase does not have 12 words yet.
    Disabled,
    Invalid,
}

struct MnemonicSession {
    generated: Zeroizing<String>,
    use_own_phrase: bool,
    phrase_copied: bool,
    phrase_again: Option<Zeroizing<String>>,
    user_phrase: Option<Zeroizing<String>>,
}

pub struct OnboardingFlow {
    step: OnboardingStep,
    data_collection_consent: bool,
    password: Option<Zeroizing<String>>,
    password_again: Option<Zeroizing<String>>,
    session: MnemonicSession,
    errors: ErrorMap<OnboardingField>,
    flow_error: Option<String>,
    history: Vec<StateTransition<OnboardingStep>>,
}

impl fmt::Debug for OnboardingFlow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OnboardingFlow")
            .field("step", &self.step)
            .field("phrase_mode", &self.phrase_mode())
            .field("data_collection_consent", &self.data_collection_consent)
            .field("errors", &self.errors)
            .field("flow_error", &self.flow_error)
            .finish_non_exhaustive()
    }
}

impl OnboardingFlow {
    /// Starts at the terms step with a phrase already generated.
    pub fn start(phrases: &impl PhraseSource) -> Result<Self, PortError> {
        Ok(Self {
            step: OnboardingStep::Terms,
            data_collection_consent: true,
            password: None,
            password_again: None,
            session: MnemonicSession {
                generated: phrases.generate()?,
                use_own_phrase: false,
                phrase_copied: false,
                phrase_again: None,
                user_phrase: None,
            },
            errors: ErrorMap::new(),
            flow_error: None,
            history: Vec::new(),
        })
    }

    pub fn step(&self) -> OnboardingStep {
        self.step
    }

    pub fn errors(&self) -> &ErrorMap<OnboardingField> {
        &self.errors
    }

    pub fn error(&self, field: OnboardingField) -> Option<&str> {
        self.errors.get(&field).map(String::as_str)
    }

    pub fn flow_error(&self) -> Option<&str> {
        self.flow_error.as_deref()
    }

    pub fn history(&self) -> &[StateTransition<OnboardingStep>] {
        &self.history
    }

    pub fn data_collection_consent(&self) -> bool {
        self.data_collection_consent
    }

    pub fn set_data_collection(&mut self, allowed: bool) {
        self.data_collection_consent = allowed;
    }

    fn apply(&mut self, action: OnboardingAction) -> Result<(), PortError> {
        let (to, transition) = onboarding_transition(self.step, action)?;
        info!(
            from = ?transition.from,
            to = ?transition.to,
            reason = transition.reason,
            "onboarding transition"
        );
        self.step = to;
        self.history.push(transition);
        Ok(())
    }

    pub fn accept_terms(&mut self) -> Result<(), PortError> {
        self.apply(OnboardingAction::AcceptTerms)
    }

    /// Updates a typed buffer. The password pair is frozen once the password
    /// step has been passed; later edits to it are ignored.
    pub fn edit(&mut self, field: OnboardingField, value: Option<String>) {
        let password_field = matches!(
            field,
            OnboardingField::Password | OnboardingField::PasswordAgain
        );
        if password_field && !self.password_editable() {
            debug!(field = ?field, step = ?self.step, "password edit ignored after definition");
            return;
        }
        let value = value.map(Zeroizing::new);
        match field {
            OnboardingField::Password => self.password = value,
            OnboardingField::PasswordAgain => self.password_again = value,
            OnboardingField::UserMnemonic => self.session.user_phrase = value,
            OnboardingField::MnemonicAgain => self.session.phrase_again = value,
        }
        self.errors.remove(&field);
        self.flow_error = None;
    }

    fn password_editable(&self) -> bool {
        matches!(self.step, OnboardingStep::Terms | OnboardingStep::Password)
    }

    /// Validates the password pair. Returns `false` and keeps the step when a
    /// rule fails.
    pub fn submit_password(&mut self) -> Result<bool, PortError> {
        let password = self.password.as_deref().map(String::as_str);
        let again = self.password_again.as_deref().map(String::as_str);
        self.errors.remove(&OnboardingField::Password);
        self.errors.remove(&OnboardingField::PasswordAgain);
        if let Some(message) = validate_password_creation(password) {
            self.errors.insert(OnboardingField::Password, message);
        } else if let Some(message) = validate_password_repeat(password, again) {
            self.errors.insert(OnboardingField::PasswordAgain, message);
        }
        if !self.errors.is_empty() {
            return Ok(false);
        }
        self.apply(OnboardingAction::DefinePassword)?;
        Ok(true)
    }

    pub fn phrase_mode(&self) -> PhraseMode {
        if self.session.use_own_phrase {
            PhraseMode::Recover
        } else if self.session.phrase_copied {
            PhraseMode::Confirm
        } else {
            PhraseMode::Display
        }
    }

    /// The generated phrase, only while it is being shown for copying.
    pub fn displayed_phrase(&self) -> Option<&str> {
        (self.step == OnboardingStep::Phrase && self.phrase_mode() == PhraseMode::Display)
            .then(|| self.session.generated.as_str())
    }

    /// Switches between the generate and recover paths, clearing the typed
    /// phrase.
    pub fn toggle_own_phrase(&mut self) {
        self.session.use_own_phrase = !self.session.use_own_phrase;
        self.session.user_phrase = None;
        self.errors.remove(&OnboardingField::UserMnemonic);
    }

    /// Acknowledges (or un-acknowledges) that the phrase was copied, clearing
    /// the re-typed phrase.
    pub fn toggle_copied(&mut self) {
        self.session.phrase_copied = !self.session.phrase_copied;
        self.session.phrase_again = None;
        self.errors.remove(&OnboardingField::MnemonicAgain);
    }

    fn active_input(&self) -> Option<(OnboardingField, &str)> {
        match self.phrase_mode() {
            PhraseMode::Display => None,
            PhraseMode::Confirm => Some((
                OnboardingField::MnemonicAgain,
                self.session.phrase_again.as_deref().map_or("", String::as_str),
            )),
            PhraseMode::Recover => Some((
                OnboardingField::UserMnemonic,
                self.session.user_phrase.as_deref().map_or("", String::as_str),
            )),
        }
    }

    pub fn can_accept(&self) -> bool {
        self.step == OnboardingStep::Phrase
            && self
                .active_input()
                .is_some_and(|(_, phrase)| phrase_word_count(phrase) == RECOVERY_PHRASE_WORDS)
    }

    pub fn accept(&mut self) -> Result<AcceptOutcome, PortError> {
        if self.step == OnboardingStep::Submitting {
            return Err(PortError::Conflict("ONBOARDING_IN_FLIGHT".to_owned()));
        }
        onboarding_transition(self.step, OnboardingAction::AcceptPhrase)?;
        if !self.can_accept() {
            return Ok(AcceptOutcome::Disabled);
        }
        let Some((field, typed)) = self.active_input() else {
            return Ok(AcceptOutcome::Disabled);
        };
        let phrase = Zeroizing::new(sanitize_mnemonic(typed));
        let rejection = match field {
            OnboardingField::UserMnemonic => validate_mnemonic(&phrase),
            _ if phrase.as_str() != self.session.generated.as_str() => {
                Some(MSG_PHRASE_MISMATCH.to_owned())
            }
            _ => None,
        };
        if let Some(message) = rejection {
            self.errors.insert(field, message);
            return Ok(AcceptOutcome::Invalid);
        }
        let password = self
            .password
            .clone()
            .ok_or_else(|| PortError::Validation("password not defined".to_owned()))?;

        self.apply(OnboardingAction::AcceptPhrase)?;
        self.flow_error = None;
        Ok(AcceptOutcome::Submit(OnboardingRequest {
            phrase,
            password,
            data_collection_consent: self.data_collection_consent,
        }))
    }

    /// Records the account-creation result. A rejection returns to the phrase
    /// step with everything typed so far intact.
    pub fn finish(&mut self, result: Result<Value, PortError>) -> Result<(), PortError> {
        match result {
            Ok(_) => self.apply(OnboardingAction::Complete),
            Err(err) => {
                let message = err.message().trim();
                let message = if message.is_empty() {
                    "Unknown error".to_owned()
                } else {
                    message.to_owned()
                };
                warn!(error = %message, "wallet creation rejected");
                self.apply(OnboardingAction::Reject)?;
                self.flow_error = Some(message);
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_phrase_is_twelve_valid_words() {
        let phrase = Bip39PhraseSource.generate().expect("generate");
        assert_eq!(phrase_word_count(&phrase), RECOVERY_PHRASE_WORDS);
        assert_eq!(validate_mnemonic(&phrase), None);
    }

    #[test]
    fn request_debug_redacts_secrets() {
        let request = OnboardingRequest {
            phrase: Zeroizing::new("secret words".to_owned()),
            password: Zeroizing::new("hunter2".to_owned()),
            data_collection_consent: false,
        };
        let rendered = format!("{request:?}");
        assert!(!rendered.contains("secret"));
        assert!(!rendered.contains("hunter2"));
        assert_eq!(request.to_payload()["dataCollection"], false);
    }
}
