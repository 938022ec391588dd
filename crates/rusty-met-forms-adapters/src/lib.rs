pub mod clock;
pub mod config;
pub mod ledger;
pub mod onboarding;
pub mod scheduler;
pub mod session;

pub use clock::{MonotonicClock, SystemClockAdapter};
pub use config::{ConfigError, FormsAdapterConfig};
pub use ledger::{HttpLedgerAdapter, InMemoryLedger, LedgerCall, ScriptedResponse};
pub use onboarding::{OnboardingOutcome, OnboardingSession};
pub use scheduler::ScheduledTask;
pub use session::{FormSession, SubmitOutcome, SuccessCallback};
