use tokio::time::Instant;

use rusty_met_forms_core::ports::ClockPort;
use rusty_met_forms_core::{PortError, TimestampMs};

#[derive(Debug, Clone, Default)]
pub struct SystemClockAdapter;

impl ClockPort for SystemClockAdapter {
    fn now_ms(&self) -> Result<u64, PortError> {
        let now = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map_err(|e| PortError::Transport(format!("time error: {e}")))?;
        Ok(now.as_millis() as u64)
    }
}

/// Milliseconds since the session started, on tokio's clock so paused test
/// time drives debounce deadlines.
#[derive(Debug, Clone, Copy)]
pub struct MonotonicClock {
    origin: Instant,
}

impl MonotonicClock {
    pub fn start() -> Self {
        Self {
            origin: Instant::now(),
        }
    }

    pub fn now(&self) -> TimestampMs {
        TimestampMs(self.origin.elapsed().as_millis() as u64)
    }

    pub fn instant_at(&self, at: TimestampMs) -> Instant {
        self.origin + std::time::Duration::from_millis(at.0)
    }
}

impl ClockPort for MonotonicClock {
    fn now_ms(&self) -> Result<u64, PortError> {
        Ok(self.now().0)
    }
}
