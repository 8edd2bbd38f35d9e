mod machine;
mod progress;
mod timer;

// Public API of the session subsystem.
pub use crate::error::SessionError;
pub use machine::{SessionMachine, SessionPhase, TickOutcome};
pub use progress::SessionProgress;
pub use timer::{Countdown, CountdownStep, TICK_PERIOD, Ticker, Urgency, format_clock};
