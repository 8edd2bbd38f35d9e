use std::time::Duration;

use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinHandle;
use tokio::time::{Instant, interval_at};

/// Real-time spacing between countdown ticks.
pub const TICK_PERIOD: Duration = Duration::from_secs(1);

/// Result of one countdown tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CountdownStep {
    Running { remaining: u32 },
    /// The countdown just reached zero. Reported exactly once.
    Expired,
    /// Already at zero; nothing changed.
    Idle,
}

/// How close the countdown is to running out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Urgency {
    Calm,
    Warning,
    Critical,
}

/// Seconds left in a session. Never increases and never goes below zero.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Countdown {
    total: u32,
    remaining: u32,
}

impl Countdown {
    #[must_use]
    pub fn new(total_seconds: u32) -> Self {
        Self {
            total: total_seconds,
            remaining: total_seconds,
        }
    }

    #[must_use]
    pub fn total(&self) -> u32 {
        self.total
    }

    #[must_use]
    pub fn remaining(&self) -> u32 {
        self.remaining
    }

    #[must_use]
    pub fn elapsed(&self) -> u32 {
        self.total - self.remaining
    }

    #[must_use]
    pub fn is_expired(&self) -> bool {
        self.remaining == 0
    }

    /// Take one second off the clock.
    pub fn tick(&mut self) -> CountdownStep {
        match self.remaining {
            0 => CountdownStep::Idle,
            1 => {
                self.remaining = 0;
                CountdownStep::Expired
            }
            n => {
                self.remaining = n - 1;
                CountdownStep::Running {
                    remaining: self.remaining,
                }
            }
        }
    }

    /// Calm above 30% left, warning below 30%, critical below 10%.
    #[must_use]
    pub fn urgency(&self) -> Urgency {
        if self.total == 0 {
            return Urgency::Critical;
        }
        let left = u64::from(self.remaining) * 100;
        let total = u64::from(self.total);
        if left < total * 10 {
            Urgency::Critical
        } else if left < total * 30 {
            Urgency::Warning
        } else {
            Urgency::Calm
        }
    }
}

/// Format seconds as `mm:ss`.
#[must_use]
pub fn format_clock(seconds: u32) -> String {
    format!("{:02}:{:02}", seconds / 60, seconds % 60)
}

/// Background task that emits one event per period until cancelled.
///
/// Dropping the ticker aborts the task, so no tick is produced after the
/// owning session stops it. Ticks already queued are filtered by ticket.
#[derive(Debug)]
pub struct Ticker {
    handle: JoinHandle<()>,
}

impl Ticker {
    /// Spawn onto the current tokio runtime.
    ///
    /// # Panics
    ///
    /// Panics if called outside a tokio runtime.
    pub fn spawn<E, F>(period: Duration, events: UnboundedSender<E>, make_event: F) -> Self
    where
        E: Send + 'static,
        F: Fn() -> E + Send + 'static,
    {
        let handle = tokio::spawn(async move {
            let mut interval = interval_at(Instant::now() + period, period);
            loop {
                interval.tick().await;
                if events.send(make_event()).is_err() {
                    break;
                }
            }
        });
        Self { handle }
    }

    pub fn cancel(self) {
        drop(self);
    }
}

impl Drop for Ticker {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    #[test]
    fn countdown_floors_at_zero_and_expires_once() {
        let mut countdown = Countdown::new(2);
        assert_eq!(countdown.tick(), CountdownStep::Running { remaining: 1 });
        assert!(!countdown.is_expired());
        assert_eq!(countdown.tick(), CountdownStep::Expired);
        assert!(countdown.is_expired());
        assert_eq!(countdown.tick(), CountdownStep::Idle);
        assert_eq!(countdown.remaining(), 0);
        assert_eq!(countdown.elapsed(), 2);
    }

    #[test]
    fn urgency_bands() {
        let mut countdown = Countdown::new(100);
        assert_eq!(countdown.urgency(), Urgency::Calm);
        for _ in 0..71 {
            countdown.tick();
        }
        assert_eq!(countdown.urgency(), Urgency::Warning);
        for _ in 0..20 {
            countdown.tick();
        }
        assert_eq!(countdown.urgency(), Urgency::Critical);
    }

    #[test]
    fn clock_formatting() {
        assert_eq!(format_clock(0), "00:00");
        assert_eq!(format_clock(61), "01:01");
        assert_eq!(format_clock(900), "15:00");
    }

    #[tokio::test(start_paused = true)]
    async fn ticker_emits_once_per_period() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let ticker = Ticker::spawn(TICK_PERIOD, tx, || ());

        let started = Instant::now();
        for _ in 0..3 {
            rx.recv().await.unwrap();
        }
        assert_eq!(started.elapsed(), Duration::from_secs(3));
        ticker.cancel();
    }

    #[tokio::test(start_paused = true)]
    async fn cancelled_ticker_stops_sending() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let ticker = Ticker::spawn(TICK_PERIOD, tx, || ());
        rx.recv().await.unwrap();
        ticker.cancel();

        // Once the task is gone the sender is dropped and the channel closes.
        assert!(rx.recv().await.is_none());
    }
}
