//! Version counter used to drop continuations that outlived their owner.
//!
//! Every background operation (timer ticks, generation and grading calls)
//! carries a `Ticket`. Before a continuation is allowed to touch state, its
//! ticket is compared against the counter; invalidating the counter makes
//! every outstanding ticket stale at once.

/// Token identifying one background operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Ticket(u64);

#[derive(Debug, Default)]
pub struct Epoch {
    current: u64,
}

impl Epoch {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Issue a new ticket. Any previously issued ticket becomes stale.
    pub fn issue(&mut self) -> Ticket {
        self.current = self.current.wrapping_add(1);
        Ticket(self.current)
    }

    /// Make every outstanding ticket stale without issuing a new one.
    pub fn invalidate(&mut self) {
        self.current = self.current.wrapping_add(1);
    }

    #[must_use]
    pub fn is_current(&self, ticket: Ticket) -> bool {
        ticket.0 == self.current
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn newest_ticket_wins() {
        let mut epoch = Epoch::new();
        let first = epoch.issue();
        let second = epoch.issue();
        assert!(!epoch.is_current(first));
        assert!(epoch.is_current(second));
    }

    #[test]
    fn invalidate_stales_everything() {
        let mut epoch = Epoch::new();
        let ticket = epoch.issue();
        epoch.invalidate();
        assert!(!epoch.is_current(ticket));
        let fresh = epoch.issue();
        assert!(epoch.is_current(fresh));
    }
}
