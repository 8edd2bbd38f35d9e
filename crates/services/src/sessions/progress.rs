use super::machine::SessionPhase;

/// Aggregated view of session progress, useful for the question palette.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionProgress {
    pub total: usize,
    pub answered: usize,
    pub current: usize,
    /// One flag per question, in test order.
    pub answered_flags: Vec<bool>,
    pub phase: SessionPhase,
}

impl SessionProgress {
    #[must_use]
    pub fn unanswered(&self) -> usize {
        self.total.saturating_sub(self.answered)
    }
}
