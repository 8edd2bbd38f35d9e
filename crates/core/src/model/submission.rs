use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::model::answer::AnswerSheet;
use crate::model::ids::TestId;
use crate::model::practice_test::Test;

/// What ended a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SubmissionTrigger {
    /// The learner confirmed the submission dialog.
    Confirmed,
    /// The countdown reached zero.
    Timeout,
}

/// Snapshot handed from a finished session to grading.
#[derive(Debug, Clone, PartialEq)]
pub struct SubmissionPayload {
    pub test: Arc<Test>,
    pub answers: AnswerSheet,
    pub elapsed_seconds: u32,
    pub trigger: SubmissionTrigger,
    pub submitted_at: DateTime<Utc>,
}

impl SubmissionPayload {
    #[must_use]
    pub fn test_id(&self) -> &TestId {
        self.test.id()
    }
}
