use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::watch;
use tracing::{debug, info, warn};

use exam_core::model::{
    AnswerSheet, JobHandle, SubmissionPayload, SubmissionTrigger, TestId, TestResult,
};

use crate::clients::{GradingClient, GradingReceipt, JobPoll};
use crate::error::SubmissionError;

/// How often, and how many times, a deferred grading job is polled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    pub interval: Duration,
    pub max_attempts: u32,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(2),
            max_attempts: 30,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum JobStatus {
    Pending,
    Complete(TestResult),
    Failed(String),
}

impl JobStatus {
    #[must_use]
    pub fn is_pending(&self) -> bool {
        matches!(self, Self::Pending)
    }
}

/// Snapshot of one submission and its grading status.
#[derive(Debug, Clone, PartialEq)]
pub struct SubmissionJob {
    pub test_id: TestId,
    pub answers: AnswerSheet,
    pub elapsed_seconds: u32,
    pub trigger: SubmissionTrigger,
    pub submitted_at: DateTime<Utc>,
    pub status: JobStatus,
}

/// Sends one submission to the grading service and waits for its result.
///
/// A pipeline runs once: `completion` consumes it. Retrying means building a
/// new pipeline from the same payload.
pub struct GradingPipeline {
    client: Arc<dyn GradingClient>,
    payload: SubmissionPayload,
    policy: PollPolicy,
    status: watch::Sender<JobStatus>,
}

impl GradingPipeline {
    #[must_use]
    pub fn new(
        client: Arc<dyn GradingClient>,
        payload: SubmissionPayload,
        policy: PollPolicy,
    ) -> Self {
        let (status, _) = watch::channel(JobStatus::Pending);
        Self {
            client,
            payload,
            policy,
            status,
        }
    }

    #[must_use]
    pub fn payload(&self) -> &SubmissionPayload {
        &self.payload
    }

    /// Observe status changes. The final status is published before
    /// `completion` returns.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<JobStatus> {
        self.status.subscribe()
    }

    #[must_use]
    pub fn job(&self) -> SubmissionJob {
        SubmissionJob {
            test_id: self.payload.test_id().clone(),
            answers: self.payload.answers.clone(),
            elapsed_seconds: self.payload.elapsed_seconds,
            trigger: self.payload.trigger,
            submitted_at: self.payload.submitted_at,
            status: self.status.borrow().clone(),
        }
    }

    /// Submit the answers and wait until grading completes or fails.
    ///
    /// # Errors
    ///
    /// Returns `SubmissionError` on transport failure, a failed or timed-out
    /// job, or a result that fails validation.
    pub async fn completion(self) -> Result<TestResult, SubmissionError> {
        let outcome = self.run().await;
        match &outcome {
            Ok(result) => {
                info!(
                    test_id = %self.payload.test_id(),
                    score = result.score(),
                    "grading complete"
                );
                self.status.send_replace(JobStatus::Complete(result.clone()));
            }
            Err(err) => {
                warn!(test_id = %self.payload.test_id(), error = %err, "grading failed");
                self.status.send_replace(JobStatus::Failed(err.to_string()));
            }
        }
        outcome
    }

    async fn run(&self) -> Result<TestResult, SubmissionError> {
        info!(
            test_id = %self.payload.test_id(),
            answered = self.payload.answers.len(),
            elapsed = self.payload.elapsed_seconds,
            trigger = ?self.payload.trigger,
            "submitting for grading"
        );
        match self.client.submit(&self.payload).await? {
            GradingReceipt::Immediate(raw) => Ok(TestResult::try_from(raw)?),
            GradingReceipt::Deferred(handle) => self.wait_for(handle).await,
        }
    }

    async fn wait_for(&self, handle: JobHandle) -> Result<TestResult, SubmissionError> {
        debug!(%handle, "grading deferred, polling");
        for attempt in 1..=self.policy.max_attempts {
            tokio::time::sleep(self.policy.interval).await;
            match self.client.poll(&handle).await? {
                JobPoll::Pending => debug!(%handle, attempt, "grading still pending"),
                JobPoll::Complete(raw) => return Ok(TestResult::try_from(raw)?),
                JobPoll::Failed(message) => {
                    return Err(SubmissionError::JobFailed { handle, message });
                }
            }
        }
        Err(SubmissionError::TimedOut {
            handle,
            attempts: self.policy.max_attempts,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::Mutex;

    use async_trait::async_trait;
    use exam_core::model::{
        CorrectAnswer, OptionId, Question, QuestionId, QuestionKind, QuestionOption, Test,
        TestResultPayload,
    };
    use exam_core::time::fixed_now;
    use tokio::time::Instant;

    use super::*;
    use crate::error::ClientError;

    struct ScriptedGrader {
        receipt: GradingReceipt,
        polls: Mutex<VecDeque<JobPoll>>,
        poll_count: Mutex<u32>,
    }

    impl ScriptedGrader {
        fn new(receipt: GradingReceipt, polls: Vec<JobPoll>) -> Arc<Self> {
            Arc::new(Self {
                receipt,
                polls: Mutex::new(polls.into()),
                poll_count: Mutex::new(0),
            })
        }

        fn polls(&self) -> u32 {
            *self.poll_count.lock().unwrap()
        }
    }

    #[async_trait]
    impl GradingClient for ScriptedGrader {
        async fn submit(&self, _: &SubmissionPayload) -> Result<GradingReceipt, ClientError> {
            Ok(self.receipt.clone())
        }

        async fn poll(&self, _: &JobHandle) -> Result<JobPoll, ClientError> {
            *self.poll_count.lock().unwrap() += 1;
            Ok(self.polls.lock().unwrap().pop_front().unwrap_or(JobPoll::Pending))
        }
    }

    fn raw_result(score: f64, correct: u32) -> TestResultPayload {
        TestResultPayload {
            score: Some(score),
            correct_answers: Some(correct),
            total_questions: Some(2),
            ai_summary: Some("Solid work.".into()),
            strengths: vec!["Hooks".into()],
            weaknesses: vec!["Context".into()],
        }
    }

    fn payload() -> SubmissionPayload {
        let question = Question::new(
            QuestionId::new("q1"),
            QuestionKind::SingleSelect,
            "Pick",
            vec![QuestionOption::new("a", "A"), QuestionOption::new("b", "B")],
            CorrectAnswer::Option(OptionId::new("a")),
            "",
        )
        .unwrap();
        SubmissionPayload {
            test: Arc::new(Test::new(TestId::new("t1"), "Quiz", "React", 1, vec![question]).unwrap()),
            answers: AnswerSheet::new(),
            elapsed_seconds: 30,
            trigger: SubmissionTrigger::Confirmed,
            submitted_at: fixed_now(),
        }
    }

    #[tokio::test]
    async fn immediate_result_completes() {
        let grader = ScriptedGrader::new(GradingReceipt::Immediate(raw_result(50.0, 1)), vec![]);
        let pipeline = GradingPipeline::new(grader.clone(), payload(), PollPolicy::default());
        let status = pipeline.subscribe();

        let result = pipeline.completion().await.unwrap();
        assert_eq!(result.correct_answers(), 1);
        assert_eq!(*status.borrow(), JobStatus::Complete(result));
        assert_eq!(grader.polls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn deferred_job_is_polled_until_complete() {
        let grader = ScriptedGrader::new(
            GradingReceipt::Deferred(JobHandle::new("job-7")),
            vec![JobPoll::Pending, JobPoll::Complete(raw_result(100.0, 2))],
        );
        let pipeline = GradingPipeline::new(grader.clone(), payload(), PollPolicy::default());
        let mut status = pipeline.subscribe();
        assert!(status.borrow_and_update().is_pending());

        let started = Instant::now();
        let result = pipeline.completion().await.unwrap();
        assert_eq!(result.score(), 100.0);
        assert_eq!(grader.polls(), 2);
        assert_eq!(started.elapsed(), Duration::from_secs(4));

        assert!(matches!(*status.borrow_and_update(), JobStatus::Complete(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn failed_job_reports_service_message() {
        let grader = ScriptedGrader::new(
            GradingReceipt::Deferred(JobHandle::new("job-8")),
            vec![JobPoll::Failed("model overloaded".into())],
        );
        let pipeline = GradingPipeline::new(grader, payload(), PollPolicy::default());
        let status = pipeline.subscribe();

        let err = pipeline.completion().await.unwrap_err();
        assert!(matches!(&err, SubmissionError::JobFailed { message, .. } if message == "model overloaded"));
        assert!(err.is_retryable());
        assert!(matches!(&*status.borrow(), JobStatus::Failed(message) if message.contains("model overloaded")));
    }

    #[tokio::test(start_paused = true)]
    async fn polling_gives_up_after_max_attempts() {
        let grader = ScriptedGrader::new(GradingReceipt::Deferred(JobHandle::new("job-9")), vec![]);
        let policy = PollPolicy {
            interval: Duration::from_millis(500),
            max_attempts: 3,
        };
        let pipeline = GradingPipeline::new(grader.clone(), payload(), policy);

        let err = pipeline.completion().await.unwrap_err();
        assert!(matches!(err, SubmissionError::TimedOut { attempts: 3, .. }));
        assert_eq!(grader.polls(), 3);
    }

    #[tokio::test]
    async fn invalid_result_is_rejected() {
        let grader = ScriptedGrader::new(GradingReceipt::Immediate(raw_result(50.0, 3)), vec![]);
        let pipeline = GradingPipeline::new(grader, payload(), PollPolicy::default());
        let job = pipeline.job();
        assert_eq!(job.status, JobStatus::Pending);
        assert_eq!(job.elapsed_seconds, 30);

        let err = pipeline.completion().await.unwrap_err();
        assert!(matches!(err, SubmissionError::InvalidResult(_)));
    }
}
