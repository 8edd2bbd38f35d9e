//! Seams to the external content generation and grading services.

mod http;

use async_trait::async_trait;

use exam_core::model::{
    GenerationRequest, JobHandle, SubmissionPayload, TestPayload, TestResultPayload,
};

use crate::error::ClientError;

pub use http::{ApiClient, HttpGenerationClient, HttpGradingClient};

/// Content generation service.
///
/// Responses are returned raw; callers validate them into domain types.
#[async_trait]
pub trait GenerationClient: Send + Sync {
    async fn generate_test(&self, request: &GenerationRequest) -> Result<TestPayload, ClientError>;

    /// Ask the service to list the topics covered by a syllabus.
    async fn extract_topics(&self, syllabus: &str) -> Result<Vec<String>, ClientError>;
}

/// How the grading service acknowledged a submission.
#[derive(Debug, Clone)]
pub enum GradingReceipt {
    /// Graded synchronously.
    Immediate(TestResultPayload),
    /// Accepted for background grading; poll the handle for the result.
    Deferred(JobHandle),
}

/// State of a deferred grading job.
#[derive(Debug, Clone)]
pub enum JobPoll {
    Pending,
    Complete(TestResultPayload),
    Failed(String),
}

#[async_trait]
pub trait GradingClient: Send + Sync {
    async fn submit(&self, payload: &SubmissionPayload) -> Result<GradingReceipt, ClientError>;

    async fn poll(&self, handle: &JobHandle) -> Result<JobPoll, ClientError>;
}
