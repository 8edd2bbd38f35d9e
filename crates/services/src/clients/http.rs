use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use url::Url;
use uuid::Uuid;

use exam_core::model::{
    AnswerSheet, GenerationRequest, JobHandle, SubmissionPayload, Test, TestPayload,
    TestResultPayload,
};

use super::{GenerationClient, GradingClient, GradingReceipt, JobPoll};
use crate::config::ServiceConfig;
use crate::error::ClientError;

/// Shared HTTP plumbing for both services.
#[derive(Clone, Debug)]
pub struct ApiClient {
    client: Client,
    base_url: Url,
    api_key: Option<String>,
}

impl ApiClient {
    /// # Errors
    ///
    /// Returns `ClientError::Http` if the HTTP client cannot be built.
    pub fn new(config: &ServiceConfig) -> Result<Self, ClientError> {
        let client = Client::builder().timeout(config.request_timeout).build()?;
        Ok(Self {
            client,
            base_url: config.base_url.clone(),
            api_key: config.api_key.clone(),
        })
    }

    #[must_use]
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url, ClientError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| ClientError::Protocol(format!("{} cannot be a base URL", self.base_url)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn post<B, T>(&self, segments: &[&str], body: &B) -> Result<T, ClientError>
    where
        B: Serialize + ?Sized + Sync,
        T: DeserializeOwned,
    {
        let url = self.endpoint(segments)?;
        self.send(self.client.post(url).json(body)).await
    }

    async fn get<T: DeserializeOwned>(&self, segments: &[&str]) -> Result<T, ClientError> {
        let url = self.endpoint(segments)?;
        self.send(self.client.get(url)).await
    }

    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, ClientError> {
        let request_id = Uuid::new_v4().to_string();
        let mut request = request.header("x-request-id", &request_id);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            warn!(%status, %request_id, url = %response.url(), "service returned an error status");
            return Err(ClientError::HttpStatus(status));
        }
        debug!(%status, %request_id, "service responded");

        let bytes = response.bytes().await?;
        // An empty body counts as an empty object.
        let body: &[u8] = if bytes.iter().all(u8::is_ascii_whitespace) {
            b"{}"
        } else {
            &bytes
        };
        Ok(serde_json::from_slice(body)?)
    }
}

//
// ─── CONTENT GENERATION ────────────────────────────────────────────────────────
//

#[derive(Clone, Debug)]
pub struct HttpGenerationClient {
    api: ApiClient,
}

impl HttpGenerationClient {
    #[must_use]
    pub fn new(api: ApiClient) -> Self {
        Self { api }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct TopicsRequest<'a> {
    syllabus_content: &'a str,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum TopicsResponse {
    List(Vec<String>),
    Wrapped {
        #[serde(default)]
        topics: Vec<String>,
    },
}

#[async_trait]
impl GenerationClient for HttpGenerationClient {
    async fn generate_test(&self, request: &GenerationRequest) -> Result<TestPayload, ClientError> {
        self.api.post(&["api", "v1", "tests", "generate"], request).await
    }

    async fn extract_topics(&self, syllabus: &str) -> Result<Vec<String>, ClientError> {
        let body = TopicsRequest {
            syllabus_content: syllabus,
        };
        let response: TopicsResponse = self
            .api
            .post(&["api", "v1", "syllabus", "topics"], &body)
            .await?;
        Ok(match response {
            TopicsResponse::List(topics) | TopicsResponse::Wrapped { topics } => topics,
        })
    }
}

//
// ─── GRADING ───────────────────────────────────────────────────────────────────
//

#[derive(Clone, Debug)]
pub struct HttpGradingClient {
    api: ApiClient,
}

impl HttpGradingClient {
    #[must_use]
    pub fn new(api: ApiClient) -> Self {
        Self { api }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SubmitRequest<'a> {
    answers: &'a AnswerSheet,
    elapsed_seconds: u32,
    full_test_context: &'a Test,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum SubmitResponse {
    Deferred {
        #[serde(rename = "jobId")]
        job_id: JobHandle,
    },
    Immediate(TestResultPayload),
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "lowercase")]
enum PollStatus {
    Pending,
    Complete,
    Failed,
}

#[derive(Debug, Deserialize)]
struct PollResponse {
    status: PollStatus,
    #[serde(default)]
    result: Option<TestResultPayload>,
    #[serde(default)]
    error: Option<String>,
}

#[async_trait]
impl GradingClient for HttpGradingClient {
    async fn submit(&self, payload: &SubmissionPayload) -> Result<GradingReceipt, ClientError> {
        let body = SubmitRequest {
            answers: &payload.answers,
            elapsed_seconds: payload.elapsed_seconds,
            full_test_context: &payload.test,
        };
        let response: SubmitResponse = self
            .api
            .post(
                &["api", "v1", "tests", payload.test_id().as_str(), "submit"],
                &body,
            )
            .await?;

        Ok(match response {
            SubmitResponse::Deferred { job_id } if !job_id.is_blank() => {
                GradingReceipt::Deferred(job_id)
            }
            SubmitResponse::Deferred { .. } => {
                return Err(ClientError::Protocol("grading job id is blank".into()));
            }
            SubmitResponse::Immediate(result) => GradingReceipt::Immediate(result),
        })
    }

    async fn poll(&self, handle: &JobHandle) -> Result<JobPoll, ClientError> {
        let response: PollResponse = self
            .api
            .get(&["api", "v1", "results", handle.as_str()])
            .await?;

        match response.status {
            PollStatus::Pending => Ok(JobPoll::Pending),
            PollStatus::Complete => response.result.map(JobPoll::Complete).ok_or_else(|| {
                ClientError::Protocol(format!("job {handle} completed without a result"))
            }),
            PollStatus::Failed => Ok(JobPoll::Failed(
                response
                    .error
                    .filter(|message| !message.trim().is_empty())
                    .unwrap_or_else(|| "grading failed".into()),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::grading::PollPolicy;

    fn api(base: &str) -> ApiClient {
        ApiClient::new(&ServiceConfig {
            base_url: Url::parse(base).unwrap(),
            api_key: None,
            request_timeout: Duration::from_secs(5),
            poll: PollPolicy::default(),
        })
        .unwrap()
    }

    #[test]
    fn endpoint_appends_segments_to_base_path() {
        let client = api("http://localhost:8080/exam/");
        let url = client.endpoint(&["api", "v1", "results", "job 1"]).unwrap();
        assert_eq!(url.as_str(), "http://localhost:8080/exam/api/v1/results/job%201");
    }

    #[test]
    fn endpoint_without_base_path() {
        let client = api("http://localhost:8080");
        let url = client.endpoint(&["api", "v1", "tests", "generate"]).unwrap();
        assert_eq!(url.as_str(), "http://localhost:8080/api/v1/tests/generate");
    }

    #[test]
    fn submit_response_prefers_job_handle() {
        let deferred: SubmitResponse = serde_json::from_str(r#"{"jobId":"job-1"}"#).unwrap();
        assert!(matches!(deferred, SubmitResponse::Deferred { job_id } if job_id.as_str() == "job-1"));

        let immediate: SubmitResponse = serde_json::from_str(
            r#"{"score":80,"correctAnswers":4,"totalQuestions":5,"aiSummary":"ok","strengths":["a"],"weaknesses":["b"]}"#,
        )
        .unwrap();
        assert!(matches!(immediate, SubmitResponse::Immediate(raw) if raw.score == Some(80.0)));
    }

    #[test]
    fn topics_accept_list_or_object() {
        let list: TopicsResponse = serde_json::from_str(r#"["Algebra"]"#).unwrap();
        assert!(matches!(list, TopicsResponse::List(topics) if topics == ["Algebra"]));
        let empty: TopicsResponse = serde_json::from_str("{}").unwrap();
        assert!(matches!(empty, TopicsResponse::Wrapped { topics } if topics.is_empty()));
    }
}
