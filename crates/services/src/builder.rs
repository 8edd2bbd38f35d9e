use std::collections::BTreeSet;
use std::sync::Arc;

use tracing::{debug, info, warn};
use uuid::Uuid;

use exam_core::model::{
    ConfigError, GenerationConfig, GenerationRequest, Test, TestDefaults, TestId,
};

use crate::clients::GenerationClient;
use crate::epoch::{Epoch, Ticket};
use crate::error::GenerationError;

/// A generation request that has been issued a ticket but not yet sent.
#[derive(Debug, Clone)]
pub struct PendingGeneration {
    ticket: Ticket,
    request: GenerationRequest,
    defaults: TestDefaults,
}

impl PendingGeneration {
    #[must_use]
    pub fn ticket(&self) -> Ticket {
        self.ticket
    }

    #[must_use]
    pub fn request(&self) -> &GenerationRequest {
        &self.request
    }

    /// Call the generation service and validate what it returns.
    pub async fn send(self, client: &dyn GenerationClient) -> GenerationReply {
        debug!(exam_type = %self.request.exam_type, "requesting test generation");
        let outcome = match client.generate_test(&self.request).await {
            Ok(payload) => payload.into_test(self.defaults).map_err(GenerationError::from),
            Err(err) => Err(GenerationError::from(err)),
        };
        GenerationReply {
            ticket: self.ticket,
            outcome,
        }
    }
}

/// Outcome of one generation call, tagged with the ticket it was issued.
#[derive(Debug)]
pub struct GenerationReply {
    pub ticket: Ticket,
    pub outcome: Result<Test, GenerationError>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum GenerationAccept {
    Installed(Arc<Test>),
    /// A newer request was issued after this one; the reply was dropped.
    Stale,
}

/// Turns a test configuration into a generated `Test`.
///
/// Holds at most one generated test. Every generation is issued a ticket and
/// only the most recently issued ticket may install its result.
pub struct TestBuilder {
    client: Arc<dyn GenerationClient>,
    config: Option<GenerationConfig>,
    syllabus: Option<String>,
    test: Option<Arc<Test>>,
    epoch: Epoch,
    in_flight: Option<Ticket>,
}

impl TestBuilder {
    #[must_use]
    pub fn new(client: Arc<dyn GenerationClient>) -> Self {
        Self {
            client,
            config: None,
            syllabus: None,
            test: None,
            epoch: Epoch::new(),
            in_flight: None,
        }
    }

    #[must_use]
    pub fn client(&self) -> Arc<dyn GenerationClient> {
        Arc::clone(&self.client)
    }

    #[must_use]
    pub fn config(&self) -> Option<&GenerationConfig> {
        self.config.as_ref()
    }

    #[must_use]
    pub fn syllabus(&self) -> Option<&str> {
        self.syllabus.as_deref()
    }

    /// The most recently generated test, if any.
    #[must_use]
    pub fn test(&self) -> Option<&Arc<Test>> {
        self.test.as_ref()
    }

    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.in_flight
            .is_some_and(|ticket| self.epoch.is_current(ticket))
    }

    /// Store a new configuration, replacing the previous one.
    ///
    /// Clears the generated test and drops any generation still in flight.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the configuration is invalid; the previous
    /// configuration is kept in that case.
    pub fn configure(&mut self, config: GenerationConfig) -> Result<(), ConfigError> {
        config.validate()?;
        info!(name = %config.display_name(), "test configured");
        self.config = Some(config);
        self.test = None;
        self.cancel_pending();
        Ok(())
    }

    /// Attach syllabus text to send along with the request. Blank text detaches.
    pub fn attach_syllabus(&mut self, text: impl Into<String>) {
        let text = text.into();
        self.syllabus = if text.trim().is_empty() {
            None
        } else {
            Some(text)
        };
    }

    /// Ask the service which topics the attached syllabus covers.
    ///
    /// With a custom configuration, the topics replace its stated topics.
    ///
    /// # Errors
    ///
    /// Returns `GenerationError` if no syllabus is attached, the service call
    /// fails, or no topics come back.
    pub async fn extract_topics(&mut self) -> Result<Vec<String>, GenerationError> {
        let syllabus = self
            .syllabus
            .as_deref()
            .ok_or(ConfigError::MissingSyllabus)?;
        let raw = self.client.extract_topics(syllabus).await?;

        let mut seen = BTreeSet::new();
        let topics: Vec<String> = raw
            .into_iter()
            .map(|topic| topic.trim().to_string())
            .filter(|topic| !topic.is_empty() && seen.insert(topic.to_lowercase()))
            .collect();
        if topics.is_empty() {
            return Err(GenerationError::NoTopics);
        }

        if let Some(GenerationConfig::Custom(custom)) = self.config.as_mut() {
            custom.topics.clone_from(&topics);
        }
        info!(count = topics.len(), "syllabus topics extracted");
        Ok(topics)
    }

    /// Issue a ticket for a new generation. Any earlier ticket becomes stale.
    ///
    /// # Errors
    ///
    /// Returns `GenerationError::Config` if nothing is configured or the
    /// configuration cannot be turned into a request.
    pub fn prepare(&mut self) -> Result<PendingGeneration, GenerationError> {
        let config = self.config.as_ref().ok_or(ConfigError::NotConfigured)?;
        let request = config.to_request(self.syllabus.as_deref())?;
        let defaults = TestDefaults {
            id: TestId::new(Uuid::new_v4().to_string()),
            name: config.display_name(),
            subject: config.subject(),
            duration_minutes: config.planned_duration_minutes(),
        };

        let ticket = self.epoch.issue();
        self.in_flight = Some(ticket);
        Ok(PendingGeneration {
            ticket,
            request,
            defaults,
        })
    }

    /// Install the result of a generation call if its ticket is still current.
    ///
    /// # Errors
    ///
    /// Returns the call's `GenerationError` when the current generation failed.
    /// The previously generated test is kept in that case.
    pub fn accept(&mut self, reply: GenerationReply) -> Result<GenerationAccept, GenerationError> {
        if !self.epoch.is_current(reply.ticket) || self.in_flight != Some(reply.ticket) {
            debug!(ticket = ?reply.ticket, "discarding stale generation result");
            return Ok(GenerationAccept::Stale);
        }
        self.in_flight = None;

        match reply.outcome {
            Ok(test) => {
                let test = Arc::new(test);
                info!(
                    test_id = %test.id(),
                    questions = test.question_count(),
                    minutes = test.duration_minutes(),
                    "test generated"
                );
                self.test = Some(Arc::clone(&test));
                Ok(GenerationAccept::Installed(test))
            }
            Err(err) => {
                warn!(error = %err, "test generation failed");
                Err(err)
            }
        }
    }

    /// Generate a test from the current configuration and wait for it.
    ///
    /// # Errors
    ///
    /// Returns `GenerationError` on configuration, service or validation
    /// failure, or `GenerationError::Superseded` if a newer generation was
    /// issued meanwhile.
    pub async fn generate(&mut self) -> Result<Arc<Test>, GenerationError> {
        let pending = self.prepare()?;
        let client = self.client();
        let reply = pending.send(client.as_ref()).await;
        match self.accept(reply)? {
            GenerationAccept::Installed(test) => Ok(test),
            GenerationAccept::Stale => Err(GenerationError::Superseded),
        }
    }

    /// Generate again with the same configuration, replacing the current test.
    ///
    /// # Errors
    ///
    /// Same as [`TestBuilder::generate`].
    pub async fn regenerate(&mut self) -> Result<Arc<Test>, GenerationError> {
        debug!("regenerating test");
        self.generate().await
    }

    /// Hand the generated test over to a session.
    pub fn take_test(&mut self) -> Option<Arc<Test>> {
        self.test.take()
    }

    /// Drop any generation still in flight.
    pub fn cancel_pending(&mut self) {
        if self.in_flight.take().is_some() {
            self.epoch.invalidate();
        }
    }
}
