//! Event-driven controller for one learner's practice run.
//!
//! All state lives here and is touched from one task. Background work (the
//! countdown ticker, generation and grading calls) reports back through
//! `ControllerEvent`s, each carrying the `Ticket` it was issued. An event whose
//! ticket is no longer current is discarded without touching state.

use std::fmt;
use std::sync::Arc;

use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

use exam_core::Clock;
use exam_core::model::{
    AnswerInput, GenerationConfig, QuestionId, SubmissionPayload, Test, TestResult,
};

use crate::builder::{GenerationAccept, GenerationReply, TestBuilder};
use crate::clients::{
    ApiClient, GenerationClient, GradingClient, HttpGenerationClient, HttpGradingClient,
};
use crate::config::ServiceConfig;
use crate::epoch::{Epoch, Ticket};
use crate::error::{ClientError, ControllerError, GenerationError, SessionError, SubmissionError};
use crate::grading::{GradingPipeline, JobStatus, PollPolicy};
use crate::presenter::{ResultView, present};
use crate::sessions::{SessionMachine, TICK_PERIOD, TickOutcome, Ticker, Urgency};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PageKind {
    Configure,
    Generating,
    Ready,
    Session,
    Grading,
    Results,
}

impl fmt::Display for PageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Configure => "configure",
            Self::Generating => "generating",
            Self::Ready => "ready",
            Self::Session => "session",
            Self::Grading => "grading",
            Self::Results => "results",
        };
        f.write_str(label)
    }
}

/// Completion reported by background work.
#[derive(Debug)]
pub enum ControllerEvent {
    Tick(Ticket),
    Generated(GenerationReply),
    Graded {
        ticket: Ticket,
        outcome: Result<TestResult, SubmissionError>,
    },
}

/// What handling an event changed.
#[derive(Debug)]
pub enum ControllerUpdate {
    TestReady(Arc<Test>),
    GenerationFailed(GenerationError),
    Tick { remaining: u32, urgency: Urgency },
    /// Time ran out and the answers were submitted automatically.
    TimedOut,
    Graded(TestResult),
    GradingFailed(SubmissionError),
    /// The event belonged to work that is no longer current.
    Discarded,
}

pub struct ExamController {
    builder: TestBuilder,
    grading_client: Arc<dyn GradingClient>,
    poll: PollPolicy,
    clock: Clock,
    page: PageKind,
    epoch: Epoch,
    session: Option<SessionMachine>,
    ticker: Option<Ticker>,
    grading: Option<Ticket>,
    grading_status: Option<watch::Receiver<JobStatus>>,
    last_submission: Option<SubmissionPayload>,
    last_error: Option<String>,
    result: Option<TestResult>,
    events_tx: mpsc::UnboundedSender<ControllerEvent>,
    events_rx: mpsc::UnboundedReceiver<ControllerEvent>,
}

impl ExamController {
    #[must_use]
    pub fn new(
        generation: Arc<dyn GenerationClient>,
        grading: Arc<dyn GradingClient>,
        poll: PollPolicy,
        clock: Clock,
    ) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        Self {
            builder: TestBuilder::new(generation),
            grading_client: grading,
            poll,
            clock,
            page: PageKind::Configure,
            epoch: Epoch::new(),
            session: None,
            ticker: None,
            grading: None,
            grading_status: None,
            last_submission: None,
            last_error: None,
            result: None,
            events_tx,
            events_rx,
        }
    }

    /// Build a controller talking to the HTTP services described by `config`.
    ///
    /// # Errors
    ///
    /// Returns `ClientError` if the HTTP client cannot be built.
    pub fn from_config(config: &ServiceConfig) -> Result<Self, ClientError> {
        let api = ApiClient::new(config)?;
        Ok(Self::new(
            Arc::new(HttpGenerationClient::new(api.clone())),
            Arc::new(HttpGradingClient::new(api)),
            config.poll,
            Clock::system(),
        ))
    }

    #[must_use]
    pub fn page(&self) -> PageKind {
        self.page
    }

    #[must_use]
    pub fn builder(&self) -> &TestBuilder {
        &self.builder
    }

    #[must_use]
    pub fn session(&self) -> Option<&SessionMachine> {
        self.session.as_ref()
    }

    /// The generated test waiting to be started.
    #[must_use]
    pub fn ready_test(&self) -> Option<&Arc<Test>> {
        self.builder.test()
    }

    /// Latest grading status, while a submission is being graded.
    #[must_use]
    pub fn grading_status(&self) -> Option<JobStatus> {
        self.grading_status
            .as_ref()
            .map(|status| status.borrow().clone())
    }

    /// Message of the last generation or grading failure.
    #[must_use]
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    #[must_use]
    pub fn result(&self) -> Option<&TestResult> {
        self.result.as_ref()
    }

    #[must_use]
    pub fn result_view(&self) -> ResultView {
        present(self.result.as_ref())
    }

    //
    // ─── CONFIGURATION & GENERATION ────────────────────────────────────────────
    //

    /// # Errors
    ///
    /// Returns `ControllerError` outside the configure and ready pages, or when
    /// the configuration is invalid.
    pub fn configure(&mut self, config: GenerationConfig) -> Result<(), ControllerError> {
        self.ensure_page("configure a test", &[PageKind::Configure, PageKind::Ready])?;
        self.builder.configure(config)?;
        self.page = PageKind::Configure;
        Ok(())
    }

    /// # Errors
    ///
    /// Returns `ControllerError::WrongPage` outside the configure and ready pages.
    pub fn attach_syllabus(&mut self, text: &str) -> Result<(), ControllerError> {
        self.ensure_page("attach a syllabus", &[PageKind::Configure, PageKind::Ready])?;
        self.builder.attach_syllabus(text);
        Ok(())
    }

    /// # Errors
    ///
    /// Returns `ControllerError` outside the configure page or when extraction fails.
    pub async fn extract_topics(&mut self) -> Result<Vec<String>, ControllerError> {
        self.ensure_page("extract topics", &[PageKind::Configure])?;
        Ok(self.builder.extract_topics().await?)
    }

    /// Start generating a test in the background. Calling again while a
    /// generation is running supersedes it.
    ///
    /// # Errors
    ///
    /// Returns `ControllerError` on the wrong page or when nothing valid is configured.
    ///
    /// # Panics
    ///
    /// Panics if called outside a tokio runtime.
    pub fn begin_generation(&mut self) -> Result<(), ControllerError> {
        self.ensure_page(
            "generate a test",
            &[PageKind::Configure, PageKind::Ready, PageKind::Generating],
        )?;
        let pending = self.builder.prepare()?;
        let client = self.builder.client();
        let events = self.events_tx.clone();
        tokio::spawn(async move {
            let reply = pending.send(client.as_ref()).await;
            let _ = events.send(ControllerEvent::Generated(reply));
        });
        self.page = PageKind::Generating;
        self.last_error = None;
        Ok(())
    }

    //
    // ─── SESSION ───────────────────────────────────────────────────────────────
    //

    /// Start answering the generated test.
    ///
    /// # Errors
    ///
    /// Returns `ControllerError` outside the ready page or if no test is held.
    ///
    /// # Panics
    ///
    /// Panics if called outside a tokio runtime.
    pub fn start_test(&mut self) -> Result<Arc<Test>, ControllerError> {
        self.ensure_page("start a test", &[PageKind::Ready])?;
        let test = self.builder.take_test().ok_or(ControllerError::NoTest)?;

        let ticket = self.epoch.issue();
        let mut session = SessionMachine::new(self.clock);
        session.start(Arc::clone(&test), ticket)?;
        self.ticker = Some(Ticker::spawn(
            TICK_PERIOD,
            self.events_tx.clone(),
            move || ControllerEvent::Tick(ticket),
        ));
        self.session = Some(session);
        self.result = None;
        self.page = PageKind::Session;
        Ok(test)
    }

    /// # Errors
    ///
    /// Returns `ControllerError` outside a live session.
    pub fn go_to(&mut self, index: usize) -> Result<usize, ControllerError> {
        self.with_session("navigate", |session| session.go_to(index))
    }

    /// # Errors
    ///
    /// Returns `ControllerError` outside a live session.
    pub fn next(&mut self) -> Result<usize, ControllerError> {
        self.with_session("navigate", SessionMachine::next)
    }

    /// # Errors
    ///
    /// Returns `ControllerError` outside a live session.
    pub fn previous(&mut self) -> Result<usize, ControllerError> {
        self.with_session("navigate", SessionMachine::previous)
    }

    /// # Errors
    ///
    /// Returns `ControllerError` outside a live session or for an invalid answer.
    pub fn set_answer(
        &mut self,
        question: &QuestionId,
        input: AnswerInput,
    ) -> Result<(), ControllerError> {
        self.with_session("set an answer", |session| session.set_answer(question, input))
    }

    /// # Errors
    ///
    /// Returns `ControllerError` outside a live session or for an invalid answer.
    pub fn answer_current(&mut self, input: AnswerInput) -> Result<(), ControllerError> {
        self.with_session("set an answer", |session| session.answer_current(input))
    }

    /// # Errors
    ///
    /// Returns `ControllerError` unless the session is in progress.
    pub fn request_submission(&mut self) -> Result<(), ControllerError> {
        self.with_session("request submission", SessionMachine::request_submission)
    }

    /// # Errors
    ///
    /// Returns `ControllerError` unless the confirmation gate is open.
    pub fn cancel_submission(&mut self) -> Result<(), ControllerError> {
        self.with_session("cancel submission", SessionMachine::cancel_submission)
    }

    /// Submit the answers and start grading in the background.
    ///
    /// # Errors
    ///
    /// Returns `ControllerError` unless the confirmation gate is open.
    ///
    /// # Panics
    ///
    /// Panics if called outside a tokio runtime.
    pub fn confirm_submission(&mut self) -> Result<(), ControllerError> {
        let payload =
            self.with_session("confirm submission", SessionMachine::confirm_submission)?;
        self.begin_grading(payload);
        Ok(())
    }

    /// Send the last submission to grading again after a failure.
    ///
    /// # Errors
    ///
    /// Returns `ControllerError::WrongPage` unless grading failed.
    ///
    /// # Panics
    ///
    /// Panics if called outside a tokio runtime.
    pub fn retry_submission(&mut self) -> Result<(), ControllerError> {
        self.ensure_page("retry grading", &[PageKind::Grading])?;
        let payload = match (&self.grading, &self.last_submission) {
            (None, Some(payload)) => payload.clone(),
            _ => {
                return Err(ControllerError::WrongPage {
                    operation: "retry grading",
                    page: self.page,
                });
            }
        };
        info!(test_id = %payload.test_id(), "retrying grading");
        self.begin_grading(payload);
        Ok(())
    }

    /// Abandon whatever is running and go back to configuration.
    ///
    /// Stops the countdown, discards the session, and makes every pending
    /// generation or grading result stale.
    pub fn leave(&mut self) {
        debug!(page = %self.page, "leaving");
        self.epoch.invalidate();
        self.builder.cancel_pending();
        self.ticker = None;
        if let Some(session) = self.session.as_mut() {
            session.abandon();
        }
        self.session = None;
        self.grading = None;
        self.grading_status = None;
        self.last_submission = None;
        self.last_error = None;
        self.page = PageKind::Configure;
    }

    //
    // ─── EVENTS ────────────────────────────────────────────────────────────────
    //

    /// Wait for the next background event.
    pub async fn next_event(&mut self) -> Option<ControllerEvent> {
        self.events_rx.recv().await
    }

    pub fn handle(&mut self, event: ControllerEvent) -> ControllerUpdate {
        match event {
            ControllerEvent::Tick(ticket) => self.on_tick(ticket),
            ControllerEvent::Generated(reply) => self.on_generated(reply),
            ControllerEvent::Graded { ticket, outcome } => self.on_graded(ticket, outcome),
        }
    }

    fn on_tick(&mut self, ticket: Ticket) -> ControllerUpdate {
        if !self.epoch.is_current(ticket) {
            return ControllerUpdate::Discarded;
        }
        let Some(session) = self.session.as_mut() else {
            return ControllerUpdate::Discarded;
        };
        match session.tick(ticket) {
            Ok(TickOutcome::Running { remaining, urgency }) => {
                ControllerUpdate::Tick { remaining, urgency }
            }
            Ok(TickOutcome::ForcedSubmission(payload)) => {
                self.begin_grading(payload);
                ControllerUpdate::TimedOut
            }
            Ok(TickOutcome::Ignored) => ControllerUpdate::Discarded,
            Err(err) => {
                warn!(error = %err, "timer tick rejected");
                ControllerUpdate::Discarded
            }
        }
    }

    fn on_generated(&mut self, reply: GenerationReply) -> ControllerUpdate {
        if self.page != PageKind::Generating {
            debug!(page = %self.page, "generation finished after leaving");
            return ControllerUpdate::Discarded;
        }
        match self.builder.accept(reply) {
            Ok(GenerationAccept::Installed(test)) => {
                self.page = PageKind::Ready;
                ControllerUpdate::TestReady(test)
            }
            Ok(GenerationAccept::Stale) => ControllerUpdate::Discarded,
            Err(err) => {
                self.page = if self.builder.test().is_some() {
                    PageKind::Ready
                } else {
                    PageKind::Configure
                };
                self.last_error = Some(err.to_string());
                ControllerUpdate::GenerationFailed(err)
            }
        }
    }

    fn on_graded(
        &mut self,
        ticket: Ticket,
        outcome: Result<TestResult, SubmissionError>,
    ) -> ControllerUpdate {
        if self.grading != Some(ticket) || !self.epoch.is_current(ticket) {
            debug!("discarding stale grading result");
            return ControllerUpdate::Discarded;
        }
        self.grading = None;
        match outcome {
            Ok(result) => {
                self.result = Some(result.clone());
                self.session = None;
                self.last_submission = None;
                self.grading_status = None;
                self.page = PageKind::Results;
                ControllerUpdate::Graded(result)
            }
            Err(err) => {
                self.last_error = Some(err.to_string());
                ControllerUpdate::GradingFailed(err)
            }
        }
    }

    fn begin_grading(&mut self, payload: SubmissionPayload) {
        self.ticker = None;
        let ticket = self.epoch.issue();
        let pipeline = GradingPipeline::new(
            Arc::clone(&self.grading_client),
            payload.clone(),
            self.poll,
        );
        self.grading_status = Some(pipeline.subscribe());
        self.grading = Some(ticket);
        self.last_submission = Some(payload);
        self.last_error = None;
        self.page = PageKind::Grading;

        let events = self.events_tx.clone();
        tokio::spawn(async move {
            let outcome = pipeline.completion().await;
            let _ = events.send(ControllerEvent::Graded { ticket, outcome });
        });
    }

    fn with_session<T>(
        &mut self,
        operation: &'static str,
        action: impl FnOnce(&mut SessionMachine) -> Result<T, SessionError>,
    ) -> Result<T, ControllerError> {
        self.ensure_page(operation, &[PageKind::Session])?;
        let session = self.session.as_mut().ok_or(ControllerError::WrongPage {
            operation,
            page: self.page,
        })?;
        action(session).map_err(|err| {
            if matches!(err, SessionError::InvalidState { .. }) {
                warn!(error = %err, "session rejected operation");
            }
            ControllerError::from(err)
        })
    }

    fn ensure_page(
        &self,
        operation: &'static str,
        allowed: &[PageKind],
    ) -> Result<(), ControllerError> {
        if allowed.contains(&self.page) {
            Ok(())
        } else {
            Err(ControllerError::WrongPage {
                operation,
                page: self.page,
            })
        }
    }
}

impl fmt::Debug for ExamController {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExamController")
            .field("page", &self.page)
            .field("session", &self.session)
            .field("grading", &self.grading)
            .field("has_result", &self.result.is_some())
            .finish_non_exhaustive()
    }
}
