#![forbid(unsafe_code)]

pub mod builder;
pub mod clients;
pub mod config;
pub mod controller;
pub mod epoch;
pub mod error;
pub mod grading;
pub mod logging;
pub mod presenter;
pub mod sessions;

pub use exam_core::Clock;

pub use builder::{GenerationAccept, GenerationReply, PendingGeneration, TestBuilder};
pub use clients::{
    ApiClient, GenerationClient, GradingClient, GradingReceipt, HttpGenerationClient,
    HttpGradingClient, JobPoll,
};
pub use config::ServiceConfig;
pub use controller::{ControllerEvent, ControllerUpdate, ExamController, PageKind};
pub use epoch::{Epoch, Ticket};
pub use error::{
    ClientError, ConfigLoadError, ControllerError, ErrorKind, GenerationError, SessionError,
    SubmissionError,
};
pub use grading::{GradingPipeline, JobStatus, PollPolicy, SubmissionJob};
pub use presenter::{ResultCard, ResultView, ScoreBand, present, render_text};
pub use sessions::{SessionMachine, SessionPhase, SessionProgress, TickOutcome, Urgency};
