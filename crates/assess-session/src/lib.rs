//! Assessment Session Controller
//!
//! Drives one candidate's timed coding assessment: the countdown, the
//! per-question code buffers, run/test/submit coordination, and the view
//! model handed to presentation.

pub mod backend;
pub mod catalog;
pub mod clock;
pub mod config;
pub mod controller;
pub mod coordinator;
pub mod demo;
pub mod error;
pub mod events;
pub mod model;
pub mod outcome;
pub mod timer;
pub mod view;
pub mod workspace;

#[cfg(test)]
mod testing;

pub use backend::{AssessmentBackend, BackendResult};
pub use catalog::QuestionCatalog;
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{Config, Environment, ReportConfig, SubmitPolicy, CONFIG_FILE_NAME};
pub use controller::{
    CandidateAction, SessionController, SessionInbox, SessionInput, SubmissionRecord,
};
pub use coordinator::{normalize_output, Completion, ExecutionRequest, SubmissionCoordinator};
pub use error::{BackendError, BackendErrorKind, Rejection, Result, SessionError};
pub use events::{EventBroadcaster, SessionEvent};
pub use model::{
    Assessment, AssessmentId, AssessmentStatus, Difficulty, Language, Question, QuestionId,
    TestCase, TestCaseId,
};
pub use outcome::{
    ExecutionMode, ExecutionOutcome, OutcomeBody, RawOutput, Verdict, VerdictReport,
    VerdictSummary,
};
pub use timer::{TimeBand, TimerEngine, TimerHandle, TimerStatus};
pub use view::{OutcomeResultView, OutcomeView, QuestionView, SessionView, TimerView, VerdictRow};
pub use workspace::CodeWorkspace;
