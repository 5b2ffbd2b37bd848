//! The collaborator interface the session consumes.
//!
//! Implementations own transport concerns; the session only sees typed
//! results or a `BackendError` carrying a kind and a detail string.

use crate::error::BackendError;
use crate::model::{Assessment, AssessmentId, Language, Question, QuestionId};
use crate::outcome::{RawOutput, VerdictReport};

/// Result type for collaborator calls.
pub type BackendResult<T> = std::result::Result<T, BackendError>;

/// Loads assessments and executes candidate code.
#[async_trait::async_trait]
pub trait AssessmentBackend: Send + Sync {
    /// Fetches an assessment. Fails with `NotFound` if it does not exist.
    async fn load_assessment(
        &self,
        assessment_id: &AssessmentId,
        candidate_id: &str,
    ) -> BackendResult<Assessment>;

    /// Starts an assessment, fixing its deadline and moving it to `InProgress`.
    async fn start_assessment(
        &self,
        assessment_id: &AssessmentId,
        candidate_id: &str,
    ) -> BackendResult<Assessment>;

    /// Fetches the ordered questions, including all test cases.
    async fn load_questions(
        &self,
        assessment_id: &AssessmentId,
        candidate_id: &str,
    ) -> BackendResult<Vec<Question>>;

    /// Submits code for grading against sample and hidden test cases.
    async fn submit(
        &self,
        assessment_id: &AssessmentId,
        question_id: &QuestionId,
        candidate_id: &str,
        code: &str,
        language: Language,
    ) -> BackendResult<VerdictReport>;

    /// Executes code once with optional stdin, without verdicts.
    async fn execute(
        &self,
        code: &str,
        language: Language,
        stdin: Option<&str>,
    ) -> BackendResult<RawOutput>;
}
