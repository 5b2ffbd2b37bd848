//! The view model handed to presentation.
//!
//! A pure projection of session state: it carries no request sequence
//! numbers, no raw collaborator payloads, and never the input or expected
//! output of a hidden test case.

use serde::{Deserialize, Serialize};

use crate::catalog::QuestionCatalog;
use crate::error::BackendErrorKind;
use crate::model::{AssessmentStatus, Difficulty, Language, Question, QuestionId, TestCaseId};
use crate::outcome::{ExecutionMode, ExecutionOutcome, OutcomeBody, VerdictSummary};
use crate::timer::{format_remaining, TimeBand};

/// Everything presentation needs to render the session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionView {
    /// Assessment title.
    pub title: String,
    /// Assessment description.
    pub description: Option<String>,
    /// Lifecycle status.
    pub status: AssessmentStatus,
    /// Countdown state.
    pub timer: TimerView,
    /// Zero-based index of the active question.
    pub question_index: usize,
    /// Number of questions.
    pub question_count: usize,
    /// The active question.
    pub question: QuestionView,
    /// Active language.
    pub language: Language,
    /// Text of the active buffer.
    pub code: String,
    /// Custom stdin for Test mode.
    pub custom_input: Option<String>,
    /// Latest outcome for the active question.
    pub outcome: Option<OutcomeView>,
    /// Latest rejection or failure message.
    pub last_error: Option<String>,
    /// Whether a request is outstanding.
    pub request_in_flight: bool,
    /// Whether edits and requests are still accepted.
    pub editable: bool,
}

/// Countdown state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimerView {
    /// Whole seconds left; `None` without a deadline.
    pub remaining_secs: Option<u64>,
    /// Formatted countdown.
    pub display: String,
    /// Urgency band.
    pub band: TimeBand,
}

impl TimerView {
    /// Builds the countdown view for the given remaining time.
    #[must_use]
    pub fn new(remaining_secs: Option<u64>) -> Self {
        Self {
            remaining_secs,
            display: format_remaining(remaining_secs.unwrap_or(0)),
            band: TimeBand::for_remaining(remaining_secs),
        }
    }
}

/// Candidate-visible question details.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionView {
    /// Question id.
    pub id: QuestionId,
    /// Title.
    pub title: String,
    /// Problem statement.
    pub description: String,
    /// Difficulty label.
    pub difficulty: Difficulty,
    /// Languages the candidate may use.
    pub allowed_languages: Vec<Language>,
    /// Sample cases in definition order.
    pub samples: Vec<SampleCaseView>,
    /// Number of hidden cases.
    pub hidden_count: usize,
}

impl QuestionView {
    /// Projects a question, hiding hidden cases.
    #[must_use]
    pub fn new(question: &Question) -> Self {
        Self {
            id: question.id.clone(),
            title: question.title.clone(),
            description: question.description.clone(),
            difficulty: question.difficulty,
            allowed_languages: question.allowed_languages.clone(),
            samples: QuestionCatalog::sample_cases(question)
                .into_iter()
                .map(|tc| SampleCaseView {
                    id: tc.id.clone(),
                    input: tc.input_data.clone(),
                    expected_output: tc.expected_output.clone(),
                })
                .collect(),
            hidden_count: QuestionCatalog::hidden_case_count(question),
        }
    }
}

/// A sample case as shown to the candidate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SampleCaseView {
    /// Test case id.
    pub id: TestCaseId,
    /// Stdin payload.
    pub input: String,
    /// Expected stdout.
    pub expected_output: String,
}

// ============================================================================
// Outcome projection
// ============================================================================

/// Latest outcome for the active question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutcomeView {
    /// Mode of the request.
    pub mode: ExecutionMode,
    /// The result.
    pub result: OutcomeResultView,
}

/// Shape of an outcome's result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum OutcomeResultView {
    /// Raw program output.
    Raw {
        /// Whether the program exited cleanly.
        success: bool,
        /// Captured stdout.
        stdout: String,
        /// Captured stderr.
        stderr: String,
        /// Executor-level error.
        error: Option<String>,
        /// Wall time.
        execution_time_ms: u64,
    },
    /// Per-test verdicts.
    Verdicts {
        /// Pass counts.
        summary: VerdictSummary,
        /// One row per verdict.
        rows: Vec<VerdictRow>,
        /// Compiler output.
        compilation_logs: Option<String>,
        /// Runtime logs.
        execution_logs: Option<String>,
    },
    /// The collaborator failed.
    Failed {
        /// Failure category.
        kind: BackendErrorKind,
        /// Human-readable message.
        message: String,
    },
}

/// One verdict row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "visibility", rename_all = "snake_case")]
pub enum VerdictRow {
    /// A sample case, shown in full.
    Sample {
        /// Test case id.
        test_case_id: TestCaseId,
        /// Whether it passed.
        passed: bool,
        /// Stdin payload.
        input: Option<String>,
        /// Expected output.
        expected_output: Option<String>,
        /// Program output.
        actual_output: Option<String>,
        /// Per-case error.
        error: Option<String>,
    },
    /// A hidden case: ordinal and result only.
    Hidden {
        /// One-based position among hidden cases.
        ordinal: usize,
        /// Whether it passed.
        passed: bool,
    },
}

impl VerdictRow {
    /// Returns `true` if the case passed.
    #[must_use]
    pub const fn passed(&self) -> bool {
        match self {
            Self::Sample { passed, .. } | Self::Hidden { passed, .. } => *passed,
        }
    }
}

impl OutcomeView {
    /// Projects an outcome for display alongside its question.
    #[must_use]
    pub fn new(outcome: &ExecutionOutcome, question: &Question) -> Self {
        let result = match &outcome.body {
            OutcomeBody::Raw(raw) => OutcomeResultView::Raw {
                success: raw.success,
                stdout: raw.stdout.clone(),
                stderr: raw.stderr.clone(),
                error: raw.error.clone(),
                execution_time_ms: raw.execution_time_ms,
            },
            OutcomeBody::Verdicts(report) => {
                let mut hidden_ordinal = 0;
                let rows = report
                    .verdicts
                    .iter()
                    .map(|verdict| {
                        // Trust the question's own classification over the wire flag.
                        let case = question
                            .test_cases
                            .iter()
                            .find(|tc| tc.id == verdict.test_case_id);
                        let is_sample = case.map_or(verdict.is_sample, |tc| tc.is_sample);
                        if is_sample {
                            VerdictRow::Sample {
                                test_case_id: verdict.test_case_id.clone(),
                                passed: verdict.passed,
                                input: case.map(|tc| tc.input_data.clone()),
                                expected_output: verdict
                                    .expected_output
                                    .clone()
                                    .or_else(|| case.map(|tc| tc.expected_output.clone())),
                                actual_output: verdict.actual_output.clone(),
                                error: verdict.error.clone(),
                            }
                        } else {
                            hidden_ordinal += 1;
                            VerdictRow::Hidden {
                                ordinal: hidden_ordinal,
                                passed: verdict.passed,
                            }
                        }
                    })
                    .collect::<Vec<_>>();
                let summary = rows.iter().fold(VerdictSummary::default(), |mut acc, row| {
                    match row {
                        VerdictRow::Sample { passed, .. } => {
                            acc.sample_total += 1;
                            acc.sample_passed += usize::from(*passed);
                        }
                        VerdictRow::Hidden { passed, .. } => {
                            acc.hidden_total += 1;
                            acc.hidden_passed += usize::from(*passed);
                        }
                    }
                    acc
                });
                OutcomeResultView::Verdicts {
                    summary,
                    rows,
                    compilation_logs: report.compilation_logs.clone(),
                    execution_logs: report.execution_logs.clone(),
                }
            }
            OutcomeBody::Failed(error) => OutcomeResultView::Failed {
                kind: error.kind,
                message: error.detail.clone(),
            },
        };

        Self {
            mode: outcome.mode,
            result,
        }
    }
}
