//! Results of run, test and submit requests.
//!
//! A request resolves either to raw program output (Test mode) or to an
//! ordered list of per-test verdicts (Run and Submit). Collaborator failures
//! are a third shape rather than an `Err`, so they render inline.

use serde::{Deserialize, Serialize};

use crate::error::BackendError;
use crate::model::{QuestionId, TestCaseId};

/// What a request asks the execution collaborator to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionMode {
    /// Execute once with the candidate's custom input; raw output only.
    Test,
    /// Execute against sample test cases only.
    Run,
    /// Execute against sample and hidden test cases.
    Submit,
}

impl ExecutionMode {
    /// Returns the lowercase mode name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Test => "test",
            Self::Run => "run",
            Self::Submit => "submit",
        }
    }
}

impl std::fmt::Display for ExecutionMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Raw program output from a single execution.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawOutput {
    /// Whether the program ran and exited cleanly.
    pub success: bool,
    /// Captured stdout.
    #[serde(default)]
    pub stdout: String,
    /// Captured stderr.
    #[serde(default)]
    pub stderr: String,
    /// Wall time reported by the executor.
    #[serde(default)]
    pub execution_time_ms: u64,
    /// Process exit code, when the executor reports one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub return_code: Option<i32>,
    /// Executor-level error (compile error, timeout).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Pass/fail result for one test case.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Verdict {
    /// The test case this verdict answers.
    pub test_case_id: TestCaseId,
    /// Whether the test case is a sample case.
    pub is_sample: bool,
    /// Whether the output matched.
    pub passed: bool,
    /// Program output, when available.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actual_output: Option<String>,
    /// Expected output, when the collaborator returns it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected_output: Option<String>,
    /// Per-case error message.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Wall time for this case.
    #[serde(default)]
    pub execution_time_ms: u64,
}

/// Pass/fail counts split by visibility.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerdictSummary {
    /// Sample cases passed.
    pub sample_passed: usize,
    /// Sample cases evaluated.
    pub sample_total: usize,
    /// Hidden cases passed.
    pub hidden_passed: usize,
    /// Hidden cases evaluated.
    pub hidden_total: usize,
}

impl VerdictSummary {
    /// Total cases passed.
    #[must_use]
    pub const fn passed(&self) -> usize {
        self.sample_passed + self.hidden_passed
    }

    /// Total cases evaluated.
    #[must_use]
    pub const fn total(&self) -> usize {
        self.sample_total + self.hidden_total
    }

    /// Returns `true` if every evaluated case passed.
    #[must_use]
    pub const fn all_passed(&self) -> bool {
        self.passed() == self.total()
    }
}

/// Ordered verdicts plus executor logs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerdictReport {
    /// Verdicts in test case order.
    pub verdicts: Vec<Verdict>,
    /// Compiler output, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compilation_logs: Option<String>,
    /// Runtime logs, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub execution_logs: Option<String>,
}

impl VerdictReport {
    /// Counts passes by visibility.
    #[must_use]
    pub fn summary(&self) -> VerdictSummary {
        self.verdicts
            .iter()
            .fold(VerdictSummary::default(), |mut acc, verdict| {
                if verdict.is_sample {
                    acc.sample_total += 1;
                    acc.sample_passed += usize::from(verdict.passed);
                } else {
                    acc.hidden_total += 1;
                    acc.hidden_passed += usize::from(verdict.passed);
                }
                acc
            })
    }
}

/// The payload of a resolved request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "data", rename_all = "snake_case")]
pub enum OutcomeBody {
    /// Raw stdout/stderr with no verdicts.
    Raw(RawOutput),
    /// Per-test verdicts.
    Verdicts(VerdictReport),
    /// The collaborator failed.
    Failed(BackendError),
}

/// The result of one run/test/submit request, stamped with its origin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionOutcome {
    /// Question the request was issued for.
    pub question_id: QuestionId,
    /// Per-session request sequence number.
    pub request_id: u64,
    /// Mode the request ran in.
    pub mode: ExecutionMode,
    /// The result.
    pub body: OutcomeBody,
}

impl ExecutionOutcome {
    /// Returns the verdict summary, if this outcome has verdicts.
    #[must_use]
    pub fn summary(&self) -> Option<VerdictSummary> {
        match &self.body {
            OutcomeBody::Verdicts(report) => Some(report.summary()),
            OutcomeBody::Raw(_) | OutcomeBody::Failed(_) => None,
        }
    }

    /// Returns `true` if the collaborator failed.
    #[must_use]
    pub const fn is_failure(&self) -> bool {
        matches!(self.body, OutcomeBody::Failed(_))
    }
}
