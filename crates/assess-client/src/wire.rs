//! Request and response bodies exchanged with the assessment service.

use assess_session::{Language, Verdict, VerdictReport};
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize)]
pub(crate) struct StartRequest<'a> {
    pub candidate_id: &'a str,
}

#[derive(Debug, Serialize)]
pub(crate) struct SubmitRequest<'a> {
    pub code: &'a str,
    pub language: Language,
}

#[derive(Debug, Serialize)]
pub(crate) struct RunRequest<'a> {
    pub code: &'a str,
    pub language: Language,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input_data: Option<&'a str>,
}

/// Graded submission as returned by the submit endpoint.
#[derive(Debug, Deserialize)]
pub(crate) struct SubmissionResponse {
    #[serde(default)]
    pub passed_test_cases: usize,
    #[serde(default)]
    pub total_test_cases: usize,
    #[serde(default)]
    pub compilation_logs: Option<String>,
    #[serde(default)]
    pub execution_logs: Option<String>,
    #[serde(default)]
    pub test_results: Vec<Verdict>,
}

impl From<SubmissionResponse> for VerdictReport {
    fn from(response: SubmissionResponse) -> Self {
        let passed = response.test_results.iter().filter(|v| v.passed).count();
        if passed != response.passed_test_cases
            || response.test_results.len() != response.total_test_cases
        {
            tracing::debug!(
                reported_passed = response.passed_test_cases,
                reported_total = response.total_test_cases,
                passed,
                total = response.test_results.len(),
                "Submission counts disagree with test results"
            );
        }
        Self {
            verdicts: response.test_results,
            compilation_logs: response.compilation_logs,
            execution_logs: response.execution_logs,
        }
    }
}

/// Response of the health endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthStatus {
    /// Service status, `"healthy"` when up.
    pub status: String,
    /// Human-readable message.
    #[serde(default)]
    pub message: String,
}

impl HealthStatus {
    /// Returns `true` if the service reports itself healthy.
    #[must_use]
    pub fn is_healthy(&self) -> bool {
        self.status.eq_ignore_ascii_case("healthy")
    }
}

/// FastAPI-style error body.
#[derive(Debug, Deserialize)]
struct ErrorBody {
    detail: ErrorDetail,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ErrorDetail {
    Message(String),
    Items(Vec<DetailItem>),
}

#[derive(Debug, Deserialize)]
struct DetailItem {
    msg: String,
}

/// Extracts the `detail` message from an error body, if it has one.
pub(crate) fn extract_detail(body: &str) -> Option<String> {
    let parsed: ErrorBody = serde_json::from_str(body).ok()?;
    match parsed.detail {
        ErrorDetail::Message(message) => Some(message),
        ErrorDetail::Items(items) => {
            let messages: Vec<String> = items.into_iter().map(|item| item.msg).collect();
            (!messages.is_empty()).then(|| messages.join("; "))
        }
    }
}
