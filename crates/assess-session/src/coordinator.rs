//! Serializes run/test/submit requests and guards against stale results.
//!
//! At most one request is in flight per session. Each request gets a ticket
//! carrying a sequence number and the coordinator's epoch; a completion is
//! accepted only if its ticket is still the outstanding one. Invalidating the
//! coordinator bumps the epoch, so anything issued earlier is dropped when it
//! eventually resolves.

use std::sync::{Arc, OnceLock};

use futures::future::join_all;
use regex::Regex;

use crate::backend::AssessmentBackend;
use crate::catalog::QuestionCatalog;
use crate::error::{BackendError, Rejection};
use crate::model::{AssessmentId, Language, Question, QuestionId, TestCaseId};
use crate::outcome::{ExecutionMode, ExecutionOutcome, OutcomeBody, RawOutput, Verdict, VerdictReport};

/// Identifies one issued request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestTicket {
    question_id: QuestionId,
    sequence: u64,
    epoch: u64,
    mode: ExecutionMode,
}

impl RequestTicket {
    /// Question the request was issued for.
    #[must_use]
    pub const fn question_id(&self) -> &QuestionId {
        &self.question_id
    }

    /// Mode the request runs in.
    #[must_use]
    pub const fn mode(&self) -> ExecutionMode {
        self.mode
    }
}

/// Everything needed to execute one request.
#[derive(Debug, Clone)]
pub struct ExecutionRequest {
    /// The question, including its test cases.
    pub question: Question,
    /// Source code to execute.
    pub code: String,
    /// Language of `code`.
    pub language: Language,
    /// Custom stdin for Test mode.
    pub stdin: Option<String>,
    /// What to do.
    pub mode: ExecutionMode,
}

/// A resolved request, waiting to be checked against the current ticket.
#[derive(Debug, Clone)]
pub struct Completion {
    ticket: RequestTicket,
    body: OutcomeBody,
}

impl Completion {
    /// The ticket of the request this answers.
    #[must_use]
    pub const fn ticket(&self) -> &RequestTicket {
        &self.ticket
    }
}

/// A request that has been admitted but not yet executed.
pub struct PendingRequest {
    ticket: RequestTicket,
    request: ExecutionRequest,
    backend: Arc<dyn AssessmentBackend>,
    assessment_id: AssessmentId,
    candidate_id: String,
}

impl std::fmt::Debug for PendingRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PendingRequest")
            .field("ticket", &self.ticket)
            .finish_non_exhaustive()
    }
}

impl PendingRequest {
    /// The ticket of this request.
    #[must_use]
    pub const fn ticket(&self) -> &RequestTicket {
        &self.ticket
    }

    /// Calls the collaborator and packages the result.
    ///
    /// Never fails: collaborator errors become `OutcomeBody::Failed`.
    pub async fn execute(self) -> Completion {
        let Self {
            ticket,
            request,
            backend,
            assessment_id,
            candidate_id,
        } = self;

        tracing::debug!(
            question_id = %ticket.question_id,
            sequence = ticket.sequence,
            mode = %ticket.mode,
            language = %request.language,
            "Executing request"
        );

        let result = match request.mode {
            ExecutionMode::Test => backend
                .execute(&request.code, request.language, request.stdin.as_deref())
                .await
                .map(OutcomeBody::Raw),
            ExecutionMode::Run => run_samples(backend.as_ref(), &request)
                .await
                .map(OutcomeBody::Verdicts),
            ExecutionMode::Submit => backend
                .submit(
                    &assessment_id,
                    &request.question.id,
                    &candidate_id,
                    &request.code,
                    request.language,
                )
                .await
                .map(OutcomeBody::Verdicts),
        };

        let body = result.unwrap_or_else(|e| {
            tracing::warn!(
                question_id = %ticket.question_id,
                mode = %ticket.mode,
                error = %e,
                "Execution request failed"
            );
            OutcomeBody::Failed(e)
        });

        Completion { ticket, body }
    }
}

/// Executes the code once per sample case and compares outputs.
///
/// Hidden cases are never sent. Cases run concurrently; verdicts keep
/// definition order.
async fn run_samples(
    backend: &dyn AssessmentBackend,
    request: &ExecutionRequest,
) -> Result<VerdictReport, BackendError> {
    let samples = QuestionCatalog::sample_cases(&request.question);
    let runs = samples
        .iter()
        .map(|case| backend.execute(&request.code, request.language, Some(case.input_data.as_str())));
    let outputs = join_all(runs).await;

    let mut verdicts = Vec::with_capacity(samples.len());
    let mut compilation_logs = None;
    for (case, output) in samples.into_iter().zip(outputs) {
        let output = output?;
        let passed =
            output.success && normalize_output(&output.stdout) == normalize_output(&case.expected_output);
        if compilation_logs.is_none() && !output.success && !output.stderr.is_empty() {
            compilation_logs = Some(output.stderr.clone());
        }
        verdicts.push(sample_verdict(case.id.clone(), &case.expected_output, output, passed));
    }

    Ok(VerdictReport {
        verdicts,
        compilation_logs,
        execution_logs: None,
    })
}

fn sample_verdict(
    test_case_id: TestCaseId,
    expected: &str,
    output: RawOutput,
    passed: bool,
) -> Verdict {
    let error = output.error.or_else(|| {
        (!output.success && !output.stderr.is_empty()).then_some(output.stderr)
    });
    Verdict {
        test_case_id,
        is_sample: true,
        passed,
        actual_output: Some(output.stdout),
        expected_output: Some(expected.to_string()),
        error,
        execution_time_ms: output.execution_time_ms,
    }
}

/// Strips trailing whitespace from every line and trailing newlines.
///
/// # Examples
///
/// ```
/// use assess_session::coordinator::normalize_output;
///
/// assert_eq!(normalize_output("1 2  \n3\t\n\n"), "1 2\n3");
/// assert_eq!(normalize_output("a\r\nb\r\n"), "a\nb");
/// ```
#[must_use]
pub fn normalize_output(output: &str) -> String {
    static TRAILING_WS: OnceLock<Result<Regex, regex::Error>> = OnceLock::new();

    let stripped = match TRAILING_WS.get_or_init(|| Regex::new(r"(?m)[ \t\r]+$")) {
        Ok(re) => re.replace_all(output, "").into_owned(),
        Err(_) => output
            .lines()
            .map(str::trim_end)
            .collect::<Vec<_>>()
            .join("\n"),
    };
    stripped.trim_end_matches('\n').to_string()
}

// ============================================================================
// SubmissionCoordinator
// ============================================================================

/// Admits requests one at a time and validates their completions.
pub struct SubmissionCoordinator {
    backend: Arc<dyn AssessmentBackend>,
    assessment_id: AssessmentId,
    candidate_id: String,
    next_sequence: u64,
    epoch: u64,
    in_flight: Option<RequestTicket>,
}

impl std::fmt::Debug for SubmissionCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubmissionCoordinator")
            .field("assessment_id", &self.assessment_id)
            .field("next_sequence", &self.next_sequence)
            .field("epoch", &self.epoch)
            .field("in_flight", &self.in_flight)
            .finish_non_exhaustive()
    }
}

impl SubmissionCoordinator {
    /// Creates a coordinator for one assessment and candidate.
    #[must_use]
    pub fn new(
        backend: Arc<dyn AssessmentBackend>,
        assessment_id: AssessmentId,
        candidate_id: impl Into<String>,
    ) -> Self {
        Self {
            backend,
            assessment_id,
            candidate_id: candidate_id.into(),
            next_sequence: 1,
            epoch: 0,
            in_flight: None,
        }
    }

    /// Returns `true` while a request is outstanding.
    #[must_use]
    pub const fn is_busy(&self) -> bool {
        self.in_flight.is_some()
    }

    /// Returns the outstanding request's ticket.
    #[must_use]
    pub const fn in_flight(&self) -> Option<&RequestTicket> {
        self.in_flight.as_ref()
    }

    /// Admits a request.
    ///
    /// A Submit supersedes an outstanding Run or Test, whose result will then
    /// be dropped. Any other request while one is outstanding is rejected.
    ///
    /// # Errors
    ///
    /// Returns `Rejection::Busy` if the request cannot be admitted.
    pub fn begin(&mut self, request: ExecutionRequest) -> Result<PendingRequest, Rejection> {
        if let Some(current) = &self.in_flight {
            if request.mode != ExecutionMode::Submit || current.mode == ExecutionMode::Submit {
                tracing::debug!(
                    in_flight = %current.mode,
                    requested = %request.mode,
                    "Rejecting request while busy"
                );
                return Err(Rejection::Busy);
            }
            tracing::debug!(
                superseded = current.sequence,
                question_id = %current.question_id,
                "Submit supersedes outstanding request"
            );
        }

        let ticket = RequestTicket {
            question_id: request.question.id.clone(),
            sequence: self.next_sequence,
            epoch: self.epoch,
            mode: request.mode,
        };
        self.next_sequence += 1;
        self.in_flight = Some(ticket.clone());

        Ok(PendingRequest {
            ticket,
            request,
            backend: Arc::clone(&self.backend),
            assessment_id: self.assessment_id.clone(),
            candidate_id: self.candidate_id.clone(),
        })
    }

    /// Accepts a completion if it answers the outstanding request.
    ///
    /// Returns `None` for stale completions.
    pub fn complete(&mut self, completion: Completion) -> Option<ExecutionOutcome> {
        let Completion { ticket, body } = completion;
        if self.in_flight.as_ref() != Some(&ticket) {
            tracing::debug!(
                sequence = ticket.sequence,
                epoch = ticket.epoch,
                current_epoch = self.epoch,
                "Dropping stale result"
            );
            return None;
        }
        self.in_flight = None;

        Some(ExecutionOutcome {
            question_id: ticket.question_id,
            request_id: ticket.sequence,
            mode: ticket.mode,
            body,
        })
    }

    /// Marks every issued request as stale.
    ///
    /// Returns `true` if a request was outstanding.
    pub fn invalidate(&mut self) -> bool {
        self.epoch += 1;
        let was_busy = self.in_flight.take().is_some();
        if was_busy {
            tracing::debug!(epoch = self.epoch, "Invalidated outstanding request");
        }
        was_busy
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::*;
    use crate::testing::{sample_question, ScriptedBackend};

    fn coordinator(backend: &Arc<ScriptedBackend>) -> SubmissionCoordinator {
        SubmissionCoordinator::new(backend.clone(), "1".into(), "cand")
    }

    fn request(mode: ExecutionMode) -> ExecutionRequest {
        ExecutionRequest {
            question: sample_question("q1"),
            code: "print(input())".to_string(),
            language: Language::Python,
            stdin: None,
            mode,
        }
    }

    // ------------------------------------------------------------------------
    // Output normalization
    // ------------------------------------------------------------------------

    #[test]
    fn test_normalize_output() {
        assert_eq!(normalize_output("3"), "3");
        assert_eq!(normalize_output("3\n"), "3");
        assert_eq!(normalize_output("1 2 \n3  \n\n\n"), "1 2\n3");
        assert_eq!(normalize_output("  lead"), "  lead");
        assert_ne!(normalize_output("1\n\n2"), normalize_output("1\n2"));
    }

    // ------------------------------------------------------------------------
    // Admission
    // ------------------------------------------------------------------------

    #[test]
    fn test_busy_while_in_flight() {
        let backend = Arc::new(ScriptedBackend::new());
        let mut coord = coordinator(&backend);

        let _pending = coord.begin(request(ExecutionMode::Run)).unwrap();
        assert!(coord.is_busy());
        assert_eq!(
            coord.begin(request(ExecutionMode::Test)).unwrap_err(),
            Rejection::Busy
        );
        assert_eq!(
            coord.begin(request(ExecutionMode::Run)).unwrap_err(),
            Rejection::Busy
        );
    }

    #[test]
    fn test_submit_supersedes_run_but_not_submit() {
        let backend = Arc::new(ScriptedBackend::new());
        let mut coord = coordinator(&backend);

        let run = coord.begin(request(ExecutionMode::Run)).unwrap();
        let submit = coord.begin(request(ExecutionMode::Submit)).unwrap();
        assert_eq!(coord.in_flight(), Some(submit.ticket()));
        assert_ne!(run.ticket(), submit.ticket());

        assert_eq!(
            coord.begin(request(ExecutionMode::Submit)).unwrap_err(),
            Rejection::Busy
        );
    }

    // ------------------------------------------------------------------------
    // Staleness
    // ------------------------------------------------------------------------

    #[tokio::test]
    async fn test_superseded_completion_dropped() {
        let backend = Arc::new(ScriptedBackend::new());
        let mut coord = coordinator(&backend);

        let run = coord.begin(request(ExecutionMode::Run)).unwrap();
        let submit = coord.begin(request(ExecutionMode::Submit)).unwrap();

        let run_done = run.execute().await;
        assert!(coord.complete(run_done).is_none());
        assert!(coord.is_busy());

        let submit_done = submit.execute().await;
        let outcome = coord.complete(submit_done).unwrap();
        assert_eq!(outcome.mode, ExecutionMode::Submit);
        assert_eq!(outcome.request_id, 2);
        assert!(!coord.is_busy());
    }

    #[tokio::test]
    async fn test_invalidate_drops_outstanding() {
        let backend = Arc::new(ScriptedBackend::new());
        let mut coord = coordinator(&backend);

        let pending = coord.begin(request(ExecutionMode::Test)).unwrap();
        assert!(coord.invalidate());
        assert!(!coord.invalidate());

        let done = pending.execute().await;
        assert!(coord.complete(done).is_none());
        assert!(!coord.is_busy());
    }

    #[tokio::test]
    async fn test_completion_accepted_only_once() {
        let backend = Arc::new(ScriptedBackend::new());
        let mut coord = coordinator(&backend);

        let done = coord
            .begin(request(ExecutionMode::Test))
            .unwrap()
            .execute()
            .await;
        assert!(coord.complete(done.clone()).is_some());
        assert!(coord.complete(done).is_none());
    }

    // ------------------------------------------------------------------------
    // Execution modes
    // ------------------------------------------------------------------------

    #[tokio::test]
    async fn test_run_sends_only_sample_cases() {
        let backend = Arc::new(ScriptedBackend::new());
        let mut coord = coordinator(&backend);

        let done = coord
            .begin(request(ExecutionMode::Run))
            .unwrap()
            .execute()
            .await;
        let outcome = coord.complete(done).unwrap();

        let OutcomeBody::Verdicts(report) = &outcome.body else {
            panic!("expected verdicts, got {:?}", outcome.body);
        };
        let ids: Vec<&str> = report.verdicts.iter().map(|v| v.test_case_id.as_str()).collect();
        assert_eq!(ids, vec!["q1-s1", "q1-s2"]);
        assert!(report.verdicts.iter().all(|v| v.is_sample));

        let stdins = backend.executed_stdins();
        assert_eq!(stdins.len(), 2);
        assert!(stdins.iter().all(|s| s.as_deref().is_some_and(|s| s.starts_with("sample"))));
    }

    #[tokio::test]
    async fn test_run_compares_normalized_output() {
        let backend = Arc::new(ScriptedBackend::new().with_execute(|_, stdin| {
            Ok(RawOutput {
                success: true,
                // Echo with trailing noise; the second sample expects something else.
                stdout: format!("{}  \n\n", stdin.unwrap_or_default()),
                ..RawOutput::default()
            })
        }));
        let mut coord = coordinator(&backend);
        let mut req = request(ExecutionMode::Run);
        req.question.test_cases[1].expected_output = "different".to_string();

        let done = coord.begin(req).unwrap().execute().await;
        let outcome = coord.complete(done).unwrap();
        let summary = outcome.summary().unwrap();

        assert_eq!(summary.sample_passed, 1);
        assert_eq!(summary.sample_total, 2);
        assert_eq!(summary.hidden_total, 0);
    }

    #[tokio::test]
    async fn test_test_mode_returns_raw_output() {
        let backend = Arc::new(ScriptedBackend::new());
        let mut coord = coordinator(&backend);
        let mut req = request(ExecutionMode::Test);
        req.stdin = Some("42".to_string());

        let done = coord.begin(req).unwrap().execute().await;
        let outcome = coord.complete(done).unwrap();

        let OutcomeBody::Raw(raw) = &outcome.body else {
            panic!("expected raw output, got {:?}", outcome.body);
        };
        assert_eq!(raw.stdout, "42");
        assert_eq!(backend.executed_stdins(), vec![Some("42".to_string())]);
    }

    #[tokio::test]
    async fn test_collaborator_failure_becomes_failed_outcome() {
        let backend = Arc::new(
            ScriptedBackend::new().with_execute(|_, _| Err(BackendError::network("connection refused"))),
        );
        let mut coord = coordinator(&backend);

        let done = coord
            .begin(request(ExecutionMode::Run))
            .unwrap()
            .execute()
            .await;
        let outcome = coord.complete(done).unwrap();

        assert_eq!(
            outcome.body,
            OutcomeBody::Failed(BackendError::network("connection refused"))
        );
    }
}
