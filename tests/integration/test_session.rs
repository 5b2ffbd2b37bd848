//! End-to-end session tests
//!
//! These tests drive a `SessionController` through the HTTP backend against
//! an in-process stub of the assessment service, from load through report
//! generation.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use assess_client::HttpBackend;
use assess_report::{
    MarkdownGenerator, QuestionReport, Report, ReportStatus, SubmissionCounts, SubmissionEntry,
};
use assess_session::{
    AssessmentId, AssessmentStatus, BackendErrorKind, CandidateAction, Config, Environment,
    ExecutionMode, Language, OutcomeBody, OutcomeResultView, Rejection, SessionController,
    SessionError, SessionInbox, SystemClock, TimerEngine, VerdictRow,
};
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{Duration as ChronoDuration, Utc};
use serde_json::{json, Value};

// ============================================================================
// Stub assessment service
// ============================================================================

/// Mutable state of the stub service.
#[derive(Debug)]
struct Service {
    status: &'static str,
    submissions: Vec<Value>,
    executions: Vec<Value>,
    fail_submit: bool,
}

type Shared = Arc<Mutex<Service>>;

fn service(status: &'static str) -> Shared {
    Arc::new(Mutex::new(Service {
        status,
        submissions: Vec::new(),
        executions: Vec::new(),
        fail_submit: false,
    }))
}

fn assessment_body(id: &str, status: &str) -> Value {
    let now = Utc::now();
    let mut body = json!({
        "id": id.parse::<u64>().unwrap_or(0),
        "title": "Backend Screen",
        "description": "Two warm-up problems",
        "duration_minutes": 60,
        "candidate_id": "cand-7",
        "status": status,
    });
    match status {
        "in_progress" => {
            body["started_at"] = json!(now);
            body["expires_at"] = json!(now + ChronoDuration::minutes(60));
        }
        "expired" => {
            body["started_at"] = json!(now - ChronoDuration::minutes(90));
            body["expires_at"] = json!(now - ChronoDuration::minutes(30));
        }
        _ => {}
    }
    body
}

fn questions_body() -> Value {
    json!([
        {
            "id": 11,
            "title": "Echo",
            "description": "Print the input unchanged.",
            "difficulty": "easy",
            "allowed_languages": ["python", "javascript"],
            "order": 1,
            "test_cases": [
                {"id": 101, "input_data": "1 2", "expected_output": "1 2", "is_sample": true, "order": 1},
                {"id": 102, "input_data": "abc", "expected_output": "abc\n", "is_sample": true, "order": 2},
                {"id": 103, "input_data": "secret", "expected_output": "secret", "is_sample": false, "order": 3}
            ]
        },
        {
            "id": 12,
            "title": "Reverse",
            "description": "Print the input reversed.",
            "difficulty": "medium",
            "order": 2,
            "test_cases": []
        }
    ])
}

/// Programs containing "echo" print their stdin; anything else prints "wrong".
fn run_program(code: &str, input: &str) -> String {
    if code.contains("echo") {
        format!("{input}\n")
    } else {
        "wrong\n".to_string()
    }
}

fn router(shared: Shared) -> Router {
    Router::new()
        .route(
            "/api/v1/assessments/:id",
            get(
                |State(shared): State<Shared>, Path(id): Path<String>| async move {
                    if id != "7" {
                        return Err((
                            StatusCode::NOT_FOUND,
                            Json(json!({"detail": "Assessment not found"})),
                        ));
                    }
                    let status = shared.lock().unwrap().status;
                    Ok(Json(assessment_body(&id, status)))
                },
            ),
        )
        .route(
            "/api/v1/assessments/:id/start",
            post(
                |State(shared): State<Shared>, Path(id): Path<String>| async move {
                    shared.lock().unwrap().status = "in_progress";
                    Json(assessment_body(&id, "in_progress"))
                },
            ),
        )
        .route(
            "/api/v1/assessments/:id/questions",
            get(|| async { Json(questions_body()) }),
        )
        .route(
            "/api/v1/assessments/:id/questions/:qid/submit",
            post(
                |State(shared): State<Shared>,
                 Path((_, qid)): Path<(String, String)>,
                 Json(body): Json<Value>| async move {
                    let mut service = shared.lock().unwrap();
                    if service.fail_submit {
                        return Err((
                            StatusCode::INTERNAL_SERVER_ERROR,
                            Json(json!({"detail": "grader crashed"})),
                        ));
                    }
                    let code = body["code"].as_str().unwrap_or_default().to_string();
                    service.submissions.push(json!({"question": qid, "body": body}));

                    let cases = [(101, "1 2", true), (102, "abc", true), (103, "secret", false)];
                    let results: Vec<Value> = cases
                        .iter()
                        .map(|(id, input, sample)| {
                            let actual = run_program(&code, input);
                            json!({
                                "test_case_id": id,
                                "is_sample": sample,
                                "passed": actual.trim_end() == *input,
                                "actual_output": actual,
                                "execution_time_ms": 3
                            })
                        })
                        .collect();
                    let passed = results.iter().filter(|r| r["passed"] == true).count();
                    Ok(Json(json!({
                        "id": 900,
                        "status": "completed",
                        "passed_test_cases": passed,
                        "total_test_cases": results.len(),
                        "test_results": results
                    })))
                },
            ),
        )
        .route(
            "/api/v1/execute/run",
            post(
                |State(shared): State<Shared>, Json(body): Json<Value>| async move {
                    let code = body["code"].as_str().unwrap_or_default();
                    let input = body["input_data"].as_str().unwrap_or_default();
                    let stdout = run_program(code, input);
                    shared.lock().unwrap().executions.push(body.clone());
                    Json(json!({
                        "success": true,
                        "stdout": stdout,
                        "stderr": "",
                        "execution_time_ms": 5,
                        "return_code": 0
                    }))
                },
            ),
        )
        .with_state(shared)
}

async fn serve(router: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.ok();
    });
    format!("http://{addr}")
}

fn config(base: &str) -> Config {
    Config {
        api_base_url: Some(base.to_string()),
        candidate_id: "cand-7".to_string(),
        request_timeout_seconds: 5,
        ..Config::default()
    }
}

async fn open(config: &Config, id: &str) -> Result<(SessionController, SessionInbox), SessionError> {
    let backend = HttpBackend::from_config(config).unwrap();
    let timer = TimerEngine::new(Arc::new(SystemClock), Duration::from_secs(1));
    SessionController::load(config, Arc::new(backend), AssessmentId::new(id), &timer).await
}

// ============================================================================
// Tests
// ============================================================================

#[tokio::test]
async fn test_full_session_over_http() {
    let shared = service("not_started");
    let base = serve(router(shared.clone())).await;
    let config = config(&base);

    let (mut session, mut inbox) = open(&config, "7").await.expect("session should load");

    // Starting happened during load.
    assert_eq!(session.status(), AssessmentStatus::InProgress);
    assert_eq!(session.catalog().len(), 2);
    let view = session.view();
    assert_eq!(view.question.title, "Echo");
    assert_eq!(view.question.samples.len(), 2);
    assert_eq!(view.question.hidden_count, 1);
    assert_eq!(view.language, Language::Python);
    assert!(view.timer.remaining_secs.unwrap() > 3500);

    // A wrong program fails the samples on Run.
    session
        .dispatch(CandidateAction::Edit("print('nope')".to_string()))
        .unwrap();
    session
        .dispatch(CandidateAction::Execute(ExecutionMode::Run))
        .unwrap();
    session.settle(&mut inbox).await;
    let summary = session.outcome().and_then(|o| o.summary()).unwrap();
    assert_eq!((summary.sample_passed, summary.sample_total), (0, 2));

    // Fix it: Run now passes, including the trailing-newline sample.
    session
        .dispatch(CandidateAction::Edit("echo = input()\nprint(echo)".to_string()))
        .unwrap();
    session
        .dispatch(CandidateAction::Execute(ExecutionMode::Run))
        .unwrap();
    session.settle(&mut inbox).await;
    let summary = session.outcome().and_then(|o| o.summary()).unwrap();
    assert_eq!((summary.sample_passed, summary.sample_total), (2, 2));
    assert_eq!(summary.hidden_total, 0);

    // Test mode sends the custom input and shows raw output.
    session
        .dispatch(CandidateAction::SetCustomInput(Some("hello".to_string())))
        .unwrap();
    session
        .dispatch(CandidateAction::Execute(ExecutionMode::Test))
        .unwrap();
    session.settle(&mut inbox).await;
    match &session.outcome().unwrap().body {
        OutcomeBody::Raw(raw) => assert_eq!(raw.stdout, "hello\n"),
        other => panic!("expected raw output, got {other:?}"),
    }

    // Submit grades hidden cases too; the view hides their payloads.
    session
        .dispatch(CandidateAction::Execute(ExecutionMode::Submit))
        .unwrap();
    session.settle(&mut inbox).await;
    let view = session.view();
    let Some(OutcomeResultView::Verdicts { summary, rows, .. }) =
        view.outcome.as_ref().map(|o| &o.result)
    else {
        panic!("expected verdicts, got {:?}", view.outcome);
    };
    assert_eq!(summary.passed(), 3);
    assert!(rows
        .iter()
        .any(|row| matches!(row, VerdictRow::Hidden { ordinal: 1, passed: true })));
    assert_eq!(session.history().len(), 1);
    assert_eq!(session.history()[0].language, Language::Python);

    {
        let service = shared.lock().unwrap();
        assert_eq!(service.submissions.len(), 1);
        assert_eq!(service.submissions[0]["question"], "11");
        assert_eq!(service.submissions[0]["body"]["language"], "python");
        // Two samples per Run, twice, plus one Test.
        assert_eq!(service.executions.len(), 5);
        assert_eq!(service.executions[4]["input_data"], "hello");
    }

    // The second question keeps its own buffer.
    session.dispatch(CandidateAction::SelectQuestion(1)).unwrap();
    assert_eq!(session.view().code, Language::Python.scaffold());
    assert!(session.view().outcome.is_none());
    session.dispatch(CandidateAction::SelectQuestion(0)).unwrap();
    assert!(session.view().code.contains("echo"));

    session.dispatch(CandidateAction::Finish).unwrap();
    assert_eq!(session.status(), AssessmentStatus::Submitted);
    assert_eq!(
        session.dispatch(CandidateAction::Edit("late".to_string())),
        Err(Rejection::Submitted)
    );
    assert!(session.ended_at().is_some());

    // Report from the finished session.
    let mut builder = Report::builder()
        .assessment(session.assessment().id.as_str(), &session.assessment().title)
        .candidate(&config.candidate_id)
        .status(ReportStatus::Submitted)
        .window(session.started_at(), session.ended_at().unwrap());
    for (i, question) in session.catalog().iter().enumerate() {
        builder = builder.question(QuestionReport::new(
            i + 1,
            question.id.as_str(),
            &question.title,
            question.difficulty.as_str(),
        ));
    }
    for record in session.history() {
        builder = builder.submission(SubmissionEntry {
            question_id: record.question_id.as_str().to_string(),
            language: record.language.as_str().to_string(),
            counts: SubmissionCounts::new(
                record.summary.sample_passed,
                record.summary.sample_total,
                record.summary.hidden_passed,
                record.summary.hidden_total,
            ),
            submitted_at: record.submitted_at,
        });
    }
    let report = builder.build().unwrap();

    assert_eq!(report.summary.questions_attempted, 1);
    assert_eq!(report.summary.questions_solved, 1);
    let markdown = MarkdownGenerator::new(&report).generate();
    assert!(markdown.contains("| 1 | Echo | easy | python | 1 | 2/2 | 1/1 | &#9989; |"));
    assert!(markdown.contains("| 2 | Reverse | medium | - | 0 | - | - | *Not attempted* |"));
}

#[tokio::test]
async fn test_expired_assessment_is_read_only() {
    let base = serve(router(service("expired"))).await;

    let (mut session, _inbox) = open(&config(&base), "7").await.unwrap();

    assert_eq!(session.status(), AssessmentStatus::Expired);
    let view = session.view();
    assert_eq!(view.timer.remaining_secs, Some(0));
    assert!(!view.editable);
    assert_eq!(
        session.dispatch(CandidateAction::Execute(ExecutionMode::Run)),
        Err(Rejection::Expired)
    );
    assert_eq!(
        session.dispatch(CandidateAction::Edit("x".to_string())),
        Err(Rejection::Expired)
    );
}

#[tokio::test]
async fn test_unknown_assessment_fails_load() {
    let base = serve(router(service("in_progress"))).await;

    let err = open(&config(&base), "404").await.unwrap_err();

    match err {
        SessionError::LoadFailure { stage, source, .. } => {
            assert_eq!(stage, "load");
            assert_eq!(source.kind, BackendErrorKind::NotFound);
            assert_eq!(source.detail, "Assessment not found");
        }
        other => panic!("expected load failure, got {other:?}"),
    }
}

#[tokio::test]
async fn test_submit_failure_is_an_outcome() {
    let shared = service("in_progress");
    shared.lock().unwrap().fail_submit = true;
    let base = serve(router(shared)).await;

    let (mut session, mut inbox) = open(&config(&base), "7").await.unwrap();
    session
        .dispatch(CandidateAction::Edit("echo".to_string()))
        .unwrap();
    session
        .dispatch(CandidateAction::Execute(ExecutionMode::Submit))
        .unwrap();
    session.settle(&mut inbox).await;

    let outcome = session.outcome().unwrap();
    assert!(outcome.is_failure());
    assert_eq!(session.last_error(), Some("grader crashed"));
    assert_eq!(session.status(), AssessmentStatus::InProgress);
    assert!(session.history().is_empty());

    // The session stays usable.
    assert!(session.is_active());
    assert!(!session.is_busy());
}

#[tokio::test]
async fn test_demo_fallback_when_service_unreachable() {
    let mut config = config("http://127.0.0.1:1");
    config.environment = Environment::Development;
    config.demo_fallback = true;
    config.request_timeout_seconds = 2;

    let (session, _inbox) = open(&config, "7").await.unwrap();

    assert!(session.is_demo());
    assert_eq!(session.status(), AssessmentStatus::InProgress);
    assert!(!session.catalog().is_empty());
}

#[tokio::test]
async fn test_no_demo_fallback_in_production() {
    let mut config = config("http://127.0.0.1:1");
    config.environment = Environment::Production;
    config.demo_fallback = true;
    config.request_timeout_seconds = 2;

    let err = open(&config, "7").await.unwrap_err();

    assert!(matches!(
        err,
        SessionError::LoadFailure { ref source, .. } if source.kind == BackendErrorKind::Network
    ));
}
