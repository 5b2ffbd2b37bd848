//! HTTP backend tests against a stub assessment service.

use std::time::Duration;

use assess_client::{ClientError, HttpBackend};
use assess_session::{
    AssessmentBackend, AssessmentStatus, BackendErrorKind, Config, Language,
};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::json;

async fn serve(router: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.ok();
    });
    format!("http://{addr}")
}

fn backend(base: &str, timeout: Duration) -> HttpBackend {
    HttpBackend::new(base, "/api/v1", timeout).unwrap()
}

#[tokio::test]
async fn test_from_config_uses_prefix() {
    let router = Router::new().route(
        "/v2/health",
        get(|| async { Json(json!({"status": "healthy", "message": "ok"})) }),
    );
    let base = serve(router).await;
    let config = Config {
        api_base_url: Some(format!("{base}/")),
        api_prefix: "/v2".to_string(),
        ..Config::default()
    };

    let client = HttpBackend::from_config(&config).unwrap();
    assert_eq!(client.api_root(), format!("{base}/v2"));

    let health = client.health().await.unwrap();
    assert!(health.is_healthy());
    assert_eq!(health.message, "ok");
}

#[tokio::test]
async fn test_health_degraded_and_missing() {
    let router = Router::new().route(
        "/api/v1/health",
        get(|| async { Json(json!({"status": "degraded"})) }),
    );
    let base = serve(router).await;

    let health = backend(&base, Duration::from_secs(5)).health().await.unwrap();
    assert!(!health.is_healthy());

    let base = serve(Router::new()).await;
    let err = backend(&base, Duration::from_secs(5))
        .health()
        .await
        .unwrap_err();
    assert!(matches!(err, ClientError::Backend(_)));
    assert_eq!(err.backend_kind(), Some(BackendErrorKind::NotFound));
}

#[tokio::test]
async fn test_start_conflict_is_validation() {
    let router = Router::new().route(
        "/api/v1/assessments/:id/start",
        post(|| async {
            (
                StatusCode::BAD_REQUEST,
                Json(json!({"detail": "Assessment already started or completed"})),
            )
        }),
    );
    let base = serve(router).await;

    let err = backend(&base, Duration::from_secs(5))
        .start_assessment(&"3".into(), "cand")
        .await
        .unwrap_err();

    assert_eq!(err.kind, BackendErrorKind::Validation);
    assert_eq!(err.detail, "Assessment already started or completed");
}

#[tokio::test]
async fn test_start_returns_updated_assessment() {
    let router = Router::new().route(
        "/api/v1/assessments/:id/start",
        post(|| async {
            Json(json!({
                "id": 3,
                "title": "Screen",
                "duration_minutes": 45,
                "candidate_id": "cand",
                "status": "in_progress",
                "started_at": "2026-02-03T10:00:00Z",
                "expires_at": "2026-02-03T10:45:00Z"
            }))
        }),
    );
    let base = serve(router).await;

    let assessment = backend(&base, Duration::from_secs(5))
        .start_assessment(&"3".into(), "cand")
        .await
        .unwrap();

    assert_eq!(assessment.status, AssessmentStatus::InProgress);
    assert!(assessment.expires_at.is_some());
}

#[tokio::test]
async fn test_submit_parses_verdicts() {
    let router = Router::new().route(
        "/api/v1/assessments/:id/questions/:qid/submit",
        post(|| async {
            Json(json!({
                "id": 55,
                "status": "completed",
                "passed_test_cases": 2,
                "total_test_cases": 3,
                "compilation_logs": null,
                "test_results": [
                    {"test_case_id": 1, "is_sample": true, "passed": true, "actual_output": "3"},
                    {"test_case_id": 2, "is_sample": false, "passed": true},
                    {"test_case_id": 3, "is_sample": false, "passed": false, "error": "Time limit exceeded"}
                ]
            }))
        }),
    );
    let base = serve(router).await;

    let report = backend(&base, Duration::from_secs(5))
        .submit(&"1".into(), &"2".into(), "cand", "print(3)", Language::Python)
        .await
        .unwrap();

    let summary = report.summary();
    assert_eq!((summary.sample_passed, summary.sample_total), (1, 1));
    assert_eq!((summary.hidden_passed, summary.hidden_total), (1, 2));
    assert_eq!(
        report.verdicts[2].error.as_deref(),
        Some("Time limit exceeded")
    );
    assert!(report.compilation_logs.is_none());
}

#[tokio::test]
async fn test_timeout_is_network_error() {
    let router = Router::new().route(
        "/api/v1/execute/run",
        post(|| async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Json(json!({"success": true}))
        }),
    );
    let base = serve(router).await;

    let err = backend(&base, Duration::from_millis(200))
        .execute("print(1)", Language::Python, None)
        .await
        .unwrap_err();

    assert_eq!(err.kind, BackendErrorKind::Network);
    assert_eq!(err.detail, "request timed out");
    assert!(err.is_transient());
}

#[tokio::test]
async fn test_unexpected_body_is_network_error() {
    let router = Router::new().route(
        "/api/v1/assessments/:id/questions",
        get(|| async { "<html>maintenance</html>" }),
    );
    let base = serve(router).await;

    let err = backend(&base, Duration::from_secs(5))
        .load_questions(&"1".into(), "cand")
        .await
        .unwrap_err();

    assert_eq!(err.kind, BackendErrorKind::Network);
    assert!(err.detail.starts_with("unexpected response"));
}

#[tokio::test]
async fn test_server_error_without_detail() {
    let router = Router::new().route(
        "/api/v1/assessments/:id",
        get(|| async { StatusCode::SERVICE_UNAVAILABLE }),
    );
    let base = serve(router).await;

    let err = backend(&base, Duration::from_secs(5))
        .load_assessment(&"1".into(), "cand")
        .await
        .unwrap_err();

    assert_eq!(err.kind, BackendErrorKind::Server);
    assert_eq!(err.detail, "Service Unavailable");
}
