//! `AssessmentBackend` over the assessment service's HTTP API.

use std::time::Duration;

use assess_session::{
    AssessmentBackend, Assessment, AssessmentId, BackendError, BackendResult, Config, Language,
    Question, QuestionId, RawOutput, VerdictReport,
};
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;

use crate::error::ClientError;
use crate::wire::{
    extract_detail, HealthStatus, RunRequest, StartRequest, SubmissionResponse, SubmitRequest,
};

/// HTTP client for the assessment service.
#[derive(Debug, Clone)]
pub struct HttpBackend {
    client: Client,
    api_root: String,
}

impl HttpBackend {
    /// Creates a client rooted at `base_url` + `api_prefix`.
    ///
    /// # Errors
    ///
    /// Returns `ClientError::InvalidBaseUrl` if `base_url` is not an
    /// `http://` or `https://` URL, or `ClientError::Build` if the HTTP
    /// client cannot be constructed.
    pub fn new(base_url: &str, api_prefix: &str, timeout: Duration) -> Result<Self, ClientError> {
        let origin = base_url.trim().trim_end_matches('/');
        let scheme_ok = origin.starts_with("http://") || origin.starts_with("https://");
        if !scheme_ok || origin.contains(char::is_whitespace) {
            return Err(ClientError::invalid_base_url(
                base_url,
                "expected an http:// or https:// URL",
            ));
        }

        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            api_root: format!("{origin}{}", api_prefix.trim_end_matches('/')),
        })
    }

    /// Creates a client from session configuration.
    ///
    /// # Errors
    ///
    /// See [`HttpBackend::new`].
    pub fn from_config(config: &Config) -> Result<Self, ClientError> {
        if config.api_base_url.is_none() {
            tracing::warn!(
                base_url = config.base_url(),
                "apiBaseUrl not set, using the development default"
            );
        }
        Self::new(
            config.base_url(),
            &config.api_prefix,
            config.request_timeout(),
        )
    }

    /// The URL every endpoint path is appended to.
    #[must_use]
    pub fn api_root(&self) -> &str {
        &self.api_root
    }

    /// Probes the health endpoint.
    ///
    /// # Errors
    ///
    /// Returns `ClientError::Backend` if the service is unreachable or
    /// answers with an error status.
    pub async fn health(&self) -> Result<HealthStatus, ClientError> {
        let status = self.send(self.client.get(self.url("/health"))).await?;
        Ok(status)
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.api_root)
    }

    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> BackendResult<T> {
        let response = request.send().await.map_err(transport_error)?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let error = status_error(status, &body);
            tracing::warn!(%status, error = %error, "Backend returned an error status");
            return Err(error);
        }
        response.json::<T>().await.map_err(transport_error)
    }
}

/// Classifies a failure that produced no usable HTTP response.
fn transport_error(error: reqwest::Error) -> BackendError {
    let detail = if error.is_timeout() {
        "request timed out".to_string()
    } else if error.is_connect() {
        format!("could not connect to the assessment service: {error}")
    } else if error.is_decode() {
        format!("unexpected response from the assessment service: {error}")
    } else {
        error.to_string()
    };
    tracing::warn!(error = %error, "Backend request failed");
    BackendError::network(detail)
}

/// Classifies an error status, taking the message from the body's `detail`
/// when present.
pub(crate) fn status_error(status: StatusCode, body: &str) -> BackendError {
    let detail = extract_detail(body).unwrap_or_else(|| {
        status
            .canonical_reason()
            .map_or_else(|| status.to_string(), str::to_string)
    });

    match status {
        StatusCode::NOT_FOUND => BackendError::not_found(detail),
        s if s.is_server_error() => BackendError::server(detail),
        s if s.is_client_error() => BackendError::validation(detail),
        _ => BackendError::server(detail),
    }
}

#[async_trait::async_trait]
impl AssessmentBackend for HttpBackend {
    async fn load_assessment(
        &self,
        assessment_id: &AssessmentId,
        candidate_id: &str,
    ) -> BackendResult<Assessment> {
        tracing::debug!(%assessment_id, "Loading assessment");
        let request = self
            .client
            .get(self.url(&format!("/assessments/{assessment_id}")))
            .query(&[("candidate_id", candidate_id)]);
        self.send(request).await
    }

    async fn start_assessment(
        &self,
        assessment_id: &AssessmentId,
        candidate_id: &str,
    ) -> BackendResult<Assessment> {
        tracing::debug!(%assessment_id, "Starting assessment");
        let request = self
            .client
            .post(self.url(&format!("/assessments/{assessment_id}/start")))
            .json(&StartRequest { candidate_id });
        self.send(request).await
    }

    async fn load_questions(
        &self,
        assessment_id: &AssessmentId,
        candidate_id: &str,
    ) -> BackendResult<Vec<Question>> {
        tracing::debug!(%assessment_id, "Loading questions");
        let request = self
            .client
            .get(self.url(&format!("/assessments/{assessment_id}/questions")))
            .query(&[("candidate_id", candidate_id)]);
        let mut questions: Vec<Question> = self.send(request).await?;
        questions.sort_by_key(|q| q.order);
        for question in &mut questions {
            question.test_cases.sort_by_key(|tc| tc.order);
        }
        Ok(questions)
    }

    #[tracing::instrument(level = "debug", skip(self, code))]
    async fn submit(
        &self,
        assessment_id: &AssessmentId,
        question_id: &QuestionId,
        candidate_id: &str,
        code: &str,
        language: Language,
    ) -> BackendResult<VerdictReport> {
        tracing::debug!(%assessment_id, %question_id, %language, "Submitting solution");
        let request = self
            .client
            .post(self.url(&format!(
                "/assessments/{assessment_id}/questions/{question_id}/submit"
            )))
            .query(&[("candidate_id", candidate_id)])
            .json(&SubmitRequest { code, language });
        let response: SubmissionResponse = self.send(request).await?;
        Ok(response.into())
    }

    #[tracing::instrument(level = "debug", skip(self, code, stdin))]
    async fn execute(
        &self,
        code: &str,
        language: Language,
        stdin: Option<&str>,
    ) -> BackendResult<RawOutput> {
        tracing::debug!(%language, has_input = stdin.is_some(), "Executing code");
        let request = self.client.post(self.url("/execute/run")).json(&RunRequest {
            code,
            language,
            input_data: stdin,
        });
        self.send(request).await
    }
}
