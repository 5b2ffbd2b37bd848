//! Assessment Report Generation
//!
//! Types and generators for the end-of-session report. Reports can be
//! serialized to JSON for programmatic access or rendered to Markdown for
//! reviewers.
//!
//! # Types
//!
//! - [`Report`] - The complete report for one session
//! - [`ReportSummary`] - Final status, timing and attempt counts
//! - [`QuestionReport`] - Latest result per question
//! - [`SubmissionEntry`] - One applied Submit
//!
//! # Generators
//!
//! - [`json::JsonGenerator`] - Compact or pretty JSON
//! - [`MarkdownGenerator`] - Human-readable Markdown
//!
//! # Example
//!
//! ```rust
//! use assess_report::{QuestionReport, Report, ReportStatus, SubmissionCounts, SubmissionEntry};
//! use chrono::Utc;
//!
//! let now = Utc::now();
//! let report = Report::builder()
//!     .assessment("42", "Backend Screen")
//!     .candidate("cand-7")
//!     .status(ReportStatus::Submitted)
//!     .window(now, now)
//!     .question(QuestionReport::new(1, "q1", "Two Sum", "easy"))
//!     .submission(SubmissionEntry {
//!         question_id: "q1".to_string(),
//!         language: "python".to_string(),
//!         counts: SubmissionCounts::new(2, 2, 1, 1),
//!         submitted_at: now,
//!     })
//!     .build()
//!     .unwrap();
//!
//! assert_eq!(report.summary.questions_solved, 1);
//! ```

pub mod json;
mod markdown;

pub use markdown::MarkdownGenerator;

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// File name of the Markdown report.
pub const MARKDOWN_FILE_NAME: &str = "assess-report.md";

/// File name of the JSON report.
pub const JSON_FILE_NAME: &str = "assess-report.json";

// ============================================================================
// Error Types
// ============================================================================

/// Errors that can occur during report generation.
#[derive(Debug, Error)]
pub enum ReportError {
    /// Failed to serialize the report to JSON.
    #[error("failed to serialize report: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Failed to read or write report files.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid report data.
    #[error("invalid report data: {0}")]
    InvalidData(String),
}

/// Result type for report operations.
pub type Result<T> = std::result::Result<T, ReportError>;

// ============================================================================
// Report Status (local copy to avoid cross-crate dependency)
// ============================================================================

/// Final assessment status when the report was generated.
///
/// Mirrors the session's assessment status so this crate stays independent
/// of the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportStatus {
    /// The assessment was never started.
    NotStarted,
    /// The session closed while the assessment was still running.
    #[default]
    InProgress,
    /// The deadline passed.
    Expired,
    /// The candidate finished the assessment.
    Submitted,
}

impl ReportStatus {
    /// Returns a human-readable description of the status.
    #[must_use]
    pub const fn description(&self) -> &'static str {
        match self {
            Self::NotStarted => "Not started",
            Self::InProgress => "Closed before the deadline",
            Self::Expired => "Time expired",
            Self::Submitted => "Submitted",
        }
    }
}

impl std::fmt::Display for ReportStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.description())
    }
}

// ============================================================================
// Report
// ============================================================================

/// Complete end-of-session report.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Report {
    /// Assessment identifier.
    pub assessment_id: String,

    /// Assessment title.
    pub title: String,

    /// Candidate identifier.
    pub candidate_id: String,

    /// High-level summary.
    pub summary: ReportSummary,

    /// One entry per question, in assessment order.
    pub questions: Vec<QuestionReport>,

    /// Every applied Submit, oldest first.
    pub submissions: Vec<SubmissionEntry>,
}

impl Report {
    /// Creates a new report builder.
    #[must_use]
    pub fn builder() -> ReportBuilder {
        ReportBuilder::default()
    }

    /// Serializes the report to pretty JSON.
    ///
    /// # Errors
    ///
    /// Returns `ReportError::Serialization` if JSON serialization fails.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(ReportError::from)
    }

    /// Writes `assess-report.md` and `assess-report.json` into `dir`.
    ///
    /// # Errors
    ///
    /// Returns `ReportError::Io` if the directory cannot be created or a file
    /// cannot be written.
    pub fn write_to_dir(&self, dir: &Path) -> Result<ReportPaths> {
        std::fs::create_dir_all(dir)?;

        let markdown = dir.join(MARKDOWN_FILE_NAME);
        std::fs::write(&markdown, MarkdownGenerator::new(self).generate())?;

        let json = dir.join(JSON_FILE_NAME);
        json::JsonGenerator::new(self).write_to_file(&json, true)?;

        Ok(ReportPaths { markdown, json })
    }
}

/// Locations of written report files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportPaths {
    /// The Markdown report.
    pub markdown: PathBuf,
    /// The JSON report.
    pub json: PathBuf,
}

// ============================================================================
// ReportBuilder
// ============================================================================

/// Builder for constructing [`Report`] instances.
///
/// Question rows are aggregated from the recorded submissions at build time.
#[derive(Debug, Clone, Default)]
pub struct ReportBuilder {
    assessment_id: Option<String>,
    title: String,
    candidate_id: String,
    status: ReportStatus,
    window: Option<(DateTime<Utc>, DateTime<Utc>)>,
    demo: bool,
    questions: Vec<QuestionReport>,
    submissions: Vec<SubmissionEntry>,
}

impl ReportBuilder {
    /// Sets the assessment id and title.
    #[must_use]
    pub fn assessment(mut self, id: impl Into<String>, title: impl Into<String>) -> Self {
        self.assessment_id = Some(id.into());
        self.title = title.into();
        self
    }

    /// Sets the candidate id.
    #[must_use]
    pub fn candidate(mut self, candidate_id: impl Into<String>) -> Self {
        self.candidate_id = candidate_id.into();
        self
    }

    /// Sets the final status.
    #[must_use]
    pub const fn status(mut self, status: ReportStatus) -> Self {
        self.status = status;
        self
    }

    /// Sets when the session started and ended.
    #[must_use]
    pub const fn window(mut self, started_at: DateTime<Utc>, ended_at: DateTime<Utc>) -> Self {
        self.window = Some((started_at, ended_at));
        self
    }

    /// Marks the report as produced from the built-in demo assessment.
    #[must_use]
    pub const fn demo(mut self, demo: bool) -> Self {
        self.demo = demo;
        self
    }

    /// Adds a question row.
    #[must_use]
    pub fn question(mut self, question: QuestionReport) -> Self {
        self.questions.push(question);
        self
    }

    /// Adds a recorded submission.
    #[must_use]
    pub fn submission(mut self, entry: SubmissionEntry) -> Self {
        self.submissions.push(entry);
        self
    }

    /// Sets all recorded submissions at once.
    #[must_use]
    pub fn submissions(mut self, entries: Vec<SubmissionEntry>) -> Self {
        self.submissions = entries;
        self
    }

    /// Builds the report.
    ///
    /// # Errors
    ///
    /// Returns `ReportError::InvalidData` if the assessment or time window is
    /// missing, the window ends before it starts, or a submission names an
    /// unknown question.
    pub fn build(self) -> Result<Report> {
        let assessment_id = self
            .assessment_id
            .ok_or_else(|| ReportError::InvalidData("assessment is required".to_string()))?;
        let (started_at, ended_at) = self
            .window
            .ok_or_else(|| ReportError::InvalidData("session window is required".to_string()))?;
        if ended_at < started_at {
            return Err(ReportError::InvalidData(
                "session ended before it started".to_string(),
            ));
        }

        let mut questions = self.questions;
        for entry in &self.submissions {
            let row = questions
                .iter_mut()
                .find(|q| q.question_id == entry.question_id)
                .ok_or_else(|| {
                    ReportError::InvalidData(format!(
                        "submission for unknown question '{}'",
                        entry.question_id
                    ))
                })?;
            row.submissions += 1;
            row.latest = Some(entry.counts);
            row.language = Some(entry.language.clone());
        }

        let questions_attempted = questions.iter().filter(|q| q.submissions > 0).count();
        let questions_solved = questions.iter().filter(|q| q.is_solved()).count();
        let duration_seconds = u64::try_from((ended_at - started_at).num_seconds()).unwrap_or(0);

        Ok(Report {
            assessment_id,
            title: self.title,
            candidate_id: self.candidate_id,
            summary: ReportSummary {
                status: self.status,
                started_at,
                ended_at,
                duration_seconds,
                questions_total: questions.len(),
                questions_attempted,
                questions_solved,
                demo: self.demo,
            },
            questions,
            submissions: self.submissions,
        })
    }
}

// ============================================================================
// ReportSummary
// ============================================================================

/// High-level summary of the session.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportSummary {
    /// Final assessment status.
    pub status: ReportStatus,

    /// When the session opened.
    pub started_at: DateTime<Utc>,

    /// When the session ended.
    pub ended_at: DateTime<Utc>,

    /// Session length in seconds.
    pub duration_seconds: u64,

    /// Number of questions in the assessment.
    pub questions_total: usize,

    /// Questions with at least one submission.
    pub questions_attempted: usize,

    /// Questions whose latest submission passed every case.
    pub questions_solved: usize,

    /// Whether the session ran on the built-in demo assessment.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub demo: bool,
}

// ============================================================================
// Questions and submissions
// ============================================================================

/// Pass counts of one submission, split by visibility.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmissionCounts {
    /// Sample cases passed.
    pub sample_passed: usize,
    /// Sample cases evaluated.
    pub sample_total: usize,
    /// Hidden cases passed.
    pub hidden_passed: usize,
    /// Hidden cases evaluated.
    pub hidden_total: usize,
}

impl SubmissionCounts {
    /// Creates counts from sample and hidden pass/total pairs.
    #[must_use]
    pub const fn new(
        sample_passed: usize,
        sample_total: usize,
        hidden_passed: usize,
        hidden_total: usize,
    ) -> Self {
        Self {
            sample_passed,
            sample_total,
            hidden_passed,
            hidden_total,
        }
    }

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

    /// Returns `true` if at least one case ran and all of them passed.
    #[must_use]
    pub const fn all_passed(&self) -> bool {
        self.total() > 0 && self.passed() == self.total()
    }
}

/// Latest result for one question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionReport {
    /// One-based position in the assessment.
    pub number: usize,

    /// Question identifier.
    pub question_id: String,

    /// Question title.
    pub title: String,

    /// Difficulty label.
    pub difficulty: String,

    /// Number of applied submissions.
    pub submissions: usize,

    /// Language of the latest submission.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,

    /// Counts of the latest submission.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latest: Option<SubmissionCounts>,
}

impl QuestionReport {
    /// Creates a row for a question with no submissions yet.
    #[must_use]
    pub fn new(
        number: usize,
        question_id: impl Into<String>,
        title: impl Into<String>,
        difficulty: impl Into<String>,
    ) -> Self {
        Self {
            number,
            question_id: question_id.into(),
            title: title.into(),
            difficulty: difficulty.into(),
            submissions: 0,
            language: None,
            latest: None,
        }
    }

    /// Returns `true` if the latest submission passed every case.
    #[must_use]
    pub fn is_solved(&self) -> bool {
        self.latest.is_some_and(|c| c.all_passed())
    }
}

/// One applied Submit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmissionEntry {
    /// Question submitted.
    pub question_id: String,
    /// Language used.
    pub language: String,
    /// Pass counts.
    pub counts: SubmissionCounts,
    /// When the result was applied.
    pub submitted_at: DateTime<Utc>,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn at(minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 2, 3, 10, minute, 0).unwrap()
    }

    fn entry(question: &str, counts: SubmissionCounts, minute: u32) -> SubmissionEntry {
        SubmissionEntry {
            question_id: question.to_string(),
            language: "python".to_string(),
            counts,
            submitted_at: at(minute),
        }
    }

    fn builder() -> ReportBuilder {
        Report::builder()
            .assessment("42", "Backend Screen")
            .candidate("cand-7")
            .status(ReportStatus::Expired)
            .window(at(0), at(45))
            .question(QuestionReport::new(1, "q1", "Two Sum", "easy"))
            .question(QuestionReport::new(2, "q2", "LRU Cache", "hard"))
    }

    #[test]
    fn test_build_aggregates_latest_submission() {
        let report = builder()
            .submission(entry("q1", SubmissionCounts::new(2, 2, 0, 1), 10))
            .submission(entry("q1", SubmissionCounts::new(2, 2, 1, 1), 20))
            .build()
            .unwrap();

        let q1 = &report.questions[0];
        assert_eq!(q1.submissions, 2);
        assert_eq!(q1.latest, Some(SubmissionCounts::new(2, 2, 1, 1)));
        assert!(q1.is_solved());
        assert!(!report.questions[1].is_solved());

        assert_eq!(report.summary.duration_seconds, 45 * 60);
        assert_eq!(report.summary.questions_total, 2);
        assert_eq!(report.summary.questions_attempted, 1);
        assert_eq!(report.summary.questions_solved, 1);
        assert_eq!(report.submissions.len(), 2);
    }

    #[test]
    fn test_build_requires_assessment_and_window() {
        let err = Report::builder().window(at(0), at(1)).build().unwrap_err();
        assert!(err.to_string().contains("assessment is required"));

        let err = Report::builder().assessment("1", "t").build().unwrap_err();
        assert!(err.to_string().contains("session window is required"));

        let err = Report::builder()
            .assessment("1", "t")
            .window(at(5), at(1))
            .build()
            .unwrap_err();
        assert!(matches!(err, ReportError::InvalidData(_)));
    }

    #[test]
    fn test_build_rejects_unknown_question() {
        let err = builder()
            .submission(entry("q9", SubmissionCounts::default(), 1))
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("unknown question 'q9'"));
    }

    #[test]
    fn test_empty_counts_are_not_solved() {
        assert!(!SubmissionCounts::default().all_passed());
        assert!(SubmissionCounts::new(1, 1, 0, 0).all_passed());
    }

    #[test]
    fn test_write_to_dir() {
        let dir = std::env::temp_dir().join(format!("assess-report-{}", std::process::id()));
        let report = builder().build().unwrap();

        let paths = report.write_to_dir(&dir).unwrap();

        let markdown = std::fs::read_to_string(&paths.markdown).unwrap();
        assert!(markdown.starts_with("# Assessment Report: Backend Screen"));
        let json: Report =
            serde_json::from_str(&std::fs::read_to_string(&paths.json).unwrap()).unwrap();
        assert_eq!(json, report);

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_status_serialization() {
        assert_eq!(
            serde_json::to_string(&ReportStatus::NotStarted).unwrap(),
            r#""not_started""#
        );
        assert_eq!(ReportStatus::Expired.to_string(), "Time expired");
    }
}
