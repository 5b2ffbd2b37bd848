//! Markdown report generation.
//!
//! The generated document contains a summary table, one row per question
//! with the latest submission's counts, and the submission timeline.
//!
//! # Example
//!
//! ```rust
//! use assess_report::{MarkdownGenerator, Report};
//!
//! let report = Report::default();
//! let markdown = MarkdownGenerator::new(&report).generate();
//! assert!(markdown.contains("## Summary"));
//! ```

use chrono::{DateTime, Utc};
use std::fmt::Write;

use crate::{QuestionReport, Report, SubmissionCounts};

/// Passed marker.
const PASS_ICON: &str = "&#9989;";

/// Failed marker.
const FAIL_ICON: &str = "&#10060;";

/// Generates Markdown reports.
pub struct MarkdownGenerator<'a> {
    report: &'a Report,
}

impl<'a> MarkdownGenerator<'a> {
    /// Creates a new Markdown generator for the given report.
    #[must_use]
    pub const fn new(report: &'a Report) -> Self {
        Self { report }
    }

    /// Generates the complete Markdown report.
    #[must_use]
    pub fn generate(&self) -> String {
        let mut output = String::new();

        self.write_title(&mut output);
        self.write_summary(&mut output);
        self.write_questions(&mut output);
        self.write_timeline(&mut output);
        Self::write_footer(&mut output);

        output
    }

    fn write_title(&self, output: &mut String) {
        let _ = writeln!(
            output,
            "# Assessment Report: {}\n",
            escape_markdown(&self.report.title)
        );
        if self.report.summary.demo {
            let _ = writeln!(
                output,
                "> Generated from the built-in demo assessment; nothing was sent to a backend.\n"
            );
        }
    }

    fn write_summary(&self, output: &mut String) {
        let summary = &self.report.summary;

        let _ = writeln!(output, "## Summary\n");
        let _ = writeln!(output, "| Metric | Value |");
        let _ = writeln!(output, "|--------|-------|");
        let _ = writeln!(
            output,
            "| Assessment | {} |",
            escape_markdown(&self.report.assessment_id)
        );
        let _ = writeln!(
            output,
            "| Candidate | {} |",
            escape_markdown(&self.report.candidate_id)
        );
        let _ = writeln!(output, "| Status | {} |", summary.status.description());
        let _ = writeln!(
            output,
            "| Started | {} |",
            format_timestamp(&summary.started_at)
        );
        let _ = writeln!(
            output,
            "| Duration | {} |",
            format_duration(summary.duration_seconds)
        );
        let _ = writeln!(
            output,
            "| Questions Attempted | {} of {} |",
            summary.questions_attempted, summary.questions_total
        );
        let _ = writeln!(
            output,
            "| Questions Solved | {} |",
            summary.questions_solved
        );
        let _ = writeln!(output);
    }

    fn write_questions(&self, output: &mut String) {
        let _ = writeln!(output, "## Questions\n");

        if self.report.questions.is_empty() {
            let _ = writeln!(output, "*No questions loaded.*\n");
            return;
        }

        let _ = writeln!(
            output,
            "| # | Question | Difficulty | Language | Submits | Samples | Hidden | Result |"
        );
        let _ = writeln!(
            output,
            "|---|----------|------------|----------|---------|---------|--------|--------|"
        );
        for question in &self.report.questions {
            Self::write_question_row(output, question);
        }
        let _ = writeln!(output);
    }

    fn write_question_row(output: &mut String, question: &QuestionReport) {
        let title = escape_markdown(&question.title);
        let language = question.language.as_deref().unwrap_or("-");
        let (samples, hidden, result) = match &question.latest {
            Some(counts) => (
                format_ratio(counts.sample_passed, counts.sample_total),
                format_ratio(counts.hidden_passed, counts.hidden_total),
                result_icon(counts).to_string(),
            ),
            None => ("-".to_string(), "-".to_string(), "*Not attempted*".to_string()),
        };

        let _ = writeln!(
            output,
            "| {} | {title} | {} | {language} | {} | {samples} | {hidden} | {result} |",
            question.number, question.difficulty, question.submissions
        );
    }

    fn write_timeline(&self, output: &mut String) {
        let _ = writeln!(output, "## Submission Timeline\n");

        if self.report.submissions.is_empty() {
            let _ = writeln!(output, "*No submissions recorded.*\n");
            return;
        }

        let _ = writeln!(output, "| Time | Question | Language | Passed |");
        let _ = writeln!(output, "|------|----------|----------|--------|");
        for entry in &self.report.submissions {
            let question = self
                .report
                .questions
                .iter()
                .find(|q| q.question_id == entry.question_id)
                .map_or_else(
                    || escape_markdown(&entry.question_id),
                    |q| format!("#{} {}", q.number, escape_markdown(&q.title)),
                );
            let _ = writeln!(
                output,
                "| {} | {question} | {} | {} |",
                format_timestamp(&entry.submitted_at),
                entry.language,
                format_ratio(entry.counts.passed(), entry.counts.total())
            );
        }
        let _ = writeln!(output);
    }

    fn write_footer(output: &mut String) {
        let _ = writeln!(output, "---\n");
        let _ = writeln!(
            output,
            "*Generated on {}*",
            format_timestamp(&Utc::now())
        );
    }
}

// ============================================================================
// Helper Functions
// ============================================================================

/// Formats a duration in seconds to a human-readable string.
///
/// - 65 seconds -> "1m 5s"
/// - 3661 seconds -> "1h 1m 1s"
fn format_duration(seconds: u64) -> String {
    let hours = seconds / 3600;
    let minutes = (seconds % 3600) / 60;
    let secs = seconds % 60;

    let mut parts = Vec::new();

    if hours > 0 {
        parts.push(format!("{hours}h"));
    }
    if minutes > 0 {
        parts.push(format!("{minutes}m"));
    }
    if secs > 0 || parts.is_empty() {
        parts.push(format!("{secs}s"));
    }

    parts.join(" ")
}

/// Format: "YYYY-MM-DD HH:MM:SS UTC"
fn format_timestamp(dt: &DateTime<Utc>) -> String {
    dt.format("%Y-%m-%d %H:%M:%S UTC").to_string()
}

fn format_ratio(passed: usize, total: usize) -> String {
    if total == 0 {
        "-".to_string()
    } else {
        format!("{passed}/{total}")
    }
}

const fn result_icon(counts: &SubmissionCounts) -> &'static str {
    if counts.all_passed() {
        PASS_ICON
    } else {
        FAIL_ICON
    }
}

/// Escapes special Markdown characters in text.
///
/// Keeps titles and ids from being interpreted as formatting or breaking
/// table rows.
fn escape_markdown(text: &str) -> String {
    let mut result = String::with_capacity(text.len());

    for ch in text.chars() {
        match ch {
            '*' | '_' | '`' | '#' | '[' | ']' | '(' | ')' | '!' | '\\' | '<' | '>' | '|' => {
                result.push('\\');
                result.push(ch);
            }
            '\n' => result.push_str("<br>"),
            _ => result.push(ch),
        }
    }

    result
}

// ============================================================================
// Tests
// ============================================================================
