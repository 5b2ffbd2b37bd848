//! Assessment data model.
//!
//! Assessments and questions are loaded once from the backend and are
//! read-only afterwards. Identifiers arrive from the wire as either JSON
//! numbers or strings and are normalized to string-backed newtypes.

use std::fmt;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

// ============================================================================
// Identifiers
// ============================================================================

/// Deserializes an identifier that may be a JSON number or string.
fn id_from_number_or_string<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawId {
        Number(i64),
        Text(String),
    }

    match RawId::deserialize(deserializer)? {
        RawId::Number(n) => Ok(n.to_string()),
        RawId::Text(s) if s.trim().is_empty() => {
            Err(serde::de::Error::custom("identifier must not be empty"))
        }
        RawId::Text(s) => Ok(s),
    }
}

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(String);

        impl $name {
            /// Creates an identifier from any string-like value.
            #[must_use]
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            /// Returns the identifier as a string slice.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(id: &str) -> Self {
                Self::new(id)
            }
        }

        impl Serialize for $name {
            fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
            where
                S: Serializer,
            {
                serializer.serialize_str(&self.0)
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
            where
                D: Deserializer<'de>,
            {
                id_from_number_or_string(deserializer).map(Self)
            }
        }
    };
}

string_id!(
    /// Identifier of an assessment.
    AssessmentId
);
string_id!(
    /// Identifier of a question within an assessment.
    QuestionId
);
string_id!(
    /// Identifier of a test case within a question.
    TestCaseId
);

// ============================================================================
// Language
// ============================================================================

/// Programming languages the execution service accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Language {
    /// Python 3.
    Python,
    /// Java.
    Java,
    /// C++.
    Cpp,
    /// JavaScript (Node).
    JavaScript,
}

impl Language {
    /// Every supported language, in display order.
    pub const ALL: [Self; 4] = [Self::Python, Self::Java, Self::Cpp, Self::JavaScript];

    /// Returns the wire name of the language.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Python => "python",
            Self::Java => "java",
            Self::Cpp => "cpp",
            Self::JavaScript => "javascript",
        }
    }

    /// Parses a language name case-insensitively.
    ///
    /// Accepts the wire names plus a few common aliases (`c++`, `js`, `py`).
    #[must_use]
    pub fn from_str_case_insensitive(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "python" | "py" | "python3" => Some(Self::Python),
            "java" => Some(Self::Java),
            "cpp" | "c++" => Some(Self::Cpp),
            "javascript" | "js" | "node" => Some(Self::JavaScript),
            _ => None,
        }
    }

    /// Returns the starter code seeded into a fresh buffer.
    #[must_use]
    pub const fn scaffold(&self) -> &'static str {
        match self {
            Self::Python => {
                "def solution():\n    # Write your code here\n    pass\n\n# Test your solution\nif __name__ == \"__main__\":\n    result = solution()\n    print(result)\n"
            }
            Self::Java => {
                "public class Solution {\n    public static void main(String[] args) {\n        // Write your code here\n    }\n}\n"
            }
            Self::Cpp => {
                "#include <iostream>\nusing namespace std;\n\nint main() {\n    // Write your code here\n    return 0;\n}\n"
            }
            Self::JavaScript => {
                "function solution() {\n    // Write your code here\n}\n\n// Test your solution\nconsole.log(solution());\n"
            }
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Language {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Self::from_str_case_insensitive(&s).ok_or_else(|| {
            serde::de::Error::custom(format!(
                "invalid language '{s}': expected one of 'python', 'java', 'cpp', 'javascript'"
            ))
        })
    }
}

impl Serialize for Language {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

fn all_languages() -> Vec<Language> {
    Language::ALL.to_vec()
}

// ============================================================================
// Difficulty
// ============================================================================

/// Difficulty label attached to a question.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Difficulty {
    /// Easy question (default).
    #[default]
    Easy,
    /// Medium question.
    Medium,
    /// Hard question.
    Hard,
}

impl Difficulty {
    fn from_str_case_insensitive(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "easy" => Some(Self::Easy),
            "medium" => Some(Self::Medium),
            "hard" => Some(Self::Hard),
            _ => None,
        }
    }

    /// Returns the lowercase label.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Easy => "easy",
            Self::Medium => "medium",
            Self::Hard => "hard",
        }
    }
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Difficulty {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Self::from_str_case_insensitive(&s).ok_or_else(|| {
            serde::de::Error::custom(format!(
                "invalid difficulty '{s}': expected one of 'easy', 'medium', 'hard'"
            ))
        })
    }
}

impl Serialize for Difficulty {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

// ============================================================================
// AssessmentStatus
// ============================================================================

/// Lifecycle status of an assessment.
///
/// Transitions:
/// - `NotStarted` -> `InProgress` (start)
/// - `InProgress` -> `Expired` (deadline reached)
/// - `InProgress` -> `Submitted` (explicit finish)
///
/// `Expired` and `Submitted` are terminal.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssessmentStatus {
    /// The candidate has not started the assessment.
    #[default]
    NotStarted,
    /// The assessment is running.
    InProgress,
    /// The deadline passed.
    Expired,
    /// The candidate finished the assessment.
    #[serde(alias = "completed")]
    Submitted,
}

impl AssessmentStatus {
    /// Returns `true` if this status can never change again.
    ///
    /// # Examples
    ///
    /// ```
    /// use assess_session::AssessmentStatus;
    ///
    /// assert!(AssessmentStatus::Expired.is_terminal());
    /// assert!(AssessmentStatus::Submitted.is_terminal());
    /// assert!(!AssessmentStatus::InProgress.is_terminal());
    /// ```
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Expired | Self::Submitted)
    }

    /// Returns `true` if `next` is a legal successor of this status.
    #[must_use]
    pub const fn can_transition_to(&self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::NotStarted, Self::InProgress)
                | (Self::InProgress, Self::Expired | Self::Submitted)
        )
    }
}

impl fmt::Display for AssessmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::NotStarted => "not_started",
            Self::InProgress => "in_progress",
            Self::Expired => "expired",
            Self::Submitted => "submitted",
        };
        f.write_str(s)
    }
}

// ============================================================================
// TestCase / Question / Assessment
// ============================================================================

/// A single input/expected-output pair attached to a question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestCase {
    /// Test case identifier.
    pub id: TestCaseId,
    /// Stdin payload fed to the program.
    #[serde(alias = "input")]
    pub input_data: String,
    /// Expected stdout.
    pub expected_output: String,
    /// Whether the case is visible to the candidate.
    #[serde(default)]
    pub is_sample: bool,
    /// Definition order within the question.
    #[serde(default)]
    pub order: u32,
}

/// A coding question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Question {
    /// Question identifier.
    pub id: QuestionId,
    /// Short title.
    pub title: String,
    /// Problem statement.
    #[serde(default)]
    pub description: String,
    /// Difficulty label.
    #[serde(default)]
    pub difficulty: Difficulty,
    /// Languages the candidate may answer in. Never empty once loaded.
    #[serde(default = "all_languages")]
    pub allowed_languages: Vec<Language>,
    /// All test cases, sample and hidden.
    #[serde(default)]
    pub test_cases: Vec<TestCase>,
    /// Position within the assessment.
    #[serde(default)]
    pub order: u32,
    /// Optional per-question time limit in minutes (informational).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_limit_minutes: Option<u32>,
}

impl Question {
    /// Returns `true` if `language` may be used for this question.
    #[must_use]
    pub fn allows(&self, language: Language) -> bool {
        self.allowed_languages.contains(&language)
    }

    /// Returns the first allowed language, if any.
    #[must_use]
    pub fn default_language(&self) -> Option<Language> {
        self.allowed_languages.first().copied()
    }
}

/// An assessment as returned by the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Assessment {
    /// Assessment identifier.
    pub id: AssessmentId,
    /// Title shown in the header.
    pub title: String,
    /// Optional description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Relative duration, converted to a deadline at session start.
    #[serde(default, alias = "duration", skip_serializing_if = "Option::is_none")]
    pub duration_minutes: Option<u32>,
    /// Candidate the assessment belongs to.
    #[serde(default)]
    pub candidate_id: String,
    /// Lifecycle status.
    #[serde(default)]
    pub status: AssessmentStatus,
    /// When the candidate started.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    /// Absolute deadline.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
}

impl Assessment {
    /// Resolves the absolute deadline for a session starting at `now`.
    ///
    /// Prefers `expires_at`, then `started_at + duration`, then `now + duration`.
    /// Returns `None` when the assessment has no time limit.
    #[must_use]
    pub fn deadline(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        if let Some(expires_at) = self.expires_at {
            return Some(expires_at);
        }
        let duration = Duration::minutes(i64::from(self.duration_minutes?));
        Some(self.started_at.unwrap_or(now) + duration)
    }
}
