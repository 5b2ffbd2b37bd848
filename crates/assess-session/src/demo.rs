//! Built-in demo assessment used when loading fails in development.

use chrono::{DateTime, Utc};

use crate::model::{
    Assessment, AssessmentStatus, Difficulty, Language, Question, TestCase, TestCaseId,
};

/// Identifier of the demo assessment.
pub const DEMO_ASSESSMENT_ID: &str = "default-assessment";

/// Duration of the demo assessment.
pub const DEMO_DURATION_MINUTES: u32 = 60;

/// Returns the demo assessment, started at `now`.
#[must_use]
pub fn demo_assessment(candidate_id: &str, now: DateTime<Utc>) -> Assessment {
    Assessment {
        id: DEMO_ASSESSMENT_ID.into(),
        title: "Sample Coding Assessment".to_string(),
        description: Some("This is a sample assessment to demonstrate the platform".to_string()),
        duration_minutes: Some(DEMO_DURATION_MINUTES),
        candidate_id: candidate_id.to_string(),
        status: AssessmentStatus::InProgress,
        started_at: Some(now),
        expires_at: None,
    }
}

/// Returns the demo questions.
#[must_use]
pub fn demo_questions() -> Vec<Question> {
    let case = |id: &str, input: &str, expected: &str, is_sample: bool, order: u32| TestCase {
        id: TestCaseId::new(id),
        input_data: input.to_string(),
        expected_output: expected.to_string(),
        is_sample,
        order,
    };

    vec![Question {
        id: "q1".into(),
        title: "Two Sum".to_string(),
        description: "Given an array of integers and a target sum, find two numbers that add up \
                      to the target. Return the indices of the two numbers."
            .to_string(),
        difficulty: Difficulty::Easy,
        allowed_languages: Language::ALL.to_vec(),
        test_cases: vec![
            case("tc1", "[2, 7, 11, 15]\n9", "[0, 1]", true, 1),
            case("tc2", "[3, 2, 4]\n6", "[1, 2]", true, 2),
            case("tc3", "[3, 3]\n6", "[0, 1]", false, 3),
        ],
        order: 1,
        time_limit_minutes: Some(30),
    }]
}
