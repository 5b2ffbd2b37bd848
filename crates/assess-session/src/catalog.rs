//! Read-only view over an assessment's questions.

use crate::error::{Result, SessionError};
use crate::model::{Question, QuestionId, TestCase};

/// The ordered, immutable question list of one assessment.
#[derive(Debug, Clone)]
pub struct QuestionCatalog {
    questions: Vec<Question>,
}

impl QuestionCatalog {
    /// Builds a catalog, checking the invariants loaded data must satisfy.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::MalformedAssessment` if the list is empty, a
    /// question allows no languages, or two questions share an id.
    pub fn new(assessment_id: &str, questions: Vec<Question>) -> Result<Self> {
        if questions.is_empty() {
            return Err(SessionError::malformed(
                assessment_id,
                "assessment has no questions",
            ));
        }

        for (i, question) in questions.iter().enumerate() {
            if question.allowed_languages.is_empty() {
                return Err(SessionError::malformed(
                    assessment_id,
                    format!("question '{}' allows no languages", question.id),
                ));
            }
            if questions[..i].iter().any(|q| q.id == question.id) {
                return Err(SessionError::malformed(
                    assessment_id,
                    format!("duplicate question id '{}'", question.id),
                ));
            }
        }

        Ok(Self { questions })
    }

    /// Number of questions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.questions.len()
    }

    /// Always `false`; a catalog holds at least one question.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.questions.is_empty()
    }

    /// Returns the question at `index`.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&Question> {
        self.questions.get(index)
    }

    /// Returns the question at `index`, clamped to the last question.
    #[must_use]
    pub fn get_clamped(&self, index: usize) -> &Question {
        let last = self.questions.len().saturating_sub(1);
        &self.questions[index.min(last)]
    }

    /// Returns the question with the given id.
    #[must_use]
    pub fn find(&self, id: &QuestionId) -> Option<&Question> {
        self.questions.iter().find(|q| &q.id == id)
    }

    /// Returns the index of the question with the given id.
    #[must_use]
    pub fn position(&self, id: &QuestionId) -> Option<usize> {
        self.questions.iter().position(|q| &q.id == id)
    }

    /// Iterates over all questions in order.
    pub fn iter(&self) -> impl Iterator<Item = &Question> {
        self.questions.iter()
    }

    /// Returns the candidate-visible test cases in definition order.
    #[must_use]
    pub fn sample_cases(question: &Question) -> Vec<&TestCase> {
        question.test_cases.iter().filter(|tc| tc.is_sample).collect()
    }

    /// Returns how many hidden test cases the question has.
    #[must_use]
    pub fn hidden_case_count(question: &Question) -> usize {
        question.test_cases.iter().filter(|tc| !tc.is_sample).count()
    }
}
