//! Per-question code buffers, language selection and custom input.
//!
//! Buffers are keyed by `(question, language)`, so switching the active
//! question or language never touches another buffer's text.

use std::collections::HashMap;

use crate::error::Rejection;
use crate::model::{Language, Question, QuestionId};

/// Editable candidate state that survives navigation.
#[derive(Debug, Clone, Default)]
pub struct CodeWorkspace {
    buffers: HashMap<(QuestionId, Language), String>,
    custom_inputs: HashMap<QuestionId, String>,
    preferred_language: Option<Language>,
    frozen: Option<Rejection>,
}

impl CodeWorkspace {
    /// Creates an empty workspace.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the buffer for `(question, language)`, seeding it with the
    /// language scaffold on first access.
    pub fn get_buffer(&mut self, question: &QuestionId, language: Language) -> &str {
        self.buffers
            .entry((question.clone(), language))
            .or_insert_with(|| language.scaffold().to_string())
    }

    /// Returns the buffer text without creating it.
    ///
    /// An unvisited pair reads as its scaffold.
    #[must_use]
    pub fn peek_buffer(&self, question: &QuestionId, language: Language) -> &str {
        self.buffers
            .get(&(question.clone(), language))
            .map_or_else(|| language.scaffold(), String::as_str)
    }

    /// Replaces the buffer text for `(question, language)`.
    ///
    /// # Errors
    ///
    /// Returns the freeze reason once the workspace has been frozen.
    pub fn set_buffer(
        &mut self,
        question: &QuestionId,
        language: Language,
        text: impl Into<String>,
    ) -> Result<(), Rejection> {
        self.check_editable()?;
        self.buffers.insert((question.clone(), language), text.into());
        Ok(())
    }

    /// Returns the language active for `question`.
    ///
    /// The last selected language is kept while the question allows it;
    /// otherwise the question's first allowed language is used.
    #[must_use]
    pub fn active_language(&self, question: &Question) -> Language {
        match self.preferred_language {
            Some(lang) if question.allows(lang) => lang,
            _ => question
                .default_language()
                .or(self.preferred_language)
                .unwrap_or(Language::Python),
        }
    }

    /// Selects the language for `question` and subsequent questions.
    ///
    /// # Errors
    ///
    /// Returns `Rejection::LanguageNotAllowed` if `question` does not allow
    /// `language`, or the freeze reason once frozen.
    pub fn select_language(
        &mut self,
        question: &Question,
        language: Language,
    ) -> Result<(), Rejection> {
        self.check_editable()?;
        if !question.allows(language) {
            return Err(Rejection::LanguageNotAllowed);
        }
        self.preferred_language = Some(language);
        Ok(())
    }

    /// Returns the custom stdin for `question`, if any.
    #[must_use]
    pub fn custom_input(&self, question: &QuestionId) -> Option<&str> {
        self.custom_inputs.get(question).map(String::as_str)
    }

    /// Sets or clears the custom stdin for `question`.
    ///
    /// # Errors
    ///
    /// Returns the freeze reason once frozen.
    pub fn set_custom_input(
        &mut self,
        question: &QuestionId,
        input: Option<String>,
    ) -> Result<(), Rejection> {
        self.check_editable()?;
        match input {
            Some(text) => {
                self.custom_inputs.insert(question.clone(), text);
            }
            None => {
                self.custom_inputs.remove(question);
            }
        }
        Ok(())
    }

    /// Rejects all further edits with `reason`.
    pub fn freeze(&mut self, reason: Rejection) {
        self.frozen.get_or_insert(reason);
    }

    /// Returns `true` once the workspace has been frozen.
    #[must_use]
    pub const fn is_frozen(&self) -> bool {
        self.frozen.is_some()
    }

    fn check_editable(&self) -> Result<(), Rejection> {
        self.frozen.map_or(Ok(()), Err)
    }
}
