//! The session controller.
//!
//! Owns the assessment status, the workspace, the request coordinator and the
//! timer handle. Every mutation enters through [`SessionController::dispatch`]:
//! candidate actions, timer ticks, expiry and request completions are all
//! [`SessionInput`]s processed one at a time. Background work (the countdown
//! and collaborator calls) only ever posts inputs back into the session inbox.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, mpsc};

use crate::backend::AssessmentBackend;
use crate::catalog::QuestionCatalog;
use crate::clock::Clock;
use crate::config::{Config, SubmitPolicy};
use crate::coordinator::{Completion, ExecutionRequest, SubmissionCoordinator};
use crate::demo;
use crate::error::{Rejection, Result, SessionError};
use crate::events::{EventBroadcaster, SessionEvent};
use crate::model::{Assessment, AssessmentId, AssessmentStatus, Language, Question, QuestionId};
use crate::outcome::{ExecutionMode, ExecutionOutcome, OutcomeBody, VerdictSummary};
use crate::timer::{TimerEngine, TimerHandle};
use crate::view::{OutcomeView, QuestionView, SessionView, TimerView};
use crate::workspace::CodeWorkspace;

// ============================================================================
// Inputs
// ============================================================================

/// Something the candidate asks the session to do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CandidateAction {
    /// Replace the active buffer's text.
    Edit(String),
    /// Make the question at this zero-based index active.
    SelectQuestion(usize),
    /// Switch the active language.
    SelectLanguage(Language),
    /// Set or clear the active question's custom stdin.
    SetCustomInput(Option<String>),
    /// Run, test or submit the active buffer.
    Execute(ExecutionMode),
    /// Finish the assessment.
    Finish,
    /// Close the session without changing the assessment status.
    Teardown,
}

/// A discrete event for the session to process.
#[derive(Debug, Clone)]
pub enum SessionInput {
    /// A candidate action.
    Action(CandidateAction),
    /// The countdown ticked.
    Tick(u64),
    /// The deadline was reached.
    Expired,
    /// A collaborator request resolved.
    Resolved(Completion),
}

impl From<CandidateAction> for SessionInput {
    fn from(action: CandidateAction) -> Self {
        Self::Action(action)
    }
}

/// Receiving side of the session's input channel.
pub type SessionInbox = mpsc::UnboundedReceiver<SessionInput>;

/// One applied Submit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmissionRecord {
    /// Question submitted.
    pub question_id: QuestionId,
    /// Language used.
    pub language: Language,
    /// Pass counts.
    pub summary: VerdictSummary,
    /// When the result was applied.
    pub submitted_at: DateTime<Utc>,
}

// ============================================================================
// SessionController
// ============================================================================

/// One candidate's assessment session.
pub struct SessionController {
    assessment: Assessment,
    catalog: QuestionCatalog,
    workspace: CodeWorkspace,
    coordinator: SubmissionCoordinator,
    timer: Option<TimerHandle>,
    clock: Arc<dyn Clock>,
    submit_policy: SubmitPolicy,
    max_code_length: usize,
    current: usize,
    outcome: Option<ExecutionOutcome>,
    last_error: Option<String>,
    final_remaining: Option<u64>,
    history: Vec<SubmissionRecord>,
    locked: HashSet<QuestionId>,
    request_language: Option<Language>,
    started_at: DateTime<Utc>,
    ended_at: Option<DateTime<Utc>>,
    events: EventBroadcaster,
    inbox: mpsc::UnboundedSender<SessionInput>,
    closed: bool,
    demo: bool,
}

impl std::fmt::Debug for SessionController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionController")
            .field("assessment_id", &self.assessment.id)
            .field("status", &self.assessment.status)
            .field("current", &self.current)
            .field("coordinator", &self.coordinator)
            .field("closed", &self.closed)
            .finish_non_exhaustive()
    }
}

impl SessionController {
    /// Loads an assessment and opens a session on it.
    ///
    /// Starts the assessment if it has never been started, loads its
    /// questions and starts the countdown. In development with
    /// `demoFallback` enabled, a failed load falls back to the built-in demo.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::LoadFailure`, `MalformedAssessment` or
    /// `InvalidStateTransition` if the session cannot start.
    #[tracing::instrument(skip(config, backend, timer), fields(candidate_id = %config.candidate_id))]
    pub async fn load(
        config: &Config,
        backend: Arc<dyn AssessmentBackend>,
        assessment_id: AssessmentId,
        timer: &TimerEngine,
    ) -> Result<(Self, SessionInbox)> {
        let clock = timer.clock();
        let candidate_id = config.candidate_id.as_str();

        let (assessment, catalog, demo) =
            match fetch(backend.as_ref(), &assessment_id, candidate_id).await {
                Ok((assessment, catalog)) => (assessment, catalog, false),
                Err(e) if config.demo_fallback_enabled() => {
                    tracing::warn!(error = %e, "Assessment unavailable, using demo data");
                    let assessment = demo::demo_assessment(candidate_id, clock.now());
                    let catalog =
                        QuestionCatalog::new(demo::DEMO_ASSESSMENT_ID, demo::demo_questions())?;
                    (assessment, catalog, true)
                }
                Err(e) => return Err(e),
            };

        let (tx, rx) = mpsc::unbounded_channel();
        let now = clock.now();
        let coordinator = SubmissionCoordinator::new(
            backend,
            assessment.id.clone(),
            candidate_id.to_string(),
        );

        let mut controller = Self {
            assessment,
            catalog,
            workspace: CodeWorkspace::new(),
            coordinator,
            timer: None,
            clock,
            submit_policy: config.submit_policy,
            max_code_length: config.max_code_length,
            current: 0,
            outcome: None,
            last_error: None,
            final_remaining: None,
            history: Vec::new(),
            locked: HashSet::new(),
            request_language: None,
            started_at: now,
            ended_at: None,
            events: EventBroadcaster::default(),
            inbox: tx,
            closed: false,
            demo,
        };

        match controller.assessment.status {
            AssessmentStatus::InProgress => controller.start_timer(timer),
            AssessmentStatus::Expired => controller.freeze(Rejection::Expired, Some(0)),
            AssessmentStatus::Submitted => controller.freeze(Rejection::Submitted, None),
            AssessmentStatus::NotStarted => {
                return Err(SessionError::invalid_transition(
                    AssessmentStatus::NotStarted,
                    AssessmentStatus::InProgress,
                ));
            }
        }

        tracing::info!(
            assessment_id = %controller.assessment.id,
            questions = controller.catalog.len(),
            status = %controller.assessment.status,
            demo,
            "Session loaded"
        );
        Ok((controller, rx))
    }

    fn start_timer(&mut self, engine: &TimerEngine) {
        let deadline = self.assessment.deadline(self.clock.now());
        let tick_tx = self.inbox.clone();
        let expire_tx = self.inbox.clone();

        let handle = engine.start(
            deadline,
            Box::new(move |remaining| {
                // Closed inbox means the session is gone.
                let _ = tick_tx.send(SessionInput::Tick(remaining));
            }),
            Box::new(move || {
                let _ = expire_tx.send(SessionInput::Expired);
            }),
        );
        let expired_at_start = handle.status() == crate::timer::TimerStatus::Expired;
        self.timer = Some(handle);

        if expired_at_start {
            self.expire();
        }
    }

    // ========================================================================
    // Dispatch
    // ========================================================================

    /// Processes one input.
    ///
    /// Rejections are also recorded as the view's `last_error`.
    ///
    /// # Errors
    ///
    /// Returns the `Rejection` if a candidate action was refused. Internal
    /// inputs never fail.
    pub fn dispatch(&mut self, input: impl Into<SessionInput>) -> std::result::Result<(), Rejection> {
        match input.into() {
            SessionInput::Action(action) => {
                if self.deadline_passed() {
                    self.expire();
                }
                let result = self.apply(action);
                if let Err(rejection) = result {
                    tracing::debug!(%rejection, "Action rejected");
                    self.last_error = Some(capitalize(&rejection.to_string()));
                    self.events.send(SessionEvent::error(rejection.to_string()));
                }
                result
            }
            SessionInput::Tick(remaining) => {
                if self.assessment.status == AssessmentStatus::InProgress && !self.closed {
                    self.events.send(SessionEvent::tick(remaining));
                }
                Ok(())
            }
            SessionInput::Expired => {
                self.expire();
                Ok(())
            }
            SessionInput::Resolved(completion) => {
                self.resolve(completion);
                Ok(())
            }
        }
    }

    fn apply(&mut self, action: CandidateAction) -> std::result::Result<(), Rejection> {
        match action {
            CandidateAction::Edit(text) => {
                self.ensure_active()?;
                let (question_id, language) = self.active_pair();
                self.workspace.set_buffer(&question_id, language, text)
            }
            CandidateAction::SelectQuestion(index) => self.select_question(index),
            CandidateAction::SelectLanguage(language) => {
                self.ensure_active()?;
                let question = self.catalog.get_clamped(self.current);
                self.workspace.select_language(question, language)?;
                self.announce_navigation();
                Ok(())
            }
            CandidateAction::SetCustomInput(input) => {
                self.ensure_active()?;
                let question_id = self.current_question().id.clone();
                self.workspace.set_custom_input(&question_id, input)
            }
            CandidateAction::Execute(mode) => self.execute(mode),
            CandidateAction::Finish => self.finish(),
            CandidateAction::Teardown => {
                self.teardown();
                Ok(())
            }
        }
    }

    fn ensure_active(&self) -> std::result::Result<(), Rejection> {
        match self.assessment.status {
            AssessmentStatus::InProgress if !self.closed => Ok(()),
            AssessmentStatus::InProgress | AssessmentStatus::Expired => Err(Rejection::Expired),
            AssessmentStatus::Submitted => Err(Rejection::Submitted),
            AssessmentStatus::NotStarted => Err(Rejection::NotStarted),
        }
    }

    fn select_question(&mut self, index: usize) -> std::result::Result<(), Rejection> {
        self.ensure_active()?;
        if index >= self.catalog.len() {
            return Err(Rejection::QuestionOutOfRange { index });
        }
        if index == self.current {
            return Ok(());
        }

        self.current = index;
        self.outcome = None;
        self.last_error = None;
        self.announce_navigation();
        Ok(())
    }

    fn announce_navigation(&self) {
        let (question_id, language) = self.active_pair();
        tracing::debug!(index = self.current, %question_id, %language, "Navigated");
        self.events
            .send(SessionEvent::navigated(self.current, question_id, language));
    }

    fn execute(&mut self, mode: ExecutionMode) -> std::result::Result<(), Rejection> {
        self.ensure_active()?;
        let question = self.current_question().clone();
        if mode == ExecutionMode::Submit
            && self.submit_policy == SubmitPolicy::LockOnFirst
            && self.locked.contains(&question.id)
        {
            return Err(Rejection::AlreadySubmitted);
        }

        let language = self.workspace.active_language(&question);
        let code = self.workspace.get_buffer(&question.id, language).to_string();
        if code.trim().is_empty() {
            return Err(Rejection::EmptyCode);
        }
        if code.chars().count() > self.max_code_length {
            return Err(Rejection::CodeTooLong {
                limit: self.max_code_length,
            });
        }
        let stdin = match mode {
            ExecutionMode::Test => self.workspace.custom_input(&question.id).map(str::to_string),
            ExecutionMode::Run | ExecutionMode::Submit => None,
        };

        let pending = self.coordinator.begin(ExecutionRequest {
            question,
            code,
            language,
            stdin,
            mode,
        })?;
        self.last_error = None;
        self.request_language = Some(language);

        let tx = self.inbox.clone();
        tokio::spawn(async move {
            let completion = pending.execute().await;
            let _ = tx.send(SessionInput::Resolved(completion));
        });
        Ok(())
    }

    fn finish(&mut self) -> std::result::Result<(), Rejection> {
        self.ensure_active()?;
        let remaining = self.timer.as_ref().and_then(TimerHandle::remaining_secs);
        if let Some(timer) = self.timer.as_mut() {
            timer.cancel();
        }
        self.transition(AssessmentStatus::Submitted);
        self.freeze(Rejection::Submitted, remaining);
        tracing::info!(assessment_id = %self.assessment.id, "Assessment finished");
        Ok(())
    }

    fn teardown(&mut self) {
        if self.closed {
            return;
        }
        if !self.assessment.status.is_terminal() {
            self.final_remaining = self.timer.as_ref().and_then(TimerHandle::remaining_secs);
        }
        if let Some(timer) = self.timer.as_mut() {
            timer.cancel();
        }
        self.coordinator.invalidate();
        self.closed = true;
        self.ended_at.get_or_insert(self.clock.now());
        tracing::info!(assessment_id = %self.assessment.id, "Session torn down");
    }

    /// The deadline has passed but the timer's expiry is not yet processed.
    fn deadline_passed(&self) -> bool {
        self.assessment.status == AssessmentStatus::InProgress
            && !self.closed
            && self.timer.as_ref().and_then(TimerHandle::remaining_secs) == Some(0)
    }

    fn expire(&mut self) {
        if self.assessment.status != AssessmentStatus::InProgress {
            return;
        }
        self.transition(AssessmentStatus::Expired);
        self.freeze(Rejection::Expired, Some(0));
        tracing::info!(assessment_id = %self.assessment.id, "Assessment expired");
    }

    fn transition(&mut self, to: AssessmentStatus) {
        let from = self.assessment.status;
        if !from.can_transition_to(to) {
            tracing::warn!(%from, %to, "Ignoring invalid status transition");
            return;
        }
        self.assessment.status = to;
        self.events
            .send(SessionEvent::status_changed(from, to, self.clock.now()));
    }

    fn freeze(&mut self, reason: Rejection, remaining: Option<u64>) {
        self.workspace.freeze(reason);
        self.coordinator.invalidate();
        self.final_remaining = remaining;
        self.ended_at.get_or_insert(self.clock.now());
    }

    fn resolve(&mut self, completion: Completion) {
        if self.closed || self.assessment.status.is_terminal() {
            tracing::debug!(
                question_id = %completion.ticket().question_id(),
                "Dropping result after session end"
            );
            return;
        }
        let Some(outcome) = self.coordinator.complete(completion) else {
            return;
        };

        if outcome.mode == ExecutionMode::Submit {
            self.record_submission(&outcome);
        }

        if outcome.question_id != self.current_question().id {
            tracing::debug!(
                question_id = %outcome.question_id,
                "Dropping result for a question that is no longer active"
            );
            return;
        }

        match &outcome.body {
            OutcomeBody::Failed(error) => {
                self.last_error = Some(error.detail.clone());
                self.events.send(SessionEvent::error(error.to_string()));
            }
            OutcomeBody::Raw(_) | OutcomeBody::Verdicts(_) => self.last_error = None,
        }
        self.events.send(SessionEvent::outcome(
            outcome.question_id.clone(),
            outcome.mode,
            outcome.summary(),
            outcome.is_failure(),
        ));
        self.outcome = Some(outcome);
    }

    fn record_submission(&mut self, outcome: &ExecutionOutcome) {
        let Some(summary) = outcome.summary() else {
            return;
        };
        let language = self.request_language.take().unwrap_or_else(|| {
            self.catalog
                .find(&outcome.question_id)
                .map_or(Language::Python, |q| self.workspace.active_language(q))
        });
        tracing::info!(
            question_id = %outcome.question_id,
            passed = summary.passed(),
            total = summary.total(),
            "Submission recorded"
        );
        self.history.push(SubmissionRecord {
            question_id: outcome.question_id.clone(),
            language,
            summary,
            submitted_at: self.clock.now(),
        });
        self.locked.insert(outcome.question_id.clone());
    }

    // ========================================================================
    // Draining
    // ========================================================================

    /// Applies every input already queued in `inbox` without waiting.
    ///
    /// Returns the number of inputs applied.
    pub fn pump(&mut self, inbox: &mut SessionInbox) -> usize {
        let mut applied = 0;
        while let Ok(input) = inbox.try_recv() {
            let _ = self.dispatch(input);
            applied += 1;
        }
        applied
    }

    /// Applies inputs from `inbox` until no request is outstanding.
    pub async fn settle(&mut self, inbox: &mut SessionInbox) {
        while self.coordinator.is_busy() {
            let Some(input) = inbox.recv().await else {
                break;
            };
            let _ = self.dispatch(input);
        }
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    /// Projects the current state for presentation.
    #[must_use]
    pub fn view(&self) -> SessionView {
        let question = self.current_question();
        let language = self.workspace.active_language(question);
        let remaining = if self.assessment.status.is_terminal() || self.closed {
            self.final_remaining
        } else {
            self.timer.as_ref().and_then(TimerHandle::remaining_secs)
        };

        SessionView {
            title: self.assessment.title.clone(),
            description: self.assessment.description.clone(),
            status: self.assessment.status,
            timer: TimerView::new(remaining),
            question_index: self.current,
            question_count: self.catalog.len(),
            question: QuestionView::new(question),
            language,
            code: self.workspace.peek_buffer(&question.id, language).to_string(),
            custom_input: self.workspace.custom_input(&question.id).map(str::to_string),
            outcome: self
                .outcome
                .as_ref()
                .map(|outcome| OutcomeView::new(outcome, question)),
            last_error: self.last_error.clone(),
            request_in_flight: self.coordinator.is_busy(),
            editable: self.is_active() && !self.deadline_passed(),
        }
    }

    /// Subscribes to session events.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    /// The assessment as loaded, with the session's current status.
    #[must_use]
    pub const fn assessment(&self) -> &Assessment {
        &self.assessment
    }

    /// Current assessment status.
    #[must_use]
    pub const fn status(&self) -> AssessmentStatus {
        self.assessment.status
    }

    /// The question catalog.
    #[must_use]
    pub const fn catalog(&self) -> &QuestionCatalog {
        &self.catalog
    }

    /// Zero-based index of the active question.
    #[must_use]
    pub const fn current_index(&self) -> usize {
        self.current
    }

    /// The active question.
    #[must_use]
    pub fn current_question(&self) -> &Question {
        self.catalog.get_clamped(self.current)
    }

    /// The latest outcome shown for the active question.
    #[must_use]
    pub const fn outcome(&self) -> Option<&ExecutionOutcome> {
        self.outcome.as_ref()
    }

    /// The latest rejection or failure message.
    #[must_use]
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// Every applied Submit, oldest first.
    #[must_use]
    pub fn history(&self) -> &[SubmissionRecord] {
        &self.history
    }

    /// Returns `true` while a request is outstanding.
    #[must_use]
    pub const fn is_busy(&self) -> bool {
        self.coordinator.is_busy()
    }

    /// Returns `true` while edits and requests are accepted.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.ensure_active().is_ok()
    }

    /// Returns `true` once the session has been torn down.
    #[must_use]
    pub const fn is_closed(&self) -> bool {
        self.closed
    }

    /// Returns `true` if the session runs on the built-in demo assessment.
    #[must_use]
    pub const fn is_demo(&self) -> bool {
        self.demo
    }

    /// When the session opened.
    #[must_use]
    pub const fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// When the session reached a terminal status or was torn down.
    #[must_use]
    pub const fn ended_at(&self) -> Option<DateTime<Utc>> {
        self.ended_at
    }

    fn active_pair(&self) -> (QuestionId, Language) {
        let question = self.current_question();
        (question.id.clone(), self.workspace.active_language(question))
    }
}

impl Drop for SessionController {
    fn drop(&mut self) {
        self.teardown();
    }
}

/// Loads, starts if needed, and validates an assessment.
async fn fetch(
    backend: &dyn AssessmentBackend,
    assessment_id: &AssessmentId,
    candidate_id: &str,
) -> Result<(Assessment, QuestionCatalog)> {
    let mut assessment = backend
        .load_assessment(assessment_id, candidate_id)
        .await
        .map_err(|e| SessionError::load_failure("load", assessment_id.as_str(), e))?;

    if assessment.status == AssessmentStatus::NotStarted {
        tracing::info!(%assessment_id, "Starting assessment");
        let started = backend
            .start_assessment(assessment_id, candidate_id)
            .await
            .map_err(|e| SessionError::load_failure("start", assessment_id.as_str(), e))?;
        if !AssessmentStatus::NotStarted.can_transition_to(started.status) {
            return Err(SessionError::invalid_transition(
                AssessmentStatus::NotStarted,
                started.status,
            ));
        }
        assessment = started;
    }

    let questions = backend
        .load_questions(assessment_id, candidate_id)
        .await
        .map_err(|e| {
            SessionError::load_failure("load questions for", assessment_id.as_str(), e)
        })?;
    let catalog = QuestionCatalog::new(assessment_id.as_str(), questions)?;

    Ok((assessment, catalog))
}

fn capitalize(message: &str) -> String {
    let mut chars = message.chars();
    chars.next().map_or_else(String::new, |first| {
        first.to_uppercase().chain(chars).collect()
    })
}
