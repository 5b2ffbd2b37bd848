//! In-memory collaborator for unit tests.

#![allow(clippy::unwrap_used)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use tokio::sync::oneshot;

use crate::backend::{AssessmentBackend, BackendResult};
use crate::error::BackendError;
use crate::model::{
    Assessment, AssessmentId, AssessmentStatus, Difficulty, Language, Question, QuestionId,
    TestCase, TestCaseId,
};
use crate::outcome::{RawOutput, Verdict, VerdictReport};

type ExecuteFn = Box<dyn Fn(&str, Option<&str>) -> BackendResult<RawOutput> + Send + Sync>;

/// A question with two sample cases followed by two hidden cases.
pub fn sample_question(id: &str) -> Question {
    let case = |n: u32, sample: bool| {
        let label = if sample { "sample" } else { "hidden" };
        TestCase {
            id: TestCaseId::new(format!("{id}-{}{}", &label[..1], if sample { n } else { n - 2 })),
            input_data: format!("{label}-{n}"),
            expected_output: format!("{label}-{n}"),
            is_sample: sample,
            order: n,
        }
    };
    Question {
        id: id.into(),
        title: format!("Question {id}"),
        description: format!("Solve {id}"),
        difficulty: Difficulty::Easy,
        allowed_languages: Language::ALL.to_vec(),
        test_cases: vec![case(1, true), case(2, true), case(3, false), case(4, false)],
        order: 0,
        time_limit_minutes: None,
    }
}

/// An assessment in the given status with no deadline.
pub fn sample_assessment(status: AssessmentStatus) -> Assessment {
    Assessment {
        id: "1".into(),
        title: "Backend Screen".to_string(),
        description: None,
        duration_minutes: None,
        candidate_id: "cand".to_string(),
        status,
        started_at: None,
        expires_at: None,
    }
}

/// Scripted collaborator with optional gates to hold responses open.
pub struct ScriptedBackend {
    assessment: Mutex<Assessment>,
    started: Mutex<Option<Assessment>>,
    questions: Mutex<Vec<Question>>,
    load_error: Mutex<Option<BackendError>>,
    start_error: Mutex<Option<BackendError>>,
    submit_script: Mutex<VecDeque<BackendResult<VerdictReport>>>,
    execute: ExecuteFn,
    gates: Mutex<VecDeque<oneshot::Receiver<()>>>,
    stdins: Mutex<Vec<Option<String>>>,
    start_calls: AtomicUsize,
    submit_calls: AtomicUsize,
}

impl ScriptedBackend {
    /// An in-progress assessment with questions `q1` and `q2` whose programs
    /// echo their stdin.
    pub fn new() -> Self {
        Self {
            assessment: Mutex::new(sample_assessment(AssessmentStatus::InProgress)),
            started: Mutex::new(None),
            questions: Mutex::new(vec![sample_question("q1"), sample_question("q2")]),
            load_error: Mutex::new(None),
            start_error: Mutex::new(None),
            submit_script: Mutex::new(VecDeque::new()),
            execute: Box::new(|_, stdin| {
                Ok(RawOutput {
                    success: true,
                    stdout: stdin.unwrap_or_default().to_string(),
                    execution_time_ms: 5,
                    return_code: Some(0),
                    ..RawOutput::default()
                })
            }),
            gates: Mutex::new(VecDeque::new()),
            stdins: Mutex::new(Vec::new()),
            start_calls: AtomicUsize::new(0),
            submit_calls: AtomicUsize::new(0),
        }
    }

    pub fn with_execute(
        mut self,
        f: impl Fn(&str, Option<&str>) -> BackendResult<RawOutput> + Send + Sync + 'static,
    ) -> Self {
        self.execute = Box::new(f);
        self
    }

    pub fn with_assessment(self, assessment: Assessment) -> Self {
        *self.assessment.lock().unwrap() = assessment;
        self
    }

    /// The assessment returned by `start_assessment`.
    pub fn with_started(self, assessment: Assessment) -> Self {
        *self.started.lock().unwrap() = Some(assessment);
        self
    }

    pub fn with_questions(self, questions: Vec<Question>) -> Self {
        *self.questions.lock().unwrap() = questions;
        self
    }

    pub fn fail_load(self, error: BackendError) -> Self {
        *self.load_error.lock().unwrap() = Some(error);
        self
    }

    pub fn fail_start(self, error: BackendError) -> Self {
        *self.start_error.lock().unwrap() = Some(error);
        self
    }

    /// Queues the result of the next `submit` call.
    pub fn script_submit(&self, result: BackendResult<VerdictReport>) {
        self.submit_script.lock().unwrap().push_back(result);
    }

    /// Holds the next `execute` or `submit` call until the sender fires.
    pub fn hold_next(&self) -> oneshot::Sender<()> {
        let (tx, rx) = oneshot::channel();
        self.gates.lock().unwrap().push_back(rx);
        tx
    }

    pub fn executed_stdins(&self) -> Vec<Option<String>> {
        self.stdins.lock().unwrap().clone()
    }

    pub fn start_calls(&self) -> usize {
        self.start_calls.load(Ordering::SeqCst)
    }

    pub fn submit_calls(&self) -> usize {
        self.submit_calls.load(Ordering::SeqCst)
    }

    async fn pass_gate(&self) {
        let gate = self.gates.lock().unwrap().pop_front();
        if let Some(gate) = gate {
            gate.await.ok();
        }
    }

    fn all_pass_report(&self, question_id: &QuestionId) -> VerdictReport {
        let questions = self.questions.lock().unwrap();
        let verdicts = questions
            .iter()
            .find(|q| &q.id == question_id)
            .map(|q| {
                q.test_cases
                    .iter()
                    .map(|tc| Verdict {
                        test_case_id: tc.id.clone(),
                        is_sample: tc.is_sample,
                        passed: true,
                        actual_output: Some(tc.expected_output.clone()),
                        expected_output: Some(tc.expected_output.clone()),
                        error: None,
                        execution_time_ms: 3,
                    })
                    .collect()
            })
            .unwrap_or_default();
        VerdictReport {
            verdicts,
            compilation_logs: None,
            execution_logs: Some("ok".to_string()),
        }
    }
}

#[async_trait::async_trait]
impl AssessmentBackend for ScriptedBackend {
    async fn load_assessment(
        &self,
        assessment_id: &AssessmentId,
        _candidate_id: &str,
    ) -> BackendResult<Assessment> {
        if let Some(error) = self.load_error.lock().unwrap().clone() {
            return Err(error);
        }
        let assessment = self.assessment.lock().unwrap().clone();
        if &assessment.id != assessment_id {
            return Err(BackendError::not_found("Assessment not found"));
        }
        Ok(assessment)
    }

    async fn start_assessment(
        &self,
        _assessment_id: &AssessmentId,
        _candidate_id: &str,
    ) -> BackendResult<Assessment> {
        self.start_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(error) = self.start_error.lock().unwrap().clone() {
            return Err(error);
        }
        let started = self.started.lock().unwrap().clone();
        Ok(started.unwrap_or_else(|| {
            let mut assessment = self.assessment.lock().unwrap().clone();
            assessment.status = AssessmentStatus::InProgress;
            assessment
        }))
    }

    async fn load_questions(
        &self,
        _assessment_id: &AssessmentId,
        _candidate_id: &str,
    ) -> BackendResult<Vec<Question>> {
        Ok(self.questions.lock().unwrap().clone())
    }

    async fn submit(
        &self,
        _assessment_id: &AssessmentId,
        question_id: &QuestionId,
        _candidate_id: &str,
        _code: &str,
        _language: Language,
    ) -> BackendResult<VerdictReport> {
        self.submit_calls.fetch_add(1, Ordering::SeqCst);
        self.pass_gate().await;
        let scripted = self.submit_script.lock().unwrap().pop_front();
        scripted.unwrap_or_else(|| Ok(self.all_pass_report(question_id)))
    }

    async fn execute(
        &self,
        code: &str,
        _language: Language,
        stdin: Option<&str>,
    ) -> BackendResult<RawOutput> {
        self.stdins.lock().unwrap().push(stdin.map(str::to_string));
        self.pass_gate().await;
        (self.execute)(code, stdin)
    }
}
