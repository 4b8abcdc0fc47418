use std::collections::HashMap;
use std::sync::Arc;

use thiserror::Error;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::core::time::countdown_seconds;
use crate::schemas::answer::{AnswerFile, AnswerInput, AnswerSubmission, DataUrlError};
use crate::schemas::exam::{Exam, Question};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptState {
    InProgress,
    Submitting,
    Closed,
}

#[derive(Debug)]
pub enum AttemptEvent {
    Tick { remaining_seconds: u64 },
    Expired { answers: Vec<AnswerSubmission> },
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SubmitBlocked {
    #[error("{answered} of {total} questions answered")]
    Incomplete { answered: usize, total: usize },
    #[error("submission already started")]
    AlreadySubmitting,
}

#[derive(Debug, Error)]
pub enum PasteRejected {
    #[error("question not found")]
    UnknownQuestion,
    #[error("question does not take an image answer")]
    NotAnImageQuestion,
    #[error("attempt is no longer editable")]
    NotEditable,
    #[error(transparent)]
    Decode(#[from] DataUrlError),
}

/// One student's in-progress effort at a single exam instance. Lives only
/// in memory; dropping it mid-attempt abandons the draft with no backend
/// call, and nothing of it survives a reload.
pub struct AttemptSession {
    attempt_id: Uuid,
    exam: Arc<Exam>,
    student_id: String,
    answers: HashMap<String, AnswerInput>,
    remaining_seconds: u64,
    current_index: usize,
    state: AttemptState,
}

impl AttemptSession {
    pub fn new(exam: Arc<Exam>, student_id: &str) -> Self {
        let remaining_seconds = countdown_seconds(exam.duration_minutes);

        tracing::info!(
            exam_id = %exam.id,
            kind = exam.kind.as_str(),
            student_id,
            remaining_seconds,
            "Starting exam attempt"
        );

        Self {
            attempt_id: Uuid::new_v4(),
            exam,
            student_id: student_id.to_string(),
            answers: HashMap::new(),
            remaining_seconds,
            current_index: 0,
            state: AttemptState::InProgress,
        }
    }

    pub fn attempt_id(&self) -> Uuid {
        self.attempt_id
    }

    pub fn exam(&self) -> &Exam {
        &self.exam
    }

    pub fn student_id(&self) -> &str {
        &self.student_id
    }

    pub fn state(&self) -> AttemptState {
        self.state
    }

    pub fn remaining_seconds(&self) -> u64 {
        self.remaining_seconds
    }

    pub fn current_question(&self) -> Option<&Question> {
        self.exam.questions.get(self.current_index)
    }

    pub fn select_question(&mut self, index: usize) {
        if index < self.exam.questions.len() {
            self.current_index = index;
        }
    }

    /// Replaces the working answer for a question. The `AnswerInput` enum
    /// carries exactly one answer mode, so switching modes clears the
    /// previous one. No-op once the session has left `InProgress`.
    pub fn set_answer(&mut self, question_id: &str, input: AnswerInput) -> bool {
        if self.state != AttemptState::InProgress {
            tracing::debug!(question_id, "Ignoring answer change outside InProgress");
            return false;
        }

        if self.exam.question(question_id).is_none() {
            tracing::warn!(question_id, "Ignoring answer for unknown question");
            return false;
        }

        self.answers.insert(question_id.to_string(), input);
        true
    }

    /// Accepts a clipboard image for the question as if it were a file
    /// selection. Only image-upload questions take one.
    pub fn paste_image(&mut self, question_id: &str, data_url: &str) -> Result<(), PasteRejected> {
        if self.state != AttemptState::InProgress {
            return Err(PasteRejected::NotEditable);
        }

        let question = self.exam.question(question_id).ok_or(PasteRejected::UnknownQuestion)?;
        if !question.answer_kind.is_image_upload() {
            return Err(PasteRejected::NotAnImageQuestion);
        }

        let file = AnswerFile::from_data_url(data_url)?;
        self.answers.insert(question_id.to_string(), AnswerInput::Image(file));

        Ok(())
    }

    pub fn is_question_answered(&self, question_id: &str) -> bool {
        self.answers.get(question_id).is_some_and(|input| !input.is_empty())
    }

    pub fn answered_count(&self) -> usize {
        self.exam
            .questions
            .iter()
            .filter(|question| self.is_question_answered(&question.id))
            .count()
    }

    pub fn completion_ratio(&self) -> f64 {
        let total = self.exam.questions.len();
        if total == 0 {
            return 1.0;
        }
        self.answered_count() as f64 / total as f64
    }

    /// One countdown second. Reaching zero moves the session to
    /// `Submitting` with whatever answers exist at that moment.
    pub fn tick(&mut self) -> Option<AttemptEvent> {
        if self.state != AttemptState::InProgress {
            return None;
        }

        self.remaining_seconds = self.remaining_seconds.saturating_sub(1);
        if self.remaining_seconds > 0 {
            return Some(AttemptEvent::Tick { remaining_seconds: self.remaining_seconds });
        }

        self.state = AttemptState::Submitting;
        metrics::counter!("exam_attempt_timeouts_total").increment(1);
        tracing::info!(
            exam_id = %self.exam.id,
            answered = self.answered_count(),
            total = self.exam.questions.len(),
            "Attempt timed out, submitting current answers"
        );

        Some(AttemptEvent::Expired { answers: self.finalize() })
    }

    /// Manual submission. Gated on every question being answered; the
    /// timeout path has no such gate. Idempotent against a near-simultaneous
    /// timeout: a second trigger reports `AlreadySubmitting`.
    pub fn begin_manual_submit(&mut self) -> Result<Vec<AnswerSubmission>, SubmitBlocked> {
        if self.state != AttemptState::InProgress {
            return Err(SubmitBlocked::AlreadySubmitting);
        }

        let answered = self.answered_count();
        let total = self.exam.questions.len();
        if answered < total {
            return Err(SubmitBlocked::Incomplete { answered, total });
        }

        self.state = AttemptState::Submitting;
        Ok(self.finalize())
    }

    pub fn close(&mut self) {
        self.state = AttemptState::Closed;
        self.answers.clear();
    }

    /// One finalized answer per question in exam order, answered or not, so
    /// the submission payload always covers the full question set.
    fn finalize(&self) -> Vec<AnswerSubmission> {
        self.exam
            .questions
            .iter()
            .map(|question| match self.answers.get(&question.id) {
                Some(input) => AnswerSubmission::from_input(&question.id, input),
                None => AnswerSubmission::empty(&question.id),
            })
            .collect()
    }
}

/// Drives the one-second countdown, forwarding events to the presentation
/// layer. Ticks independently of any in-flight network call and stops once
/// the session leaves `InProgress` or the receiver goes away.
pub fn run_countdown(
    session: Arc<Mutex<AttemptSession>>,
    events: mpsc::Sender<AttemptEvent>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(std::time::Duration::from_secs(1));
        // The first tick of a tokio interval fires immediately.
        interval.tick().await;

        loop {
            interval.tick().await;

            let event = session.lock().await.tick();
            let Some(event) = event else {
                break;
            };

            let expired = matches!(event, AttemptEvent::Expired { .. });
            if events.send(event).await.is_err() || expired {
                break;
            }
        }
    })
}
