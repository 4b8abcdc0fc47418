use std::sync::Arc;

use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;

use crate::core::config::UploadSettings;
use crate::repositories::exam_api::{ExamBackend, RepositoryError};
use crate::schemas::answer::AnswerSubmission;
use crate::schemas::exam::Exam;
use crate::schemas::score::ScoreResult;
use crate::services::attempt::{run_countdown, AttemptEvent, AttemptSession};
use crate::services::exam_access::{decide_from_check, AccessOutcome, DenyReason};
use crate::services::score_summary::{aggregate, performance, Performance, ScoreSummary};
use crate::services::submission_pipeline::{
    PipelineError, SubmissionPipeline, UploadFailure,
};

/// Live handle on a started attempt: the shared session, the countdown
/// event stream for the presentation layer, and the ticking task itself.
pub struct AttemptHandle {
    pub session: Arc<Mutex<AttemptSession>>,
    pub events: mpsc::Receiver<AttemptEvent>,
    pub countdown: JoinHandle<()>,
}

#[derive(Debug)]
pub struct GradedAttempt {
    pub score: ScoreResult,
    pub summary: ScoreSummary,
    pub performance: Performance,
    pub upload_failures: Vec<UploadFailure>,
    pub score_refreshed: bool,
}

/// Wires the lifecycle components over one backend: gate entry, collect
/// answers, commit them, summarize the result.
pub struct ExamFlow<B> {
    backend: B,
    pipeline: SubmissionPipeline<B>,
}

impl<B> ExamFlow<B>
where
    B: ExamBackend + Clone + 'static,
{
    pub fn new(backend: B, uploads: UploadSettings) -> Self {
        let pipeline = SubmissionPipeline::new(backend.clone(), uploads);
        Self { backend, pipeline }
    }

    pub async fn load_exam(&self, lecture_id: &str) -> Result<Option<Exam>, RepositoryError> {
        self.backend.fetch_exam(lecture_id).await
    }

    /// Entry gate for one exam visit: fetches whatever score is already on
    /// record, asks the backend for an access verdict, and folds both into
    /// an `AccessOutcome`. Fail-closed on connectivity problems.
    pub async fn check_entry(&self, exam_id: &str, student_id: &str) -> AccessOutcome {
        let prior = match self.backend.fetch_score(exam_id, student_id).await {
            Ok(prior) => prior,
            Err(err) if err.is_transport() => {
                tracing::error!(exam_id, error = %err, "Prior score fetch failed, denying entry");
                return AccessOutcome::Deny(DenyReason::Connectivity);
            }
            Err(err) => {
                tracing::warn!(exam_id, error = %err, "Prior score unreadable, treating as absent");
                None
            }
        };

        let check = self.backend.check_access(exam_id, student_id).await;
        decide_from_check(check, prior)
    }

    pub fn start_attempt(&self, exam: Arc<Exam>, student_id: &str) -> AttemptHandle {
        let session = Arc::new(Mutex::new(AttemptSession::new(exam, student_id)));
        let (tx, events) = mpsc::channel(32);
        let countdown = run_countdown(session.clone(), tx);

        AttemptHandle { session, events, countdown }
    }

    /// Commits a finalized answer set and turns the returned score into a
    /// display-ready summary.
    pub async fn submit_attempt(
        &self,
        exam: &Exam,
        student_id: &str,
        answers: Vec<AnswerSubmission>,
    ) -> Result<GradedAttempt, PipelineError> {
        let outcome = self.pipeline.submit(exam, student_id, answers).await?;
        let summary = aggregate(&outcome.score);
        let performance = performance(&summary);

        tracing::info!(
            exam_id = %exam.id,
            student_points = summary.student_points,
            pending = summary.pending_count,
            upload_failures = outcome.upload_failures.len(),
            "Attempt graded"
        );

        Ok(GradedAttempt {
            score: outcome.score,
            summary,
            performance,
            upload_failures: outcome.upload_failures,
            score_refreshed: outcome.score_refreshed,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex as StdMutex;

    use async_trait::async_trait;

    use super::*;
    use crate::schemas::access::AccessDecision;
    use crate::schemas::answer::{AnswerInput, SubmitAnswersRequest, UploadAnswerImageRequest};
    use crate::schemas::exam::{AnswerKind, ExamKind, Question, QuestionKind, QuestionOption};
    use crate::schemas::score::{AnswerDetail, OptionResult};
    use crate::services::attempt::AttemptState;
    use crate::services::exam_access::EntryKind;

    #[derive(Clone)]
    struct ScriptedBackend {
        can_access: bool,
        prior_score: Option<ScoreResult>,
        score_error: bool,
        graded_score: Option<ScoreResult>,
        submitted: Arc<StdMutex<Vec<SubmitAnswersRequest>>>,
    }

    impl ScriptedBackend {
        fn new() -> Self {
            Self {
                can_access: true,
                prior_score: None,
                score_error: false,
                graded_score: None,
                submitted: Arc::new(StdMutex::new(Vec::new())),
            }
        }
    }

    #[async_trait]
    impl ExamBackend for ScriptedBackend {
        async fn fetch_exam(&self, lecture_id: &str) -> Result<Option<Exam>, RepositoryError> {
            Ok(Some(mixed_exam(lecture_id)))
        }

        async fn check_access(
            &self,
            exam_id: &str,
            student_id: &str,
        ) -> Result<AccessDecision, RepositoryError> {
            Ok(AccessDecision {
                exam_id: exam_id.to_string(),
                student_id: student_id.to_string(),
                can_access_exam: self.can_access,
                deadline: None,
                extended_deadline: None,
                message: None,
            })
        }

        async fn fetch_score(
            &self,
            _exam_id: &str,
            _student_id: &str,
        ) -> Result<Option<ScoreResult>, RepositoryError> {
            if self.score_error {
                return Err(RepositoryError::Malformed {
                    endpoint: "fetch_score",
                    detail: "unparseable score payload".to_string(),
                });
            }
            if self.submitted.lock().unwrap().is_empty() {
                Ok(self.prior_score.clone())
            } else {
                Ok(self.graded_score.clone())
            }
        }

        async fn submit_answers(
            &self,
            request: &SubmitAnswersRequest,
        ) -> Result<(), RepositoryError> {
            self.submitted.lock().unwrap().push(request.clone());
            Ok(())
        }

        async fn upload_answer_image(
            &self,
            request: &UploadAnswerImageRequest,
        ) -> Result<String, RepositoryError> {
            Ok(format!("https://files.test/{}", request.question_id))
        }
    }

    fn mixed_exam(lecture_id: &str) -> Exam {
        let mcq = |id: &str| Question {
            id: id.to_string(),
            exam_id: "e1".to_string(),
            prompt: format!("choose {id}"),
            question_kind: QuestionKind::Text,
            answer_kind: AnswerKind::SingleChoice,
            max_score: 5.0,
            requires_manual_grading: false,
            model_answer_image_url: None,
            options: vec![
                QuestionOption { id: format!("{id}-a"), label: "A".to_string(), is_correct: true },
                QuestionOption { id: format!("{id}-b"), label: "B".to_string(), is_correct: false },
            ],
        };

        Exam {
            id: "e1".to_string(),
            lecture_id: lecture_id.to_string(),
            title: "Midterm".to_string(),
            kind: ExamKind::Exam,
            deadline: None,
            duration_minutes: 30,
            questions: vec![
                mcq("q1"),
                Question {
                    id: "q2".to_string(),
                    exam_id: "e1".to_string(),
                    prompt: "explain".to_string(),
                    question_kind: QuestionKind::Text,
                    answer_kind: AnswerKind::Essay,
                    max_score: 10.0,
                    requires_manual_grading: true,
                    model_answer_image_url: None,
                    options: Vec::new(),
                },
                mcq("q3"),
            ],
        }
    }

    fn graded_mixed_score() -> ScoreResult {
        let option = |id: &str, is_correct: bool, was_selected: bool| OptionResult {
            option_id: id.to_string(),
            label: id.to_uppercase(),
            is_correct,
            was_selected,
        };

        ScoreResult {
            exam_id: "e1".to_string(),
            exam_title: "Midterm".to_string(),
            result_id: "r1".to_string(),
            total_score: 5.0,
            is_fully_graded: false,
            submitted_at: None,
            details: vec![
                AnswerDetail {
                    question_id: "q1".to_string(),
                    question_text: "choose q1".to_string(),
                    question_kind: QuestionKind::Text,
                    answer_kind: AnswerKind::SingleChoice,
                    max_score: 5.0,
                    requires_manual_grading: false,
                    points_earned: Some(5.0),
                    options: vec![option("q1-a", true, true), option("q1-b", false, false)],
                    text_answer: None,
                    image_answer_url: None,
                    feedback: None,
                    graded_by: None,
                    model_answer_image_url: None,
                },
                AnswerDetail {
                    question_id: "q2".to_string(),
                    question_text: "explain".to_string(),
                    question_kind: QuestionKind::Text,
                    answer_kind: AnswerKind::Essay,
                    max_score: 10.0,
                    requires_manual_grading: true,
                    points_earned: None,
                    options: Vec::new(),
                    text_answer: Some("essay".to_string()),
                    image_answer_url: None,
                    feedback: None,
                    graded_by: None,
                    model_answer_image_url: None,
                },
                AnswerDetail {
                    question_id: "q3".to_string(),
                    question_text: "choose q3".to_string(),
                    question_kind: QuestionKind::Text,
                    answer_kind: AnswerKind::SingleChoice,
                    max_score: 5.0,
                    requires_manual_grading: false,
                    points_earned: Some(0.0),
                    options: vec![option("q3-a", true, false), option("q3-b", false, true)],
                    text_answer: None,
                    image_answer_url: None,
                    feedback: None,
                    graded_by: None,
                    model_answer_image_url: None,
                },
            ],
        }
    }

    fn uploads_settings() -> UploadSettings {
        UploadSettings {
            max_upload_size_mb: 10,
            allowed_image_extensions: vec!["png".to_string()],
        }
    }

    #[tokio::test]
    async fn entry_without_prior_score_is_fresh() {
        let flow = ExamFlow::new(ScriptedBackend::new(), uploads_settings());

        match flow.check_entry("e1", "s1").await {
            AccessOutcome::Enter(EntryKind::Fresh) => {}
            other => panic!("expected fresh entry, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn unreadable_prior_score_is_treated_as_absent() {
        let mut backend = ScriptedBackend::new();
        backend.score_error = true;
        let flow = ExamFlow::new(backend, uploads_settings());

        match flow.check_entry("e1", "s1").await {
            AccessOutcome::Enter(EntryKind::Fresh) => {}
            other => panic!("expected fresh entry on recoverable score error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn entry_with_prior_score_and_open_exam_shows_results() {
        let mut backend = ScriptedBackend::new();
        backend.prior_score = Some(graded_mixed_score());
        let flow = ExamFlow::new(backend, uploads_settings());

        match flow.check_entry("e1", "s1").await {
            AccessOutcome::ShowResults(score) => assert_eq!(score.result_id, "r1"),
            other => panic!("expected results, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn full_attempt_reports_partially_graded_summary() {
        let mut backend = ScriptedBackend::new();
        backend.graded_score = Some(graded_mixed_score());
        let flow = ExamFlow::new(backend.clone(), uploads_settings());

        let exam = Arc::new(flow.load_exam("l1").await.expect("load").expect("exam"));
        let handle = flow.start_attempt(exam.clone(), "s1");

        let answers = {
            let mut session = handle.session.lock().await;
            session.set_answer("q1", AnswerInput::Options(vec!["q1-a".to_string()]));
            session.set_answer("q2", AnswerInput::Text("my essay".to_string()));
            session.set_answer("q3", AnswerInput::Options(vec!["q3-b".to_string()]));
            session.begin_manual_submit().expect("complete attempt")
        };
        assert_eq!(answers.len(), 3);

        let graded = flow.submit_attempt(&exam, "s1", answers).await.expect("submit");

        assert_eq!(graded.summary.pending_count, 1);
        assert_eq!(graded.summary.correct_count, 1);
        assert_eq!(graded.summary.wrong_count, 1);
        assert!(!graded.summary.is_fully_graded);
        assert_eq!(graded.summary.percentage, 0.5);
        assert!(graded.performance.provisional);

        let mut session = handle.session.lock().await;
        assert_eq!(session.state(), AttemptState::Submitting);
        session.close();
        assert_eq!(session.state(), AttemptState::Closed);
    }
}
