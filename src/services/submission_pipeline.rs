use thiserror::Error;
use tokio::task::JoinSet;
use validator::Validate;

use crate::core::config::UploadSettings;
use crate::repositories::exam_api::{ExamBackend, RepositoryError};
use crate::schemas::answer::{AnswerSubmission, SubmitAnswersRequest, UploadAnswerImageRequest};
use crate::schemas::exam::Exam;
use crate::schemas::score::ScoreResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineStep {
    SubmitAnswers,
    FetchScore,
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("invalid submission request: {0}")]
    InvalidRequest(#[from] validator::ValidationErrors),
    #[error("submission pipeline failed at {step:?}: {source}")]
    Backend {
        step: PipelineStep,
        #[source]
        source: RepositoryError,
    },
}

impl PipelineError {
    /// True when the answers never reached the backend and the whole
    /// submission must be retried; false means the answers are in and only
    /// the score retrieval needs another attempt.
    pub fn voids_submission(&self) -> bool {
        match self {
            PipelineError::InvalidRequest(_) => true,
            PipelineError::Backend { step, .. } => *step == PipelineStep::SubmitAnswers,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadFailure {
    pub question_id: String,
    pub detail: String,
}

#[derive(Debug)]
pub struct SubmissionOutcome {
    pub score: ScoreResult,
    pub upload_failures: Vec<UploadFailure>,
    /// False when images were uploaded but the follow-up score fetch could
    /// not run; the score then predates the attached image URLs.
    pub score_refreshed: bool,
}

/// Ordered commit of a finished attempt: submit the structured answers,
/// fetch the resulting score to learn the backend result id, upload any
/// image answers against that id, and re-fetch the score if uploads
/// happened. Step-1 failure is fatal; upload failures are collected.
#[derive(Debug, Clone)]
pub struct SubmissionPipeline<B> {
    backend: B,
    uploads: UploadSettings,
}

impl<B> SubmissionPipeline<B>
where
    B: ExamBackend + Clone + 'static,
{
    pub fn new(backend: B, uploads: UploadSettings) -> Self {
        Self { backend, uploads }
    }

    pub async fn submit(
        &self,
        exam: &Exam,
        student_id: &str,
        answers: Vec<AnswerSubmission>,
    ) -> Result<SubmissionOutcome, PipelineError> {
        let request = SubmitAnswersRequest {
            exam_id: exam.id.clone(),
            student_id: student_id.to_string(),
            answers,
        };
        request.validate()?;

        if let Err(source) = self.backend.submit_answers(&request).await {
            metrics::counter!("exam_submissions_total", "status" => "failed").increment(1);
            tracing::error!(exam_id = %exam.id, error = %source, "Answer submission failed");
            return Err(PipelineError::Backend { step: PipelineStep::SubmitAnswers, source });
        }
        metrics::counter!("exam_submissions_total", "status" => "ok").increment(1);

        let score = self.fetch_submitted_score(&request.exam_id, student_id).await?;

        let (uploaded, upload_failures) =
            self.upload_images(&request, &score.result_id).await;

        if uploaded == 0 {
            return Ok(SubmissionOutcome { score, upload_failures, score_refreshed: false });
        }

        // The re-fetch only widens the detail set with image URLs; losing it
        // still leaves a usable step-2 score.
        match self.backend.fetch_score(&request.exam_id, student_id).await {
            Ok(Some(refreshed)) => Ok(SubmissionOutcome {
                score: refreshed,
                upload_failures,
                score_refreshed: true,
            }),
            Ok(None) => {
                tracing::warn!(exam_id = %request.exam_id, "Score missing on re-fetch");
                Ok(SubmissionOutcome { score, upload_failures, score_refreshed: false })
            }
            Err(err) => {
                tracing::warn!(exam_id = %request.exam_id, error = %err, "Score re-fetch failed");
                Ok(SubmissionOutcome { score, upload_failures, score_refreshed: false })
            }
        }
    }

    async fn fetch_submitted_score(
        &self,
        exam_id: &str,
        student_id: &str,
    ) -> Result<ScoreResult, PipelineError> {
        match self.backend.fetch_score(exam_id, student_id).await {
            Ok(Some(score)) => Ok(score),
            Ok(None) => Err(PipelineError::Backend {
                step: PipelineStep::FetchScore,
                source: RepositoryError::Malformed {
                    endpoint: "fetch_score",
                    detail: "score missing after successful submission".to_string(),
                },
            }),
            Err(source) => {
                Err(PipelineError::Backend { step: PipelineStep::FetchScore, source })
            }
        }
    }

    /// Uploads every file-bearing answer concurrently. Ordering between
    /// uploads is unspecified; each is keyed to its own question id.
    async fn upload_images(
        &self,
        request: &SubmitAnswersRequest,
        result_id: &str,
    ) -> (usize, Vec<UploadFailure>) {
        let mut failures = Vec::new();
        let mut tasks = JoinSet::new();

        for answer in &request.answers {
            let Some(file) = answer.image.clone() else {
                continue;
            };

            if !self.uploads.allows_filename(&file.filename) {
                failures.push(UploadFailure {
                    question_id: answer.question_id.clone(),
                    detail: format!("file type of '{}' is not allowed", file.filename),
                });
                continue;
            }
            if file.bytes.len() as u64 > self.uploads.max_upload_size_bytes() {
                failures.push(UploadFailure {
                    question_id: answer.question_id.clone(),
                    detail: format!(
                        "file exceeds the {} MB upload limit",
                        self.uploads.max_upload_size_mb
                    ),
                });
                continue;
            }

            let backend = self.backend.clone();
            let upload = UploadAnswerImageRequest {
                exam_id: request.exam_id.clone(),
                student_id: request.student_id.clone(),
                question_id: answer.question_id.clone(),
                result_id: result_id.to_string(),
                file,
            };

            tasks.spawn(async move {
                let question_id = upload.question_id.clone();
                (question_id, backend.upload_answer_image(&upload).await)
            });
        }

        let mut uploaded = 0;
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((question_id, Ok(url))) => {
                    uploaded += 1;
                    metrics::counter!("answer_image_uploads_total", "status" => "ok").increment(1);
                    tracing::debug!(question_id = %question_id, url = %url, "Answer image stored");
                }
                Ok((question_id, Err(err))) => {
                    metrics::counter!("answer_image_uploads_total", "status" => "failed")
                        .increment(1);
                    tracing::error!(question_id = %question_id, error = %err, "Answer image upload failed");
                    failures.push(UploadFailure { question_id, detail: err.to_string() });
                }
                Err(join_error) => {
                    tracing::error!(error = %join_error, "Answer image upload task aborted");
                }
            }
        }

        (uploaded, failures)
    }
}
