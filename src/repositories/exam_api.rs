use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde_json::Value;
use thiserror::Error;

use crate::core::config::Settings;
use crate::repositories::normalize;
use crate::schemas::access::AccessDecision;
use crate::schemas::answer::{SubmitAnswersRequest, UploadAnswerImageRequest};
use crate::schemas::exam::Exam;
use crate::schemas::score::ScoreResult;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("request to {endpoint} failed: {source}")]
    Transport {
        endpoint: &'static str,
        #[source]
        source: reqwest::Error,
    },
    #[error("{endpoint} returned status {status}: {detail}")]
    Status { endpoint: &'static str, status: u16, detail: String },
    #[error("{endpoint} returned a malformed payload: {detail}")]
    Malformed { endpoint: &'static str, detail: String },
}

impl RepositoryError {
    pub fn is_transport(&self) -> bool {
        matches!(self, RepositoryError::Transport { .. })
    }
}

/// Remote API surface the exam lifecycle consumes. Pure I/O; no business
/// rules live behind this trait.
#[async_trait]
pub trait ExamBackend: Send + Sync {
    /// `None` when the lecture has no exam attached.
    async fn fetch_exam(&self, lecture_id: &str) -> Result<Option<Exam>, RepositoryError>;

    async fn check_access(
        &self,
        exam_id: &str,
        student_id: &str,
    ) -> Result<AccessDecision, RepositoryError>;

    /// `None` when the student has no attempt yet (backend 404).
    async fn fetch_score(
        &self,
        exam_id: &str,
        student_id: &str,
    ) -> Result<Option<ScoreResult>, RepositoryError>;

    async fn submit_answers(&self, request: &SubmitAnswersRequest)
        -> Result<(), RepositoryError>;

    /// Returns the stored URL of the uploaded image.
    async fn upload_answer_image(
        &self,
        request: &UploadAnswerImageRequest,
    ) -> Result<String, RepositoryError>;
}

#[derive(Debug, Clone)]
pub struct HttpExamRepository {
    client: Client,
    base_url: String,
    bearer_token: Option<String>,
}

impl HttpExamRepository {
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let api = settings.api();
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(api.connect_timeout_seconds))
            .timeout(Duration::from_secs(api.timeout_seconds))
            .build()
            .context("Failed to build exam API HTTP client")?;

        Ok(Self {
            client,
            base_url: api.base_url.trim_end_matches('/').to_string(),
            bearer_token: api.bearer_token.clone(),
        })
    }

    fn authorized(&self, builder: RequestBuilder) -> RequestBuilder {
        match &self.bearer_token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    async fn read_json(
        response: Response,
        endpoint: &'static str,
    ) -> Result<Value, RepositoryError> {
        let status = response.status();
        let raw_body = response
            .text()
            .await
            .map_err(|source| RepositoryError::Transport { endpoint, source })?;

        let parsed = serde_json::from_str::<Value>(&raw_body).map_err(|err| {
            RepositoryError::Malformed {
                endpoint,
                detail: format!("non-JSON body (status {status}): {err}"),
            }
        })?;

        if !status.is_success() {
            return Err(RepositoryError::Status {
                endpoint,
                status: status.as_u16(),
                detail: normalize::extract_error_message(&parsed),
            });
        }

        Ok(parsed)
    }
}

#[async_trait]
impl ExamBackend for HttpExamRepository {
    async fn fetch_exam(&self, lecture_id: &str) -> Result<Option<Exam>, RepositoryError> {
        const ENDPOINT: &str = "fetch_exam";

        let url = format!("{}/lectures/{}/exam", self.base_url, lecture_id);
        let response = self
            .authorized(self.client.get(&url))
            .send()
            .await
            .map_err(|source| RepositoryError::Transport { endpoint: ENDPOINT, source })?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }

        let payload = Self::read_json(response, ENDPOINT).await?;
        if payload.is_null() {
            return Ok(None);
        }

        normalize::normalize_exam(&payload)
            .map(Some)
            .map_err(|detail| RepositoryError::Malformed { endpoint: ENDPOINT, detail })
    }

    async fn check_access(
        &self,
        exam_id: &str,
        student_id: &str,
    ) -> Result<AccessDecision, RepositoryError> {
        const ENDPOINT: &str = "check_access";

        let url = format!("{}/exams/{}/access", self.base_url, exam_id);
        let response = self
            .authorized(self.client.get(&url).query(&[("student_id", student_id)]))
            .send()
            .await
            .map_err(|source| RepositoryError::Transport { endpoint: ENDPOINT, source })?;

        let payload = Self::read_json(response, ENDPOINT).await?;

        Ok(normalize::normalize_access(&payload, exam_id, student_id))
    }

    async fn fetch_score(
        &self,
        exam_id: &str,
        student_id: &str,
    ) -> Result<Option<ScoreResult>, RepositoryError> {
        const ENDPOINT: &str = "fetch_score";

        let url = format!("{}/exams/{}/scores/{}", self.base_url, exam_id, student_id);
        let response = self
            .authorized(self.client.get(&url))
            .send()
            .await
            .map_err(|source| RepositoryError::Transport { endpoint: ENDPOINT, source })?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }

        let payload = Self::read_json(response, ENDPOINT).await?;

        normalize::normalize_score(&payload)
            .map(Some)
            .map_err(|detail| RepositoryError::Malformed { endpoint: ENDPOINT, detail })
    }

    async fn submit_answers(
        &self,
        request: &SubmitAnswersRequest,
    ) -> Result<(), RepositoryError> {
        const ENDPOINT: &str = "submit_answers";

        let url = format!("{}/exams/{}/answers", self.base_url, request.exam_id);
        let response = self
            .authorized(self.client.post(&url).json(request))
            .send()
            .await
            .map_err(|source| RepositoryError::Transport { endpoint: ENDPOINT, source })?;

        Self::read_json(response, ENDPOINT).await?;

        Ok(())
    }

    async fn upload_answer_image(
        &self,
        request: &UploadAnswerImageRequest,
    ) -> Result<String, RepositoryError> {
        const ENDPOINT: &str = "upload_answer_image";

        let part = Part::bytes(request.file.bytes.clone())
            .file_name(request.file.filename.clone())
            .mime_str(&request.file.mime_type)
            .map_err(|_| RepositoryError::Malformed {
                endpoint: ENDPOINT,
                detail: format!("invalid mime type '{}'", request.file.mime_type),
            })?;

        let form = Form::new()
            .text("exam_id", request.exam_id.clone())
            .text("student_id", request.student_id.clone())
            .text("question_id", request.question_id.clone())
            .text("result_id", request.result_id.clone())
            .part("file", part);

        let url = format!("{}/exams/{}/answers/images", self.base_url, request.exam_id);
        let response = self
            .authorized(self.client.post(&url).multipart(form))
            .send()
            .await
            .map_err(|source| RepositoryError::Transport { endpoint: ENDPOINT, source })?;

        let payload = Self::read_json(response, ENDPOINT).await?;

        normalize::normalize_upload_url(&payload).ok_or_else(|| RepositoryError::Malformed {
            endpoint: ENDPOINT,
            detail: "upload response missing stored URL".to_string(),
        })
    }
}
