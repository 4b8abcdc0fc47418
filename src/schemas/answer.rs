use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::Serialize;
use thiserror::Error;
use validator::Validate;

/// A file the student attached locally; held in memory until the pipeline
/// uploads it against the backend-assigned result id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnswerFile {
    pub filename: String,
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Error)]
pub enum DataUrlError {
    #[error("not a data URL")]
    NotADataUrl,
    #[error("data URL does not carry an image payload: {0}")]
    NotAnImage(String),
    #[error("data URL is not base64-encoded")]
    NotBase64,
    #[error("invalid base64 payload")]
    InvalidPayload,
}

impl AnswerFile {
    /// Decodes a clipboard image arriving as a `data:image/...;base64,` URL,
    /// the shape paste buffers hand over in embedded web views.
    pub fn from_data_url(data_url: &str) -> Result<Self, DataUrlError> {
        let rest = data_url.strip_prefix("data:").ok_or(DataUrlError::NotADataUrl)?;
        let (header, payload) = rest.split_once(',').ok_or(DataUrlError::NotADataUrl)?;

        let (mime_type, encoding) = match header.split_once(';') {
            Some((mime, encoding)) => (mime, Some(encoding)),
            None => (header, None),
        };

        if !mime_type.starts_with("image/") {
            return Err(DataUrlError::NotAnImage(mime_type.to_string()));
        }

        if encoding != Some("base64") {
            return Err(DataUrlError::NotBase64);
        }

        let bytes = STANDARD.decode(payload).map_err(|_| DataUrlError::InvalidPayload)?;
        let extension = mime_type.strip_prefix("image/").unwrap_or("png");

        Ok(Self {
            filename: format!("clipboard.{extension}"),
            mime_type: mime_type.to_string(),
            bytes,
        })
    }
}

/// Working answer for one question. The enum carries exactly one of the
/// three answer modes, so replacing it clears the previous mode.
#[derive(Debug, Clone, PartialEq)]
pub enum AnswerInput {
    Options(Vec<String>),
    Text(String),
    Image(AnswerFile),
}

impl AnswerInput {
    pub fn is_empty(&self) -> bool {
        match self {
            AnswerInput::Options(selected) => selected.is_empty(),
            AnswerInput::Text(text) => text.trim().is_empty(),
            AnswerInput::Image(_) => false,
        }
    }
}

/// Finalized wire form. Every question of the exam gets exactly one of
/// these on submit, answered or not, so the backend can treat "no answer"
/// uniformly as zero credit instead of a missing field.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnswerSubmission {
    pub question_id: String,
    pub selected_option_ids: Vec<String>,
    pub text_answer: String,
    pub has_image_attachment: bool,
    #[serde(skip)]
    pub image: Option<AnswerFile>,
}

impl AnswerSubmission {
    pub fn empty(question_id: &str) -> Self {
        Self {
            question_id: question_id.to_string(),
            selected_option_ids: Vec::new(),
            text_answer: String::new(),
            has_image_attachment: false,
            image: None,
        }
    }

    pub fn from_input(question_id: &str, input: &AnswerInput) -> Self {
        let mut submission = Self::empty(question_id);
        match input {
            AnswerInput::Options(selected) => submission.selected_option_ids = selected.clone(),
            AnswerInput::Text(text) => submission.text_answer = text.clone(),
            AnswerInput::Image(file) => {
                submission.has_image_attachment = true;
                submission.image = Some(file.clone());
            }
        }
        submission
    }
}

#[derive(Debug, Clone, Serialize, Validate)]
pub struct SubmitAnswersRequest {
    #[validate(length(min = 1, message = "exam_id must not be empty"))]
    pub exam_id: String,
    #[validate(length(min = 1, message = "student_id must not be empty"))]
    pub student_id: String,
    #[validate(length(min = 1, message = "answers must not be empty"))]
    pub answers: Vec<AnswerSubmission>,
}

#[derive(Debug, Clone, Validate)]
pub struct UploadAnswerImageRequest {
    #[validate(length(min = 1, message = "exam_id must not be empty"))]
    pub exam_id: String,
    #[validate(length(min = 1, message = "student_id must not be empty"))]
    pub student_id: String,
    #[validate(length(min = 1, message = "question_id must not be empty"))]
    pub question_id: String,
    #[validate(length(min = 1, message = "result_id must not be empty"))]
    pub result_id: String,
    pub file: AnswerFile,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn data_url_decodes_into_answer_file() {
        // "hi" in base64.
        let file = AnswerFile::from_data_url("data:image/png;base64,aGk=").expect("decode");
        assert_eq!(file.filename, "clipboard.png");
        assert_eq!(file.mime_type, "image/png");
        assert_eq!(file.bytes, b"hi");
    }

    #[test]
    fn data_url_rejects_non_image_payloads() {
        let err = AnswerFile::from_data_url("data:text/plain;base64,aGk=").unwrap_err();
        assert!(matches!(err, DataUrlError::NotAnImage(_)));
    }

    #[test]
    fn data_url_rejects_unencoded_payloads() {
        let err = AnswerFile::from_data_url("data:image/png,rawbytes").unwrap_err();
        assert!(matches!(err, DataUrlError::NotBase64));
        assert!(matches!(
            AnswerFile::from_data_url("plain text").unwrap_err(),
            DataUrlError::NotADataUrl
        ));
    }

    #[test]
    fn blank_text_counts_as_empty() {
        assert!(AnswerInput::Text("   ".to_string()).is_empty());
        assert!(AnswerInput::Options(Vec::new()).is_empty());
        assert!(!AnswerInput::Text("answer".to_string()).is_empty());
    }

    #[test]
    fn submission_from_input_populates_one_mode() {
        let from_text = AnswerSubmission::from_input("q1", &AnswerInput::Text("essay".into()));
        assert_eq!(from_text.text_answer, "essay");
        assert!(from_text.selected_option_ids.is_empty());
        assert!(!from_text.has_image_attachment);

        let from_options =
            AnswerSubmission::from_input("q1", &AnswerInput::Options(vec!["o1".into()]));
        assert_eq!(from_options.selected_option_ids, vec!["o1".to_string()]);
        assert!(from_options.text_answer.is_empty());
    }
}
