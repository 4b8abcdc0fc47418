use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExamKind {
    Exam,
    Homework,
}

impl ExamKind {
    /// The backend tags the entity with a numeric `type` field; this is the
    /// only sanctioned source for the distinction.
    pub fn from_backend_code(code: i64) -> Option<Self> {
        match code {
            0 => Some(ExamKind::Exam),
            1 => Some(ExamKind::Homework),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ExamKind::Exam => "exam",
            ExamKind::Homework => "homework",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QuestionKind {
    Text,
    Image,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnswerKind {
    SingleChoice,
    TrueFalse,
    Essay,
    ImageUpload,
}

impl AnswerKind {
    pub fn is_choice_based(self) -> bool {
        matches!(self, AnswerKind::SingleChoice | AnswerKind::TrueFalse)
    }

    pub fn is_image_upload(self) -> bool {
        matches!(self, AnswerKind::ImageUpload)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct QuestionOption {
    pub id: String,
    pub label: String,
    /// Server-side knowledge; never rendered before submission.
    pub is_correct: bool,
}

#[derive(Debug, Clone)]
pub struct Question {
    pub id: String,
    pub exam_id: String,
    pub prompt: String,
    pub question_kind: QuestionKind,
    pub answer_kind: AnswerKind,
    pub max_score: f64,
    pub requires_manual_grading: bool,
    pub model_answer_image_url: Option<String>,
    pub options: Vec<QuestionOption>,
}

/// Immutable once fetched for an attempt; shared read-only via `Arc`.
#[derive(Debug, Clone)]
pub struct Exam {
    pub id: String,
    pub lecture_id: String,
    pub title: String,
    pub kind: ExamKind,
    pub deadline: Option<OffsetDateTime>,
    pub duration_minutes: u32,
    pub questions: Vec<Question>,
}

impl Exam {
    pub fn question(&self, question_id: &str) -> Option<&Question> {
        self.questions.iter().find(|question| question.id == question_id)
    }
}
