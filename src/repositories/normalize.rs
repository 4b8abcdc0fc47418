//! Folds the backend's inconsistently-cased, alias-ridden JSON into the
//! canonical shapes in `schemas`. Everything above the repository layer
//! works against those shapes only.

use serde_json::Value;

use crate::core::time::parse_timestamp;
use crate::schemas::access::AccessDecision;
use crate::schemas::exam::{AnswerKind, Exam, ExamKind, Question, QuestionKind, QuestionOption};
use crate::schemas::score::{dedupe_answer_details, AnswerDetail, OptionResult, ScoreResult};

/// Looks a field up under any of its known alias keys, falling back to a
/// case-insensitive scan so PascalCase variants of an alias still resolve.
fn field<'a>(payload: &'a Value, names: &[&str]) -> Option<&'a Value> {
    let object = payload.as_object()?;

    for name in names {
        if let Some(value) = object.get(*name) {
            return Some(value);
        }
    }

    for name in names {
        for (key, value) in object {
            if key.eq_ignore_ascii_case(name) {
                return Some(value);
            }
        }
    }

    None
}

fn str_field(payload: &Value, names: &[&str]) -> Option<String> {
    field(payload, names)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

fn bool_field(payload: &Value, names: &[&str]) -> Option<bool> {
    let value = field(payload, names)?;

    if let Some(flag) = value.as_bool() {
        return Some(flag);
    }
    if let Some(number) = value.as_i64() {
        return Some(number != 0);
    }
    if let Some(text) = value.as_str() {
        return match text.to_ascii_lowercase().as_str() {
            "true" | "1" | "yes" => Some(true),
            "false" | "0" | "no" => Some(false),
            _ => None,
        };
    }

    None
}

fn f64_field(payload: &Value, names: &[&str]) -> Option<f64> {
    let value = field(payload, names)?;
    value.as_f64().or_else(|| value.as_str().and_then(|text| text.trim().parse().ok()))
}

fn timestamp_field(payload: &Value, names: &[&str]) -> Option<time::OffsetDateTime> {
    str_field(payload, names).as_deref().and_then(parse_timestamp)
}

fn array_field<'a>(payload: &'a Value, names: &[&str]) -> Option<&'a Vec<Value>> {
    field(payload, names).and_then(Value::as_array)
}

pub(crate) fn normalize_exam(payload: &Value) -> Result<Exam, String> {
    let id = str_field(payload, &["id", "examId"]).ok_or("exam payload missing id")?;
    let lecture_id =
        str_field(payload, &["lectureId", "lecture_id"]).ok_or("exam payload missing lecture id")?;
    let title = str_field(payload, &["title", "name"]).unwrap_or_default();

    let kind = match field(payload, &["type", "examType"]).and_then(Value::as_i64) {
        Some(code) => ExamKind::from_backend_code(code).unwrap_or_else(|| {
            tracing::warn!(exam_id = %id, code, "Unknown exam type code, defaulting to exam");
            ExamKind::Exam
        }),
        None => {
            tracing::warn!(exam_id = %id, "Exam type missing, defaulting to exam");
            ExamKind::Exam
        }
    };

    let deadline = timestamp_field(payload, &["deadline", "deadLine", "endTime"]);
    let duration_minutes = field(payload, &["durationInMinutes", "duration_minutes", "duration"])
        .and_then(Value::as_u64)
        .ok_or("exam payload missing duration")? as u32;

    let mut questions = Vec::new();
    if let Some(raw_questions) = array_field(payload, &["questions", "examQuestions"]) {
        for raw in raw_questions {
            match normalize_question(raw, &id) {
                Ok(question) => questions.push(question),
                Err(detail) => {
                    tracing::warn!(exam_id = %id, detail = %detail, "Dropping malformed question record");
                }
            }
        }
    }

    Ok(Exam { id, lecture_id, title, kind, deadline, duration_minutes, questions })
}

fn normalize_question(payload: &Value, exam_id: &str) -> Result<Question, String> {
    let id = str_field(payload, &["id", "questionId"]).ok_or("question missing id")?;
    let prompt = str_field(payload, &["question", "prompt", "text"]).unwrap_or_default();

    let question_kind = match str_field(payload, &["questionType", "question_type"]).as_deref() {
        Some("image") | Some("image_question") => QuestionKind::Image,
        _ => QuestionKind::Text,
    };

    let answer_kind = answer_kind_from(
        str_field(payload, &["answerType", "answer_type"])
            .ok_or("question missing answer type")?
            .as_str(),
    )?;

    let max_score = f64_field(payload, &["maxScore", "max_score", "score"]).unwrap_or(0.0);
    let requires_manual_grading = bool_field(
        payload,
        &["requiresAssistantGrading", "requires_assistant_grading", "needsManualGrading"],
    )
    .unwrap_or(false);
    let model_answer_image_url =
        str_field(payload, &["modelAnswerImage", "model_answer_image", "answerImageUrl"]);

    let mut options = Vec::new();
    if let Some(raw_options) = array_field(payload, &["options", "answerOptions"]) {
        for raw in raw_options {
            let Some(option_id) = str_field(raw, &["id", "optionId"]) else {
                tracing::warn!(question_id = %id, "Dropping option record without id");
                continue;
            };
            options.push(QuestionOption {
                id: option_id,
                label: str_field(raw, &["label", "text", "content"]).unwrap_or_default(),
                is_correct: bool_field(raw, &["isCorrect", "is_correct", "correct"])
                    .unwrap_or(false),
            });
        }
    }

    Ok(Question {
        id,
        exam_id: exam_id.to_string(),
        prompt,
        question_kind,
        answer_kind,
        max_score,
        requires_manual_grading,
        model_answer_image_url,
        options,
    })
}

fn answer_kind_from(raw: &str) -> Result<AnswerKind, String> {
    match raw.to_ascii_lowercase().replace('-', "_").as_str() {
        "single_choice" | "singlechoice" | "choice" | "mcq" => Ok(AnswerKind::SingleChoice),
        "true_false" | "truefalse" | "boolean" => Ok(AnswerKind::TrueFalse),
        "essay" | "text" | "free_text" | "freetext" => Ok(AnswerKind::Essay),
        "image_upload" | "imageupload" | "image" | "upload" => Ok(AnswerKind::ImageUpload),
        other => Err(format!("unknown answer type '{other}'")),
    }
}

pub(crate) fn normalize_access(
    payload: &Value,
    exam_id: &str,
    student_id: &str,
) -> AccessDecision {
    let can_access_exam = bool_field(
        payload,
        &["canAccessExam", "can_access_exam", "canAccess", "canEnter"],
    )
    .unwrap_or_else(|| {
        tracing::warn!(exam_id, "Access payload missing access flag, treating as denied");
        false
    });

    AccessDecision {
        exam_id: exam_id.to_string(),
        student_id: student_id.to_string(),
        can_access_exam,
        deadline: timestamp_field(payload, &["deadline", "deadLine"]),
        extended_deadline: timestamp_field(
            payload,
            &["extendedDeadline", "extended_deadline", "retakeDeadline"],
        ),
        message: str_field(payload, &["message", "reason", "detail"]),
    }
}

pub(crate) fn normalize_score(payload: &Value) -> Result<ScoreResult, String> {
    let result_id =
        str_field(payload, &["resultId", "result_id", "id"]).ok_or("score payload missing result id")?;
    let exam_id = str_field(payload, &["examId", "exam_id"]).unwrap_or_default();
    let exam_title = str_field(payload, &["examTitle", "exam_title", "title"]).unwrap_or_default();

    let total_score =
        f64_field(payload, &["totalScore", "total_score", "score"]).unwrap_or_else(|| {
            tracing::warn!(result_id = %result_id, "Score payload missing total, defaulting to 0");
            0.0
        });

    let is_fully_graded = bool_field(
        payload,
        &["isFullyGraded", "is_fully_graded", "fullyGraded", "graded"],
    )
    .unwrap_or(false);

    let submitted_at =
        timestamp_field(payload, &["submittedAt", "submitted_at", "submissionDate"]);

    let mut details = Vec::new();
    if let Some(raw_details) = array_field(payload, &["answers", "answerDetails", "details"]) {
        for raw in raw_details {
            match normalize_answer_detail(raw) {
                Ok(detail) => details.push(detail),
                Err(detail) => {
                    tracing::warn!(result_id = %result_id, detail = %detail, "Dropping malformed answer record");
                }
            }
        }
    }

    let before = details.len();
    let details = dedupe_answer_details(details);
    if details.len() != before {
        tracing::warn!(
            result_id = %result_id,
            dropped = before - details.len(),
            "Deduplicated repeated answer records"
        );
    }

    Ok(ScoreResult {
        exam_id,
        exam_title,
        result_id,
        total_score,
        is_fully_graded,
        submitted_at,
        details,
    })
}

fn normalize_answer_detail(payload: &Value) -> Result<AnswerDetail, String> {
    let question_id =
        str_field(payload, &["questionId", "question_id"]).ok_or("answer record missing question id")?;

    let question_kind = match str_field(payload, &["questionType", "question_type"]).as_deref() {
        Some("image") | Some("image_question") => QuestionKind::Image,
        _ => QuestionKind::Text,
    };
    let answer_kind = str_field(payload, &["answerType", "answer_type"])
        .as_deref()
        .map(answer_kind_from)
        .transpose()?
        .unwrap_or(AnswerKind::Essay);

    let mut options = Vec::new();
    if let Some(raw_options) = array_field(payload, &["options", "answerOptions"]) {
        for raw in raw_options {
            let Some(option_id) = str_field(raw, &["id", "optionId"]) else {
                continue;
            };
            options.push(OptionResult {
                option_id,
                label: str_field(raw, &["label", "text", "content"]).unwrap_or_default(),
                is_correct: bool_field(raw, &["isCorrect", "is_correct", "correct"])
                    .unwrap_or(false),
                was_selected: bool_field(raw, &["wasSelected", "isSelected", "selected"])
                    .unwrap_or(false),
            });
        }
    }

    Ok(AnswerDetail {
        question_id,
        question_text: str_field(payload, &["question", "questionText", "prompt"])
            .unwrap_or_default(),
        question_kind,
        answer_kind,
        max_score: f64_field(payload, &["maxScore", "max_score"]).unwrap_or(0.0),
        requires_manual_grading: bool_field(
            payload,
            &["requiresAssistantGrading", "requires_assistant_grading", "needsManualGrading"],
        )
        .unwrap_or(false),
        points_earned: f64_field(payload, &["pointsEarned", "points_earned", "earnedPoints"]),
        options,
        text_answer: str_field(payload, &["textAnswer", "text_answer", "answerText"]),
        image_answer_url: str_field(payload, &["imageAnswer", "image_answer", "answerImage"]),
        feedback: str_field(payload, &["feedback", "comment"]),
        graded_by: str_field(payload, &["gradedBy", "graded_by", "assistantName"]),
        model_answer_image_url: str_field(payload, &["modelAnswerImage", "model_answer_image"]),
    })
}

pub(crate) fn normalize_upload_url(payload: &Value) -> Option<String> {
    str_field(payload, &["url", "fileUrl", "file_url", "viewUrl"])
}

/// Best-effort human-readable message out of an error body.
pub(crate) fn extract_error_message(payload: &Value) -> String {
    if let Some(detail) = field(payload, &["detail"]) {
        if let Some(text) = detail.as_str() {
            return text.to_string();
        }
        if let Some(items) = detail.as_array() {
            let joined = items
                .iter()
                .filter_map(|item| {
                    str_field(item, &["msg", "message"])
                })
                .collect::<Vec<_>>()
                .join("; ");
            if !joined.is_empty() {
                return joined;
            }
        }
    }

    str_field(payload, &["message", "error"]).unwrap_or_else(|| "unknown_error".to_string())
}
