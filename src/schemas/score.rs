use time::OffsetDateTime;

use crate::schemas::exam::{AnswerKind, QuestionKind};

#[derive(Debug, Clone, PartialEq)]
pub struct OptionResult {
    pub option_id: String,
    pub label: String,
    pub is_correct: bool,
    pub was_selected: bool,
}

/// Per-question result record returned after grading: the student's answer
/// merged with correctness and score metadata.
#[derive(Debug, Clone)]
pub struct AnswerDetail {
    pub question_id: String,
    pub question_text: String,
    pub question_kind: QuestionKind,
    pub answer_kind: AnswerKind,
    pub max_score: f64,
    pub requires_manual_grading: bool,
    /// None until a grader has assigned points.
    pub points_earned: Option<f64>,
    pub options: Vec<OptionResult>,
    pub text_answer: Option<String>,
    pub image_answer_url: Option<String>,
    pub feedback: Option<String>,
    pub graded_by: Option<String>,
    pub model_answer_image_url: Option<String>,
}

impl AnswerDetail {
    /// Whether this record actually carries the student's answer. Used to
    /// pick the better record when the backend returns duplicates for one
    /// question id.
    pub fn has_content(&self) -> bool {
        if self.options.iter().any(|option| option.was_selected) {
            return true;
        }
        if self.text_answer.as_deref().is_some_and(|text| !text.trim().is_empty()) {
            return true;
        }
        self.image_answer_url.as_deref().is_some_and(|url| !url.trim().is_empty())
    }
}

#[derive(Debug, Clone)]
pub struct ScoreResult {
    pub exam_id: String,
    pub exam_title: String,
    /// Backend-assigned id of this result; image uploads attach to it.
    pub result_id: String,
    pub total_score: f64,
    pub is_fully_graded: bool,
    pub submitted_at: Option<OffsetDateTime>,
    pub details: Vec<AnswerDetail>,
}

/// Collapses duplicate records for the same question id, keeping the first
/// occurrence's position and preferring a content-bearing record over an
/// empty duplicate.
pub fn dedupe_answer_details(details: Vec<AnswerDetail>) -> Vec<AnswerDetail> {
    let mut deduped: Vec<AnswerDetail> = Vec::with_capacity(details.len());

    for detail in details {
        match deduped.iter_mut().find(|kept| kept.question_id == detail.question_id) {
            Some(kept) => {
                if !kept.has_content() && detail.has_content() {
                    *kept = detail;
                }
            }
            None => deduped.push(detail),
        }
    }

    deduped
}

#[cfg(test)]
mod tests {
    use super::*;

    fn detail(question_id: &str, text_answer: Option<&str>) -> AnswerDetail {
        AnswerDetail {
            question_id: question_id.to_string(),
            question_text: "prompt".to_string(),
            question_kind: QuestionKind::Text,
            answer_kind: AnswerKind::Essay,
            max_score: 10.0,
            requires_manual_grading: false,
            points_earned: None,
            options: Vec::new(),
            text_answer: text_answer.map(str::to_string),
            image_answer_url: None,
            feedback: None,
            graded_by: None,
            model_answer_image_url: None,
        }
    }

    #[test]
    fn dedupe_prefers_content_bearing_record() {
        let details = vec![detail("q1", None), detail("q1", Some("my essay")), detail("q2", None)];
        let deduped = dedupe_answer_details(details);

        assert_eq!(deduped.len(), 2);
        assert_eq!(deduped[0].question_id, "q1");
        assert_eq!(deduped[0].text_answer.as_deref(), Some("my essay"));
        assert_eq!(deduped[1].question_id, "q2");
    }

    #[test]
    fn dedupe_keeps_first_content_record() {
        let details = vec![detail("q1", Some("first")), detail("q1", Some("second"))];
        let deduped = dedupe_answer_details(details);

        assert_eq!(deduped.len(), 1);
        assert_eq!(deduped[0].text_answer.as_deref(), Some("first"));
    }

    #[test]
    fn has_content_ignores_blank_text() {
        assert!(!detail("q1", Some("   ")).has_content());
        assert!(detail("q1", Some("answer")).has_content());

        let mut with_selection = detail("q1", None);
        with_selection.options.push(OptionResult {
            option_id: "o1".to_string(),
            label: "A".to_string(),
            is_correct: true,
            was_selected: true,
        });
        assert!(with_selection.has_content());
    }
}
