use time::OffsetDateTime;

use crate::core::time::{format_offset, is_elapsed, now_utc};
use crate::repositories::exam_api::RepositoryError;
use crate::schemas::access::AccessDecision;
use crate::schemas::score::ScoreResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    Fresh,
    Retake,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DenyReason {
    NotAllowed(String),
    DeadlinePassed(String),
    Connectivity,
}

impl DenyReason {
    pub fn message(&self) -> String {
        match self {
            DenyReason::NotAllowed(message) | DenyReason::DeadlinePassed(message) => {
                message.clone()
            }
            DenyReason::Connectivity => {
                "Could not verify exam access. Check your connection and try again.".to_string()
            }
        }
    }
}

/// Entry verdict. `ConfirmRetake` is a yield point: the caller resolves it
/// by invoking `accept` or `decline` on the prompt, so no dialog dependency
/// leaks into the decision logic.
#[derive(Debug)]
pub enum AccessOutcome {
    Enter(EntryKind),
    ShowResults(ScoreResult),
    ConfirmRetake(RetakePrompt),
    Deny(DenyReason),
}

#[derive(Debug)]
pub struct RetakePrompt {
    prior: ScoreResult,
    pub extended_deadline: OffsetDateTime,
}

impl RetakePrompt {
    pub fn prior(&self) -> &ScoreResult {
        &self.prior
    }

    /// Start a fresh attempt; the old score is discarded for display.
    pub fn accept(self) -> AccessOutcome {
        AccessOutcome::Enter(EntryKind::Retake)
    }

    pub fn decline(self) -> AccessOutcome {
        AccessOutcome::ShowResults(self.prior)
    }
}

pub fn decide(decision: &AccessDecision, prior: Option<ScoreResult>) -> AccessOutcome {
    decide_at(decision, prior, now_utc())
}

/// Wraps `decide` with the fail-closed rule: an inconclusive access check
/// never grants entry, even when a prior score exists locally.
pub fn decide_from_check(
    check: Result<AccessDecision, RepositoryError>,
    prior: Option<ScoreResult>,
) -> AccessOutcome {
    match check {
        Ok(decision) => decide(&decision, prior),
        Err(err) => {
            tracing::error!(error = %err, "Access check failed, denying entry");
            AccessOutcome::Deny(DenyReason::Connectivity)
        }
    }
}

fn decide_at(
    decision: &AccessDecision,
    prior: Option<ScoreResult>,
    now: OffsetDateTime,
) -> AccessOutcome {
    if decision.can_access_exam {
        return match (prior, decision.extended_deadline) {
            (None, _) => AccessOutcome::Enter(EntryKind::Fresh),
            (Some(prior), Some(extended_deadline)) => {
                AccessOutcome::ConfirmRetake(RetakePrompt { prior, extended_deadline })
            }
            // A finished exam without an exception never allows a second
            // attempt, even while the exam itself remains open.
            (Some(prior), None) => AccessOutcome::ShowResults(prior),
        };
    }

    if let Some(prior) = prior {
        // A student who already has a result must always be able to see it.
        return AccessOutcome::ShowResults(prior);
    }

    let reason = match decision.deadline {
        Some(deadline) if is_elapsed(deadline, now) => DenyReason::DeadlinePassed(format!(
            "The exam deadline passed on {}.",
            format_offset(deadline)
        )),
        _ => DenyReason::NotAllowed(
            decision
                .message
                .clone()
                .unwrap_or_else(|| "You cannot enter this exam right now.".to_string()),
        ),
    };

    AccessOutcome::Deny(reason)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::time::parse_timestamp;
    use crate::schemas::exam::{AnswerKind, QuestionKind};
    use crate::schemas::score::AnswerDetail;

    fn decision(can_access: bool) -> AccessDecision {
        AccessDecision {
            exam_id: "e1".to_string(),
            student_id: "s1".to_string(),
            can_access_exam: can_access,
            deadline: None,
            extended_deadline: None,
            message: None,
        }
    }

    fn prior_score() -> ScoreResult {
        ScoreResult {
            exam_id: "e1".to_string(),
            exam_title: "Midterm".to_string(),
            result_id: "r1".to_string(),
            total_score: 12.0,
            is_fully_graded: true,
            submitted_at: parse_timestamp("2026-02-01T12:00:00Z"),
            details: vec![AnswerDetail {
                question_id: "q1".to_string(),
                question_text: "prompt".to_string(),
                question_kind: QuestionKind::Text,
                answer_kind: AnswerKind::Essay,
                max_score: 12.0,
                requires_manual_grading: false,
                points_earned: Some(12.0),
                options: Vec::new(),
                text_answer: Some("essay".to_string()),
                image_answer_url: None,
                feedback: None,
                graded_by: None,
                model_answer_image_url: None,
            }],
        }
    }

    fn now() -> OffsetDateTime {
        parse_timestamp("2026-03-01T12:00:00Z").unwrap()
    }

    #[test]
    fn open_exam_without_prior_score_enters_fresh() {
        let outcome = decide_at(&decision(true), None, now());
        assert!(matches!(outcome, AccessOutcome::Enter(EntryKind::Fresh)));
    }

    #[test]
    fn open_exam_with_prior_score_shows_results() {
        let outcome = decide_at(&decision(true), Some(prior_score()), now());
        assert!(matches!(outcome, AccessOutcome::ShowResults(_)));
    }

    #[test]
    fn retake_exception_prompts_and_accept_enters() {
        let mut with_exception = decision(true);
        with_exception.extended_deadline = parse_timestamp("2026-04-01T12:00:00Z");

        let outcome = decide_at(&with_exception, Some(prior_score()), now());
        let AccessOutcome::ConfirmRetake(prompt) = outcome else {
            panic!("expected retake prompt");
        };

        assert_eq!(prompt.prior().result_id, "r1");
        assert!(matches!(prompt.accept(), AccessOutcome::Enter(EntryKind::Retake)));
    }

    #[test]
    fn retake_exception_declined_shows_prior_results() {
        let mut with_exception = decision(true);
        with_exception.extended_deadline = parse_timestamp("2026-04-01T12:00:00Z");

        let AccessOutcome::ConfirmRetake(prompt) =
            decide_at(&with_exception, Some(prior_score()), now())
        else {
            panic!("expected retake prompt");
        };

        match prompt.decline() {
            AccessOutcome::ShowResults(score) => assert_eq!(score.result_id, "r1"),
            other => panic!("expected prior results, got {other:?}"),
        }
    }

    #[test]
    fn closed_exam_with_prior_score_shows_results_not_deny() {
        let outcome = decide_at(&decision(false), Some(prior_score()), now());
        assert!(matches!(outcome, AccessOutcome::ShowResults(_)));
    }

    #[test]
    fn closed_exam_without_score_denies_with_backend_message() {
        let mut closed = decision(false);
        closed.message = Some("Subscription not approved".to_string());

        match decide_at(&closed, None, now()) {
            AccessOutcome::Deny(DenyReason::NotAllowed(message)) => {
                assert_eq!(message, "Subscription not approved");
            }
            other => panic!("expected deny, got {other:?}"),
        }
    }

    #[test]
    fn elapsed_deadline_replaces_denial_message() {
        let mut closed = decision(false);
        closed.message = Some("ignored".to_string());
        closed.deadline = parse_timestamp("2026-02-15T18:00:00Z");

        match decide_at(&closed, None, now()) {
            AccessOutcome::Deny(DenyReason::DeadlinePassed(message)) => {
                assert!(message.contains("2026-02-15T18:00:00Z"), "message: {message}");
            }
            other => panic!("expected deadline denial, got {other:?}"),
        }
    }

    #[test]
    fn future_deadline_keeps_backend_message() {
        let mut closed = decision(false);
        closed.deadline = parse_timestamp("2026-04-15T18:00:00Z");

        match decide_at(&closed, None, now()) {
            AccessOutcome::Deny(DenyReason::NotAllowed(_)) => {}
            other => panic!("expected plain denial, got {other:?}"),
        }
    }

    #[test]
    fn failed_check_denies_even_with_prior_score() {
        let check = Err(RepositoryError::Malformed {
            endpoint: "check_access",
            detail: "boom".to_string(),
        });

        match decide_from_check(check, Some(prior_score())) {
            AccessOutcome::Deny(DenyReason::Connectivity) => {}
            other => panic!("expected connectivity denial, got {other:?}"),
        }
    }
}
