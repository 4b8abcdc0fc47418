use crate::schemas::score::{dedupe_answer_details, AnswerDetail, ScoreResult};

#[derive(Debug, Clone, PartialEq)]
pub struct ScoreSummary {
    /// Backend-reported total; authoritative, never recomputed here.
    pub student_points: f64,
    pub max_points: f64,
    pub correct_count: usize,
    pub wrong_count: usize,
    pub pending_count: usize,
    pub pending_points: f64,
    /// Share of the already-graded maximum, in 0.0..=1.0.
    pub percentage: f64,
    pub is_fully_graded: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Verdict {
    Correct,
    Wrong,
    Pending,
}

fn classify(detail: &AnswerDetail) -> Verdict {
    if detail.requires_manual_grading {
        return Verdict::Pending;
    }

    let correct = if detail.answer_kind.is_choice_based() {
        let selected: Vec<_> =
            detail.options.iter().filter(|option| option.was_selected).collect();
        !selected.is_empty() && selected.iter().all(|option| option.is_correct)
    } else {
        detail.points_earned.is_some_and(|points| points > 0.0)
    };

    if correct {
        Verdict::Correct
    } else {
        Verdict::Wrong
    }
}

pub fn aggregate(score: &ScoreResult) -> ScoreSummary {
    // The repository already dedups; doing it again keeps the totals right
    // for results constructed elsewhere.
    let details = dedupe_answer_details(score.details.clone());

    let mut correct_count = 0;
    let mut wrong_count = 0;
    let mut pending_count = 0;
    let mut max_points = 0.0;
    let mut pending_points = 0.0;

    for detail in &details {
        max_points += detail.max_score;
        match classify(detail) {
            Verdict::Correct => correct_count += 1,
            Verdict::Wrong => wrong_count += 1,
            Verdict::Pending => {
                pending_count += 1;
                pending_points += detail.max_score;
            }
        }
    }

    let graded_max = max_points - pending_points;
    let percentage = if graded_max > 0.0 { score.total_score / graded_max } else { 0.0 };

    ScoreSummary {
        student_points: score.total_score,
        max_points,
        correct_count,
        wrong_count,
        pending_count,
        pending_points,
        percentage,
        is_fully_graded: score.is_fully_graded,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PerformanceTier {
    Excellent,
    Good,
    NeedsImprovement,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Performance {
    pub tier: PerformanceTier,
    /// True while pending answers keep the summary from being final.
    pub provisional: bool,
}

/// Pure presentation mapping; carries no further state.
pub fn performance(summary: &ScoreSummary) -> Performance {
    let tier = if summary.percentage >= 0.85 {
        PerformanceTier::Excellent
    } else if summary.percentage >= 0.60 {
        PerformanceTier::Good
    } else {
        PerformanceTier::NeedsImprovement
    };

    Performance { tier, provisional: summary.pending_count > 0 && !summary.is_fully_graded }
}
