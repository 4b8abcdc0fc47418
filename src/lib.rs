pub mod core;
pub mod repositories;
pub mod schemas;
pub mod services;

pub use crate::core::config::{ConfigError, Settings, UploadSettings};
pub use crate::repositories::exam_api::{ExamBackend, HttpExamRepository, RepositoryError};
pub use crate::schemas::access::AccessDecision;
pub use crate::schemas::answer::{AnswerFile, AnswerInput, AnswerSubmission};
pub use crate::schemas::exam::{
    AnswerKind, Exam, ExamKind, Question, QuestionKind, QuestionOption,
};
pub use crate::schemas::score::{AnswerDetail, OptionResult, ScoreResult};
pub use crate::services::attempt::{
    run_countdown, AttemptEvent, AttemptSession, AttemptState, PasteRejected, SubmitBlocked,
};
pub use crate::services::exam_access::{
    decide, decide_from_check, AccessOutcome, DenyReason, EntryKind, RetakePrompt,
};
pub use crate::services::exam_flow::{AttemptHandle, ExamFlow, GradedAttempt};
pub use crate::services::score_summary::{
    aggregate, performance, Performance, PerformanceTier, ScoreSummary,
};
pub use crate::services::submission_pipeline::{
    PipelineError, PipelineStep, SubmissionOutcome, SubmissionPipeline, UploadFailure,
};
