pub mod attempt;
pub mod exam_access;
pub mod exam_flow;
pub mod score_summary;
pub mod submission_pipeline;
