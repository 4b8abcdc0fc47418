use time::OffsetDateTime;

/// Backend verdict on whether a student may enter an exam right now.
/// Produced per request; never cached beyond the current navigation.
#[derive(Debug, Clone)]
pub struct AccessDecision {
    pub exam_id: String,
    pub student_id: String,
    pub can_access_exam: bool,
    pub deadline: Option<OffsetDateTime>,
    /// A set value marks a retake exception granted by the backend.
    pub extended_deadline: Option<OffsetDateTime>,
    pub message: Option<String>,
}
