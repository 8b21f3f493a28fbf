use crate::types::CourseId;

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Entity not found: {entity} with id {id}")]
    NotFound { entity: &'static str, id: String },

    #[error("Invalid course status transition for {course_id}: {from} -> {to}")]
    InvalidTransition {
        course_id: CourseId,
        from: &'static str,
        to: &'static str,
    },

    #[error("Course {0} is not accepting this operation in its current status")]
    CourseState(CourseId),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Validation failed: {0}")]
    Validation(String),
}
