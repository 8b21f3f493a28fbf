//! The request/response boundary every workflow step goes through.

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::ApiError;
use crate::types::*;

/// Calls available to one simulated actor.
///
/// Implementations keep the actor's session: after a successful
/// [`login`](CampusApi::login) every later call is made as that user.
/// Success statuses are checked by the implementation; any other status
/// surfaces as [`ApiError::Status`].
#[async_trait]
pub trait CampusApi: Send + Sync {
    async fn login(&self, request: &LoginRequest) -> Result<(), ApiError>;

    /// Fetch the top page and return the static asset paths it references.
    async fn get_top_page(&self) -> Result<Vec<String>, ApiError>;

    async fn fetch_asset(&self, path: &str) -> Result<Vec<u8>, ApiError>;

    async fn get_me(&self) -> Result<MeResponse, ApiError>;

    async fn get_grades(&self) -> Result<GradeResponse, ApiError>;

    /// Search courses. `cursor` is a `next` link of a previous page.
    async fn search_courses(
        &self,
        params: &SearchCourseParams,
        cursor: Option<&str>,
    ) -> Result<Paged<Vec<CourseResponse>>, ApiError>;

    async fn get_course_detail(&self, course_id: &str) -> Result<CourseResponse, ApiError>;

    /// Create a course. A `409` carries the existing course's id in its body.
    async fn add_course(&self, request: &AddCourseRequest) -> Result<AddCourseResponse, ApiError>;

    /// Register for a batch of courses. Idempotent.
    async fn register_courses(&self, courses: &[RegisterCourseItem]) -> Result<(), ApiError>;

    async fn get_registered_courses(&self) -> Result<Vec<RegisteredCourse>, ApiError>;

    async fn set_course_status(
        &self,
        course_id: &str,
        request: &SetCourseStatusRequest,
    ) -> Result<(), ApiError>;

    async fn add_class(
        &self,
        course_id: &str,
        request: &AddClassRequest,
    ) -> Result<AddClassResponse, ApiError>;

    async fn get_classes(&self, course_id: &str) -> Result<Vec<ClassResponse>, ApiError>;

    async fn get_announcements(
        &self,
        cursor: Option<&str>,
    ) -> Result<Paged<AnnouncementsResponse>, ApiError>;

    /// Fetch one announcement. The application marks it read as a side effect.
    async fn get_announcement_detail(
        &self,
        announcement_id: &str,
    ) -> Result<AnnouncementDetail, ApiError>;

    async fn submit_assignment(
        &self,
        course_id: &str,
        class_id: &str,
        file: &AssignmentFile,
    ) -> Result<(), ApiError>;

    /// Close submissions and download every submitted file as a zip archive.
    async fn download_submissions(
        &self,
        course_id: &str,
        class_id: &str,
    ) -> Result<Vec<u8>, ApiError>;

    async fn post_grades(
        &self,
        course_id: &str,
        class_id: &str,
        scores: &[ScoreEntry],
    ) -> Result<(), ApiError>;
}

/// Builds a fresh session-carrying [`CampusApi`] per simulated actor.
pub trait Connector: Send + Sync {
    fn connect(&self) -> Result<Arc<dyn CampusApi>, ApiError>;
}
