//! Request and response payloads of the campus application.

use serde::{Deserialize, Serialize};

use campus_core::model::{CourseStatus, CourseType};
use campus_core::timetable::DayOfWeek;
use campus_core::types::{AnnouncementId, ClassId, CourseId, Timestamp, UserCode};

use crate::link::PageLinks;

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginRequest {
    pub code: UserCode,
    pub password: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MeResponse {
    pub code: UserCode,
    pub name: String,
    pub is_admin: bool,
}

// ---------------------------------------------------------------------------
// Courses
// ---------------------------------------------------------------------------

/// Filters of a course search. Unset fields are not sent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchCourseParams {
    pub course_type: Option<CourseType>,
    pub credit: Option<u8>,
    pub teacher: Option<String>,
    pub period: Option<u8>,
    pub day_of_week: Option<DayOfWeek>,
    pub keywords: Vec<String>,
    pub status: Option<CourseStatus>,
}

impl SearchCourseParams {
    /// Query-string pairs in a stable order.
    pub fn query_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = Vec::new();
        if let Some(course_type) = self.course_type {
            pairs.push(("type", enum_str(&course_type)));
        }
        if let Some(credit) = self.credit {
            pairs.push(("credit", credit.to_string()));
        }
        if let Some(teacher) = &self.teacher {
            pairs.push(("teacher", teacher.clone()));
        }
        if let Some(period) = self.period {
            pairs.push(("period", period.to_string()));
        }
        if let Some(day) = self.day_of_week {
            pairs.push(("day_of_week", day.as_str().to_string()));
        }
        if !self.keywords.is_empty() {
            pairs.push(("keywords", self.keywords.join(" ")));
        }
        if let Some(status) = self.status {
            pairs.push(("status", status.as_str().to_string()));
        }
        pairs
    }
}

fn enum_str<T: Serialize>(value: &T) -> String {
    match serde_json::to_value(value) {
        Ok(serde_json::Value::String(s)) => s,
        _ => String::new(),
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CourseResponse {
    pub id: CourseId,
    pub code: String,
    #[serde(rename = "type")]
    pub course_type: CourseType,
    pub name: String,
    pub description: String,
    pub credit: u8,
    pub period: u8,
    pub day_of_week: DayOfWeek,
    /// Display name of the teacher.
    pub teacher: String,
    pub keywords: String,
    pub status: CourseStatus,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddCourseRequest {
    pub code: String,
    #[serde(rename = "type")]
    pub course_type: CourseType,
    pub name: String,
    pub description: String,
    pub credit: u8,
    pub day_of_week: DayOfWeek,
    pub period: u8,
    pub keywords: String,
}

/// Body of both `201 Created` and `409 Conflict` replies to a course creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddCourseResponse {
    pub id: CourseId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisterCourseItem {
    pub id: CourseId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisteredCourse {
    pub id: CourseId,
    pub name: String,
    pub teacher: String,
    pub period: u8,
    pub day_of_week: DayOfWeek,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetCourseStatusRequest {
    pub status: CourseStatus,
}

// ---------------------------------------------------------------------------
// Classes and assignments
// ---------------------------------------------------------------------------

/// Creates a class and broadcasts its announcement to the course roster.
///
/// Announcement ids and timestamps are chosen by the benchmark so that the
/// expected ordering is known before the server answers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddClassRequest {
    pub part: u8,
    pub title: String,
    pub description: String,
    pub announcement_id: AnnouncementId,
    pub announcement_title: String,
    pub announcement_message: String,
    pub created_at: Timestamp,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddClassResponse {
    pub class_id: ClassId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassResponse {
    pub id: ClassId,
    pub part: u8,
    pub title: String,
    pub description: String,
    pub submission_closed: bool,
    pub submitted: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreEntry {
    pub user_code: UserCode,
    pub score: u32,
}

/// File uploaded as an assignment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssignmentFile {
    pub file_name: String,
    pub data: Vec<u8>,
}

// ---------------------------------------------------------------------------
// Grades
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GradeSummary {
    pub credits: u32,
    pub gpa: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassScore {
    pub class_id: ClassId,
    pub title: String,
    pub part: u8,
    pub score: Option<u32>,
    pub submitters: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CourseGrade {
    pub id: CourseId,
    pub name: String,
    pub code: String,
    pub total_score: u32,
    pub class_scores: Vec<ClassScore>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GradeResponse {
    pub summary: GradeSummary,
    pub courses: Vec<CourseGrade>,
}

// ---------------------------------------------------------------------------
// Announcements
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnnouncementResponse {
    pub id: AnnouncementId,
    pub course_id: CourseId,
    pub course_name: String,
    pub title: String,
    pub unread: bool,
    pub created_at: Timestamp,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnnouncementsResponse {
    pub unread_count: u32,
    pub announcements: Vec<AnnouncementResponse>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnnouncementDetail {
    pub id: AnnouncementId,
    pub course_id: CourseId,
    pub course_name: String,
    pub title: String,
    pub message: String,
    pub unread: bool,
    pub created_at: Timestamp,
}

// ---------------------------------------------------------------------------
// Paging
// ---------------------------------------------------------------------------

/// A page of a cursor-linked list.
#[derive(Debug, Clone, PartialEq)]
pub struct Paged<T> {
    pub items: T,
    pub links: PageLinks,
}
