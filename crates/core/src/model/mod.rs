//! In-memory mirror of the application's state.
//!
//! Entities are created once by exactly one workflow task and are never
//! removed during a run. Mutations happen only after the corresponding
//! write has been confirmed by the application.

pub mod announcement;
pub mod class;
pub mod course;
pub mod grades;
pub mod student;
pub mod teacher;

pub use announcement::{Announcement, AnnouncementStatus};
pub use class::{Class, Submission};
pub use course::{Course, CourseSpec, CourseStatus, CourseType};
pub use grades::GradeSnapshot;
pub use student::{Schedule, Student};
pub use teacher::Teacher;
