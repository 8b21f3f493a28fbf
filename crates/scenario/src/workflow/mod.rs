//! Actor workflows driven by the load scheduler.
//!
//! Every step checks the deadline before it sends a request, so no action
//! straddles the end of the request window.

pub mod activation;
pub mod course;
pub mod prepare;
pub mod student;

pub use activation::{activate_student, add_courses, add_students, create_course};
pub use course::course_cycle;
pub use prepare::check_announcement_paging;
pub use student::{announcement_cycle, registration_cycle};
