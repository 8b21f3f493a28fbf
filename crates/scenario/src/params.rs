//! Synthetic payloads: course parameters, search queries, class drafts, files, scores.

use std::sync::atomic::{AtomicUsize, Ordering};

use rand::seq::IndexedRandom;
use rand::Rng;
use uuid::Uuid;

use campus_client::{AddClassRequest, AddCourseRequest, AssignmentFile, SearchCourseParams};
use campus_core::accounts::UserAccount;
use campus_core::model::{Course, CourseSpec, CourseType, Teacher};
use campus_core::timetable::{DayOfWeek, Slot, PERIODS_PER_DAY};

const SUBJECTS: &[&str] = &[
    "Algorithms",
    "Databases",
    "Networks",
    "Compilers",
    "Statistics",
    "Linear Algebra",
    "Economics",
    "Philosophy",
    "Psychology",
    "Linguistics",
];

const LEVELS: &[&str] = &["Introduction to", "Advanced", "Applied", "Seminar in"];

const KEYWORDS: &[&str] = &[
    "theory", "practice", "lab", "project", "reading", "proof", "design", "history",
];

const PDF_MAGIC: &[u8] = b"%PDF-1.5\n";
const DOCX_MAGIC: &[u8] = b"PK\x03\x04";

/// Hands out course codes in creation order.
#[derive(Debug, Default)]
pub struct CourseCodes {
    next: AtomicUsize,
}

impl CourseCodes {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next(&self) -> String {
        format!("C{:05}", self.next.fetch_add(1, Ordering::Relaxed) + 1)
    }
}

/// Random course parameters on a random slot.
pub fn course_spec(code: String) -> CourseSpec {
    let mut rng = rand::rng();
    let subject = SUBJECTS.choose(&mut rng).copied().unwrap_or("General Studies");
    let level = LEVELS.choose(&mut rng).copied().unwrap_or("Introduction to");
    let keywords: Vec<&str> = KEYWORDS.choose_multiple(&mut rng, 2).copied().collect();
    let day = DayOfWeek::ALL.choose(&mut rng).copied().unwrap_or(DayOfWeek::Monday);
    let period = rng.random_range(1..=PERIODS_PER_DAY);
    let slot = Slot::new(day, period).unwrap_or(Slot {
        day: DayOfWeek::Monday,
        period: 1,
    });
    CourseSpec {
        name: format!("{level} {subject}"),
        description: format!("{subject} course {code}"),
        course_type: if rng.random_bool(0.5) {
            CourseType::LiberalArts
        } else {
            CourseType::MajorSubjects
        },
        credit: rng.random_range(1..=3),
        slot,
        keywords: keywords.join(" "),
        code,
    }
}

pub fn add_course_request(spec: &CourseSpec) -> AddCourseRequest {
    AddCourseRequest {
        code: spec.code.clone(),
        course_type: spec.course_type,
        name: spec.name.clone(),
        description: spec.description.clone(),
        credit: spec.credit,
        day_of_week: spec.slot.day,
        period: spec.slot.period,
        keywords: spec.keywords.clone(),
    }
}

/// A query with a random mix of filters.
pub fn search_params(teachers: &[std::sync::Arc<Teacher>]) -> SearchCourseParams {
    let mut rng = rand::rng();
    let mut params = SearchCourseParams::default();
    if rng.random_bool(0.3) {
        params.course_type = Some(if rng.random_bool(0.5) {
            CourseType::LiberalArts
        } else {
            CourseType::MajorSubjects
        });
    }
    if rng.random_bool(0.2) {
        params.credit = Some(rng.random_range(1..=3));
    }
    if rng.random_bool(0.2) {
        params.teacher = teachers.choose(&mut rng).map(|t| t.name().to_string());
    }
    if rng.random_bool(0.3) {
        params.day_of_week = DayOfWeek::ALL.choose(&mut rng).copied();
    }
    if rng.random_bool(0.3) {
        params.period = Some(rng.random_range(1..=PERIODS_PER_DAY));
    }
    if rng.random_bool(0.5) {
        let pool = if rng.random_bool(0.5) { SUBJECTS } else { KEYWORDS };
        params.keywords = pool
            .choose(&mut rng)
            .map(|k| vec![k.to_string()])
            .unwrap_or_default();
    }
    params
}

/// Class creation payload with its announcement.
pub fn class_request(course: &Course, part: u8) -> AddClassRequest {
    AddClassRequest {
        part,
        title: format!("{} part {part}", course.name()),
        description: format!("Class {part} of {}", course.spec.code),
        announcement_id: Uuid::now_v7().to_string(),
        announcement_title: format!("Assignment for {} part {part}", course.name()),
        announcement_message: format!(
            "Submit the report for part {part} of {} as a PDF.",
            course.spec.code
        ),
        created_at: chrono::Utc::now().timestamp_micros(),
    }
}

/// An assignment upload. Invalid files carry the wrong type.
pub fn assignment_file(student: &UserAccount, class_part: u8, valid: bool) -> AssignmentFile {
    let mut rng = rand::rng();
    let (magic, extension) = if valid {
        (PDF_MAGIC, "pdf")
    } else {
        (DOCX_MAGIC, "docx")
    };
    let mut data = magic.to_vec();
    let body_len = rng.random_range(256..1024);
    data.extend((0..body_len).map(|_| rng.random::<u8>()));
    AssignmentFile {
        file_name: format!(
            "{}-{class_part}-{}.{extension}",
            student.code,
            Uuid::new_v4().simple()
        ),
        data,
    }
}

/// Score for a submission. Wrongly typed files get zero.
pub fn score_for(is_valid: bool) -> u32 {
    if is_valid {
        rand::rng().random_range(0..=campus_core::model::class::MAX_SCORE)
    } else {
        0
    }
}
