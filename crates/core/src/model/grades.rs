use std::collections::HashMap;

use crate::model::Student;
use crate::types::{ClassId, CourseId};

/// Locally known scores of one student, keyed by course then class.
///
/// `None` means the class exists but this student's submission has not
/// been graded (or was never made).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GradeSnapshot {
    pub courses: HashMap<CourseId, HashMap<ClassId, Option<u32>>>,
}

impl GradeSnapshot {
    /// Collect the scores of every course the student has been confirmed in.
    pub async fn of(student: &Student) -> Self {
        let mut courses = HashMap::new();
        for course in student.known_courses().await {
            let mut classes = HashMap::new();
            for class in course.classes().await {
                let score = class
                    .submission(student.code())
                    .await
                    .and_then(|s| s.score);
                classes.insert(class.id.clone(), score);
            }
            courses.insert(course.id.clone(), classes);
        }
        Self { courses }
    }

    pub fn score(&self, course_id: &str, class_id: &str) -> Option<u32> {
        self.courses
            .get(course_id)
            .and_then(|classes| classes.get(class_id))
            .copied()
            .flatten()
    }

    pub fn graded_count(&self) -> usize {
        self.courses
            .values()
            .flat_map(|classes| classes.values())
            .filter(|score| score.is_some())
            .count()
    }
}
