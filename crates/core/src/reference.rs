//! Registry of every entity the run has created.

use std::collections::HashMap;
use std::sync::Arc;

use rand::seq::IndexedRandom;
use tokio::sync::RwLock;

use crate::accounts::AccountPool;
use crate::model::{Announcement, Course, Student, Teacher};
use crate::types::CourseId;

#[derive(Debug)]
pub struct ReferenceModel {
    courses: RwLock<HashMap<CourseId, Arc<Course>>>,
    students: RwLock<HashMap<String, Arc<Student>>>,
    teachers: Vec<Arc<Teacher>>,
}

impl ReferenceModel {
    pub fn new(accounts: &AccountPool) -> Self {
        Self {
            courses: RwLock::new(HashMap::new()),
            students: RwLock::new(HashMap::new()),
            teachers: accounts
                .teachers()
                .iter()
                .cloned()
                .map(|account| Arc::new(Teacher::new(account)))
                .collect(),
        }
    }

    /// Register a course, keyed by its server id.
    ///
    /// A course that is already known is returned unchanged, so a creation
    /// that was retried after a timeout still commits exactly one course.
    pub async fn add_course(&self, course: Course) -> (Arc<Course>, bool) {
        let mut courses = self.courses.write().await;
        if let Some(existing) = courses.get(&course.id) {
            return (existing.clone(), false);
        }
        let course = Arc::new(course);
        courses.insert(course.id.clone(), course.clone());
        (course, true)
    }

    pub async fn course(&self, id: &str) -> Option<Arc<Course>> {
        self.courses.read().await.get(id).cloned()
    }

    pub async fn course_count(&self) -> usize {
        self.courses.read().await.len()
    }

    pub async fn courses(&self) -> Vec<Arc<Course>> {
        self.courses.read().await.values().cloned().collect()
    }

    pub async fn add_student(&self, student: Arc<Student>) {
        self.students
            .write()
            .await
            .insert(student.code().to_string(), student);
    }

    pub async fn student(&self, code: &str) -> Option<Arc<Student>> {
        self.students.read().await.get(code).cloned()
    }

    pub async fn students(&self) -> Vec<Arc<Student>> {
        self.students.read().await.values().cloned().collect()
    }

    pub async fn active_student_count(&self) -> usize {
        self.students.read().await.len()
    }

    pub fn teachers(&self) -> &[Arc<Teacher>] {
        &self.teachers
    }

    pub fn random_teacher(&self) -> Option<Arc<Teacher>> {
        self.teachers.choose(&mut rand::rng()).cloned()
    }

    /// Deliver `announcement` to every student on the course roster right now.
    ///
    /// Students who register later never see it. Returns the recipients.
    pub async fn broadcast_announcement(
        &self,
        course: &Course,
        announcement: Arc<Announcement>,
    ) -> Vec<Arc<Student>> {
        let roster = course.roster().await;
        let students = self.students.read().await;
        let recipients: Vec<Arc<Student>> = roster
            .iter()
            .filter_map(|code| students.get(code).cloned())
            .collect();
        drop(students);

        for student in &recipients {
            student.receive_announcement(announcement.clone()).await;
        }
        tracing::debug!(
            course_id = %course.id,
            announcement_id = %announcement.id,
            recipients = recipients.len(),
            "Announcement broadcast"
        );
        recipients
    }
}
