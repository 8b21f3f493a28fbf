use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::RwLock;

use crate::error::CoreError;
use crate::hashing::sha256_hex;
use crate::types::{ClassId, CourseId, UserCode};

/// Highest score a teacher may assign.
pub const MAX_SCORE: u32 = 100;

/// Record of one student's accepted upload for a class.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Submission {
    pub file_name: String,
    /// SHA-256 hex digest of the uploaded bytes.
    pub digest: String,
    /// Whether the file had the requested type.
    pub is_valid: bool,
    /// Score assigned by the teacher once graded.
    pub score: Option<u32>,
}

impl Submission {
    pub fn new(file_name: impl Into<String>, data: &[u8], is_valid: bool) -> Self {
        Self {
            file_name: file_name.into(),
            digest: sha256_hex(data),
            is_valid,
            score: None,
        }
    }
}

/// One class round of a course.
#[derive(Debug)]
pub struct Class {
    pub id: ClassId,
    pub course_id: CourseId,
    /// Sequence index within the course, starting at 1.
    pub part: u8,
    pub title: String,
    pub description: String,
    submissions: RwLock<HashMap<UserCode, Submission>>,
    submissions_closed: AtomicBool,
}

impl Class {
    pub fn new(
        id: ClassId,
        course_id: CourseId,
        part: u8,
        title: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            id,
            course_id,
            part,
            title: title.into(),
            description: description.into(),
            submissions: RwLock::new(HashMap::new()),
            submissions_closed: AtomicBool::new(false),
        }
    }

    /// Record an accepted upload. A later upload by the same student replaces the earlier one.
    pub async fn add_submission(
        &self,
        student: &str,
        submission: Submission,
    ) -> Result<(), CoreError> {
        if self.is_submission_closed() {
            return Err(CoreError::Conflict(format!(
                "submissions for class {} are closed",
                self.id
            )));
        }
        self.submissions
            .write()
            .await
            .insert(student.to_string(), submission);
        Ok(())
    }

    pub async fn submission(&self, student: &str) -> Option<Submission> {
        self.submissions.read().await.get(student).cloned()
    }

    pub async fn submitted_count(&self) -> usize {
        self.submissions.read().await.len()
    }

    /// File name to digest for every recorded upload.
    pub async fn expected_archive(&self) -> HashMap<String, String> {
        self.submissions
            .read()
            .await
            .values()
            .map(|s| (s.file_name.clone(), s.digest.clone()))
            .collect()
    }

    /// Close the submission window. Grading is only possible afterwards.
    pub fn close_submissions(&self) {
        self.submissions_closed.store(true, Ordering::SeqCst);
    }

    pub fn is_submission_closed(&self) -> bool {
        self.submissions_closed.load(Ordering::SeqCst)
    }

    /// Store the score the teacher posted for a student's submission.
    pub async fn assign_score(&self, student: &str, score: u32) -> Result<(), CoreError> {
        if !self.is_submission_closed() {
            return Err(CoreError::Conflict(format!(
                "class {} cannot be graded while submissions are open",
                self.id
            )));
        }
        if score > MAX_SCORE {
            return Err(CoreError::Validation(format!(
                "score {score} exceeds {MAX_SCORE}"
            )));
        }
        let mut submissions = self.submissions.write().await;
        let submission = submissions.get_mut(student).ok_or_else(|| CoreError::NotFound {
            entity: "submission",
            id: student.to_string(),
        })?;
        submission.score = Some(score);
        Ok(())
    }
}
