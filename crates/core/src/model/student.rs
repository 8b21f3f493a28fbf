//! Student entity: weekly schedule, registered courses and announcement inbox.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{watch, Mutex, MutexGuard, RwLock};

use crate::accounts::UserAccount;
use crate::error::CoreError;
use crate::model::{Announcement, AnnouncementStatus, Course};
use crate::timetable::Slot;
use crate::types::AnnouncementId;

#[derive(Debug, Clone)]
struct SlotClaim {
    course: Arc<Course>,
    confirmed: bool,
}

/// A student's weekly timetable.
///
/// A slot holds at most one course. Tentative claims count against the
/// registration limit so that an in-flight registration cannot overshoot it.
#[derive(Debug)]
pub struct Schedule {
    limit: usize,
    claims: HashMap<Slot, SlotClaim>,
}

impl Schedule {
    pub fn new(limit: usize) -> Self {
        Self {
            limit,
            claims: HashMap::new(),
        }
    }

    pub fn is_free(&self, slot: Slot) -> bool {
        !self.claims.contains_key(&slot)
    }

    /// How many more courses may be claimed.
    pub fn remaining_capacity(&self) -> usize {
        self.limit.saturating_sub(self.claims.len())
    }

    /// Tentatively put `course` into its slot.
    pub fn claim(&mut self, course: Arc<Course>) -> Result<(), CoreError> {
        let slot = course.slot();
        if self.remaining_capacity() == 0 {
            return Err(CoreError::Conflict(format!(
                "registration limit {} reached",
                self.limit
            )));
        }
        if !self.is_free(slot) {
            return Err(CoreError::Conflict(format!("slot {slot} is occupied")));
        }
        self.claims.insert(
            slot,
            SlotClaim {
                course,
                confirmed: false,
            },
        );
        Ok(())
    }

    /// Mark the claim on `course`'s slot as confirmed by the application.
    pub fn confirm(&mut self, course: &Course) -> Result<(), CoreError> {
        match self.claims.get_mut(&course.slot()) {
            Some(claim) if claim.course.id == course.id => {
                claim.confirmed = true;
                Ok(())
            }
            _ => Err(CoreError::NotFound {
                entity: "slot claim",
                id: course.id.clone(),
            }),
        }
    }

    /// Free the slot held by `course`. A slot held by another course is left alone.
    pub fn release(&mut self, course: &Course) -> bool {
        let slot = course.slot();
        let matches = self
            .claims
            .get(&slot)
            .is_some_and(|claim| claim.course.id == course.id);
        if matches {
            self.claims.remove(&slot);
        }
        matches
    }

    /// Confirmed courses, ordered by slot.
    pub fn registered_courses(&self) -> Vec<Arc<Course>> {
        let mut claims: Vec<(&Slot, &SlotClaim)> =
            self.claims.iter().filter(|(_, c)| c.confirmed).collect();
        claims.sort_by_key(|(slot, _)| **slot);
        claims.into_iter().map(|(_, c)| c.course.clone()).collect()
    }

    pub fn registered_count(&self) -> usize {
        self.claims.values().filter(|c| c.confirmed).count()
    }

    /// Slots occupied by confirmed courses.
    pub fn occupied_slots(&self) -> Vec<Slot> {
        let mut slots: Vec<Slot> = self
            .claims
            .iter()
            .filter(|(_, c)| c.confirmed)
            .map(|(slot, _)| *slot)
            .collect();
        slots.sort();
        slots
    }
}

#[derive(Debug)]
struct AnnouncementEntry {
    announcement: Arc<Announcement>,
    read: watch::Sender<bool>,
}

impl AnnouncementEntry {
    fn status(&self) -> AnnouncementStatus {
        AnnouncementStatus {
            announcement: self.announcement.clone(),
            unread: !*self.read.borrow(),
        }
    }
}

#[derive(Debug)]
pub struct Student {
    pub account: UserAccount,
    schedule: Mutex<Schedule>,
    announcements: RwLock<HashMap<AnnouncementId, AnnouncementEntry>>,
    finished: RwLock<Vec<Arc<Course>>>,
}

impl Student {
    pub fn new(account: UserAccount, register_limit: usize) -> Self {
        Self {
            account,
            schedule: Mutex::new(Schedule::new(register_limit)),
            announcements: RwLock::new(HashMap::new()),
            finished: RwLock::new(Vec::new()),
        }
    }

    pub fn code(&self) -> &str {
        &self.account.code
    }

    /// Lock the schedule.
    ///
    /// When the allocator lock is also needed it must be taken first.
    pub async fn schedule(&self) -> MutexGuard<'_, Schedule> {
        self.schedule.lock().await
    }

    pub async fn registered_courses(&self) -> Vec<Arc<Course>> {
        self.schedule.lock().await.registered_courses()
    }

    pub async fn remaining_capacity(&self) -> usize {
        self.schedule.lock().await.remaining_capacity()
    }

    /// Record that `course` moved to Closed; its slot is freed for a new registration.
    pub async fn finish_course(&self, course: &Arc<Course>) {
        let released = self.schedule.lock().await.release(course);
        if released {
            self.finished.write().await.push(course.clone());
        }
    }

    /// Every course this student has been confirmed in, finished ones included.
    pub async fn known_courses(&self) -> Vec<Arc<Course>> {
        let mut courses = self.registered_courses().await;
        courses.extend(self.finished.read().await.iter().cloned());
        courses
    }

    /// Deliver an announcement as unread. Repeated delivery is ignored.
    pub async fn receive_announcement(&self, announcement: Arc<Announcement>) {
        let mut announcements = self.announcements.write().await;
        announcements
            .entry(announcement.id.clone())
            .or_insert_with(|| {
                let (read, _) = watch::channel(false);
                AnnouncementEntry { announcement, read }
            });
    }

    pub async fn announcement(&self, id: &str) -> Option<AnnouncementStatus> {
        self.announcements
            .read()
            .await
            .get(id)
            .map(AnnouncementEntry::status)
    }

    /// All received announcements, newest first.
    pub async fn announcements_newest_first(&self) -> Vec<AnnouncementStatus> {
        let mut statuses: Vec<AnnouncementStatus> = self
            .announcements
            .read()
            .await
            .values()
            .map(AnnouncementEntry::status)
            .collect();
        AnnouncementStatus::sort_newest_first(&mut statuses);
        statuses
    }

    pub async fn unread_count(&self) -> usize {
        self.announcements
            .read()
            .await
            .values()
            .filter(|e| !*e.read.borrow())
            .count()
    }

    /// Mark an announcement read and wake anyone waiting on it.
    pub async fn mark_read(&self, id: &str) -> Result<(), CoreError> {
        let announcements = self.announcements.read().await;
        let entry = announcements.get(id).ok_or_else(|| CoreError::NotFound {
            entity: "announcement",
            id: id.to_string(),
        })?;
        entry.read.send_replace(true);
        Ok(())
    }

    /// A receiver that resolves once the announcement is read.
    pub async fn read_signal(&self, id: &str) -> Option<watch::Receiver<bool>> {
        self.announcements
            .read()
            .await
            .get(id)
            .map(|e| e.read.subscribe())
    }

    /// Wait until the announcement is read. Returns immediately for an unknown id.
    pub async fn wait_read(&self, id: &str) {
        if let Some(mut rx) = self.read_signal(id).await {
            let _ = rx.wait_for(|read| *read).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{CourseSpec, CourseType, Teacher};
    use crate::timetable::DayOfWeek;
    use assert_matches::assert_matches;
    use std::time::Duration;

    fn course(id: &str, day: DayOfWeek, period: u8) -> Arc<Course> {
        Arc::new(Course::new(
            id.into(),
            CourseSpec {
                code: id.to_uppercase(),
                course_type: CourseType::LiberalArts,
                name: format!("course {id}"),
                description: String::new(),
                credit: 1,
                slot: Slot::new(day, period).unwrap(),
                keywords: String::new(),
            },
            10,
            Arc::new(Teacher::new(UserAccount::teacher(0))),
        ))
    }

    fn announcement(id: &str, created_at: i64) -> Arc<Announcement> {
        Arc::new(Announcement {
            id: id.into(),
            course_id: "c".into(),
            course_name: "course c".into(),
            title: format!("title {id}"),
            message: "body".into(),
            created_at,
        })
    }

    // -- schedule ---------------------------------------------------------

    #[test]
    fn one_course_per_slot() {
        let mut schedule = Schedule::new(5);
        schedule
            .claim(course("a", DayOfWeek::Monday, 1))
            .unwrap();
        assert_matches!(
            schedule.claim(course("b", DayOfWeek::Monday, 1)),
            Err(CoreError::Conflict(_))
        );
        schedule
            .claim(course("c", DayOfWeek::Monday, 2))
            .unwrap();
        assert_eq!(schedule.remaining_capacity(), 3);
    }

    #[test]
    fn limit_counts_tentative_claims() {
        let mut schedule = Schedule::new(1);
        schedule
            .claim(course("a", DayOfWeek::Friday, 6))
            .unwrap();
        assert_matches!(
            schedule.claim(course("b", DayOfWeek::Monday, 1)),
            Err(CoreError::Conflict(_))
        );
    }

    #[test]
    fn occupied_slots_track_confirmed_courses() {
        let mut schedule = Schedule::new(5);
        let a = course("a", DayOfWeek::Monday, 1);
        let b = course("b", DayOfWeek::Wednesday, 4);
        schedule.claim(a.clone()).unwrap();
        schedule.claim(b.clone()).unwrap();
        schedule.confirm(&a).unwrap();

        assert_eq!(schedule.registered_count(), 1);
        assert_eq!(schedule.occupied_slots(), vec![a.slot()]);

        assert!(schedule.release(&b));
        assert!(schedule.is_free(b.slot()));
        assert_eq!(schedule.occupied_slots().len(), schedule.registered_count());
    }

    #[test]
    fn release_ignores_a_different_course_on_the_same_slot() {
        let mut schedule = Schedule::new(5);
        let a = course("a", DayOfWeek::Tuesday, 2);
        let other = course("z", DayOfWeek::Tuesday, 2);
        schedule.claim(a.clone()).unwrap();
        assert!(!schedule.release(&other));
        assert!(!schedule.is_free(a.slot()));
    }

    // -- student ----------------------------------------------------------

    #[tokio::test]
    async fn finished_courses_stay_known_but_free_the_slot() {
        let student = Student::new(UserAccount::student(0), 5);
        let a = course("a", DayOfWeek::Thursday, 5);
        {
            let mut schedule = student.schedule().await;
            schedule.claim(a.clone()).unwrap();
            schedule.confirm(&a).unwrap();
        }
        student.finish_course(&a).await;

        assert!(student.registered_courses().await.is_empty());
        assert_eq!(student.known_courses().await.len(), 1);
        assert!(student.schedule().await.is_free(a.slot()));
    }

    #[tokio::test]
    async fn announcements_are_listed_newest_first() {
        let student = Student::new(UserAccount::student(0), 5);
        student.receive_announcement(announcement("old", 10)).await;
        student.receive_announcement(announcement("new", 30)).await;
        student.receive_announcement(announcement("mid", 20)).await;

        let ids: Vec<String> = student
            .announcements_newest_first()
            .await
            .into_iter()
            .map(|s| s.announcement.id.clone())
            .collect();
        assert_eq!(ids, vec!["new", "mid", "old"]);
        assert_eq!(student.unread_count().await, 3);
    }

    #[tokio::test]
    async fn mark_read_releases_waiters() {
        let student = Arc::new(Student::new(UserAccount::student(0), 5));
        student.receive_announcement(announcement("a1", 1)).await;

        let waiter = {
            let student = student.clone();
            tokio::spawn(async move { student.wait_read("a1").await })
        };
        tokio::task::yield_now().await;
        student.mark_read("a1").await.unwrap();

        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("waiter released")
            .unwrap();
        assert!(!student.announcement("a1").await.unwrap().unread);
    }

    #[tokio::test]
    async fn redelivery_keeps_read_state() {
        let student = Student::new(UserAccount::student(0), 5);
        student.receive_announcement(announcement("a1", 1)).await;
        student.mark_read("a1").await.unwrap();
        student.receive_announcement(announcement("a1", 1)).await;
        assert!(!student.announcement("a1").await.unwrap().unread);
    }

    #[tokio::test]
    async fn mark_read_unknown_announcement_fails() {
        let student = Student::new(UserAccount::student(0), 5);
        assert_matches!(
            student.mark_read("nope").await,
            Err(CoreError::NotFound { entity: "announcement", .. })
        );
    }
}
