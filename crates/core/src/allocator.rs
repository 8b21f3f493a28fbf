//! Capacity Allocator: matches students to open courses slot by slot.
//!
//! Lock order is fixed: the allocator lock, then the student's schedule
//! lock, then the course's own state. Every path that needs more than one
//! of them takes them in that order.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;

use crate::error::CoreError;
use crate::model::course::ReserveOutcome;
use crate::model::{Course, Student};
use crate::timetable::Slot;
use crate::types::CourseId;

#[derive(Debug, Default)]
struct AllocatorState {
    open: HashMap<Slot, Vec<Arc<Course>>>,
    /// Round-robin start position per slot.
    cursors: HashMap<Slot, usize>,
    seats_held: usize,
}

/// Seats and slots reserved for one registration request, not yet confirmed.
#[derive(Debug)]
#[must_use = "a tentative registration must be committed or rolled back"]
pub struct TentativeRegistration {
    pub student: Arc<Student>,
    pub courses: Vec<Arc<Course>>,
}

impl TentativeRegistration {
    pub fn is_empty(&self) -> bool {
        self.courses.is_empty()
    }

    pub fn course_ids(&self) -> Vec<CourseId> {
        self.courses.iter().map(|c| c.id.clone()).collect()
    }
}

#[derive(Debug, Default)]
pub struct CapacityAllocator {
    state: Mutex<AllocatorState>,
}

impl CapacityAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make a freshly created course eligible for students.
    pub async fn add_empty_course(&self, course: Arc<Course>) {
        let mut state = self.state.lock().await;
        let courses = state.open.entry(course.slot()).or_default();
        if !courses.iter().any(|c| c.id == course.id) {
            courses.push(course);
        }
    }

    /// Reserve a seat for `student` in some open course at `slot`.
    ///
    /// Courses at the slot are tried round-robin from where the previous
    /// search stopped, so no open course is starved. Courses that stopped
    /// registering are pruned on the way.
    pub async fn add_student_for_registrable_course(
        &self,
        student: &Student,
        slot: Slot,
    ) -> Option<Arc<Course>> {
        let mut state = self.state.lock().await;
        let mut schedule = student.schedule().await;
        if !schedule.is_free(slot) || schedule.remaining_capacity() == 0 {
            return None;
        }

        let candidates = state.open.get(&slot).cloned().unwrap_or_default();
        if candidates.is_empty() {
            return None;
        }
        let start = state.cursors.get(&slot).copied().unwrap_or(0) % candidates.len();

        let mut closed = Vec::new();
        let mut chosen = None;
        for offset in 0..candidates.len() {
            let index = (start + offset) % candidates.len();
            let course = &candidates[index];
            match course.try_reserve(student.code()).await {
                ReserveOutcome::Reserved => {
                    chosen = Some((index, course.clone()));
                    break;
                }
                ReserveOutcome::NotRegistering => closed.push(course.id.clone()),
                ReserveOutcome::Full | ReserveOutcome::AlreadySeated => {}
            }
        }

        if !closed.is_empty() {
            if let Some(courses) = state.open.get_mut(&slot) {
                courses.retain(|c| !closed.contains(&c.id));
            }
        }

        let (index, course) = chosen?;
        if let Err(e) = schedule.claim(course.clone()) {
            // The slot was checked above under the same lock; keep the books straight anyway.
            tracing::warn!(course_id = %course.id, error = %e, "Slot claim rejected after reservation");
            course.release_reservation(student.code()).await;
            return None;
        }
        state.cursors.insert(slot, index + 1);
        state.seats_held += 1;
        Some(course)
    }

    /// Walk `slots` in order and tentatively reserve one course per free slot
    /// until the student's registration limit is reached.
    pub async fn reserve_free_slots(
        &self,
        student: &Arc<Student>,
        slots: &[Slot],
    ) -> TentativeRegistration {
        let mut courses = Vec::new();
        for slot in slots {
            if student.remaining_capacity().await == 0 {
                break;
            }
            if let Some(course) = self.add_student_for_registrable_course(student, *slot).await {
                courses.push(course);
            }
        }
        TentativeRegistration {
            student: student.clone(),
            courses,
        }
    }

    /// Turn every reservation of `registration` into a confirmed roster entry.
    ///
    /// Courses that can no longer be confirmed are released and reported as
    /// errors; the rest are committed.
    pub async fn commit(
        &self,
        registration: TentativeRegistration,
        close_delay: Duration,
    ) -> Vec<CoreError> {
        let mut state = self.state.lock().await;
        let student = &registration.student;
        let mut schedule = student.schedule().await;
        let mut errors = Vec::new();
        for course in &registration.courses {
            // The schedule goes first: a course seat, once confirmed, is never released.
            let confirmed = match schedule.confirm(course) {
                Ok(()) => course.confirm(student.code(), close_delay).await,
                Err(e) => Err(e),
            };
            if let Err(e) = confirmed {
                schedule.release(course);
                if course.release_reservation(student.code()).await {
                    state.seats_held = state.seats_held.saturating_sub(1);
                }
                errors.push(e);
            }
        }
        errors
    }

    /// Release every reservation of `registration`.
    pub async fn rollback(&self, registration: TentativeRegistration) {
        let mut state = self.state.lock().await;
        let student = &registration.student;
        let mut schedule = student.schedule().await;
        for course in &registration.courses {
            schedule.release(course);
            if course.release_reservation(student.code()).await {
                state.seats_held = state.seats_held.saturating_sub(1);
            }
        }
        tracing::debug!(
            student = %student.code(),
            courses = registration.courses.len(),
            "Tentative registration rolled back"
        );
    }

    /// Seats currently held through this allocator, tentative or confirmed.
    pub async fn seats_held(&self) -> usize {
        self.state.lock().await.seats_held
    }

    /// Number of courses still listed as open at `slot`.
    pub async fn open_courses_at(&self, slot: Slot) -> usize {
        self.state
            .lock()
            .await
            .open
            .get(&slot)
            .map_or(0, Vec::len)
    }
}
