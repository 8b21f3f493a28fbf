//! Course entity: status machine, two-phase seat book and ready signal.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::{watch, Mutex, RwLock};

use crate::error::CoreError;
use crate::model::{Class, Teacher};
use crate::timetable::Slot;
use crate::types::{CourseId, UserCode};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CourseType {
    LiberalArts,
    MajorSubjects,
}

/// Lifecycle of a course. Transitions move strictly forward, one step at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CourseStatus {
    /// Accepting tentative seat reservations.
    Registering,
    /// Roster is full or the registration window elapsed.
    Registered,
    InProgress,
    Closed,
}

impl CourseStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            CourseStatus::Registering => "registering",
            CourseStatus::Registered => "registered",
            CourseStatus::InProgress => "in-progress",
            CourseStatus::Closed => "closed",
        }
    }

    pub fn can_advance_to(self, next: CourseStatus) -> bool {
        matches!(
            (self, next),
            (CourseStatus::Registering, CourseStatus::Registered)
                | (CourseStatus::Registered, CourseStatus::InProgress)
                | (CourseStatus::InProgress, CourseStatus::Closed)
        )
    }
}

impl fmt::Display for CourseStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Parameters a course is created with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CourseSpec {
    pub code: String,
    pub course_type: CourseType,
    pub name: String,
    pub description: String,
    pub credit: u8,
    pub slot: Slot,
    pub keywords: String,
}

/// State of one seat in the two-phase registration protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Seat {
    /// Held locally while the registration request is in flight.
    Reserved,
    /// The application accepted the registration.
    Confirmed,
}

/// Outcome of a reservation attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReserveOutcome {
    Reserved,
    Full,
    AlreadySeated,
    NotRegistering,
}

#[derive(Debug)]
struct CourseState {
    status: CourseStatus,
    seats: HashMap<UserCode, Seat>,
}

impl CourseState {
    fn confirmed(&self) -> usize {
        self.seats.values().filter(|s| **s == Seat::Confirmed).count()
    }
}

#[derive(Debug)]
pub struct Course {
    pub id: CourseId,
    pub spec: CourseSpec,
    pub capacity: usize,
    pub teacher: Arc<Teacher>,
    state: Mutex<CourseState>,
    classes: RwLock<Vec<Arc<Class>>>,
    ready: watch::Sender<bool>,
    close_timer_armed: AtomicBool,
    closing: AtomicBool,
}

impl Course {
    pub fn new(id: CourseId, spec: CourseSpec, capacity: usize, teacher: Arc<Teacher>) -> Self {
        let (ready, _) = watch::channel(false);
        Self {
            id,
            spec,
            capacity,
            teacher,
            state: Mutex::new(CourseState {
                status: CourseStatus::Registering,
                seats: HashMap::new(),
            }),
            classes: RwLock::new(Vec::new()),
            ready,
            close_timer_armed: AtomicBool::new(false),
            closing: AtomicBool::new(false),
        }
    }

    pub fn name(&self) -> &str {
        &self.spec.name
    }

    pub fn slot(&self) -> Slot {
        self.spec.slot
    }

    pub async fn status(&self) -> CourseStatus {
        self.state.lock().await.status
    }

    /// Advance the status by exactly one step.
    pub async fn transition(&self, next: CourseStatus) -> Result<(), CoreError> {
        let mut state = self.state.lock().await;
        if !state.status.can_advance_to(next) {
            return Err(CoreError::InvalidTransition {
                course_id: self.id.clone(),
                from: state.status.as_str(),
                to: next.as_str(),
            });
        }
        if next == CourseStatus::Closed {
            let classes = self.classes.read().await.len();
            tracing::debug!(course_id = %self.id, classes, "Course closed");
        }
        state.status = next;
        Ok(())
    }

    /// Take a tentative seat for `student`.
    ///
    /// Callers must hold the allocator lock; see
    /// [`CapacityAllocator`](crate::allocator::CapacityAllocator).
    pub(crate) async fn try_reserve(&self, student: &str) -> ReserveOutcome {
        let mut state = self.state.lock().await;
        if state.status != CourseStatus::Registering {
            return ReserveOutcome::NotRegistering;
        }
        if state.seats.contains_key(student) {
            return ReserveOutcome::AlreadySeated;
        }
        if state.seats.len() >= self.capacity {
            return ReserveOutcome::Full;
        }
        state.seats.insert(student.to_string(), Seat::Reserved);
        ReserveOutcome::Reserved
    }

    /// Drop a tentative seat. Confirmed seats are never released.
    pub(crate) async fn release_reservation(&self, student: &str) -> bool {
        let mut state = self.state.lock().await;
        if state.seats.get(student) == Some(&Seat::Reserved) {
            state.seats.remove(student);
            true
        } else {
            false
        }
    }

    /// Turn a tentative seat into a roster entry.
    ///
    /// Idempotent for an already confirmed seat. The first confirmation arms
    /// the registration-close timer; filling the last seat fires the ready
    /// signal immediately. A course that is closing or closed refuses.
    pub async fn confirm(
        self: &Arc<Self>,
        student: &str,
        close_delay: Duration,
    ) -> Result<(), CoreError> {
        let full = {
            let mut state = self.state.lock().await;
            if state.status == CourseStatus::Closed || self.is_closing() {
                return Err(CoreError::CourseState(self.id.clone()));
            }
            match state.seats.get_mut(student) {
                Some(seat) => *seat = Seat::Confirmed,
                None => {
                    return Err(CoreError::NotFound {
                        entity: "seat reservation",
                        id: format!("{}/{}", self.id, student),
                    })
                }
            }
            state.confirmed() >= self.capacity
        };

        if full {
            self.close_registration().await;
        } else if !self.close_timer_armed.swap(true, Ordering::SeqCst) {
            let course = Arc::downgrade(self);
            tokio::spawn(async move {
                tokio::time::sleep(close_delay).await;
                if let Some(course) = course.upgrade() {
                    course.close_registration().await;
                }
            });
        }
        Ok(())
    }

    /// Stop accepting reservations and fire the ready signal. Runs its effect once.
    pub async fn close_registration(&self) {
        {
            let mut state = self.state.lock().await;
            if state.status == CourseStatus::Registering {
                state.status = CourseStatus::Registered;
            }
        }
        let fired = self.ready.send_if_modified(|ready| {
            if *ready {
                false
            } else {
                *ready = true;
                true
            }
        });
        if fired {
            tracing::debug!(course_id = %self.id, "Course ready");
        }
    }

    pub fn is_ready(&self) -> bool {
        *self.ready.borrow()
    }

    /// Resolve once the ready signal has fired.
    pub async fn wait_ready(&self) {
        let mut rx = self.ready.subscribe();
        // The sender lives as long as `self`, so the wait cannot fail.
        let _ = rx.wait_for(|ready| *ready).await;
    }

    /// Confirmed students, sorted by code.
    pub async fn roster(&self) -> Vec<UserCode> {
        let state = self.state.lock().await;
        let mut roster: Vec<UserCode> = state
            .seats
            .iter()
            .filter(|(_, seat)| **seat == Seat::Confirmed)
            .map(|(code, _)| code.clone())
            .collect();
        roster.sort();
        roster
    }

    /// Seats held either tentatively or confirmed.
    pub async fn occupied_seats(&self) -> usize {
        self.state.lock().await.seats.len()
    }

    pub async fn add_class(&self, class: Arc<Class>) -> Result<(), CoreError> {
        let state = self.state.lock().await;
        if state.status != CourseStatus::InProgress {
            return Err(CoreError::CourseState(self.id.clone()));
        }
        self.classes.write().await.push(class);
        Ok(())
    }

    pub async fn classes(&self) -> Vec<Arc<Class>> {
        self.classes.read().await.clone()
    }

    pub async fn class(&self, id: &str) -> Option<Arc<Class>> {
        self.classes.read().await.iter().find(|c| c.id == id).cloned()
    }

    /// Flag the course as about to close, before the close call is sent.
    pub fn begin_closing(&self) {
        self.closing.store(true, Ordering::SeqCst);
    }

    pub fn is_closing(&self) -> bool {
        self.closing.load(Ordering::SeqCst)
    }
}
