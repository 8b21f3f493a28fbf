//! Load scheduler: the paging check, ramp-up, one task per published actor,
//! and the drain.
//!
//! Every student published on the student bus gets a registration task and
//! an announcement task; every course published on the course bus gets a
//! course task. Publishing happens from inside the workflows, so the load
//! grows as courses close.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

use campus_client::Connector;
use campus_core::config::BenchConfig;
use campus_core::failure::Failure;
use campus_core::ledger::{Ledger, Tally};

use crate::context::{CourseLoad, LoadContext, Phase, StudentLoad};
use crate::deadline::Deadline;
use crate::workflow::{
    add_courses, add_students, announcement_cycle, check_announcement_paging, course_cycle,
    registration_cycle,
};

pub struct LoadScheduler {
    ctx: Arc<LoadContext>,
    student_tasks: TaskTracker,
    course_tasks: TaskTracker,
    cancel: CancellationToken,
}

impl LoadScheduler {
    /// Build a scheduler. The request window starts counting now.
    pub fn new(config: BenchConfig, connector: Arc<dyn Connector>) -> Self {
        let cancel = CancellationToken::new();
        let deadline = Deadline::after(config.load_request_time, cancel.clone());
        let ledger = Arc::new(Ledger::new());
        Self {
            ctx: Arc::new(LoadContext::new(config, deadline, ledger, connector)),
            student_tasks: TaskTracker::new(),
            course_tasks: TaskTracker::new(),
            cancel,
        }
    }

    pub fn context(&self) -> &Arc<LoadContext> {
        &self.ctx
    }

    /// Run the load phase to completion and return the final tally.
    pub async fn run(self) -> Tally {
        self.subscribe();
        tracing::info!(
            window_ms = self.ctx.config.load_request_time.as_millis() as u64,
            students = self.ctx.config.initial_students,
            courses = self.ctx.config.initial_courses,
            "Load started"
        );

        if let Err(failure) = check_announcement_paging(&self.ctx).await {
            tracing::error!(error = %failure, "Compatibility check failed, aborting run");
            self.ctx.ledger.add_failure(failure);
            self.cancel.cancel();
        } else if let Err(failure) = ramp_up(&self.ctx).await {
            tracing::error!(error = %failure, "Ramp-up failed, aborting run");
            self.ctx.ledger.add_failure(failure);
            self.cancel.cancel();
        } else if self.ctx.ledger.has_critical() {
            tracing::error!("Critical failure during ramp-up, aborting run");
            self.cancel.cancel();
        }

        self.ctx.deadline.expired().await;
        tracing::info!("Request window closed, draining in-flight work");
        self.drain().await;

        let tally = self.ctx.ledger.tally();
        let students = self.ctx.model.active_student_count().await;
        let courses = self.ctx.model.course_count().await;
        tracing::info!(
            score_events = tally.total_score_events(),
            timeouts = tally.timeouts,
            students,
            courses,
            "Load finished"
        );
        tally
    }

    /// Attach the task spawners to both buses.
    fn subscribe(&self) {
        let ctx = self.ctx.clone();
        let tasks = self.student_tasks.clone();
        self.ctx
            .student_bus
            .subscribe_with(self.cancel.clone(), move |load: StudentLoad| {
                tasks.spawn(registration_cycle(ctx.clone(), load.clone()));
                tasks.spawn(announcement_cycle(ctx.clone(), load));
            });

        let ctx = self.ctx.clone();
        let tasks = self.course_tasks.clone();
        self.ctx
            .course_bus
            .subscribe_with(self.cancel.clone(), move |load: CourseLoad| {
                tasks.spawn(course_cycle(ctx.clone(), load));
            });
    }

    /// Wait for in-flight tasks up to the drain timeout, then cancel the rest.
    async fn drain(&self) {
        self.student_tasks.close();
        self.course_tasks.close();
        let drained = tokio::time::timeout(self.ctx.config.drain_timeout, async {
            tokio::join!(self.student_tasks.wait(), self.course_tasks.wait());
        })
        .await;
        match drained {
            Ok(()) => tracing::info!("All workflows finished"),
            Err(_) => tracing::warn!(
                students = self.student_tasks.len(),
                courses = self.course_tasks.len(),
                "Drain timeout reached, abandoning remaining workflows"
            ),
        }
        self.cancel.cancel();
    }
}

/// Create the initial courses and students concurrently.
///
/// A run without a single course or a single student cannot measure
/// anything and fails as Critical.
pub async fn ramp_up(ctx: &Arc<LoadContext>) -> Result<(), Failure> {
    let (courses, students) = tokio::join!(
        add_courses(ctx, ctx.config.initial_courses, Phase::RampUp),
        add_students(ctx, ctx.config.initial_students),
    );
    tracing::info!(courses, students, "Ramp-up finished");
    if courses == 0 {
        return Err(Failure::critical("no course could be created during ramp-up"));
    }
    if students == 0 {
        return Err(Failure::critical("no student could log in during ramp-up"));
    }
    Ok(())
}

/// Run one benchmark against the application behind `connector`.
pub async fn run_load(config: BenchConfig, connector: Arc<dyn Connector>) -> Tally {
    LoadScheduler::new(config, connector).run().await
}
