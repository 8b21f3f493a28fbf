//! The teacher-side life of one course: classes, submissions, grading, closing.

use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use tokio::task::JoinSet;

use campus_client::{CampusApi, ScoreEntry, SetCourseStatusRequest};
use campus_core::ledger::ScoreTag;
use campus_core::model::{Announcement, Class, Course, CourseStatus, Student, Submission};

use crate::context::{CourseLoad, LoadContext, Phase};
use crate::params::{assignment_file, class_request, score_for};
use crate::retry::Attempt;
use crate::verify::{verify_archive, verify_classes};
use crate::workflow::activation::{add_courses, add_students};

const COURSES_PER_CLOSE: usize = 2;
const STUDENTS_PER_CLOSE: usize = 1;

/// Drive a course from registration to closed.
///
/// Students' slots are freed whatever way the cycle ends. A course that
/// closes normally brings new courses and a new student into the run.
pub async fn course_cycle(ctx: Arc<LoadContext>, load: CourseLoad) {
    let CourseLoad { course, api } = load;
    let closed = run_course(&ctx, &course, api.as_ref()).await;
    release_students(&ctx, &course).await;
    if closed {
        tracing::info!(course_id = %course.id, "Course finished");
        add_courses(&ctx, COURSES_PER_CLOSE, Phase::Load).await;
        add_students(&ctx, STUDENTS_PER_CLOSE).await;
    }
}

async fn run_course(ctx: &Arc<LoadContext>, course: &Arc<Course>, api: &dyn CampusApi) -> bool {
    if ctx.deadline.race(course.wait_ready()).await.is_none() {
        return false;
    }
    if !set_status(ctx, course, api, CourseStatus::InProgress).await {
        return false;
    }

    for part in 1..=ctx.config.class_count_per_course {
        if ctx.deadline.is_expired() {
            return false;
        }
        let Ok(part) = u8::try_from(part) else {
            break;
        };
        let Some(class) = open_class(ctx, course, api, part).await else {
            if !ctx.idle().await {
                return false;
            }
            continue;
        };

        if ctx.deadline.is_expired() {
            return false;
        }
        let expected = class.expected_archive().await;
        match api.download_submissions(&course.id, &class.id).await {
            Ok(archive) => {
                if ctx.archive_sampler().sample() {
                    ctx.record_failures(verify_archive(&archive, &expected));
                }
            }
            Err(e) => {
                ctx.record(&e, &[200]);
                continue;
            }
        }

        if ctx.deadline.is_expired() {
            return false;
        }
        if grade_class(ctx, course, &class, api).await {
            ctx.ledger.add_score(ScoreTag::RegisterScore);
        }
    }

    if ctx.deadline.is_expired() {
        return false;
    }
    course.begin_closing();
    set_status(ctx, course, api, CourseStatus::Closed).await
}

/// Announce the change on the server, then mirror it in the model.
async fn set_status(
    ctx: &LoadContext,
    course: &Course,
    api: &dyn CampusApi,
    status: CourseStatus,
) -> bool {
    if ctx.deadline.is_expired() {
        return false;
    }
    let request = SetCourseStatusRequest { status };
    if let Err(e) = api.set_course_status(&course.id, &request).await {
        ctx.record(&e, &[200]);
        return false;
    }
    match course.transition(status).await {
        Ok(()) => true,
        Err(e) => {
            tracing::warn!(course_id = %course.id, error = %e, "Course status out of step");
            false
        }
    }
}

/// Add a class with its announcement and collect the students' submissions.
///
/// Returns the class with its submission window closed.
async fn open_class(
    ctx: &Arc<LoadContext>,
    course: &Arc<Course>,
    api: &dyn CampusApi,
    part: u8,
) -> Option<Arc<Class>> {
    let request = class_request(course, part);
    let added = match api.add_class(&course.id, &request).await {
        Ok(added) => added,
        Err(e) => {
            ctx.record(&e, &[201]);
            return None;
        }
    };
    ctx.ledger.add_score(ScoreTag::AddClass);

    let class = Arc::new(Class::new(
        added.class_id,
        course.id.clone(),
        part,
        request.title,
        request.description,
    ));
    if let Err(e) = course.add_class(class.clone()).await {
        tracing::warn!(course_id = %course.id, error = %e, "Class rejected by the model");
        return None;
    }

    let announcement = Arc::new(Announcement {
        id: request.announcement_id,
        course_id: course.id.clone(),
        course_name: course.name().to_string(),
        title: request.announcement_title,
        message: request.announcement_message,
        created_at: request.created_at,
    });
    let recipients = ctx
        .model
        .broadcast_announcement(course, announcement.clone())
        .await;

    let mut submissions = JoinSet::new();
    for student in recipients {
        let Some(agent) = ctx.agent(student.code()).await else {
            continue;
        };
        submissions.spawn(submit_assignment(
            ctx.clone(),
            course.clone(),
            class.clone(),
            announcement.id.clone(),
            student,
            agent,
        ));
    }
    while let Some(joined) = submissions.join_next().await {
        if let Err(e) = joined {
            tracing::warn!(course_id = %course.id, error = %e, "Submission task failed");
        }
    }

    class.close_submissions();
    let submitted = class.submitted_count().await;
    tracing::debug!(course_id = %course.id, class_id = %class.id, submitted, "Submissions closed");
    Some(class)
}

/// One student's upload for a class, after they have read its announcement.
///
/// Some students first upload a file of the wrong type; a `400` reply
/// makes them resubmit a valid one.
async fn submit_assignment(
    ctx: Arc<LoadContext>,
    course: Arc<Course>,
    class: Arc<Class>,
    announcement_id: String,
    student: Arc<Student>,
    api: Arc<dyn CampusApi>,
) {
    let wait = wait_for_read(&student, &announcement_id, ctx.config.wait_read_announcement);
    match ctx.deadline.race(wait).await {
        None => return,
        Some(false) => {
            tracing::debug!(student = %student.code(), class_id = %class.id, "Announcement not read in time");
            return;
        }
        Some(true) => {}
    }

    if ctx.deadline.is_expired() {
        return;
    }
    match api.get_classes(&course.id).await {
        Ok(listed) => {
            ctx.record_failures(verify_classes(&listed, &course.classes().await));
        }
        Err(e) => {
            ctx.record(&e, &[200]);
            return;
        }
    }

    let mut valid = rand::rng().random::<f64>() >= ctx.config.invalid_submit_frequency;
    loop {
        if ctx.deadline.is_expired() {
            return;
        }
        let file = assignment_file(&student.account, class.part, valid);
        match api.submit_assignment(&course.id, &class.id, &file).await {
            Ok(()) => {
                ctx.ledger.add_score(if valid {
                    ScoreTag::SubmitPdf
                } else {
                    ScoreTag::SubmitDocx
                });
                let submission = Submission::new(file.file_name, &file.data, valid);
                if let Err(e) = class.add_submission(student.code(), submission).await {
                    tracing::debug!(student = %student.code(), error = %e, "Late submission ignored");
                }
                return;
            }
            Err(e) if !valid && e.status() == Some(400) => valid = true,
            Err(e) => {
                ctx.record(&e, &[204]);
                return;
            }
        }
    }
}

async fn wait_for_read(student: &Student, announcement_id: &str, limit: Duration) -> bool {
    tokio::time::timeout(limit, student.wait_read(announcement_id))
        .await
        .is_ok()
}

/// Post scores for every submission on the roster, then record them locally.
async fn grade_class(
    ctx: &LoadContext,
    course: &Course,
    class: &Class,
    api: &dyn CampusApi,
) -> bool {
    let mut scores = Vec::new();
    for code in course.roster().await {
        if let Some(submission) = class.submission(&code).await {
            scores.push(ScoreEntry {
                user_code: code,
                score: score_for(submission.is_valid),
            });
        }
    }

    let attempt = ctx
        .retry_creation()
        .run(&ctx.deadline, &ctx.ledger, || {
            api.post_grades(&course.id, &class.id, &scores)
        })
        .await;
    match attempt {
        Attempt::Done(()) | Attempt::AlreadyExists(_) => {
            for entry in &scores {
                if let Err(e) = class.assign_score(&entry.user_code, entry.score).await {
                    tracing::warn!(class_id = %class.id, error = %e, "Score not recorded");
                }
            }
            true
        }
        Attempt::Failed(e) => {
            ctx.record(&e, &[204]);
            false
        }
        Attempt::Expired => false,
    }
}

/// Free the slot of every student on the roster.
async fn release_students(ctx: &LoadContext, course: &Arc<Course>) {
    for code in course.roster().await {
        if let Some(student) = ctx.model.student(&code).await {
            student.finish_course(course).await;
        }
    }
}
