//! Compatibility check run before the load starts.
//!
//! One teacher and a pair of fresh students set up just enough courses and
//! classes for the announcement list to span several pages. Every student's
//! list is then reconciled page by page, forward and back, once while all
//! announcements are unread and once after one of them was read. None of
//! these actors join the load.

use std::sync::Arc;

use futures::future::try_join_all;

use campus_client::{
    AddClassRequest, AddCourseResponse, ApiError, CampusApi, RegisterCourseItem,
    SetCourseStatusRequest,
};
use campus_core::accounts::UserAccount;
use campus_core::failure::Failure;
use campus_core::model::{Announcement, AnnouncementStatus, Course, CourseStatus, Teacher};
use campus_core::timetable::{DayOfWeek, Slot};

use crate::context::LoadContext;
use crate::params::{add_course_request, class_request, course_spec};
use crate::retry::Attempt;
use crate::verify::reconcile_announcement_pages;
use crate::workflow::activation::login_request;

const CHECK_STUDENTS: usize = 2;
const CHECK_COURSES: usize = 3;

enum CheckError {
    /// The request window closed before the check finished.
    Expired,
    Failed(Failure),
}

impl From<Failure> for CheckError {
    fn from(failure: Failure) -> Self {
        CheckError::Failed(failure)
    }
}

fn setup_failure(step: &str, error: &ApiError) -> CheckError {
    CheckError::Failed(Failure::critical(format!(
        "compatibility check could not {step}: {error}"
    )))
}

fn ensure_open(ctx: &LoadContext) -> Result<(), CheckError> {
    if ctx.deadline.is_expired() {
        Err(CheckError::Expired)
    } else {
        Ok(())
    }
}

/// Check that the announcement list pages consistently.
///
/// Any failure here means the application cannot be measured, so it is
/// returned as Critical; the page mismatches behind it go to the ledger.
/// A window that closes mid-check ends it without a verdict.
pub async fn check_announcement_paging(ctx: &Arc<LoadContext>) -> Result<(), Failure> {
    match run_check(ctx).await {
        Ok(announcements) => {
            tracing::info!(announcements, "Announcement paging check passed");
            Ok(())
        }
        Err(CheckError::Expired) => {
            tracing::debug!("Request window closed during the paging check");
            Ok(())
        }
        Err(CheckError::Failed(failure)) => Err(failure),
    }
}

async fn run_check(ctx: &LoadContext) -> Result<usize, CheckError> {
    let page_size = ctx.config.announcements_per_page;
    let teacher = ctx
        .model
        .random_teacher()
        .ok_or_else(|| Failure::critical("no teacher accounts are configured"))?;
    let teacher_api = log_in(ctx, &teacher.account).await?;

    let mut students = Vec::with_capacity(CHECK_STUDENTS);
    for _ in 0..CHECK_STUDENTS {
        let account = ctx.accounts.next_student();
        let api = log_in(ctx, &account).await?;
        students.push((account, api));
    }

    let mut courses = Vec::with_capacity(CHECK_COURSES);
    for day in DayOfWeek::ALL.into_iter().take(CHECK_COURSES) {
        courses.push(create_course(ctx, &teacher, teacher_api.as_ref(), day).await?);
    }

    let items: Vec<RegisterCourseItem> = courses
        .iter()
        .map(|c| RegisterCourseItem { id: c.id.clone() })
        .collect();
    for (account, api) in &students {
        ensure_open(ctx)?;
        api.register_courses(&items)
            .await
            .map_err(|e| setup_failure(&format!("register {}", account.code), &e))?;
    }
    for course in &courses {
        set_status(ctx, teacher_api.as_ref(), course, CourseStatus::InProgress).await?;
    }

    // One page more than twice over, so the walk has a middle page to come back to.
    let mut expected = add_announcements(ctx, teacher_api.as_ref(), &courses, 2 * page_size + 1).await?;
    for (account, api) in &students {
        reconcile(ctx, api.as_ref(), &account.code, &expected).await?;
    }

    // A read shows up in the reader's list and nowhere else.
    let newest = expected.first().map(|s| s.announcement.id.clone());
    if let (Some((reader, reader_api)), Some(newest)) = (students.first(), newest) {
        ensure_open(ctx)?;
        reader_api
            .get_announcement_detail(&newest)
            .await
            .map_err(|e| setup_failure("read an announcement", &e))?;
        let untouched = expected.clone();
        expected[0].unread = false;
        reconcile(ctx, reader_api.as_ref(), &reader.code, &expected).await?;
        for (account, api) in students.iter().skip(1) {
            reconcile(ctx, api.as_ref(), &account.code, &untouched).await?;
        }
    }

    for course in &courses {
        set_status(ctx, teacher_api.as_ref(), course, CourseStatus::Closed).await?;
    }
    Ok(expected.len())
}

async fn log_in(ctx: &LoadContext, account: &UserAccount) -> Result<Arc<dyn CampusApi>, CheckError> {
    ensure_open(ctx)?;
    let api = ctx
        .connector
        .connect()
        .map_err(|e| setup_failure("open a session", &e))?;
    api.login(&login_request(account))
        .await
        .map_err(|e| setup_failure(&format!("log {} in", account.code), &e))?;
    Ok(api)
}

/// A course on the first period of `day`, known only to the check.
async fn create_course(
    ctx: &LoadContext,
    teacher: &Arc<Teacher>,
    api: &dyn CampusApi,
    day: DayOfWeek,
) -> Result<Arc<Course>, CheckError> {
    ensure_open(ctx)?;
    let mut spec = course_spec(ctx.codes.next());
    spec.slot = Slot::new(day, 1).unwrap_or(spec.slot);
    let request = add_course_request(&spec);
    let attempt = ctx
        .retry_creation()
        .run(&ctx.deadline, &ctx.ledger, || api.add_course(&request))
        .await;
    let id = match attempt {
        Attempt::Done(created) => created.id,
        Attempt::AlreadyExists(body) => serde_json::from_str::<AddCourseResponse>(&body)
            .map_err(|e| {
                Failure::critical(format!(
                    "conflict reply for course {} does not name the course: {e}",
                    spec.code
                ))
            })?
            .id,
        Attempt::Failed(e) => return Err(setup_failure("create a course", &e)),
        Attempt::Expired => return Err(CheckError::Expired),
    };
    Ok(Arc::new(Course::new(
        id,
        spec,
        ctx.config.course_capacity,
        teacher.clone(),
    )))
}

async fn set_status(
    ctx: &LoadContext,
    api: &dyn CampusApi,
    course: &Course,
    status: CourseStatus,
) -> Result<(), CheckError> {
    ensure_open(ctx)?;
    api.set_course_status(&course.id, &SetCourseStatusRequest { status })
        .await
        .map_err(|e| setup_failure(&format!("move course {} to {status:?}", course.id), &e))
}

/// Add `count` classes spread over `courses`, each with its announcement.
///
/// Creation times are spaced one microsecond apart so the expected order is
/// total. Returns the announcements newest first, all unread.
async fn add_announcements(
    ctx: &LoadContext,
    api: &dyn CampusApi,
    courses: &[Arc<Course>],
    count: usize,
) -> Result<Vec<AnnouncementStatus>, CheckError> {
    if courses.is_empty() {
        return Ok(Vec::new());
    }
    let base = chrono::Utc::now().timestamp_micros();
    let per_course = courses.iter().enumerate().map(|(offset, course)| async move {
        let mut added = Vec::new();
        for n in (offset..count).step_by(courses.len()) {
            ensure_open(ctx)?;
            let part = u8::try_from(n / courses.len() + 1)
                .map_err(|_| Failure::critical("announcement page size is too large to check"))?;
            let request = AddClassRequest {
                created_at: base + n as i64,
                ..class_request(course, part)
            };
            api.add_class(&course.id, &request)
                .await
                .map_err(|e| setup_failure("add a class", &e))?;
            added.push(AnnouncementStatus {
                announcement: Arc::new(Announcement {
                    id: request.announcement_id,
                    course_id: course.id.clone(),
                    course_name: course.name().to_string(),
                    title: request.announcement_title,
                    message: request.announcement_message,
                    created_at: request.created_at,
                }),
                unread: true,
            });
        }
        Ok::<_, CheckError>(added)
    });

    let mut expected: Vec<AnnouncementStatus> =
        try_join_all(per_course).await?.into_iter().flatten().collect();
    AnnouncementStatus::sort_newest_first(&mut expected);
    Ok(expected)
}

async fn reconcile(
    ctx: &LoadContext,
    api: &dyn CampusApi,
    student: &str,
    expected: &[AnnouncementStatus],
) -> Result<(), CheckError> {
    ensure_open(ctx)?;
    match reconcile_announcement_pages(api, None, expected, ctx.config.announcements_per_page).await
    {
        Ok(_) => Ok(()),
        Err(failures) => {
            ctx.ledger.add_failures(failures);
            Err(CheckError::Failed(Failure::critical(format!(
                "announcement list of {student} does not page consistently"
            ))))
        }
    }
}
