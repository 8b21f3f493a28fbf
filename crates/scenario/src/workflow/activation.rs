//! Bringing new actors into the run: student activation and course creation.

use std::sync::Arc;

use futures::future::join_all;

use campus_client::{AddCourseResponse, CampusApi, LoginRequest};
use campus_core::accounts::UserAccount;
use campus_core::failure::Failure;
use campus_core::ledger::ScoreTag;
use campus_core::model::{Course, Student};

use crate::context::{CourseLoad, LoadContext, Phase, StudentLoad};
use crate::params::{add_course_request, course_spec};
use crate::retry::Attempt;
use crate::verify::{missing_resources, verify_me, verify_resource, ResourceCheck};

pub(crate) fn login_request(account: &UserAccount) -> LoginRequest {
    LoginRequest {
        code: account.code.clone(),
        password: account.password.clone(),
    }
}

/// Load the top page and its assets, then log a fresh student in.
///
/// On success the student is added to the reference model and published on
/// the student bus, which starts its workflows.
pub async fn activate_student(ctx: &Arc<LoadContext>) -> Option<Arc<Student>> {
    if ctx.deadline.is_expired() {
        return None;
    }
    let account = ctx.accounts.next_student();
    let api = match ctx.connector.connect() {
        Ok(api) => api,
        Err(e) => {
            ctx.record(&e, &[]);
            return None;
        }
    };

    if !load_top_page(ctx, api.as_ref()).await {
        return None;
    }

    if ctx.deadline.is_expired() {
        return None;
    }
    if let Err(e) = api.login(&login_request(&account)).await {
        ctx.record(&e, &[200]);
        return None;
    }
    if ctx.deadline.is_expired() {
        return None;
    }
    match api.get_me().await {
        Ok(me) => {
            if let Err(failure) = verify_me(&me, &account) {
                ctx.ledger.add_failure(failure);
                return None;
            }
        }
        Err(e) => {
            ctx.record(&e, &[200]);
            return None;
        }
    }

    let student = Arc::new(Student::new(account, ctx.config.register_course_limit));
    ctx.model.add_student(student.clone()).await;
    ctx.register_agent(student.code(), api.clone()).await;
    tracing::info!(student = %student.code(), "Student activated");
    ctx.student_bus.publish(StudentLoad {
        student: student.clone(),
        api,
    });
    Some(student)
}

/// Fetch the top page and every configured asset it references.
async fn load_top_page(ctx: &LoadContext, api: &dyn CampusApi) -> bool {
    let referenced = match api.get_top_page().await {
        Ok(paths) => paths,
        Err(e) => {
            ctx.record(&e, &[200]);
            return false;
        }
    };
    let mut failures = missing_resources(&referenced, &ctx.config.static_assets);
    for path in referenced
        .iter()
        .filter(|p| ctx.config.static_assets.contains_key(*p))
    {
        if ctx.deadline.is_expired() {
            return false;
        }
        let fetched = api.fetch_asset(path).await;
        match verify_resource(path, &fetched, &ctx.config.static_assets) {
            ResourceCheck::Verified | ResourceCheck::Unchecked => {}
            ResourceCheck::Noise => ctx.ledger.add_timeout(),
            ResourceCheck::Mismatch(failure) => failures.push(failure),
        }
    }
    ctx.record_failures(failures)
}

/// Activate `count` students concurrently. Returns how many made it.
pub async fn add_students(ctx: &Arc<LoadContext>, count: usize) -> usize {
    join_all((0..count).map(|_| activate_student(ctx)))
        .await
        .into_iter()
        .flatten()
        .count()
}

/// Have a random teacher create a course.
///
/// The creation call is retried on timeout; a `409` means an earlier
/// attempt already landed and its body names the course. During ramp-up a
/// teacher who cannot log in is Critical.
pub async fn create_course(ctx: &Arc<LoadContext>, phase: Phase) -> Option<Arc<Course>> {
    if ctx.deadline.is_expired() {
        return None;
    }
    let Some(teacher) = ctx.model.random_teacher() else {
        ctx.ledger
            .add_failure(Failure::critical("no teacher accounts are configured"));
        return None;
    };
    let api = match ctx.connector.connect() {
        Ok(api) => api,
        Err(e) => {
            ctx.record(&e, &[]);
            return None;
        }
    };

    if let Err(e) = api.login(&login_request(&teacher.account)).await {
        if phase == Phase::RampUp {
            ctx.ledger.add_failure(Failure::critical(format!(
                "teacher {} could not log in: {e}",
                teacher.code()
            )));
        } else {
            ctx.record(&e, &[200]);
        }
        return None;
    }
    if ctx.deadline.is_expired() {
        return None;
    }
    match api.get_me().await {
        Ok(me) => {
            if let Err(failure) = verify_me(&me, &teacher.account) {
                ctx.ledger.add_failure(failure);
                return None;
            }
        }
        Err(e) => {
            ctx.record(&e, &[200]);
            return None;
        }
    }

    let spec = course_spec(ctx.codes.next());
    let request = add_course_request(&spec);
    let attempt = ctx
        .retry_creation()
        .run(&ctx.deadline, &ctx.ledger, || api.add_course(&request))
        .await;
    let id = match attempt {
        Attempt::Done(created) => created.id,
        Attempt::AlreadyExists(body) => match serde_json::from_str::<AddCourseResponse>(&body) {
            Ok(existing) => existing.id,
            Err(e) => {
                ctx.ledger.add_failure(Failure::application(format!(
                    "conflict reply for course {} does not name the course: {e}",
                    spec.code
                )));
                return None;
            }
        },
        Attempt::Failed(e) => {
            ctx.record(&e, &[201]);
            return None;
        }
        Attempt::Expired => return None,
    };
    ctx.ledger.add_score(ScoreTag::AddCourse);

    let course = Course::new(id, spec, ctx.config.course_capacity, teacher);
    let (course, created) = ctx.model.add_course(course).await;
    if !created {
        tracing::debug!(course_id = %course.id, "Course already known");
        return Some(course);
    }
    ctx.allocator.add_empty_course(course.clone()).await;
    tracing::info!(
        course_id = %course.id,
        code = %course.spec.code,
        slot = %course.slot(),
        "Course created"
    );
    ctx.course_bus.publish(CourseLoad {
        course: course.clone(),
        api,
    });
    Some(course)
}

/// Create `count` courses concurrently. Returns how many made it.
pub async fn add_courses(ctx: &Arc<LoadContext>, count: usize, phase: Phase) -> usize {
    join_all((0..count).map(|_| create_course(ctx, phase)))
        .await
        .into_iter()
        .flatten()
        .count()
}
