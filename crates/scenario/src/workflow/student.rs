//! The two concurrent cycles every active student runs until the window closes.

use std::sync::Arc;

use campus_client::{RegisterCourseItem, SearchCourseParams};
use campus_core::ledger::ScoreTag;
use campus_core::model::GradeSnapshot;
use campus_core::timetable::Slot;

use crate::context::{LoadContext, StudentLoad};
use crate::params::search_params;
use crate::retry::Attempt;
use crate::verify::{
    verify_announcement_detail, verify_announcement_list, verify_course_detail, verify_grades,
    verify_registered_courses, verify_search_results,
};

/// Grades, search, registered list, then a batch registration.
pub async fn registration_cycle(ctx: Arc<LoadContext>, load: StudentLoad) {
    let StudentLoad { student, api } = load;
    tracing::debug!(student = %student.code(), "Registration cycle started");

    loop {
        if ctx.deadline.is_expired() {
            break;
        }

        // -- grades ---
        let expected = GradeSnapshot::of(&student).await;
        match api.get_grades().await {
            Ok(grades) => {
                if ctx.record_failures(verify_grades(&grades, &expected)) {
                    ctx.ledger.add_score(ScoreTag::GetGrades);
                }
            }
            Err(e) => {
                ctx.record(&e, &[200]);
                if !ctx.idle().await {
                    break;
                }
                continue;
            }
        }

        let remaining = student.remaining_capacity().await;
        if remaining == 0 {
            if !ctx.idle().await {
                break;
            }
            continue;
        }

        // -- search ---
        for _ in 0..remaining {
            if !browse_courses(&ctx, api.as_ref()).await {
                return;
            }
        }

        // -- registered list ---
        if ctx.deadline.is_expired() {
            break;
        }
        let expected = student.registered_courses().await;
        match api.get_registered_courses().await {
            Ok(listed) => {
                ctx.record_failures(verify_registered_courses(&listed, &expected));
            }
            Err(e) => {
                ctx.record(&e, &[200]);
                if !ctx.idle().await {
                    break;
                }
                continue;
            }
        }

        // -- registration ---
        let registration = ctx
            .allocator
            .reserve_free_slots(&student, &Slot::shuffled())
            .await;
        if registration.is_empty() {
            if !ctx.idle().await {
                break;
            }
            continue;
        }
        if ctx.deadline.is_expired() {
            ctx.allocator.rollback(registration).await;
            break;
        }

        let items: Vec<RegisterCourseItem> = registration
            .course_ids()
            .into_iter()
            .map(|id| RegisterCourseItem { id })
            .collect();
        let attempt = ctx
            .retry_idempotent()
            .run(&ctx.deadline, &ctx.ledger, || api.register_courses(&items))
            .await;
        match attempt {
            Attempt::Done(()) | Attempt::AlreadyExists(_) => {
                ctx.ledger.add_score(ScoreTag::RegisterCourses);
                let courses = items.len();
                for e in ctx
                    .allocator
                    .commit(registration, ctx.config.registration_close_delay)
                    .await
                {
                    tracing::debug!(student = %student.code(), error = %e, "Seat dropped at commit");
                }
                tracing::debug!(student = %student.code(), courses, "Registration committed");
            }
            Attempt::Failed(e) => {
                ctx.record(&e, &[200]);
                ctx.allocator.rollback(registration).await;
            }
            Attempt::Expired => {
                ctx.allocator.rollback(registration).await;
                break;
            }
        }
    }
    tracing::debug!(student = %student.code(), "Registration cycle finished");
}

/// Run the configured number of searches, then look up the first hit.
///
/// A search that returned a `next` link is continued with the same filters.
/// Returns `false` once the window closed.
async fn browse_courses(ctx: &LoadContext, api: &dyn campus_client::CampusApi) -> bool {
    let mut target = None;
    let mut next: Option<(SearchCourseParams, String)> = None;

    for _ in 0..ctx.config.search_count_per_registration {
        if ctx.deadline.is_expired() {
            return false;
        }
        let (params, cursor) = match next.take() {
            Some((params, cursor)) => (params, Some(cursor)),
            None => (search_params(ctx.model.teachers()), None),
        };
        match api.search_courses(&params, cursor.as_deref()).await {
            Ok(page) => {
                let failures = verify_search_results(&page.items, &params, ctx.search_sampler());
                if !ctx.record_failures(failures) {
                    continue;
                }
                ctx.ledger.add_score(ScoreTag::SearchCourse);
                if let Some(first) = page.items.first() {
                    target = Some(first.id.clone());
                }
                next = page.links.next.map(|cursor| (params, cursor));
            }
            Err(e) => ctx.record(&e, &[200]),
        }
    }

    let Some(course_id) = target else {
        return true;
    };
    if ctx.deadline.is_expired() {
        return false;
    }
    match api.get_course_detail(&course_id).await {
        Ok(detail) => {
            if let Some(course) = ctx.model.course(&detail.id).await {
                ctx.record_failures(verify_course_detail(&detail, &course));
            }
        }
        Err(e) => ctx.record(&e, &[200]),
    }
    true
}

/// Page through announcements, reading every unread one the student knows about.
///
/// The walk restarts from the first page after the last one.
pub async fn announcement_cycle(ctx: Arc<LoadContext>, load: StudentLoad) {
    let StudentLoad { student, api } = load;
    let mut cursor: Option<String> = None;

    loop {
        if ctx.deadline.is_expired() {
            break;
        }
        let page = match api.get_announcements(cursor.as_deref()).await {
            Ok(page) => page,
            Err(e) => {
                ctx.record(&e, &[200]);
                if !ctx.idle().await {
                    break;
                }
                continue;
            }
        };
        if ctx.record_failures(verify_announcement_list(&page.items, &student).await) {
            ctx.ledger.add_score(ScoreTag::GetAnnouncements);
        }

        for entry in page.items.announcements.iter().filter(|a| a.unread) {
            let Some(expected) = student.announcement(&entry.id).await else {
                continue;
            };
            if ctx.deadline.is_expired() {
                return;
            }
            match api.get_announcement_detail(&entry.id).await {
                Ok(detail) => {
                    if ctx.record_failures(verify_announcement_detail(&detail, &expected)) {
                        ctx.ledger.add_score(ScoreTag::GetAnnouncementDetail);
                    }
                    if let Err(e) = student.mark_read(&entry.id).await {
                        tracing::warn!(student = %student.code(), error = %e, "Could not mark announcement read");
                    }
                }
                Err(e) => ctx.record(&e, &[200]),
            }
        }

        cursor = page.links.next;
        if !ctx.idle().await {
            break;
        }
    }
    tracing::debug!(student = %student.code(), "Announcement cycle finished");
}
