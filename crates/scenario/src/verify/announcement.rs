use futures::future::{BoxFuture, FutureExt};

use campus_client::{
    AnnouncementDetail, AnnouncementResponse, AnnouncementsResponse, ApiError, CampusApi, Paged,
};
use campus_core::failure::Failure;
use campus_core::model::{AnnouncementStatus, Student};

use super::check_field;

/// Compare a list entry with the student's view of the announcement.
pub fn verify_announcement_summary(
    response: &AnnouncementResponse,
    expected: &AnnouncementStatus,
) -> Vec<Failure> {
    let a = &expected.announcement;
    [
        check_field("announcement", "course_id", &a.course_id, &response.course_id),
        check_field("announcement", "course_name", &a.course_name, &response.course_name),
        check_field("announcement", "title", &a.title, &response.title),
        check_field("announcement", "unread", &expected.unread, &response.unread),
        check_field("announcement", "created_at", &a.created_at, &response.created_at),
    ]
    .into_iter()
    .filter_map(Result::err)
    .collect()
}

/// Compare a detail reply with the student's view before it was read.
pub fn verify_announcement_detail(
    response: &AnnouncementDetail,
    expected: &AnnouncementStatus,
) -> Vec<Failure> {
    let a = &expected.announcement;
    [
        check_field("announcement", "id", &a.id, &response.id),
        check_field("announcement", "course_id", &a.course_id, &response.course_id),
        check_field("announcement", "course_name", &a.course_name, &response.course_name),
        check_field("announcement", "title", &a.title, &response.title),
        check_field("announcement", "message", &a.message, &response.message),
        check_field("announcement", "unread", &expected.unread, &response.unread),
        check_field("announcement", "created_at", &a.created_at, &response.created_at),
    ]
    .into_iter()
    .filter_map(Result::err)
    .collect()
}

/// Creation times must never increase along the list.
pub fn verify_announcement_order(announcements: &[AnnouncementResponse]) -> Option<Failure> {
    announcements
        .windows(2)
        .any(|pair| pair[0].created_at < pair[1].created_at)
        .then(|| Failure::application("announcements are not sorted newest first"))
}

/// Check one page of the list while the run is under way.
///
/// Announcements the student has not been told about yet are skipped.
pub async fn verify_announcement_list(
    response: &AnnouncementsResponse,
    student: &Student,
) -> Vec<Failure> {
    let mut failures = Vec::new();
    for entry in &response.announcements {
        if let Some(expected) = student.announcement(&entry.id).await {
            failures.extend(verify_announcement_summary(entry, &expected));
        }
    }
    failures.extend(verify_announcement_order(&response.announcements));
    failures
}

/// Strict comparison of one page against its expected slice.
///
/// Entries are compared position by position; an entry with the wrong id is
/// reported once without comparing its fields.
fn verify_page(expected: &[AnnouncementStatus], actual: &AnnouncementsResponse) -> Vec<Failure> {
    let mut failures = Vec::new();
    if expected.len() != actual.announcements.len() {
        failures.push(Failure::application(format!(
            "announcement page holds {} entries, expected {}",
            actual.announcements.len(),
            expected.len()
        )));
    }
    failures.extend(verify_announcement_order(&actual.announcements));
    for (expected, actual) in expected.iter().zip(&actual.announcements) {
        match check_field("announcement", "id", &expected.announcement.id, &actual.id) {
            Ok(()) => failures.extend(verify_announcement_summary(actual, expected)),
            Err(failure) => failures.push(failure),
        }
    }
    failures
}

fn page_failures(failures: Vec<Failure>) -> Result<(), Vec<Failure>> {
    if failures.is_empty() {
        Ok(())
    } else {
        Err(failures)
    }
}

async fn fetch_page(
    api: &dyn CampusApi,
    cursor: Option<&str>,
) -> Result<Paged<AnnouncementsResponse>, Vec<Failure>> {
    api.get_announcements(cursor).await.map_err(|e: ApiError| {
        vec![e
            .to_failure(&[200])
            .unwrap_or_else(|| Failure::Transport(e.to_string()))]
    })
}

/// Walk the announcement list from `cursor` to its end and compare every
/// page with the matching slice of `expected` (newest first).
///
/// After the pages behind a page are verified, the page is fetched again
/// through the `prev` link of its successor and compared once more, so the
/// list is checked both walking forward and navigating back. Returns the
/// `prev` link of the first page walked, or every mismatch of the first
/// page that failed.
pub fn reconcile_announcement_pages<'a>(
    api: &'a dyn CampusApi,
    cursor: Option<&'a str>,
    expected: &'a [AnnouncementStatus],
    page_size: usize,
) -> BoxFuture<'a, Result<Option<String>, Vec<Failure>>> {
    async move {
        let page = fetch_page(api, cursor).await?;
        let is_last = page.items.announcements.len() < page_size
            || expected.len() < page_size
            || page.links.next.is_none();
        if is_last {
            page_failures(verify_page(expected, &page.items))?;
            return Ok(page.links.prev);
        }

        let head = &expected[..page_size];
        page_failures(verify_page(head, &page.items))?;

        let next = page.links.next.clone();
        let back = reconcile_announcement_pages(api, next.as_deref(), &expected[page_size..], page_size)
            .await?;

        let again = fetch_page(api, back.as_deref()).await?;
        page_failures(verify_page(head, &again.items))?;
        Ok(page.links.prev)
    }
    .boxed()
}
