use std::sync::Arc;

use crate::types::{AnnouncementId, CourseId, Timestamp};

/// A class announcement as created by the benchmark.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Announcement {
    pub id: AnnouncementId,
    pub course_id: CourseId,
    pub course_name: String,
    pub title: String,
    pub message: String,
    pub created_at: Timestamp,
}

/// One student's view of an announcement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnnouncementStatus {
    pub announcement: Arc<Announcement>,
    pub unread: bool,
}

impl AnnouncementStatus {
    /// Sort newest first, the order the announcement list is served in.
    pub fn sort_newest_first(statuses: &mut [AnnouncementStatus]) {
        statuses.sort_by(|a, b| {
            b.announcement
                .created_at
                .cmp(&a.announcement.created_at)
                .then_with(|| a.announcement.id.cmp(&b.announcement.id))
        });
    }
}
