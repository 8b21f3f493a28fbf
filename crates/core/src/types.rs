/// Server-assigned course identifier.
pub type CourseId = String;

/// Server-assigned class identifier.
pub type ClassId = String;

/// Announcement identifier (generated by the benchmark, accepted by the server).
pub type AnnouncementId = String;

/// Login code of a student or teacher.
pub type UserCode = String;

/// Announcement creation time, microseconds since the Unix epoch.
///
/// This is the only total order over announcements.
pub type Timestamp = i64;
