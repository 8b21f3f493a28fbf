//! In-memory campus application for driving the scenario without a network.
//!
//! [`MockCampus`] holds the shared server state and hands out one
//! [`MockSession`] per actor, the way the HTTP connector hands out one
//! cookie-carrying client per actor.

#![allow(dead_code)]

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::io::{Cursor, Write};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;

use campus_client::{
    AddClassRequest, AddClassResponse, AddCourseRequest, AddCourseResponse, AnnouncementDetail,
    AnnouncementResponse, AnnouncementsResponse, ApiError, AssignmentFile, CampusApi,
    ClassResponse, ClassScore, Connector, CourseGrade, CourseResponse, GradeResponse,
    GradeSummary, LoginRequest, MeResponse, PageLinks, Paged, RegisterCourseItem,
    RegisteredCourse, ScoreEntry, SearchCourseParams, SetCourseStatusRequest,
};
use campus_core::accounts::UserAccount;
use campus_core::config::BenchConfig;
use campus_core::hashing::sha256_hex;
use campus_core::ledger::Tally;
use campus_core::model::CourseStatus;
use campus_scenario::LoadScheduler;

const SEARCH_PAGE_SIZE: usize = 20;

/// Time every call takes on the paused test clock. Without it a run never
/// lets the clock reach the end of its window.
const CALL_LATENCY: Duration = Duration::from_millis(10);

// ---------------------------------------------------------------------------
// Server state
// ---------------------------------------------------------------------------

struct StoredCourse {
    id: String,
    request: AddCourseRequest,
    teacher: String,
    status: CourseStatus,
    students: BTreeSet<String>,
    classes: Vec<StoredClass>,
}

impl StoredCourse {
    fn response(&self) -> CourseResponse {
        CourseResponse {
            id: self.id.clone(),
            code: self.request.code.clone(),
            course_type: self.request.course_type,
            name: self.request.name.clone(),
            description: self.request.description.clone(),
            credit: self.request.credit,
            period: self.request.period,
            day_of_week: self.request.day_of_week,
            teacher: self.teacher.clone(),
            keywords: self.request.keywords.clone(),
            status: self.status,
        }
    }

    fn matches(&self, params: &SearchCourseParams) -> bool {
        let r = &self.request;
        let in_name = params.keywords.iter().all(|k| r.name.contains(k.as_str()));
        let in_keywords = params.keywords.iter().all(|k| r.keywords.contains(k.as_str()));
        params.course_type.is_none_or(|t| t == r.course_type)
            && params.credit.is_none_or(|c| c == r.credit)
            && params.teacher.as_ref().is_none_or(|t| *t == self.teacher)
            && params.period.is_none_or(|p| p == r.period)
            && params.day_of_week.is_none_or(|d| d == r.day_of_week)
            && params.status.is_none_or(|s| s == self.status)
            && (in_name || in_keywords)
    }
}

struct StoredClass {
    id: String,
    part: u8,
    title: String,
    description: String,
    closed: bool,
    submissions: BTreeMap<String, (String, Vec<u8>)>,
    scores: HashMap<String, u32>,
}

struct StoredAnnouncement {
    id: String,
    course_id: String,
    course_name: String,
    title: String,
    message: String,
    created_at: i64,
}

#[derive(Default)]
struct CampusState {
    courses: Vec<StoredCourse>,
    /// Position of each course in `courses`, by id.
    course_index: HashMap<String, usize>,
    announcements: Vec<StoredAnnouncement>,
    read: HashSet<(String, String)>,
    next_id: usize,
}

impl CampusState {
    fn fresh_id(&mut self, prefix: &str) -> String {
        self.next_id += 1;
        format!("{prefix}-{:06}", self.next_id)
    }

    fn course(&self, id: &str) -> Option<&StoredCourse> {
        self.course_index.get(id).map(|&i| &self.courses[i])
    }

    fn course_mut(&mut self, id: &str) -> Option<&mut StoredCourse> {
        let i = *self.course_index.get(id)?;
        self.courses.get_mut(i)
    }

    /// Announcements of every course the student is enrolled in, newest first.
    fn announcements_for(&self, student: &str) -> Vec<&StoredAnnouncement> {
        let mut visible: Vec<&StoredAnnouncement> = self
            .announcements
            .iter()
            .filter(|a| {
                self.course(&a.course_id)
                    .is_some_and(|c| c.students.contains(student))
            })
            .collect();
        visible.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| a.id.cmp(&b.id)));
        visible
    }
}

/// Knobs for misbehaving on purpose.
#[derive(Default)]
pub struct Faults {
    /// Course creations that take effect but reply with a timeout.
    pub add_course_timeouts: AtomicUsize,
    /// Refuse every login.
    pub reject_logins: AtomicBool,
    /// Serve the first announcement page whatever the cursor asks for.
    pub repeat_first_announcement_page: AtomicBool,
}

struct Shared {
    state: Mutex<CampusState>,
    faults: Faults,
    announcement_page_size: usize,
    assets: BTreeMap<String, Vec<u8>>,
    sessions: AtomicUsize,
    latency: Duration,
}

// ---------------------------------------------------------------------------
// Application
// ---------------------------------------------------------------------------

#[derive(Clone)]
pub struct MockCampus {
    shared: Arc<Shared>,
}

impl MockCampus {
    pub fn new(announcement_page_size: usize) -> Self {
        let assets = BTreeMap::from([
            ("/_nuxt/app.js".to_string(), b"console.log('campus')".to_vec()),
            ("/_nuxt/app.css".to_string(), b"body { margin: 0 }".to_vec()),
        ]);
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(CampusState::default()),
                faults: Faults::default(),
                announcement_page_size,
                assets,
                sessions: AtomicUsize::new(0),
                latency: CALL_LATENCY,
            }),
        }
    }

    /// `path -> digest` of every asset the top page references.
    pub fn asset_digests(&self) -> BTreeMap<String, String> {
        self.shared
            .assets
            .iter()
            .map(|(path, data)| (path.clone(), sha256_hex(data)))
            .collect()
    }

    pub fn faults(&self) -> &Faults {
        &self.shared.faults
    }

    pub fn session(&self) -> Arc<MockSession> {
        self.shared.sessions.fetch_add(1, Ordering::Relaxed);
        Arc::new(MockSession {
            shared: self.shared.clone(),
            user: Mutex::new(None),
        })
    }

    pub fn sessions_opened(&self) -> usize {
        self.shared.sessions.load(Ordering::Relaxed)
    }

    pub fn course_count(&self) -> usize {
        lock(&self.shared.state).courses.len()
    }

    pub fn courses_with_code(&self, code: &str) -> usize {
        lock(&self.shared.state)
            .courses
            .iter()
            .filter(|c| c.request.code == code)
            .count()
    }

    pub fn enrolled(&self, course_id: &str) -> usize {
        lock(&self.shared.state)
            .course(course_id)
            .map_or(0, |c| c.students.len())
    }

    pub fn course_status(&self, course_id: &str) -> Option<CourseStatus> {
        lock(&self.shared.state).course(course_id).map(|c| c.status)
    }

    pub fn read_count(&self) -> usize {
        lock(&self.shared.state).read.len()
    }
}

impl Connector for MockCampus {
    fn connect(&self) -> Result<Arc<dyn CampusApi>, ApiError> {
        Ok(self.session())
    }
}

/// Test configuration scaled down for an in-memory run on a paused clock.
pub fn test_config(campus: &MockCampus) -> BenchConfig {
    BenchConfig {
        initial_students: 50,
        initial_courses: 20,
        teacher_count: 4,
        register_course_limit: 5,
        course_capacity: 6,
        class_count_per_course: 3,
        registration_close_delay: Duration::from_millis(200),
        wait_read_announcement: Duration::from_millis(500),
        load_request_time: Duration::from_secs(4),
        drain_timeout: Duration::from_secs(2),
        retry_backoff: Duration::from_millis(20),
        idle_backoff: Duration::from_millis(20),
        search_verify_rate: 1.0,
        assignments_verify_rate: 1.0,
        announcements_per_page: campus.shared.announcement_page_size,
        static_assets: campus.asset_digests(),
        ..BenchConfig::default()
    }
}

/// Real time a scaled-down run may take before it counts as stuck.
const WALL_CLOCK_LIMIT: Duration = Duration::from_secs(60);

/// Run `scheduler` to completion on the paused clock.
///
/// The run must end within its window plus the drain timeout, and must not
/// spin for long in real time to get there.
pub async fn run_to_completion(scheduler: LoadScheduler) -> Tally {
    let config = &scheduler.context().config;
    let limit = config.load_request_time + config.drain_timeout + Duration::from_secs(1);
    let started = std::time::Instant::now();
    let tally = tokio::time::timeout(limit, scheduler.run())
        .await
        .expect("run should end once the window and the drain are over");
    let elapsed = started.elapsed();
    assert!(elapsed < WALL_CLOCK_LIMIT, "run took {elapsed:?} of real time");
    tally
}

fn lock(state: &Mutex<CampusState>) -> MutexGuard<'_, CampusState> {
    state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn status(method: &str, path: &str, code: u16, body: impl Into<String>) -> ApiError {
    ApiError::Status {
        method: method.into(),
        path: path.into(),
        status: code,
        body: body.into(),
    }
}

fn page_of(cursor: Option<&str>) -> usize {
    cursor
        .and_then(|c| c.rsplit("page=").next())
        .and_then(|n| n.parse().ok())
        .unwrap_or(1)
}

fn paginate<T>(items: Vec<T>, page: usize, size: usize, base: &str) -> (Vec<T>, PageLinks) {
    let total = items.len();
    let start = (page - 1) * size;
    let links = PageLinks {
        prev: (page > 1).then(|| format!("{base}?page={}", page - 1)),
        next: (start + size < total).then(|| format!("{base}?page={}", page + 1)),
    };
    (items.into_iter().skip(start).take(size).collect(), links)
}

/// Resolve a login code to the seeded account it names.
fn seeded_account(code: &str) -> Option<UserAccount> {
    let (prefix, digits) = code.split_at_checked(1)?;
    let index = digits.parse::<usize>().ok()?.checked_sub(1)?;
    let account = match prefix {
        "S" => UserAccount::student(index),
        "T" => UserAccount::teacher(index),
        _ => return None,
    };
    (account.code == code).then_some(account)
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

pub struct MockSession {
    shared: Arc<Shared>,
    user: Mutex<Option<UserAccount>>,
}

impl MockSession {
    /// Simulated round trip, taken before any state is touched.
    async fn round_trip(&self) {
        tokio::time::sleep(self.shared.latency).await;
    }

    fn state(&self) -> MutexGuard<'_, CampusState> {
        lock(&self.shared.state)
    }

    fn user(&self, method: &str, path: &str) -> Result<UserAccount, ApiError> {
        self.user
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
            .ok_or_else(|| status(method, path, 401, "not logged in"))
    }

    fn teacher(&self, method: &str, path: &str) -> Result<UserAccount, ApiError> {
        let user = self.user(method, path)?;
        if user.is_admin {
            Ok(user)
        } else {
            Err(status(method, path, 403, "teachers only"))
        }
    }
}

#[async_trait]
impl CampusApi for MockSession {
    async fn login(&self, request: &LoginRequest) -> Result<(), ApiError> {
        self.round_trip().await;
        if self.shared.faults.reject_logins.load(Ordering::SeqCst) {
            return Err(status("POST", "/login", 500, "login is down"));
        }
        let account = seeded_account(&request.code)
            .filter(|a| a.password == request.password)
            .ok_or_else(|| status("POST", "/login", 401, "invalid credentials"))?;
        *self
            .user
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(account);
        Ok(())
    }

    async fn get_top_page(&self) -> Result<Vec<String>, ApiError> {
        self.round_trip().await;
        Ok(self.shared.assets.keys().cloned().collect())
    }

    async fn fetch_asset(&self, path: &str) -> Result<Vec<u8>, ApiError> {
        self.round_trip().await;
        self.shared
            .assets
            .get(path)
            .cloned()
            .ok_or_else(|| status("GET", path, 404, "not found"))
    }

    async fn get_me(&self) -> Result<MeResponse, ApiError> {
        self.round_trip().await;
        let user = self.user("GET", "/api/users/me")?;
        Ok(MeResponse {
            code: user.code,
            name: user.name,
            is_admin: user.is_admin,
        })
    }

    async fn get_grades(&self) -> Result<GradeResponse, ApiError> {
        self.round_trip().await;
        let user = self.user("GET", "/api/users/me/grades")?;
        let state = self.state();
        let mut credits = 0;
        let courses = state
            .courses
            .iter()
            .filter(|c| c.students.contains(&user.code))
            .map(|course| {
                if course.status == CourseStatus::Closed {
                    credits += u32::from(course.request.credit);
                }
                let class_scores: Vec<ClassScore> = course
                    .classes
                    .iter()
                    .map(|class| ClassScore {
                        class_id: class.id.clone(),
                        title: class.title.clone(),
                        part: class.part,
                        score: class.scores.get(&user.code).copied(),
                        submitters: class.submissions.len() as u32,
                    })
                    .collect();
                CourseGrade {
                    id: course.id.clone(),
                    name: course.request.name.clone(),
                    code: course.request.code.clone(),
                    total_score: class_scores.iter().filter_map(|c| c.score).sum(),
                    class_scores,
                }
            })
            .collect();
        Ok(GradeResponse {
            summary: GradeSummary { credits, gpa: 0.0 },
            courses,
        })
    }

    async fn search_courses(
        &self,
        params: &SearchCourseParams,
        cursor: Option<&str>,
    ) -> Result<Paged<Vec<CourseResponse>>, ApiError> {
        self.round_trip().await;
        self.user("GET", "/api/courses")?;
        let state = self.state();
        let mut hits: Vec<CourseResponse> = state
            .courses
            .iter()
            .filter(|c| c.matches(params))
            .map(StoredCourse::response)
            .collect();
        hits.sort_by(|a, b| a.code.cmp(&b.code));
        let (items, links) = paginate(hits, page_of(cursor), SEARCH_PAGE_SIZE, "/api/courses");
        Ok(Paged { items, links })
    }

    async fn get_course_detail(&self, course_id: &str) -> Result<CourseResponse, ApiError> {
        self.round_trip().await;
        let path = format!("/api/courses/{course_id}");
        self.user("GET", &path)?;
        self.state()
            .course(course_id)
            .map(StoredCourse::response)
            .ok_or_else(|| status("GET", &path, 404, "no such course"))
    }

    async fn add_course(&self, request: &AddCourseRequest) -> Result<AddCourseResponse, ApiError> {
        self.round_trip().await;
        let teacher = self.teacher("POST", "/api/courses")?;
        let mut state = self.state();
        if let Some(existing) = state.courses.iter().find(|c| c.request.code == request.code) {
            let body = serde_json::json!({ "id": existing.id }).to_string();
            return Err(status("POST", "/api/courses", 409, body));
        }
        let id = state.fresh_id("course");
        let position = state.courses.len();
        state.course_index.insert(id.clone(), position);
        state.courses.push(StoredCourse {
            id: id.clone(),
            request: request.clone(),
            teacher: teacher.name,
            status: CourseStatus::Registering,
            students: BTreeSet::new(),
            classes: Vec::new(),
        });

        let timeouts = &self.shared.faults.add_course_timeouts;
        if timeouts
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
        {
            return Err(ApiError::Timeout {
                method: "POST".into(),
                path: "/api/courses".into(),
            });
        }
        Ok(AddCourseResponse { id })
    }

    async fn register_courses(&self, courses: &[RegisterCourseItem]) -> Result<(), ApiError> {
        self.round_trip().await;
        let path = "/api/users/me/courses";
        let student = self.user("PUT", path)?;
        let mut state = self.state();
        for item in courses {
            match state.course(&item.id) {
                Some(course) if course.status != CourseStatus::Closed => {}
                Some(_) => return Err(status("PUT", path, 400, format!("{} is closed", item.id))),
                None => return Err(status("PUT", path, 400, format!("{} not found", item.id))),
            }
        }
        for item in courses {
            if let Some(course) = state.course_mut(&item.id) {
                course.students.insert(student.code.clone());
            }
        }
        Ok(())
    }

    async fn get_registered_courses(&self) -> Result<Vec<RegisteredCourse>, ApiError> {
        self.round_trip().await;
        let student = self.user("GET", "/api/users/me/courses")?;
        let state = self.state();
        Ok(state
            .courses
            .iter()
            .filter(|c| c.status != CourseStatus::Closed && c.students.contains(&student.code))
            .map(|c| RegisteredCourse {
                id: c.id.clone(),
                name: c.request.name.clone(),
                teacher: c.teacher.clone(),
                period: c.request.period,
                day_of_week: c.request.day_of_week,
            })
            .collect())
    }

    async fn set_course_status(
        &self,
        course_id: &str,
        request: &SetCourseStatusRequest,
    ) -> Result<(), ApiError> {
        self.round_trip().await;
        let path = format!("/api/courses/{course_id}/status");
        self.teacher("PUT", &path)?;
        let mut state = self.state();
        let course = state
            .course_mut(course_id)
            .ok_or_else(|| status("PUT", &path, 404, "no such course"))?;
        course.status = request.status;
        Ok(())
    }

    async fn add_class(
        &self,
        course_id: &str,
        request: &AddClassRequest,
    ) -> Result<AddClassResponse, ApiError> {
        self.round_trip().await;
        let path = format!("/api/courses/{course_id}/classes");
        self.teacher("POST", &path)?;
        let mut state = self.state();
        let class_id = state.fresh_id("class");
        let course = state
            .course_mut(course_id)
            .ok_or_else(|| status("POST", &path, 404, "no such course"))?;
        if course.status != CourseStatus::InProgress {
            return Err(status("POST", &path, 400, "course is not in progress"));
        }
        course.classes.push(StoredClass {
            id: class_id.clone(),
            part: request.part,
            title: request.title.clone(),
            description: request.description.clone(),
            closed: false,
            submissions: BTreeMap::new(),
            scores: HashMap::new(),
        });
        let course_name = course.request.name.clone();
        state.announcements.push(StoredAnnouncement {
            id: request.announcement_id.clone(),
            course_id: course_id.to_string(),
            course_name,
            title: request.announcement_title.clone(),
            message: request.announcement_message.clone(),
            created_at: request.created_at,
        });
        Ok(AddClassResponse { class_id })
    }

    async fn get_classes(&self, course_id: &str) -> Result<Vec<ClassResponse>, ApiError> {
        self.round_trip().await;
        let path = format!("/api/courses/{course_id}/classes");
        let user = self.user("GET", &path)?;
        let state = self.state();
        let course = state
            .course(course_id)
            .ok_or_else(|| status("GET", &path, 404, "no such course"))?;
        Ok(course
            .classes
            .iter()
            .map(|class| ClassResponse {
                id: class.id.clone(),
                part: class.part,
                title: class.title.clone(),
                description: class.description.clone(),
                submission_closed: class.closed,
                submitted: class.submissions.contains_key(&user.code),
            })
            .collect())
    }

    async fn get_announcements(
        &self,
        cursor: Option<&str>,
    ) -> Result<Paged<AnnouncementsResponse>, ApiError> {
        self.round_trip().await;
        let student = self.user("GET", "/api/announcements")?;
        let state = self.state();
        let visible: Vec<AnnouncementResponse> = state
            .announcements_for(&student.code)
            .into_iter()
            .map(|a| AnnouncementResponse {
                id: a.id.clone(),
                course_id: a.course_id.clone(),
                course_name: a.course_name.clone(),
                title: a.title.clone(),
                unread: !state.read.contains(&(student.code.clone(), a.id.clone())),
                created_at: a.created_at,
            })
            .collect();
        let unread_count = visible.iter().filter(|a| a.unread).count() as u32;
        let page = if self
            .shared
            .faults
            .repeat_first_announcement_page
            .load(Ordering::SeqCst)
        {
            1
        } else {
            page_of(cursor)
        };
        let (announcements, links) = paginate(
            visible,
            page,
            self.shared.announcement_page_size,
            "/api/announcements",
        );
        Ok(Paged {
            items: AnnouncementsResponse {
                unread_count,
                announcements,
            },
            links,
        })
    }

    async fn get_announcement_detail(
        &self,
        announcement_id: &str,
    ) -> Result<AnnouncementDetail, ApiError> {
        self.round_trip().await;
        let path = format!("/api/announcements/{announcement_id}");
        let student = self.user("GET", &path)?;
        let mut state = self.state();
        let detail = state
            .announcements_for(&student.code)
            .into_iter()
            .find(|a| a.id == announcement_id)
            .map(|a| AnnouncementDetail {
                id: a.id.clone(),
                course_id: a.course_id.clone(),
                course_name: a.course_name.clone(),
                title: a.title.clone(),
                message: a.message.clone(),
                unread: !state.read.contains(&(student.code.clone(), a.id.clone())),
                created_at: a.created_at,
            })
            .ok_or_else(|| status("GET", &path, 404, "no such announcement"))?;
        state
            .read
            .insert((student.code, announcement_id.to_string()));
        Ok(detail)
    }

    async fn submit_assignment(
        &self,
        course_id: &str,
        class_id: &str,
        file: &AssignmentFile,
    ) -> Result<(), ApiError> {
        self.round_trip().await;
        let path = format!("/api/courses/{course_id}/classes/{class_id}/assignments");
        let student = self.user("POST", &path)?;
        if !file.file_name.ends_with(".pdf") {
            return Err(status("POST", &path, 400, "only pdf files are accepted"));
        }
        let mut state = self.state();
        let course = state
            .course_mut(course_id)
            .ok_or_else(|| status("POST", &path, 404, "no such course"))?;
        if !course.students.contains(&student.code) {
            return Err(status("POST", &path, 400, "not registered"));
        }
        let class = course
            .classes
            .iter_mut()
            .find(|c| c.id == class_id)
            .ok_or_else(|| status("POST", &path, 404, "no such class"))?;
        if class.closed {
            return Err(status("POST", &path, 400, "submissions are closed"));
        }
        class
            .submissions
            .insert(student.code, (file.file_name.clone(), file.data.clone()));
        Ok(())
    }

    async fn download_submissions(
        &self,
        course_id: &str,
        class_id: &str,
    ) -> Result<Vec<u8>, ApiError> {
        self.round_trip().await;
        let path = format!("/api/courses/{course_id}/classes/{class_id}/assignments/export");
        self.teacher("GET", &path)?;
        let mut state = self.state();
        let class = state
            .course_mut(course_id)
            .and_then(|c| c.classes.iter_mut().find(|k| k.id == class_id))
            .ok_or_else(|| status("GET", &path, 404, "no such class"))?;
        class.closed = true;

        let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
        let encode = |e: &dyn std::fmt::Display| status("GET", &path, 500, e.to_string());
        for (name, data) in class.submissions.values() {
            writer
                .start_file(name.as_str(), zip::write::SimpleFileOptions::default())
                .map_err(|e| encode(&e))?;
            writer.write_all(data).map_err(|e| encode(&e))?;
        }
        Ok(writer.finish().map_err(|e| encode(&e))?.into_inner())
    }

    async fn post_grades(
        &self,
        course_id: &str,
        class_id: &str,
        scores: &[ScoreEntry],
    ) -> Result<(), ApiError> {
        self.round_trip().await;
        let path = format!("/api/courses/{course_id}/classes/{class_id}/assignments/scores");
        self.teacher("PUT", &path)?;
        let mut state = self.state();
        let class = state
            .course_mut(course_id)
            .and_then(|c| c.classes.iter_mut().find(|k| k.id == class_id))
            .ok_or_else(|| status("PUT", &path, 404, "no such class"))?;
        if !class.closed {
            return Err(status("PUT", &path, 400, "submissions are still open"));
        }
        for entry in scores {
            class.scores.insert(entry.user_code.clone(), entry.score);
        }
        Ok(())
    }
}
