//! Flat benchmark configuration.
//!
//! Every tunable of a run is read from an environment variable with a
//! default suitable for a local run. Parse failures surface as
//! [`ConfigError`] instead of aborting the process.

use std::collections::BTreeMap;
use std::str::FromStr;
use std::time::Duration;

/// Benchmark configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct BenchConfig {
    /// Base URL of the application under test.
    pub target_url: String,
    /// Students activated during ramp-up.
    pub initial_students: usize,
    /// Courses created during ramp-up.
    pub initial_courses: usize,
    /// Size of the teacher pool courses are drawn from.
    pub teacher_count: usize,
    /// Maximum number of courses a student may be registered in.
    pub register_course_limit: usize,
    /// Searches issued per course a student wants to register.
    pub search_count_per_registration: usize,
    /// Seats per course.
    pub course_capacity: usize,
    /// Class rounds driven per course.
    pub class_count_per_course: usize,
    /// Delay after the first registration before a course stops accepting students.
    pub registration_close_delay: Duration,
    /// How long a course waits for a student to read the class announcement.
    pub wait_read_announcement: Duration,
    /// Probability that a student first uploads an invalid file.
    pub invalid_submit_frequency: f64,
    /// Length of the request window.
    pub load_request_time: Duration,
    /// Grace period for in-flight actions after the request window closes.
    pub drain_timeout: Duration,
    /// Fixed backoff between retries of a timed-out idempotent call.
    pub retry_backoff: Duration,
    /// Pause after a failed read before a cycle re-enters from the top.
    pub idle_backoff: Duration,
    /// Client-side timeout applied to every request.
    pub request_timeout: Duration,
    /// Fraction of search results whose fields are checked.
    pub search_verify_rate: f64,
    /// Fraction of submission archives that are downloaded and checked.
    pub assignments_verify_rate: f64,
    /// Page size of the announcement list.
    pub announcements_per_page: usize,
    /// Expected SHA-256 digests of the static assets referenced by the top page.
    pub static_assets: BTreeMap<String, String>,
}

impl Default for BenchConfig {
    fn default() -> Self {
        Self {
            target_url: "http://localhost:7000".into(),
            initial_students: 50,
            initial_courses: 20,
            teacher_count: 10,
            register_course_limit: 20,
            search_count_per_registration: 3,
            course_capacity: 50,
            class_count_per_course: 5,
            registration_close_delay: Duration::from_secs(5),
            wait_read_announcement: Duration::from_secs(5),
            invalid_submit_frequency: 0.1,
            load_request_time: Duration::from_secs(60),
            drain_timeout: Duration::from_secs(10),
            retry_backoff: Duration::from_millis(100),
            idle_backoff: Duration::from_millis(1),
            request_timeout: Duration::from_secs(20),
            search_verify_rate: 0.2,
            assignments_verify_rate: 0.2,
            announcements_per_page: 20,
            static_assets: BTreeMap::new(),
        }
    }
}

impl BenchConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                                | Default                 |
    /// |----------------------------------------|-------------------------|
    /// | `BENCH_TARGET_URL`                     | `http://localhost:7000` |
    /// | `BENCH_INITIAL_STUDENTS`               | `50`                    |
    /// | `BENCH_INITIAL_COURSES`                | `20`                    |
    /// | `BENCH_TEACHER_COUNT`                  | `10`                    |
    /// | `BENCH_REGISTER_COURSE_LIMIT`          | `20`                    |
    /// | `BENCH_SEARCH_COUNT_PER_REGISTRATION`  | `3`                     |
    /// | `BENCH_COURSE_CAPACITY`                | `50`                    |
    /// | `BENCH_CLASS_COUNT_PER_COURSE`         | `5`                     |
    /// | `BENCH_REGISTRATION_CLOSE_DELAY_MS`    | `5000`                  |
    /// | `BENCH_WAIT_READ_ANNOUNCEMENT_MS`      | `5000`                  |
    /// | `BENCH_INVALID_SUBMIT_FREQUENCY`       | `0.1`                   |
    /// | `BENCH_LOAD_REQUEST_SECS`              | `60`                    |
    /// | `BENCH_DRAIN_TIMEOUT_SECS`             | `10`                    |
    /// | `BENCH_RETRY_BACKOFF_MS`               | `100`                   |
    /// | `BENCH_IDLE_BACKOFF_MS`                | `1`                     |
    /// | `BENCH_REQUEST_TIMEOUT_SECS`           | `20`                    |
    /// | `BENCH_SEARCH_VERIFY_RATE`             | `0.2`                   |
    /// | `BENCH_ASSIGNMENTS_VERIFY_RATE`        | `0.2`                   |
    /// | `BENCH_ANNOUNCEMENTS_PER_PAGE`         | `20`                    |
    /// | `BENCH_STATIC_ASSETS`                  | (empty)                 |
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary key lookup.
    ///
    /// [`from_env`](Self::from_env) delegates here; tests pass a map.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let env = Lookup(&lookup);

        let config = Self {
            target_url: env
                .raw("BENCH_TARGET_URL")
                .unwrap_or(defaults.target_url)
                .trim_end_matches('/')
                .to_string(),
            initial_students: env.parse("BENCH_INITIAL_STUDENTS", defaults.initial_students)?,
            initial_courses: env.parse("BENCH_INITIAL_COURSES", defaults.initial_courses)?,
            teacher_count: env.parse("BENCH_TEACHER_COUNT", defaults.teacher_count)?,
            register_course_limit: env
                .parse("BENCH_REGISTER_COURSE_LIMIT", defaults.register_course_limit)?,
            search_count_per_registration: env.parse(
                "BENCH_SEARCH_COUNT_PER_REGISTRATION",
                defaults.search_count_per_registration,
            )?,
            course_capacity: env.parse("BENCH_COURSE_CAPACITY", defaults.course_capacity)?,
            class_count_per_course: env
                .parse("BENCH_CLASS_COUNT_PER_COURSE", defaults.class_count_per_course)?,
            registration_close_delay: env.millis(
                "BENCH_REGISTRATION_CLOSE_DELAY_MS",
                defaults.registration_close_delay,
            )?,
            wait_read_announcement: env.millis(
                "BENCH_WAIT_READ_ANNOUNCEMENT_MS",
                defaults.wait_read_announcement,
            )?,
            invalid_submit_frequency: env.rate(
                "BENCH_INVALID_SUBMIT_FREQUENCY",
                defaults.invalid_submit_frequency,
            )?,
            load_request_time: env.secs("BENCH_LOAD_REQUEST_SECS", defaults.load_request_time)?,
            drain_timeout: env.secs("BENCH_DRAIN_TIMEOUT_SECS", defaults.drain_timeout)?,
            retry_backoff: env.millis("BENCH_RETRY_BACKOFF_MS", defaults.retry_backoff)?,
            idle_backoff: env.millis("BENCH_IDLE_BACKOFF_MS", defaults.idle_backoff)?,
            request_timeout: env.secs("BENCH_REQUEST_TIMEOUT_SECS", defaults.request_timeout)?,
            search_verify_rate: env
                .rate("BENCH_SEARCH_VERIFY_RATE", defaults.search_verify_rate)?,
            assignments_verify_rate: env.rate(
                "BENCH_ASSIGNMENTS_VERIFY_RATE",
                defaults.assignments_verify_rate,
            )?,
            announcements_per_page: env
                .parse("BENCH_ANNOUNCEMENTS_PER_PAGE", defaults.announcements_per_page)?,
            static_assets: match env.raw("BENCH_STATIC_ASSETS") {
                Some(raw) => parse_static_assets(&raw)?,
                None => defaults.static_assets,
            },
        };

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.teacher_count == 0 {
            return Err(ConfigError::Invalid {
                key: "BENCH_TEACHER_COUNT",
                reason: "at least one teacher is required".into(),
            });
        }
        if self.course_capacity == 0 {
            return Err(ConfigError::Invalid {
                key: "BENCH_COURSE_CAPACITY",
                reason: "courses need at least one seat".into(),
            });
        }
        if self.announcements_per_page == 0 {
            return Err(ConfigError::Invalid {
                key: "BENCH_ANNOUNCEMENTS_PER_PAGE",
                reason: "page size must be positive".into(),
            });
        }
        Ok(())
    }
}

/// Parse `path=digest` pairs separated by commas.
fn parse_static_assets(raw: &str) -> Result<BTreeMap<String, String>, ConfigError> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|pair| match pair.split_once('=') {
            Some((path, digest)) if !path.is_empty() && !digest.is_empty() => {
                Ok((path.trim().to_string(), digest.trim().to_lowercase()))
            }
            _ => Err(ConfigError::Invalid {
                key: "BENCH_STATIC_ASSETS",
                reason: format!("expected path=sha256, got {pair:?}"),
            }),
        })
        .collect()
}

struct Lookup<'a, F>(&'a F);

impl<F> Lookup<'_, F>
where
    F: Fn(&str) -> Option<String>,
{
    fn raw(&self, key: &str) -> Option<String> {
        (self.0)(key).filter(|v| !v.trim().is_empty())
    }

    fn parse<T: FromStr>(&self, key: &'static str, default: T) -> Result<T, ConfigError> {
        match self.raw(key) {
            Some(value) => value.trim().parse().map_err(|_| ConfigError::Invalid {
                key,
                reason: format!("cannot parse {value:?}"),
            }),
            None => Ok(default),
        }
    }

    fn millis(&self, key: &'static str, default: Duration) -> Result<Duration, ConfigError> {
        let ms = self.parse(key, default.as_millis() as u64)?;
        Ok(Duration::from_millis(ms))
    }

    fn secs(&self, key: &'static str, default: Duration) -> Result<Duration, ConfigError> {
        let secs = self.parse(key, default.as_secs())?;
        Ok(Duration::from_secs(secs))
    }

    fn rate(&self, key: &'static str, default: f64) -> Result<f64, ConfigError> {
        let rate: f64 = self.parse(key, default)?;
        if !(0.0..=1.0).contains(&rate) {
            return Err(ConfigError::Invalid {
                key,
                reason: format!("{rate} is not within 0.0..=1.0"),
            });
        }
        Ok(rate)
    }
}

/// Errors raised while loading [`BenchConfig`].
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for {key}: {reason}")]
    Invalid { key: &'static str, reason: String },
}
