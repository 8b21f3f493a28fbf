//! `reqwest` implementation of [`CampusApi`].

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::LINK;
use reqwest::{Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;

use crate::api::{CampusApi, Connector};
use crate::error::ApiError;
use crate::link::{parse_link_header, PageLinks};
use crate::types::*;

/// HTTP client for one simulated actor. Holds its own cookie jar.
pub struct HttpApi {
    client: reqwest::Client,
    base_url: String,
}

impl HttpApi {
    /// Create a session-carrying client for `base_url`, e.g. `http://host:7000`.
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, ApiError> {
        let base_url = base_url.into();
        let client = reqwest::Client::builder()
            .cookie_store(true)
            .timeout(timeout)
            .build()
            .map_err(|e| ApiError::Transport {
                method: "-".into(),
                path: base_url.clone(),
                message: e.to_string(),
            })?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        if path.starts_with("http://") || path.starts_with("https://") {
            path.to_string()
        } else {
            format!("{}{}", self.base_url, path)
        }
    }

    // ---- private helpers ----

    /// Send a request and check its status against `accepted`.
    async fn send(
        &self,
        method: Method,
        path: &str,
        build: impl FnOnce(RequestBuilder) -> RequestBuilder,
        accepted: &[u16],
    ) -> Result<Response, ApiError> {
        let request = build(self.client.request(method.clone(), self.url(path)));
        let response = request
            .send()
            .await
            .map_err(|e| classify(&method, path, e))?;

        let status = response.status().as_u16();
        if !accepted.contains(&status) {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            tracing::debug!(method = %method, path, status, "Unexpected status");
            return Err(ApiError::Status {
                method: method.to_string(),
                path: path.to_string(),
                status,
                body,
            });
        }
        Ok(response)
    }

    async fn send_json<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        build: impl FnOnce(RequestBuilder) -> RequestBuilder,
        accepted: &[u16],
    ) -> Result<T, ApiError> {
        let response = self.send(method.clone(), path, build, accepted).await?;
        decode(&method, path, response).await
    }

    async fn send_paged<T: DeserializeOwned>(
        &self,
        path: &str,
        build: impl FnOnce(RequestBuilder) -> RequestBuilder,
    ) -> Result<Paged<T>, ApiError> {
        let response = self.send(Method::GET, path, build, &[200]).await?;
        let links = response
            .headers()
            .get(LINK)
            .and_then(|v| v.to_str().ok())
            .map(parse_link_header)
            .unwrap_or_default();
        let items = decode(&Method::GET, path, response).await?;
        Ok(Paged { items, links })
    }
}

fn classify(method: &Method, path: &str, error: reqwest::Error) -> ApiError {
    if error.is_timeout() {
        ApiError::Timeout {
            method: method.to_string(),
            path: path.to_string(),
        }
    } else if error.is_decode() {
        ApiError::Decode {
            method: method.to_string(),
            path: path.to_string(),
            message: error.to_string(),
        }
    } else {
        ApiError::Transport {
            method: method.to_string(),
            path: path.to_string(),
            message: error.to_string(),
        }
    }
}

async fn decode<T: DeserializeOwned>(
    method: &Method,
    path: &str,
    response: Response,
) -> Result<T, ApiError> {
    let bytes = response
        .bytes()
        .await
        .map_err(|e| classify(method, path, e))?;
    serde_json::from_slice(&bytes).map_err(|e| ApiError::Decode {
        method: method.to_string(),
        path: path.to_string(),
        message: e.to_string(),
    })
}

/// Collect the site-relative script and stylesheet paths referenced by a page.
pub fn extract_asset_paths(html: &str) -> Vec<String> {
    let mut paths = Vec::new();
    for attr in ["src=\"", "href=\""] {
        let mut rest = html;
        while let Some(start) = rest.find(attr) {
            rest = &rest[start + attr.len()..];
            let Some(end) = rest.find('"') else {
                break;
            };
            let target = &rest[..end];
            if target.starts_with('/')
                && (target.ends_with(".js") || target.ends_with(".css"))
                && !paths.iter().any(|p| p == target)
            {
                paths.push(target.to_string());
            }
            rest = &rest[end..];
        }
    }
    paths
}

#[async_trait]
impl CampusApi for HttpApi {
    async fn login(&self, request: &LoginRequest) -> Result<(), ApiError> {
        self.send(Method::POST, "/login", |r| r.json(request), &[200])
            .await?;
        Ok(())
    }

    async fn get_top_page(&self) -> Result<Vec<String>, ApiError> {
        let response = self.send(Method::GET, "/", |r| r, &[200, 304]).await?;
        let html = response
            .text()
            .await
            .map_err(|e| classify(&Method::GET, "/", e))?;
        Ok(extract_asset_paths(&html))
    }

    async fn fetch_asset(&self, path: &str) -> Result<Vec<u8>, ApiError> {
        let response = self.send(Method::GET, path, |r| r, &[200]).await?;
        let bytes = response
            .bytes()
            .await
            .map_err(|e| classify(&Method::GET, path, e))?;
        Ok(bytes.to_vec())
    }

    async fn get_me(&self) -> Result<MeResponse, ApiError> {
        self.send_json(Method::GET, "/api/users/me", |r| r, &[200])
            .await
    }

    async fn get_grades(&self) -> Result<GradeResponse, ApiError> {
        self.send_json(Method::GET, "/api/users/me/grades", |r| r, &[200])
            .await
    }

    async fn search_courses(
        &self,
        params: &SearchCourseParams,
        cursor: Option<&str>,
    ) -> Result<Paged<Vec<CourseResponse>>, ApiError> {
        match cursor {
            // The cursor already encodes the filters.
            Some(cursor) => self.send_paged(cursor, |r| r).await,
            None => {
                let query = params.query_pairs();
                self.send_paged("/api/courses", |r| r.query(&query)).await
            }
        }
    }

    async fn get_course_detail(&self, course_id: &str) -> Result<CourseResponse, ApiError> {
        let path = format!("/api/courses/{course_id}");
        self.send_json(Method::GET, &path, |r| r, &[200]).await
    }

    async fn add_course(&self, request: &AddCourseRequest) -> Result<AddCourseResponse, ApiError> {
        self.send_json(Method::POST, "/api/courses", |r| r.json(request), &[201])
            .await
    }

    async fn register_courses(&self, courses: &[RegisterCourseItem]) -> Result<(), ApiError> {
        self.send(
            Method::PUT,
            "/api/users/me/courses",
            |r| r.json(courses),
            &[200],
        )
        .await?;
        Ok(())
    }

    async fn get_registered_courses(&self) -> Result<Vec<RegisteredCourse>, ApiError> {
        self.send_json(Method::GET, "/api/users/me/courses", |r| r, &[200])
            .await
    }

    async fn set_course_status(
        &self,
        course_id: &str,
        request: &SetCourseStatusRequest,
    ) -> Result<(), ApiError> {
        let path = format!("/api/courses/{course_id}/status");
        self.send(Method::PUT, &path, |r| r.json(request), &[200])
            .await?;
        Ok(())
    }

    async fn add_class(
        &self,
        course_id: &str,
        request: &AddClassRequest,
    ) -> Result<AddClassResponse, ApiError> {
        let path = format!("/api/courses/{course_id}/classes");
        self.send_json(Method::POST, &path, |r| r.json(request), &[201])
            .await
    }

    async fn get_classes(&self, course_id: &str) -> Result<Vec<ClassResponse>, ApiError> {
        let path = format!("/api/courses/{course_id}/classes");
        self.send_json(Method::GET, &path, |r| r, &[200]).await
    }

    async fn get_announcements(
        &self,
        cursor: Option<&str>,
    ) -> Result<Paged<AnnouncementsResponse>, ApiError> {
        let path = cursor.unwrap_or("/api/announcements");
        self.send_paged(path, |r| r).await
    }

    async fn get_announcement_detail(
        &self,
        announcement_id: &str,
    ) -> Result<AnnouncementDetail, ApiError> {
        let path = format!("/api/announcements/{announcement_id}");
        self.send_json(Method::GET, &path, |r| r, &[200]).await
    }

    async fn submit_assignment(
        &self,
        course_id: &str,
        class_id: &str,
        file: &AssignmentFile,
    ) -> Result<(), ApiError> {
        let path = format!("/api/courses/{course_id}/classes/{class_id}/assignments");
        let part = reqwest::multipart::Part::bytes(file.data.clone())
            .file_name(file.file_name.clone());
        let form = reqwest::multipart::Form::new().part("file", part);
        self.send(Method::POST, &path, |r| r.multipart(form), &[204])
            .await?;
        Ok(())
    }

    async fn download_submissions(
        &self,
        course_id: &str,
        class_id: &str,
    ) -> Result<Vec<u8>, ApiError> {
        let path = format!("/api/courses/{course_id}/classes/{class_id}/assignments/export");
        self.fetch_asset(&path).await
    }

    async fn post_grades(
        &self,
        course_id: &str,
        class_id: &str,
        scores: &[ScoreEntry],
    ) -> Result<(), ApiError> {
        let path = format!("/api/courses/{course_id}/classes/{class_id}/assignments/scores");
        self.send(Method::PUT, &path, |r| r.json(scores), &[204])
            .await?;
        Ok(())
    }
}

/// Creates one [`HttpApi`] per actor against a fixed base URL.
#[derive(Debug, Clone)]
pub struct HttpConnector {
    base_url: String,
    timeout: Duration,
}

impl HttpConnector {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            base_url: base_url.into(),
            timeout,
        }
    }
}

impl Connector for HttpConnector {
    fn connect(&self) -> Result<Arc<dyn CampusApi>, ApiError> {
        Ok(Arc::new(HttpApi::new(self.base_url.clone(), self.timeout)?))
    }
}
