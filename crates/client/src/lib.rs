//! HTTP boundary of the campus benchmark.
//!
//! [`CampusApi`] is the seam every workflow drives; [`HttpApi`] is the
//! `reqwest` implementation used against a real deployment, one per
//! simulated actor so that each keeps its own session cookie.

pub mod api;
pub mod error;
pub mod http;
pub mod link;
pub mod types;

pub use api::{CampusApi, Connector};
pub use error::ApiError;
pub use http::{HttpApi, HttpConnector};
pub use link::{parse_link_header, PageLinks};
pub use types::*;
