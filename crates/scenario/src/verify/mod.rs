//! Verification engine.
//!
//! Each check compares one response against the reference model and
//! reports every mismatch it finds as a [`Failure`] instead of stopping at
//! the first. Entities the model does not know yet are skipped: the
//! benchmark's own write may simply not have been committed locally.

pub mod account;
pub mod announcement;
pub mod class;
pub mod course;
pub mod grades;
pub mod resource;

use rand::Rng;

use campus_core::failure::Failure;

pub use account::verify_me;
pub use announcement::{
    reconcile_announcement_pages, verify_announcement_detail, verify_announcement_list,
};
pub use class::{verify_archive, verify_classes};
pub use course::{verify_course_detail, verify_registered_courses, verify_search_results};
pub use grades::verify_grades;
pub use resource::{missing_resources, verify_resource, ResourceCheck};

/// Independent Bernoulli sampling of observations.
#[derive(Debug, Clone, Copy)]
pub struct Sampler {
    rate: f64,
}

impl Sampler {
    pub fn new(rate: f64) -> Self {
        Self { rate }
    }

    pub fn always() -> Self {
        Self::new(1.0)
    }

    pub fn never() -> Self {
        Self::new(0.0)
    }

    /// Draw a fresh decision for one observation.
    pub fn sample(&self) -> bool {
        rand::rng().random::<f64>() < self.rate
    }
}

/// Compare one field and describe the mismatch.
pub(crate) fn check_field<T: PartialEq + std::fmt::Debug>(
    entity: &str,
    field: &str,
    expected: &T,
    actual: &T,
) -> Result<(), Failure> {
    if expected == actual {
        Ok(())
    } else {
        Err(Failure::application(format!(
            "{entity} {field} mismatch: expected {expected:?}, got {actual:?}"
        )))
    }
}
