//! Static asset checks for the top page.

use std::collections::BTreeMap;

use campus_client::ApiError;
use campus_core::failure::Failure;
use campus_core::hashing::sha256_hex;

/// Outcome of checking one fetched asset.
#[derive(Debug, Clone, PartialEq)]
pub enum ResourceCheck {
    Verified,
    /// No digest is configured for this path.
    Unchecked,
    /// Timed out. Retryable noise, not a verification failure.
    Noise,
    Mismatch(Failure),
}

/// Every configured asset the page did not reference is a failure.
pub fn missing_resources(referenced: &[String], expected: &BTreeMap<String, String>) -> Vec<Failure> {
    expected
        .keys()
        .filter(|path| !referenced.iter().any(|r| r == *path))
        .map(|path| Failure::StaticResource(format!("expected resource {path} was not loaded")))
        .collect()
}

/// Check one fetched asset against its configured digest.
pub fn verify_resource(
    path: &str,
    fetched: &Result<Vec<u8>, ApiError>,
    expected: &BTreeMap<String, String>,
) -> ResourceCheck {
    let data = match fetched {
        Ok(data) => data,
        Err(e) if e.is_timeout() => return ResourceCheck::Noise,
        Err(e) => {
            return ResourceCheck::Mismatch(Failure::StaticResource(format!(
                "failed to fetch {path}: {e}"
            )))
        }
    };
    let Some(digest) = expected.get(path) else {
        return ResourceCheck::Unchecked;
    };
    if sha256_hex(data) == *digest {
        ResourceCheck::Verified
    } else {
        ResourceCheck::Mismatch(Failure::StaticResource(format!(
            "checksum of {path} does not match"
        )))
    }
}
