use campus_core::failure::Failure;

/// Errors from one call across the HTTP boundary.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ApiError {
    /// The client gave up waiting. The call may or may not have taken effect.
    #[error("{method} {path} timed out")]
    Timeout { method: String, path: String },

    /// The application answered with a status the call does not accept.
    #[error("{method} {path} returned {status}: {body}")]
    Status {
        method: String,
        path: String,
        status: u16,
        body: String,
    },

    /// No response was obtained (connection refused, reset, DNS).
    #[error("{method} {path} failed: {message}")]
    Transport {
        method: String,
        path: String,
        message: String,
    },

    /// The response arrived but its body could not be decoded.
    #[error("{method} {path} returned an undecodable body: {message}")]
    Decode {
        method: String,
        path: String,
        message: String,
    },
}

impl ApiError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, ApiError::Timeout { .. })
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn is_conflict(&self) -> bool {
        self.status() == Some(409)
    }

    /// Response body of a status error.
    pub fn body(&self) -> Option<&str> {
        match self {
            ApiError::Status { body, .. } => Some(body),
            _ => None,
        }
    }

    /// Classify the error for the ledger. Timeouts are noise and yield `None`.
    pub fn to_failure(&self, expected: &[u16]) -> Option<Failure> {
        match self {
            ApiError::Timeout { .. } => None,
            ApiError::Status {
                method,
                path,
                status,
                ..
            } => Some(Failure::InvalidStatus {
                method: method.clone(),
                path: path.clone(),
                expected: expected.to_vec(),
                actual: *status,
            }),
            ApiError::Transport { .. } => Some(Failure::Transport(self.to_string())),
            ApiError::Decode { .. } => Some(Failure::application(self.to_string())),
        }
    }
}
