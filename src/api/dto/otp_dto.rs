//! DTOs for token issuance.

use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

/// Longest subject accepted for issuance.
pub const MAX_SUBJECT_LEN: usize = 64;

/// Query parameters for `GET /otp`.
#[derive(Debug, Clone, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct OtpParams {
    /// Subject to bind the token to. Defaults to `"admin"`.
    #[serde(default = "default_subject")]
    pub subject: String,
}

fn default_subject() -> String {
    "admin".to_string()
}

impl Default for OtpParams {
    fn default() -> Self {
        Self {
            subject: default_subject(),
        }
    }
}

impl OtpParams {
    /// Returns the subject if it is 1..=64 characters after trimming.
    #[must_use]
    pub fn validated_subject(&self) -> Option<&str> {
        let subject = self.subject.trim();
        let len = subject.chars().count();
        (1..=MAX_SUBJECT_LEN).contains(&len).then_some(subject)
    }
}

/// Response body of `GET /otp`.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct OtpResponse {
    /// Signed handshake token.
    pub otp: String,
}
