use crate::core::domain::error::{ControlPlaneResult, ValidationError};
use std::fmt;

/// A Proxmox API token (`user@realm!tokenname` plus its secret).
///
/// Clusters authenticate with API tokens rather than tickets, so there is
/// no session to refresh: every request carries the `Authorization` header
/// rendered by [`ProxmoxApiToken::authorization_header`].
#[derive(Clone, PartialEq, Eq)]
pub struct ProxmoxApiToken {
    token_id: String,
    secret: String,
}

impl ProxmoxApiToken {
    /// Creates a new token after validating both parts.
    pub fn new(token_id: impl Into<String>, secret: impl Into<String>) -> ControlPlaneResult<Self> {
        let token_id = token_id.into();
        let secret = secret.into();
        validate_token_id(&token_id)?;
        validate_token_secret(&secret)?;
        Ok(Self { token_id, secret })
    }

    /// Returns the token identifier.
    #[must_use]
    pub fn token_id(&self) -> &str {
        &self.token_id
    }

    /// Formats the token as an `Authorization` header value.
    #[must_use]
    pub fn authorization_header(&self) -> String {
        format!("PVEAPIToken={}={}", self.token_id, self.secret)
    }
}

impl fmt::Debug for ProxmoxApiToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProxmoxApiToken")
            .field("token_id", &self.token_id)
            .field("secret", &"<redacted>")
            .finish()
    }
}

/// Validates a token id of the form `user@realm!tokenname`.
pub(crate) fn validate_token_id(token_id: &str) -> Result<(), ValidationError> {
    if token_id.is_empty() {
        return Err(ValidationError::Field {
            field: "token_id".to_string(),
            message: "Token id cannot be empty".to_string(),
        });
    }

    let (user, name) = token_id.split_once('!').ok_or_else(|| {
        ValidationError::Format("Token id must look like user@realm!tokenname".to_string())
    })?;

    let (username, realm) = user.split_once('@').ok_or_else(|| {
        ValidationError::Format("Token id user part must contain a realm".to_string())
    })?;

    let valid_part = |part: &str| {
        !part.is_empty()
            && part
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
    };

    if !valid_part(username) || !valid_part(realm) || !valid_part(name) {
        return Err(ValidationError::Format(
            "Token id parts may only contain alphanumerics, '-', '_' and '.'".to_string(),
        ));
    }

    Ok(())
}

/// Validates a token secret.
pub(crate) fn validate_token_secret(secret: &str) -> Result<(), ValidationError> {
    if secret.trim().is_empty() {
        return Err(ValidationError::Field {
            field: "token_secret".to_string(),
            message: "Token secret cannot be empty".to_string(),
        });
    }
    if secret.chars().any(char::is_whitespace) {
        return Err(ValidationError::Format(
            "Token secret cannot contain whitespace".to_string(),
        ));
    }
    Ok(())
}
