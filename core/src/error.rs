//! Error types for the search client core.
//!
//! # Design
//! Tagged error payloads returned by the search API are not errors at this
//! level: they decode into `ApiResponse::Error` and end up as a rejected
//! outcome. `ApiError` covers everything that stops a call before or outside
//! that exchange: payload validation, configuration, transport failures,
//! and responses that cannot be interpreted at all.

use thiserror::Error;

/// Errors returned by the request builders, the API client and the processor.
#[derive(Debug, Error)]
pub enum ApiError {
    /// A payload failed its shape check before any network call was made.
    #[error("invalid payload field `{field}`: {reason}")]
    Validation { field: String, reason: String },

    /// The engine configuration was rejected.
    #[error("invalid configuration: {0}")]
    Configuration(String),

    /// The server returned a non-2xx status without a tagged error body.
    #[error("HTTP {status}: {body}")]
    HttpError { status: u16, body: String },

    /// The response body could not be deserialized into the expected type.
    #[error("deserialization failed: {0}")]
    DeserializationError(String),

    /// The request payload could not be serialized to JSON.
    #[error("serialization failed: {0}")]
    SerializationError(String),

    /// The request never produced a response (connection refused, timeout...).
    #[error("transport failed: {0}")]
    Transport(String),
}

impl ApiError {
    pub(crate) fn validation(field: &str, reason: impl Into<String>) -> Self {
        ApiError::Validation {
            field: field.to_string(),
            reason: reason.into(),
        }
    }
}

/// Reject `None` and empty strings.
pub(crate) fn required_non_empty_string(field: &str, value: Option<&str>) -> Result<(), ApiError> {
    match value {
        None => Err(ApiError::validation(field, "value is required")),
        Some(v) if v.is_empty() => Err(ApiError::validation(field, "value must not be empty")),
        Some(_) => Ok(()),
    }
}

/// Reject empty strings, but accept an absent value.
pub(crate) fn non_empty_string(field: &str, value: Option<&str>) -> Result<(), ApiError> {
    match value {
        Some("") => Err(ApiError::validation(field, "value must not be empty")),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn required_rejects_missing_and_empty() {
        assert!(matches!(
            required_non_empty_string("id", None),
            Err(ApiError::Validation { .. })
        ));
        assert!(matches!(
            required_non_empty_string("id", Some("")),
            Err(ApiError::Validation { .. })
        ));
        assert!(required_non_empty_string("id", Some("box")).is_ok());
    }

    #[test]
    fn optional_accepts_missing() {
        assert!(non_empty_string("locale", None).is_ok());
        assert!(non_empty_string("locale", Some("")).is_err());
    }

    #[test]
    fn validation_error_names_the_field() {
        let err = ApiError::validation("id", "value is required");
        assert_eq!(err.to_string(), "invalid payload field `id`: value is required");
    }
}
