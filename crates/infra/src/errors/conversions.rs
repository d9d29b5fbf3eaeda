//! Conversions from external infrastructure errors into domain errors.

use footsteps_domain::RequestError;
use reqwest::Error as HttpError;

use super::InfraError;
use crate::auth::RefreshError;
use crate::config::ConfigError;

/* -------------------------------------------------------------------------- */
/* reqwest::Error → InfraError */
/* -------------------------------------------------------------------------- */

impl From<HttpError> for InfraError {
    fn from(value: HttpError) -> Self {
        if value.is_timeout() {
            return Self::Timeout;
        }

        #[cfg(not(target_arch = "wasm32"))]
        if value.is_connect() {
            return Self::Connect(value.to_string());
        }

        if value.is_builder() {
            return Self::InvalidUrl(value.to_string());
        }

        Self::Http(value.to_string())
    }
}

/* -------------------------------------------------------------------------- */
/* InfraError → RequestError */
/* -------------------------------------------------------------------------- */

impl From<InfraError> for RequestError {
    fn from(value: InfraError) -> Self {
        match value {
            InfraError::InvalidHeader(message) | InfraError::InvalidUrl(message) => Self::config(message),
            other => Self::network(other.to_string()),
        }
    }
}

impl From<ConfigError> for RequestError {
    fn from(value: ConfigError) -> Self {
        Self::config(value.to_string())
    }
}

impl From<RefreshError> for RequestError {
    fn from(value: RefreshError) -> Self {
        Self::refresh_failed(value.to_string())
    }
}

/* -------------------------------------------------------------------------- */
/* Tests */
/* -------------------------------------------------------------------------- */
