//! Dispatcher configuration.

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Settings for [`Dispatcher`](crate::Dispatcher).
///
/// Every field has a default, so a partial document is valid:
///
/// ```
/// use trellis_router::DispatchConfig;
///
/// let config = DispatchConfig::from_json(r#"{ "expose_internal_errors": true }"#).unwrap();
/// assert!(config.expose_internal_errors);
/// assert!(config.match_cache);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatchConfig {
    /// Cache match results for static routes.
    pub match_cache: bool,
    /// Send the underlying error text in 500 responses.
    pub expose_internal_errors: bool,
    /// Log 4xx responses at `warn` instead of `debug`.
    pub log_client_errors: bool,
    /// Status of a successful CORS preflight response.
    pub preflight_status: u16,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            match_cache: true,
            expose_internal_errors: false,
            log_client_errors: false,
            preflight_status: 204,
        }
    }
}

impl DispatchConfig {
    /// Parses a JSON document.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Enables or disables the match cache.
    #[must_use]
    pub const fn match_cache(mut self, enabled: bool) -> Self {
        self.match_cache = enabled;
        self
    }

    /// Exposes internal error messages.
    #[must_use]
    pub const fn expose_internal_errors(mut self, expose: bool) -> Self {
        self.expose_internal_errors = expose;
        self
    }

    /// Logs client errors at `warn`.
    #[must_use]
    pub const fn log_client_errors(mut self, log: bool) -> Self {
        self.log_client_errors = log;
        self
    }

    /// Sets the preflight status.
    #[must_use]
    pub const fn preflight_status(mut self, status: u16) -> Self {
        self.preflight_status = status;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RouterError;

    #[test]
    fn test_defaults() {
        let config = DispatchConfig::from_json("{}").unwrap();
        assert_eq!(config, DispatchConfig::default());
        assert_eq!(config.preflight_status, 204);
    }

    #[test]
    fn test_builder() {
        let config = DispatchConfig::default()
            .match_cache(false)
            .preflight_status(200);
        assert!(!config.match_cache);
        assert_eq!(config.preflight_status, 200);
    }

    #[test]
    fn test_invalid_document() {
        assert!(matches!(
            DispatchConfig::from_json(r#"{ "match_cache": "yes" }"#),
            Err(RouterError::Config(_))
        ));
    }
}
