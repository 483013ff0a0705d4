//! Engine configuration.
//!
//! # Design
//! `EngineConfiguration` is plain data, deserialized from camelCase JSON and
//! validated once when the engine is created. It is never mutated afterwards;
//! callers share it behind an `Arc` inside [`SearchState`](crate::SearchState).

use serde::{Deserialize, Serialize};

use crate::error::{non_empty_string, required_non_empty_string, ApiError};

pub const DEFAULT_LOCALE: &str = "en-US";
pub const DEFAULT_TIMEZONE: &str = "UTC";

/// Platform environment the organization lives in.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlatformEnvironment {
    #[default]
    Prod,
    Dev,
    Stg,
    Hipaa,
}

impl PlatformEnvironment {
    fn url_suffix(self) -> &'static str {
        match self {
            PlatformEnvironment::Prod => "",
            PlatformEnvironment::Dev => "dev",
            PlatformEnvironment::Stg => "stg",
            PlatformEnvironment::Hipaa => "hipaa",
        }
    }
}

/// Which analytics flavour the engine runs with. Selects the execution
/// strategy of every search action.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnalyticsMode {
    Legacy,
    #[default]
    Next,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchConfiguration {
    /// Explicit search endpoint. Wins over the proxy and the platform URL.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_base_url: Option<String>,
    /// Base URL of a proxy forwarding to the search API.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proxy_base_url: Option<String>,
    #[serde(default = "default_locale")]
    pub locale: String,
    #[serde(default = "default_timezone")]
    pub timezone: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub search_hub: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pipeline: Option<String>,
}

impl Default for SearchConfiguration {
    fn default() -> Self {
        Self {
            api_base_url: None,
            proxy_base_url: None,
            locale: default_locale(),
            timezone: default_timezone(),
            search_hub: None,
            pipeline: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyticsConfiguration {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub analytics_mode: AnalyticsMode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub origin_context: Option<String>,
    /// Usually the active tab.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub origin_level2: Option<String>,
    /// Usually the referrer of the page.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub origin_level3: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub document_location: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub track_id: Option<String>,
}

impl Default for AnalyticsConfiguration {
    fn default() -> Self {
        Self {
            enabled: true,
            analytics_mode: AnalyticsMode::default(),
            origin_context: None,
            origin_level2: None,
            origin_level3: None,
            document_location: None,
            user_agent: None,
            track_id: None,
        }
    }
}

/// Configuration shared by every request an engine sends.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineConfiguration {
    pub organization_id: String,
    pub access_token: String,
    #[serde(default)]
    pub environment: PlatformEnvironment,
    #[serde(default)]
    pub search: SearchConfiguration,
    #[serde(default)]
    pub analytics: AnalyticsConfiguration,
}

fn default_locale() -> String {
    DEFAULT_LOCALE.to_string()
}

fn default_timezone() -> String {
    DEFAULT_TIMEZONE.to_string()
}

fn default_true() -> bool {
    true
}

impl EngineConfiguration {
    pub fn new(organization_id: &str, access_token: &str) -> Self {
        Self {
            organization_id: organization_id.to_string(),
            access_token: access_token.to_string(),
            environment: PlatformEnvironment::default(),
            search: SearchConfiguration::default(),
            analytics: AnalyticsConfiguration::default(),
        }
    }

    /// A configuration pointing at a public demo organization.
    pub fn sample() -> Self {
        let mut config = Self::new("searchuisamples", "xx564559b1-0045-48e1-953c-3addd1ee4457");
        config.search.search_hub = Some("default".to_string());
        config
    }

    /// Deserialize and validate a configuration from JSON.
    pub fn from_json(raw: &str) -> Result<Self, ApiError> {
        let config: Self =
            serde_json::from_str(raw).map_err(|e| ApiError::Configuration(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ApiError> {
        let checks = [
            required_non_empty_string("organizationId", Some(&self.organization_id)),
            required_non_empty_string("accessToken", Some(&self.access_token)),
            non_empty_string("locale", Some(&self.search.locale)),
            non_empty_string("timezone", Some(&self.search.timezone)),
            non_empty_string("searchHub", self.search.search_hub.as_deref()),
            non_empty_string("proxyBaseUrl", self.search.proxy_base_url.as_deref()),
            non_empty_string("apiBaseUrl", self.search.api_base_url.as_deref()),
        ];
        checks
            .into_iter()
            .collect::<Result<Vec<()>, ApiError>>()
            .map(|_| ())
            .map_err(|e| ApiError::Configuration(e.to_string()))
    }

    /// The organization endpoint, e.g. `https://myorg.orgdev.coveo.com`.
    pub fn platform_url(&self) -> String {
        format!(
            "https://{}.org{}.coveo.com",
            self.organization_id,
            self.environment.url_suffix()
        )
    }

    /// Base URL every search request is sent to.
    pub fn search_api_base_url(&self) -> String {
        if let Some(url) = &self.search.api_base_url {
            return url.clone();
        }
        if let Some(proxy) = &self.search.proxy_base_url {
            return proxy.trim_end_matches('/').to_string();
        }
        format!("{}/rest/search/v2", self.platform_url())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_fill_missing_sections() {
        let config =
            EngineConfiguration::from_json(r#"{"organizationId":"o","accessToken":"t"}"#).unwrap();
        assert_eq!(config.search.locale, "en-US");
        assert_eq!(config.search.timezone, "UTC");
        assert!(config.analytics.enabled);
        assert_eq!(config.analytics.analytics_mode, AnalyticsMode::Next);
        assert_eq!(config.environment, PlatformEnvironment::Prod);
    }

    #[test]
    fn empty_access_token_is_rejected() {
        let err = EngineConfiguration::from_json(r#"{"organizationId":"o","accessToken":""}"#)
            .unwrap_err();
        assert!(matches!(err, ApiError::Configuration(msg) if msg.contains("accessToken")));
    }

    #[test]
    fn missing_organization_is_rejected() {
        let err = EngineConfiguration::from_json(r#"{"accessToken":"t"}"#).unwrap_err();
        assert!(matches!(err, ApiError::Configuration(_)));
    }

    #[test]
    fn empty_search_hub_is_rejected() {
        let mut config = EngineConfiguration::new("o", "t");
        config.search.search_hub = Some(String::new());
        assert!(config.validate().is_err());
    }

    #[test]
    fn base_url_resolution_order() {
        let mut config = EngineConfiguration::new("acme", "t");
        assert_eq!(
            config.search_api_base_url(),
            "https://acme.org.coveo.com/rest/search/v2"
        );

        config.environment = PlatformEnvironment::Dev;
        assert_eq!(
            config.search_api_base_url(),
            "https://acme.orgdev.coveo.com/rest/search/v2"
        );

        config.search.proxy_base_url = Some("https://example.com/search/".to_string());
        assert_eq!(config.search_api_base_url(), "https://example.com/search");

        config.search.api_base_url = Some("http://localhost:3000/rest/search/v2".to_string());
        assert_eq!(
            config.search_api_base_url(),
            "http://localhost:3000/rest/search/v2"
        );
    }

    #[test]
    fn explicit_api_base_url_is_used_as_given() {
        let mut config = EngineConfiguration::new("acme", "t");
        config.search.proxy_base_url = Some("https://example.com/search/".to_string());
        config.search.api_base_url = Some("http://localhost:3000/rest/search/v2/".to_string());
        assert_eq!(
            config.search_api_base_url(),
            "http://localhost:3000/rest/search/v2/"
        );
    }

    #[test]
    fn analytics_mode_parses_lowercase() {
        let config = EngineConfiguration::from_json(
            r#"{"organizationId":"o","accessToken":"t","analytics":{"analyticsMode":"legacy"}}"#,
        )
        .unwrap();
        assert_eq!(config.analytics.analytics_mode, AnalyticsMode::Legacy);
        assert!(config.analytics.enabled);
    }

    #[test]
    fn sample_is_valid() {
        assert!(EngineConfiguration::sample().validate().is_ok());
    }
}
