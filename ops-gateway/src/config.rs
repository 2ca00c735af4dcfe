use crate::policy::DegradePolicies;
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;
use url::Url;

/// Environment variable overriding `upstream.base_url`.
pub const ENV_API_BASE: &str = "OPS_API_BASE";
/// Environment variable overriding `upstream.token`.
pub const ENV_API_TOKEN: &str = "OPS_API_TOKEN";
/// Environment variable overriding `upstream.bbps_base_url`.
pub const ENV_BBPS_API_BASE: &str = "BBPS_API_BASE";

const DEFAULT_BASE_URL: &str = "https://staging-v2.oolka.in/v2";

#[derive(Error, Debug, PartialEq)]
pub enum ValidationError {
    #[error("Port cannot be 0")]
    InvalidPort,

    #[error("Timeout for {0} cannot be 0")]
    ZeroTimeout(&'static str),

    #[error("Invalid URL in {var}: {value}")]
    InvalidUrl { var: &'static str, value: String },

    #[error("Degrade policy for {0} uses a status code outside 400-599")]
    InvalidDegradeStatus(&'static str),
}

/// Gateway configuration
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct Config {
    /// Listener for the `/api` routes
    pub listener: Listener,
    /// Listener for `/health` and `/ready`
    pub admin_listener: Listener,
    #[serde(default)]
    pub upstream: UpstreamConfig,
    #[serde(default)]
    pub sources: Sources,
    #[serde(default)]
    pub degrade: DegradePolicies,
}

impl Config {
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.listener.validate()?;
        self.admin_listener.validate()?;
        self.upstream.validate()?;

        if let Some(route) = self.degrade.first_invalid() {
            return Err(ValidationError::InvalidDegradeStatus(route));
        }

        Ok(())
    }

    /// Applies `OPS_API_BASE`, `OPS_API_TOKEN` and `BBPS_API_BASE`.
    ///
    /// `lookup` is `std::env::var(..).ok()` outside of tests. Empty values
    /// are ignored.
    pub fn apply_env_overrides<F>(&mut self, lookup: F) -> Result<(), ValidationError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let lookup = |var: &str| lookup(var).filter(|value| !value.trim().is_empty());

        if let Some(value) = lookup(ENV_API_BASE) {
            self.upstream.base_url = parse_env_url(ENV_API_BASE, &value)?;
        }
        if let Some(value) = lookup(ENV_BBPS_API_BASE) {
            self.upstream.bbps_base_url = Some(parse_env_url(ENV_BBPS_API_BASE, &value)?);
        }
        if let Some(token) = lookup(ENV_API_TOKEN) {
            self.upstream.token = Some(token);
        }

        Ok(())
    }
}

fn parse_env_url(var: &'static str, value: &str) -> Result<Url, ValidationError> {
    Url::parse(value.trim()).map_err(|_| ValidationError::InvalidUrl {
        var,
        value: value.to_string(),
    })
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct Listener {
    pub host: String,
    pub port: u16,
}

impl Listener {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.port == 0 {
            return Err(ValidationError::InvalidPort);
        }
        Ok(())
    }
}

/// Where the operations API lives and how long to wait for it.
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct UpstreamConfig {
    /// Base for every `/ops/*` call, e.g. `https://staging-v2.oolka.in/v2`
    pub base_url: Url,
    /// Base for `/bbps-info`. Falls back to `base_url`.
    pub bbps_base_url: Option<Url>,
    /// Sent as a bearer token when set
    pub token: Option<String>,
    pub timeout_secs: u64,
    /// Timeout for the SQL passthrough, which runs longer queries
    pub sql_timeout_secs: u64,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        UpstreamConfig {
            base_url: default_base_url(),
            bbps_base_url: None,
            token: None,
            timeout_secs: 10,
            sql_timeout_secs: 20,
        }
    }
}

fn default_base_url() -> Url {
    Url::parse(DEFAULT_BASE_URL).unwrap_or_else(|_| unreachable!("default base url is valid"))
}

impl UpstreamConfig {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.timeout_secs == 0 {
            return Err(ValidationError::ZeroTimeout("upstream.timeout_secs"));
        }
        if self.sql_timeout_secs == 0 {
            return Err(ValidationError::ZeroTimeout("upstream.sql_timeout_secs"));
        }
        Ok(())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn sql_timeout(&self) -> Duration {
        Duration::from_secs(self.sql_timeout_secs)
    }

    pub fn bbps_base_url(&self) -> &Url {
        self.bbps_base_url.as_ref().unwrap_or(&self.base_url)
    }
}

#[derive(Clone, Copy, Debug, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CronPerformanceSourceType {
    #[default]
    Upstream,
    /// Deterministic generated data, for demos and local development
    Synthetic,
}

#[derive(Clone, Copy, Debug, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CronJobSourceType {
    #[default]
    Upstream,
    /// A fixed list of demo jobs
    Demo,
}

#[derive(Clone, Copy, Debug, Default, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Sources {
    pub cron_performance: CronPerformanceSourceType,
    pub cron_jobs: CronJobSourceType,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::{DegradePolicy, FailStatus};
    use std::collections::HashMap;

    const MINIMAL: &str = r#"
listener:
    host: "0.0.0.0"
    port: 3000
admin_listener:
    host: "127.0.0.1"
    port: 3001
"#;

    #[test]
    fn test_parse_minimal_config() {
        let config: Config = serde_yaml::from_str(MINIMAL).unwrap();
        config.validate().unwrap();

        assert_eq!(config.upstream.base_url.as_str(), "https://staging-v2.oolka.in/v2");
        assert_eq!(config.upstream.bbps_base_url(), &config.upstream.base_url);
        assert_eq!(config.upstream.timeout(), Duration::from_secs(10));
        assert_eq!(config.upstream.sql_timeout(), Duration::from_secs(20));
        assert_eq!(config.upstream.token, None);
        assert_eq!(config.sources, Sources::default());
        assert_eq!(config.degrade, DegradePolicies::default());
    }

    #[test]
    fn test_parse_full_config() {
        let yaml = r#"
listener:
    host: "0.0.0.0"
    port: 3000
admin_listener:
    host: "127.0.0.1"
    port: 3001
upstream:
    base_url: "http://ops.internal:8080/v2"
    bbps_base_url: "http://bbps.internal"
    token: "abc"
    timeout_secs: 5
    sql_timeout_secs: 60
sources:
    cron_performance: synthetic
    cron_jobs: demo
degrade:
    crons_info:
        mode: absorb
    all_billers:
        mode: fail
        on_rejected: mirror
        on_unavailable: 503
"#;
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        config.validate().unwrap();

        assert_eq!(config.upstream.base_url.as_str(), "http://ops.internal:8080/v2");
        assert_eq!(config.upstream.bbps_base_url().as_str(), "http://bbps.internal/");
        assert_eq!(config.upstream.token.as_deref(), Some("abc"));
        assert_eq!(config.upstream.sql_timeout(), Duration::from_secs(60));
        assert_eq!(config.sources.cron_performance, CronPerformanceSourceType::Synthetic);
        assert_eq!(config.sources.cron_jobs, CronJobSourceType::Demo);
        assert_eq!(config.degrade.crons_info, DegradePolicy::Absorb);
        assert_eq!(
            config.degrade.all_billers,
            DegradePolicy::fail_with(FailStatus::Mirror, FailStatus::Code(503))
        );
    }

    #[test]
    fn test_validation_errors() {
        let mut config: Config = serde_yaml::from_str(MINIMAL).unwrap();
        config.admin_listener.port = 0;
        assert_eq!(config.validate(), Err(ValidationError::InvalidPort));

        let mut config: Config = serde_yaml::from_str(MINIMAL).unwrap();
        config.upstream.sql_timeout_secs = 0;
        assert_eq!(
            config.validate(),
            Err(ValidationError::ZeroTimeout("upstream.sql_timeout_secs"))
        );

        let mut config: Config = serde_yaml::from_str(MINIMAL).unwrap();
        config.degrade.sql_query = DegradePolicy::fail_with(FailStatus::Code(99), FailStatus::Mirror);
        assert_eq!(
            config.validate(),
            Err(ValidationError::InvalidDegradeStatus("sql_query"))
        );
    }

    #[test]
    fn test_invalid_yaml_is_rejected() {
        let bad_url = MINIMAL.to_string() + "upstream:\n    base_url: \"not a url\"\n";
        assert!(serde_yaml::from_str::<Config>(&bad_url).is_err());

        let bad_source = MINIMAL.to_string() + "sources:\n    cron_jobs: synthetic\n";
        assert!(serde_yaml::from_str::<Config>(&bad_source).is_err());
    }

    #[test]
    fn test_env_overrides() {
        let env = HashMap::from([
            (ENV_API_BASE, "http://localhost:9000/v2"),
            (ENV_API_TOKEN, "from-env"),
            (ENV_BBPS_API_BASE, "   "),
        ]);
        let mut config: Config = serde_yaml::from_str(MINIMAL).unwrap();
        config
            .apply_env_overrides(|var| env.get(var).map(|v| v.to_string()))
            .unwrap();

        assert_eq!(config.upstream.base_url.as_str(), "http://localhost:9000/v2");
        assert_eq!(config.upstream.token.as_deref(), Some("from-env"));
        // Blank values leave the setting alone
        assert_eq!(config.upstream.bbps_base_url, None);

        let err = config
            .apply_env_overrides(|var| (var == ENV_BBPS_API_BASE).then(|| "nope".to_string()))
            .unwrap_err();
        assert_eq!(
            err,
            ValidationError::InvalidUrl {
                var: ENV_BBPS_API_BASE,
                value: "nope".into()
            }
        );
    }
}
