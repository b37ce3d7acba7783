//! Configuration types.

use std::time::Duration;

use secrecy::SecretString;

use crate::error::ConfigError;

/// Default marketplace endpoint.
pub const DEFAULT_API_URL: &str = "https://api.blackroad.io/v1";

/// Worker scheduling configuration. Immutable once the worker starts.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Maximum number of tasks executing at once.
    pub concurrency: usize,
    /// Declared skills, matched case-sensitively against a task's required skills.
    pub skills: Vec<String>,
    /// Delay between the end of one poll cycle and the start of the next.
    pub poll_interval: Duration,
    /// How often `stop()` re-checks the active task count while draining.
    pub drain_check_interval: Duration,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            concurrency: 5,
            skills: Vec::new(),
            poll_interval: Duration::from_millis(5000),
            drain_check_interval: Duration::from_secs(1),
        }
    }
}

impl WorkerConfig {
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }

    pub fn with_skills<I, S>(mut self, skills: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.skills = skills.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn with_drain_check_interval(mut self, interval: Duration) -> Self {
        self.drain_check_interval = interval;
        self
    }

    /// Reject values the scheduler cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.concurrency == 0 {
            return Err(ConfigError::InvalidValue {
                key: "concurrency".into(),
                message: "must be a positive integer".into(),
            });
        }
        if self.poll_interval.is_zero() {
            return Err(ConfigError::InvalidValue {
                key: "poll_interval".into(),
                message: "must be greater than zero".into(),
            });
        }
        if self.drain_check_interval.is_zero() {
            return Err(ConfigError::InvalidValue {
                key: "drain_check_interval".into(),
                message: "must be greater than zero".into(),
            });
        }
        Ok(())
    }

    /// Load from `WORKER_CONCURRENCY`, `WORKER_SKILLS` and `POLL_INTERVAL` (ms).
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load from an arbitrary key lookup. Missing keys fall back to defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let concurrency = match lookup("WORKER_CONCURRENCY") {
            Some(raw) => parse_number::<usize>("WORKER_CONCURRENCY", &raw)?,
            None => defaults.concurrency,
        };

        let skills = parse_list(&lookup("WORKER_SKILLS").unwrap_or_else(|| "backend".to_string()));

        let poll_interval = match lookup("POLL_INTERVAL") {
            Some(raw) => Duration::from_millis(parse_number::<u64>("POLL_INTERVAL", &raw)?),
            None => defaults.poll_interval,
        };

        let config = Self {
            concurrency,
            skills,
            poll_interval,
            ..defaults
        };
        config.validate()?;
        Ok(config)
    }
}

/// Connection settings for the marketplace API.
#[derive(Debug, Clone)]
pub struct MarketplaceConfig {
    /// Base URL, without a trailing slash.
    pub api_url: String,
    pub api_key: SecretString,
    /// Per-request timeout.
    pub timeout: Duration,
}

impl MarketplaceConfig {
    pub fn new(api_url: impl Into<String>, api_key: SecretString) -> Self {
        Self {
            api_url: api_url.into().trim_end_matches('/').to_string(),
            api_key,
            timeout: Duration::from_secs(30),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Load from `BLACKROAD_API_KEY` (required) and `BLACKROAD_API_URL`.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let api_key = lookup("BLACKROAD_API_KEY")
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| ConfigError::MissingEnvVar("BLACKROAD_API_KEY".into()))?;
        let api_url = lookup("BLACKROAD_API_URL").unwrap_or_else(|| DEFAULT_API_URL.to_string());

        Ok(Self::new(api_url, SecretString::from(api_key)))
    }
}

fn parse_number<T>(key: &str, raw: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    raw.trim().parse().map_err(|e: T::Err| ConfigError::InvalidValue {
        key: key.to_string(),
        message: format!("{raw:?}: {e}"),
    })
}

fn parse_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use secrecy::ExposeSecret;

    use super::*;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_are_valid() {
        let config = WorkerConfig::default();
        assert_eq!(config.concurrency, 5);
        assert_eq!(config.poll_interval, Duration::from_millis(5000));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn zero_concurrency_rejected() {
        let err = WorkerConfig::default().with_concurrency(0).validate().unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { ref key, .. } if key == "concurrency"));
    }

    #[test]
    fn zero_poll_interval_rejected() {
        let config = WorkerConfig::default().with_poll_interval(Duration::ZERO);
        assert!(config.validate().is_err());
    }

    #[test]
    fn worker_config_from_lookup() {
        let config = WorkerConfig::from_lookup(lookup(&[
            ("WORKER_CONCURRENCY", "3"),
            ("WORKER_SKILLS", "rust, python,,devops "),
            ("POLL_INTERVAL", "250"),
        ]))
        .unwrap();
        assert_eq!(config.concurrency, 3);
        assert_eq!(config.skills, vec!["rust", "python", "devops"]);
        assert_eq!(config.poll_interval, Duration::from_millis(250));
    }

    #[test]
    fn worker_config_default_skill_is_backend() {
        let config = WorkerConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.skills, vec!["backend"]);
        assert_eq!(config.concurrency, 5);
    }

    #[test]
    fn unparseable_concurrency_is_invalid() {
        let err = WorkerConfig::from_lookup(lookup(&[("WORKER_CONCURRENCY", "many")])).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { ref key, .. } if key == "WORKER_CONCURRENCY"));
    }

    #[test]
    fn marketplace_config_requires_api_key() {
        let err = MarketplaceConfig::from_lookup(lookup(&[])).unwrap_err();
        assert!(matches!(err, ConfigError::MissingEnvVar(ref k) if k == "BLACKROAD_API_KEY"));
    }

    #[test]
    fn marketplace_config_trims_trailing_slash() {
        let config = MarketplaceConfig::from_lookup(lookup(&[
            ("BLACKROAD_API_KEY", "br-key"),
            ("BLACKROAD_API_URL", "http://localhost:9000/v1/"),
        ]))
        .unwrap();
        assert_eq!(config.api_url, "http://localhost:9000/v1");
        assert_eq!(config.api_key.expose_secret(), "br-key");
        assert_eq!(config.timeout, Duration::from_secs(30));
    }

    #[test]
    fn marketplace_config_default_url() {
        let config = MarketplaceConfig::from_lookup(lookup(&[("BLACKROAD_API_KEY", "k")])).unwrap();
        assert_eq!(config.api_url, DEFAULT_API_URL);
    }
}
