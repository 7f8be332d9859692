use std::env;
use std::time::Duration;

use url::Url;

use crate::error::ConfigError;

const DEFAULT_MAX_RETRIES: u32 = 2;
const DEFAULT_RETRY_DELAY: Duration = Duration::from_millis(500);
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
const DEFAULT_LOGIN_ROUTE: &str = "/login";

/// Connection settings for the REST backend.
#[derive(Clone, Debug)]
pub struct ApiConfig {
    /// Base path every endpoint is resolved against; always ends with `/`.
    pub base_url: Url,
    /// Extra attempts after a transport failure or a 408/504.
    pub max_retries: u32,
    pub retry_delay: Duration,
    pub request_timeout: Duration,
    /// Route announced to subscribers when a 401 forces a logout.
    pub login_route: String,
}

impl ApiConfig {
    /// Build a config with default retry and timeout settings.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Url` if `base_url` does not parse.
    pub fn new(base_url: &str) -> Result<Self, ConfigError> {
        Ok(Self {
            base_url: normalize_base(base_url)?,
            max_retries: DEFAULT_MAX_RETRIES,
            retry_delay: DEFAULT_RETRY_DELAY,
            request_timeout: DEFAULT_TIMEOUT,
            login_route: DEFAULT_LOGIN_ROUTE.into(),
        })
    }

    /// Load configuration from the environment.
    ///
    /// | Env Var                     | Required | Default  |
    /// |-----------------------------|----------|----------|
    /// | `COURSE_API_BASE_URL`       | **yes**  | --       |
    /// | `COURSE_API_MAX_RETRIES`    | no       | `2`      |
    /// | `COURSE_API_RETRY_DELAY_MS` | no       | `500`    |
    /// | `COURSE_API_TIMEOUT_SECS`   | no       | `30`     |
    /// | `COURSE_LOGIN_ROUTE`        | no       | `/login` |
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the base URL is missing or a value does not parse.
    pub fn from_env() -> Result<Self, ConfigError> {
        let base_url =
            env::var("COURSE_API_BASE_URL").map_err(|_| ConfigError::Missing("COURSE_API_BASE_URL"))?;
        let mut config = Self::new(&base_url)?;

        if let Some(retries) = parse_var::<u32>("COURSE_API_MAX_RETRIES")? {
            config.max_retries = retries;
        }
        if let Some(ms) = parse_var::<u64>("COURSE_API_RETRY_DELAY_MS")? {
            config.retry_delay = Duration::from_millis(ms);
        }
        if let Some(secs) = parse_var::<u64>("COURSE_API_TIMEOUT_SECS")? {
            config.request_timeout = Duration::from_secs(secs);
        }
        if let Ok(route) = env::var("COURSE_LOGIN_ROUTE") {
            if !route.trim().is_empty() {
                config.login_route = route;
            }
        }
        Ok(config)
    }

    #[must_use]
    pub fn with_retries(mut self, max_retries: u32, retry_delay: Duration) -> Self {
        self.max_retries = max_retries;
        self.retry_delay = retry_delay;
        self
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Resolve an endpoint path (no leading slash) against the base URL.
    ///
    /// # Errors
    ///
    /// Returns `url::ParseError` if the joined URL is invalid.
    pub fn endpoint(&self, path: &str) -> Result<Url, url::ParseError> {
        self.base_url.join(path.trim_start_matches('/'))
    }
}

// `Url::join` replaces the last segment unless the base ends with a slash.
fn normalize_base(raw: &str) -> Result<Url, ConfigError> {
    let trimmed = raw.trim();
    if trimmed.ends_with('/') {
        Ok(Url::parse(trimmed)?)
    } else {
        Ok(Url::parse(&format!("{trimmed}/"))?)
    }
}

fn parse_var<T: std::str::FromStr>(name: &'static str) -> Result<Option<T>, ConfigError> {
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|_| ConfigError::Invalid { name, raw }),
        Err(_) => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoints_resolve_under_base_path() {
        let config = ApiConfig::new("https://example.test/api").unwrap();
        assert_eq!(
            config.endpoint("auth/login").unwrap().as_str(),
            "https://example.test/api/auth/login"
        );
        assert_eq!(
            config.endpoint("/progress/complete").unwrap().as_str(),
            "https://example.test/api/progress/complete"
        );
    }

    #[test]
    fn defaults_are_applied() {
        let config = ApiConfig::new("http://localhost:8080/").unwrap();
        assert_eq!(config.max_retries, DEFAULT_MAX_RETRIES);
        assert_eq!(config.retry_delay, DEFAULT_RETRY_DELAY);
        assert_eq!(config.login_route, "/login");
    }

    #[test]
    fn invalid_base_url_is_rejected() {
        assert!(matches!(
            ApiConfig::new("not a url"),
            Err(ConfigError::Url(_))
        ));
    }
}
