use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};

use crate::retry::RetryPolicy;

const DEFAULT_OPENROUTER_URL: &str = "https://openrouter.ai/api/v1/chat/completions";
const DEFAULT_OPENROUTER_MODEL: &str = "google/gemini-2.0-flash-001";
const DEFAULT_EXA_URL: &str = "https://api.exa.ai/search";
const MIB: usize = 1024 * 1024;

/// Application configuration loaded from environment variables.
///
/// Built once at startup and handed to every component; nothing reads the
/// environment after `from_env` returns.
#[derive(Debug, Clone)]
pub struct Config {
    pub environment: Environment,
    pub port: u16,
    pub rust_log: String,
    /// `["*"]` means any origin.
    pub allowed_origins: Vec<String>,
    pub openrouter: OpenRouterConfig,
    pub exa: ExaConfig,
    pub retry: RetryPolicy,
    pub http_timeout: Duration,
    pub limits: Limits,
    pub rate_limits: RateLimitConfig,
    pub upload_tmp_dir: PathBuf,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Development,
    Staging,
    Production,
}

impl Environment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Environment::Development => "development",
            Environment::Staging => "staging",
            Environment::Production => "production",
        }
    }

    pub fn is_development(&self) -> bool {
        matches!(self, Environment::Development)
    }
}

impl FromStr for Environment {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "development" | "dev" | "local" => Ok(Environment::Development),
            "staging" | "stage" => Ok(Environment::Staging),
            "production" | "prod" => Ok(Environment::Production),
            other => bail!("APP_ENV must be development, staging or production (got '{other}')"),
        }
    }
}

/// Chat-completion provider settings. The key stays optional so the server
/// can boot without it; calls fail with a configuration error instead.
#[derive(Debug, Clone)]
pub struct OpenRouterConfig {
    pub api_key: Option<String>,
    pub api_url: String,
    pub model: String,
}

#[derive(Debug, Clone)]
pub struct ExaConfig {
    pub api_key: Option<String>,
    pub api_url: String,
}

/// Input and output bounds enforced by the pipeline.
#[derive(Debug, Clone)]
pub struct Limits {
    pub max_cv_bytes: usize,
    pub max_image_bytes: usize,
    pub min_resume_chars: usize,
    pub min_letter_chars: usize,
    pub word_limit: WordLimit,
    pub company_blurb_max_chars: usize,
}

impl Limits {
    /// Body ceiling for multipart requests: both uploads plus room for text fields.
    pub fn max_body_bytes(&self) -> usize {
        self.max_cv_bytes + self.max_image_bytes + MIB
    }
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_cv_bytes: 3 * MIB,
            max_image_bytes: 5 * MIB,
            min_resume_chars: 100,
            min_letter_chars: 50,
            word_limit: WordLimit::default(),
            company_blurb_max_chars: 1500,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WordLimit {
    pub min: u32,
    pub max: u32,
    pub default: u32,
}

impl WordLimit {
    pub fn contains(&self, value: u32) -> bool {
        (self.min..=self.max).contains(&value)
    }
}

impl Default for WordLimit {
    fn default() -> Self {
        Self {
            min: 250,
            max: 400,
            default: 300,
        }
    }
}

/// A request budget such as `10/hour`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimit {
    pub requests: u32,
    pub window: Duration,
}

impl RateLimit {
    pub const fn new(requests: u32, window: Duration) -> Self {
        Self { requests, window }
    }

    pub const fn per_minute(requests: u32) -> Self {
        Self::new(requests, Duration::from_secs(60))
    }

    pub const fn per_hour(requests: u32) -> Self {
        Self::new(requests, Duration::from_secs(3600))
    }
}

impl std::fmt::Display for RateLimit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let unit = match self.window.as_secs() {
            1 => "second".to_string(),
            60 => "minute".to_string(),
            3600 => "hour".to_string(),
            86400 => "day".to_string(),
            secs => format!("{secs}s"),
        };
        write!(f, "{}/{}", self.requests, unit)
    }
}

impl FromStr for RateLimit {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        let (count, unit) = s
            .split_once('/')
            .ok_or_else(|| anyhow!("rate limit '{s}' must look like '10/hour'"))?;
        let requests: u32 = count
            .trim()
            .parse()
            .with_context(|| format!("rate limit '{s}' has an invalid request count"))?;
        if requests == 0 {
            bail!("rate limit '{s}' must allow at least one request");
        }
        let secs = match unit.trim().to_lowercase().as_str() {
            "second" | "seconds" | "s" => 1,
            "minute" | "minutes" | "m" => 60,
            "hour" | "hours" | "h" => 3600,
            "day" | "days" | "d" => 86400,
            other => bail!("rate limit '{s}' has unknown unit '{other}'"),
        };
        Ok(RateLimit::new(requests, Duration::from_secs(secs)))
    }
}

/// Rate-limit scope of the generation route.
pub const GENERATE_SCOPE: &str = "generate_cover_letter";

/// Per-route request budgets. Routes not listed fall back to `global`.
#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    pub global: RateLimit,
    pub generate_cover_letter: RateLimit,
    pub analyze_company: RateLimit,
    pub analyze_job_desc_image: RateLimit,
}

impl RateLimitConfig {
    pub fn for_environment(env: Environment) -> Self {
        if env.is_development() {
            Self {
                global: RateLimit::per_minute(60),
                generate_cover_letter: RateLimit::per_hour(10),
                analyze_company: RateLimit::per_hour(30),
                analyze_job_desc_image: RateLimit::per_hour(20),
            }
        } else {
            Self {
                global: RateLimit::per_minute(30),
                generate_cover_letter: RateLimit::per_hour(5),
                analyze_company: RateLimit::per_hour(15),
                analyze_job_desc_image: RateLimit::per_hour(10),
            }
        }
    }

    /// Bucket scope and budget for a request path. Unlisted paths share the
    /// `global` scope; `None` means the path is not throttled.
    pub fn scope_for(&self, path: &str) -> Option<(&'static str, RateLimit)> {
        match path {
            "/health" | "/metrics" => None,
            "/api/generate_cover_letter" => Some((GENERATE_SCOPE, self.generate_cover_letter)),
            "/api/analyze_company" => Some(("analyze_company", self.analyze_company)),
            "/api/analyze_job_desc_image" => Some(("analyze_job_desc_image", self.analyze_job_desc_image)),
            _ => Some(("global", self.global)),
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from any key lookup. Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let environment: Environment = get("APP_ENV")
            .unwrap_or_else(|| "development".to_string())
            .parse()?;

        let mut rate_limits = RateLimitConfig::for_environment(environment);
        if let Some(v) = get("RATE_LIMIT_GLOBAL") {
            rate_limits.global = v.parse()?;
        }
        if let Some(v) = get("RATE_LIMIT_GENERATE") {
            rate_limits.generate_cover_letter = v.parse()?;
        }
        if let Some(v) = get("RATE_LIMIT_COMPANY") {
            rate_limits.analyze_company = v.parse()?;
        }
        if let Some(v) = get("RATE_LIMIT_JOB_IMAGE") {
            rate_limits.analyze_job_desc_image = v.parse()?;
        }

        let defaults = Limits::default();
        let word_limit = WordLimit {
            min: parse_or(&get, "WORD_LIMIT_MIN", defaults.word_limit.min)?,
            max: parse_or(&get, "WORD_LIMIT_MAX", defaults.word_limit.max)?,
            default: parse_or(&get, "WORD_LIMIT_DEFAULT", defaults.word_limit.default)?,
        };
        if word_limit.min > word_limit.max || !word_limit.contains(word_limit.default) {
            bail!(
                "word limit bounds are inconsistent: min={} max={} default={}",
                word_limit.min,
                word_limit.max,
                word_limit.default
            );
        }

        let limits = Limits {
            max_cv_bytes: parse_or(&get, "MAX_CV_SIZE_MB", 3usize)? * MIB,
            max_image_bytes: parse_or(&get, "MAX_IMAGE_SIZE_MB", 5usize)? * MIB,
            min_resume_chars: parse_or(&get, "MIN_RESUME_CHARS", defaults.min_resume_chars)?,
            min_letter_chars: parse_or(&get, "MIN_LETTER_CHARS", defaults.min_letter_chars)?,
            word_limit,
            company_blurb_max_chars: parse_or(
                &get,
                "COMPANY_INFO_MAX_CHARS",
                defaults.company_blurb_max_chars,
            )?,
        };

        let retry = RetryPolicy {
            max_attempts: parse_or(&get, "API_MAX_RETRIES", 3u32)?,
            backoff: match get("API_RETRY_BACKOFF_SECS") {
                Some(v) => parse_backoff(&v)?,
                None => RetryPolicy::default().backoff,
            },
        };
        if retry.max_attempts == 0 {
            bail!("API_MAX_RETRIES must be at least 1");
        }

        Ok(Config {
            environment,
            port: parse_or(&get, "PORT", 8000u16).context("PORT must be a valid port number")?,
            rust_log: get("RUST_LOG").unwrap_or_else(|| "info".to_string()),
            allowed_origins: parse_origins(get("ALLOWED_ORIGINS").as_deref().unwrap_or("*")),
            openrouter: OpenRouterConfig {
                api_key: get("OPENROUTER_API_KEY"),
                api_url: get("OPENROUTER_API_URL")
                    .unwrap_or_else(|| DEFAULT_OPENROUTER_URL.to_string()),
                model: get("OPENROUTER_MODEL")
                    .unwrap_or_else(|| DEFAULT_OPENROUTER_MODEL.to_string()),
            },
            exa: ExaConfig {
                api_key: get("EXA_API_KEY"),
                api_url: get("EXA_API_URL").unwrap_or_else(|| DEFAULT_EXA_URL.to_string()),
            },
            retry,
            http_timeout: Duration::from_secs(parse_or(&get, "HTTP_TIMEOUT_SECS", 120u64)?),
            limits,
            rate_limits,
            upload_tmp_dir: get("UPLOAD_TMP_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(std::env::temp_dir),
        })
    }
}

fn parse_or<T, G>(get: &G, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
    G: Fn(&str) -> Option<String>,
{
    match get(key) {
        Some(raw) => raw
            .parse::<T>()
            .with_context(|| format!("Environment variable '{key}' has an invalid value '{raw}'")),
        None => Ok(default),
    }
}

fn parse_backoff(raw: &str) -> Result<Vec<Duration>> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<f64>()
                .ok()
                .filter(|secs| secs.is_finite() && *secs >= 0.0)
                .map(Duration::from_secs_f64)
                .ok_or_else(|| anyhow!("API_RETRY_BACKOFF_SECS entry '{s}' is not a number of seconds"))
        })
        .collect()
}

fn parse_origins(raw: &str) -> Vec<String> {
    if raw.trim() == "*" {
        return vec!["*".to_string()];
    }
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> Result<Config> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults_without_any_variables() {
        let config = config_from(&[]).unwrap();
        assert_eq!(config.environment, Environment::Development);
        assert_eq!(config.port, 8000);
        assert_eq!(config.allowed_origins, vec!["*"]);
        assert!(config.openrouter.api_key.is_none());
        assert_eq!(config.openrouter.model, DEFAULT_OPENROUTER_MODEL);
        assert_eq!(config.retry.max_attempts, 3);
        assert_eq!(
            config.retry.backoff,
            vec![
                Duration::from_secs(1),
                Duration::from_secs(3),
                Duration::from_secs(5)
            ]
        );
        assert_eq!(config.limits.max_cv_bytes, 3 * MIB);
        assert_eq!(config.limits.word_limit, WordLimit::default());
    }

    #[test]
    fn test_blank_api_key_counts_as_missing() {
        let config = config_from(&[("OPENROUTER_API_KEY", "   ")]).unwrap();
        assert!(config.openrouter.api_key.is_none());
    }

    #[test]
    fn test_production_uses_tighter_rate_limits() {
        let config = config_from(&[("APP_ENV", "production")]).unwrap();
        assert_eq!(config.rate_limits.generate_cover_letter, RateLimit::per_hour(5));
        assert_eq!(config.rate_limits.global, RateLimit::per_minute(30));
    }

    #[test]
    fn test_rate_limit_override_from_env() {
        let config = config_from(&[("RATE_LIMIT_GENERATE", "2/minute")]).unwrap();
        assert_eq!(config.rate_limits.generate_cover_letter, RateLimit::per_minute(2));
    }

    #[test]
    fn test_rate_limit_parse_and_display() {
        let limit: RateLimit = "10/hour".parse().unwrap();
        assert_eq!(limit, RateLimit::per_hour(10));
        assert_eq!(limit.to_string(), "10/hour");
        assert!("ten/hour".parse::<RateLimit>().is_err());
        assert!("10/fortnight".parse::<RateLimit>().is_err());
        assert!("0/hour".parse::<RateLimit>().is_err());
    }

    #[test]
    fn test_health_and_metrics_are_not_throttled() {
        let limits = RateLimitConfig::for_environment(Environment::Development);
        assert!(limits.scope_for("/health").is_none());
        assert!(limits.scope_for("/metrics").is_none());
        assert_eq!(limits.scope_for("/api/parse_document"), Some(("global", limits.global)));
        assert_eq!(limits.scope_for("/"), Some(("global", limits.global)));
        assert_eq!(
            limits.scope_for("/api/generate_cover_letter"),
            Some(("generate_cover_letter", RateLimit::per_hour(10)))
        );
    }

    #[test]
    fn test_origins_are_split_and_trimmed() {
        let config = config_from(&[(
            "ALLOWED_ORIGINS",
            "http://localhost:3000, https://example.com ,",
        )])
        .unwrap();
        assert_eq!(
            config.allowed_origins,
            vec!["http://localhost:3000", "https://example.com"]
        );
    }

    #[test]
    fn test_inconsistent_word_limits_are_rejected() {
        assert!(config_from(&[("WORD_LIMIT_MIN", "500")]).is_err());
        assert!(config_from(&[("WORD_LIMIT_DEFAULT", "100")]).is_err());
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        assert!(config_from(&[("APP_ENV", "moon")]).is_err());
        assert!(config_from(&[("PORT", "eighty")]).is_err());
        assert!(config_from(&[("API_RETRY_BACKOFF_SECS", "1,x")]).is_err());
        assert!(config_from(&[("API_MAX_RETRIES", "0")]).is_err());
    }

    #[test]
    fn test_backoff_schedule_accepts_fractions() {
        let config = config_from(&[("API_RETRY_BACKOFF_SECS", "0.5, 2")]).unwrap();
        assert_eq!(
            config.retry.backoff,
            vec![Duration::from_millis(500), Duration::from_secs(2)]
        );
    }
}
