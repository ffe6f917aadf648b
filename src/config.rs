use std::path::PathBuf;
use std::time::Duration;

use chrono::Duration as ChronoDuration;

pub const FREE_SUGGESTION_LIMIT: usize = 5;
pub const FREE_SCHEDULE_LIMIT: usize = 5;
pub const TITLE_MAX_CHARS: usize = 200;
pub const DESCRIPTION_MAX_CHARS: usize = 2000;

const DEFAULT_AI_BASE_URL: &str = "https://api.aimlapi.com/v1";
const DEFAULT_AI_MODEL: &str = "mistralai/mistral-nemo";
const DEFAULT_AI_TIMEOUT_SECS: u64 = 30;
const DEFAULT_PASSWORD_ITERATIONS: u32 = 100_000;
const DEFAULT_TOKEN_TTL_HOURS: i64 = 24 * 7;

#[derive(Debug, Clone, PartialEq)]
pub struct AiConfig {
    pub api_key: Option<String>,
    pub base_url: String,
    pub model: String,
    /// Upper bound on a single external generation call, network included.
    pub timeout: Duration,
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: DEFAULT_AI_BASE_URL.to_string(),
            model: DEFAULT_AI_MODEL.to_string(),
            timeout: Duration::from_secs(DEFAULT_AI_TIMEOUT_SECS),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    pub data_dir: PathBuf,
    pub ai: AiConfig,
    pub password_iterations: u32,
    pub token_ttl: ChronoDuration,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            ai: AiConfig::default(),
            password_iterations: DEFAULT_PASSWORD_ITERATIONS,
            token_ttl: ChronoDuration::hours(DEFAULT_TOKEN_TTL_HOURS),
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds a config from an arbitrary key lookup. Blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let read = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        let defaults = Self::default();

        let ai = AiConfig {
            api_key: read("AI_API_KEY"),
            base_url: read("AI_BASE_URL")
                .map(|url| url.trim_end_matches('/').to_string())
                .unwrap_or(defaults.ai.base_url),
            model: read("AI_MODEL").unwrap_or(defaults.ai.model),
            timeout: read("AI_TIMEOUT_SECS")
                .and_then(|value| value.parse::<u64>().ok())
                .filter(|secs| *secs > 0)
                .map(Duration::from_secs)
                .unwrap_or(defaults.ai.timeout),
        };

        Self {
            data_dir: read("TODO_ASSISTANT_DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.data_dir),
            ai,
            password_iterations: read("TODO_ASSISTANT_PASSWORD_ITERATIONS")
                .and_then(|value| value.parse::<u32>().ok())
                .filter(|iterations| *iterations > 0)
                .unwrap_or(defaults.password_iterations),
            token_ttl: read("TODO_ASSISTANT_TOKEN_TTL_HOURS")
                .and_then(|value| value.parse::<i64>().ok())
                .filter(|hours| *hours > 0)
                .map(ChronoDuration::hours)
                .unwrap_or(defaults.token_ttl),
        }
    }

    pub fn database_path(&self) -> PathBuf {
        self.data_dir.join("todo-assistant.sqlite")
    }

    pub fn log_dir(&self) -> PathBuf {
        self.data_dir.join("logs")
    }
}
