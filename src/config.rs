use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::{debug, warn};

use crate::throttle::RateLimits;
use crate::{AppError, Result};

pub const TOKEN_VAR: &str = "SLACK_USER_TOKEN";
pub const ENV_FILE: &str = ".env";
pub const OUTPUT_FILE: &str = "extracted-links.csv";
pub const SLACK_API_BASE_URL: &str = "https://slack.com/api/";

const PAGE_SIZE: u16 = 200;
const HISTORY_LIMIT: u16 = 200;
const BATCH_SIZE: usize = 100;
const BATCH_COOLDOWN: Duration = Duration::from_secs(5);

/// Everything a run needs, resolved and checked before the first request.
#[derive(Debug, Clone)]
pub struct Config {
    pub token: String,
    pub output_path: PathBuf,
    pub page_size: u16,
    pub history_limit: u16,
    pub batch_size: usize,
    pub batch_cooldown: Duration,
    pub rate_limits: RateLimits,
    pub api_base_url: String,
}

impl Config {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            output_path: PathBuf::from(OUTPUT_FILE),
            page_size: PAGE_SIZE,
            history_limit: HISTORY_LIMIT,
            batch_size: BATCH_SIZE,
            batch_cooldown: BATCH_COOLDOWN,
            rate_limits: RateLimits::default(),
            api_base_url: SLACK_API_BASE_URL.to_string(),
        }
    }

    /// Reads the token from the process environment, after loading `.env`
    /// from the working directory when one exists.
    pub fn from_env() -> Result<Self> {
        load_env_file(Path::new(ENV_FILE));
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let token = lookup(TOKEN_VAR).ok_or(AppError::MissingToken)?;
        let config = Self::new(token);
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.token.trim().is_empty() {
            return Err(AppError::MissingToken);
        }
        if self.page_size == 0 {
            return Err(AppError::InvalidConfig(
                "page size must be positive".to_string(),
            ));
        }
        if self.history_limit == 0 {
            return Err(AppError::InvalidConfig(
                "history limit must be positive".to_string(),
            ));
        }
        if self.batch_size == 0 {
            return Err(AppError::InvalidConfig(
                "batch size must be positive".to_string(),
            ));
        }
        url::Url::parse(&self.api_base_url)
            .map_err(|e| AppError::InvalidConfig(format!("api base url: {}", e)))?;
        self.rate_limits.validate()
    }
}

/// Loads `path` into the process environment without overriding variables
/// already set. A missing file is skipped and an unreadable one is logged, so
/// a token exported by the shell still works. Returns whether it was loaded.
pub fn load_env_file(path: &Path) -> bool {
    if !path.exists() {
        return false;
    }
    match dotenvy::from_path(path) {
        Ok(()) => {
            debug!("loaded environment from {}", path.display());
            true
        }
        Err(e) => {
            warn!("ignoring {}: {}", path.display(), e);
            false
        }
    }
}
