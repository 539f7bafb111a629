use std::time::Duration;

use crate::{crawl, gemini, news, notion, rates};

pub const ENV_NOTION_API_KEY: &str = "NOTION_API_KEY";
pub const ENV_NOTION_PAGE_ID: &str = "NOTION_PAGE_ID";
pub const ENV_GOOGLE_API_KEY: &str = "GOOGLE_API_KEY";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} is not set")]
    Missing(&'static str),
    #[error("{0} and {1} are not set")]
    MissingBoth(&'static str, &'static str),
}

/// Runtime settings read once at startup. Missing secrets are kept as
/// `None`; the action that needs them refuses to run.
#[derive(Clone)]
pub struct Config {
    pub notion_api_key: Option<String>,
    pub notion_page_id: Option<String>,
    pub model_api_key: Option<String>,
    pub notion_base_url: String,
    pub model_base_url: String,
    pub model: String,
    pub news_url: Option<String>,
    pub rates_base_url: String,
    pub crawl_delay: Duration,
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("notion_api_key", &self.notion_api_key.as_ref().map(|_| "***"))
            .field("notion_page_id", &self.notion_page_id)
            .field("model_api_key", &self.model_api_key.as_ref().map(|_| "***"))
            .field("notion_base_url", &self.notion_base_url)
            .field("model_base_url", &self.model_base_url)
            .field("model", &self.model)
            .field("news_url", &self.news_url)
            .field("rates_base_url", &self.rates_base_url)
            .field("crawl_delay", &self.crawl_delay)
            .finish()
    }
}

#[derive(Debug, Clone, Copy)]
pub struct SyncSettings<'a> {
    pub api_key: &'a str,
    pub root_id: &'a str,
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_owned())
                .filter(|v| !v.is_empty())
        };

        let crawl_delay = get("KBDESK_CRAWL_DELAY_MS")
            .and_then(|v| v.parse::<u64>().ok())
            .map(Duration::from_millis)
            .unwrap_or(crawl::DEFAULT_DELAY);

        Self {
            notion_api_key: get(ENV_NOTION_API_KEY),
            notion_page_id: get(ENV_NOTION_PAGE_ID),
            model_api_key: get(ENV_GOOGLE_API_KEY),
            notion_base_url: get("KBDESK_NOTION_BASE_URL")
                .unwrap_or_else(|| notion::DEFAULT_BASE_URL.to_owned()),
            model_base_url: get("KBDESK_MODEL_BASE_URL")
                .unwrap_or_else(|| gemini::DEFAULT_BASE_URL.to_owned()),
            model: get("KBDESK_MODEL").unwrap_or_else(|| gemini::DEFAULT_MODEL.to_owned()),
            news_url: get("KBDESK_NEWS_URL"),
            rates_base_url: get("KBDESK_RATES_URL")
                .unwrap_or_else(|| rates::DEFAULT_BASE_URL.to_owned()),
            crawl_delay,
        }
    }

    /// Settings for a knowledge-base sync. `root_override` replaces the
    /// configured root page.
    pub fn require_sync<'a>(
        &'a self,
        root_override: Option<&'a str>,
    ) -> Result<SyncSettings<'a>, ConfigError> {
        let root_id = root_override
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .or(self.notion_page_id.as_deref());
        match (self.notion_api_key.as_deref(), root_id) {
            (Some(api_key), Some(root_id)) => Ok(SyncSettings { api_key, root_id }),
            (None, Some(_)) => Err(ConfigError::Missing(ENV_NOTION_API_KEY)),
            (Some(_), None) => Err(ConfigError::Missing(ENV_NOTION_PAGE_ID)),
            (None, None) => Err(ConfigError::MissingBoth(
                ENV_NOTION_API_KEY,
                ENV_NOTION_PAGE_ID,
            )),
        }
    }

    pub fn require_ask(&self) -> Result<&str, ConfigError> {
        self.model_api_key
            .as_deref()
            .ok_or(ConfigError::Missing(ENV_GOOGLE_API_KEY))
    }

    pub fn news_url(&self) -> String {
        self.news_url.clone().unwrap_or_else(news::default_feed_url)
    }
}
