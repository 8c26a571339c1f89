//! Runtime configuration, with defaults and `BOOKSNAP_*` environment
//! overrides.
//!
//! | Variable | Default |
//! |---|---|
//! | `BOOKSNAP_TRANSACTION_ATTEMPTS` | 5 |
//! | `BOOKSNAP_OPEN_LIBRARY_URL` | `https://openlibrary.org` |
//! | `BOOKSNAP_OPEN_LIBRARY_USER_AGENT` | `BooksnapApp/1.0 (contact@example.com)` |
//! | `BOOKSNAP_HTTP_TIMEOUT_SECS` | 15 |
//! | `BOOKSNAP_AI_ENDPOINT` | `http://127.0.0.1:3400/api` |
//! | `BOOKSNAP_AI_TIMEOUT_SECS` | 60 |
//! | `BOOKSNAP_RECENT_SEARCHES_MAX` | 5 |
//! | `BOOKSNAP_RECENT_SEARCHES_PATH` | `booksnap_recent_searches.json` |

use std::env;
use std::path::PathBuf;

use crate::store::DEFAULT_MAX_TRANSACTION_ATTEMPTS;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Config {
    pub store: StoreConfig,
    pub open_library: OpenLibraryConfig,
    pub ai: AiConfig,
    pub search: SearchConfig,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StoreConfig {
    pub max_transaction_attempts: u32,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            max_transaction_attempts: DEFAULT_MAX_TRANSACTION_ATTEMPTS,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct OpenLibraryConfig {
    pub base_url: String,
    pub user_agent: String,
    pub timeout_secs: u64,
}

impl Default for OpenLibraryConfig {
    fn default() -> Self {
        Self {
            base_url: "https://openlibrary.org".to_string(),
            user_agent: "BooksnapApp/1.0 (contact@example.com)".to_string(),
            timeout_secs: 15,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AiConfig {
    /// Base URL of the prompt service; flows are posted to `{endpoint}/{flow}`.
    pub endpoint: String,
    pub timeout_secs: u64,
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://127.0.0.1:3400/api".to_string(),
            timeout_secs: 60,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SearchConfig {
    pub max_recent: usize,
    pub history_path: PathBuf,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            max_recent: 5,
            history_path: PathBuf::from("booksnap_recent_searches.json"),
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Build from an arbitrary variable source. Unset or unparsable values
    /// keep their defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Config::default();
        let attempts = env_u64(
            &lookup,
            "BOOKSNAP_TRANSACTION_ATTEMPTS",
            u64::from(defaults.store.max_transaction_attempts),
        );
        let max_recent = env_u64(
            &lookup,
            "BOOKSNAP_RECENT_SEARCHES_MAX",
            defaults.search.max_recent as u64,
        );
        Config {
            store: StoreConfig {
                max_transaction_attempts: attempts.clamp(1, u64::from(u32::MAX)) as u32,
            },
            open_library: OpenLibraryConfig {
                base_url: env_string(
                    &lookup,
                    "BOOKSNAP_OPEN_LIBRARY_URL",
                    &defaults.open_library.base_url,
                ),
                user_agent: env_string(
                    &lookup,
                    "BOOKSNAP_OPEN_LIBRARY_USER_AGENT",
                    &defaults.open_library.user_agent,
                ),
                timeout_secs: env_u64(
                    &lookup,
                    "BOOKSNAP_HTTP_TIMEOUT_SECS",
                    defaults.open_library.timeout_secs,
                ),
            },
            ai: AiConfig {
                endpoint: env_string(&lookup, "BOOKSNAP_AI_ENDPOINT", &defaults.ai.endpoint),
                timeout_secs: env_u64(
                    &lookup,
                    "BOOKSNAP_AI_TIMEOUT_SECS",
                    defaults.ai.timeout_secs,
                ),
            },
            search: SearchConfig {
                // At least one term is kept.
                max_recent: max_recent.max(1) as usize,
                history_path: lookup("BOOKSNAP_RECENT_SEARCHES_PATH")
                    .filter(|v| !v.is_empty())
                    .map(PathBuf::from)
                    .unwrap_or(defaults.search.history_path),
            },
        }
    }
}

fn env_u64(lookup: &impl Fn(&str) -> Option<String>, name: &str, default: u64) -> u64 {
    lookup(name)
        .and_then(|v| v.trim().parse::<u64>().ok())
        .unwrap_or(default)
}

fn env_string(lookup: &impl Fn(&str) -> Option<String>, name: &str, default: &str) -> String {
    lookup(name)
        .filter(|v| !v.trim().is_empty())
        .unwrap_or_else(|| default.to_string())
}
