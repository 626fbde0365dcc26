//! Client configuration from environment variables.

use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_API_URL: &str = "http://localhost:8080/api";

/// Settings for the data-access layer.
#[derive(Debug, Clone, PartialEq)]
pub struct ClientConfig {
    /// Base URL of the REST backend, without a trailing slash.
    pub api_url: String,
    /// How long a cached collection counts as fresh.
    pub cache_ttl: Duration,
    /// Quiescence window for search/filter input.
    pub debounce: Duration,
    /// How long a persisted notification survives a page change.
    pub flash_ttl: Duration,
    pub request_timeout: Duration,
    pub page_size: u64,
    /// Where the token store and flash notifications live on disk.
    pub data_dir: Option<PathBuf>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            cache_ttl: Duration::from_secs(300),
            debounce: Duration::from_millis(400),
            flash_ttl: Duration::from_secs(15),
            request_timeout: Duration::from_secs(30),
            page_size: 10,
            data_dir: None,
        }
    }
}

impl ClientConfig {
    /// Read configuration from the process environment.
    ///
    /// Environment variables:
    /// - `PETADMIN_API_URL`: backend base URL (default: "http://localhost:8080/api")
    /// - `PETADMIN_CACHE_TTL_SECS`: cache freshness window (default: 300)
    /// - `PETADMIN_DEBOUNCE_MS`: search debounce, 300..=500 (default: 400)
    /// - `PETADMIN_FLASH_TTL_SECS`: persisted notification expiry, 10..=30 (default: 15)
    /// - `PETADMIN_REQUEST_TIMEOUT_SECS`: per-request timeout (default: 30)
    /// - `PETADMIN_PAGE_SIZE`: default page size (default: 10)
    /// - `PETADMIN_DATA_DIR`: storage directory (default: platform config dir)
    pub fn from_env() -> Self {
        Self::from_vars(|key| std::env::var(key).ok())
    }

    /// Same as [`ClientConfig::from_env`] but with an arbitrary lookup.
    pub fn from_vars(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let number = |key: &str| -> Option<u64> {
            let raw = lookup(key)?;
            match raw.trim().parse::<u64>() {
                Ok(n) => Some(n),
                Err(_) => {
                    tracing::warn!(key, value = %raw, "ignoring non-numeric setting");
                    None
                }
            }
        };

        let api_url = lookup("PETADMIN_API_URL")
            .map(|url| url.trim().trim_end_matches('/').to_string())
            .filter(|url| match url::Url::parse(url) {
                Ok(_) => true,
                Err(e) => {
                    tracing::warn!(%url, error = %e, "ignoring invalid PETADMIN_API_URL");
                    false
                }
            })
            .unwrap_or(defaults.api_url);

        Self {
            api_url,
            cache_ttl: number("PETADMIN_CACHE_TTL_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.cache_ttl),
            debounce: number("PETADMIN_DEBOUNCE_MS")
                .map(|ms| Duration::from_millis(ms.clamp(300, 500)))
                .unwrap_or(defaults.debounce),
            flash_ttl: number("PETADMIN_FLASH_TTL_SECS")
                .map(|secs| Duration::from_secs(secs.clamp(10, 30)))
                .unwrap_or(defaults.flash_ttl),
            request_timeout: number("PETADMIN_REQUEST_TIMEOUT_SECS")
                .filter(|secs| *secs > 0)
                .map(Duration::from_secs)
                .unwrap_or(defaults.request_timeout),
            page_size: number("PETADMIN_PAGE_SIZE")
                .map(|size| size.max(1))
                .unwrap_or(defaults.page_size),
            data_dir: lookup("PETADMIN_DATA_DIR")
                .filter(|dir| !dir.trim().is_empty())
                .map(PathBuf::from),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> ClientConfig {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        ClientConfig::from_vars(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_when_unset() {
        assert_eq!(config(&[]), ClientConfig::default());
    }

    #[test]
    fn windows_are_clamped() {
        let cfg = config(&[
            ("PETADMIN_DEBOUNCE_MS", "50"),
            ("PETADMIN_FLASH_TTL_SECS", "600"),
            ("PETADMIN_PAGE_SIZE", "0"),
        ]);
        assert_eq!(cfg.debounce, Duration::from_millis(300));
        assert_eq!(cfg.flash_ttl, Duration::from_secs(30));
        assert_eq!(cfg.page_size, 1);
    }

    #[test]
    fn api_url_is_trimmed_and_validated() {
        let cfg = config(&[("PETADMIN_API_URL", "https://admin.example.vn/api/")]);
        assert_eq!(cfg.api_url, "https://admin.example.vn/api");

        let cfg = config(&[("PETADMIN_API_URL", "not a url")]);
        assert_eq!(cfg.api_url, DEFAULT_API_URL);
    }

    #[test]
    fn bad_numbers_fall_back() {
        let cfg = config(&[("PETADMIN_CACHE_TTL_SECS", "five")]);
        assert_eq!(cfg.cache_ttl, Duration::from_secs(300));
    }
}
