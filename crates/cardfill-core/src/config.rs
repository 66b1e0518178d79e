use crate::app_config::AppConfig;
use crate::ConfigError;

pub const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/123.0.0.0 Safari/537.36";

/// Load application configuration from environment variables.
///
/// Calls `dotenvy::dotenv().ok()` to load `.env` files before reading env vars.
///
/// # Errors
///
/// Returns `ConfigError` if a value is present but cannot be parsed.
pub fn load_app_config() -> Result<AppConfig, ConfigError> {
    dotenvy::dotenv().ok();
    load_app_config_from_env()
}

/// Load application configuration from environment variables already in the process.
///
/// Unlike [`load_app_config`], this does NOT load `.env` files.
///
/// # Errors
///
/// Returns `ConfigError` if a value is present but cannot be parsed.
pub fn load_app_config_from_env() -> Result<AppConfig, ConfigError> {
    build_app_config(|key| std::env::var(key))
}

/// Build application configuration using the provided env-var lookup function.
///
/// Every variable has a default, so the only failure mode is a value that
/// does not parse.
fn build_app_config<F>(lookup: F) -> Result<AppConfig, ConfigError>
where
    F: Fn(&str) -> Result<String, std::env::VarError>,
{
    use std::net::SocketAddr;
    use std::path::PathBuf;

    let or_default = |var: &str, default: &str| -> String {
        lookup(var).unwrap_or_else(|_| default.to_string())
    };

    let invalid = |var: &str, reason: String| ConfigError::InvalidEnvVar {
        var: var.to_string(),
        reason,
    };

    let parse_addr = |var: &str, default: &str| -> Result<SocketAddr, ConfigError> {
        or_default(var, default)
            .parse::<SocketAddr>()
            .map_err(|e| invalid(var, e.to_string()))
    };

    let parse_u64 = |var: &str, default: &str| -> Result<u64, ConfigError> {
        or_default(var, default)
            .parse::<u64>()
            .map_err(|e| invalid(var, e.to_string()))
    };

    let parse_nonzero_usize = |var: &str, default: &str| -> Result<usize, ConfigError> {
        let value = or_default(var, default)
            .parse::<usize>()
            .map_err(|e| invalid(var, e.to_string()))?;
        if value == 0 {
            return Err(invalid(var, "must be at least 1".to_string()));
        }
        Ok(value)
    };

    let parse_url = |var: &str, default: &str| -> Result<String, ConfigError> {
        let raw = or_default(var, default);
        let trimmed = raw.trim().trim_end_matches('/');
        if !(trimmed.starts_with("http://") || trimmed.starts_with("https://")) {
            return Err(invalid(var, format!("\"{raw}\" is not an http(s) URL")));
        }
        Ok(trimmed.to_string())
    };

    let flag = |var: &str, default: bool| -> bool {
        lookup(var).map_or(default, |raw| parse_flag(&raw))
    };

    let use_mock = flag("USE_MOCK", false);
    let debug = flag("DEBUG", false);
    let bind_addr = parse_addr("CARDFILL_BIND_ADDR", "127.0.0.1:8787")?;
    let log_level = or_default("CARDFILL_LOG_LEVEL", "info");
    let public_base_url = parse_url("CARDFILL_PUBLIC_BASE_URL", "http://localhost:8787")?;
    let api_base_url = parse_url("CARDFILL_API_BASE_URL", "https://www.affirm.com/api")?;
    let site_base_url = parse_url("CARDFILL_SITE_BASE_URL", "https://www.affirm.com")?;
    let request_timeout_secs = parse_u64("CARDFILL_REQUEST_TIMEOUT_SECS", "20")?;
    let user_agent = or_default("CARDFILL_USER_AGENT", DEFAULT_USER_AGENT);
    let cache_ttl_secs = parse_u64("CARDFILL_CACHE_TTL_SECS", "43200")?;
    let chrome_path = lookup("CARDFILL_CHROME_PATH")
        .ok()
        .filter(|raw| !raw.trim().is_empty())
        .map(PathBuf::from);
    let headless = flag("CARDFILL_HEADLESS", true);
    let max_pages = parse_nonzero_usize("CARDFILL_MAX_PAGES", "4")?;
    let batch_concurrency = parse_nonzero_usize("CARDFILL_BATCH_CONCURRENCY", "4")?;

    Ok(AppConfig {
        use_mock,
        debug,
        bind_addr,
        log_level,
        public_base_url,
        api_base_url,
        site_base_url,
        request_timeout_secs,
        user_agent,
        cache_ttl_secs,
        chrome_path,
        headless,
        max_pages,
        batch_concurrency,
    })
}

/// Interpret a boolean-ish environment value.
///
/// Unrecognized values are false.
fn parse_flag(raw: &str) -> bool {
    matches!(
        raw.trim().to_ascii_lowercase().as_str(),
        "true" | "1" | "yes" | "on"
    )
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
