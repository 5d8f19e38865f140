use std::{
    env, fs,
    net::SocketAddr,
    path::{Path, PathBuf},
};

use crate::{errors::Error, Result};

/// Typed configuration for the facade.
///
/// Values come from the process environment, with an optional `.env` file in
/// the working directory filling in anything not already set.
#[derive(Clone, Debug)]
pub struct Config {
    // Service
    pub app_name: String,
    pub debug: bool,
    pub host: String,
    pub port: u16,
    pub log_level: String,
    pub cors_origins: Vec<String>,

    // Telegram
    pub telegram_api_id: i32,
    pub telegram_api_hash: String,
    pub sessions_dir: PathBuf,
}

impl Config {
    pub fn load() -> Result<Self> {
        load_dotenv_if_present(Path::new(".env"));

        // Required env vars
        let telegram_api_id = match env_str("TELEGRAM_API_ID").and_then(non_empty) {
            Some(raw) => raw.trim().parse::<i32>().map_err(|_| {
                Error::Config(format!("TELEGRAM_API_ID must be an integer, got {raw:?}"))
            })?,
            None => {
                return Err(Error::Config(
                    "TELEGRAM_API_ID environment variable is required".to_string(),
                ))
            }
        };
        let telegram_api_hash = env_str("TELEGRAM_API_HASH").unwrap_or_default();
        if telegram_api_hash.trim().is_empty() {
            return Err(Error::Config(
                "TELEGRAM_API_HASH environment variable is required".to_string(),
            ));
        }

        let sessions_dir = env_path("SESSIONS_DIR")
            .unwrap_or_else(|| PathBuf::from("data/telegram-sessions"));

        // Service
        let app_name = env_str("APP_NAME")
            .and_then(non_empty)
            .unwrap_or_else(|| "tgf".to_string());
        let debug = env_bool("DEBUG").unwrap_or(false);
        let host = env_str("HOST")
            .and_then(non_empty)
            .unwrap_or_else(|| "0.0.0.0".to_string());
        let port = env_u16("PORT").unwrap_or(8000);
        let log_level = env_str("LOG_LEVEL")
            .and_then(non_empty)
            .map(|s| s.trim().to_lowercase())
            .unwrap_or_else(|| "info".to_string());
        let cors_origins = parse_csv(env_str("CORS_ORIGINS")).unwrap_or_else(|| vec!["*".to_string()]);

        Ok(Self {
            app_name,
            debug,
            host,
            port,
            log_level,
            cors_origins,
            telegram_api_id,
            telegram_api_hash,
            sessions_dir,
        })
    }

    pub fn bind_addr(&self) -> Result<SocketAddr> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .map_err(|e| Error::Config(format!("invalid HOST/PORT: {e}")))
    }
}

fn env_str(key: &str) -> Option<String> {
    env::var(key).ok()
}

fn load_dotenv_if_present(path: &Path) {
    let Ok(contents) = fs::read_to_string(path) else {
        return;
    };

    for raw in contents.lines() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let Some((k, v)) = line.split_once('=') else {
            continue;
        };

        let key = k.trim();
        if key.is_empty() {
            continue;
        }
        if env::var_os(key).is_some() {
            continue; // do not override existing env
        }

        env::set_var(key, unquote(v.trim()));
    }
}

fn unquote(val: &str) -> &str {
    if val.len() >= 2
        && ((val.starts_with('"') && val.ends_with('"'))
            || (val.starts_with('\'') && val.ends_with('\'')))
    {
        &val[1..val.len() - 1]
    } else {
        val
    }
}

fn env_bool(key: &str) -> Option<bool> {
    env_str(key).map(|s| parse_bool(&s))
}

fn parse_bool(s: &str) -> bool {
    matches!(
        s.trim().to_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

fn env_u16(key: &str) -> Option<u16> {
    env_str(key).and_then(|s| s.trim().parse::<u16>().ok())
}

fn env_path(key: &str) -> Option<PathBuf> {
    env::var_os(key)
        .filter(|v| !v.is_empty())
        .map(PathBuf::from)
}

fn parse_csv(v: Option<String>) -> Option<Vec<String>> {
    let v = v?;
    let out = v
        .split(',')
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string())
        .collect::<Vec<_>>();
    if out.is_empty() {
        None
    } else {
        Some(out)
    }
}

fn non_empty(s: String) -> Option<String> {
    if s.trim().is_empty() {
        None
    } else {
        Some(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn csv_trims_and_drops_empty_entries() {
        let out = parse_csv(Some(" http://a.test , ,http://b.test".to_string())).unwrap();
        assert_eq!(out, vec!["http://a.test", "http://b.test"]);
        assert!(parse_csv(Some(" , ".to_string())).is_none());
        assert!(parse_csv(None).is_none());
    }

    #[test]
    fn quotes_are_stripped_from_dotenv_values() {
        assert_eq!(unquote("\"abc\""), "abc");
        assert_eq!(unquote("'abc'"), "abc");
        assert_eq!(unquote("\"abc"), "\"abc");
        assert_eq!(unquote("x"), "x");
    }

    #[test]
    fn bool_parsing_accepts_common_truthy_values() {
        for v in ["1", "true", "YES", " on "] {
            assert!(parse_bool(v), "{v}");
        }
        for v in ["0", "false", "", "nope"] {
            assert!(!parse_bool(v), "{v}");
        }
    }
}
