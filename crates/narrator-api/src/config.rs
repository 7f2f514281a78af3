//! Startup configuration read from the environment.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use narrator_session::GameConfig;

use crate::error::AppError;

/// Default platform endpoint.
pub const DEFAULT_PLATFORM_API_URL: &str = "https://api.telegram.org";

/// Process configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    /// Listen address.
    pub addr: SocketAddr,
    /// Postgres document store; in-memory when absent.
    pub database_url: Option<String>,
    /// Platform base URL.
    pub platform_api_url: String,
    /// Bot credential for the platform.
    pub bot_token: String,
    /// Local process snapshot.
    pub snapshot_path: PathBuf,
    /// Game knobs.
    pub game: GameConfig,
}

impl AppConfig {
    /// Reads the configuration from process environment variables.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` for a missing `BOT_TOKEN` or any malformed
    /// value.
    pub fn from_env() -> Result<Self, AppError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Reads the configuration through `lookup`.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` for a missing `BOT_TOKEN` or any malformed
    /// value.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, AppError> {
        let host = lookup("HOST").unwrap_or_else(|| "0.0.0.0".to_owned());
        let port: u16 = parsed(&lookup, "PORT", 3000)?;
        let addr: SocketAddr = format!("{host}:{port}")
            .parse()
            .map_err(|e| AppError::Config(format!("invalid HOST:PORT combination: {e}")))?;

        let bot_token = lookup("BOT_TOKEN")
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| AppError::Config("BOT_TOKEN environment variable must be set".into()))?;

        let defaults = GameConfig::default();
        let game = GameConfig {
            ballot_window: Duration::from_secs(parsed(
                &lookup,
                "BALLOT_WINDOW_SECS",
                defaults.ballot_window.as_secs(),
            )?),
            shuffle_repeats: parsed(&lookup, "SHUFFLE_REPEATS", defaults.shuffle_repeats)?,
            max_warnings: parsed(&lookup, "MAX_WARNINGS", defaults.max_warnings)?,
            name_max_chars: parsed(&lookup, "NAME_MAX_CHARS", defaults.name_max_chars)?,
            max_timer: Duration::from_secs(parsed(
                &lookup,
                "MAX_TIMER_SECS",
                defaults.max_timer.as_secs(),
            )?),
            ..defaults
        };
        if game.ballot_window.is_zero() {
            return Err(AppError::Config(
                "BALLOT_WINDOW_SECS must be positive".into(),
            ));
        }

        Ok(Self {
            addr,
            database_url: lookup("DATABASE_URL").filter(|u| !u.trim().is_empty()),
            platform_api_url: lookup("PLATFORM_API_URL")
                .unwrap_or_else(|| DEFAULT_PLATFORM_API_URL.to_owned()),
            bot_token,
            snapshot_path: lookup("SNAPSHOT_PATH")
                .map_or_else(|| PathBuf::from("narrator_snapshot.json"), PathBuf::from),
            game,
        })
    }
}

fn parsed<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> Result<T, AppError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e| AppError::Config(format!("{key} is invalid: {e}"))),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_defaults_with_only_token() {
        let config = AppConfig::from_lookup(lookup(&[("BOT_TOKEN", "abc")])).unwrap();

        assert_eq!(config.addr, "0.0.0.0:3000".parse().unwrap());
        assert_eq!(config.database_url, None);
        assert_eq!(config.platform_api_url, DEFAULT_PLATFORM_API_URL);
        assert_eq!(config.snapshot_path, PathBuf::from("narrator_snapshot.json"));
        assert_eq!(config.game, GameConfig::default());
    }

    #[test]
    fn test_game_knobs_are_read() {
        let config = AppConfig::from_lookup(lookup(&[
            ("BOT_TOKEN", "abc"),
            ("BALLOT_WINDOW_SECS", "8"),
            ("SHUFFLE_REPEATS", "3"),
            ("MAX_WARNINGS", "4"),
            ("NAME_MAX_CHARS", "20"),
            ("MAX_TIMER_SECS", "120"),
        ]))
        .unwrap();

        assert_eq!(config.game.ballot_window, Duration::from_secs(8));
        assert_eq!(config.game.shuffle_repeats, 3);
        assert_eq!(config.game.max_warnings, 4);
        assert_eq!(config.game.name_max_chars, 20);
        assert_eq!(config.game.max_timer, Duration::from_secs(120));
    }

    #[test]
    fn test_missing_token_fails_fast() {
        let result = AppConfig::from_lookup(lookup(&[]));

        assert!(matches!(result, Err(AppError::Config(_))));
    }

    #[test]
    fn test_malformed_values_fail_fast() {
        for (key, value) in [("PORT", "http"), ("BALLOT_WINDOW_SECS", "0"), ("MAX_WARNINGS", "-1")] {
            let result = AppConfig::from_lookup(lookup(&[("BOT_TOKEN", "abc"), (key, value)]));

            assert!(matches!(result, Err(AppError::Config(_))), "{key}={value}");
        }
    }
}
