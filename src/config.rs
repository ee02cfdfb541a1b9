// src/config.rs
//! Service configuration: environment variables (via dotenvy in dev) plus
//! the owner-token table for the on-demand endpoint.

use anyhow::{anyhow, Context, Result};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

pub const ENV_OWNER_TOKENS_PATH: &str = "OWNER_TOKENS_PATH";

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    /// Secrets accepted by the scheduled-run trigger (service-role key
    /// and/or a dedicated scheduler secret).
    pub scheduler_secrets: Vec<String>,
    /// Interval for the background sweep; `None` disables the scheduler.
    pub sync_interval_secs: Option<u64>,
    pub youtube_api_key: Option<String>,
    pub slack_bot_token: Option<String>,
    pub max_items: usize,
    pub fetch_concurrency: usize,
    pub pair_timeout_secs: u64,
    /// Per-run deadline; `None` lets a run go until the pairs finish.
    pub run_deadline_secs: Option<u64>,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let scheduler_secrets = ["SERVICE_ROLE_KEY", "SYNC_SCHEDULER_SECRET"]
            .iter()
            .filter_map(|name| env_opt(name))
            .collect();
        Self {
            database_url: env_opt("DATABASE_URL")
                .unwrap_or_else(|| "sqlite://market_minds.db?mode=rwc".to_string()),
            scheduler_secrets,
            sync_interval_secs: env_opt("SYNC_INTERVAL_SECS").and_then(|v| v.parse().ok()),
            youtube_api_key: env_opt("YOUTUBE_API_KEY"),
            slack_bot_token: env_opt("SLACK_BOT_TOKEN"),
            max_items: env_opt("AGGREGATE_MAX_ITEMS")
                .and_then(|v| v.parse().ok())
                .unwrap_or(5),
            fetch_concurrency: env_opt("AGGREGATE_CONCURRENCY")
                .and_then(|v| v.parse().ok())
                .unwrap_or(4),
            pair_timeout_secs: env_opt("AGGREGATE_PAIR_TIMEOUT_SECS")
                .and_then(|v| v.parse().ok())
                .unwrap_or(30),
            run_deadline_secs: env_opt("AGGREGATE_RUN_DEADLINE_SECS").and_then(|v| v.parse().ok()),
        }
    }
}

fn env_opt(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

/// Owner-token table: bearer token -> owner id. Stands in for the hosting
/// platform's session verification at this service's boundary.
///
/// Load order:
/// 1) $OWNER_TOKENS_PATH
/// 2) config/owner_tokens.toml
/// 3) config/owner_tokens.json
/// 4) empty table (every on-demand request is rejected)
pub fn load_owner_tokens_default() -> Result<HashMap<String, String>> {
    if let Ok(p) = std::env::var(ENV_OWNER_TOKENS_PATH) {
        let pb = PathBuf::from(p);
        if !pb.exists() {
            return Err(anyhow!("OWNER_TOKENS_PATH points to non-existent path"));
        }
        return load_owner_tokens_from(&pb);
    }
    let toml_p = PathBuf::from("config/owner_tokens.toml");
    if toml_p.exists() {
        return load_owner_tokens_from(&toml_p);
    }
    let json_p = PathBuf::from("config/owner_tokens.json");
    if json_p.exists() {
        return load_owner_tokens_from(&json_p);
    }
    Ok(HashMap::new())
}

pub fn load_owner_tokens_from(path: &Path) -> Result<HashMap<String, String>> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("reading owner tokens from {}", path.display()))?;
    let ext = path
        .extension()
        .and_then(|s| s.to_str())
        .unwrap_or_default()
        .to_ascii_lowercase();
    parse_owner_tokens(&content, ext.as_str())
}

fn parse_owner_tokens(s: &str, hint_ext: &str) -> Result<HashMap<String, String>> {
    let try_toml = hint_ext == "toml" || s.contains("tokens");
    if try_toml {
        if let Ok(v) = parse_toml(s) {
            return Ok(v);
        }
    }
    if let Ok(v) = parse_json(s) {
        return Ok(v);
    }
    if !try_toml {
        if let Ok(v) = parse_toml(s) {
            return Ok(v);
        }
    }
    Err(anyhow!("unsupported owner-token format"))
}

fn parse_toml(s: &str) -> Result<HashMap<String, String>> {
    #[derive(serde::Deserialize)]
    struct TomlTokens {
        tokens: HashMap<String, String>,
    }
    let v: TomlTokens = toml::from_str(s)?;
    Ok(v.tokens)
}

fn parse_json(s: &str) -> Result<HashMap<String, String>> {
    let v: HashMap<String, String> = serde_json::from_str(s)?;
    Ok(v)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_tables_parse_from_both_formats() {
        let toml = r#"
            [tokens]
            "tok-1" = "user-1"
            "tok-2" = "user-2"
        "#;
        let parsed = parse_toml(toml).unwrap();
        assert_eq!(parsed.get("tok-1").map(String::as_str), Some("user-1"));

        let json = r#"{"tok-9": "user-9"}"#;
        let parsed = parse_json(json).unwrap();
        assert_eq!(parsed.get("tok-9").map(String::as_str), Some("user-9"));
    }

    #[serial_test::serial]
    #[test]
    fn env_path_wins_and_missing_path_errors() {
        let dir = tempfile::tempdir().unwrap();
        let p = dir.path().join("tokens.json");
        std::fs::write(&p, r#"{"tok": "owner"}"#).unwrap();

        std::env::set_var(ENV_OWNER_TOKENS_PATH, p.display().to_string());
        let table = load_owner_tokens_default().unwrap();
        assert_eq!(table.get("tok").map(String::as_str), Some("owner"));

        std::env::set_var(ENV_OWNER_TOKENS_PATH, "/definitely/not/here.toml");
        assert!(load_owner_tokens_default().is_err());
        std::env::remove_var(ENV_OWNER_TOKENS_PATH);
    }
}
