// src/relevance.rs
//! Keyword relevance gate for inbox ingestion: only emails that match the
//! finance/research keyword set are admitted as content items.
//!
//! The keyword list ships with a built-in default and can be replaced via
//! `$KEYWORDS_CONFIG_PATH`, `config/keywords.toml`, or `config/keywords.json`.

use anyhow::{anyhow, Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

pub const ENV_KEYWORDS_PATH: &str = "KEYWORDS_CONFIG_PATH";

/// Built-in relevance vocabulary; deliberately broad, matching is
/// case-insensitive substring over subject + snippet.
const DEFAULT_KEYWORDS: &[&str] = &[
    "market",
    "markets",
    "stock",
    "stocks",
    "equity",
    "equities",
    "earnings",
    "fed",
    "rates",
    "inflation",
    "bond",
    "treasury",
    "portfolio",
    "invest",
    "investing",
    "investment",
    "crypto",
    "bitcoin",
    "macro",
    "research",
    "analyst",
    "valuation",
    "dividend",
    "ipo",
    "etf",
    "hedge",
    "recession",
    "gdp",
];

#[derive(Debug, Clone)]
pub struct KeywordFilter {
    keywords: Vec<String>,
}

impl Default for KeywordFilter {
    fn default() -> Self {
        Self {
            keywords: DEFAULT_KEYWORDS.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl KeywordFilter {
    pub fn new(keywords: Vec<String>) -> Self {
        Self {
            keywords: clean_list(keywords),
        }
    }

    /// Load using env var + fallbacks:
    /// 1) $KEYWORDS_CONFIG_PATH
    /// 2) config/keywords.toml
    /// 3) config/keywords.json
    /// 4) built-in default set
    pub fn load_default() -> Self {
        match try_load_configured() {
            Ok(Some(filter)) => filter,
            Ok(None) => Self::default(),
            Err(e) => {
                tracing::warn!(error = ?e, "keyword config unreadable; using built-in set");
                Self::default()
            }
        }
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("reading keywords from {}", path.display()))?;
        let ext = path
            .extension()
            .and_then(|s| s.to_str())
            .unwrap_or_default()
            .to_ascii_lowercase();
        parse_keywords(&content, ext.as_str()).map(Self::new)
    }

    /// Keywords found in `text`, lowercase, in vocabulary order.
    pub fn matches(&self, text: &str) -> Vec<String> {
        let haystack = text.to_lowercase();
        self.keywords
            .iter()
            .filter(|kw| haystack.contains(kw.as_str()))
            .cloned()
            .collect()
    }

    pub fn is_relevant(&self, text: &str) -> bool {
        !self.matches(text).is_empty()
    }

    pub fn len(&self) -> usize {
        self.keywords.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keywords.is_empty()
    }
}

fn try_load_configured() -> Result<Option<KeywordFilter>> {
    if let Ok(p) = std::env::var(ENV_KEYWORDS_PATH) {
        let pb = PathBuf::from(p);
        if !pb.exists() {
            return Err(anyhow!("KEYWORDS_CONFIG_PATH points to non-existent path"));
        }
        return KeywordFilter::from_file(&pb).map(Some);
    }
    let toml_p = PathBuf::from("config/keywords.toml");
    if toml_p.exists() {
        return KeywordFilter::from_file(&toml_p).map(Some);
    }
    let json_p = PathBuf::from("config/keywords.json");
    if json_p.exists() {
        return KeywordFilter::from_file(&json_p).map(Some);
    }
    Ok(None)
}

fn parse_keywords(s: &str, hint_ext: &str) -> Result<Vec<String>> {
    let try_toml = hint_ext == "toml" || s.contains("keywords");
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
    Err(anyhow!("unsupported keywords format"))
}

fn parse_toml(s: &str) -> Result<Vec<String>> {
    #[derive(serde::Deserialize)]
    struct TomlKw {
        keywords: Vec<String>,
    }
    let v: TomlKw = toml::from_str(s)?;
    Ok(v.keywords)
}

fn parse_json(s: &str) -> Result<Vec<String>> {
    let v: Vec<String> = serde_json::from_str(s)?;
    Ok(v)
}

fn clean_list(items: Vec<String>) -> Vec<String> {
    let mut out = Vec::with_capacity(items.len());
    for it in items {
        let t = it.trim().to_lowercase();
        if !t.is_empty() && !out.contains(&t) {
            out.push(t);
        }
    }
    out
}
