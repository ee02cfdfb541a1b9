// tests/platform_normalize.rs
// The synonym table and its interaction with dispatch.

use market_minds::platform::{normalize, Platform};

#[test]
fn synonym_table_matches_contract() {
    assert_eq!(normalize("newsletters"), "rss");
    assert_eq!(normalize("substack"), "rss");
    assert_eq!(normalize("podcast"), "podcasts");
    assert_eq!(normalize("emails"), "email");
}

#[test]
fn unrecognized_key_normalizes_to_itself() {
    assert_eq!(normalize("telegram"), "telegram");
    assert!(Platform::parse("telegram").is_none());
}

#[test]
fn every_canonical_key_round_trips() {
    for platform in [
        Platform::Youtube,
        Platform::Twitter,
        Platform::Reddit,
        Platform::Podcasts,
        Platform::Email,
        Platform::Slack,
        Platform::Rss,
        Platform::Uploads,
    ] {
        let key = platform.as_str();
        assert_eq!(normalize(key), key);
        assert_eq!(Platform::parse(key), Some(platform));
    }
}
