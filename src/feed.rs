// src/feed.rs
//! Feed parsing behind a narrow interface: `parse_rss` / `parse_atom` turn
//! raw XML into `RawEntry` records; adapters keep only the domain mapping.
//!
//! Uses quick-xml's serde support rather than tag scanning, so nested,
//! self-closing, and namespaced elements are handled by the parser.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use quick_xml::de::from_str;
use serde::Deserialize;
use sha1::{Digest, Sha1};

/// One feed entry, format-independent. Adapters map this into their
/// platform's `NormalizedItem` variant.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawEntry {
    pub title: Option<String>,
    pub link: Option<String>,
    pub guid: Option<String>,
    pub author: Option<String>,
    /// Raw date string as found in the feed (RFC2822 for RSS, RFC3339 for Atom).
    pub published: Option<String>,
    pub description: Option<String>,
    pub enclosure_url: Option<String>,
    /// `<itunes:duration>` verbatim, e.g. "01:02:03" or "330".
    pub duration: Option<String>,
}

// ------------------------------------------------------------
// RSS 2.0
// ------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct Rss {
    channel: Channel,
}

#[derive(Debug, Deserialize)]
struct Channel {
    #[serde(rename = "item", default)]
    item: Vec<Item>,
}

#[derive(Debug, Deserialize)]
struct Item {
    title: Option<String>,
    link: Option<String>,
    guid: Option<Guid>,
    author: Option<String>,
    #[serde(rename = "dc:creator")]
    creator: Option<String>,
    #[serde(rename = "pubDate")]
    pub_date: Option<String>,
    description: Option<String>,
    enclosure: Option<Enclosure>,
    #[serde(rename = "itunes:duration")]
    itunes_duration: Option<String>,
}

/// `<guid>` often carries an `isPermaLink` attribute, so it cannot be read
/// as a bare string.
#[derive(Debug, Deserialize)]
struct Guid {
    #[serde(rename = "$text")]
    value: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Enclosure {
    #[serde(rename = "@url")]
    url: Option<String>,
}

/// Parse an RSS 2.0 document into raw entries.
pub fn parse_rss(xml: &str) -> Result<Vec<RawEntry>> {
    let cleaned = scrub_html_entities_for_xml(xml);
    let rss: Rss = from_str(&cleaned).context("parsing rss xml")?;
    let entries = rss
        .channel
        .item
        .into_iter()
        .map(|it| RawEntry {
            title: it.title,
            link: it.link,
            guid: it.guid.and_then(|g| g.value).filter(|v| !v.trim().is_empty()),
            author: it.author.or(it.creator),
            published: it.pub_date,
            description: it.description,
            enclosure_url: it.enclosure.and_then(|e| e.url),
            duration: it.itunes_duration,
        })
        .collect();
    Ok(entries)
}

// ------------------------------------------------------------
// Atom (Reddit's public feeds, among others)
// ------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct AtomFeed {
    #[serde(rename = "entry", default)]
    entry: Vec<AtomEntry>,
}

#[derive(Debug, Deserialize)]
struct AtomEntry {
    title: Option<String>,
    id: Option<String>,
    updated: Option<String>,
    published: Option<String>,
    author: Option<AtomAuthor>,
    summary: Option<String>,
    content: Option<AtomContent>,
    #[serde(rename = "link", default)]
    link: Vec<AtomLink>,
}

#[derive(Debug, Deserialize)]
struct AtomAuthor {
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AtomContent {
    #[serde(rename = "$text")]
    value: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AtomLink {
    #[serde(rename = "@href")]
    href: Option<String>,
    #[serde(rename = "@rel")]
    rel: Option<String>,
}

/// Parse an Atom document into raw entries.
pub fn parse_atom(xml: &str) -> Result<Vec<RawEntry>> {
    let cleaned = scrub_html_entities_for_xml(xml);
    let feed: AtomFeed = from_str(&cleaned).context("parsing atom xml")?;
    let entries = feed
        .entry
        .into_iter()
        .map(|en| {
            let link = pick_alternate_link(&en.link);
            RawEntry {
                title: en.title,
                link,
                guid: en.id.filter(|v| !v.trim().is_empty()),
                author: en.author.and_then(|a| a.name),
                published: en.published.or(en.updated),
                description: en.content.and_then(|c| c.value).or(en.summary),
                enclosure_url: None,
                duration: None,
            }
        })
        .collect();
    Ok(entries)
}

/// Atom entries may carry several `<link>` elements; the content link is the
/// one with `rel="alternate"` (or no rel at all).
fn pick_alternate_link(links: &[AtomLink]) -> Option<String> {
    links
        .iter()
        .find(|l| matches!(l.rel.as_deref(), None | Some("alternate")))
        .or_else(|| links.first())
        .and_then(|l| l.href.clone())
}

// ------------------------------------------------------------
// Entry identity + shared helpers
// ------------------------------------------------------------

/// De-duplication identity for a feed entry: guid when present, otherwise a
/// hash of the link, otherwise a random token (unique per call).
pub fn external_id(entry: &RawEntry) -> String {
    if let Some(guid) = entry.guid.as_deref() {
        return guid.trim().to_string();
    }
    if let Some(link) = entry.link.as_deref().filter(|l| !l.trim().is_empty()) {
        return sha1_hex(link.trim());
    }
    uuid::Uuid::new_v4().to_string()
}

pub fn sha1_hex(input: &str) -> String {
    let mut hasher = Sha1::new();
    hasher.update(input.as_bytes());
    let digest = hasher.finalize();
    let mut out = String::with_capacity(40);
    for b in digest {
        use std::fmt::Write as _;
        let _ = write!(&mut out, "{:02x}", b);
    }
    out
}

/// Parse `<itunes:duration>` forms "HH:MM:SS", "MM:SS", or "SS" into seconds.
pub fn parse_duration_secs(raw: &str) -> Option<u64> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    let mut total: u64 = 0;
    for part in trimmed.split(':') {
        let n: u64 = part.trim().parse().ok()?;
        total = total.checked_mul(60)?.checked_add(n)?;
    }
    Some(total)
}

/// RFC2822 feed dates ("Tue, 04 Aug 2026 10:00:00 GMT") to RFC3339 UTC.
/// The obsolete zone tokens feeds still emit (GMT, UT) are accepted.
pub fn rfc2822_to_rfc3339(ts: &str) -> Option<String> {
    DateTime::parse_from_rfc2822(ts.trim())
        .ok()
        .map(|dt| dt.with_timezone(&Utc).to_rfc3339())
}

/// Named HTML entities that break strict XML parsing; replaced before parse.
fn scrub_html_entities_for_xml(s: &str) -> String {
    s.replace("&nbsp;", " ")
        .replace("&ndash;", "-")
        .replace("&mdash;", "-")
        .replace("&ldquo;", "\"")
        .replace("&rdquo;", "\"")
        .replace("&lsquo;", "'")
        .replace("&rsquo;", "'")
}

/// Normalize feed text before persistence: entity decode, tag strip,
/// quote normalization, whitespace collapse, length cap.
pub fn normalize_text(s: &str) -> String {
    let mut out = html_escape::decode_html_entities(s).to_string();

    static RE_TAGS: once_cell::sync::OnceCell<regex::Regex> = once_cell::sync::OnceCell::new();
    let re_tags = RE_TAGS.get_or_init(|| regex::Regex::new(r"(?is)</?[^>]+>").unwrap());
    out = re_tags.replace_all(&out, " ").to_string();

    out = out
        .replace(['\u{201C}', '\u{201D}', '\u{00AB}', '\u{00BB}'], "\"")
        .replace(['\u{2018}', '\u{2019}'], "'");

    static RE_WS: once_cell::sync::OnceCell<regex::Regex> = once_cell::sync::OnceCell::new();
    let re_ws = RE_WS.get_or_init(|| regex::Regex::new(r"\s+").unwrap());
    out = re_ws.replace_all(&out, " ").trim().to_string();

    // Cap stored excerpts; full articles live behind the original URL.
    if out.chars().count() > 2000 {
        out = out.chars().take(2000).collect();
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    const RSS_FIXTURE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0" xmlns:itunes="http://www.itunes.com/dtds/podcast-1.0.dtd">
  <channel>
    <title>Example Research</title>
    <item>
      <title>Rates outlook &ndash; what changed</title>
      <link>https://example.com/posts/rates-outlook</link>
      <guid isPermaLink="false">post-123</guid>
      <pubDate>Tue, 04 Aug 2026 10:00:00 GMT</pubDate>
      <description><![CDATA[<p>Quick take on the Fed path.</p>]]></description>
    </item>
    <item>
      <title>Earnings season primer</title>
      <link>https://example.com/posts/earnings-primer</link>
      <pubDate>Mon, 03 Aug 2026 08:30:00 GMT</pubDate>
      <description>Margins, guidance, positioning.</description>
    </item>
  </channel>
</rss>"#;

    const ATOM_FIXTURE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<feed xmlns="http://www.w3.org/2005/Atom">
  <title>r/investing</title>
  <entry>
    <author><name>/u/quant_jane</name></author>
    <id>t3_abc123</id>
    <link href="https://www.reddit.com/r/investing/comments/abc123/thread/" />
    <updated>2026-08-04T09:15:00+00:00</updated>
    <title>Weekly macro thread</title>
    <content type="html">What are you watching this week?</content>
  </entry>
</feed>"#;

    #[test]
    fn rss_items_map_to_raw_entries() {
        let entries = parse_rss(RSS_FIXTURE).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].guid.as_deref(), Some("post-123"));
        assert_eq!(
            entries[0].link.as_deref(),
            Some("https://example.com/posts/rates-outlook")
        );
        assert!(entries[0]
            .description
            .as_deref()
            .unwrap()
            .contains("Fed path"));
        assert!(entries[1].guid.is_none());
    }

    #[test]
    fn atom_entries_map_to_raw_entries() {
        let entries = parse_atom(ATOM_FIXTURE).unwrap();
        assert_eq!(entries.len(), 1);
        let en = &entries[0];
        assert_eq!(en.guid.as_deref(), Some("t3_abc123"));
        assert_eq!(en.author.as_deref(), Some("/u/quant_jane"));
        assert_eq!(
            en.link.as_deref(),
            Some("https://www.reddit.com/r/investing/comments/abc123/thread/")
        );
        assert_eq!(en.published.as_deref(), Some("2026-08-04T09:15:00+00:00"));
    }

    #[test]
    fn empty_channel_yields_no_entries() {
        let xml = r#"<rss version="2.0"><channel><title>empty</title></channel></rss>"#;
        let entries = parse_rss(xml).unwrap();
        assert!(entries.is_empty());
    }

    #[test]
    fn external_id_prefers_guid_then_link_hash_then_random() {
        let both = RawEntry {
            guid: Some("guid-1".into()),
            link: Some("https://example.com/a".into()),
            ..Default::default()
        };
        assert_eq!(external_id(&both), "guid-1");

        let link_only = RawEntry {
            link: Some("https://example.com/a".into()),
            ..Default::default()
        };
        assert_eq!(external_id(&link_only), sha1_hex("https://example.com/a"));

        let bare = RawEntry::default();
        let a = external_id(&bare);
        let b = external_id(&bare);
        assert_ne!(a, b, "random fallback ids must differ across calls");
    }

    #[test]
    fn duration_forms_parse_to_seconds() {
        assert_eq!(parse_duration_secs("01:02:03"), Some(3723));
        assert_eq!(parse_duration_secs("05:30"), Some(330));
        assert_eq!(parse_duration_secs("45"), Some(45));
        assert_eq!(parse_duration_secs(""), None);
        assert_eq!(parse_duration_secs("abc"), None);
    }

    #[test]
    fn rfc2822_converts_to_rfc3339_utc() {
        let out = rfc2822_to_rfc3339("Tue, 04 Aug 2026 10:00:00 GMT").unwrap();
        assert!(out.starts_with("2026-08-04T10:00:00"));
    }

    #[test]
    fn normalize_strips_tags_and_collapses_whitespace() {
        let s = "  <p>Hello,&nbsp;&nbsp; world</p>\n\n ";
        assert_eq!(normalize_text(s), "Hello, world");
    }
}
