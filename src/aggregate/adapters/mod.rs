// src/aggregate/adapters/mod.rs
//! One adapter per platform kind. Each owns its parsing quirks and converts
//! transport/parse trouble into recoverable outcomes at its boundary.

pub mod email;
pub mod podcast;
pub mod reddit;
pub mod rss;
pub mod slack;
pub mod twitter;
pub mod uploads;
pub mod youtube;

use std::time::Duration;

use anyhow::{anyhow, Context, Result};

const USER_AGENT: &str = "market-minds/0.1 (+https://marketminds.app)";

/// Network adapters run over HTTP in production and over canned bodies in
/// tests, so the mapping logic is exercised without sockets.
pub(crate) enum Transport {
    Http(reqwest::Client),
    Fixture(String),
}

impl Transport {
    pub(crate) fn http() -> Self {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .connect_timeout(Duration::from_secs(5))
            .timeout(Duration::from_secs(15))
            .build()
            .unwrap_or_default();
        Transport::Http(client)
    }

    pub(crate) fn fixture(content: &str) -> Self {
        Transport::Fixture(content.to_string())
    }

    /// GET a body as text. Non-2xx responses surface as errors annotated
    /// with the HTTP status so adapters can report them verbatim.
    pub(crate) async fn get_text(&self, url: &str, bearer: Option<&str>) -> Result<String> {
        match self {
            Transport::Fixture(body) => Ok(body.clone()),
            Transport::Http(client) => {
                let mut req = client.get(url);
                if let Some(token) = bearer {
                    req = req.bearer_auth(token);
                }
                let resp = req
                    .send()
                    .await
                    .with_context(|| format!("requesting {url}"))?;
                let status = resp.status();
                if !status.is_success() {
                    return Err(anyhow!("HTTP {status} from {url}"));
                }
                resp.text().await.context("reading response body")
            }
        }
    }
}
