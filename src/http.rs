use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;

use crate::error::FetchError;

/// Bytes of a fetched page kept for content checks.
pub const MAX_BODY_BYTES: usize = 1024 * 1024;

#[derive(Debug, Clone, PartialEq)]
pub struct FetchedPage {
    pub status: u16,
    pub body: String,
}

/// Outbound GET used to check learner-supplied links.
#[async_trait]
pub trait LinkChecker: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<FetchedPage, FetchError>;
}

pub struct HttpLinkChecker {
    client: Client,
}

impl HttpLinkChecker {
    pub fn new(timeout: Duration) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("study-mentor/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self { client })
    }
}

#[async_trait]
impl LinkChecker for HttpLinkChecker {
    async fn fetch(&self, url: &str) -> Result<FetchedPage, FetchError> {
        let mut response = self.client.get(url).send().await?;
        let status = response.status().as_u16();

        let mut body = Vec::new();
        while let Some(chunk) = response.chunk().await? {
            if !append_capped(&mut body, &chunk, MAX_BODY_BYTES) {
                break;
            }
        }

        Ok(FetchedPage {
            status,
            body: String::from_utf8_lossy(&body).into_owned(),
        })
    }
}

/// Appends up to `cap` bytes in total; returns false once the cap is reached.
fn append_capped(body: &mut Vec<u8>, chunk: &[u8], cap: usize) -> bool {
    let room = cap.saturating_sub(body.len());
    body.extend_from_slice(&chunk[..chunk.len().min(room)]);
    body.len() < cap
}
