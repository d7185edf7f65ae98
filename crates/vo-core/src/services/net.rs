use std::time::Duration;

use async_trait::async_trait;
use tokio::net::TcpStream;

use crate::error::{OpsError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HttpOutcome {
    pub ok: bool,
    /// `None` when the request never produced a response.
    pub status: Option<u16>,
}

impl HttpOutcome {
    pub fn from_status(code: u16) -> Self {
        Self {
            ok: (200..400).contains(&code),
            status: Some(code),
        }
    }

    pub fn unreachable() -> Self {
        Self {
            ok: false,
            status: None,
        }
    }
}

/// Network checks used by the prober and the deploy health poll.
#[async_trait]
pub trait NetProbe: Send + Sync {
    async fn port_open(&self, port: u16, timeout: Duration) -> bool;
    async fn http_get(&self, url: &str, timeout: Duration) -> HttpOutcome;
}

pub struct LiveNet {
    client: reqwest::Client,
}

impl LiveNet {
    pub fn new() -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("vo/", env!("CARGO_PKG_VERSION")))
            .redirect(reqwest::redirect::Policy::limited(10))
            .build()
            .map_err(|e| OpsError::Command(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl NetProbe for LiveNet {
    async fn port_open(&self, port: u16, timeout: Duration) -> bool {
        matches!(
            tokio::time::timeout(timeout, TcpStream::connect(("127.0.0.1", port))).await,
            Ok(Ok(_))
        )
    }

    async fn http_get(&self, url: &str, timeout: Duration) -> HttpOutcome {
        match self.client.get(url).timeout(timeout).send().await {
            Ok(response) => HttpOutcome::from_status(response.status().as_u16()),
            Err(e) => {
                tracing::debug!(url, error = %e, "http probe failed");
                HttpOutcome::unreachable()
            }
        }
    }
}
