//! Discovery notifications.
//!
//! Addresses found on agents are pushed to external collectors. A sink failure is
//! logged and never changes the outcome of a run.

use crate::agent::AgentKind;
use crate::config::NotifyConfig;
use crate::error::FleetError;
use async_trait::async_trait;
use parking_lot::Mutex;
use serde::Serialize;
use std::net::Ipv4Addr;
use std::time::Duration;
use tracing::{debug, warn};

/// Path appended to every collector base URL
pub const BOX_ACCESS_PATH: &str = "/pwn/boxaccess";

/// A non-loopback address observed on an agent
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Discovery {
    pub address: Ipv4Addr,
    pub agent_kind: AgentKind,
}

#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn notify(&self, discovery: &Discovery) -> Result<(), FleetError>;
}

#[derive(Debug, Serialize)]
struct BoxAccess<'a> {
    ip: String,
    #[serde(rename = "type")]
    source_type: &'a str,
}

/// Posts each discovery to every configured collector
pub struct HttpNotifySink {
    client: reqwest::Client,
    urls: Vec<String>,
    source_type: String,
}

impl HttpNotifySink {
    pub fn new(config: &NotifyConfig) -> Result<Self, FleetError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| FleetError::Notify(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self {
            client,
            urls: config
                .urls
                .iter()
                .map(|u| format!("{}{}", u.trim_end_matches('/'), BOX_ACCESS_PATH))
                .collect(),
            source_type: config.source_type.clone(),
        })
    }

    pub fn urls(&self) -> &[String] {
        &self.urls
    }

    async fn post(&self, url: &str, body: &BoxAccess<'_>) -> Result<(), FleetError> {
        let response = self
            .client
            .post(url)
            .json(body)
            .send()
            .await
            .map_err(|e| FleetError::Notify(format!("{}: {}", url, e)))?;
        let status = response.status();
        if !status.is_success() {
            return Err(FleetError::Notify(format!("{}: HTTP {}", url, status)));
        }
        Ok(())
    }
}

#[async_trait]
impl NotificationSink for HttpNotifySink {
    async fn notify(&self, discovery: &Discovery) -> Result<(), FleetError> {
        let body = BoxAccess {
            ip: discovery.address.to_string(),
            source_type: &self.source_type,
        };
        let mut failures = Vec::new();
        for url in &self.urls {
            match self.post(url, &body).await {
                Ok(()) => debug!(url = %url, ip = %body.ip, "Posted discovery"),
                Err(e) => {
                    warn!(url = %url, ip = %body.ip, error = %e, "Failed to post discovery");
                    failures.push(e.to_string());
                }
            }
        }
        if failures.is_empty() {
            Ok(())
        } else {
            Err(FleetError::Notify(format!(
                "{} of {} collectors failed: {}",
                failures.len(),
                self.urls.len(),
                failures.join("; ")
            )))
        }
    }
}

/// Records discoveries in memory
#[derive(Debug, Default)]
pub struct MemorySink {
    seen: Mutex<Vec<Discovery>>,
    failing: bool,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record every discovery but report failure for each
    pub fn failing() -> Self {
        Self {
            seen: Mutex::new(Vec::new()),
            failing: true,
        }
    }

    pub fn discoveries(&self) -> Vec<Discovery> {
        self.seen.lock().clone()
    }
}

#[async_trait]
impl NotificationSink for MemorySink {
    async fn notify(&self, discovery: &Discovery) -> Result<(), FleetError> {
        self.seen.lock().push(*discovery);
        if self.failing {
            return Err(FleetError::Notify("collector unavailable".to_string()));
        }
        Ok(())
    }
}
