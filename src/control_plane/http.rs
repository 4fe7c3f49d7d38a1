//! HTTP/JSON gateway client for the control plane.
//!
//! Routes are relative to the configured endpoint and grouped by agent collection
//! (`sessions` for connected agents, `beacons` for store-and-forward agents).
//! Supports an optional bearer token.

use super::contract::{ControlPlane, DispatchReply, WorkItem};
use crate::agent::{Agent, AgentInfo, AgentKind};
use crate::config::ControlPlaneConfig;
use crate::dispatch::{Command, DispatchRequest};
use crate::error::FleetError;
use crate::types::TaskId;
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

#[derive(Serialize)]
struct TaskRequest<'a> {
    command: &'a Command,
    timeout_secs: u64,
    #[serde(rename = "async")]
    asynchronous: bool,
}

#[derive(Deserialize)]
struct QueuedTask {
    task_id: TaskId,
}

#[derive(Serialize)]
struct RenameRequest<'a> {
    name: &'a str,
}

/// Control-plane client over the JSON gateway
#[derive(Clone)]
pub struct HttpControlPlane {
    client: Client,
    endpoint: String,
    token: Option<String>,
}

impl HttpControlPlane {
    pub fn new(config: &ControlPlaneConfig) -> Result<Self, FleetError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| FleetError::control_plane("Failed to build HTTP client", e))?;
        Ok(Self {
            client,
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            token: config.token.clone(),
        })
    }

    fn collection_url(&self, kind: AgentKind) -> String {
        format!("{}/{}", self.endpoint, kind.collection())
    }

    fn agent_url(&self, agent: &Agent, suffix: &str) -> String {
        format!(
            "{}/{}/{}",
            self.collection_url(agent.kind()),
            agent.id(),
            suffix
        )
    }

    fn authorize(&self, req: RequestBuilder) -> RequestBuilder {
        match &self.token {
            Some(token) => req.bearer_auth(token),
            None => req,
        }
    }

    async fn send(&self, req: RequestBuilder, context: &str) -> Result<Response, FleetError> {
        let resp = self
            .authorize(req)
            .send()
            .await
            .map_err(|e| FleetError::control_plane(context, e))?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(FleetError::ControlPlane(format!(
                "{}: HTTP {} {}",
                context,
                status.as_u16(),
                body.trim()
            )));
        }
        Ok(resp)
    }
}

#[async_trait]
impl ControlPlane for HttpControlPlane {
    async fn list_agents(&self, kind: AgentKind) -> Result<Vec<Agent>, FleetError> {
        let url = self.collection_url(kind);
        debug!(url = %url, "Listing agents");
        let resp = self.send(self.client.get(&url), "list agents").await?;
        let infos: Vec<AgentInfo> = resp
            .json()
            .await
            .map_err(|e| FleetError::control_plane("decode agent list", e))?;
        Ok(infos.into_iter().map(|info| Agent::new(kind, info)).collect())
    }

    async fn dispatch(&self, request: &DispatchRequest) -> Result<DispatchReply, FleetError> {
        let url = self.agent_url(&request.agent, "tasks");
        let body = TaskRequest {
            command: &request.command,
            timeout_secs: request.timeout.as_secs(),
            asynchronous: request.asynchronous,
        };
        let resp = self
            .send(self.client.post(&url).json(&body), "dispatch")
            .await?;

        if request.asynchronous {
            let queued: QueuedTask = resp
                .json()
                .await
                .map_err(|e| FleetError::control_plane("decode dispatch reply", e))?;
            Ok(DispatchReply::Queued(queued.task_id))
        } else {
            let bytes = resp
                .bytes()
                .await
                .map_err(|e| FleetError::control_plane("read dispatch reply", e))?;
            Ok(DispatchReply::Immediate(bytes.to_vec()))
        }
    }

    async fn list_work_items(&self, agent: &Agent) -> Result<Vec<WorkItem>, FleetError> {
        let url = self.agent_url(agent, "tasks");
        let resp = self.send(self.client.get(&url), "list work items").await?;
        resp.json()
            .await
            .map_err(|e| FleetError::control_plane("decode work items", e))
    }

    async fn fetch_payload(&self, agent: &Agent, item: &WorkItem) -> Result<Vec<u8>, FleetError> {
        let url = self.agent_url(agent, &format!("tasks/{}/content", item.id));
        let resp = self.send(self.client.get(&url), "fetch payload").await?;
        let bytes = resp
            .bytes()
            .await
            .map_err(|e| FleetError::control_plane("read payload", e))?;
        Ok(bytes.to_vec())
    }

    async fn rename(&self, agent: &Agent, name: &str) -> Result<(), FleetError> {
        let url = self.agent_url(agent, "rename");
        self.send(
            self.client.post(&url).json(&RenameRequest { name }),
            "rename",
        )
        .await?;
        Ok(())
    }
}
