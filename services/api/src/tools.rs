//! Hosts the robot's MCP tools inside the API process.
//!
//! The tool service runs on one end of an in-memory duplex pipe and an MCP
//! client holds the other, so HTTP callers reach the tools through the same
//! protocol a language model would.

use crate::models::{ToolCallResponse, ToolSummary};
use anyhow::{Context, Result};
use mint_core::tools::MintToolService;
use rmcp::{
    ServiceExt,
    model::{CallToolRequestParam, RawContent},
    service::{RoleClient, RunningService},
};
use serde_json::{Map, Value};
use tracing::{info, warn};

pub struct ToolGateway {
    client: RunningService<RoleClient, ()>,
    tools: Vec<ToolSummary>,
}

impl ToolGateway {
    /// Serves `service` in a background task and caches its tool list.
    pub async fn start(service: MintToolService) -> Result<Self> {
        let (server_transport, client_transport) = tokio::io::duplex(4096);
        tokio::spawn(async move {
            match service.serve(server_transport).await {
                Ok(service) => {
                    let _ = service.waiting().await;
                }
                Err(e) => warn!(error = %e, "tool service failed to start"),
            }
        });
        let client = ().serve(client_transport).await?;

        let tools = client
            .list_all_tools()
            .await?
            .into_iter()
            .map(|t| ToolSummary {
                name: t.name.to_string(),
                description: t.description.map(|d| d.to_string()).unwrap_or_default(),
                input_schema: Value::Object((*t.input_schema).clone()),
            })
            .collect::<Vec<_>>();
        info!(count = tools.len(), "tool service ready");
        Ok(Self { client, tools })
    }

    pub fn tools(&self) -> &[ToolSummary] {
        &self.tools
    }

    /// Calls a tool by name. `None` when no such tool exists.
    pub async fn call(
        &self,
        name: &str,
        arguments: Map<String, Value>,
    ) -> Result<Option<ToolCallResponse>> {
        if !self.tools.iter().any(|t| t.name == name) {
            return Ok(None);
        }
        let result = self
            .client
            .peer()
            .call_tool(CallToolRequestParam {
                name: name.to_string().into(),
                arguments: Some(arguments),
            })
            .await?;

        let content = result
            .content
            .context("Tool call returned no content")?
            .pop()
            .context("Content list was empty")?;
        let text = match content.raw {
            RawContent::Text(text_content) => text_content.text,
            _ => "Unexpected content type from tool".to_string(),
        };
        Ok(Some(ToolCallResponse {
            success: result.is_error != Some(true),
            text,
        }))
    }
}
