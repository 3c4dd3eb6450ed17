//! REST client for the test platform

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde_json::{json, Value};
use std::time::Duration;

use super::{CreatedGoal, StepApi, StepRequest};
use crate::common::config::ApiConfig;
use crate::common::{Error, Result};

/// Viewport used for goals created by this tool
const DEVICE_WIDTH: u32 = 1280;
const DEVICE_HEIGHT: u32 = 800;

/// [`StepApi`] over HTTPS with bearer-token authentication
pub struct HttpStepApi {
    client: Client,
    base_url: String,
    token: String,
    organization_id: Option<u64>,
}

impl HttpStepApi {
    /// Build a client from the `[api]` configuration section
    pub fn from_config(config: &ApiConfig) -> Result<Self> {
        let token = config
            .token
            .clone()
            .filter(|t| !t.is_empty())
            .ok_or_else(|| {
                Error::Config(
                    "no API token configured. Set STEPRUNNER_API_TOKEN or api.token, or use --dry-run"
                        .to_string(),
                )
            })?;

        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .user_agent(concat!("steprunner/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            token,
            organization_id: config.organization_id,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn post(&self, op: &str, path: &str, body: Value) -> Result<Value> {
        self.send(op, self.client.post(self.url(path)).json(&body)).await
    }

    async fn get(&self, op: &str, path: &str) -> Result<Value> {
        self.send(op, self.client.get(self.url(path))).await
    }

    async fn send(&self, op: &str, request: RequestBuilder) -> Result<Value> {
        tracing::debug!(op, "API request");
        let response = request
            .bearer_auth(&self.token)
            .header("Accept", "application/json")
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::warn!(op, status = status.as_u16(), "API request failed");
            return Err(Error::ApiStatus {
                status: status.as_u16(),
                body: error_message(&body),
            });
        }

        let value: Value = response.json().await?;
        if value.get("success") == Some(&Value::Bool(false)) {
            let reason = value
                .get("error")
                .and_then(Value::as_str)
                .unwrap_or("API returned success=false");
            return Err(Error::Api(format!("{op} failed: {reason}")));
        }
        Ok(value)
    }
}

#[async_trait]
impl StepApi for HttpStepApi {
    fn name(&self) -> &'static str {
        "http"
    }

    async fn create_project(&self, name: &str) -> Result<u64> {
        let organization_id = self.organization_id.ok_or_else(|| {
            Error::Config(
                "no organization configured. Set STEPRUNNER_ORG_ID or api.organization_id".to_string(),
            )
        })?;
        let value = self
            .post(
                "create project",
                "/projects",
                json!({ "name": name, "organizationId": organization_id }),
            )
            .await?;
        item_id(&value, "create project")
    }

    async fn create_goal(&self, project_id: u64, name: &str, url: &str) -> Result<CreatedGoal> {
        let value = self
            .post(
                "create goal",
                "/goals",
                json!({
                    "projectId": project_id,
                    "name": name,
                    "url": url,
                    "environmentId": null,
                    "deviceSize": { "width": DEVICE_WIDTH, "height": DEVICE_HEIGHT },
                    "meta": { "popupAutoDismiss": true },
                    "createFirstJourney": true,
                }),
            )
            .await?;
        Ok(CreatedGoal {
            goal_id: item_id(&value, "create goal")?,
            snapshot_id: item(&value).get("snapshotId").and_then(as_id),
        })
    }

    async fn goal_snapshot(&self, goal_id: u64) -> Result<u64> {
        let value = self
            .get("get goal snapshot", &format!("/goals/{goal_id}/versions"))
            .await?;
        item(&value)
            .get("snapshots")
            .and_then(Value::as_array)
            .and_then(|snapshots| snapshots.first())
            .and_then(|snapshot| snapshot.get("snapshotId"))
            .and_then(as_id)
            .ok_or_else(|| Error::Api(format!("no snapshots found for goal {goal_id}")))
    }

    async fn create_journey(&self, goal_id: u64, snapshot_id: u64, name: &str) -> Result<u64> {
        let value = self
            .post(
                "create journey",
                "/testsuites",
                json!({
                    "goalId": goal_id,
                    "snapshotId": snapshot_id,
                    "name": name,
                    "title": name,
                    "archived": false,
                    "draft": true,
                }),
            )
            .await?;
        item_id(&value, "create journey")
    }

    async fn create_checkpoint(
        &self,
        journey_id: u64,
        goal_id: u64,
        snapshot_id: u64,
        title: &str,
        position: u32,
    ) -> Result<u64> {
        let value = self
            .post(
                "create checkpoint",
                "/testcases",
                json!({ "goalId": goal_id, "snapshotId": snapshot_id, "title": title }),
            )
            .await?;
        let checkpoint_id = item_id(&value, "create checkpoint")?;

        self.post(
            "attach checkpoint",
            &format!("/testsuites/{journey_id}/checkpoints/attach"),
            json!({ "checkpointId": checkpoint_id, "position": position }),
        )
        .await?;
        Ok(checkpoint_id)
    }

    async fn create_step(
        &self,
        checkpoint_id: u64,
        request: &StepRequest,
        position: u32,
    ) -> Result<u64> {
        let value = self
            .post(
                "create step",
                "/teststeps?envelope=false",
                json!({
                    "checkpointId": checkpoint_id,
                    "stepIndex": position,
                    "parsedStep": request.parsed_step(),
                }),
            )
            .await?;
        item_id(&value, "create step")
    }

    async fn execute_goal(&self, goal_id: u64, snapshot_id: u64) -> Result<String> {
        let value = self
            .post(
                "execute goal",
                &format!("/goals/{goal_id}/snapshots/{snapshot_id}/execute"),
                json!({ "goalId": goal_id, "snapshotId": snapshot_id }),
            )
            .await?;
        match item(&value).get("id") {
            Some(Value::String(id)) => Ok(id.clone()),
            Some(Value::Number(id)) => Ok(id.to_string()),
            _ => Err(Error::Api("execute goal: response has no execution id".to_string())),
        }
    }
}

/// The `item` envelope when present, else the response itself
fn item(value: &Value) -> &Value {
    value.get("item").unwrap_or(value)
}

fn item_id(value: &Value, op: &str) -> Result<u64> {
    item(value)
        .get("id")
        .and_then(as_id)
        .ok_or_else(|| Error::Api(format!("{op}: response has no id")))
}

/// Ids arrive as numbers or numeric strings
fn as_id(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

/// Prefer the platform's own error text over the raw body
fn error_message(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| v.get("error").and_then(Value::as_str).map(str::to_string))
        .unwrap_or_else(|| body.trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_item_id_with_and_without_envelope() {
        assert_eq!(item_id(&json!({ "item": { "id": 7 } }), "x").unwrap(), 7);
        assert_eq!(item_id(&json!({ "id": "12" }), "x").unwrap(), 12);
        assert!(item_id(&json!({ "item": {} }), "x").is_err());
    }

    #[test]
    fn test_error_message_prefers_error_field() {
        assert_eq!(error_message(r#"{"error":"bad checkpoint"}"#), "bad checkpoint");
        assert_eq!(error_message("  gateway timeout \n"), "gateway timeout");
    }

    #[test]
    fn test_from_config_requires_token() {
        let config = ApiConfig::default();
        assert!(matches!(HttpStepApi::from_config(&config), Err(Error::Config(_))));

        let config = ApiConfig {
            token: Some("t".to_string()),
            base_url: "https://example.com/api/".to_string(),
            ..ApiConfig::default()
        };
        let api = HttpStepApi::from_config(&config).unwrap();
        assert_eq!(api.url("/projects"), "https://example.com/api/projects");
    }
}
