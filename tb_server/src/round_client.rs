//! HTTP round API client.
//!
//! One client type serves every environment; the base URL, token and game
//! code come from its [`EnvironmentConfig`].

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use table_bridge::round::{BroadcastNotice, RemoteStatus, RoundApi, StartedRound};
use table_bridge::EnvironmentConfig;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Round API client for one environment
pub struct HttpRoundClient {
    env: String,
    base_url: String,
    game_code: String,
    token: String,
    client: reqwest::Client,
}

#[derive(Debug, Serialize)]
struct DealRequest<'a> {
    round_id: &'a str,
    result: &'a str,
}

#[derive(Debug, Serialize)]
struct PauseRequest<'a> {
    reason: &'a str,
}

#[derive(Debug, Deserialize)]
struct StartResponse {
    round_id: String,
    #[serde(default)]
    bet_period: u32,
}

#[derive(Debug, Deserialize)]
struct StatusResponse {
    round_id: Option<String>,
    status: String,
    #[serde(default)]
    bet_period: u32,
}

impl HttpRoundClient {
    /// Create a new client for `config`
    pub fn new(config: &EnvironmentConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            env: config.name.clone(),
            base_url: config.base_url.clone(),
            game_code: config.game_code.clone(),
            token: config.token.clone(),
            client,
        })
    }

    fn endpoint(&self, operation: &str) -> String {
        format!(
            "{}/v1/tables/{}/round/{}",
            self.base_url, self.game_code, operation
        )
    }

    async fn post<B: Serialize + ?Sized>(&self, operation: &str, body: &B) -> Result<reqwest::Response> {
        let response = self
            .client
            .post(self.endpoint(operation))
            .bearer_auth(&self.token)
            .json(body)
            .send()
            .await
            .with_context(|| format!("Failed to send {} request to {}", operation, self.env))?;
        check(operation, &self.env, response).await
    }

    async fn post_json<B, T>(&self, operation: &str, body: &B) -> Result<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        self.post(operation, body)
            .await?
            .json()
            .await
            .with_context(|| format!("Failed to parse {} response from {}", operation, self.env))
    }
}

/// Turn a non-success status into an error carrying the response body
async fn check(operation: &str, env: &str, response: reqwest::Response) -> Result<reqwest::Response> {
    if response.status().is_success() {
        return Ok(response);
    }

    let status = response.status();
    let error_text = response
        .text()
        .await
        .unwrap_or_else(|e| format!("Failed to read error response: {}", e));
    anyhow::bail!("{} {} failed ({}): {}", env, operation, status, error_text);
}

#[async_trait]
impl RoundApi for HttpRoundClient {
    async fn start(&self) -> Result<StartedRound> {
        let response: StartResponse = self.post_json("start", &serde_json::json!({})).await?;
        Ok(StartedRound {
            round_id: response.round_id,
            bet_period: response.bet_period,
        })
    }

    async fn deal(&self, round_id: &str, result: &str) -> Result<()> {
        self.post("deal", &DealRequest { round_id, result }).await?;
        Ok(())
    }

    async fn bet_stop(&self) -> Result<()> {
        self.post("bet-stop", &serde_json::json!({})).await?;
        Ok(())
    }

    async fn finish(&self) -> Result<()> {
        self.post("finish", &serde_json::json!({})).await?;
        Ok(())
    }

    async fn broadcast(&self, notice: &BroadcastNotice) -> Result<()> {
        self.post("broadcast", notice).await?;
        Ok(())
    }

    async fn pause(&self, reason: &str) -> Result<()> {
        self.post("pause", &PauseRequest { reason }).await?;
        Ok(())
    }

    async fn cancel(&self) -> Result<()> {
        self.post("cancel", &serde_json::json!({})).await?;
        Ok(())
    }

    async fn get_status(&self) -> Result<RemoteStatus> {
        let response = self
            .client
            .get(self.endpoint("status"))
            .bearer_auth(&self.token)
            .send()
            .await
            .with_context(|| format!("Failed to send status request to {}", self.env))?;

        let status: StatusResponse = check("status", &self.env, response)
            .await?
            .json()
            .await
            .with_context(|| format!("Failed to parse status response from {}", self.env))?;

        Ok(RemoteStatus {
            round_id: status.round_id,
            status: status.status,
            bet_period: status.bet_period,
        })
    }
}
