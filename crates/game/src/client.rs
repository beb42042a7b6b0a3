//! Client side of the task/coupon API.

use async_trait::async_trait;
use deepsk_protocol::{
    routes, CompleteInput, CompleteOutput, Coupon, ErrorBody, LoginInput, LoginOutput, Task,
    TaskId, User,
};
use serde::de::DeserializeOwned;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("{message} (HTTP {status})")]
    Rejected { status: u16, message: String },
    #[error("unexpected response body: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("completion of task {0} is already in flight")]
    InFlight(TaskId),
}

impl ApiError {
    /// Message suitable for showing to the player.
    pub fn user_message(&self) -> String {
        match self {
            ApiError::Rejected { message, .. } => message.clone(),
            ApiError::InFlight(_) => "Already submitting, please wait".to_string(),
            ApiError::Transport(_) => "Network error, please try again".to_string(),
            ApiError::Decode(_) => "Unexpected server response".to_string(),
        }
    }
}

#[async_trait]
pub trait RewardApi: Send + Sync {
    /// Creates the user on first sight.
    async fn login(&self, username: &str) -> Result<User, ApiError>;

    async fn tasks(&self) -> Result<Vec<Task>, ApiError>;

    async fn complete_task(&self, task_id: TaskId, username: &str) -> Result<Coupon, ApiError>;

    async fn coupons(&self, username: &str) -> Result<Vec<Coupon>, ApiError>;
}

/// [`RewardApi`] over HTTP.
#[derive(Debug, Clone)]
pub struct HttpRewardClient {
    base_url: String,
    http: reqwest::Client,
}

impl HttpRewardClient {
    /// `base_url` is the server root, e.g. `http://127.0.0.1:3000`.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            http: reqwest::Client::new(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

async fn decode<T: DeserializeOwned>(resp: reqwest::Response) -> Result<T, ApiError> {
    let status = resp.status();
    let body = resp.bytes().await?;
    if status.is_success() {
        return Ok(serde_json::from_slice(&body)?);
    }
    let message = match serde_json::from_slice::<ErrorBody>(&body) {
        Ok(body) => body.error,
        Err(_) => status
            .canonical_reason()
            .unwrap_or("request failed")
            .to_string(),
    };
    Err(ApiError::Rejected {
        status: status.as_u16(),
        message,
    })
}

#[async_trait]
impl RewardApi for HttpRewardClient {
    async fn login(&self, username: &str) -> Result<User, ApiError> {
        let resp = self
            .http
            .post(self.url(routes::LOGIN))
            .json(&LoginInput {
                username: Some(username.to_string()),
            })
            .send()
            .await?;
        let out: LoginOutput = decode(resp).await?;
        Ok(out.user)
    }

    async fn tasks(&self) -> Result<Vec<Task>, ApiError> {
        let resp = self.http.get(self.url(routes::TASKS)).send().await?;
        decode(resp).await
    }

    async fn complete_task(&self, task_id: TaskId, username: &str) -> Result<Coupon, ApiError> {
        let resp = self
            .http
            .post(self.url(&routes::task_complete(task_id)))
            .json(&CompleteInput {
                username: Some(username.to_string()),
            })
            .send()
            .await?;
        let out: CompleteOutput = decode(resp).await?;
        Ok(out.coupon)
    }

    async fn coupons(&self, username: &str) -> Result<Vec<Coupon>, ApiError> {
        let resp = self
            .http
            .get(self.url(routes::COUPONS))
            .query(&[("username", username)])
            .send()
            .await?;
        decode(resp).await
    }
}
