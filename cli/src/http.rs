//! HTTP implementation of the game server contract.

use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use reqwest::{Method, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tendrils_engine::remote::{
    ActionRequest, ActionResult, CreatedGame, GameApi, GameSummary, JoinReceipt, LogEntry,
    RemoteError, RemoteResult, ServerInfo, StartReceipt, StateView,
};
use tendrils_engine::CharacterSheet;

pub struct HttpApi {
    base_url: String,
    token: Option<String>,
    http: reqwest::Client,
}

impl HttpApi {
    pub fn new(base_url: &str, token: Option<String>, timeout: Duration) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("failed to build HTTP client")?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
            http,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let req = self
            .http
            .request(method, format!("{}{}", self.base_url, path));
        match &self.token {
            Some(token) => req.bearer_auth(token),
            None => req,
        }
    }

    async fn send<T: DeserializeOwned>(&self, req: RequestBuilder) -> RemoteResult<T> {
        let resp = req.send().await.map_err(|e| self.unreachable(e))?;
        let status = resp.status();
        let body = resp.text().await.map_err(|e| self.unreachable(e))?;
        tracing::debug!(%status, bytes = body.len(), "response");

        if status.is_client_error() || status.is_server_error() {
            return Err(RemoteError::Rejected {
                status: status.as_u16(),
                message: error_message(status, &body),
            });
        }
        serde_json::from_str(&body).map_err(|e| RemoteError::Decode(e.to_string()))
    }

    fn unreachable(&self, err: reqwest::Error) -> RemoteError {
        RemoteError::Connectivity {
            url: self.base_url.clone(),
            detail: err.to_string(),
        }
    }
}

/// Pull a human-readable message out of an error body, leaving the server's wording intact.
pub fn error_message(status: StatusCode, body: &str) -> String {
    let Ok(json) = serde_json::from_str::<Value>(body) else {
        return if body.trim().is_empty() {
            format!("HTTP {}", status.as_u16())
        } else {
            body.to_string()
        };
    };
    match (json.get("detail"), json.get("message")) {
        (Some(Value::Array(items)), _) => items
            .iter()
            .map(|item| match item.get("msg").and_then(Value::as_str) {
                Some(msg) => msg.to_string(),
                None => item.to_string(),
            })
            .collect::<Vec<_>>()
            .join("; "),
        (Some(Value::String(detail)), _) => detail.clone(),
        (Some(detail), _) => detail.to_string(),
        (None, Some(Value::String(message))) => message.clone(),
        (None, Some(message)) => message.to_string(),
        (None, None) => json.to_string(),
    }
}

#[async_trait]
impl GameApi for HttpApi {
    async fn ping(&self) -> RemoteResult<ServerInfo> {
        self.send(self.request(Method::GET, "/")).await
    }

    async fn create_game(&self, name: &str) -> RemoteResult<CreatedGame> {
        let body = serde_json::json!({ "name": name });
        self.send(self.request(Method::POST, "/games").json(&body))
            .await
    }

    async fn join_game(&self, game_id: &str, sheet: &CharacterSheet) -> RemoteResult<JoinReceipt> {
        let path = format!("/games/{game_id}/join");
        self.send(self.request(Method::POST, &path).json(sheet)).await
    }

    async fn start_game(&self, game_id: &str) -> RemoteResult<StartReceipt> {
        let path = format!("/games/{game_id}/start");
        self.send(self.request(Method::POST, &path)).await
    }

    async fn get_game(&self, game_id: &str) -> RemoteResult<GameSummary> {
        let path = format!("/games/{game_id}");
        self.send(self.request(Method::GET, &path)).await
    }

    async fn get_state(&self, game_id: &str, character_id: &str) -> RemoteResult<StateView> {
        let path = format!("/games/{game_id}/state");
        self.send(
            self.request(Method::GET, &path)
                .query(&[("character_id", character_id)]),
        )
        .await
    }

    async fn submit_action(
        &self,
        game_id: &str,
        action: &ActionRequest,
    ) -> RemoteResult<ActionResult> {
        let path = format!("/games/{game_id}/action");
        self.send(self.request(Method::POST, &path).json(action))
            .await
    }

    async fn get_log(&self, game_id: &str) -> RemoteResult<Vec<LogEntry>> {
        let path = format!("/games/{game_id}/log");
        self.send(self.request(Method::GET, &path)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detail_string_is_passed_through() {
        let body = r#"{"detail": "Position out of movement range"}"#;
        assert_eq!(
            error_message(StatusCode::BAD_REQUEST, body),
            "Position out of movement range"
        );
    }

    #[test]
    fn validation_details_are_joined() {
        let body = r#"{"detail": [{"msg": "field required"}, {"msg": "value is not an integer"}]}"#;
        assert_eq!(
            error_message(StatusCode::UNPROCESSABLE_ENTITY, body),
            "field required; value is not an integer"
        );
    }

    #[test]
    fn message_key_and_plain_text_fallbacks() {
        assert_eq!(
            error_message(StatusCode::CONFLICT, r#"{"message": "Game already started"}"#),
            "Game already started"
        );
        assert_eq!(
            error_message(StatusCode::BAD_GATEWAY, "upstream down"),
            "upstream down"
        );
        assert_eq!(error_message(StatusCode::NOT_FOUND, "  "), "HTTP 404");
    }

    #[test]
    fn trailing_slash_is_trimmed() {
        let api = HttpApi::new("http://localhost:8000/", None, Duration::from_secs(1)).unwrap();
        assert_eq!(api.base_url(), "http://localhost:8000");
    }
}
