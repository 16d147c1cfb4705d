use anyhow::{Context, Result};
use reqwest::Client;
use serde::{Deserialize, Serialize};

/// System message that primes a fresh game session on the server.
pub const START_GAME_MESSAGE: &str = "START_GAME_INIT";

#[derive(Serialize)]
struct ChatRequest<'a> {
    message: &'a str,
}

/// Reply body of `POST /chat`
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ChatReply {
    pub response_text: String,
    pub agent_state: String,
}

#[derive(Clone)]
pub struct GiftHuntClient {
    client: Client,
    base_url: String,
}

impl GiftHuntClient {
    pub fn new(base_url: &str) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Post one message and decode the agent's reply.
    ///
    /// The server reports its own failures with a regular reply body (and a
    /// 5xx status), so the status only gets logged; the body decides.
    pub async fn chat(&self, message: &str) -> Result<ChatReply> {
        let url = format!("{}/chat", self.base_url);

        let response = self
            .client
            .post(&url)
            .json(&ChatRequest { message })
            .send()
            .await
            .with_context(|| format!("Could not reach the gift hunt server at {}", url))?;

        let status = response.status();
        if !status.is_success() {
            log::warn!("Chat request returned status {}", status);
        }

        let reply: ChatReply = response
            .json()
            .await
            .with_context(|| format!("Malformed reply from {} (status {})", url, status))?;

        log::debug!("Reply received, agent_state={}", reply.agent_state);
        Ok(reply)
    }
}
