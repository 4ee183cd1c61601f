use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use crate::config::ProviderConfig;
use crate::error::{Result, SubdubError};

/// One prompt in, one reply text out
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ChatCompletion: Send + Sync {
    async fn complete(&self, prompt: &str, temperature: f32) -> Result<String>;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChatRequest {
    pub model: String,
    pub temperature: f32,
    pub messages: Vec<ChatMessage>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChatChoice {
    pub message: ChatMessage,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChatResponse {
    pub choices: Vec<ChatChoice>,
}

impl ChatResponse {
    pub fn into_content(self) -> Result<String> {
        self.choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .ok_or_else(|| SubdubError::Translation("Reply contained no choices".to_string()))
    }
}

/// OpenAI-compatible chat-completions client
pub struct HttpChatClient {
    client: Client,
    endpoint: String,
    model: String,
    api_key: String,
}

impl HttpChatClient {
    pub fn new(provider: &ProviderConfig, api_key: String, timeout: Duration) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            endpoint: provider.endpoint.clone(),
            model: provider.model.clone(),
            api_key,
        })
    }
}

#[async_trait]
impl ChatCompletion for HttpChatClient {
    async fn complete(&self, prompt: &str, temperature: f32) -> Result<String> {
        let request = ChatRequest {
            model: self.model.clone(),
            temperature,
            messages: vec![ChatMessage {
                role: "user".to_string(),
                content: prompt.to_string(),
            }],
        };

        debug!("Sending chat request to {} ({})", self.endpoint, self.model);

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(SubdubError::Translation(format!(
                "API error {}: {}",
                status, error_text
            )));
        }

        response.json::<ChatResponse>().await?.into_content()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_shape() {
        let request = ChatRequest {
            model: "deepseek-chat".to_string(),
            temperature: 1.0,
            messages: vec![ChatMessage {
                role: "user".to_string(),
                content: "hi".to_string(),
            }],
        };

        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["model"], "deepseek-chat");
        assert_eq!(value["temperature"], 1.0);
        assert_eq!(value["messages"][0]["role"], "user");
        assert_eq!(value["messages"][0]["content"], "hi");
    }

    #[test]
    fn test_reply_content_is_first_choice() {
        let reply: ChatResponse = serde_json::from_str(
            r#"{"id":"x","choices":[{"index":0,"message":{"role":"assistant","content":"你好"}}]}"#,
        )
        .unwrap();
        assert_eq!(reply.into_content().unwrap(), "你好");
    }

    #[test]
    fn test_reply_without_choices_is_an_error() {
        let reply: ChatResponse = serde_json::from_str(r#"{"choices":[]}"#).unwrap();
        assert!(matches!(reply.into_content(), Err(SubdubError::Translation(_))));
    }
}
