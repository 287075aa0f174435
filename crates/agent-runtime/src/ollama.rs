//! Ollama LLM Provider
//!
//! Implementation of `LlmProvider` for local Ollama inference.

use std::time::Duration;

use agent_core::{
    error::{AgentError, Result},
    message::{Message, Role},
    provider::{Completion, FinishReason, GenerationOptions, LlmProvider, ModelInfo, TokenUsage},
};
use async_trait::async_trait;
use ollama_rs::{
    Ollama,
    error::OllamaError,
    generation::chat::{ChatMessage, ChatMessageResponse, MessageRole, request::ChatMessageRequest},
    models::ModelOptions,
};
use serde::{Deserialize, Serialize};

/// Ollama provider configuration
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OllamaConfig {
    /// Ollama host URL
    pub host: String,

    /// Ollama port
    pub port: u16,

    /// Upper bound for a single chat call in seconds
    pub timeout_secs: u64,
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            host: "http://localhost".into(),
            port: 11434,
            timeout_secs: 90,
        }
    }
}

impl OllamaConfig {
    /// Base URL, for logs
    pub fn url(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Ollama LLM provider
pub struct OllamaProvider {
    client: Ollama,
    config: OllamaConfig,
}

impl OllamaProvider {
    /// Create a new Ollama provider with custom host/port
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self::from_config(OllamaConfig {
            host: host.into(),
            port,
            ..Default::default()
        })
    }

    /// Create from configuration
    pub fn from_config(config: OllamaConfig) -> Self {
        Self {
            client: Ollama::new(config.host.clone(), config.port),
            config,
        }
    }

    pub const fn config(&self) -> &OllamaConfig {
        &self.config
    }

    /// Convert agent messages to Ollama format
    fn convert_messages(messages: &[Message]) -> Vec<ChatMessage> {
        messages
            .iter()
            .map(|m| {
                let role = match m.role {
                    Role::System => MessageRole::System,
                    Role::User | Role::Tool => MessageRole::User, // tool output is user-side context
                    Role::Assistant => MessageRole::Assistant,
                };
                ChatMessage::new(role, m.content.clone())
            })
            .collect()
    }

    /// Convert Ollama response to agent completion
    fn convert_completion(response: ChatMessageResponse, model: &str) -> Completion {
        let usage = response.final_data.as_ref().map(|d| {
            let prompt = u32::try_from(d.prompt_eval_count).unwrap_or(u32::MAX);
            let completion = u32::try_from(d.eval_count).unwrap_or(u32::MAX);
            TokenUsage {
                prompt_tokens: prompt,
                completion_tokens: completion,
                total_tokens: prompt.saturating_add(completion),
            }
        });

        Completion {
            content: response.message.content,
            model: model.to_string(),
            usage,
            finish_reason: Some(FinishReason::Stop),
        }
    }

    /// Build Ollama generation options
    fn build_options(opts: &GenerationOptions) -> ModelOptions {
        ModelOptions::default()
            .temperature(opts.temperature)
            .top_p(opts.top_p)
            .num_predict(i32::try_from(opts.max_tokens).unwrap_or(i32::MAX))
    }
}

/// Transport failures are retryable; an answer Ollama gave but we cannot use is not
fn classify_error(err: OllamaError) -> AgentError {
    match err {
        OllamaError::ReqwestError(e) if e.is_connect() || e.is_timeout() || e.is_request() => {
            AgentError::ProviderUnavailable(e.to_string())
        }
        other => AgentError::Provider(other.to_string()),
    }
}

#[async_trait]
impl LlmProvider for OllamaProvider {
    fn name(&self) -> &str {
        "Ollama"
    }

    async fn health_check(&self) -> Result<bool> {
        match self.client.list_local_models().await {
            Ok(_) => Ok(true),
            Err(e) => {
                tracing::warn!(url = %self.config.url(), "Ollama health check failed: {}", e);
                Ok(false)
            }
        }
    }

    async fn complete(&self, messages: &[Message], options: &GenerationOptions) -> Result<Completion> {
        let request = ChatMessageRequest::new(options.model.clone(), Self::convert_messages(messages))
            .options(Self::build_options(options));

        let limit = Duration::from_secs(self.config.timeout_secs);
        let response = tokio::time::timeout(limit, self.client.send_chat_messages(request))
            .await
            .map_err(|_| AgentError::ProviderUnavailable(format!("Ollama did not answer within {limit:?}")))?
            .map_err(classify_error)?;

        if response.message.content.trim().is_empty() {
            return Err(AgentError::Provider("Ollama returned an empty message".into()));
        }

        tracing::debug!(model = %options.model, "Ollama completion received");
        Ok(Self::convert_completion(response, &options.model))
    }

    async fn list_models(&self) -> Result<Vec<ModelInfo>> {
        let models = self
            .client
            .list_local_models()
            .await
            .map_err(classify_error)?;

        Ok(models
            .into_iter()
            .map(|m| ModelInfo {
                id: m.name.clone(),
                name: m.name,
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config = OllamaConfig::default();
        assert_eq!(config.host, "http://localhost");
        assert_eq!(config.port, 11434);
        assert_eq!(config.url(), "http://localhost:11434");
    }

    #[test]
    fn test_config_partial_yaml_shape() {
        let config: OllamaConfig = serde_json::from_str(r#"{"port": 11500}"#).unwrap();
        assert_eq!(config.port, 11500);
        assert_eq!(config.host, "http://localhost");
    }

    #[test]
    fn test_message_conversion() {
        let messages = vec![
            Message::system("You are a travel planner."),
            Message::user("Plan Lisbon"),
            Message::assistant("```tool\n{\"tool\":\"get_current_weather\"}\n```"),
            Message::tool("[Tool 'get_current_weather' returned]\n{}", "w1"),
        ];

        let converted = OllamaProvider::convert_messages(&messages);
        assert_eq!(converted.len(), 4);
        assert!(matches!(converted[3].role, MessageRole::User));
    }

    #[tokio::test]
    async fn test_unreachable_server_is_retryable() {
        // nothing listens on port 9 locally
        let provider = OllamaProvider::from_config(OllamaConfig {
            host: "http://127.0.0.1".into(),
            port: 9,
            timeout_secs: 2,
        });
        let err = provider
            .complete(&[Message::user("hi")], &GenerationOptions::default())
            .await
            .unwrap_err();
        assert!(err.is_retryable());
        assert!(!provider.health_check().await.unwrap());
    }

    /// Answers every connection with a 404 "model not found"
    async fn rejecting_server() -> u16 {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(async move {
            while let Ok((mut socket, _)) = listener.accept().await {
                let mut request = Vec::new();
                let mut buf = [0u8; 4096];
                loop {
                    let n = socket.read(&mut buf).await.unwrap_or(0);
                    if n == 0 {
                        break;
                    }
                    request.extend_from_slice(&buf[..n]);
                    let text = String::from_utf8_lossy(&request);
                    if let Some(head_end) = text.find("\r\n\r\n") {
                        let length = text[..head_end]
                            .lines()
                            .find_map(|l| {
                                let (name, value) = l.split_once(':')?;
                                name.eq_ignore_ascii_case("content-length")
                                    .then(|| value.trim().parse::<usize>().ok())?
                            })
                            .unwrap_or(0);
                        if request.len() >= head_end + 4 + length {
                            break;
                        }
                    }
                }
                let body = r#"{"error":"model 'no-such-model' not found"}"#;
                let response = format!(
                    "HTTP/1.1 404 Not Found\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
                    body.len()
                );
                let _ = socket.write_all(response.as_bytes()).await;
                let _ = socket.shutdown().await;
            }
        });
        port
    }

    #[tokio::test]
    async fn test_rejected_request_is_not_retryable() {
        let port = rejecting_server().await;
        let provider = OllamaProvider::new("http://127.0.0.1", port);
        let options = GenerationOptions {
            model: "no-such-model".into(),
            ..GenerationOptions::default()
        };

        let err = provider.complete(&[Message::user("hi")], &options).await.unwrap_err();
        assert!(matches!(err, AgentError::Provider(_)), "{err}");
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_error_classification() {
        let rejected = classify_error(OllamaError::Other("model 'x' not found".into()));
        assert!(matches!(rejected, AgentError::Provider(_)));
    }
}
