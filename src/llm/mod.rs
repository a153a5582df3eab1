//! LLM 모듈 - OpenAI Chat Completions 응답 생성
//!
//! 조합된 프롬프트를 받아 답변 텍스트를 그대로 돌려줍니다.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::OpenAiSettings;
use crate::embedding::error_message;
use crate::error::{RagError, Result};

/// 기본 채팅 모델
pub const DEFAULT_CHAT_MODEL: &str = "gpt-4";

// ============================================================================
// Types
// ============================================================================

/// 채팅 완성 요청
#[derive(Debug, Clone, PartialEq)]
pub struct ChatRequest {
    pub system: String,
    pub user: String,
    pub temperature: f32,
    pub max_tokens: u32,
}

// ============================================================================
// ChatModel Trait
// ============================================================================

/// 응답 생성기 트레이트
#[async_trait]
pub trait ChatModel: Send + Sync {
    /// 시스템/사용자 프롬프트로 답변 생성
    async fn chat_complete(&self, request: &ChatRequest) -> Result<String>;

    /// 모델 이름
    fn name(&self) -> &str;
}

// ============================================================================
// OpenAI Chat
// ============================================================================

/// OpenAI Chat Completions 구현체
/// source: https://platform.openai.com/docs/api-reference/chat
#[derive(Debug)]
pub struct OpenAiChat {
    api_key: String,
    model: String,
    endpoint: String,
    client: reqwest::Client,
}

impl OpenAiChat {
    pub fn new(settings: &OpenAiSettings) -> Result<Self> {
        if settings.api_key.trim().is_empty() {
            return Err(RagError::InvalidInput("OpenAI API key is empty".to_string()));
        }

        let client = reqwest::Client::builder()
            .user_agent(concat!("travel-rag/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(120))
            .build()?;

        Ok(Self {
            api_key: settings.api_key.clone(),
            model: settings.chat_model.clone(),
            endpoint: settings.endpoint("chat/completions"),
            client,
        })
    }

    fn body<'a>(&'a self, request: &'a ChatRequest) -> CompletionRequest<'a> {
        CompletionRequest {
            model: &self.model,
            messages: vec![
                Message {
                    role: "system",
                    content: &request.system,
                },
                Message {
                    role: "user",
                    content: &request.user,
                },
            ],
            temperature: request.temperature,
            max_tokens: request.max_tokens,
        }
    }
}

#[derive(Debug, Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: Vec<Message<'a>>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Serialize)]
struct Message<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

#[async_trait]
impl ChatModel for OpenAiChat {
    async fn chat_complete(&self, request: &ChatRequest) -> Result<String> {
        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&self.body(request))
            .send()
            .await
            .map_err(|e| RagError::Connectivity {
                service: "OpenAI",
                message: e.to_string(),
            })?;

        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            return Err(RagError::api("OpenAI", status, &error_message(&text)));
        }

        let parsed: CompletionResponse = serde_json::from_str(&text)?;
        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| RagError::Api {
                service: "OpenAI",
                status: status.as_u16(),
                message: "empty completion".to_string(),
            })
    }

    fn name(&self) -> &str {
        &self.model
    }
}

// ============================================================================
// Tests
// ============================================================================
