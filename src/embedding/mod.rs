//! 임베딩 모듈 - OpenAI API를 통한 텍스트 벡터화
//!
//! 텍스트를 고정 차원 벡터로 변환합니다. 인제스트(청크)와 검색(쿼리) 양쪽에서 사용합니다.
//!
//! ## 사용법
//! ```rust,ignore
//! let embedder = OpenAiEmbedding::new(&settings.openai, 1536)?;
//! let embedding = embedder.embed("Paris travel tips").await?;
//! ```

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::OpenAiSettings;
use crate::error::{RagError, Result};

// ============================================================================
// EmbeddingProvider Trait
// ============================================================================

/// 임베딩 프로바이더 트레이트
///
/// 텍스트를 벡터로 변환하는 인터페이스입니다.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// 단일 텍스트 임베딩
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// 임베딩 차원 수
    fn dimension(&self) -> usize;

    /// 프로바이더 이름
    fn name(&self) -> &str;
}

// ============================================================================
// OpenAI Embedding
// ============================================================================

/// 기본 임베딩 모델 (1536 차원)
/// source: https://platform.openai.com/docs/guides/embeddings
pub const DEFAULT_EMBEDDING_MODEL: &str = "text-embedding-ada-002";

/// 429/5xx 에러 시 최대 재시도 횟수
const MAX_RETRIES: u32 = 3;
/// 재시도 시 초기 백오프 (ms)
const INITIAL_BACKOFF_MS: u64 = 2000;

/// OpenAI 임베딩 구현체
#[derive(Debug)]
pub struct OpenAiEmbedding {
    api_key: String,
    model: String,
    endpoint: String,
    client: reqwest::Client,
    dimension: usize,
}

impl OpenAiEmbedding {
    /// 설정에서 생성
    ///
    /// # Arguments
    /// * `settings` - OpenAI 설정 (API 키, 모델, base URL)
    /// * `dimension` - 기대 임베딩 차원 (응답 검증용)
    pub fn new(settings: &OpenAiSettings, dimension: usize) -> Result<Self> {
        if settings.api_key.trim().is_empty() {
            return Err(RagError::InvalidInput("OpenAI API key is empty".to_string()));
        }

        let client = reqwest::Client::builder()
            .user_agent(concat!("travel-rag/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            api_key: settings.api_key.clone(),
            model: settings.embedding_model.clone(),
            endpoint: settings.endpoint("embeddings"),
            client,
            dimension,
        })
    }
}

/// OpenAI API 요청 본문
#[derive(Debug, Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    input: &'a str,
}

/// OpenAI API 응답
#[derive(Debug, Deserialize)]
struct EmbedResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}

/// OpenAI API 에러 응답
#[derive(Debug, Deserialize)]
pub(crate) struct OpenAiError {
    pub(crate) error: OpenAiErrorDetail,
}

#[derive(Debug, Deserialize)]
pub(crate) struct OpenAiErrorDetail {
    pub(crate) message: String,
}

/// 에러 응답 본문에서 메시지 추출
pub(crate) fn error_message(body: &str) -> String {
    serde_json::from_str::<OpenAiError>(body)
        .map(|e| e.error.message)
        .unwrap_or_else(|_| body.to_string())
}

/// 재시도 대상 상태 코드 여부
fn is_retryable(status: reqwest::StatusCode) -> bool {
    status.as_u16() == 429 || status.is_server_error()
}

#[async_trait]
impl EmbeddingProvider for OpenAiEmbedding {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        if text.trim().is_empty() {
            return Err(RagError::InvalidInput("cannot embed empty text".to_string()));
        }

        let request = EmbedRequest {
            model: &self.model,
            input: text,
        };

        let mut last_error: Option<RagError> = None;

        // 재시도 루프 (429/5xx 시 지수 백오프)
        for attempt in 0..=MAX_RETRIES {
            let response = match self
                .client
                .post(&self.endpoint)
                .bearer_auth(&self.api_key)
                .json(&request)
                .send()
                .await
            {
                Ok(resp) => resp,
                Err(e) => {
                    last_error = Some(RagError::Connectivity {
                        service: "OpenAI",
                        message: e.to_string(),
                    });
                    if attempt < MAX_RETRIES {
                        let backoff = Duration::from_millis(INITIAL_BACKOFF_MS * 2u64.pow(attempt));
                        tracing::warn!(
                            "Embedding request failed, retrying in {:?} (attempt {}/{})",
                            backoff,
                            attempt + 1,
                            MAX_RETRIES
                        );
                        tokio::time::sleep(backoff).await;
                        continue;
                    }
                    break;
                }
            };

            let status = response.status();
            let body = response.text().await?;

            if status.is_success() {
                let parsed: EmbedResponse = serde_json::from_str(&body)?;
                let embedding = parsed
                    .data
                    .into_iter()
                    .next()
                    .map(|d| d.embedding)
                    .ok_or_else(|| RagError::Api {
                        service: "OpenAI",
                        status: status.as_u16(),
                        message: "embedding response contained no data".to_string(),
                    })?;

                if embedding.len() != self.dimension {
                    return Err(RagError::DimensionMismatch {
                        expected: self.dimension,
                        actual: embedding.len(),
                    });
                }
                return Ok(embedding);
            }

            let message = error_message(&body);
            if is_retryable(status) && attempt < MAX_RETRIES {
                let backoff = Duration::from_millis(INITIAL_BACKOFF_MS * 2u64.pow(attempt));
                tracing::warn!(
                    "OpenAI embeddings returned {}, backing off {:?} (attempt {}/{})",
                    status,
                    backoff,
                    attempt + 1,
                    MAX_RETRIES
                );
                last_error = Some(RagError::api("OpenAI", status, &message));
                tokio::time::sleep(backoff).await;
                continue;
            }

            return Err(RagError::api("OpenAI", status, &message));
        }

        Err(last_error.unwrap_or_else(|| {
            RagError::InvalidInput(format!("Embedding failed after {} retries", MAX_RETRIES))
        }))
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn name(&self) -> &str {
        &self.model
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(key: &str) -> OpenAiSettings {
        OpenAiSettings {
            api_key: key.to_string(),
            ..OpenAiSettings::default()
        }
    }

    #[test]
    fn test_empty_key_rejected() {
        let result = OpenAiEmbedding::new(&settings("  "), 1536);
        assert!(matches!(result, Err(RagError::InvalidInput(_))));
    }

    #[test]
    fn test_endpoint_from_settings() {
        let embedder = OpenAiEmbedding::new(&settings("sk-test"), 1536).unwrap();
        assert_eq!(embedder.endpoint, "https://api.openai.com/v1/embeddings");
        assert_eq!(embedder.name(), DEFAULT_EMBEDDING_MODEL);
        assert_eq!(embedder.dimension(), 1536);
    }

    #[tokio::test]
    async fn test_embed_empty_text_is_error() {
        let embedder = OpenAiEmbedding::new(&settings("sk-test"), 1536).unwrap();
        let result = embedder.embed("   ").await;
        assert!(matches!(result, Err(RagError::InvalidInput(_))));
    }

    #[test]
    fn test_error_message_parsing() {
        let body = r#"{"error": {
            "message": "Incorrect API key provided",
            "type": "invalid_request_error"
        }}"#;
        assert_eq!(error_message(body), "Incorrect API key provided");
        assert_eq!(error_message("gateway timeout"), "gateway timeout");
    }

    #[test]
    fn test_response_parsing() {
        let body = r#"{
            "object": "list",
            "data": [{"object": "embedding", "index": 0, "embedding": [0.1, -0.2, 0.3]}],
            "model": "text-embedding-ada-002"
        }"#;
        let parsed: EmbedResponse = serde_json::from_str(body).unwrap();
        assert_eq!(parsed.data[0].embedding, vec![0.1, -0.2, 0.3]);
    }

    #[test]
    fn test_retryable_statuses() {
        assert!(is_retryable(reqwest::StatusCode::TOO_MANY_REQUESTS));
        assert!(is_retryable(reqwest::StatusCode::BAD_GATEWAY));
        assert!(!is_retryable(reqwest::StatusCode::UNAUTHORIZED));
    }
}
