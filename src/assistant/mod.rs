//! Assistant 모듈 - 그래프 + 벡터 컨텍스트 기반 답변
//!
//! 1. 질의 원문으로 위치 조회 (정확 일치)
//! 2. 벡터 검색 (top_k)
//! 3. 컨텍스트 조합 → 채팅 모델
//!
//! 호출마다 독립적이며 이전 대화는 전달하지 않습니다.

mod prompt;
mod session;

use std::sync::Arc;

use crate::config::PipelineConfig;
use crate::error::Result;
use crate::knowledge::{GraphStore, VectorStore};
use crate::llm::{ChatModel, ChatRequest};

pub use prompt::{compose_context, SYSTEM_PROMPT};
pub use session::{ChatSession, ChatTurn, Role};

/// 여행 어시스턴트 (검색 오케스트레이터)
pub struct TravelAssistant {
    graph: Arc<dyn GraphStore>,
    vectors: Arc<VectorStore>,
    chat: Arc<dyn ChatModel>,
    top_k: usize,
    temperature: f32,
    max_tokens: u32,
}

impl TravelAssistant {
    pub fn new(
        graph: Arc<dyn GraphStore>,
        vectors: Arc<VectorStore>,
        chat: Arc<dyn ChatModel>,
        config: &PipelineConfig,
    ) -> Self {
        tracing::debug!("Assistant: graph={}, chat={}", graph.name(), chat.name());

        Self {
            graph,
            vectors,
            chat,
            top_k: config.top_k,
            temperature: config.temperature,
            max_tokens: config.max_tokens,
        }
    }

    /// 검색 개수 변경
    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }

    /// 질의에 대한 프롬프트 생성 (모델 호출 없음)
    pub async fn build_request(&self, query: &str) -> Result<ChatRequest> {
        let location = self.graph.query_location(query).await?;
        if location.is_none() {
            tracing::debug!("No graph match for {:?}", query);
        }

        let chunks = self.vectors.query(query, self.top_k).await?;
        tracing::debug!("Retrieved {} chunks", chunks.len());

        Ok(ChatRequest {
            system: SYSTEM_PROMPT.to_string(),
            user: compose_context(query, location.as_ref(), &chunks),
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        })
    }

    /// 질의에 답변 (모델 출력 그대로 반환)
    pub async fn answer(&self, query: &str) -> Result<String> {
        let request = self.build_request(query).await?;
        self.chat.chat_complete(&request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::knowledge::{
        ChunkRecord, FailurePolicy, Location, MemoryVectorIndex, SqliteGraphStore, TRAVEL_INFO,
    };
    use crate::testing::{HashEmbedder, ScriptedChat};

    pub(super) async fn assistant(chat: Arc<ScriptedChat>) -> TravelAssistant {
        let config = PipelineConfig {
            embedding_dim: 32,
            ..PipelineConfig::default()
        };

        let graph = Arc::new(SqliteGraphStore::open_in_memory().unwrap());
        graph
            .create_location(&Location::new("Paris", "city", "France", "Capital of France"))
            .await
            .unwrap();

        let vectors = Arc::new(VectorStore::new(
            Arc::new(MemoryVectorIndex::new()),
            Arc::new(HashEmbedder::new(config.embedding_dim)),
            &config,
        ));
        vectors
            .upsert(
                &[
                    ChunkRecord::new("paris is lovely in spring", TRAVEL_INFO),
                    ChunkRecord::new("tokyo has great ramen", TRAVEL_INFO),
                ],
                FailurePolicy::Abort,
            )
            .await
            .unwrap();

        TravelAssistant::new(graph, vectors, chat, &config)
    }

    #[tokio::test]
    async fn test_answer_returns_model_text_verbatim() {
        let chat = Arc::new(ScriptedChat::replying("  Visit the Louvre.\n"));
        let assistant = assistant(chat.clone()).await;

        let answer = assistant.answer("Paris").await.unwrap();
        assert_eq!(answer, "  Visit the Louvre.\n");

        let request = chat.last_request().unwrap();
        assert_eq!(request.system, SYSTEM_PROMPT);
        assert_eq!(request.temperature, 0.7);
        assert_eq!(request.max_tokens, 500);
        assert!(request.user.starts_with("Graph Information: Paris (city, France)"));
        assert!(request.user.contains("paris is lovely in spring"));
        assert!(request.user.ends_with("User Query: Paris\n"));
    }

    #[tokio::test]
    async fn test_no_graph_match_still_answers() {
        let chat = Arc::new(ScriptedChat::replying("ok"));
        let assistant = assistant(chat.clone()).await;

        assistant.answer("Nowhereville").await.unwrap();
        let request = chat.last_request().unwrap();
        assert!(request.user.starts_with("Graph Information: none\n"));
    }

    #[tokio::test]
    async fn test_top_k_limits_context() {
        let chat = Arc::new(ScriptedChat::replying("ok"));
        let assistant = assistant(chat.clone()).await.with_top_k(1);

        let request = assistant.build_request("paris in spring").await.unwrap();
        assert_eq!(request.user.matches("- [travel_info]").count(), 1);
        assert!(request.user.contains("paris is lovely in spring"));
        assert!(chat.last_request().is_none());
    }

    #[tokio::test]
    async fn test_model_error_propagates() {
        let assistant = assistant(Arc::new(ScriptedChat::failing())).await;
        assert!(assistant.answer("Paris").await.is_err());
    }
}
