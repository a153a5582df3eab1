//! travel-rag - 그래프 + 벡터 하이브리드 여행 RAG 어시스턴트
//!
//! 위치 그래프(Neo4j/SQLite)의 구조화된 정보와 벡터 인덱스(Pinecone/LanceDB)의
//! 여행 텍스트를 하나의 프롬프트로 합쳐 OpenAI 채팅 모델에 전달합니다.

pub mod assistant;
pub mod cli;
pub mod config;
pub mod embedding;
pub mod error;
pub mod knowledge;
pub mod llm;
pub mod text;

#[cfg(test)]
pub(crate) mod testing;

// Re-exports
pub use assistant::{ChatSession, ChatTurn, Role, TravelAssistant};
pub use config::{IdStrategy, PipelineConfig, Settings};
pub use embedding::{EmbeddingProvider, OpenAiEmbedding};
pub use error::{ConfigError, RagError, Result};
pub use knowledge::{
    ChunkRecord, FailurePolicy, GraphStore, LanceVectorIndex, Location, LocationLoader,
    MemoryVectorIndex, Neo4jGraphStore, PineconeClient, PineconeIndex, RelationshipType,
    SqliteGraphStore, TextIngestor, UpsertReport, VectorIndex, VectorStore,
};
pub use llm::{ChatModel, ChatRequest, OpenAiChat};
pub use text::{normalize, Chunker, WordChunker};
