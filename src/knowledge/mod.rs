//! Knowledge 모듈 - 그래프 + 벡터 여행 지식 저장소
//!
//! - Graph: 위치 노드와 방향성 관계 (Neo4j / SQLite)
//! - Vector: 청크 임베딩 인덱스 (Pinecone / LanceDB / 메모리)
//! - VectorStore: 임베딩 + 배치 upsert 어댑터
//! - Ingest: 데이터셋 → 저장소 파이프라인

mod dataset;
mod graph;
mod ingest;
mod lance;
mod memory;
mod neo4j;
mod pinecone;
mod sqlite;
mod vector;
mod vector_store;

// Re-exports
pub use dataset::{parse_location_file, read_text_file};
pub use graph::{
    extract_relationships, Connection, GraphStats, GraphStore, Location, Relationship,
    RelationshipOutcome, RelationshipPolicy, RelationshipType, DEFAULT_RELATIONSHIP,
};
pub use ingest::{LocationLoader, RelationshipReport, TextIngestor};
pub use lance::LanceVectorIndex;
pub use memory::MemoryVectorIndex;
pub use neo4j::Neo4jGraphStore;
pub use pinecone::{IndexDescription, PineconeClient, PineconeIndex};
pub use sqlite::SqliteGraphStore;
pub use vector::{
    cosine_similarity, ChunkMetadata, ChunkRecord, VectorIndex, VectorMatch, VectorRecord,
    EMBEDDING_DIMENSION, TRAVEL_INFO,
};
pub use vector_store::{vector_id, BatchFailure, FailurePolicy, UpsertReport, VectorStore};
