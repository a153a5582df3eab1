//! Vector Index - 벡터 검색 트레이트 및 유틸리티
//!
//! Pinecone(원격), LanceDB(로컬), 메모리 구현이 이 트레이트를 따릅니다.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// 벡터 임베딩 차원 (text-embedding-ada-002)
/// source: https://platform.openai.com/docs/guides/embeddings
pub const EMBEDDING_DIMENSION: usize = 1536;

/// 여행 정보 청크 타입 태그
pub const TRAVEL_INFO: &str = "travel_info";

// ============================================================================
// Types
// ============================================================================

/// 인제스트 입력 레코드
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkRecord {
    pub content: String,
    #[serde(rename = "type")]
    pub kind: String,
}

impl ChunkRecord {
    pub fn new(content: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            kind: kind.into(),
        }
    }
}

/// 인덱스에 저장되는 메타데이터 (두 번째 조회 없이 컨텍스트 제공)
pub type ChunkMetadata = ChunkRecord;

/// 벡터 엔트리 (저장용)
#[derive(Debug, Clone)]
pub struct VectorRecord {
    pub id: String,
    pub values: Vec<f32>,
    pub metadata: ChunkMetadata,
}

/// 검색 결과
#[derive(Debug, Clone)]
pub struct VectorMatch {
    pub id: String,
    /// 코사인 유사도 (높을수록 유사)
    pub score: f32,
    pub metadata: ChunkMetadata,
}

// ============================================================================
// VectorIndex Trait
// ============================================================================

/// VectorIndex 트레이트 (async)
///
/// 벡터 저장소의 공통 인터페이스입니다. `query`는 유사도 내림차순으로
/// 최대 `top_k`개를 반환합니다.
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// 벡터 배치 upsert (같은 id는 덮어씀)
    async fn upsert(&self, records: &[VectorRecord]) -> Result<usize>;

    /// 최근접 이웃 검색
    async fn query(&self, vector: &[f32], top_k: usize) -> Result<Vec<VectorMatch>>;

    /// 전체 삭제
    async fn delete_all(&self) -> Result<()>;

    /// 벡터 개수 조회
    async fn count(&self) -> Result<usize>;

    /// 백엔드 이름
    fn name(&self) -> &'static str;
}

// ============================================================================
// Utility Functions
// ============================================================================

/// 코사인 유사도 계산
///
/// 결과는 -1.0 ~ 1.0 범위입니다. 길이가 다르거나 영벡터면 0.0.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot_product / (norm_a * norm_b)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cosine_similarity_same() {
        let a = vec![1.0, 0.0, 0.0];
        let b = vec![1.0, 0.0, 0.0];
        assert!((cosine_similarity(&a, &b) - 1.0).abs() < 0.0001);
    }

    #[test]
    fn test_cosine_similarity_orthogonal() {
        let a = vec![1.0, 0.0, 0.0];
        let c = vec![0.0, 1.0, 0.0];
        assert!((cosine_similarity(&a, &c) - 0.0).abs() < 0.0001);
    }

    #[test]
    fn test_cosine_similarity_opposite() {
        let a = vec![1.0, 0.0, 0.0];
        let d = vec![-1.0, 0.0, 0.0];
        assert!((cosine_similarity(&a, &d) - -1.0).abs() < 0.0001);
    }

    #[test]
    fn test_cosine_similarity_mismatched() {
        assert_eq!(cosine_similarity(&[], &[]), 0.0);
        assert_eq!(cosine_similarity(&[1.0], &[1.0, 0.0]), 0.0);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]), 0.0);
    }

    #[test]
    fn test_metadata_serializes_type_field() {
        let record = ChunkRecord::new("eiffel tower at night", TRAVEL_INFO);
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["content"], "eiffel tower at night");
        assert_eq!(json["type"], "travel_info");
    }
}
