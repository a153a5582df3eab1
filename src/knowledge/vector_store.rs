//! Vector Store - 임베딩 + 배치 upsert + 텍스트 검색 어댑터
//!
//! 청크 레코드를 임베딩해서 고정 크기 배치로 인덱스에 씁니다.
//! 배치는 순차 실행되며, 실패한 배치는 그 배치만 실패합니다 (전체 트랜잭션 없음).

use std::sync::Arc;

use sha2::{Digest, Sha256};

use crate::config::{IdStrategy, PipelineConfig};
use crate::embedding::EmbeddingProvider;
use crate::error::{RagError, Result};

use super::vector::{ChunkMetadata, ChunkRecord, VectorIndex, VectorMatch, VectorRecord};

// ============================================================================
// Types
// ============================================================================

/// 배치 실패 시 동작
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FailurePolicy {
    /// 첫 실패에서 중단 (`RagError::BatchFailed`)
    #[default]
    Abort,
    /// 실패를 리포트에 기록하고 다음 배치 진행
    Continue,
}

/// 실패한 배치 정보
#[derive(Debug, Clone)]
pub struct BatchFailure {
    /// 1-based 배치 번호
    pub batch: usize,
    /// 배치의 레코드 수
    pub records: usize,
    pub error: String,
}

/// upsert 결과
#[derive(Debug, Clone, Default)]
pub struct UpsertReport {
    pub upserted: usize,
    pub batches: usize,
    pub failed: Vec<BatchFailure>,
}

impl UpsertReport {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

// ============================================================================
// VectorStore
// ============================================================================

/// 벡터 저장소 어댑터
pub struct VectorStore {
    index: Arc<dyn VectorIndex>,
    embedder: Arc<dyn EmbeddingProvider>,
    batch_size: usize,
    embedding_dim: usize,
    id_strategy: IdStrategy,
}

impl VectorStore {
    pub fn new(
        index: Arc<dyn VectorIndex>,
        embedder: Arc<dyn EmbeddingProvider>,
        config: &PipelineConfig,
    ) -> Self {
        if embedder.dimension() != config.embedding_dim {
            tracing::warn!(
                "Embedder {} produces {} dimensions, index expects {}",
                embedder.name(),
                embedder.dimension(),
                config.embedding_dim
            );
        }
        tracing::debug!("Vector store: index={}, embedder={}", index.name(), embedder.name());

        Self {
            index,
            embedder,
            batch_size: config.batch_size.max(1),
            embedding_dim: config.embedding_dim,
            id_strategy: config.id_strategy,
        }
    }

    /// 레코드 upsert
    ///
    /// 배치마다 레코드를 임베딩한 뒤 한 번의 `VectorIndex::upsert`로 씁니다.
    /// 자동 재시도는 하지 않습니다.
    pub async fn upsert(
        &self,
        records: &[ChunkRecord],
        policy: FailurePolicy,
    ) -> Result<UpsertReport> {
        let batches = records.len().div_ceil(self.batch_size);
        let mut report = UpsertReport {
            batches,
            ..UpsertReport::default()
        };

        for (i, batch) in records.chunks(self.batch_size).enumerate() {
            let offset = i * self.batch_size;

            match self.upsert_batch(offset, batch).await {
                Ok(count) => {
                    report.upserted += count;
                    tracing::info!("Upserted batch {}/{} ({} records)", i + 1, batches, count);
                }
                Err(e) => {
                    tracing::error!("Batch {}/{} failed: {}", i + 1, batches, e);
                    match policy {
                        FailurePolicy::Abort => {
                            return Err(RagError::BatchFailed {
                                batch: i + 1,
                                batches,
                                persisted: report.upserted,
                                source: Box::new(e),
                            });
                        }
                        FailurePolicy::Continue => report.failed.push(BatchFailure {
                            batch: i + 1,
                            records: batch.len(),
                            error: e.to_string(),
                        }),
                    }
                }
            }
        }

        Ok(report)
    }

    /// 배치 하나 임베딩 + upsert
    async fn upsert_batch(&self, offset: usize, batch: &[ChunkRecord]) -> Result<usize> {
        let mut vectors = Vec::with_capacity(batch.len());

        for (i, record) in batch.iter().enumerate() {
            let values = self.embed_checked(&record.content).await?;
            vectors.push(VectorRecord {
                id: vector_id(self.id_strategy, offset + i, record),
                values,
                metadata: record.clone(),
            });
        }

        self.index.upsert(&vectors).await
    }

    /// 텍스트와 가장 유사한 청크 메타데이터 (유사도 내림차순, 최대 `top_k`개)
    pub async fn query(&self, text: &str, top_k: usize) -> Result<Vec<ChunkMetadata>> {
        Ok(self
            .query_matches(text, top_k)
            .await?
            .into_iter()
            .map(|m| m.metadata)
            .collect())
    }

    /// 점수 포함 검색
    pub async fn query_matches(&self, text: &str, top_k: usize) -> Result<Vec<VectorMatch>> {
        if top_k == 0 {
            return Ok(vec![]);
        }

        let vector = self.embed_checked(text).await?;
        let mut matches = self.index.query(&vector, top_k).await?;
        matches.truncate(top_k);
        Ok(matches)
    }

    async fn embed_checked(&self, text: &str) -> Result<Vec<f32>> {
        let values = self.embedder.embed(text).await?;
        if values.len() != self.embedding_dim {
            return Err(RagError::DimensionMismatch {
                expected: self.embedding_dim,
                actual: values.len(),
            });
        }
        Ok(values)
    }
}

/// 레코드 ID 생성
///
/// - Sequential: 입력 내 위치
/// - ContentHash: sha256(type || 0x00 || content) hex
pub fn vector_id(strategy: IdStrategy, position: usize, record: &ChunkRecord) -> String {
    match strategy {
        IdStrategy::Sequential => position.to_string(),
        IdStrategy::ContentHash => {
            let mut hasher = Sha256::new();
            hasher.update(record.kind.as_bytes());
            hasher.update([0u8]);
            hasher.update(record.content.as_bytes());
            format!("{:x}", hasher.finalize())
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
