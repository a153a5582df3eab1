//! 인제스트 파이프라인
//!
//! - 위치: 이름 중복 제거 → 그래프 일괄 로드 → 관계 생성
//! - 텍스트: 정규화 → 청킹 → 임베딩 + 배치 upsert

use std::collections::HashSet;
use std::sync::Arc;

use crate::config::PipelineConfig;
use crate::error::Result;
use crate::text::{normalize, Chunker, WordChunker};

use super::graph::{
    extract_relationships, GraphStore, Location, RelationshipOutcome, RelationshipPolicy,
};
use super::vector::ChunkRecord;
use super::vector_store::{FailurePolicy, UpsertReport, VectorStore};

/// 관계 생성 결과
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RelationshipReport {
    pub created: usize,
    /// 끝점이 없어 건너뛴 (source, target)
    pub missing: Vec<(String, String)>,
}

/// 위치 데이터셋 → 그래프
pub struct LocationLoader {
    graph: Arc<dyn GraphStore>,
}

impl LocationLoader {
    pub fn new(graph: Arc<dyn GraphStore>) -> Self {
        Self { graph }
    }

    /// 위치 로드 (이름 기준 첫 항목 우선)
    ///
    /// 반환: 저장된 위치 수
    pub async fn load_locations(&self, locations: &[Location]) -> Result<usize> {
        let (unique, duplicates) = dedupe_by_name(locations);
        for name in &duplicates {
            tracing::warn!("Skipping duplicate location: {}", name);
        }

        let loaded = self.graph.load_batch(&unique).await?;
        tracing::info!("Loaded {} locations into {}", loaded, self.graph.name());
        Ok(loaded)
    }

    /// `connected_to`의 관계 생성
    ///
    /// 중복 이름은 `load_locations`와 같이 첫 항목의 `connected_to`만 사용합니다.
    /// 끝점이 없는 관계는 경고 후 건너뜁니다. 라벨 검증 실패는 아무것도 쓰기 전에 에러.
    pub async fn load_relationships(
        &self,
        locations: &[Location],
        policy: &RelationshipPolicy,
    ) -> Result<RelationshipReport> {
        let (unique, _) = dedupe_by_name(locations);
        let relationships = extract_relationships(&unique, policy)?;
        let mut report = RelationshipReport::default();

        for rel in &relationships {
            match self
                .graph
                .create_relationship(&rel.source, &rel.target, &rel.kind)
                .await?
            {
                RelationshipOutcome::Created => report.created += 1,
                RelationshipOutcome::MissingEndpoint => {
                    tracing::warn!(
                        "Relationship {} -[{}]-> {} skipped: endpoint not found",
                        rel.source,
                        rel.kind,
                        rel.target
                    );
                    report.missing.push((rel.source.clone(), rel.target.clone()));
                }
            }
        }

        tracing::info!(
            "Created {} relationships ({} missing endpoints)",
            report.created,
            report.missing.len()
        );
        Ok(report)
    }
}

/// 이름 기준 중복 제거 (첫 항목 우선), 건너뛴 이름도 반환
fn dedupe_by_name(locations: &[Location]) -> (Vec<Location>, Vec<String>) {
    let mut seen = HashSet::new();
    let mut unique = Vec::with_capacity(locations.len());
    let mut duplicates = Vec::new();

    for location in locations {
        if seen.insert(location.name.as_str()) {
            unique.push(location.clone());
        } else {
            duplicates.push(location.name.clone());
        }
    }

    (unique, duplicates)
}

/// 여행 텍스트 → 벡터 인덱스
pub struct TextIngestor {
    vectors: Arc<VectorStore>,
    chunker: WordChunker,
}

impl TextIngestor {
    pub fn new(vectors: Arc<VectorStore>, config: &PipelineConfig) -> Self {
        Self {
            vectors,
            chunker: WordChunker::new(config.chunk_size),
        }
    }

    /// 텍스트 → 청크 레코드
    pub fn prepare_chunks(&self, text: &str, kind: &str) -> Vec<ChunkRecord> {
        self.chunker
            .chunk(&normalize(text))
            .into_iter()
            .map(|content| ChunkRecord::new(content, kind))
            .collect()
    }

    /// 텍스트 인제스트
    pub async fn ingest_text(
        &self,
        text: &str,
        kind: &str,
        policy: FailurePolicy,
    ) -> Result<UpsertReport> {
        let records = self.prepare_chunks(text, kind);
        tracing::info!(
            "Ingesting {} chunks ({}, chunker={})",
            records.len(),
            kind,
            self.chunker.name()
        );
        self.vectors.upsert(&records, policy).await
    }
}

// ============================================================================
// Tests
// ============================================================================
