//! 메모리 벡터 인덱스 - 전수 코사인 검색
//!
//! 테스트와 어댑터 대체용. 프로세스가 끝나면 사라집니다.

use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::{RagError, Result};

use super::vector::{cosine_similarity, VectorIndex, VectorMatch, VectorRecord};

/// 메모리 벡터 인덱스
#[derive(Debug, Default)]
pub struct MemoryVectorIndex {
    // upsert 순서를 유지 (동점 시 먼저 들어온 것이 앞)
    records: Mutex<Vec<VectorRecord>>,
}

impl MemoryVectorIndex {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Vec<VectorRecord>>> {
        self.records
            .lock()
            .map_err(|e| RagError::Backend(anyhow::anyhow!("Lock error: {}", e)))
    }
}

#[async_trait]
impl VectorIndex for MemoryVectorIndex {
    async fn upsert(&self, records: &[VectorRecord]) -> Result<usize> {
        let mut stored = self.lock()?;

        for record in records {
            match stored.iter_mut().find(|r| r.id == record.id) {
                Some(existing) => *existing = record.clone(),
                None => stored.push(record.clone()),
            }
        }

        Ok(records.len())
    }

    async fn query(&self, vector: &[f32], top_k: usize) -> Result<Vec<VectorMatch>> {
        let stored = self.lock()?;

        let mut matches: Vec<VectorMatch> = stored
            .iter()
            .map(|r| VectorMatch {
                id: r.id.clone(),
                score: cosine_similarity(vector, &r.values),
                metadata: r.metadata.clone(),
            })
            .collect();

        // stable sort: 동점은 삽입 순서 유지
        matches.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        matches.truncate(top_k);

        Ok(matches)
    }

    async fn delete_all(&self) -> Result<()> {
        self.lock()?.clear();
        Ok(())
    }

    async fn count(&self) -> Result<usize> {
        Ok(self.lock()?.len())
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}
