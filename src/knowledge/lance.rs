//! LanceDB Vector Index - 로컬 벡터 검색
//!
//! 관리형 서비스 없이 동작하는 로컬 백엔드입니다.
//! ref: https://lancedb.github.io/lancedb/

use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use arrow_array::{
    Array, FixedSizeListArray, Float32Array, RecordBatch, RecordBatchIterator, StringArray,
};
use arrow_schema::{DataType, Field, Schema};
use async_trait::async_trait;
use futures::TryStreamExt;
use lancedb::connection::Connection;
use lancedb::query::{ExecutableQuery, QueryBase};
use lancedb::DistanceType;

use crate::error::{RagError, Result};

use super::vector::{ChunkRecord, VectorIndex, VectorMatch, VectorRecord};

/// 벡터 테이블 이름
const TABLE_NAME: &str = "chunks";

// ============================================================================
// LanceVectorIndex
// ============================================================================

/// LanceDB 벡터 인덱스 구현
///
/// 스키마: `id`, `content`, `type`, `vector`(FixedSizeList<f32; dimension>)
pub struct LanceVectorIndex {
    db: Connection,
    dimension: i32,
}

impl LanceVectorIndex {
    /// LanceDB 저장소 열기
    ///
    /// # Arguments
    /// * `path` - .lance 디렉토리 경로
    /// * `dimension` - 임베딩 차원 (테이블 수명 동안 고정)
    pub async fn open(path: &Path, dimension: usize) -> Result<Self> {
        let index = Self::connect(path, dimension).await?;
        index.check_dimension().await?;
        Ok(index)
    }

    /// 기존 테이블을 버리고 빈 인덱스로 열기 (차원 변경용)
    pub async fn recreate(path: &Path, dimension: usize) -> Result<Self> {
        let index = Self::connect(path, dimension).await?;
        index.delete_all().await?;
        Ok(index)
    }

    async fn connect(path: &Path, dimension: usize) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.exists() {
                tokio::fs::create_dir_all(parent)
                    .await
                    .context("Failed to create LanceDB directory")?;
            }
        }

        let path_str = path
            .to_str()
            .ok_or_else(|| anyhow::anyhow!("Invalid path encoding"))?;

        let db = lancedb::connect(path_str)
            .execute()
            .await
            .context("Failed to connect to LanceDB")?;

        let dimension = i32::try_from(dimension).context("Embedding dimension too large")?;

        Ok(Self { db, dimension })
    }

    /// 벡터 테이블 스키마 생성
    fn create_schema(&self) -> Schema {
        Schema::new(vec![
            Field::new("id", DataType::Utf8, false),
            Field::new("content", DataType::Utf8, false),
            Field::new("type", DataType::Utf8, false),
            Field::new(
                "vector",
                DataType::FixedSizeList(
                    Arc::new(Field::new("item", DataType::Float32, true)),
                    self.dimension,
                ),
                false,
            ),
        ])
    }

    /// 레코드들을 Arrow RecordBatch로 변환
    fn records_to_batch(&self, records: &[VectorRecord]) -> Result<RecordBatch> {
        let ids: Vec<&str> = records.iter().map(|r| r.id.as_str()).collect();
        let contents: Vec<&str> = records.iter().map(|r| r.metadata.content.as_str()).collect();
        let kinds: Vec<&str> = records.iter().map(|r| r.metadata.kind.as_str()).collect();

        let flat: Vec<f32> = records
            .iter()
            .flat_map(|r| r.values.iter().copied())
            .collect();

        let field = Arc::new(Field::new("item", DataType::Float32, true));
        let vectors = FixedSizeListArray::try_new(
            field,
            self.dimension,
            Arc::new(Float32Array::from(flat)) as Arc<dyn Array>,
            None,
        )
        .context("Failed to create vector array")?;

        let batch = RecordBatch::try_new(
            Arc::new(self.create_schema()),
            vec![
                Arc::new(StringArray::from(ids)),
                Arc::new(StringArray::from(contents)),
                Arc::new(StringArray::from(kinds)),
                Arc::new(vectors),
            ],
        )
        .context("Failed to create RecordBatch")?;

        Ok(batch)
    }

    /// 테이블 존재 여부 확인
    async fn table_exists(&self) -> Result<bool> {
        contains_table(self.db.table_names().execute().await)
    }

    /// 기존 테이블의 벡터 차원이 요청과 같은지 확인
    async fn check_dimension(&self) -> Result<()> {
        if !self.table_exists().await? {
            return Ok(());
        }

        let schema = self
            .open_table()
            .await?
            .schema()
            .await
            .context("Failed to read table schema")?;

        let field = schema
            .field_with_name("vector")
            .context("Table has no vector column")?;

        match field.data_type() {
            DataType::FixedSizeList(_, size) if *size == self.dimension => Ok(()),
            DataType::FixedSizeList(_, size) => Err(RagError::DimensionMismatch {
                expected: self.dimension as usize,
                actual: (*size).max(0) as usize,
            }),
            other => Err(anyhow::anyhow!("Unexpected vector column type: {}", other).into()),
        }
    }

    async fn open_table(&self) -> Result<lancedb::table::Table> {
        let table = self
            .db
            .open_table(TABLE_NAME)
            .execute()
            .await
            .context("Failed to open table")?;
        Ok(table)
    }
}

#[async_trait]
impl VectorIndex for LanceVectorIndex {
    async fn upsert(&self, records: &[VectorRecord]) -> Result<usize> {
        if records.is_empty() {
            return Ok(0);
        }

        let batch = self.records_to_batch(records)?;
        let schema = batch.schema();
        let batches = RecordBatchIterator::new(vec![Ok(batch)], schema);

        if self.table_exists().await? {
            // id 기준 merge-insert (있으면 갱신, 없으면 삽입)
            let table = self.open_table().await?;
            let mut merge = table.merge_insert(&["id"]);
            merge.when_matched_update_all(None).when_not_matched_insert_all();
            merge
                .execute(Box::new(batches))
                .await
                .context("Failed to upsert vectors")?;
        } else {
            self.db
                .create_table(TABLE_NAME, batches)
                .execute()
                .await
                .context("Failed to create table")?;
        }

        Ok(records.len())
    }

    async fn query(&self, vector: &[f32], top_k: usize) -> Result<Vec<VectorMatch>> {
        if top_k == 0 || !self.table_exists().await? {
            return Ok(vec![]);
        }

        let table = self.open_table().await?;

        let stream = table
            .vector_search(vector.to_vec())
            .context("Failed to create vector search")?
            .distance_type(DistanceType::Cosine)
            .limit(top_k)
            .execute()
            .await
            .context("Failed to execute vector search")?;

        let batches: Vec<RecordBatch> = stream
            .try_collect()
            .await
            .context("Failed to read search results")?;

        let mut matches = Vec::new();

        for batch in batches {
            let ids = string_column(&batch, "id")?;
            let contents = string_column(&batch, "content")?;
            let kinds = string_column(&batch, "type")?;

            // _distance 컬럼 (LanceDB가 자동 추가)
            let distances = batch
                .column_by_name("_distance")
                .and_then(|c| c.as_any().downcast_ref::<Float32Array>())
                .ok_or_else(|| anyhow::anyhow!("Missing _distance column"))?;

            for i in 0..batch.num_rows() {
                matches.push(VectorMatch {
                    id: ids.value(i).to_string(),
                    // 코사인 거리 -> 코사인 유사도
                    score: 1.0 - distances.value(i),
                    metadata: ChunkRecord::new(contents.value(i), kinds.value(i)),
                });
            }
        }

        matches.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        matches.truncate(top_k);
        Ok(matches)
    }

    async fn delete_all(&self) -> Result<()> {
        if !self.table_exists().await? {
            return Ok(());
        }

        self.db
            .drop_table(TABLE_NAME)
            .await
            .context("Failed to drop table")?;
        Ok(())
    }

    async fn count(&self) -> Result<usize> {
        if !self.table_exists().await? {
            return Ok(0);
        }

        let table = self.open_table().await?;
        let count = table.count_rows(None).await.context("Failed to count rows")?;
        Ok(count)
    }

    fn name(&self) -> &'static str {
        "lance"
    }
}

fn contains_table(names: lancedb::Result<Vec<String>>) -> Result<bool> {
    let names = names.context("Failed to list LanceDB tables")?;
    Ok(names.iter().any(|n| n == TABLE_NAME))
}

fn string_column<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a StringArray> {
    let column = batch
        .column_by_name(name)
        .and_then(|c| c.as_any().downcast_ref::<StringArray>())
        .ok_or_else(|| anyhow::anyhow!("Missing {} column", name))?;
    Ok(column)
}

// ============================================================================
// Tests
// ============================================================================
