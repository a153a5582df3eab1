//! 테스트 더블 - 결정적 임베더, 스크립트 채팅 모델, 호출 기록 인덱스

use std::sync::Mutex;

use async_trait::async_trait;

use crate::embedding::EmbeddingProvider;
use crate::error::{RagError, Result};
use crate::knowledge::{MemoryVectorIndex, VectorIndex, VectorMatch, VectorRecord};
use crate::llm::{ChatModel, ChatRequest};

/// 이 문자열이 들어간 텍스트는 임베딩 실패
pub const FAIL_MARKER: &str = "explode";

/// 토큰 해시 기반 bag-of-words 임베더
///
/// 같은 단어를 공유할수록 코사인 유사도가 높아집니다.
pub struct HashEmbedder {
    dimension: usize,
}

impl HashEmbedder {
    pub fn new(dimension: usize) -> Self {
        Self { dimension }
    }
}

/// FNV-1a
fn fnv1a(token: &str) -> u64 {
    token.bytes().fold(0xcbf29ce484222325u64, |hash, b| {
        (hash ^ b as u64).wrapping_mul(0x100000001b3)
    })
}

#[async_trait]
impl EmbeddingProvider for HashEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        if text.contains(FAIL_MARKER) {
            return Err(RagError::Api {
                service: "fake",
                status: 500,
                message: "embedding exploded".to_string(),
            });
        }

        let mut vector = vec![0.0f32; self.dimension];
        for token in text.split_whitespace() {
            let slot = (fnv1a(&token.to_lowercase()) % self.dimension as u64) as usize;
            vector[slot] += 1.0;
        }
        Ok(vector)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn name(&self) -> &str {
        "hash"
    }
}

/// 고정 답변을 돌려주고 받은 요청을 기록하는 채팅 모델
#[derive(Default)]
pub struct ScriptedChat {
    pub reply: String,
    pub fail: bool,
    pub requests: Mutex<Vec<ChatRequest>>,
}

impl ScriptedChat {
    pub fn replying(reply: &str) -> Self {
        Self {
            reply: reply.to_string(),
            ..Self::default()
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn last_request(&self) -> Option<ChatRequest> {
        self.requests.lock().unwrap().last().cloned()
    }
}

#[async_trait]
impl ChatModel for ScriptedChat {
    async fn chat_complete(&self, request: &ChatRequest) -> Result<String> {
        self.requests.lock().unwrap().push(request.clone());
        if self.fail {
            return Err(RagError::Connectivity {
                service: "fake",
                message: "connection refused".to_string(),
            });
        }
        Ok(self.reply.clone())
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

/// upsert 호출별 레코드 수를 기록하는 인덱스
#[derive(Default)]
pub struct RecordingIndex {
    pub inner: MemoryVectorIndex,
    pub upsert_sizes: Mutex<Vec<usize>>,
}

impl RecordingIndex {
    pub fn sizes(&self) -> Vec<usize> {
        self.upsert_sizes.lock().unwrap().clone()
    }
}

#[async_trait]
impl VectorIndex for RecordingIndex {
    async fn upsert(&self, records: &[VectorRecord]) -> Result<usize> {
        self.upsert_sizes.lock().unwrap().push(records.len());
        self.inner.upsert(records).await
    }

    async fn query(&self, vector: &[f32], top_k: usize) -> Result<Vec<VectorMatch>> {
        self.inner.query(vector, top_k).await
    }

    async fn delete_all(&self) -> Result<()> {
        self.inner.delete_all().await
    }

    async fn count(&self) -> Result<usize> {
        self.inner.count().await
    }

    fn name(&self) -> &'static str {
        "recording"
    }
}
