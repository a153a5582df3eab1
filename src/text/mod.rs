//! Text 모듈 - 정규화와 청킹
//!
//! 인제스트 전에 원문을 정리하고 임베딩 가능한 크기로 나눕니다.

mod chunker;
mod normalize;

pub use chunker::{Chunker, WordChunker, DEFAULT_CHUNK_SIZE};
pub use normalize::normalize;
