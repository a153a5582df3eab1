//! Text Chunking Module
//!
//! 공백 단위 토큰을 누적해 최대 길이 이하의 청크로 나눕니다.
//! 의미 단위 분할은 하지 않습니다.

/// 기본 청크 크기 (문자 수)
pub const DEFAULT_CHUNK_SIZE: usize = 1000;

// ============================================================================
// Chunker Trait
// ============================================================================

/// 텍스트 청킹 전략 트레이트
pub trait Chunker: Send + Sync {
    /// 텍스트를 청크로 분할
    fn chunk(&self, text: &str) -> Vec<String>;

    /// 청커 이름
    fn name(&self) -> &'static str;
}

// ============================================================================
// WordChunker
// ============================================================================

/// 단어 누적 청커
///
/// 토큰은 `current_length + len(token) + 1 <= max_size`일 때만 현재 청크에 붙습니다.
/// `max_size`보다 긴 토큰 하나는 자르지 않고 단독 청크가 됩니다.
#[derive(Debug, Clone)]
pub struct WordChunker {
    max_size: usize,
}

impl WordChunker {
    /// 최대 크기로 생성
    pub fn new(max_size: usize) -> Self {
        Self { max_size }
    }

    /// 기본 설정으로 생성
    pub fn with_defaults() -> Self {
        Self::new(DEFAULT_CHUNK_SIZE)
    }

    pub fn max_size(&self) -> usize {
        self.max_size
    }
}

impl Default for WordChunker {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl Chunker for WordChunker {
    fn chunk(&self, text: &str) -> Vec<String> {
        let mut chunks = Vec::new();
        let mut current: Vec<&str> = Vec::new();
        // 현재 청크의 직렬화 길이 (단어 + 구분 공백)
        let mut current_length = 0usize;

        for word in text.split_whitespace() {
            let word_len = word.chars().count();

            if current.is_empty() {
                current.push(word);
                current_length = word_len;
            } else if current_length + word_len + 1 <= self.max_size {
                current.push(word);
                current_length += word_len + 1;
            } else {
                chunks.push(current.join(" "));
                current.clear();
                current.push(word);
                current_length = word_len;
            }
        }

        if !current.is_empty() {
            chunks.push(current.join(" "));
        }

        chunks
    }

    fn name(&self) -> &'static str {
        "WordChunker"
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "This is a long text that needs to be chunked into smaller pieces";

    #[test]
    fn test_chunker_empty() {
        let chunker = WordChunker::new(20);
        assert!(chunker.chunk("").is_empty());
        assert!(chunker.chunk("  \n\t ").is_empty());
    }

    #[test]
    fn test_chunker_bounded() {
        let chunks = WordChunker::new(20).chunk(SAMPLE);
        assert!(!chunks.is_empty());
        assert!(chunks.iter().all(|c| c.chars().count() <= 20));
    }

    #[test]
    fn test_chunker_exact_output() {
        let chunks = WordChunker::new(20).chunk(SAMPLE);
        assert_eq!(
            chunks,
            vec![
                "This is a long text",
                "that needs to be",
                "chunked into smaller",
                "pieces",
            ]
        );
    }

    #[test]
    fn test_chunker_reconstructs_tokens() {
        let text = "  alpha beta\tgamma\n\ndelta epsilon zeta eta theta iota kappa  ";
        for size in [1, 5, 10, 16, 1000] {
            let chunks = WordChunker::new(size).chunk(text);
            let rejoined = chunks.join(" ");
            let original: Vec<&str> = text.split_whitespace().collect();
            let rebuilt: Vec<&str> = rejoined.split_whitespace().collect();
            assert_eq!(original, rebuilt, "size {}", size);
        }
    }

    #[test]
    fn test_chunker_oversized_token() {
        let chunks = WordChunker::new(5).chunk("a supercalifragilistic b");
        assert_eq!(chunks, vec!["a", "supercalifragilistic", "b"]);

        for chunk in &chunks {
            let len = chunk.chars().count();
            assert!(len <= 5 || !chunk.contains(' '));
        }
    }

    #[test]
    fn test_chunker_oversized_first_token() {
        let chunks = WordChunker::new(3).chunk("abcdefgh ij");
        assert_eq!(chunks, vec!["abcdefgh", "ij"]);
    }

    #[test]
    fn test_chunker_single_chunk() {
        let chunks = WordChunker::with_defaults().chunk("short text");
        assert_eq!(chunks, vec!["short text"]);
    }

    #[test]
    fn test_chunker_deterministic() {
        let chunker = WordChunker::new(12);
        assert_eq!(chunker.chunk(SAMPLE), chunker.chunk(SAMPLE));
    }

    #[test]
    fn test_chunker_counts_chars_not_bytes() {
        // 4글자 단어 두 개 + 공백 = 9문자 (바이트로는 25)
        let chunks = WordChunker::new(9).chunk("여행정보 도시안내");
        assert_eq!(chunks.len(), 1);
    }
}
