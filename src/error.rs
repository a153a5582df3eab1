//! 에러 타입
//!
//! 라이브러리 전체에서 사용하는 `RagError`와 설정 에러 `ConfigError`.
//! 바이너리 경계(main, cli)에서는 anyhow로 감싸서 출력합니다.

use std::path::PathBuf;

use thiserror::Error;

/// 설정 에러 (시작 단계에서 치명적)
#[derive(Debug, Error)]
pub enum ConfigError {
    /// 필수 환경변수 누락 (누락된 이름 전부)
    #[error("Missing environment variables: {}", .0.join(", "))]
    Missing(Vec<String>),

    /// 값 형식 오류
    #[error("Invalid value for {name}: {value:?} ({reason})")]
    Invalid {
        name: String,
        value: String,
        reason: String,
    },

    /// 여러 문제 (누락 + 형식 오류)
    #[error("{}", .0.iter().map(|e| e.to_string()).collect::<Vec<_>>().join("; "))]
    Multiple(Vec<ConfigError>),
}

impl ConfigError {
    /// 문제 목록을 하나의 에러로 (하나면 그대로)
    pub(crate) fn combine(mut problems: Vec<ConfigError>) -> Self {
        if problems.len() == 1 {
            if let Some(problem) = problems.pop() {
                return problem;
            }
        }
        ConfigError::Multiple(problems)
    }
}

/// travel-rag 에러
#[derive(Debug, Error)]
pub enum RagError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// 서비스 연결 실패 또는 인증 거부
    #[error("Failed to connect to {service}: {message}")]
    Connectivity {
        service: &'static str,
        message: String,
    },

    /// 서비스가 요청을 거부함 (HTTP 에러 응답)
    #[error("{service} API error ({status}): {message}")]
    Api {
        service: &'static str,
        status: u16,
        message: String,
    },

    /// 입력 파일 형식 오류
    #[error("Invalid data in {}: {message}", path.display())]
    DataFormat { path: PathBuf, message: String },

    #[error("Failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// 인제스트 배치 실패 (이전 배치는 이미 저장됨)
    #[error("Batch {batch}/{batches} failed after {persisted} records were persisted: {source}")]
    BatchFailed {
        batch: usize,
        batches: usize,
        persisted: usize,
        #[source]
        source: Box<RagError>,
    },

    #[error("Invalid relationship type: {0:?}")]
    InvalidRelationshipType(String),

    #[error("Embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Neo4j error: {0}")]
    Graph(#[from] neo4rs::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// LanceDB/Arrow 등 컨텍스트가 붙은 백엔드 에러
    #[error(transparent)]
    Backend(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, RagError>;

impl RagError {
    /// 서비스 에러 응답을 RagError로 변환
    pub(crate) fn api(service: &'static str, status: reqwest::StatusCode, body: &str) -> Self {
        RagError::Api {
            service,
            status: status.as_u16(),
            message: body.trim().to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_lists_every_name() {
        let err = ConfigError::Missing(vec![
            "NEO4J_URI".to_string(),
            "PINECONE_API_KEY".to_string(),
        ]);
        assert_eq!(
            err.to_string(),
            "Missing environment variables: NEO4J_URI, PINECONE_API_KEY"
        );
    }

    #[test]
    fn test_multiple_joins_messages() {
        let err = ConfigError::combine(vec![
            ConfigError::Missing(vec!["OPENAI_API_KEY".to_string()]),
            ConfigError::Invalid {
                name: "TRAVEL_RAG_VECTOR_BACKEND".to_string(),
                value: "faiss".to_string(),
                reason: "expected pinecone or lance".to_string(),
            },
        ]);
        let msg = err.to_string();
        assert!(msg.starts_with("Missing environment variables: OPENAI_API_KEY; "));
        assert!(msg.contains("TRAVEL_RAG_VECTOR_BACKEND"));

        let single = ConfigError::combine(vec![ConfigError::Missing(vec!["X".to_string()])]);
        assert!(matches!(single, ConfigError::Missing(_)));
    }

    #[test]
    fn test_batch_failed_keeps_source() {
        let err = RagError::BatchFailed {
            batch: 2,
            batches: 3,
            persisted: 50,
            source: Box::new(RagError::InvalidInput("boom".to_string())),
        };
        let msg = err.to_string();
        assert!(msg.contains("Batch 2/3"));
        assert!(msg.contains("boom"));
    }

    #[test]
    fn test_data_format_names_file() {
        let err = RagError::DataFormat {
            path: PathBuf::from("data/locations.json"),
            message: "expected value".to_string(),
        };
        assert!(err.to_string().contains("data/locations.json"));
    }
}
