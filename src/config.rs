//! 설정 모듈
//!
//! `.env` + 환경변수에서 서비스 접속 정보와 파이프라인 기본값을 읽습니다.
//! 필수 값이 빠지면 누락된 이름을 모두 모아 한 번에 보고합니다.

use std::path::PathBuf;
use std::str::FromStr;

use url::Url;

use crate::embedding::DEFAULT_EMBEDDING_MODEL;
use crate::error::{ConfigError, Result};
use crate::llm::DEFAULT_CHAT_MODEL;

/// 기본 Pinecone 인덱스 이름
pub const DEFAULT_INDEX_NAME: &str = "travel-knowledge";

const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";

// ============================================================================
// Data Directory
// ============================================================================

/// 로컬 백엔드 데이터 디렉토리 (~/.travel-rag/)
pub fn default_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .or_else(dirs::home_dir)
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".travel-rag")
}

// ============================================================================
// Pipeline Config
// ============================================================================

/// 벡터 ID 생성 전략
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IdStrategy {
    /// 입력 순서 기반 ("0", "1", ...)
    #[default]
    Sequential,
    /// 청크 내용의 SHA-256 (재인제스트 시 멱등)
    ContentHash,
}

impl FromStr for IdStrategy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sequential" => Ok(IdStrategy::Sequential),
            "content-hash" | "content_hash" | "hash" => Ok(IdStrategy::ContentHash),
            other => Err(format!("unknown id strategy '{}'", other)),
        }
    }
}

/// 파이프라인 설정 (각 어댑터 생성자에 전달)
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineConfig {
    /// 청크 최대 길이 (문자 수)
    pub chunk_size: usize,
    /// 벡터 upsert 배치 크기
    pub batch_size: usize,
    /// 검색 결과 개수
    pub top_k: usize,
    /// 임베딩 차원 (인덱스 수명 동안 고정)
    pub embedding_dim: usize,
    pub temperature: f32,
    pub max_tokens: u32,
    pub id_strategy: IdStrategy,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            chunk_size: 1000,
            batch_size: 50,
            top_k: 5,
            embedding_dim: 1536,
            temperature: 0.7,
            max_tokens: 500,
            id_strategy: IdStrategy::Sequential,
        }
    }
}

// ============================================================================
// Service Settings
// ============================================================================

/// OpenAI 접속 설정
#[derive(Debug, Clone)]
pub struct OpenAiSettings {
    pub api_key: String,
    pub chat_model: String,
    pub embedding_model: String,
    pub base_url: String,
}

impl Default for OpenAiSettings {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            chat_model: DEFAULT_CHAT_MODEL.to_string(),
            embedding_model: DEFAULT_EMBEDDING_MODEL.to_string(),
            base_url: OPENAI_BASE_URL.to_string(),
        }
    }
}

impl OpenAiSettings {
    /// API 경로 결합
    pub fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), path)
    }
}

/// 그래프 저장소 백엔드
#[derive(Debug, Clone)]
pub enum GraphSettings {
    Neo4j {
        uri: String,
        user: String,
        password: String,
    },
    Sqlite {
        path: PathBuf,
    },
}

/// 벡터 인덱스 백엔드
#[derive(Debug, Clone)]
pub enum VectorSettings {
    Pinecone {
        api_key: String,
        /// 서버리스 리전 (예: us-east-1)
        environment: String,
        cloud: String,
        index_name: String,
    },
    Lance {
        path: PathBuf,
    },
}

/// 전체 설정
#[derive(Debug, Clone)]
pub struct Settings {
    pub openai: OpenAiSettings,
    pub graph: GraphSettings,
    pub vector: VectorSettings,
    pub pipeline: PipelineConfig,
    /// 관계 타입 허용 목록 (None이면 형식 검사만)
    pub relationship_types: Option<Vec<String>>,
    pub data_dir: PathBuf,
}

impl Settings {
    /// `.env`와 프로세스 환경변수에서 로드
    pub fn from_env() -> Result<Self> {
        load_dotenv();
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// 임의의 조회 함수로 로드 (테스트용 주입 지점)
    ///
    /// 빈 문자열은 미설정으로 취급합니다.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let mut missing = Vec::new();
        let mut require = |name: &'static str| -> String {
            match get(name) {
                Some(value) => value,
                None => {
                    missing.push(name.to_string());
                    String::new()
                }
            }
        };

        let graph_backend = get("TRAVEL_RAG_GRAPH_BACKEND").unwrap_or_else(|| "neo4j".to_string());
        let vector_backend =
            get("TRAVEL_RAG_VECTOR_BACKEND").unwrap_or_else(|| "pinecone".to_string());

        let data_dir = get("TRAVEL_RAG_DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(default_data_dir);

        // 설정 문제는 모두 모아서 한 번에 보고
        let mut problems = Vec::new();

        let graph = match graph_backend.to_ascii_lowercase().as_str() {
            "neo4j" => Some(GraphSettings::Neo4j {
                uri: require("NEO4J_URI"),
                user: require("NEO4J_USER"),
                password: require("NEO4J_PASSWORD"),
            }),
            "sqlite" => Some(GraphSettings::Sqlite {
                path: data_dir.join("graph.db"),
            }),
            other => {
                problems.push(invalid(
                    "TRAVEL_RAG_GRAPH_BACKEND",
                    other,
                    "expected neo4j or sqlite",
                ));
                None
            }
        };

        let vector = match vector_backend.to_ascii_lowercase().as_str() {
            "pinecone" => Some(VectorSettings::Pinecone {
                api_key: require("PINECONE_API_KEY"),
                environment: require("PINECONE_ENVIRONMENT"),
                cloud: get("PINECONE_CLOUD").unwrap_or_else(|| "aws".to_string()),
                index_name: get("PINECONE_INDEX")
                    .unwrap_or_else(|| DEFAULT_INDEX_NAME.to_string()),
            }),
            "lance" => Some(VectorSettings::Lance {
                path: data_dir.join("vectors.lance"),
            }),
            other => {
                problems.push(invalid(
                    "TRAVEL_RAG_VECTOR_BACKEND",
                    other,
                    "expected pinecone or lance",
                ));
                None
            }
        };

        let api_key = require("OPENAI_API_KEY");

        if !missing.is_empty() {
            problems.insert(0, ConfigError::Missing(missing));
        }

        let base_url = get("OPENAI_BASE_URL").unwrap_or_else(|| OPENAI_BASE_URL.to_string());
        if let Err(e) = Url::parse(&base_url) {
            problems.push(invalid("OPENAI_BASE_URL", &base_url, &e.to_string()));
        }

        let pipeline = pipeline_from(&get).map_err(|e| problems.push(e)).ok();

        let (graph, vector, pipeline) = match (graph, vector, pipeline) {
            (Some(graph), Some(vector), Some(pipeline)) if problems.is_empty() => {
                (graph, vector, pipeline)
            }
            _ => return Err(ConfigError::combine(problems).into()),
        };

        let defaults = OpenAiSettings::default();
        let openai = OpenAiSettings {
            api_key,
            chat_model: get("OPENAI_CHAT_MODEL").unwrap_or(defaults.chat_model),
            embedding_model: get("OPENAI_EMBEDDING_MODEL").unwrap_or(defaults.embedding_model),
            base_url,
        };

        let relationship_types = get("TRAVEL_RAG_RELATIONSHIP_TYPES").map(|raw| {
            raw.split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect::<Vec<_>>()
        });

        Ok(Self {
            openai,
            graph,
            vector,
            pipeline,
            relationship_types,
            data_dir,
        })
    }
}

// ============================================================================
// Helper Functions
// ============================================================================

/// .env 로드 (현재 디렉토리 → 상위 디렉토리)
fn load_dotenv() {
    if dotenvy::dotenv().is_err() {
        let _ = dotenvy::from_filename("../.env");
    }
}

fn invalid(name: &str, value: &str, reason: &str) -> ConfigError {
    ConfigError::Invalid {
        name: name.to_string(),
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

/// 양수 값 파싱
fn positive<T>(
    get: &dyn Fn(&str) -> Option<String>,
    name: &str,
    default: T,
) -> std::result::Result<T, ConfigError>
where
    T: FromStr + PartialOrd + Default,
{
    match get(name) {
        None => Ok(default),
        Some(raw) => {
            let value: T = raw
                .trim()
                .parse()
                .map_err(|_| invalid(name, &raw, "not a number"))?;
            if value <= T::default() {
                return Err(invalid(name, &raw, "must be greater than zero"));
            }
            Ok(value)
        }
    }
}

fn pipeline_from(
    get: &dyn Fn(&str) -> Option<String>,
) -> std::result::Result<PipelineConfig, ConfigError> {
    let defaults = PipelineConfig::default();

    let temperature = match get("TRAVEL_RAG_TEMPERATURE") {
        None => defaults.temperature,
        Some(raw) => {
            let t: f32 = raw
                .trim()
                .parse()
                .map_err(|_| invalid("TRAVEL_RAG_TEMPERATURE", &raw, "not a number"))?;
            if !(0.0..=2.0).contains(&t) {
                return Err(invalid(
                    "TRAVEL_RAG_TEMPERATURE",
                    &raw,
                    "must be within 0.0..=2.0",
                ));
            }
            t
        }
    };

    let id_strategy = match get("TRAVEL_RAG_ID_STRATEGY") {
        None => defaults.id_strategy,
        Some(raw) => raw
            .parse()
            .map_err(|e: String| invalid("TRAVEL_RAG_ID_STRATEGY", &raw, &e))?,
    };

    Ok(PipelineConfig {
        chunk_size: positive(get, "TRAVEL_RAG_CHUNK_SIZE", defaults.chunk_size)?,
        batch_size: positive(get, "TRAVEL_RAG_BATCH_SIZE", defaults.batch_size)?,
        top_k: positive(get, "TRAVEL_RAG_TOP_K", defaults.top_k)?,
        embedding_dim: positive(get, "TRAVEL_RAG_EMBEDDING_DIM", defaults.embedding_dim)?,
        temperature,
        max_tokens: positive(get, "TRAVEL_RAG_MAX_TOKENS", defaults.max_tokens)?,
        id_strategy,
    })
}

// ============================================================================
// Tests
// ============================================================================
