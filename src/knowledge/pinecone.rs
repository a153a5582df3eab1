//! Pinecone Vector Index - REST API 어댑터
//!
//! 컨트롤 플레인(인덱스 생성/삭제/조회)과 데이터 플레인(upsert/query/delete)을
//! reqwest로 직접 호출합니다.
//! ref: https://docs.pinecone.io/reference/api/introduction

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{RagError, Result};

use super::vector::{ChunkMetadata, VectorIndex, VectorMatch, VectorRecord};

const CONTROL_PLANE_URL: &str = "https://api.pinecone.io";
const API_VERSION: &str = "2024-07";
const SERVICE: &str = "Pinecone";

/// 인덱스 준비 대기 (폴링 간격, 최대 횟수)
const READY_POLL_INTERVAL: Duration = Duration::from_secs(5);
const READY_MAX_ATTEMPTS: u32 = 36;

// ============================================================================
// Control Plane Types
// ============================================================================

/// 인덱스 정보
#[derive(Debug, Clone, Deserialize)]
pub struct IndexDescription {
    pub name: String,
    pub dimension: usize,
    pub metric: String,
    #[serde(default)]
    pub host: String,
    #[serde(default)]
    pub status: IndexStatus,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct IndexStatus {
    #[serde(default)]
    pub ready: bool,
    #[serde(default)]
    pub state: String,
}

#[derive(Debug, Deserialize)]
struct IndexList {
    #[serde(default)]
    indexes: Vec<IndexDescription>,
}

#[derive(Debug, Serialize)]
struct CreateIndexRequest<'a> {
    name: &'a str,
    dimension: usize,
    metric: &'a str,
    spec: IndexSpec<'a>,
}

#[derive(Debug, Serialize)]
struct IndexSpec<'a> {
    serverless: ServerlessSpec<'a>,
}

#[derive(Debug, Serialize)]
struct ServerlessSpec<'a> {
    cloud: &'a str,
    region: &'a str,
}

// ============================================================================
// PineconeClient (control plane)
// ============================================================================

/// Pinecone 컨트롤 플레인 클라이언트
pub struct PineconeClient {
    http: reqwest::Client,
    api_key: String,
    cloud: String,
    region: String,
    base_url: String,
    poll_interval: Duration,
}

impl PineconeClient {
    /// # Arguments
    /// * `api_key` - Pinecone API 키
    /// * `cloud` - 서버리스 클라우드 (aws, gcp, azure)
    /// * `region` - 리전 (PINECONE_ENVIRONMENT)
    pub fn new(api_key: &str, cloud: &str, region: &str) -> Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("travel-rag/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            http,
            api_key: api_key.to_string(),
            cloud: cloud.to_string(),
            region: region.to_string(),
            base_url: CONTROL_PLANE_URL.to_string(),
            poll_interval: READY_POLL_INTERVAL,
        })
    }

    fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        self.http
            .request(method, format!("{}{}", self.base_url, path))
            .header("Api-Key", &self.api_key)
            .header("X-Pinecone-API-Version", API_VERSION)
    }

    /// 인덱스 목록
    pub async fn list_indexes(&self) -> Result<Vec<IndexDescription>> {
        let response = send(self.request(reqwest::Method::GET, "/indexes")).await?;
        let list: IndexList = parse(response).await?;
        Ok(list.indexes)
    }

    /// 인덱스 조회 (없으면 None)
    pub async fn describe_index(&self, name: &str) -> Result<Option<IndexDescription>> {
        let response =
            send(self.request(reqwest::Method::GET, &format!("/indexes/{}", name))).await?;
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        parse(response).await.map(Some)
    }

    /// 인덱스 생성
    pub async fn create_index(&self, name: &str, dimension: usize, metric: &str) -> Result<()> {
        tracing::info!(
            "Creating Pinecone index '{}' (dimension={}, metric={})",
            name,
            dimension,
            metric
        );

        let body = CreateIndexRequest {
            name,
            dimension,
            metric,
            spec: IndexSpec {
                serverless: ServerlessSpec {
                    cloud: &self.cloud,
                    region: &self.region,
                },
            },
        };
        let response = send(self.request(reqwest::Method::POST, "/indexes").json(&body)).await?;
        check(response).await
    }

    /// 인덱스 삭제
    pub async fn delete_index(&self, name: &str) -> Result<()> {
        tracing::info!("Deleting Pinecone index '{}'", name);
        let response =
            send(self.request(reqwest::Method::DELETE, &format!("/indexes/{}", name))).await?;
        check(response).await
    }

    /// 인덱스 준비 보장
    ///
    /// - 없으면 생성, `recreate`면 삭제 후 생성
    /// - 기존 인덱스의 차원이 다르면 에러 (차원 변경은 새 인덱스가 필요)
    /// - ready 상태까지 폴링
    pub async fn ensure_index(
        &self,
        name: &str,
        dimension: usize,
        recreate: bool,
    ) -> Result<PineconeIndex> {
        let mut existing = self.describe_index(name).await?;

        if recreate && existing.is_some() {
            self.delete_index(name).await?;
            self.wait_until_deleted(name).await?;
            existing = None;
        }

        match existing {
            Some(desc) if desc.dimension != dimension => {
                return Err(RagError::DimensionMismatch {
                    expected: dimension,
                    actual: desc.dimension,
                });
            }
            Some(_) => tracing::debug!("Pinecone index '{}' already exists", name),
            None => self.create_index(name, dimension, "cosine").await?,
        }

        let desc = self.wait_until_ready(name).await?;
        self.index(&desc.host)
    }

    /// 기존 인덱스에 연결 (준비 대기 없음)
    pub async fn connect(&self, name: &str) -> Result<PineconeIndex> {
        let desc = self
            .describe_index(name)
            .await?
            .ok_or_else(|| RagError::Connectivity {
                service: SERVICE,
                message: format!(
                    "index '{}' does not exist; run `travel-rag setup` first",
                    name
                ),
            })?;
        self.index(&desc.host)
    }

    fn index(&self, host: &str) -> Result<PineconeIndex> {
        PineconeIndex::new(self.http.clone(), &self.api_key, host)
    }

    async fn wait_until_ready(&self, name: &str) -> Result<IndexDescription> {
        for attempt in 1..=READY_MAX_ATTEMPTS {
            if let Some(desc) = self.describe_index(name).await? {
                if desc.status.ready && !desc.host.is_empty() {
                    tracing::info!("Pinecone index '{}' is ready", name);
                    return Ok(desc);
                }
                tracing::debug!(
                    "Waiting for index '{}' (state={}, attempt {}/{})",
                    name,
                    desc.status.state,
                    attempt,
                    READY_MAX_ATTEMPTS
                );
            }
            tokio::time::sleep(self.poll_interval).await;
        }

        Err(RagError::Connectivity {
            service: SERVICE,
            message: format!("index '{}' did not become ready in time", name),
        })
    }

    async fn wait_until_deleted(&self, name: &str) -> Result<()> {
        for _ in 0..READY_MAX_ATTEMPTS {
            if self.describe_index(name).await?.is_none() {
                return Ok(());
            }
            tokio::time::sleep(self.poll_interval).await;
        }

        Err(RagError::Connectivity {
            service: SERVICE,
            message: format!("index '{}' was not deleted in time", name),
        })
    }
}

// ============================================================================
// PineconeIndex (data plane)
// ============================================================================

#[derive(Debug, Serialize)]
struct UpsertRequest<'a> {
    vectors: Vec<WireVector<'a>>,
}

#[derive(Debug, Serialize)]
struct WireVector<'a> {
    id: &'a str,
    values: &'a [f32],
    metadata: &'a ChunkMetadata,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpsertResponse {
    #[serde(default)]
    upserted_count: usize,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct QueryRequest<'a> {
    vector: &'a [f32],
    top_k: usize,
    include_metadata: bool,
    include_values: bool,
}

#[derive(Debug, Deserialize)]
struct QueryResponse {
    #[serde(default)]
    matches: Vec<WireMatch>,
}

#[derive(Debug, Deserialize)]
struct WireMatch {
    id: String,
    #[serde(default)]
    score: f32,
    metadata: Option<ChunkMetadata>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct DeleteRequest {
    delete_all: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct IndexStats {
    #[serde(default)]
    total_vector_count: usize,
}

/// Pinecone 인덱스 (데이터 플레인)
pub struct PineconeIndex {
    http: reqwest::Client,
    api_key: String,
    host: Url,
}

impl PineconeIndex {
    /// 인덱스 호스트로 생성 (스킴이 없으면 https)
    pub fn new(http: reqwest::Client, api_key: &str, host: &str) -> Result<Self> {
        let raw = if host.contains("://") {
            host.to_string()
        } else {
            format!("https://{}", host)
        };
        let host = Url::parse(&raw).map_err(|e| {
            RagError::InvalidInput(format!("invalid Pinecone host '{}': {}", host, e))
        })?;

        Ok(Self {
            http,
            api_key: api_key.to_string(),
            host,
        })
    }

    fn post(&self, path: &str) -> Result<reqwest::RequestBuilder> {
        let url = self.host.join(path).map_err(|e| {
            RagError::InvalidInput(format!("invalid Pinecone path '{}': {}", path, e))
        })?;

        Ok(self
            .http
            .post(url)
            .header("Api-Key", &self.api_key)
            .header("X-Pinecone-API-Version", API_VERSION))
    }
}

#[async_trait]
impl VectorIndex for PineconeIndex {
    async fn upsert(&self, records: &[VectorRecord]) -> Result<usize> {
        if records.is_empty() {
            return Ok(0);
        }

        let body = UpsertRequest {
            vectors: records
                .iter()
                .map(|r| WireVector {
                    id: &r.id,
                    values: &r.values,
                    metadata: &r.metadata,
                })
                .collect(),
        };

        let response = send(self.post("/vectors/upsert")?.json(&body)).await?;
        let parsed: UpsertResponse = parse(response).await?;
        Ok(parsed.upserted_count)
    }

    async fn query(&self, vector: &[f32], top_k: usize) -> Result<Vec<VectorMatch>> {
        if top_k == 0 {
            return Ok(vec![]);
        }

        let body = QueryRequest {
            vector,
            top_k,
            include_metadata: true,
            include_values: false,
        };

        let response = send(self.post("/query")?.json(&body)).await?;
        let parsed: QueryResponse = parse(response).await?;
        Ok(into_matches(parsed))
    }

    async fn delete_all(&self) -> Result<()> {
        let body = DeleteRequest { delete_all: true };
        let response = send(self.post("/vectors/delete")?.json(&body)).await?;
        check(response).await
    }

    async fn count(&self) -> Result<usize> {
        let body = serde_json::json!({});
        let response = send(self.post("/describe_index_stats")?.json(&body)).await?;
        let stats: IndexStats = parse(response).await?;
        Ok(stats.total_vector_count)
    }

    fn name(&self) -> &'static str {
        "pinecone"
    }
}

/// 메타데이터 없는 매치는 컨텍스트로 쓸 수 없으므로 제외
fn into_matches(response: QueryResponse) -> Vec<VectorMatch> {
    response
        .matches
        .into_iter()
        .filter_map(|m| {
            m.metadata.map(|metadata| VectorMatch {
                id: m.id,
                score: m.score,
                metadata,
            })
        })
        .collect()
}

// ============================================================================
// Helper Functions
// ============================================================================

async fn send(request: reqwest::RequestBuilder) -> Result<reqwest::Response> {
    request.send().await.map_err(|e| RagError::Connectivity {
        service: SERVICE,
        message: e.to_string(),
    })
}

async fn check(response: reqwest::Response) -> Result<()> {
    let status = response.status();
    if status.is_success() {
        return Ok(());
    }
    let body = response.text().await.unwrap_or_default();
    Err(RagError::api(SERVICE, status, &body))
}

async fn parse<T: serde::de::DeserializeOwned>(response: reqwest::Response) -> Result<T> {
    let status = response.status();
    let body = response.text().await?;
    if !status.is_success() {
        return Err(RagError::api(SERVICE, status, &body));
    }
    Ok(serde_json::from_str(&body)?)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::*;
    use crate::knowledge::vector::ChunkRecord;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// 컨트롤 플레인 흉내: 인덱스 하나의 차원만 기억
    #[derive(Default)]
    struct ControlPlane {
        dimension: Option<usize>,
        requests: Vec<String>,
    }

    impl ControlPlane {
        fn route(&mut self, method: &str, path: &str, body: &str) -> (u16, String) {
            self.requests.push(format!("{} {}", method, path));

            let describe = |dimension: usize| {
                serde_json::json!({
                    "name": "travel",
                    "dimension": dimension,
                    "metric": "cosine",
                    "host": "travel-abc.svc.pinecone.io",
                    "status": {"ready": true, "state": "Ready"}
                })
            };

            match (method, path) {
                ("GET", "/indexes") => {
                    let indexes: Vec<_> = self.dimension.into_iter().map(describe).collect();
                    (200, serde_json::json!({ "indexes": indexes }).to_string())
                }
                ("GET", "/indexes/travel") => match self.dimension {
                    Some(dimension) => (200, describe(dimension).to_string()),
                    None => (404, r#"{"error":{"code":"NOT_FOUND"}}"#.to_string()),
                },
                ("POST", "/indexes") => {
                    let request: serde_json::Value = serde_json::from_str(body).unwrap();
                    self.dimension = request["dimension"].as_u64().map(|d| d as usize);
                    (201, "{}".to_string())
                }
                ("DELETE", "/indexes/travel") => {
                    self.dimension = None;
                    (202, String::new())
                }
                _ => (400, "{}".to_string()),
            }
        }
    }

    fn header_end(buf: &[u8]) -> Option<usize> {
        buf.windows(4).position(|w| w == b"\r\n\r\n").map(|i| i + 4)
    }

    fn content_length(head: &str) -> usize {
        head.lines()
            .filter_map(|line| line.split_once(':'))
            .find(|(name, _)| name.trim().eq_ignore_ascii_case("content-length"))
            .and_then(|(_, value)| value.trim().parse().ok())
            .unwrap_or(0)
    }

    /// 로컬 HTTP 서버를 띄우고 base_url을 그쪽으로 돌린 클라이언트 반환
    async fn stub_client(plane: Arc<Mutex<ControlPlane>>) -> PineconeClient {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            while let Ok((mut socket, _)) = listener.accept().await {
                let plane = plane.clone();
                tokio::spawn(async move {
                    let mut buf = Vec::new();
                    let mut chunk = [0u8; 4096];
                    let (head, body) = loop {
                        let n = socket.read(&mut chunk).await.unwrap();
                        if n == 0 {
                            return;
                        }
                        buf.extend_from_slice(&chunk[..n]);
                        if let Some(end) = header_end(&buf) {
                            let head = String::from_utf8_lossy(&buf[..end]).to_string();
                            if buf.len() >= end + content_length(&head) {
                                let body = String::from_utf8_lossy(&buf[end..]).to_string();
                                break (head, body);
                            }
                        }
                    };

                    let mut parts = head.split_whitespace();
                    let method = parts.next().unwrap_or_default().to_string();
                    let path = parts.next().unwrap_or_default().to_string();
                    let (status, payload) = plane.lock().unwrap().route(&method, &path, &body);

                    let response = format!(
                        "HTTP/1.1 {} Stub\r\nContent-Type: application/json\r\n\
                         Content-Length: {}\r\nConnection: close\r\n\r\n{}",
                        status,
                        payload.len(),
                        payload
                    );
                    socket.write_all(response.as_bytes()).await.unwrap();
                    let _ = socket.shutdown().await;
                });
            }
        });

        let mut client = PineconeClient::new("key", "aws", "us-east-1").unwrap();
        client.http = reqwest::Client::builder().no_proxy().build().unwrap();
        client.base_url = format!("http://{}", addr);
        client.poll_interval = Duration::from_millis(10);
        client
    }

    #[tokio::test]
    async fn test_ensure_index_creates_missing_index() {
        let plane = Arc::new(Mutex::new(ControlPlane::default()));
        let client = stub_client(plane.clone()).await;

        let index = client.ensure_index("travel", 1536, false).await.unwrap();
        assert_eq!(index.host.host_str(), Some("travel-abc.svc.pinecone.io"));

        let plane = plane.lock().unwrap();
        assert_eq!(plane.dimension, Some(1536));
        assert_eq!(
            plane.requests,
            vec!["GET /indexes/travel", "POST /indexes", "GET /indexes/travel"]
        );
    }

    #[tokio::test]
    async fn test_ensure_index_rejects_other_dimension() {
        let plane = Arc::new(Mutex::new(ControlPlane {
            dimension: Some(1536),
            ..ControlPlane::default()
        }));
        let client = stub_client(plane.clone()).await;

        let err = client.ensure_index("travel", 768, false).await.err().unwrap();
        assert!(matches!(
            err,
            RagError::DimensionMismatch {
                expected: 768,
                actual: 1536
            }
        ));
        assert!(!plane.lock().unwrap().requests.iter().any(|r| r.starts_with("POST")));
    }

    #[tokio::test]
    async fn test_ensure_index_recreate_changes_dimension() {
        let plane = Arc::new(Mutex::new(ControlPlane {
            dimension: Some(1536),
            ..ControlPlane::default()
        }));
        let client = stub_client(plane.clone()).await;

        client.ensure_index("travel", 768, true).await.unwrap();

        let plane = plane.lock().unwrap();
        assert_eq!(plane.dimension, Some(768));
        assert_eq!(
            plane.requests,
            vec![
                "GET /indexes/travel",
                "DELETE /indexes/travel",
                "GET /indexes/travel",
                "POST /indexes",
                "GET /indexes/travel",
            ]
        );
    }

    #[tokio::test]
    async fn test_existing_index_is_reused() {
        let plane = Arc::new(Mutex::new(ControlPlane {
            dimension: Some(1536),
            ..ControlPlane::default()
        }));
        let client = stub_client(plane.clone()).await;

        client.ensure_index("travel", 1536, false).await.unwrap();
        let names: Vec<String> = client
            .list_indexes()
            .await
            .unwrap()
            .into_iter()
            .map(|i| i.name)
            .collect();
        assert_eq!(names, vec!["travel"]);
        assert_eq!(plane.lock().unwrap().requests.len(), 3);
    }

    #[tokio::test]
    async fn test_connect_missing_index() {
        let client = stub_client(Arc::new(Mutex::new(ControlPlane::default()))).await;
        let err = client.connect("travel").await.err().unwrap();
        assert!(matches!(err, RagError::Connectivity { .. }));
    }

    #[test]
    fn test_host_without_scheme() {
        let index = PineconeIndex::new(
            reqwest::Client::new(),
            "key",
            "travel-knowledge-abc123.svc.aped-4627-b74a.pinecone.io",
        )
        .unwrap();
        assert_eq!(
            index.host.join("/query").unwrap().as_str(),
            "https://travel-knowledge-abc123.svc.aped-4627-b74a.pinecone.io/query"
        );
    }

    #[test]
    fn test_upsert_body_shape() {
        let record = VectorRecord {
            id: "0".to_string(),
            values: vec![0.5, 0.25],
            metadata: ChunkRecord::new("paris is lovely", "travel_info"),
        };
        let body = UpsertRequest {
            vectors: vec![WireVector {
                id: &record.id,
                values: &record.values,
                metadata: &record.metadata,
            }],
        };

        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["vectors"][0]["id"], "0");
        assert_eq!(json["vectors"][0]["values"][1], 0.25);
        assert_eq!(json["vectors"][0]["metadata"]["type"], "travel_info");
    }

    #[test]
    fn test_query_body_uses_camel_case() {
        let body = QueryRequest {
            vector: &[1.0],
            top_k: 5,
            include_metadata: true,
            include_values: false,
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["topK"], 5);
        assert_eq!(json["includeMetadata"], true);
    }

    #[test]
    fn test_query_response_mapping() {
        let body = r#"{
            "matches": [
                {"id": "3", "score": 0.91,
                 "metadata": {"content": "lyon food", "type": "travel_info"}},
                {"id": "9", "score": 0.80},
                {"id": "1", "score": 0.72,
                 "metadata": {"content": "paris metro", "type": "travel_info"}}
            ],
            "namespace": ""
        }"#;
        let parsed: QueryResponse = serde_json::from_str(body).unwrap();
        let matches = into_matches(parsed);

        assert_eq!(matches.len(), 2);
        assert_eq!(matches[0].id, "3");
        assert_eq!(matches[0].metadata.content, "lyon food");
        assert_eq!(matches[1].metadata.kind, "travel_info");
    }

    #[test]
    fn test_index_list_parsing() {
        let body = r#"{"indexes": [{
            "name": "travel-knowledge",
            "dimension": 1536,
            "metric": "cosine",
            "host": "travel-knowledge-abc.svc.pinecone.io",
            "spec": {"serverless": {"cloud": "aws", "region": "us-east-1"}},
            "status": {"ready": true, "state": "Ready"}
        }]}"#;
        let list: IndexList = serde_json::from_str(body).unwrap();
        assert_eq!(list.indexes.len(), 1);
        assert_eq!(list.indexes[0].dimension, 1536);
        assert!(list.indexes[0].status.ready);
    }

    #[test]
    fn test_create_index_body() {
        let body = CreateIndexRequest {
            name: "travel-knowledge",
            dimension: 1536,
            metric: "cosine",
            spec: IndexSpec {
                serverless: ServerlessSpec {
                    cloud: "aws",
                    region: "us-east-1",
                },
            },
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["spec"]["serverless"]["region"], "us-east-1");
        assert_eq!(json["metric"], "cosine");
    }
}
