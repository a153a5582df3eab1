//! CLI 모듈
//!
//! travel-rag CLI 명령어 정의 및 구현

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

use crate::assistant::{ChatSession, TravelAssistant};
use crate::config::{GraphSettings, Settings, VectorSettings};
use crate::embedding::OpenAiEmbedding;
use crate::knowledge::{
    parse_location_file, read_text_file, FailurePolicy, GraphStore, LanceVectorIndex,
    LocationLoader, Neo4jGraphStore, PineconeClient, RelationshipPolicy, SqliteGraphStore,
    TextIngestor, VectorIndex, VectorStore, TRAVEL_INFO,
};
use crate::llm::OpenAiChat;

// ============================================================================
// CLI Definition
// ============================================================================

#[derive(Parser)]
#[command(name = "travel-rag")]
#[command(version, about = "그래프 + 벡터 여행 RAG 어시스턴트", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// 설정 확인 및 벡터 인덱스 준비
    Setup {
        /// 기존 인덱스 삭제 후 재생성
        #[arg(long)]
        recreate: bool,
    },

    /// 위치 JSON을 그래프에 로드
    Locations {
        /// 위치 파일 경로
        file: PathBuf,

        /// connected_to 관계도 생성
        #[arg(short, long)]
        relationships: bool,
    },

    /// 여행 텍스트를 벡터 인덱스에 인제스트
    Travel {
        /// 텍스트 파일 경로
        file: PathBuf,

        /// 청크 타입 태그
        #[arg(short = 't', long = "type", default_value = TRAVEL_INFO)]
        kind: String,

        /// 실패한 배치를 건너뛰고 계속
        #[arg(long)]
        continue_on_error: bool,
    },

    /// 질문 한 번
    Ask {
        /// 질문
        query: String,

        /// 벡터 검색 개수
        #[arg(short = 'k', long)]
        top_k: Option<usize>,
    },

    /// 대화 모드 (/exit, /history)
    Chat,

    /// 상태 확인
    Status,

    /// 저장소 비우기 (옵션이 없으면 둘 다)
    Reset {
        /// 그래프만
        #[arg(long)]
        graph: bool,

        /// 벡터만
        #[arg(long)]
        vectors: bool,
    },
}

// ============================================================================
// CLI Runner
// ============================================================================

/// CLI 명령어 실행
pub async fn run(cli: Cli) -> Result<()> {
    let settings = Settings::from_env().context("설정 로드 실패")?;

    match cli.command {
        Commands::Setup { recreate } => cmd_setup(&settings, recreate).await,
        Commands::Locations {
            file,
            relationships,
        } => cmd_locations(&settings, &file, relationships).await,
        Commands::Travel {
            file,
            kind,
            continue_on_error,
        } => cmd_travel(&settings, &file, &kind, continue_on_error).await,
        Commands::Ask { query, top_k } => cmd_ask(&settings, &query, top_k).await,
        Commands::Chat => cmd_chat(&settings).await,
        Commands::Status => cmd_status(&settings).await,
        Commands::Reset { graph, vectors } => {
            // 둘 다 지정하지 않으면 전체 초기화
            let all = !graph && !vectors;
            cmd_reset(&settings, graph || all, vectors || all).await
        }
    }
}

// ============================================================================
// Backend Factory
// ============================================================================

/// 그래프 저장소 열기
async fn open_graph(settings: &Settings) -> Result<Arc<dyn GraphStore>> {
    let graph: Arc<dyn GraphStore> = match &settings.graph {
        GraphSettings::Neo4j {
            uri,
            user,
            password,
        } => Arc::new(
            Neo4jGraphStore::connect(uri, user, password)
                .await
                .context("Neo4j 연결 실패")?,
        ),
        GraphSettings::Sqlite { path } => {
            Arc::new(SqliteGraphStore::open(path).context("SQLite 그래프 열기 실패")?)
        }
    };
    Ok(graph)
}

/// 벡터 인덱스 열기
///
/// `ensure`면 Pinecone 인덱스를 생성/검증합니다 (setup 전용).
async fn open_index(
    settings: &Settings,
    ensure: bool,
    recreate: bool,
) -> Result<Arc<dyn VectorIndex>> {
    let dimension = settings.pipeline.embedding_dim;

    let index: Arc<dyn VectorIndex> = match &settings.vector {
        VectorSettings::Pinecone {
            api_key,
            environment,
            cloud,
            index_name,
        } => {
            let client = PineconeClient::new(api_key, cloud, environment)?;
            let index = if ensure {
                report_other_indexes(&client, index_name).await?;
                client
                    .ensure_index(index_name, dimension, recreate)
                    .await
                    .context("Pinecone 인덱스 준비 실패")?
            } else {
                client
                    .connect(index_name)
                    .await
                    .context("Pinecone 인덱스 연결 실패")?
            };
            Arc::new(index)
        }
        VectorSettings::Lance { path } => {
            let index = if recreate {
                LanceVectorIndex::recreate(path, dimension).await
            } else {
                LanceVectorIndex::open(path, dimension).await
            };
            Arc::new(index.context("LanceDB 열기 실패")?)
        }
    };
    Ok(index)
}

/// 같은 프로젝트의 다른 Pinecone 인덱스 안내 (무료 플랜은 인덱스 수 제한)
async fn report_other_indexes(client: &PineconeClient, index_name: &str) -> Result<()> {
    let others: Vec<String> = client
        .list_indexes()
        .await
        .context("Pinecone 인덱스 목록 조회 실패")?
        .into_iter()
        .map(|desc| desc.name)
        .filter(|name| name != index_name)
        .collect();

    if !others.is_empty() {
        println!("[!] 다른 Pinecone 인덱스: {}", others.join(", "));
    }
    Ok(())
}

/// 벡터 저장소 (인덱스 + 임베딩)
async fn open_vectors(settings: &Settings) -> Result<Arc<VectorStore>> {
    let index = open_index(settings, false, false).await?;
    let embedder = OpenAiEmbedding::new(&settings.openai, settings.pipeline.embedding_dim)?;

    Ok(Arc::new(VectorStore::new(
        index,
        Arc::new(embedder),
        &settings.pipeline,
    )))
}

async fn open_assistant(settings: &Settings) -> Result<TravelAssistant> {
    let graph = open_graph(settings).await?;
    let vectors = open_vectors(settings).await?;
    let chat = OpenAiChat::new(&settings.openai)?;

    Ok(TravelAssistant::new(
        graph,
        vectors,
        Arc::new(chat),
        &settings.pipeline,
    ))
}

fn relationship_policy(settings: &Settings) -> Result<RelationshipPolicy> {
    Ok(match &settings.relationship_types {
        Some(labels) => RelationshipPolicy::allow_only(labels)?,
        None => RelationshipPolicy::default(),
    })
}

// ============================================================================
// Command Implementations
// ============================================================================

/// 설정 명령어 (setup)
///
/// 그래프 연결을 확인하고 벡터 인덱스를 생성합니다.
async fn cmd_setup(settings: &Settings, recreate: bool) -> Result<()> {
    println!("[*] 그래프 저장소 확인 중...");
    let graph = open_graph(settings).await?;
    println!("[OK] 그래프: {}", graph.name());

    println!("[*] 벡터 인덱스 준비 중...");
    let index = open_index(settings, true, recreate).await?;
    println!(
        "[OK] 벡터 인덱스: {} ({} 차원, {} 벡터)",
        index.name(),
        settings.pipeline.embedding_dim,
        index.count().await?
    );

    Ok(())
}

/// 위치 로드 명령어 (locations)
async fn cmd_locations(settings: &Settings, file: &Path, relationships: bool) -> Result<()> {
    let locations = parse_location_file(file)?;
    println!("[*] {} 개 위치 로드 중: {}", locations.len(), file.display());

    // 관계 라벨은 쓰기 전에 검증
    let policy = relationship_policy(settings)?;

    let loader = LocationLoader::new(open_graph(settings).await?);

    let loaded = loader.load_locations(&locations).await?;
    println!("[OK] 위치 {} 개 저장", loaded);

    if relationships {
        let report = loader.load_relationships(&locations, &policy).await?;
        println!("[OK] 관계 {} 개 생성", report.created);
        for (source, target) in &report.missing {
            println!("[!] 끝점 없음: {} -> {}", source, target);
        }
    }

    Ok(())
}

/// 텍스트 인제스트 명령어 (travel)
async fn cmd_travel(
    settings: &Settings,
    file: &Path,
    kind: &str,
    continue_on_error: bool,
) -> Result<()> {
    let text = read_text_file(file)?;
    println!(
        "[*] 인제스트 중: {} ({})",
        file.display(),
        format_bytes(text.len())
    );

    let policy = if continue_on_error {
        FailurePolicy::Continue
    } else {
        FailurePolicy::Abort
    };

    let ingestor = TextIngestor::new(open_vectors(settings).await?, &settings.pipeline);

    let report = ingestor.ingest_text(&text, kind, policy).await?;
    println!(
        "[OK] {} 청크 저장 ({} 배치)",
        report.upserted, report.batches
    );

    for failure in &report.failed {
        println!(
            "[!] 배치 {} 실패 ({} 레코드): {}",
            failure.batch,
            failure.records,
            truncate_text(&failure.error, 120)
        );
    }

    Ok(())
}

/// 질문 명령어 (ask)
async fn cmd_ask(settings: &Settings, query: &str, top_k: Option<usize>) -> Result<()> {
    let mut assistant = open_assistant(settings).await?;
    if let Some(k) = top_k {
        assistant = assistant.with_top_k(k);
    }

    let answer = assistant.answer(query).await.context("답변 생성 실패")?;
    println!("{}", answer);

    Ok(())
}

/// 대화 명령어 (chat)
async fn cmd_chat(settings: &Settings) -> Result<()> {
    let assistant = open_assistant(settings).await?;
    let mut session = ChatSession::new(&assistant);

    println!("Travel Assistant (/exit 종료, /history 기록)");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();

    loop {
        stdout.write_all(b"> ").await?;
        stdout.flush().await?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let line = line.trim();

        match line {
            "" => continue,
            "/exit" | "/quit" => break,
            "/history" => {
                for turn in session.transcript() {
                    println!(
                        "[{}] {}: {}",
                        turn.at.format("%H:%M:%S"),
                        turn.role,
                        truncate_text(&turn.content, 200)
                    );
                }
            }
            message => match session.send(message).await {
                Ok(reply) => println!("{}\n", reply),
                Err(e) => println!("[!] {}\n", e),
            },
        }
    }

    Ok(())
}

/// 상태 명령어 (status)
async fn cmd_status(settings: &Settings) -> Result<()> {
    println!("travel-rag v{}", env!("CARGO_PKG_VERSION"));
    println!();

    println!("[*] 데이터 디렉토리: {}", settings.data_dir.display());
    println!(
        "[*] 모델: {} / {}",
        settings.openai.chat_model, settings.openai.embedding_model
    );

    match open_graph(settings).await {
        Ok(graph) => match graph.stats().await {
            Ok(stats) => println!(
                "[OK] 그래프 ({}): 위치 {} 개, 관계 {} 개",
                graph.name(),
                stats.locations,
                stats.relationships
            ),
            Err(e) => println!("[!] 그래프 통계 조회 실패: {}", e),
        },
        Err(e) => println!("[!] 그래프 연결 실패: {:#}", e),
    }

    match open_index(settings, false, false).await {
        Ok(index) => match index.count().await {
            Ok(count) => println!("[OK] 벡터 인덱스 ({}): {} 청크", index.name(), count),
            Err(e) => println!("[!] 벡터 통계 조회 실패: {}", e),
        },
        Err(e) => println!("[!] 벡터 인덱스 연결 실패: {:#}", e),
    }

    Ok(())
}

/// 초기화 명령어 (reset)
async fn cmd_reset(settings: &Settings, graph: bool, vectors: bool) -> Result<()> {
    if graph {
        let store = open_graph(settings).await?;
        store.clear().await.context("그래프 초기화 실패")?;
        println!("[OK] 그래프 초기화: {}", store.name());
    }

    if vectors {
        let index = open_index(settings, false, false).await?;
        index.delete_all().await.context("벡터 초기화 실패")?;
        println!("[OK] 벡터 인덱스 초기화: {}", index.name());
    }

    Ok(())
}

// ============================================================================
// Helper Functions
// ============================================================================

/// 텍스트 자르기 (UTF-8 안전)
fn truncate_text(text: &str, max_chars: usize) -> String {
    let cleaned = text.replace('\n', " ").replace('\r', "");
    let cleaned = cleaned.trim();

    if cleaned.chars().count() <= max_chars {
        cleaned.to_string()
    } else {
        let truncated: String = cleaned.chars().take(max_chars).collect();
        format!("{}...", truncated)
    }
}

/// 바이트 크기 포맷팅
fn format_bytes(bytes: usize) -> String {
    const KB: usize = 1024;
    const MB: usize = KB * 1024;

    if bytes >= MB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}

// ============================================================================
// Tests
// ============================================================================
