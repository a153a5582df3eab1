//! Graph Store - 위치 그래프 트레이트 및 타입
//!
//! Location 노드와 방향성 관계를 저장하고 이름으로 정확히 조회합니다.
//! Neo4j(원격)와 SQLite(로컬) 구현이 이 트레이트를 따릅니다.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::OnceLock;

use async_trait::async_trait;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{RagError, Result};

/// 기본 관계 타입
pub const DEFAULT_RELATIONSHIP: &str = "CONNECTS_TO";

// ============================================================================
// Types
// ============================================================================

/// 위치 엔티티 (name이 조회 키)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    pub name: String,
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub country: String,
    #[serde(default)]
    pub description: String,
    /// 관계 추출용 (저장되지 않음)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub connected_to: Vec<Connection>,
}

impl Location {
    pub fn new(name: &str, kind: &str, country: &str, description: &str) -> Self {
        Self {
            name: name.to_string(),
            kind: kind.to_string(),
            country: country.to_string(),
            description: description.to_string(),
            connected_to: Vec::new(),
        }
    }
}

/// 데이터셋의 `connected_to` 항목
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Connection {
    pub name: String,
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
}

/// 검증된 관계 타입 라벨
///
/// Cypher 라벨은 파라미터화할 수 없으므로 `^[A-Z][A-Z0-9_]{0,63}$`만 허용합니다.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RelationshipType(String);

fn label_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[A-Z][A-Z0-9_]{0,63}$").expect("valid label regex"))
}

impl RelationshipType {
    pub fn parse(label: &str) -> Result<Self> {
        if label_pattern().is_match(label) {
            Ok(Self(label.to_string()))
        } else {
            Err(RagError::InvalidRelationshipType(label.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for RelationshipType {
    fn default() -> Self {
        Self(DEFAULT_RELATIONSHIP.to_string())
    }
}

impl fmt::Display for RelationshipType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// 관계 타입 허용 정책
#[derive(Debug, Clone, Default)]
pub struct RelationshipPolicy {
    /// None이면 형식 검사만
    allowed: Option<BTreeSet<String>>,
}

impl RelationshipPolicy {
    /// 허용 목록 지정 (각 라벨도 형식 검사)
    pub fn allow_only<I, S>(labels: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let allowed = labels
            .into_iter()
            .map(|l| RelationshipType::parse(l.as_ref()).map(|t| t.0))
            .collect::<Result<BTreeSet<_>>>()?;
        Ok(Self {
            allowed: Some(allowed),
        })
    }

    /// 라벨 검증 (형식 + 허용 목록)
    pub fn validate(&self, label: &str) -> Result<RelationshipType> {
        let kind = RelationshipType::parse(label)?;
        match &self.allowed {
            Some(allowed) if !allowed.contains(kind.as_str()) => {
                Err(RagError::InvalidRelationshipType(label.to_string()))
            }
            _ => Ok(kind),
        }
    }
}

/// 방향성 관계 (source -[kind]-> target)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Relationship {
    pub source: String,
    pub target: String,
    pub kind: RelationshipType,
}

/// 관계 생성 결과
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelationshipOutcome {
    Created,
    /// 끝점 노드가 없어 아무것도 생성되지 않음
    MissingEndpoint,
}

/// 그래프 통계
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GraphStats {
    pub locations: usize,
    pub relationships: usize,
}

// ============================================================================
// GraphStore Trait
// ============================================================================

/// GraphStore 트레이트 (async)
#[async_trait]
pub trait GraphStore: Send + Sync {
    /// Location 노드 하나 생성 (중복 검사 없음)
    async fn create_location(&self, location: &Location) -> Result<()>;

    /// 두 노드를 이름으로 찾아 방향성 관계 생성
    ///
    /// 끝점이 없으면 아무것도 만들지 않고 `MissingEndpoint`를 반환합니다.
    async fn create_relationship(
        &self,
        source: &str,
        target: &str,
        kind: &RelationshipType,
    ) -> Result<RelationshipOutcome>;

    /// 이름 정확 일치 조회 (첫 번째 결과, 없으면 None)
    async fn query_location(&self, name: &str) -> Result<Option<Location>>;

    /// 위치 일괄 생성 (기본 구현: 순차 호출)
    ///
    /// 관계 추출은 하지 않습니다.
    async fn load_batch(&self, locations: &[Location]) -> Result<usize> {
        for location in locations {
            self.create_location(location).await?;
        }
        Ok(locations.len())
    }

    /// 관계 존재 여부
    async fn has_relationship(
        &self,
        source: &str,
        target: &str,
        kind: &RelationshipType,
    ) -> Result<bool>;

    /// 전체 삭제
    async fn clear(&self) -> Result<()>;

    async fn stats(&self) -> Result<GraphStats>;

    fn name(&self) -> &'static str;
}

// ============================================================================
// Relationship Extraction
// ============================================================================

/// `connected_to` 필드에서 관계 추출
///
/// 타입이 없으면 `CONNECTS_TO`. 정책에 맞지 않는 라벨은 에러입니다.
pub fn extract_relationships(
    locations: &[Location],
    policy: &RelationshipPolicy,
) -> Result<Vec<Relationship>> {
    let mut relationships = Vec::new();

    for location in locations {
        for connection in &location.connected_to {
            let label = connection.kind.as_deref().unwrap_or(DEFAULT_RELATIONSHIP);
            relationships.push(Relationship {
                source: location.name.clone(),
                target: connection.name.clone(),
                kind: policy.validate(label)?,
            });
        }
    }

    Ok(relationships)
}

// ============================================================================
// Tests
// ============================================================================
