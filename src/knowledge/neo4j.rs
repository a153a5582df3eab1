//! Neo4j Graph Store - neo4rs 기반 위치 그래프
//!
//! 모든 값은 파라미터로 전달됩니다. 관계 라벨만 Cypher에 직접 들어가며,
//! 이는 검증된 `RelationshipType`에서만 가져옵니다.

use async_trait::async_trait;
use neo4rs::{query, Graph, Node, Query};

use crate::error::{RagError, Result};

use super::graph::{GraphStats, GraphStore, Location, RelationshipOutcome, RelationshipType};

// ============================================================================
// Cypher
// ============================================================================

const CREATE_LOCATION: &str = "CREATE (l:Location {name: $name, type: $type, \
                               country: $country, description: $description})";

const QUERY_LOCATION: &str = "MATCH (l:Location {name: $name}) RETURN l LIMIT 1";

const CLEAR: &str = "MATCH (n:Location) DETACH DELETE n";

const COUNT_LOCATIONS: &str = "MATCH (n:Location) RETURN count(n) AS total";

const COUNT_RELATIONSHIPS: &str =
    "MATCH (:Location)-[r]->(:Location) RETURN count(r) AS total";

fn create_relationship_cypher(kind: &RelationshipType) -> String {
    format!(
        "MATCH (a:Location {{name: $source}}) \
         MATCH (b:Location {{name: $target}}) \
         CREATE (a)-[r:{}]->(b) \
         RETURN count(r) AS created",
        kind.as_str()
    )
}

fn has_relationship_cypher(kind: &RelationshipType) -> String {
    format!(
        "MATCH (a:Location {{name: $source}})-[r:{}]->(b:Location {{name: $target}}) \
         RETURN count(r) AS total",
        kind.as_str()
    )
}

fn location_query(location: &Location) -> Query {
    query(CREATE_LOCATION)
        .param("name", location.name.clone())
        .param("type", location.kind.clone())
        .param("country", location.country.clone())
        .param("description", location.description.clone())
}

fn node_to_location(node: &Node) -> Option<Location> {
    Some(Location {
        name: node.get::<String>("name").ok()?,
        kind: node.get::<String>("type").unwrap_or_default(),
        country: node.get::<String>("country").unwrap_or_default(),
        description: node.get::<String>("description").unwrap_or_default(),
        connected_to: Vec::new(),
    })
}

// ============================================================================
// Neo4jGraphStore
// ============================================================================

/// Neo4j 그래프 저장소
pub struct Neo4jGraphStore {
    graph: Graph,
}

impl Neo4jGraphStore {
    /// Neo4j 연결
    pub async fn connect(uri: &str, user: &str, password: &str) -> Result<Self> {
        let graph = Graph::new(uri, user, password)
            .await
            .map_err(|e| RagError::Connectivity {
                service: "Neo4j",
                message: e.to_string(),
            })?;

        // 인증 실패는 첫 쿼리에서 드러남
        let store = Self { graph };
        store.count(query(COUNT_LOCATIONS)).await.map_err(|e| RagError::Connectivity {
            service: "Neo4j",
            message: e.to_string(),
        })?;

        tracing::info!("Connected to Neo4j at {}", uri);
        Ok(store)
    }

    async fn count(&self, cypher: Query) -> Result<usize> {
        let mut result = self.graph.execute(cypher).await?;

        let mut total = 0;
        if let Some(row) = result.next().await? {
            total = row.get::<i64>("total").unwrap_or(0);
        }
        Ok(total.max(0) as usize)
    }
}

#[async_trait]
impl GraphStore for Neo4jGraphStore {
    async fn create_location(&self, location: &Location) -> Result<()> {
        self.graph.run(location_query(location)).await?;
        Ok(())
    }

    async fn create_relationship(
        &self,
        source: &str,
        target: &str,
        kind: &RelationshipType,
    ) -> Result<RelationshipOutcome> {
        let q = query(&create_relationship_cypher(kind))
            .param("source", source.to_string())
            .param("target", target.to_string());

        let mut result = self.graph.execute(q).await?;

        let mut created = 0;
        while let Some(row) = result.next().await? {
            created += row.get::<i64>("created").unwrap_or(0);
        }

        Ok(if created > 0 {
            RelationshipOutcome::Created
        } else {
            RelationshipOutcome::MissingEndpoint
        })
    }

    async fn query_location(&self, name: &str) -> Result<Option<Location>> {
        let q = query(QUERY_LOCATION).param("name", name.to_string());
        let mut result = self.graph.execute(q).await?;

        if let Some(row) = result.next().await? {
            if let Ok(node) = row.get::<Node>("l") {
                return Ok(node_to_location(&node));
            }
        }
        Ok(None)
    }

    async fn load_batch(&self, locations: &[Location]) -> Result<usize> {
        if locations.is_empty() {
            return Ok(0);
        }

        let mut txn = self.graph.start_txn().await?;
        txn.run_queries(locations.iter().map(location_query).collect::<Vec<_>>())
            .await?;
        txn.commit().await?;

        Ok(locations.len())
    }

    async fn has_relationship(
        &self,
        source: &str,
        target: &str,
        kind: &RelationshipType,
    ) -> Result<bool> {
        let q = query(&has_relationship_cypher(kind))
            .param("source", source.to_string())
            .param("target", target.to_string());
        Ok(self.count(q).await? > 0)
    }

    async fn clear(&self) -> Result<()> {
        self.graph.run(query(CLEAR)).await?;
        Ok(())
    }

    async fn stats(&self) -> Result<GraphStats> {
        Ok(GraphStats {
            locations: self.count(query(COUNT_LOCATIONS)).await?,
            relationships: self.count(query(COUNT_RELATIONSHIPS)).await?,
        })
    }

    fn name(&self) -> &'static str {
        "neo4j"
    }
}

// ============================================================================
// Tests
// ============================================================================
