//! SQLite Graph Store - rusqlite 기반 로컬 위치 그래프
//!
//! Neo4j 없이 동작하는 로컬 백엔드입니다. 관계 타입은 라벨이 아니라
//! 컬럼 값으로 저장되므로 모든 쿼리가 파라미터화됩니다.
//! 저장 위치: ~/.travel-rag/graph.db

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use anyhow::Context;
use async_trait::async_trait;
use chrono::Utc;
use rusqlite::{params, Connection, OpenFlags, OptionalExtension};

use crate::error::{RagError, Result};

use super::graph::{GraphStats, GraphStore, Location, RelationshipOutcome, RelationshipType};

// ============================================================================
// SqliteGraphStore
// ============================================================================

/// SQLite 그래프 저장소
pub struct SqliteGraphStore {
    conn: Arc<Mutex<Connection>>,
    db_path: Option<PathBuf>,
}

impl SqliteGraphStore {
    /// 저장소 열기 (없으면 생성)
    ///
    /// # Arguments
    /// * `path` - DB 파일 경로
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent).map_err(|source| RagError::Io {
                    path: parent.to_path_buf(),
                    source,
                })?;
            }
        }

        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_WRITE
                | OpenFlags::SQLITE_OPEN_CREATE
                | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;

        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
            db_path: Some(path.to_path_buf()),
        };

        store.initialize()?;
        Ok(store)
    }

    /// 메모리 DB (테스트/일회성)
    pub fn open_in_memory() -> Result<Self> {
        let store = Self {
            conn: Arc::new(Mutex::new(Connection::open_in_memory()?)),
            db_path: None,
        };
        store.initialize()?;
        Ok(store)
    }

    /// DB 경로 반환
    pub fn db_path(&self) -> Option<&Path> {
        self.db_path.as_deref()
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| RagError::Backend(anyhow::anyhow!("Lock error: {}", e)))
    }

    /// 스키마 초기화
    fn initialize(&self) -> Result<()> {
        let conn = self.lock()?;

        conn.execute_batch(
            "PRAGMA foreign_keys = ON;

            CREATE TABLE IF NOT EXISTS locations (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL,
                type TEXT NOT NULL DEFAULT '',
                country TEXT NOT NULL DEFAULT '',
                description TEXT NOT NULL DEFAULT '',
                created_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_locations_name ON locations(name);

            CREATE TABLE IF NOT EXISTS relationships (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                source_id INTEGER NOT NULL REFERENCES locations(id) ON DELETE CASCADE,
                target_id INTEGER NOT NULL REFERENCES locations(id) ON DELETE CASCADE,
                type TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_relationships_source ON relationships(source_id);",
        )
        .context("Failed to initialize graph schema")?;

        tracing::debug!("Graph store initialized at {:?}", self.db_path);
        Ok(())
    }
}

fn insert_location(conn: &Connection, location: &Location) -> rusqlite::Result<usize> {
    conn.execute(
        "INSERT INTO locations (name, type, country, description, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            location.name,
            location.kind,
            location.country,
            location.description,
            Utc::now().to_rfc3339()
        ],
    )
}

#[async_trait]
impl GraphStore for SqliteGraphStore {
    async fn create_location(&self, location: &Location) -> Result<()> {
        let conn = self.lock()?;
        insert_location(&conn, location)?;
        Ok(())
    }

    async fn create_relationship(
        &self,
        source: &str,
        target: &str,
        kind: &RelationshipType,
    ) -> Result<RelationshipOutcome> {
        let conn = self.lock()?;

        // 이름이 일치하는 모든 노드 쌍에 관계 생성 (MATCH ... CREATE 와 같은 의미)
        let created = conn.execute(
            "INSERT INTO relationships (source_id, target_id, type)
             SELECT s.id, t.id, ?3
             FROM locations s, locations t
             WHERE s.name = ?1 AND t.name = ?2",
            params![source, target, kind.as_str()],
        )?;

        Ok(if created > 0 {
            RelationshipOutcome::Created
        } else {
            RelationshipOutcome::MissingEndpoint
        })
    }

    async fn query_location(&self, name: &str) -> Result<Option<Location>> {
        let conn = self.lock()?;

        let location = conn
            .query_row(
                "SELECT name, type, country, description FROM locations
                 WHERE name = ?1
                 ORDER BY id
                 LIMIT 1",
                params![name],
                |row| {
                    Ok(Location {
                        name: row.get(0)?,
                        kind: row.get(1)?,
                        country: row.get(2)?,
                        description: row.get(3)?,
                        connected_to: Vec::new(),
                    })
                },
            )
            .optional()?;

        Ok(location)
    }

    async fn load_batch(&self, locations: &[Location]) -> Result<usize> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;

        for location in locations {
            insert_location(&tx, location)?;
        }

        tx.commit()?;
        Ok(locations.len())
    }

    async fn has_relationship(
        &self,
        source: &str,
        target: &str,
        kind: &RelationshipType,
    ) -> Result<bool> {
        let conn = self.lock()?;

        let exists: bool = conn.query_row(
            "SELECT EXISTS (
                SELECT 1 FROM relationships r
                JOIN locations s ON s.id = r.source_id
                JOIN locations t ON t.id = r.target_id
                WHERE s.name = ?1 AND t.name = ?2 AND r.type = ?3
            )",
            params![source, target, kind.as_str()],
            |row| row.get(0),
        )?;

        Ok(exists)
    }

    async fn clear(&self) -> Result<()> {
        let conn = self.lock()?;
        conn.execute_batch("DELETE FROM relationships; DELETE FROM locations;")?;
        Ok(())
    }

    async fn stats(&self) -> Result<GraphStats> {
        let conn = self.lock()?;

        let locations: i64 =
            conn.query_row("SELECT COUNT(*) FROM locations", [], |row| row.get(0))?;
        let relationships: i64 =
            conn.query_row("SELECT COUNT(*) FROM relationships", [], |row| row.get(0))?;

        Ok(GraphStats {
            locations: locations as usize,
            relationships: relationships as usize,
        })
    }

    fn name(&self) -> &'static str {
        "sqlite"
    }
}

// ============================================================================
// Tests
// ============================================================================
