//! Embedded document chunks backing the vector store
//!
//! Embeddings are stored as little-endian f32 blobs.

use chrono::Utc;
use rusqlite::{params, Result as SqliteResult, Row};

use super::super::sqlite::format_timestamp;
use super::super::Database;

/// A chunk ready to be written
#[derive(Debug, Clone)]
pub struct NewChunk {
    pub document_id: Option<i64>,
    pub session_id: Option<String>,
    pub source: String,
    pub page: Option<i64>,
    pub chunk_index: i64,
    pub content: String,
    pub embedding: Vec<f32>,
}

/// A stored chunk with its embedding
#[derive(Debug, Clone)]
pub struct ChunkRecord {
    pub id: String,
    pub document_id: Option<i64>,
    pub session_id: Option<String>,
    pub source: String,
    pub page: Option<i64>,
    pub chunk_index: i64,
    pub content: String,
    pub embedding: Vec<f32>,
}

impl Database {
    /// Insert all chunks in one transaction. Returns the number written.
    pub fn insert_chunks(&self, chunks: &[NewChunk]) -> SqliteResult<usize> {
        let mut conn = self.conn.lock();
        let now = format_timestamp(&Utc::now());
        let tx = conn.transaction()?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO chunks (id, document_id, session_id, source, page, chunk_index, content, embedding, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            )?;
            for chunk in chunks {
                stmt.execute(params![
                    uuid::Uuid::new_v4().to_string(),
                    chunk.document_id,
                    chunk.session_id,
                    chunk.source,
                    chunk.page,
                    chunk.chunk_index,
                    chunk.content,
                    embedding_to_blob(&chunk.embedding),
                    now,
                ])?;
            }
        }
        tx.commit()?;
        Ok(chunks.len())
    }

    pub fn count_chunks(&self) -> SqliteResult<i64> {
        let conn = self.conn.lock();
        conn.query_row("SELECT COUNT(*) FROM chunks", [], |row| row.get(0))
    }

    /// All chunks, or only those tagged with `session_id`
    pub fn load_chunks(&self, session_id: Option<&str>) -> SqliteResult<Vec<ChunkRecord>> {
        let conn = self.conn.lock();
        let base = "SELECT id, document_id, session_id, source, page, chunk_index, content, embedding FROM chunks";

        let chunks = match session_id {
            Some(session) => {
                let mut stmt = conn.prepare(&format!("{} WHERE session_id = ?1 ORDER BY rowid", base))?;
                let rows = stmt
                    .query_map([session], Self::row_to_chunk)?
                    .collect::<SqliteResult<Vec<_>>>()?;
                rows
            }
            None => {
                let mut stmt = conn.prepare(&format!("{} ORDER BY rowid", base))?;
                let rows = stmt
                    .query_map([], Self::row_to_chunk)?
                    .collect::<SqliteResult<Vec<_>>>()?;
                rows
            }
        };
        Ok(chunks)
    }

    /// Returns the number of chunks removed
    pub fn delete_all_chunks(&self) -> SqliteResult<usize> {
        let conn = self.conn.lock();
        conn.execute("DELETE FROM chunks", [])
    }

    fn row_to_chunk(row: &Row) -> SqliteResult<ChunkRecord> {
        let blob: Vec<u8> = row.get(7)?;
        Ok(ChunkRecord {
            id: row.get(0)?,
            document_id: row.get(1)?,
            session_id: row.get(2)?,
            source: row.get(3)?,
            page: row.get(4)?,
            chunk_index: row.get(5)?,
            content: row.get(6)?,
            embedding: blob_to_embedding(&blob),
        })
    }
}

fn embedding_to_blob(embedding: &[f32]) -> Vec<u8> {
    embedding.iter().flat_map(|v| v.to_le_bytes()).collect()
}

fn blob_to_embedding(blob: &[u8]) -> Vec<f32> {
    blob.chunks_exact(4)
        .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect()
}
