//! SQLite ledger: published_messages + audit_records + memory_chain_links.
//!
//! One database file holds all three tables. Publication writes the message and its audit record
//! in one transaction; chain appends run inside `BEGIN IMMEDIATE` so two writers (even in
//! different processes) can never read the same tail.

use crate::error::{LedgerError, LedgerResult};
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OpenFlags, OptionalExtension, Row, TransactionBehavior};
use std::path::{Path, PathBuf};
use std::time::Duration;
use vigil_core::hashing::canonical_timestamp;
use vigil_core::{
    AuditDecision, AuditRecord, ChainStore, ChainSummary, ChainTail, FeedStore, InsertOutcome,
    LinkPlanner, MemoryChainLink, MessageRole, PublishedMessage, StoreResult, VigilConfig,
};

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Durable [`FeedStore`] + [`ChainStore`] backed by one SQLite file.
#[derive(Debug, Clone)]
pub struct LedgerSqlite {
    db_path: PathBuf,
}

impl LedgerSqlite {
    /// Open or create the ledger at `db_path` and ensure its tables exist.
    pub fn new(db_path: PathBuf) -> LedgerResult<Self> {
        let this = Self { db_path };
        this.init()?;
        Ok(this)
    }

    /// Open the ledger at the configured location (`<storage_path>/vigil/ledger.sqlite`).
    pub fn open_configured(config: &VigilConfig) -> LedgerResult<Self> {
        Self::new(config.ledger_path())
    }

    pub fn path(&self) -> &Path {
        &self.db_path
    }

    fn open(&self) -> LedgerResult<Connection> {
        let conn = Connection::open_with_flags(
            &self.db_path,
            OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_CREATE,
        )?;
        conn.busy_timeout(BUSY_TIMEOUT)?;
        Ok(conn)
    }

    fn init(&self) -> LedgerResult<()> {
        if let Some(parent) = self.db_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = self.open()?;
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS published_messages (
                id TEXT PRIMARY KEY,
                conversation_id TEXT NOT NULL,
                source_message_id TEXT NOT NULL,
                role TEXT NOT NULL,
                content TEXT NOT NULL,
                original_timestamp TEXT NOT NULL,
                redaction_applied INTEGER NOT NULL,
                matched_labels TEXT NOT NULL,
                blocked INTEGER NOT NULL DEFAULT 0,
                published_at TEXT NOT NULL,
                UNIQUE(conversation_id, source_message_id)
            );
            CREATE INDEX IF NOT EXISTS idx_published_conversation ON published_messages(conversation_id);

            CREATE TABLE IF NOT EXISTS audit_records (
                id TEXT PRIMARY KEY,
                conversation_id TEXT NOT NULL,
                source_message_id TEXT NOT NULL,
                published_message_id TEXT NULL,
                original_hash TEXT NOT NULL,
                redacted_hash TEXT NOT NULL,
                decision TEXT NOT NULL,
                layer INTEGER NOT NULL,
                matched_labels TEXT NOT NULL,
                processing_micros INTEGER NOT NULL,
                recorded_at TEXT NOT NULL,
                UNIQUE(conversation_id, source_message_id)
            );
            CREATE INDEX IF NOT EXISTS idx_audit_conversation ON audit_records(conversation_id);

            CREATE TABLE IF NOT EXISTS memory_chain_links (
                id TEXT PRIMARY KEY,
                chain_id TEXT NOT NULL,
                owner TEXT NOT NULL,
                source_agent TEXT NOT NULL,
                sequence INTEGER NOT NULL,
                previous_hash TEXT NOT NULL,
                content TEXT NULL,
                content_hash TEXT NOT NULL,
                source_document_hash TEXT NULL,
                created_at TEXT NOT NULL,
                link_hash TEXT NOT NULL,
                UNIQUE(chain_id, sequence)
            );
            "#,
        )?;
        Ok(())
    }

    fn insert_audit(conn: &Connection, audit: &AuditRecord) -> LedgerResult<usize> {
        let labels = serde_json::to_string(&audit.matched_labels)?;
        let changed = conn.execute(
            r#"
            INSERT INTO audit_records (id, conversation_id, source_message_id, published_message_id,
                original_hash, redacted_hash, decision, layer, matched_labels, processing_micros, recorded_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
            ON CONFLICT(conversation_id, source_message_id) DO NOTHING
            "#,
            params![
                audit.id,
                audit.conversation_id,
                audit.source_message_id,
                audit.published_message_id,
                audit.original_hash,
                audit.redacted_hash,
                audit.decision.as_str(),
                audit.layer,
                labels,
                to_i64(audit.processing_micros),
                precise_timestamp(&audit.recorded_at),
            ],
        )?;
        Ok(changed)
    }

    fn publish_tx(&self, message: &PublishedMessage, audit: &AuditRecord) -> LedgerResult<InsertOutcome> {
        let mut conn = self.open()?;
        let tx = conn.transaction()?;
        let labels = serde_json::to_string(&message.matched_labels)?;
        let inserted = tx.execute(
            r#"
            INSERT INTO published_messages (id, conversation_id, source_message_id, role, content,
                original_timestamp, redaction_applied, matched_labels, blocked, published_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            ON CONFLICT(conversation_id, source_message_id) DO NOTHING
            "#,
            params![
                message.id,
                message.conversation_id,
                message.source_message_id,
                message.role.as_str(),
                message.content,
                precise_timestamp(&message.original_timestamp),
                message.redaction_applied,
                labels,
                message.blocked,
                precise_timestamp(&message.published_at),
            ],
        )?;
        // A conflict on either table means this key was already handled; dropping `tx` rolls back.
        if inserted == 0 || Self::insert_audit(&tx, audit)? == 0 {
            return Ok(InsertOutcome::AlreadyPresent);
        }
        tx.commit()?;
        Ok(InsertOutcome::Inserted)
    }

    fn append_tx(&self, chain_id: &str, plan: &LinkPlanner<'_>) -> LedgerResult<Vec<MemoryChainLink>> {
        let mut conn = self.open()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let tail = tx
            .query_row(
                "SELECT sequence, link_hash FROM memory_chain_links WHERE chain_id = ?1 ORDER BY sequence DESC LIMIT 1",
                params![chain_id],
                |row| {
                    Ok(ChainTail {
                        sequence: from_i64(row, 0)?,
                        link_hash: row.get(1)?,
                    })
                },
            )
            .optional()?;
        let links = plan(tail.as_ref());
        {
            let mut stmt = tx.prepare(
                r#"
                INSERT INTO memory_chain_links (id, chain_id, owner, source_agent, sequence, previous_hash,
                    content, content_hash, source_document_hash, created_at, link_hash)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
                "#,
            )?;
            for link in &links {
                stmt.execute(params![
                    link.id,
                    link.chain_id,
                    link.owner,
                    link.source_agent,
                    to_i64(link.sequence),
                    link.previous_hash,
                    link.content,
                    link.content_hash,
                    link.source_document_hash,
                    canonical_timestamp(&link.created_at),
                    link.link_hash,
                ])?;
            }
        }
        tx.commit()?;
        Ok(links)
    }

    fn load_links(&self, chain_id: &str) -> LedgerResult<Vec<MemoryChainLink>> {
        let conn = self.open()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT id, chain_id, owner, source_agent, sequence, previous_hash, content, content_hash,
                source_document_hash, created_at, link_hash
            FROM memory_chain_links WHERE chain_id = ?1 ORDER BY sequence ASC
            "#,
        )?;
        let rows = stmt.query_map(params![chain_id], |row| {
            Ok(MemoryChainLink {
                id: row.get(0)?,
                chain_id: row.get(1)?,
                owner: row.get(2)?,
                source_agent: row.get(3)?,
                sequence: from_i64(row, 4)?,
                previous_hash: row.get(5)?,
                content: row.get(6)?,
                content_hash: row.get(7)?,
                source_document_hash: row.get(8)?,
                created_at: timestamp(row, 9)?,
                link_hash: row.get(10)?,
            })
        })?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    fn summary(&self, chain_id: &str) -> LedgerResult<Option<ChainSummary>> {
        let conn = self.open()?;
        let summary = conn
            .query_row(
                r#"
                SELECT id, sequence, (SELECT COUNT(*) FROM memory_chain_links WHERE chain_id = ?1)
                FROM memory_chain_links WHERE chain_id = ?1 ORDER BY sequence DESC LIMIT 1
                "#,
                params![chain_id],
                |row| {
                    Ok(ChainSummary {
                        latest_link_id: row.get(0)?,
                        max_sequence: from_i64(row, 1)?,
                        record_count: from_i64(row, 2)?,
                    })
                },
            )
            .optional()?;
        Ok(summary)
    }

    fn messages(&self, conversation_id: &str) -> LedgerResult<Vec<PublishedMessage>> {
        let conn = self.open()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT id, conversation_id, source_message_id, role, content, original_timestamp,
                redaction_applied, matched_labels, blocked, published_at
            FROM published_messages WHERE conversation_id = ?1 ORDER BY rowid ASC
            "#,
        )?;
        let rows = stmt.query_map(params![conversation_id], |row| {
            let role: String = row.get(3)?;
            Ok(PublishedMessage {
                id: row.get(0)?,
                conversation_id: row.get(1)?,
                source_message_id: row.get(2)?,
                role: MessageRole::parse(&role)
                    .ok_or_else(|| decode_failure(3, format!("unknown role {role:?}")))?,
                content: row.get(4)?,
                original_timestamp: timestamp(row, 5)?,
                redaction_applied: row.get(6)?,
                matched_labels: labels(row, 7)?,
                blocked: row.get(8)?,
                published_at: timestamp(row, 9)?,
            })
        })?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    fn audits(&self, conversation_id: &str) -> LedgerResult<Vec<AuditRecord>> {
        let conn = self.open()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT id, conversation_id, source_message_id, published_message_id, original_hash,
                redacted_hash, decision, layer, matched_labels, processing_micros, recorded_at
            FROM audit_records WHERE conversation_id = ?1 ORDER BY rowid ASC
            "#,
        )?;
        let rows = stmt.query_map(params![conversation_id], |row| {
            let decision: String = row.get(6)?;
            Ok(AuditRecord {
                id: row.get(0)?,
                conversation_id: row.get(1)?,
                source_message_id: row.get(2)?,
                published_message_id: row.get(3)?,
                original_hash: row.get(4)?,
                redacted_hash: row.get(5)?,
                decision: AuditDecision::parse(&decision)
                    .ok_or_else(|| decode_failure(6, format!("unknown decision {decision:?}")))?,
                layer: row.get(7)?,
                matched_labels: labels(row, 8)?,
                processing_micros: from_i64(row, 9)?,
                recorded_at: timestamp(row, 10)?,
            })
        })?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }
}

impl FeedStore for LedgerSqlite {
    fn record_publication(
        &self,
        message: &PublishedMessage,
        audit: &AuditRecord,
    ) -> StoreResult<InsertOutcome> {
        Ok(self.publish_tx(message, audit)?)
    }

    fn record_blocked(&self, audit: &AuditRecord) -> StoreResult<InsertOutcome> {
        let conn = self.open()?;
        Ok(match Self::insert_audit(&conn, audit)? {
            0 => InsertOutcome::AlreadyPresent,
            _ => InsertOutcome::Inserted,
        })
    }

    fn published_messages(&self, conversation_id: &str) -> StoreResult<Vec<PublishedMessage>> {
        Ok(self.messages(conversation_id)?)
    }

    fn audit_records(&self, conversation_id: &str) -> StoreResult<Vec<AuditRecord>> {
        Ok(self.audits(conversation_id)?)
    }
}

impl ChainStore for LedgerSqlite {
    fn append_links(
        &self,
        chain_id: &str,
        plan: &LinkPlanner<'_>,
    ) -> StoreResult<Vec<MemoryChainLink>> {
        let links = self.append_tx(chain_id, plan)?;
        tracing::debug!(
            target: "vigil::ledger",
            chain_id = %chain_id,
            appended = links.len(),
            "chain links committed"
        );
        Ok(links)
    }

    fn load_chain(&self, chain_id: &str) -> StoreResult<Vec<MemoryChainLink>> {
        Ok(self.load_links(chain_id)?)
    }

    fn chain_summary(&self, chain_id: &str) -> StoreResult<Option<ChainSummary>> {
        Ok(self.summary(chain_id)?)
    }
}

/// Feed timestamps keep full precision; chain timestamps use the canonical hashed form.
fn precise_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

fn decode_failure(idx: usize, msg: String) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(LedgerError::Decode(msg)))
}

fn timestamp(row: &Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    DateTime::parse_from_rfc3339(&raw)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn labels(row: &Row<'_>, idx: usize) -> rusqlite::Result<Vec<String>> {
    let raw: String = row.get(idx)?;
    serde_json::from_str(&raw)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn from_i64(row: &Row<'_>, idx: usize) -> rusqlite::Result<u64> {
    let raw: i64 = row.get(idx)?;
    u64::try_from(raw)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Integer, Box::new(e)))
}

fn to_i64(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_is_idempotent_and_creates_parent_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("ledger.sqlite");
        LedgerSqlite::new(path.clone()).unwrap();
        let again = LedgerSqlite::new(path.clone()).unwrap();
        assert_eq!(again.path(), path.as_path());
        assert!(again.summary("memory-chain/fact-extractor/x").unwrap().is_none());
    }

    #[test]
    fn bad_rows_surface_as_corrupt() {
        let dir = tempfile::tempdir().unwrap();
        let ledger = LedgerSqlite::new(dir.path().join("l.sqlite")).unwrap();
        let conn = ledger.open().unwrap();
        conn.execute(
            "INSERT INTO audit_records VALUES ('a','c','m',NULL,'h','h','shrug',0,'[]',0,'2026-01-01T00:00:00Z')",
            [],
        )
        .unwrap();
        let err = FeedStore::audit_records(&ledger, "c").unwrap_err();
        assert!(matches!(err, vigil_core::StoreError::Corrupt(_)), "{err}");
    }
}
