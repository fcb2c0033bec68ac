use rusqlite::{Connection, OptionalExtension};

use inspectsync_core::{DraftKey, EntityId, SectionDraft, Snapshot};

use crate::error::StorageError;
use crate::traits::{DraftStore, ListCacheEntry, ListCacheStore};

/// Convert Vec<u8> to fixed-size array with proper error handling.
fn to_array<const N: usize>(v: Vec<u8>, label: &str) -> Result<[u8; N], StorageError> {
    v.try_into()
        .map_err(|_| StorageError::Serialization(format!("invalid {label} length")))
}

pub struct SqliteStorage {
    conn: Connection,
}

impl SqliteStorage {
    pub fn open(path: &str) -> Result<Self, StorageError> {
        let conn = Connection::open(path)?;
        crate::schema::init_schema(&conn)?;
        Ok(Self { conn })
    }

    pub fn open_in_memory() -> Result<Self, StorageError> {
        let conn = Connection::open_in_memory()?;
        crate::schema::init_schema(&conn)?;
        Ok(Self { conn })
    }

    pub fn schema_version(&self) -> Result<i32, StorageError> {
        let version = self
            .conn
            .query_row("SELECT MAX(version) FROM schema_version", [], |row| row.get(0))?;
        Ok(version)
    }
}

impl DraftStore for SqliteStorage {
    fn get_draft(&self, key: &DraftKey) -> Result<Option<SectionDraft>, StorageError> {
        let payload: Option<String> = self
            .conn
            .query_row(
                "SELECT payload FROM drafts WHERE entity_id = ?1 AND section = ?2",
                rusqlite::params![key.entity_id.as_str(), key.section.as_str()],
                |row| row.get(0),
            )
            .optional()?;
        match payload {
            Some(json) => Ok(Some(SectionDraft::from_json(&json)?)),
            None => Ok(None),
        }
    }

    fn draft_snapshot(&self, key: &DraftKey) -> Result<Option<Snapshot>, StorageError> {
        let bytes: Option<Vec<u8>> = self
            .conn
            .query_row(
                "SELECT snapshot FROM drafts WHERE entity_id = ?1 AND section = ?2",
                rusqlite::params![key.entity_id.as_str(), key.section.as_str()],
                |row| row.get(0),
            )
            .optional()?;
        match bytes {
            Some(b) => Ok(Some(Snapshot::from_bytes(to_array::<32>(b, "snapshot")?))),
            None => Ok(None),
        }
    }

    fn put_draft(&mut self, draft: &SectionDraft, snapshot: Snapshot) -> Result<(), StorageError> {
        let payload = draft.to_json()?;
        self.conn.execute(
            "INSERT INTO drafts (entity_id, section, payload, snapshot, updated_at) VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(entity_id, section) DO UPDATE SET payload = excluded.payload, snapshot = excluded.snapshot, updated_at = excluded.updated_at",
            rusqlite::params![
                draft.key.entity_id.as_str(),
                draft.key.section.as_str(),
                payload,
                &snapshot.as_bytes()[..],
                draft.last_modified_ms as i64,
            ],
        )?;
        Ok(())
    }

    fn drafts_for_entity(&self, entity_id: &EntityId) -> Result<Vec<SectionDraft>, StorageError> {
        let mut stmt = self
            .conn
            .prepare("SELECT payload FROM drafts WHERE entity_id = ?1 ORDER BY section")?;
        let payloads = stmt
            .query_map(rusqlite::params![entity_id.as_str()], |row| {
                row.get::<_, String>(0)
            })?
            .collect::<Result<Vec<_>, _>>()?;
        payloads
            .iter()
            .map(|json| SectionDraft::from_json(json).map_err(StorageError::from))
            .collect()
    }
}

impl ListCacheStore for SqliteStorage {
    fn get_list(&self, key: &str) -> Result<Option<ListCacheEntry>, StorageError> {
        let row: Option<(String, i64)> = self
            .conn
            .query_row(
                "SELECT items, fetched_at FROM list_cache WHERE cache_key = ?1",
                rusqlite::params![key],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;
        let Some((items_json, fetched_at)) = row else {
            return Ok(None);
        };
        let items = serde_json::from_str(&items_json)
            .map_err(|e| StorageError::Serialization(e.to_string()))?;
        Ok(Some(ListCacheEntry {
            items,
            fetched_at_ms: fetched_at.max(0) as u64,
        }))
    }

    fn put_list(&mut self, key: &str, entry: &ListCacheEntry) -> Result<(), StorageError> {
        let items_json = serde_json::to_string(&entry.items)
            .map_err(|e| StorageError::Serialization(e.to_string()))?;
        self.conn.execute(
            "INSERT INTO list_cache (cache_key, items, fetched_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(cache_key) DO UPDATE SET items = excluded.items, fetched_at = excluded.fetched_at",
            rusqlite::params![key, items_json, entry.fetched_at_ms as i64],
        )?;
        Ok(())
    }
}
