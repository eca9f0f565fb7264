use std::sync::Mutex;

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Row};
use tracing::instrument;

use conclave_core::MessageType;

use crate::error::{Result, StoreError};
use crate::types::{FileAttachment, HistoryPage, Message, SearchHit, SearchPage};

/// Manages messages, attachments, and full-text search over them (C2b).
pub struct MessageStore {
    db: Mutex<Connection>,
}

impl MessageStore {
    pub fn new(conn: Connection) -> Self {
        Self { db: Mutex::new(conn) }
    }

    /// Append a message to the tail of `branch_id`, atomically advancing the
    /// previous tail's `chosen_next_id`.
    #[instrument(skip(self, text, attachments), fields(branch_id, ty = %message_type))]
    pub fn append_message(
        &self,
        branch_id: i64,
        message_type: MessageType,
        text: &str,
        attachments: &[FileAttachment],
        model: Option<&str>,
        cumul_token_count: i64,
    ) -> Result<i64> {
        let mut db = self.db.lock().unwrap();
        let tx = db.transaction()?;
        let now = Utc::now().to_rfc3339();

        let tail_id: Option<i64> = tx
            .query_row(
                "SELECT id FROM messages WHERE branch_id = ?1 ORDER BY id DESC LIMIT 1",
                params![branch_id],
                |r| r.get(0),
            )
            .optional()?;

        tx.execute(
            "INSERT INTO messages
             (branch_id, parent_message_id, chosen_next_id, text, type, cumul_token_count, model, created_at, generation, indexed)
             VALUES (?1, ?2, NULL, ?3, ?4, ?5, ?6, ?7, 0, 1)",
            params![
                branch_id,
                tail_id,
                text,
                message_type.as_str(),
                cumul_token_count,
                model,
                now
            ],
        )?;
        let message_id = tx.last_insert_rowid();

        if let Some(tid) = tail_id {
            let updated = tx.execute(
                "UPDATE messages SET chosen_next_id = ?1 WHERE id = ?2 AND chosen_next_id IS NULL",
                params![message_id, tid],
            )?;
            if updated == 0 {
                return Err(StoreError::TailConflict(tid));
            }
        }

        for (ordinal, att) in attachments.iter().enumerate() {
            tx.execute(
                "INSERT INTO message_attachments (message_id, ordinal, file_name, mime_type, hash)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![message_id, ordinal as i64, att.file_name, att.mime_type, att.hash],
            )?;
        }

        tx.execute(
            "INSERT INTO messages_fts(rowid, text) VALUES (?1, ?2)",
            params![message_id, text],
        )?;

        tx.commit()?;
        Ok(message_id)
    }

    #[instrument(skip(self))]
    pub fn get_message(&self, id: i64) -> Result<Message> {
        let db = self.db.lock().unwrap();
        let mut message = db
            .query_row("SELECT * FROM messages WHERE id = ?1", params![id], row_to_message)
            .optional()?
            .ok_or(StoreError::MessageNotFound(id))?;
        message.attachments = self.load_attachments(&db, id)?;
        Ok(message)
    }

    /// Newest-first page of history, capped at `limit + 1` entries so the
    /// caller can detect `has_more` without a second round trip.
    #[instrument(skip(self))]
    pub fn get_history(
        &self,
        branch_id: i64,
        before_message_id: Option<i64>,
        limit: usize,
    ) -> Result<HistoryPage> {
        let db = self.db.lock().unwrap();
        let fetch = limit + 1;
        let mut stmt = match before_message_id {
            Some(_) => db.prepare(
                "SELECT * FROM messages WHERE branch_id = ?1 AND id < ?2 ORDER BY id DESC LIMIT ?3",
            )?,
            None => db.prepare("SELECT * FROM messages WHERE branch_id = ?1 ORDER BY id DESC LIMIT ?2")?,
        };
        let mut rows: Vec<Message> = if let Some(before) = before_message_id {
            stmt.query_map(params![branch_id, before, fetch as i64], row_to_message)?
                .collect::<std::result::Result<Vec<_>, _>>()?
        } else {
            stmt.query_map(params![branch_id, fetch as i64], row_to_message)?
                .collect::<std::result::Result<Vec<_>, _>>()?
        };

        let has_more = rows.len() > limit;
        rows.truncate(limit);
        for msg in &mut rows {
            msg.attachments = self.load_attachments(&db, msg.id)?;
        }
        Ok(HistoryPage { messages: rows, has_more })
    }

    #[instrument(skip(self, attachment))]
    pub fn append_attachment_ref(&self, message_id: i64, attachment: &FileAttachment) -> Result<()> {
        let db = self.db.lock().unwrap();
        let next_ordinal: i64 = db.query_row(
            "SELECT COALESCE(MAX(ordinal) + 1, 0) FROM message_attachments WHERE message_id = ?1",
            params![message_id],
            |r| r.get(0),
        )?;
        db.execute(
            "INSERT INTO message_attachments (message_id, ordinal, file_name, mime_type, hash)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![message_id, next_ordinal, attachment.file_name, attachment.mime_type, attachment.hash],
        )?;
        Ok(())
    }

    #[instrument(skip(self))]
    pub fn list_attachments_for(&self, message_id: i64) -> Result<Vec<FileAttachment>> {
        let db = self.db.lock().unwrap();
        self.load_attachments(&db, message_id)
    }

    fn load_attachments(&self, db: &Connection, message_id: i64) -> Result<Vec<FileAttachment>> {
        let mut stmt = db.prepare(
            "SELECT file_name, mime_type, hash FROM message_attachments
             WHERE message_id = ?1 ORDER BY ordinal",
        )?;
        let rows = stmt
            .query_map(params![message_id], |r| {
                Ok(FileAttachment {
                    file_name: r.get(0)?,
                    mime_type: r.get(1)?,
                    hash: r.get(2)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Full-text search over message text, keyset-paginated newest-first by
    /// `max_id` (results strictly below `max_id`, or unbounded on first page).
    #[instrument(skip(self, query))]
    pub fn search(&self, query: &str, max_id: Option<i64>, limit: usize) -> Result<SearchPage> {
        let db = self.db.lock().unwrap();
        let fetch = limit + 1;
        let mut stmt = db.prepare(
            "SELECT m.id, m.branch_id, m.created_at,
                    snippet(messages_fts, 0, '<mark>', '</mark>', '...', 10)
             FROM messages_fts f
             JOIN messages m ON m.id = f.rowid
             WHERE messages_fts MATCH ?1 AND m.id < ?2
             ORDER BY m.id DESC
             LIMIT ?3",
        )?;
        let upper = max_id.unwrap_or(i64::MAX);
        let mut hits: Vec<SearchHit> = stmt
            .query_map(params![query, upper, fetch as i64], |r| {
                Ok(SearchHit {
                    message_id: r.get(0)?,
                    branch_id: r.get(1)?,
                    created_at: r.get(2)?,
                    snippet: r.get(3)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let has_more = hits.len() > limit;
        hits.truncate(limit);
        let next_max_id = hits.last().map(|h| h.message_id);
        Ok(SearchPage { hits, has_more, next_max_id })
    }

    /// Append a streamed text fragment to an in-progress message, keeping
    /// the full-text index in sync. Used by the turn engine to grow a
    /// `model`/`thought` row as the provider streams deltas, rather than
    /// inserting one row per fragment.
    #[instrument(skip(self, fragment))]
    pub fn append_text(&self, message_id: i64, fragment: &str) -> Result<()> {
        let db = self.db.lock().unwrap();
        db.execute(
            "UPDATE messages SET text = text || ?1 WHERE id = ?2",
            params![fragment, message_id],
        )?;
        db.execute(
            "UPDATE messages_fts SET text = text || ?1 WHERE rowid = ?2",
            params![fragment, message_id],
        )?;
        Ok(())
    }

    #[instrument(skip(self))]
    pub fn set_cumul_token_count(&self, message_id: i64, count: i64) -> Result<()> {
        let db = self.db.lock().unwrap();
        db.execute(
            "UPDATE messages SET cumul_token_count = ?1 WHERE id = ?2",
            params![count, message_id],
        )?;
        Ok(())
    }

    /// Drop messages from future curated-history views (§4.7.4 compaction)
    /// without deleting them; they remain visible in full history and search.
    #[instrument(skip(self, message_ids))]
    pub fn mark_unindexed(&self, message_ids: &[i64]) -> Result<()> {
        let db = self.db.lock().unwrap();
        for id in message_ids {
            db.execute("UPDATE messages SET indexed = 0 WHERE id = ?1", params![id])?;
        }
        Ok(())
    }
}

fn row_to_message(row: &Row) -> rusqlite::Result<Message> {
    let type_str: String = row.get("type")?;
    let message_type = type_str.parse().map_err(|_| {
        rusqlite::Error::FromSqlConversionFailure(
            0,
            rusqlite::types::Type::Text,
            format!("unknown message type: {type_str}").into(),
        )
    })?;
    Ok(Message {
        id: row.get("id")?,
        branch_id: row.get("branch_id")?,
        parent_message_id: row.get("parent_message_id")?,
        chosen_next_id: row.get("chosen_next_id")?,
        text: row.get("text")?,
        message_type,
        attachments: Vec::new(),
        cumul_token_count: row.get("cumul_token_count")?,
        model: row.get("model")?,
        created_at: row.get("created_at")?,
        generation: row.get("generation")?,
        indexed: row.get::<_, i64>("indexed")? != 0,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> MessageStore {
        let conn = Connection::open_in_memory().unwrap();
        crate::db::init_db(&conn).unwrap();
        MessageStore::new(conn)
    }

    #[test]
    fn append_chains_tail() {
        let s = store();
        let first = s.append_message(1, MessageType::User, "hi", &[], None, 0).unwrap();
        let second = s.append_message(1, MessageType::Model, "hello", &[], Some("gpt"), 5).unwrap();
        let m1 = s.get_message(first).unwrap();
        assert_eq!(m1.chosen_next_id, Some(second));
        let m2 = s.get_message(second).unwrap();
        assert_eq!(m2.parent_message_id, Some(first));
    }

    #[test]
    fn history_caps_at_limit_plus_one() {
        let s = store();
        for i in 0..5 {
            s.append_message(1, MessageType::User, &format!("msg{i}"), &[], None, 0).unwrap();
        }
        let page = s.get_history(1, None, 3).unwrap();
        assert_eq!(page.messages.len(), 3);
        assert!(page.has_more);
        assert_eq!(page.messages[0].text, "msg4");
    }

    #[test]
    fn history_without_more_reports_false() {
        let s = store();
        s.append_message(1, MessageType::User, "only", &[], None, 0).unwrap();
        let page = s.get_history(1, None, 5).unwrap();
        assert_eq!(page.messages.len(), 1);
        assert!(!page.has_more);
    }

    #[test]
    fn search_finds_marked_snippet() {
        let s = store();
        s.append_message(1, MessageType::User, "the quick brown fox", &[], None, 0).unwrap();
        let page = s.search("quick", None, 10).unwrap();
        assert_eq!(page.hits.len(), 1);
        assert!(page.hits[0].snippet.contains("<mark>quick</mark>"));
    }

    #[test]
    fn attachments_roundtrip() {
        let s = store();
        let att = FileAttachment {
            file_name: "a.png".into(),
            mime_type: "image/png".into(),
            hash: "deadbeef".into(),
        };
        let id = s.append_message(1, MessageType::User, "pic", std::slice::from_ref(&att), None, 0).unwrap();
        assert_eq!(s.list_attachments_for(id).unwrap().len(), 1);
        let att2 = FileAttachment {
            file_name: "b.png".into(),
            mime_type: "image/png".into(),
            hash: "cafef00d".into(),
        };
        s.append_attachment_ref(id, &att2).unwrap();
        assert_eq!(s.list_attachments_for(id).unwrap().len(), 2);
    }
}
