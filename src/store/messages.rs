use anyhow::{Context, Result};

use super::MessageStore;
use crate::message::Message;

const MESSAGE_COLUMNS: &str = "id, content, timestamp, author, git_commit_hash";

impl MessageStore {
    /// Insert a message and return it with its store-assigned id.
    /// `timestamp` must already be in canonical form.
    pub async fn add_message(
        &self,
        content: &str,
        author: Option<&str>,
        timestamp: &str,
    ) -> Result<Message> {
        let conn = self.conn.lock().await;
        conn.execute(
            "INSERT INTO messages (content, timestamp, author) VALUES (?1, ?2, ?3)",
            rusqlite::params![content, timestamp, author],
        )
        .context("Failed to add message")?;

        Ok(Message {
            id: conn.last_insert_rowid(),
            content: content.to_string(),
            author: author.map(str::to_string),
            timestamp: timestamp.to_string(),
            git_commit_hash: None,
        })
    }

    /// Newest first; equal timestamps fall back to insertion order, newest first.
    pub async fn get_messages(&self, limit: u32, offset: u32) -> Result<Vec<Message>> {
        let conn = self.conn.lock().await;
        let sql = format!(
            "SELECT {} FROM messages
             ORDER BY timestamp DESC, id DESC
             LIMIT ?1 OFFSET ?2",
            MESSAGE_COLUMNS
        );
        let mut stmt = conn.prepare(&sql).context("Failed to prepare list query")?;
        let messages = stmt
            .query_map(rusqlite::params![limit, offset], parse_message_row)?
            .collect::<rusqlite::Result<Vec<_>>>()
            .context("Failed to retrieve messages")?;
        Ok(messages)
    }

    pub async fn count_messages(&self) -> Result<u64> {
        let conn = self.conn.lock().await;
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM messages", [], |row| row.get(0))
            .context("Failed to count messages")?;
        Ok(count as u64)
    }

    pub async fn get_message(&self, id: i64) -> Result<Option<Message>> {
        let conn = self.conn.lock().await;
        let sql = format!("SELECT {} FROM messages WHERE id = ?1", MESSAGE_COLUMNS);
        let mut stmt = conn.prepare(&sql).context("Failed to prepare get query")?;
        let mut rows = stmt
            .query_map(rusqlite::params![id], parse_message_row)
            .context("Failed to query message by id")?;
        match rows.next() {
            Some(Ok(message)) => Ok(Some(message)),
            Some(Err(e)) => Err(e).context("Failed to read message row"),
            None => Ok(None),
        }
    }

    /// Attach the remote commit reference once the mirror push went through.
    pub async fn set_commit_hash(&self, id: i64, hash: &str) -> Result<()> {
        let conn = self.conn.lock().await;
        let changed = conn
            .execute(
                "UPDATE messages SET git_commit_hash = ?1 WHERE id = ?2",
                rusqlite::params![hash, id],
            )
            .context("Failed to record commit hash")?;
        if changed == 0 {
            anyhow::bail!("No message with id {}", id);
        }
        Ok(())
    }
}

fn parse_message_row(row: &rusqlite::Row) -> rusqlite::Result<Message> {
    Ok(Message {
        id: row.get(0)?,
        content: row.get(1)?,
        timestamp: row.get(2)?,
        author: row.get(3)?,
        git_commit_hash: row.get(4)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn seeded() -> MessageStore {
        let store = MessageStore::open_in_memory().unwrap();
        store
            .add_message("first", Some("ann"), "2025-01-01T00:00:00.000000Z")
            .await
            .unwrap();
        store
            .add_message("third", None, "2025-03-01T00:00:00.000000Z")
            .await
            .unwrap();
        store
            .add_message("second", Some("bob"), "2025-02-01T00:00:00.000000Z")
            .await
            .unwrap();
        store
    }

    #[tokio::test]
    async fn test_add_assigns_increasing_ids() {
        let store = MessageStore::open_in_memory().unwrap();
        let a = store
            .add_message("a", None, "2025-01-01T00:00:00.000000Z")
            .await
            .unwrap();
        let b = store
            .add_message("b", Some("me"), "2024-01-01T00:00:00.000000Z")
            .await
            .unwrap();
        assert!(b.id > a.id);
        assert_eq!(b.author.as_deref(), Some("me"));
        assert!(b.git_commit_hash.is_none());
    }

    #[tokio::test]
    async fn test_list_is_newest_first() {
        let store = seeded().await;
        let all = store.get_messages(100, 0).await.unwrap();
        let contents: Vec<&str> = all.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["third", "second", "first"]);
    }

    #[tokio::test]
    async fn test_list_limit_and_offset() {
        let store = seeded().await;
        let page = store.get_messages(1, 1).await.unwrap();
        assert_eq!(page.len(), 1);
        assert_eq!(page[0].content, "second");

        let past_end = store.get_messages(10, 5).await.unwrap();
        assert!(past_end.is_empty());
        assert_eq!(store.count_messages().await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_same_timestamp_orders_by_id() {
        let store = MessageStore::open_in_memory().unwrap();
        let ts = "2025-06-01T12:00:00.000000Z";
        store.add_message("older", None, ts).await.unwrap();
        store.add_message("newer", None, ts).await.unwrap();

        let all = store.get_messages(10, 0).await.unwrap();
        assert_eq!(all[0].content, "newer");
        assert_eq!(all[1].content, "older");
    }

    #[tokio::test]
    async fn test_get_and_set_commit_hash() {
        let store = seeded().await;
        let first = store.get_message(1).await.unwrap().unwrap();
        assert_eq!(first.content, "first");
        assert!(store.get_message(99).await.unwrap().is_none());

        store.set_commit_hash(1, "abc123").await.unwrap();
        let first = store.get_message(1).await.unwrap().unwrap();
        assert_eq!(first.git_commit_hash.as_deref(), Some("abc123"));

        assert!(store.set_commit_hash(99, "nope").await.is_err());
    }
}
