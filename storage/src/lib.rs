//! Sqlite-backed collaborators.
//!
//! One [`Database`] handle implements both the balance ledger and the
//! per-destination message-id store. All access funnels through a single
//! connection behind a mutex; the conditional UPDATE in [`Ledger::adjust`]
//! is what makes balance mutations atomic; there is no read-modify-write
//! anywhere.

use std::path::Path;
use std::sync::Mutex;

use anyhow::Context;
use rusqlite::{params, Connection, OptionalExtension};
use tracing::info;

use inu_types::{ChannelId, Ledger, LedgerError, MessageId, StatusStore, StoreError, UserId};

pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    pub fn open(path: &Path) -> anyhow::Result<Self> {
        let conn = Connection::open(path).context("open bot database")?;
        init_schema(&conn)?;
        info!(path = %path.display(), "database opened");
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub fn open_in_memory() -> anyhow::Result<Self> {
        let conn = Connection::open_in_memory().context("open in-memory database")?;
        init_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn with_conn<R>(
        &self,
        op: impl FnOnce(&Connection) -> rusqlite::Result<R>,
    ) -> Result<R, String> {
        let conn = self
            .conn
            .lock()
            .map_err(|_| "database lock poisoned".to_string())?;
        op(&conn).map_err(|err| err.to_string())
    }
}

fn init_schema(conn: &Connection) -> anyhow::Result<()> {
    conn.execute_batch(
        "PRAGMA journal_mode=WAL;
         PRAGMA synchronous=NORMAL;
         CREATE TABLE IF NOT EXISTS economy (
             user_id INTEGER PRIMARY KEY,
             balance INTEGER NOT NULL DEFAULT 0
         );
         CREATE TABLE IF NOT EXISTS stock_status_messages (
             channel_id INTEGER PRIMARY KEY,
             message_id INTEGER NOT NULL
         );
         CREATE TABLE IF NOT EXISTS stock_alert_messages (
             channel_id INTEGER PRIMARY KEY,
             message_id INTEGER NOT NULL
         );",
    )
    .context("init bot database schema")?;
    Ok(())
}

impl Ledger for Database {
    async fn balance(&self, user: UserId) -> Result<i64, LedgerError> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT balance FROM economy WHERE user_id = ?1",
                params![user.0 as i64],
                |row| row.get(0),
            )
            .optional()
        })
        .map(|balance| balance.unwrap_or(0))
        .map_err(LedgerError::Backend)
    }

    async fn adjust(&self, user: UserId, delta: i64) -> Result<bool, LedgerError> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT OR IGNORE INTO economy (user_id, balance) VALUES (?1, 0)",
                params![user.0 as i64],
            )?;
            // The condition rides inside the UPDATE: either the whole delta
            // lands or nothing does.
            conn.execute(
                "UPDATE economy SET balance = balance + ?2
                 WHERE user_id = ?1 AND balance + ?2 >= 0",
                params![user.0 as i64, delta],
            )
        })
        .map(|updated| updated > 0)
        .map_err(LedgerError::Backend)
    }
}

impl StatusStore for Database {
    async fn status_message(&self, channel: ChannelId) -> Result<Option<MessageId>, StoreError> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT message_id FROM stock_status_messages WHERE channel_id = ?1",
                params![channel.0 as i64],
                |row| row.get::<_, i64>(0),
            )
            .optional()
        })
        .map(|id| id.map(|id| MessageId(id as u64)))
        .map_err(StoreError::Backend)
    }

    async fn set_status_message(
        &self,
        channel: ChannelId,
        message: MessageId,
    ) -> Result<(), StoreError> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT OR REPLACE INTO stock_status_messages (channel_id, message_id)
                 VALUES (?1, ?2)",
                params![channel.0 as i64, message.0 as i64],
            )
        })
        .map(|_| ())
        .map_err(StoreError::Backend)
    }

    async fn clear_status_message(&self, channel: ChannelId) -> Result<(), StoreError> {
        self.with_conn(|conn| {
            conn.execute(
                "DELETE FROM stock_status_messages WHERE channel_id = ?1",
                params![channel.0 as i64],
            )
        })
        .map(|_| ())
        .map_err(StoreError::Backend)
    }

    async fn alert_message(&self, channel: ChannelId) -> Result<Option<MessageId>, StoreError> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT message_id FROM stock_alert_messages WHERE channel_id = ?1",
                params![channel.0 as i64],
                |row| row.get::<_, i64>(0),
            )
            .optional()
        })
        .map(|id| id.map(|id| MessageId(id as u64)))
        .map_err(StoreError::Backend)
    }

    async fn set_alert_message(
        &self,
        channel: ChannelId,
        message: MessageId,
    ) -> Result<(), StoreError> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT OR REPLACE INTO stock_alert_messages (channel_id, message_id)
                 VALUES (?1, ?2)",
                params![channel.0 as i64, message.0 as i64],
            )
        })
        .map(|_| ())
        .map_err(StoreError::Backend)
    }
}
