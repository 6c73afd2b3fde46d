use crate::{Store, StoreError};
use formforge_model::UserId;
use rusqlite::{params, OptionalExtension};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionRow {
    pub id: i64,
    pub user_id: UserId,
    pub token_hash: String,
    pub expires_at: i64,
}

impl Store {
    pub fn insert_session(
        &mut self,
        user_id: &UserId,
        token_hash: &str,
        expires_at: i64,
    ) -> Result<i64, StoreError> {
        self.conn.execute(
            "INSERT INTO sessions (user_id, token_hash, expires_at) VALUES (?1, ?2, ?3)",
            params![user_id.as_str(), token_hash, expires_at],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    /// Looks up a session by row id, dropping it when already expired.
    pub fn find_session(&self, id: i64, now: i64) -> Result<Option<SessionRow>, StoreError> {
        let row = self
            .conn
            .query_row(
                "SELECT id, user_id, token_hash, expires_at FROM sessions WHERE id = ?1",
                params![id],
                |r| {
                    let raw_user: String = r.get(1)?;
                    Ok((
                        r.get::<_, i64>(0)?,
                        raw_user,
                        r.get::<_, String>(2)?,
                        r.get::<_, i64>(3)?,
                    ))
                },
            )
            .optional()?;
        let Some((id, raw_user, token_hash, expires_at)) = row else {
            return Ok(None);
        };
        if expires_at <= now {
            return Ok(None);
        }
        let user_id = UserId::parse(&raw_user).map_err(StoreError::internal)?;
        Ok(Some(SessionRow {
            id,
            user_id,
            token_hash,
            expires_at,
        }))
    }

    /// The token embeds the session row id, so the row is created first and
    /// the hash of the finished token lands here.
    pub fn set_session_token_hash(&mut self, id: i64, token_hash: &str) -> Result<(), StoreError> {
        self.conn.execute(
            "UPDATE sessions SET token_hash = ?1 WHERE id = ?2",
            params![token_hash, id],
        )?;
        Ok(())
    }

    pub fn delete_session(&mut self, id: i64) -> Result<(), StoreError> {
        self.conn
            .execute("DELETE FROM sessions WHERE id = ?1", params![id])?;
        Ok(())
    }

    pub fn purge_expired_sessions(&mut self, now: i64) -> Result<u64, StoreError> {
        let purged = self
            .conn
            .execute("DELETE FROM sessions WHERE expires_at <= ?1", params![now])?;
        Ok(purged as u64)
    }
}
