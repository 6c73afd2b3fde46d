use crate::{Store, StoreError, StoreErrorCode};
use formforge_model::{User, UserId};
use rusqlite::{params, OptionalExtension, Row};

fn read_user(row: &Row<'_>) -> rusqlite::Result<User> {
    let raw_id: String = row.get(0)?;
    Ok(User {
        id: UserId::parse(&raw_id).map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(
                0,
                rusqlite::types::Type::Text,
                Box::new(e),
            )
        })?,
        name: row.get(1)?,
        email: row.get(2)?,
        password_digest: row.get(3)?,
        subscribed: row.get::<_, i64>(4)? != 0,
        billing_customer_id: row.get(5)?,
        created_at: row.get(6)?,
    })
}

const USER_COLUMNS: &str =
    "id, name, email, password_digest, subscribed, billing_customer_id, created_at";

impl Store {
    pub fn create_user(
        &mut self,
        id: &UserId,
        name: &str,
        email: &str,
        password_digest: &str,
        created_at: i64,
    ) -> Result<(), StoreError> {
        let inserted = self.conn.execute(
            "INSERT INTO users (id, name, email, password_digest, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![id.as_str(), name, email, password_digest, created_at],
        )?;
        if inserted != 1 {
            return Err(StoreError::new(
                StoreErrorCode::Internal,
                "user insert affected no rows",
            ));
        }
        Ok(())
    }

    pub fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        self.conn
            .query_row(
                &format!("SELECT {USER_COLUMNS} FROM users WHERE email = ?1"),
                params![email],
                read_user,
            )
            .optional()
            .map_err(StoreError::from)
    }

    pub fn find_user_by_id(&self, id: &UserId) -> Result<Option<User>, StoreError> {
        self.conn
            .query_row(
                &format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1"),
                params![id.as_str()],
                read_user,
            )
            .optional()
            .map_err(StoreError::from)
    }

    pub fn update_user_profile(
        &mut self,
        id: &UserId,
        name: Option<&str>,
        email: Option<&str>,
        password_digest: Option<&str>,
    ) -> Result<(), StoreError> {
        let tx = self.conn.transaction()?;
        if let Some(name) = name {
            tx.execute(
                "UPDATE users SET name = ?1 WHERE id = ?2",
                params![name, id.as_str()],
            )?;
        }
        if let Some(email) = email {
            tx.execute(
                "UPDATE users SET email = ?1 WHERE id = ?2",
                params![email, id.as_str()],
            )?;
        }
        if let Some(digest) = password_digest {
            tx.execute(
                "UPDATE users SET password_digest = ?1 WHERE id = ?2",
                params![digest, id.as_str()],
            )?;
        }
        tx.commit()?;
        Ok(())
    }

    pub fn attach_billing_customer(
        &mut self,
        id: &UserId,
        customer_id: &str,
    ) -> Result<(), StoreError> {
        let updated = self.conn.execute(
            "UPDATE users SET billing_customer_id = ?1 WHERE id = ?2",
            params![customer_id, id.as_str()],
        )?;
        if updated == 0 {
            return Err(StoreError::new(StoreErrorCode::NotFound, "user not found"));
        }
        Ok(())
    }

    /// Flips the subscription flag for whichever user owns the billing
    /// customer id. Returns how many rows changed; webhooks for unknown
    /// customers are a no-op, not an error.
    pub fn set_subscribed_by_customer(
        &mut self,
        customer_id: &str,
        subscribed: bool,
    ) -> Result<u64, StoreError> {
        let updated = self.conn.execute(
            "UPDATE users SET subscribed = ?1 WHERE billing_customer_id = ?2",
            params![subscribed as i64, customer_id],
        )?;
        Ok(updated as u64)
    }
}
