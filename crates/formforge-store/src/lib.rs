// SPDX-License-Identifier: Apache-2.0

#![forbid(unsafe_code)]

use rusqlite::Connection;
use std::fmt::{Display, Formatter};
use std::path::Path;

mod forms;
mod sessions;
mod submissions;
mod users;

pub use sessions::SessionRow;

pub const CRATE_NAME: &str = "formforge-store";
pub const SCHEMA_VERSION: i64 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum StoreErrorCode {
    NotFound,
    Conflict,
    Validation,
    Io,
    Internal,
}

impl StoreErrorCode {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::NotFound => "not_found",
            Self::Conflict => "conflict",
            Self::Validation => "validation_error",
            Self::Io => "io_error",
            Self::Internal => "internal_error",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreError {
    pub code: StoreErrorCode,
    pub message: String,
}

impl StoreError {
    #[must_use]
    pub fn new(code: StoreErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub(crate) fn internal(e: impl Display) -> Self {
        Self::new(StoreErrorCode::Internal, e.to_string())
    }
}

impl Display for StoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code.as_str(), self.message)
    }
}

impl std::error::Error for StoreError {}

impl From<rusqlite::Error> for StoreError {
    fn from(e: rusqlite::Error) -> Self {
        match &e {
            rusqlite::Error::SqliteFailure(inner, _)
                if inner.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                Self::new(StoreErrorCode::Conflict, e.to_string())
            }
            rusqlite::Error::QueryReturnedNoRows => {
                Self::new(StoreErrorCode::NotFound, e.to_string())
            }
            _ => Self::internal(e),
        }
    }
}

const SCHEMA_SQL: &str = "
CREATE TABLE users (
  id TEXT PRIMARY KEY,
  name TEXT NOT NULL,
  email TEXT NOT NULL UNIQUE,
  password_digest TEXT NOT NULL,
  subscribed INTEGER NOT NULL DEFAULT 0,
  billing_customer_id TEXT,
  created_at INTEGER NOT NULL
);
CREATE TABLE sessions (
  id INTEGER PRIMARY KEY AUTOINCREMENT,
  user_id TEXT NOT NULL REFERENCES users(id),
  token_hash TEXT NOT NULL,
  expires_at INTEGER NOT NULL
);
CREATE TABLE forms (
  id INTEGER PRIMARY KEY AUTOINCREMENT,
  owner_id TEXT NOT NULL REFERENCES users(id),
  name TEXT NOT NULL,
  description TEXT NOT NULL,
  published INTEGER NOT NULL DEFAULT 0,
  created_at INTEGER NOT NULL
);
CREATE TABLE questions (
  id INTEGER PRIMARY KEY AUTOINCREMENT,
  form_id INTEGER NOT NULL REFERENCES forms(id),
  text TEXT NOT NULL,
  field_type TEXT NOT NULL,
  required INTEGER NOT NULL DEFAULT 0,
  position INTEGER NOT NULL
);
CREATE TABLE field_options (
  id INTEGER PRIMARY KEY AUTOINCREMENT,
  question_id INTEGER NOT NULL REFERENCES questions(id),
  text TEXT NOT NULL,
  value TEXT NOT NULL
);
CREATE TABLE submissions (
  id INTEGER PRIMARY KEY AUTOINCREMENT,
  form_id INTEGER NOT NULL REFERENCES forms(id),
  respondent_id TEXT REFERENCES users(id),
  submitted_at INTEGER NOT NULL
);
CREATE TABLE answers (
  id INTEGER PRIMARY KEY AUTOINCREMENT,
  submission_id INTEGER NOT NULL REFERENCES submissions(id),
  question_id INTEGER NOT NULL REFERENCES questions(id),
  value TEXT,
  option_id INTEGER REFERENCES field_options(id)
);
CREATE TABLE forge_meta (
  k TEXT PRIMARY KEY,
  v TEXT NOT NULL
) WITHOUT ROWID;
CREATE INDEX idx_sessions_user ON sessions(user_id);
CREATE INDEX idx_sessions_expiry ON sessions(expires_at);
CREATE INDEX idx_forms_owner ON forms(owner_id);
CREATE INDEX idx_questions_form ON questions(form_id, position);
CREATE INDEX idx_field_options_question ON field_options(question_id);
CREATE INDEX idx_submissions_form ON submissions(form_id);
CREATE INDEX idx_answers_submission ON answers(submission_id);
CREATE INDEX idx_answers_question ON answers(question_id);
CREATE UNIQUE INDEX idx_users_billing_customer
  ON users(billing_customer_id) WHERE billing_customer_id IS NOT NULL;
";

pub struct Store {
    pub(crate) conn: Connection,
}

impl Store {
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")
            .map_err(StoreError::internal)?;
        Self::bootstrap(conn)
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        Self::bootstrap(conn)
    }

    fn bootstrap(conn: Connection) -> Result<Self, StoreError> {
        conn.execute_batch("PRAGMA foreign_keys=ON;")
            .map_err(StoreError::internal)?;
        let version: i64 = conn
            .query_row("PRAGMA user_version", [], |r| r.get(0))
            .map_err(StoreError::internal)?;
        if version == 0 {
            conn.execute_batch(SCHEMA_SQL).map_err(StoreError::internal)?;
            conn.execute_batch(&format!("PRAGMA user_version={SCHEMA_VERSION};"))
                .map_err(StoreError::internal)?;
            conn.execute(
                "INSERT INTO forge_meta (k, v) VALUES ('schema_version', ?1)",
                [SCHEMA_VERSION.to_string()],
            )
            .map_err(StoreError::internal)?;
        } else if version != SCHEMA_VERSION {
            return Err(StoreError::new(
                StoreErrorCode::Io,
                format!("unsupported schema version {version}, expected {SCHEMA_VERSION}"),
            ));
        }
        Ok(Self { conn })
    }

    /// Cheap liveness probe used by readiness checks.
    pub fn ping(&self) -> Result<(), StoreError> {
        self.conn
            .query_row("SELECT 1", [], |r| r.get::<_, i64>(0))
            .map_err(StoreError::internal)?;
        Ok(())
    }
}

#[cfg(test)]
mod schema_tests {
    use super::*;

    #[test]
    fn bootstrap_records_schema_version() {
        let store = Store::open_in_memory().expect("open");
        let version: i64 = store
            .conn
            .query_row("PRAGMA user_version", [], |r| r.get(0))
            .expect("user_version");
        assert_eq!(version, SCHEMA_VERSION);
        let recorded: String = store
            .conn
            .query_row(
                "SELECT v FROM forge_meta WHERE k='schema_version'",
                [],
                |r| r.get(0),
            )
            .expect("meta");
        assert_eq!(recorded, SCHEMA_VERSION.to_string());
    }

    #[test]
    fn reopening_a_file_store_is_idempotent() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("forge.sqlite");
        drop(Store::open(&path).expect("first open"));
        let store = Store::open(&path).expect("second open");
        store.ping().expect("ping");
    }
}