use thiserror::Error;

// ============================================================================
// Error Types
// ============================================================================

/// Database errors, classified by driver error kind rather than message text.
#[derive(Debug, Error)]
pub enum DatabaseError {
    /// A UNIQUE constraint rejected the write.
    ///
    /// For posts this is the steady-state "already ingested" outcome, so
    /// callers match on it instead of treating it as a failure.
    #[error("Unique constraint violated: {0}")]
    UniqueViolation(String),

    /// A query that must return a row returned none.
    #[error("Record not found")]
    NotFound,

    /// Migration failed
    #[error("Database migration failed: {0}")]
    Migration(String),

    /// Generic database error
    #[error("Database error: {0}")]
    Other(#[source] sqlx::Error),
}

impl From<sqlx::Error> for DatabaseError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
                DatabaseError::UniqueViolation(db_err.message().to_string())
            }
            sqlx::Error::RowNotFound => DatabaseError::NotFound,
            other => DatabaseError::Other(other),
        }
    }
}

impl DatabaseError {
    pub fn is_unique_violation(&self) -> bool {
        matches!(self, DatabaseError::UniqueViolation(_))
    }
}

// ============================================================================
// Data Structures
// ============================================================================

/// A registered user. Users own sources and follow them.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct User {
    pub id: i64,
    pub name: String,
    pub created_at: i64,
    pub updated_at: i64,
}

/// A subscribed feed endpoint polled by the scheduler.
///
/// `last_fetched_at` is epoch milliseconds; `None` means the source has
/// never been selected and takes priority over every fetched source.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct Source {
    pub id: i64,
    pub name: String,
    pub url: String,
    pub user_id: i64,
    pub last_fetched_at: Option<i64>,
    pub fetch_count: i64,
    pub created_at: i64,
    pub updated_at: i64,
}

/// A source joined with its owner's name, for listings.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct SourceListing {
    pub id: i64,
    pub name: String,
    pub url: String,
    pub owner: String,
}

/// A (user, source) follow relationship.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct FeedFollow {
    pub id: i64,
    pub user_id: i64,
    pub source_id: i64,
    pub created_at: i64,
}

/// A stored feed entry. `(source_id, natural_key)` is unique.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct Post {
    pub id: i64,
    pub source_id: i64,
    pub title: String,
    pub description: String,
    pub url: String,
    pub natural_key: String,
    /// Epoch seconds (UTC)
    pub published_at: i64,
    pub created_at: i64,
    pub updated_at: i64,
}

/// Insert parameters for [`Post`]
#[derive(Debug, Clone)]
pub struct NewPost {
    pub source_id: i64,
    pub title: String,
    pub description: String,
    pub url: String,
    pub natural_key: String,
    pub published_at: i64,
}
