use super::schema::{now_millis, Database};
use super::types::{DatabaseError, NewPost, Post};

/// Maximum number of posts to return from any single query (OOM protection)
const MAX_POSTS: i64 = 2000;

impl Database {
    // ========================================================================
    // Post Operations
    // ========================================================================

    /// Insert a single post.
    ///
    /// This is a plain INSERT: a post already stored under the same
    /// `(source_id, natural_key)` surfaces as `DatabaseError::UniqueViolation`
    /// so the caller can tell "seen before" apart from real failures.
    pub async fn insert_post(&self, post: &NewPost) -> Result<Post, DatabaseError> {
        let now = now_millis();
        let inserted = sqlx::query_as::<_, Post>(
            r#"
            INSERT INTO posts
                (source_id, title, description, url, natural_key, published_at, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            RETURNING id, source_id, title, description, url, natural_key,
                      published_at, created_at, updated_at
        "#,
        )
        .bind(post.source_id)
        .bind(&post.title)
        .bind(&post.description)
        .bind(&post.url)
        .bind(&post.natural_key)
        .bind(post.published_at)
        .bind(now)
        .bind(now)
        .fetch_one(&self.pool)
        .await?;
        Ok(inserted)
    }

    /// Posts of one source, newest first, capped at MAX_POSTS
    pub async fn get_posts_for_source(
        &self,
        source_id: i64,
        limit: Option<i64>,
    ) -> Result<Vec<Post>, DatabaseError> {
        let limit = limit.unwrap_or(MAX_POSTS).min(MAX_POSTS);
        let posts = sqlx::query_as::<_, Post>(
            r#"
            SELECT id, source_id, title, description, url, natural_key,
                   published_at, created_at, updated_at
            FROM posts
            WHERE source_id = ?
            ORDER BY published_at DESC, id DESC
            LIMIT ?
        "#,
        )
        .bind(source_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(posts)
    }

    /// Total number of stored posts across all sources
    pub async fn count_posts(&self) -> Result<i64, DatabaseError> {
        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM posts")
            .fetch_one(&self.pool)
            .await?;
        Ok(count.0)
    }
}
