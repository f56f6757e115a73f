use super::schema::{now_millis, Database};
use super::types::{DatabaseError, FeedFollow, SourceListing};

impl Database {
    // ========================================================================
    // Follow Operations
    // ========================================================================

    /// Follow a source. Following twice is `DatabaseError::UniqueViolation`.
    pub async fn follow_source(
        &self,
        user_id: i64,
        source_id: i64,
    ) -> Result<FeedFollow, DatabaseError> {
        let now = now_millis();
        let follow = sqlx::query_as::<_, FeedFollow>(
            r#"
            INSERT INTO feed_follows (user_id, source_id, created_at, updated_at)
            VALUES (?, ?, ?, ?)
            RETURNING id, user_id, source_id, created_at
        "#,
        )
        .bind(user_id)
        .bind(source_id)
        .bind(now)
        .bind(now)
        .fetch_one(&self.pool)
        .await?;
        Ok(follow)
    }

    /// Remove a follow. Returns `false` if the user was not following.
    pub async fn unfollow_source(&self, user_id: i64, source_id: i64) -> Result<bool, DatabaseError> {
        let result = sqlx::query("DELETE FROM feed_follows WHERE user_id = ? AND source_id = ?")
            .bind(user_id)
            .bind(source_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Sources a user follows, with each source's owner
    pub async fn followed_sources(&self, user_id: i64) -> Result<Vec<SourceListing>, DatabaseError> {
        let sources = sqlx::query_as::<_, SourceListing>(
            r#"
            SELECT s.id, s.name, s.url, u.name AS owner
            FROM feed_follows ff
            JOIN sources s ON s.id = ff.source_id
            JOIN users u ON u.id = s.user_id
            WHERE ff.user_id = ?
            ORDER BY ff.id
        "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(sources)
    }
}
