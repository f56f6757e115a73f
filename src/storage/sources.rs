use super::schema::{now_millis, Database};
use super::types::{DatabaseError, Source, SourceListing};

const SOURCE_COLUMNS: &str =
    "id, name, url, user_id, last_fetched_at, fetch_count, created_at, updated_at";

impl Database {
    // ========================================================================
    // Source Operations
    // ========================================================================

    /// Register a source. A URL that is already registered is
    /// `DatabaseError::UniqueViolation`.
    pub async fn insert_source(
        &self,
        name: &str,
        url: &str,
        user_id: i64,
    ) -> Result<Source, DatabaseError> {
        let now = now_millis();
        let source = sqlx::query_as::<_, Source>(&format!(
            r#"
            INSERT INTO sources (name, url, user_id, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?)
            RETURNING {SOURCE_COLUMNS}
        "#
        ))
        .bind(name)
        .bind(url)
        .bind(user_id)
        .bind(now)
        .bind(now)
        .fetch_one(&self.pool)
        .await?;
        Ok(source)
    }

    /// Register a source and make its owner follow it, atomically.
    pub async fn create_source_with_follow(
        &self,
        name: &str,
        url: &str,
        user_id: i64,
    ) -> Result<Source, DatabaseError> {
        let now = now_millis();
        let mut tx = self.pool.begin().await?;

        let source = sqlx::query_as::<_, Source>(&format!(
            r#"
            INSERT INTO sources (name, url, user_id, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?)
            RETURNING {SOURCE_COLUMNS}
        "#
        ))
        .bind(name)
        .bind(url)
        .bind(user_id)
        .bind(now)
        .bind(now)
        .fetch_one(&mut *tx)
        .await?;

        sqlx::query(
            "INSERT INTO feed_follows (user_id, source_id, created_at, updated_at) VALUES (?, ?, ?, ?)",
        )
        .bind(user_id)
        .bind(source.id)
        .bind(now)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(source)
    }

    pub async fn get_source_by_url(&self, url: &str) -> Result<Option<Source>, DatabaseError> {
        let source = sqlx::query_as::<_, Source>(&format!(
            "SELECT {SOURCE_COLUMNS} FROM sources WHERE url = ?"
        ))
        .bind(url)
        .fetch_optional(&self.pool)
        .await?;
        Ok(source)
    }

    /// All sources with their owner's name, in registration order
    pub async fn list_sources(&self) -> Result<Vec<SourceListing>, DatabaseError> {
        let sources = sqlx::query_as::<_, SourceListing>(
            r#"
            SELECT s.id, s.name, s.url, u.name AS owner
            FROM sources s
            JOIN users u ON u.id = s.user_id
            ORDER BY s.id
        "#,
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(sources)
    }

    // ========================================================================
    // Scheduling
    // ========================================================================

    /// Pick the source that has waited longest for a fetch.
    ///
    /// Never-fetched sources (NULL timestamp) come first. Equal timestamps,
    /// which happen when several ticks land in the same millisecond, fall back
    /// to the lower fetch count and then to insertion order, so a round over N
    /// sources still visits each one once.
    pub async fn select_next_source(&self) -> Result<Option<Source>, DatabaseError> {
        let source = sqlx::query_as::<_, Source>(&format!(
            r#"
            SELECT {SOURCE_COLUMNS}
            FROM sources
            ORDER BY last_fetched_at ASC NULLS FIRST, fetch_count ASC, id ASC
            LIMIT 1
        "#
        ))
        .fetch_optional(&self.pool)
        .await?;
        Ok(source)
    }

    /// Stamp a source as fetched now and bump its fetch counter.
    ///
    /// Returns the updated row, or `DatabaseError::NotFound` if the source
    /// no longer exists.
    pub async fn mark_fetched(&self, source_id: i64) -> Result<Source, DatabaseError> {
        let now = now_millis();
        let source = sqlx::query_as::<_, Source>(&format!(
            r#"
            UPDATE sources
            SET last_fetched_at = ?, updated_at = ?, fetch_count = fetch_count + 1
            WHERE id = ?
            RETURNING {SOURCE_COLUMNS}
        "#
        ))
        .bind(now)
        .bind(now)
        .bind(source_id)
        .fetch_optional(&self.pool)
        .await?;
        source.ok_or(DatabaseError::NotFound)
    }
}

#[cfg(test)]
mod tests {
    use crate::storage::{Database, DatabaseError};

    async fn test_db() -> (Database, i64) {
        let db = Database::open(":memory:").await.unwrap();
        let user = db.create_user("owner").await.unwrap();
        (db, user.id)
    }

    fn test_url(n: i64) -> String {
        format!("https://feed{}.example.com/rss", n)
    }

    #[tokio::test]
    async fn test_insert_source_defaults() {
        let (db, user_id) = test_db().await;
        let source = db
            .insert_source("Feed 1", &test_url(1), user_id)
            .await
            .unwrap();

        assert_eq!(source.name, "Feed 1");
        assert_eq!(source.user_id, user_id);
        assert!(source.last_fetched_at.is_none());
        assert_eq!(source.fetch_count, 0);
    }

    #[tokio::test]
    async fn test_duplicate_url_rejected() {
        let (db, user_id) = test_db().await;
        db.insert_source("A", &test_url(1), user_id).await.unwrap();

        let err = db
            .insert_source("B", &test_url(1), user_id)
            .await
            .unwrap_err();
        assert!(err.is_unique_violation());
    }

    #[tokio::test]
    async fn test_select_next_source_empty() {
        let (db, _) = test_db().await;
        assert!(db.select_next_source().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_never_fetched_selected_before_old_fetch() {
        let (db, user_id) = test_db().await;
        let old = db.insert_source("Old", &test_url(1), user_id).await.unwrap();
        let fresh = db
            .insert_source("Fresh", &test_url(2), user_id)
            .await
            .unwrap();

        // Push "Old" far into the past; it is still behind a NULL timestamp.
        sqlx::query("UPDATE sources SET last_fetched_at = 1 WHERE id = ?")
            .bind(old.id)
            .execute(&db.pool)
            .await
            .unwrap();

        let next = db.select_next_source().await.unwrap().unwrap();
        assert_eq!(next.id, fresh.id);
    }

    #[tokio::test]
    async fn test_oldest_timestamp_wins() {
        let (db, user_id) = test_db().await;
        let a = db.insert_source("A", &test_url(1), user_id).await.unwrap();
        let b = db.insert_source("B", &test_url(2), user_id).await.unwrap();

        for (id, ts) in [(a.id, 2_000), (b.id, 1_000)] {
            sqlx::query("UPDATE sources SET last_fetched_at = ? WHERE id = ?")
                .bind(ts)
                .bind(id)
                .execute(&db.pool)
                .await
                .unwrap();
        }

        let next = db.select_next_source().await.unwrap().unwrap();
        assert_eq!(next.id, b.id);
    }

    #[tokio::test]
    async fn test_equal_timestamps_prefer_fewer_fetches_then_insertion() {
        let (db, user_id) = test_db().await;
        let a = db.insert_source("A", &test_url(1), user_id).await.unwrap();
        let b = db.insert_source("B", &test_url(2), user_id).await.unwrap();
        let c = db.insert_source("C", &test_url(3), user_id).await.unwrap();

        for (id, count) in [(a.id, 5), (b.id, 1), (c.id, 1)] {
            sqlx::query("UPDATE sources SET last_fetched_at = 1000, fetch_count = ? WHERE id = ?")
                .bind(count)
                .bind(id)
                .execute(&db.pool)
                .await
                .unwrap();
        }

        // B and C tie on both timestamp and count; B was inserted first
        let next = db.select_next_source().await.unwrap().unwrap();
        assert_eq!(next.id, b.id);
    }

    #[tokio::test]
    async fn test_mark_fetched_updates_timestamp_and_counter() {
        let (db, user_id) = test_db().await;
        let source = db.insert_source("A", &test_url(1), user_id).await.unwrap();
        let before = chrono::Utc::now().timestamp_millis();

        let marked = db.mark_fetched(source.id).await.unwrap();
        assert!(marked.last_fetched_at.unwrap() >= before);
        assert_eq!(marked.fetch_count, 1);

        let marked = db.mark_fetched(source.id).await.unwrap();
        assert_eq!(marked.fetch_count, 2);
    }

    #[tokio::test]
    async fn test_mark_fetched_missing_source() {
        let (db, _) = test_db().await;
        let err = db.mark_fetched(404).await.unwrap_err();
        assert!(matches!(err, DatabaseError::NotFound));
    }

    #[tokio::test]
    async fn test_create_source_with_follow() {
        let (db, user_id) = test_db().await;
        let source = db
            .create_source_with_follow("A", &test_url(1), user_id)
            .await
            .unwrap();

        let followed = db.followed_sources(user_id).await.unwrap();
        assert_eq!(followed.len(), 1);
        assert_eq!(followed[0].id, source.id);
    }

    #[tokio::test]
    async fn test_create_source_with_follow_rolls_back_on_duplicate() {
        let (db, user_id) = test_db().await;
        db.insert_source("A", &test_url(1), user_id).await.unwrap();

        let err = db
            .create_source_with_follow("A again", &test_url(1), user_id)
            .await
            .unwrap_err();
        assert!(err.is_unique_violation());
        assert!(db.followed_sources(user_id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_list_sources_includes_owner() {
        let (db, user_id) = test_db().await;
        db.insert_source("A", &test_url(1), user_id).await.unwrap();

        let listed = db.list_sources().await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].owner, "owner");
        assert_eq!(listed[0].url, test_url(1));
    }
}
